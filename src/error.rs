//! Error types for the progression engine

use thiserror::Error;
use uuid::Uuid;

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, GamificationError>;

#[derive(Error, Debug)]
pub enum GamificationError {

    // =============================
    // Caller Misuse
    // =============================

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Patch for user {expected} applied to user {actual}")]
    UserMismatch { expected: Uuid, actual: Uuid },

    #[error("Stale patch: built against revision {expected}, aggregate is at {actual}")]
    StalePatch { expected: u64, actual: u64 },

    // =============================
    // Configuration
    // =============================

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Configuration error: {0}")]
    Config(String),

    // =============================
    // Caller-side Collaborators
    // =============================

    #[error("Store error: {0}")]
    Store(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    // =============================
    // External Library Conversions
    // =============================

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Reasons a catalog is rejected at load time
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    #[error("level catalog is empty")]
    NoLevels,

    #[error("first level must start at 0 XP, found {0}")]
    FirstLevelNotZero(u64),

    #[error("level {level} is out of order or has a gap (expected ordinal {expected}, min XP {expected_min})")]
    LevelGap {
        level: u32,
        expected: u32,
        expected_min: u64,
    },

    #[error("level {0} has an XP range whose max is below its min")]
    InvertedRange(u32),

    #[error("duplicate {kind} id '{id}'")]
    DuplicateId { kind: &'static str, id: String },

    #[error("{owner} references unknown {kind} '{id}'")]
    UnknownReference {
        owner: String,
        kind: &'static str,
        id: String,
    },

    #[error("prerequisite cycle through simulation '{0}'")]
    PrerequisiteCycle(String),

    #[error("simulation '{id}' rewards {declared} XP but the XP table says {table}")]
    XpMismatch { id: String, declared: u64, table: u64 },

    #[error("streak tier for {days} days has non-positive multiplier")]
    InvalidStreakTier { days: u32 },

    #[error("xp action '{0}' awards 0 XP")]
    ZeroXpAction(String),
}

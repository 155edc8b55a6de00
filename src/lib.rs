//! Money Mindset progression engine
//!
//! Rules engine behind the learning app's game layer:
//! - XP rewards with streak, perfect-score and first-try bonuses
//! - Levels derived from total XP
//! - Daily streaks and milestone rewards
//! - Badges and hidden achievements resolved through typed predicates
//! - Simulations gated by a prerequisite DAG
//!
//! PIPELINE:
//! XP → LEVEL CHECK → MARK COMPLETE → BADGES → ACHIEVEMENTS → UNLOCKS → STREAK → PATCH
//!
//! The engine is pure. Callers own the `UserStats` aggregate and apply the
//! `StatsPatch` each operation returns; `store`, `audit` and `api` show one
//! way to do that behind HTTP.

pub mod achievements;
pub mod api;
pub mod audit;
pub mod badges;
pub mod catalog;
pub mod conditions;
pub mod config;
pub mod error;
pub mod models;
pub mod progress;
pub mod service;
pub mod store;

pub use error::{CatalogError, GamificationError, Result};

// Re-export common types
pub use catalog::Catalog;
pub use models::*;
pub use service::{GamificationService, GamificationUpdate, StatsPatch};

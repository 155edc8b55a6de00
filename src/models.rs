//! Core data models for the progression engine

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use uuid::Uuid;

/// Simulation completions kept in the aggregate's event history
pub const COMPLETION_LOG_RETENTION: usize = 100;

//
// ================= Enums =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum BadgeRarity {
    Common,
    Rare,
    Epic,
    Legendary,
}

impl BadgeRarity {
    pub const ALL: [BadgeRarity; 4] = [
        BadgeRarity::Common,
        BadgeRarity::Rare,
        BadgeRarity::Epic,
        BadgeRarity::Legendary,
    ];
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum BadgeCategory {
    Foundation,
    DebtMaster,
    Investment,
    Completion,
    Streak,
    Special,
}

impl BadgeCategory {
    pub const ALL: [BadgeCategory; 6] = [
        BadgeCategory::Foundation,
        BadgeCategory::DebtMaster,
        BadgeCategory::Investment,
        BadgeCategory::Completion,
        BadgeCategory::Streak,
        BadgeCategory::Special,
    ];
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Difficulty {
    Beginner,
    Intermediate,
    Advanced,
}

//
// ================= Levels =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct XpRange {
    pub min: u64,
    pub max: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LevelInfo {
    pub level: u32,
    pub name: String,
    pub xp_required: u64,
    pub xp_range: XpRange,
    pub description: String,
    pub perks: Vec<String>,
    pub icon: String,
    /// Shown on reaching this level; a generic message is used when absent
    #[serde(default)]
    pub celebration: Option<String>,
}

//
// ================= Badges =================
//

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Badge {
    pub id: String,
    pub name: String,
    pub description: String,
    pub rarity: BadgeRarity,
    pub category: BadgeCategory,
    pub icon: String,
    pub unlock_condition: String,
    pub xp_reward: u64,
    pub hint: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BadgeAward {
    pub badge: Badge,
    pub date_earned: DateTime<FixedOffset>,
    pub celebration_message: String,
}

//
// ================= Simulations =================
//

/// Typed requirement gating a simulation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UnlockRequirement {
    Always,
    Level { level: u32 },
    Simulation { simulation_id: String },
    Badge { badge_id: String },
    Xp { xp: u64 },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UnlockCondition {
    #[serde(flatten)]
    pub requirement: UnlockRequirement,
    pub description: String,
}

impl UnlockCondition {
    pub fn always() -> Self {
        Self {
            requirement: UnlockRequirement::Always,
            description: "Available to everyone".to_string(),
        }
    }

    pub fn level(level: u32, description: &str) -> Self {
        Self {
            requirement: UnlockRequirement::Level { level },
            description: description.to_string(),
        }
    }

    pub fn simulation(simulation_id: &str, description: &str) -> Self {
        Self {
            requirement: UnlockRequirement::Simulation {
                simulation_id: simulation_id.to_string(),
            },
            description: description.to_string(),
        }
    }

    pub fn badge(badge_id: &str, description: &str) -> Self {
        Self {
            requirement: UnlockRequirement::Badge {
                badge_id: badge_id.to_string(),
            },
            description: description.to_string(),
        }
    }

    pub fn xp(xp: u64, description: &str) -> Self {
        Self {
            requirement: UnlockRequirement::Xp { xp },
            description: description.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Simulation {
    pub id: String,
    pub name: String,
    pub description: String,
    pub level: u32,
    pub xp_reward: u64,
    pub estimated_time: String,
    pub difficulty: Difficulty,
    pub unlock_conditions: Vec<UnlockCondition>,
    pub prerequisites: Vec<String>,
    pub category: String,
}

//
// ================= Achievements =================
//

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Achievement {
    pub id: String,
    pub name: String,
    pub description: String,
    pub unlock_condition: String,
    pub reward_xp: u64,
    pub reward_badge: Option<String>,
    pub hidden: bool,
}

//
// ================= User Aggregate =================
//

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CompletionEvent {
    pub simulation_id: String,
    pub completed_at: DateTime<FixedOffset>,
}

/// Per-user progression aggregate, owned and persisted by the caller
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserStats {
    pub user_id: Uuid,
    pub total_xp: u64,
    pub current_level: u32,
    pub completed_simulations: BTreeSet<String>,
    pub earned_badges: BTreeSet<String>,
    pub earned_achievements: BTreeSet<String>,
    pub current_streak: u32,
    pub longest_streak: u32,
    pub last_activity_date: Option<DateTime<FixedOffset>>,
    pub perfect_score_simulations: BTreeSet<String>,
    pub ai_questions_asked: u32,
    pub goals_completed: u32,
    #[serde(default)]
    pub completion_log: Vec<CompletionEvent>,
    #[serde(default)]
    pub revision: u64,
}

impl UserStats {
    /// Zeroed aggregate for a brand-new user
    pub fn new(user_id: Uuid, first_level: u32) -> Self {
        Self {
            user_id,
            total_xp: 0,
            current_level: first_level,
            completed_simulations: BTreeSet::new(),
            earned_badges: BTreeSet::new(),
            earned_achievements: BTreeSet::new(),
            current_streak: 0,
            longest_streak: 0,
            last_activity_date: None,
            perfect_score_simulations: BTreeSet::new(),
            ai_questions_asked: 0,
            goals_completed: 0,
            completion_log: Vec::new(),
            revision: 0,
        }
    }

    /// Append a completion, dropping the oldest beyond retention
    pub fn record_completion(&mut self, event: CompletionEvent) {
        self.completion_log.push(event);
        if self.completion_log.len() > COMPLETION_LOG_RETENTION {
            let excess = self.completion_log.len() - COMPLETION_LOG_RETENTION;
            self.completion_log.drain(..excess);
        }
    }
}

//
// ================= Rewards & Progress =================
//

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct XpReward {
    pub action: String,
    pub base_xp: u64,
    pub multiplier: f64,
    pub total_xp: u64,
    pub reason: String,
}

impl XpReward {
    pub fn unknown(action: &str) -> Self {
        Self {
            action: action.to_string(),
            base_xp: 0,
            multiplier: 1.0,
            total_xp: 0,
            reason: "Unknown action".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProgressSnapshot {
    pub user_id: Uuid,
    pub current_level: u32,
    pub level_name: String,
    pub current_xp: u64,
    pub xp_to_next_level: u64,
    pub progress_percentage: f64,
    pub at_max_level: bool,
    pub total_simulations_completed: usize,
    pub total_badges_earned: usize,
    pub current_streak: u32,
    pub longest_streak: u32,
    pub last_activity_date: Option<DateTime<FixedOffset>>,
    pub next_level_info: Option<LevelInfo>,
}

impl fmt::Display for BadgeRarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BadgeRarity::Common => "common",
            BadgeRarity::Rare => "rare",
            BadgeRarity::Epic => "epic",
            BadgeRarity::Legendary => "legendary",
        };
        write!(f, "{}", s)
    }
}

impl fmt::Display for BadgeCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BadgeCategory::Foundation => "foundation",
            BadgeCategory::DebtMaster => "debt_master",
            BadgeCategory::Investment => "investment",
            BadgeCategory::Completion => "completion",
            BadgeCategory::Streak => "streak",
            BadgeCategory::Special => "special",
        };
        write!(f, "{}", s)
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Difficulty::Beginner => "Beginner",
            Difficulty::Intermediate => "Intermediate",
            Difficulty::Advanced => "Advanced",
        };
        write!(f, "{}", s)
    }
}

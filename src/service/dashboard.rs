//! Read models assembled by the service

use crate::achievements::{LearningPathStep, UnlockRecommendation};
use crate::badges::{BadgeCollectionStats, BadgeSuggestion};
use crate::models::{LevelInfo, Simulation};
use crate::progress::NextStep;
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DashboardView {
    pub user_id: Uuid,
    pub progress: DashboardProgress,
    pub stats: DashboardStats,
    pub badges: DashboardBadges,
    pub simulations: DashboardSimulations,
    pub next_unlock: Option<UnlockRecommendation>,
    pub recommendations: Vec<NextStep>,
    pub last_activity: Option<DateTime<FixedOffset>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DashboardProgress {
    pub level: u32,
    pub level_name: String,
    pub current_xp: u64,
    pub xp_to_next_level: u64,
    pub progress_percentage: f64,
    pub next_level: Option<LevelInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DashboardStats {
    pub simulations_completed: usize,
    pub badges_earned: usize,
    pub current_streak: u32,
    pub longest_streak: u32,
    pub completion_percentage: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DashboardBadges {
    pub collection_stats: BadgeCollectionStats,
    pub next_to_earn: Vec<BadgeSuggestion>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LockedEntry {
    pub simulation: Simulation,
    pub unlock_message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DashboardSimulations {
    pub unlocked: Vec<Simulation>,
    pub locked: Vec<LockedEntry>,
    pub learning_path: Vec<LearningPathStep>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LeaderboardRow {
    pub user_id: Uuid,
    pub total_xp: u64,
    pub level: u32,
    pub level_name: String,
    pub level_icon: String,
    pub simulations_completed: usize,
    pub badges_earned: usize,
    pub current_streak: u32,
    pub longest_streak: u32,
    pub completion_percentage: f64,
}

/// One completion in a simulated journey
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct JourneyStep {
    pub simulation: String,
    pub xp_earned: u64,
    pub total_xp: u64,
    pub level: u32,
    pub badges_earned: Vec<String>,
    pub leveled_up: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct JourneyTotals {
    pub total_xp: u64,
    pub level: u32,
    pub simulations_completed: usize,
    pub badges_earned: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct JourneySummary {
    pub journey: Vec<JourneyStep>,
    pub final_stats: JourneyTotals,
}

//! Progress tracking: XP rewards, levels, streaks
//!
//! Everything here is a pure function of the catalog and its arguments.

use crate::catalog::Catalog;
use crate::models::{LevelInfo, ProgressSnapshot, UserStats, XpReward};
use chrono::{DateTime, Duration, FixedOffset};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LevelUpCheck {
    pub leveled_up: bool,
    pub old_level: u32,
    pub new_level: u32,
    pub new_level_info: Option<LevelInfo>,
    pub celebration_message: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StreakSignal {
    /// Same calendar day, leave the streak alone
    Unchanged,
    Increment,
    /// Streak restarts at 1
    Reset,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct StreakCheck {
    pub signal: StreakSignal,
    pub streak_broken: bool,
    pub days_since_last: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LevelProgress {
    pub at_max_level: bool,
    pub current_xp: u64,
    pub xp_to_next: u64,
    pub progress_percentage: f64,
    pub next_level: Option<LevelInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TimeToNextLevel {
    pub at_max_level: bool,
    pub xp_needed: u64,
    pub days_remaining: Option<u64>,
    pub estimated_date: Option<DateTime<FixedOffset>>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NextStep {
    pub priority: u32,
    pub simulation_id: String,
    pub reason: String,
    pub xp: u64,
}

/// XP, level and streak calculations over a shared catalog
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    catalog: Arc<Catalog>,
}

impl ProgressTracker {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self { catalog }
    }

    /// Base XP for `action` with streak, perfect-score and first-try bonuses
    ///
    /// Composition order: custom multiplier, best streak tier reached,
    /// perfect score, first try. The total is floored.
    pub fn calculate_xp_reward(
        &self,
        action: &str,
        current_streak: u32,
        perfect_score: bool,
        first_try: bool,
        custom_multiplier: f64,
    ) -> XpReward {
        let Some(base_xp) = self.catalog.base_xp(action) else {
            return XpReward::unknown(action);
        };

        let mut multiplier = custom_multiplier;
        let mut bonuses = Vec::new();

        if (custom_multiplier - 1.0).abs() > f64::EPSILON {
            bonuses.push(format!("{}x activity multiplier", custom_multiplier));
        }

        if let Some(tier) = self
            .catalog
            .streak_tiers
            .iter()
            .filter(|tier| current_streak >= tier.days)
            .max_by_key(|tier| tier.days)
        {
            multiplier *= tier.multiplier;
            bonuses.push(format!("{}-day streak", tier.days));
        }

        if perfect_score {
            multiplier *= self.catalog.perfect_score_bonus;
            bonuses.push("perfect score".to_string());
        }

        if first_try {
            multiplier *= self.catalog.first_try_bonus;
            bonuses.push("first try".to_string());
        }

        let total_xp = (base_xp as f64 * multiplier).floor().max(0.0) as u64;

        let mut reason = format!("Base {} XP", base_xp);
        if !bonuses.is_empty() {
            reason.push_str(&format!(" + bonuses ({})", bonuses.join(", ")));
        }

        XpReward {
            action: action.to_string(),
            base_xp,
            multiplier,
            total_xp,
            reason,
        }
    }

    /// Highest level whose threshold is at or below `xp`
    pub fn get_level_from_xp(&self, xp: u64) -> u32 {
        self.level_info_for_xp(xp)
            .map(|info| info.level)
            .unwrap_or_else(|| self.catalog.first_level())
    }

    fn level_info_for_xp(&self, xp: u64) -> Option<&LevelInfo> {
        self.catalog
            .levels
            .iter()
            .rev()
            .find(|info| xp >= info.xp_required)
    }

    pub fn get_level_info(&self, level: u32) -> Option<&LevelInfo> {
        self.catalog.level(level)
    }

    pub fn get_next_level_info(&self, level: u32) -> Option<&LevelInfo> {
        self.catalog.level(level + 1)
    }

    pub fn get_all_levels(&self) -> &[LevelInfo] {
        &self.catalog.levels
    }

    pub fn level_name(&self, level: u32) -> String {
        self.get_level_info(level)
            .map(|info| info.name.clone())
            .unwrap_or_default()
    }

    pub fn calculate_progress_to_next_level(&self, current_xp: u64, level: u32) -> LevelProgress {
        let next = match self.get_next_level_info(level) {
            Some(next) => next,
            None => {
                return LevelProgress {
                    at_max_level: true,
                    current_xp,
                    xp_to_next: 0,
                    progress_percentage: 100.0,
                    next_level: None,
                }
            }
        };

        let xp_to_next = next.xp_required.saturating_sub(current_xp);
        let progress_percentage = match self.get_level_info(level) {
            Some(current) if current.xp_range.max > current.xp_range.min => {
                let band = (current.xp_range.max - current.xp_range.min) as f64;
                let within = current_xp.saturating_sub(current.xp_range.min) as f64;
                (within / band * 100.0).min(100.0)
            }
            _ => 0.0,
        };

        LevelProgress {
            at_max_level: false,
            current_xp,
            xp_to_next,
            progress_percentage,
            next_level: Some(next.clone()),
        }
    }

    pub fn check_level_up(&self, old_xp: u64, new_xp: u64) -> LevelUpCheck {
        let old_level = self.get_level_from_xp(old_xp);
        let new_level = self.get_level_from_xp(new_xp);

        if new_level > old_level {
            let info = self.get_level_info(new_level).cloned();
            let celebration_message = info.as_ref().map(level_up_message);

            debug!(old_level, new_level, "Level up detected");

            return LevelUpCheck {
                leveled_up: true,
                old_level,
                new_level,
                new_level_info: info,
                celebration_message,
            };
        }

        LevelUpCheck {
            leveled_up: false,
            old_level,
            new_level: old_level,
            new_level_info: None,
            celebration_message: None,
        }
    }

    /// Classify the gap between the last activity and `now` in calendar days
    ///
    /// Days are counted in `now`'s UTC offset. A clock that went backwards
    /// counts as the same day.
    pub fn calculate_streak(
        &self,
        last_activity: Option<DateTime<FixedOffset>>,
        now: DateTime<FixedOffset>,
    ) -> StreakCheck {
        let last = match last_activity {
            Some(last) => last,
            None => {
                return StreakCheck {
                    signal: StreakSignal::Reset,
                    streak_broken: true,
                    days_since_last: 0,
                }
            }
        };

        let days = (now.date_naive() - last.with_timezone(now.offset()).date_naive()).num_days();

        match days {
            d if d <= 0 => StreakCheck {
                signal: StreakSignal::Unchanged,
                streak_broken: false,
                days_since_last: 0,
            },
            1 => StreakCheck {
                signal: StreakSignal::Increment,
                streak_broken: false,
                days_since_last: 1,
            },
            d => StreakCheck {
                signal: StreakSignal::Reset,
                streak_broken: true,
                days_since_last: d,
            },
        }
    }

    /// New `(current, longest)` after applying a streak check
    pub fn apply_streak(&self, check: &StreakCheck, current: u32, longest: u32) -> (u32, u32) {
        let current = match check.signal {
            StreakSignal::Unchanged => current,
            StreakSignal::Increment => current.saturating_add(1),
            StreakSignal::Reset => 1,
        };
        (current, longest.max(current))
    }

    /// Milestone rewards for a streak that lands exactly on a milestone day
    pub fn get_streak_milestone_rewards(&self, streak: u32) -> Vec<XpReward> {
        self.catalog
            .streak_milestones
            .iter()
            .filter(|milestone| milestone.days == streak)
            .map(|milestone| self.calculate_xp_reward(&milestone.action, 0, false, false, 1.0))
            .collect()
    }

    pub fn create_progress_snapshot(&self, stats: &UserStats) -> ProgressSnapshot {
        let level = self.get_level_from_xp(stats.total_xp);
        let progress = self.calculate_progress_to_next_level(stats.total_xp, level);

        ProgressSnapshot {
            user_id: stats.user_id,
            current_level: level,
            level_name: self.level_name(level),
            current_xp: stats.total_xp,
            xp_to_next_level: progress.xp_to_next,
            progress_percentage: progress.progress_percentage,
            at_max_level: progress.at_max_level,
            total_simulations_completed: stats.completed_simulations.len(),
            total_badges_earned: stats.earned_badges.len(),
            current_streak: stats.current_streak,
            longest_streak: stats.longest_streak,
            last_activity_date: stats.last_activity_date,
            next_level_info: progress.next_level,
        }
    }

    pub fn get_recommended_next_steps(
        &self,
        level: u32,
        completed: &BTreeSet<String>,
    ) -> Vec<NextStep> {
        let mut steps: Vec<NextStep> = self
            .catalog
            .next_steps
            .iter()
            .filter(|rule| rule.applies_to(level) && !completed.contains(&rule.simulation_id))
            .map(|rule| NextStep {
                priority: rule.priority,
                simulation_id: rule.simulation_id.clone(),
                reason: rule.reason.clone(),
                xp: self.catalog.base_xp(&rule.simulation_id).unwrap_or(0),
            })
            .collect();

        steps.sort_by_key(|step| step.priority);
        steps
    }

    pub fn estimate_time_to_next_level(
        &self,
        current_xp: u64,
        avg_xp_per_day: f64,
        now: DateTime<FixedOffset>,
    ) -> TimeToNextLevel {
        let level = self.get_level_from_xp(current_xp);
        let Some(next) = self.get_next_level_info(level) else {
            return TimeToNextLevel {
                at_max_level: true,
                xp_needed: 0,
                days_remaining: Some(0),
                estimated_date: None,
                message: None,
            };
        };

        let xp_needed = next.xp_required.saturating_sub(current_xp);

        if !(avg_xp_per_day.is_finite() && avg_xp_per_day > 0.0) {
            return TimeToNextLevel {
                at_max_level: false,
                xp_needed,
                days_remaining: None,
                estimated_date: None,
                message: Some("Complete simulations to start earning XP!".to_string()),
            };
        }

        let days = (xp_needed as f64 / avg_xp_per_day).floor() as u64;
        let estimated_date = i64::try_from(days)
            .ok()
            .and_then(Duration::try_days)
            .and_then(|span| now.checked_add_signed(span));

        TimeToNextLevel {
            at_max_level: false,
            xp_needed,
            days_remaining: Some(days),
            estimated_date,
            message: Some(format!("About {} days at your current pace!", days)),
        }
    }
}

fn level_up_message(info: &LevelInfo) -> String {
    info.celebration
        .clone()
        .unwrap_or_else(|| format!("{} Level up! Welcome to {}!", info.icon, info.name))
}

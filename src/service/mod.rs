//! Gamification service - the orchestration layer
//!
//! XP → LEVEL CHECK → MARK COMPLETE → BADGES → ACHIEVEMENTS → UNLOCK SCAN → STREAK → PATCH
//!
//! `evaluate_*` are pure and return the update with its patch. `process_*`
//! evaluate and then apply the patch to the caller's aggregate.

mod dashboard;
mod patch;

pub use dashboard::{
    DashboardBadges, DashboardProgress, DashboardSimulations, DashboardStats, DashboardView,
    JourneyStep, JourneySummary, JourneyTotals, LeaderboardRow, LockedEntry,
};
pub use patch::StatsPatch;

use crate::achievements::AchievementEngine;
use crate::badges::BadgeSystem;
use crate::catalog::Catalog;
use crate::conditions::UserSnapshot;
use crate::error::{GamificationError, Result};
use crate::models::{
    Achievement, Badge, BadgeAward, CompletionEvent, LevelInfo, ProgressSnapshot, Simulation,
    UserStats, XpReward,
};
use crate::progress::{LevelUpCheck, ProgressTracker, StreakSignal};
use chrono::{DateTime, FixedOffset, Local, Offset, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

const AI_TUTOR_QUESTION: &str = "ai_tutor_question";
const GOAL_COMPLETED: &str = "goal_completed";
const NEXT_BADGES_LIMIT: usize = 3;
/// Upper bound for caller-supplied activity multipliers
pub const MAX_CUSTOM_MULTIPLIER: f64 = 10.0;

//
// ================= Clock =================
//

/// Source of "now" for streaks and completion timestamps
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<FixedOffset>;
}

/// Wall clock in a fixed offset, or the host's local offset
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock {
    offset: Option<FixedOffset>,
}

impl SystemClock {
    pub fn new(offset: Option<FixedOffset>) -> Self {
        Self { offset }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<FixedOffset> {
        match self.offset {
            Some(offset) => Utc::now().with_timezone(&offset),
            None => {
                let now = Local::now();
                now.with_timezone(&now.offset().fix())
            }
        }
    }
}

/// Clock frozen at one instant
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<FixedOffset>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<FixedOffset> {
        self.0
    }
}

//
// ================= Update Types =================
//

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewUnlock {
    pub simulation_id: String,
    pub simulation_name: String,
    pub xp_reward: u64,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StreakUpdate {
    pub signal: StreakSignal,
    pub streak_broken: bool,
    pub days_since_last: i64,
    pub previous_streak: u32,
    pub current_streak: u32,
    pub longest_streak: u32,
    pub milestone_rewards: Vec<XpReward>,
}

impl StreakUpdate {
    fn unchanged(stats: &UserStats) -> Self {
        Self {
            signal: StreakSignal::Unchanged,
            streak_broken: false,
            days_since_last: 0,
            previous_streak: stats.current_streak,
            current_streak: stats.current_streak,
            longest_streak: stats.longest_streak,
            milestone_rewards: Vec::new(),
        }
    }

    /// Summed milestone XP, saturating at `u64::MAX`
    pub fn milestone_xp(&self) -> u64 {
        self.milestone_rewards
            .iter()
            .fold(0u64, |acc, reward| acc.saturating_add(reward.total_xp))
    }
}

/// Everything one action produced
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GamificationUpdate {
    pub xp_earned: XpReward,
    /// Set only when the action's own XP crossed a level threshold
    pub level_up: Option<LevelUpCheck>,
    pub badges_earned: Vec<BadgeAward>,
    pub achievements_unlocked: Vec<Achievement>,
    pub new_unlocks: Vec<NewUnlock>,
    pub streak_update: StreakUpdate,
    /// Achievement and streak milestone XP on top of `xp_earned`
    pub bonus_xp: u64,
    pub updated_snapshot: ProgressSnapshot,
    pub patch: StatsPatch,
    pub message: String,
}

impl GamificationUpdate {
    pub fn is_noop(&self) -> bool {
        self.patch.is_empty()
    }
}

//
// ================= Service =================
//

pub struct GamificationService {
    catalog: Arc<Catalog>,
    tracker: ProgressTracker,
    badges: BadgeSystem,
    engine: AchievementEngine,
    clock: Arc<dyn Clock>,
}

impl GamificationService {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self::with_clock(catalog, Arc::new(SystemClock::default()))
    }

    pub fn with_clock(catalog: Arc<Catalog>, clock: Arc<dyn Clock>) -> Self {
        Self {
            tracker: ProgressTracker::new(catalog.clone()),
            badges: BadgeSystem::new(catalog.clone()),
            engine: AchievementEngine::new(catalog.clone()),
            catalog,
            clock,
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn tracker(&self) -> &ProgressTracker {
        &self.tracker
    }

    pub fn badges(&self) -> &BadgeSystem {
        &self.badges
    }

    pub fn achievements(&self) -> &AchievementEngine {
        &self.engine
    }

    pub fn create_user_stats(&self, user_id: Uuid) -> UserStats {
        UserStats::new(user_id, self.catalog.first_level())
    }

    pub fn get_all_levels(&self) -> &[LevelInfo] {
        self.tracker.get_all_levels()
    }

    pub fn get_all_badges(&self) -> &[Badge] {
        self.badges.get_all_badges()
    }

    pub fn get_simulation_by_id(&self, simulation_id: &str) -> Option<&Simulation> {
        self.engine.get_simulation_by_id(simulation_id)
    }

    pub fn get_all_simulations(&self) -> &[Simulation] {
        self.engine.get_all_simulations()
    }

    pub fn get_all_achievements(&self) -> &[Achievement] {
        self.engine.get_all_achievements()
    }

    // =============================
    // Pipelines
    // =============================

    /// Evaluate a simulation completion without touching `stats`
    ///
    /// The level-up check only sees the simulation's own XP. Achievement XP
    /// lands after it, and streak milestone XP after the unlock scan, so
    /// neither can produce a reported level-up or an extra unlock here.
    pub fn evaluate_simulation_completion(
        &self,
        stats: &UserStats,
        simulation_id: &str,
        perfect_score: bool,
        first_try: bool,
    ) -> Result<GamificationUpdate> {
        require_id("simulation_id", simulation_id)?;

        let Some(simulation) = self.catalog.simulation(simulation_id) else {
            warn!(user_id = ?stats.user_id, simulation_id, "Unknown simulation, nothing awarded");
            return Ok(self.zero_effect(
                stats,
                simulation_id,
                format!("Simulation not found: {}", simulation_id),
            ));
        };

        let now = self.clock.now();
        let old_xp = stats.total_xp;

        let reward = self.tracker.calculate_xp_reward(
            simulation_id,
            stats.current_streak,
            perfect_score,
            first_try,
            1.0,
        );
        let mut new_xp = old_xp.saturating_add(reward.total_xp);
        let level_up = self.tracker.check_level_up(old_xp, new_xp);

        let mut next = stats.clone();
        next.completed_simulations.insert(simulation_id.to_string());
        if perfect_score {
            next.perfect_score_simulations.insert(simulation_id.to_string());
        }
        let event = CompletionEvent {
            simulation_id: simulation_id.to_string(),
            completed_at: now,
        };
        next.record_completion(event.clone());

        let (badges_earned, achievements_unlocked, achievement_xp) =
            self.check_awards(&mut next, new_xp, now);
        new_xp = new_xp.saturating_add(achievement_xp);

        let new_level = self.tracker.get_level_from_xp(new_xp);
        let new_unlocks = self.scan_unlocks(&next, new_level, new_xp);

        let streak_update = self.advance_streak(&mut next, now);
        let milestone_xp = streak_update.milestone_xp();
        new_xp = new_xp.saturating_add(milestone_xp);

        self.settle(&mut next, new_xp, now);

        let gained = new_xp - old_xp;
        info!(
            user_id = ?stats.user_id,
            simulation_id,
            xp = gained,
            badges = badges_earned.len(),
            achievements = achievements_unlocked.len(),
            "Simulation completion evaluated"
        );

        let patch = StatsPatch::between(stats, &next).with_completion(event);
        Ok(GamificationUpdate {
            xp_earned: reward,
            level_up: level_up.leveled_up.then_some(level_up),
            badges_earned,
            achievements_unlocked,
            new_unlocks,
            streak_update,
            bonus_xp: achievement_xp.saturating_add(milestone_xp),
            updated_snapshot: self.tracker.create_progress_snapshot(&next),
            patch,
            message: format!("Completed {}: +{} XP", simulation.name, gained),
        })
    }

    /// Evaluate a non-simulation activity without touching `stats`
    pub fn evaluate_activity(
        &self,
        stats: &UserStats,
        activity_type: &str,
        custom_multiplier: f64,
    ) -> Result<GamificationUpdate> {
        require_id("activity_type", activity_type)?;
        if !(custom_multiplier.is_finite()
            && (0.0..=MAX_CUSTOM_MULTIPLIER).contains(&custom_multiplier))
        {
            return Err(GamificationError::InvalidInput(format!(
                "custom_multiplier must be between 0 and {}, got {}",
                MAX_CUSTOM_MULTIPLIER, custom_multiplier
            )));
        }

        if self.catalog.base_xp(activity_type).is_none() {
            warn!(user_id = ?stats.user_id, activity_type, "Unknown activity, nothing awarded");
            return Ok(self.zero_effect(
                stats,
                activity_type,
                format!("Unknown activity: {}", activity_type),
            ));
        }

        let now = self.clock.now();
        let old_xp = stats.total_xp;

        let reward = self.tracker.calculate_xp_reward(
            activity_type,
            stats.current_streak,
            false,
            false,
            custom_multiplier,
        );
        let mut new_xp = old_xp.saturating_add(reward.total_xp);
        let level_up = self.tracker.check_level_up(old_xp, new_xp);

        let mut next = stats.clone();
        match activity_type {
            AI_TUTOR_QUESTION => next.ai_questions_asked = next.ai_questions_asked.saturating_add(1),
            GOAL_COMPLETED => next.goals_completed = next.goals_completed.saturating_add(1),
            _ => {}
        }

        let (badges_earned, achievements_unlocked, achievement_xp) =
            self.check_awards(&mut next, new_xp, now);
        new_xp = new_xp.saturating_add(achievement_xp);

        let streak_update = self.advance_streak(&mut next, now);
        let milestone_xp = streak_update.milestone_xp();
        new_xp = new_xp.saturating_add(milestone_xp);

        self.settle(&mut next, new_xp, now);

        let gained = new_xp - old_xp;
        info!(
            user_id = ?stats.user_id,
            activity_type,
            xp = gained,
            badges = badges_earned.len(),
            achievements = achievements_unlocked.len(),
            "Activity evaluated"
        );

        Ok(GamificationUpdate {
            xp_earned: reward,
            level_up: level_up.leveled_up.then_some(level_up),
            badges_earned,
            achievements_unlocked,
            new_unlocks: Vec::new(),
            streak_update,
            bonus_xp: achievement_xp.saturating_add(milestone_xp),
            updated_snapshot: self.tracker.create_progress_snapshot(&next),
            patch: StatsPatch::between(stats, &next),
            message: format!("{}: +{} XP", activity_type, gained),
        })
    }

    pub fn process_simulation_completion(
        &self,
        stats: &mut UserStats,
        simulation_id: &str,
        perfect_score: bool,
        first_try: bool,
    ) -> Result<GamificationUpdate> {
        let update =
            self.evaluate_simulation_completion(stats, simulation_id, perfect_score, first_try)?;
        update.patch.apply(stats)?;
        Ok(update)
    }

    pub fn process_activity(
        &self,
        stats: &mut UserStats,
        activity_type: &str,
        custom_multiplier: f64,
    ) -> Result<GamificationUpdate> {
        let update = self.evaluate_activity(stats, activity_type, custom_multiplier)?;
        update.patch.apply(stats)?;
        Ok(update)
    }

    /// Badge then achievement checks against the in-flight state
    ///
    /// Awards are folded into `next` as they are found. Returns the summed
    /// achievement XP.
    fn check_awards(
        &self,
        next: &mut UserStats,
        xp: u64,
        now: DateTime<FixedOffset>,
    ) -> (Vec<BadgeAward>, Vec<Achievement>, u64) {
        let level = self.tracker.get_level_from_xp(xp);

        let mut badges = self
            .badges
            .check_badge_unlocks(&UserSnapshot::of(next, xp, level, now));
        for award in &badges {
            next.earned_badges.insert(award.badge.id.clone());
        }

        let achievements = self
            .engine
            .check_achievements(&UserSnapshot::of(next, xp, level, now));

        let mut achievement_xp: u64 = 0;
        for achievement in &achievements {
            next.earned_achievements.insert(achievement.id.clone());
            achievement_xp = achievement_xp.saturating_add(achievement.reward_xp);

            let Some(badge_id) = &achievement.reward_badge else {
                continue;
            };
            if next.earned_badges.contains(badge_id) {
                continue;
            }
            if let Some(badge) = self.badges.get_badge(badge_id) {
                badges.push(self.badges.award(badge, now));
                next.earned_badges.insert(badge_id.clone());
            }
        }

        debug!(
            badges = badges.len(),
            achievements = achievements.len(),
            achievement_xp,
            "Awards checked"
        );
        (badges, achievements, achievement_xp)
    }

    fn scan_unlocks(&self, next: &UserStats, level: u32, xp: u64) -> Vec<NewUnlock> {
        self.catalog
            .simulations
            .iter()
            .filter(|s| !next.completed_simulations.contains(&s.id))
            .filter(|s| {
                self.engine
                    .check_simulation_unlock(
                        &s.id,
                        level,
                        xp,
                        &next.completed_simulations,
                        &next.earned_badges,
                    )
                    .unlocked
            })
            .map(|s| NewUnlock {
                simulation_id: s.id.clone(),
                simulation_name: s.name.clone(),
                xp_reward: s.xp_reward,
                message: format!("🎉 {} is now unlocked!", s.name),
            })
            .collect()
    }

    /// Apply the streak transition to `next`
    ///
    /// Milestone rewards are only granted when the streak value changed, so
    /// repeat activity on a milestone day pays out once.
    fn advance_streak(&self, next: &mut UserStats, now: DateTime<FixedOffset>) -> StreakUpdate {
        let check = self.tracker.calculate_streak(next.last_activity_date, now);
        let previous_streak = next.current_streak;
        let (current, longest) =
            self.tracker
                .apply_streak(&check, previous_streak, next.longest_streak);
        next.current_streak = current;
        next.longest_streak = longest;

        let milestone_rewards = if current != previous_streak {
            self.tracker.get_streak_milestone_rewards(current)
        } else {
            Vec::new()
        };

        StreakUpdate {
            signal: check.signal,
            streak_broken: check.streak_broken,
            days_since_last: check.days_since_last,
            previous_streak,
            current_streak: current,
            longest_streak: longest,
            milestone_rewards,
        }
    }

    fn settle(&self, next: &mut UserStats, xp: u64, now: DateTime<FixedOffset>) {
        next.total_xp = xp;
        next.current_level = self.tracker.get_level_from_xp(xp);
        next.last_activity_date = Some(now);
    }

    fn zero_effect(&self, stats: &UserStats, action: &str, message: String) -> GamificationUpdate {
        GamificationUpdate {
            xp_earned: XpReward::unknown(action),
            level_up: None,
            badges_earned: Vec::new(),
            achievements_unlocked: Vec::new(),
            new_unlocks: Vec::new(),
            streak_update: StreakUpdate::unchanged(stats),
            bonus_xp: 0,
            updated_snapshot: self.tracker.create_progress_snapshot(stats),
            patch: StatsPatch::empty(stats),
            message,
        }
    }

    // =============================
    // Read Models
    // =============================

    pub fn get_user_dashboard(&self, stats: &UserStats) -> DashboardView {
        let now = self.clock.now();
        let snapshot = self.tracker.create_progress_snapshot(stats);
        let level = snapshot.current_level;
        let view = UserSnapshot::of(stats, stats.total_xp, level, now);

        let completed = &stats.completed_simulations;
        let earned = &stats.earned_badges;

        let locked = self
            .engine
            .get_locked_simulations(level, stats.total_xp, completed, earned)
            .into_iter()
            .map(|item| LockedEntry {
                simulation: item.simulation,
                unlock_message: item.status.unlock_message,
            })
            .collect();

        DashboardView {
            user_id: stats.user_id,
            progress: DashboardProgress {
                level,
                level_name: snapshot.level_name,
                current_xp: snapshot.current_xp,
                xp_to_next_level: snapshot.xp_to_next_level,
                progress_percentage: snapshot.progress_percentage,
                next_level: snapshot.next_level_info,
            },
            stats: DashboardStats {
                simulations_completed: snapshot.total_simulations_completed,
                badges_earned: snapshot.total_badges_earned,
                current_streak: snapshot.current_streak,
                longest_streak: snapshot.longest_streak,
                completion_percentage: self.engine.calculate_completion_percentage(completed),
            },
            badges: DashboardBadges {
                collection_stats: self.badges.get_badge_collection_stats(earned),
                next_to_earn: self.badges.get_next_badges_to_earn(&view, NEXT_BADGES_LIMIT),
            },
            simulations: DashboardSimulations {
                unlocked: self
                    .engine
                    .get_unlocked_simulations(level, stats.total_xp, completed, earned),
                locked,
                learning_path: self.engine.get_learning_path(completed),
            },
            next_unlock: self.engine.get_next_unlock_recommendation(
                level,
                stats.total_xp,
                completed,
                earned,
            ),
            recommendations: self.tracker.get_recommended_next_steps(level, completed),
            last_activity: stats.last_activity_date,
        }
    }

    pub fn get_leaderboard_stats(&self, stats: &UserStats) -> LeaderboardRow {
        let level = self.tracker.get_level_from_xp(stats.total_xp);
        let info = self.tracker.get_level_info(level);

        LeaderboardRow {
            user_id: stats.user_id,
            total_xp: stats.total_xp,
            level,
            level_name: info.map(|i| i.name.clone()).unwrap_or_default(),
            level_icon: info.map(|i| i.icon.clone()).unwrap_or_default(),
            simulations_completed: stats.completed_simulations.len(),
            badges_earned: stats.earned_badges.len(),
            current_streak: stats.current_streak,
            longest_streak: stats.longest_streak,
            completion_percentage: self
                .engine
                .calculate_completion_percentage(&stats.completed_simulations),
        }
    }

    /// Run a fresh user through `simulation_ids` in order
    pub fn simulate_user_journey(&self, simulation_ids: &[&str]) -> Result<JourneySummary> {
        let mut stats = self.create_user_stats(Uuid::new_v4());
        let mut journey = Vec::with_capacity(simulation_ids.len());

        for simulation_id in simulation_ids {
            let update = self.process_simulation_completion(&mut stats, simulation_id, false, false)?;

            journey.push(JourneyStep {
                simulation: simulation_id.to_string(),
                xp_earned: update.xp_earned.total_xp,
                total_xp: stats.total_xp,
                level: stats.current_level,
                badges_earned: update
                    .badges_earned
                    .iter()
                    .map(|award| award.badge.name.clone())
                    .collect(),
                leveled_up: update.level_up.is_some(),
            });
        }

        Ok(JourneySummary {
            journey,
            final_stats: JourneyTotals {
                total_xp: stats.total_xp,
                level: stats.current_level,
                simulations_completed: stats.completed_simulations.len(),
                badges_earned: stats.earned_badges.len(),
            },
        })
    }
}

fn require_id(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(GamificationError::InvalidInput(format!(
            "{} must not be empty",
            field
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn noon() -> DateTime<FixedOffset> {
        FixedOffset::east_opt(2 * 3600)
            .unwrap()
            .with_ymd_and_hms(2024, 4, 10, 12, 0, 0)
            .unwrap()
    }

    fn service_at(now: DateTime<FixedOffset>) -> GamificationService {
        GamificationService::with_clock(Arc::new(Catalog::builtin()), Arc::new(FixedClock(now)))
    }

    fn badge_ids(update: &GamificationUpdate) -> Vec<&str> {
        update
            .badges_earned
            .iter()
            .map(|a| a.badge.id.as_str())
            .collect()
    }

    #[test]
    fn test_new_user_first_completion() {
        let service = service_at(noon());
        let mut stats = service.create_user_stats(Uuid::new_v4());

        let update = service
            .process_simulation_completion(&mut stats, "coffee_shop_effect", false, false)
            .unwrap();

        assert_eq!(update.xp_earned.total_xp, 100);
        assert!(update.level_up.is_none());
        assert_eq!(badge_ids(&update), vec!["first_steps", "coffee_conscious"]);
        assert!(update.achievements_unlocked.is_empty());
        assert_eq!(update.bonus_xp, 0);

        let unlocks: Vec<&str> = update
            .new_unlocks
            .iter()
            .map(|u| u.simulation_id.as_str())
            .collect();
        assert_eq!(unlocks, vec!["paycheck_game"]);

        assert_eq!(update.streak_update.current_streak, 1);
        assert!(update.streak_update.streak_broken);

        assert_eq!(stats.total_xp, 100);
        assert_eq!(stats.current_level, 1);
        assert_eq!(stats.current_streak, 1);
        assert_eq!(stats.longest_streak, 1);
        assert_eq!(stats.last_activity_date, Some(noon()));
        assert_eq!(stats.completion_log.len(), 1);
        assert_eq!(stats.revision, 1);
        assert_eq!(update.updated_snapshot.current_xp, 100);
        assert_eq!(update.message, "Completed The Coffee Shop Effect: +100 XP");
    }

    #[test]
    fn test_duplicate_completion_does_not_reaward_badges() {
        let service = service_at(noon());
        let mut stats = service.create_user_stats(Uuid::new_v4());

        service
            .process_simulation_completion(&mut stats, "coffee_shop_effect", false, false)
            .unwrap();
        let second = service
            .process_simulation_completion(&mut stats, "coffee_shop_effect", false, false)
            .unwrap();

        assert!(second.badges_earned.is_empty());
        assert_eq!(stats.earned_badges.len(), 2);
        assert_eq!(stats.completed_simulations.len(), 1);
        assert_eq!(second.streak_update.signal, StreakSignal::Unchanged);
    }

    #[test]
    fn test_evaluate_is_pure_and_stale_patch_rejected() {
        let service = service_at(noon());
        let mut stats = service.create_user_stats(Uuid::new_v4());
        let original = stats.clone();

        let first = service
            .evaluate_simulation_completion(&stats, "coffee_shop_effect", false, false)
            .unwrap();
        let second = service
            .evaluate_activity(&stats, "daily_login", 1.0)
            .unwrap();
        assert_eq!(stats, original);

        first.patch.apply(&mut stats).unwrap();
        let err = second.patch.apply(&mut stats).unwrap_err();
        assert!(matches!(err, GamificationError::StalePatch { .. }));
        assert_eq!(stats.total_xp, 100);
    }

    #[test]
    fn test_sim_xp_level_up_reported() {
        let service = service_at(noon());
        let mut stats = service.create_user_stats(Uuid::new_v4());
        stats.total_xp = 950;

        let update = service
            .process_simulation_completion(&mut stats, "coffee_shop_effect", false, false)
            .unwrap();

        let level_up = update.level_up.unwrap();
        assert_eq!((level_up.old_level, level_up.new_level), (1, 2));
        assert!(level_up.celebration_message.unwrap().contains("no longer a newbie"));
        assert_eq!(stats.current_level, 2);
    }

    #[test]
    fn test_achievement_xp_level_up_not_reported() {
        let service = service_at(noon());
        let mut stats = service.create_user_stats(Uuid::new_v4());
        stats.total_xp = 600;
        stats.perfect_score_simulations.insert("a".into());
        stats.perfect_score_simulations.insert("b".into());

        let update = service
            .process_simulation_completion(&mut stats, "coffee_shop_effect", true, false)
            .unwrap();

        // 100 * 1.5 keeps us at level 1; perfectionist's 400 crosses 1000
        assert_eq!(update.xp_earned.total_xp, 150);
        assert!(update.level_up.is_none());
        assert_eq!(update.achievements_unlocked[0].id, "perfectionist");
        assert_eq!(update.bonus_xp, 400);
        assert_eq!(stats.total_xp, 1150);
        assert_eq!(stats.current_level, 2);

        // perfectionist's reward badge was already earned by the badge pass
        assert_eq!(
            badge_ids(&update),
            vec!["first_steps", "coffee_conscious", "perfect_score"]
        );
    }

    #[test]
    fn test_reward_badge_granted_by_achievement() {
        let mut catalog = Catalog::builtin();
        for badge in catalog.badges.iter_mut().filter(|b| b.id == "perfect_score") {
            badge.unlock_condition = "reach_level_6".into();
        }
        let service =
            GamificationService::with_clock(Arc::new(catalog), Arc::new(FixedClock(noon())));
        let mut stats = service.create_user_stats(Uuid::new_v4());
        stats.perfect_score_simulations.insert("a".into());
        stats.perfect_score_simulations.insert("b".into());

        let update = service
            .process_simulation_completion(&mut stats, "paycheck_game", true, false)
            .unwrap();

        assert_eq!(update.achievements_unlocked[0].id, "perfectionist");
        assert_eq!(
            badge_ids(&update),
            vec!["first_steps", "paycheck_pro", "perfect_score"]
        );
        assert!(stats.earned_badges.contains("perfect_score"));
        assert_eq!(stats.total_xp, 300 + 400);
    }

    #[test]
    fn test_streak_milestone_bonus() {
        let now = noon();
        let service = service_at(now);
        let mut stats = service.create_user_stats(Uuid::new_v4());
        stats.current_streak = 2;
        stats.longest_streak = 2;
        stats.last_activity_date = Some(now - Duration::days(1));

        let update = service
            .process_activity(&mut stats, "daily_login", 1.0)
            .unwrap();

        assert_eq!(update.xp_earned.total_xp, 10);
        assert_eq!(update.streak_update.signal, StreakSignal::Increment);
        assert_eq!(update.streak_update.milestone_rewards.len(), 1);
        assert_eq!(update.bonus_xp, 50);
        assert_eq!(stats.total_xp, 60);
        assert_eq!(stats.current_streak, 3);
        assert_eq!(stats.longest_streak, 3);

        // second login the same day: no second payout
        let again = service
            .process_activity(&mut stats, "daily_login", 1.0)
            .unwrap();
        assert!(again.streak_update.milestone_rewards.is_empty());
        assert_eq!(stats.total_xp, 60 + 11);
    }

    #[test]
    fn test_milestone_xp_lands_after_unlock_scan() {
        let now = noon();
        let service = service_at(now);
        let mut stats = service.create_user_stats(Uuid::new_v4());
        stats.total_xp = 850;
        stats.completed_simulations.insert("paycheck_game".into());
        stats.current_streak = 2;
        stats.longest_streak = 2;
        stats.last_activity_date = Some(now - Duration::days(1));

        let update = service
            .process_simulation_completion(&mut stats, "coffee_shop_effect", false, false)
            .unwrap();

        // 850 + 100 stays in level 1; the 3-day milestone's 50 reaches 1000
        assert_eq!(update.xp_earned.total_xp, 100);
        assert_eq!(update.bonus_xp, 50);
        assert_eq!(stats.total_xp, 1000);
        assert_eq!(stats.current_level, 2);
        assert!(update.level_up.is_none());
        assert!(update.new_unlocks.is_empty());

        // the level 2 simulation shows up on the next scan
        let next = service
            .process_simulation_completion(&mut stats, "coffee_shop_effect", false, false)
            .unwrap();
        assert!(next
            .new_unlocks
            .iter()
            .any(|u| u.simulation_id == "budget_builder"));
    }

    #[test]
    fn test_activity_counters_feed_achievements() {
        let service = service_at(noon());
        let mut stats = service.create_user_stats(Uuid::new_v4());
        stats.ai_questions_asked = 49;

        let update = service
            .process_activity(&mut stats, "ai_tutor_question", 1.0)
            .unwrap();

        assert_eq!(stats.ai_questions_asked, 50);
        assert_eq!(update.achievements_unlocked[0].id, "tutor_enthusiast");
        assert_eq!(stats.total_xp, 20 + 250);
        assert!(stats.earned_achievements.contains("tutor_enthusiast"));
        assert!(update.new_unlocks.is_empty());

        service.process_activity(&mut stats, "goal_completed", 1.0).unwrap();
        assert_eq!(stats.goals_completed, 1);
    }

    #[test]
    fn test_custom_multiplier() {
        let service = service_at(noon());
        let mut stats = service.create_user_stats(Uuid::new_v4());

        let update = service
            .process_activity(&mut stats, "budget_created", 2.0)
            .unwrap();
        assert_eq!(update.xp_earned.total_xp, 200);

        let update = service
            .evaluate_activity(&stats, "budget_created", MAX_CUSTOM_MULTIPLIER)
            .unwrap();
        assert_eq!(update.xp_earned.total_xp, 1000);

        for bad in [-1.0, f64::NAN, f64::INFINITY, MAX_CUSTOM_MULTIPLIER + 0.5, 1e300] {
            let err = service.evaluate_activity(&stats, "daily_login", bad).unwrap_err();
            assert!(matches!(err, GamificationError::InvalidInput(_)));
        }
    }

    #[test]
    fn test_xp_saturates_at_ceiling() {
        let service = service_at(noon());
        let mut stats = service.create_user_stats(Uuid::new_v4());
        stats.total_xp = u64::MAX - 5;

        let update = service
            .process_activity(&mut stats, "daily_login", 1.0)
            .unwrap();
        assert_eq!(stats.total_xp, u64::MAX);
        assert_eq!(update.message, "daily_login: +5 XP");

        service
            .process_simulation_completion(&mut stats, "coffee_shop_effect", true, true)
            .unwrap();
        service
            .process_activity(&mut stats, "daily_login", 1.0)
            .unwrap();
        assert_eq!(stats.total_xp, u64::MAX);
        assert_eq!(stats.current_level, 6);
    }

    #[test]
    fn test_unknown_ids_are_zero_effect() {
        let service = service_at(noon());
        let mut stats = service.create_user_stats(Uuid::new_v4());

        let update = service
            .process_simulation_completion(&mut stats, "time_travel", false, false)
            .unwrap();
        assert!(update.is_noop());
        assert_eq!(update.xp_earned.reason, "Unknown action");
        assert_eq!(update.message, "Simulation not found: time_travel");

        let update = service.process_activity(&mut stats, "juggling", 1.0).unwrap();
        assert!(update.is_noop());

        assert_eq!(stats, service.create_user_stats(stats.user_id));

        let err = service
            .process_simulation_completion(&mut stats, "  ", false, false)
            .unwrap_err();
        assert!(matches!(err, GamificationError::InvalidInput(_)));
    }

    #[test]
    fn test_early_completion_unlocks_hidden_achievement() {
        let dawn = FixedOffset::west_opt(5 * 3600)
            .unwrap()
            .with_ymd_and_hms(2024, 4, 10, 6, 15, 0)
            .unwrap();
        let service = service_at(dawn);
        let mut stats = service.create_user_stats(Uuid::new_v4());

        let update = service
            .process_simulation_completion(&mut stats, "coffee_shop_effect", false, false)
            .unwrap();

        assert_eq!(update.achievements_unlocked.len(), 1);
        assert_eq!(update.achievements_unlocked[0].id, "early_bird");
        assert_eq!(stats.total_xp, 200);
    }

    #[test]
    fn test_dashboard_for_new_user() {
        let service = service_at(noon());
        let stats = service.create_user_stats(Uuid::new_v4());

        let dashboard = service.get_user_dashboard(&stats);
        assert_eq!(dashboard.progress.level, 1);
        assert_eq!(dashboard.progress.level_name, "Financial Newbie");
        assert_eq!(dashboard.progress.xp_to_next_level, 1000);
        assert_eq!(dashboard.simulations.unlocked.len(), 2);
        assert_eq!(dashboard.simulations.locked.len(), 10);
        assert_eq!(dashboard.simulations.learning_path.len(), 12);
        assert_eq!(dashboard.badges.next_to_earn.len(), 3);
        assert_eq!(dashboard.badges.collection_stats.earned_badges, 0);
        assert_eq!(dashboard.recommendations[0].simulation_id, "coffee_shop_effect");
        assert_eq!(
            dashboard.next_unlock.unwrap().simulation.id,
            "budget_builder"
        );
        assert!(dashboard.last_activity.is_none());
        assert!(dashboard.simulations.locked[0]
            .unlock_message
            .as_deref()
            .unwrap()
            .starts_with("🔒"));
    }

    #[test]
    fn test_leaderboard_row() {
        let service = service_at(noon());
        let mut stats = service.create_user_stats(Uuid::new_v4());
        service
            .process_simulation_completion(&mut stats, "paycheck_game", false, false)
            .unwrap();

        let row = service.get_leaderboard_stats(&stats);
        assert_eq!(row.total_xp, 200);
        assert_eq!(row.level_name, "Financial Newbie");
        assert_eq!(row.level_icon, "🌱");
        assert_eq!(row.badges_earned, 2);
        assert!((row.completion_percentage - 100.0 / 12.0).abs() < 1e-9);
    }

    #[test]
    fn test_simulate_user_journey() {
        let service = service_at(noon());
        let summary = service
            .simulate_user_journey(&["coffee_shop_effect", "paycheck_game"])
            .unwrap();

        assert_eq!(summary.journey.len(), 2);
        assert_eq!(
            summary.journey[0].badges_earned,
            vec!["First Steps".to_string(), "Coffee Conscious".to_string()]
        );
        assert_eq!(summary.journey[1].total_xp, 300);
        assert_eq!(summary.journey[1].badges_earned, vec!["Paycheck Pro".to_string()]);
        assert_eq!(
            summary.final_stats,
            JourneyTotals {
                total_xp: 300,
                level: 1,
                simulations_completed: 2,
                badges_earned: 3,
            }
        );
    }
}

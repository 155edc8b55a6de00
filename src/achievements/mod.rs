//! Achievement & unlock engine
//!
//! Simulations form a prerequisite DAG gated by typed unlock conditions.
//! Achievements are one-time rewards resolved through the condition registry.

use crate::catalog::Catalog;
use crate::conditions::UserSnapshot;
use crate::models::{Achievement, Simulation, UnlockRequirement};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RequirementProgress {
    Level { required: u32, current: u32 },
    Xp { required: u64, current: u64 },
    Simulation { required: String },
    Badge { required: String },
    Prerequisite { required: String },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConditionProgress {
    #[serde(flatten)]
    pub requirement: RequirementProgress,
    pub met: bool,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UnlockStatus {
    pub content_id: String,
    pub unlocked: bool,
    pub unlock_progress: Vec<ConditionProgress>,
    pub unlock_message: Option<String>,
}

impl UnlockStatus {
    pub fn unmet(&self) -> impl Iterator<Item = &ConditionProgress> {
        self.unlock_progress.iter().filter(|p| !p.met)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LockedSimulation {
    pub simulation: Simulation,
    pub status: UnlockStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UnlockRecommendation {
    pub simulation: Simulation,
    pub missing_requirement: Option<ConditionProgress>,
    pub recommendation: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LearningPathStep {
    pub simulation: Simulation,
    pub completed: bool,
    pub order: usize,
}

#[derive(Debug, Clone)]
pub struct AchievementEngine {
    catalog: Arc<Catalog>,
}

impl AchievementEngine {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self { catalog }
    }

    /// Unlock status of one simulation
    ///
    /// Every condition and prerequisite is evaluated so the progress list
    /// shows everything still missing, not just the first gap.
    pub fn check_simulation_unlock(
        &self,
        simulation_id: &str,
        user_level: u32,
        user_xp: u64,
        completed: &BTreeSet<String>,
        earned_badges: &BTreeSet<String>,
    ) -> UnlockStatus {
        let Some(simulation) = self.catalog.simulation(simulation_id) else {
            return UnlockStatus {
                content_id: simulation_id.to_string(),
                unlocked: false,
                unlock_progress: Vec::new(),
                unlock_message: Some("Simulation not found".to_string()),
            };
        };

        let mut unlocked = true;
        let mut progress = Vec::with_capacity(
            simulation.unlock_conditions.len() + simulation.prerequisites.len(),
        );

        for condition in &simulation.unlock_conditions {
            let (requirement, met) = match &condition.requirement {
                UnlockRequirement::Always => continue,
                UnlockRequirement::Level { level } => (
                    RequirementProgress::Level {
                        required: *level,
                        current: user_level,
                    },
                    user_level >= *level,
                ),
                UnlockRequirement::Xp { xp } => (
                    RequirementProgress::Xp {
                        required: *xp,
                        current: user_xp,
                    },
                    user_xp >= *xp,
                ),
                UnlockRequirement::Simulation { simulation_id } => (
                    RequirementProgress::Simulation {
                        required: simulation_id.clone(),
                    },
                    completed.contains(simulation_id),
                ),
                UnlockRequirement::Badge { badge_id } => (
                    RequirementProgress::Badge {
                        required: badge_id.clone(),
                    },
                    earned_badges.contains(badge_id),
                ),
            };

            unlocked &= met;
            progress.push(ConditionProgress {
                requirement,
                met,
                description: condition.description.clone(),
            });
        }

        for prerequisite in &simulation.prerequisites {
            if completed.contains(prerequisite) {
                continue;
            }
            unlocked = false;
            progress.push(ConditionProgress {
                requirement: RequirementProgress::Prerequisite {
                    required: prerequisite.clone(),
                },
                met: false,
                description: format!("Complete {} first", self.simulation_name(prerequisite)),
            });
        }

        let unlock_message = if unlocked {
            Some(format!("✅ {} is unlocked!", simulation.name))
        } else {
            progress
                .iter()
                .find(|p| !p.met)
                .map(|p| format!("🔒 {}", p.description))
        };

        UnlockStatus {
            content_id: simulation_id.to_string(),
            unlocked,
            unlock_progress: progress,
            unlock_message,
        }
    }

    pub fn get_unlocked_simulations(
        &self,
        user_level: u32,
        user_xp: u64,
        completed: &BTreeSet<String>,
        earned_badges: &BTreeSet<String>,
    ) -> Vec<Simulation> {
        self.catalog
            .simulations
            .iter()
            .filter(|s| {
                self.check_simulation_unlock(&s.id, user_level, user_xp, completed, earned_badges)
                    .unlocked
            })
            .cloned()
            .collect()
    }

    pub fn get_locked_simulations(
        &self,
        user_level: u32,
        user_xp: u64,
        completed: &BTreeSet<String>,
        earned_badges: &BTreeSet<String>,
    ) -> Vec<LockedSimulation> {
        self.catalog
            .simulations
            .iter()
            .filter_map(|s| {
                let status =
                    self.check_simulation_unlock(&s.id, user_level, user_xp, completed, earned_badges);
                (!status.unlocked).then(|| LockedSimulation {
                    simulation: s.clone(),
                    status,
                })
            })
            .collect()
    }

    /// First locked simulation that is one requirement away, else a generic nudge
    pub fn get_next_unlock_recommendation(
        &self,
        user_level: u32,
        user_xp: u64,
        completed: &BTreeSet<String>,
        earned_badges: &BTreeSet<String>,
    ) -> Option<UnlockRecommendation> {
        let locked = self.get_locked_simulations(user_level, user_xp, completed, earned_badges);

        for item in &locked {
            let mut unmet = item.status.unmet();
            if let (Some(only), None) = (unmet.next(), unmet.next()) {
                return Some(UnlockRecommendation {
                    simulation: item.simulation.clone(),
                    missing_requirement: Some(only.clone()),
                    recommendation: self.unlock_hint(only, user_xp),
                });
            }
        }

        locked.into_iter().next().map(|item| UnlockRecommendation {
            recommendation: format!(
                "Keep earning XP to reach Level {}!",
                item.simulation.level
            ),
            simulation: item.simulation,
            missing_requirement: None,
        })
    }

    fn unlock_hint(&self, requirement: &ConditionProgress, user_xp: u64) -> String {
        match &requirement.requirement {
            RequirementProgress::Level { required, .. } => {
                let threshold = self
                    .catalog
                    .level(*required)
                    .map(|info| info.xp_required)
                    .unwrap_or(0);
                format!(
                    "Earn {} more XP to reach Level {}",
                    threshold.saturating_sub(user_xp),
                    required
                )
            }
            RequirementProgress::Xp { required, current } => {
                format!("Earn {} more XP to unlock", required.saturating_sub(*current))
            }
            RequirementProgress::Simulation { required }
            | RequirementProgress::Prerequisite { required } => {
                format!("Complete '{}' first", self.simulation_name(required))
            }
            RequirementProgress::Badge { required } => {
                let name = self
                    .catalog
                    .badge(required)
                    .map(|b| b.name.as_str())
                    .unwrap_or(required.as_str());
                format!("Earn the '{}' badge", name)
            }
        }
    }

    /// Achievements newly satisfied by `snapshot`, in catalog order
    pub fn check_achievements(&self, snapshot: &UserSnapshot<'_>) -> Vec<Achievement> {
        let unlocked: Vec<Achievement> = self
            .catalog
            .achievements
            .iter()
            .filter(|a| !snapshot.earned_achievements.contains(&a.id))
            .filter(|a| self.catalog.conditions.evaluate(&a.unlock_condition, snapshot))
            .cloned()
            .collect();

        debug!(count = unlocked.len(), "Achievement check completed");
        unlocked
    }

    pub fn get_simulation_by_id(&self, simulation_id: &str) -> Option<&Simulation> {
        self.catalog.simulation(simulation_id)
    }

    pub fn get_all_simulations(&self) -> &[Simulation] {
        &self.catalog.simulations
    }

    pub fn get_simulations_by_level(&self, level: u32) -> Vec<&Simulation> {
        self.catalog
            .simulations
            .iter()
            .filter(|s| s.level == level)
            .collect()
    }

    pub fn get_all_achievements(&self) -> &[Achievement] {
        &self.catalog.achievements
    }

    pub fn get_learning_path(&self, completed: &BTreeSet<String>) -> Vec<LearningPathStep> {
        self.catalog
            .learning_path
            .iter()
            .filter_map(|id| self.catalog.simulation(id))
            .enumerate()
            .map(|(i, simulation)| LearningPathStep {
                completed: completed.contains(&simulation.id),
                simulation: simulation.clone(),
                order: i + 1,
            })
            .collect()
    }

    /// Share of catalog simulations completed; unknown ids are ignored
    pub fn calculate_completion_percentage(&self, completed: &BTreeSet<String>) -> f64 {
        let total = self.catalog.simulations.len();
        if total == 0 {
            return 0.0;
        }
        let done = completed
            .iter()
            .filter(|id| self.catalog.simulation(id).is_some())
            .count();
        done as f64 / total as f64 * 100.0
    }

    fn simulation_name<'a>(&'a self, id: &'a str) -> &'a str {
        self.catalog
            .simulation(id)
            .map(|s| s.name.as_str())
            .unwrap_or(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CompletionEvent, UnlockCondition, UserStats};
    use chrono::{DateTime, FixedOffset, TimeZone};
    use uuid::Uuid;

    fn engine() -> AchievementEngine {
        AchievementEngine::new(Arc::new(Catalog::builtin()))
    }

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn now() -> DateTime<FixedOffset> {
        FixedOffset::east_opt(3600)
            .unwrap()
            .with_ymd_and_hms(2024, 2, 2, 15, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_always_unlocked_simulation() {
        let status = engine().check_simulation_unlock(
            "coffee_shop_effect",
            1,
            0,
            &BTreeSet::new(),
            &BTreeSet::new(),
        );
        assert!(status.unlocked);
        assert!(status.unlock_progress.is_empty());
        assert_eq!(
            status.unlock_message.as_deref(),
            Some("✅ The Coffee Shop Effect is unlocked!")
        );
    }

    #[test]
    fn test_level_and_prerequisite_gating() {
        let engine = engine();
        let none = BTreeSet::new();

        // level 3 clears the level-2 gate but the prerequisite is missing
        let status = engine.check_simulation_unlock("budget_builder", 3, 3500, &none, &none);
        assert!(!status.unlocked);
        assert_eq!(status.unlock_progress.len(), 2);
        assert!(status.unlock_progress[0].met);
        assert_eq!(
            status.unlock_progress[1].requirement,
            RequirementProgress::Prerequisite {
                required: "paycheck_game".into()
            }
        );
        assert_eq!(
            status.unlock_message.as_deref(),
            Some("🔒 Complete The Paycheck Game first")
        );

        let done = set(&["paycheck_game"]);
        let status = engine.check_simulation_unlock("budget_builder", 1, 500, &done, &none);
        assert!(!status.unlocked);

        let status = engine.check_simulation_unlock("budget_builder", 3, 3500, &done, &none);
        assert!(status.unlocked);
    }

    #[test]
    fn test_all_conditions_reported() {
        let status = engine().check_simulation_unlock(
            "sarah_journey",
            1,
            0,
            &BTreeSet::new(),
            &BTreeSet::new(),
        );
        // level, xp, and two prerequisites
        assert_eq!(status.unmet().count(), 4);
    }

    #[test]
    fn test_unknown_simulation() {
        let status = engine().check_simulation_unlock(
            "nope",
            6,
            99_999,
            &BTreeSet::new(),
            &BTreeSet::new(),
        );
        assert!(!status.unlocked);
        assert_eq!(status.unlock_message.as_deref(), Some("Simulation not found"));
    }

    #[test]
    fn test_badge_requirement() {
        let mut catalog = Catalog::builtin();
        catalog.simulations[1]
            .unlock_conditions
            .push(UnlockCondition::badge("coffee_conscious", "Earn Coffee Conscious"));
        let engine = AchievementEngine::new(Arc::new(catalog));
        let none = BTreeSet::new();

        let status = engine.check_simulation_unlock("paycheck_game", 1, 0, &none, &none);
        assert!(!status.unlocked);

        let rec = engine
            .get_next_unlock_recommendation(1, 0, &none, &none)
            .unwrap();
        assert_eq!(rec.simulation.id, "paycheck_game");
        assert_eq!(rec.recommendation, "Earn the 'Coffee Conscious' badge");

        let status = engine.check_simulation_unlock(
            "paycheck_game",
            1,
            0,
            &none,
            &set(&["coffee_conscious"]),
        );
        assert!(status.unlocked);
    }

    #[test]
    fn test_recommendation_one_condition_away() {
        let engine = engine();
        let completed = set(&["coffee_shop_effect", "paycheck_game"]);

        let rec = engine
            .get_next_unlock_recommendation(1, 300, &completed, &BTreeSet::new())
            .unwrap();
        assert_eq!(rec.simulation.id, "budget_builder");
        assert_eq!(rec.recommendation, "Earn 700 more XP to reach Level 2");
        assert!(matches!(
            rec.missing_requirement.unwrap().requirement,
            RequirementProgress::Level { required: 2, current: 1 }
        ));
    }

    #[test]
    fn test_recommendation_fallback() {
        let rec = engine()
            .get_next_unlock_recommendation(1, 0, &BTreeSet::new(), &BTreeSet::new())
            .unwrap();
        assert_eq!(rec.simulation.id, "budget_builder");
        assert!(rec.missing_requirement.is_none());
        assert_eq!(rec.recommendation, "Keep earning XP to reach Level 2!");
    }

    #[test]
    fn test_nothing_locked_means_no_recommendation() {
        let engine = engine();
        let everything: BTreeSet<String> = engine
            .get_all_simulations()
            .iter()
            .map(|s| s.id.clone())
            .collect();
        assert!(engine
            .get_next_unlock_recommendation(6, 30_000, &everything, &BTreeSet::new())
            .is_none());
    }

    #[test]
    fn test_counter_achievements() {
        let engine = engine();
        let mut stats = UserStats::new(Uuid::new_v4(), 1);
        stats.perfect_score_simulations = set(&["a", "b", "c"]);
        stats.ai_questions_asked = 50;
        stats.goals_completed = 4;

        let unlocked = engine.check_achievements(&UserSnapshot::of(&stats, 0, 1, now()));
        let ids: Vec<&str> = unlocked.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["perfectionist", "tutor_enthusiast"]);

        stats.earned_achievements = set(&["perfectionist", "tutor_enthusiast"]);
        stats.goals_completed = 5;
        let unlocked = engine.check_achievements(&UserSnapshot::of(&stats, 0, 1, now()));
        assert_eq!(unlocked.len(), 1);
        assert_eq!(unlocked[0].id, "goal_getter");
    }

    #[test]
    fn test_time_based_achievements_read_completion_log() {
        let engine = engine();
        let mut stats = UserStats::new(Uuid::new_v4(), 1);
        let offset = FixedOffset::east_opt(3600).unwrap();
        stats.record_completion(CompletionEvent {
            simulation_id: "coffee_shop_effect".into(),
            completed_at: offset.with_ymd_and_hms(2024, 2, 2, 6, 30, 0).unwrap(),
        });

        let unlocked = engine.check_achievements(&UserSnapshot::of(&stats, 0, 1, now()));
        let ids: Vec<&str> = unlocked.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["early_bird"]);
        assert!(unlocked[0].hidden);
    }

    #[test]
    fn test_learning_path_and_completion() {
        let engine = engine();
        let completed = set(&["coffee_shop_effect", "paycheck_game", "unknown"]);

        let path = engine.get_learning_path(&completed);
        assert_eq!(path.len(), 12);
        assert_eq!(path[0].order, 1);
        assert!(path[0].completed && path[1].completed && !path[2].completed);
        assert_eq!(path[11].simulation.id, "sarah_journey");

        let pct = engine.calculate_completion_percentage(&completed);
        assert!((pct - 2.0 / 12.0 * 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_unlocked_and_locked_partition() {
        let engine = engine();
        let none = BTreeSet::new();
        let unlocked = engine.get_unlocked_simulations(1, 0, &none, &none);
        let locked = engine.get_locked_simulations(1, 0, &none, &none);

        assert_eq!(unlocked.len(), 2);
        assert_eq!(unlocked.len() + locked.len(), 12);
        assert_eq!(engine.get_simulations_by_level(4).len(), 3);
    }
}

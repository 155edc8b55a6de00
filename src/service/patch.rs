//! Explicit state diffs produced by the pipelines
//!
//! A patch is computed against one revision of one user's aggregate and can
//! only be applied there. Set fields are additive; scalar fields replace.

use crate::error::{GamificationError, Result};
use crate::models::{CompletionEvent, UserStats};
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StatsPatch {
    pub user_id: Uuid,
    pub base_revision: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_xp: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_level: Option<u32>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub completed_simulations: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub perfect_score_simulations: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub earned_badges: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub earned_achievements: BTreeSet<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_streak: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub longest_streak: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_activity_date: Option<DateTime<FixedOffset>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ai_questions_asked: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub goals_completed: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completion: Option<CompletionEvent>,
}

impl StatsPatch {
    /// No-op patch bound to the current revision of `stats`
    pub fn empty(stats: &UserStats) -> Self {
        Self {
            user_id: stats.user_id,
            base_revision: stats.revision,
            ..Default::default()
        }
    }

    /// Diff from `before` to `after`, ignoring the completion log
    pub fn between(before: &UserStats, after: &UserStats) -> Self {
        fn changed<T: PartialEq + Copy>(old: T, new: T) -> Option<T> {
            (old != new).then_some(new)
        }
        fn added(old: &BTreeSet<String>, new: &BTreeSet<String>) -> BTreeSet<String> {
            new.difference(old).cloned().collect()
        }

        Self {
            user_id: before.user_id,
            base_revision: before.revision,
            total_xp: changed(before.total_xp, after.total_xp),
            current_level: changed(before.current_level, after.current_level),
            completed_simulations: added(&before.completed_simulations, &after.completed_simulations),
            perfect_score_simulations: added(
                &before.perfect_score_simulations,
                &after.perfect_score_simulations,
            ),
            earned_badges: added(&before.earned_badges, &after.earned_badges),
            earned_achievements: added(&before.earned_achievements, &after.earned_achievements),
            current_streak: changed(before.current_streak, after.current_streak),
            longest_streak: changed(before.longest_streak, after.longest_streak),
            last_activity_date: changed(before.last_activity_date, after.last_activity_date)
                .flatten(),
            ai_questions_asked: changed(before.ai_questions_asked, after.ai_questions_asked),
            goals_completed: changed(before.goals_completed, after.goals_completed),
            completion: None,
        }
    }

    pub fn with_completion(mut self, event: CompletionEvent) -> Self {
        self.completion = Some(event);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.total_xp.is_none()
            && self.current_level.is_none()
            && self.completed_simulations.is_empty()
            && self.perfect_score_simulations.is_empty()
            && self.earned_badges.is_empty()
            && self.earned_achievements.is_empty()
            && self.current_streak.is_none()
            && self.longest_streak.is_none()
            && self.last_activity_date.is_none()
            && self.ai_questions_asked.is_none()
            && self.goals_completed.is_none()
            && self.completion.is_none()
    }

    /// Apply to `stats`, bumping its revision
    ///
    /// Fails without touching `stats` if it belongs to another user or has
    /// moved past `base_revision`. An empty patch leaves the revision alone.
    pub fn apply(&self, stats: &mut UserStats) -> Result<()> {
        if stats.user_id != self.user_id {
            return Err(GamificationError::UserMismatch {
                expected: self.user_id,
                actual: stats.user_id,
            });
        }
        if stats.revision != self.base_revision {
            return Err(GamificationError::StalePatch {
                expected: self.base_revision,
                actual: stats.revision,
            });
        }
        if self.is_empty() {
            return Ok(());
        }

        if let Some(xp) = self.total_xp {
            stats.total_xp = xp;
        }
        if let Some(level) = self.current_level {
            stats.current_level = level;
        }
        stats
            .completed_simulations
            .extend(self.completed_simulations.iter().cloned());
        stats
            .perfect_score_simulations
            .extend(self.perfect_score_simulations.iter().cloned());
        stats.earned_badges.extend(self.earned_badges.iter().cloned());
        stats
            .earned_achievements
            .extend(self.earned_achievements.iter().cloned());
        if let Some(streak) = self.current_streak {
            stats.current_streak = streak;
        }
        if let Some(longest) = self.longest_streak {
            stats.longest_streak = longest;
        }
        if let Some(at) = self.last_activity_date {
            stats.last_activity_date = Some(at);
        }
        if let Some(count) = self.ai_questions_asked {
            stats.ai_questions_asked = count;
        }
        if let Some(count) = self.goals_completed {
            stats.goals_completed = count;
        }
        if let Some(event) = &self.completion {
            stats.record_completion(event.clone());
        }

        stats.revision += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at() -> DateTime<FixedOffset> {
        FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(2024, 1, 15, 9, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_between_and_apply() {
        let before = UserStats::new(Uuid::new_v4(), 1);
        let mut after = before.clone();
        after.total_xp = 150;
        after.completed_simulations.insert("coffee_shop_effect".into());
        after.earned_badges.insert("first_steps".into());
        after.current_streak = 1;
        after.longest_streak = 1;
        after.last_activity_date = Some(at());

        let patch = StatsPatch::between(&before, &after).with_completion(CompletionEvent {
            simulation_id: "coffee_shop_effect".into(),
            completed_at: at(),
        });
        assert!(patch.current_level.is_none());
        assert!(!patch.is_empty());

        let mut stats = before.clone();
        patch.apply(&mut stats).unwrap();
        assert_eq!(stats.total_xp, 150);
        assert_eq!(stats.completion_log.len(), 1);
        assert_eq!(stats.revision, 1);

        after.completion_log = stats.completion_log.clone();
        after.revision = 1;
        assert_eq!(stats, after);
    }

    #[test]
    fn test_stale_patch_rejected() {
        let mut stats = UserStats::new(Uuid::new_v4(), 1);
        let mut target = stats.clone();
        target.total_xp = 10;
        let patch = StatsPatch::between(&stats, &target);

        patch.apply(&mut stats).unwrap();
        let snapshot = stats.clone();

        let err = patch.apply(&mut stats).unwrap_err();
        assert!(matches!(
            err,
            GamificationError::StalePatch { expected: 0, actual: 1 }
        ));
        assert_eq!(stats, snapshot);
    }

    #[test]
    fn test_wrong_user_rejected() {
        let stats = UserStats::new(Uuid::new_v4(), 1);
        let mut other = UserStats::new(Uuid::new_v4(), 1);

        let err = StatsPatch::empty(&stats).apply(&mut other).unwrap_err();
        assert!(matches!(err, GamificationError::UserMismatch { .. }));
    }

    #[test]
    fn test_empty_patch_keeps_revision() {
        let mut stats = UserStats::new(Uuid::new_v4(), 1);
        let patch = StatsPatch::empty(&stats);
        assert!(patch.is_empty());

        patch.apply(&mut stats).unwrap();
        assert_eq!(stats.revision, 0);

        let json = serde_json::to_value(&patch).unwrap();
        assert!(json.get("total_xp").is_none());
    }
}

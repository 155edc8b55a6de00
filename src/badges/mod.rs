//! Badge catalog access and unlock checks

use crate::catalog::Catalog;
use crate::conditions::UserSnapshot;
use crate::models::{Badge, BadgeAward, BadgeCategory, BadgeRarity};
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BadgeProgress {
    pub badge_id: String,
    pub current_progress: u64,
    pub required_progress: u64,
    pub progress_percentage: f64,
    pub unlocked: bool,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Tally {
    pub earned: usize,
    pub total: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BadgeCollectionStats {
    pub total_badges: usize,
    pub earned_badges: usize,
    pub completion_percentage: f64,
    pub by_rarity: BTreeMap<BadgeRarity, Tally>,
    pub by_category: BTreeMap<BadgeCategory, Tally>,
    /// Sum of `xp_reward` over earned badges
    pub badge_xp_earned: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BadgeSuggestion {
    pub badge: Badge,
    pub progress: BadgeProgress,
    pub hint: String,
}

#[derive(Debug, Clone)]
pub struct BadgeSystem {
    catalog: Arc<Catalog>,
}

impl BadgeSystem {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self { catalog }
    }

    pub fn get_badge(&self, badge_id: &str) -> Option<&Badge> {
        self.catalog.badge(badge_id)
    }

    pub fn get_all_badges(&self) -> &[Badge] {
        &self.catalog.badges
    }

    pub fn get_badges_by_rarity(&self, rarity: BadgeRarity) -> Vec<&Badge> {
        self.catalog
            .badges
            .iter()
            .filter(|b| b.rarity == rarity)
            .collect()
    }

    pub fn get_badges_by_category(&self, category: BadgeCategory) -> Vec<&Badge> {
        self.catalog
            .badges
            .iter()
            .filter(|b| b.category == category)
            .collect()
    }

    /// Badges newly satisfied by `snapshot`, in catalog order
    ///
    /// Already-earned badges are skipped, so re-running with the same
    /// earned set after applying the awards yields nothing.
    pub fn check_badge_unlocks(&self, snapshot: &UserSnapshot<'_>) -> Vec<BadgeAward> {
        let awards: Vec<BadgeAward> = self
            .catalog
            .badges
            .iter()
            .filter(|badge| !snapshot.earned_badges.contains(&badge.id))
            .filter(|badge| {
                self.catalog
                    .conditions
                    .evaluate(&badge.unlock_condition, snapshot)
            })
            .map(|badge| self.award(badge, snapshot.now))
            .collect();

        debug!(count = awards.len(), "Badge unlock check completed");
        awards
    }

    pub fn award(&self, badge: &Badge, now: DateTime<FixedOffset>) -> BadgeAward {
        BadgeAward {
            badge: badge.clone(),
            date_earned: now,
            celebration_message: badge_message(badge),
        }
    }

    pub fn calculate_badge_progress(
        &self,
        badge_id: &str,
        snapshot: &UserSnapshot<'_>,
    ) -> Option<BadgeProgress> {
        let badge = self.catalog.badge(badge_id)?;
        let meter = self
            .catalog
            .conditions
            .progress(&badge.unlock_condition, snapshot)?;
        let unlocked = snapshot.earned_badges.contains(badge_id);

        let current_progress = if unlocked {
            meter.required
        } else {
            meter.current
        };
        let progress_percentage = if unlocked { 100.0 } else { meter.percentage() };

        Some(BadgeProgress {
            badge_id: badge_id.to_string(),
            current_progress,
            required_progress: meter.required,
            progress_percentage,
            unlocked,
        })
    }

    pub fn get_badge_collection_stats(&self, earned: &BTreeSet<String>) -> BadgeCollectionStats {
        let mut by_rarity: BTreeMap<BadgeRarity, Tally> =
            BadgeRarity::ALL.iter().map(|r| (*r, Tally::default())).collect();
        let mut by_category: BTreeMap<BadgeCategory, Tally> =
            BadgeCategory::ALL.iter().map(|c| (*c, Tally::default())).collect();

        let mut earned_count = 0;
        let mut badge_xp_earned = 0u64;

        for badge in &self.catalog.badges {
            let is_earned = earned.contains(&badge.id);

            let rarity = by_rarity.entry(badge.rarity).or_default();
            rarity.total += 1;
            let category = by_category.entry(badge.category).or_default();
            category.total += 1;

            if is_earned {
                earned_count += 1;
                badge_xp_earned += badge.xp_reward;
                if let Some(t) = by_rarity.get_mut(&badge.rarity) {
                    t.earned += 1;
                }
                if let Some(t) = by_category.get_mut(&badge.category) {
                    t.earned += 1;
                }
            }
        }

        let total_badges = self.catalog.badges.len();
        let completion_percentage = if total_badges > 0 {
            earned_count as f64 / total_badges as f64 * 100.0
        } else {
            0.0
        };

        BadgeCollectionStats {
            total_badges,
            earned_badges: earned_count,
            completion_percentage,
            by_rarity,
            by_category,
            badge_xp_earned,
        }
    }

    /// Unearned badges closest to completion first
    pub fn get_next_badges_to_earn(
        &self,
        snapshot: &UserSnapshot<'_>,
        limit: usize,
    ) -> Vec<BadgeSuggestion> {
        let mut suggestions: Vec<BadgeSuggestion> = self
            .catalog
            .badges
            .iter()
            .filter(|badge| !snapshot.earned_badges.contains(&badge.id))
            .filter_map(|badge| {
                self.calculate_badge_progress(&badge.id, snapshot)
                    .map(|progress| BadgeSuggestion {
                        badge: badge.clone(),
                        progress,
                        hint: badge.hint.clone(),
                    })
            })
            .collect();

        suggestions.sort_by(|a, b| {
            b.progress
                .progress_percentage
                .total_cmp(&a.progress.progress_percentage)
        });
        suggestions.truncate(limit);
        suggestions
    }
}

fn badge_message(badge: &Badge) -> String {
    let prefix = match badge.rarity {
        BadgeRarity::Common => "🎉 Badge Unlocked!",
        BadgeRarity::Rare => "✨ Rare Badge Unlocked!",
        BadgeRarity::Epic => "🌟 EPIC Badge Unlocked!",
        BadgeRarity::Legendary => "👑 LEGENDARY Badge Unlocked!",
    };
    format!(
        "{} {} {} - {}",
        prefix, badge.icon, badge.name, badge.description
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UserStats;
    use chrono::TimeZone;
    use uuid::Uuid;

    fn system() -> BadgeSystem {
        BadgeSystem::new(Arc::new(Catalog::builtin()))
    }

    fn now() -> DateTime<FixedOffset> {
        FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(2024, 6, 1, 12, 0, 0)
            .unwrap()
    }

    fn ids(awards: &[BadgeAward]) -> Vec<&str> {
        awards.iter().map(|a| a.badge.id.as_str()).collect()
    }

    #[test]
    fn test_first_completion_awards_two_badges() {
        let mut stats = UserStats::new(Uuid::new_v4(), 1);
        stats.completed_simulations.insert("coffee_shop_effect".into());
        let snapshot = UserSnapshot::of(&stats, 100, 1, now());

        let awards = system().check_badge_unlocks(&snapshot);
        assert_eq!(ids(&awards), vec!["first_steps", "coffee_conscious"]);
        assert_eq!(
            awards[0].celebration_message,
            "🎉 Badge Unlocked! 👣 First Steps - Completed your first simulation"
        );
        assert_eq!(awards[0].date_earned, now());
    }

    #[test]
    fn test_unlock_check_is_idempotent() {
        let system = system();
        let mut stats = UserStats::new(Uuid::new_v4(), 1);
        stats.completed_simulations.insert("paycheck_game".into());
        stats.perfect_score_simulations.insert("paycheck_game".into());

        let first = system.check_badge_unlocks(&UserSnapshot::of(&stats, 200, 1, now()));
        assert_eq!(ids(&first), vec!["first_steps", "paycheck_pro", "perfect_score"]);

        for award in &first {
            stats.earned_badges.insert(award.badge.id.clone());
        }
        let second = system.check_badge_unlocks(&UserSnapshot::of(&stats, 200, 1, now()));
        assert!(second.is_empty());
    }

    #[test]
    fn test_level_and_streak_badges() {
        let mut stats = UserStats::new(Uuid::new_v4(), 1);
        stats.current_streak = 7;
        let awards = system().check_badge_unlocks(&UserSnapshot::of(&stats, 3000, 3, now()));

        assert_eq!(ids(&awards), vec!["streak_warrior", "level_3_achieved"]);
        assert!(awards[1].celebration_message.starts_with("✨ Rare Badge Unlocked!"));
    }

    #[test]
    fn test_badge_progress() {
        let system = system();
        let mut stats = UserStats::new(Uuid::new_v4(), 1);
        stats.completed_simulations.insert("credit_card_trap".into());
        let snapshot = UserSnapshot::of(&stats, 0, 2, now());

        let debt = system
            .calculate_badge_progress("debt_destroyer", &snapshot)
            .unwrap();
        assert_eq!((debt.current_progress, debt.required_progress), (1, 2));
        assert_eq!(debt.progress_percentage, 50.0);
        assert!(!debt.unlocked);

        assert!(system.calculate_badge_progress("missing", &snapshot).is_none());
    }

    #[test]
    fn test_collection_stats() {
        let system = system();
        let earned: BTreeSet<String> = ["first_steps", "perfect_score", "financial_master"]
            .iter()
            .map(|s| s.to_string())
            .collect();

        let stats = system.get_badge_collection_stats(&earned);
        assert_eq!(stats.total_badges, 16);
        assert_eq!(stats.earned_badges, 3);
        assert_eq!(stats.by_rarity[&BadgeRarity::Common], Tally { earned: 1, total: 4 });
        assert_eq!(stats.by_rarity[&BadgeRarity::Legendary], Tally { earned: 1, total: 3 });
        assert_eq!(stats.by_category[&BadgeCategory::Special], Tally { earned: 1, total: 1 });
        assert_eq!(stats.badge_xp_earned, 50 + 250 + 1000);

        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["by_rarity"]["rare"]["total"], 5);
    }

    #[test]
    fn test_next_badges_sorted_by_progress() {
        let system = system();
        let mut stats = UserStats::new(Uuid::new_v4(), 1);
        for id in ["coffee_shop_effect", "paycheck_game", "credit_card_trap"] {
            stats.completed_simulations.insert(id.to_string());
        }
        stats.earned_badges.insert("first_steps".into());
        stats.earned_badges.insert("coffee_conscious".into());
        stats.earned_badges.insert("paycheck_pro".into());

        let next = system.get_next_badges_to_earn(&UserSnapshot::of(&stats, 400, 1, now()), 3);
        assert_eq!(next.len(), 3);
        assert_eq!(next[0].badge.id, "debt_destroyer");
        assert!(next[0].progress.progress_percentage >= next[1].progress.progress_percentage);
        assert!(next.iter().all(|s| !stats.earned_badges.contains(&s.badge.id)));
    }

    #[test]
    fn test_filters() {
        let system = system();
        assert_eq!(system.get_badges_by_rarity(BadgeRarity::Epic).len(), 4);
        assert_eq!(system.get_badges_by_category(BadgeCategory::Investment).len(), 4);
        assert_eq!(system.get_badge("streak_warrior").unwrap().xp_reward, 200);
    }
}

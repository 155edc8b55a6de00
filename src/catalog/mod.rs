//! Static catalogs: levels, XP table, badges, simulations, achievements
//!
//! A catalog is built once, validated, and shared read-only behind an `Arc`.
//! Nothing in the engine mutates it after construction.

use crate::conditions::ConditionRegistry;
use crate::error::CatalogError;
use crate::models::{Achievement, Badge, LevelInfo, Simulation, UnlockRequirement};
use crate::Result;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use tracing::info;

mod builtin;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct StreakTier {
    pub days: u32,
    pub multiplier: f64,
}

/// XP action granted when a streak lands exactly on `days`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StreakMilestone {
    pub days: u32,
    pub action: String,
}

/// Level-scoped suggestion shown on the dashboard
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NextStepRule {
    pub min_level: u32,
    #[serde(default)]
    pub max_level: Option<u32>,
    pub priority: u32,
    pub simulation_id: String,
    pub reason: String,
}

impl NextStepRule {
    pub fn applies_to(&self, level: u32) -> bool {
        level >= self.min_level && self.max_level.map_or(true, |max| level <= max)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Catalog {
    pub levels: Vec<LevelInfo>,
    pub xp_rewards: BTreeMap<String, u64>,
    pub streak_tiers: Vec<StreakTier>,
    pub streak_milestones: Vec<StreakMilestone>,
    pub perfect_score_bonus: f64,
    pub first_try_bonus: f64,
    pub badges: Vec<Badge>,
    pub simulations: Vec<Simulation>,
    pub achievements: Vec<Achievement>,
    pub conditions: ConditionRegistry,
    pub learning_path: Vec<String>,
    pub next_steps: Vec<NextStepRule>,
}

impl Catalog {
    /// The shipped catalog: 6 levels, 16 badges, 12 simulations, 7 achievements
    pub fn builtin() -> Self {
        builtin::catalog()
    }

    /// Load and validate a catalog from a JSON file
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let catalog: Catalog = serde_json::from_str(&raw)?;
        catalog.validate()?;

        info!(
            path = %path.display(),
            levels = catalog.levels.len(),
            badges = catalog.badges.len(),
            simulations = catalog.simulations.len(),
            "Catalog loaded"
        );

        Ok(catalog)
    }

    pub fn first_level(&self) -> u32 {
        self.levels.first().map(|l| l.level).unwrap_or(1)
    }

    pub fn level(&self, level: u32) -> Option<&LevelInfo> {
        self.levels.iter().find(|l| l.level == level)
    }

    pub fn base_xp(&self, action: &str) -> Option<u64> {
        self.xp_rewards.get(action).copied()
    }

    pub fn badge(&self, id: &str) -> Option<&Badge> {
        self.badges.iter().find(|b| b.id == id)
    }

    pub fn simulation(&self, id: &str) -> Option<&Simulation> {
        self.simulations.iter().find(|s| s.id == id)
    }

    pub fn achievement(&self, id: &str) -> Option<&Achievement> {
        self.achievements.iter().find(|a| a.id == id)
    }

    /// Check every structural invariant the engine relies on
    pub fn validate(&self) -> std::result::Result<(), CatalogError> {
        self.validate_levels()?;
        self.validate_rewards()?;

        let badge_ids = unique_ids("badge", self.badges.iter().map(|b| b.id.as_str()))?;
        let simulation_ids =
            unique_ids("simulation", self.simulations.iter().map(|s| s.id.as_str()))?;
        unique_ids(
            "achievement",
            self.achievements.iter().map(|a| a.id.as_str()),
        )?;

        for badge in &self.badges {
            require(
                self.conditions.contains(&badge.unlock_condition),
                &badge.id,
                "condition",
                &badge.unlock_condition,
            )?;
        }

        for achievement in &self.achievements {
            require(
                self.conditions.contains(&achievement.unlock_condition),
                &achievement.id,
                "condition",
                &achievement.unlock_condition,
            )?;
            if let Some(badge_id) = &achievement.reward_badge {
                require(
                    badge_ids.contains(badge_id.as_str()),
                    &achievement.id,
                    "badge",
                    badge_id,
                )?;
            }
        }

        for (id, predicate) in self.conditions.iter() {
            for simulation_id in predicate.referenced_simulations() {
                require(
                    simulation_ids.contains(simulation_id),
                    id,
                    "simulation",
                    simulation_id,
                )?;
            }
        }

        for simulation in &self.simulations {
            for prerequisite in &simulation.prerequisites {
                require(
                    simulation_ids.contains(prerequisite.as_str()),
                    &simulation.id,
                    "simulation",
                    prerequisite,
                )?;
            }

            for condition in &simulation.unlock_conditions {
                match &condition.requirement {
                    UnlockRequirement::Simulation { simulation_id } => require(
                        simulation_ids.contains(simulation_id.as_str()),
                        &simulation.id,
                        "simulation",
                        simulation_id,
                    )?,
                    UnlockRequirement::Badge { badge_id } => require(
                        badge_ids.contains(badge_id.as_str()),
                        &simulation.id,
                        "badge",
                        badge_id,
                    )?,
                    _ => {}
                }
            }

            match self.base_xp(&simulation.id) {
                Some(table) if table == simulation.xp_reward => {}
                Some(table) => {
                    return Err(CatalogError::XpMismatch {
                        id: simulation.id.clone(),
                        declared: simulation.xp_reward,
                        table,
                    })
                }
                None => {
                    return Err(CatalogError::UnknownReference {
                        owner: simulation.id.clone(),
                        kind: "xp table entry",
                        id: simulation.id.clone(),
                    })
                }
            }
        }

        for id in &self.learning_path {
            require(
                simulation_ids.contains(id.as_str()),
                "learning_path",
                "simulation",
                id,
            )?;
        }
        for rule in &self.next_steps {
            require(
                simulation_ids.contains(rule.simulation_id.as_str()),
                "next_steps",
                "simulation",
                &rule.simulation_id,
            )?;
        }

        self.check_acyclic()
    }

    fn validate_levels(&self) -> std::result::Result<(), CatalogError> {
        let first = self.levels.first().ok_or(CatalogError::NoLevels)?;
        if first.xp_required != 0 || first.xp_range.min != 0 {
            return Err(CatalogError::FirstLevelNotZero(first.xp_required));
        }

        let mut expected_level = first.level;
        let mut expected_min = 0u64;

        for info in &self.levels {
            if info.level != expected_level
                || info.xp_required != expected_min
                || info.xp_range.min != expected_min
            {
                return Err(CatalogError::LevelGap {
                    level: info.level,
                    expected: expected_level,
                    expected_min,
                });
            }
            if info.xp_range.max < info.xp_range.min {
                return Err(CatalogError::InvertedRange(info.level));
            }

            expected_level += 1;
            expected_min = info.xp_range.max.saturating_add(1);
        }

        Ok(())
    }

    fn validate_rewards(&self) -> std::result::Result<(), CatalogError> {
        if let Some((action, _)) = self.xp_rewards.iter().find(|(_, xp)| **xp == 0) {
            return Err(CatalogError::ZeroXpAction(action.clone()));
        }

        for tier in &self.streak_tiers {
            if !(tier.multiplier.is_finite() && tier.multiplier > 0.0) {
                return Err(CatalogError::InvalidStreakTier { days: tier.days });
            }
        }

        for milestone in &self.streak_milestones {
            require(
                self.xp_rewards.contains_key(&milestone.action),
                "streak_milestones",
                "xp action",
                &milestone.action,
            )?;
        }

        Ok(())
    }

    /// Prerequisites and simulation conditions together must form a DAG
    fn check_acyclic(&self) -> std::result::Result<(), CatalogError> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            Visiting,
            Done,
        }

        let edges: HashMap<&str, Vec<&str>> = self
            .simulations
            .iter()
            .map(|s| {
                let mut deps: Vec<&str> = s.prerequisites.iter().map(String::as_str).collect();
                deps.extend(s.unlock_conditions.iter().filter_map(|c| match &c.requirement {
                    UnlockRequirement::Simulation { simulation_id } => {
                        Some(simulation_id.as_str())
                    }
                    _ => None,
                }));
                (s.id.as_str(), deps)
            })
            .collect();

        fn visit<'a>(
            node: &'a str,
            edges: &HashMap<&'a str, Vec<&'a str>>,
            marks: &mut HashMap<&'a str, Mark>,
        ) -> std::result::Result<(), CatalogError> {
            match marks.get(node) {
                Some(Mark::Done) => return Ok(()),
                Some(Mark::Visiting) => {
                    return Err(CatalogError::PrerequisiteCycle(node.to_string()))
                }
                None => {}
            }

            marks.insert(node, Mark::Visiting);
            for dep in edges.get(node).into_iter().flatten().copied() {
                visit(dep, edges, marks)?;
            }
            marks.insert(node, Mark::Done);
            Ok(())
        }

        let mut marks = HashMap::with_capacity(edges.len());
        for simulation in &self.simulations {
            visit(simulation.id.as_str(), &edges, &mut marks)?;
        }
        Ok(())
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::builtin()
    }
}

fn unique_ids<'a>(
    kind: &'static str,
    ids: impl Iterator<Item = &'a str>,
) -> std::result::Result<HashSet<&'a str>, CatalogError> {
    let mut seen = HashSet::new();
    for id in ids {
        if !seen.insert(id) {
            return Err(CatalogError::DuplicateId {
                kind,
                id: id.to_string(),
            });
        }
    }
    Ok(seen)
}

fn require(
    ok: bool,
    owner: &str,
    kind: &'static str,
    id: &str,
) -> std::result::Result<(), CatalogError> {
    if ok {
        Ok(())
    } else {
        Err(CatalogError::UnknownReference {
            owner: owner.to_string(),
            kind,
            id: id.to_string(),
        })
    }
}

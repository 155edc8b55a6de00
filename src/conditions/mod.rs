//! Unlock predicates for badges and achievements
//!
//! Condition ids in the catalog resolve to typed predicates here.
//! Evaluation is pure: same snapshot in, same answer out.

use crate::models::{CompletionEvent, UserStats};
use chrono::{DateTime, FixedOffset, Timelike};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use tracing::warn;

/// Read-only view of a user used by every predicate
#[derive(Debug, Clone, Copy)]
pub struct UserSnapshot<'a> {
    pub completed_simulations: &'a BTreeSet<String>,
    pub perfect_score_simulations: &'a BTreeSet<String>,
    pub earned_badges: &'a BTreeSet<String>,
    pub earned_achievements: &'a BTreeSet<String>,
    pub completion_log: &'a [CompletionEvent],
    pub total_xp: u64,
    pub current_level: u32,
    pub current_streak: u32,
    pub ai_questions_asked: u32,
    pub goals_completed: u32,
    pub now: DateTime<FixedOffset>,
}

impl<'a> UserSnapshot<'a> {
    /// View of `stats` with XP and level overridden by the in-flight values
    pub fn of(
        stats: &'a UserStats,
        total_xp: u64,
        current_level: u32,
        now: DateTime<FixedOffset>,
    ) -> Self {
        Self {
            completed_simulations: &stats.completed_simulations,
            perfect_score_simulations: &stats.perfect_score_simulations,
            earned_badges: &stats.earned_badges,
            earned_achievements: &stats.earned_achievements,
            completion_log: &stats.completion_log,
            total_xp,
            current_level,
            current_streak: stats.current_streak,
            ai_questions_asked: stats.ai_questions_asked,
            goals_completed: stats.goals_completed,
            now,
        }
    }

    pub fn total_simulations(&self) -> usize {
        self.completed_simulations.len()
    }

    fn completions_on_same_day(&self) -> usize {
        let today = self.now.date_naive();
        self.completion_log
            .iter()
            .filter(|event| {
                event.completed_at.with_timezone(self.now.offset()).date_naive() == today
            })
            .count()
    }
}

/// How far a user is toward satisfying a predicate
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Meter {
    pub current: u64,
    pub required: u64,
}

impl Meter {
    fn binary(met: bool) -> Self {
        Self {
            current: u64::from(met),
            required: 1,
        }
    }

    fn capped(current: u64, required: u64) -> Self {
        Self {
            current: current.min(required),
            required,
        }
    }

    pub fn percentage(&self) -> f64 {
        if self.required == 0 {
            return 100.0;
        }
        (self.current as f64 / self.required as f64 * 100.0).min(100.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Predicate {
    SimulationsCompleted { count: usize },
    SimulationCompleted { simulation_id: String },
    AllSimulationsCompleted { simulation_ids: Vec<String> },
    StreakAtLeast { days: u32 },
    LevelAtLeast { level: u32 },
    AnyPerfectScore,
    PerfectScoresAtLeast { count: usize },
    AiQuestionsAtLeast { count: u32 },
    GoalsCompletedAtLeast { count: u32 },
    /// Logged completions sharing the snapshot's calendar day
    CompletionsSameDay { count: usize },
    /// A logged completion whose local hour is below `hour`
    CompletedBeforeHour { hour: u32 },
    /// A logged completion whose local hour is at or after `hour`
    CompletedFromHour { hour: u32 },
}

impl Predicate {
    pub fn is_satisfied(&self, snapshot: &UserSnapshot<'_>) -> bool {
        match self {
            Predicate::SimulationsCompleted { count } => snapshot.total_simulations() >= *count,
            Predicate::SimulationCompleted { simulation_id } => {
                snapshot.completed_simulations.contains(simulation_id)
            }
            Predicate::AllSimulationsCompleted { simulation_ids } => simulation_ids
                .iter()
                .all(|id| snapshot.completed_simulations.contains(id)),
            Predicate::StreakAtLeast { days } => snapshot.current_streak >= *days,
            Predicate::LevelAtLeast { level } => snapshot.current_level >= *level,
            Predicate::AnyPerfectScore => !snapshot.perfect_score_simulations.is_empty(),
            Predicate::PerfectScoresAtLeast { count } => {
                snapshot.perfect_score_simulations.len() >= *count
            }
            Predicate::AiQuestionsAtLeast { count } => snapshot.ai_questions_asked >= *count,
            Predicate::GoalsCompletedAtLeast { count } => snapshot.goals_completed >= *count,
            Predicate::CompletionsSameDay { count } => snapshot.completions_on_same_day() >= *count,
            Predicate::CompletedBeforeHour { hour } => snapshot
                .completion_log
                .iter()
                .any(|event| event.completed_at.hour() < *hour),
            Predicate::CompletedFromHour { hour } => snapshot
                .completion_log
                .iter()
                .any(|event| event.completed_at.hour() >= *hour),
        }
    }

    pub fn progress(&self, snapshot: &UserSnapshot<'_>) -> Meter {
        match self {
            Predicate::SimulationsCompleted { count } => {
                Meter::capped(snapshot.total_simulations() as u64, *count as u64)
            }
            Predicate::AllSimulationsCompleted { simulation_ids } => {
                let done = simulation_ids
                    .iter()
                    .filter(|id| snapshot.completed_simulations.contains(*id))
                    .count();
                Meter::capped(done as u64, simulation_ids.len() as u64)
            }
            Predicate::StreakAtLeast { days } => {
                Meter::capped(u64::from(snapshot.current_streak), u64::from(*days))
            }
            Predicate::LevelAtLeast { level } => {
                Meter::capped(u64::from(snapshot.current_level), u64::from(*level))
            }
            Predicate::PerfectScoresAtLeast { count } => Meter::capped(
                snapshot.perfect_score_simulations.len() as u64,
                *count as u64,
            ),
            Predicate::AiQuestionsAtLeast { count } => {
                Meter::capped(u64::from(snapshot.ai_questions_asked), u64::from(*count))
            }
            Predicate::GoalsCompletedAtLeast { count } => {
                Meter::capped(u64::from(snapshot.goals_completed), u64::from(*count))
            }
            Predicate::CompletionsSameDay { count } => {
                Meter::capped(snapshot.completions_on_same_day() as u64, *count as u64)
            }
            Predicate::SimulationCompleted { .. }
            | Predicate::AnyPerfectScore
            | Predicate::CompletedBeforeHour { .. }
            | Predicate::CompletedFromHour { .. } => Meter::binary(self.is_satisfied(snapshot)),
        }
    }

    /// Simulation ids this predicate mentions, for catalog validation
    pub fn referenced_simulations(&self) -> Vec<&str> {
        match self {
            Predicate::SimulationCompleted { simulation_id } => vec![simulation_id.as_str()],
            Predicate::AllSimulationsCompleted { simulation_ids } => {
                simulation_ids.iter().map(String::as_str).collect()
            }
            _ => Vec::new(),
        }
    }
}

/// Condition id → predicate lookup
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct ConditionRegistry {
    predicates: HashMap<String, Predicate>,
}

impl ConditionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, id: &str, predicate: Predicate) {
        self.predicates.insert(id.to_string(), predicate);
    }

    pub fn get(&self, id: &str) -> Option<&Predicate> {
        self.predicates.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.predicates.contains_key(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Predicate)> {
        self.predicates.iter()
    }

    /// Unresolvable ids evaluate to false; validated catalogs never hit this
    pub fn evaluate(&self, id: &str, snapshot: &UserSnapshot<'_>) -> bool {
        match self.predicates.get(id) {
            Some(predicate) => predicate.is_satisfied(snapshot),
            None => {
                warn!(condition_id = %id, "Unknown unlock condition");
                false
            }
        }
    }

    pub fn progress(&self, id: &str, snapshot: &UserSnapshot<'_>) -> Option<Meter> {
        self.predicates
            .get(id)
            .map(|predicate| predicate.progress(snapshot))
    }
}

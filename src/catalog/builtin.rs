//! Built-in catalog data

use super::{Catalog, NextStepRule, StreakMilestone, StreakTier};
use crate::conditions::{ConditionRegistry, Predicate};
use crate::models::{
    Achievement, Badge, BadgeCategory, BadgeRarity, Difficulty, LevelInfo, Simulation,
    UnlockCondition, XpRange,
};
use std::collections::BTreeMap;

pub(super) fn catalog() -> Catalog {
    let simulations = simulations();

    let mut xp_rewards: BTreeMap<String, u64> = simulations
        .iter()
        .map(|s| (s.id.clone(), s.xp_reward))
        .collect();
    for (action, xp) in ACTIVITY_XP {
        xp_rewards.insert((*action).to_string(), *xp);
    }

    Catalog {
        levels: levels(),
        xp_rewards,
        streak_tiers: vec![
            StreakTier { days: 3, multiplier: 1.1 },
            StreakTier { days: 7, multiplier: 1.25 },
            StreakTier { days: 14, multiplier: 1.5 },
            StreakTier { days: 30, multiplier: 2.0 },
        ],
        streak_milestones: vec![
            milestone(3, "streak_3_days"),
            milestone(7, "streak_7_days"),
            milestone(30, "streak_30_days"),
        ],
        perfect_score_bonus: 1.5,
        first_try_bonus: 1.2,
        badges: badges(),
        simulations,
        achievements: achievements(),
        conditions: conditions(),
        learning_path: LEARNING_PATH.iter().map(|s| s.to_string()).collect(),
        next_steps: next_steps(),
    }
}

/// Non-simulation actions and their base XP
const ACTIVITY_XP: &[(&str, u64)] = &[
    ("daily_login", 10),
    ("first_simulation", 50),
    ("ai_tutor_question", 20),
    ("budget_created", 100),
    ("goal_created", 50),
    ("goal_completed", 200),
    ("streak_3_days", 50),
    ("streak_7_days", 150),
    ("streak_30_days", 500),
    ("profile_complete", 100),
    ("share_achievement", 25),
];

const LEARNING_PATH: &[&str] = &[
    "coffee_shop_effect",
    "paycheck_game",
    "budget_builder",
    "emergency_fund",
    "credit_card_trap",
    "debt_classification",
    "compound_interest",
    "risk_vs_reward",
    "index_fund_challenge",
    "tax_optimizer",
    "monte_carlo",
    "sarah_journey",
];

fn milestone(days: u32, action: &str) -> StreakMilestone {
    StreakMilestone {
        days,
        action: action.to_string(),
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[allow(clippy::too_many_arguments)]
fn level(
    level: u32,
    name: &str,
    min: u64,
    max: u64,
    description: &str,
    perks: &[&str],
    icon: &str,
    celebration: Option<&str>,
) -> LevelInfo {
    LevelInfo {
        level,
        name: name.to_string(),
        xp_required: min,
        xp_range: XpRange { min, max },
        description: description.to_string(),
        perks: strings(perks),
        icon: icon.to_string(),
        celebration: celebration.map(str::to_string),
    }
}

fn levels() -> Vec<LevelInfo> {
    vec![
        level(
            1,
            "Financial Newbie",
            0,
            999,
            "Just starting your financial journey. Every expert was once a beginner!",
            &["Access to Level 1 simulations", "Basic progress tracking"],
            "🌱",
            None,
        ),
        level(
            2,
            "Money Apprentice",
            1000,
            2999,
            "You're learning the basics! Budget creation and emergency funds unlocked.",
            &["Access to Level 2 simulations", "Debt analysis tools", "Budget templates"],
            "📚",
            Some("🎉 You're no longer a newbie! You've learned the basics of budgeting and saving."),
        ),
        level(
            3,
            "Budget Warrior",
            3000,
            6999,
            "Master of budgets and debt strategies. You're building a solid foundation!",
            &["Access to Level 3 simulations", "Investment basics", "AI Tutor priority access"],
            "⚔️",
            Some("⚔️ Budget Warrior unlocked! You're mastering debt management and financial planning."),
        ),
        level(
            4,
            "Wealth Builder",
            7000,
            12999,
            "Building real wealth through investments and smart decisions.",
            &["Access to Level 4 simulations", "Advanced investment strategies", "Tax optimization"],
            "🏗️",
            Some("🏗️ You're building real wealth! Investment strategies unlocked."),
        ),
        level(
            5,
            "Investment Guru",
            13000,
            19999,
            "You understand compound interest, index funds, and long-term thinking.",
            &["All simulations unlocked", "Monte Carlo analysis", "Portfolio optimization"],
            "🧙",
            Some("🧙 Investment Guru achieved! You understand the power of compound interest."),
        ),
        level(
            6,
            "Financial Master",
            20000,
            999_999,
            "Master of money! You've completed the journey and achieved financial wisdom.",
            &["Master badge", "All features unlocked", "Mentor status", "Exclusive insights"],
            "👑",
            Some("👑 FINANCIAL MASTER! You've reached the pinnacle of financial wisdom!"),
        ),
    ]
}

#[allow(clippy::too_many_arguments)]
fn badge(
    id: &str,
    name: &str,
    description: &str,
    rarity: BadgeRarity,
    category: BadgeCategory,
    icon: &str,
    unlock_condition: &str,
    xp_reward: u64,
    hint: &str,
) -> Badge {
    Badge {
        id: id.to_string(),
        name: name.to_string(),
        description: description.to_string(),
        rarity,
        category,
        icon: icon.to_string(),
        unlock_condition: unlock_condition.to_string(),
        xp_reward,
        hint: hint.to_string(),
    }
}

fn badges() -> Vec<Badge> {
    use BadgeCategory::*;
    use BadgeRarity::*;

    vec![
        // common
        badge("first_steps", "First Steps", "Completed your first simulation", Common, Foundation, "👣",
            "complete_1_simulation", 50, "Complete any simulation"),
        badge("coffee_conscious", "Coffee Conscious", "Discovered the coffee shop effect", Common, Foundation, "☕",
            "complete_coffee_shop", 100, "Complete 'The Coffee Shop Effect' simulation"),
        badge("budget_beginner", "Budget Beginner", "Created your first budget", Common, Foundation, "📊",
            "complete_budget_builder", 100, "Complete 'Budget Builder' simulation"),
        badge("paycheck_pro", "Paycheck Pro", "Mastered the paycheck game", Common, Foundation, "💰",
            "complete_paycheck_game", 100, "Complete 'Paycheck Game' simulation"),
        // rare
        badge("debt_destroyer", "Debt Destroyer", "Completed all debt simulations", Rare, DebtMaster, "💣",
            "complete_all_debt_simulations", 250, "Complete Credit Card Trap and Debt Classification"),
        badge("emergency_ready", "Emergency Ready", "Built a strong emergency fund strategy", Rare, Foundation, "🛡️",
            "complete_emergency_fund", 200, "Complete 'Emergency Fund Race' simulation"),
        badge("streak_warrior", "Streak Warrior", "7-day learning streak", Rare, Streak, "🔥",
            "achieve_7_day_streak", 200, "Log in and complete activities for 7 days straight"),
        badge("level_3_achieved", "Budget Warrior", "Reached Level 3: Budget Warrior", Rare, Completion, "⚔️",
            "reach_level_3", 300, "Earn 3,000 XP to reach Level 3"),
        badge("perfect_score", "Perfect Score", "Achieved perfect score in any simulation", Rare, Special, "💯",
            "perfect_simulation_score", 250, "Get 100% score in a simulation"),
        // epic
        badge("compound_master", "Compound Master", "Unlocked the power of compound interest", Epic, Investment, "📈",
            "complete_compound_interest", 400, "Complete 'Compound Interest Time Machine' simulation"),
        badge("index_fund_believer", "Index Fund Believer", "Learned why index funds win", Epic, Investment, "📊",
            "complete_index_fund_challenge", 400, "Complete 'Index Fund vs Stock Picker' simulation"),
        badge("tax_optimizer", "Tax Optimizer", "Mastered tax-advantaged accounts", Epic, Investment, "🎯",
            "complete_tax_optimizer", 400, "Complete 'Tax-Advantaged Optimizer' simulation"),
        badge("simulation_completionist", "Simulation Completionist", "Completed 10+ simulations", Epic, Completion, "🏆",
            "complete_10_simulations", 500, "Complete 10 different simulations"),
        // legendary
        badge("financial_master", "Financial Master", "Reached Level 6: Financial Master", Legendary, Completion, "👑",
            "reach_level_6", 1000, "Earn 20,000 XP to reach max level"),
        badge("monte_carlo_expert", "Monte Carlo Expert", "Ran advanced Monte Carlo simulations", Legendary, Investment, "🎲",
            "complete_monte_carlo", 600, "Complete 'Monte Carlo' simulation"),
        badge("sarah_journey_complete", "Journey Complete", "Completed Sarah's 30-day transformation", Legendary, Completion, "✨",
            "complete_sarah_journey", 800, "Complete the full 'Sarah's Journey' simulation"),
    ]
}

#[allow(clippy::too_many_arguments)]
fn simulation(
    id: &str,
    name: &str,
    description: &str,
    level: u32,
    xp_reward: u64,
    estimated_time: &str,
    difficulty: Difficulty,
    unlock_conditions: Vec<UnlockCondition>,
    prerequisites: &[&str],
    category: &str,
) -> Simulation {
    Simulation {
        id: id.to_string(),
        name: name.to_string(),
        description: description.to_string(),
        level,
        xp_reward,
        estimated_time: estimated_time.to_string(),
        difficulty,
        unlock_conditions,
        prerequisites: strings(prerequisites),
        category: category.to_string(),
    }
}

fn simulations() -> Vec<Simulation> {
    use Difficulty::*;

    let level_2 = || UnlockCondition::level(2, "Reach Level 2: Money Apprentice");
    let level_3 = || UnlockCondition::level(3, "Reach Level 3: Budget Warrior");
    let level_4 = || UnlockCondition::level(4, "Reach Level 4: Wealth Builder");

    vec![
        simulation("coffee_shop_effect", "The Coffee Shop Effect",
            "Discover how small daily expenses compound into big money",
            1, 100, "10 min", Beginner, vec![UnlockCondition::always()], &[], "Foundation"),
        simulation("paycheck_game", "The Paycheck Game",
            "Compare 3 strategies: Spend First, Bills First, or Save First?",
            1, 200, "15 min", Beginner, vec![UnlockCondition::always()], &[], "Foundation"),
        simulation("budget_builder", "Budget Builder Challenge",
            "Build your first 50/30/20 budget with realistic constraints",
            2, 300, "20 min", Beginner, vec![level_2()], &["paycheck_game"], "Budgeting"),
        simulation("emergency_fund", "Emergency Fund Race",
            "Watch Alex vs Jordan: Who survives emergencies better?",
            2, 300, "15 min", Beginner, vec![level_2()], &["budget_builder"], "Safety Net"),
        simulation("credit_card_trap", "Credit Card Trap",
            "See how minimum payments turn $5,000 into decades of debt",
            2, 250, "15 min", Intermediate, vec![level_2()], &["emergency_fund"], "Debt Management"),
        simulation("debt_classification", "Good Debt vs Bad Debt",
            "Learn to distinguish good debt from bad debt with real examples",
            2, 250, "15 min", Intermediate,
            vec![UnlockCondition::simulation("credit_card_trap", "Complete Credit Card Trap")],
            &["credit_card_trap"], "Debt Management"),
        simulation("compound_interest", "Compound Interest Time Machine",
            "Race through time: Emma vs Steven vs Larry. Time beats money!",
            3, 400, "20 min", Intermediate, vec![level_3()], &["debt_classification"], "Investing Basics"),
        simulation("risk_vs_reward", "Risk vs Reward Explorer",
            "Compare conservative, moderate, and aggressive investment strategies",
            3, 400, "20 min", Intermediate, vec![level_3()], &["compound_interest"], "Investing Basics"),
        simulation("index_fund_challenge", "Index Fund vs Stock Picker",
            "Can you beat the index fund? (Spoiler: probably not!)",
            4, 500, "25 min", Advanced, vec![level_4()], &["risk_vs_reward"], "Advanced Investing"),
        simulation("monte_carlo", "Monte Carlo: 10,000 Futures",
            "Run thousands of scenarios to see all possible financial futures",
            4, 600, "30 min", Advanced,
            vec![
                level_4(),
                UnlockCondition::simulation("index_fund_challenge", "Complete Index Fund Challenge"),
            ],
            &["index_fund_challenge"], "Advanced Investing"),
        simulation("tax_optimizer", "Tax-Advantaged Account Optimizer",
            "Master 401k, Roth IRA, HSA, and tax strategies",
            4, 500, "25 min", Advanced, vec![level_4()], &["compound_interest"], "Tax Strategy"),
        simulation("sarah_journey", "Sarah's 30-Day Transformation",
            "Experience the complete journey from $0 to financial freedom",
            5, 800, "45 min", Advanced,
            vec![
                UnlockCondition::level(5, "Reach Level 5: Investment Guru"),
                UnlockCondition::xp(10_000, "Earn 10,000 total XP"),
            ],
            &["monte_carlo", "tax_optimizer"], "Complete Journey"),
    ]
}

fn achievement(
    id: &str,
    name: &str,
    description: &str,
    unlock_condition: &str,
    reward_xp: u64,
    reward_badge: Option<&str>,
    hidden: bool,
) -> Achievement {
    Achievement {
        id: id.to_string(),
        name: name.to_string(),
        description: description.to_string(),
        unlock_condition: unlock_condition.to_string(),
        reward_xp,
        reward_badge: reward_badge.map(str::to_string),
        hidden,
    }
}

fn achievements() -> Vec<Achievement> {
    vec![
        achievement("speed_runner", "Speed Runner", "Complete 5 simulations in one day",
            "complete_5_sims_one_day", 300, None, false),
        achievement("perfectionist", "Perfectionist", "Get perfect scores on 3 different simulations",
            "perfect_score_3_sims", 400, Some("perfect_score"), false),
        achievement("dedicated_learner", "Dedicated Learner", "Maintain a 30-day streak",
            "30_day_streak", 500, None, false),
        achievement("early_bird", "Early Bird", "Complete a simulation before 7 AM",
            "complete_before_7am", 100, None, true),
        achievement("night_owl", "Night Owl", "Complete a simulation after 11 PM",
            "complete_after_11pm", 100, None, true),
        achievement("tutor_enthusiast", "Tutor Enthusiast", "Ask AI Tutor 50 questions",
            "ai_tutor_50_questions", 250, None, false),
        achievement("goal_getter", "Goal Getter", "Complete 5 financial goals",
            "complete_5_goals", 400, None, false),
    ]
}

fn conditions() -> ConditionRegistry {
    let completed = |id: &str| Predicate::SimulationCompleted {
        simulation_id: id.to_string(),
    };

    let mut registry = ConditionRegistry::new();

    // badges
    registry.register("complete_1_simulation", Predicate::SimulationsCompleted { count: 1 });
    registry.register("complete_coffee_shop", completed("coffee_shop_effect"));
    registry.register("complete_budget_builder", completed("budget_builder"));
    registry.register("complete_paycheck_game", completed("paycheck_game"));
    registry.register(
        "complete_all_debt_simulations",
        Predicate::AllSimulationsCompleted {
            simulation_ids: strings(&["credit_card_trap", "debt_classification"]),
        },
    );
    registry.register("complete_emergency_fund", completed("emergency_fund"));
    registry.register("achieve_7_day_streak", Predicate::StreakAtLeast { days: 7 });
    registry.register("reach_level_3", Predicate::LevelAtLeast { level: 3 });
    registry.register("perfect_simulation_score", Predicate::AnyPerfectScore);
    registry.register("complete_compound_interest", completed("compound_interest"));
    registry.register("complete_index_fund_challenge", completed("index_fund_challenge"));
    registry.register("complete_tax_optimizer", completed("tax_optimizer"));
    registry.register("complete_10_simulations", Predicate::SimulationsCompleted { count: 10 });
    registry.register("reach_level_6", Predicate::LevelAtLeast { level: 6 });
    registry.register("complete_monte_carlo", completed("monte_carlo"));
    registry.register("complete_sarah_journey", completed("sarah_journey"));

    // achievements
    registry.register("complete_5_sims_one_day", Predicate::CompletionsSameDay { count: 5 });
    registry.register("perfect_score_3_sims", Predicate::PerfectScoresAtLeast { count: 3 });
    registry.register("30_day_streak", Predicate::StreakAtLeast { days: 30 });
    registry.register("complete_before_7am", Predicate::CompletedBeforeHour { hour: 7 });
    registry.register("complete_after_11pm", Predicate::CompletedFromHour { hour: 23 });
    registry.register("ai_tutor_50_questions", Predicate::AiQuestionsAtLeast { count: 50 });
    registry.register("complete_5_goals", Predicate::GoalsCompletedAtLeast { count: 5 });

    registry
}

fn next_steps() -> Vec<NextStepRule> {
    let rule = |min_level: u32, max_level: Option<u32>, priority: u32, id: &str, reason: &str| {
        NextStepRule {
            min_level,
            max_level,
            priority,
            simulation_id: id.to_string(),
            reason: reason.to_string(),
        }
    };

    vec![
        rule(1, Some(1), 1, "coffee_shop_effect", "Start here! Learn how small expenses add up."),
        rule(1, Some(1), 2, "paycheck_game", "Master the 'pay yourself first' principle."),
        rule(2, Some(2), 1, "budget_builder", "Build your first 50/30/20 budget."),
        rule(2, Some(2), 2, "emergency_fund", "See why emergency funds prevent debt spirals."),
        rule(3, Some(3), 1, "compound_interest", "Unlock the power of compound interest!"),
        rule(4, None, 1, "monte_carlo", "Advanced: Run thousands of scenarios."),
    ]
}

use money_mindset_progression::{
    config::AppConfig,
    service::{GamificationService, SystemClock},
};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::from_env()?;
    let catalog = Arc::new(config.load_catalog()?);

    // Simulation ids from the command line, else the full learning path
    let args: Vec<String> = std::env::args().skip(1).collect();
    let path: Vec<String> = if args.is_empty() {
        catalog.learning_path.clone()
    } else {
        args
    };
    let ids: Vec<&str> = path.iter().map(String::as_str).collect();

    let clock = Arc::new(SystemClock::new(config.utc_offset));
    let service = GamificationService::with_clock(catalog, clock);

    info!(steps = ids.len(), "Simulating user journey");

    let summary = service.simulate_user_journey(&ids)?;

    println!("\n=== USER JOURNEY ===");
    for (i, step) in summary.journey.iter().enumerate() {
        println!(
            "  {:>2}. {:<24} +{:<4} XP  total {:<6} level {}{}",
            i + 1,
            step.simulation,
            step.xp_earned,
            step.total_xp,
            step.level,
            if step.leveled_up { "  ⬆ LEVEL UP" } else { "" }
        );
        for badge in &step.badges_earned {
            println!("        🏅 {}", badge);
        }
    }

    let totals = &summary.final_stats;
    println!("\n=== FINAL STATS ===");
    println!("Total XP: {}", totals.total_xp);
    println!("Level: {}", totals.level);
    println!("Simulations completed: {}", totals.simulations_completed);
    println!("Badges earned: {}", totals.badges_earned);

    Ok(())
}

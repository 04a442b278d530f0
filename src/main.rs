use clap::Parser;
use perp_sentinel::cli::{Cli, Commands};
use perp_sentinel::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(&cli.config).unwrap_or_else(|e| {
        eprintln!("Warning: Could not load config from {}: {}", cli.config, e);
        eprintln!("Using default configuration");
        Config::default()
    });

    // Initialize telemetry
    perp_sentinel::telemetry::init_telemetry(&config.telemetry)?;

    match cli.command {
        Commands::Run(args) => {
            tracing::info!("Starting replay run");
            args.execute(config).await?;
        }
        Commands::Check => match Config::load(&cli.config) {
            Ok(_) => println!("{}: configuration OK", cli.config),
            Err(e) => {
                eprintln!("{}: {}", cli.config, e);
                std::process::exit(1);
            }
        },
        Commands::Config => {
            println!("Current configuration:");
            println!("  Instrument: {}", config.feed.instrument);
            println!("  Execution: {:?}", config.execution.mode);
            println!(
                "  Engine: max_open={}, atr_window={}, retry_budget={}",
                config.engine.max_open_positions, config.engine.atr_window, config.engine.retry_budget
            );
            println!(
                "  Policy: atr_multiplier={}, take_profit_ratio={}, trailing={}",
                config.policy.atr_multiplier, config.policy.take_profit_ratio, config.policy.trailing_enabled
            );
        }
    }

    Ok(())
}

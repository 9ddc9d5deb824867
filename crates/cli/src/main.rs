//! Terminal dashboard: prints the portfolio valuation series.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use clap::{Parser, Subcommand};
use portfolio_tracker_core::config::AppConfig;
use portfolio_tracker_core::models::portfolio::PortfolioConfig;
use portfolio_tracker_core::models::quote::SeriesQuote;
use portfolio_tracker_core::PortfolioValuator;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "portfolio-tracker")]
#[command(about = "Vivendi group stock value tracker", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Write logs to a timestamped file in this directory instead of stderr
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Override the cache file location
    #[arg(long)]
    cache: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Current value and daily change of every series (default)
    Summary,

    /// Full history of one series
    Show {
        /// Series name, e.g. "AUD.VALUE" or "VIV.PA"
        symbol: String,
    },

    /// Refresh now, even if the cache is fresh
    Refresh,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(&cli.log_level, cli.log_dir.as_deref())?;

    let mut config = AppConfig::from_env()?;
    if let Some(cache) = cli.cache {
        config.cache_path = cache;
    }
    tracing::debug!(cache = %config.cache_path.display(), source = %config.price_source, "configuration loaded");

    let mut valuator =
        PortfolioValuator::from_app_config(&config, PortfolioConfig::default_portfolio()).await?;

    match cli.command.unwrap_or(Commands::Summary) {
        Commands::Summary => {
            for quote in valuator.summary().await {
                print_quote_line(&quote);
            }
        }
        Commands::Show { symbol } => {
            let quote = valuator.get_data(&symbol).await;
            print_quote_line(&quote);
            for point in &quote.series {
                println!("{}  {:>14.3}", point.date, point.price);
            }
        }
        Commands::Refresh => {
            let report = valuator.refresh().await;
            println!(
                "refreshed: {} rows, {} rates resolved, {} unresolved",
                report.table.len(),
                report.resolved_rates,
                report.unresolved_rates.len()
            );
        }
    }

    Ok(())
}

fn print_quote_line(quote: &SeriesQuote) {
    println!(
        "{:<32} {:<12} {:>14.3} {:>9}",
        format!("{} ({})", quote.display_name, quote.symbol),
        quote.series.last().map(|p| p.date.to_string()).unwrap_or_default(),
        quote.current_price,
        quote.change_label()
    );
}

fn init_logging(level: &str, log_dir: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("portfolio_tracker={level},portfolio_tracker_core={level}").into()
    });

    let file_layer = match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let stamp = chrono::Local::now().format("%Y-%m-%d %H-%M-%S");
            let file = std::fs::File::create(dir.join(format!("{stamp}.log")))?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };
    let stderr_layer = file_layer
        .is_none()
        .then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr));

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(stderr_layer)
        .init();
    Ok(())
}

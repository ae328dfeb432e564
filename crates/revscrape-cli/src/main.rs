mod commands;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use revscrape_core::ScrapeMethod;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "revscrape")]
#[command(about = "Scrape product pages and their reviews into a local store")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Scrape one product page and persist the product and its reviews
    Scrape(ScrapeArgs),
    /// Print counts and averages for the local store
    Summary {
        /// Store file (defaults to REVSCRAPE_STORE_PATH)
        #[arg(long)]
        store: Option<PathBuf>,
    },
    /// Dump a stored product and its reviews as JSON
    Export {
        /// Product URL as it was scraped
        #[arg(long)]
        url: String,

        /// Destination file
        #[arg(long)]
        output: PathBuf,

        /// Store file (defaults to REVSCRAPE_STORE_PATH)
        #[arg(long)]
        store: Option<PathBuf>,
    },
}

#[derive(Debug, Args)]
struct ScrapeArgs {
    /// Product page URL
    #[arg(long)]
    url: String,

    /// Keep at most this many reviews
    #[arg(long, default_value_t = 100)]
    max_reviews: usize,

    /// browser, anti_bot, plain_http, or fallback to try each in turn
    #[arg(long, default_value = "fallback")]
    method: ScrapeMethod,

    /// Store file (defaults to REVSCRAPE_STORE_PATH)
    #[arg(long)]
    store: Option<PathBuf>,

    /// Also write the scrape response to this file as pretty JSON
    #[arg(long)]
    export: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = revscrape_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Scrape(args) => {
            let store = args.store.unwrap_or_else(|| config.store_path.clone());
            commands::run_scrape(
                &config,
                &commands::ScrapeRequest {
                    url: args.url,
                    method: args.method,
                    max_reviews: args.max_reviews,
                    store,
                    export: args.export,
                },
            )
            .await
        }
        Commands::Summary { store } => {
            commands::run_summary(&store.unwrap_or_else(|| config.store_path.clone()))
        }
        Commands::Export { url, output, store } => commands::run_export(
            &store.unwrap_or_else(|| config.store_path.clone()),
            &url,
            &output,
        ),
    }
}

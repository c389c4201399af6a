use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use linkmeter::analytics::AnalyticsService;
use linkmeter::config::Config;
use linkmeter::links::create_link;
use linkmeter::models::CreateLinkRequest;
use linkmeter::storage::{Stores, TimeRange};

#[derive(Parser)]
#[command(name = "linkmeter-admin")]
#[command(about = "linkmeter link and analytics management CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a short link on behalf of an owner
    Create {
        /// Destination URL
        url: String,
        /// Owner identifier
        #[arg(long)]
        owner: String,
        /// Custom short code (generated when omitted)
        #[arg(long)]
        code: Option<String>,
        /// Display name
        #[arg(long)]
        name: Option<String>,
    },
    /// List an owner's links, newest first
    List {
        #[arg(long)]
        owner: String,
    },
    /// Print an owner's analytics report as JSON
    Report {
        #[arg(long)]
        owner: String,
        /// Start of the event range (unix seconds)
        #[arg(long)]
        start: Option<i64>,
        /// End of the event range (unix seconds)
        #[arg(long)]
        end: Option<i64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    let stores = Stores::connect(&config.database).await?;

    // Ensure database is initialized
    stores.init().await?;

    let result = run(cli.command, &stores).await;
    stores.close().await;
    result
}

async fn run(command: Commands, stores: &Stores) -> Result<()> {
    match command {
        Commands::Create {
            url,
            owner,
            code,
            name,
        } => {
            let request = CreateLinkRequest {
                url,
                custom_code: code,
                name,
            };
            let link = create_link(stores.links.as_ref(), &owner, &request)
                .await
                .context("Failed to create link")?;
            println!(
                "✓ Created '{}' -> {} for owner '{}'",
                link.short_code, link.destination_url, link.owner_id
            );
        }
        Commands::List { owner } => {
            let links = stores.links.list_by_owner(&owner).await?;
            if links.is_empty() {
                println!("No links for owner '{}'", owner);
            } else {
                println!("Links for owner '{}':", owner);
                for link in links {
                    println!(
                        "  {:<16} {:>8} clicks  {}",
                        link.short_code, link.clicks, link.destination_url
                    );
                }
            }
        }
        Commands::Report { owner, start, end } => {
            let analytics = AnalyticsService::new(stores.links.clone(), stores.clicks.clone());
            let report = analytics.summarize(&owner, TimeRange { start, end }).await;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}

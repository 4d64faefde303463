use clap::{Parser, Subcommand};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "cache-cli")]
#[command(about = "Management CLI for the Cache Shield API", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8000")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show cache hit rate, backend info and breaker state
    Stats,
    /// Basic service health
    Health,
    /// Run every health check
    Detailed {
        /// Bypass the cached report
        #[arg(long)]
        force: bool,
    },
    /// List registered health checks
    Checks,
    /// Clear cache entries matching a pattern
    Clear {
        #[arg(short, long, default_value = "*")]
        pattern: String,
    },
    /// Inspect one cache key (requires debug mode on the server)
    Key { key: String },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.url.trim_end_matches('/');

    let res = match cli.command {
        Commands::Stats => client.get(format!("{}/api/v1/cache/stats", base)).send().await?,
        Commands::Health => client.get(format!("{}/api/v1/health", base)).send().await?,
        Commands::Detailed { force } => {
            client
                .get(format!("{}/api/v1/health/detailed", base))
                .query(&[("force", force)])
                .send()
                .await?
        }
        Commands::Checks => client.get(format!("{}/api/v1/health/checks", base)).send().await?,
        Commands::Clear { pattern } => {
            client
                .delete(format!("{}/api/v1/cache/clear", base))
                .query(&[("pattern", pattern)])
                .send()
                .await?
        }
        Commands::Key { key } => client.get(format!("{}/api/v1/cache/key/{}", base, key)).send().await?,
    };

    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: API returned status {}", status);
    }

    match res.json::<Value>().await {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(e) => eprintln!("Response was not JSON: {}", e),
    }
    Ok(())
}

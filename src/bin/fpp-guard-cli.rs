use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "fpp-guard-cli")]
#[command(about = "Operator CLI for fpp-guard", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    #[arg(short, long, env = "FPP_GUARD_ADMIN_KEY", default_value = "CHANGE_ME_IN_PRODUCTION")]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show device status as served to consumers
    Status,
    /// Show circuit breaker statistics
    Breaker,
    /// Force the circuit CLOSED
    Reset,
    /// List dependent jobs and their counters
    Jobs,
    /// Show a cached resource fetched by a job
    Resource { name: String },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.url.trim_end_matches('/');

    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", cli.key))?,
    );

    let request = match &cli.command {
        Commands::Status => client.get(format!("{base}/status")),
        Commands::Breaker => client.get(format!("{base}/admin/breaker")).headers(headers),
        Commands::Reset => client.post(format!("{base}/admin/breaker/reset")).headers(headers),
        Commands::Jobs => client.get(format!("{base}/admin/jobs")).headers(headers),
        Commands::Resource { name } => client
            .get(format!("{base}/admin/resources/{name}"))
            .headers(headers),
    };

    print_response(request.send().await?).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: fpp-guard returned status {}", status);
        if let Ok(text) = res.text().await {
            if !text.is_empty() {
                eprintln!("Response: {}", text);
            }
        }
        std::process::exit(1);
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "wlc-ctl")]
#[command(about = "Operator CLI for the weighted least connections load balancer", long_about = None)]
struct Cli {
    /// Base URL of a running balancer.
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check aggregate backend health
    Health,
    /// Show per-backend connections, requests and ratios
    Metrics,
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.url.trim_end_matches('/');

    let path = match cli.command {
        Commands::Health => "/healthz",
        Commands::Metrics => "/metrics",
    };

    let res = client.get(format!("{}{}", base, path)).send().await?;
    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let status = res.status();
    let text = res.text().await?;

    if !status.is_success() {
        eprintln!("Error: balancer returned status {}", status);
        eprintln!("Response: {}", text);
        return Ok(ExitCode::FAILURE);
    }

    println!("{}", text.trim_end());
    Ok(ExitCode::SUCCESS)
}

use clap::{Parser, Subcommand};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "monitor-cli")]
#[command(about = "Command-line client for the Monitoring App", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:3000")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Query the health endpoint
    Health,
    /// Dump the Prometheus metrics snapshot
    Metrics,
    /// List users
    Users,
    /// Create a user
    CreateUser {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
    },
    /// Hit the simulated error endpoint
    Error {
        /// Number of requests to send
        #[arg(short, long, default_value_t = 1)]
        count: u32,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.url.trim_end_matches('/');

    match cli.command {
        Commands::Health => {
            let res = client.get(format!("{}/health", base)).send().await?;
            print_response(res).await?;
        }
        Commands::Metrics => {
            let res = client.get(format!("{}/metrics", base)).send().await?;
            if !res.status().is_success() {
                eprintln!("Error: metrics endpoint returned status {}", res.status());
                return Ok(());
            }
            print!("{}", res.text().await?);
        }
        Commands::Users => {
            let res = client.get(format!("{}/api/users", base)).send().await?;
            print_response(res).await?;
        }
        Commands::CreateUser { name, email } => {
            let res = client
                .post(format!("{}/api/users", base))
                .json(&json!({ "name": name, "email": email }))
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Error { count } => {
            let mut failures = 0;
            for _ in 0..count {
                let res = client.get(format!("{}/api/error", base)).send().await?;
                if res.status().is_server_error() {
                    failures += 1;
                }
            }
            println!("{} of {} requests failed", failures, count);
        }
    }

    Ok(())
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: server returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}

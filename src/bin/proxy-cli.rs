use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Method, RequestBuilder};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "proxy-cli")]
#[command(about = "Management CLI for the fanout proxy admin API", long_about = None)]
struct Cli {
    /// Base URL of one proxy server.
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    /// Admin API key; leave empty for an open admin API.
    #[arg(short, long, env = "FANOUT_ADMIN_KEY", default_value = "")]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Server version and api count
    Status,
    /// List loaded apis
    List,
    /// Show one api definition
    Show { name: String },
    /// Reload one api from its stored definition
    Reload { name: String },
    /// Delete one api and its stored definition
    Delete { name: String },
}

impl Commands {
    fn request(&self) -> (Method, &'static str, Option<&str>) {
        match self {
            Commands::Status => (Method::GET, "/_status", None),
            Commands::List => (Method::GET, "/_apis", None),
            Commands::Show { name } => (Method::GET, "/_api", Some(name)),
            Commands::Reload { name } => (Method::POST, "/_api/reload", Some(name)),
            Commands::Delete { name } => (Method::DELETE, "/_api", Some(name)),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let mut headers = HeaderMap::new();
    if !cli.key.is_empty() {
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", cli.key))?,
        );
    }

    let (method, path, name) = cli.command.request();
    let mut builder: RequestBuilder = client
        .request(method, format!("{}{}", cli.url.trim_end_matches('/'), path))
        .headers(headers);
    if let Some(name) = name {
        builder = builder.query(&[("name", name)]);
    }

    let res = builder.send().await?;
    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let text = res.text().await?;

    let json: Value = match serde_json::from_str(&text) {
        Ok(json) => json,
        Err(_) => {
            eprintln!("Error: Admin API returned status {}", status);
            eprintln!("Response: {}", text);
            std::process::exit(1);
        }
    };

    if !status.is_success() || json["code"].as_i64() != Some(0) {
        eprintln!(
            "Error ({}): {}",
            status,
            json["msg"].as_str().unwrap_or("unknown error")
        );
        std::process::exit(1);
    }

    println!("{}", serde_json::to_string_pretty(&json["data"])?);
    Ok(())
}

use clap::{Parser, Subcommand};
use serde_json::{Map, Value};

use gitlab_proxy::ProxyRequest;

#[derive(Parser)]
#[command(name = "proxy-cli")]
#[command(about = "Client for a running GitLab proxy gateway", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:3000")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check that the gateway is up
    Health,
    /// Forward one GitLab API call through the gateway
    Request {
        /// API path relative to the upstream base URL, e.g. /projects
        api_path: String,

        /// HTTP method to use upstream
        #[arg(short = 'X', long, default_value = "GET")]
        method: String,

        /// Query parameter, repeatable
        #[arg(short, long = "query", value_name = "KEY=VALUE")]
        query: Vec<String>,

        /// Extra upstream header, repeatable
        #[arg(short = 'H', long = "header", value_name = "NAME:VALUE")]
        header: Vec<String>,

        /// JSON body for non-GET methods
        #[arg(short, long, value_name = "JSON")]
        data: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.url.trim_end_matches('/');

    match cli.command {
        Commands::Health => {
            let res = client.get(format!("{}/", base)).send().await?;
            print_response(res).await?;
        }
        Commands::Request {
            api_path,
            method,
            query,
            header,
            data,
        } => {
            let envelope = build_envelope(api_path, method, &query, &header, data.as_deref())?;
            let res = client
                .post(format!("{}/api/gitlabproxy", base))
                .json(&envelope)
                .send()
                .await?;
            print_response(res).await?;
        }
    }

    Ok(())
}

fn build_envelope(
    api_path: String,
    method: String,
    query: &[String],
    headers: &[String],
    data: Option<&str>,
) -> Result<ProxyRequest, String> {
    let query_params = pairs(query, '=')?;
    let api_headers = pairs(headers, ':')?;
    let post_data = data
        .map(|raw| serde_json::from_str::<Value>(raw).map_err(|e| format!("Invalid --data JSON: {}", e)))
        .transpose()?;

    Ok(ProxyRequest {
        api_path: Some(api_path),
        query_params: (!query_params.is_empty()).then_some(Value::Object(query_params)),
        post_data,
        method: Some(method),
        api_headers: (!api_headers.is_empty()).then_some(Value::Object(api_headers)),
    })
}

/// Split `KEY<sep>VALUE` arguments into an ordered map of string values.
fn pairs(args: &[String], sep: char) -> Result<Map<String, Value>, String> {
    let mut map = Map::new();
    for arg in args {
        let (key, value) = arg
            .split_once(sep)
            .ok_or_else(|| format!("Expected KEY{}VALUE, got '{}'", sep, arg))?;
        let key = key.trim();
        if key.is_empty() {
            return Err(format!("Empty key in '{}'", arg));
        }
        map.insert(key.to_string(), Value::String(value.trim().to_string()));
    }
    Ok(map)
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let text = res.text().await?;

    if !status.is_success() {
        eprintln!("Error: gateway returned status {}", status);
    } else {
        println!("Status: {}", status);
    }

    match serde_json::from_str::<Value>(&text) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) => println!("{}", text),
    }
    Ok(())
}

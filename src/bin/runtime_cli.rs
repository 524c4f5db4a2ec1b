use std::sync::Arc;

use agent_runtime::core::traits::AgentRuntime;
use agent_runtime::core::types::{ChatOptions, RequestOptions};
use agent_runtime::{FactoryOptions, RuntimeFactory};
use serde_json::json;
use tracing_subscriber::EnvFilter;

const USAGE: &str = "usage: runtime_cli <info|health|status|list <resource>|chat <message>>";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = args.first().map(String::as_str).unwrap_or("info");

    let factory = RuntimeFactory::from_env();
    let runtime: Arc<dyn AgentRuntime> = factory.runtime(&FactoryOptions::default())?;

    match command {
        "info" => {
            let info = runtime.runtime_info();
            let capabilities = runtime.capabilities();
            println!(
                "{}",
                serde_json::to_string_pretty(&json!({
                    "info": info,
                    "capabilities": capabilities,
                }))?
            );
        }
        "health" => {
            let status = runtime.health_check(&RequestOptions::default()).await?;
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
        "status" => {
            let status = runtime.control_plane_status(&RequestOptions::default()).await;
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
        "list" => {
            let Some(resource) = args.get(1) else {
                eprintln!("{USAGE}");
                std::process::exit(2);
            };
            let listing = runtime
                .list_control_resource(resource, &RequestOptions::default())
                .await?;
            println!("{}", serde_json::to_string_pretty(&listing)?);
        }
        "chat" => {
            let Some(message) = args.get(1) else {
                eprintln!("{USAGE}");
                std::process::exit(2);
            };
            let payload = json!({
                "messages": [{"role": "user", "content": message}],
            });
            let response = runtime
                .chat_completions(&payload, &ChatOptions::default())
                .await?;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        other => {
            eprintln!("unknown command: {other}");
            eprintln!("{USAGE}");
            std::process::exit(2);
        }
    }

    Ok(())
}

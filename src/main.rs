//! Mock Response Policy - CLI Entry Point

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use mock_response_policy::host::{ExecutionContext, RecordedResponse, RequestHead};
use mock_response_policy::{ApiDefinition, MockConfiguration, MockPolicy, ResponseConfigBuilder};
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(
    name = "mock-response-policy",
    about = "Mock response policy - generate mock configurations from OpenAPI and fabricate responses",
    version
)]
struct Args {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'L', long, default_value = "info", global = true)]
    log_level: Level,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate mock configurations from an OpenAPI v2/v3 document
    Generate {
        /// Path to the API definition (YAML or JSON)
        #[arg(short, long)]
        definition: PathBuf,

        /// Only generate for this path
        #[arg(long, requires = "method")]
        path: Option<String>,

        /// Only generate for this method
        #[arg(long, requires = "path")]
        method: Option<String>,

        /// Indent generated content
        #[arg(long)]
        pretty: bool,
    },

    /// Fabricate the response a configuration produces for one request
    Fabricate {
        /// Path to the mock configuration
        #[arg(short, long)]
        config: PathBuf,

        /// Request method
        #[arg(long, default_value = "GET")]
        method: String,

        /// Request path, optionally with a query string
        #[arg(long, default_value = "/")]
        path: String,

        /// Request header as NAME:VALUE (repeatable)
        #[arg(long = "header", value_name = "NAME:VALUE")]
        headers: Vec<String>,

        /// File holding the request body
        #[arg(long)]
        body: Option<PathBuf>,
    },

    /// Validate a mock configuration and exit
    Validate {
        /// Path to the mock configuration
        #[arg(short, long)]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_max_level(args.log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match args.command {
        Command::Generate {
            definition,
            path,
            method,
            pretty,
        } => generate(definition, path.zip(method), pretty),
        Command::Fabricate {
            config,
            method,
            path,
            headers,
            body,
        } => fabricate(config, method, path, headers, body).await,
        Command::Validate { config } => {
            let config = MockConfiguration::from_file(&config)?;
            println!(
                "Configuration is valid (status {}, {} headers, {})",
                config.status,
                config.headers.len(),
                if config.body_template().is_some() { "with content" } else { "no content" }
            );
            Ok(())
        }
    }
}

fn generate(definition: PathBuf, only: Option<(String, String)>, pretty: bool) -> Result<()> {
    info!(path = ?definition, "Loading API definition");
    let api = ApiDefinition::from_file(&definition)?;
    let builder = ResponseConfigBuilder::new().pretty(pretty);

    match only {
        Some((path, method)) => {
            let operation = api
                .operation(&path, &method)
                .with_context(|| format!("Operation not found: {} {}", method, path))?;
            let config = builder.build(api.definitions(), &operation.responses)?;
            println!("{}", config.to_json_pretty()?);
        }
        None => {
            let mocks = builder.build_all(&api)?;
            println!("{}", serde_json::to_string_pretty(&mocks)?);
        }
    }

    Ok(())
}

async fn fabricate(
    config: PathBuf,
    method: String,
    path: String,
    headers: Vec<String>,
    body: Option<PathBuf>,
) -> Result<()> {
    info!(path = ?config, "Loading configuration");
    let policy = MockPolicy::new(MockConfiguration::from_file(&config)?);

    let (path, query) = match path.split_once('?') {
        Some((path, query)) => (path.to_string(), Some(query.to_string())),
        None => (path, None),
    };
    let mut head = RequestHead::new(method, path);
    head.query = query;
    for header in headers {
        let (name, value) = header
            .split_once(':')
            .with_context(|| format!("Invalid header '{}', expected NAME:VALUE", header))?;
        head.headers.append(name.trim(), value.trim());
    }

    let chunks = match body {
        Some(file) => vec![tokio::fs::read(&file).await?],
        None => Vec::new(),
    };

    let mut context = ExecutionContext::new();
    policy.on_request(&mut context);
    let invoker = context
        .invoker()
        .context("Mock policy did not install a backend")?;

    let mut response = RecordedResponse::default();
    invoker
        .invoke(&head, &mut chunks.into_iter(), &mut response)
        .await;

    println!("HTTP {}", response.status.unwrap_or_default());
    for (name, value) in response.headers.iter() {
        println!("{}: {}", name, value);
    }
    if !response.chunks.is_empty() {
        println!();
        println!("{}", response.body_text());
    }

    Ok(())
}

//! Rewind CLI

use std::path::Path;
use std::process;
use std::sync::Arc;

use anyhow::Context;
use rewind::config::Config;
use rewind::network::NetworkHandler;
use rewind::PolicyContext;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn usage() {
    eprintln!("Rewind v{}", env!("CARGO_PKG_VERSION"));
    eprintln!();
    eprintln!("Usage: rewind <command> <config.toml>");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  serve     Run the proxy with the configured cassette inserted");
    eprintln!("  check     Validate a configuration and print a summary");
    eprintln!();
    eprintln!("Cassettes live in memory: 'serve' starts with an empty cassette and");
    eprintln!("lists what it recorded on shutdown. With record = \"none\" every");
    eprintln!("request is unhandled.");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 3 {
        usage();
        process::exit(1);
    }

    let path = Path::new(&args[2]);
    match args[1].as_str() {
        "serve" => serve(path).await,
        "check" => check(path),
        command => {
            eprintln!("Unknown command: {command}");
            eprintln!("Run 'rewind' for usage information.");
            process::exit(1);
        }
    }
}

async fn serve(path: &Path) -> anyhow::Result<()> {
    let config = Config::from_file(path)
        .with_context(|| format!("loading {}", path.display()))?;
    config.validate_for_proxy()?;

    let context = Arc::new(PolicyContext::from_config(&config));
    let cassette = config.cassette.build()?;
    context.insert_cassette(cassette)?;
    info!(
        "Inserted cassette '{}' ({:?})",
        config.cassette.name, config.cassette.record
    );

    NetworkHandler::new(config, Arc::clone(&context)).run().await?;

    // Cassettes are not persisted; the recorded interactions are reported here
    // and dropped.
    if let Some(cassette) = context.eject_cassette() {
        let recorded = cassette.new_recorded_interactions();
        println!(
            "Cassette '{}' recorded {} interaction(s):",
            cassette.name(),
            recorded.len()
        );
        for interaction in recorded {
            println!("  {interaction}");
        }
    }

    Ok(())
}

fn check(path: &Path) -> anyhow::Result<()> {
    let config = Config::from_file(path)
        .with_context(|| format!("loading {}", path.display()))?;

    println!("Configuration: {}", path.display());
    println!();
    println!("Cassette:          {}", config.cassette.name);
    println!("Record mode:       {:?}", config.cassette.record);
    println!("Match on:          {:?}", config.cassette.match_requests_on);
    println!("Playback repeats:  {}", config.cassette.allow_playback_repeats);
    println!(
        "Live when ejected: {}",
        config.allow_http_connections_when_no_cassette
    );
    println!("Ignore localhost:  {}", config.ignore_localhost);
    if !config.ignore_hosts.is_empty() {
        println!("Ignored hosts:     {}", config.ignore_hosts.join(", "));
    }
    if !config.disabled_integrations.is_empty() {
        println!("Disabled:          {}", config.disabled_integrations.join(", "));
    }

    println!();
    if config.endpoints.is_empty() {
        println!("No endpoints configured; 'serve' needs at least one.");
    }
    for endpoint in &config.endpoints {
        println!(
            "  :{} -> {}",
            endpoint.source_port,
            endpoint.target_uri("/")
        );
    }

    Ok(())
}

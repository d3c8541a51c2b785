mod cli;

use mediabuf::{config, script};
use mediabuf_common::TrackKind;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "mediabuf=trace,mediabuf_stream=trace,mediabuf_common=debug".to_string()
        } else {
            "mediabuf=info,mediabuf_stream=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Replay { script, json } => replay(&script, cli.config.as_deref(), json),
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("mediabuf {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn replay(path: &std::path::Path, config_path: Option<&std::path::Path>, json: bool) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;

    if !path.exists() {
        anyhow::bail!("Script does not exist: {:?}", path);
    }

    let script = script::load_script(path)?;
    tracing::info!("Replaying {} ops on a {} stream", script.ops.len(), script.track);
    let report = script::run(&script, &config)?;

    if json {
        let json_str = serde_json::to_string_pretty(&report)?;
        println!("{}", json_str);
        return Ok(());
    }

    for event in &report.events {
        println!("{}", event);
    }
    println!();
    println!("Track: {}", report.track);
    println!("Buffered: {}", report.buffered);
    println!("Total bytes: {}", report.total_bytes);
    println!("Configs: {}", report.configs);

    Ok(())
}

fn validate_config(path: Option<&std::path::Path>) -> Result<()> {
    let config = match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let config = config::load_config(p)?;
            println!("✓ Configuration is valid");
            config
        }
        None => {
            println!("No config file specified, using defaults");
            config::Config::default()
        }
    };

    for kind in [TrackKind::Audio, TrackKind::Video] {
        let settings = config.stream_settings(kind);
        println!("  {}:", kind);
        println!("    Memory limit: {} bytes", settings.memory_limit);
        println!("    Fudge multiplier: {}", settings.fudge_multiplier);
        println!("    Seek-to-start window: {}", settings.seek_to_start_window);
        println!("    Default buffer duration: {}", settings.default_buffer_duration);
    }

    Ok(())
}

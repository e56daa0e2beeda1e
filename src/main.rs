mod cli;

use clap::Parser;
use serde_json::Value;
use std::path::Path;
use tracing::{debug, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::cli::{Cli, Commands};
use devicewatch_core::{build_service, Config, DeviceWatchError};
use devicewatch_presence::UserOnlineService;

#[tokio::main]
async fn main() -> Result<(), DeviceWatchError> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "devicewatch=debug,devicewatch_core=debug,devicewatch_presence=debug,warn"
    } else {
        "devicewatch=info,warn"
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    // Handle ConfigSample immediately without loading config
    if let Commands::ConfigSample { output } = &cli.command {
        let path = output
            .clone()
            .unwrap_or_else(|| std::path::PathBuf::from("./devicewatch.sample.yaml"));
        Config::sample().save(&path)?;
        println!("Sample config written: {}", path.display());
        return Ok(());
    }

    let mut config = load_config(&cli.config_path)?;
    if let Some(snapshots) = &cli.snapshots {
        config.cache.snapshot_file = Some(snapshots.clone());
    }
    debug!(
        prefix = %config.presence.cache_prefix,
        mode = config.presence.device_limit_mode,
        excluded = config.presence.excluded_ips.len(),
        "configuration resolved"
    );

    let service = build_service(&config)?;
    run(&service, cli.command).await
}

/// Explicit paths must load; otherwise fall back to defaults when nothing is found.
fn load_config(path: &Option<String>) -> Result<Config, DeviceWatchError> {
    match Config::load(path) {
        Ok(config) => Ok(config),
        Err(err) if path.is_none() && err.is_config_not_found() => {
            info!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(err) => Err(err),
    }
}

async fn run(service: &UserOnlineService, command: Commands) -> Result<(), DeviceWatchError> {
    match command {
        Commands::Count { user_id } => {
            let count = service.get_online_count(user_id).await?;
            println!("{}", count);
        }
        Commands::Counts { user_ids } => {
            let counts = service.get_online_counts(&user_ids).await?;
            println!("{}", serde_json::to_string_pretty(&counts)?);
        }
        Commands::Alive { user_ids } => {
            let alive = service.get_alive_list(&user_ids).await?;
            println!("{}", serde_json::to_string_pretty(&alive)?);
        }
        Commands::Devices { user_id } => {
            let devices = service.get_user_devices(user_id).await?;
            println!("{}", serde_json::to_string_pretty(&devices)?);
        }
        Commands::Calculate { file } => {
            let raw = read_snapshot(&file)?;
            let count = service.calculate_device_count(&raw).await?;
            println!("{}", count);
        }
        Commands::ConfigSample { .. } => {
            // Already handled
        }
    }
    Ok(())
}

fn read_snapshot(path: &Path) -> Result<Value, DeviceWatchError> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn explicit_missing_config_is_an_error() {
        let path = Some("/nonexistent/devicewatch.yaml".to_string());
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn reads_raw_snapshot_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"node_A_1": {{"aliveIps": ["1.1.1.1_A"]}}}}"#).unwrap();

        let raw = read_snapshot(file.path()).unwrap();
        assert!(raw.get("node_A_1").is_some());
    }
}

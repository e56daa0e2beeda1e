use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "devicewatch", author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file path
    #[arg(short, long = "config", value_name = "FILE")]
    pub config_path: Option<String>,

    /// Presence snapshot file (overrides cache.snapshot_file)
    #[arg(short, long, value_name = "FILE")]
    pub snapshots: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Online device count for one user
    Count {
        /// User ID
        user_id: i64,
    },

    /// Online device counts for several users, zeros included
    Counts {
        /// User IDs
        #[arg(required = true)]
        user_ids: Vec<i64>,
    },

    /// Users with at least one alive device
    Alive {
        /// User IDs
        #[arg(required = true)]
        user_ids: Vec<i64>,
    },

    /// Device listing for one user
    Devices {
        /// User ID
        user_id: i64,
    },

    /// Count devices in a raw snapshot file
    Calculate {
        /// JSON file holding one user's cached value
        file: PathBuf,
    },

    /// Generate sample configuration
    ConfigSample {
        /// Output path
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_batch_commands() {
        let cli = Cli::parse_from(["devicewatch", "--snapshots", "s.json", "counts", "1", "2"]);
        assert_eq!(cli.snapshots, Some(PathBuf::from("s.json")));
        match cli.command {
            Commands::Counts { user_ids } => assert_eq!(user_ids, vec![1, 2]),
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn config_flag_takes_a_path() {
        let cli =
            Cli::try_parse_from(["devicewatch", "--config", "x.yaml", "count", "1"]).unwrap();
        assert_eq!(cli.config_path.as_deref(), Some("x.yaml"));
        assert!(matches!(cli.command, Commands::Count { user_id: 1 }));

        let short = Cli::try_parse_from(["devicewatch", "-c", "y.yaml", "devices", "2"]).unwrap();
        assert_eq!(short.config_path.as_deref(), Some("y.yaml"));
    }

    #[test]
    fn batch_commands_need_ids() {
        assert!(Cli::try_parse_from(["devicewatch", "alive"]).is_err());
    }
}

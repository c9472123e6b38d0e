pub mod commands;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::Config;

#[derive(Parser)]
#[command(name = "magpie")]
#[command(about = "Concurrent review harvester for infinite-scroll place pages", long_about = None)]
pub struct Cli {
    /// Path to a config file (default: ~/.config/magpie/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Collect reviews for every target in the discovery file
    Harvest(HarvestArgs),
    /// List the targets in a discovery file without harvesting
    Targets {
        /// Path to the discovery JSON file
        input: PathBuf,
    },
    /// Summarize a previous run from its output directory
    Report {
        /// Output directory of the run to summarize
        output_dir: PathBuf,
    },
}

#[derive(Args)]
pub struct HarvestArgs {
    /// Path to the discovery JSON file (array of targets)
    pub input: PathBuf,

    /// Directory for per-target artifacts and the run log
    #[arg(short, long, default_value = "reviews")]
    pub output_dir: PathBuf,

    /// Maximum reviews to collect per target (default: exhaust the page)
    #[arg(short, long)]
    pub max_reviews: Option<usize>,

    /// Number of concurrent workers, one browser each
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Index of the first target to process
    #[arg(long)]
    pub start_from: Option<usize>,

    /// Number of targets to process from --start-from
    #[arg(long)]
    pub limit: Option<usize>,

    /// Run the browser with a visible window
    #[arg(long)]
    pub headed: bool,
}

impl HarvestArgs {
    /// Command-line flags override file values.
    pub fn apply(&self, config: &mut Config) {
        if let Some(max) = self.max_reviews {
            config.harvest.max_reviews = Some(max);
        }
        if let Some(workers) = self.workers {
            config.harvest.workers = workers;
        }
        if let Some(start) = self.start_from {
            config.harvest.start_from = start;
        }
        if let Some(limit) = self.limit {
            config.harvest.limit = Some(limit);
        }
        if self.headed {
            config.browser.headless = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_config() {
        let args = HarvestArgs {
            input: "targets.json".into(),
            output_dir: "reviews".into(),
            max_reviews: Some(25),
            workers: Some(4),
            start_from: Some(10),
            limit: Some(5),
            headed: true,
        };
        let mut config = Config::default();
        args.apply(&mut config);

        assert_eq!(config.harvest.max_reviews, Some(25));
        assert_eq!(config.harvest.workers, 4);
        assert_eq!(config.harvest.start_from, 10);
        assert_eq!(config.harvest.limit, Some(5));
        assert!(!config.browser.headless);
    }

    #[test]
    fn test_unset_flags_keep_config() {
        let args = HarvestArgs {
            input: "targets.json".into(),
            output_dir: "reviews".into(),
            max_reviews: None,
            workers: None,
            start_from: None,
            limit: None,
            headed: false,
        };
        let mut config = Config::default();
        config.harvest.workers = 3;
        args.apply(&mut config);

        assert_eq!(config.harvest.workers, 3);
        assert!(config.browser.headless);
    }
}

use anyhow::{anyhow, Context};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::info;

/// Command-line knobs for the solver, meant to be flattened into a binary.
#[derive(Parser, Debug, Clone, Default)]
#[command(
    name = "mapf-cbs",
    about = "Conflict-Based Search for multi-agent path finding.",
    version = "0.1"
)]
pub struct Cli {
    #[arg(long, help = "Path to a YAML solver config file")]
    pub config: Option<String>,

    #[arg(long, help = "Maximum number of high-level nodes to expand")]
    pub max_high_level_nodes: Option<usize>,

    #[arg(long, help = "Wall-clock budget in milliseconds")]
    pub time_limit_ms: Option<u64>,

    #[arg(long, help = "Maximum node expansions per low-level search")]
    pub max_low_level_expansions: Option<usize>,

    #[arg(long, help = "Latest time step a path may use")]
    pub max_time_horizon: Option<usize>,

    #[arg(
        long,
        help = "Plan the root solution with one task per agent",
        default_value_t = false
    )]
    pub concurrent_root: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub max_high_level_nodes: Option<usize>,
    pub time_limit_ms: Option<u64>,
    pub max_low_level_expansions: Option<usize>,
    pub max_time_horizon: Option<usize>,
    pub concurrent_root: bool,
}

impl Config {
    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let config: Config =
            serde_yaml::from_str(yaml).context("failed to parse solver config")?;
        config.validate()?;
        Ok(config)
    }

    /// Reads the file named by `--config`, if any, then applies the other
    /// command-line flags on top.
    pub fn load(cli: &Cli) -> anyhow::Result<Self> {
        let config = if let Some(config_file) = cli.config.as_ref() {
            let config_str = std::fs::read_to_string(config_file)
                .with_context(|| format!("cannot read config file: {config_file}"))?;
            Config::from_yaml_str(&config_str)
                .with_context(|| format!("error with config file: {config_file}"))?
        } else {
            info!("No config file specified, using default config");
            Config::default()
        };
        config.override_from_command_line(cli)
    }

    pub fn override_from_command_line(mut self, cli: &Cli) -> anyhow::Result<Self> {
        if let Some(max_high_level_nodes) = cli.max_high_level_nodes {
            self.max_high_level_nodes = Some(max_high_level_nodes);
        }
        if let Some(time_limit_ms) = cli.time_limit_ms {
            self.time_limit_ms = Some(time_limit_ms);
        }
        if let Some(max_low_level_expansions) = cli.max_low_level_expansions {
            self.max_low_level_expansions = Some(max_low_level_expansions);
        }
        if let Some(max_time_horizon) = cli.max_time_horizon {
            self.max_time_horizon = Some(max_time_horizon);
        }
        self.concurrent_root |= cli.concurrent_root;

        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let budgets = [
            ("max_high_level_nodes", self.max_high_level_nodes.map(|v| v as u64)),
            ("time_limit_ms", self.time_limit_ms),
            (
                "max_low_level_expansions",
                self.max_low_level_expansions.map(|v| v as u64),
            ),
            ("max_time_horizon", self.max_time_horizon.map(|v| v as u64)),
        ];
        for (name, value) in budgets {
            if value == Some(0) {
                return Err(anyhow!("{name} must be greater than 0"));
            }
        }
        Ok(())
    }

    pub fn time_limit(&self) -> Option<Duration> {
        self.time_limit_ms.map(Duration::from_millis)
    }
}

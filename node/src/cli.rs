//! # CLI Interface
//!
//! Defines the command-line argument structure for `coffer-node` using
//! `clap` derive. Supports three subcommands: `run`, `address`, and
//! `version`.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use coffer_core::config::{DEFAULT_METRICS_PORT, DEFAULT_RPC_PORT};
use coffer_core::Address;

use crate::logging::LogFormat;

/// Coffer vault node.
///
/// Hosts one tokenized vault behind a dispatch router, serves the
/// JSON-RPC API and live event stream, and exposes Prometheus metrics.
#[derive(Parser, Debug)]
#[command(
    name = "coffer-node",
    about = "Coffer vault node",
    version,
    propagate_version = true
)]
pub struct CofferNodeCli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands for the Coffer node binary.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Deploy the configured vault and serve it.
    Run(RunArgs),
    /// Print the address the configured vault would be deployed at.
    Address(AddressArgs),
    /// Print version information and exit.
    Version,
}

/// Arguments for the `run` subcommand.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Path to the node configuration file (JSON).
    ///
    /// When omitted, a devnet vault with no genesis balances is served.
    #[arg(long, short = 'c', env = "COFFER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Port for the JSON-RPC and REST API.
    #[arg(long, env = "COFFER_RPC_PORT", default_value_t = DEFAULT_RPC_PORT)]
    pub rpc_port: u16,

    /// Port for the Prometheus metrics endpoint.
    #[arg(long, env = "COFFER_METRICS_PORT", default_value_t = DEFAULT_METRICS_PORT)]
    pub metrics_port: u16,

    /// Log output format.
    #[arg(
        long,
        env = "COFFER_LOG_FORMAT",
        value_enum,
        ignore_case = true,
        default_value_t = LogFormat::Pretty
    )]
    pub log_format: LogFormat,

    /// Verbosity of the coffer crates when `RUST_LOG` is unset.
    #[arg(long, env = "COFFER_LOG_LEVEL", default_value_t = tracing::Level::INFO)]
    pub log_level: tracing::Level,
}

/// Arguments for the `address` subcommand.
#[derive(Parser, Debug)]
pub struct AddressArgs {
    /// Path to the node configuration file (JSON).
    #[arg(long, short = 'c', env = "COFFER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Overrides the deployer from the configuration.
    #[arg(long)]
    pub deployer: Option<Address>,

    /// Overrides the seed from the configuration (hex, up to 32 bytes).
    #[arg(long)]
    pub seed: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli_structure() {
        // Ensures the derive macros produce a valid CLI definition.
        CofferNodeCli::command().debug_assert();
    }

    #[test]
    fn run_defaults_to_protocol_ports() {
        let cli = CofferNodeCli::parse_from(["coffer-node", "run"]);
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.rpc_port, DEFAULT_RPC_PORT);
        assert_eq!(args.metrics_port, DEFAULT_METRICS_PORT);
        assert_eq!(args.log_format, LogFormat::Pretty);
        assert_eq!(args.log_level, tracing::Level::INFO);
    }

    #[test]
    fn run_accepts_json_logs_at_debug() {
        let cli = CofferNodeCli::parse_from([
            "coffer-node",
            "run",
            "--log-format",
            "json",
            "--log-level",
            "debug",
        ]);
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.log_format, LogFormat::Json);
        assert_eq!(args.log_level, tracing::Level::DEBUG);
    }

    #[test]
    fn address_accepts_hex_deployer() {
        let deployer = Address::from_label("deployer");
        let cli = CofferNodeCli::parse_from([
            "coffer-node",
            "address",
            "--deployer",
            &deployer.to_hex(),
            "--seed",
            "0x01",
        ]);
        let Commands::Address(args) = cli.command else {
            panic!("expected address");
        };
        assert_eq!(args.deployer, Some(deployer));
        assert_eq!(args.seed.as_deref(), Some("0x01"));
    }
}

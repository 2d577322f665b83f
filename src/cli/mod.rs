//! CLI module for Keygate
//!
//! Subcommands:
//! - `verify`: verify a key against a fixtures file and evaluate a query
//! - `hash`: print the stored hash of a secret
//! - `generate`: create a new secret with its hash

pub mod generate;
pub mod hash;
pub mod verify;

use clap::{Parser, Subcommand};

use crate::config::AppConfig;
use crate::infrastructure::logging;

/// Keygate - API key verification and permission evaluation
#[derive(Parser)]
#[command(name = "keygate")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Verify a key and optionally evaluate required permissions
    Verify(verify::VerifyArgs),

    /// Hash a secret the way the key store expects it
    Hash(hash::HashArgs),

    /// Generate a new key secret
    Generate(generate::GenerateArgs),
}

/// Load configuration and install logging; shared by every subcommand
fn bootstrap() -> anyhow::Result<AppConfig> {
    dotenvy::dotenv().ok();

    let config = AppConfig::load()?;
    logging::init_logging(&config.logging);

    Ok(config)
}

fn print_json(value: &serde_json::Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

//! Generate command - creates a fresh secret

use clap::Args;
use serde_json::json;
use uuid::Uuid;

use crate::create_key_hasher;
use crate::infrastructure::key::KeyHasher;

#[derive(Args, Clone)]
pub struct GenerateArgs {
    /// Prefix for the secret (overrides `verification.key_prefix`)
    #[arg(long)]
    pub prefix: Option<String>,
}

pub async fn run(args: GenerateArgs) -> anyhow::Result<()> {
    let config = super::bootstrap()?;

    let hasher = match args.prefix {
        Some(prefix) => create_key_hasher(&config).with_prefix(prefix),
        None => create_key_hasher(&config),
    };

    super::print_json(&generate_output(&hasher))
}

/// The secret is printed once here and never stored
fn generate_output(hasher: &KeyHasher) -> serde_json::Value {
    let generated = hasher.generate();

    json!({
        "id": format!("key_{}", Uuid::new_v4().simple()),
        "secret": generated.secret,
        "start": generated.start,
        "hash": generated.hash,
    })
}

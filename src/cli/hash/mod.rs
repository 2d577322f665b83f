//! Hash command - prints the stored form of a secret

use clap::Args;
use serde_json::json;

use crate::create_key_hasher;

#[derive(Args, Clone)]
pub struct HashArgs {
    /// Secret to hash
    #[arg(long)]
    pub key: String,
}

pub async fn run(args: HashArgs) -> anyhow::Result<()> {
    let config = super::bootstrap()?;
    let hasher = create_key_hasher(&config);

    super::print_json(&hash_output(&hasher, &args.key))
}

fn hash_output(hasher: &crate::infrastructure::key::KeyHasher, secret: &str) -> serde_json::Value {
    match hasher.check_format(secret) {
        Ok(()) => json!({ "hash": hasher.hash(secret) }),
        Err(e) => json!({ "hash": hasher.hash(secret), "warning": e.to_string() }),
    }
}

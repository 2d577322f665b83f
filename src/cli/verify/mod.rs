//! Verify command - checks a key against a fixtures file

use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use serde_json::json;
use tracing::info;

use crate::create_auth_context;
use crate::domain::key::{KeyStore, WorkspaceId};
use crate::domain::permission::PermissionQuery;
use crate::domain::VerificationResult;
use crate::infrastructure::auth::AuthContext;

#[derive(Args, Clone)]
pub struct VerifyArgs {
    /// JSON file with roles and keys
    #[arg(long)]
    pub fixtures: PathBuf,

    /// Secret to verify
    #[arg(long)]
    pub key: String,

    /// Workspace the key must belong to
    #[arg(long)]
    pub workspace: Option<String>,

    /// Permission of which at least one must be granted (repeatable)
    #[arg(long = "any")]
    pub any: Vec<String>,

    /// Permission that must be granted (repeatable)
    #[arg(long = "all")]
    pub all: Vec<String>,
}

pub async fn run(args: VerifyArgs) -> anyhow::Result<()> {
    let config = super::bootstrap()?;

    let fixtures = crate::infrastructure::key::KeyFixtures::from_file(&args.fixtures)?;
    let store = fixtures
        .into_store(&crate::create_key_hasher(&config))
        .await?;
    let context = create_auth_context(&config, Arc::new(store))?;

    info!(fixtures = %args.fixtures.display(), "Verifying key");

    let output = execute(&context, &args).await?;
    super::print_json(&output)
}

/// `--any` and `--all` combine with AND; neither means verification only
fn build_query(any: &[String], all: &[String]) -> anyhow::Result<Option<PermissionQuery>> {
    let mut parts = Vec::new();

    if !any.is_empty() {
        parts.push(PermissionQuery::any_of(any)?);
    }
    if !all.is_empty() {
        parts.push(PermissionQuery::all_of(all)?);
    }

    Ok(match parts.len() {
        0 => None,
        1 => parts.pop(),
        _ => Some(PermissionQuery::and(parts)),
    })
}

async fn execute<S>(context: &AuthContext<S>, args: &VerifyArgs) -> anyhow::Result<serde_json::Value>
where
    S: KeyStore + 'static,
{
    let workspace_id = args
        .workspace
        .as_deref()
        .map(WorkspaceId::new)
        .transpose()?;
    let query = build_query(&args.any, &args.all)?;

    let principal = match context.verify(&args.key, workspace_id.as_ref()).await? {
        VerificationResult::Valid(principal) => principal,
        VerificationResult::Invalid(reason) => {
            return Ok(json!({
                "valid": false,
                "reason": reason.as_str(),
            }));
        }
    };

    let mut output = json!({
        "valid": true,
        "keyId": principal.key_id.as_str(),
        "workspaceId": principal.workspace_id.as_str(),
        "isRootKey": principal.is_root_key,
        "ownerId": principal.owner_id,
        "remaining": principal.remaining,
        "permissions": principal
            .granted_permissions
            .iter()
            .map(|p| p.as_str())
            .collect::<Vec<_>>(),
    });

    if let Some(query) = query {
        let evaluation = principal.evaluate(&query);
        output["query"] = json!(query.to_string());
        output["authorized"] = json!(evaluation.valid);
        output["message"] = json!(evaluation.message);
    }

    Ok(output)
}

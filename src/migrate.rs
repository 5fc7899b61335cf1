//! One-off email migration.
//!
//! Copies existing identity-provider users' email addresses into the
//! `emails` lookup collection, keyed by the lowercased address. Idempotent:
//! addresses already present are skipped, and the remaining writes land as
//! one batch.

use miette::{IntoDiagnostic, Result};
use serde::{Deserialize, Serialize};
use std::fs;

use crate::policy::types::{FieldValue, Snapshot};
use crate::store::{MemoryStore, WriteBatch};

/// One user record from the identity-provider export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthUser {
    pub uid: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// Root structure of the auth export JSON file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthExport {
    pub users: Vec<AuthUser>,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct MigrationSummary {
    pub added: usize,
    pub skipped: usize,
}

/// Read and parse the identity-provider user export.
pub fn load_auth_export(file_path: &str) -> Result<AuthExport> {
    tracing::info!("Loading auth export from {}", file_path);

    let content = fs::read_to_string(file_path).into_diagnostic().map_err(|e| {
        miette::miette!("Failed to read auth export at '{}': {}", file_path, e)
    })?;

    let export: AuthExport = serde_json::from_str(&content)
        .into_diagnostic()
        .map_err(|e| {
            miette::miette!(
                "Failed to parse auth export JSON: {}\n\nExpected format:\n{{\n  \"users\": [\n    {{ \"uid\": \"abc123\", \"email\": \"alice@example.com\" }}\n  ]\n}}",
                e
            )
        })?;

    tracing::info!("Found {} user(s) in export", export.users.len());
    Ok(export)
}

/// Copy each user's email into the `emails` collection (idempotent).
pub fn migrate_emails(store: &mut MemoryStore, users: &[AuthUser]) -> MigrationSummary {
    let mut batch = WriteBatch::new();
    let mut summary = MigrationSummary::default();

    for user in users {
        let Some(email) = user.email.as_deref() else {
            continue;
        };
        let email_lower = email.to_lowercase();

        if store.get("emails", &email_lower).is_some() {
            tracing::debug!(email = %email_lower, "Email already migrated, skipping");
            summary.skipped += 1;
            continue;
        }

        let doc = Snapshot::new()
            .with("email", FieldValue::string(&email_lower))
            .with("uid", FieldValue::string(&user.uid))
            .with("createdAt", FieldValue::server_assigned())
            .with("updatedAt", FieldValue::server_assigned());
        batch.set("emails", &email_lower, doc);
        summary.added += 1;
        tracing::info!(email = %email_lower, uid = %user.uid, "Queued email for migration");
    }

    if !batch.is_empty() {
        store.commit(batch);
    }

    tracing::info!(
        added = summary.added,
        skipped = summary.skipped,
        "Email migration complete"
    );
    summary
}

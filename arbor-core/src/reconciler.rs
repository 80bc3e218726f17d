//! Schema reconciliation access.
//!
//! The diffing routine itself belongs to the platform core, which installs
//! it in the database as `arbor_schema_sync(scope, apply, site_id)`. This
//! module only invokes it and relays the change descriptions it returns.

use async_trait::async_trait;
use tokio_postgres::Client;

use crate::commands::schema_sync::Scope;
use crate::context::SiteContext;
use crate::db;
use crate::error::Result;

/// The platform's built-in schema-reconciliation routine.
#[async_trait]
pub trait SchemaReconciler {
    /// Reconcile the site's schema, optionally filtered to a scope.
    ///
    /// When `apply` is false the routine reports what it would change
    /// without mutating anything. Returns one human-readable description
    /// per change; an empty list means the schema already matches.
    async fn reconcile(
        &self,
        ctx: &SiteContext,
        scope: Option<Scope>,
        apply: bool,
    ) -> Result<Vec<String>>;
}

/// Reconciler backed by the platform's `arbor_schema_sync` SQL function.
///
/// Mutating runs hold a per-site advisory lock for the duration of the
/// reconciliation, so two operators cannot reconcile one site concurrently.
/// Dry runs take no lock.
pub struct PgSchemaReconciler<'a> {
    client: &'a Client,
}

impl<'a> PgSchemaReconciler<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    async fn invoke(
        &self,
        ctx: &SiteContext,
        scope: Option<Scope>,
        apply: bool,
    ) -> Result<Vec<String>> {
        let scope_arg = scope.map(|s| s.as_str());

        let rows = self
            .client
            .query(
                "SELECT change FROM arbor_schema_sync($1, $2, $3) AS t(change)",
                &[&scope_arg, &apply, &ctx.site_id],
            )
            .await?;

        Ok(rows.into_iter().map(|row| row.get(0)).collect())
    }
}

#[async_trait]
impl SchemaReconciler for PgSchemaReconciler<'_> {
    async fn reconcile(
        &self,
        ctx: &SiteContext,
        scope: Option<Scope>,
        apply: bool,
    ) -> Result<Vec<String>> {
        if !apply {
            return self.invoke(ctx, scope, false).await;
        }

        let lock_name = format!("arbor_dbdelta_{}", ctx.table_prefix);
        db::acquire_advisory_lock(self.client, &lock_name).await?;

        let result = self.invoke(ctx, scope, true).await;

        // Always release the advisory lock
        if let Err(e) = db::release_advisory_lock(self.client, &lock_name).await {
            log::warn!("Failed to release advisory lock: {}", e);
        }

        result
    }
}

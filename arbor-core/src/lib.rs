//! Administration library for Arbor multi-tenant CMS installations.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use arbor_core::config::ArborConfig;
//! use arbor_core::Arbor;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ArborConfig::load(None, &Default::default())?;
//! let arbor = Arbor::new(config).await?;
//! let report = arbor.scrub().await?;
//! println!("Cleared {} options", report.options_cleared.len());
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! - [`config`] — Configuration loading (TOML, env vars, CLI overrides)
//! - [`db`] — Database connections, TLS, advisory locks
//! - [`context`] — Per-site execution context (tenant table prefixes)
//! - [`sites`] — Site directory access for multi-tenant installations
//! - [`store`] — Option store access
//! - [`engine`] — Search-and-replace engine access
//! - [`reconciler`] — Schema reconciliation access
//! - [`commands`] — Individual command implementations
//! - [`error`] — Error types

pub mod commands;
pub mod config;
pub mod context;
pub mod db;
pub mod engine;
pub mod error;
pub mod reconciler;
pub mod sites;
pub mod store;

use config::ArborConfig;
use context::SiteContext;
use error::{ArborError, Result};
use sites::SiteDirectory;
use tokio_postgres::Client;

pub use commands::schema_sync::{NetworkSyncReport, Scope, SyncReport};
pub use commands::scrub::{ScrubReport, SENSITIVE_OPTIONS};
pub use commands::search_replace::ReplaceReport;
pub use config::CliOverrides;
pub use engine::TableColumns;
pub use sites::Site;

/// Main entry point for the arbor library.
///
/// Create an `Arbor` instance with a config and use its methods to run
/// administration commands programmatically.
pub struct Arbor {
    pub config: ArborConfig,
    client: Client,
}

impl Arbor {
    /// Create a new Arbor instance, connecting to the database.
    ///
    /// If `connect_retries` is configured, retries with exponential backoff.
    pub async fn new(config: ArborConfig) -> Result<Self> {
        let conn_string = config.connection_string()?;
        let client = db::connect_with_config(
            &conn_string,
            &config.database.ssl_mode,
            config.database.connect_retries,
            config.database.connect_timeout_secs,
            config.database.statement_timeout_secs,
        )
        .await?;
        Ok(Self { config, client })
    }

    /// Create a new Arbor instance with an existing database client.
    pub fn with_client(config: ArborConfig, client: Client) -> Self {
        Self { config, client }
    }

    /// Get a reference to the underlying database client.
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Resolve the execution context for the given site, or the primary
    /// site when `site_id` is `None`.
    ///
    /// An explicit site id is checked against the site directory on
    /// multi-tenant installations; single-tenant installs only have the
    /// primary site.
    pub async fn site_context(&self, site_id: Option<i64>) -> Result<SiteContext> {
        let settings = &self.config.site;
        match site_id {
            None => Ok(SiteContext::primary(settings)),
            Some(id) if id == settings.primary_site_id => Ok(SiteContext::primary(settings)),
            Some(id) => {
                if !settings.multi_tenant {
                    return Err(ArborError::NotMultiTenant);
                }
                let directory = sites::PgSiteDirectory::new(&self.client, &settings.table_prefix);
                match directory.get_site(id).await? {
                    Some(site) => Ok(SiteContext::for_site(settings, site.site_id)),
                    None => Err(ArborError::SiteNotFound { site_id: id }),
                }
            }
        }
    }

    /// Delete the fixed set of sensitive options from the given site.
    pub async fn scrub(&self) -> Result<ScrubReport> {
        self.scrub_site(&SiteContext::primary(&self.config.site))
            .await
    }

    /// Delete the fixed set of sensitive options from a specific site context.
    pub async fn scrub_site(&self, ctx: &SiteContext) -> Result<ScrubReport> {
        let store = store::PgOptionStore::new(&self.client);
        commands::scrub::execute(&store, ctx, SENSITIVE_OPTIONS).await
    }

    /// Replace `from` with `to` across the content-table allowlist.
    ///
    /// Passing `None` for `mapping` uses the built-in allowlist.
    pub async fn search_replace_url(
        &self,
        ctx: &SiteContext,
        from: &str,
        to: &str,
        mapping: Option<&[TableColumns]>,
    ) -> Result<ReplaceReport> {
        let engine = engine::PgSearchReplaceEngine::new(&self.client);
        let default;
        let mapping = match mapping {
            Some(m) => m,
            None => {
                default = commands::search_replace::default_mapping();
                default.as_slice()
            }
        };
        commands::search_replace::execute(&engine, ctx, from, to, mapping).await
    }

    /// Run the schema-reconciliation routine for a single site.
    pub async fn schema_sync(
        &self,
        ctx: &SiteContext,
        scope: Option<Scope>,
        dry_run: bool,
    ) -> Result<SyncReport> {
        let reconciler = reconciler::PgSchemaReconciler::new(&self.client);
        commands::schema_sync::execute_local(&reconciler, ctx, scope, dry_run).await
    }

    /// Run the schema-reconciliation routine across every active site.
    pub async fn schema_sync_network(&self, dry_run: bool) -> Result<NetworkSyncReport> {
        let reconciler = reconciler::PgSchemaReconciler::new(&self.client);
        let directory =
            sites::PgSiteDirectory::new(&self.client, &self.config.site.table_prefix);
        commands::schema_sync::execute_network(
            &reconciler,
            &directory,
            &self.config.site,
            dry_run,
        )
        .await
    }
}

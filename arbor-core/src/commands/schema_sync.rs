//! Run the platform's schema-reconciliation routine for one site or for
//! every active site in a multi-tenant installation.

use serde::Serialize;

use crate::config::SiteSettings;
use crate::context::SiteContext;
use crate::error::{ArborError, Result};
use crate::reconciler::SchemaReconciler;
use crate::sites::SiteDirectory;

/// Which subset of the schema a reconciliation pass targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Scope {
    /// Tenant-local and shared tables.
    All,
    /// Tenant-local tables only.
    Blog,
    /// Shared tables only.
    Global,
    /// Network-wide tables of a multi-tenant installation only.
    MsGlobal,
}

impl Scope {
    /// Parse a scope word as passed on the command line.
    ///
    /// An empty string means "no scope filter". Unrecognized words also
    /// degrade to no filter, loudly — rejecting them outright would break
    /// operators relying on the historical lenient behavior.
    pub fn parse(raw: &str) -> Option<Scope> {
        match raw {
            "all" => Some(Scope::All),
            "blog" => Some(Scope::Blog),
            "global" => Some(Scope::Global),
            "ms_global" => Some(Scope::MsGlobal),
            "" => None,
            other => {
                log::warn!(
                    "Unrecognized scope '{}', running without a scope filter. Valid scopes: all, blog, global, ms_global",
                    other
                );
                None
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::All => "all",
            Scope::Blog => "blog",
            Scope::Global => "global",
            Scope::MsGlobal => "ms_global",
        }
    }
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scope for one site within a network-wide run. Only the primary site owns
/// the installation-wide shared tables, so only its run may touch them.
pub fn scope_for_site(is_primary: bool) -> Scope {
    if is_primary {
        Scope::All
    } else {
        Scope::Blog
    }
}

/// Report returned after a single-site schema sync.
#[derive(Debug, Serialize)]
pub struct SyncReport {
    /// Scope filter the run was constrained to, if any.
    pub scope: Option<Scope>,
    /// Whether mutation was suppressed.
    pub dry_run: bool,
    /// One description per change made (or, in a dry run, proposed).
    /// Empty means the schema already matches.
    pub changes: Vec<String>,
}

/// Result of the schema sync for a single site within a network run.
#[derive(Debug, Serialize)]
pub struct SiteSyncResult {
    /// Site id the run was scoped to.
    pub site_id: i64,
    /// `domain/path` identifier of the site.
    pub domain_path: String,
    /// Scope the site's run was constrained to.
    pub scope: Scope,
    /// Whether the site's run succeeded.
    pub success: bool,
    /// Change descriptions from the site's run.
    pub changes: Vec<String>,
    /// Error text when the run failed.
    pub message: String,
}

/// Aggregate report from a network-wide schema sync.
#[derive(Debug, Serialize)]
pub struct NetworkSyncReport {
    /// Whether mutation was suppressed.
    pub dry_run: bool,
    /// Per-site results, in directory enumeration order.
    pub results: Vec<SiteSyncResult>,
    /// Whether every site's run succeeded.
    pub all_succeeded: bool,
}

/// Execute a schema sync for a single site.
pub async fn execute_local<R: SchemaReconciler>(
    reconciler: &R,
    ctx: &SiteContext,
    scope: Option<Scope>,
    dry_run: bool,
) -> Result<SyncReport> {
    let changes = reconciler.reconcile(ctx, scope, !dry_run).await?;

    log::info!(
        "Schema sync completed; site_id={}, scope={}, dry_run={}, changes={}",
        ctx.site_id,
        scope.map(|s| s.as_str()).unwrap_or("<none>"),
        dry_run,
        changes.len()
    );

    Ok(SyncReport {
        scope,
        dry_run,
        changes,
    })
}

/// Execute a schema sync across every active site of the installation.
///
/// Sites are processed sequentially in directory order, each with its own
/// context. A failed site is recorded and the loop continues — there is no
/// rollback across sites.
pub async fn execute_network<R, D>(
    reconciler: &R,
    directory: &D,
    settings: &SiteSettings,
    dry_run: bool,
) -> Result<NetworkSyncReport>
where
    R: SchemaReconciler,
    D: SiteDirectory,
{
    if !settings.multi_tenant {
        return Err(ArborError::NotMultiTenant);
    }

    let sites = directory.list_active_sites().await?;
    log::info!("Syncing schema across network; sites={}", sites.len());

    let mut results = Vec::with_capacity(sites.len());

    for site in &sites {
        let ctx = SiteContext::for_site(settings, site.site_id);
        let scope = scope_for_site(ctx.is_primary);

        log::info!(
            "Updating site; site_id={}, site={}, scope={}",
            site.site_id,
            site.domain_path(),
            scope
        );

        match execute_local(reconciler, &ctx, Some(scope), dry_run).await {
            Ok(report) => {
                results.push(SiteSyncResult {
                    site_id: site.site_id,
                    domain_path: site.domain_path(),
                    scope,
                    success: true,
                    changes: report.changes,
                    message: String::new(),
                });
            }
            Err(e) => {
                log::warn!(
                    "Schema sync failed, continuing; site_id={}, error={}",
                    site.site_id,
                    e
                );
                results.push(SiteSyncResult {
                    site_id: site.site_id,
                    domain_path: site.domain_path(),
                    scope,
                    success: false,
                    changes: Vec::new(),
                    message: e.to_string(),
                });
            }
        }
    }

    let all_succeeded = results.iter().all(|r| r.success);
    Ok(NetworkSyncReport {
        dry_run,
        results,
        all_succeeded,
    })
}

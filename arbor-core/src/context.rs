//! Per-site execution context.
//!
//! Every collaborator call takes a `SiteContext` explicitly instead of
//! reading ambient installation state, so network fan-out can run each
//! site in-process with nothing shared between iterations.

use crate::config::SiteSettings;

/// The site a command operates against: its id, the table prefix that
/// scopes its data partition, and whether it is the installation's
/// designated primary site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteContext {
    /// Site id within the installation.
    pub site_id: i64,
    /// Resolved table prefix for this site's tables.
    pub table_prefix: String,
    /// Whether this site owns the installation-wide shared tables.
    pub is_primary: bool,
}

impl SiteContext {
    /// Build the context for a site id under the given installation settings.
    ///
    /// The primary site uses the base prefix unchanged; every other site
    /// interpolates its id (`arbor_options` vs `arbor_7_options`).
    pub fn for_site(settings: &SiteSettings, site_id: i64) -> Self {
        let is_primary = site_id == settings.primary_site_id;
        let table_prefix = if is_primary {
            settings.table_prefix.clone()
        } else {
            format!("{}{}_", settings.table_prefix, site_id)
        };
        Self {
            site_id,
            table_prefix,
            is_primary,
        }
    }

    /// Context for the primary site.
    pub fn primary(settings: &SiteSettings) -> Self {
        Self::for_site(settings, settings.primary_site_id)
    }

    /// Fully resolved name of a per-site table, e.g. `table("options")`.
    pub fn table(&self, name: &str) -> String {
        format!("{}{}", self.table_prefix, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SiteSettings;

    fn settings() -> SiteSettings {
        SiteSettings {
            table_prefix: "arbor_".to_string(),
            primary_site_id: 1,
            multi_tenant: true,
        }
    }

    #[test]
    fn test_primary_site_uses_base_prefix() {
        let ctx = SiteContext::for_site(&settings(), 1);
        assert!(ctx.is_primary);
        assert_eq!(ctx.table_prefix, "arbor_");
        assert_eq!(ctx.table("options"), "arbor_options");
    }

    #[test]
    fn test_tenant_site_interpolates_id() {
        let ctx = SiteContext::for_site(&settings(), 7);
        assert!(!ctx.is_primary);
        assert_eq!(ctx.table_prefix, "arbor_7_");
        assert_eq!(ctx.table("posts"), "arbor_7_posts");
    }

    #[test]
    fn test_nondefault_primary_site() {
        let mut s = settings();
        s.primary_site_id = 3;
        let ctx = SiteContext::for_site(&s, 3);
        assert!(ctx.is_primary);
        assert_eq!(ctx.table_prefix, "arbor_");

        let other = SiteContext::for_site(&s, 1);
        assert!(!other.is_primary);
        assert_eq!(other.table_prefix, "arbor_1_");
    }
}

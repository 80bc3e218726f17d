//! Site directory operations for multi-tenant installations.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio_postgres::Client;

use crate::db::quote_ident;
use crate::error::Result;

/// A row from the network site directory.
#[derive(Debug, Clone)]
pub struct Site {
    /// Site id within the installation.
    pub site_id: i64,
    /// Domain the site is served from.
    pub domain: String,
    /// Path component under the domain (`/` for root sites).
    pub path: String,
    /// Timestamp when the site was registered.
    pub registered: DateTime<Utc>,
}

impl Site {
    /// Human-readable `domain/path` identifier used in progress output.
    pub fn domain_path(&self) -> String {
        format!("{}{}", self.domain, self.path)
    }
}

/// Read access to the installation's site directory.
///
/// The directory is a read-only snapshot: enumeration order is whatever the
/// backing store returns and is preserved by callers.
#[async_trait]
pub trait SiteDirectory {
    /// List sites that are neither spam, deleted, nor archived.
    async fn list_active_sites(&self) -> Result<Vec<Site>>;

    /// Look up a single site by id, active or not.
    async fn get_site(&self, site_id: i64) -> Result<Option<Site>>;
}

/// Site directory backed by the platform's `{base}sites` table.
pub struct PgSiteDirectory<'a> {
    client: &'a Client,
    sites_table: String,
}

impl<'a> PgSiteDirectory<'a> {
    /// The directory always lives under the base prefix — it is a
    /// network-wide table, not a per-site one.
    pub fn new(client: &'a Client, base_prefix: &str) -> Self {
        Self {
            client,
            sites_table: quote_ident(&format!("{}sites", base_prefix)),
        }
    }
}

#[async_trait]
impl SiteDirectory for PgSiteDirectory<'_> {
    async fn list_active_sites(&self) -> Result<Vec<Site>> {
        let sql = format!(
            "SELECT site_id, domain, path, registered FROM {} \
             WHERE spam = 0 AND deleted = 0 AND archived = 0 \
             ORDER BY site_id",
            self.sites_table
        );

        let rows = self.client.query(&sql, &[]).await?;

        let mut sites = Vec::with_capacity(rows.len());
        for row in rows {
            sites.push(Site {
                site_id: row.get(0),
                domain: row.get(1),
                path: row.get(2),
                registered: row.get(3),
            });
        }

        Ok(sites)
    }

    async fn get_site(&self, site_id: i64) -> Result<Option<Site>> {
        let sql = format!(
            "SELECT site_id, domain, path, registered FROM {} WHERE site_id = $1",
            self.sites_table
        );

        let row = self.client.query_opt(&sql, &[&site_id]).await?;

        Ok(row.map(|row| Site {
            site_id: row.get(0),
            domain: row.get(1),
            path: row.get(2),
            registered: row.get(3),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_path() {
        let site = Site {
            site_id: 2,
            domain: "example.com".to_string(),
            path: "/blog/".to_string(),
            registered: Utc::now(),
        };
        assert_eq!(site.domain_path(), "example.com/blog/");
    }
}

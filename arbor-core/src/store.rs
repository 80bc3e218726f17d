//! Key-value option store access.

use async_trait::async_trait;
use tokio_postgres::Client;

use crate::context::SiteContext;
use crate::db::quote_ident;
use crate::error::Result;

/// Delete access to the platform's per-site options table.
#[async_trait]
pub trait OptionStore {
    /// Request deletion of a named option. Deleting an absent key is a
    /// no-op, not an error.
    async fn delete(&self, ctx: &SiteContext, name: &str) -> Result<()>;
}

/// Option store backed by the site's `{prefix}options` table.
pub struct PgOptionStore<'a> {
    client: &'a Client,
}

impl<'a> PgOptionStore<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl OptionStore for PgOptionStore<'_> {
    async fn delete(&self, ctx: &SiteContext, name: &str) -> Result<()> {
        let sql = format!(
            "DELETE FROM {} WHERE option_name = $1",
            quote_ident(&ctx.table("options"))
        );
        let deleted = self.client.execute(&sql, &[&name]).await?;
        log::debug!(
            "Deleted option; option={}, site_id={}, rows={}",
            name,
            ctx.site_id,
            deleted
        );
        Ok(())
    }
}

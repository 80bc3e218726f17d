//! Search-and-replace engine access.
//!
//! The replacement itself is delegated to SQL's `replace()`; this module
//! only constructs and issues the per-table invocations.

use async_trait::async_trait;
use serde::Serialize;
use tokio_postgres::Client;

use crate::context::SiteContext;
use crate::db::{self, quote_ident};
use crate::error::Result;

/// One entry of the table/column allowlist: a logical (unprefixed) table
/// name and the columns eligible for replacement within it.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TableColumns {
    /// Logical table name; the site context supplies the prefix.
    pub table: String,
    /// Columns to run the replacement over, in order.
    pub columns: Vec<String>,
}

impl TableColumns {
    pub fn new(table: &str, columns: &[&str]) -> Self {
        Self {
            table: table.to_string(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
        }
    }
}

/// A search-and-replace primitive scoped to one table and column set.
#[async_trait]
pub trait SearchReplaceEngine {
    /// Replace `from` with `to` in every listed column of the given table.
    /// Returns the number of rows touched across all columns.
    async fn run(
        &self,
        ctx: &SiteContext,
        from: &str,
        to: &str,
        target: &TableColumns,
    ) -> Result<u64>;
}

/// Engine backed by per-column `replace()` UPDATEs.
///
/// All columns of one table are updated inside a single transaction, so a
/// failing column leaves that table untouched.
pub struct PgSearchReplaceEngine<'a> {
    client: &'a Client,
}

impl<'a> PgSearchReplaceEngine<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SearchReplaceEngine for PgSearchReplaceEngine<'_> {
    async fn run(
        &self,
        ctx: &SiteContext,
        from: &str,
        to: &str,
        target: &TableColumns,
    ) -> Result<u64> {
        let table = quote_ident(&ctx.table(&target.table));

        db::begin(self.client).await?;

        let mut rows_touched = 0u64;
        for column in &target.columns {
            let col = quote_ident(column);
            // strpos() over LIKE: URL text frequently contains `%`, which
            // LIKE would treat as a wildcard.
            let sql = format!(
                "UPDATE {table} SET {col} = replace({col}, $1, $2) WHERE strpos({col}, $1) > 0",
                table = table,
                col = col,
            );
            match self.client.execute(&sql, &[&from, &to]).await {
                Ok(rows) => {
                    log::debug!(
                        "Replaced column; table={}, column={}, rows={}",
                        target.table,
                        column,
                        rows
                    );
                    rows_touched += rows;
                }
                Err(e) => {
                    db::rollback(self.client).await;
                    return Err(e.into());
                }
            }
        }

        db::commit(self.client).await?;

        Ok(rows_touched)
    }
}

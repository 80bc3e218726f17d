//! Replace one URL with another across the content-table allowlist.

use serde::Serialize;
use url::Url;

use crate::context::SiteContext;
use crate::engine::{SearchReplaceEngine, TableColumns};
use crate::error::{ArborError, Result};

/// The static allowlist of content tables and the columns within them that
/// may carry URLs. Order matters: tables are processed as listed.
pub fn default_mapping() -> Vec<TableColumns> {
    vec![
        TableColumns::new("commentmeta", &["meta_key", "meta_value"]),
        TableColumns::new(
            "comments",
            &[
                "comment_author",
                "comment_author_url",
                "comment_content",
                "comment_agent",
            ],
        ),
        TableColumns::new(
            "links",
            &[
                "link_url",
                "link_name",
                "link_image",
                "link_description",
                "link_notes",
                "link_rss",
            ],
        ),
        TableColumns::new("options", &["option_name", "option_value"]),
        TableColumns::new("postmeta", &["meta_key", "meta_value"]),
        TableColumns::new(
            "posts",
            &[
                "post_content",
                "post_title",
                "post_excerpt",
                "post_name",
                "post_content_filtered",
                "guid",
            ],
        ),
        TableColumns::new("term_taxonomy", &["taxonomy", "description"]),
        TableColumns::new("termmeta", &["meta_key", "meta_value"]),
        TableColumns::new("terms", &["name"]),
        TableColumns::new("usermeta", &["meta_key", "meta_value"]),
        TableColumns::new("users", &["user_url", "display_name"]),
    ]
}

/// Restrict the built-in allowlist to the requested tables, preserving
/// allowlist order. Unknown names are a configuration error.
pub fn narrow_mapping(tables: &[String]) -> Result<Vec<TableColumns>> {
    let mapping = default_mapping();

    for requested in tables {
        if !mapping.iter().any(|t| &t.table == requested) {
            let known = mapping
                .iter()
                .map(|t| t.table.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            return Err(ArborError::ConfigError(format!(
                "Table '{}' is not in the allowlist. Known tables: {}",
                requested, known
            )));
        }
    }

    Ok(mapping
        .into_iter()
        .filter(|t| tables.iter().any(|r| r == &t.table))
        .collect())
}

/// Outcome of the replacement over a single table.
#[derive(Debug, Serialize)]
pub struct TableReplaceResult {
    /// Logical table name from the allowlist.
    pub table: String,
    /// Columns the replacement ran over.
    pub columns: Vec<String>,
    /// Whether the engine invocation for this table succeeded.
    pub success: bool,
    /// Rows touched across all columns (0 on failure).
    pub rows_touched: u64,
    /// Error text when the invocation failed.
    pub message: String,
}

/// Aggregate report for a search-replace run.
#[derive(Debug, Serialize)]
pub struct ReplaceReport {
    /// The URL that was searched for.
    pub from: String,
    /// The URL it was replaced with.
    pub to: String,
    /// Per-table outcomes, in allowlist order.
    pub results: Vec<TableReplaceResult>,
    /// Whether every table invocation succeeded.
    pub all_succeeded: bool,
}

/// Reject an empty or non-absolute URL before any side effect occurs.
fn validate_url(flag: &str, value: &str) -> Result<()> {
    if value.is_empty() || Url::parse(value).is_err() {
        return Err(ArborError::InvalidUrl {
            flag: flag.to_string(),
            value: if value.is_empty() {
                "<empty>".to_string()
            } else {
                value.to_string()
            },
        });
    }
    Ok(())
}

/// Execute the search-replace command.
///
/// Issues exactly one engine invocation per mapping entry, in mapping
/// order. A failed invocation is logged and recorded but never aborts the
/// remaining tables.
pub async fn execute<E: SearchReplaceEngine>(
    engine: &E,
    ctx: &SiteContext,
    from: &str,
    to: &str,
    mapping: &[TableColumns],
) -> Result<ReplaceReport> {
    validate_url("--from", from)?;
    validate_url("--to", to)?;

    let mut results = Vec::with_capacity(mapping.len());

    for target in mapping {
        log::info!(
            "Running replacement; table={}, columns={}, from={}, to={}",
            target.table,
            target.columns.join(","),
            from,
            to
        );

        match engine.run(ctx, from, to, target).await {
            Ok(rows) => {
                results.push(TableReplaceResult {
                    table: target.table.clone(),
                    columns: target.columns.clone(),
                    success: true,
                    rows_touched: rows,
                    message: String::new(),
                });
            }
            Err(e) => {
                // Per-table failures are non-fatal; keep going.
                log::warn!(
                    "Replacement failed, continuing; table={}, error={}",
                    target.table,
                    e
                );
                results.push(TableReplaceResult {
                    table: target.table.clone(),
                    columns: target.columns.clone(),
                    success: false,
                    rows_touched: 0,
                    message: e.to_string(),
                });
            }
        }

        log::info!("---");
    }

    let all_succeeded = results.iter().all(|r| r.success);
    Ok(ReplaceReport {
        from: from.to_string(),
        to: to.to_string(),
        results,
        all_succeeded,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::config::SiteSettings;

    /// Engine that records invocations and can fail on a chosen table.
    struct RecordingEngine {
        invocations: Mutex<Vec<(String, Vec<String>, String, String)>>,
        fail_on: Option<&'static str>,
    }

    impl RecordingEngine {
        fn new() -> Self {
            Self {
                invocations: Mutex::new(Vec::new()),
                fail_on: None,
            }
        }
    }

    #[async_trait]
    impl SearchReplaceEngine for RecordingEngine {
        async fn run(
            &self,
            _ctx: &SiteContext,
            from: &str,
            to: &str,
            target: &TableColumns,
        ) -> Result<u64> {
            if self.fail_on == Some(target.table.as_str()) {
                return Err(ArborError::ConfigError(format!(
                    "boom: {}",
                    target.table
                )));
            }
            self.invocations.lock().unwrap().push((
                target.table.clone(),
                target.columns.clone(),
                from.to_string(),
                to.to_string(),
            ));
            Ok(3)
        }
    }

    fn ctx() -> SiteContext {
        SiteContext::primary(&SiteSettings::default())
    }

    #[tokio::test]
    async fn test_one_invocation_per_mapping_entry_in_order() {
        let engine = RecordingEngine::new();
        let mapping = default_mapping();
        let report = execute(
            &engine,
            &ctx(),
            "http://example.com",
            "http://example.go-vip.co",
            &mapping,
        )
        .await
        .unwrap();

        let invocations = engine.invocations.lock().unwrap();
        assert_eq!(invocations.len(), mapping.len());
        for (invocation, entry) in invocations.iter().zip(mapping.iter()) {
            assert_eq!(invocation.0, entry.table);
            assert_eq!(invocation.1, entry.columns);
        }
        assert!(report.all_succeeded);
    }

    #[tokio::test]
    async fn test_options_entry_scopes_exact_columns() {
        let engine = RecordingEngine::new();
        let mapping = vec![TableColumns::new("options", &["option_name", "option_value"])];
        execute(
            &engine,
            &ctx(),
            "http://example.com",
            "http://example.go-vip.co",
            &mapping,
        )
        .await
        .unwrap();

        let invocations = engine.invocations.lock().unwrap();
        assert_eq!(invocations.len(), 1);
        assert_eq!(invocations[0].0, "options");
        assert_eq!(invocations[0].1, vec!["option_name", "option_value"]);
        assert_eq!(invocations[0].2, "http://example.com");
        assert_eq!(invocations[0].3, "http://example.go-vip.co");
    }

    #[tokio::test]
    async fn test_invalid_from_url_issues_no_invocations() {
        let engine = RecordingEngine::new();
        let result = execute(
            &engine,
            &ctx(),
            "not a url",
            "http://example.com",
            &default_mapping(),
        )
        .await;

        assert!(matches!(
            result,
            Err(ArborError::InvalidUrl { ref flag, .. }) if flag == "--from"
        ));
        assert!(engine.invocations.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_to_url_issues_no_invocations() {
        let engine = RecordingEngine::new();
        let result = execute(&engine, &ctx(), "http://example.com", "", &default_mapping()).await;

        assert!(matches!(
            result,
            Err(ArborError::InvalidUrl { ref flag, .. }) if flag == "--to"
        ));
        assert!(engine.invocations.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_relative_url_is_rejected() {
        let engine = RecordingEngine::new();
        let result = execute(
            &engine,
            &ctx(),
            "/just/a/path",
            "http://example.com",
            &default_mapping(),
        )
        .await;

        assert!(result.is_err());
        assert!(engine.invocations.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_table_does_not_abort_the_rest() {
        let engine = RecordingEngine {
            invocations: Mutex::new(Vec::new()),
            fail_on: Some("comments"),
        };
        let mapping = default_mapping();
        let report = execute(
            &engine,
            &ctx(),
            "http://example.com",
            "http://example.go-vip.co",
            &mapping,
        )
        .await
        .unwrap();

        // Every table except the failing one was invoked.
        let invocations = engine.invocations.lock().unwrap();
        assert_eq!(invocations.len(), mapping.len() - 1);

        assert!(!report.all_succeeded);
        assert_eq!(report.results.len(), mapping.len());
        let failed: Vec<_> = report.results.iter().filter(|r| !r.success).collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].table, "comments");
    }

    #[test]
    fn test_default_mapping_shape() {
        let mapping = default_mapping();
        assert_eq!(mapping.len(), 11);
        let posts = mapping.iter().find(|t| t.table == "posts").unwrap();
        assert_eq!(posts.columns.len(), 6);
        let terms = mapping.iter().find(|t| t.table == "terms").unwrap();
        assert_eq!(terms.columns, vec!["name"]);
    }

    #[test]
    fn test_narrow_mapping_preserves_allowlist_order() {
        let narrowed = narrow_mapping(&["posts".to_string(), "options".to_string()]).unwrap();
        let tables: Vec<&str> = narrowed.iter().map(|t| t.table.as_str()).collect();
        // Allowlist order, not request order.
        assert_eq!(tables, vec!["options", "posts"]);
    }

    #[test]
    fn test_narrow_mapping_rejects_unknown_table() {
        let result = narrow_mapping(&["sessions".to_string()]);
        assert!(matches!(result, Err(ArborError::ConfigError(_))));
    }
}

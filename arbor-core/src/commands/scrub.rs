//! Delete sensitive options from a site's option store.
//!
//! Run after cloning a production site into a non-production environment,
//! so the copy cannot act on the origin's third-party credentials.

use serde::Serialize;

use crate::context::SiteContext;
use crate::error::Result;
use crate::store::OptionStore;

/// Options holding connection secrets or API keys that must never survive
/// a site copy.
pub const SENSITIVE_OPTIONS: &[&str] = &[
    "jetpack_options",
    "jetpack_private_options",
    "vaultpress",
    "wordpress_api_key",
];

/// Report returned after a scrub operation.
#[derive(Debug, Serialize)]
pub struct ScrubReport {
    /// Option names whose deletion was requested, in order.
    pub options_cleared: Vec<String>,
}

/// Execute the scrub command: request deletion of each named option, in order.
///
/// Deleting an option that does not exist is a no-op. A store failure aborts
/// the remaining deletions and propagates.
pub async fn execute<S: OptionStore>(
    store: &S,
    ctx: &SiteContext,
    options: &[&str],
) -> Result<ScrubReport> {
    log::info!(
        "Clearing sensitive options; site_id={}, count={}",
        ctx.site_id,
        options.len()
    );

    let mut options_cleared = Vec::with_capacity(options.len());
    for name in options {
        log::info!("- {}", name);
        store.delete(ctx, name).await?;
        options_cleared.push(name.to_string());
    }

    Ok(ScrubReport { options_cleared })
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::config::SiteSettings;
    use crate::error::ArborError;

    /// Store that records delete requests and can fail on a chosen name.
    struct RecordingStore {
        deletes: Mutex<Vec<String>>,
        fail_on: Option<&'static str>,
    }

    impl RecordingStore {
        fn new() -> Self {
            Self {
                deletes: Mutex::new(Vec::new()),
                fail_on: None,
            }
        }
    }

    #[async_trait]
    impl OptionStore for RecordingStore {
        async fn delete(&self, _ctx: &SiteContext, name: &str) -> Result<()> {
            if self.fail_on == Some(name) {
                return Err(ArborError::ConfigError(format!("boom: {}", name)));
            }
            self.deletes.lock().unwrap().push(name.to_string());
            Ok(())
        }
    }

    fn ctx() -> SiteContext {
        SiteContext::primary(&SiteSettings::default())
    }

    #[tokio::test]
    async fn test_one_delete_per_option_in_order() {
        let store = RecordingStore::new();
        let report = execute(&store, &ctx(), SENSITIVE_OPTIONS).await.unwrap();

        let deletes = store.deletes.lock().unwrap();
        assert_eq!(
            *deletes,
            vec![
                "jetpack_options",
                "jetpack_private_options",
                "vaultpress",
                "wordpress_api_key",
            ]
        );
        assert_eq!(report.options_cleared.len(), SENSITIVE_OPTIONS.len());
    }

    #[tokio::test]
    async fn test_store_failure_aborts_remaining_deletes() {
        let store = RecordingStore {
            deletes: Mutex::new(Vec::new()),
            fail_on: Some("vaultpress"),
        };
        let result = execute(&store, &ctx(), SENSITIVE_OPTIONS).await;

        assert!(result.is_err());
        let deletes = store.deletes.lock().unwrap();
        // The two options before the failing one were requested; nothing after.
        assert_eq!(*deletes, vec!["jetpack_options", "jetpack_private_options"]);
    }
}

//! CLI entry point for the arbor administration tool.
//! Provides clap-based command routing for the operator subcommands,
//! exit code mapping based on error type, and per-site context selection.

mod output;

use std::process;

use clap::{Parser, Subcommand};
use colored::Colorize;

use arbor_core::config::{ArborConfig, CliOverrides};
use arbor_core::error::ArborError;
use arbor_core::{Arbor, Scope};

/// Top-level CLI definition with global flags and subcommand dispatch.
#[derive(Parser)]
#[command(
    name = "arbor",
    about = "Administration tool for Arbor CMS installations",
    version = concat!(
        env!("CARGO_PKG_VERSION"),
        " (", env!("GIT_HASH"), " ", env!("BUILD_TIME"), ")"
    ),
    propagate_version = true
)]
struct Cli {
    /// Config file path
    #[arg(short, long, value_name = "PATH")]
    config: Option<String>,

    /// Database URL (overrides config)
    #[arg(long, value_name = "URL")]
    url: Option<String>,

    /// Platform table prefix (overrides config)
    #[arg(long, value_name = "PREFIX")]
    table_prefix: Option<String>,

    /// Primary site id (overrides config)
    #[arg(long, value_name = "ID")]
    primary_site: Option<i64>,

    /// Number of retries when connecting to the database
    #[arg(long, value_name = "N")]
    connect_retries: Option<u32>,

    /// SSL/TLS mode: disable, prefer, require
    #[arg(long, value_name = "MODE")]
    ssl_mode: Option<String>,

    /// Connection timeout in seconds (default: 30, 0 = no timeout)
    #[arg(long, value_name = "SECS")]
    connect_timeout: Option<u32>,

    /// Statement timeout in seconds (default: 0 = no limit)
    #[arg(long, value_name = "SECS")]
    statement_timeout: Option<u32>,

    /// Run against this site instead of the primary site
    #[arg(long, value_name = "ID", global = true)]
    site: Option<i64>,

    /// Output results as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Enable verbose/debug output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// All available arbor subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Delete sensitive stored options (connection secrets, API keys)
    ScrubSite,

    /// Replace a URL across the content-table allowlist
    SearchReplaceUrl {
        /// The URL to search for
        #[arg(long, value_name = "URL")]
        from: String,

        /// The URL to replace with
        #[arg(long, value_name = "URL")]
        to: String,

        /// Restrict the run to these allowlisted tables (repeatable)
        #[arg(long, value_name = "TABLE")]
        table: Vec<String>,
    },

    /// Run the platform schema-reconciliation routine
    Dbdelta {
        /// Which tables to reconcile (all, blog, global, ms_global)
        #[arg(value_name = "SCOPE")]
        scope: Option<String>,

        /// Reconcile every active site on a multi-tenant installation
        #[arg(long)]
        network: bool,

        /// Show changes without updating
        #[arg(long)]
        dry_run: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Set up logging (suppress when JSON output is requested)
    let filter = if cli.json {
        "error"
    } else if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "info"
    };

    env_logger::Builder::new()
        .parse_env(env_logger::Env::default().default_filter_or(filter))
        .format_target(false)
        .format_timestamp(None)
        .init();

    if let Err(e) = run(cli).await {
        print_error(&e);
        process::exit(exit_code(&e));
    }
}

/// Map error types to differentiated exit codes.
fn exit_code(error: &ArborError) -> i32 {
    match error {
        ArborError::ConfigError(_) => 2,
        ArborError::InvalidUrl { .. } => 3,
        ArborError::DatabaseError(_) => 4,
        ArborError::NotMultiTenant => 5,
        ArborError::LockError(_) => 6,
        ArborError::SiteNotFound { .. } => 7,
    }
}

/// Build configuration, connect, and dispatch the chosen subcommand.
async fn run(cli: Cli) -> Result<(), ArborError> {
    let json_output = cli.json;

    let overrides = CliOverrides {
        url: cli.url,
        table_prefix: cli.table_prefix,
        primary_site_id: cli.primary_site,
        connect_retries: cli.connect_retries,
        ssl_mode: cli.ssl_mode,
        connect_timeout: cli.connect_timeout,
        statement_timeout: cli.statement_timeout,
    };

    let config = ArborConfig::load(cli.config.as_deref(), &overrides)?;
    log::debug!(
        "Configuration resolved; prefix={}, primary_site_id={}, multi_tenant={}",
        config.site.table_prefix,
        config.site.primary_site_id,
        config.site.multi_tenant
    );
    let arbor = Arbor::new(config).await?;

    match cli.command {
        Commands::ScrubSite => {
            let ctx = arbor.site_context(cli.site).await?;
            let report = arbor.scrub_site(&ctx).await?;
            if json_output {
                println!("{}", serde_json::to_string_pretty(&report).unwrap());
            } else {
                output::print_scrub_report(&report);
            }
        }

        Commands::SearchReplaceUrl { from, to, table } => {
            let ctx = arbor.site_context(cli.site).await?;
            let mapping = if table.is_empty() {
                None
            } else {
                Some(arbor_core::commands::search_replace::narrow_mapping(
                    &table,
                )?)
            };
            let report = arbor
                .search_replace_url(&ctx, &from, &to, mapping.as_deref())
                .await?;
            if json_output {
                println!("{}", serde_json::to_string_pretty(&report).unwrap());
            } else {
                output::print_replace_report(&report);
            }
        }

        Commands::Dbdelta {
            scope,
            network,
            dry_run,
        } => {
            if dry_run && !json_output {
                println!("Performing a dry run, with no database modification.");
            }

            if network {
                let report = arbor.schema_sync_network(dry_run).await?;
                if json_output {
                    println!("{}", serde_json::to_string_pretty(&report).unwrap());
                } else {
                    output::print_network_sync_report(&report);
                }
            } else {
                let ctx = arbor.site_context(cli.site).await?;
                let scope = scope.as_deref().and_then(Scope::parse);
                let report = arbor.schema_sync(&ctx, scope, dry_run).await?;
                if json_output {
                    println!("{}", serde_json::to_string_pretty(&report).unwrap());
                } else {
                    output::print_sync_report(&report);
                }
            }
        }
    }

    Ok(())
}

/// Print a formatted error message with actionable hints to stderr.
fn print_error(error: &ArborError) {
    eprintln!("{} {}", "ERROR:".red().bold(), error);

    // Provide actionable guidance
    match error {
        ArborError::ConfigError(_) => {
            eprintln!(
                "{}",
                "Hint: Check your arbor.toml or set ARBOR_DATABASE_URL environment variable."
                    .dimmed()
            );
        }
        ArborError::DatabaseError(_) => {
            eprintln!(
                "{}",
                "Hint: Verify database is running and connection details are correct.".dimmed()
            );
        }
        ArborError::InvalidUrl { .. } => {
            eprintln!(
                "{}",
                "Hint: URLs must be absolute, e.g. https://example.com.".dimmed()
            );
        }
        ArborError::NotMultiTenant => {
            eprintln!(
                "{}",
                "Hint: --network requires multi_tenant = true under [site] in arbor.toml."
                    .dimmed()
            );
        }
        ArborError::SiteNotFound { .. } => {
            eprintln!(
                "{}",
                "Hint: Pass an id from the site directory, or omit --site for the primary site."
                    .dimmed()
            );
        }
        _ => {}
    }
}

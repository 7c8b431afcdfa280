//! a11y-sweep main entry point
//!
//! This is the command-line interface for the authenticated accessibility crawler.

use a11y_sweep::check::ProcessChecker;
use a11y_sweep::config::{load_config_with_hash, Config};
use a11y_sweep::crawler::run_sweep;
use a11y_sweep::output::{load_statistics, print_statistics, RunStatus};
use anyhow::{bail, Context};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// a11y-sweep: an authenticated accessibility crawler
///
/// a11y-sweep logs in to a web application, crawls every page reachable from
/// the start URLs, runs an accessibility checker on each distinct page and
/// stores one JSON report per check.
#[derive(Parser, Debug)]
#[command(name = "a11y-sweep")]
#[command(version)]
#[command(about = "An authenticated accessibility crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Wipe reports from earlier runs even if output.keep-existing is set
    #[arg(long)]
    fresh: bool,

    /// Check only this URL (absolute, or relative to site.base-url)
    #[arg(long, value_name = "URL")]
    single_url: Option<String>,

    /// Login email; overrides auth.email
    #[arg(long, requires = "password")]
    email: Option<String>,

    /// Login password; overrides auth.password
    #[arg(long, requires = "email")]
    password: Option<String>,

    /// Validate config and the checker without crawling
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// Show statistics from the existing reports directory and exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (mut config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    apply_overrides(&mut config, &cli)?;

    if cli.dry_run {
        handle_dry_run(&config).await?;
        return Ok(ExitCode::SUCCESS);
    }
    if cli.stats {
        handle_stats(&config)?;
        return Ok(ExitCode::SUCCESS);
    }

    handle_sweep(config, config_hash).await
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("a11y_sweep=info,warn"),
            1 => EnvFilter::new("a11y_sweep=debug,info"),
            2 => EnvFilter::new("a11y_sweep=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

fn apply_overrides(config: &mut Config, cli: &Cli) -> anyhow::Result<()> {
    match (&cli.email, &cli.password) {
        (Some(email), Some(password)) => {
            config.auth.email = Some(email.clone());
            config.auth.password = Some(password.clone());
        }
        (None, None) => {}
        _ => bail!("--email and --password must be given together"),
    }
    if let Some(url) = &cli.single_url {
        config.crawler.single_url = Some(url.clone());
    }
    if cli.fresh {
        config.output.keep_existing = false;
    }
    Ok(())
}

/// Handles the --dry-run mode: shows what would be crawled and checks the checker
async fn handle_dry_run(config: &Config) -> anyhow::Result<()> {
    println!("=== a11y-sweep Dry Run ===\n");

    println!("Site:");
    println!("  Base URL: {}", config.site.base_url);
    for start in &config.site.start_urls {
        println!("  Start: {}", start);
    }
    if let Some(single) = &config.crawler.single_url {
        println!("  Single URL: {}", single);
    }
    println!(
        "  Login: {}",
        if config.auth.email.is_some() {
            "configured credentials"
        } else {
            "auto-auth"
        }
    );

    println!("\nCrawler:");
    println!("  Max depth: {}", config.crawler.max_depth);
    println!(
        "  Max concurrent pages: {}",
        config.crawler.max_concurrent_pages
    );

    println!("\nChecker:");
    println!("  Binary: {}", config.checker.binary);
    println!("  Flags: {}", config.checker.flags.join(" "));
    println!("  Attempts: {}", config.checker.max_attempts);

    println!("\nOutput:");
    println!("  Reports: {} ({:?})", config.output.reports_dir, config.output.backend);
    if let Some(summary) = &config.output.summary_path {
        println!("  Summary: {}", summary);
    }

    let version = ProcessChecker::from_config(&config.checker)
        .verify()
        .await
        .context("Checker pre-flight failed")?;

    println!("\n✓ Configuration is valid");
    println!("✓ Checker responds ({})", version);
    Ok(())
}

/// Handles the --stats mode: shows statistics from the reports directory
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    println!("Reports: {}\n", config.output.reports_dir);
    let stats = load_statistics(Path::new(&config.output.reports_dir))?;
    print_statistics(&stats);
    Ok(())
}

/// Handles the main sweep; exit status 1 when a failure category is nonzero
async fn handle_sweep(config: Config, config_hash: String) -> anyhow::Result<ExitCode> {
    let failure_categories = config.output.failure_categories.clone();

    let summary = match run_sweep(config, config_hash).await {
        Ok(summary) => summary,
        Err(e) => {
            tracing::error!("Sweep failed: {}", e);
            return Ok(ExitCode::FAILURE);
        }
    };

    if summary.status != RunStatus::Completed {
        return Ok(ExitCode::FAILURE);
    }

    let failing = summary.failing_categories(&failure_categories);
    if failing.is_empty() {
        Ok(ExitCode::SUCCESS)
    } else {
        tracing::error!("Failing categories with nonzero counts: {}", failing.join(", "));
        Ok(ExitCode::FAILURE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli(args: &[&str]) -> Cli {
        let mut argv = vec!["a11y-sweep", "sweep.toml"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_partial_credentials_rejected_by_parser() {
        assert!(Cli::try_parse_from(["a11y-sweep", "sweep.toml", "--email", "a@b.com"]).is_err());
        assert!(Cli::try_parse_from(["a11y-sweep", "sweep.toml", "--password", "p"]).is_err());
    }

    #[test]
    fn test_partial_credentials_rejected_by_overrides() {
        let mut cli = cli(&[]);
        cli.email = Some("a@b.com".to_string());

        let mut config = Config::for_site("http://localhost:8000");
        assert!(apply_overrides(&mut config, &cli).is_err());
        assert!(config.auth.email.is_none());
    }

    #[test]
    fn test_overrides_applied() {
        let cli = cli(&[
            "--email",
            "a@b.com",
            "--password",
            "p",
            "--single-url",
            "/progress",
            "--fresh",
        ]);
        let mut config = Config::for_site("http://localhost:8000");
        config.output.keep_existing = true;

        apply_overrides(&mut config, &cli).unwrap();
        assert_eq!(config.auth.email.as_deref(), Some("a@b.com"));
        assert_eq!(config.auth.password.as_deref(), Some("p"));
        assert_eq!(config.crawler.single_url.as_deref(), Some("/progress"));
        assert!(!config.output.keep_existing);
    }
}

mod cli;

use mediaconv::{
    cleanup, config,
    conversion::{ConversionOptions, ConversionReference, ConversionSettings, MediaConversionManager},
    jobs::JobManager,
    repository::{ContentRepository, SqliteRepository},
};
use mediaconv_common::{ItemUri, JobStatus};
use mediaconv_db::pool::{init_pool, DbPool};

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands, Target};
use std::path::Path;
use std::sync::Arc;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "mediaconv=trace,mediaconv_db=debug,mediaconv_common=debug".to_string()
        } else {
            "mediaconv=debug,mediaconv_db=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Convert {
            target,
            user,
            recursive,
            references,
        } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(convert(
                cli.config.as_deref(),
                target,
                &user,
                recursive,
                &references,
            ))
        }
        Commands::Status { name, json } => show_status(cli.config.as_deref(), &name, json),
        Commands::Purge { json } => purge(cli.config.as_deref(), json),
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("mediaconv {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn open_pool(config: &config::Config) -> Result<DbPool> {
    let db_path = config.database.path.to_string_lossy();
    tracing::info!("Opening content store at {}", db_path);
    init_pool(&db_path).with_context(|| format!("Failed to open database {}", db_path))
}

/// Resolve a command line reference to an item uri.
///
/// Accepts `item://<db>/<id>[?ver=N]` or `<db>:<path>`.
fn resolve_reference(repo: &dyn ContentRepository, reference: &str) -> Result<ItemUri> {
    if reference.starts_with("item://") {
        return reference
            .parse()
            .with_context(|| format!("Invalid item reference: {}", reference));
    }

    let (database, path) = reference
        .split_once(':')
        .with_context(|| format!("Expected item://<db>/<id> or <db>:<path>, got {}", reference))?;
    let item = repo
        .get_item_by_path(database, path)?
        .with_context(|| format!("No item at {} in database {}", path, database))?;
    Ok(item.uri)
}

async fn convert(
    config_path: Option<&Path>,
    target: Target,
    user: &str,
    recursive: bool,
    references: &[String],
) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    let pool = open_pool(&config)?;

    let repo = Arc::new(SqliteRepository::new(
        pool.clone(),
        config.media.clone(),
        config.conversion.chunk_size,
    ));
    let references = references
        .iter()
        .map(|r| resolve_reference(repo.as_ref(), r).map(|uri| ConversionReference::new(uri, recursive)))
        .collect::<Result<Vec<_>>>()?;

    let jobs = Arc::new(JobManager::new(pool));
    let manager = MediaConversionManager::new(repo, jobs, ConversionSettings::from(&config));

    let options = ConversionOptions::new(target.into());
    let stop = options.force_stop.clone();
    let job = manager
        .start_conversion(references, options, user)
        .context("Failed to start media conversion")?;

    let status = tokio::select! {
        status = job.wait() => status,
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!("Interrupted, stopping after the current item");
            stop.set();
            job.wait().await
        }
    };

    for message in job.messages() {
        println!("{}", message);
    }

    if status == JobStatus::Failed {
        anyhow::bail!("Media conversion job failed");
    }
    Ok(())
}

fn show_status(config_path: Option<&Path>, name: &str, json: bool) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    let jobs = JobManager::new(open_pool(&config)?);

    let Some((job, messages)) = jobs.load_persisted(name)? else {
        anyhow::bail!("No job named '{}' has run", name);
    };

    if json {
        let value = serde_json::json!({ "job": job, "messages": messages });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!("Job: {} ({})", job.name, job.id);
    println!("Category: {}", job.category);
    println!("Status: {}", job.status);
    println!("Created: {}", job.created_at.to_rfc3339());
    if let Some(started) = job.started_at {
        println!("Started: {}", started.to_rfc3339());
    }
    if let Some(completed) = job.completed_at {
        println!("Completed: {}", completed.to_rfc3339());
    }
    println!(
        "Counts: {} processed, {} skipped, {} failed",
        job.processed, job.skipped, job.failed
    );

    if !messages.is_empty() {
        println!();
        for message in messages {
            println!("{}", message.message);
        }
    }

    Ok(())
}

fn purge(config_path: Option<&Path>, json: bool) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    let pool = open_pool(&config)?;

    let report = cleanup::purge(&pool, &config.media)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Blobs deleted: {}", report.blobs_deleted);
        println!("Files deleted: {}", report.files_deleted);
        println!("Still referenced: {}", report.retained);
        println!("Failed: {}", report.failed);
    }

    if report.failed > 0 {
        anyhow::bail!("{} cleanup entries could not be purged", report.failed);
    }
    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    let config = match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let config = config::load_config(p)?;
            println!("✓ Configuration is valid");
            config
        }
        None => {
            println!("No config file specified, using defaults");
            config::Config::default()
        }
    };

    println!("  Database: {}", config.database.path.display());
    println!("  Data root: {}", config.media.data_root.display());
    println!("  File folder: {}", config.media.file_folder);
    println!(
        "  Max size in database: {}",
        mediaconv_common::paths::friendly_file_size(config.media.max_size_in_database)
    );
    println!(
        "  Consecutive error limit: {}",
        config.conversion.consecutive_error_limit
    );
    println!("  Queue root: {}", config.conversion.queue_root);

    Ok(())
}

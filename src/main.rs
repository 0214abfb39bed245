//! # site_collect
//!
//! Command-line front end of the collection engine.
//!
//! ## Usage
//!
//! ```sh
//! site_collect collect -a techsir_com -t commerce -j ./json
//! ```
//!
//! ## Pipeline
//!
//! 1. **Listing**: the adapter returns stubs for one tag and page
//! 2. **Detail**: stubs are completed concurrently; failed ones are logged
//!    and skipped
//! 3. **Output**: the completed batch is written as JSON
//! 4. **Upload**: with `--site`, every local image is mirrored to the site

use chrono::Local;
use clap::Parser;
use futures::stream::{self, StreamExt};
use itertools::Itertools;
use site_collect::adapter::{Engine, Standard};
use site_collect::adapters::register_builtin;
use site_collect::cli::{Cli, CollectArgs, Command, Target};
use site_collect::config::Config;
use site_collect::models::{Article, Batch};
use site_collect::outputs::json;
use site_collect::publish::{DirectoryUploader, find_site, upload_images};
use site_collect::registry::Registry;
use site_collect::utils::ensure_writable_dir;
use std::error::Error;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("site_collect starting up");

    let args = Cli::parse();
    debug!(?args.config, "Parsed CLI arguments");

    let config = match &args.config {
        Some(path) => Config::load(path).await?,
        None => Config::default(),
    };
    let engine = Arc::new(Engine::new(config)?);
    info!(
        image_root = %engine.images.root().display(),
        snapshot_root = %engine.snapshots.root().display(),
        "Engine ready"
    );
    let registry = Registry::new();
    register_builtin(&registry, Arc::clone(&engine));

    match args.command {
        Command::Adapters => {
            for name in registry.names().into_iter().sorted() {
                println!("{name}");
            }
        }
        Command::List(target) => {
            let adapter = lookup(&registry, &target)?;
            for stub in adapter.article_list(target.tag, target.page).await? {
                println!("{}\t{}", stub.href, stub.title);
            }
        }
        Command::Collect(collect_args) => {
            let adapter = lookup(&registry, &collect_args.target)?;
            collect(adapter.as_ref(), &engine, &collect_args).await?;
        }
    }

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        "Execution complete"
    );
    Ok(())
}

fn lookup(registry: &Registry, target: &Target) -> Result<Box<dyn Standard>, Box<dyn Error>> {
    registry.lookup(&target.adapter).ok_or_else(|| {
        error!(adapter = %target.adapter, "No adapter registered under this name");
        format!("unknown adapter: {}", target.adapter).into()
    })
}

async fn collect(
    adapter: &dyn Standard,
    engine: &Engine,
    args: &CollectArgs,
) -> Result<(), Box<dyn Error>> {
    // Early check: ensure JSON output dir is writable
    if let Err(e) = ensure_writable_dir(&args.json_output_dir).await {
        error!(
            path = %args.json_output_dir.display(),
            error = %e,
            "JSON output directory is not writable (fix perms or choose a different path)"
        );
        return Err(e.into());
    }
    let site = args
        .site
        .map(|id| find_site(&engine.config.sites, id))
        .transpose()?;

    let (tag, page) = (args.target.tag, args.target.page);
    let stubs = adapter.article_list(tag, page).await?;
    let total = stubs.len();
    info!(adapter = adapter.name(), %tag, page, total, "Fetching article details");

    let concurrency = args.concurrency.max(1);
    let finished: Vec<(usize, Article)> = stream::iter(stubs.into_iter().enumerate())
        .map(|(i, mut article)| async move {
            match adapter.article_detail(&mut article).await {
                Ok(()) => Some((i, article)),
                Err(e) => {
                    warn!(index = i, href = %article.href, error = %e, "Detail fetch failed; skipping article");
                    None
                }
            }
        })
        .buffer_unordered(concurrency)
        .filter_map(|done| async move { done })
        .collect()
        .await;

    let articles = finished
        .into_iter()
        .sorted_by_key(|(i, _)| *i)
        .map(|(_, article)| article)
        .collect::<Vec<_>>();
    info!(
        total,
        successful = articles.len(),
        failed = total - articles.len(),
        "Completed detail fetching"
    );

    let batch = Batch {
        adapter: adapter.name().to_string(),
        tag,
        page,
        collected_at: Local::now(),
        articles,
    };
    json::write_batch(&batch, &args.json_output_dir).await?;

    if let (Some(site), Some(mirror_dir)) = (site, &args.mirror_dir) {
        let uploader = DirectoryUploader::new(mirror_dir);
        let mut uploaded = 0;
        for article in &batch.articles {
            uploaded += upload_images(
                &uploader,
                site,
                &engine.config.image_root,
                article,
                engine.config.upload_timeout(),
            )
            .await;
        }
        info!(site = site.id, uploaded, "Image upload complete");
    }

    Ok(())
}

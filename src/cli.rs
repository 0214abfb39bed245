//! Command-line interface definitions for site_collect.
//!
//! Every option can be given as a flag or through the environment.

use crate::models::Tag;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Collects articles from registered site adapters.
///
/// # Examples
///
/// ```sh
/// # What can be collected
/// site_collect adapters
///
/// # Stubs only
/// site_collect list --adapter techsir_com --tag commerce --page 2
///
/// # Full articles to ./json/techsir_com/commerce_1.json
/// site_collect collect -a techsir_com -t commerce -j ./json
///
/// # Also mirror images for site 423 from config.yaml
/// site_collect -c config.yaml collect -a v2_sohu_com -t fashion -j ./json --site 423 --mirror-dir ./mirror
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Optional path to config.yaml file
    #[arg(short, long, env = "SITE_COLLECT_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print registered adapter names
    Adapters,
    /// Print the stubs of one listing page
    List(Target),
    /// List, fetch every detail, and write the batch as JSON
    Collect(CollectArgs),
}

/// Which listing page to read.
#[derive(Args, Debug, Clone)]
pub struct Target {
    /// Adapter name, e.g. techsir_com
    #[arg(short, long, env = "SITE_COLLECT_ADAPTER")]
    pub adapter: String,

    /// Content tag, e.g. commerce
    #[arg(short, long)]
    pub tag: Tag,

    /// Listing page, starting at 1
    #[arg(short, long, default_value_t = 1)]
    pub page: u32,
}

#[derive(Args, Debug, Clone)]
pub struct CollectArgs {
    #[command(flatten)]
    pub target: Target,

    /// Output directory for the JSON batch files
    #[arg(short, long, env = "SITE_COLLECT_JSON_DIR")]
    pub json_output_dir: PathBuf,

    /// Detail pages fetched at once
    #[arg(long, default_value_t = 4)]
    pub concurrency: usize,

    /// Site id from the config to upload images to
    #[arg(long, requires = "mirror_dir")]
    pub site: Option<u32>,

    /// Local directory standing in for the site host when uploading
    #[arg(long, env = "SITE_COLLECT_MIRROR_DIR", requires = "site")]
    pub mirror_dir: Option<PathBuf>,
}

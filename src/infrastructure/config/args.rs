//! Command-line arguments.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use uuid::Uuid;

use super::app_config::LogLevel;
use crate::domain::entities::PackageFormat;

/// Command-line arguments. Set options override the configuration file.
#[derive(Debug, Parser)]
#[command(
    name = "mdex-pack",
    version,
    about = "Download MangaDex chapters as CBZ or EPUB packages",
    long_about = None
)]
pub struct CliArgs {
    /// Configuration file path.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Log file path.
    #[arg(long, value_name = "PATH")]
    pub log_path: Option<PathBuf>,

    /// Log verbosity level.
    #[arg(long, value_enum)]
    pub log_level: Option<LogLevel>,

    /// Preferred language code.
    #[arg(short, long)]
    pub language: Option<String>,

    /// Download the compressed image set.
    #[arg(long)]
    pub data_saver: Option<bool>,

    /// Download images from the uploads host.
    #[arg(long)]
    pub md_uploads: Option<bool>,

    /// Use the development API.
    #[arg(long)]
    pub dev_api: Option<bool>,

    /// Skip image downloads.
    #[arg(long)]
    pub no_download: Option<bool>,

    /// Concurrent image downloads.
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Action to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Top-level actions.
#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Export one chapter as a package.
    Chapter {
        /// Chapter id.
        id: Uuid,

        /// Package format; defaults to the configured one.
        #[arg(short, long, value_enum)]
        format: Option<PackageFormat>,

        /// Output file. Defaults to the chapter title in the current directory.
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
    /// List the chapters of a manga.
    Feed {
        /// Manga id.
        manga_id: Uuid,
    },
    /// Search manga by title.
    Search {
        /// Title to search for.
        title: String,

        /// Maximum number of results.
        #[arg(long, default_value_t = 10)]
        limit: u32,
    },
}

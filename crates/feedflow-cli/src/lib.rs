//! feedflow - keep a plugin directory in sync with package feeds
#![allow(missing_docs)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::doc_markdown)]
//!
//! # Overview
//!
//! `feedflow` reads a TOML configuration naming feeds and package requests,
//! resolves the full dependency set, and installs it side by side into a
//! package directory. A fingerprint of the configuration is kept in that
//! directory so repeated runs with an unchanged configuration do nothing.
//!
//! # Directory Layout
//!
//! ```text
//! <package_directory>/
//! ├── .feedflow.sha256            # fingerprint of the last successful run
//! ├── Acme.Core.1.2.0/
//! │   ├── contentFiles/any/<platform>/
//! │   └── lib/<platform>/
//! └── ...
//!
//! ~/.feedflow/packages/           # shared download cache
//! ```

pub mod cmd;
pub mod context;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use context::Context;

#[derive(Parser)]
#[command(name = "feedflow")]
#[command(author, version, about = "Keep a package directory in sync with package feeds", long_about = None)]
pub struct Cli {
    /// Configuration file
    #[arg(long, global = true, env = "FEEDFLOW_CONFIG", default_value = "feedflow.toml")]
    pub config: PathBuf,

    /// Download cache directory [default: ~/.feedflow/packages]
    #[arg(long, global = true, env = "FEEDFLOW_CACHE_DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Shell command to run after a sync writes new files
    #[arg(long, global = true)]
    pub on_installed: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Reconcile the package directory once
    Sync,
    /// Reconcile now, then again whenever the configuration file changes
    Watch {
        /// Seconds between configuration checks
        #[arg(long, default_value_t = 5)]
        interval: u64,
    },
    /// Resolve and print the install set without installing
    Plan,
    /// Show whether the package directory matches the configuration
    Status,
}

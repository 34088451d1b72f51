use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Command line options for the stashcache daemon.
#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct Opts {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub cmd: OptsCmd,
}

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Path to the SQLite database file.
    #[arg(long, env = "STASHCACHE_DB", default_value = "stashcache.db")]
    pub db_path: PathBuf,
}

#[derive(Debug, Subcommand)]
pub enum OptsCmd {
    /// Start the sync scheduler and the JSON API server.
    Serve(ServeOpts),
    /// Upstream instance management.
    #[command(subcommand)]
    Instance(InstanceCmd),
}

#[derive(Debug, Args)]
pub struct ServeOpts {
    /// Listen address.
    #[arg(long, short, default_value = "127.0.0.1:3737", env = "STASHCACHE_LISTEN")]
    pub listen: String,

    /// CORS allowed origin. Defaults to the listen address.
    #[arg(long, env = "STASHCACHE_CORS_ORIGIN", alias = "origin")]
    pub cors_origin: Option<String>,

    /// Set SO_REUSEPORT.
    #[arg(long, env = "STASHCACHE_REUSEPORT", default_value = "false")]
    pub reuseport: bool,

    /// How often to run a smart-incremental sync against every enabled
    /// instance, in seconds.
    #[arg(long, default_value = "300", env = "STASHCACHE_SYNC_INTERVAL_SECS")]
    pub sync_interval_secs: u64,
}

pub fn make_web_opts(opts: &ServeOpts) -> stashcache_web::Opts {
    stashcache_web::Opts::new(opts.listen.clone(), opts.cors_origin.clone(), opts.reuseport)
}

/// CRUD over the `instance` table (§6 Environment inputs): the set of
/// upstream catalogs this mirror syncs from.
#[derive(Debug, Subcommand)]
pub enum InstanceCmd {
    /// List configured instances.
    List,
    /// Add or update an instance.
    Set {
        #[arg(long)]
        id: String,
        #[arg(long)]
        display_name: String,
        #[arg(long)]
        base_url: String,
        #[arg(long)]
        api_key: String,
        #[arg(long, default_value = "true")]
        enabled: bool,
        #[arg(long, default_value = "0")]
        priority: i64,
    },
    /// Remove an instance and all of its mirrored data.
    Remove {
        #[arg(long)]
        id: String,
    },
}

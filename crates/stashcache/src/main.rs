mod cli;
mod scheduler;

use std::collections::HashMap;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use cli::{InstanceCmd, Opts, OptsCmd, ServeOpts, make_web_opts};
use scheduler::Scheduler;
use snafu::{ResultExt, Snafu};
use stashcache_db::{Database, DbError, InstanceRow};
use stashcache_exclusion::ExclusionEngine;
use stashcache_sync::SyncService;
use stashcache_upstream::{GraphQlUpstreamClient, UpstreamClient};
use stashcache_web::state::{AppState, InstanceRegistry};
use stashcache_web::{Server, WebUiServerError};
use tracing::info;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

pub const LOG_TARGET: &str = "stashcache::cli";

#[derive(Debug, Snafu)]
pub enum CliError {
    #[snafu(display("logging init error: {source}"))]
    Logging { source: tracing_subscriber::util::TryInitError },
    #[snafu(display("database error: {source}"))]
    Database { source: DbError },
    #[snafu(display("web server error: {source}"))]
    WebUiServer { source: WebUiServerError },
}

pub type CliResult<T> = std::result::Result<T, CliError>;

#[snafu::report]
#[tokio::main]
async fn main() -> CliResult<()> {
    init_logging().context(LoggingSnafu)?;

    let opts = Opts::parse();
    let value = handle_cmd(opts).await?;
    println!("{}", serde_json::to_string_pretty(&value).expect("Can't fail"));
    Ok(())
}

async fn handle_cmd(opts: Opts) -> CliResult<serde_json::Value> {
    let db = Database::open(&opts.global.db_path).await.context(DatabaseSnafu)?;

    Ok(match opts.cmd {
        OptsCmd::Serve(serve_opts) => {
            serve(db, &serve_opts).await?;
            serde_json::Value::Null
        }
        OptsCmd::Instance(cmd) => handle_instance_cmd(&db, cmd).await?,
    })
}

async fn handle_instance_cmd(db: &Database, cmd: InstanceCmd) -> CliResult<serde_json::Value> {
    Ok(match cmd {
        InstanceCmd::List => {
            let rows = stashcache_db::list_instances(db.pool()).await.context(DatabaseSnafu)?;
            serde_json::to_value(rows).expect("Can't fail")
        }
        InstanceCmd::Set { id, display_name, base_url, api_key, enabled, priority } => {
            let row = InstanceRow { id, display_name, base_url, api_key, enabled, priority };
            stashcache_db::upsert_instance(db.pool(), &row).await.context(DatabaseSnafu)?;
            serde_json::to_value(row).expect("Can't fail")
        }
        InstanceCmd::Remove { id } => {
            stashcache_db::delete_instance(db.pool(), &id).await.context(DatabaseSnafu)?;
            serde_json::Value::Bool(true)
        }
    })
}

async fn serve(db: Database, serve_opts: &ServeOpts) -> CliResult<()> {
    let exclusion = ExclusionEngine::new(db.clone());
    let (sync, _events_rx) = SyncService::new(db.clone(), exclusion.clone());
    let sync = Arc::new(sync);

    let rows = stashcache_db::list_enabled_instances(db.pool()).await.context(DatabaseSnafu)?;
    let mut clients: HashMap<String, Arc<dyn UpstreamClient>> = HashMap::new();
    for row in &rows {
        clients.insert(row.id.clone(), Arc::new(GraphQlUpstreamClient::new(row.base_url.clone(), row.api_key.clone())));
    }
    info!(target: LOG_TARGET, count = clients.len(), "loaded upstream instances");

    let state = Arc::new(AppState {
        db: db.clone(),
        sync: sync.clone(),
        exclusion,
        http: reqwest::Client::new(),
        instances: InstanceRegistry::new(clients),
    });

    let (scheduler, _wakeups) = Scheduler::new(db, sync, Duration::from_secs(serve_opts.sync_interval_secs));
    tokio::spawn(scheduler.run());

    let web_opts = make_web_opts(serve_opts);
    let server = Server::init(web_opts, state).await.context(WebUiServerSnafu)?;
    server.run().await.context(WebUiServerSnafu)?;

    Ok(())
}

pub fn init_logging() -> Result<(), tracing_subscriber::util::TryInitError> {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(EnvFilter::builder().with_default_directive(LevelFilter::INFO.into()).from_env_lossy())
        .try_init()
}

use std::path::PathBuf;
use std::sync::Arc;

use actix_web::middleware::NormalizePath;
use actix_web::web::Data;
use actix_web::{App, HttpServer};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use attendance_sync::config::Config;
use attendance_sync::db::init_db;
use attendance_sync::docs::ApiDoc;
use attendance_sync::routes;
use attendance_sync::sync::hub::SnapshotHub;
use attendance_sync::sync::maintenance::{export_merged_csv, prune_orphan_attendance};
use attendance_sync::sync::{
    MemorySnapshotCache, MySqlSource, Pipeline, RecordSource, RedisSnapshotCache, SnapshotCache,
    Watcher,
};
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use utoipa::OpenApi; // needed for ApiDoc::openapi()
use utoipa_swagger_ui::SwaggerUi;

#[derive(Parser)]
#[command(name = "attendance-sync", version, about = "Merged attendance cache and live feed")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the watcher and the HTTP server (default)
    Serve,
    /// Write the merged table to a CSV file
    Export {
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Delete attendance records whose employee no longer exists
    PruneOrphans,
}

#[actix_web::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env()?;
    let _guard = init_tracing(&config.log_dir);

    let pool = init_db(&config.database_url, config.database_max_connections).await?;
    let source: Arc<dyn RecordSource> = Arc::new(MySqlSource::new(pool.clone()));

    let result = match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config, source).await,
        Command::Export { output } => export_merged_csv(source.as_ref(), &output)
            .await
            .map(|written| match written {
                Some(rows) => println!("Exported {rows} rows to {}", output.display()),
                None => println!("Nothing exported, a source collection is empty"),
            })
            .context("Export failed"),
        Command::PruneOrphans => prune_orphan_attendance(source.as_ref())
            .await
            .map(|removed| println!("Deleted {removed} orphaned attendance records"))
            .context("Orphan cleanup failed"),
    };

    if let Err(e) = &result {
        error!(error = %format!("{e:#}"), "Exiting with error");
    }
    pool.close().await;
    result
}

fn init_tracing(log_dir: &str) -> WorkerGuard {
    // Rolling daily log
    let file_appender = rolling::daily(log_dir, "attendance-sync.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .with_target(false) // removes module path
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .pretty()
        .init();

    guard
}

async fn open_cache(config: &Config) -> Result<Arc<dyn SnapshotCache>> {
    match &config.cache_url {
        Some(url) => {
            let cache = RedisSnapshotCache::connect(url)
                .await
                .context("Failed to connect to cache")?;
            info!("Using redis snapshot cache");
            Ok(Arc::new(cache))
        }
        None => {
            warn!("CACHE_URL not set, snapshots are kept in process memory");
            Ok(Arc::new(MemorySnapshotCache::new()))
        }
    }
}

async fn serve(config: Config, source: Arc<dyn RecordSource>) -> Result<()> {
    info!("Server starting...");

    let cache = open_cache(&config).await?;
    let pipeline = Arc::new(Pipeline::new(
        source,
        cache,
        SnapshotHub::new(config.subscriber_buffer),
        config.snapshot_key.clone(),
    ));

    // initial publish happens here, before the first connection is accepted
    let watcher = Watcher::start(pipeline.clone(), config.watch_interval)
        .await
        .context("Failed to start watcher")?;
    let cancel = watcher.cancellation();

    let limiter = routes::build_limiter(config.rate_query_per_min)?;
    let server_addr = config.server_addr.clone();
    let pipeline_data = Data::from(pipeline);

    let server = HttpServer::new(move || {
        App::new()
            .wrap(actix_web::middleware::Logger::default())
            .wrap(NormalizePath::trim())
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}") // wildcard matches JS/CSS files
                    .url("/api-doc/openapi.json", ApiDoc::openapi()),
            )
            .app_data(pipeline_data.clone())
            .configure(|cfg| routes::configure(cfg, &config, &limiter))
    })
    .bind(&server_addr)
    .with_context(|| format!("Failed to bind {server_addr}"))?
    .run();

    info!(%server_addr, "Listening");
    let handle = server.handle();
    tokio::pin!(server);
    let watch = watcher.join();
    tokio::pin!(watch);

    tokio::select! {
        res = &mut server => {
            cancel.cancel();
            res.context("HTTP server failed")?;
            watch.await.context("Watcher failed during shutdown")?;
            info!("Server stopped");
            Ok(())
        }
        res = &mut watch => {
            handle.stop(true).await;
            server.await.context("HTTP server failed")?;
            res.context("Watcher stopped")
        }
    }
}

use std::{net::SocketAddr, process::ExitCode, time::Duration};

use axum::{
    Router,
    extract::{MatchedPath, Request},
};
use axum_server::Handle;
use clap::Parser;
use rusqlite::Connection;
use tokio::time::MissedTickBehavior;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use moneygrid::{
    AppState, build_router, graceful_shutdown,
    import::{ImportConfig, JobRegistry},
};

/// The REST API server for moneygrid.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// File path to the application SQLite database.
    #[arg(long, env = "MONEYGRID_DB_PATH")]
    db_path: String,

    /// The port to serve the API from.
    #[arg(short, long, env = "MONEYGRID_PORT", default_value_t = 3000)]
    port: u16,

    /// The canonical timezone used to work out the current day, e.g. "Pacific/Auckland".
    #[arg(long, env = "MONEYGRID_TIMEZONE", default_value = "Etc/UTC")]
    timezone: String,

    /// The number of transactions an import job inserts per database transaction.
    #[arg(long, env = "MONEYGRID_IMPORT_CHUNK_SIZE", default_value_t = 50)]
    import_chunk_size: usize,

    /// How long finished import jobs can still be polled, in seconds.
    #[arg(long, env = "MONEYGRID_JOB_RETENTION_SECS", default_value_t = 3600)]
    job_retention_secs: u64,
}

#[tokio::main]
async fn main() -> ExitCode {
    setup_logging();

    let args = Args::parse();

    let addr = SocketAddr::from(([127, 0, 0, 1], args.port));

    let conn = match Connection::open(&args.db_path) {
        Ok(conn) => conn,
        Err(error) => {
            tracing::error!("Could not open database at {}: {error}", args.db_path);
            return ExitCode::FAILURE;
        }
    };

    let import_config = ImportConfig {
        chunk_size: args.import_chunk_size.max(1),
        job_retention: Duration::from_secs(args.job_retention_secs),
    };

    let app_state = match AppState::new(conn, &args.timezone, import_config) {
        Ok(state) => state,
        Err(error) => {
            tracing::error!("Could not initialize the database: {error}");
            return ExitCode::FAILURE;
        }
    };

    tokio::spawn(prune_finished_jobs(
        app_state.import_jobs.clone(),
        import_config.job_retention,
    ));

    let handle = Handle::new();
    tokio::spawn(graceful_shutdown(handle.clone()));

    let router = add_tracing_layer(build_router(app_state));

    tracing::info!("HTTP server listening on {}", addr);
    if let Err(error) = axum_server::bind(addr)
        .handle(handle)
        .serve(router.into_make_service())
        .await
    {
        tracing::error!("Server error: {error}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

fn setup_logging() {
    let stdout_log = tracing_subscriber::fmt::layer().pretty();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(stdout_log)
        .init();
}

fn add_tracing_layer(router: Router) -> Router {
    let tracing_layer = TraceLayer::new_for_http()
        .make_span_with(|req: &Request| {
            let method = req.method();
            let uri = req.uri();

            let matched_path = req
                .extensions()
                .get::<MatchedPath>()
                .map(|matched_path| matched_path.as_str());

            tracing::debug_span!("request", %method, %uri, matched_path)
        })
        // By default, `TraceLayer` will log 5xx responses but we're doing our specific
        // logging of errors so disable that
        .on_failure(());

    router.layer(tracing_layer)
}

/// Periodically drop import jobs that finished more than `retention` ago.
async fn prune_finished_jobs(registry: JobRegistry, retention: Duration) {
    let mut interval = tokio::time::interval(retention.max(Duration::from_secs(1)));
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        interval.tick().await;

        match registry.prune_finished(std::time::Instant::now(), retention) {
            Ok(0) => {}
            Ok(pruned) => tracing::info!("Pruned {pruned} finished import jobs"),
            Err(error) => tracing::error!("Could not prune import jobs: {error}"),
        }
    }
}

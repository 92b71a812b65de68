use std::{
    net::SocketAddr,
    path::PathBuf,
    process::exit,
};

use axum::{
    Router,
    extract::{MatchedPath, Request},
};
use axum_server::{Handle, tls_rustls::RustlsConfig};
use clap::Parser;
use rusqlite::Connection;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{Layer, filter, layer::SubscriberExt, util::SubscriberInitExt};

use mizan::{AppState, Config, build_router, delete_expired_sessions, graceful_shutdown};

/// The web server for mizan.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// File path to the application SQLite database. Overrides MIZAN_DB_PATH.
    #[arg(long)]
    db_path: Option<String>,

    /// File path to a directory holding an SSL certificate `cert.pem` and key
    /// `key.pem`. When omitted the server listens over plain HTTP.
    #[arg(long)]
    cert_path: Option<String>,

    /// The port to serve the app from.
    #[arg(short, long, default_value_t = 3000)]
    port: u16,
}

#[tokio::main]
async fn main() {
    setup_logging();

    let args = Args::parse();
    let config = Config::from_env();

    let db_path = args
        .db_path
        .map(PathBuf::from)
        .or(config.db_path)
        .unwrap_or_else(|| {
            eprintln!("A database path is required: pass --db-path or set MIZAN_DB_PATH.");
            exit(1);
        });
    let secret = config.secret.unwrap_or_else(|| {
        eprintln!("The environment variable 'MIZAN_SECRET' must be set.");
        exit(1);
    });

    let addr = SocketAddr::from(([127, 0, 0, 1], args.port));

    let conn = match Connection::open(&db_path) {
        Ok(conn) => conn,
        Err(error) => {
            eprintln!("Could not open the database at {}: {error}", db_path.display());
            exit(1);
        }
    };

    let secure_transport = args.cert_path.is_some();
    let state = match AppState::new(conn, &secret, &config.csrf_field, secure_transport) {
        Ok(state) => state,
        Err(error) => {
            eprintln!("Could not initialize the application state: {error}");
            exit(1);
        }
    };

    {
        let connection = state
            .db_connection
            .lock()
            .expect("Could not acquire the database lock.");
        match delete_expired_sessions(&connection) {
            Ok(removed) if removed > 0 => {
                tracing::info!("Removed {removed} expired session(s).")
            }
            Ok(_) => {}
            Err(error) => tracing::warn!("Could not sweep expired sessions: {error}"),
        }
    }

    let handle = Handle::new();
    tokio::spawn(graceful_shutdown(handle.clone()));

    let router = add_tracing_layer(build_router(state));
    let service = router.into_make_service_with_connect_info::<SocketAddr>();

    match args.cert_path {
        Some(cert_path) => {
            let tls_config = RustlsConfig::from_pem_file(
                PathBuf::from(&cert_path).join("cert.pem"),
                PathBuf::from(&cert_path).join("key.pem"),
            )
            .await
            .expect("Could not open TLS certificates.");

            tracing::info!("HTTPS server listening on {}", addr);
            axum_server::bind_rustls(addr, tls_config)
                .handle(handle)
                .serve(service)
                .await
                .expect("Could not start the HTTPS server.");
        }
        None => {
            tracing::info!("HTTP server listening on {}", addr);
            axum_server::bind(addr)
                .handle(handle)
                .serve(service)
                .await
                .expect("Could not start the HTTP server.");
        }
    }
}

fn setup_logging() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .pretty()
                .with_filter(filter::LevelFilter::INFO),
        )
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
        // By default, `TraceLayer` will log 5xx responses but we're doing our
        // specific logging of errors so disable that
        .on_failure(());

    router.layer(tracing_layer)
}

use std::{
    fs::OpenOptions,
    net::SocketAddr,
    process::exit,
    sync::Arc,
};

use axum::{
    Router,
    extract::{MatchedPath, Request},
    http::{HeaderName, HeaderValue, Method, header},
    middleware,
};
use axum_server::Handle;
use clap::Parser;
use rusqlite::Connection;
use time::Duration;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{Layer, filter, layer::SubscriberExt, util::SubscriberInitExt};

use moneyhub::{
    AppState, AuthConfig, CookieConfig, SchedulerConfig, TracingMailer, build_router,
    get_local_offset, graceful_shutdown, logging_middleware, run_scheduler,
};

/// The REST API server for MoneyHub.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// File path to the application SQLite database.
    #[arg(long, env = "DB_PATH")]
    db_path: String,

    /// The port to serve the API from.
    #[arg(short, long, env = "PORT", default_value_t = 3000)]
    port: u16,

    /// The secret used to sign access tokens.
    #[arg(long, env = "JWT_SECRET", hide_env_values = true)]
    jwt_secret: String,

    /// The secret used to sign refresh tokens.
    #[arg(long, env = "JWT_REFRESH_SECRET", hide_env_values = true)]
    jwt_refresh_secret: String,

    /// How long an access token is valid, in minutes.
    #[arg(long, env = "JWT_EXPIRATION_MINUTES", default_value_t = 60)]
    access_token_minutes: i64,

    /// How long a refresh token is valid, in days.
    #[arg(long, env = "JWT_REFRESH_EXPIRATION_DAYS", default_value_t = 7)]
    refresh_token_days: i64,

    /// How long a password reset token or email verification code is valid, in minutes.
    #[arg(long, env = "RESET_TOKEN_MINUTES", default_value_t = 15)]
    reset_token_minutes: i64,

    /// Only send the auth cookies over HTTPS.
    #[arg(long, env = "COOKIE_SECURE", default_value_t = false)]
    cookie_secure: bool,

    /// Require the CSRF header on state-changing requests.
    #[arg(long, env = "CSRF_ENFORCE", default_value_t = false)]
    csrf_enforce: bool,

    /// Comma separated origins allowed to make credentialed requests.
    #[arg(
        long,
        env = "CORS_ORIGINS",
        value_delimiter = ',',
        default_value = "http://localhost:3000"
    )]
    cors_origins: Vec<String>,

    /// The canonical name of the local timezone, e.g. "America/Sao_Paulo".
    #[arg(long, env = "TIMEZONE", default_value = "Etc/UTC")]
    timezone: String,

    /// The hour of the day, in the local timezone, to post fixed expenses.
    #[arg(long, env = "SCHEDULER_HOUR", default_value_t = 3, value_parser = clap::value_parser!(u8).range(0..24))]
    scheduler_hour: u8,
}

#[tokio::main]
async fn main() {
    setup_logging();

    let args = Args::parse();

    if get_local_offset(&args.timezone).is_none() {
        tracing::error!("Invalid timezone {}", args.timezone);
        exit(1);
    }

    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));

    let mut auth_config = AuthConfig::new(&args.jwt_secret, &args.jwt_refresh_secret);
    auth_config.access_token_duration = Duration::minutes(args.access_token_minutes);
    auth_config.refresh_token_duration = Duration::days(args.refresh_token_days);
    auth_config.reset_token_duration = Duration::minutes(args.reset_token_minutes);
    auth_config.csrf_enforce = args.csrf_enforce;
    auth_config.cookie = CookieConfig {
        secure: args.cookie_secure,
        ..CookieConfig::default()
    };

    let conn = match Connection::open(&args.db_path) {
        Ok(conn) => conn,
        Err(error) => {
            tracing::error!("Could not open the database at {}: {error}", args.db_path);
            exit(1);
        }
    };

    let state = match AppState::new(conn, auth_config, &args.timezone, Arc::new(TracingMailer)) {
        Ok(state) => state,
        Err(error) => {
            tracing::error!("Could not initialize the database: {error}");
            exit(1);
        }
    };

    let scheduler = tokio::spawn(run_scheduler(
        state.db_connection.clone(),
        SchedulerConfig {
            hour: args.scheduler_hour,
            local_timezone: args.timezone.clone(),
        },
    ));

    let handle = Handle::new();
    tokio::spawn(graceful_shutdown(handle.clone()));

    let router = build_router(state).layer(middleware::from_fn(logging_middleware));
    let router = add_cors_layer(router, &args.cors_origins);
    let router = add_tracing_layer(router);

    tracing::info!("HTTP server listening on {}", addr);
    let result = axum_server::bind(addr)
        .handle(handle)
        .serve(router.into_make_service())
        .await;

    scheduler.abort();

    if let Err(error) = result {
        tracing::error!("Server error: {error}");
        exit(1);
    }
}

fn setup_logging() {
    let stdout_log = tracing_subscriber::fmt::layer().pretty();

    let log_file = match OpenOptions::new()
        .create(true)
        .append(true)
        .open("debug.log")
    {
        Ok(log_file) => log_file,
        Err(error) => {
            eprintln!("Could not create log file: {error}");
            exit(1);
        }
    };

    let debug_log = tracing_subscriber::fmt::layer()
        .pretty()
        .with_writer(Arc::new(log_file));

    tracing_subscriber::registry()
        .with(
            stdout_log
                .with_filter(filter::LevelFilter::INFO)
                .and_then(debug_log)
                .with_filter(filter::LevelFilter::DEBUG),
        )
        .init();
}

fn add_cors_layer(router: Router, origins: &[String]) -> Router {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin.trim()) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin {origin:?}");
                None
            }
        })
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static("x-csrf-token"),
        ]);

    router.layer(cors)
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
        // Errors are logged by the handlers, so skip the 5xx logging of `TraceLayer`.
        .on_failure(());

    router.layer(tracing_layer)
}

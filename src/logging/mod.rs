/*!
 * Logging Module
 * Subscriber setup and request logging
 */
pub mod middleware;

use std::io;
use tracing::Subscriber;
use tracing_appender::{
    non_blocking,
    non_blocking::{NonBlocking, WorkerGuard},
    rolling,
};
use tracing_subscriber::{
    filter::LevelFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer,
};

const LOG_DIR: &str = "logs";

/// Filter used when `RUST_LOG` is not set.
fn default_filter(level: &str) -> String {
    format!("bitsa_backend={},tower_http=info,axum=info,sqlx=warn", level)
}

fn default_level(is_production: bool) -> &'static str {
    if is_production {
        "info"
    } else {
        "debug"
    }
}

/// Background writers for the three outputs.
struct Writers {
    file: NonBlocking,
    error: NonBlocking,
    console: NonBlocking,
}

type BoxedSubscriber = Box<dyn Subscriber + Send + Sync>;

fn build_subscriber(is_production: bool, env_filter: EnvFilter, writers: Writers) -> BoxedSubscriber {
    let subscriber = tracing_subscriber::registry().with(env_filter);

    if is_production {
        let error_layer = fmt::layer()
            .json()
            .with_writer(writers.error)
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .with_filter(LevelFilter::ERROR);

        let file_layer = fmt::layer()
            .json()
            .with_writer(writers.file)
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true);

        let console_layer = fmt::layer()
            .json()
            .with_writer(writers.console)
            .with_target(false);

        Box::new(
            subscriber
                .with(file_layer)
                .with(error_layer)
                .with(console_layer),
        )
    } else {
        let error_layer = fmt::layer()
            .json()
            .with_writer(writers.error)
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .with_filter(LevelFilter::ERROR);

        let file_layer = fmt::layer()
            .with_writer(writers.file)
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .with_ansi(false);

        let console_layer = fmt::layer()
            .with_writer(writers.console)
            .with_target(true)
            .pretty();

        Box::new(
            subscriber
                .with(file_layer)
                .with(error_layer)
                .with(console_layer),
        )
    }
}

/// Install the global subscriber. The returned guards flush the background
/// writers on drop and must live as long as the process.
pub fn init(environment: &str) -> Vec<WorkerGuard> {
    let is_production = environment == "production";

    if let Err(e) = std::fs::create_dir_all(LOG_DIR) {
        eprintln!("could not create {} directory: {}", LOG_DIR, e);
    }

    let (file, file_guard) = non_blocking(rolling::daily(LOG_DIR, "app.log"));
    let (error, error_guard) = non_blocking(rolling::daily(LOG_DIR, "error.log"));
    let (console, console_guard) = non_blocking(io::stdout());

    let level = std::env::var("LOG_LEVEL")
        .unwrap_or_else(|_| default_level(is_production).to_string());
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter(&level)));

    build_subscriber(
        is_production,
        env_filter,
        Writers {
            file,
            error,
            console,
        },
    )
    .init();

    tracing::info!(environment = %environment, level = %level, "logging initialized");

    vec![file_guard, error_guard, console_guard]
}

//! Tracing configuration and log routing.
//!
//! The application logs to stdout using either a compact formatter (`LOG_PROVIDER=stdout`,
//! the default) or a JSON formatter with flattened event fields (`LOG_PROVIDER=google`),
//! and optionally to a file. When `LANDMARK_LOG_FILE` is set, logs are appended to that
//! path; otherwise a file logger is created under `logs/`, named by `LOG_NAME_PREFIX`.
//! A non‑blocking writer is used to minimize contention on hot paths.
//!
//! Pipeline events use a structured vocabulary: every operation-scoped record carries an
//! `operation` field (`landmark_process_start`, `landmark_process_complete`,
//! `vector_query_start`, `vector_query_complete`, `embedding_generation`, `upsert_batch`)
//! and, when a request context is active, a `correlation_id` field.
use std::sync::OnceLock;

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::config::{LogProvider, get_config};

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Configure tracing subscribers for stdout and optional file logging.
///
/// - Respects `RUST_LOG` for filtering (defaults to `info`).
/// - Installs a stdout layer matching the configured `LOG_PROVIDER` and, when available,
///   a file layer.
/// - Uses a global guard to keep the non‑blocking writer alive for the process lifetime.
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let provider = get_config().log_provider;

    let registry = tracing_subscriber::registry().with(env_filter);
    let file_writer = configure_file_writer();

    match provider {
        LogProvider::Stdout => {
            let stdout_layer = fmt::layer().with_target(false).compact();
            if let Some(writer) = file_writer {
                let file_layer = fmt::layer()
                    .with_writer(writer)
                    .with_target(true)
                    .with_ansi(false)
                    .compact();
                registry.with(stdout_layer).with(file_layer).init();
            } else {
                registry.with(stdout_layer).init();
            }
        }
        LogProvider::Google => {
            // Cloud log routers expect one JSON object per line with flattened fields.
            let stdout_layer = fmt::layer()
                .json()
                .flatten_event(true)
                .with_current_span(false)
                .with_span_list(false);
            if let Some(writer) = file_writer {
                let file_layer = fmt::layer()
                    .json()
                    .flatten_event(true)
                    .with_current_span(false)
                    .with_span_list(false)
                    .with_writer(writer)
                    .with_ansi(false);
                registry.with(stdout_layer).with(file_layer).init();
            } else {
                registry.with(stdout_layer).init();
            }
        }
    }
}

/// Build a non‑blocking writer for file logging.
///
/// Returns `None` when the logs directory cannot be created or the target file cannot be opened.
fn configure_file_writer() -> Option<NonBlocking> {
    if let Ok(path) = std::env::var("LANDMARK_LOG_FILE") {
        match std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
        {
            Ok(file) => {
                let (non_blocking, guard) = tracing_appender::non_blocking(file);
                let _ = LOG_GUARD.set(guard);
                Some(non_blocking)
            }
            Err(err) => {
                eprintln!("Failed to open log file {path}: {err}");
                None
            }
        }
    } else {
        if let Err(err) = std::fs::create_dir_all("logs") {
            eprintln!("Failed to create logs directory: {err}");
            return None;
        }
        let prefix = get_config()
            .log_name_prefix
            .clone()
            .unwrap_or_else(|| "landmark-vectors".to_string());
        let file_appender = tracing_appender::rolling::never("logs", format!("{prefix}.log"));
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        let _ = LOG_GUARD.set(guard);
        Some(non_blocking)
    }
}

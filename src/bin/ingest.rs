//! Batch ingestion CLI.
//!
//! Processes landmark designation reports and Wikipedia articles into the vector
//! index. Exit codes: 0 when at least one landmark succeeded and nothing fatal
//! occurred, 1 when every landmark failed (or verification failed), 2 on
//! configuration or argument errors.

use std::collections::BTreeSet;
use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use landmark_vectors::catalog::{CatalogClient, LandmarkId};
use landmark_vectors::pipeline::{
    BatchRunReport, Orchestrator, OrchestratorConfig, PdfProcessor, WikipediaProcessor,
};
use landmark_vectors::vectorstore::{QueryArgs, SourceType, VectorStoreAdapter, compose_filter};
use landmark_vectors::{config, logging};
use time::OffsetDateTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Source {
    /// Designation-report PDFs only.
    Pdf,
    /// Wikipedia articles only.
    Wikipedia,
    /// Both sources, PDF pass first.
    All,
}

/// Ingest NYC landmark documents into the vector index.
#[derive(Debug, Parser)]
#[command(name = "ingest", version)]
struct Args {
    /// Which document source(s) to process.
    #[arg(long, value_enum, default_value_t = Source::All)]
    source: Source,

    /// Explicit landmark IDs (comma separated); overrides catalog pagination.
    #[arg(long, value_delimiter = ',')]
    ids: Vec<String>,

    /// Maximum number of landmarks to pull from the catalog.
    #[arg(long)]
    limit: Option<usize>,

    /// Catalog page to start from.
    #[arg(long, default_value_t = 1)]
    page: usize,

    /// Catalog page size.
    #[arg(long, default_value_t = 100)]
    page_size: usize,

    /// Override the configured worker count.
    #[arg(long)]
    parallelism: Option<usize>,

    /// Keep previously stored vectors instead of replacing them.
    #[arg(long)]
    no_replace: bool,

    /// Directory receiving the per-run result summary (overrides RESULTS_DIR).
    #[arg(long)]
    results_dir: Option<PathBuf>,

    /// Print index statistics and exit.
    #[arg(long)]
    stats: bool,

    /// After the run, verify stored chunk indices are contiguous per landmark.
    #[arg(long)]
    verify: bool,
}

#[tokio::main]
async fn main() {
    let code = run().await;
    std::process::exit(code);
}

async fn run() -> i32 {
    let args = Args::parse();
    config::init_config();
    logging::init_tracing();

    if args.stats {
        return print_stats().await;
    }

    let ids = match resolve_ids(&args).await {
        Ok(ids) => ids,
        Err(code) => return code,
    };
    if ids.is_empty() {
        eprintln!("No landmarks selected; nothing to do");
        return 2;
    }

    let mut scheduling = OrchestratorConfig::from_env();
    if let Some(parallelism) = args.parallelism {
        if parallelism == 0 {
            eprintln!("--parallelism must be at least 1");
            return 2;
        }
        scheduling.parallelism = parallelism;
    }
    let replace = !args.no_replace && config::get_config().delete_existing_on_reprocess;

    let mut reports: Vec<(SourceType, BatchRunReport)> = Vec::new();
    if matches!(args.source, Source::Pdf | Source::All) {
        match run_pdf_pass(&ids, &scheduling, replace).await {
            Ok(report) => reports.push((SourceType::Pdf, report)),
            Err(error) => {
                eprintln!("Failed to start PDF pass: {error:#}");
                return 2;
            }
        }
    }
    if matches!(args.source, Source::Wikipedia | Source::All) {
        match run_wikipedia_pass(&ids, &scheduling, replace).await {
            Ok(report) => reports.push((SourceType::Wikipedia, report)),
            Err(error) => {
                eprintln!("Failed to start Wikipedia pass: {error:#}");
                return 2;
            }
        }
    }

    for (source, report) in &reports {
        println!(
            "{source}: attempted={} succeeded={} failed={} chunks={} duration={:.1}s",
            report.statistics.attempted,
            report.statistics.succeeded,
            report.statistics.failed,
            report.statistics.chunks,
            report.statistics.duration_secs,
        );
    }

    if let Err(error) = write_summary(&args, &reports) {
        tracing::warn!(error = %error, "Failed to write run summary");
    }

    let mut verified = true;
    if args.verify {
        verified = verify_runs(&reports).await;
    }

    let any_succeeded = reports
        .iter()
        .any(|(_, report)| report.statistics.succeeded > 0);
    let all_failed = reports.iter().all(|(_, report)| {
        report.statistics.attempted > 0 && report.statistics.succeeded == 0
    });

    if all_failed || !verified {
        1
    } else if any_succeeded {
        0
    } else {
        1
    }
}

async fn print_stats() -> i32 {
    let adapter = match VectorStoreAdapter::new() {
        Ok(adapter) => adapter,
        Err(error) => {
            eprintln!("Failed to initialize vector store adapter: {error}");
            return 2;
        }
    };
    match adapter.stats().await {
        Ok(stats) => {
            println!(
                "dimension={} vectors={}",
                stats
                    .dimension
                    .map(|d| d.to_string())
                    .unwrap_or_else(|| "unknown".into()),
                stats.total_vector_count
            );
            0
        }
        Err(error) => {
            eprintln!("Failed to read index statistics: {error}");
            1
        }
    }
}

async fn resolve_ids(args: &Args) -> Result<Vec<LandmarkId>, i32> {
    if !args.ids.is_empty() {
        let mut ids = Vec::with_capacity(args.ids.len());
        for raw in &args.ids {
            match LandmarkId::normalize(raw) {
                Ok(id) => ids.push(id),
                Err(error) => {
                    eprintln!("{error}");
                    return Err(2);
                }
            }
        }
        return Ok(ids);
    }

    if args.page_size == 0 {
        eprintln!("--page-size must be at least 1");
        return Err(2);
    }
    let catalog = match CatalogClient::new() {
        Ok(catalog) => catalog,
        Err(error) => {
            eprintln!("Failed to initialize catalog client: {error}");
            return Err(2);
        }
    };

    let mut ids = Vec::new();
    let mut page = args.page;
    loop {
        let (landmarks, _) = match catalog.list_landmarks(args.page_size, page).await {
            Ok(result) => result,
            Err(error) => {
                eprintln!("Failed to list landmarks: {error}");
                return Err(1);
            }
        };
        let received = landmarks.len();
        for landmark in landmarks {
            ids.push(landmark.id);
            if let Some(limit) = args.limit
                && ids.len() == limit
            {
                return Ok(ids);
            }
        }
        if received < args.page_size {
            return Ok(ids);
        }
        page += 1;
    }
}

async fn run_pdf_pass(
    ids: &[LandmarkId],
    scheduling: &OrchestratorConfig,
    replace: bool,
) -> anyhow::Result<BatchRunReport> {
    let mut slots = Vec::with_capacity(scheduling.parallelism);
    for _ in 0..scheduling.parallelism {
        slots.push(Some(PdfProcessor::from_env()?.with_replace_existing(replace)));
    }
    let orchestrator = Orchestrator::new(scheduling.clone());
    Ok(orchestrator
        .run(ids.to_vec(), move |worker| {
            slots[worker].take().expect("one processor per worker")
        })
        .await)
}

async fn run_wikipedia_pass(
    ids: &[LandmarkId],
    scheduling: &OrchestratorConfig,
    replace: bool,
) -> anyhow::Result<BatchRunReport> {
    let mut slots = Vec::with_capacity(scheduling.parallelism);
    for _ in 0..scheduling.parallelism {
        slots.push(Some(
            WikipediaProcessor::from_env()?.with_replace_existing(replace),
        ));
    }
    let orchestrator = Orchestrator::new(scheduling.clone());
    Ok(orchestrator
        .run(ids.to_vec(), move |worker| {
            slots[worker].take().expect("one processor per worker")
        })
        .await)
}

/// Verify invariant: for each successfully stored landmark/source, the stored chunk
/// indices form `{0, …, total_chunks - 1}`.
async fn verify_runs(reports: &[(SourceType, BatchRunReport)]) -> bool {
    let adapter = match VectorStoreAdapter::new() {
        Ok(adapter) => adapter,
        Err(error) => {
            eprintln!("Verification unavailable: {error}");
            return false;
        }
    };

    let mut ok = true;
    for (source, report) in reports {
        for result in &report.results {
            if !result.success || result.chunks == 0 {
                continue;
            }
            match verify_landmark(&adapter, &result.landmark_id, *source).await {
                Ok(true) => {}
                Ok(false) => {
                    eprintln!("Verification failed for {} ({source})", result.landmark_id);
                    ok = false;
                }
                Err(error) => {
                    eprintln!(
                        "Verification error for {} ({source}): {error}",
                        result.landmark_id
                    );
                    ok = false;
                }
            }
        }
    }
    ok
}

async fn verify_landmark(
    adapter: &VectorStoreAdapter,
    landmark_id: &LandmarkId,
    source: SourceType,
) -> anyhow::Result<bool> {
    let matches = adapter
        .query(QueryArgs {
            vector: None,
            top_k: 10_000,
            filter: compose_filter(None, Some(landmark_id.as_str()), Some(source)),
            ..Default::default()
        })
        .await?;

    let mut indices = BTreeSet::new();
    let mut total = None;
    for entry in &matches {
        let index = entry.metadata.get("chunk_index").and_then(metadata_u64);
        let chunk_total = entry.metadata.get("total_chunks").and_then(metadata_u64);
        match (index, chunk_total) {
            (Some(index), Some(chunk_total)) => {
                indices.insert(index);
                if total.is_some_and(|t| t != chunk_total) {
                    return Ok(false);
                }
                total = Some(chunk_total);
            }
            _ => return Ok(false),
        }
    }

    match total {
        None => Ok(matches.is_empty()),
        Some(total) => Ok(indices.len() as u64 == total && indices.iter().copied().eq(0..total)),
    }
}

/// Counters are stored as stringified scalars; accept a bare number too in case the
/// index predates that convention.
fn metadata_u64(value: &serde_json::Value) -> Option<u64> {
    value
        .as_str()
        .and_then(|text| text.parse().ok())
        .or_else(|| value.as_u64())
}

fn write_summary(args: &Args, reports: &[(SourceType, BatchRunReport)]) -> std::io::Result<()> {
    let dir = args
        .results_dir
        .clone()
        .or_else(|| config::get_config().results_dir.clone().map(PathBuf::from));
    let Some(dir) = dir else {
        return Ok(());
    };

    std::fs::create_dir_all(&dir)?;
    let path = dir.join(format!("ingest-{}.json", timestamp_for_filename()));
    let summary: Vec<serde_json::Value> = reports
        .iter()
        .map(|(source, report)| {
            serde_json::json!({
                "source_type": source.as_str(),
                "statistics": report.statistics,
                "results": report.results,
            })
        })
        .collect();
    std::fs::write(&path, serde_json::to_vec_pretty(&summary)?)?;
    println!("Wrote run summary to {}", path.display());
    Ok(())
}

/// Compact ISO-8601 UTC timestamp safe for filenames.
fn timestamp_for_filename() -> String {
    let now = OffsetDateTime::now_utc();
    format!(
        "{:04}{:02}{:02}T{:02}{:02}{:02}Z",
        now.year(),
        u8::from(now.month()),
        now.day(),
        now.hour(),
        now.minute(),
        now.second()
    )
}

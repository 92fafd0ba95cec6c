use crate::{
    analytics::{high_risk_only, summarize_items},
    batch::{flatten, Batch},
    config::Config,
    export::{summary_rows, write_csv},
    normalize::normalize_item,
    pending::{PendingDocument, PendingSet},
    pipeline::{view_items, BatchOutcome, Pipeline},
    prefs::{self, Theme},
    report::{render_history, render_summary, render_table},
    service::{http::HttpService, PrivacyMode, ProcessingService, SubmissionConfig},
    storage::LocalStorage,
    store::BatchStore,
    table::{ResultsView, SortDir, SortKey},
    tracker::Progress,
    util::{ensure_dir, now_millis, now_rfc3339},
};
use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

#[derive(Parser, Debug)]
#[command(name = "medvault")]
#[command(about = "Batch document submission client (dispatch + progress + local history + results)")]
pub struct Args {
    #[command(subcommand)]
    pub cmd: Command,

    /// Path to config TOML. If omitted, uses ./medvault.toml if present.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override the processing service base URL.
    #[arg(long, env = "MEDVAULT_API_BASE")]
    pub api_base: Option<String>,

    /// Override log level (trace/debug/info/warn/error).
    #[arg(long)]
    pub log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Check that the processing service is reachable.
    Doctor {},
    /// Upload documents as one batch and follow it to completion.
    Submit {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        #[arg(long)]
        privacy_mode: Option<PrivacyMode>,
        #[arg(long)]
        user: Option<String>,
        /// Print the batch id and return without tracking.
        #[arg(long)]
        no_wait: bool,
    },
    /// Follow an already-dispatched batch and store it when done.
    Watch { batch_id: String },
    /// List stored batches, most recent first.
    History {},
    /// Results table for the latest (or every) stored batch.
    Results {
        #[arg(long)]
        all: bool,
        #[arg(long)]
        search: Option<String>,
        /// Sort column; repeating the same column flips the direction.
        #[arg(long)]
        sort: Vec<SortKey>,
        #[arg(long)]
        desc: bool,
        /// Row positions (in the displayed order) to show before/after text for.
        #[arg(long)]
        expand: Vec<usize>,
        /// Export the visible rows to CSV (default path from config).
        #[arg(long, num_args = 0..=1)]
        csv: Option<Option<PathBuf>>,
    },
    /// Aggregate counts across all stored batches.
    Dashboard {
        #[arg(long)]
        high_only: bool,
        #[arg(long, num_args = 0..=1)]
        csv: Option<Option<PathBuf>>,
    },
    /// Download the processed artifact for a stored document.
    Download {
        filename: String,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Show or update session preferences.
    Prefs {
        #[arg(long)]
        privacy_mode: Option<PrivacyMode>,
        #[arg(long)]
        user: Option<String>,
        #[arg(long)]
        theme: Option<Theme>,
    },
    /// Erase the stored batch history.
    Clear {},
}

pub async fn dispatch(args: Args) -> Result<()> {
    let mut cfg = match resolve_config_path(args.config.as_deref()) {
        Some(p) => Config::load(&p)?,
        None => Config::default(),
    };
    if let Some(base) = &args.api_base {
        cfg.service.base_url = base.clone();
    }

    let _guard = init_logging(&args, &cfg)?;

    let storage = open_storage(&cfg);
    prefs::init(&storage);
    let store = Arc::new(BatchStore::new(storage.clone()));

    match args.cmd {
        Command::Doctor {} => doctor(&cfg).await,
        Command::Submit {
            files,
            privacy_mode,
            user,
            no_wait,
        } => submit(&cfg, store, &files, privacy_mode, user, no_wait).await,
        Command::Watch { batch_id } => watch(&cfg, store, batch_id).await,
        Command::History {} => {
            print!("{}", render_history(&store.load_all()));
            Ok(())
        }
        Command::Results {
            all,
            search,
            sort,
            desc,
            expand,
            csv,
        } => results(&cfg, &store, all, search, &sort, desc, &expand, csv),
        Command::Dashboard { high_only, csv } => dashboard(&cfg, &store, high_only, csv),
        Command::Download { filename, out } => download(&cfg, &store, &filename, out).await,
        Command::Prefs {
            privacy_mode,
            user,
            theme,
        } => update_prefs(&storage, privacy_mode, user, theme),
        Command::Clear {} => {
            store.clear();
            info!("batch history cleared");
            Ok(())
        }
    }
}

fn resolve_config_path(user: Option<&Path>) -> Option<PathBuf> {
    if let Some(p) = user {
        return Some(p.to_path_buf());
    }
    ["medvault.toml", "medvault.example.toml"]
        .iter()
        .map(PathBuf::from)
        .find(|p| p.exists())
}

fn open_storage(cfg: &Config) -> LocalStorage {
    match cfg.store_dir() {
        Some(dir) => match ensure_dir(&dir) {
            Ok(()) => LocalStorage::new(dir),
            Err(e) => {
                warn!("local store disabled: {e:#}");
                LocalStorage::unavailable()
            }
        },
        None => {
            warn!("no data directory available; local store disabled");
            LocalStorage::unavailable()
        }
    }
}

fn init_logging(args: &Args, cfg: &Config) -> Result<Option<WorkerGuard>> {
    let level = args
        .log_level
        .as_deref()
        .unwrap_or(cfg.logging.level.as_str());

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let stderr_layer = if cfg.logging.json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(true)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .boxed()
    };

    let file_path = resolve_log_path(cfg);
    let (file_layer, guard) = if let Some(path) = file_path.as_deref() {
        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        ensure_dir(parent)?;
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("open log file: {}", path.display()))?;
        let (non_blocking, guard) = tracing_appender::non_blocking(file);
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(non_blocking)
            .with_ansi(false)
            .with_target(true)
            .boxed();
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow!("failed to init logging: {e}"))?;

    Ok(guard)
}

fn resolve_log_path(cfg: &Config) -> Option<PathBuf> {
    if !cfg.logging.write_to_file {
        return None;
    }
    if !cfg.logging.file_path.is_empty() {
        return Some(PathBuf::from(&cfg.logging.file_path));
    }
    cfg.store_dir().map(|d| d.join("logs").join("medvault.log"))
}

/// Cancels the returned token on Ctrl-C.
fn interrupt_token() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupted; stopping progress polling");
            trigger.cancel();
        }
    });
    token
}

fn log_progress(p: &Progress) {
    info!("{} of {} files processed ({}%)", p.processed, p.total, p.percent);
}

async fn doctor(cfg: &Config) -> Result<()> {
    let service = HttpService::new(cfg)?;
    info!(base_url = service.base_url(), "checking processing service");
    let diag = service.doctor().await;
    println!("{}", serde_json::to_string_pretty(&diag)?);
    Ok(())
}

async fn submit(
    cfg: &Config,
    store: Arc<BatchStore>,
    files: &[PathBuf],
    privacy_mode: Option<PrivacyMode>,
    user: Option<String>,
    no_wait: bool,
) -> Result<()> {
    let mut pending = PendingSet::new();
    for path in files {
        pending.add([PendingDocument::from_path(path)?]);
    }

    let defaults = prefs::current().submission;
    let submission = SubmissionConfig {
        privacy_mode: privacy_mode.unwrap_or(defaults.privacy_mode),
        user: user.unwrap_or(defaults.user),
    };

    let service = Arc::new(HttpService::new(cfg)?);
    let pipeline = Pipeline::new(cfg, service, store);
    let started = now_rfc3339();
    let batch = pipeline.submit(&pending, &submission).await?;
    pending.clear();

    if no_wait {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "batch_id": batch.id,
                "documents": batch.total,
                "submitted": started,
            }))?
        );
        return Ok(());
    }

    let cancel = interrupt_token();
    let outcome = pipeline
        .await_completion(batch, &cancel, log_progress)
        .await;
    finish(cfg, pipeline.store(), outcome)
}

async fn watch(cfg: &Config, store: Arc<BatchStore>, batch_id: String) -> Result<()> {
    let service = Arc::new(HttpService::new(cfg)?);
    let pipeline = Pipeline::new(cfg, service, store);
    let cancel = interrupt_token();
    let outcome = pipeline
        .await_completion(Batch::new(batch_id, 0, now_millis()), &cancel, log_progress)
        .await;
    finish(cfg, pipeline.store(), outcome)
}

fn finish(cfg: &Config, store: &BatchStore, outcome: BatchOutcome) -> Result<()> {
    match outcome {
        BatchOutcome::Stored(batch) => {
            if cfg.output.print_summary {
                let items = flatten(std::slice::from_ref(&batch));
                print!("{}", render_table(&ResultsView::new(&items)));
            }
            info!("{} batches in local history", store.load_all().len());
            Ok(())
        }
        BatchOutcome::Detached { batch_id, reason } => Err(anyhow!(
            "batch {batch_id} not stored ({reason:?}); resume with `medvault watch {batch_id}`"
        )),
    }
}

#[allow(clippy::too_many_arguments)]
fn results(
    cfg: &Config,
    store: &BatchStore,
    all: bool,
    search: Option<String>,
    sort: &[SortKey],
    desc: bool,
    expand: &[usize],
    csv: Option<Option<PathBuf>>,
) -> Result<()> {
    let items = view_items(store, all);
    let mut view = ResultsView::new(&items);
    if let Some(q) = search {
        view.set_query(q);
    }
    for key in sort {
        view.sort_by(*key);
    }
    if desc && view.sort().1 == SortDir::Asc {
        let (key, _) = view.sort();
        view.sort_by(key);
    }
    for &i in expand {
        view.toggle_expanded(i);
    }

    print!("{}", render_table(&view));

    if let Some(path) = csv {
        let path = path.unwrap_or_else(|| PathBuf::from(&cfg.output.csv_filename));
        write_csv(&path, &view.export_rows())?;
    }
    Ok(())
}

fn dashboard(
    cfg: &Config,
    store: &BatchStore,
    high_only: bool,
    csv: Option<Option<PathBuf>>,
) -> Result<()> {
    let items = view_items(store, true);
    let items = if high_only { high_risk_only(&items) } else { items };
    print!("{}", render_summary(&summarize_items(&items)));

    if let Some(path) = csv {
        let path = path.unwrap_or_else(|| PathBuf::from(&cfg.output.csv_filename));
        write_csv(&path, &summary_rows(&items))?;
    }
    Ok(())
}

async fn download(
    cfg: &Config,
    store: &BatchStore,
    filename: &str,
    out: Option<PathBuf>,
) -> Result<()> {
    let items = view_items(store, true);
    let reference = items
        .iter()
        .filter(|it| it.filename == filename)
        .find_map(|it| normalize_item(it).download_url)
        .ok_or_else(|| anyhow!("no stored download for {filename}"))?;

    let service = HttpService::new(cfg)?;
    let bytes = service.download(&reference).await?;
    let out = out.unwrap_or_else(|| PathBuf::from(filename));
    std::fs::write(&out, &bytes).with_context(|| format!("writing {}", out.display()))?;
    info!("saved {} ({} bytes)", out.display(), bytes.len());
    Ok(())
}

fn update_prefs(
    storage: &LocalStorage,
    privacy_mode: Option<PrivacyMode>,
    user: Option<String>,
    theme: Option<Theme>,
) -> Result<()> {
    let p = if privacy_mode.is_some() || user.is_some() || theme.is_some() {
        prefs::update(storage, |p| {
            if let Some(m) = privacy_mode {
                p.submission.privacy_mode = m;
            }
            if let Some(u) = user {
                p.submission.user = u;
            }
            if let Some(t) = theme {
                p.theme = t;
            }
        })
    } else {
        prefs::current()
    };
    println!(
        "{}",
        serde_json::to_string_pretty(&serde_json::json!({
            "privacy_mode": p.submission.privacy_mode,
            "user": p.submission.user,
            "theme": p.theme,
        }))?
    );
    Ok(())
}

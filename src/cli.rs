use crate::{
    checkpoint,
    config::Config,
    job::{DirArchiver, JobResult, LogObserver, NameBasedProbe, Outcome},
    names,
    names::DatasetKind,
    pipeline::Pipeline,
    supervisor::ToolMode,
    util::ensure_dir,
    validate,
};
use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

#[derive(Parser, Debug)]
#[command(name = "demux-step")]
#[command(about = "IMS capture-pipeline step tool (stage + demultiplex + reconcile)")]
pub struct Args {
    #[command(subcommand)]
    pub cmd: Command,

    /// Path to config TOML. If omitted, uses ./demux-step.toml if present.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override log level (trace/debug/info/warn/error).
    #[arg(long)]
    pub log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Sanity-check the tool executable and configured directories.
    Doctor {},
    /// Show the checkpoint resume decision for a dataset.
    Resolve {
        #[arg(long)]
        dataset: String,
        /// Remote dataset directory; defaults to the configured storage layout.
        #[arg(long)]
        remote_dir: Option<PathBuf>,
    },
    /// Freshness-check the finish marker of a decoded artifact.
    Validate {
        #[arg(long)]
        artifact: PathBuf,
    },
    /// Run the full job for one dataset.
    Run {
        #[arg(long)]
        dataset: String,
        #[arg(long)]
        remote_dir: Option<PathBuf>,
    },
}

pub fn dispatch(args: Args) -> Result<()> {
    let cfg_path = resolve_config_path(args.config.as_deref())?;
    let cfg = Config::load(&cfg_path)?;
    let _guard = init_logging(&args, &cfg, resolve_log_path(&cfg).as_deref())?;

    match &args.cmd {
        Command::Doctor {} => doctor(&cfg),
        Command::Resolve { dataset, remote_dir } => resolve(&cfg, dataset, remote_dir.as_deref()),
        Command::Validate { artifact } => validate_cmd(&cfg, artifact),
        Command::Run { dataset, remote_dir } => run(&cfg, dataset, remote_dir.as_deref()),
    }
}

fn resolve_config_path(user: Option<&Path>) -> Result<PathBuf> {
    if let Some(p) = user {
        return Ok(p.to_path_buf());
    }
    let default = PathBuf::from("demux-step.toml");
    if default.exists() {
        Ok(default)
    } else {
        Ok(PathBuf::from("demux-step.example.toml"))
    }
}

fn init_logging(args: &Args, cfg: &Config, file_path: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let level = args
        .log_level
        .as_deref()
        .unwrap_or(cfg.logging.level.as_str());

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let stdout_layer = if cfg.logging.json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer().with_target(true).boxed()
    };

    let (file_layer, guard) = if let Some(path) = file_path {
        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        ensure_dir(parent)?;
        let file = std::fs::File::create(path)
            .with_context(|| format!("create log file: {}", path.display()))?;
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
        .with(stdout_layer)
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
    // Never under the working directory; that is cleaned or archived per job.
    Some(PathBuf::from("demux-step.log"))
}

fn dataset_kind(cfg: &Config) -> Result<DatasetKind> {
    DatasetKind::from_config(&cfg.global.dataset_kind)
        .ok_or_else(|| anyhow!("unknown dataset_kind: {}", cfg.global.dataset_kind))
}

fn remote_dir_for(cfg: &Config, dataset: &str, user: Option<&Path>) -> PathBuf {
    user.map(Path::to_path_buf).unwrap_or_else(|| {
        names::remote_dataset_dir(&cfg.paths.storage_volume, &cfg.paths.storage_path, dataset)
    })
}

fn doctor(cfg: &Config) -> Result<()> {
    let exe = PathBuf::from(&cfg.tool.exe);
    let mode = ToolMode::from_config(&cfg.tool.mode);
    let kind = DatasetKind::from_config(&cfg.global.dataset_kind);
    let report = serde_json::json!({
        "tool_exe": cfg.tool.exe,
        "tool_exe_found": exe.exists(),
        "mode_recognized": mode.is_some(),
        "dataset_kind_recognized": kind.is_some(),
        "work_dir": cfg.paths.work_dir,
        "storage_volume": cfg.paths.storage_volume,
        "freshness_window_minutes": cfg.validation.freshness_window_minutes,
        "ok": exe.exists() && mode.is_some() && kind.is_some(),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn resolve(cfg: &Config, dataset: &str, remote_dir: Option<&Path>) -> Result<()> {
    let kind = dataset_kind(cfg)?;
    let remote = remote_dir_for(cfg, dataset, remote_dir);
    let work_dir = PathBuf::from(&cfg.paths.work_dir);
    ensure_dir(&work_dir)?;
    let decision = checkpoint::resolve(&remote, &work_dir, dataset, kind);
    println!(
        "{}",
        serde_json::to_string_pretty(&serde_json::json!({
            "dataset": dataset,
            "remote_dir": remote,
            "resume_requested": decision.resume_requested,
            "resume_frame": decision.resume_frame,
        }))?
    );
    Ok(())
}

fn validate_cmd(cfg: &Config, artifact: &Path) -> Result<()> {
    let v = validate::validate(artifact, cfg.validation.freshness_window_minutes)?;
    println!(
        "{}",
        serde_json::to_string_pretty(&serde_json::json!({
            "artifact": artifact,
            "valid": v.valid,
            "timestamp": v.timestamp.map(|t| t.to_string()),
            "message": v.message,
        }))?
    );
    Ok(())
}

fn run(cfg: &Config, dataset: &str, remote_dir: Option<&Path>) -> Result<()> {
    let remote = remote_dir_for(cfg, dataset, remote_dir);

    if cfg.debug.dump_effective_config {
        let raw = toml::to_string(cfg).unwrap_or_default();
        std::fs::write("demux-step.effective.toml", raw)?;
    }

    let archiver = DirArchiver {
        archive_root: PathBuf::from(&cfg.paths.failure_archive_dir),
    };
    let pipeline = Pipeline::new(cfg, archiver);
    let result: JobResult = pipeline.run_job(dataset, &remote, &NameBasedProbe, &LogObserver);

    if cfg.global.print_summary {
        println!("{}", serde_json::to_string_pretty(&result)?);
    }
    if result.outcome == Outcome::Failure {
        return Err(anyhow!("{}", result.message));
    }
    Ok(())
}

use anyhow::{Context, Result};
use autocrop::{
    logging, AutocropConfig, FfmpegTools, HookEvent, Manager, MediaItem, MediaKind, Orchestrator,
    OverrideTable,
};
use clap::Parser;
use log::{info, warn};
use std::path::PathBuf;
use std::process::ExitCode;

/// Post-import hook that crops letterboxed videos for Sonarr/Radarr
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file (JSON or TOML)
    #[arg(short, long, env = "AUTOCROP_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = Args::parse();

    let cfg = match AutocropConfig::load_config(args.config.as_deref()) {
        Ok(cfg) => cfg,
        Err(e) => {
            // No configured sinks yet; report on stderr through the console logger
            let _ = logging::init_logging(None, log::LevelFilter::Warn);
            warn!("Failed to load configuration: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    let level = match logging::level_filter(&cfg.log_level, args.verbose) {
        Ok(level) => level,
        Err(e) => {
            let _ = logging::init_logging(None, log::LevelFilter::Warn);
            warn!("{:#}", e);
            return ExitCode::FAILURE;
        }
    };
    if let Err(e) = logging::init_logging(cfg.log_dir.as_deref(), level) {
        eprintln!("autocrop: {:#}", e);
        return ExitCode::FAILURE;
    }

    let status = exit_status(&run(&cfg, std::env::vars()).await);
    log::logger().flush();
    ExitCode::from(status)
}

/// 0 on success or a test event; any failure is logged as a warning and gives 1
fn exit_status(result: &Result<()>) -> u8 {
    match result {
        Ok(()) => 0,
        Err(e) => {
            warn!("{:#}", e);
            1
        }
    }
}

async fn run<I>(cfg: &AutocropConfig, vars: I) -> Result<()>
where
    I: IntoIterator<Item = (String, String)>,
{
    let event = HookEvent::from_vars(vars).context("Rejected hook event")?;

    let (manager, item) = match event {
        HookEvent::Test(manager) => {
            info!("{:?} test has been ran successfully.", manager);
            return Ok(());
        }
        HookEvent::Import { manager, item } => (manager, item),
    };
    log_import(manager, &item);

    let table_path = match item.kind {
        MediaKind::Episode { .. } => cfg.tv_overrides.as_deref(),
        MediaKind::Movie => cfg.movie_overrides.as_deref(),
    };
    let overrides = OverrideTable::load(table_path).context("Failed to load override table")?;

    let tools = FfmpegTools::new(cfg);
    let orchestrator = Orchestrator::from_config(&tools, &overrides, cfg);

    let outcome = orchestrator.run(&item).await.map_err(|e| {
        anyhow::anyhow!(
            "{} failed at stage '{}': {}\nfile_path => {}\nsourcepath => {}",
            item.label(),
            e.stage(),
            e,
            item.destination_path.display(),
            item.source_path.display()
        )
    })?;

    info!(
        "Completed: {} {:?} ({:?} target {}, was {})",
        item.label(),
        outcome.action,
        outcome.target_source,
        outcome.target,
        outcome.current
    );
    Ok(())
}

fn log_import(manager: Manager, item: &MediaItem) {
    let what = match item.kind {
        MediaKind::Episode { .. } => "show",
        MediaKind::Movie => "movie",
    };
    let verb = if item.is_upgrade { "upgraded" } else { "added" };
    info!(
        "New {} {} by {:?}: {}\nfile_path => {}\nsourcepath => {}",
        what,
        verb,
        manager,
        item.label(),
        item.destination_path.display(),
        item.source_path.display()
    );
}

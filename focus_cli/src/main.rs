mod bench;
mod cli;
mod commands;
mod error_fmt;
mod mailbox;
mod rt;

use std::path::Path;
use std::process::ExitCode;
use std::sync::atomic::Ordering;

use clap::Parser;
use eyre::WrapErr;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt};

use crate::cli::{Cli, Commands, JSON_MODE};
use crate::commands::Signals;
use crate::error_fmt::{exit_code_for_error, format_error_json, humanize};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

type FileLog = (BoxedLayer, WorkerGuard);

fn file_layer(logging: &focus_config::Logging) -> eyre::Result<Option<FileLog>> {
    let Some(file) = logging.file.as_deref() else {
        return Ok(None);
    };
    let path = Path::new(file);
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let name = path
        .file_name()
        .ok_or_else(|| eyre::eyre!("logging.file has no file name: {file}"))?;
    let appender = match logging.rotation.as_deref().unwrap_or("never") {
        "daily" => tracing_appender::rolling::daily(dir, name),
        "hourly" => tracing_appender::rolling::hourly(dir, name),
        "never" => tracing_appender::rolling::never(dir, name),
        other => eyre::bail!("logging.rotation must be never|daily|hourly (got {other})"),
    };
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let filter = EnvFilter::try_new(logging.level.as_deref().unwrap_or("info"))
        .wrap_err("invalid logging.level")?;
    let layer = fmt::layer()
        .json()
        .with_ansi(false)
        .with_writer(writer)
        .with_filter(filter)
        .boxed();
    Ok(Some((layer, guard)))
}

/// Console logs go to stderr so stdout carries only results. The returned
/// guard flushes the file log when dropped.
fn init_tracing(
    json: bool,
    level: &str,
    logging: &focus_config::Logging,
) -> eyre::Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .wrap_err_with(|| format!("invalid --log-level {level:?}"))?;
    let console: BoxedLayer = if json {
        fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_filter(filter)
            .boxed()
    } else {
        fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
            .with_filter(filter)
            .boxed()
    };
    let mut layers = vec![console];
    let mut guard = None;
    if let Some((layer, g)) = file_layer(logging)? {
        layers.push(layer);
        guard = Some(g);
    }
    tracing_subscriber::registry()
        .with(layers)
        .try_init()
        .wrap_err("failed to install tracing subscriber")?;
    Ok(guard)
}

fn install_signals() -> eyre::Result<Signals> {
    let signals = Signals::default();
    let handler = signals.clone();
    ctrlc::set_handler(move || {
        handler.interrupt.store(true, Ordering::SeqCst);
        handler.shutdown.store(true, Ordering::SeqCst);
    })
    .wrap_err("failed to install Ctrl-C handler")?;
    Ok(signals)
}

fn run(cli: Cli) -> eyre::Result<()> {
    let cfg = focus_config::load_file(&cli.config)?;
    cfg.validate().wrap_err("invalid configuration")?;
    let _log_guard = init_tracing(cli.json, &cli.log_level, &cfg.logging)?;
    tracing::debug!(config = %cli.config.display(), backend = bench::backend_name(), "config loaded");

    match cli.cmd {
        Commands::Measure { no_home, rt } => {
            let signals = install_signals()?;
            commands::measure(&cfg, no_home, rt, &signals, cli.json)
        }
        Commands::Home { rt } => {
            let signals = install_signals()?;
            commands::home(&cfg, rt, &signals, cli.json)
        }
        Commands::Serve { mailbox, rt } => {
            let signals = install_signals()?;
            commands::serve(&cfg, mailbox, rt, &signals, cli.json)
        }
        Commands::SelfCheck => commands::self_check(&cfg, cli.json),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);
    if let Err(e) = color_eyre::install() {
        eprintln!("Warning: error report hooks not installed: {e}");
    }

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::debug!(error = %format!("{err:#}"), "command failed");
            if JSON_MODE.get().copied().unwrap_or(false) {
                eprintln!("{}", format_error_json(&err));
            } else {
                eprintln!("{}", humanize(&err));
            }
            ExitCode::from(exit_code_for_error(&err))
        }
    }
}

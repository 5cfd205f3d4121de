//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::OnceLock;

/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "focus", version, about = "Lens focal-length bench")]
pub struct Cli {
    /// Path to config TOML
    #[arg(long, value_name = "FILE", default_value = "etc/focus_bench.toml")]
    pub config: PathBuf,

    /// Log and report as JSON lines instead of pretty text
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace)
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "info")]
    pub log_level: String,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

/// Memory locking mode for real-time operation.
#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum RtLock {
    /// Do not lock memory
    None,
    /// Lock currently resident pages
    Current,
    /// Lock current and future pages
    All,
}

impl RtLock {
    #[inline]
    pub fn os_default() -> Self {
        if cfg!(target_os = "linux") {
            RtLock::Current
        } else {
            RtLock::None
        }
    }
}

/// Real-time knobs shared by the motion commands.
#[derive(clap::Args, Debug, Clone, Copy)]
pub struct RtArgs {
    /// Enable real-time mode (SCHED_FIFO, affinity, mlockall)
    #[arg(
        long,
        action = ArgAction::SetTrue,
        long_help = "Enable real-time mode on Linux: SCHED_FIFO priority for the step-pulse loop, optional CPU pinning and memory locking. Reduces pulse jitter but may need CAP_SYS_NICE/CAP_IPC_LOCK or root."
    )]
    pub rt: bool,
    /// SCHED_FIFO priority when --rt is enabled (Linux only)
    #[arg(long, value_name = "PRIO")]
    pub rt_prio: Option<i32>,
    /// Memory locking mode for --rt: none, current, or all
    #[arg(long, value_enum, value_name = "MODE")]
    pub rt_lock: Option<RtLock>,
    /// CPU index to pin the process to when --rt is enabled
    #[arg(long, value_name = "CPU")]
    pub rt_cpu: Option<usize>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Home, scan for the focus peak and report the focal length
    Measure {
        /// Skip homing; the stage must already sit at the home switch
        #[arg(long, action = ArgAction::SetTrue)]
        no_home: bool,
        #[command(flatten)]
        rt: RtArgs,
    },
    /// Drive the lens carriage to the home switch
    Home {
        #[command(flatten)]
        rt: RtArgs,
    },
    /// Serve start/stop/home commands from the remote mailbox until Ctrl-C
    Serve {
        /// Mailbox state file (overrides [remote].mailbox)
        #[arg(long, value_name = "FILE")]
        mailbox: Option<PathBuf>,
        #[command(flatten)]
        rt: RtArgs,
    },
    /// Quick health check: endstops and sensor reading
    SelfCheck,
}

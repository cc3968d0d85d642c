// src/lib.rs

pub mod cache;
pub mod cli;
pub mod commands;
pub mod config;
pub mod dag;
pub mod device;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod ipc;
pub mod logging;
pub mod task;
pub mod types;
pub mod watch;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::cache::CacheProvider;
use crate::cli::{CliArgs, Command};
use crate::commands::{
    ClientContext, clean, control, create, settings as settings_cmd, watch as watch_cmd,
};
use crate::config::{Settings, default_settings_path, load_settings};
use crate::device::discover;
use crate::engine::{CoreRuntime, Runtime, RuntimeEvent, Scheduler};
use crate::exec::RealSupervisor;
use crate::ipc::Server;
use crate::task::DAEMON_NAME;
use crate::types::LogStream;

/// Capacity of the runtime event channel.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// How long open client connections may take to receive their last
/// response once the daemon stops.
const CONNECTION_DRAIN: Duration = Duration::from_secs(1);

/// High-level entry point used by `main.rs`.
///
/// Returns `Ok(false)` when the command ran but did not fully succeed.
pub async fn run(args: CliArgs) -> Result<bool> {
    if let Command::Set(set_args) = &args.command {
        let path = match &args.settings {
            Some(path) => path.clone(),
            None => default_settings_path()?,
        };
        return settings_cmd::set(&path, set_args);
    }

    let settings = load_settings(args.settings.as_deref())?;

    if let Command::Run { detach } = args.command {
        if detach {
            let dir = settings.cache().path_for(DAEMON_NAME, std::process::id());
            logging::redirect_std_streams(&dir)?;
            logging::init_file_logging(args.log_level, &dir, LogStream::Stderr.file_name())?;
        }
        run_daemon(settings).await?;
        return Ok(true);
    }

    let ctx = ClientContext::new(settings, args.settings.clone());
    match &args.command {
        Command::Run { .. } | Command::Set(_) => Ok(true),
        Command::Test { name } => control::test(&ctx, name.as_deref()).await,
        Command::Create(create_args) => create::create(&ctx, create_args).await,
        Command::Suspend(targets) => control::suspend(&ctx, targets).await,
        Command::Resume(targets) => control::resume(&ctx, targets).await,
        Command::Kill { targets, force } => control::kill(&ctx, targets, *force).await,
        Command::Remove(targets) => control::remove(&ctx, targets).await,
        Command::Exit => control::exit(&ctx).await,
        Command::Watch { name, stream } => watch_cmd::watch(&ctx, name.as_deref(), *stream).await,
        Command::Clean(clean_args) => clean::clean(&ctx, clean_args).await,
    }
}

/// Run the daemon in the current process until `meow exit` or Ctrl-C.
///
/// This wires together:
/// - the socket server
/// - scheduler core and runtime
/// - the process supervisor
/// - Ctrl-C handling
///
/// Running tasks are left alone when the daemon stops.
pub async fn run_daemon(mut settings: Settings) -> Result<()> {
    let daemon_pid = std::process::id();
    if settings.wants_device_detection() {
        settings.devices = discover::detect_devices().await;
    }
    let mut server = Server::bind(&settings.socket_path).await?;

    let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(EVENT_CHANNEL_CAPACITY);

    let supervisor = RealSupervisor::new(
        Arc::new(settings.cache()),
        settings.supervisor_options(daemon_pid),
        rt_tx.clone(),
    );

    let scheduler = Scheduler::new(settings.scheduler_config(daemon_pid));
    let core = CoreRuntime::new(scheduler);
    let runtime = Runtime::new(core, rt_rx, supervisor, settings.tick_interval);

    // Ctrl-C → graceful shutdown.
    {
        let tx = rt_tx.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "failed to listen for Ctrl+C");
                return;
            }
            let _ = tx.send(RuntimeEvent::ShutdownRequested).await;
        });
    }

    info!(
        pid = daemon_pid,
        devices = settings.devices.len(),
        home = %settings.home.display(),
        "{DAEMON_NAME} started"
    );

    let result = tokio::select! {
        res = runtime.run() => res.map_err(anyhow::Error::from),
        res = server.serve(rt_tx) => res,
    };

    server.shutdown(CONNECTION_DRAIN).await;
    info!("{DAEMON_NAME} stopped");
    result
}

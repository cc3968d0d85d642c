// src/exec/signal.rs

//! Process-group signal delivery.

use anyhow::Result;

/// Signals the supervisor sends to a task's process group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupSignal {
    Stop,
    Continue,
    Terminate,
    Kill,
}

/// Whether this platform has process groups to signal.
pub const GROUP_SIGNALS_SUPPORTED: bool = cfg!(unix);

/// Send `signal` to the process group `pgid`.
///
/// Returns `Ok(false)` when the group no longer exists.
#[cfg(unix)]
pub fn signal_group(pgid: u32, signal: GroupSignal) -> Result<bool> {
    use nix::errno::Errno;
    use nix::sys::signal::{Signal, killpg};
    use nix::unistd::Pid;

    let sig = match signal {
        GroupSignal::Stop => Signal::SIGSTOP,
        GroupSignal::Continue => Signal::SIGCONT,
        GroupSignal::Terminate => Signal::SIGTERM,
        GroupSignal::Kill => Signal::SIGKILL,
    };

    let pgid = i32::try_from(pgid)
        .map_err(|_| anyhow::anyhow!("process group id {pgid} out of range"))?;

    match killpg(Pid::from_raw(pgid), sig) {
        Ok(()) => {
            tracing::debug!(pgid, signal = ?sig, "signal delivered to process group");
            Ok(true)
        }
        Err(Errno::ESRCH) => Ok(false),
        Err(e) => Err(anyhow::anyhow!("killpg({pgid}, {sig:?}) failed: {e}")),
    }
}

#[cfg(not(unix))]
pub fn signal_group(_pgid: u32, _signal: GroupSignal) -> Result<bool> {
    Ok(false)
}

/// Exit code of a finished process; `128 + signal` for signal deaths.
pub fn exit_code(status: std::process::ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(sig) = status.signal() {
            return 128 + sig;
        }
    }

    -1
}

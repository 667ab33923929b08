//! `/reload`: stop the main loop, then replace this process with a fresh copy.

use std::sync::atomic::{AtomicBool, Ordering};

use {relay_auto_reply::RestartTrigger, tokio_util::sync::CancellationToken, tracing::info};

/// Records the request and cancels the main loop; `main` re-executes once
/// shutdown has finished.
pub struct ProcessRestart {
    requested: AtomicBool,
    cancel: CancellationToken,
}

impl ProcessRestart {
    pub fn new(cancel: CancellationToken) -> Self {
        Self {
            requested: AtomicBool::new(false),
            cancel,
        }
    }

    pub fn requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }
}

impl RestartTrigger for ProcessRestart {
    fn restart(&self) {
        info!("restart requested");
        self.requested.store(true, Ordering::SeqCst);
        self.cancel.cancel();
    }
}

/// Replace the current process image with the same binary and arguments.
/// Only returns on failure.
#[cfg(unix)]
pub fn reexec() -> anyhow::Result<()> {
    use {anyhow::Context, std::os::unix::process::CommandExt};

    let exe = std::env::current_exe().context("locate current executable")?;
    info!(exe = %exe.display(), "re-executing");
    let err = std::process::Command::new(&exe)
        .args(std::env::args_os().skip(1))
        .exec();
    Err(err).with_context(|| format!("exec {}", exe.display()))
}

#[cfg(not(unix))]
pub fn reexec() -> anyhow::Result<()> {
    anyhow::bail!("in-place restart is only supported on unix; restart the bridge manually")
}

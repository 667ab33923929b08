//! Lifecycle of the Node sidecar that holds the WhatsApp Web session.

use std::{
    path::{Path, PathBuf},
    process::Stdio,
    time::Duration,
};

use {
    anyhow::{Context, Result, bail},
    tokio::{
        io::{AsyncBufReadExt, BufReader},
        process::{Child, Command},
    },
    tracing::{debug, error, info, warn},
};

/// Relative checkout locations probed when no directory is configured.
const SEARCH_PATHS: [&str; 3] = [
    "sidecar/whatsapp",
    "../sidecar/whatsapp",
    "../../sidecar/whatsapp",
];

const STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// Handle to a running sidecar process.
pub struct SidecarProcess {
    child: Child,
    port: u16,
}

impl SidecarProcess {
    pub fn port(&self) -> u16 {
        self.port
    }

    /// WebSocket URL the sidecar listens on.
    pub fn url(&self) -> String {
        ws_url(self.port)
    }

    pub fn is_running(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    /// SIGTERM, then kill if the process lingers.
    pub async fn stop(&mut self) -> Result<()> {
        info!("stopping whatsapp sidecar");

        #[cfg(unix)]
        {
            use nix::{
                sys::signal::{Signal, kill},
                unistd::Pid,
            };

            if let Some(pid) = self.child.id() {
                let _ = kill(Pid::from_raw(pid as i32), Signal::SIGTERM);
            }
        }

        #[cfg(not(unix))]
        {
            let _ = self.child.kill().await;
        }

        match tokio::time::timeout(STOP_TIMEOUT, self.child.wait()).await {
            Ok(Ok(status)) => info!(?status, "whatsapp sidecar exited"),
            Ok(Err(e)) => warn!(error = %e, "error waiting for sidecar"),
            Err(_) => {
                warn!("sidecar did not exit after SIGTERM, killing");
                self.child.kill().await.context("kill sidecar")?;
            },
        }
        Ok(())
    }
}

/// `ws://127.0.0.1:<port>`
pub fn ws_url(port: u16) -> String {
    format!("ws://127.0.0.1:{port}")
}

/// How to launch the sidecar.
#[derive(Debug, Clone)]
pub struct SidecarConfig {
    /// Checkout containing `package.json`.
    pub sidecar_dir: PathBuf,
    pub port: u16,
    /// Where the sidecar keeps its WhatsApp auth state.
    pub auth_dir: Option<PathBuf>,
}

/// Locate the sidecar checkout: the configured directory if given, otherwise
/// next to the executable, otherwise relative to the current directory.
pub fn find_sidecar_dir(configured: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = configured {
        if path.join("package.json").exists() {
            return Ok(path.to_path_buf());
        }
        bail!(
            "sidecar directory does not exist or has no package.json: {}",
            path.display()
        );
    }

    if let Ok(exe_path) = std::env::current_exe()
        && let Some(exe_dir) = exe_path.parent()
    {
        // Installed layout, then `target/<profile>/`.
        for rel in ["../sidecar/whatsapp", "../../sidecar/whatsapp"] {
            let candidate = exe_dir.join(rel);
            if candidate.join("package.json").exists() {
                return Ok(candidate);
            }
        }
    }

    for rel in SEARCH_PATHS {
        let path = PathBuf::from(rel);
        if path.join("package.json").exists() {
            return Ok(path.canonicalize().unwrap_or(path));
        }
    }

    bail!(
        "whatsapp sidecar not found. Set RELAY_WHATSAPP_SIDECAR_DIR or make sure \
         sidecar/whatsapp exists with a package.json"
    )
}

fn is_built(sidecar_dir: &Path) -> bool {
    sidecar_dir.join("dist/index.js").exists()
}

/// Build if needed, spawn `node dist/index.js` and forward its output to
/// tracing under the `whatsapp_sidecar` target.
pub async fn start_sidecar(config: SidecarConfig) -> Result<SidecarProcess> {
    let sidecar_dir = &config.sidecar_dir;
    if !sidecar_dir.join("package.json").exists() {
        bail!(
            "whatsapp sidecar not found at {}. Run `npm install && npm run build` there first.",
            sidecar_dir.display()
        );
    }

    if !is_built(sidecar_dir) {
        info!(path = %sidecar_dir.display(), "building whatsapp sidecar");
        if !sidecar_dir.join("node_modules").exists() {
            run_npm(sidecar_dir, &["install"]).await?;
        }
        run_npm(sidecar_dir, &["run", "build"]).await?;
    }

    info!(path = %sidecar_dir.display(), port = config.port, "starting whatsapp sidecar");

    let mut cmd = Command::new("node");
    cmd.arg("dist/index.js")
        .current_dir(sidecar_dir)
        .env("RELAY_WHATSAPP_PORT", config.port.to_string())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(auth_dir) = &config.auth_dir {
        cmd.env("RELAY_WHATSAPP_AUTH_DIR", auth_dir);
    }

    let mut child = cmd.spawn().context("failed to spawn sidecar")?;

    if let Some(stdout) = child.stdout.take() {
        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                forward_log_line(&line);
            }
        });
    }
    if let Some(stderr) = child.stderr.take() {
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                warn!(target: "whatsapp_sidecar", "{}", line);
            }
        });
    }

    // Give the process a moment to fail on bad config.
    tokio::time::sleep(Duration::from_millis(500)).await;
    if let Some(status) = child.try_wait().context("check sidecar status")? {
        bail!("sidecar exited immediately with status: {status}");
    }

    info!(port = config.port, "whatsapp sidecar started");
    Ok(SidecarProcess {
        child,
        port: config.port,
    })
}

/// Re-emit a sidecar log line, honouring pino's numeric levels.
fn forward_log_line(line: &str) {
    if line.starts_with('{')
        && let Ok(log) = serde_json::from_str::<serde_json::Value>(line)
    {
        let level = log
            .get("level")
            .and_then(serde_json::Value::as_u64)
            .unwrap_or(30);
        let msg = log
            .get("msg")
            .and_then(serde_json::Value::as_str)
            .unwrap_or(line);
        match level {
            10 | 20 => debug!(target: "whatsapp_sidecar", "{}", msg),
            30 => info!(target: "whatsapp_sidecar", "{}", msg),
            40 => warn!(target: "whatsapp_sidecar", "{}", msg),
            _ => error!(target: "whatsapp_sidecar", "{}", msg),
        }
        return;
    }
    info!(target: "whatsapp_sidecar", "{}", line);
}

async fn run_npm(sidecar_dir: &Path, args: &[&str]) -> Result<()> {
    let label = args.join(" ");
    info!(path = %sidecar_dir.display(), "running npm {label}");

    let output = Command::new("npm")
        .args(args)
        .current_dir(sidecar_dir)
        .output()
        .await
        .with_context(|| format!("failed to run npm {label}"))?;
    if !output.status.success() {
        bail!(
            "npm {label} failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    Ok(())
}

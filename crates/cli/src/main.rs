mod restart;

use std::{path::PathBuf, sync::Arc, time::Duration};

use {
    anyhow::Context,
    clap::Parser,
    relay_agents::ClaudeCli,
    relay_auto_reply::{
        BridgeState, Capabilities, ConversationHandler, HandlerSettings, RestartTrigger,
    },
    relay_channels::ChannelOutbound,
    relay_config::{BridgeConfig, Severity},
    relay_media::{ImageStore, Outbox},
    relay_voice::whisper_cli::WhisperCli,
    relay_whatsapp::{
        GatewayMessage, SidecarClient, SidecarConfig, SidecarProcess, WhatsAppOutbound,
        find_sidecar_dir, start_sidecar, ws_url,
    },
    tokio::sync::mpsc,
    tokio_util::sync::CancellationToken,
    tracing::{error, info, warn},
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

use crate::restart::ProcessRestart;

/// Inbound events buffered between the sidecar client and the handler.
const INBOUND_CAPACITY: usize = 256;

/// How long `--logout` waits for the sidecar connection.
const LOGOUT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Parser, Debug)]
#[command(name = "relay", about = "WhatsApp to Claude Code bridge", version)]
struct Cli {
    /// Log level (trace, debug, info, warn, error). `RUST_LOG` wins if set.
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, default_value_t = false)]
    json_logs: bool,

    /// Load environment variables from this file instead of `./.env`.
    #[arg(long)]
    env_file: Option<PathBuf>,

    /// Connect to an already running sidecar instead of starting one.
    #[arg(long, default_value_t = false)]
    no_sidecar: bool,

    /// Unlink the WhatsApp device and exit.
    #[arg(long, default_value_t = false)]
    logout: bool,
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    let registry = tracing_subscriber::registry().with(filter);

    if cli.json_logs {
        registry
            .with(fmt::layer().json().with_target(true).with_thread_ids(false))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(true).with_thread_ids(false))
            .init();
    }
}

/// A missing default `.env` is fine; a missing explicit file is not.
fn load_env(env_file: Option<&std::path::Path>) -> anyhow::Result<()> {
    match env_file {
        Some(path) => {
            dotenvy::from_path(path)
                .with_context(|| format!("failed to load {}", path.display()))?;
        },
        None => {
            dotenvy::dotenv().ok();
        },
    }
    Ok(())
}

fn report_diagnostics(config: &BridgeConfig) {
    let result = relay_config::validate(config);
    for d in &result.diagnostics {
        match d.severity {
            Severity::Error => error!(variable = d.variable, "{}", d.message),
            Severity::Warning => warn!(variable = d.variable, "{}", d.message),
            Severity::Info => info!(variable = d.variable, "{}", d.message),
        }
    }
    if result.has_errors() {
        error!(
            errors = result.count(Severity::Error),
            warnings = result.count(Severity::Warning),
            "configuration has errors, messages will fail until they are fixed"
        );
    }
}

async fn launch_sidecar(config: &BridgeConfig) -> anyhow::Result<SidecarProcess> {
    let sidecar_dir = find_sidecar_dir(config.sidecar.dir.as_deref())?;
    start_sidecar(SidecarConfig {
        sidecar_dir,
        port: config.sidecar.port,
        auth_dir: config.sidecar.auth_dir.clone(),
    })
    .await
}

fn capabilities(
    config: &BridgeConfig,
    outbound: WhatsAppOutbound,
    restart: Arc<ProcessRestart>,
) -> Capabilities {
    let agent = ClaudeCli::new(config.claude_binary.clone(), config.working_dir.clone())
        .with_timeout(config.timeout)
        .with_max_budget(config.max_budget_usd);
    let stt = &config.transcription;
    let transcriber = WhisperCli::new(
        stt.ffmpeg_binary.clone(),
        stt.whisper_binary.clone(),
        stt.model_path.to_string_lossy(),
        stt.language.clone(),
    );
    if !transcriber.is_configured() {
        warn!("whisper toolchain not found, voice messages will fail");
    }
    let outbound = Arc::new(outbound);

    Capabilities {
        agent: Arc::new(agent),
        outbound: Arc::clone(&outbound) as Arc<dyn ChannelOutbound>,
        media: outbound,
        transcriber: Arc::new(transcriber),
        staging: Arc::new(ImageStore::new(config.image_dir())),
        outbox: Some(Outbox::new(config.outbox_dir())),
        restart: Some(restart as Arc<dyn RestartTrigger>),
    }
}

async fn logout(client: &SidecarClient) -> anyhow::Result<()> {
    let connected = tokio::time::timeout(LOGOUT_CONNECT_TIMEOUT, async {
        while !client.is_connected() {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    })
    .await;
    if connected.is_err() {
        anyhow::bail!("sidecar did not come up within {LOGOUT_CONNECT_TIMEOUT:?}");
    }
    client.send(&GatewayMessage::Logout)?;
    // Let the frame reach the socket before the sidecar is stopped.
    tokio::time::sleep(Duration::from_secs(1)).await;
    info!("whatsapp device unlinked");
    Ok(())
}

/// Resolves on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            },
            Err(e) => {
                warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            },
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("received SIGINT"),
        () = terminate => info!("received SIGTERM"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    load_env(cli.env_file.as_deref())?;
    init_telemetry(&cli);

    info!(version = env!("CARGO_PKG_VERSION"), "relay starting");

    let config = relay_config::from_env();
    report_diagnostics(&config);
    if config.allowed_numbers.is_empty() {
        warn!("ALLOWED_PHONE_NUMBERS is empty, every message will be ignored");
    }

    let mut sidecar = if cli.no_sidecar {
        None
    } else {
        Some(launch_sidecar(&config).await?)
    };
    let url = sidecar
        .as_ref()
        .map_or_else(|| ws_url(config.sidecar.port), SidecarProcess::url);

    let cancel = CancellationToken::new();
    let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_CAPACITY);
    let client = SidecarClient::spawn(url, inbound_tx, cancel.child_token());

    if cli.logout {
        let result = logout(&client).await;
        cancel.cancel();
        if let Some(process) = sidecar.as_mut() {
            process.stop().await?;
        }
        return result;
    }

    let restart = Arc::new(ProcessRestart::new(cancel.clone()));
    let handler = ConversationHandler::new(
        Arc::new(BridgeState::default()),
        capabilities(&config, WhatsAppOutbound::new(client), Arc::clone(&restart)),
        HandlerSettings::from_config(&config),
    );

    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        signal_cancel.cancel();
    });

    info!(
        working_dir = %config.working_dir.display(),
        allowed = config.allowed_numbers.len(),
        "bridge ready"
    );
    handler.run(inbound_rx, cancel.clone()).await;
    cancel.cancel();

    if let Some(process) = sidecar.as_mut()
        && let Err(e) = process.stop().await
    {
        warn!(error = %e, "failed to stop sidecar cleanly");
    }

    if restart.requested() {
        // Drop the old sidecar handle before the process image is replaced.
        drop(sidecar);
        restart::reexec()?;
    }

    info!("relay stopped");
    Ok(())
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, clap::CommandFactory};

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn defaults() {
        let cli = Cli::try_parse_from(["relay"]).unwrap();
        assert_eq!(cli.log_level, "info");
        assert!(!cli.json_logs);
        assert!(!cli.no_sidecar);
        assert!(!cli.logout);
        assert!(cli.env_file.is_none());
    }

    #[test]
    fn flags_parse() {
        let cli = Cli::try_parse_from([
            "relay",
            "--log-level",
            "debug",
            "--json-logs",
            "--no-sidecar",
            "--env-file",
            "/etc/relay.env",
        ])
        .unwrap();
        assert_eq!(cli.log_level, "debug");
        assert!(cli.json_logs);
        assert!(cli.no_sidecar);
        assert_eq!(cli.env_file, Some(PathBuf::from("/etc/relay.env")));
    }

    #[test]
    fn explicit_env_file_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_env(Some(dir.path().join("missing.env").as_path())).is_err());
    }
}

//! One inbound message, start to finish.
//!
//! [`ConversationHandler::handle`] screens the event, answers bridge
//! commands on a task of their own and queues everything else as a turn on
//! the conversation's serial queue. A turn never fails outward: errors become
//! a chat reply and the busy window is always scheduled to close, even when
//! the turn panics.

use std::{path::PathBuf, sync::Arc, time::Duration};

use {
    tokio::{sync::mpsc, task::JoinHandle},
    tokio_util::sync::CancellationToken,
    tracing::{debug, info, warn},
};

use {
    relay_agents::{AgentInvoker, AgentReply},
    relay_channels::{ChannelMedia, ChannelOutbound, InboundMessage, gating},
    relay_common::types::preview,
    relay_config::BridgeConfig,
    relay_media::{MediaStaging, Outbox},
    relay_sessions::SessionRegistry,
    relay_voice::Transcriber,
};

use crate::{
    BusyGuard, Rejection, Result, SerialDispatcher, TaskHandle, chunk_message,
    commands::{self, Command, StatusReport},
    reply,
};

/// Echo window after a bridge command reply.
pub const COMMAND_GRACE: Duration = Duration::from_secs(2);

/// Restart the bridge process. Fired by `/reload` after the reply is sent.
pub trait RestartTrigger: Send + Sync {
    fn restart(&self);
}

/// Shared conversation state.
#[derive(Default)]
pub struct BridgeState {
    pub sessions: SessionRegistry,
    pub busy: BusyGuard,
    pub dispatcher: SerialDispatcher,
}

/// Everything the handler calls out to.
#[derive(Clone)]
pub struct Capabilities {
    pub agent: Arc<dyn AgentInvoker>,
    pub outbound: Arc<dyn ChannelOutbound>,
    pub media: Arc<dyn ChannelMedia>,
    pub transcriber: Arc<dyn Transcriber>,
    pub staging: Arc<dyn MediaStaging>,
    /// Root of the per-chat outboxes where the agent leaves files to send
    /// back. `None` disables delivery.
    pub outbox: Option<Outbox>,
    pub restart: Option<Arc<dyn RestartTrigger>>,
}

#[derive(Debug, Clone)]
pub struct HandlerSettings {
    pub allowed_numbers: Vec<String>,
    pub working_dir: PathBuf,
    pub max_budget_usd: Option<f64>,
    pub timeout: Duration,
    pub max_chunk_len: usize,
    /// Echo window after a turn's reply.
    pub busy_grace: Duration,
    pub command_grace: Duration,
}

impl HandlerSettings {
    pub fn from_config(config: &BridgeConfig) -> Self {
        Self {
            allowed_numbers: config.allowed_numbers.clone(),
            working_dir: config.working_dir.clone(),
            max_budget_usd: config.max_budget_usd,
            timeout: config.timeout,
            max_chunk_len: config.max_chunk_len,
            busy_grace: config.busy_grace,
            command_grace: COMMAND_GRACE,
        }
    }
}

/// What happened to an inbound event.
#[derive(Debug)]
pub enum Disposition {
    Dropped(Rejection),
    /// A bridge command was accepted; the handle resolves once it has been
    /// answered.
    Command(Command, JoinHandle<()>),
    /// A turn was queued; the handle resolves when it has been delivered.
    Queued(TaskHandle<()>),
}

#[derive(Clone)]
pub struct ConversationHandler {
    inner: Arc<Inner>,
}

struct Inner {
    state: Arc<BridgeState>,
    caps: Capabilities,
    settings: HandlerSettings,
}

impl ConversationHandler {
    pub fn new(state: Arc<BridgeState>, caps: Capabilities, settings: HandlerSettings) -> Self {
        Self {
            inner: Arc::new(Inner {
                state,
                caps,
                settings,
            }),
        }
    }

    pub fn state(&self) -> &BridgeState {
        &self.inner.state
    }

    /// Route one inbound event.
    pub async fn handle(&self, msg: InboundMessage) -> Disposition {
        if let Err(rejection) = self.inner.screen(&msg) {
            return Disposition::Dropped(rejection);
        }

        if let Some(command) = Command::parse(&msg.body) {
            // Marked before the reply goes out so its echo is already covered.
            self.inner.state.busy.mark_busy(&msg.chat_id);
            let inner = Arc::clone(&self.inner);
            let chat_id = msg.chat_id;
            let reply = tokio::spawn(async move { inner.run_command(command, &chat_id).await });
            return Disposition::Command(command, reply);
        }

        let inner = Arc::clone(&self.inner);
        let key = msg.chat_id.clone();
        let handle = self
            .inner
            .state
            .dispatcher
            .enqueue(key, async move { inner.process(msg).await });
        Disposition::Queued(handle)
    }

    /// Consume inbound events until the channel closes or `cancel` fires.
    ///
    /// Queued turns keep running after this returns.
    pub async fn run(&self, mut inbound: mpsc::Receiver<InboundMessage>, cancel: CancellationToken) {
        info!("conversation handler started");
        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    info!("conversation handler cancelled");
                    break;
                },
                msg = inbound.recv() => match msg {
                    Some(msg) => {
                        let disposition = self.handle(msg).await;
                        debug!(?disposition, "inbound event routed");
                    },
                    None => {
                        info!("inbound channel closed");
                        break;
                    },
                },
            }
        }
        let state = self.state();
        info!(
            in_flight = ?state.dispatcher.active_keys(),
            sessions = state.sessions.len(),
            "conversation handler stopped"
        );
    }
}

impl Inner {
    fn screen(&self, msg: &InboundMessage) -> std::result::Result<(), Rejection> {
        let chat_id = msg.chat_id.as_str();

        if self.state.busy.is_busy(chat_id) {
            debug!(chat_id, "ignoring message, conversation is busy");
            return Err(Rejection::Busy);
        }
        if msg.from_me && !msg.is_self_chat() {
            return Err(Rejection::OwnMessage);
        }
        if !msg.chat_type.is_direct() || !gating::chat_type_for(chat_id).is_direct() {
            return Err(Rejection::GroupOrBroadcast);
        }
        if !msg.has_text() && msg.usable_media().is_none() {
            return Err(Rejection::NoContent);
        }
        if !gating::is_allowed(&msg.sender_id, &self.settings.allowed_numbers) {
            info!(peer_id = %msg.sender_id, "rejected message from unauthorized sender");
            return Err(Rejection::Unauthorized);
        }

        match msg.usable_media() {
            Some(kind) if kind.is_audio() => info!(chat_id, "voice message"),
            Some(_) => info!(chat_id, caption = %preview(&msg.body, 60), "image message"),
            None => info!(chat_id, text = %preview(&msg.body, 80), "text message"),
        }
        Ok(())
    }

    async fn run_command(&self, command: Command, chat_id: &str) {
        let _release = BusyRelease::new(&self.state.busy, chat_id, self.settings.command_grace);
        info!(chat_id, command = command.name(), "running bridge command");

        let text = match command {
            Command::Reset => {
                let existed = self.state.sessions.reset(chat_id);
                debug!(chat_id, existed, "session reset");
                commands::RESET_REPLY.to_string()
            },
            Command::Status => {
                let session = self.state.sessions.get(chat_id);
                StatusReport {
                    session: session.as_deref(),
                    working_dir: &self.settings.working_dir,
                    max_budget_usd: self.settings.max_budget_usd,
                    timeout: self.settings.timeout,
                }
                .render()
            },
            Command::Reload => commands::RELOAD_REPLY.to_string(),
            Command::Help => commands::help_text(),
        };
        self.send_text(chat_id, &text).await;

        if command == Command::Reload {
            match &self.caps.restart {
                Some(trigger) => trigger.restart(),
                None => warn!("reload requested but no restart trigger is installed"),
            }
        }
    }

    /// Task body for one turn. Runs inside the conversation's queue slot.
    async fn process(&self, msg: InboundMessage) {
        let chat_id = msg.chat_id.as_str();
        self.state.busy.mark_busy(chat_id);
        let _release = BusyRelease::new(&self.state.busy, chat_id, self.settings.busy_grace);

        if let Err(e) = self.caps.outbound.send_typing(chat_id).await {
            debug!(chat_id, error = %e, "failed to send typing indicator");
        }

        match self.run_turn(&msg).await {
            Ok(agent_reply) => {
                self.clear_typing(chat_id).await;
                self.deliver_text(chat_id, &reply::compose(&agent_reply))
                    .await;
                self.deliver_outbox(chat_id).await;
            },
            Err(e) => {
                warn!(chat_id, error = %e, "turn failed");
                self.clear_typing(chat_id).await;
                let session_reset = e.invalidates_session();
                if session_reset {
                    self.state.sessions.reset(chat_id);
                }
                self.send_text(chat_id, &reply::error_reply(&e.to_string(), session_reset))
                    .await;
            },
        }
    }

    async fn run_turn(&self, msg: &InboundMessage) -> Result<AgentReply> {
        let mut staged = None;
        let prompt = match msg.usable_media() {
            Some(kind) if kind.is_audio() => {
                let audio = self.caps.media.download_media(msg).await?;
                let text = self
                    .caps
                    .transcriber
                    .transcribe(&audio.data, &audio.mime_type)
                    .await?;
                info!(chat_id = %msg.chat_id, transcript = %preview(&text, 80), "transcribed voice message");
                text
            },
            Some(_) => {
                let image = self.caps.media.download_media(msg).await?;
                let path = self
                    .caps
                    .staging
                    .save(&image.data, &image.mime_type)
                    .await?;
                let prompt = reply::image_prompt(&path, &msg.body);
                staged = Some(path);
                prompt
            },
            None => msg.body.clone(),
        };

        // Resolved only once the prompt exists, so failed media handling
        // never leaves behind a session the agent has not seen.
        let (token, is_resume) = self.state.sessions.resolve(&msg.chat_id);
        let outbox = self.prepare_outbox(&msg.chat_id).await;
        let result = self
            .caps
            .agent
            .invoke(&prompt, &token, is_resume, outbox.as_ref().map(Outbox::dir))
            .await;

        if let Some(path) = staged {
            self.caps.staging.cleanup(&path).await;
        }
        Ok(result?)
    }

    async fn prepare_outbox(&self, chat_id: &str) -> Option<Outbox> {
        let outbox = self.caps.outbox.as_ref()?.for_chat(chat_id);
        match outbox.prepare().await {
            Ok(()) => Some(outbox),
            Err(e) => {
                warn!(chat_id, error = %e, "failed to prepare outbox");
                None
            },
        }
    }

    async fn clear_typing(&self, chat_id: &str) {
        if let Err(e) = self.caps.outbound.clear_state(chat_id).await {
            debug!(chat_id, error = %e, "failed to clear typing indicator");
        }
    }

    async fn send_text(&self, chat_id: &str, text: &str) {
        if let Err(e) = self.caps.outbound.send_text(chat_id, text).await {
            warn!(chat_id, error = %e, "failed to send message");
        }
    }

    async fn deliver_text(&self, chat_id: &str, text: &str) {
        let chunks = chunk_message(text, self.settings.max_chunk_len);
        debug!(chat_id, len = text.len(), chunks = chunks.len(), "delivering reply");
        for chunk in &chunks {
            self.send_text(chat_id, chunk).await;
        }
    }

    async fn deliver_outbox(&self, chat_id: &str) {
        let Some(outbox) = self.caps.outbox.as_ref().map(|o| o.for_chat(chat_id)) else {
            return;
        };
        let files = match outbox.collect().await {
            Ok(files) => files,
            Err(e) => {
                warn!(chat_id, error = %e, "failed to read outbox");
                return;
            },
        };
        for file in &files {
            info!(chat_id, file = %file.file_name, size = file.size, "sending outbox file");
            if let Err(e) = self
                .caps
                .outbound
                .send_media_file(chat_id, &file.path, file.mime_type)
                .await
            {
                warn!(chat_id, file = %file.file_name, error = %e, "failed to send outbox file");
            }
            outbox.remove(file).await;
        }
    }
}

/// Starts the grace window for a busy key when dropped, so a turn that
/// panics or is cancelled still frees its conversation.
struct BusyRelease<'a> {
    busy: &'a BusyGuard,
    key: &'a str,
    grace: Duration,
}

impl<'a> BusyRelease<'a> {
    fn new(busy: &'a BusyGuard, key: &'a str, grace: Duration) -> Self {
        Self { busy, key, grace }
    }
}

impl Drop for BusyRelease<'_> {
    fn drop(&mut self) {
        self.busy.release_after(self.key, self.grace);
    }
}

impl std::fmt::Debug for ConversationHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversationHandler")
            .field("working_dir", &self.inner.settings.working_dir)
            .finish_non_exhaustive()
    }
}

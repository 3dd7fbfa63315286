//! The router: authorisation, reply routing, structural dispatch,
//! intent classification, and the chat/action forks.

use std::sync::Arc;

use base64::Engine;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use oasis_agent::{Agent, AgentTask, ExecContext};
use oasis_core::model::Thread;
use oasis_core::types::{ContentPart, ImageUrl};
use oasis_core::utils::truncate_string;
use oasis_memory::Ingestor;
use oasis_store::Store;

use crate::chat::ChatPath;
use crate::frontend::{Frontend, IncomingMessage};
use crate::input::ChatInputHandler;
use crate::intent::{Intent, IntentClassifier};
use crate::manager::{ActionAgentEntry, AgentManager, AgentStatus, QueuedAction};

/// Builds a fresh action agent for a chat. Called per spawn so
/// chat-scoped tools (sandbox sessions) bind correctly.
pub type ActionAgentFactory = Arc<dyn Fn(&str) -> Arc<dyn Agent> + Send + Sync>;

/// Router knobs.
#[derive(Clone, Debug, Default)]
pub struct RouterConfig {
    /// Static allowlist applied before an owner is registered.
    pub allowed_user_id: Option<String>,
}

/// Consumes the frontend's message stream and dispatches each message.
pub struct Router {
    frontend: Arc<dyn Frontend>,
    store: Arc<dyn Store>,
    chat: ChatPath,
    intent: IntentClassifier,
    manager: Arc<AgentManager>,
    ingestor: Arc<Ingestor>,
    action_factory: ActionAgentFactory,
    config: RouterConfig,
    ctx: ExecContext,
}

impl Router {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        frontend: Arc<dyn Frontend>,
        store: Arc<dyn Store>,
        chat: ChatPath,
        intent: IntentClassifier,
        manager: Arc<AgentManager>,
        ingestor: Arc<Ingestor>,
        action_factory: ActionAgentFactory,
        config: RouterConfig,
    ) -> Arc<Self> {
        Arc::new(Router {
            frontend,
            store,
            chat,
            intent,
            manager,
            ingestor,
            action_factory,
            config,
            ctx: ExecContext::root(),
        })
    }

    /// Token cancelling every agent this router spawned.
    pub fn cancel_token(&self) -> &CancellationToken {
        self.ctx.cancel_token()
    }

    /// Consume the frontend until it shuts down.
    pub async fn run(self: Arc<Self>) {
        info!("router started");
        while let Some(message) = self.frontend.poll().await {
            self.handle_message(message).await;
        }
        info!("frontend closed, router exiting");
    }

    /// Dispatch one inbound message.
    pub async fn handle_message(self: &Arc<Self>, message: IncomingMessage) {
        // 1. Authorise; failures are silently dropped.
        if !self.authorize(&message.user_id).await {
            debug!(user = %message.user_id, "unauthorised message dropped");
            return;
        }

        // Remember where to deliver scheduled reports (first-writer wins).
        let _ = self
            .store
            .set_config_if_absent("owner_chat_id", &message.chat_id)
            .await;

        // 2. A reply to a waiting agent's question short-circuits.
        if let Some(reply_to) = message.reply_to_message_id.as_deref() {
            if !message.text.is_empty() && self.manager.route_reply(reply_to, &message.text) {
                return;
            }
        }

        // 3. Typing indicator, best effort.
        let _ = self.frontend.send_typing(&message.chat_id).await;

        // 5a/5b. File branches before text resolution.
        if message.document.is_some() {
            self.handle_document(&message).await;
            return;
        }
        if !message.photos.is_empty() {
            self.handle_photo(&message).await;
            return;
        }

        // Caption fallback, then the empty-input drop.
        let text = if message.text.is_empty() {
            message.caption.clone().unwrap_or_default()
        } else {
            message.text.clone()
        };
        if text.trim().is_empty() {
            return;
        }

        match text.trim() {
            "/new" => {
                self.start_new_thread(&message.chat_id).await;
                return;
            }
            "/status" => {
                let _ = self
                    .frontend
                    .send(&message.chat_id, &self.manager.format_status())
                    .await;
                return;
            }
            _ => {}
        }

        if text.starts_with("http://") || text.starts_with("https://") {
            let task = format!(
                "Fetch the content at {text}, store it in long-term memory, \
                 and reply with a short summary."
            );
            self.dispatch_action(&message, &task).await;
            return;
        }

        // 6/7. Intent fork.
        match self.intent.classify(&text).await {
            Intent::Chat => self.run_chat_turn(&message, &text, None, None).await,
            Intent::Action => self.dispatch_action(&message, &text).await,
        }
    }

    /// Owner gate. The first authorised user becomes the owner,
    /// write-once; afterwards only the owner passes.
    async fn authorize(&self, user_id: &str) -> bool {
        match self.store.get_config("owner_user_id").await {
            Ok(Some(owner)) => return owner == user_id,
            Ok(None) => {}
            Err(e) => {
                warn!(error = %e, "owner lookup failed, dropping message");
                return false;
            }
        }

        if let Some(allowed) = &self.config.allowed_user_id {
            if allowed != user_id {
                return false;
            }
        }

        match self
            .store
            .set_config_if_absent("owner_user_id", user_id)
            .await
        {
            Ok(owner) => {
                if owner == user_id {
                    info!(user = user_id, "owner registered");
                    true
                } else {
                    false
                }
            }
            Err(e) => {
                warn!(error = %e, "owner registration failed, dropping message");
                false
            }
        }
    }

    /// Most-recent thread for the chat, created on first contact.
    async fn resolve_thread(&self, chat_id: &str, title_seed: &str) -> anyhow::Result<Thread> {
        if let Some(thread) = self.store.latest_thread(chat_id).await? {
            return Ok(thread);
        }
        let thread = Thread::new(chat_id, truncate_string(title_seed.trim(), 48));
        self.store.create_thread(&thread).await?;
        Ok(thread)
    }

    async fn start_new_thread(&self, chat_id: &str) {
        let thread = Thread::new(chat_id, "New conversation");
        match self.store.create_thread(&thread).await {
            Ok(()) => {
                let _ = self.frontend.send(chat_id, "Started a fresh conversation.").await;
            }
            Err(e) => {
                warn!(error = %e, "thread creation failed");
                let _ = self.frontend.send(chat_id, "Couldn't start a new conversation.").await;
            }
        }
    }

    async fn run_chat_turn(
        &self,
        message: &IncomingMessage,
        text: &str,
        extra_context: Option<&str>,
        image: Option<ContentPart>,
    ) {
        let thread = match self.resolve_thread(&message.chat_id, text).await {
            Ok(thread) => thread,
            Err(e) => {
                warn!(error = %e, "thread resolution failed");
                let _ = self
                    .frontend
                    .send(&message.chat_id, "Something went wrong on my side.")
                    .await;
                return;
            }
        };

        // Errors already replaced the placeholder; nothing more to do.
        let _ = self
            .chat
            .respond(
                &self.frontend,
                &message.chat_id,
                &thread.id,
                text,
                extra_context,
                image,
            )
            .await;
    }

    // ── Documents & photos ──

    async fn handle_document(self: &Arc<Self>, message: &IncomingMessage) {
        let document = message.document.as_ref().expect("checked by caller");
        let (bytes, filename) = match self.frontend.download_file(&document.file_id).await {
            Ok(downloaded) => downloaded,
            Err(e) => {
                warn!(error = %e, "document download failed");
                let _ = self
                    .frontend
                    .send(&message.chat_id, "I couldn't download that file.")
                    .await;
                return;
            }
        };
        let name = document.file_name.clone().unwrap_or(filename);

        let report = match self
            .ingestor
            .ingest_bytes(&bytes, &name, document.mime_type.as_deref())
            .await
        {
            Ok(report) => report,
            Err(e) => {
                warn!(error = %e, "ingestion failed");
                let _ = self
                    .frontend
                    .send(&message.chat_id, &format!("I couldn't read {name}: {e}"))
                    .await;
                return;
            }
        };

        match message.caption.as_deref().filter(|c| !c.trim().is_empty()) {
            Some(caption) => {
                // Answer the caption with the file content as context.
                let content = self
                    .store
                    .get_document(&report.document_id)
                    .await
                    .map(|d| d.content)
                    .unwrap_or_default();
                self.run_chat_turn(message, caption, Some(&content), None)
                    .await;
            }
            None => {
                let _ = self
                    .frontend
                    .send(
                        &message.chat_id,
                        &format!(
                            "Saved \"{}\" to memory ({} chunk{}).",
                            report.title,
                            report.chunk_count,
                            if report.chunk_count == 1 { "" } else { "s" }
                        ),
                    )
                    .await;
            }
        }
    }

    async fn handle_photo(self: &Arc<Self>, message: &IncomingMessage) {
        let photo = message.photos.last().expect("checked by caller");
        let (bytes, _) = match self.frontend.download_file(&photo.file_id).await {
            Ok(downloaded) => downloaded,
            Err(e) => {
                warn!(error = %e, "photo download failed");
                let _ = self
                    .frontend
                    .send(&message.chat_id, "I couldn't download that photo.")
                    .await;
                return;
            }
        };

        let mime = photo.mime_type.as_deref().unwrap_or("image/jpeg");
        let data_uri = format!(
            "data:{mime};base64,{}",
            base64::engine::general_purpose::STANDARD.encode(&bytes)
        );
        let image = ContentPart::ImageUrl {
            image_url: ImageUrl {
                url: data_uri,
                detail: None,
            },
        };

        let caption = message
            .caption
            .clone()
            .filter(|c| !c.trim().is_empty())
            .unwrap_or_else(|| "What's in this photo?".to_string());
        self.run_chat_turn(message, &caption, None, Some(image)).await;
    }

    // ── Action path ──

    async fn dispatch_action(self: &Arc<Self>, message: &IncomingMessage, text: &str) {
        if self.manager.slots_available() {
            self.spawn_action(
                &message.user_id,
                &message.chat_id,
                &message.message_id,
                text,
            )
            .await;
        } else {
            self.manager.enqueue(QueuedAction {
                user_id: message.user_id.clone(),
                chat_id: message.chat_id.clone(),
                message_id: message.message_id.clone(),
                text: text.to_string(),
            });
            let _ = self
                .frontend
                .send(
                    &message.chat_id,
                    "I'm at capacity right now — queued this and I'll start as soon as a slot frees up.",
                )
                .await;
        }
    }

    fn spawn_action<'a>(
        self: &'a Arc<Self>,
        _user_id: &'a str,
        chat_id: &'a str,
        user_message_id: &'a str,
        text: &'a str,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send + 'a>> {
        Box::pin(async move {
        let agent_id = oasis_core::utils::new_id();
        let (input_tx, input_rx) = mpsc::channel(1);

        let handler = Arc::new(ChatInputHandler::new(
            self.frontend.clone(),
            self.manager.clone(),
            chat_id,
            agent_id.clone(),
            input_rx,
        ));

        let ack_message_id = self
            .frontend
            .send(chat_id, "On it — I'll report back here.")
            .await
            .ok();

        self.manager.register(ActionAgentEntry {
            id: agent_id.clone(),
            chat_id: chat_id.to_string(),
            description: truncate_string(text, 64),
            status: AgentStatus::Running,
            started_at: std::time::Instant::now(),
            input_tx,
            user_message_id: user_message_id.to_string(),
            ack_message_id,
        });

        let agent = (self.action_factory)(chat_id);
        let ctx = self.ctx.child().with_input_handler(handler);
        let task = AgentTask::new(text).with_metadata("chat_id", chat_id);
        let handle = oasis_agent::spawn(&ctx, agent, task);

        info!(agent = %agent_id, chat = chat_id, "action agent spawned");

        // Supervisor: deliver the result, free the slot, drain the queue.
        let router = self.clone();
        let chat_id = chat_id.to_string();
        tokio::spawn(async move {
            handle.done().await;
            let outcome = match handle.result() {
                Some(result) => match result.error {
                    // Errors are reported in-band as the final message.
                    Some(error) => format!("The action failed: {error}"),
                    None => result.output,
                },
                None => "The action finished without a result.".to_string(),
            };
            let _ = router.frontend.send(&chat_id, &outcome).await;

            router.manager.remove(&agent_id);
            router.drain_queue().await;
        });
        })
    }

    /// Start queued actions while slots remain.
    async fn drain_queue(self: &Arc<Self>) {
        while let Some(action) = self.manager.try_dequeue() {
            debug!(chat = %action.chat_id, "starting queued action");
            self.spawn_action(
                &action.user_id,
                &action.chat_id,
                &action.message_id,
                &action.text,
            )
            .await;
        }
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

//! Runtime wiring: config → store → providers → memory → agents →
//! router + scheduler.

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::info;

use oasis_agent::observer::UsageObserver;
use oasis_agent::tools::code::ExecuteCodeTool;
use oasis_agent::tools::memory::{RecallMemoryTool, RememberTool};
use oasis_agent::tools::schedule::ScheduleActionTool;
use oasis_agent::tools::skill::SkillTool;
use oasis_agent::tools::web::{WebFetchTool, WebSearchTool};
use oasis_agent::tools::ToolRegistry;
use oasis_agent::{Agent, AgentTask, ExecContext, LlmAgent, ProcessorChain};
use oasis_core::config::{load_config, Config};
use oasis_memory::{ChunkerConfig, HybridRetriever, Ingestor, RetrieverConfig};
use oasis_providers::{ChatProvider, EmbeddingProvider, HttpChatProvider, HttpEmbeddingProvider};
use oasis_router::chat::ChatPath;
use oasis_router::{
    ActionAgentFactory, AgentManager, Frontend, IntentClassifier, Router, RouterConfig,
};
use oasis_sandbox::SandboxClient;
use oasis_scheduler::{ActionNotifier, SchedulerService};
use oasis_store::{SqliteStore, Store};

use crate::console::ConsoleFrontend;

/// Parallel action agents before overflow queueing kicks in.
const MAX_CONCURRENT_ACTIONS: usize = 3;

const CHAT_SYSTEM_PROMPT: &str = "\
You are Oasis, a personal assistant. Be concise, warm, and concrete. \
You may be given long-term memory context; use it when relevant and \
ignore it when not.";

const ACTION_SYSTEM_PROMPT: &str = "\
You are Oasis, a personal assistant working on a task. Plan briefly, \
use your tools, and finish with a short report of what you did. Ask \
the user only when genuinely blocked.";

/// Everything a running gateway needs, built once from config.
pub struct Runtime {
    pub config: Config,
    pub store: Arc<SqliteStore>,
    pub embedder: Arc<dyn EmbeddingProvider>,
    pub retriever: Arc<HybridRetriever>,
    pub ingestor: Arc<Ingestor>,
    pub action_provider: Arc<dyn ChatProvider>,
    pub action_tools: Arc<ToolRegistry>,
    pub chain: Arc<ProcessorChain>,
}

impl Runtime {
    pub async fn build(config: Config) -> Result<Self> {
        let db_path = config.database.resolved_path();
        let store = Arc::new(
            SqliteStore::open(&db_path, Some(config.embedding.dimensions))
                .await
                .with_context(|| format!("failed to open store at {}", db_path.display()))?,
        );

        let embedder: Arc<dyn EmbeddingProvider> = Arc::new(HttpEmbeddingProvider::new(
            &config.embedding.provider,
            config.embedding.api_key.clone(),
            config.embedding.model.clone(),
            config.embedding.dimensions,
            None,
        ));

        let retriever = Arc::new(HybridRetriever::new(
            store.clone(),
            embedder.clone(),
            RetrieverConfig::default(),
        ));
        let ingestor = Arc::new(Ingestor::new(
            store.clone(),
            embedder.clone(),
            ChunkerConfig::default(),
        ));

        let action = config.resolved_action();
        let action_provider: Arc<dyn ChatProvider> = Arc::new(HttpChatProvider::new(
            &action.provider,
            action.api_key.clone(),
            None,
        ));

        let sandbox_url = std::env::var("OASIS_SANDBOX_URL")
            .unwrap_or_else(|_| "http://127.0.0.1:8094".to_string());

        let mut tools = ToolRegistry::new();
        tools.register(Arc::new(WebSearchTool::new(Some(
            config.search.brave_api_key.clone(),
        ))));
        tools.register(Arc::new(WebFetchTool::new()));
        tools.register(Arc::new(RecallMemoryTool::new(retriever.clone())));
        tools.register(Arc::new(RememberTool::new(ingestor.clone())));
        tools.register(Arc::new(ExecuteCodeTool::new(
            SandboxClient::new(sandbox_url),
            "oasis",
        )));
        tools.register(Arc::new(ScheduleActionTool::new(store.clone())));
        tools.register(Arc::new(SkillTool::new(store.clone(), embedder.clone())));
        let action_tools = Arc::new(tools);

        let mut chain = ProcessorChain::new();
        if config.observer.enabled {
            chain.add(Arc::new(UsageObserver::new(config.observer.pricing.clone())))?;
        }
        let chain = Arc::new(chain);

        Ok(Runtime {
            config,
            store,
            embedder,
            retriever,
            ingestor,
            action_provider,
            action_tools,
            chain,
        })
    }

    /// Build a fresh action agent. Factories call this per spawn.
    pub fn action_agent(&self) -> Arc<dyn Agent> {
        let action = self.config.resolved_action();
        Arc::new(
            LlmAgent::new(
                "oasis-action",
                "runs multi-step tasks with tools",
                self.action_provider.clone(),
                action.model,
                ACTION_SYSTEM_PROMPT,
            )
            .with_tools(self.action_tools.clone())
            .with_chain(self.chain.clone()),
        )
    }
}

/// `oasis run` — the full runtime on the console frontend.
pub async fn run() -> Result<()> {
    let config = load_config(None);
    let runtime = Arc::new(Runtime::build(config).await?);
    let frontend: Arc<dyn Frontend> = Arc::new(ConsoleFrontend::new());

    let chat_llm = &runtime.config.llm;
    let chat_provider: Arc<dyn ChatProvider> = Arc::new(HttpChatProvider::new(
        &chat_llm.provider,
        chat_llm.api_key.clone(),
        None,
    ));
    let chat = ChatPath::new(
        chat_provider,
        runtime.embedder.clone(),
        runtime.store.clone(),
        chat_llm.model.clone(),
        CHAT_SYSTEM_PROMPT,
        runtime.config.brain.context_window,
        runtime.config.brain.vector_top_k,
    );

    let intent = runtime.config.resolved_intent();
    let intent_classifier = IntentClassifier::new(
        Arc::new(HttpChatProvider::new(
            &intent.provider,
            intent.api_key.clone(),
            None,
        )),
        intent.model,
    );

    let manager = Arc::new(AgentManager::new(MAX_CONCURRENT_ACTIONS));

    let runtime_for_factory = runtime.clone();
    let factory: ActionAgentFactory =
        Arc::new(move |_chat_id| runtime_for_factory.action_agent());

    let router = Router::new(
        frontend.clone(),
        runtime.store.clone(),
        chat,
        intent_classifier,
        manager,
        runtime.ingestor.clone(),
        factory,
        RouterConfig {
            allowed_user_id: runtime.config.telegram.allowed_user_id.clone(),
        },
    );

    // Scheduler delivers reports to the owner chat via the frontend.
    let action = runtime.config.resolved_action();
    let scheduler = SchedulerService::new(
        runtime.store.clone(),
        runtime.action_provider.clone(),
        action.model,
        runtime.action_tools.clone(),
        Arc::new(FrontendNotifier {
            frontend: frontend.clone(),
            store: runtime.store.clone(),
        }),
    );

    info!("oasis runtime starting");
    println!("Oasis is listening. Type a message (Ctrl-D to quit).");

    let cancel = CancellationToken::new();
    let scheduler_cancel = cancel.clone();
    let scheduler_task = tokio::spawn(async move { scheduler.run(scheduler_cancel).await });

    router.run().await;

    cancel.cancel();
    let _ = scheduler_task.await;
    Ok(())
}

/// Sends scheduler reports to the chat the owner last used.
struct FrontendNotifier {
    frontend: Arc<dyn Frontend>,
    store: Arc<SqliteStore>,
}

#[async_trait]
impl ActionNotifier for FrontendNotifier {
    async fn notify(&self, text: &str) -> Result<()> {
        let chat_id = self
            .store
            .get_config("owner_chat_id")
            .await?
            .unwrap_or_else(|| "console".to_string());
        self.frontend.send(&chat_id, text).await?;
        Ok(())
    }
}

/// `oasis agent` — one-shot or REPL, straight through an action agent.
pub async fn run_agent(message: Option<String>) -> Result<()> {
    let config = load_config(None);
    let runtime = Runtime::build(config).await?;
    let agent = runtime.action_agent();

    match message {
        Some(message) => {
            let response = process_direct(&agent, &message).await?;
            crate::helpers::print_response(&response);
            Ok(())
        }
        None => crate::repl::run(agent).await,
    }
}

/// Run a single message through an agent.
pub async fn process_direct(agent: &Arc<dyn Agent>, message: &str) -> Result<String> {
    agent
        .execute(&ExecContext::root(), AgentTask::new(message))
        .await
        .map_err(|e| anyhow::anyhow!("agent failed: {e}"))
}

//! Agent manager — caps parallel action agents, routes user replies to
//! the agents waiting on them, and holds a FIFO overflow queue.
//!
//! All state lives under one mutex; the lock is never held across
//! channel sends or I/O.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Instant;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Runtime status of an action agent as the manager sees it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AgentStatus {
    Running,
    WaitingForInput,
}

impl AgentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentStatus::Running => "running",
            AgentStatus::WaitingForInput => "waiting for input",
        }
    }
}

/// A registered action agent.
pub struct ActionAgentEntry {
    pub id: String,
    pub chat_id: String,
    pub description: String,
    pub status: AgentStatus,
    pub started_at: Instant,
    /// Channel delivering user replies into the agent's input handler.
    pub input_tx: mpsc::Sender<String>,
    /// The user message that triggered the agent.
    pub user_message_id: String,
    /// The acknowledgement message the bot sent, if any.
    pub ack_message_id: Option<String>,
}

/// An action waiting for a free slot.
#[derive(Clone, Debug)]
pub struct QueuedAction {
    pub user_id: String,
    pub chat_id: String,
    pub message_id: String,
    pub text: String,
}

#[derive(Default)]
struct Inner {
    agents: HashMap<String, ActionAgentEntry>,
    /// bot-message-id → agent-id, for reply routing.
    message_index: HashMap<String, String>,
    queue: VecDeque<QueuedAction>,
}

/// Bounded-concurrency coordinator for action agents.
pub struct AgentManager {
    inner: Mutex<Inner>,
    max_concurrent: usize,
}

impl AgentManager {
    pub fn new(max_concurrent: usize) -> Self {
        AgentManager {
            inner: Mutex::new(Inner::default()),
            max_concurrent: max_concurrent.max(1),
        }
    }

    /// Whether a new agent may start now.
    pub fn slots_available(&self) -> bool {
        let inner = self.inner.lock().unwrap();
        inner.agents.len() < self.max_concurrent
    }

    /// Count of agents currently running or waiting for input.
    pub fn active_count(&self) -> usize {
        self.inner.lock().unwrap().agents.len()
    }

    /// Idempotent insert.
    pub fn register(&self, agent: ActionAgentEntry) {
        let mut inner = self.inner.lock().unwrap();
        debug!(agent = %agent.id, "agent registered");
        inner.agents.insert(agent.id.clone(), agent);
    }

    /// Bind a bot-sent question message to the agent awaiting its answer.
    pub fn register_message(&self, bot_message_id: &str, agent_id: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner
            .message_index
            .insert(bot_message_id.to_string(), agent_id.to_string());
    }

    /// Deliver a user reply to the agent bound to `reply_to_message_id`.
    ///
    /// Returns `true` iff delivered. A full channel drops the reply —
    /// the human may retry. The send happens outside the lock.
    pub fn route_reply(&self, reply_to_message_id: &str, text: &str) -> bool {
        let tx = {
            let inner = self.inner.lock().unwrap();
            let Some(agent_id) = inner.message_index.get(reply_to_message_id) else {
                return false;
            };
            let Some(agent) = inner.agents.get(agent_id) else {
                return false;
            };
            agent.input_tx.clone()
        };

        match tx.try_send(text.to_string()) {
            Ok(()) => {
                info!(reply_to = reply_to_message_id, "reply routed to agent");
                true
            }
            Err(e) => {
                warn!(reply_to = reply_to_message_id, error = %e, "reply dropped");
                false
            }
        }
    }

    /// Update an agent's status. Unknown ids are a no-op.
    pub fn set_status(&self, agent_id: &str, status: AgentStatus) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(agent) = inner.agents.get_mut(agent_id) {
            agent.status = status;
        }
    }

    /// Remove an agent and every message binding pointing at it.
    /// Unknown ids are a no-op.
    pub fn remove(&self, agent_id: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.agents.remove(agent_id);
        inner.message_index.retain(|_, bound| bound != agent_id);
        debug!(agent = agent_id, "agent removed");
    }

    /// Queue an action for when a slot frees up.
    pub fn enqueue(&self, action: QueuedAction) {
        let mut inner = self.inner.lock().unwrap();
        inner.queue.push_back(action);
    }

    /// Pop the next queued action iff a slot is available.
    pub fn try_dequeue(&self) -> Option<QueuedAction> {
        let mut inner = self.inner.lock().unwrap();
        if inner.agents.len() < self.max_concurrent {
            inner.queue.pop_front()
        } else {
            None
        }
    }

    pub fn queued_count(&self) -> usize {
        self.inner.lock().unwrap().queue.len()
    }

    /// Human-readable status for `/status`.
    pub fn format_status(&self) -> String {
        let inner = self.inner.lock().unwrap();
        if inner.agents.is_empty() && inner.queue.is_empty() {
            return "No agents running.".to_string();
        }

        let mut lines = Vec::new();
        let mut agents: Vec<&ActionAgentEntry> = inner.agents.values().collect();
        agents.sort_by_key(|a| a.started_at);
        for agent in agents {
            let prefix: String = agent.id.chars().take(8).collect();
            lines.push(format!(
                "- [{prefix}] {} ({}, {}s)",
                agent.description,
                agent.status.as_str(),
                agent.started_at.elapsed().as_secs()
            ));
        }
        if !inner.queue.is_empty() {
            lines.push(format!("{} queued", inner.queue.len()));
        }
        lines.join("\n")
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str, tx: mpsc::Sender<String>) -> ActionAgentEntry {
        ActionAgentEntry {
            id: id.to_string(),
            chat_id: "chat".to_string(),
            description: format!("task {id}"),
            status: AgentStatus::Running,
            started_at: Instant::now(),
            input_tx: tx,
            user_message_id: "u1".to_string(),
            ack_message_id: None,
        }
    }

    #[test]
    fn test_slots_cap() {
        let manager = AgentManager::new(2);
        assert!(manager.slots_available());

        let (tx, _rx1) = mpsc::channel(1);
        manager.register(entry("a", tx));
        let (tx, _rx2) = mpsc::channel(1);
        manager.register(entry("b", tx));

        assert!(!manager.slots_available());
        assert_eq!(manager.active_count(), 2);

        manager.remove("a");
        assert!(manager.slots_available());
    }

    #[test]
    fn test_register_idempotent() {
        let manager = AgentManager::new(4);
        let (tx, _rx) = mpsc::channel(1);
        manager.register(entry("a", tx.clone()));
        manager.register(entry("a", tx));
        assert_eq!(manager.active_count(), 1);
    }

    #[tokio::test]
    async fn test_route_reply_delivers() {
        let manager = AgentManager::new(1);
        let (tx, mut rx) = mpsc::channel(1);
        manager.register(entry("a", tx));
        manager.register_message("bot_7", "a");

        assert!(manager.route_reply("bot_7", "yes please"));
        assert_eq!(rx.recv().await.unwrap(), "yes please");
    }

    #[test]
    fn test_route_reply_unknown_is_false_and_pure() {
        let manager = AgentManager::new(1);
        let (tx, _rx) = mpsc::channel(1);
        manager.register(entry("a", tx));

        assert!(!manager.route_reply("bot_unknown", "hello"));
        // Nothing changed.
        assert_eq!(manager.active_count(), 1);
        assert_eq!(manager.queued_count(), 0);
    }

    #[test]
    fn test_route_reply_full_channel_drops() {
        let manager = AgentManager::new(1);
        let (tx, _rx) = mpsc::channel(1);
        manager.register(entry("a", tx));
        manager.register_message("bot_1", "a");

        // First reply fills the 1-slot channel, second is dropped.
        assert!(manager.route_reply("bot_1", "first"));
        assert!(!manager.route_reply("bot_1", "second"));
    }

    #[test]
    fn test_remove_clears_message_bindings() {
        let manager = AgentManager::new(2);
        let (tx, _rx) = mpsc::channel(1);
        manager.register(entry("a", tx.clone()));
        manager.register_message("bot_1", "a");
        manager.register_message("bot_2", "a");

        manager.remove("a");
        assert!(!manager.route_reply("bot_1", "x"));
        assert!(!manager.route_reply("bot_2", "x"));

        // Removing again is a no-op.
        manager.remove("a");
    }

    #[test]
    fn test_queue_fifo_and_slot_check() {
        let manager = AgentManager::new(1);
        let (tx, _rx) = mpsc::channel(1);
        manager.register(entry("busy", tx));

        manager.enqueue(QueuedAction {
            user_id: "u".into(),
            chat_id: "c".into(),
            message_id: "m1".into(),
            text: "first".into(),
        });
        manager.enqueue(QueuedAction {
            user_id: "u".into(),
            chat_id: "c".into(),
            message_id: "m2".into(),
            text: "second".into(),
        });

        // No slot: dequeue refuses.
        assert!(manager.try_dequeue().is_none());
        assert_eq!(manager.queued_count(), 2);

        // Slot frees: FIFO order.
        manager.remove("busy");
        assert_eq!(manager.try_dequeue().unwrap().text, "first");
        assert_eq!(manager.try_dequeue().unwrap().text, "second");
        assert!(manager.try_dequeue().is_none());
    }

    #[test]
    fn test_set_status_and_format() {
        let manager = AgentManager::new(2);
        let (tx, _rx) = mpsc::channel(1);
        manager.register(entry("abcdefgh-1234", tx));
        manager.set_status("abcdefgh-1234", AgentStatus::WaitingForInput);

        let status = manager.format_status();
        assert!(status.contains("[abcdefgh]"));
        assert!(status.contains("waiting for input"));

        manager.remove("abcdefgh-1234");
        assert_eq!(manager.format_status(), "No agents running.");
    }
}

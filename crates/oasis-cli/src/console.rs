//! Console frontend — a terminal-bound `Frontend` for local runs.
//!
//! Lines typed on stdin become incoming messages; sends print to
//! stdout. Lines starting with `@<message_id> ` are treated as replies
//! to that bot message, so `ask_user` flows work locally. A `file_id`
//! is just a filesystem path.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use colored::Colorize;
use tokio::sync::mpsc;

use oasis_router::{Frontend, IncomingMessage};

pub struct ConsoleFrontend {
    user_id: String,
    chat_id: String,
    lines: Mutex<mpsc::Receiver<String>>,
    next_message_id: AtomicU64,
}

impl ConsoleFrontend {
    /// Spawns a blocking stdin reader thread feeding the poll loop.
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel(16);
        std::thread::spawn(move || {
            let stdin = std::io::stdin();
            let mut line = String::new();
            loop {
                line.clear();
                match stdin.read_line(&mut line) {
                    Ok(0) | Err(_) => break,
                    Ok(_) => {
                        if tx.blocking_send(line.trim_end().to_string()).is_err() {
                            break;
                        }
                    }
                }
            }
        });

        ConsoleFrontend {
            user_id: "console".to_string(),
            chat_id: "console".to_string(),
            lines: Mutex::new(rx),
            next_message_id: AtomicU64::new(1),
        }
    }

    fn next_id(&self, prefix: &str) -> String {
        format!("{prefix}_{}", self.next_message_id.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for ConsoleFrontend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Frontend for ConsoleFrontend {
    async fn poll(&self) -> Option<IncomingMessage> {
        let line = {
            let mut lines = self.lines.lock().unwrap();
            lines.try_recv().ok()
        };
        let line = match line {
            Some(line) => line,
            None => {
                // Block off the mutex so sends never contend with poll.
                loop {
                    tokio::time::sleep(std::time::Duration::from_millis(25)).await;
                    let next = self.lines.lock().unwrap().try_recv();
                    match next {
                        Ok(line) => break line,
                        Err(mpsc::error::TryRecvError::Empty) => continue,
                        Err(mpsc::error::TryRecvError::Disconnected) => return None,
                    }
                }
            }
        };

        let mut message = IncomingMessage::text(
            &self.user_id,
            &self.chat_id,
            &self.next_id("user"),
            &line,
        );

        // `@bot_3 answer` replies to message bot_3.
        if let Some(rest) = line.strip_prefix('@') {
            if let Some((reply_to, text)) = rest.split_once(' ') {
                message.reply_to_message_id = Some(reply_to.to_string());
                message.text = text.to_string();
            }
        }
        Some(message)
    }

    async fn send(&self, _chat_id: &str, text: &str) -> anyhow::Result<String> {
        let id = self.next_id("bot");
        println!("{} {text}", format!("[{id}]").dimmed());
        Ok(id)
    }

    async fn edit(&self, _chat_id: &str, message_id: &str, text: &str) -> anyhow::Result<()> {
        println!("{} {text}", format!("[{message_id}*]").dimmed());
        Ok(())
    }

    async fn send_typing(&self, _chat_id: &str) -> anyhow::Result<()> {
        Ok(())
    }

    async fn download_file(&self, file_id: &str) -> anyhow::Result<(Vec<u8>, String)> {
        let bytes = std::fs::read(file_id)?;
        let name = std::path::Path::new(file_id)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("file")
            .to_string();
        Ok((bytes, name))
    }
}

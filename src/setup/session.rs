//! Setup session registry.
//!
//! Each pending `!setup` run owns one entry keyed by `(channel, initiator)`.
//! While the wizard waits for an answer, the entry holds a one-shot waiter;
//! the event loop offers every message from that user in that channel to
//! it. Only the first offered message is taken, later ones (and messages
//! from anyone else) are ignored. The entry disappears when the owning
//! [`SessionHandle`] is dropped.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serenity::model::id::{ChannelId, UserId};
use tokio::sync::oneshot;
use tracing::debug;

/// Sessions are scoped to one user in one channel.
pub type SessionKey = (ChannelId, UserId);

/// Wizard progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WizardStep {
    AwaitingSources,
    AwaitingDestination,
    Completed,
    Cancelled,
    TimedOut,
}

impl WizardStep {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::TimedOut)
    }
}

#[derive(Debug)]
struct SessionSlot {
    step: WizardStep,
    waiter: Option<oneshot::Sender<String>>,
}

/// Registry of pending setup sessions.
#[derive(Debug, Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<Mutex<HashMap<SessionKey, SessionSlot>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new session. Returns `None` if one is already pending
    /// for this key.
    pub fn open(&self, key: SessionKey) -> Option<SessionHandle> {
        let mut sessions = self.sessions.lock();
        if sessions.contains_key(&key) {
            return None;
        }
        sessions.insert(
            key,
            SessionSlot {
                step: WizardStep::AwaitingSources,
                waiter: None,
            },
        );
        Some(SessionHandle {
            key,
            registry: self.clone(),
        })
    }

    /// Hand a message to the session's armed collector.
    ///
    /// Returns `true` if the message was taken.
    pub fn offer(&self, key: SessionKey, content: &str) -> bool {
        let waiter = {
            let mut sessions = self.sessions.lock();
            let Some(slot) = sessions.get_mut(&key) else {
                return false;
            };
            match slot.waiter.take() {
                Some(waiter) => {
                    debug!(step = ?slot.step, "Setup answer from user {}", key.1);
                    waiter
                }
                None => {
                    debug!(step = ?slot.step, "No setup answer pending for user {}", key.1);
                    return false;
                }
            }
        };

        waiter.send(content.to_string()).is_ok()
    }

    #[cfg(test)]
    pub fn step(&self, key: SessionKey) -> Option<WizardStep> {
        self.sessions.lock().get(&key).map(|slot| slot.step)
    }

    /// Whether the session currently has an armed collector.
    pub fn is_awaiting(&self, key: SessionKey) -> bool {
        self.sessions
            .lock()
            .get(&key)
            .is_some_and(|slot| slot.waiter.is_some())
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    fn set_step(&self, key: SessionKey, step: WizardStep) {
        if let Some(slot) = self.sessions.lock().get_mut(&key) {
            slot.step = step;
            if step.is_terminal() {
                slot.waiter = None;
            }
        }
    }

    fn arm(&self, key: SessionKey, step: WizardStep) -> oneshot::Receiver<String> {
        let (tx, rx) = oneshot::channel();
        if let Some(slot) = self.sessions.lock().get_mut(&key) {
            slot.step = step;
            slot.waiter = Some(tx);
        }
        rx
    }

    fn close(&self, key: SessionKey) {
        self.sessions.lock().remove(&key);
    }
}

/// Ownership of one registry entry.
#[derive(Debug)]
pub struct SessionHandle {
    key: SessionKey,
    registry: SessionRegistry,
}

impl SessionHandle {
    /// Arm a single-message collector for `step`.
    ///
    /// Arm before prompting so an immediate answer is not missed.
    pub fn arm(&self, step: WizardStep) -> Collector {
        Collector {
            rx: self.registry.arm(self.key, step),
        }
    }

    /// Record a step change without arming a collector.
    pub fn set_step(&self, step: WizardStep) {
        self.registry.set_step(self.key, step);
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        debug!("Closing setup session for user {} in channel {}", self.key.1, self.key.0);
        self.registry.close(self.key);
    }
}

/// Pending answer for one wizard step.
#[derive(Debug)]
pub struct Collector {
    rx: oneshot::Receiver<String>,
}

impl Collector {
    /// Wait for the answer. `None` when the window elapses empty.
    pub async fn wait(self, window: Duration) -> Option<String> {
        match tokio::time::timeout(window, self.rx).await {
            Ok(Ok(content)) => Some(content),
            Ok(Err(_)) => None,
            Err(_) => None,
        }
    }
}

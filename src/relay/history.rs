//! Recently relayed messages, kept so deletions can name author and content.
//!
//! The gateway's delete event only carries IDs; anything not found here is
//! reported with the unknown placeholders.

use std::collections::{HashMap, VecDeque};

use serenity::model::id::MessageId;

use crate::common::MessageRecord;

/// Bounded FIFO of message records keyed by message ID.
#[derive(Debug)]
pub struct MessageHistory {
    capacity: usize,
    order: VecDeque<MessageId>,
    records: HashMap<MessageId, MessageRecord>,
}

impl MessageHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            order: VecDeque::with_capacity(capacity.min(1024)),
            records: HashMap::new(),
        }
    }

    /// Remember a record, evicting the oldest one when full.
    pub fn remember(&mut self, id: MessageId, record: MessageRecord) {
        if self.capacity == 0 {
            return;
        }
        if self.records.insert(id, record).is_some() {
            return;
        }
        self.order.push_back(id);
        while self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.records.remove(&oldest);
            }
        }
    }

    /// Remove and return the record for a deleted message.
    pub fn take(&mut self, id: MessageId) -> Option<MessageRecord> {
        let record = self.records.remove(&id)?;
        self.order.retain(|queued| *queued != id);
        Some(record)
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.records.len()
    }
}

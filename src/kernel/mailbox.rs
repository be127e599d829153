use std::collections::VecDeque;

use crate::agent::BoxMessage;

/// FIFO of inbound messages owned by a single agent.
///
/// Delivered messages belong to the agent alone; no other component
/// keeps a handle on them.
#[derive(Debug)]
pub struct Mailbox {
    queue: VecDeque<BoxMessage>,
}

impl Mailbox {
    pub(crate) fn new() -> Mailbox {
        Mailbox {
            queue: VecDeque::new(),
        }
    }

    pub(crate) fn push(&mut self, msg: BoxMessage) {
        self.queue.push_back(msg);
    }

    pub(crate) fn pop(&mut self) -> Option<BoxMessage> {
        self.queue.pop_front()
    }

    /// The queued messages in delivery order, for inspection between
    /// runs.
    pub fn iter(&self) -> impl Iterator<Item = &BoxMessage> {
        self.queue.iter()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

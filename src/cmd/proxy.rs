//! FIFO command log between the server and the client

use std::collections::VecDeque;

use super::Command;

/// Ordered queue of pending commands
///
/// Single producer, single consumer, both on the simulation thread. A command
/// moves into the log on [`enqueue`](Self::enqueue) and out of it on
/// [`dequeue`](Self::dequeue).
#[derive(Debug, Clone, Default)]
pub struct CommandLog {
    queue: VecDeque<Command>,
}

impl CommandLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&mut self, cmd: Command) {
        self.queue.push_back(cmd);
    }

    /// Pop the oldest pending command
    pub fn dequeue(&mut self) -> Option<Command> {
        self.queue.pop_front()
    }

    /// Drop all pending commands
    pub fn clear(&mut self) {
        self.queue.clear();
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Drain every pending command in FIFO order
    pub fn drain(&mut self) -> impl Iterator<Item = Command> + '_ {
        self.queue.drain(..)
    }

    /// Pending commands, oldest first, without consuming them
    pub fn iter(&self) -> impl Iterator<Item = &Command> {
        self.queue.iter()
    }
}

impl Extend<Command> for CommandLog {
    fn extend<T: IntoIterator<Item = Command>>(&mut self, iter: T) {
        self.queue.extend(iter);
    }
}

//! Bounded handoff between the watch loop and the consumer.

use std::collections::VecDeque;

use tokio::sync::{Mutex, Notify};

use crate::error::WatcherError;
use crate::event::ChangeEvent;

/// What the consumer sees once the buffer is exhausted.
#[derive(Debug)]
enum Terminal {
    /// A failure not yet handed to the consumer.
    Failed(WatcherError),

    /// Nothing more will ever be delivered.
    Closed,
}

#[derive(Debug, Default)]
struct State {
    pending: VecDeque<ChangeEvent>,
    terminal: Option<Terminal>,
}

/// Outcome of a single take from the buffer.
#[derive(Debug)]
pub(crate) enum Take {
    Events(Vec<ChangeEvent>),
    Failed(WatcherError),
    Closed,
    Empty,
}

/// Bounded FIFO of changes awaiting delivery.
///
/// The watch loop is the only writer and the stream handle the only reader.
/// Once a terminal state is set no further pushes are accepted.
#[derive(Debug)]
pub(crate) struct PendingBuffer {
    state: Mutex<State>,
    ready: Notify,
    capacity: usize,
}

impl PendingBuffer {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(State::default()),
            ready: Notify::new(),
            capacity,
        }
    }

    /// Append events in order.
    ///
    /// Fails with `BufferOverflow` when appending would exceed capacity. Nothing
    /// from `events` is kept then; the caller decides when to [`fail`] the
    /// buffer so it can release its resources first.
    ///
    /// [`fail`]: PendingBuffer::fail
    pub(crate) async fn push_all(&self, events: Vec<ChangeEvent>) -> Result<(), WatcherError> {
        if events.is_empty() {
            return Ok(());
        }

        let mut state = self.state.lock().await;
        if state.terminal.is_some() {
            return Ok(());
        }

        if state.pending.len() + events.len() > self.capacity {
            return Err(WatcherError::BufferOverflow {
                capacity: self.capacity,
            });
        }

        state.pending.extend(events);
        drop(state);
        self.ready.notify_one();
        Ok(())
    }

    /// Fail the stream, discarding anything still pending.
    pub(crate) async fn fail(&self, error: WatcherError) {
        let mut state = self.state.lock().await;
        if state.terminal.is_none() {
            state.pending.clear();
            state.terminal = Some(Terminal::Failed(error));
        }
        drop(state);
        self.ready.notify_one();
    }

    /// Close the stream, discarding anything still pending.
    pub(crate) async fn close(&self) {
        let mut state = self.state.lock().await;
        state.pending.clear();
        if state.terminal.is_none() {
            state.terminal = Some(Terminal::Closed);
        }
        drop(state);
        self.ready.notify_one();
    }

    /// Take up to `limit` events without waiting.
    pub(crate) async fn try_take(&self, limit: usize) -> Take {
        let mut state = self.state.lock().await;

        if !state.pending.is_empty() {
            let count = limit.min(state.pending.len());
            return Take::Events(state.pending.drain(..count).collect());
        }

        match state.terminal.take() {
            Some(Terminal::Failed(error)) => {
                state.terminal = Some(Terminal::Closed);
                Take::Failed(error)
            }
            Some(Terminal::Closed) => {
                state.terminal = Some(Terminal::Closed);
                Take::Closed
            }
            None => Take::Empty,
        }
    }

    /// Take up to `limit` events, suspending while nothing is available.
    pub(crate) async fn take(&self, limit: usize) -> Take {
        loop {
            match self.try_take(limit).await {
                Take::Empty => self.ready.notified().await,
                other => return other,
            }
        }
    }

    /// Number of undelivered events.
    pub(crate) async fn len(&self) -> usize {
        self.state.lock().await.pending.len()
    }
}

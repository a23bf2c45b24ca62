use futures::stream::BoxStream;
use std::task::{Context, Poll};

use crate::error::MeshError;

/// One input of a merge: a sorted stream of keys.
pub type SourceStream<T> = BoxStream<'static, Result<T, MeshError>>;

/// Read state of a [`StreamNode`].
///
/// | from      | value     | end   | error   |
/// |-----------|-----------|-------|---------|
/// | `Waiting` | `Reading` | `Done`| `Defunct` |
/// | `Reading` | `Reading` | `Done`| `Defunct` |
/// | `Done`    | -         | -     | -       |
/// | `Defunct` | -         | -     | -       |
///
/// Leaving `Waiting` is the node's one "ready" signal. `Done` and `Defunct`
/// are terminal and release the underlying stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Waiting,
    Reading,
    Done,
    Defunct,
}

/// What a single read of the underlying stream produced.
#[derive(Debug)]
pub enum ReadEvent<T> {
    Value(T),
    End,
    Failed(MeshError),
}

/// Wraps one input stream with a single buffered "next value" slot.
///
/// At most one read is in flight per node: a new value is only pulled once
/// the buffered one was consumed.
pub struct StreamNode<T> {
    index: usize,
    stream: Option<SourceStream<T>>,
    state: StreamState,
    value: Option<T>,
    error: Option<MeshError>,
}

impl<T> StreamNode<T> {
    pub fn new(index: usize, stream: SourceStream<T>) -> Self {
        Self {
            index,
            stream: Some(stream),
            state: StreamState::Waiting,
            value: None,
            error: None,
        }
    }

    /// Position of this node in the merger's input list.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    /// The buffered value, used as the heap ordering key.
    pub fn value(&self) -> Option<&T> {
        self.value.as_ref()
    }

    pub fn is_ready(&self) -> bool {
        self.state != StreamState::Waiting
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.state, StreamState::Done | StreamState::Defunct)
    }

    /// Apply one read result. Returns `true` when the node left `Waiting`.
    pub fn transition(&mut self, event: ReadEvent<T>) -> bool {
        let was_waiting = self.state == StreamState::Waiting;

        self.state = match (self.state, event) {
            (StreamState::Waiting | StreamState::Reading, ReadEvent::Value(value)) => {
                self.value = Some(value);
                StreamState::Reading
            }
            (StreamState::Waiting | StreamState::Reading, ReadEvent::End) => {
                self.stream = None;
                StreamState::Done
            }
            (StreamState::Waiting | StreamState::Reading, ReadEvent::Failed(err)) => {
                self.stream = None;
                self.error = Some(err);
                StreamState::Defunct
            }
            (terminal, _) => terminal,
        };

        was_waiting && self.state != StreamState::Waiting
    }

    /// Make sure a value is buffered or the node is terminal.
    ///
    /// Returns `Ready(true)` exactly once, when the node leaves `Waiting`.
    pub fn poll_fill(&mut self, cx: &mut Context<'_>) -> Poll<bool> {
        if self.value.is_some() || self.is_terminal() {
            return Poll::Ready(false);
        }

        let Some(stream) = self.stream.as_mut() else {
            return Poll::Ready(self.transition(ReadEvent::End));
        };

        let event = match stream.as_mut().poll_next(cx) {
            Poll::Pending => return Poll::Pending,
            Poll::Ready(Some(Ok(value))) => ReadEvent::Value(value),
            Poll::Ready(Some(Err(err))) => ReadEvent::Failed(err),
            Poll::Ready(None) => ReadEvent::End,
        };

        Poll::Ready(self.transition(event))
    }

    /// Take the buffered value, leaving the slot empty for the next read.
    pub fn consume(&mut self) -> Option<T> {
        self.value.take()
    }

    /// The failure that made this node defunct, handed out once.
    pub fn take_error(&mut self) -> Option<MeshError> {
        self.error.take()
    }
}

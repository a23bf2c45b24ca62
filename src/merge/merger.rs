use futures::Stream;
use std::cmp::Ordering;
use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use super::heap::BinaryHeap;
use super::stream_node::{SourceStream, StreamNode, StreamState};
use crate::error::MeshError;

type KeyOrder<T> = Arc<dyn Fn(&T, &T) -> Ordering + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Waiting for every input to produce its first value (or end).
    Priming,
    Merging,
    Finished,
}

/// K-way merge of individually sorted streams into one sorted stream.
///
/// Every input is wrapped in a [`StreamNode`]. Once all of them have
/// signalled ready, the nodes holding a value seed a min-heap keyed on their
/// buffered value. Each poll then emits the root's value and refills only the
/// root, so inputs are read at the pace the output is consumed. Dropping the
/// merger drops every input.
///
/// A failing input is treated as exhausted: its error is yielded once as
/// `Err(MeshError::MergeSource)` and the merge carries on with the rest.
/// Equal keys from different inputs come out in heap order.
pub struct StreamMerger<T> {
    phase: Phase,
    pending: Vec<StreamNode<T>>,
    heap: BinaryHeap<StreamNode<T>>,
    refill_head: bool,
    failures: VecDeque<MeshError>,
}

impl<T> Unpin for StreamMerger<T> {}

impl<T: Ord + Send + 'static> StreamMerger<T> {
    pub fn new(streams: Vec<SourceStream<T>>) -> Self {
        Self::with_comparator(streams, |a: &T, b: &T| a.cmp(b))
    }
}

impl<T: Send + 'static> StreamMerger<T> {
    /// Merge inputs that are sorted according to `cmp` instead of `Ord`.
    pub fn with_comparator<F>(streams: Vec<SourceStream<T>>, cmp: F) -> Self
    where
        F: Fn(&T, &T) -> Ordering + Send + Sync + 'static,
    {
        let order: KeyOrder<T> = Arc::new(cmp);
        let heap = BinaryHeap::with_comparator(move |a: &StreamNode<T>, b: &StreamNode<T>| {
            match (a.value(), b.value()) {
                (Some(x), Some(y)) => order(x, y),
                // A node without a value is mid-refill and only ever sits at the root.
                (None, Some(_)) => Ordering::Less,
                (Some(_), None) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            }
        });

        let pending: Vec<StreamNode<T>> = streams
            .into_iter()
            .enumerate()
            .map(|(index, stream)| StreamNode::new(index, stream))
            .collect();

        Self {
            phase: Phase::Priming,
            pending,
            heap,
            refill_head: false,
            failures: VecDeque::new(),
        }
    }

    /// Number of inputs still contributing values.
    pub fn active_sources(&self) -> usize {
        match self.phase {
            Phase::Priming => self.pending.iter().filter(|n| !n.is_terminal()).count(),
            Phase::Merging => self.heap.len(),
            Phase::Finished => 0,
        }
    }

    fn record_failure(&mut self, index: usize, err: MeshError) {
        tracing::warn!(source_index = index, "Merge source failed: {}", err);
        self.failures.push_back(MeshError::MergeSource {
            source_index: index,
            message: err.to_string(),
        });
    }

    /// Poll every node that has not signalled ready yet.
    fn poll_priming(&mut self, cx: &mut Context<'_>) -> Poll<()> {
        let mut all_ready = true;
        let mut failed = Vec::new();

        for node in self.pending.iter_mut() {
            if node.is_ready() {
                continue;
            }
            match node.poll_fill(cx) {
                Poll::Pending => all_ready = false,
                Poll::Ready(_) => {
                    if let Some(err) = node.take_error() {
                        failed.push((node.index(), err));
                    }
                }
            }
        }

        for (index, err) in failed {
            self.record_failure(index, err);
        }

        if !all_ready {
            return Poll::Pending;
        }

        for node in self.pending.drain(..) {
            if node.state() == StreamState::Reading {
                self.heap.insert(node);
            }
        }
        tracing::debug!(sources = self.heap.len(), "Merge primed");

        Poll::Ready(())
    }

    /// Fetch the next value of the node just emitted from the root.
    fn poll_refill(&mut self, cx: &mut Context<'_>) -> Poll<()> {
        let Some(head) = self.heap.peek_mut() else {
            return Poll::Ready(());
        };

        if head.poll_fill(cx).is_pending() {
            return Poll::Pending;
        }

        let failure = head.take_error().map(|err| (head.index(), err));
        let exhausted = head.value().is_none();

        if exhausted {
            self.heap.remove_head();
        } else {
            self.heap.min_heapify(0);
        }
        if let Some((index, err)) = failure {
            self.record_failure(index, err);
        }

        Poll::Ready(())
    }
}

impl<T: Send + 'static> Stream for StreamMerger<T> {
    type Item = Result<T, MeshError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        loop {
            if let Some(err) = this.failures.pop_front() {
                return Poll::Ready(Some(Err(err)));
            }

            match this.phase {
                Phase::Priming => {
                    if this.poll_priming(cx).is_pending() {
                        if this.failures.is_empty() {
                            return Poll::Pending;
                        }
                        continue;
                    }
                    this.phase = Phase::Merging;
                }
                Phase::Merging => {
                    if this.refill_head {
                        if this.poll_refill(cx).is_pending() {
                            return Poll::Pending;
                        }
                        this.refill_head = false;
                        continue;
                    }

                    match this.heap.peek_mut().and_then(|head| head.consume()) {
                        Some(value) => {
                            this.refill_head = true;
                            return Poll::Ready(Some(Ok(value)));
                        }
                        None => {
                            this.phase = Phase::Finished;
                        }
                    }
                }
                Phase::Finished => return Poll::Ready(None),
            }
        }
    }
}

/// Merge `streams` into one stream sorted by `Ord`.
pub fn merge_sorted<T: Ord + Send + 'static>(streams: Vec<SourceStream<T>>) -> StreamMerger<T> {
    StreamMerger::new(streams)
}

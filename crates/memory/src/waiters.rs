// Copyright (c) 2023 - 2026 Restate Software, Inc., Restate GmbH.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! FIFO queue of reservations waiting for pool capacity.
//!
//! A waiter's bytes are already recorded in the ledger when it is enqueued;
//! the queue only tracks whose completion future has not fired yet. Draining
//! therefore does not move any counters. It hands the queued futures back to
//! the pool, in arrival order, for completion once the lock is released.
//!
//! Entries are never removed other than by draining: reservation futures do
//! not support cancellation, and an abandoned waiter is resolved by the
//! matching `free` like any other.

use std::collections::VecDeque;

use bytestring::ByteString;

use restate_query_types::TaskId;

use crate::future::MemoryFuture;

/// A reservation whose accounting has been applied but whose future has not
/// fired because the pool is over-subscribed.
pub(crate) struct Waiter {
    pub task: TaskId,
    pub tag: ByteString,
    pub bytes: u64,
    pub future: MemoryFuture,
}

#[derive(Default)]
pub(crate) struct WaiterQueue {
    inner: VecDeque<Waiter>,
}

impl WaiterQueue {
    /// Appends a waiter; first-in is the first to be granted.
    pub fn push(&mut self, waiter: Waiter) {
        self.inner.push_back(waiter);
    }

    /// Drains every waiter in arrival order, invoking `granted` on each.
    ///
    /// The pool calls this only once its free capacity is non-negative;
    /// since every queued reservation is already counted, a non-negative
    /// balance satisfies all of them at once.
    pub fn drain_all(&mut self, mut granted: impl FnMut(Waiter)) {
        for waiter in self.inner.drain(..) {
            granted(waiter);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use restate_query_types::StageId;

    fn waiter(partition: u32, bytes: u64) -> Waiter {
        Waiter {
            task: TaskId::new(StageId::new("q", 0), partition, 0),
            tag: ByteString::from_static("test"),
            bytes,
            future: MemoryFuture::pending(),
        }
    }

    #[test]
    fn drains_in_fifo_order() {
        let mut queue = WaiterQueue::default();
        queue.push(waiter(0, 10));
        queue.push(waiter(1, 20));
        queue.push(waiter(2, 30));
        assert_eq!(queue.len(), 3);

        let mut drained = Vec::new();
        queue.drain_all(|waiter| drained.push(waiter.task.partition()));
        assert_eq!(drained, vec![0, 1, 2]);
        assert!(queue.is_empty());
    }

    #[test]
    fn empty_drain_is_noop() {
        let mut queue = WaiterQueue::default();
        let mut count = 0;
        queue.drain_all(|_| count += 1);
        assert_eq!(count, 0);
    }

    #[test]
    fn drained_futures_are_the_enqueued_ones() {
        let mut queue = WaiterQueue::default();
        let enqueued = waiter(0, 10);
        let observer = enqueued.future.clone();
        queue.push(enqueued);

        queue.drain_all(|waiter| waiter.future.complete());
        assert!(observer.is_done());
    }
}

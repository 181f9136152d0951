// Copyright (c) 2023 - 2026 Restate Software, Inc., Restate GmbH.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::{Context, Poll, Waker};

use parking_lot::Mutex;
use triomphe::Arc;

use crate::error::MemoryPoolError;

/// One-shot completion handed out by [`MemoryPool::reserve`](crate::MemoryPool::reserve).
///
/// The reservation is already recorded in the ledger when this future is
/// created; completion only signals that the pool has enough free capacity
/// for the caller to proceed and actually use the memory. Clones share the
/// same completion, so a scheduler can hold one copy for
/// `is_waiting_for_memory`-style checks while the driver awaits another.
///
/// The future cannot be cancelled: the reserved bytes are part of the
/// ledger, and dequeuing a waiter without a matching `free` would
/// desynchronise the accounting. Callers that give up must still free the
/// exact bytes they reserved.
#[derive(Clone)]
#[must_use = "the future communicates when the caller may use the reserved memory"]
pub struct MemoryFuture {
    shared: Arc<Shared>,
}

struct Shared {
    done: AtomicBool,
    wakers: Mutex<Vec<Waker>>,
}

impl MemoryFuture {
    /// An already-completed future, for reservations satisfiable immediately.
    pub(crate) fn ready() -> Self {
        Self {
            shared: Arc::new(Shared {
                done: AtomicBool::new(true),
                wakers: Mutex::new(Vec::new()),
            }),
        }
    }

    pub(crate) fn pending() -> Self {
        Self {
            shared: Arc::new(Shared {
                done: AtomicBool::new(false),
                wakers: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Completes the future and wakes every registered waker.
    ///
    /// Safe to call while holding the pool lock; wakers only schedule the
    /// parked tasks, they never re-enter the pool.
    pub(crate) fn complete(&self) {
        let wakers = {
            let mut wakers = self.shared.wakers.lock();
            // Flipped under the waker lock so that a concurrent poll either
            // observes completion or has its waker taken below.
            self.shared.done.store(true, Ordering::Release);
            std::mem::take(&mut *wakers)
        };
        for waker in wakers {
            waker.wake();
        }
    }

    /// Returns whether the reservation has been granted.
    #[inline]
    pub fn is_done(&self) -> bool {
        self.shared.done.load(Ordering::Acquire)
    }

    /// Reservation futures cannot be cancelled; this always fails and the
    /// future stays pending.
    pub fn cancel(&self) -> Result<(), MemoryPoolError> {
        Err(MemoryPoolError::CancellationNotSupported)
    }
}

impl Future for MemoryFuture {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if self.is_done() {
            return Poll::Ready(());
        }
        let mut wakers = self.shared.wakers.lock();
        if self.is_done() {
            return Poll::Ready(());
        }
        if !wakers.iter().any(|waker| waker.will_wake(cx.waker())) {
            wakers.push(cx.waker().clone());
        }
        Poll::Pending
    }
}

impl std::fmt::Debug for MemoryFuture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryFuture")
            .field("done", &self.is_done())
            .finish()
    }
}

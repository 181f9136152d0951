// Copyright (c) 2023 - 2026 Restate Software, Inc., Restate GmbH.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::num::NonZeroU64;
use std::sync::Arc;

use bytestring::ByteString;
use parking_lot::Mutex;
use tracing::{debug, trace};

use restate_query_types::config::MemoryPoolOptions;
use restate_query_types::{ByteCount, QueryId, TaskId};

use crate::error::MemoryPoolError;
use crate::future::MemoryFuture;
use crate::info::MemoryPoolInfo;
use crate::listener::MemoryPoolListener;
use crate::metric_definitions::publish_pool_gauges;
use crate::waiters::{Waiter, WaiterQueue};

/// A shared memory pool gating bulk allocations across the query tasks of a
/// worker.
///
/// The pool enforces a hard byte budget: reservations are recorded
/// immediately, and when the budget is exhausted the returned
/// [`MemoryFuture`] stays pending until enough bytes are returned, waking
/// blocked callers in FIFO order. Revocable reservations share the same
/// budget under separate bookkeeping, so that non-revocable callers wait as
/// if the revocable bytes were gone while the revocation policy asks them
/// back.
///
/// Cheaply cloneable; clones share the same ledger.
#[derive(Clone)]
pub struct MemoryPool {
    inner: triomphe::Arc<PoolInner>,
}

struct PoolInner {
    name: &'static str,
    capacity_bytes: u64,
    state: Mutex<PoolState>,
    listeners: Mutex<Vec<Arc<dyn MemoryPoolListener>>>,
}

#[derive(Default)]
struct PoolState {
    reserved_bytes: u64,
    reserved_revocable_bytes: u64,
    /// Revocable bytes held by engine-level consumers not attributable to a
    /// single task (exchanges, page caches).
    global_revocable_bytes: u64,
    query_memory_reservations: HashMap<QueryId, u64>,
    task_memory_reservations: HashMap<TaskId, u64>,
    tagged_memory_allocations: HashMap<TaskId, HashMap<ByteString, u64>>,
    query_revocable_memory_reservations: HashMap<QueryId, u64>,
    task_revocable_memory_reservations: HashMap<TaskId, u64>,
    waiters: WaiterQueue,
}

impl MemoryPool {
    pub fn new(name: &'static str, capacity: NonZeroU64) -> Self {
        Self {
            inner: triomphe::Arc::new(PoolInner {
                name,
                capacity_bytes: capacity.get(),
                state: Mutex::new(PoolState::default()),
                listeners: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn from_options(name: &'static str, options: &MemoryPoolOptions) -> Self {
        Self::new(name, options.capacity.get())
    }

    pub fn name(&self) -> &'static str {
        self.inner.name
    }

    pub fn get_capacity_bytes(&self) -> u64 {
        self.inner.capacity_bytes
    }

    /// Reserves `bytes` for `task`, attributed to `tag`.
    ///
    /// The reservation is applied to the ledger unconditionally; the returned
    /// future communicates whether the caller may proceed to actually use the
    /// memory. It is already completed when the pool had enough free
    /// capacity, and pending otherwise, in which case the caller is queued
    /// behind earlier waiters. Callers that need a hard no-overbook answer
    /// use [`try_reserve`](Self::try_reserve) instead.
    pub fn reserve(
        &self,
        task: &TaskId,
        tag: impl Into<ByteString>,
        bytes: u64,
    ) -> MemoryFuture {
        let tag = tag.into();
        let future;
        {
            let mut state = self.inner.state.lock();
            state.charge_task(task, &tag, bytes);
            if state.free_bytes(self.inner.capacity_bytes) >= 0 {
                trace!(%task, %tag, "Reserved {}", ByteCount::new(bytes));
                future = MemoryFuture::ready();
            } else {
                debug!(
                    %task,
                    %tag,
                    "Pool is exhausted, queueing reservation of {}",
                    ByteCount::new(bytes)
                );
                future = MemoryFuture::pending();
                state.waiters.push(Waiter {
                    task: task.clone(),
                    tag,
                    bytes,
                    future: future.clone(),
                });
            }
            self.publish_gauges(&state);
        }
        self.notify_memory_reserved();
        future
    }

    /// Reserves `bytes` only if the pool is not over-subscribed afterwards,
    /// counting outstanding revocable bytes against the budget. Returns
    /// whether the reservation was applied.
    pub fn try_reserve(&self, task: &TaskId, tag: impl Into<ByteString>, bytes: u64) -> bool {
        let tag = tag.into();
        {
            let mut state = self.inner.state.lock();
            if state.committed_bytes_with(bytes) > self.inner.capacity_bytes {
                return false;
            }
            state.charge_task(task, &tag, bytes);
            trace!(%task, %tag, "Reserved {}", ByteCount::new(bytes));
            self.publish_gauges(&state);
        }
        self.notify_memory_reserved();
        true
    }

    /// Returns `bytes` previously reserved by `task` under `tag`.
    ///
    /// Fails without touching the ledger if the task or tag balance would go
    /// negative. On success, entries that reach zero are removed and queued
    /// waiters are granted if the pool is no longer over-subscribed.
    pub fn free(
        &self,
        task: &TaskId,
        tag: impl Into<ByteString>,
        bytes: u64,
    ) -> Result<(), MemoryPoolError> {
        let tag = tag.into();
        let mut granted = Vec::new();
        {
            let mut state = self.inner.state.lock();
            if bytes > 0 {
                if state.task_memory_reservations.get(task).copied().unwrap_or(0) < bytes {
                    return Err(MemoryPoolError::FreeExceedsTaskReservation);
                }
                let tag_reserved = state
                    .tagged_memory_allocations
                    .get(task)
                    .and_then(|tags| tags.get(&tag))
                    .copied()
                    .unwrap_or(0);
                if tag_reserved < bytes {
                    return Err(MemoryPoolError::FreeExceedsTagReservation { tag });
                }
                state.discharge_task(task, &tag, bytes);
            }
            state.drain_waiters(self.inner.capacity_bytes, &mut granted);
            self.publish_gauges(&state);
        }
        for future in granted {
            future.complete();
        }
        self.notify_memory_freed();
        Ok(())
    }

    /// Reserves `bytes` of revocable memory for `task`.
    ///
    /// Unconditional: revocable reservations never block and never fail for
    /// capacity reasons. The revocation policy is expected to keep the total
    /// sensible by asking holders to release when the pool runs hot.
    pub fn reserve_revocable(&self, task: &TaskId, bytes: u64) {
        {
            let mut state = self.inner.state.lock();
            state.charge_task_revocable(task, bytes);
            trace!(%task, "Reserved {} of revocable memory", ByteCount::new(bytes));
            self.publish_gauges(&state);
        }
        self.notify_memory_reserved();
    }

    /// Reserves `bytes` of revocable memory not attributed to any task, only
    /// if the pool is not over-subscribed afterwards. Returns whether the
    /// reservation was applied.
    pub fn try_reserve_revocable(&self, bytes: u64) -> bool {
        {
            let mut state = self.inner.state.lock();
            if state.committed_bytes_with(bytes) > self.inner.capacity_bytes {
                return false;
            }
            state.global_revocable_bytes = checked_add(state.global_revocable_bytes, bytes);
            state.reserved_revocable_bytes = checked_add(state.reserved_revocable_bytes, bytes);
            self.publish_gauges(&state);
        }
        self.notify_memory_reserved();
        true
    }

    /// Returns `bytes` of revocable memory previously reserved by `task`.
    pub fn free_revocable(&self, task: &TaskId, bytes: u64) -> Result<(), MemoryPoolError> {
        let mut granted = Vec::new();
        {
            let mut state = self.inner.state.lock();
            if bytes > 0 {
                if state
                    .task_revocable_memory_reservations
                    .get(task)
                    .copied()
                    .unwrap_or(0)
                    < bytes
                {
                    return Err(MemoryPoolError::FreeRevocableExceedsTaskReservation);
                }
                state.discharge_task_revocable(task, bytes);
            }
            state.drain_waiters(self.inner.capacity_bytes, &mut granted);
            self.publish_gauges(&state);
        }
        for future in granted {
            future.complete();
        }
        self.notify_memory_freed();
        Ok(())
    }

    /// Returns `bytes` of revocable memory reserved outside of any task.
    pub fn free_revocable_global(&self, bytes: u64) -> Result<(), MemoryPoolError> {
        let mut granted = Vec::new();
        {
            let mut state = self.inner.state.lock();
            if state.global_revocable_bytes < bytes {
                return Err(MemoryPoolError::FreeRevocableExceedsGlobalReservation);
            }
            state.global_revocable_bytes -= bytes;
            state.reserved_revocable_bytes -= bytes;
            state.drain_waiters(self.inner.capacity_bytes, &mut granted);
            self.publish_gauges(&state);
        }
        for future in granted {
            future.complete();
        }
        self.notify_memory_freed();
        Ok(())
    }

    /// Unreserved capacity in bytes. Negative while the pool is
    /// over-subscribed, i.e. while waiters are queued.
    pub fn get_free_bytes(&self) -> i64 {
        self.inner
            .state
            .lock()
            .free_bytes(self.inner.capacity_bytes)
    }

    pub fn get_reserved_bytes(&self) -> u64 {
        self.inner.state.lock().reserved_bytes
    }

    pub fn get_reserved_revocable_bytes(&self) -> u64 {
        self.inner.state.lock().reserved_revocable_bytes
    }

    pub fn get_query_memory_reservations(&self) -> HashMap<QueryId, u64> {
        self.inner.state.lock().query_memory_reservations.clone()
    }

    pub fn get_query_memory_reservation(&self, query: &QueryId) -> u64 {
        self.inner
            .state
            .lock()
            .query_memory_reservations
            .get(query)
            .copied()
            .unwrap_or(0)
    }

    pub fn get_task_memory_reservations(&self) -> HashMap<TaskId, u64> {
        self.inner.state.lock().task_memory_reservations.clone()
    }

    pub fn get_task_memory_reservation(&self, task: &TaskId) -> u64 {
        self.inner
            .state
            .lock()
            .task_memory_reservations
            .get(task)
            .copied()
            .unwrap_or(0)
    }

    pub fn get_query_revocable_memory_reservations(&self) -> HashMap<QueryId, u64> {
        self.inner
            .state
            .lock()
            .query_revocable_memory_reservations
            .clone()
    }

    pub fn get_query_revocable_memory_reservation(&self, query: &QueryId) -> u64 {
        self.inner
            .state
            .lock()
            .query_revocable_memory_reservations
            .get(query)
            .copied()
            .unwrap_or(0)
    }

    pub fn get_task_revocable_memory_reservations(&self) -> HashMap<TaskId, u64> {
        self.inner
            .state
            .lock()
            .task_revocable_memory_reservations
            .clone()
    }

    pub fn get_task_revocable_memory_reservation(&self, task: &TaskId) -> u64 {
        self.inner
            .state
            .lock()
            .task_revocable_memory_reservations
            .get(task)
            .copied()
            .unwrap_or(0)
    }

    /// Tag-level attribution merged across every task of each query. Queries
    /// with no active tasks do not appear.
    pub fn get_tagged_memory_allocations(&self) -> HashMap<QueryId, HashMap<ByteString, u64>> {
        tagged_by_query(&self.inner.state.lock())
    }

    /// Consistent snapshot of the pool for dashboards and status endpoints.
    pub fn get_info(&self) -> MemoryPoolInfo {
        let state = self.inner.state.lock();
        MemoryPoolInfo {
            capacity_bytes: self.inner.capacity_bytes,
            reserved_bytes: state.reserved_bytes,
            reserved_revocable_bytes: state.reserved_revocable_bytes,
            free_bytes: state.free_bytes(self.inner.capacity_bytes),
            blocked_reservations: state.waiters.len(),
            query_memory_reservations: state.query_memory_reservations.clone(),
            query_revocable_memory_reservations: state
                .query_revocable_memory_reservations
                .clone(),
            tagged_memory_allocations: tagged_by_query(&state),
        }
    }

    /// Registers a listener. Listeners are invoked in registration order,
    /// after the pool lock has been released.
    pub fn add_listener(&self, listener: Arc<dyn MemoryPoolListener>) {
        self.inner.listeners.lock().push(listener);
    }

    /// Removes a previously registered listener, compared by identity.
    pub fn remove_listener(&self, listener: &Arc<dyn MemoryPoolListener>) {
        self.inner
            .listeners
            .lock()
            .retain(|registered| !Arc::ptr_eq(registered, listener));
    }

    fn notify_memory_reserved(&self) {
        let listeners = self.inner.listeners.lock().clone();
        for listener in listeners {
            listener.on_memory_reserved(self);
        }
    }

    fn notify_memory_freed(&self) {
        let listeners = self.inner.listeners.lock().clone();
        for listener in listeners {
            listener.on_memory_freed(self);
        }
    }

    fn publish_gauges(&self, state: &PoolState) {
        publish_pool_gauges(
            self.inner.name,
            state.reserved_bytes,
            state.reserved_revocable_bytes,
            state.free_bytes(self.inner.capacity_bytes),
            state.waiters.len(),
        );
    }
}

impl fmt::Debug for MemoryPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("MemoryPool")
            .field("name", &self.inner.name)
            .field("capacity_bytes", &self.inner.capacity_bytes)
            .field("reserved_bytes", &state.reserved_bytes)
            .field("reserved_revocable_bytes", &state.reserved_revocable_bytes)
            .field("blocked_reservations", &state.waiters.len())
            .finish()
    }
}

impl PoolState {
    fn free_bytes(&self, capacity_bytes: u64) -> i64 {
        capacity_bytes as i64 - self.reserved_bytes as i64 - self.reserved_revocable_bytes as i64
    }

    /// Total committed bytes if `bytes` more were reserved.
    fn committed_bytes_with(&self, bytes: u64) -> u64 {
        checked_add(
            checked_add(self.reserved_bytes, bytes),
            self.reserved_revocable_bytes,
        )
    }

    fn charge_task(&mut self, task: &TaskId, tag: &ByteString, bytes: u64) {
        if bytes == 0 {
            return;
        }
        increment(&mut self.task_memory_reservations, task, bytes);
        increment(&mut self.query_memory_reservations, task.query_id(), bytes);
        let tags = self
            .tagged_memory_allocations
            .entry(task.clone())
            .or_default();
        increment(tags, tag, bytes);
        self.reserved_bytes = checked_add(self.reserved_bytes, bytes);
    }

    /// Callers have verified both the task and tag balances cover `bytes`.
    fn discharge_task(&mut self, task: &TaskId, tag: &ByteString, bytes: u64) {
        decrement(&mut self.task_memory_reservations, task, bytes);
        decrement(&mut self.query_memory_reservations, task.query_id(), bytes);
        let tags = self
            .tagged_memory_allocations
            .get_mut(task)
            .expect("tag ledger entry exists for a task with a positive balance");
        decrement(tags, tag, bytes);
        if tags.is_empty() {
            self.tagged_memory_allocations.remove(task);
        }
        self.reserved_bytes -= bytes;
    }

    fn charge_task_revocable(&mut self, task: &TaskId, bytes: u64) {
        if bytes == 0 {
            return;
        }
        increment(&mut self.task_revocable_memory_reservations, task, bytes);
        increment(
            &mut self.query_revocable_memory_reservations,
            task.query_id(),
            bytes,
        );
        self.reserved_revocable_bytes = checked_add(self.reserved_revocable_bytes, bytes);
    }

    fn discharge_task_revocable(&mut self, task: &TaskId, bytes: u64) {
        decrement(&mut self.task_revocable_memory_reservations, task, bytes);
        decrement(
            &mut self.query_revocable_memory_reservations,
            task.query_id(),
            bytes,
        );
        self.reserved_revocable_bytes -= bytes;
    }

    /// Hands back every queued waiter once the pool is no longer
    /// over-subscribed. Waiter bytes are already part of `reserved_bytes`,
    /// so a non-negative balance satisfies the whole queue; the futures are
    /// completed by the caller after the lock is released, in FIFO order.
    fn drain_waiters(&mut self, capacity_bytes: u64, granted: &mut Vec<MemoryFuture>) {
        if self.free_bytes(capacity_bytes) < 0 {
            return;
        }
        self.waiters.drain_all(|waiter| {
            trace!(
                task = %waiter.task,
                tag = %waiter.tag,
                "Granting queued reservation of {}",
                ByteCount::new(waiter.bytes)
            );
            granted.push(waiter.future);
        });
    }
}

fn tagged_by_query(state: &PoolState) -> HashMap<QueryId, HashMap<ByteString, u64>> {
    let mut merged: HashMap<QueryId, HashMap<ByteString, u64>> = HashMap::new();
    for (task, tags) in &state.tagged_memory_allocations {
        let query_tags = merged.entry(task.query_id().clone()).or_default();
        for (tag, bytes) in tags {
            *query_tags.entry(tag.clone()).or_insert(0) += *bytes;
        }
    }
    merged
}

fn checked_add(current: u64, bytes: u64) -> u64 {
    current
        .checked_add(bytes)
        .expect("memory reservation counters overflowed")
}

fn increment<K>(map: &mut HashMap<K, u64>, key: &K, bytes: u64)
where
    K: Eq + Hash + Clone,
{
    let slot = map.entry(key.clone()).or_insert(0);
    *slot = checked_add(*slot, bytes);
}

/// Removes the entry once its balance reaches zero; callers have verified
/// the balance covers `bytes`.
fn decrement<K>(map: &mut HashMap<K, u64>, key: &K, bytes: u64)
where
    K: Eq + Hash,
{
    let slot = map
        .get_mut(key)
        .expect("ledger entry exists for a validated free");
    *slot -= bytes;
    if *slot == 0 {
        map.remove(key);
    }
}

const _: () = {
    const fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<MemoryPool>();
    assert_send_sync::<MemoryFuture>();
};

// Copyright (c) 2023 - 2026 Restate Software, Inc., Restate GmbH.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Observers of pool-level memory events.
//!
//! The revocation policy subscribes to memory-reserved events to decide when
//! to start asking operators to spill; dashboards subscribe to both kinds.
//!
//! Listeners are invoked **after the pool's lock has been released**: the
//! mutation that triggered the event is committed before fan-out, so a
//! listener observes a pool state no earlier than the state immediately
//! after the event, and the pool's read accessors are safe to call from the
//! callback. Callbacks must be short and non-blocking, and must not mutate
//! the pool.

use std::sync::Arc;

use crate::pool::MemoryPool;

pub trait MemoryPoolListener: Send + Sync + 'static {
    /// Called after memory has been reserved, revocable or not.
    fn on_memory_reserved(&self, pool: &MemoryPool) {
        let _ = pool;
    }

    /// Called after memory has been freed, revocable or not.
    fn on_memory_freed(&self, pool: &MemoryPool) {
        let _ = pool;
    }
}

/// Creates a listener observing only memory-reserved events.
pub fn on_memory_reserved<F>(callback: F) -> Arc<dyn MemoryPoolListener>
where
    F: Fn(&MemoryPool) + Send + Sync + 'static,
{
    struct OnReserved<F>(F);

    impl<F> MemoryPoolListener for OnReserved<F>
    where
        F: Fn(&MemoryPool) + Send + Sync + 'static,
    {
        fn on_memory_reserved(&self, pool: &MemoryPool) {
            (self.0)(pool)
        }
    }

    Arc::new(OnReserved(callback))
}

/// Creates a listener observing only memory-freed events.
pub fn on_memory_freed<F>(callback: F) -> Arc<dyn MemoryPoolListener>
where
    F: Fn(&MemoryPool) + Send + Sync + 'static,
{
    struct OnFreed<F>(F);

    impl<F> MemoryPoolListener for OnFreed<F>
    where
        F: Fn(&MemoryPool) + Send + Sync + 'static,
    {
        fn on_memory_freed(&self, pool: &MemoryPool) {
            (self.0)(pool)
        }
    }

    Arc::new(OnFreed(callback))
}

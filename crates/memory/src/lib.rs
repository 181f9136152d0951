// Copyright (c) 2023 - 2026 Restate Software, Inc., Restate GmbH.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Shared memory pool for the query-engine worker.
//!
//! This crate provides:
//! - [`MemoryPool`]: a hard byte budget shared by all query tasks on a
//!   worker, with per-query, per-task, and per-tag attribution
//! - [`MemoryFuture`]: a non-cancellable one-shot future that gates a caller
//!   until its reservation fits into the budget
//! - [`MemoryPoolListener`]: observers of memory-reserved and memory-freed
//!   events, used by the revocation policy and dashboards
//! - [`MemoryPoolInfo`]: a serializable point-in-time snapshot of the pool
//!
//! The pool does no I/O and makes no policy decisions; it only maintains
//! accurate accounting and supplies the primitives the scheduler, the spill
//! subsystem, and the revocation policy build on.

mod error;
mod future;
mod info;
mod pool;
mod waiters;

pub mod listener;
pub mod metric_definitions;

pub use error::MemoryPoolError;
pub use future::MemoryFuture;
pub use info::MemoryPoolInfo;
pub use listener::MemoryPoolListener;
pub use pool::MemoryPool;

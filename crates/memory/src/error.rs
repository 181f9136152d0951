// Copyright (c) 2023 - 2026 Restate Software, Inc., Restate GmbH.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use bytestring::ByteString;

/// Programming errors surfaced by the memory pool.
///
/// Capacity pressure is not an error; it is communicated by a pending
/// [`MemoryFuture`](crate::MemoryFuture). Every variant here indicates a
/// caller bug: frees that exceed the recorded balance leave the ledger
/// untouched, and reservation futures can never be cancelled.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MemoryPoolError {
    #[error("tried to free more memory than is reserved by task")]
    FreeExceedsTaskReservation,
    #[error("tried to free more memory than is reserved by task for tag {tag}")]
    FreeExceedsTagReservation { tag: ByteString },
    #[error("tried to free more revocable memory than is reserved by task")]
    FreeRevocableExceedsTaskReservation,
    #[error("tried to free more revocable memory than is reserved")]
    FreeRevocableExceedsGlobalReservation,
    #[error("cancellation is not supported")]
    CancellationNotSupported,
}

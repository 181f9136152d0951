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

use bytestring::ByteString;
use serde::{Deserialize, Serialize};

use restate_query_types::QueryId;

/// Point-in-time snapshot of a pool's state, taken under a single lock
/// acquisition so all fields are mutually consistent. Serializable for
/// dashboards and the worker status endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryPoolInfo {
    pub capacity_bytes: u64,
    pub reserved_bytes: u64,
    pub reserved_revocable_bytes: u64,
    pub free_bytes: i64,
    pub blocked_reservations: usize,
    pub query_memory_reservations: HashMap<QueryId, u64>,
    pub query_revocable_memory_reservations: HashMap<QueryId, u64>,
    pub tagged_memory_allocations: HashMap<QueryId, HashMap<ByteString, u64>>,
}

// Copyright (c) 2023 - 2026 Restate Software, Inc., Restate GmbH.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use metrics::{Unit, describe_gauge, gauge};

pub const MEMORY_POOL_RESERVED_BYTES: &str = "restate.query.memory_pool.reserved_bytes";
pub const MEMORY_POOL_RESERVED_REVOCABLE_BYTES: &str =
    "restate.query.memory_pool.reserved_revocable_bytes";
pub const MEMORY_POOL_FREE_BYTES: &str = "restate.query.memory_pool.free_bytes";
pub const MEMORY_POOL_BLOCKED_RESERVATIONS: &str =
    "restate.query.memory_pool.blocked_reservations";

pub fn describe_metrics() {
    describe_gauge!(
        MEMORY_POOL_RESERVED_BYTES,
        Unit::Bytes,
        "Bytes reserved by non-revocable reservations"
    );

    describe_gauge!(
        MEMORY_POOL_RESERVED_REVOCABLE_BYTES,
        Unit::Bytes,
        "Bytes reserved by revocable reservations"
    );

    describe_gauge!(
        MEMORY_POOL_FREE_BYTES,
        Unit::Bytes,
        "Unreserved pool capacity, negative while the pool is over-subscribed"
    );

    describe_gauge!(
        MEMORY_POOL_BLOCKED_RESERVATIONS,
        Unit::Count,
        "Reservations whose completion future is blocked on free capacity"
    );
}

pub(crate) fn publish_pool_gauges(
    pool: &'static str,
    reserved_bytes: u64,
    reserved_revocable_bytes: u64,
    free_bytes: i64,
    blocked_reservations: usize,
) {
    gauge!(MEMORY_POOL_RESERVED_BYTES, "pool" => pool).set(reserved_bytes as f64);
    gauge!(MEMORY_POOL_RESERVED_REVOCABLE_BYTES, "pool" => pool)
        .set(reserved_revocable_bytes as f64);
    gauge!(MEMORY_POOL_FREE_BYTES, "pool" => pool).set(free_bytes as f64);
    gauge!(MEMORY_POOL_BLOCKED_RESERVATIONS, "pool" => pool).set(blocked_reservations as f64);
}

// Copyright (c) 2023 - 2026 Restate Software, Inc., Restate GmbH.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::num::NonZeroU64;

use serde::{Deserialize, Serialize};

use crate::byte_count::NonZeroByteCount;

/// # Memory pool options
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct MemoryPoolOptions {
    /// # Pool capacity
    ///
    /// The hard byte budget shared by all query tasks running on this worker.
    /// Reservations beyond this budget are queued until memory is returned.
    pub capacity: NonZeroByteCount,
}

impl Default for MemoryPoolOptions {
    fn default() -> Self {
        Self {
            // 4 GiB
            capacity: NonZeroByteCount::new(NonZeroU64::new(4 << 30).unwrap()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kebab_case_round_trip() {
        let options: MemoryPoolOptions = serde_json::from_str(r#"{"capacity": 1000}"#).unwrap();
        assert_eq!(options.capacity.as_u64(), 1000);
        assert_eq!(
            serde_json::to_string(&options).unwrap(),
            r#"{"capacity":1000}"#
        );
    }

    #[test]
    fn defaults() {
        let options = MemoryPoolOptions::default();
        assert_eq!(options.capacity.as_u64(), 4 << 30);
    }
}

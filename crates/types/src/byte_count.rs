// Copyright (c) 2023 - 2026 Restate Software, Inc., Restate GmbH.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Byte quantities with a human-readable display form.

use std::fmt;
use std::num::NonZeroU64;

const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];

/// A number of bytes. Displays in binary units (`1.5 MiB`), serializes as a
/// plain integer.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    derive_more::From,
    derive_more::Into,
    serde::Serialize,
    serde::Deserialize,
)]
#[serde(transparent)]
pub struct ByteCount(u64);

impl ByteCount {
    pub const fn new(bytes: u64) -> Self {
        Self(bytes)
    }

    pub const fn as_u64(self) -> u64 {
        self.0
    }

    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }
}

impl From<usize> for ByteCount {
    fn from(value: usize) -> Self {
        Self(value as u64)
    }
}

impl fmt::Display for ByteCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut value = self.0 as f64;
        let mut unit = 0;
        while value >= 1024.0 && unit < UNITS.len() - 1 {
            value /= 1024.0;
            unit += 1;
        }
        if unit == 0 {
            write!(f, "{} B", self.0)
        } else {
            write!(f, "{:.1} {}", value, UNITS[unit])
        }
    }
}

/// A strictly positive number of bytes, for configuration values where zero
/// would be meaningless (e.g. a pool capacity).
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    derive_more::From,
    derive_more::Into,
    serde::Serialize,
    serde::Deserialize,
)]
#[serde(transparent)]
pub struct NonZeroByteCount(NonZeroU64);

impl NonZeroByteCount {
    pub const fn new(bytes: NonZeroU64) -> Self {
        Self(bytes)
    }

    pub const fn get(self) -> NonZeroU64 {
        self.0
    }

    pub const fn as_u64(self) -> u64 {
        self.0.get()
    }
}

impl fmt::Display for NonZeroByteCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        ByteCount(self.0.get()).fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_units() {
        assert_eq!(ByteCount::new(0).to_string(), "0 B");
        assert_eq!(ByteCount::new(999).to_string(), "999 B");
        assert_eq!(ByteCount::new(1024).to_string(), "1.0 KiB");
        assert_eq!(ByteCount::new(1536).to_string(), "1.5 KiB");
        assert_eq!(ByteCount::new(10 * 1024 * 1024).to_string(), "10.0 MiB");
        assert_eq!(ByteCount::new(3 << 30).to_string(), "3.0 GiB");
    }

    #[test]
    fn serde_plain_integer() {
        assert_eq!(serde_json::to_string(&ByteCount::new(1024)).unwrap(), "1024");
        let parsed: NonZeroByteCount = serde_json::from_str("4096").unwrap();
        assert_eq!(parsed.as_u64(), 4096);
        assert!(serde_json::from_str::<NonZeroByteCount>("0").is_err());
    }
}

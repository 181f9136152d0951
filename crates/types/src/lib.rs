// Copyright (c) 2023 - 2026 Restate Software, Inc., Restate GmbH.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Core types shared by the query-engine worker components.

mod byte_count;

pub mod config;
pub mod identifiers;

pub use byte_count::{ByteCount, NonZeroByteCount};
pub use identifiers::{IdParseError, QueryId, StageId, TaskId};

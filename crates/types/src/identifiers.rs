// Copyright (c) 2023 - 2026 Restate Software, Inc., Restate GmbH.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Hierarchical identifiers for query execution.
//!
//! A query is split into stages, a stage into parallel tasks, and a failed
//! task may be retried under a new attempt number. The rendered form is
//! `query.stage.partition.attempt`, e.g. `20240817_093001_00123_abcde.2.17.0`.

use std::str::FromStr;

use bytestring::ByteString;

const ID_COMPONENT_SEPARATOR: char = '.';

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdParseError {
    #[error("id has an unexpected number of components")]
    Components,
    #[error("id component is empty or contains a separator")]
    Component,
    #[error("invalid index component")]
    Index(#[from] std::num::ParseIntError),
}

/// Identifies a single query on the cluster.
///
/// The pool treats this as opaque; it is the aggregation key for all
/// per-task accounting.
#[derive(
    Clone,
    PartialEq,
    Eq,
    Hash,
    derive_more::Display,
    derive_more::Debug,
    serde::Serialize,
    serde::Deserialize,
)]
#[display("{_0}")]
#[debug("{_0}")]
#[serde(transparent)]
pub struct QueryId(ByteString);

impl QueryId {
    pub fn new(id: impl Into<ByteString>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for QueryId {
    fn from(value: &str) -> Self {
        Self(ByteString::from(value))
    }
}

impl FromStr for QueryId {
    type Err = IdParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        if value.is_empty() || value.contains(ID_COMPONENT_SEPARATOR) {
            return Err(IdParseError::Component);
        }
        Ok(Self(ByteString::from(value)))
    }
}

/// Identifies one stage of a query plan.
#[derive(
    Clone,
    PartialEq,
    Eq,
    Hash,
    derive_more::Display,
    derive_more::Debug,
    serde::Serialize,
    serde::Deserialize,
)]
#[display("{query_id}.{stage}")]
#[debug("{query_id}.{stage}")]
pub struct StageId {
    query_id: QueryId,
    stage: u32,
}

impl StageId {
    pub fn new(query_id: impl Into<QueryId>, stage: u32) -> Self {
        Self {
            query_id: query_id.into(),
            stage,
        }
    }

    pub fn query_id(&self) -> &QueryId {
        &self.query_id
    }

    pub fn stage(&self) -> u32 {
        self.stage
    }
}

impl FromStr for StageId {
    type Err = IdParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let (query, stage) = value
            .rsplit_once(ID_COMPONENT_SEPARATOR)
            .ok_or(IdParseError::Components)?;
        Ok(Self {
            query_id: query.parse()?,
            stage: stage.parse()?,
        })
    }
}

/// Identifies one parallel task of a stage, including its retry attempt.
///
/// Tasks of the same query roll up into that query's totals; nothing beyond
/// [`TaskId::query_id`] is interpreted by the accounting layer.
#[derive(
    Clone,
    PartialEq,
    Eq,
    Hash,
    derive_more::Display,
    derive_more::Debug,
    serde::Serialize,
    serde::Deserialize,
)]
#[display("{stage_id}.{partition}.{attempt}")]
#[debug("{stage_id}.{partition}.{attempt}")]
pub struct TaskId {
    stage_id: StageId,
    partition: u32,
    attempt: u32,
}

impl TaskId {
    pub fn new(stage_id: StageId, partition: u32, attempt: u32) -> Self {
        Self {
            stage_id,
            partition,
            attempt,
        }
    }

    pub fn query_id(&self) -> &QueryId {
        self.stage_id.query_id()
    }

    pub fn stage_id(&self) -> &StageId {
        &self.stage_id
    }

    pub fn partition(&self) -> u32 {
        self.partition
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }
}

impl FromStr for TaskId {
    type Err = IdParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let mut components = value.rsplitn(3, ID_COMPONENT_SEPARATOR);
        // rsplitn yields attempt, partition, then the stage-id remainder.
        let attempt = components.next().ok_or(IdParseError::Components)?;
        let partition = components.next().ok_or(IdParseError::Components)?;
        let stage_id = components.next().ok_or(IdParseError::Components)?;
        Ok(Self {
            stage_id: stage_id.parse()?,
            partition: partition.parse()?,
            attempt: attempt.parse()?,
        })
    }
}

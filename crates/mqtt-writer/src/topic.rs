// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Topic decomposition into positional tags.
//!
//! A topic is split on `/`. Segment 0 is whatever precedes the first slash
//! (empty for the usual leading-slash topics), so the first named position
//! maps to segment 1:
//!
//! ```text
//! /sensors/room1/temp  ->  group=sensors, node=room1, type=temp
//! ```

use crate::error::IngestError;
use serde::{Deserialize, Serialize};

/// Ordered tag set derived from a topic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TopicTags {
    tags: Vec<(String, String)>,
}

impl TopicTags {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.tags.push((name.into(), value.into()));
    }

    /// Look up a tag value by name.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.tags
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.tags.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }
}

/// Fixed positional tag names, one per topic segment after segment 0.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TopicLayout {
    names: Vec<String>,
}

impl TopicLayout {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    /// Layout that extracts no tags and accepts every topic.
    pub fn none() -> Self {
        Self::default()
    }

    /// `group`, `node`, `type`.
    pub fn group_node_type() -> Self {
        Self::new(["group", "node", "type"])
    }

    /// Parse a comma-separated list of names (`"group,node,type"`).
    pub fn parse(list: &str) -> Self {
        Self::new(
            list.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty()),
        )
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Minimum number of `/`-separated segments a topic needs.
    pub fn required_segments(&self) -> usize {
        if self.names.is_empty() {
            0
        } else {
            self.names.len() + 1
        }
    }

    /// Split `topic` and assign the positional names.
    ///
    /// Segments beyond the layout are ignored.
    pub fn decompose(&self, topic: &str) -> Result<TopicTags, IngestError> {
        let mut tags = TopicTags::new();
        if self.names.is_empty() {
            return Ok(tags);
        }

        let segments: Vec<&str> = topic.split('/').collect();
        let required = self.required_segments();
        if segments.len() < required {
            return Err(IngestError::MalformedTopic {
                topic: topic.to_string(),
                required,
                found: segments.len(),
            });
        }

        for (name, value) in self.names.iter().zip(&segments[1..]) {
            tags.push(name.clone(), *value);
        }
        Ok(tags)
    }
}

//! Service object wire model.
//!
//! A service exposes named immutable revisions and a traffic split over
//! them. The spec traffic list is what the controller writes; the status
//! list and the latest-ready revision are what the platform reports back.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A revision's share of incoming traffic, or the floating latest marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct TrafficTarget {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub revision_name: String,
    #[serde(skip_serializing_if = "is_zero")]
    pub percent: i64,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub tag: String,
    /// When set, this target follows whatever revision is latest-ready.
    /// It carries no percent of its own.
    #[serde(skip_serializing_if = "is_false")]
    pub latest_revision: bool,
}

fn is_zero(p: &i64) -> bool {
    *p == 0
}

fn is_false(b: &bool) -> bool {
    !*b
}

impl TrafficTarget {
    /// A fixed assignment without a tag.
    pub fn fixed(revision: &str, percent: i64) -> Self {
        Self {
            revision_name: revision.to_string(),
            percent,
            ..Self::default()
        }
    }

    /// A fixed assignment carrying a tag.
    pub fn tagged(revision: &str, percent: i64, tag: &str) -> Self {
        Self {
            revision_name: revision.to_string(),
            percent,
            tag: tag.to_string(),
            ..Self::default()
        }
    }

    /// The latest-revision marker.
    pub fn latest(tag: &str) -> Self {
        Self {
            latest_revision: true,
            tag: tag.to_string(),
            ..Self::default()
        }
    }
}

/// Identity and controller-visible metadata of a service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct ObjectMeta {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub namespace: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
    /// Optimistic-concurrency token, when the platform provides one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_version: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}

/// The desired state the controller writes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct ServiceSpec {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub traffic: Vec<TrafficTarget>,
}

/// The observed state the platform reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct ServiceStatus {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub traffic: Vec<TrafficTarget>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub latest_ready_revision_name: String,
}

/// One service snapshot as read from (and written to) the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct Service {
    pub metadata: ObjectMeta,
    pub spec: ServiceSpec,
    pub status: ServiceStatus,
}

impl Service {
    /// `namespace/name`, the form used in logs.
    pub fn qualified_name(&self) -> String {
        format!("{}/{}", self.metadata.namespace, self.metadata.name)
    }

    pub fn annotation(&self, key: &str) -> Option<&str> {
        self.metadata.annotations.get(key).map(String::as_str)
    }

    pub fn set_annotation(&mut self, key: &str, value: impl Into<String>) {
        self.metadata.annotations.insert(key.to_string(), value.into());
    }

    pub fn remove_annotation(&mut self, key: &str) {
        self.metadata.annotations.remove(key);
    }
}

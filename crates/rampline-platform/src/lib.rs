//! rampline-platform — service objects and the platform API client.
//!
//! Models the managed platform's service resource (revisions, traffic
//! targets, annotations) and the read/replace client the controller drives
//! it through. The service object is the controller's only store: durable
//! rollout state lives in its annotation map.

pub mod client;
pub mod http;
pub mod mock;
pub mod service;

pub use client::{ClientError, ClientResult, PlatformClient};
pub use http::HttpPlatformClient;
pub use mock::MockPlatformClient;
pub use service::{ObjectMeta, Service, ServiceSpec, ServiceStatus, TrafficTarget};

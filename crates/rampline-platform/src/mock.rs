//! In-memory platform client for tests.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::client::{ClientError, ClientResult, PlatformClient};
use crate::service::Service;

/// Platform client holding services in memory.
///
/// `replace_service` stores the object and records it, so tests can assert
/// exactly what the controller wrote. Flipping `conflict_on_replace` makes
/// the next replacements fail with a write conflict.
#[derive(Default)]
pub struct MockPlatformClient {
    services: Mutex<BTreeMap<String, Service>>,
    replaced: Mutex<Vec<Service>>,
    conflict_on_replace: AtomicBool,
}

impl MockPlatformClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a service into the mock platform.
    pub async fn put(&self, svc: Service) {
        let key = svc.qualified_name();
        self.services.lock().await.insert(key, svc);
    }

    /// Services written via `replace_service`, in call order.
    pub async fn replaced(&self) -> Vec<Service> {
        self.replaced.lock().await.clone()
    }

    /// Make subsequent replacements fail with `ClientError::Conflict`.
    pub fn conflict_on_replace(&self, on: bool) {
        self.conflict_on_replace.store(on, Ordering::SeqCst);
    }
}

#[async_trait]
impl PlatformClient for MockPlatformClient {
    async fn get_service(&self, namespace: &str, name: &str) -> ClientResult<Service> {
        let key = format!("{namespace}/{name}");
        self.services
            .lock()
            .await
            .get(&key)
            .cloned()
            .ok_or(ClientError::NotFound(key))
    }

    async fn replace_service(
        &self,
        namespace: &str,
        name: &str,
        svc: &Service,
    ) -> ClientResult<Service> {
        let key = format!("{namespace}/{name}");
        if self.conflict_on_replace.load(Ordering::SeqCst) {
            return Err(ClientError::Conflict(key));
        }
        let mut services = self.services.lock().await;
        if !services.contains_key(&key) {
            return Err(ClientError::NotFound(key));
        }
        services.insert(key, svc.clone());
        self.replaced.lock().await.push(svc.clone());
        Ok(svc.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_service(namespace: &str, name: &str) -> Service {
        let mut svc = Service::default();
        svc.metadata.namespace = namespace.to_string();
        svc.metadata.name = name.to_string();
        svc
    }

    #[tokio::test]
    async fn get_returns_seeded_service() {
        let client = MockPlatformClient::new();
        client.put(test_service("default", "api")).await;

        let svc = client.get_service("default", "api").await.unwrap();
        assert_eq!(svc.qualified_name(), "default/api");

        let err = client.get_service("default", "other").await.unwrap_err();
        assert!(matches!(err, ClientError::NotFound(_)));
    }

    #[tokio::test]
    async fn replace_stores_and_records() {
        let client = MockPlatformClient::new();
        client.put(test_service("default", "api")).await;

        let mut updated = test_service("default", "api");
        updated.set_annotation("k", "v");
        client
            .replace_service("default", "api", &updated)
            .await
            .unwrap();

        let stored = client.get_service("default", "api").await.unwrap();
        assert_eq!(stored.annotation("k"), Some("v"));
        assert_eq!(client.replaced().await.len(), 1);
    }

    #[tokio::test]
    async fn conflict_mode_rejects_replacements() {
        let client = MockPlatformClient::new();
        client.put(test_service("default", "api")).await;
        client.conflict_on_replace(true);

        let err = client
            .replace_service("default", "api", &test_service("default", "api"))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Conflict(_)));
        assert!(client.replaced().await.is_empty());
    }
}

//! Workflow instance persistence boundary
//!
//! Instances are never deleted; terminal instances stay around for
//! history and statistics.

use crate::error::Result;
use crate::types::WorkflowInstance;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Instance persistence boundary
#[async_trait]
pub trait InstanceStore: Send + Sync {
    async fn get(&self, instance_id: &str) -> Result<Option<WorkflowInstance>>;

    /// Insert or replace an instance
    async fn put(&self, instance: WorkflowInstance) -> Result<()>;

    async fn list(&self) -> Result<Vec<WorkflowInstance>>;
}

/// In-memory instance store
pub struct InMemoryInstanceStore {
    inner: RwLock<HashMap<String, WorkflowInstance>>,
}

impl InMemoryInstanceStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryInstanceStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl InstanceStore for InMemoryInstanceStore {
    async fn get(&self, instance_id: &str) -> Result<Option<WorkflowInstance>> {
        let inner = self.inner.read().await;
        Ok(inner.get(instance_id).cloned())
    }

    async fn put(&self, instance: WorkflowInstance) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner.insert(instance.id.clone(), instance);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<WorkflowInstance>> {
        let inner = self.inner.read().await;
        Ok(inner.values().cloned().collect())
    }
}

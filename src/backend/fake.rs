//! In-memory backend used by tests.

use super::{BackendError, ProvisionBackend};
use crate::model::{NewProvision, ProvisionEdit, ProvisionEntity};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Call {
    Load(Option<String>),
    Remove(String),
    Edit(ProvisionEdit),
    Create(NewProvision),
}

#[derive(Default)]
pub(crate) struct FakeBackend {
    pub entities: Mutex<Vec<ProvisionEntity>>,
    pub calls: Mutex<Vec<Call>>,
    /// Error returned by the next mutation: `Some(msg)` becomes a server error
    /// carrying `msg`, `None` a server error without a message.
    pub fail_mutation: Mutex<Option<Option<String>>>,
    pub fail_loads: AtomicUsize,
    /// When set, loads take their snapshot and then wait for a permit.
    pub load_gate: Mutex<Option<Arc<Notify>>>,
    outstanding_loads: AtomicUsize,
    peak_loads: AtomicUsize,
}

impl FakeBackend {
    pub fn with_entities(entities: Vec<ProvisionEntity>) -> Self {
        Self {
            entities: Mutex::new(entities),
            ..Default::default()
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn load_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::Load(_)))
            .count()
    }

    /// Highest number of loads that were running at the same time.
    pub fn peak_loads(&self) -> usize {
        self.peak_loads.load(Ordering::SeqCst)
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn take_failure(&self) -> Result<(), BackendError> {
        match self.fail_mutation.lock().unwrap().take() {
            Some(message) => Err(BackendError::Server {
                status: 500,
                message,
            }),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ProvisionBackend for FakeBackend {
    async fn load_entities(
        &self,
        filter_id: Option<&str>,
    ) -> Result<Vec<ProvisionEntity>, BackendError> {
        self.record(Call::Load(filter_id.map(str::to_string)));
        if self
            .fail_loads
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(BackendError::Server {
                status: 503,
                message: None,
            });
        }
        let snapshot: Vec<ProvisionEntity> = self
            .entities
            .lock()
            .unwrap()
            .iter()
            .filter(|e| filter_id.map_or(true, |id| e.id == id))
            .cloned()
            .collect();

        let running = self.outstanding_loads.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_loads.fetch_max(running, Ordering::SeqCst);
        let gate = self.load_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        self.outstanding_loads.fetch_sub(1, Ordering::SeqCst);
        Ok(snapshot)
    }

    async fn remove_entity(&self, id: &str) -> Result<(), BackendError> {
        self.record(Call::Remove(id.to_string()));
        self.take_failure()?;
        self.entities.lock().unwrap().retain(|e| e.id != id);
        Ok(())
    }

    async fn edit_entity(&self, data: &ProvisionEdit) -> Result<(), BackendError> {
        self.record(Call::Edit(data.clone()));
        self.take_failure()
    }

    async fn create_entity(&self, data: &NewProvision) -> Result<(), BackendError> {
        self.record(Call::Create(data.clone()));
        self.take_failure()
    }
}

pub(crate) fn entity(id: &str, desired: crate::model::DesiredState) -> ProvisionEntity {
    ProvisionEntity {
        id: id.to_string(),
        tag: Some("1".into()),
        cluster_type: crate::model::ClusterType::Yarn,
        name: Some(format!("engine-{id}")),
        desired_state: desired,
        current_state: Some(crate::model::CurrentState::Running),
        dynamic_config: crate::model::DynamicConfig { container_count: 2 },
        memory_mb: Some(4096),
        virtual_core_count: Some(2),
        workers_summary: Some(crate::model::WorkersSummary {
            total: 2,
            active: 2,
            ..Default::default()
        }),
        error: None,
        detailed_error: None,
        containers: Some(serde_json::json!({ "runningList": [] })),
        extra: serde_json::Map::new(),
    }
}

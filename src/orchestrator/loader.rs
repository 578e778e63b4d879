use super::poller::SnapshotLoader;
use crate::backend::{BackendError, ProvisionBackend};
use crate::model::PageEvent;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;

/// Loads the provisions snapshot and publishes it, bracketed by view-state
/// transitions, to the presentation layer.
#[derive(Clone)]
pub(crate) struct ProvisionLoader {
    backend: Arc<dyn ProvisionBackend>,
    filter_id: Option<String>,
    event_tx: UnboundedSender<PageEvent>,
}

impl ProvisionLoader {
    pub fn new(
        backend: Arc<dyn ProvisionBackend>,
        filter_id: Option<String>,
        event_tx: UnboundedSender<PageEvent>,
    ) -> Self {
        Self {
            backend,
            filter_id,
            event_tx,
        }
    }
}

#[async_trait]
impl SnapshotLoader for ProvisionLoader {
    async fn load(&self) -> Result<(), BackendError> {
        let _ = self.event_tx.send(PageEvent::LoadStarted);
        match self.backend.load_entities(self.filter_id.as_deref()).await {
            Ok(entities) => {
                tracing::trace!(event = "provisions.loaded", count = entities.len());
                let _ = self.event_tx.send(PageEvent::LoadFinished(Ok(entities)));
                Ok(())
            }
            Err(e) => {
                let _ = self.event_tx.send(PageEvent::LoadFinished(Err(e.to_string())));
                Err(e)
            }
        }
    }
}

//! Create, edit, start/stop and remove operations.
//!
//! Every mutation follows `Idle → Confirming (destructive only) → Submitting →
//! Idle`. Success reloads the snapshot; failure becomes a user-visible
//! notification.

use super::loader::ProvisionLoader;
use super::poller::PollingController;
use crate::backend::{BackendError, ProvisionBackend};
use crate::model::{
    ClusterType, ConfirmDialog, DesiredState, MutationPhase, NewProvision, PageEvent,
    PendingAction, ProvisionEdit, ProvisionEntity, Severity,
};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;

pub const REMOVE_FAILED: &str = "Failed to remove provision";
pub const EDIT_FAILED: &str = "Failed to update provision";
pub const CREATE_FAILED: &str = "Failed to create provision";

pub(crate) fn remove_dialog() -> ConfirmDialog {
    ConfirmDialog {
        title: "Remove Engine".into(),
        body: vec!["Are you sure you want to remove this engine?".into()],
        confirm_label: "Remove".into(),
        cancel_label: None,
    }
}

pub(crate) fn stop_dialog() -> ConfirmDialog {
    ConfirmDialog {
        title: "Stop Engine".into(),
        body: vec![
            "Existing jobs will be halted.".into(),
            "Are you sure you want to stop the engine?".into(),
        ],
        confirm_label: "Stop Engine".into(),
        cancel_label: Some("Don't Stop Engine".into()),
    }
}

#[derive(Clone)]
pub(crate) struct PageActions {
    backend: Arc<dyn ProvisionBackend>,
    poller: PollingController<ProvisionLoader>,
    event_tx: UnboundedSender<PageEvent>,
    cluster_types: Vec<ClusterType>,
}

impl PageActions {
    pub fn new(
        backend: Arc<dyn ProvisionBackend>,
        poller: PollingController<ProvisionLoader>,
        event_tx: UnboundedSender<PageEvent>,
        cluster_types: Vec<ClusterType>,
    ) -> Self {
        Self {
            backend,
            poller,
            event_tx,
            cluster_types,
        }
    }

    fn emit(&self, ev: PageEvent) {
        let _ = self.event_tx.send(ev);
    }

    fn notify(&self, message: impl Into<String>, severity: Severity) {
        self.emit(PageEvent::Notify {
            message: message.into(),
            severity,
        });
    }

    fn request_confirmation(&self, dialog: ConfirmDialog, action: PendingAction) {
        self.emit(PageEvent::Mutation(MutationPhase::Confirming));
        self.emit(PageEvent::Confirm { dialog, action });
    }

    /// Ask for confirmation before removing `entity`.
    pub fn handle_remove(&self, entity: &ProvisionEntity) {
        self.request_confirmation(
            remove_dialog(),
            PendingAction::Remove {
                id: entity.id.clone(),
            },
        );
    }

    /// Request a new desired state. Stopping halts running jobs and therefore
    /// waits for confirmation; anything else is committed right away.
    pub async fn change_desired_state(&self, entity: &ProvisionEntity, desired: DesiredState) {
        let mut data = ProvisionEdit::from_entity(entity);
        data.desired_state = desired;

        if desired == DesiredState::Stopped {
            self.request_confirmation(stop_dialog(), PendingAction::Edit(data));
        } else {
            self.commit_edit(data).await;
        }
    }

    /// Run an action the user confirmed.
    pub async fn confirm(&self, action: PendingAction) {
        match action {
            PendingAction::Remove { id } => self.remove(&id).await,
            PendingAction::Edit(data) => self.commit_edit(data).await,
        }
    }

    /// The user dismissed a confirmation.
    pub fn cancel(&self) {
        self.emit(PageEvent::Mutation(MutationPhase::Idle));
    }

    pub async fn remove(&self, id: &str) {
        tracing::info!(event = "provision.remove.started", id = id);
        let res = self.submit(self.backend.remove_entity(id)).await;
        self.settle("provision.remove", res, REMOVE_FAILED).await;
    }

    pub async fn commit_edit(&self, data: ProvisionEdit) {
        tracing::info!(
            event = "provision.edit.started",
            id = %data.id,
            desired_state = data.desired_state.as_str()
        );
        let res = self.submit(self.backend.edit_entity(&data)).await;
        self.settle("provision.edit", res, EDIT_FAILED).await;
    }

    pub async fn create(&self, data: NewProvision) {
        tracing::info!(
            event = "provision.create.started",
            cluster_type = %data.cluster_type
        );
        let res = self.submit(self.backend.create_entity(&data)).await;
        self.settle("provision.create", res, CREATE_FAILED).await;
    }

    async fn submit(
        &self,
        call: impl std::future::Future<Output = Result<(), BackendError>>,
    ) -> Result<(), BackendError> {
        self.emit(PageEvent::Mutation(MutationPhase::Submitting));
        call.await
    }

    async fn settle(&self, op: &'static str, res: Result<(), BackendError>, fallback: &str) {
        self.emit(PageEvent::Mutation(MutationPhase::Idle));
        match res {
            Ok(()) => {
                tracing::info!(event = op, outcome = "completed");
                // Goes through the poller so it never overlaps a poll fetch.
                self.poller.refresh_after_settle().await;
            }
            Err(e) => {
                tracing::warn!(event = op, outcome = "failed", error = %e);
                let message = e.server_message().unwrap_or(fallback).to_string();
                self.notify(message, Severity::Error);
            }
        }
    }

    /// Open the create form. With a single configured cluster type the form
    /// opens directly for it; otherwise the user picks one first.
    pub fn open_create(&self) {
        let cluster_type = match self.cluster_types.as_slice() {
            [only] => Some(*only),
            _ => None,
        };
        self.emit(PageEvent::OpenCreate { cluster_type });
    }

    pub fn select_cluster_type(&self, cluster_type: ClusterType) {
        self.emit(PageEvent::OpenCreate {
            cluster_type: Some(cluster_type),
        });
    }

    pub fn open_edit(&self, entity: &ProvisionEntity) {
        self.emit(PageEvent::OpenEdit {
            id: entity.id.clone(),
            cluster_type: entity.cluster_type,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::fake::{entity, Call, FakeBackend};
    use crate::model::DynamicConfig;
    use std::time::Duration;
    use tokio::sync::mpsc::{self, UnboundedReceiver};
    use tokio::sync::Notify;

    fn actions(
        backend: Arc<FakeBackend>,
        cluster_types: Vec<ClusterType>,
    ) -> (PageActions, UnboundedReceiver<PageEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let loader = ProvisionLoader::new(backend.clone(), None, tx.clone());
        let poller = PollingController::new(loader, Duration::from_secs(3));
        (PageActions::new(backend, poller, tx, cluster_types), rx)
    }

    async fn settle() {
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }
    }

    fn drain(rx: &mut UnboundedReceiver<PageEvent>) -> Vec<PageEvent> {
        let mut out = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            out.push(ev);
        }
        out
    }

    fn notifications(events: &[PageEvent]) -> Vec<(String, Severity)> {
        events
            .iter()
            .filter_map(|ev| match ev {
                PageEvent::Notify { message, severity } => Some((message.clone(), *severity)),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn stopping_waits_for_confirmation() {
        let backend = Arc::new(FakeBackend::default());
        let (actions, mut rx) = actions(backend.clone(), vec![ClusterType::Yarn]);
        let e = entity("c1", DesiredState::Running);

        actions.change_desired_state(&e, DesiredState::Stopped).await;
        assert!(backend.calls().is_empty(), "nothing may be committed yet");

        let events = drain(&mut rx);
        let (dialog, action) = events
            .iter()
            .find_map(|ev| match ev {
                PageEvent::Confirm { dialog, action } => Some((dialog.clone(), action.clone())),
                _ => None,
            })
            .expect("confirmation requested");
        assert_eq!(dialog, stop_dialog());
        assert_eq!(dialog.cancel_label.as_deref(), Some("Don't Stop Engine"));

        actions.confirm(action).await;
        match &backend.calls()[0] {
            Call::Edit(data) => {
                assert_eq!(data.id, "c1");
                assert_eq!(data.desired_state, DesiredState::Stopped);
            }
            other => panic!("unexpected call {other:?}"),
        }
        // Success reloads.
        assert_eq!(backend.calls()[1], Call::Load(None));
    }

    #[tokio::test]
    async fn starting_commits_immediately() {
        let backend = Arc::new(FakeBackend::default());
        let (actions, mut rx) = actions(backend.clone(), vec![]);
        let e = entity("c1", DesiredState::Stopped);

        actions.change_desired_state(&e, DesiredState::Running).await;

        let events = drain(&mut rx);
        assert!(!events
            .iter()
            .any(|ev| matches!(ev, PageEvent::Confirm { .. })));
        assert!(matches!(
            &backend.calls()[0],
            Call::Edit(data) if data.desired_state == DesiredState::Running
        ));
        assert!(events
            .iter()
            .any(|ev| matches!(ev, PageEvent::Mutation(MutationPhase::Submitting))));
    }

    #[tokio::test]
    async fn remove_is_confirmed_then_reloads() {
        let backend = Arc::new(FakeBackend::with_entities(vec![entity(
            "c1",
            DesiredState::Running,
        )]));
        let (actions, mut rx) = actions(backend.clone(), vec![]);

        actions.handle_remove(&entity("c1", DesiredState::Running));
        assert!(backend.calls().is_empty());
        let action = drain(&mut rx)
            .into_iter()
            .find_map(|ev| match ev {
                PageEvent::Confirm { dialog, action } => {
                    assert_eq!(dialog.title, "Remove Engine");
                    assert_eq!(dialog.confirm_label, "Remove");
                    Some(action)
                }
                _ => None,
            })
            .unwrap();

        actions.confirm(action).await;
        assert_eq!(
            backend.calls(),
            vec![Call::Remove("c1".into()), Call::Load(None)]
        );
        let events = drain(&mut rx);
        assert!(events
            .iter()
            .any(|ev| matches!(ev, PageEvent::LoadFinished(Ok(list)) if list.is_empty())));
        assert!(notifications(&events).is_empty());
    }

    #[tokio::test]
    async fn remove_failure_uses_server_message() {
        let backend = Arc::new(FakeBackend::default());
        *backend.fail_mutation.lock().unwrap() = Some(Some("X".into()));
        let (actions, mut rx) = actions(backend.clone(), vec![]);

        actions.remove("c1").await;

        assert_eq!(
            notifications(&drain(&mut rx)),
            vec![("X".to_string(), Severity::Error)]
        );
        assert_eq!(backend.load_count(), 0);
    }

    #[tokio::test]
    async fn remove_failure_without_message_uses_fallback() {
        let backend = Arc::new(FakeBackend::default());
        *backend.fail_mutation.lock().unwrap() = Some(None);
        let (actions, mut rx) = actions(backend.clone(), vec![]);

        actions.remove("c1").await;

        assert_eq!(
            notifications(&drain(&mut rx)),
            vec![(REMOVE_FAILED.to_string(), Severity::Error)]
        );
    }

    #[tokio::test]
    async fn create_failure_and_success() {
        let backend = Arc::new(FakeBackend::default());
        let (actions, mut rx) = actions(backend.clone(), vec![]);
        let data = NewProvision {
            cluster_type: ClusterType::Yarn,
            name: None,
            desired_state: DesiredState::Running,
            dynamic_config: DynamicConfig { container_count: 1 },
            memory_mb: None,
            virtual_core_count: None,
        };

        *backend.fail_mutation.lock().unwrap() = Some(None);
        actions.create(data.clone()).await;
        assert_eq!(
            notifications(&drain(&mut rx)),
            vec![(CREATE_FAILED.to_string(), Severity::Error)]
        );

        actions.create(data.clone()).await;
        assert_eq!(
            backend.calls(),
            vec![
                Call::Create(data.clone()),
                Call::Create(data),
                Call::Load(None),
            ]
        );
    }

    #[tokio::test]
    async fn open_create_preselects_single_cluster_type() {
        let backend = Arc::new(FakeBackend::default());
        let (single, mut rx) = actions(backend.clone(), vec![ClusterType::Yarn]);
        single.open_create();
        assert!(matches!(
            rx.try_recv().unwrap(),
            PageEvent::OpenCreate {
                cluster_type: Some(ClusterType::Yarn)
            }
        ));

        let (many, mut rx) = actions(backend, vec![ClusterType::Yarn, ClusterType::Ec2]);
        many.open_create();
        assert!(matches!(
            rx.try_recv().unwrap(),
            PageEvent::OpenCreate { cluster_type: None }
        ));
        many.select_cluster_type(ClusterType::Ec2);
        assert!(matches!(
            rx.try_recv().unwrap(),
            PageEvent::OpenCreate {
                cluster_type: Some(ClusterType::Ec2)
            }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn reload_after_remove_waits_for_running_poll() {
        let backend = Arc::new(FakeBackend::with_entities(vec![entity(
            "a",
            DesiredState::Running,
        )]));
        let gate = Arc::new(Notify::new());
        *backend.load_gate.lock().unwrap() = Some(gate.clone());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let loader = ProvisionLoader::new(backend.clone(), None, tx.clone());
        let poller = PollingController::new(loader, Duration::from_secs(3));
        let actions = PageActions::new(backend.clone(), poller.clone(), tx, vec![]);

        poller.start(true);
        settle().await;
        actions.remove("a").await;
        assert_eq!(backend.load_count(), 1);

        gate.notify_one();
        settle().await;
        gate.notify_one();
        settle().await;
        assert_eq!(backend.load_count(), 2);
        assert_eq!(backend.peak_loads(), 1);

        // The snapshot taken after the removal is published last.
        let snapshots: Vec<Vec<ProvisionEntity>> = drain(&mut rx)
            .into_iter()
            .filter_map(|ev| match ev {
                PageEvent::LoadFinished(Ok(list)) => Some(list),
                _ => None,
            })
            .collect();
        assert_eq!(snapshots.len(), 2);
        assert_eq!(snapshots[0].len(), 1);
        assert!(snapshots[1].is_empty());
    }
}

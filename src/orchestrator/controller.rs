//! Page lifecycle controller.
//!
//! Owns the polling controller and the mutation operations for one console
//! session and turns UI commands into backend calls.

use super::loader::ProvisionLoader;
use super::mutations::PageActions;
use super::poller::PollingController;
use crate::backend::ProvisionBackend;
use crate::model::{
    ClusterType, DesiredState, NewProvision, PageConfig, PageEvent, PendingAction, ProvisionEdit,
    ProvisionEntity, Severity,
};
use anyhow::Result;
use std::sync::Arc;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

const REFRESH_SKIPPED: &str = "Already refreshing";

/// Commands emitted by UI layers.
#[derive(Debug, Clone)]
pub(crate) enum UiCommand {
    Refresh,
    OpenCreate,
    SelectClusterType(ClusterType),
    OpenEdit(Box<ProvisionEntity>),
    RequestRemove(Box<ProvisionEntity>),
    ChangeState {
        entity: Box<ProvisionEntity>,
        desired: DesiredState,
    },
    Confirm(PendingAction),
    CancelConfirm,
    Create(NewProvision),
    SaveEdit(ProvisionEdit),
    Quit,
}

/// Everything a page session needs, wired to one event channel.
pub(crate) struct PageSession {
    pub poller: PollingController<ProvisionLoader>,
    pub actions: PageActions,
    event_tx: UnboundedSender<PageEvent>,
}

impl PageSession {
    pub fn new(
        cfg: &PageConfig,
        backend: Arc<dyn ProvisionBackend>,
        filter_id: Option<String>,
        event_tx: UnboundedSender<PageEvent>,
    ) -> Self {
        let loader = ProvisionLoader::new(backend.clone(), filter_id, event_tx.clone());
        let poller = PollingController::new(loader, cfg.poll_interval);
        let actions = PageActions::new(
            backend,
            poller.clone(),
            event_tx.clone(),
            cfg.cluster_types.clone(),
        );
        Self {
            poller,
            actions,
            event_tx,
        }
    }

    /// Manual refresh. Tells the user when it was skipped because a fetch is
    /// already running or polling has stopped.
    pub fn refresh(&self) {
        if !self.poller.start(false) {
            let _ = self.event_tx.send(PageEvent::Notify {
                message: REFRESH_SKIPPED.into(),
                severity: Severity::Info,
            });
        }
    }
}

/// Serve UI commands until the UI quits or drops its sender.
pub(crate) async fn run_controller(
    cfg: &PageConfig,
    backend: Arc<dyn ProvisionBackend>,
    event_tx: UnboundedSender<PageEvent>,
    mut cmd_rx: UnboundedReceiver<UiCommand>,
) -> Result<()> {
    let session = PageSession::new(cfg, backend, None, event_tx);
    session.poller.start(true);
    tracing::info!(
        event = "page.started",
        base_url = %cfg.base_url,
        poll_interval_ms = cfg.poll_interval.as_millis() as u64
    );

    while let Some(cmd) = cmd_rx.recv().await {
        let actions = session.actions.clone();
        match cmd {
            UiCommand::Refresh => session.refresh(),
            UiCommand::OpenCreate => actions.open_create(),
            UiCommand::SelectClusterType(ct) => actions.select_cluster_type(ct),
            UiCommand::OpenEdit(entity) => actions.open_edit(&entity),
            UiCommand::RequestRemove(entity) => actions.handle_remove(&entity),
            UiCommand::CancelConfirm => actions.cancel(),
            // Submissions run off the command loop so the UI keeps getting answers.
            UiCommand::ChangeState { entity, desired } => {
                tokio::spawn(async move { actions.change_desired_state(&entity, desired).await });
            }
            UiCommand::Confirm(action) => {
                tokio::spawn(async move { actions.confirm(action).await });
            }
            UiCommand::Create(data) => {
                tokio::spawn(async move { actions.create(data).await });
            }
            UiCommand::SaveEdit(data) => {
                tokio::spawn(async move { actions.commit_edit(data).await });
            }
            UiCommand::Quit => break,
        }
    }

    session.poller.teardown();
    tracing::info!(event = "page.stopped");
    Ok(())
}

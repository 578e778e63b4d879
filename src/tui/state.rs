use super::form::FormState;
use crate::model::{
    local_clock, ClusterType, ConfirmDialog, MutationPhase, PageEvent, PendingAction,
    ProvisionEntity, Severity, ViewState,
};

/// Which body the engines tab shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    /// Nothing provisioned: offer the cluster types. `loading` is set only
    /// while the very first fetch is outstanding.
    InitialSetup { loading: bool },
    List,
}

/// Only one overlay can be open at a time.
#[derive(Debug, Clone, Default)]
pub enum Dialog {
    #[default]
    None,
    Confirm {
        dialog: ConfirmDialog,
        action: PendingAction,
    },
    PickClusterType { selected: usize },
    Form(FormState),
}

impl Dialog {
    pub fn is_open(&self) -> bool {
        !matches!(self, Dialog::None)
    }
}

pub struct UiState {
    pub tab: usize,
    pub provisions: Vec<ProvisionEntity>,
    pub view_state: ViewState,
    /// True until the first fetch settles; later polls must not flicker.
    pub first_load: bool,
    pub selected: usize,
    pub setup_selected: usize,
    pub cluster_types: Vec<ClusterType>,
    pub dialog: Dialog,
    pub mutation: MutationPhase,
    pub info: String,
    pub info_severity: Severity,
    pub last_refreshed: Option<String>,
}

impl UiState {
    pub fn new(cluster_types: Vec<ClusterType>) -> Self {
        Self {
            tab: 0,
            provisions: Vec::new(),
            view_state: ViewState::default(),
            first_load: true,
            selected: 0,
            setup_selected: 0,
            cluster_types,
            dialog: Dialog::None,
            mutation: MutationPhase::Idle,
            info: String::new(),
            info_severity: Severity::Info,
            last_refreshed: None,
        }
    }

    pub fn has_provisions(&self) -> bool {
        !self.provisions.is_empty()
    }

    pub fn screen(&self) -> Screen {
        if self.has_provisions() {
            Screen::List
        } else {
            Screen::InitialSetup {
                loading: self.first_load && self.view_state.is_in_progress,
            }
        }
    }

    pub fn selected_entity(&self) -> Option<&ProvisionEntity> {
        self.provisions.get(self.selected)
    }

    pub fn select_prev(&mut self) {
        match self.screen() {
            Screen::List => self.selected = self.selected.saturating_sub(1),
            Screen::InitialSetup { .. } => {
                self.setup_selected = self.setup_selected.saturating_sub(1)
            }
        }
    }

    pub fn select_next(&mut self) {
        match self.screen() {
            Screen::List => {
                self.selected = (self.selected + 1).min(self.provisions.len().saturating_sub(1))
            }
            Screen::InitialSetup { .. } => {
                self.setup_selected =
                    (self.setup_selected + 1).min(self.cluster_types.len().saturating_sub(1))
            }
        }
    }

    pub fn set_info(&mut self, message: impl Into<String>, severity: Severity) {
        self.info = message.into();
        self.info_severity = severity;
    }

    pub fn apply_event(&mut self, ev: PageEvent) {
        match ev {
            PageEvent::LoadStarted => self.view_state.started(),
            PageEvent::LoadFinished(Ok(provisions)) => {
                // Keep the cursor on the same engine when it is still there.
                let selected_id = self.selected_entity().map(|e| e.id.clone());
                self.provisions = provisions;
                self.selected = selected_id
                    .and_then(|id| self.provisions.iter().position(|e| e.id == id))
                    .unwrap_or(self.selected)
                    .min(self.provisions.len().saturating_sub(1));
                self.view_state.succeeded();
                self.first_load = false;
                self.last_refreshed = Some(local_clock());
            }
            PageEvent::LoadFinished(Err(e)) => {
                self.view_state.failed(e);
                self.first_load = false;
            }
            PageEvent::Notify { message, severity } => self.set_info(message, severity),
            PageEvent::Confirm { dialog, action } => {
                self.dialog = Dialog::Confirm { dialog, action };
            }
            PageEvent::OpenCreate {
                cluster_type: Some(ct),
            } => {
                self.dialog = Dialog::Form(FormState::create(ct));
            }
            PageEvent::OpenCreate { cluster_type: None } => {
                self.dialog = Dialog::PickClusterType { selected: 0 };
            }
            PageEvent::OpenEdit { id, .. } => match self.provisions.iter().find(|e| e.id == id) {
                Some(entity) => self.dialog = Dialog::Form(FormState::edit(entity)),
                None => self.set_info(
                    format!("Engine {id} is no longer available"),
                    Severity::Warning,
                ),
            },
            PageEvent::Mutation(phase) => {
                self.mutation = phase;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::fake::entity;
    use crate::model::DesiredState;

    fn state() -> UiState {
        UiState::new(vec![ClusterType::Yarn, ClusterType::Ec2])
    }

    #[test]
    fn first_load_in_progress_shows_setup_with_spinner() {
        let mut s = state();
        s.apply_event(PageEvent::LoadStarted);
        assert_eq!(s.screen(), Screen::InitialSetup { loading: true });

        s.apply_event(PageEvent::LoadFinished(Ok(vec![])));
        assert_eq!(s.screen(), Screen::InitialSetup { loading: false });

        // Later polls never bring the spinner back.
        s.apply_event(PageEvent::LoadStarted);
        assert_eq!(s.screen(), Screen::InitialSetup { loading: false });
    }

    #[test]
    fn data_switches_to_list_and_failures_keep_snapshot() {
        let mut s = state();
        s.apply_event(PageEvent::LoadStarted);
        s.apply_event(PageEvent::LoadFinished(Ok(vec![entity(
            "a",
            DesiredState::Running,
        )])));
        assert_eq!(s.screen(), Screen::List);
        assert!(s.last_refreshed.is_some());

        s.apply_event(PageEvent::LoadStarted);
        s.apply_event(PageEvent::LoadFinished(Err("timeout".into())));
        assert_eq!(s.screen(), Screen::List);
        assert_eq!(s.view_state.error.as_deref(), Some("timeout"));
        assert!(!s.view_state.is_in_progress);
    }

    #[test]
    fn selection_follows_entity_across_refreshes() {
        let mut s = state();
        s.apply_event(PageEvent::LoadFinished(Ok(vec![
            entity("a", DesiredState::Running),
            entity("b", DesiredState::Running),
            entity("c", DesiredState::Running),
        ])));
        s.select_next();
        s.select_next();
        s.select_next();
        assert_eq!(s.selected_entity().unwrap().id, "c");

        s.apply_event(PageEvent::LoadFinished(Ok(vec![
            entity("c", DesiredState::Running),
            entity("a", DesiredState::Running),
        ])));
        assert_eq!(s.selected_entity().unwrap().id, "c");

        s.apply_event(PageEvent::LoadFinished(Ok(vec![entity(
            "a",
            DesiredState::Running,
        )])));
        assert_eq!(s.selected_entity().unwrap().id, "a");
    }

    #[test]
    fn dialogs_open_from_events() {
        let mut s = state();
        s.apply_event(PageEvent::LoadFinished(Ok(vec![entity(
            "a",
            DesiredState::Running,
        )])));

        s.apply_event(PageEvent::OpenCreate { cluster_type: None });
        assert!(matches!(s.dialog, Dialog::PickClusterType { selected: 0 }));

        s.apply_event(PageEvent::OpenEdit {
            id: "a".into(),
            cluster_type: ClusterType::Yarn,
        });
        assert!(matches!(&s.dialog, Dialog::Form(f) if f.title() == "Edit engine-a"));

        s.dialog = Dialog::None;
        s.apply_event(PageEvent::OpenEdit {
            id: "gone".into(),
            cluster_type: ClusterType::Yarn,
        });
        assert!(!s.dialog.is_open());
        assert_eq!(s.info_severity, Severity::Warning);
    }
}

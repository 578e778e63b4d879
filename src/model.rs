use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Runtime configuration for one console session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageConfig {
    pub base_url: String,
    #[serde(with = "humantime_serde")]
    pub poll_interval: Duration,
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
    pub cluster_types: Vec<ClusterType>,
    #[serde(skip)]
    pub token: Option<String>,
    pub user_agent: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClusterType {
    Yarn,
    Ec2,
    Kubernetes,
    #[serde(other)]
    #[value(skip)]
    Unknown,
}

impl ClusterType {
    pub fn label(self) -> &'static str {
        match self {
            ClusterType::Yarn => "YARN",
            ClusterType::Ec2 => "Amazon EC2",
            ClusterType::Kubernetes => "Kubernetes",
            ClusterType::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for ClusterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Target state requested by the user; reconciled server-side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DesiredState {
    Running,
    Stopped,
    Deleted,
    /// A value this client does not know. Never written back.
    #[serde(other)]
    Unknown,
}

impl DesiredState {
    pub fn as_str(self) -> &'static str {
        match self {
            DesiredState::Running => "RUNNING",
            DesiredState::Stopped => "STOPPED",
            DesiredState::Deleted => "DELETED",
            DesiredState::Unknown => "UNKNOWN",
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, DesiredState::Unknown)
    }

    /// The state a start/stop toggle moves to.
    pub fn toggled(self) -> DesiredState {
        match self {
            DesiredState::Running => DesiredState::Stopped,
            DesiredState::Stopped | DesiredState::Deleted | DesiredState::Unknown => {
                DesiredState::Running
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CurrentState {
    Created,
    Starting,
    Running,
    Stopping,
    Stopped,
    Failed,
    Deleted,
    #[serde(other)]
    Unknown,
}

impl CurrentState {
    pub fn as_str(self) -> &'static str {
        match self {
            CurrentState::Created => "CREATED",
            CurrentState::Starting => "STARTING",
            CurrentState::Running => "RUNNING",
            CurrentState::Stopping => "STOPPING",
            CurrentState::Stopped => "STOPPED",
            CurrentState::Failed => "FAILED",
            CurrentState::Deleted => "DELETED",
            CurrentState::Unknown => "UNKNOWN",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DynamicConfig {
    #[serde(default)]
    pub container_count: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WorkersSummary {
    pub total: u32,
    pub active: u32,
    pub pending: u32,
    pub disconnected: u32,
    pub decommissioning: u32,
}

/// A provisioned engine cluster as reported by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvisionEntity {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    pub cluster_type: ClusterType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub desired_state: DesiredState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_state: Option<CurrentState>,
    #[serde(default)]
    pub dynamic_config: DynamicConfig,
    #[serde(default, rename = "memoryMB", skip_serializing_if = "Option::is_none")]
    pub memory_mb: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub virtual_core_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workers_summary: Option<WorkersSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detailed_error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub containers: Option<serde_json::Value>,
    /// Server fields this client does not model, sent back untouched on edit.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ProvisionEntity {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }

    /// "current / desired", or just the desired state before the server reports one.
    pub fn state_label(&self) -> String {
        match self.current_state {
            Some(current) if current.as_str() != self.desired_state.as_str() => {
                format!("{} → {}", current.as_str(), self.desired_state.as_str())
            }
            Some(current) => current.as_str().to_string(),
            None => self.desired_state.as_str().to_string(),
        }
    }

    pub fn workers_label(&self) -> String {
        match &self.workers_summary {
            Some(w) if w.pending > 0 => {
                format!("{}/{} ({} pending)", w.active, w.total, w.pending)
            }
            Some(w) => format!("{}/{}", w.active, w.total),
            None => "-".to_string(),
        }
    }
}

/// Write form of [`ProvisionEntity`] with the server-computed fields removed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvisionEdit {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    pub cluster_type: ClusterType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "DesiredState::is_unknown")]
    pub desired_state: DesiredState,
    #[serde(default)]
    pub dynamic_config: DynamicConfig,
    #[serde(default, rename = "memoryMB", skip_serializing_if = "Option::is_none")]
    pub memory_mb: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub virtual_core_count: Option<u32>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ProvisionEdit {
    /// Copy the writable fields of `entity`; workers summary, containers,
    /// current state and errors are read-only and never sent back.
    pub fn from_entity(entity: &ProvisionEntity) -> Self {
        Self {
            id: entity.id.clone(),
            tag: entity.tag.clone(),
            cluster_type: entity.cluster_type,
            name: entity.name.clone(),
            desired_state: entity.desired_state,
            dynamic_config: entity.dynamic_config.clone(),
            memory_mb: entity.memory_mb,
            virtual_core_count: entity.virtual_core_count,
            extra: entity.extra.clone(),
        }
    }
}

/// Payload of the create form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProvision {
    pub cluster_type: ClusterType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub desired_state: DesiredState,
    pub dynamic_config: DynamicConfig,
    #[serde(default, rename = "memoryMB", skip_serializing_if = "Option::is_none")]
    pub memory_mb: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub virtual_core_count: Option<u32>,
}

/// Loading/error status of the provisions view.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewState {
    pub is_in_progress: bool,
    pub error: Option<String>,
}

impl ViewState {
    pub fn started(&mut self) {
        self.is_in_progress = true;
    }

    pub fn succeeded(&mut self) {
        self.is_in_progress = false;
        self.error = None;
    }

    pub fn failed(&mut self, message: String) {
        self.is_in_progress = false;
        self.error = Some(message);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

/// Text of a confirmation prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmDialog {
    pub title: String,
    pub body: Vec<String>,
    pub confirm_label: String,
    pub cancel_label: Option<String>,
}

/// A commit deferred until the user confirms it.
#[derive(Debug, Clone, PartialEq)]
pub enum PendingAction {
    Remove { id: String },
    Edit(ProvisionEdit),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MutationPhase {
    #[default]
    Idle,
    Confirming,
    Submitting,
}

/// Events emitted by the controller and consumed by UI/CLI layers.
#[derive(Debug, Clone)]
pub enum PageEvent {
    LoadStarted,
    LoadFinished(Result<Vec<ProvisionEntity>, String>),
    Notify {
        message: String,
        severity: Severity,
    },
    Confirm {
        dialog: ConfirmDialog,
        action: PendingAction,
    },
    OpenCreate { cluster_type: Option<ClusterType> },
    OpenEdit {
        id: String,
        cluster_type: ClusterType,
    },
    Mutation(MutationPhase),
}

/// Wall-clock time of day, local when the offset is known, for "last refreshed" stamps.
pub fn local_clock() -> String {
    let format = time::macros::format_description!("[hour]:[minute]:[second]");
    let now = time::OffsetDateTime::now_local()
        .unwrap_or_else(|_| time::OffsetDateTime::now_utc());
    now.format(format).unwrap_or_default()
}

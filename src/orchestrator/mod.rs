//! Page orchestration.
//!
//! This module owns the polling loop, snapshot loading and the mutation
//! operations. UI/CLI layers talk to it through [`UiCommand`]s and consume the
//! [`PageEvent`](crate::model::PageEvent)s it emits.

mod controller;
mod loader;
mod mutations;
mod poller;

pub(crate) use controller::{run_controller, PageSession, UiCommand};
pub(crate) use poller::PROVISION_POLL_INTERVAL;

#[cfg(test)]
pub(crate) use mutations::remove_dialog;

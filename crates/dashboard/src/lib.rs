#![deny(unsafe_code)]

/// Orchestration of the dashboard flows over one remote store.
pub mod app;
/// Chat domain: messages, the send flow, list paging, confirmations and rendering.
pub mod chat;
/// Terminal line parsing for the `skytorch` binary.
pub mod command;
pub mod session;
/// Settings loading.
pub mod settings;
/// Background connection/usage indicator.
pub mod status;

#[cfg(test)]
mod testing;

pub use app::{Dashboard, DashboardOptions, Outcome};
pub use session::SessionContext;
pub use status::{ConnectionStatusMonitor, MonitorHandle, StatusBoard};

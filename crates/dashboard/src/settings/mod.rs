pub mod state;

pub use state::{Settings, SettingsError};

//! egui/eframe user interface
//!
//! `AppState` holds the session; the components render it and call back
//! into it.

mod app;
pub mod components;
mod state;
mod theme;

pub use app::MultirecApp;
pub use components::{ActivityPanel, SlotCard, UploadBar, Waveform};
pub use state::{ActivityLog, AppState, ACTIVITY_LOG_CAPACITY};
pub use theme::Theme;

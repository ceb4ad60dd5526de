//! Terminal user interface
//!
//! Ratatui front end over the same data layer the CLI commands use. A
//! background task owns the store handle; panes talk to it over channels.

mod app;
mod auth_view;
mod backend;
mod compose;
mod debug_log;
mod help;
mod log_capture;
mod messages;
mod picker;
mod sidebar;
mod ui;

pub use app::run;
pub use log_capture::LogBuffer;

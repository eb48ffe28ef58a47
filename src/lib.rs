// ABOUTME: Notch-anchored hover panel and focused-application menu bar mirroring
// ABOUTME: Exposes the panel state machine, the menu resolver, and the host that wires them to the OS

pub mod animation;
pub mod app;
pub mod config;
pub mod geometry;
pub mod layout;
pub mod menu;
pub mod panel;
pub mod platform;

pub use app::App;
pub use config::Config;

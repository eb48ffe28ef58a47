// ABOUTME: Platform abstraction layer: capability traits for pointer, screen, focus, and accessibility menus
// ABOUTME: The panel controller and menu resolver only see these traits, so both run against fakes in tests

use crate::geometry::{Point, ScreenMetrics};
use crate::menu::ProcessIdentity;
use anyhow::Result;
use std::sync::Arc;

#[cfg(target_os = "macos")]
pub mod macos;
#[cfg(any(target_os = "linux", target_os = "freebsd"))]
pub mod unix;

/// Current pointer position in screen coordinates.
pub trait PointerProbe: Send + Sync {
    /// `None` when the position cannot be read; callers treat that as "outside".
    fn pointer_location(&self) -> Option<Point>;
}

/// Geometry of the display the panel is anchored to.
pub trait ScreenInfoProvider: Send + Sync {
    fn screen_metrics(&self) -> ScreenMetrics;
}

/// The application that currently owns keyboard focus.
pub trait FocusProbe: Send + Sync {
    fn frontmost_process(&self) -> Option<ProcessIdentity>;
}

/// Delivers pending window-system events to this process.
///
/// Called from the runtime thread before focus and screen reads so that
/// values the OS pushes asynchronously are current when they are read.
pub trait EventPump: Send + Sync {
    fn pump_events(&self);
}

/// Attributes read off a single menu element.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ElementAttributes {
    pub title: String,
    pub enabled: Option<bool>,
    pub command_char: Option<String>,
    /// Raw accessibility modifier mask, see `KeyModifiers::from_ax_mask`.
    pub command_modifiers: Option<i64>,
}

/// Read access to another process's menu bar through the accessibility layer.
///
/// Every method may block and is only ever called from a blocking worker.
/// Elements are non-owning references that go stale when their process
/// exits; implementations report stale elements as empty or `None`.
pub trait MenuSource: Send + Sync + 'static {
    type Element: Clone + Send + Sync + 'static;

    /// Top-level menu bar items, including the leading application menu.
    fn menu_bar_items(&self, process: &ProcessIdentity) -> Vec<Self::Element>;

    fn children(&self, element: &Self::Element) -> Vec<Self::Element>;

    /// `None` when the element has no readable title.
    fn attributes(&self, element: &Self::Element) -> Option<ElementAttributes>;

    /// Performs the element's press action. `false` when the OS refused it.
    fn press(&self, element: &Self::Element) -> bool;
}

/// The set of capabilities the host wires together.
pub struct PlatformServices<S: MenuSource> {
    pub pointer: Arc<dyn PointerProbe>,
    pub screens: Arc<dyn ScreenInfoProvider>,
    pub focus: Arc<dyn FocusProbe>,
    pub events: Arc<dyn EventPump>,
    pub menus: Arc<S>,
}

#[cfg(target_os = "macos")]
pub type NativeMenuSource = macos::AccessibilityMenuSource;

#[cfg(any(target_os = "linux", target_os = "freebsd"))]
pub type NativeMenuSource = unix::EmptyMenuSource;

/// Platform factory to get the appropriate implementations
pub struct Platform;

impl Platform {
    #[cfg(target_os = "macos")]
    pub fn connect() -> Result<PlatformServices<NativeMenuSource>> {
        macos::connect()
    }

    #[cfg(any(target_os = "linux", target_os = "freebsd"))]
    pub fn connect() -> Result<PlatformServices<NativeMenuSource>> {
        unix::connect()
    }
}

// ABOUTME: macOS implementations of the pointer, screen, focus, and menu capabilities
// ABOUTME: AppKit supplies pointer, screen, and frontmost-app queries; menus come from the Accessibility API

pub mod accessibility;

pub use accessibility::{AccessibilityMenuSource, AxElement};

use super::{EventPump, FocusProbe, PlatformServices, PointerProbe, ScreenInfoProvider};
use crate::geometry::{Point, Rect, ScreenMetrics};
use crate::menu::ProcessIdentity;
use anyhow::{Context, Result};
use objc2::MainThreadMarker;
use objc2_app_kit::{NSApplication, NSEvent, NSScreen, NSWorkspace};
use objc2_core_foundation::CFString;
use objc2_foundation::NSRect;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

#[link(name = "CoreFoundation", kind = "framework")]
unsafe extern "C" {
    static kCFRunLoopDefaultMode: *const CFString;
    fn CFRunLoopRunInMode(
        mode: *const CFString,
        seconds: f64,
        return_after_source_handled: bool,
    ) -> i32;
}

/// Must run on the main thread, which also has to drive the tokio runtime:
/// AppKit state is only refreshed when that thread's run loop is pumped.
pub fn connect() -> Result<PlatformServices<AccessibilityMenuSource>> {
    let mtm = MainThreadMarker::new().context("AppKit must be initialized on the main thread")?;
    // Connects the process to the window server so workspace and screen
    // notifications are delivered to the main run loop.
    let _app = NSApplication::sharedApplication(mtm);

    if !accessibility::is_trusted() {
        warn!(
            "Accessibility access has not been granted; menus will stay empty until it is enabled in System Settings > Privacy & Security > Accessibility"
        );
    }

    let screens = Arc::new(MacOSScreens::default());
    info!(screen = ?screens.screen_metrics(), "connected to AppKit");

    Ok(PlatformServices {
        pointer: Arc::new(MacOSPointer),
        screens,
        focus: Arc::new(MacOSFocus::default()),
        events: Arc::new(MacOSRunLoop),
        menus: Arc::new(AccessibilityMenuSource::new()),
    })
}

pub struct MacOSPointer;

impl PointerProbe for MacOSPointer {
    fn pointer_location(&self) -> Option<Point> {
        let location = unsafe { NSEvent::mouseLocation() };
        Some(Point::new(location.x, location.y))
    }
}

/// Main screen geometry. AppKit only answers on the main thread, so other
/// threads get the last value read there.
#[derive(Default)]
pub struct MacOSScreens {
    last: Mutex<Option<ScreenMetrics>>,
}

impl ScreenInfoProvider for MacOSScreens {
    fn screen_metrics(&self) -> ScreenMetrics {
        let fresh = MainThreadMarker::new().and_then(read_main_screen);
        let mut last = self.last.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(metrics) = fresh {
            *last = Some(metrics);
        }
        last.unwrap_or_default()
    }
}

fn read_main_screen(mtm: MainThreadMarker) -> Option<ScreenMetrics> {
    let screen = NSScreen::mainScreen(mtm)?;
    let (frame, left, right) = unsafe {
        (
            to_rect(screen.frame()),
            screen.auxiliaryTopLeftArea(),
            screen.auxiliaryTopRightArea(),
        )
    };

    // Both auxiliary areas are empty on displays without a camera housing.
    let notch = (left.size.width > 0.0 && right.size.width > 0.0).then(|| {
        let height = left.size.height;
        Rect::new(
            frame.x + left.size.width,
            frame.max_y() - height,
            frame.width - left.size.width - right.size.width,
            height,
        )
    });

    Some(ScreenMetrics { frame, notch })
}

fn to_rect(rect: NSRect) -> Rect {
    Rect::new(rect.origin.x, rect.origin.y, rect.size.width, rect.size.height)
}

/// Frontmost application. `NSWorkspace` updates it from notifications on
/// the main run loop, so reads from other threads get the last main-thread value.
#[derive(Default)]
pub struct MacOSFocus {
    last: Mutex<Option<ProcessIdentity>>,
}

impl FocusProbe for MacOSFocus {
    fn frontmost_process(&self) -> Option<ProcessIdentity> {
        let mut last = self.last.lock().unwrap_or_else(|e| e.into_inner());
        if MainThreadMarker::new().is_some() {
            *last = read_frontmost();
        } else {
            debug!("frontmost application read off the main thread");
        }
        last.clone()
    }
}

fn read_frontmost() -> Option<ProcessIdentity> {
    let (pid, bundle_id, name) = unsafe {
        let app = NSWorkspace::sharedWorkspace().frontmostApplication()?;
        (
            app.processIdentifier(),
            app.bundleIdentifier().map(|id| id.to_string()),
            app.localizedName().map(|name| name.to_string()),
        )
    };
    if pid <= 0 {
        return None;
    }

    Some(ProcessIdentity::new(pid, bundle_id, name.unwrap_or_default()))
}

/// Drains the main run loop without waiting.
pub struct MacOSRunLoop;

impl EventPump for MacOSRunLoop {
    fn pump_events(&self) {
        if MainThreadMarker::new().is_none() {
            return;
        }
        // Zero seconds handles whatever is already queued and returns.
        unsafe {
            CFRunLoopRunInMode(kCFRunLoopDefaultMode, 0.0, true);
        }
    }
}

// ABOUTME: Linux and FreeBSD implementations of the platform capabilities over X11
// ABOUTME: Pointer, screen, and focus come from x11rb; there is no accessibility menu bar, so menus stay empty

use super::{
    ElementAttributes, EventPump, FocusProbe, MenuSource, PlatformServices, PointerProbe,
    ScreenInfoProvider,
};
use crate::geometry::{Point, Rect, ScreenMetrics};
use crate::menu::ProcessIdentity;
use anyhow::{Context, Result, anyhow};
use std::sync::Arc;
use tracing::{debug, info};
use x11rb::connection::Connection;
use x11rb::protocol::xproto::{Atom, AtomEnum, ConnectionExt, Window};
use x11rb::rust_connection::RustConnection;

pub fn connect() -> Result<PlatformServices<EmptyMenuSource>> {
    let session = Arc::new(X11Session::connect()?);
    info!(screen = ?session.screen_metrics(), "connected to X11 display");

    Ok(PlatformServices {
        pointer: session.clone(),
        screens: session.clone(),
        focus: session.clone(),
        events: session,
        menus: Arc::new(EmptyMenuSource),
    })
}

pub struct X11Session {
    conn: RustConnection,
    root: Window,
    net_active_window: Atom,
    net_wm_pid: Atom,
}

impl X11Session {
    pub fn connect() -> Result<Self> {
        let (conn, screen_num) = x11rb::connect(None)
            .map_err(|e| anyhow!("Failed to connect to X11 display: {}. Ensure DISPLAY is set.", e))?;
        let root = conn
            .setup()
            .roots
            .get(screen_num)
            .map(|screen| screen.root)
            .context("X11 display reported no screens")?;

        let net_active_window = intern(&conn, b"_NET_ACTIVE_WINDOW")?;
        let net_wm_pid = intern(&conn, b"_NET_WM_PID")?;

        Ok(Self {
            conn,
            root,
            net_active_window,
            net_wm_pid,
        })
    }

    fn root_size(&self) -> Result<(f64, f64)> {
        let geometry = self.conn.get_geometry(self.root)?.reply()?;
        Ok((f64::from(geometry.width), f64::from(geometry.height)))
    }

    fn query_pointer(&self) -> Result<Point> {
        let (_, height) = self.root_size()?;
        let pointer = self.conn.query_pointer(self.root)?.reply()?;
        // X11 counts y down from the top edge.
        Ok(Point::new(
            f64::from(pointer.root_x),
            height - f64::from(pointer.root_y),
        ))
    }

    fn active_window(&self) -> Result<Option<Window>> {
        let reply = self
            .conn
            .get_property(false, self.root, self.net_active_window, AtomEnum::WINDOW, 0, 1)?
            .reply()?;
        Ok(reply
            .value32()
            .and_then(|mut values| values.next())
            .filter(|&window| window != x11rb::NONE))
    }

    fn window_pid(&self, window: Window) -> Result<Option<i32>> {
        let reply = self
            .conn
            .get_property(false, window, self.net_wm_pid, AtomEnum::CARDINAL, 0, 1)?
            .reply()?;
        Ok(reply
            .value32()
            .and_then(|mut values| values.next())
            .and_then(|pid| i32::try_from(pid).ok()))
    }

    /// `WM_CLASS` holds the instance and class names, NUL separated.
    fn window_class(&self, window: Window) -> Result<Option<(String, String)>> {
        let reply = self
            .conn
            .get_property(false, window, AtomEnum::WM_CLASS, AtomEnum::STRING, 0, 1024)?
            .reply()?;
        let mut parts = reply
            .value
            .split(|&byte| byte == 0)
            .map(|part| String::from_utf8_lossy(part).into_owned());
        Ok(match (parts.next(), parts.next()) {
            (Some(instance), Some(class)) => Some((instance, class)),
            _ => None,
        })
    }

    fn focused(&self) -> Result<Option<ProcessIdentity>> {
        let Some(window) = self.active_window()? else {
            return Ok(None);
        };
        let Some(pid) = self.window_pid(window)? else {
            return Ok(None);
        };
        let identity = match self.window_class(window)? {
            Some((instance, class)) => ProcessIdentity::new(pid, Some(instance), class),
            None => ProcessIdentity::new(pid, None, format!("pid {pid}")),
        };
        Ok(Some(identity))
    }
}

fn intern(conn: &RustConnection, name: &[u8]) -> Result<Atom> {
    let atom = conn
        .intern_atom(false, name)?
        .reply()
        .with_context(|| format!("Failed to intern {}", String::from_utf8_lossy(name)))?
        .atom;
    Ok(atom)
}

impl PointerProbe for X11Session {
    fn pointer_location(&self) -> Option<Point> {
        self.query_pointer()
            .map_err(|e| debug!("pointer query failed: {e}"))
            .ok()
    }
}

impl ScreenInfoProvider for X11Session {
    fn screen_metrics(&self) -> ScreenMetrics {
        match self.root_size() {
            Ok((width, height)) => ScreenMetrics {
                frame: Rect::new(0.0, 0.0, width, height),
                notch: None,
            },
            Err(e) => {
                debug!("screen query failed: {e}");
                ScreenMetrics::default()
            }
        }
    }
}

impl FocusProbe for X11Session {
    fn frontmost_process(&self) -> Option<ProcessIdentity> {
        self.focused()
            .map_err(|e| debug!("focus query failed: {e}"))
            .ok()
            .flatten()
    }
}

// Nothing is selected on the root window, so only stray events can queue up.
impl EventPump for X11Session {
    fn pump_events(&self) {
        while let Ok(Some(event)) = self.conn.poll_for_event() {
            debug!(?event, "discarding X11 event");
        }
    }
}

/// X11 has no accessibility menu bar to read.
#[derive(Debug, Default)]
pub struct EmptyMenuSource;

impl MenuSource for EmptyMenuSource {
    type Element = ();

    fn menu_bar_items(&self, _process: &ProcessIdentity) -> Vec<()> {
        Vec::new()
    }

    fn children(&self, _element: &()) -> Vec<()> {
        Vec::new()
    }

    fn attributes(&self, _element: &()) -> Option<ElementAttributes> {
        None
    }

    fn press(&self, _element: &()) -> bool {
        false
    }
}

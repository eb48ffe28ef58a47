// ABOUTME: Host wiring that connects platform capabilities to the panel controller and menu resolver
// ABOUTME: Polls pointer, focus, and screen state into events and feeds menu width back into the panel

use crate::config::Config;
use crate::geometry::{Point, Rect};
use crate::layout::TextMetrics;
use crate::menu::{HighlightTracker, MenuResolver, MenuSnapshot, ResolverHandle};
use crate::panel::{PanelController, PanelEvent, PanelHandle, PanelSnapshot, PanelState};
use crate::platform::{MenuSource, PlatformServices};
use anyhow::{Context, Result};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info};

/// Turns sampled pointer positions into enter/exit edges.
#[derive(Debug, Default)]
pub struct HoverTracker {
    inside: bool,
}

impl HoverTracker {
    pub fn update(&mut self, frame: Rect, pointer: Option<Point>) -> Option<PanelEvent> {
        let inside = pointer.is_some_and(|point| frame.contains(point));
        if inside == self.inside {
            return None;
        }
        self.inside = inside;
        Some(if inside {
            PanelEvent::HoverEnter
        } else {
            PanelEvent::HoverExit
        })
    }

    pub fn is_inside(&self) -> bool {
        self.inside
    }
}

pub struct App<S: MenuSource> {
    config: Config,
    services: PlatformServices<S>,
    metrics: TextMetrics,
}

impl<S: MenuSource> App<S> {
    pub fn new(config: Config, services: PlatformServices<S>) -> Self {
        Self {
            config,
            services,
            metrics: TextMetrics::default(),
        }
    }

    /// Runs until Ctrl-C.
    pub async fn run(self) -> Result<()> {
        let running = self.start();
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {e}");
        }
        running.shutdown().await
    }

    /// Spawns the panel controller, the menu resolver, and the pollers that
    /// feed them. Must be called inside a tokio runtime.
    pub fn start(self) -> Running {
        let controller = PanelController::new(
            self.config.panel.tuning(),
            Arc::clone(&self.services.pointer),
            Arc::clone(&self.services.screens),
        );
        let resolver = MenuResolver::new(
            Arc::clone(&self.services.menus),
            self.config.menu.policy(),
        );

        let panel = controller.handle();
        let menus = resolver.handle();
        let panel_rx = controller.subscribe();
        let menu_rx = resolver.subscribe();
        let highlight = Arc::new(Mutex::new(HighlightTracker::default()));

        let controller_task = tokio::spawn(controller.run());
        let resolver_task = tokio::spawn(resolver.run());

        let workers = vec![
            self.spawn_focus_poller(menus.clone()),
            self.spawn_hover_tracker(panel.clone(), panel_rx.clone()),
            self.spawn_screen_poller(panel.clone()),
            spawn_width_reporter(self.metrics, panel.clone(), menu_rx.clone()),
            spawn_panel_observer(menus.clone(), Arc::clone(&highlight), panel_rx.clone()),
            spawn_highlight_clock(
                Arc::clone(&highlight),
                self.config.host.pointer_poll_interval(),
            ),
        ];

        info!("notchbar running");
        Running {
            panel,
            menus,
            panel_rx,
            menu_rx,
            highlight,
            controller_task,
            resolver_task,
            workers,
        }
    }

    /// Reads focus on the runtime thread, which on macOS is the main thread
    /// whose run loop keeps the frontmost application current.
    fn spawn_focus_poller(&self, menus: ResolverHandle) -> JoinHandle<()> {
        let focus = Arc::clone(&self.services.focus);
        let events = Arc::clone(&self.services.events);
        let period = self.config.menu.focus_poll_interval();

        tokio::spawn(async move {
            let mut ticker = interval(period);
            let mut last = None;
            loop {
                ticker.tick().await;
                events.pump_events();
                let process = focus.frontmost_process();
                if process != last {
                    debug!(process = ?process.as_ref().map(|p| &p.name), "frontmost process");
                    menus.focus_changed(process.clone());
                    last = process;
                }
            }
        })
    }

    fn spawn_hover_tracker(
        &self,
        panel: PanelHandle,
        frames: watch::Receiver<PanelSnapshot>,
    ) -> JoinHandle<()> {
        let pointer = Arc::clone(&self.services.pointer);
        let period = self.config.host.pointer_poll_interval();

        tokio::spawn(async move {
            let mut ticker = interval(period);
            let mut tracker = HoverTracker::default();
            loop {
                ticker.tick().await;
                let frame = frames.borrow().frame;
                if let Some(event) = tracker.update(frame, pointer.pointer_location()) {
                    panel.send(event);
                }
            }
        })
    }

    fn spawn_screen_poller(&self, panel: PanelHandle) -> JoinHandle<()> {
        let screens = Arc::clone(&self.services.screens);
        let events = Arc::clone(&self.services.events);
        let period = self.config.host.screen_poll_interval();

        tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.tick().await;
            let mut last = screens.screen_metrics();
            loop {
                ticker.tick().await;
                events.pump_events();
                let current = screens.screen_metrics();
                if current != last {
                    panel.screen_changed();
                    last = current;
                }
            }
        })
    }
}

/// Handles to a started host.
pub struct Running {
    pub panel: PanelHandle,
    pub menus: ResolverHandle,
    pub panel_rx: watch::Receiver<PanelSnapshot>,
    pub menu_rx: watch::Receiver<MenuSnapshot>,
    /// Hovered menu path; the view reports item enter/leave here.
    pub highlight: Arc<Mutex<HighlightTracker>>,
    controller_task: JoinHandle<()>,
    resolver_task: JoinHandle<()>,
    workers: Vec<JoinHandle<()>>,
}

impl Running {
    pub async fn shutdown(self) -> Result<()> {
        info!("shutting down");
        for worker in &self.workers {
            worker.abort();
        }
        self.panel.shutdown();
        self.menus.shutdown();

        self.controller_task
            .await
            .context("Panel controller task failed")?;
        self.resolver_task
            .await
            .context("Menu resolver task failed")?;
        Ok(())
    }
}

fn spawn_width_reporter(
    metrics: TextMetrics,
    panel: PanelHandle,
    mut menus: watch::Receiver<MenuSnapshot>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while menus.changed().await.is_ok() {
            let width = metrics.preferred_width(&menus.borrow_and_update());
            if let Some(width) = width {
                debug!(width, "menu row width");
                panel.set_preferred_width(width);
            }
        }
    })
}

fn spawn_panel_observer(
    menus: ResolverHandle,
    highlight: Arc<Mutex<HighlightTracker>>,
    mut frames: watch::Receiver<PanelSnapshot>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut last = frames.borrow_and_update().state;
        while frames.changed().await.is_ok() {
            let snapshot = *frames.borrow_and_update();
            if snapshot.state == last {
                continue;
            }
            info!(state = ?snapshot.state, frame = ?snapshot.frame, "panel");
            if snapshot.state == PanelState::Expanding {
                menus.ensure_loaded();
            }
            lock(&highlight).set_panel_expanded(snapshot.state == PanelState::Expanded);
            last = snapshot.state;
        }
    })
}

fn spawn_highlight_clock(
    highlight: Arc<Mutex<HighlightTracker>>,
    period: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(period);
        loop {
            ticker.tick().await;
            if lock(&highlight).tick(Instant::now()) {
                debug!("menu highlight reset");
            }
        }
    })
}

fn lock(highlight: &Mutex<HighlightTracker>) -> std::sync::MutexGuard<'_, HighlightTracker> {
    highlight.lock().unwrap_or_else(|e| e.into_inner())
}

fn interval(period: Duration) -> tokio::time::Interval {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::ScreenMetrics;
    use crate::menu::{MenuNodeId, ProcessIdentity};
    use crate::menu::testing::FakeMenuSource;
    use crate::platform::{EventPump, FocusProbe, PointerProbe, ScreenInfoProvider};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread::ThreadId;

    struct Desk {
        pointer: Mutex<Option<Point>>,
        focus: Mutex<Option<ProcessIdentity>>,
        /// Focus the OS has switched to but not yet delivered.
        pending_focus: Mutex<Option<Option<ProcessIdentity>>>,
        pumps: AtomicUsize,
        focus_threads: Mutex<Vec<ThreadId>>,
    }

    impl EventPump for Desk {
        fn pump_events(&self) {
            self.pumps.fetch_add(1, Ordering::SeqCst);
            if let Some(focus) = self.pending_focus.lock().unwrap().take() {
                *self.focus.lock().unwrap() = focus;
            }
        }
    }

    impl PointerProbe for Desk {
        fn pointer_location(&self) -> Option<Point> {
            *self.pointer.lock().unwrap()
        }
    }

    impl FocusProbe for Desk {
        fn frontmost_process(&self) -> Option<ProcessIdentity> {
            self.focus_threads
                .lock()
                .unwrap()
                .push(std::thread::current().id());
            self.focus.lock().unwrap().clone()
        }
    }

    impl ScreenInfoProvider for Desk {
        fn screen_metrics(&self) -> ScreenMetrics {
            ScreenMetrics {
                frame: Rect::new(0.0, 0.0, 1440.0, 900.0),
                notch: Some(Rect::new(620.0, 868.0, 200.0, 32.0)),
            }
        }
    }

    #[test]
    fn test_hover_tracker_reports_edges_only() {
        let frame = Rect::new(0.0, 0.0, 100.0, 20.0);
        let mut tracker = HoverTracker::default();

        assert_eq!(tracker.update(frame, Some(Point::new(500.0, 5.0))), None);
        assert_eq!(
            tracker.update(frame, Some(Point::new(50.0, 5.0))),
            Some(PanelEvent::HoverEnter)
        );
        assert_eq!(tracker.update(frame, Some(Point::new(60.0, 5.0))), None);
        assert_eq!(tracker.update(frame, None), Some(PanelEvent::HoverExit));
        assert!(!tracker.is_inside());
    }

    fn writer_desk() -> (Arc<Desk>, Arc<FakeMenuSource>) {
        let desk = Arc::new(Desk {
            pointer: Mutex::new(None),
            focus: Mutex::new(Some(ProcessIdentity::new(
                9,
                Some("com.example.writer".into()),
                "Writer",
            ))),
            pending_focus: Mutex::new(None),
            pumps: AtomicUsize::new(0),
            focus_threads: Mutex::new(Vec::new()),
        });
        let source = Arc::new(FakeMenuSource::new());
        let bar = source.bar(&[
            "File", "Edit", "View", "Insert", "Format", "Tools", "Table", "Window", "Help",
        ]);
        source.respond(9, vec![Vec::new(), bar]);
        (desk, source)
    }

    fn start(desk: &Arc<Desk>, source: &Arc<FakeMenuSource>) -> Running {
        let services = PlatformServices {
            pointer: desk.clone(),
            screens: desk.clone(),
            focus: desk.clone(),
            events: desk.clone(),
            menus: Arc::clone(source),
        };
        App::new(Config::default(), services).start()
    }

    #[tokio::test(start_paused = true)]
    async fn test_focus_resolves_menu_before_hover() {
        let (desk, source) = writer_desk();
        let running = start(&desk, &source);

        tokio::time::sleep(Duration::from_millis(500)).await;

        assert_eq!(source.queries(9), 2);
        assert_eq!(running.menu_rx.borrow().items.len(), 9);
        assert_eq!(running.panel_rx.borrow().state, PanelState::Collapsed);
        running.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_hover_expands_panel_to_menu_width() {
        let (desk, source) = writer_desk();
        let running = start(&desk, &source);
        tokio::time::sleep(Duration::from_millis(500)).await;

        *desk.pointer.lock().unwrap() = Some(Point::new(720.0, 880.0));
        tokio::time::sleep(Duration::from_millis(600)).await;

        // 44 glyphs at 7pt plus 24pt of padding for each of the 9 items.
        let snapshot = *running.panel_rx.borrow();
        assert_eq!(snapshot.state, PanelState::Expanded);
        assert_eq!(snapshot.frame.width, 524.0);
        assert_eq!(snapshot.frame.mid_x(), 720.0);
        assert_eq!(source.queries(9), 2);

        *desk.pointer.lock().unwrap() = Some(Point::new(100.0, 100.0));
        tokio::time::sleep(Duration::from_millis(800)).await;

        let snapshot = *running.panel_rx.borrow();
        assert_eq!(snapshot.state, PanelState::Collapsed);
        assert_eq!(snapshot.frame, Rect::new(625.0, 873.0, 190.0, 27.0));
        running.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_switching_apps_replaces_menu() {
        let (desk, source) = writer_desk();
        let viewer = source.bar(&["File", "Go"]);
        source.respond(11, vec![viewer]);
        let running = start(&desk, &source);
        tokio::time::sleep(Duration::from_millis(500)).await;

        *desk.focus.lock().unwrap() = Some(ProcessIdentity::new(11, None, "Viewer"));
        tokio::time::sleep(Duration::from_millis(500)).await;

        let menu = running.menu_rx.borrow().clone();
        assert_eq!(menu.process.map(|p| p.pid), Some(11));
        let titles: Vec<_> = menu.items.iter().map(|n| n.title.clone()).collect();
        assert_eq!(titles, vec!["File", "Go"]);
        running.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_focus_is_read_after_pumping_on_runtime_thread() {
        let (desk, source) = writer_desk();
        let viewer = source.bar(&["File", "Go"]);
        source.respond(11, vec![viewer]);
        let running = start(&desk, &source);
        tokio::time::sleep(Duration::from_millis(500)).await;

        // The switch only becomes visible once events are pumped.
        *desk.pending_focus.lock().unwrap() =
            Some(Some(ProcessIdentity::new(11, None, "Viewer")));
        tokio::time::sleep(Duration::from_millis(500)).await;

        assert_eq!(
            running.menu_rx.borrow().process.as_ref().map(|p| p.pid),
            Some(11)
        );
        assert!(desk.pumps.load(Ordering::SeqCst) > 0);
        let runtime_thread = std::thread::current().id();
        let threads = desk.focus_threads.lock().unwrap().clone();
        assert!(!threads.is_empty());
        assert!(threads.iter().all(|id| *id == runtime_thread));
        running.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_highlight_follows_panel_expansion() {
        let (desk, source) = writer_desk();
        let running = start(&desk, &source);
        tokio::time::sleep(Duration::from_millis(500)).await;

        // Hovering does nothing until the panel is fully open.
        running.highlight.lock().unwrap().hover_item(MenuNodeId(1));
        assert!(running.highlight.lock().unwrap().path().is_empty());

        *desk.pointer.lock().unwrap() = Some(Point::new(720.0, 880.0));
        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(running.panel_rx.borrow().state, PanelState::Expanded);

        {
            let mut highlight = running.highlight.lock().unwrap();
            highlight.hover_item(MenuNodeId(1));
            highlight.leave_item(Instant::now());
            assert!(highlight.is_highlighted(MenuNodeId(1)));
        }
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(running.highlight.lock().unwrap().path().is_empty());

        running.highlight.lock().unwrap().hover_item(MenuNodeId(2));
        *desk.pointer.lock().unwrap() = Some(Point::new(100.0, 100.0));
        tokio::time::sleep(Duration::from_millis(800)).await;

        assert_eq!(running.panel_rx.borrow().state, PanelState::Collapsed);
        assert!(running.highlight.lock().unwrap().path().is_empty());
        running.shutdown().await.unwrap();
    }
}

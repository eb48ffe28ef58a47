// ABOUTME: Hover-driven expand/collapse state machine for the notch panel
// ABOUTME: Owns panel geometry, debounces collapse, and retargets animations when content width changes

use crate::animation::{AnimationStart, Animator};
use crate::geometry::{Rect, ScreenMetrics};
use crate::platform::{PointerProbe, ScreenInfoProvider};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelState {
    Collapsed,
    Expanding,
    Expanded,
    Collapsing,
}

/// What the host window reads to position itself.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PanelSnapshot {
    pub state: PanelState,
    pub frame: Rect,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PanelTuning {
    pub expand_duration: Duration,
    pub resize_duration: Duration,
    pub frame_rate: u32,
    pub collapse_delay: Duration,
    pub minimum_content_width: f64,
    pub screen_margin: f64,
    pub expand_horizontal: f64,
    pub expand_vertical: f64,
    pub notch_inset: f64,
    pub fallback_notch_width: f64,
    pub fallback_notch_height: f64,
    pub epsilon: f64,
}

impl Default for PanelTuning {
    fn default() -> Self {
        Self {
            expand_duration: Duration::from_millis(300),
            resize_duration: Duration::from_millis(100),
            frame_rate: 120,
            collapse_delay: Duration::from_millis(150),
            minimum_content_width: 200.0,
            screen_margin: 8.0,
            expand_horizontal: 250.0,
            expand_vertical: 100.0,
            notch_inset: 5.0,
            fallback_notch_width: 200.0,
            fallback_notch_height: 32.0,
            epsilon: 0.5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PanelGeometry {
    pub collapsed: Rect,
    pub expanded_template: Rect,
}

impl PanelGeometry {
    pub fn derive(screen: &ScreenMetrics, tuning: &PanelTuning) -> Self {
        let notch = screen.notch_or(tuning.fallback_notch_width, tuning.fallback_notch_height);
        let inset = tuning.notch_inset;
        let collapsed = Rect::new(
            notch.x + inset,
            notch.y + inset,
            notch.width - inset * 2.0,
            notch.height - inset,
        )
        .sanitized();

        let expanded_template = Rect::new(
            collapsed.x - tuning.expand_horizontal,
            collapsed.y - tuning.expand_vertical,
            collapsed.width + tuning.expand_horizontal * 2.0,
            collapsed.height + tuning.expand_vertical,
        )
        .sanitized();

        Self {
            collapsed,
            expanded_template,
        }
    }

    /// The expanded frame for a content width report, recentered on the
    /// collapsed frame and kept inside the screen margins. Without a report
    /// the template width is used.
    pub fn expanded_for(
        &self,
        preferred_width: Option<f64>,
        screen: &ScreenMetrics,
        tuning: &PanelTuning,
    ) -> Rect {
        let margin = tuning.screen_margin;
        let limit = (screen.frame.width - margin * 2.0).max(0.0);
        let width = match preferred_width {
            Some(preferred) => preferred.max(tuning.minimum_content_width).min(limit),
            None => self.expanded_template.width.min(limit),
        }
        .max(0.0);

        let min_x = screen.frame.min_x() + margin;
        let max_x = screen.frame.max_x() - margin - width;
        let x = (self.collapsed.mid_x() - width / 2.0).min(max_x).max(min_x);

        Rect::new(
            x,
            self.expanded_template.y,
            width,
            self.expanded_template.height,
        )
        .sanitized()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PanelEvent {
    HoverEnter,
    HoverExit,
    PreferredWidth(f64),
    PopoverHover(bool),
    ScreenChanged,
}

#[derive(Debug)]
enum Command {
    Event(PanelEvent),
    AnimationFinished(u64),
    DebounceElapsed(u64),
    Shutdown,
}

/// Cloneable sender feeding a running controller.
#[derive(Debug, Clone)]
pub struct PanelHandle {
    tx: mpsc::UnboundedSender<Command>,
}

impl PanelHandle {
    pub fn send(&self, event: PanelEvent) {
        if self.tx.send(Command::Event(event)).is_err() {
            debug!(?event, "panel controller has stopped; event dropped");
        }
    }

    pub fn hover_enter(&self) {
        self.send(PanelEvent::HoverEnter);
    }

    pub fn hover_exit(&self) {
        self.send(PanelEvent::HoverExit);
    }

    pub fn set_preferred_width(&self, width: f64) {
        self.send(PanelEvent::PreferredWidth(width));
    }

    pub fn set_popover_hovered(&self, hovered: bool) {
        self.send(PanelEvent::PopoverHover(hovered));
    }

    pub fn screen_changed(&self) {
        self.send(PanelEvent::ScreenChanged);
    }

    pub fn shutdown(&self) {
        let _ = self.tx.send(Command::Shutdown);
    }
}

pub struct PanelController {
    tuning: PanelTuning,
    pointer: Arc<dyn PointerProbe>,
    screens: Arc<dyn ScreenInfoProvider>,
    screen: ScreenMetrics,
    geometry: PanelGeometry,
    state: PanelState,
    preferred_width: Option<f64>,
    popover_hovered: bool,
    target: Rect,
    published: Arc<watch::Sender<PanelSnapshot>>,
    animator: Animator,
    debounce: Option<JoinHandle<()>>,
    debounce_generation: u64,
    tx: mpsc::UnboundedSender<Command>,
    rx: Option<mpsc::UnboundedReceiver<Command>>,
}

impl PanelController {
    pub fn new(
        tuning: PanelTuning,
        pointer: Arc<dyn PointerProbe>,
        screens: Arc<dyn ScreenInfoProvider>,
    ) -> Self {
        let screen = screens.screen_metrics();
        let geometry = PanelGeometry::derive(&screen, &tuning);
        let (published, _) = watch::channel(PanelSnapshot {
            state: PanelState::Collapsed,
            frame: geometry.collapsed,
        });
        let (tx, rx) = mpsc::unbounded_channel();

        Self {
            animator: Animator::new(tuning.frame_rate, tuning.epsilon),
            tuning,
            pointer,
            screens,
            screen,
            geometry,
            state: PanelState::Collapsed,
            preferred_width: None,
            popover_hovered: false,
            target: geometry.collapsed,
            published: Arc::new(published),
            debounce: None,
            debounce_generation: 0,
            tx,
            rx: Some(rx),
        }
    }

    pub fn handle(&self) -> PanelHandle {
        PanelHandle {
            tx: self.tx.clone(),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<PanelSnapshot> {
        self.published.subscribe()
    }

    pub fn state(&self) -> PanelState {
        self.state
    }

    fn current_frame(&self) -> Rect {
        self.published.borrow().frame
    }

    pub async fn run(mut self) {
        let Some(mut rx) = self.rx.take() else {
            return;
        };

        info!(frame = ?self.current_frame(), "panel controller started");
        while let Some(command) = rx.recv().await {
            match command {
                Command::Event(event) => self.handle_event(event),
                Command::AnimationFinished(generation) => self.animation_finished(generation),
                Command::DebounceElapsed(generation) => self.debounce_elapsed(generation),
                Command::Shutdown => break,
            }
        }

        self.animator.cancel();
        self.cancel_debounce();
        info!("panel controller stopped");
    }

    pub fn handle_event(&mut self, event: PanelEvent) {
        match event {
            PanelEvent::HoverEnter => self.hover_enter(),
            PanelEvent::HoverExit => self.hover_exit(),
            PanelEvent::PreferredWidth(width) => self.set_preferred_width(width),
            PanelEvent::PopoverHover(hovered) => self.popover_hovered = hovered,
            PanelEvent::ScreenChanged => self.screen_changed(),
        }
    }

    fn hover_enter(&mut self) {
        self.cancel_debounce();
        match self.state {
            PanelState::Collapsed | PanelState::Collapsing => {
                self.set_state(PanelState::Expanding);
                let target = self.expanded_target();
                self.animate_to(target, self.tuning.expand_duration);
            }
            PanelState::Expanding | PanelState::Expanded => {}
        }
    }

    fn hover_exit(&mut self) {
        match self.state {
            PanelState::Expanding | PanelState::Expanded => self.arm_debounce(),
            PanelState::Collapsed | PanelState::Collapsing => {}
        }
    }

    fn set_preferred_width(&mut self, width: f64) {
        if !width.is_finite() {
            return;
        }
        self.preferred_width = Some(width.max(0.0));

        match self.state {
            PanelState::Expanded => self.retarget(self.tuning.resize_duration),
            PanelState::Expanding => self.retarget(self.tuning.expand_duration),
            PanelState::Collapsed | PanelState::Collapsing => {}
        }
    }

    fn screen_changed(&mut self) {
        let screen = self.screens.screen_metrics();
        let geometry = PanelGeometry::derive(&screen, &self.tuning);
        if screen == self.screen && geometry == self.geometry {
            return;
        }

        info!(?geometry, "screen configuration changed");
        self.screen = screen;
        self.geometry = geometry;

        match self.state {
            PanelState::Expanded | PanelState::Expanding => {
                self.retarget(self.tuning.resize_duration)
            }
            PanelState::Collapsed => {
                if self.current_frame().distance(&geometry.collapsed) > self.tuning.epsilon {
                    self.animate_to(geometry.collapsed, self.tuning.resize_duration);
                }
            }
            PanelState::Collapsing => {
                self.animate_to(geometry.collapsed, self.tuning.expand_duration)
            }
        }
    }

    fn expanded_target(&self) -> Rect {
        self.geometry
            .expanded_for(self.preferred_width, &self.screen, &self.tuning)
    }

    fn retarget(&mut self, duration: Duration) {
        let target = self.expanded_target();
        if target.distance(&self.target) <= self.tuning.epsilon {
            return;
        }
        debug!(width = target.width, "retargeting expanded frame");
        self.animate_to(target, duration);
    }

    fn animate_to(&mut self, target: Rect, duration: Duration) {
        let target = target.sanitized();
        self.target = target;

        let from = self.current_frame();
        let published = Arc::clone(&self.published);
        let finished = self.tx.clone();
        let start = self.animator.animate(
            from,
            target,
            duration,
            move |frame: Rect| published.send_modify(|snapshot| snapshot.frame = frame.sanitized()),
            move |generation| {
                let _ = finished.send(Command::AnimationFinished(generation));
            },
        );

        if start == AnimationStart::Immediate {
            self.finish_transition();
        }
    }

    fn animation_finished(&mut self, generation: u64) {
        if generation != self.animator.generation() {
            debug!(generation, "ignoring completion of superseded animation");
            return;
        }
        self.finish_transition();
    }

    fn finish_transition(&mut self) {
        match self.state {
            PanelState::Expanding => self.set_state(PanelState::Expanded),
            PanelState::Collapsing => self.set_state(PanelState::Collapsed),
            PanelState::Expanded | PanelState::Collapsed => {}
        }
    }

    fn arm_debounce(&mut self) {
        self.cancel_debounce();
        let generation = self.debounce_generation;
        let delay = self.tuning.collapse_delay;
        let elapsed = self.tx.clone();

        self.debounce = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = elapsed.send(Command::DebounceElapsed(generation));
        }));
    }

    fn cancel_debounce(&mut self) {
        self.debounce_generation += 1;
        if let Some(task) = self.debounce.take() {
            task.abort();
        }
    }

    fn debounce_elapsed(&mut self, generation: u64) {
        if generation != self.debounce_generation {
            return;
        }
        self.debounce = None;

        if !matches!(self.state, PanelState::Expanded | PanelState::Expanding) {
            return;
        }

        let frame = self.current_frame();
        let inside = self
            .pointer
            .pointer_location()
            .is_some_and(|point| frame.contains(point));
        if inside || self.popover_hovered {
            debug!(inside, popover = self.popover_hovered, "pointer still on panel, staying expanded");
            return;
        }

        self.set_state(PanelState::Collapsing);
        self.animate_to(self.geometry.collapsed, self.tuning.expand_duration);
    }

    fn set_state(&mut self, state: PanelState) {
        if self.state == state {
            return;
        }
        debug!(from = ?self.state, to = ?state, "panel state");
        self.state = state;
        self.published.send_modify(|snapshot| snapshot.state = state);
    }
}

// ABOUTME: Frame-stepped ease-in-out tweening for panel geometry with cooperative cancellation
// ABOUTME: One Animator owns at most one running tween; starting another cancels the first

use crate::geometry::Rect;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::task::JoinHandle;

/// Values a tween can move between.
pub trait Interpolate: Copy + Send + 'static {
    fn interpolate(from: &Self, to: &Self, t: f64) -> Self;

    fn distance(from: &Self, to: &Self) -> f64;
}

impl Interpolate for f64 {
    fn interpolate(from: &Self, to: &Self, t: f64) -> Self {
        from + (to - from) * t
    }

    fn distance(from: &Self, to: &Self) -> f64 {
        (to - from).abs()
    }
}

impl Interpolate for Rect {
    fn interpolate(from: &Self, to: &Self, t: f64) -> Self {
        Rect::new(
            f64::interpolate(&from.x, &to.x, t),
            f64::interpolate(&from.y, &to.y, t),
            f64::interpolate(&from.width, &to.width, t),
            f64::interpolate(&from.height, &to.height, t),
        )
    }

    fn distance(from: &Self, to: &Self) -> f64 {
        from.distance(to)
    }
}

pub fn ease_in_out_cubic(t: f64) -> f64 {
    let t = t.clamp(0.0, 1.0);
    if t < 0.5 {
        4.0 * t * t * t
    } else {
        1.0 - (-2.0 * t + 2.0).powi(3) / 2.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TweenOutcome {
    Completed,
    /// Stopped before applying `step`; the value from `step - 1` stays in place.
    Canceled { step: u32 },
}

#[derive(Debug, Clone, Copy)]
pub struct Tween<T> {
    start: T,
    end: T,
    duration: Duration,
}

impl<T: Interpolate> Tween<T> {
    pub fn new(start: T, end: T, duration: Duration) -> Self {
        Self {
            start,
            end,
            duration,
        }
    }

    pub fn is_negligible(&self, epsilon: f64) -> bool {
        T::distance(&self.start, &self.end) < epsilon
    }

    pub fn frames(&self, frame_rate: u32) -> u32 {
        // Tolerance keeps 0.3s at 120Hz at 36 frames despite float error.
        let frames = (self.duration.as_secs_f64() * f64::from(frame_rate.max(1)) - 1e-6).ceil();
        (frames as u32).max(1)
    }

    /// The value shown at `step` of `frames`. The last step is `end` itself so
    /// rounding in the curve never leaves the geometry short of its target.
    pub fn sample(&self, step: u32, frames: u32) -> T {
        if step >= frames {
            return self.end;
        }
        let t = f64::from(step) / f64::from(frames.max(1));
        T::interpolate(&self.start, &self.end, ease_in_out_cubic(t))
    }

    /// Steps through the tween, sleeping one frame interval before each
    /// sample. `is_live` is consulted before every apply.
    pub async fn run<L, F>(self, frame_rate: u32, is_live: L, mut apply: F) -> TweenOutcome
    where
        L: Fn() -> bool,
        F: FnMut(T),
    {
        let frames = self.frames(frame_rate);
        let interval = self.duration / frames;

        for step in 1..=frames {
            tokio::time::sleep(interval).await;
            if !is_live() {
                return TweenOutcome::Canceled { step };
            }
            apply(self.sample(step, frames));
        }

        TweenOutcome::Completed
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnimationStart {
    /// Start and end were within epsilon; the end value was applied synchronously.
    Immediate,
    Spawned { generation: u64 },
}

pub struct Animator {
    frame_rate: u32,
    epsilon: f64,
    generation: Arc<AtomicU64>,
    task: Option<JoinHandle<()>>,
}

impl Animator {
    pub fn new(frame_rate: u32, epsilon: f64) -> Self {
        Self {
            frame_rate,
            epsilon,
            generation: Arc::new(AtomicU64::new(0)),
            task: None,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    pub fn is_active(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Cancels whatever is running, then tweens from `start` to `end`.
    /// `on_complete` receives the generation of the tween and only fires when
    /// it ran to the end.
    pub fn animate<T, F, C>(
        &mut self,
        start: T,
        end: T,
        duration: Duration,
        mut apply: F,
        on_complete: C,
    ) -> AnimationStart
    where
        T: Interpolate,
        F: FnMut(T) + Send + 'static,
        C: FnOnce(u64) + Send + 'static,
    {
        self.cancel();

        let tween = Tween::new(start, end, duration);
        if tween.is_negligible(self.epsilon) {
            apply(end);
            return AnimationStart::Immediate;
        }

        let generation = self.generation();
        let live = Arc::clone(&self.generation);
        let frame_rate = self.frame_rate;

        self.task = Some(tokio::spawn(async move {
            let outcome = tween
                .run(
                    frame_rate,
                    || live.load(Ordering::SeqCst) == generation,
                    apply,
                )
                .await;
            match outcome {
                TweenOutcome::Completed => on_complete(generation),
                TweenOutcome::Canceled { step } => {
                    tracing::trace!(generation, step, "tween observed cancellation");
                }
            }
        }));

        AnimationStart::Spawned { generation }
    }

    pub fn cancel(&mut self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for Animator {
    fn drop(&mut self) {
        self.cancel();
    }
}

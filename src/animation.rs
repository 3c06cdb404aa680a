//! Animation facade: transform values, the engine seam, awaitable completions
//! and a reference spring/tween engine.

use log::debug;
use serde::Serialize;
use std::{
    cell::RefCell,
    future::Future,
    pin::Pin,
    rc::Rc,
    task::{Context, Poll, Waker},
    time::Duration,
};

use crate::config::SpringConfig;

/// 2D translation (px) plus rotation (degrees).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Transform {
    pub x: f32,
    pub y: f32,
    pub rotation_deg: f32,
}

impl Transform {
    pub const IDENTITY: Transform = Transform {
        x: 0.0,
        y: 0.0,
        rotation_deg: 0.0,
    };

    /// Non-finite components are replaced by zero so nothing NaN ever reaches a renderer.
    pub fn new(x: f32, y: f32, rotation_deg: f32) -> Self {
        fn finite(v: f32) -> f32 {
            if v.is_finite() { v } else { 0.0 }
        }
        Self {
            x: finite(x),
            y: finite(y),
            rotation_deg: finite(rotation_deg),
        }
    }

    pub fn scaled(&self, k: f32) -> Self {
        Self::new(self.x * k, self.y * k, self.rotation_deg * k)
    }

    pub fn approx_eq(&self, other: &Transform, tol: f32) -> bool {
        (self.x - other.x).abs() <= tol
            && (self.y - other.y).abs() <= tol
            && (self.rotation_deg - other.rotation_deg).abs() <= tol
    }

    fn components(&self) -> [f32; 3] {
        [self.x, self.y, self.rotation_deg]
    }

    fn from_components(c: [f32; 3]) -> Self {
        Self::new(c[0], c[1], c[2])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct AnimationId(pub u64);

/// Timing curves for tweens, as the CSS keywords of the same name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Easing {
    Ease,
    EaseOut,
}

impl Easing {
    fn control_points(self) -> (f32, f32, f32, f32) {
        match self {
            Easing::Ease => (0.25, 0.1, 0.25, 1.0),
            Easing::EaseOut => (0.0, 0.0, 0.58, 1.0),
        }
    }

    /// Eased progress for linear progress `t` in `[0, 1]`.
    pub fn apply(self, t: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);
        if t == 0.0 || t == 1.0 {
            return t;
        }
        let (x1, y1, x2, y2) = self.control_points();
        let bezier = |a: f32, b: f32, s: f32| {
            let inv = 1.0 - s;
            3.0 * inv * inv * s * a + 3.0 * inv * s * s * b + s * s * s
        };
        // x(s) is monotonic for both curves, so bisection converges
        let (mut lo, mut hi) = (0.0f32, 1.0f32);
        for _ in 0..24 {
            let mid = (lo + hi) / 2.0;
            if bezier(x1, x2, mid) < t {
                lo = mid;
            } else {
                hi = mid;
            }
        }
        bezier(y1, y2, (lo + hi) / 2.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Motion {
    Spring(SpringConfig),
    Tween { duration: Duration, easing: Easing },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnimationRequest {
    pub target: Transform,
    pub motion: Motion,
}

/// The spring/tween engine behind a card. It owns the rendered transform.
///
/// Implementations report rest by handing the id back to
/// [`GestureCardController::animation_finished`](crate::controller::GestureCardController::animation_finished).
pub trait AnimationEngine {
    /// Starts animating toward `request.target`, replacing whatever was running.
    fn start(&mut self, id: AnimationId, request: AnimationRequest);
    /// Teleports without animating; cancels any running animation.
    fn jump_to(&mut self, transform: Transform);
    fn current(&self) -> Transform;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AnimationOutcome {
    Finished,
    Superseded,
}

#[derive(Debug, Default)]
struct Shared {
    outcome: Option<AnimationOutcome>,
    wakers: Vec<Waker>,
}

/// Resolves once a transition has finished or been replaced by a newer one.
///
/// Clones share one outcome; every clone that is polled gets woken.
#[derive(Debug, Clone)]
pub struct Completion {
    shared: Rc<RefCell<Shared>>,
}

impl Completion {
    pub(crate) fn pending() -> (Completion, Completer) {
        let shared = Rc::new(RefCell::new(Shared::default()));
        (
            Completion {
                shared: shared.clone(),
            },
            Completer { shared },
        )
    }

    pub fn outcome(&self) -> Option<AnimationOutcome> {
        self.shared.borrow().outcome
    }

    pub fn is_resolved(&self) -> bool {
        self.outcome().is_some()
    }
}

impl Future for Completion {
    type Output = AnimationOutcome;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut shared = self.shared.borrow_mut();
        match shared.outcome {
            Some(outcome) => Poll::Ready(outcome),
            None => {
                let waker = cx.waker();
                if !shared.wakers.iter().any(|w| w.will_wake(waker)) {
                    shared.wakers.push(waker.clone());
                }
                Poll::Pending
            }
        }
    }
}

/// Write side of a [`Completion`]. Dropping it unresolved counts as superseded.
#[derive(Debug)]
pub(crate) struct Completer {
    shared: Rc<RefCell<Shared>>,
}

impl Completer {
    pub(crate) fn resolve(self, outcome: AnimationOutcome) {
        self.settle(outcome);
    }

    fn settle(&self, outcome: AnimationOutcome) {
        let wakers = {
            let mut shared = self.shared.borrow_mut();
            if shared.outcome.is_some() {
                return;
            }
            shared.outcome = Some(outcome);
            std::mem::take(&mut shared.wakers)
        };
        for w in wakers {
            w.wake();
        }
    }
}

impl Drop for Completer {
    fn drop(&mut self) {
        self.settle(AnimationOutcome::Superseded);
    }
}

const SUBSTEP: f32 = 0.001; // seconds
const REST_DISTANCE: f32 = 0.01;
const REST_SPEED: f32 = 0.01;

#[derive(Debug, Clone, Copy)]
struct Active {
    id: AnimationId,
    request: AnimationRequest,
    from: Transform,
    elapsed: Duration,
}

/// Reference engine: damped springs per component, eased tweens, one animation at a time.
#[derive(Debug, Default)]
pub struct SpringEngine {
    current: Transform,
    velocity: [f32; 3],
    active: Option<Active>,
}

impl SpringEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_animating(&self) -> bool {
        self.active.is_some()
    }

    /// Steps time forward. Returns the id of the animation that came to rest, if any.
    pub fn advance(&mut self, dt: Duration) -> Option<AnimationId> {
        let mut active = self.active?;
        active.elapsed += dt;

        let at_rest = match active.request.motion {
            Motion::Spring(cfg) => self.step_spring(cfg, active.request.target, dt),
            Motion::Tween { duration, easing } => {
                let t = if duration.is_zero() {
                    1.0
                } else {
                    (active.elapsed.as_secs_f32() / duration.as_secs_f32()).min(1.0)
                };
                let eased = easing.apply(t);
                let from = active.from.components();
                let to = active.request.target.components();
                let mut c = [0.0; 3];
                for i in 0..3 {
                    c[i] = from[i] + (to[i] - from[i]) * eased;
                }
                self.current = Transform::from_components(c);
                self.velocity = [0.0; 3];
                t >= 1.0
            }
        };

        if at_rest {
            self.current = active.request.target;
            self.velocity = [0.0; 3];
            self.active = None;
            debug!("engine: animation {:?} at rest", active.id);
            Some(active.id)
        } else {
            self.active = Some(active);
            None
        }
    }

    fn step_spring(&mut self, cfg: SpringConfig, target: Transform, dt: Duration) -> bool {
        let mut pos = self.current.components();
        let goal = target.components();
        let steps = (dt.as_secs_f32() / SUBSTEP).ceil().max(1.0) as u32;
        let h = dt.as_secs_f32() / steps as f32;

        for _ in 0..steps {
            for i in 0..3 {
                let accel = -cfg.tension * (pos[i] - goal[i]) - cfg.friction * self.velocity[i];
                self.velocity[i] += accel * h;
                pos[i] += self.velocity[i] * h;
            }
        }
        self.current = Transform::from_components(pos);

        (0..3).all(|i| (pos[i] - goal[i]).abs() < REST_DISTANCE && self.velocity[i].abs() < REST_SPEED)
    }
}

impl AnimationEngine for SpringEngine {
    fn start(&mut self, id: AnimationId, request: AnimationRequest) {
        // springs keep their in-flight velocity; tweens restart from rest
        if matches!(request.motion, Motion::Tween { .. }) {
            self.velocity = [0.0; 3];
        }
        self.active = Some(Active {
            id,
            request,
            from: self.current,
            elapsed: Duration::ZERO,
        });
    }

    fn jump_to(&mut self, transform: Transform) {
        self.current = transform;
        self.velocity = [0.0; 3];
        self.active = None;
    }

    fn current(&self) -> Transform {
        self.current
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };
    use std::task::Wake;

    const FRAME: Duration = Duration::from_millis(16);

    fn run_to_rest(engine: &mut SpringEngine, max_frames: usize) -> Option<(AnimationId, usize)> {
        for frame in 0..max_frames {
            if let Some(id) = engine.advance(FRAME) {
                return Some((id, frame));
            }
        }
        None
    }

    #[test]
    fn transform_sanitizes_non_finite_values() {
        let t = Transform::new(f32::NAN, f32::INFINITY, 3.0);
        assert_eq!(t, Transform::new(0.0, 0.0, 3.0));
    }

    #[test]
    fn spring_settles_on_target() {
        let mut e = SpringEngine::new();
        e.jump_to(Transform::new(120.0, -40.0, 8.0));
        e.start(
            AnimationId(1),
            AnimationRequest {
                target: Transform::IDENTITY,
                motion: Motion::Spring(SpringConfig::ANIMATE_BACK),
            },
        );
        let (id, _) = run_to_rest(&mut e, 1000).expect("spring never settled");
        assert_eq!(id, AnimationId(1));
        assert_eq!(e.current(), Transform::IDENTITY);
        assert!(!e.is_animating());
    }

    #[test]
    fn soft_spring_overshoots() {
        let mut e = SpringEngine::new();
        e.jump_to(Transform::new(100.0, 0.0, 0.0));
        e.start(
            AnimationId(1),
            AnimationRequest {
                target: Transform::IDENTITY,
                motion: Motion::Spring(SpringConfig::ANIMATE_BACK),
            },
        );
        let mut min_x = f32::MAX;
        for _ in 0..60 {
            e.advance(FRAME);
            min_x = min_x.min(e.current().x);
        }
        assert!(min_x < 0.0, "expected overshoot past zero, min x was {min_x}");
    }

    #[test]
    fn tween_finishes_after_its_duration() {
        let mut e = SpringEngine::new();
        e.start(
            AnimationId(7),
            AnimationRequest {
                target: Transform::new(-900.0, 10.0, -20.0),
                motion: Motion::Tween {
                    duration: Duration::from_millis(100),
                    easing: Easing::EaseOut,
                },
            },
        );
        for _ in 0..6 {
            assert_eq!(e.advance(FRAME), None);
        }
        assert!(e.current().x < 0.0 && e.current().x > -900.0);
        assert_eq!(e.advance(FRAME), Some(AnimationId(7)));
        assert_eq!(e.current(), Transform::new(-900.0, 10.0, -20.0));
    }

    #[test]
    fn start_replaces_running_animation() {
        let mut e = SpringEngine::new();
        let tween = |x| AnimationRequest {
            target: Transform::new(x, 0.0, 0.0),
            motion: Motion::Tween {
                duration: Duration::from_millis(32),
                easing: Easing::Ease,
            },
        };
        e.start(AnimationId(1), tween(100.0));
        e.advance(FRAME);
        e.start(AnimationId(2), tween(-100.0));
        let (id, _) = run_to_rest(&mut e, 10).unwrap();
        assert_eq!(id, AnimationId(2));
        assert_eq!(e.current().x, -100.0);
    }

    #[test]
    fn completion_resolves_once() {
        let (c, done) = Completion::pending();
        assert!(!c.is_resolved());
        done.resolve(AnimationOutcome::Finished);
        assert_eq!(c.outcome(), Some(AnimationOutcome::Finished));
    }

    #[test]
    fn easing_curves_hit_endpoints_and_differ_early() {
        for easing in [Easing::Ease, Easing::EaseOut] {
            assert_eq!(easing.apply(0.0), 0.0);
            assert_eq!(easing.apply(1.0), 1.0);
            assert!(easing.apply(0.5) > 0.5);
        }
        // ease starts slower than ease-out
        assert!(Easing::Ease.apply(0.1) < Easing::EaseOut.apply(0.1));
    }

    #[derive(Default)]
    struct CountingWaker(AtomicUsize);

    impl Wake for CountingWaker {
        fn wake(self: Arc<Self>) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn every_polled_clone_is_woken() {
        let (a, done) = Completion::pending();
        let mut b = a.clone();
        let mut a = a;

        let wa = Arc::new(CountingWaker::default());
        let wb = Arc::new(CountingWaker::default());
        let (waker_a, waker_b) = (Waker::from(wa.clone()), Waker::from(wb.clone()));
        assert!(Pin::new(&mut a).poll(&mut Context::from_waker(&waker_a)).is_pending());
        assert!(Pin::new(&mut b).poll(&mut Context::from_waker(&waker_b)).is_pending());

        done.resolve(AnimationOutcome::Finished);
        assert_eq!(wa.0.load(Ordering::SeqCst), 1);
        assert_eq!(wb.0.load(Ordering::SeqCst), 1);
        assert_eq!(
            Pin::new(&mut b).poll(&mut Context::from_waker(&waker_b)),
            Poll::Ready(AnimationOutcome::Finished)
        );
    }

    #[test]
    fn dropped_completer_means_superseded() {
        let (c, done) = Completion::pending();
        drop(done);
        assert_eq!(c.outcome(), Some(AnimationOutcome::Superseded));
    }
}

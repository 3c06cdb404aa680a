//! The card state machine: pointer input in, transforms and callbacks out.
//!
//! ```text
//! Idle -> Dragging -> FlyingOut -> Hidden
//!                  \-> SnappingBack -> Idle
//! ```
//!
//! Every transition is started through [`AnimationEngine::start`] under a fresh
//! [`AnimationId`]. Only the most recent release-triggered transition is
//! tracked; starting another one supersedes it (last write wins).

use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::animation::{
    AnimationEngine, AnimationId, AnimationOutcome, AnimationRequest, Completer, Completion,
    Easing, Motion, SpringEngine, Transform,
};
use crate::callbacks::SwipeCallbacks;
use crate::config::{Physics, Profile, RequirementType, SwipeConfig};
use crate::error::CardError;
use crate::gestures::{self, Direction, RequirementTracker};
use crate::input::PointerEvent;
use crate::tracker::{GestureSampler, Sample};

const MIN_SPEED: f32 = 1e-3;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f32,
    pub height: f32,
}

impl Size {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    pub fn diagonal(&self) -> f32 {
        self.width.hypot(self.height)
    }
}

/// Geometry of a mounted card: the area it flies out of, and the card itself.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Mount {
    pub container: Size,
    pub element: Size,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Idle,
    Dragging,
    FlyingOut,
    SnappingBack,
    Hidden,
}

/// What the host draws.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CardView {
    pub transform: Transform,
    pub visible: bool,
    pub phase: Phase,
}

/// Lets exactly one release-like event through per gesture.
#[derive(Debug, Default, Clone)]
pub struct ReleaseLatch {
    armed: bool,
}

impl ReleaseLatch {
    pub fn arm(&mut self) {
        self.armed = true;
    }

    /// True for the first release after [`arm`](Self::arm), false afterwards.
    pub fn try_release(&mut self) -> bool {
        std::mem::replace(&mut self.armed, false)
    }
}

#[derive(Debug)]
enum Pending {
    FlyOut {
        dir: Direction,
        done: Option<Completer>,
    },
    Bounce {
        done: Option<Completer>,
    },
    Settle {
        done: Option<Completer>,
    },
}

pub struct GestureCardController<E: AnimationEngine> {
    config: SwipeConfig,
    physics: Physics,
    callbacks: SwipeCallbacks,
    engine: E,
    sampler: GestureSampler,
    latch: ReleaseLatch,
    requirement: RequirementTracker,
    phase: Phase,
    mount: Option<Mount>,
    visible: bool,
    drag_base: (f32, f32),
    pending: Option<(AnimationId, Pending)>,
    next_id: u64,
    rng: fastrand::Rng,
}

impl<E: AnimationEngine> GestureCardController<E> {
    pub fn new(profile: Profile, engine: E, callbacks: SwipeCallbacks) -> Self {
        Self {
            config: profile.card,
            physics: profile.physics,
            callbacks,
            engine,
            sampler: GestureSampler::new(),
            latch: ReleaseLatch::default(),
            requirement: RequirementTracker::default(),
            phase: Phase::Idle,
            mount: None,
            visible: true,
            drag_base: (0.0, 0.0),
            pending: None,
            next_id: 0,
            rng: fastrand::Rng::new(),
        }
    }

    /// Makes the fly-out rotation and programmatic disturbance reproducible.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = fastrand::Rng::with_seed(seed);
        self
    }

    pub fn config(&self) -> &SwipeConfig {
        &self.config
    }

    pub fn physics(&self) -> &Physics {
        &self.physics
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_mounted(&self) -> bool {
        self.mount.is_some()
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    /// Id of the release or imperative transition the controller is waiting on.
    pub fn awaiting(&self) -> Option<AnimationId> {
        self.pending.as_ref().map(|(id, _)| *id)
    }

    pub fn view(&self) -> CardView {
        CardView {
            transform: self.engine.current(),
            visible: self.visible,
            phase: self.phase,
        }
    }

    pub fn mount(&mut self, mount: Mount) {
        info!(
            "card mounted in {}x{} container",
            mount.container.width, mount.container.height
        );
        self.mount = Some(mount);
        self.visible = true;
        if self.config.hidden {
            self.hide_now(mount);
        }
    }

    pub fn unmount(&mut self) {
        self.pending = None;
        self.sampler.finish();
        self.latch = ReleaseLatch::default();
        self.phase = Phase::Idle;
        self.mount = None;
        debug!("card unmounted");
    }

    pub fn handle(&mut self, event: PointerEvent) {
        match event {
            PointerEvent::Down(s) => self.pointer_down(s),
            PointerEvent::Move(s) => self.pointer_move(s),
            PointerEvent::Up(s) | PointerEvent::Leave(s) => self.pointer_release(s),
        }
    }

    pub fn pointer_down(&mut self, sample: Sample) {
        if self.mount.is_none() {
            debug!("pointer down before mount; ignored");
            return;
        }
        match self.phase {
            Phase::FlyingOut | Phase::Hidden => {
                debug!("pointer down while {:?}; ignored until restore", self.phase);
                return;
            }
            Phase::Idle | Phase::SnappingBack | Phase::Dragging => {}
        }

        // a running snap-back is abandoned; the drag continues from wherever it got to
        self.pending = None;
        let current = self.engine.current();
        self.drag_base = (current.x, current.y);

        self.latch.arm();
        self.sampler.start(sample);
        self.requirement.reset();
        self.phase = Phase::Dragging;
    }

    pub fn pointer_move(&mut self, sample: Sample) {
        if self.phase != Phase::Dragging {
            return;
        }
        let Some(state) = self.sampler.push(sample) else {
            return;
        };

        if self.callbacks.wants_requirement() {
            let live = gestures::classify(&state, &self.config);
            if let Some(change) = self.requirement.update(live) {
                self.callbacks.requirement(change);
            }
        }

        let rotation = if self.config.drag_rotation_enabled() {
            let tilt = self.physics.max_tilt;
            (state.vx * self.physics.rotation_gain).clamp(-tilt, tilt)
        } else {
            0.0
        };
        let target = Transform::new(
            self.drag_base.0 + state.dx,
            self.drag_base.1 + state.dy,
            rotation,
        );
        self.animate(
            AnimationRequest {
                target,
                motion: Motion::Spring(self.physics.touch_responsive),
            },
            None,
        );
    }

    /// Pointer up and pointer leave both land here; only the first one counts.
    pub fn pointer_release(&mut self, sample: Sample) {
        if self.phase != Phase::Dragging {
            return;
        }
        if !self.latch.try_release() {
            debug!("duplicate release ignored");
            return;
        }

        let state = self.sampler.finish_at(sample);
        let requirement = self.config.swipe_requirement_type;

        if let Some(dir) = gestures::classify(&state, &self.config) {
            self.callbacks.swiped(dir);
            if self.config.flick_on_swipe && !self.config.prevents(dir) {
                let vector = gestures::metric(&state, requirement);
                let by_speed = requirement == RequirementType::Velocity;
                self.fly_out(dir, vector, by_speed, Easing::EaseOut, None);
                return;
            }
            debug!("swipe {dir} classified but not flicked");
        }
        self.snap_back(None);
    }

    /// Reports that the engine brought animation `id` to rest.
    pub fn animation_finished(&mut self, id: AnimationId) {
        let (awaited, pending) = match self.pending.take() {
            Some((awaited, pending)) if awaited == id => (awaited, pending),
            other => {
                self.pending = other;
                return;
            }
        };
        debug!("animation {awaited:?} finished");

        match pending {
            Pending::FlyOut { dir, done } => {
                self.visible = false;
                self.phase = Phase::Hidden;
                self.callbacks.left_screen(dir);
                if let Some(done) = done {
                    done.resolve(AnimationOutcome::Finished);
                }
            }
            Pending::Bounce { done } => {
                self.animate(
                    AnimationRequest {
                        target: Transform::IDENTITY,
                        motion: Motion::Spring(self.physics.animate_back),
                    },
                    Some(Pending::Settle { done }),
                );
            }
            Pending::Settle { done } => {
                self.phase = Phase::Idle;
                if let Some(done) = done {
                    done.resolve(AnimationOutcome::Finished);
                }
            }
        }
    }

    /// Flies the card out as if the user had swiped `dir`.
    ///
    /// `on_swipe` fires immediately; `on_card_left_screen` fires and the
    /// returned completion resolves once the card is off-screen.
    pub fn swipe(&mut self, dir: Direction) -> Result<Completion, CardError> {
        if self.mount.is_none() {
            debug!("swipe({dir}) before mount; ignored");
            return Err(CardError::NotMounted);
        }
        self.cancel_gesture();
        self.callbacks.swiped(dir);

        let power = self.physics.programmatic_power;
        let disturbance = (self.rng.f32() - 0.5) * self.physics.programmatic_disturbance;
        let vector = match dir {
            Direction::Right => (power, disturbance),
            Direction::Left => (-power, disturbance),
            Direction::Up => (disturbance, -power),
            Direction::Down => (disturbance, power),
        };
        let by_speed = self.config.swipe_requirement_type == RequirementType::Velocity;

        let (completion, done) = Completion::pending();
        self.fly_out(dir, vector, by_speed, Easing::Ease, Some(done));
        Ok(completion)
    }

    /// Brings a swiped or hidden card back to rest.
    pub fn restore_card(&mut self) -> Result<Completion, CardError> {
        if self.mount.is_none() {
            debug!("restore_card before mount; ignored");
            return Err(CardError::NotMounted);
        }
        self.cancel_gesture();
        self.visible = true;

        let (completion, done) = Completion::pending();
        self.snap_back(Some(done));
        Ok(completion)
    }

    /// Moves the card off-screen instantly. No callbacks fire.
    pub fn hide_card(&mut self) -> Result<(), CardError> {
        let Some(mount) = self.mount else {
            debug!("hide_card before mount; ignored");
            return Err(CardError::NotMounted);
        };
        self.cancel_gesture();
        self.hide_now(mount);
        Ok(())
    }

    fn hide_now(&mut self, mount: Mount) {
        self.pending = None;
        self.engine.jump_to(Transform::new(
            mount.container.width + mount.element.width,
            0.0,
            0.0,
        ));
        self.visible = false;
        self.phase = Phase::Hidden;
    }

    fn cancel_gesture(&mut self) {
        // a pointer release racing an imperative call must not start a second transition
        self.latch.try_release();
        if self.sampler.is_active() {
            self.sampler.finish();
        }
    }

    fn fly_out(
        &mut self,
        dir: Direction,
        vector: (f32, f32),
        by_speed: bool,
        easing: Easing,
        done: Option<Completer>,
    ) {
        let diagonal = self.mount.map_or(0.0, |m| m.container.diagonal());
        let speed = vector.0.hypot(vector.1);
        let usable = speed.is_finite() && speed > MIN_SPEED;
        let unit = if usable {
            (vector.0 / speed, vector.1 / speed)
        } else {
            dir.unit()
        };

        let from = self.engine.current();
        let duration = if by_speed && usable {
            let ms = (diagonal / speed * 1000.0).round() as u64;
            Duration::from_millis(ms.min(self.physics.max_animate_out_ms))
        } else {
            Duration::from_millis(self.physics.animate_out_ms)
        };
        let target = Transform::new(
            from.x + unit.0 * diagonal,
            from.y + unit.1 * diagonal,
            self.fly_out_rotation(from.rotation_deg),
        );
        debug!("fly-out {dir} to ({:.1}, {:.1}) over {duration:?}", target.x, target.y);

        self.phase = Phase::FlyingOut;
        self.animate(
            AnimationRequest {
                target,
                motion: Motion::Tween { duration, easing },
            },
            Some(Pending::FlyOut { dir, done }),
        );
    }

    fn fly_out_rotation(&mut self, current: f32) -> f32 {
        if self.config.disable_rotation {
            return 0.0;
        }
        let r = self.rng.f32();
        let power = self.physics.rotation_power;
        if current == 0.0 {
            (r - 0.5) * power
        } else if current > 0.0 {
            r * power / 2.0 + current
        } else {
            (r - 1.0) * power / 2.0 + current
        }
    }

    fn snap_back(&mut self, done: Option<Completer>) {
        let from = self.engine.current();
        let mut bounce = from.scaled(-self.physics.bounce_power);
        if self.config.disable_rotation {
            bounce.rotation_deg = 0.0;
        }
        let duration = Duration::from_millis(self.physics.snap_back_ms * 3 / 4);

        self.phase = Phase::SnappingBack;
        self.animate(
            AnimationRequest {
                target: bounce,
                motion: Motion::Tween {
                    duration,
                    easing: Easing::Ease,
                },
            },
            Some(Pending::Bounce { done }),
        );
    }

    fn animate(&mut self, request: AnimationRequest, pending: Option<Pending>) -> AnimationId {
        // dropping the previous completer resolves it as superseded
        if let Some((old, _)) = self.pending.take() {
            debug!("animation {old:?} superseded");
        }
        self.next_id += 1;
        let id = AnimationId(self.next_id);
        self.engine.start(id, request);
        self.pending = pending.map(|p| (id, p));
        id
    }
}

impl GestureCardController<SpringEngine> {
    /// Steps the reference engine and feeds any completion back in.
    pub fn advance(&mut self, dt: Duration) -> Option<AnimationId> {
        let id = self.engine.advance(dt)?;
        self.animation_finished(id);
        Some(id)
    }

    /// Runs frames until nothing is animating. Returns false if `max_frames` ran out first.
    pub fn settle(&mut self, frame: Duration, max_frames: usize) -> bool {
        for _ in 0..max_frames {
            if self.pending.is_none() && !self.engine.is_animating() {
                return true;
            }
            self.advance(frame);
        }
        self.pending.is_none() && !self.engine.is_animating()
    }
}

impl<E: AnimationEngine + std::fmt::Debug> std::fmt::Debug for GestureCardController<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GestureCardController")
            .field("phase", &self.phase)
            .field("visible", &self.visible)
            .field("mount", &self.mount)
            .field("awaiting", &self.awaiting())
            .field("engine", &self.engine)
            .finish_non_exhaustive()
    }
}

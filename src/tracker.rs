//! Gesture sampling: displacement from origin and rolling velocity.

use log::warn;

/// Elapsed time (seconds) under which two samples count as simultaneous.
const MIN_DT_SECS: f64 = 1e-4;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub x: f32,
    pub y: f32,
    pub timestamp_ms: f64,
}

impl Sample {
    pub fn new(x: f32, y: f32, timestamp_ms: f64) -> Self {
        Self { x, y, timestamp_ms }
    }

    fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.timestamp_ms.is_finite()
    }
}

/// Displacement (px) from the gesture origin and instantaneous velocity (px/s).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GestureState {
    pub dx: f32,
    pub dy: f32,
    pub vx: f32,
    pub vy: f32,
}

#[derive(Debug, Default)]
pub struct GestureSampler {
    origin: Option<Sample>,
    prior: Option<Sample>,
    state: GestureState,
}

impl GestureSampler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&mut self, sample: Sample) {
        if !sample.is_finite() {
            warn!("sampler: ignoring non-finite gesture origin {sample:?}");
            return;
        }
        self.origin = Some(sample);
        self.prior = None;
        self.state = GestureState::default();
    }

    pub fn is_active(&self) -> bool {
        self.origin.is_some()
    }

    pub fn state(&self) -> GestureState {
        self.state
    }

    /// Folds a move sample into the gesture. Returns `None` when no gesture is active.
    pub fn push(&mut self, sample: Sample) -> Option<GestureState> {
        let origin = self.origin?;
        if !sample.is_finite() {
            warn!("sampler: ignoring non-finite sample {sample:?}");
            return Some(self.state);
        }

        self.state.dx = sample.x - origin.x;
        self.state.dy = sample.y - origin.y;

        // first move after start has nothing to diff against
        let (vx, vy) = match self.prior {
            Some(prev) => velocity_between(&prev, &sample),
            None => (0.0, 0.0),
        };
        self.state.vx = vx;
        self.state.vy = vy;
        self.prior = Some(sample);

        Some(self.state)
    }

    /// Ends the gesture at the release position. Displacement follows the
    /// release point; velocity stays whatever the last move measured.
    pub fn finish_at(&mut self, release: Sample) -> GestureState {
        if let Some(origin) = self.origin {
            if release.is_finite() {
                self.state.dx = release.x - origin.x;
                self.state.dy = release.y - origin.y;
            }
        }
        self.finish()
    }

    /// Ends the gesture and hands back its final state.
    pub fn finish(&mut self) -> GestureState {
        let st = self.state;
        self.origin = None;
        self.prior = None;
        self.state = GestureState::default();
        st
    }
}

fn velocity_between(prev: &Sample, cur: &Sample) -> (f32, f32) {
    let dt = (cur.timestamp_ms - prev.timestamp_ms) / 1000.0;
    if dt < MIN_DT_SECS {
        return (0.0, 0.0);
    }
    let vx = ((cur.x - prev.x) as f64 / dt) as f32;
    let vy = ((cur.y - prev.y) as f64 / dt) as f32;
    if vx.is_finite() && vy.is_finite() {
        (vx, vy)
    } else {
        (0.0, 0.0)
    }
}

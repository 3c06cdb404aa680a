//! Replays a recorded pointer trace against a controller driving the
//! reference [`SpringEngine`], collecting every callback on a simulated clock.

use anyhow::{Result, anyhow};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::{
    cell::{Cell, RefCell},
    fs,
    path::Path,
    rc::Rc,
    time::Duration,
};

use crate::animation::{AnimationOutcome, Completion, SpringEngine};
use crate::callbacks::SwipeCallbacks;
use crate::config::Profile;
use crate::controller::{CardView, GestureCardController, Mount, Size};
use crate::gestures::Direction;
use crate::input::{InputSource, ListenerId, ListenerScope, PointerEvent};
use crate::tracker::Sample;

/// Upper bound on frames spent settling once the trace is exhausted.
const MAX_SETTLE_FRAMES: usize = 10_000;
/// Longest simulated span a trace may cover: one hour.
const MAX_TRACE_MS: f64 = 3_600_000.0;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum Step {
    Down { x: f32, y: f32, t: f64 },
    Move { x: f32, y: f32, t: f64 },
    Up { x: f32, y: f32, t: f64 },
    Leave { x: f32, y: f32, t: f64 },
    Swipe { dir: Direction },
    Restore,
    Hide,
    Wait { ms: u64 },
}

impl Step {
    fn timestamp(&self) -> Option<f64> {
        match *self {
            Step::Down { t, .. } | Step::Move { t, .. } | Step::Up { t, .. } | Step::Leave { t, .. } => {
                Some(t)
            }
            _ => None,
        }
    }

    fn pointer(&self) -> Option<PointerEvent> {
        match *self {
            Step::Down { x, y, t } => Some(PointerEvent::Down(Sample::new(x, y, t))),
            Step::Move { x, y, t } => Some(PointerEvent::Move(Sample::new(x, y, t))),
            Step::Up { x, y, t } => Some(PointerEvent::Up(Sample::new(x, y, t))),
            Step::Leave { x, y, t } => Some(PointerEvent::Leave(Sample::new(x, y, t))),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ReplayEvent {
    Swipe { dir: Direction, at_ms: f64 },
    CardLeftScreen { dir: Direction, at_ms: f64 },
    RequirementFulfilled { dir: Direction, at_ms: f64 },
    RequirementUnfulfilled { at_ms: f64 },
    Completed { op: &'static str, outcome: AnimationOutcome, at_ms: f64 },
    Rejected { op: &'static str, error: String },
}

#[derive(Debug, Clone, Copy)]
pub struct ReplayOptions {
    pub container: Size,
    pub element: Size,
    pub frame: Duration,
    pub seed: Option<u64>,
}

impl Default for ReplayOptions {
    fn default() -> Self {
        Self {
            container: Size::new(400.0, 800.0),
            element: Size::new(300.0, 450.0),
            frame: Duration::from_millis(16),
            seed: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReplayReport {
    pub events: Vec<ReplayEvent>,
    pub view: CardView,
    pub settled: bool,
    pub elapsed_ms: f64,
}

/// The trace itself, seen as an input source the card listens to.
#[derive(Debug, Default)]
struct TraceSource {
    next: u64,
    listening: Option<ListenerId>,
}

impl InputSource for TraceSource {
    fn listen(&mut self) -> ListenerId {
        self.next += 1;
        let id = ListenerId(self.next);
        self.listening = Some(id);
        id
    }

    fn unlisten(&mut self, id: ListenerId) {
        if self.listening == Some(id) {
            self.listening = None;
        }
    }
}

pub fn load_trace(path: &Path) -> Result<Vec<Step>> {
    let txt = fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read trace {}: {e}", path.display()))?;
    let steps: Vec<Step> = serde_json::from_str(&txt)
        .map_err(|e| anyhow!("failed to parse trace {}: {e}", path.display()))?;
    Ok(steps)
}

struct Session {
    card: GestureCardController<SpringEngine>,
    clock: Rc<Cell<f64>>,
    events: Rc<RefCell<Vec<ReplayEvent>>>,
    waiting: Vec<(&'static str, Completion)>,
    frame: Duration,
}

impl Session {
    fn now(&self) -> f64 {
        self.clock.get()
    }

    fn advance_to(&mut self, target_ms: f64) -> Result<()> {
        while self.now() < target_ms {
            let remaining = Duration::try_from_secs_f64((target_ms - self.now()) / 1000.0)?;
            let dt = remaining.min(self.frame);
            if dt.is_zero() {
                break;
            }
            self.card.advance(dt);
            self.clock.set(self.now() + dt.as_secs_f64() * 1000.0);
            self.collect_completions();
        }
        Ok(())
    }

    fn collect_completions(&mut self) {
        let at_ms = self.now();
        let mut events = self.events.borrow_mut();
        self.waiting.retain(|(op, c)| match c.outcome() {
            Some(outcome) => {
                events.push(ReplayEvent::Completed {
                    op: *op,
                    outcome,
                    at_ms,
                });
                false
            }
            None => true,
        });
    }

    fn imperative(&mut self, op: &'static str, result: Result<Option<Completion>, crate::error::CardError>) {
        match result {
            Ok(Some(c)) => self.waiting.push((op, c)),
            Ok(None) => {}
            Err(e) => self.events.borrow_mut().push(ReplayEvent::Rejected {
                op,
                error: e.to_string(),
            }),
        }
        // superseded completions resolve synchronously
        self.collect_completions();
    }
}

fn recording_callbacks(clock: &Rc<Cell<f64>>, events: &Rc<RefCell<Vec<ReplayEvent>>>) -> SwipeCallbacks {
    let (c1, e1) = (clock.clone(), events.clone());
    let (c2, e2) = (clock.clone(), events.clone());
    let (c3, e3) = (clock.clone(), events.clone());
    let (c4, e4) = (clock.clone(), events.clone());
    SwipeCallbacks::new()
        .on_swipe(move |dir| {
            e1.borrow_mut().push(ReplayEvent::Swipe { dir, at_ms: c1.get() })
        })
        .on_card_left_screen(move |dir| {
            e2.borrow_mut()
                .push(ReplayEvent::CardLeftScreen { dir, at_ms: c2.get() })
        })
        .on_swipe_requirement_fulfilled(move |dir| {
            e3.borrow_mut()
                .push(ReplayEvent::RequirementFulfilled { dir, at_ms: c3.get() })
        })
        .on_swipe_requirement_unfulfilled(move || {
            e4.borrow_mut()
                .push(ReplayEvent::RequirementUnfulfilled { at_ms: c4.get() })
        })
}

/// Checks that pointer timestamps are finite, ordered and that the whole
/// trace fits in [`MAX_TRACE_MS`] of simulated time.
fn check_timeline(steps: &[Step]) -> Result<()> {
    let mut last = 0.0f64;
    let mut waited = 0.0f64;
    for (i, step) in steps.iter().enumerate() {
        if let Step::Wait { ms } = step {
            waited += *ms as f64;
        }
        if let Some(t) = step.timestamp() {
            if !t.is_finite() || t < 0.0 {
                return Err(anyhow!("step {i}: timestamp {t} is not a valid time"));
            }
            if t < last {
                return Err(anyhow!("step {i}: timestamp {t} goes back before {last}"));
            }
            last = t;
        }
        if last + waited > MAX_TRACE_MS {
            return Err(anyhow!(
                "step {i}: trace spans more than {MAX_TRACE_MS} ms of simulated time"
            ));
        }
    }
    Ok(())
}

pub fn run(profile: Profile, steps: &[Step], opts: &ReplayOptions) -> Result<ReplayReport> {
    if opts.frame.is_zero() {
        return Err(anyhow!("replay frame duration must be positive"));
    }
    check_timeline(steps)?;

    let clock = Rc::new(Cell::new(0.0));
    let events = Rc::new(RefCell::new(Vec::new()));
    let callbacks = recording_callbacks(&clock, &events);

    let mut card = GestureCardController::new(profile, SpringEngine::new(), callbacks);
    if let Some(seed) = opts.seed {
        card = card.with_seed(seed);
    }
    card.mount(Mount {
        container: opts.container,
        element: opts.element,
    });

    let source = Rc::new(RefCell::new(TraceSource::default()));
    let scope = ListenerScope::acquire(source.clone());
    info!("replay: {} steps, listener {:?}", steps.len(), scope.id());

    let mut session = Session {
        card,
        clock,
        events,
        waiting: Vec::new(),
        frame: opts.frame,
    };

    for step in steps {
        if let Some(ev) = step.pointer() {
            session.advance_to(ev.sample().timestamp_ms)?;
            if source.borrow().listening.is_some() {
                session.card.handle(ev);
            }
            continue;
        }
        match step {
            Step::Swipe { dir } => {
                let r = session.card.swipe(*dir).map(Some);
                session.imperative("swipe", r);
            }
            Step::Restore => {
                let r = session.card.restore_card().map(Some);
                session.imperative("restore", r);
            }
            Step::Hide => {
                let r = session.card.hide_card().map(|()| None);
                session.imperative("hide", r);
            }
            Step::Wait { ms } => {
                let target = session.now() + *ms as f64;
                session.advance_to(target)?;
            }
            _ => {}
        }
    }

    let mut settled = false;
    for _ in 0..MAX_SETTLE_FRAMES {
        if session.card.awaiting().is_none() && !session.card.engine().is_animating() {
            settled = true;
            break;
        }
        let target = session.now() + session.frame.as_secs_f64() * 1000.0;
        session.advance_to(target)?;
    }
    if !settled {
        warn!("replay: card still animating after {MAX_SETTLE_FRAMES} frames");
    }
    let view = session.card.view();
    drop(scope);
    session.card.unmount();

    let elapsed_ms = session.now();
    let events = session.events.borrow().clone();
    Ok(ReplayReport {
        events,
        view,
        settled,
        elapsed_ms,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn steps(json: &str) -> Vec<Step> {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn parses_tagged_steps() {
        let s = steps(
            r#"[{"op":"down","x":1,"y":2,"t":0},{"op":"swipe","dir":"up"},{"op":"restore"},{"op":"wait","ms":50}]"#,
        );
        assert_eq!(s[0], Step::Down { x: 1.0, y: 2.0, t: 0.0 });
        assert_eq!(s[1], Step::Swipe { dir: Direction::Up });
        assert_eq!(s[2], Step::Restore);
        assert_eq!(s[3], Step::Wait { ms: 50 });
    }

    #[test]
    fn flick_left_reports_in_order() {
        let s = steps(
            r#"[
                {"op":"down","x":200,"y":300,"t":0},
                {"op":"move","x":190,"y":300,"t":16},
                {"op":"move","x":150,"y":302,"t":32},
                {"op":"move","x":90,"y":305,"t":48},
                {"op":"up","x":90,"y":305,"t":50},
                {"op":"leave","x":90,"y":305,"t":51}
            ]"#,
        );
        let report = run(Profile::default(), &s, &ReplayOptions::default()).unwrap();

        let swipe_at = report
            .events
            .iter()
            .position(|e| matches!(e, ReplayEvent::Swipe { dir: Direction::Left, .. }))
            .expect("no swipe");
        let left_at = report
            .events
            .iter()
            .position(|e| matches!(e, ReplayEvent::CardLeftScreen { dir: Direction::Left, .. }))
            .expect("card never left");
        assert!(swipe_at < left_at);
        assert_eq!(
            report.events.iter().filter(|e| matches!(e, ReplayEvent::Swipe { .. })).count(),
            1
        );
        assert!(report.settled);
        assert!(!report.view.visible);
        assert!(report.view.transform.x < -400.0);
    }

    #[test]
    fn swipe_then_restore_returns_to_identity() {
        let s = steps(r#"[{"op":"swipe","dir":"right"},{"op":"wait","ms":2000},{"op":"restore"}]"#);
        let opts = ReplayOptions {
            seed: Some(3),
            ..ReplayOptions::default()
        };
        let report = run(Profile::default(), &s, &opts).unwrap();

        assert!(report.settled);
        assert!(report.view.visible);
        assert!(report.view.transform.approx_eq(&crate::animation::Transform::IDENTITY, 0.01));
        let completed: Vec<_> = report
            .events
            .iter()
            .filter_map(|e| match e {
                ReplayEvent::Completed { op, outcome, .. } => Some((*op, *outcome)),
                _ => None,
            })
            .collect();
        assert_eq!(
            completed,
            vec![
                ("swipe", AnimationOutcome::Finished),
                ("restore", AnimationOutcome::Finished)
            ]
        );
    }

    #[test]
    fn rejects_unreachable_timestamps() {
        let opts = ReplayOptions::default();
        let far = steps(r#"[{"op":"down","x":0,"y":0,"t":1e300}]"#);
        assert!(run(Profile::default(), &far, &opts).is_err());

        let nan = [Step::Down {
            x: 0.0,
            y: 0.0,
            t: f64::NAN,
        }];
        assert!(run(Profile::default(), &nan, &opts).is_err());

        let long_wait = steps(r#"[{"op":"wait","ms":18446744073709551615}]"#);
        assert!(run(Profile::default(), &long_wait, &opts).is_err());
    }

    #[test]
    fn rejects_timestamps_going_backwards() {
        let s = steps(
            r#"[{"op":"down","x":0,"y":0,"t":100},{"op":"move","x":5,"y":0,"t":40}]"#,
        );
        let err = run(Profile::default(), &s, &ReplayOptions::default()).unwrap_err();
        assert!(err.to_string().contains("goes back"), "{err}");
    }

    #[test]
    fn rejects_zero_frame() {
        let opts = ReplayOptions {
            frame: Duration::ZERO,
            ..ReplayOptions::default()
        };
        assert!(run(Profile::default(), &[], &opts).is_err());
    }
}

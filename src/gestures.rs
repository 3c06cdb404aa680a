//! Direction classification over a sampled gesture.
//!
//! Screen coordinates: x grows to the right, y grows downward, so a positive
//! vertical component classifies as [`Direction::Down`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::{RequirementType, SwipeConfig};
use crate::error::ConfigError;
use crate::tracker::GestureState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Left,
    Right,
    Up,
    Down,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Left => "left",
            Direction::Right => "right",
            Direction::Up => "up",
            Direction::Down => "down",
        }
    }

    /// Unit vector pointing along this direction in screen coordinates.
    pub fn unit(self) -> (f32, f32) {
        match self {
            Direction::Left => (-1.0, 0.0),
            Direction::Right => (1.0, 0.0),
            Direction::Up => (0.0, -1.0),
            Direction::Down => (0.0, 1.0),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "left" => Ok(Direction::Left),
            "right" => Ok(Direction::Right),
            "up" => Ok(Direction::Up),
            "down" => Ok(Direction::Down),
            _ => Err(ConfigError::UnknownDirection(s.to_string())),
        }
    }
}

/// Picks the gesture component the config asks for: velocity or displacement.
pub fn metric(state: &GestureState, requirement: RequirementType) -> (f32, f32) {
    match requirement {
        RequirementType::Velocity => (state.vx, state.vy),
        RequirementType::Position => (state.dx, state.dy),
    }
}

/// Classifies a gesture. `None` means the threshold was not exceeded.
pub fn classify(state: &GestureState, cfg: &SwipeConfig) -> Option<Direction> {
    let (x, y) = metric(state, cfg.swipe_requirement_type);
    let ax = x.abs();
    let ay = y.abs();

    // tie goes to the horizontal axis
    if ax >= ay {
        if ax > cfg.swipe_threshold {
            return Some(if x > 0.0 {
                Direction::Right
            } else {
                Direction::Left
            });
        }
    } else if ay > cfg.swipe_threshold {
        return Some(if y > 0.0 {
            Direction::Down
        } else {
            Direction::Up
        });
    }
    None
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    Fulfilled(Direction),
    Unfulfilled,
}

/// Edge-triggered view of the live classification during a drag.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct RequirementTracker {
    current: Option<Direction>,
}

impl RequirementTracker {
    pub fn reset(&mut self) {
        self.current = None;
    }

    pub fn update(&mut self, live: Option<Direction>) -> Option<Requirement> {
        if live == self.current {
            return None;
        }
        self.current = live;
        Some(match live {
            Some(dir) => Requirement::Fulfilled(dir),
            None => Requirement::Unfulfilled,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn velocity(vx: f32, vy: f32) -> GestureState {
        GestureState {
            vx,
            vy,
            ..GestureState::default()
        }
    }

    fn displacement(dx: f32, dy: f32) -> GestureState {
        GestureState {
            dx,
            dy,
            ..GestureState::default()
        }
    }

    #[test]
    fn classifies_by_velocity_in_screen_coordinates() {
        let cfg = SwipeConfig::default();
        assert_eq!(classify(&velocity(500.0, 10.0), &cfg), Some(Direction::Right));
        assert_eq!(classify(&velocity(-500.0, 10.0), &cfg), Some(Direction::Left));
        assert_eq!(classify(&velocity(0.0, 800.0), &cfg), Some(Direction::Down));
        assert_eq!(classify(&velocity(20.0, -800.0), &cfg), Some(Direction::Up));
    }

    #[test]
    fn threshold_must_be_exceeded() {
        let cfg = SwipeConfig::default();
        assert_eq!(classify(&velocity(cfg.swipe_threshold, 0.0), &cfg), None);
        assert_eq!(classify(&velocity(0.0, -cfg.swipe_threshold), &cfg), None);
        assert_eq!(
            classify(&velocity(cfg.swipe_threshold + 0.5, 0.0), &cfg),
            Some(Direction::Right)
        );
    }

    #[test]
    fn tie_favours_horizontal_axis() {
        let cfg = SwipeConfig::default();
        assert_eq!(classify(&velocity(-400.0, 400.0), &cfg), Some(Direction::Left));
    }

    #[test]
    fn smaller_axis_is_never_consulted() {
        // dominant x under threshold; y is smaller so never consulted
        let cfg = SwipeConfig::default();
        assert_eq!(classify(&velocity(250.0, 200.0), &cfg), None);
    }

    #[test]
    fn position_requirement_uses_displacement() {
        let cfg = SwipeConfig {
            swipe_requirement_type: RequirementType::Position,
            swipe_threshold: 100.0,
            ..SwipeConfig::default()
        };
        let mut st = displacement(-150.0, 20.0);
        st.vx = 5000.0;
        assert_eq!(classify(&st, &cfg), Some(Direction::Left));
        assert_eq!(classify(&velocity(5000.0, 0.0), &cfg), None);
    }

    #[test]
    fn requirement_tracker_is_edge_triggered() {
        let mut t = RequirementTracker::default();
        assert_eq!(t.update(None), None);
        assert_eq!(
            t.update(Some(Direction::Left)),
            Some(Requirement::Fulfilled(Direction::Left))
        );
        assert_eq!(t.update(Some(Direction::Left)), None);
        assert_eq!(
            t.update(Some(Direction::Up)),
            Some(Requirement::Fulfilled(Direction::Up))
        );
        assert_eq!(t.update(None), Some(Requirement::Unfulfilled));
        assert_eq!(t.update(None), None);
    }

    #[test]
    fn direction_parses_case_insensitively() {
        assert_eq!("LEFT".parse::<Direction>().ok(), Some(Direction::Left));
        assert!("sideways".parse::<Direction>().is_err());
    }
}

//! Headless swipe-card controller: samples pointer gestures, classifies them
//! into swipe directions and drives fly-out / snap-back transitions on a
//! pluggable animation engine.

pub mod animation;
pub mod callbacks;
pub mod cli;
pub mod config;
pub mod controller;
pub mod error;
pub mod gestures;
pub mod input;
pub mod logging;
pub mod replay;
pub mod tracker;

pub use animation::{
    AnimationEngine, AnimationId, AnimationOutcome, AnimationRequest, Completion, Easing, Motion,
    SpringEngine, Transform,
};
pub use callbacks::SwipeCallbacks;
pub use config::{Physics, Profile, RequirementType, SwipeConfig};
pub use controller::{CardView, GestureCardController, Mount, Phase, Size};
pub use error::{CardError, ConfigError};
pub use gestures::Direction;
pub use input::PointerEvent;
pub use tracker::{GestureState, Sample};

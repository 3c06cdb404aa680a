use thiserror::Error;

/// Precondition failures of the imperative card surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CardError {
    #[error("card element is not mounted yet")]
    NotMounted,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("swipe_threshold must be a finite, non-negative number (got {0})")]
    InvalidThreshold(f32),
    #[error("physics.{field} must be finite and positive (got {value})")]
    InvalidPhysics { field: &'static str, value: f32 },
    #[error("unknown direction '{0}' (expected left, right, up or down)")]
    UnknownDirection(String),
}

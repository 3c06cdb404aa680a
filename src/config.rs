use anyhow::{Result, anyhow};
use directories::UserDirs;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::error::ConfigError;
use crate::gestures::Direction;

pub const DEFAULT_VELOCITY_THRESHOLD: f32 = 300.0; // px/s
/// Absolute distance in px, independent of the container size.
pub const DEFAULT_POSITION_THRESHOLD: f32 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequirementType {
    #[default]
    Velocity,
    Position,
}

impl RequirementType {
    pub fn default_threshold(self) -> f32 {
        match self {
            RequirementType::Velocity => DEFAULT_VELOCITY_THRESHOLD,
            RequirementType::Position => DEFAULT_POSITION_THRESHOLD,
        }
    }
}

/// Per-card swipe behaviour. Resolved once and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SwipeConfig {
    pub flick_on_swipe: bool,
    pub prevent_swipe: Vec<Direction>,
    pub swipe_requirement_type: RequirementType,
    pub swipe_threshold: f32,
    pub disable_rotation: bool,
    pub disable_drag_rotation: bool,
    pub hidden: bool,
}

impl Default for SwipeConfig {
    fn default() -> Self {
        Self {
            flick_on_swipe: true,
            prevent_swipe: Vec::new(),
            swipe_requirement_type: RequirementType::Velocity,
            swipe_threshold: DEFAULT_VELOCITY_THRESHOLD,
            disable_rotation: false,
            disable_drag_rotation: false,
            hidden: false,
        }
    }
}

impl SwipeConfig {
    pub fn prevents(&self, dir: Direction) -> bool {
        self.prevent_swipe.contains(&dir)
    }

    pub fn drag_rotation_enabled(&self) -> bool {
        !(self.disable_rotation || self.disable_drag_rotation)
    }
}

// the threshold default depends on the requirement type, so it is resolved after parsing
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RawCard {
    flick_on_swipe: Option<bool>,
    prevent_swipe: Vec<Direction>,
    swipe_requirement_type: RequirementType,
    swipe_threshold: Option<f32>,
    disable_rotation: bool,
    disable_drag_rotation: bool,
    hidden: bool,
}

impl From<RawCard> for SwipeConfig {
    fn from(raw: RawCard) -> Self {
        let mut prevent_swipe = raw.prevent_swipe;
        prevent_swipe.sort_by_key(|d| d.as_str());
        prevent_swipe.dedup();
        Self {
            flick_on_swipe: raw.flick_on_swipe.unwrap_or(true),
            prevent_swipe,
            swipe_requirement_type: raw.swipe_requirement_type,
            swipe_threshold: raw
                .swipe_threshold
                .unwrap_or_else(|| raw.swipe_requirement_type.default_threshold()),
            disable_rotation: raw.disable_rotation,
            disable_drag_rotation: raw.disable_drag_rotation,
            hidden: raw.hidden,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpringConfig {
    pub tension: f32,
    pub friction: f32,
}

impl SpringConfig {
    pub const TOUCH_RESPONSIVE: SpringConfig = SpringConfig {
        tension: 2000.0,
        friction: 50.0,
    };
    pub const ANIMATE_BACK: SpringConfig = SpringConfig {
        tension: 200.0,
        friction: 10.0,
    };
}

/// Animation tuning shared by drag follow, fly-out and snap-back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Physics {
    /// Drag tilt limit in degrees.
    pub max_tilt: f32,
    /// Degrees of tilt per px/s of horizontal velocity.
    pub rotation_gain: f32,
    pub bounce_power: f32,
    pub snap_back_ms: u64,
    /// Fly-out duration when there is no usable velocity.
    pub animate_out_ms: u64,
    pub max_animate_out_ms: u64,
    /// Span of the random fly-out rotation, in degrees.
    pub rotation_power: f32,
    pub programmatic_power: f32,
    pub programmatic_disturbance: f32,
    pub touch_responsive: SpringConfig,
    pub animate_back: SpringConfig,
}

impl Default for Physics {
    fn default() -> Self {
        Self {
            max_tilt: 15.0,
            rotation_gain: 0.005,
            bounce_power: 0.2,
            snap_back_ms: 300,
            animate_out_ms: 100,
            max_animate_out_ms: 1000,
            rotation_power: 200.0,
            programmatic_power: 1000.0,
            programmatic_disturbance: 100.0,
            touch_responsive: SpringConfig::TOUCH_RESPONSIVE,
            animate_back: SpringConfig::ANIMATE_BACK,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RawProfile {
    card: RawCard,
    physics: Physics,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Profile {
    pub card: SwipeConfig,
    pub physics: Physics,
}

impl Profile {
    pub fn from_toml(txt: &str) -> Result<Self> {
        let raw: RawProfile = toml::from_str(txt)?;
        let profile = Profile {
            card: raw.card.into(),
            physics: raw.physics,
        };
        validate_profile(&profile)?;
        Ok(profile)
    }

    /// Strict load: any read, parse or validation problem is an error.
    pub fn load(path: &Path) -> Result<Self> {
        let txt = fs::read_to_string(path)
            .map_err(|e| anyhow!("failed to read {}: {e}", path.display()))?;
        Self::from_toml(&txt).map_err(|e| anyhow!("failed to load {}: {e}", path.display()))
    }

    /// Lenient load: falls back to the built-in defaults on any problem.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(p) => {
                info!("loaded profile from {}", path.display());
                p
            }
            Err(e) => {
                warn!("{e}; using default profile");
                Self::default()
            }
        }
    }
}

fn validate_profile(p: &Profile) -> std::result::Result<(), ConfigError> {
    let th = p.card.swipe_threshold;
    if !th.is_finite() || th < 0.0 {
        return Err(ConfigError::InvalidThreshold(th));
    }

    let ph = &p.physics;
    let checks: [(&'static str, f32); 9] = [
        ("max_tilt", ph.max_tilt),
        ("snap_back_ms", ph.snap_back_ms as f32),
        ("animate_out_ms", ph.animate_out_ms as f32),
        ("max_animate_out_ms", ph.max_animate_out_ms as f32),
        ("programmatic_power", ph.programmatic_power),
        ("touch_responsive.tension", ph.touch_responsive.tension),
        ("touch_responsive.friction", ph.touch_responsive.friction),
        ("animate_back.tension", ph.animate_back.tension),
        ("animate_back.friction", ph.animate_back.friction),
    ];
    for (field, value) in checks {
        if !value.is_finite() || value <= 0.0 {
            return Err(ConfigError::InvalidPhysics { field, value });
        }
    }
    // these may legitimately be zero
    for (field, value) in [
        ("rotation_gain", ph.rotation_gain),
        ("bounce_power", ph.bounce_power),
        ("rotation_power", ph.rotation_power),
        ("programmatic_disturbance", ph.programmatic_disturbance),
    ] {
        if !value.is_finite() || value < 0.0 {
            return Err(ConfigError::InvalidPhysics { field, value });
        }
    }
    Ok(())
}

pub fn default_profile_text() -> &'static str {
    include_str!("../profiles/default.toml")
}

/// `~/.config/swipecard/config.toml`, if a home directory can be found.
pub fn default_config_path() -> Option<PathBuf> {
    let home = UserDirs::new()?.home_dir().to_path_buf();
    Some(home.join(".config").join("swipecard").join("config.toml"))
}

/// Writes the default profile to `path` unless a file is already there.
/// Returns whether anything was written.
pub fn install_default(path: &Path) -> Result<bool> {
    if path.exists() {
        return Ok(false);
    }
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    fs::write(path, default_profile_text())?;
    info!("installed default profile at {}", path.display());
    Ok(true)
}

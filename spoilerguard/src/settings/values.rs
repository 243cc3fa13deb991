//! The merged settings view and the raw overrides that are persisted.
//!
//! [`Settings`] is never stored. It is derived on read by layering a preset's
//! [`SettingsOverrides`] and then the user's overrides over [`Settings::default`].

use serde::{Deserialize, Serialize};

use super::presets;
use crate::provider::WatchState;

/// Played percentage at or above which an item counts as watched in
/// [`WatchedThreshold::NinetyPercent`] mode.
pub const WATCHED_PERCENTAGE: f64 = 90.0;

/// Default per-item reveal duration before an item re-hides on its own.
pub const DEFAULT_REVEAL_DURATION_MS: u64 = 10_000;

/// When an episode counts as watched.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WatchedThreshold {
    /// Only the explicit played flag counts.
    #[default]
    Played,
    /// The played flag or at least [`WATCHED_PERCENTAGE`] progress counts.
    NinetyPercent,
}

impl WatchedThreshold {
    /// Returns whether `state` satisfies this threshold.
    pub fn is_watched(self, state: &WatchState) -> bool {
        match self {
            Self::Played => state.played,
            Self::NinetyPercent => {
                state.played
                    || state
                        .played_percentage
                        .is_some_and(|pct| pct >= WATCHED_PERCENTAGE)
            }
        }
    }
}

/// How artwork of a redacted item is hidden.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ArtworkPolicy {
    #[default]
    Blur,
    Generic,
}

/// UI surface an item is rendered on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Surface {
    Home,
    Search,
    PlayerOverlay,
    Detail,
    Calendar,
}

/// Per-surface switches. Detail pages are always evaluated.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SurfaceFlags {
    pub home: bool,
    pub search: bool,
    pub player_overlay: bool,
    pub calendar: bool,
}

impl SurfaceFlags {
    /// Returns whether decisions run on `surface`.
    pub fn covers(&self, surface: Surface) -> bool {
        match surface {
            Surface::Home => self.home,
            Surface::Search => self.search,
            Surface::PlayerOverlay => self.player_overlay,
            Surface::Calendar => self.calendar,
            Surface::Detail => true,
        }
    }
}

impl Default for SurfaceFlags {
    fn default() -> Self {
        Self {
            home: true,
            search: true,
            player_overlay: true,
            calendar: true,
        }
    }
}

/// Effective settings after merging defaults, preset and user overrides.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub preset_name: String,
    pub watched_threshold: WatchedThreshold,
    pub artwork_policy: ArtworkPolicy,
    pub hide_runtime: bool,
    pub hide_air_date: bool,
    pub hide_overview: bool,
    pub surfaces: SurfaceFlags,
    pub reveal_duration_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            preset_name: presets::DEFAULT_PRESET.to_string(),
            watched_threshold: WatchedThreshold::default(),
            artwork_policy: ArtworkPolicy::default(),
            hide_runtime: false,
            hide_air_date: false,
            hide_overview: true,
            surfaces: SurfaceFlags::default(),
            reveal_duration_ms: DEFAULT_REVEAL_DURATION_MS,
        }
    }
}

impl Settings {
    /// Merges built-in defaults < preset < `overrides`.
    ///
    /// The preset is `preset_name` when given, else the one named in
    /// `overrides`, else [`presets::DEFAULT_PRESET`]. Unknown names fall back
    /// to the default preset.
    pub fn resolve(overrides: &SettingsOverrides, preset_name: Option<&str>) -> Self {
        let requested = preset_name
            .or(overrides.preset_name.as_deref())
            .unwrap_or(presets::DEFAULT_PRESET);
        let (name, preset) = match presets::preset_overrides(requested) {
            Some(preset) => (requested.to_ascii_lowercase(), preset),
            None => {
                tracing::debug!(preset = requested, "unknown preset, using default");
                (
                    presets::DEFAULT_PRESET.to_string(),
                    presets::default_preset_overrides(),
                )
            }
        };

        let mut settings = Self::default();
        preset.apply_to(&mut settings);
        overrides.apply_to(&mut settings);
        settings.preset_name = name;
        settings
    }
}

// =============================================================================
// Overrides
// =============================================================================

/// Partial per-surface switches.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SurfaceOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub home: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub player_overlay: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub calendar: Option<bool>,
}

impl SurfaceOverrides {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    fn apply_to(&self, flags: &mut SurfaceFlags) {
        set_if(&mut flags.home, self.home);
        set_if(&mut flags.search, self.search);
        set_if(&mut flags.player_overlay, self.player_overlay);
        set_if(&mut flags.calendar, self.calendar);
    }

    fn merge(&mut self, other: Self) {
        self.home = other.home.or(self.home);
        self.search = other.search.or(self.search);
        self.player_overlay = other.player_overlay.or(self.player_overlay);
        self.calendar = other.calendar.or(self.calendar);
    }
}

/// Raw user overrides. Every field is optional; unset fields inherit.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SettingsOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preset_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub watched_threshold: Option<WatchedThreshold>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artwork_policy: Option<ArtworkPolicy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hide_runtime: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hide_air_date: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hide_overview: Option<bool>,
    #[serde(skip_serializing_if = "SurfaceOverrides::is_empty")]
    pub surfaces: SurfaceOverrides,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reveal_duration_ms: Option<u64>,
}

impl SettingsOverrides {
    /// Writes every set field into `settings`. `preset_name` is not applied here.
    pub fn apply_to(&self, settings: &mut Settings) {
        set_if(&mut settings.watched_threshold, self.watched_threshold);
        set_if(&mut settings.artwork_policy, self.artwork_policy);
        set_if(&mut settings.hide_runtime, self.hide_runtime);
        set_if(&mut settings.hide_air_date, self.hide_air_date);
        set_if(&mut settings.hide_overview, self.hide_overview);
        set_if(&mut settings.reveal_duration_ms, self.reveal_duration_ms);
        self.surfaces.apply_to(&mut settings.surfaces);
    }

    /// Merges a partial update: set fields in `other` replace, unset fields keep.
    pub fn merge(&mut self, other: Self) {
        if other.preset_name.is_some() {
            self.preset_name = other.preset_name;
        }
        self.watched_threshold = other.watched_threshold.or(self.watched_threshold);
        self.artwork_policy = other.artwork_policy.or(self.artwork_policy);
        self.hide_runtime = other.hide_runtime.or(self.hide_runtime);
        self.hide_air_date = other.hide_air_date.or(self.hide_air_date);
        self.hide_overview = other.hide_overview.or(self.hide_overview);
        self.reveal_duration_ms = other.reveal_duration_ms.or(self.reveal_duration_ms);
        self.surfaces.merge(other.surfaces);
    }
}

fn set_if<T>(slot: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *slot = value;
    }
}

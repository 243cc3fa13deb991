//! Named presets: marker types bundling default settings.
//!
//! Each preset is a zero-sized marker implementing [`Preset`], which supplies
//! the overrides it layers over the built-in defaults. Lookup by name is
//! case-insensitive; unknown names are the caller's cue to fall back to
//! [`DEFAULT_PRESET`].
//!
//! ```rust
//! use spoilerguard::{ArtworkPolicy, Preset, Settings, SettingsOverrides, Strict};
//!
//! let mut settings = Settings::default();
//! Strict::overrides().apply_to(&mut settings);
//! assert_eq!(settings.artwork_policy, ArtworkPolicy::Generic);
//! ```

use super::values::{ArtworkPolicy, SettingsOverrides, SurfaceOverrides, WatchedThreshold};

/// Name of the preset used when none, or an unknown one, is configured.
pub const DEFAULT_PRESET: &str = Balanced::NAME;

// =============================================================================
// Preset trait
// =============================================================================

/// Associates a preset marker with its name and settings bundle.
pub trait Preset {
    /// Lowercase name used in persisted settings.
    const NAME: &'static str;

    /// Returns the overrides this preset layers over the built-in defaults.
    fn overrides() -> SettingsOverrides;
}

// =============================================================================
// Built-in presets
// =============================================================================

/// The built-in defaults, unchanged.
#[derive(Clone, Copy, Debug)]
pub struct Balanced;

impl Preset for Balanced {
    const NAME: &'static str = "balanced";

    fn overrides() -> SettingsOverrides {
        SettingsOverrides::default()
    }
}

/// Generic artwork and hidden runtimes.
#[derive(Clone, Copy, Debug)]
pub struct Strict;

impl Preset for Strict {
    const NAME: &'static str = "strict";

    fn overrides() -> SettingsOverrides {
        SettingsOverrides {
            artwork_policy: Some(ArtworkPolicy::Generic),
            hide_runtime: Some(true),
            ..SettingsOverrides::default()
        }
    }
}

/// Counts nearly-finished episodes as watched and leaves search results alone.
#[derive(Clone, Copy, Debug)]
pub struct Relaxed;

impl Preset for Relaxed {
    const NAME: &'static str = "relaxed";

    fn overrides() -> SettingsOverrides {
        SettingsOverrides {
            watched_threshold: Some(WatchedThreshold::NinetyPercent),
            surfaces: SurfaceOverrides {
                search: Some(false),
                ..SurfaceOverrides::default()
            },
            ..SettingsOverrides::default()
        }
    }
}

/// Names of every built-in preset.
pub const PRESET_NAMES: [&str; 3] = [Balanced::NAME, Strict::NAME, Relaxed::NAME];

/// Looks up a preset's overrides by name, ignoring ASCII case.
pub fn preset_overrides(name: &str) -> Option<SettingsOverrides> {
    if name.eq_ignore_ascii_case(Balanced::NAME) {
        Some(Balanced::overrides())
    } else if name.eq_ignore_ascii_case(Strict::NAME) {
        Some(Strict::overrides())
    } else if name.eq_ignore_ascii_case(Relaxed::NAME) {
        Some(Relaxed::overrides())
    } else {
        None
    }
}

/// Overrides of [`DEFAULT_PRESET`].
pub fn default_preset_overrides() -> SettingsOverrides {
    Balanced::overrides()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::values::Settings;

    #[test]
    fn lookup_is_case_insensitive() {
        assert_eq!(preset_overrides("STRICT"), Some(Strict::overrides()));
        assert_eq!(preset_overrides("Relaxed"), Some(Relaxed::overrides()));
        assert_eq!(preset_overrides("paranoid"), None);
    }

    #[test]
    fn balanced_changes_nothing() {
        let mut settings = Settings::default();
        Balanced::overrides().apply_to(&mut settings);
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn relaxed_uses_ninety_percent_and_skips_search() {
        let mut settings = Settings::default();
        Relaxed::overrides().apply_to(&mut settings);
        assert_eq!(settings.watched_threshold, WatchedThreshold::NinetyPercent);
        assert!(!settings.surfaces.search);
        assert!(settings.surfaces.home);
    }
}

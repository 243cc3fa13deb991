//! User settings: effective values, presets and persistence.
//!
//! This module provides:
//!
//! - **Values** (`values`): the merged [`Settings`] view, the persisted
//!   [`SettingsOverrides`], and the enums they are built from.
//!
//! - **Presets** (`presets`): marker types like [`Strict`] implementing the
//!   [`Preset`] trait, looked up by name.
//!
//! - **Store** (`store`): the [`PersistedDocument`] and the [`SettingsStore`]
//!   sinks it is loaded from and saved to.
//!
//! # Example
//!
//! ```rust
//! use spoilerguard::{ArtworkPolicy, Settings, SettingsOverrides};
//!
//! let overrides = SettingsOverrides {
//!     preset_name: Some("strict".into()),
//!     ..SettingsOverrides::default()
//! };
//! let settings = Settings::resolve(&overrides, None);
//! assert_eq!(settings.artwork_policy, ArtworkPolicy::Generic);
//! assert!(settings.hide_runtime);
//! ```

pub mod presets;
pub mod store;
pub mod values;

pub use presets::{Balanced, DEFAULT_PRESET, PRESET_NAMES, Preset, Relaxed, Strict};
#[cfg(feature = "fs-store")]
pub use store::JsonFileStore;
pub use store::{MemoryStore, PersistedDocument, SettingsStore};
pub use values::{
    ArtworkPolicy, DEFAULT_REVEAL_DURATION_MS, Settings, SettingsOverrides, Surface,
    SurfaceFlags, SurfaceOverrides, WATCHED_PERCENTAGE, WatchedThreshold,
};

//! Spoiler boundaries and redaction decisions for media-center UIs.
//!
//! For every series or movie the user protects, this crate tracks how far
//! they have watched (the *boundary*) and decides, item by item, whether a
//! title, artwork or overview on screen would spoil something past it.
//!
//! This crate separates:
//! - **Rules and settings**: which containers are protected and how strictly.
//! - **Lookups**: governed, de-duplicated, cached calls into the host's
//!   metadata and episode-listing providers.
//! - **Decisions**: the pure boundary comparison and the per-item
//!   redact/allow answer built on it.
//! - **Reveal state**: what a redacted item shows right now, per-item reveal
//!   gestures, and the timed "reveal all".
//!
//! What this crate does not do:
//! - render anything or touch the DOM of a host UI
//! - install a `tracing` subscriber
//!
//! [`SpoilerGuard`] wires all of it together; the components are usable on
//! their own as well.
//!
//! # Example
//!
//! ```rust
//! use spoilerguard::{Boundary, is_past};
//!
//! let boundary = Boundary::new(1, 2, None);
//! assert_eq!(is_past(Some(&boundary), 1, 3), Some(true));
//! assert_eq!(is_past(Some(&boundary), 1, 2), Some(false));
//! // Specials are outside the boundary order.
//! assert_eq!(is_past(Some(&boundary), 0, 1), None);
//! ```

// <https://doc.rust-lang.org/rustc/lints/listing/allowed-by-default.html>
#![warn(
    anonymous_parameters,
    bare_trait_objects,
    elided_lifetimes_in_paths,
    missing_copy_implementations,
    rust_2018_idioms,
    trivial_casts,
    trivial_numeric_casts,
    unreachable_pub,
    unsafe_code,
    unused_extern_crates,
    unused_import_braces
)]
// <https://rust-lang.github.io/rust-clippy/stable>
#![warn(
    clippy::all,
    clippy::cargo,
    clippy::dbg_macro,
    clippy::float_cmp_const,
    clippy::get_unwrap,
    clippy::mem_forget,
    clippy::nursery,
    clippy::pedantic,
    clippy::todo,
    clippy::unwrap_used,
    clippy::uninlined_format_args
)]
// Allow some clippy lints
#![allow(
    clippy::default_trait_access,
    clippy::doc_markdown,
    clippy::if_not_else,
    clippy::module_name_repetitions,
    clippy::multiple_crate_versions,
    clippy::must_use_candidate,
    clippy::needless_pass_by_value,
    clippy::use_self,
    clippy::cargo_common_metadata,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::struct_excessive_bools,
    clippy::missing_const_for_fn,
    clippy::redundant_pub_crate,
    clippy::future_not_send,
    clippy::option_if_let_else,
    clippy::significant_drop_tightening
)]
// Allow some lints while testing
#![cfg_attr(test, allow(clippy::non_ascii_literal, clippy::unwrap_used))]

// Module declarations
pub mod boundary;
pub mod cache;
pub mod calendar;
pub mod context;
pub mod decision;
mod error;
pub mod governor;
pub mod label;
pub mod provider;
pub mod registry;
pub mod reveal;
pub mod scan;
pub mod settings;

// Re-exports
pub use boundary::{
    Boundary, BoundaryResolver, EpisodeList, SPECIALS_SEASON, boundary_from_episodes, is_past,
    should_redact_leaf,
};
pub use cache::{CacheEntry, DEFAULT_CAPACITY, EPISODE_CACHE_TTL, LookupCache};
pub use calendar::CalendarEvent;
pub use context::{GuardConfig, SpoilerGuard};
pub use decision::{Decision, ItemDescriptor, ParentCache, RedactionEngine};
pub use error::{SpoilerError, SpoilerResult};
pub use governor::{DEFAULT_MAX_IN_FLIGHT, GovernorPermit, RequestGovernor};
pub use label::{HIDDEN_TITLE_PLACEHOLDER, LabelPolicy, MASK_CHAR, episode_code};
pub use provider::{
    ContainerId, ContainerKind, EpisodeInfo, EpisodeListingProvider, ItemId, ItemKind,
    ItemMetadata, ItemMetadataProvider, WatchState,
};
pub use registry::{ContainerMeta, ProtectionRule, RuleRegistry};
pub use reveal::{
    Gesture, ItemRedactionState, REVEAL_ALL_DURATION, REVEAL_HOLD_THRESHOLD, RevealController,
    RevealState,
};
pub use scan::{ChangeEvent, ChangeFeed, ScanPipeline};
#[cfg(feature = "fs-store")]
pub use settings::JsonFileStore;
pub use settings::{
    ArtworkPolicy, Balanced, DEFAULT_PRESET, DEFAULT_REVEAL_DURATION_MS, MemoryStore,
    PRESET_NAMES, PersistedDocument, Preset, Relaxed, Settings, SettingsOverrides, SettingsStore,
    Strict, Surface, SurfaceFlags, SurfaceOverrides, WATCHED_PERCENTAGE, WatchedThreshold,
};

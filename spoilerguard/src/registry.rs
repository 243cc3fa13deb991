//! Per-container protection rules and effective settings.
//!
//! The registry owns the rule set, a derived protected-id set for O(1)
//! `is_protected` checks, the user's raw settings overrides, and the
//! auto-enable options. It publishes whether anything is protected at all on a
//! `watch` channel: hosts attach their change-notification feed while the value
//! is `true` and detach it when it drops back to `false`.

use std::{
    collections::{BTreeMap, HashSet},
    sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard},
    time::{SystemTime, UNIX_EPOCH},
};

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::{
    boundary::Boundary,
    provider::{ContainerId, ContainerKind},
    settings::{PersistedDocument, Settings, SettingsOverrides},
};

// =============================================================================
// Rule types
// =============================================================================

/// Protection rule for one container.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtectionRule {
    pub container_id: ContainerId,
    pub container_name: String,
    pub container_type: ContainerKind,
    pub enabled: bool,
    /// Preset applied to this container instead of the global one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preset_name: Option<String>,
    /// Manually chosen boundary replacing the computed one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boundary_override: Option<Boundary>,
    /// Unix epoch milliseconds of the last enable.
    pub enabled_at: u64,
}

/// Display metadata supplied when a container is protected.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContainerMeta {
    pub name: String,
    pub kind: ContainerKind,
}

impl ContainerMeta {
    pub fn series(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ContainerKind::Series,
        }
    }

    pub fn movie(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ContainerKind::Movie,
        }
    }
}

// =============================================================================
// RuleRegistry
// =============================================================================

#[derive(Debug, Default)]
struct RegistryState {
    rules: BTreeMap<ContainerId, ProtectionRule>,
    protected: HashSet<ContainerId>,
    overrides: SettingsOverrides,
    tag_auto_enable_list: Vec<String>,
    auto_enable_on_first_play: bool,
}

impl RegistryState {
    fn insert(&mut self, rule: ProtectionRule) {
        if rule.enabled {
            self.protected.insert(rule.container_id.clone());
        } else {
            self.protected.remove(&rule.container_id);
        }
        self.rules.insert(rule.container_id.clone(), rule);
    }
}

/// Holds the protection rules and resolves effective settings.
#[derive(Debug)]
pub struct RuleRegistry {
    state: RwLock<RegistryState>,
    armed: watch::Sender<bool>,
}

impl Default for RuleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl RuleRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::from_document(PersistedDocument::default())
    }

    /// Restores a registry from a persisted document.
    pub fn from_document(document: PersistedDocument) -> Self {
        let mut state = RegistryState {
            overrides: document.settings,
            tag_auto_enable_list: document.tag_auto_enable_list,
            auto_enable_on_first_play: document.auto_enable_on_first_play,
            ..RegistryState::default()
        };
        for (container_id, mut rule) in document.rules {
            // The map key is authoritative.
            rule.container_id = container_id;
            state.insert(rule);
        }
        let (armed, _) = watch::channel(!state.protected.is_empty());
        Self {
            state: RwLock::new(state),
            armed,
        }
    }

    /// Snapshots the registry into a document for persistence.
    pub fn to_document(&self) -> PersistedDocument {
        let state = self.read();
        PersistedDocument {
            rules: state.rules.clone(),
            settings: state.overrides.clone(),
            tag_auto_enable_list: state.tag_auto_enable_list.clone(),
            auto_enable_on_first_play: state.auto_enable_on_first_play,
        }
    }

    // ── Rules ──

    /// Protects `container_id`, creating its rule or re-enabling an existing one.
    ///
    /// Re-enabling keeps the rule's preset and boundary override.
    pub fn enable(&self, container_id: ContainerId, meta: ContainerMeta) -> ProtectionRule {
        let rule = {
            let mut state = self.write();
            let rule = match state.rules.get(&container_id) {
                Some(existing) => ProtectionRule {
                    container_name: meta.name,
                    container_type: meta.kind,
                    enabled: true,
                    enabled_at: now_millis(),
                    ..existing.clone()
                },
                None => ProtectionRule {
                    container_id: container_id.clone(),
                    container_name: meta.name,
                    container_type: meta.kind,
                    enabled: true,
                    preset_name: None,
                    boundary_override: None,
                    enabled_at: now_millis(),
                },
            };
            state.insert(rule.clone());
            rule
        };
        tracing::info!(container = %container_id, "spoiler protection enabled");
        self.publish_armed();
        rule
    }

    /// Stops protecting `container_id`. The rule is kept, disabled.
    ///
    /// Returns whether the container was protected before the call.
    pub fn disable(&self, container_id: &ContainerId) -> bool {
        let was_protected = {
            let mut state = self.write();
            let Some(rule) = state.rules.get_mut(container_id) else {
                return false;
            };
            let was_protected = rule.enabled;
            rule.enabled = false;
            state.protected.remove(container_id);
            was_protected
        };
        if was_protected {
            tracing::info!(container = %container_id, "spoiler protection disabled");
        }
        self.publish_armed();
        was_protected
    }

    /// Deletes the rule for `container_id` entirely.
    pub fn remove(&self, container_id: &ContainerId) -> Option<ProtectionRule> {
        let removed = {
            let mut state = self.write();
            state.protected.remove(container_id);
            state.rules.remove(container_id)
        };
        self.publish_armed();
        removed
    }

    /// Inserts or replaces a rule as given.
    pub fn set_rule(&self, rule: ProtectionRule) {
        self.write().insert(rule);
        self.publish_armed();
    }

    pub fn get_rule(&self, container_id: &ContainerId) -> Option<ProtectionRule> {
        self.read().rules.get(container_id).cloned()
    }

    /// All rules, ordered by container id.
    pub fn rules(&self) -> Vec<ProtectionRule> {
        self.read().rules.values().cloned().collect()
    }

    pub fn is_protected(&self, container_id: &ContainerId) -> bool {
        self.read().protected.contains(container_id)
    }

    pub fn protected_count(&self) -> usize {
        self.read().protected.len()
    }

    /// Subscribes to "at least one container is protected".
    pub fn subscribe_armed(&self) -> watch::Receiver<bool> {
        self.armed.subscribe()
    }

    // ── Settings ──

    /// Effective global settings: defaults < preset < user overrides.
    pub fn resolve_settings(&self) -> Settings {
        Settings::resolve(&self.read().overrides, None)
    }

    /// Effective settings for one container, honoring its rule's preset.
    pub fn resolve_settings_for(&self, container_id: &ContainerId) -> Settings {
        let state = self.read();
        let preset = state
            .rules
            .get(container_id)
            .and_then(|rule| rule.preset_name.as_deref());
        Settings::resolve(&state.overrides, preset)
    }

    /// The raw persisted overrides.
    pub fn overrides(&self) -> SettingsOverrides {
        self.read().overrides.clone()
    }

    /// Merges a partial update into the stored overrides and returns the new
    /// effective settings.
    pub fn update_settings(&self, partial: SettingsOverrides) -> Settings {
        let mut state = self.write();
        state.overrides.merge(partial);
        Settings::resolve(&state.overrides, None)
    }

    // ── Auto-enable ──

    pub fn tag_auto_enable_list(&self) -> Vec<String> {
        self.read().tag_auto_enable_list.clone()
    }

    pub fn set_tag_auto_enable_list(&self, tags: Vec<String>) {
        self.write().tag_auto_enable_list = tags;
    }

    pub fn auto_enable_on_first_play(&self) -> bool {
        self.read().auto_enable_on_first_play
    }

    pub fn set_auto_enable_on_first_play(&self, enabled: bool) {
        self.write().auto_enable_on_first_play = enabled;
    }

    /// Protects a container carrying any tag from the auto-enable list.
    ///
    /// Containers that already have a rule, enabled or not, are left alone.
    /// Returns whether a rule was created.
    pub fn auto_enable_for_tags(
        &self,
        container_id: &ContainerId,
        meta: ContainerMeta,
        tags: &[String],
    ) -> bool {
        let matched = {
            let state = self.read();
            if state.rules.contains_key(container_id) {
                return false;
            }
            tags.iter().any(|tag| {
                state
                    .tag_auto_enable_list
                    .iter()
                    .any(|listed| listed.eq_ignore_ascii_case(tag))
            })
        };
        if matched {
            tracing::debug!(container = %container_id, "auto-enabled by tag");
            self.enable(container_id.clone(), meta);
        }
        matched
    }

    /// Protects a container the first time one of its items is played, when
    /// that option is on and the container has no rule yet.
    pub fn note_first_play(&self, container_id: &ContainerId, meta: ContainerMeta) -> bool {
        {
            let state = self.read();
            if !state.auto_enable_on_first_play || state.rules.contains_key(container_id) {
                return false;
            }
        }
        tracing::debug!(container = %container_id, "auto-enabled on first play");
        self.enable(container_id.clone(), meta);
        true
    }

    // ── Internals ──

    fn publish_armed(&self) {
        let armed = !self.read().protected.is_empty();
        self.armed.send_if_modified(|current| {
            if *current == armed {
                false
            } else {
                *current = armed;
                true
            }
        });
    }

    fn read(&self) -> RwLockReadGuard<'_, RegistryState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, RegistryState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| {
            u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
        })
}

//! End-to-end tests for rules, presets and persistence.
//!
//! These tests exercise the integration of:
//! - the rule registry and auto-enable,
//! - preset resolution and partial settings updates, and
//! - loading and saving the persisted document through a store.

mod common;

use std::sync::Arc;

use spoilerguard::{
    ArtworkPolicy, ContainerId, ContainerMeta, EpisodeListingProvider, GuardConfig,
    ItemMetadataProvider, MemoryStore, PersistedDocument, Preset, RuleRegistry, Settings,
    SettingsOverrides, SettingsStore, SpoilerGuard, Strict, SurfaceOverrides, WatchedThreshold,
};

mod registry {
    use super::*;

    #[test]
    fn enable_disable_round_trip() {
        let registry = RuleRegistry::new();
        let id = ContainerId::new("breaking-bad");
        registry.enable(id.clone(), ContainerMeta::series("Breaking Bad"));
        assert!(registry.is_protected(&id));

        assert!(registry.disable(&id));
        assert!(!registry.is_protected(&id));
        let rule = registry.get_rule(&id).unwrap();
        assert!(!rule.enabled);
        assert_eq!(rule.container_name, "Breaking Bad");
    }

    #[test]
    fn tag_auto_enable_respects_explicit_disable() {
        let registry = RuleRegistry::new();
        registry.set_tag_auto_enable_list(vec!["Anime".into()]);
        let id = ContainerId::new("frieren");

        assert!(registry.auto_enable_for_tags(
            &id,
            ContainerMeta::series("Frieren"),
            &["anime".to_string()]
        ));
        assert!(registry.is_protected(&id));

        registry.disable(&id);
        assert!(!registry.auto_enable_for_tags(
            &id,
            ContainerMeta::series("Frieren"),
            &["anime".to_string()]
        ));
        assert!(!registry.is_protected(&id));
    }
}

mod presets {
    use super::*;

    #[test]
    fn strict_preset_changes_only_artwork_and_runtime() {
        let overrides = SettingsOverrides {
            preset_name: Some(Strict::NAME.into()),
            ..SettingsOverrides::default()
        };
        let settings = Settings::resolve(&overrides, None);
        let defaults = Settings::default();

        assert_eq!(settings.artwork_policy, ArtworkPolicy::Generic);
        assert!(settings.hide_runtime);
        assert_eq!(settings.watched_threshold, defaults.watched_threshold);
        assert_eq!(settings.hide_overview, defaults.hide_overview);
        assert_eq!(settings.hide_air_date, defaults.hide_air_date);
        assert_eq!(settings.surfaces, defaults.surfaces);
        assert_eq!(settings.preset_name, "strict");
    }

    #[test]
    fn unknown_preset_falls_back_to_balanced() {
        let overrides = SettingsOverrides {
            preset_name: Some("paranoid".into()),
            ..SettingsOverrides::default()
        };
        let settings = Settings::resolve(&overrides, None);
        assert_eq!(settings.preset_name, "balanced");
        assert_eq!(settings.artwork_policy, ArtworkPolicy::Blur);
    }

    #[test]
    fn user_overrides_beat_the_preset() {
        let registry = RuleRegistry::new();
        registry.update_settings(SettingsOverrides {
            preset_name: Some("relaxed".into()),
            ..SettingsOverrides::default()
        });
        let settings = registry.update_settings(SettingsOverrides {
            watched_threshold: Some(WatchedThreshold::Played),
            ..SettingsOverrides::default()
        });

        assert_eq!(settings.preset_name, "relaxed");
        assert_eq!(settings.watched_threshold, WatchedThreshold::Played);
        // Relaxed still turns search off.
        assert!(!settings.surfaces.search);
    }
}

mod persistence {
    use super::*;

    #[test]
    fn document_uses_camel_case_keys() {
        let registry = RuleRegistry::new();
        registry.enable(ContainerId::new("dark"), ContainerMeta::series("Dark"));
        registry.set_auto_enable_on_first_play(true);
        registry.update_settings(SettingsOverrides {
            surfaces: SurfaceOverrides {
                search: Some(false),
                ..SurfaceOverrides::default()
            },
            ..SettingsOverrides::default()
        });

        let json = registry.to_document().to_json().unwrap();
        assert!(json.contains("\"autoEnableOnFirstPlay\": true"));
        assert!(json.contains("\"containerName\": \"Dark\""));
        assert!(json.contains("\"tagAutoEnableList\""));

        let restored = RuleRegistry::from_document(PersistedDocument::from_json(&json).unwrap());
        assert!(restored.is_protected(&ContainerId::new("dark")));
        assert!(!restored.resolve_settings().surfaces.search);
    }

    #[test]
    fn missing_fields_default() {
        let document = PersistedDocument::from_json("{}").unwrap();
        assert!(document.rules.is_empty());
        assert!(!document.auto_enable_on_first_play);
    }

    #[tokio::test]
    async fn guard_persists_on_every_mutation() {
        let library = common::FakeLibrary::new();
        let (guard, _pipeline, store) = common::guard(&library).await;
        let id = ContainerId::new("severance");

        guard
            .enable(id.clone(), ContainerMeta::series("Severance"))
            .await
            .unwrap();
        let saved = store.snapshot().unwrap();
        assert!(saved.rules[&id].enabled);

        guard.disable(&id).await.unwrap();
        assert!(!store.snapshot().unwrap().rules[&id].enabled);

        guard
            .update_settings(SettingsOverrides {
                hide_runtime: Some(true),
                ..SettingsOverrides::default()
            })
            .await
            .unwrap();
        assert_eq!(store.snapshot().unwrap().settings.hide_runtime, Some(true));
    }

    #[tokio::test]
    async fn guard_restores_rules_from_the_store() {
        let registry = RuleRegistry::new();
        registry.enable(ContainerId::new("the-wire"), ContainerMeta::series("The Wire"));
        let store = Arc::new(MemoryStore::with_document(registry.to_document()));

        let library = common::FakeLibrary::new();
        let (guard, _pipeline) = SpoilerGuard::init(
            GuardConfig::default(),
            Arc::clone(&library) as Arc<dyn ItemMetadataProvider>,
            Arc::clone(&library) as Arc<dyn EpisodeListingProvider>,
            Arc::clone(&store) as Arc<dyn SettingsStore>,
        )
        .await
        .unwrap();
        assert!(guard.is_protected(&ContainerId::new("the-wire")));

        guard.teardown().await.unwrap();
        assert!(store.snapshot().is_some());
    }

    #[cfg(feature = "fs-store")]
    #[tokio::test]
    async fn json_file_store_round_trip() {
        use spoilerguard::JsonFileStore;

        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("spoilerguard.json"));
        assert_eq!(store.load().await.unwrap(), None);

        let registry = RuleRegistry::new();
        registry.enable(ContainerId::new("andor"), ContainerMeta::series("Andor"));
        let document = registry.to_document();
        store.save(&document).await.unwrap();

        assert_eq!(store.load().await.unwrap(), Some(document));
    }
}

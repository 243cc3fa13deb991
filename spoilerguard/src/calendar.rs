//! Redaction of upcoming-episode calendar entries.

use serde::{Deserialize, Serialize};

use crate::{
    decision::RedactionEngine,
    label::LabelPolicy,
    provider::{ContainerId, ItemId},
    settings::Surface,
};

/// One entry of the upcoming-episodes calendar.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEvent {
    pub item_id: ItemId,
    pub container_id: ContainerId,
    #[serde(default)]
    pub container_name: String,
    pub season_number: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub episode_number: Option<u32>,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overview: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub air_date: Option<String>,
}

impl RedactionEngine {
    /// Redacts calendar entries of protected containers that lie past the
    /// watch boundary.
    ///
    /// Redacted entries get their title replaced through `labels` and their
    /// overview dropped; the air date goes too when `hide_air_date` is set.
    /// Specials and entries without an episode number are always redacted,
    /// since calendar entries are unwatched. Containers whose effective
    /// settings switch the calendar surface off pass through unchanged. The
    /// order of `events` is kept.
    pub async fn filter_calendar(
        &self,
        events: Vec<CalendarEvent>,
        labels: &LabelPolicy,
    ) -> Vec<CalendarEvent> {
        let mut filtered = Vec::with_capacity(events.len());
        let mut redacted = 0usize;
        for mut event in events {
            if self.registry().is_protected(&event.container_id) {
                let settings = self.registry().resolve_settings_for(&event.container_id);
                if !settings.surfaces.covers(Surface::Calendar) {
                    filtered.push(event);
                    continue;
                }
                let past = match event.episode_number {
                    Some(episode) => self
                        .is_past_rule_boundary(
                            &event.container_id,
                            event.season_number,
                            episode,
                            settings.watched_threshold,
                        )
                        .await
                        .unwrap_or(true),
                    None => true,
                };
                if past {
                    event.title = labels.apply_to(
                        &event.title,
                        Some(event.season_number),
                        event.episode_number,
                    );
                    event.overview = None;
                    if settings.hide_air_date {
                        event.air_date = None;
                    }
                    redacted += 1;
                }
            }
            filtered.push(event);
        }
        tracing::debug!(total = filtered.len(), redacted, "calendar filtered");
        filtered
    }
}

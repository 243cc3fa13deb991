//! Change feed and the scan pipeline that turns changes into redactions.
//!
//! Collaborators report what appeared on or left the page through a cloneable
//! [`ChangeFeed`]. The single [`ScanPipeline`] consumer drains the queue,
//! decides every new item concurrently and applies each outcome to the
//! [`RevealController`] on its own, so one slow or failing item never holds
//! up the others.

use std::{collections::HashMap, sync::Arc};

use tokio::{
    sync::{mpsc, watch},
    task::JoinSet,
};

use crate::{
    decision::{Decision, ItemDescriptor, RedactionEngine},
    label::LabelPolicy,
    provider::ItemId,
    reveal::RevealController,
    settings::Surface,
};

/// A change on the rendered page.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChangeEvent {
    /// Items were rendered on `surface`.
    ItemsAppeared {
        surface: Surface,
        items: Vec<ItemDescriptor>,
    },
    /// Items left the page.
    ItemsRemoved(Vec<ItemId>),
    /// The user navigated to another surface.
    SurfaceChanged(Surface),
    /// Re-decide every tracked item.
    Rescan,
    /// Stop the pipeline.
    Shutdown,
}

/// Sending half of the change queue. Cheap to clone.
#[derive(Clone, Debug)]
pub struct ChangeFeed {
    tx: mpsc::UnboundedSender<ChangeEvent>,
}

impl ChangeFeed {
    /// Creates a feed and the receiver the pipeline consumes.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ChangeEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Queues `event`. Returns `false` once the pipeline is gone.
    pub fn send(&self, event: ChangeEvent) -> bool {
        let sent = self.tx.send(event).is_ok();
        if !sent {
            tracing::debug!("change feed closed, event dropped");
        }
        sent
    }

    pub fn items_appeared(&self, surface: Surface, items: Vec<ItemDescriptor>) -> bool {
        self.send(ChangeEvent::ItemsAppeared { surface, items })
    }

    pub fn items_removed(&self, items: Vec<ItemId>) -> bool {
        self.send(ChangeEvent::ItemsRemoved(items))
    }

    pub fn surface_changed(&self, surface: Surface) -> bool {
        self.send(ChangeEvent::SurfaceChanged(surface))
    }

    pub fn request_rescan(&self) -> bool {
        self.send(ChangeEvent::Rescan)
    }

    pub fn shutdown(&self) -> bool {
        self.send(ChangeEvent::Shutdown)
    }
}

// =============================================================================
// ScanPipeline
// =============================================================================

/// Consumes the change feed and keeps every tracked item's redaction current.
pub struct ScanPipeline {
    engine: Arc<RedactionEngine>,
    reveal: Arc<RevealController>,
    events: mpsc::UnboundedReceiver<ChangeEvent>,
    armed: watch::Receiver<bool>,
    // Each item remembers the surface it was rendered on.
    tracked: HashMap<ItemId, (ItemDescriptor, Surface)>,
    surface: Surface,
    labels: LabelPolicy,
}

impl ScanPipeline {
    pub fn new(
        engine: Arc<RedactionEngine>,
        reveal: Arc<RevealController>,
        events: mpsc::UnboundedReceiver<ChangeEvent>,
        labels: LabelPolicy,
    ) -> Self {
        let armed = engine.registry().subscribe_armed();
        Self {
            engine,
            reveal,
            events,
            armed,
            tracked: HashMap::new(),
            surface: Surface::Home,
            labels,
        }
    }

    pub fn surface(&self) -> Surface {
        self.surface
    }

    pub fn tracked_len(&self) -> usize {
        self.tracked.len()
    }

    pub fn reveal(&self) -> &Arc<RevealController> {
        &self.reveal
    }

    /// Processes events until [`ChangeEvent::Shutdown`] or until every feed is dropped.
    ///
    /// The registry becoming armed triggers a rescan; becoming disarmed
    /// restores every tracked item.
    pub async fn run(mut self) {
        tracing::debug!("scan pipeline started");
        loop {
            tokio::select! {
                event = self.events.recv() => match event {
                    Some(ChangeEvent::Shutdown) | None => break,
                    Some(event) => {
                        self.handle(event).await;
                    }
                },
                changed = self.armed.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let armed = *self.armed.borrow_and_update();
                    tracing::debug!(armed, "protection armed state changed");
                    self.handle(ChangeEvent::Rescan).await;
                }
            }
        }
        tracing::debug!("scan pipeline stopped");
    }

    /// Receives and handles one event. `None` once the feed is closed or shut down.
    pub async fn next(&mut self) -> Option<Vec<(ItemId, Decision)>> {
        match self.events.recv().await? {
            ChangeEvent::Shutdown => None,
            event => Some(self.handle(event).await),
        }
    }

    /// Applies one event and returns the decisions it produced, in item order.
    pub async fn handle(&mut self, event: ChangeEvent) -> Vec<(ItemId, Decision)> {
        match event {
            ChangeEvent::ItemsAppeared { surface, items } => {
                self.surface = surface;
                let items: Vec<_> = items.into_iter().map(|item| (item, surface)).collect();
                for (item, surface) in &items {
                    self.reveal.enter(item.item_id.clone(), item.title.clone());
                    self.tracked.insert(item.item_id.clone(), (item.clone(), *surface));
                }
                self.evaluate(items).await
            }
            ChangeEvent::ItemsRemoved(ids) => {
                for id in &ids {
                    self.reveal.leave(id);
                    self.tracked.remove(id);
                }
                Vec::new()
            }
            ChangeEvent::SurfaceChanged(surface) => {
                self.reveal.hide_all();
                self.surface = surface;
                Vec::new()
            }
            ChangeEvent::Rescan => {
                let items: Vec<_> = self.tracked.values().cloned().collect();
                self.evaluate(items).await
            }
            ChangeEvent::Shutdown => Vec::new(),
        }
    }

    async fn evaluate(&self, items: Vec<(ItemDescriptor, Surface)>) -> Vec<(ItemId, Decision)> {
        if items.is_empty() {
            return Vec::new();
        }

        // Nothing protected: no lookups needed.
        let decisions = if self.engine.registry().protected_count() == 0 {
            vec![Decision::Allow; items.len()]
        } else {
            self.decide_all(&items).await
        };

        // Lookups failed by teardown would read as Allow and unredact.
        if self.engine.is_closed() {
            tracing::debug!(items = items.len(), "guard closed, decisions discarded");
            return Vec::new();
        }

        items
            .into_iter()
            .zip(decisions)
            .map(|((item, _), decision)| {
                self.apply(&item, decision);
                (item.item_id, decision)
            })
            .collect()
    }

    async fn decide_all(&self, items: &[(ItemDescriptor, Surface)]) -> Vec<Decision> {
        let mut tasks = JoinSet::new();
        for (index, (item, surface)) in items.iter().enumerate() {
            let engine = Arc::clone(&self.engine);
            let item = item.clone();
            let surface = *surface;
            tasks.spawn(async move { (index, engine.decide(&item, surface).await) });
        }

        // A decision that never reports back redacts.
        let mut decisions = vec![Decision::Redact; items.len()];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, decision)) => decisions[index] = decision,
                Err(err) => tracing::warn!(error = %err, "redaction task failed"),
            }
        }
        decisions
    }

    fn apply(&self, item: &ItemDescriptor, decision: Decision) {
        match decision {
            Decision::Redact => {
                if self
                    .reveal
                    .redact(&item.item_id, item.redacted_title(&self.labels))
                {
                    tracing::trace!(item = %item.item_id, "redacted");
                }
            }
            Decision::Allow => {
                if self.reveal.unredact(&item.item_id) {
                    tracing::trace!(item = %item.item_id, "restored");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feed_helpers_queue_events_in_order() {
        let (feed, mut rx) = ChangeFeed::channel();
        assert!(feed.surface_changed(Surface::Search));
        assert!(feed.items_removed(vec![ItemId::new("e1")]));
        assert!(feed.clone().request_rescan());

        assert_eq!(rx.try_recv().unwrap(), ChangeEvent::SurfaceChanged(Surface::Search));
        assert_eq!(
            rx.try_recv().unwrap(),
            ChangeEvent::ItemsRemoved(vec![ItemId::new("e1")])
        );
        assert_eq!(rx.try_recv().unwrap(), ChangeEvent::Rescan);
    }

    #[test]
    fn closed_feed_reports_dropped_events() {
        let (feed, rx) = ChangeFeed::channel();
        drop(rx);
        assert!(!feed.request_rescan());
    }
}

//! Ephemeral reveal/hide state of redacted items and the timed "reveal all".
//!
//! Every displayed item gets an [`ItemRedactionState`] when it enters view and
//! loses it when it leaves. A redacted item is `Hidden` until a reveal gesture
//! (activation, or a press held past the hold threshold) makes it `Revealed`;
//! losing the pointer, navigating away, or the per-item reveal timer hides it
//! again.
//!
//! "Reveal all" is a single page-scoped override. While it runs, every
//! redacted item shows its original label, a countdown is published, and
//! per-item gestures do nothing. When it expires or is cancelled, per-item
//! reveals are cleared and a rescan is requested so every item is decided anew.

use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex, MutexGuard, PoisonError,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use tokio::{
    sync::watch,
    task::AbortHandle,
    time::{Instant, sleep},
};

use crate::{provider::ItemId, scan::ChangeFeed};

/// Minimum press duration that counts as a reveal gesture.
pub const REVEAL_HOLD_THRESHOLD: Duration = Duration::from_millis(300);

/// How long "reveal all" lasts.
pub const REVEAL_ALL_DURATION: Duration = Duration::from_secs(30);

/// Whether a redacted item currently shows its original content.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RevealState {
    Hidden,
    Revealed,
}

/// Input from the host's pointer/touch handling.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Gesture {
    /// Click/tap on the redacted label.
    Activate,
    /// A press released after `held`.
    Press { held: Duration },
    /// Pointer or touch left the item's region.
    PointerLeave,
    /// The user navigated away from the item.
    NavigateAway,
}

/// Per-item state, alive while the item is displayed.
#[derive(Debug)]
pub struct ItemRedactionState {
    redacted: bool,
    revealed: bool,
    original_label: String,
    redacted_label: Option<String>,
    reveal_timer: Option<AbortHandle>,
    // Bumped on every reveal so a stale timer cannot hide a newer reveal.
    reveal_epoch: u64,
}

impl ItemRedactionState {
    fn new(original_label: String) -> Self {
        Self {
            redacted: false,
            revealed: false,
            original_label,
            redacted_label: None,
            reveal_timer: None,
            reveal_epoch: 0,
        }
    }

    pub fn is_redacted(&self) -> bool {
        self.redacted
    }

    pub fn is_revealed(&self) -> bool {
        self.revealed
    }

    pub fn state(&self) -> RevealState {
        // Unredacted items have nothing to hide.
        if self.redacted && !self.revealed {
            RevealState::Hidden
        } else {
            RevealState::Revealed
        }
    }

    /// The label the host should render right now.
    pub fn label(&self) -> &str {
        match (&self.redacted_label, self.redacted && !self.revealed) {
            (Some(redacted), true) => redacted,
            _ => &self.original_label,
        }
    }

    fn hide(&mut self) {
        self.revealed = false;
        if let Some(timer) = self.reveal_timer.take() {
            timer.abort();
        }
    }
}

struct RevealAll {
    generation: u64,
    task: AbortHandle,
}

/// Tracks reveal state for every displayed item plus the reveal-all override.
pub struct RevealController {
    items: Mutex<HashMap<ItemId, ItemRedactionState>>,
    reveal_all: Mutex<Option<RevealAll>>,
    generation: AtomicU64,
    countdown: watch::Sender<Option<u64>>,
    feed: ChangeFeed,
    hold_threshold: Duration,
    reveal_all_duration: Duration,
    reveal_duration_ms: AtomicU64,
}

impl RevealController {
    /// Creates a controller that requests rescans through `feed`.
    pub fn new(
        feed: ChangeFeed,
        hold_threshold: Duration,
        reveal_all_duration: Duration,
        reveal_duration: Duration,
    ) -> Self {
        let (countdown, _) = watch::channel(None);
        Self {
            items: Mutex::new(HashMap::new()),
            reveal_all: Mutex::new(None),
            generation: AtomicU64::new(0),
            countdown,
            feed,
            hold_threshold,
            reveal_all_duration,
            reveal_duration_ms: AtomicU64::new(duration_millis(reveal_duration)),
        }
    }

    /// Sets how long a single reveal lasts. Zero keeps items revealed until
    /// pointer leave or navigation.
    pub fn set_reveal_duration(&self, duration: Duration) {
        self.reveal_duration_ms
            .store(duration_millis(duration), Ordering::Release);
    }

    // ── Item lifecycle ──

    /// Starts tracking an item that entered view. An already tracked item is kept.
    pub fn enter(&self, item_id: ItemId, label: impl Into<String>) {
        self.items()
            .entry(item_id)
            .or_insert_with(|| ItemRedactionState::new(label.into()));
    }

    /// Forgets an item that left view.
    pub fn leave(&self, item_id: &ItemId) {
        if let Some(mut state) = self.items().remove(item_id) {
            state.hide();
        }
    }

    /// Marks an item redacted, substituting `redacted_label`.
    ///
    /// An item that is already redacted is left untouched so its label is
    /// never substituted twice. Returns whether the item changed.
    pub fn redact(&self, item_id: &ItemId, redacted_label: impl Into<String>) -> bool {
        let reveal_all = self.is_reveal_all_active();
        let mut items = self.items();
        let Some(state) = items.get_mut(item_id) else {
            return false;
        };
        if state.redacted {
            return false;
        }
        state.redacted = true;
        state.revealed = reveal_all;
        state.redacted_label = Some(redacted_label.into());
        true
    }

    /// Restores an item's original content. Returns whether it was redacted.
    pub fn unredact(&self, item_id: &ItemId) -> bool {
        let mut items = self.items();
        let Some(state) = items.get_mut(item_id) else {
            return false;
        };
        if !state.redacted {
            return false;
        }
        state.hide();
        state.redacted = false;
        state.redacted_label = None;
        true
    }

    pub fn is_redacted(&self, item_id: &ItemId) -> bool {
        self.items()
            .get(item_id)
            .is_some_and(ItemRedactionState::is_redacted)
    }

    pub fn state(&self, item_id: &ItemId) -> Option<RevealState> {
        self.items().get(item_id).map(ItemRedactionState::state)
    }

    /// The label the host should render for `item_id`.
    pub fn label(&self, item_id: &ItemId) -> Option<String> {
        self.items()
            .get(item_id)
            .map(|state| state.label().to_string())
    }

    /// Ids of every tracked item.
    pub fn tracked(&self) -> Vec<ItemId> {
        self.items().keys().cloned().collect()
    }

    // ── Gestures ──

    /// Applies a gesture and returns the item's resulting state.
    ///
    /// Gestures are ignored while reveal-all is active.
    pub fn gesture(self: &Arc<Self>, item_id: &ItemId, gesture: Gesture) -> Option<RevealState> {
        let reveal_all = self.is_reveal_all_active();
        let mut items = self.items();
        let state = items.get_mut(item_id)?;
        if reveal_all || !state.redacted {
            return Some(state.state());
        }

        match gesture {
            Gesture::Activate => self.reveal(item_id, state),
            Gesture::Press { held } if held >= self.hold_threshold => self.reveal(item_id, state),
            Gesture::Press { .. } => {}
            Gesture::PointerLeave | Gesture::NavigateAway => state.hide(),
        }
        Some(state.state())
    }

    fn reveal(self: &Arc<Self>, item_id: &ItemId, state: &mut ItemRedactionState) {
        if state.revealed {
            return;
        }
        state.revealed = true;
        state.reveal_epoch += 1;

        let duration = Duration::from_millis(self.reveal_duration_ms.load(Ordering::Acquire));
        if duration.is_zero() {
            return;
        }
        let controller = Arc::clone(self);
        let item_id = item_id.clone();
        let epoch = state.reveal_epoch;
        let task = tokio::spawn(async move {
            sleep(duration).await;
            controller.expire_reveal(&item_id, epoch);
        });
        state.reveal_timer = Some(task.abort_handle());
    }

    fn expire_reveal(&self, item_id: &ItemId, epoch: u64) {
        let mut items = self.items();
        if let Some(state) = items.get_mut(item_id) {
            if state.reveal_epoch == epoch && state.revealed {
                state.revealed = false;
                state.reveal_timer = None;
                tracing::trace!(item = %item_id, "reveal timer elapsed");
            }
        }
    }

    /// Hides every revealed item, as on navigation away.
    pub fn hide_all(&self) {
        if self.is_reveal_all_active() {
            return;
        }
        for state in self.items().values_mut() {
            state.hide();
        }
    }

    // ── Reveal all ──

    /// Reveals every redacted item for the reveal-all duration.
    ///
    /// Returns `false` when reveal-all is already active. Must be called from
    /// within a tokio runtime.
    pub fn activate_reveal_all(self: &Arc<Self>) -> bool {
        let mut active = self.reveal_all();
        if active.is_some() {
            return false;
        }

        for state in self.items().values_mut() {
            if state.redacted {
                state.hide();
                state.revealed = true;
            }
        }

        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        let end = Instant::now() + self.reveal_all_duration;
        self.countdown.send_replace(Some(whole_seconds(self.reveal_all_duration)));

        let controller = Arc::clone(self);
        let task = tokio::spawn(async move {
            loop {
                let left = end.saturating_duration_since(Instant::now());
                if left.is_zero() {
                    break;
                }
                controller.countdown.send_replace(Some(whole_seconds(left)));
                sleep(left.min(Duration::from_secs(1))).await;
            }
            controller.finish_reveal_all(Some(generation));
        });

        *active = Some(RevealAll {
            generation,
            task: task.abort_handle(),
        });
        tracing::info!(
            duration_secs = self.reveal_all_duration.as_secs(),
            "reveal all activated"
        );
        true
    }

    /// Cancels reveal-all early. Returns whether it was active.
    pub fn deactivate_reveal_all(&self) -> bool {
        self.finish_reveal_all(None)
    }

    pub fn is_reveal_all_active(&self) -> bool {
        self.reveal_all().is_some()
    }

    /// Subscribes to the remaining whole seconds of reveal-all (`None` when inactive).
    pub fn subscribe_countdown(&self) -> watch::Receiver<Option<u64>> {
        self.countdown.subscribe()
    }

    /// Ends reveal-all. `expected` restricts the end to one activation, so an
    /// expiring timer never ends a newer activation.
    fn finish_reveal_all(&self, expected: Option<u64>) -> bool {
        let ended = {
            let mut active = self.reveal_all();
            let matches = active.as_ref().is_some_and(|current| {
                expected.is_none_or(|generation| generation == current.generation)
            });
            if matches { active.take() } else { None }
        };
        let Some(ended) = ended else {
            return false;
        };
        if expected.is_none() {
            ended.task.abort();
        }

        for state in self.items().values_mut() {
            state.hide();
        }
        self.countdown.send_replace(None);
        tracing::info!(cancelled = expected.is_none(), "reveal all ended");
        self.feed.request_rescan();
        true
    }

    fn items(&self) -> MutexGuard<'_, HashMap<ItemId, ItemRedactionState>> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn reveal_all(&self) -> MutexGuard<'_, Option<RevealAll>> {
        self.reveal_all.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn duration_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Remaining whole seconds, rounded up so the countdown never shows 0 while active.
fn whole_seconds(duration: Duration) -> u64 {
    let secs = duration.as_secs();
    if duration.subsec_nanos() > 0 { secs + 1 } else { secs }
}

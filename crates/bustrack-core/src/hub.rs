//! In-memory position hub.
//!
//! Positions are pushed in (by the HTTP API or the demo simulator) and read
//! out through the [`ObserverPositionFeed`] and [`TargetPositionFeed`]
//! traits. Each target gets a `watch` channel, so a subscriber always sees
//! the latest sample and never a backlog.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{watch, RwLock};
use tracing::trace;

use crate::feed::{BoxFuture, FeedError, ObserverPositionFeed, TargetPositionFeed, TargetStream};
use crate::geo::GeoPoint;
use crate::types::TrackedEntityState;

type TargetSlot = watch::Sender<Option<TrackedEntityState>>;

fn empty_slot() -> TargetSlot {
    watch::channel(None).0
}

/// Drop slots with no data and no subscribers, left behind by lookups of
/// ids that never resolved.
fn prune_idle(targets: &mut HashMap<String, TargetSlot>) {
    targets.retain(|_, slot| slot.borrow().is_some() || slot.receiver_count() > 0);
}

/// Shared store of the latest observer and bus positions.
#[derive(Debug, Clone)]
pub struct PositionHub {
    observer: Arc<watch::Sender<Option<GeoPoint>>>,
    targets: Arc<RwLock<HashMap<String, TargetSlot>>>,
    labels: Arc<std::sync::RwLock<HashMap<String, String>>>,
}

impl Default for PositionHub {
    fn default() -> Self {
        Self::new()
    }
}

impl PositionHub {
    /// Create an empty hub.
    #[must_use]
    pub fn new() -> Self {
        let (observer, _rx) = watch::channel(None);
        Self {
            observer: Arc::new(observer),
            targets: Arc::new(RwLock::new(HashMap::new())),
            labels: Arc::new(std::sync::RwLock::new(HashMap::new())),
        }
    }

    /// Record the observer's current position.
    pub fn push_observer(&self, position: GeoPoint) {
        self.observer.send_replace(Some(position));
    }

    /// Forget the observer's position, as if location access was revoked.
    pub fn clear_observer(&self) {
        self.observer.send_replace(None);
    }

    /// Latest observer position, if any.
    #[must_use]
    pub fn observer(&self) -> Option<GeoPoint> {
        *self.observer.borrow()
    }

    /// Record a bus sample, and its route label when one is given.
    pub async fn push_target(&self, state: TrackedEntityState, route_label: Option<String>) {
        trace!(target_id = %state.id, "Target position pushed");
        let mut targets = self.targets.write().await;
        if let Some(label) = route_label {
            if let Ok(mut labels) = self.labels.write() {
                labels.insert(state.id.clone(), label);
            }
        }
        targets
            .entry(state.id.clone())
            .or_insert_with(empty_slot)
            .send_replace(Some(state));
    }

    /// Mark a bus as having no data, e.g. when it goes off duty.
    ///
    /// The bus is forgotten entirely once nobody is subscribed to it.
    pub async fn clear_target(&self, target_id: &str) {
        let mut targets = self.targets.write().await;
        if let Some(slot) = targets.get(target_id) {
            slot.send_replace(None);
        }
        prune_idle(&mut targets);
    }

    /// Latest sample for a bus, if any.
    pub async fn target(&self, target_id: &str) -> Option<TrackedEntityState> {
        self.targets
            .read()
            .await
            .get(target_id)
            .and_then(|slot| slot.borrow().clone())
    }

    /// Ids of every bus that has data or a live subscriber.
    pub async fn target_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.targets.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }
}

impl ObserverPositionFeed for PositionHub {
    fn current_position(&self) -> BoxFuture<'_, Result<GeoPoint, FeedError>> {
        Box::pin(async move { self.observer().ok_or(FeedError::PermissionDenied) })
    }
}

impl TargetPositionFeed for PositionHub {
    fn subscribe(&self, target_id: &str) -> BoxFuture<'_, Result<TargetStream, FeedError>> {
        let target_id = target_id.to_string();
        Box::pin(async move {
            // Subscribing before the first push is allowed; the stream
            // yields `None` until data arrives.
            let existing = self
                .targets
                .read()
                .await
                .get(&target_id)
                .map(watch::Sender::subscribe);
            let rx = match existing {
                Some(rx) => rx,
                None => {
                    let mut targets = self.targets.write().await;
                    prune_idle(&mut targets);
                    targets.entry(target_id).or_insert_with(empty_slot).subscribe()
                }
            };

            let stream = futures::stream::unfold((rx, true), |(mut rx, first)| async move {
                if !first && rx.changed().await.is_err() {
                    return None;
                }
                let item = rx.borrow_and_update().clone();
                Some((Ok(item), (rx, false)))
            });

            Ok(Box::pin(stream) as TargetStream)
        })
    }

    fn route_label(&self, target_id: &str) -> Option<String> {
        self.labels
            .read()
            .ok()
            .and_then(|labels| labels.get(target_id).cloned())
    }
}

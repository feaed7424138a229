//! Tracking session controller.
//!
//! The controller owns at most one [`TrackingSession`] at a time. While a
//! session is active three tasks run side by side:
//!
//! - the **observer task** samples the observer feed every interval,
//! - the **target task** consumes the pushed bus feed, resubscribing if the
//!   stream closes,
//! - the **publisher task** recomputes distance and ETA from the latest
//!   sample of each kind and publishes a [`TrackingUpdate`].
//!
//! All three share one [`CancellationToken`] and write session state only
//! through a single mutex. Every write and publish re-checks, under that
//! mutex, that the session is still active and the token uncancelled, so
//! once [`TrackingController::stop`] or [`TrackingController::cancel`]
//! returns nothing further is published.
//!
//! ```text
//!  Idle ──start──▶ Active ──stop────▶ Completed
//!   ▲                 │
//!   │                 └─────cancel──▶ Cancelled
//!   └──────── start (fresh session) ◀──┘
//! ```

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::StreamExt;
use tokio::sync::{broadcast, mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::TrackingConfig;
use crate::error::{Result, TrackerError};
use crate::eta::eta_minutes;
use crate::feed::{FeedError, ObserverPositionFeed, TargetPositionFeed};
use crate::format::{format_distance, format_eta};
use crate::geo::distance_meters;
use crate::notify::{NoopNotificationSink, NotificationSink};
use crate::storage::{NoopSessionStore, SessionStore};
use crate::types::{
    is_valid_identifier, DisplayPayload, NotificationAction, SessionStatus, TrackedEntityState,
    TrackingErrorKind, TrackingErrorReport, TrackingEvent, TrackingSession, TrackingUpdate,
};

/// How long `stop`/`cancel` wait for queued store writes to drain.
const STORE_FLUSH_TIMEOUT: Duration = Duration::from_secs(2);

/// Floor for task periods; `tokio::time::interval` rejects zero.
const MIN_PERIOD: Duration = Duration::from_millis(1);

/// Owns the active tracking session and publishes its progress.
pub struct TrackingController {
    config: TrackingConfig,
    observer_feed: Arc<dyn ObserverPositionFeed>,
    target_feed: Arc<dyn TargetPositionFeed>,
    store: Arc<dyn SessionStore>,
    shared: Arc<Shared>,
    run: Mutex<Option<Run>>,
}

/// Handles for the tasks of the running session.
struct Run {
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
    writer: JoinHandle<()>,
}

/// State reachable from the session tasks.
struct Shared {
    state: Mutex<SessionState>,
    events: broadcast::Sender<TrackingEvent>,
    latest: watch::Sender<Option<TrackingUpdate>>,
    errors: watch::Sender<Option<TrackingErrorReport>>,
    sink: Arc<dyn NotificationSink>,
}

#[derive(Default)]
struct SessionState {
    session: Option<TrackingSession>,
    observer: Option<TrackedEntityState>,
    target: Option<TrackedEntityState>,
    target_resolved: bool,
    unresolved_ticks: u32,
    unresolved_reported: bool,
    cancel: CancellationToken,
    store_tx: Option<mpsc::UnboundedSender<StoreRecord>>,
}

enum StoreRecord {
    Create(TrackingSession),
    Update(TrackingSession),
    End(TrackingSession),
}

impl TrackingController {
    /// Create a controller over the given feeds.
    ///
    /// Notifications and persistence default to no-ops; see
    /// [`with_notification_sink`](Self::with_notification_sink) and
    /// [`with_store`](Self::with_store).
    #[must_use]
    pub fn new(
        config: TrackingConfig,
        observer_feed: Arc<dyn ObserverPositionFeed>,
        target_feed: Arc<dyn TargetPositionFeed>,
    ) -> Self {
        let (events, _) = broadcast::channel(config.event_buffer.max(1));
        let (latest, _) = watch::channel(None);
        let (errors, _) = watch::channel(None);

        Self {
            config,
            observer_feed,
            target_feed,
            store: Arc::new(NoopSessionStore),
            shared: Arc::new(Shared {
                state: Mutex::new(SessionState::default()),
                events,
                latest,
                errors,
                sink: Arc::new(NoopNotificationSink),
            }),
            run: Mutex::new(None),
        }
    }

    /// Use `sink` for the persistent tracking indicator.
    #[must_use]
    pub fn with_notification_sink(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        if let Some(shared) = Arc::get_mut(&mut self.shared) {
            shared.sink = sink;
        }
        self
    }

    /// Record session lifecycle in `store`.
    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn SessionStore>) -> Self {
        self.store = store;
        self
    }

    /// Start tracking `target_id` for `observer_id`.
    ///
    /// If a session is already active this is a no-op: a warning is logged
    /// and the existing session's snapshot is returned. A fresh session
    /// clears any error left on the error channel.
    ///
    /// # Errors
    ///
    /// - [`TrackerError::InvalidIdentifier`] for malformed ids.
    /// - [`TrackerError::PermissionDenied`] if the observer's position cannot
    ///   be obtained. This is also reported once on the error channel and
    ///   the controller stays idle.
    pub async fn start(&self, target_id: &str, observer_id: &str) -> Result<TrackingUpdate> {
        for id in [target_id, observer_id] {
            if !is_valid_identifier(id) {
                return Err(TrackerError::InvalidIdentifier(id.to_string()));
            }
        }

        let mut run = self.run.lock().await;
        if run.is_some() {
            let state = self.shared.state.lock().await;
            if let Some(session) = state.session.as_ref() {
                warn!(
                    session_id = %session.id,
                    active_target = %session.target_id,
                    requested_target = %target_id,
                    "Tracking already active; ignoring start"
                );
                return Ok(build_update(session, state.target.as_ref()));
            }
        }

        let position = match tokio::time::timeout(
            self.config.sample_timeout(),
            self.observer_feed.current_position(),
        )
        .await
        {
            Ok(Ok(position)) => position,
            Ok(Err(e)) => return Err(self.observer_unavailable(&e)),
            Err(_) => {
                return Err(self.observer_unavailable(&FeedError::Timeout {
                    timeout_ms: self.config.sample_timeout_ms,
                }))
            }
        };

        let route_label = self.target_feed.route_label(target_id);
        let session = TrackingSession::begin(observer_id, target_id, route_label, position);
        let cancel = CancellationToken::new();
        let (store_tx, store_rx) = mpsc::unbounded_channel();
        let writer = tokio::spawn(store_writer(Arc::clone(&self.store), store_rx));

        let update = {
            let mut state = self.shared.state.lock().await;
            let _ = store_tx.send(StoreRecord::Create(session.clone()));
            let update = build_update(&session, None);
            *state = SessionState {
                observer: Some(TrackedEntityState::now(observer_id, position, 0.0)),
                session: Some(session),
                cancel: cancel.clone(),
                store_tx: Some(store_tx),
                ..SessionState::default()
            };
            // Reports from an earlier session or failed start no longer apply.
            self.shared.errors.send_replace(None);
            self.shared.publish(TrackingEvent::Started(update.clone()), &update);
            update
        };

        let tasks = vec![
            tokio::spawn(observer_task(
                Arc::clone(&self.shared),
                Arc::clone(&self.observer_feed),
                observer_id.to_string(),
                self.config.clone(),
                cancel.clone(),
            )),
            tokio::spawn(target_task(
                Arc::clone(&self.shared),
                Arc::clone(&self.target_feed),
                target_id.to_string(),
                self.config.interval(),
                cancel.clone(),
            )),
            tokio::spawn(publisher_task(
                Arc::clone(&self.shared),
                self.config.clone(),
                cancel.clone(),
            )),
        ];

        *run = Some(Run {
            cancel,
            tasks,
            writer,
        });

        info!(
            session_id = %update.session_id,
            target_id = %target_id,
            observer_id = %observer_id,
            "Tracking started"
        );
        Ok(update)
    }

    /// End the active session as [`SessionStatus::Completed`].
    ///
    /// All session tasks have stopped by the time this returns.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::NoActiveSession`] if nothing is being tracked.
    pub async fn stop(&self) -> Result<TrackingUpdate> {
        self.finish(SessionStatus::Completed).await
    }

    /// End the active session as [`SessionStatus::Cancelled`].
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::NoActiveSession`] if nothing is being tracked.
    pub async fn cancel(&self) -> Result<TrackingUpdate> {
        self.finish(SessionStatus::Cancelled).await
    }

    /// Apply a user action from the notification.
    ///
    /// `StopTracking` stops the session and returns its final snapshot;
    /// `OpenTrackingView` returns the current snapshot, if any.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::NoActiveSession`] for `StopTracking` when
    /// nothing is being tracked.
    pub async fn handle_action(&self, action: NotificationAction) -> Result<Option<TrackingUpdate>> {
        debug!(?action, "Notification action received");
        match action {
            NotificationAction::StopTracking => self.stop().await.map(Some),
            NotificationAction::OpenTrackingView => Ok(self.snapshot()),
        }
    }

    /// Cancel any active session. Used on shutdown.
    pub async fn shutdown(&self) {
        match self.cancel().await {
            Ok(update) => info!(session_id = %update.session_id, "Active session cancelled on shutdown"),
            Err(TrackerError::NoActiveSession) => {}
            Err(e) => warn!(error = %e, "Failed to cancel session on shutdown"),
        }
    }

    /// Subscribe to session events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<TrackingEvent> {
        self.shared.events.subscribe()
    }

    /// Latest published snapshot, including the final one of an ended session.
    #[must_use]
    pub fn snapshot(&self) -> Option<TrackingUpdate> {
        self.shared.latest.borrow().clone()
    }

    /// Watch the latest published snapshot.
    #[must_use]
    pub fn watch_updates(&self) -> watch::Receiver<Option<TrackingUpdate>> {
        self.shared.latest.subscribe()
    }

    /// Copy of the current (or most recent) session.
    pub async fn session(&self) -> Option<TrackingSession> {
        self.shared.state.lock().await.session.clone()
    }

    /// Returns `true` while a session is active.
    pub async fn is_active(&self) -> bool {
        self.shared
            .state
            .lock()
            .await
            .session
            .as_ref()
            .is_some_and(TrackingSession::is_active)
    }

    /// The error currently shown to the user, if any.
    #[must_use]
    pub fn last_error(&self) -> Option<TrackingErrorReport> {
        self.shared.errors.borrow().clone()
    }

    /// Dismiss the current error. Returns `true` if one was set.
    pub fn clear_error(&self) -> bool {
        self.shared.errors.send_replace(None).is_some()
    }

    /// Watch the error channel.
    #[must_use]
    pub fn watch_errors(&self) -> watch::Receiver<Option<TrackingErrorReport>> {
        self.shared.errors.subscribe()
    }

    fn observer_unavailable(&self, cause: &FeedError) -> TrackerError {
        warn!(error = %cause, "Observer position unavailable; staying idle");
        let err = TrackerError::PermissionDenied;
        self.shared.report_error(TrackingErrorReport::new(
            TrackingErrorKind::PermissionDenied,
            err.to_string(),
            None,
        ));
        err
    }

    async fn finish(&self, status: SessionStatus) -> Result<TrackingUpdate> {
        let mut run = self.run.lock().await;
        let Some(current) = run.take() else {
            return Err(TrackerError::NoActiveSession);
        };
        current.cancel.cancel();

        let update = {
            let mut state = self.shared.state.lock().await;
            let target = state.target.clone();
            let store_tx = state.store_tx.take();
            let Some(session) = state.session.as_mut() else {
                return Err(TrackerError::NoActiveSession);
            };
            session.status = status;
            session.ended_at = Some(Utc::now());

            let update = build_update(session, target.as_ref());
            self.shared.latest.send_replace(Some(update.clone()));
            let _ = self.shared.events.send(TrackingEvent::Ended(update.clone()));
            self.shared.sink.clear();
            if let Some(tx) = store_tx {
                let _ = tx.send(StoreRecord::End(session.clone()));
            }
            update
        };

        for task in current.tasks {
            if let Err(e) = task.await {
                if e.is_panic() {
                    error!(error = %e, "Tracking task panicked");
                }
            }
        }
        if tokio::time::timeout(STORE_FLUSH_TIMEOUT, current.writer)
            .await
            .is_err()
        {
            warn!(session_id = %update.session_id, "Session store did not flush in time");
        }

        info!(
            session_id = %update.session_id,
            status = ?status,
            "Tracking ended"
        );
        Ok(update)
    }
}

impl Shared {
    /// Publish an event and remember its snapshot. Caller holds the state lock.
    fn publish(&self, event: TrackingEvent, update: &TrackingUpdate) {
        self.latest.send_replace(Some(update.clone()));
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    fn report_error(&self, report: TrackingErrorReport) {
        self.errors.send_replace(Some(report.clone()));
        let _ = self.events.send(TrackingEvent::Error(report));
    }

    async fn record_observer(&self, sample: TrackedEntityState, cancel: &CancellationToken) {
        let mut state = self.state.lock().await;
        if !state.is_live(cancel) {
            return;
        }
        if let Some(session) = state.session.as_mut() {
            session.observer_position = Some(sample.position);
        }
        state.observer = Some(sample);
    }

    async fn record_target(&self, sample: TrackedEntityState, cancel: &CancellationToken) {
        let mut state = self.state.lock().await;
        if !state.is_live(cancel) {
            return;
        }
        if let Some(session) = state.session.as_mut() {
            session.target_position = Some(sample.position);
        }
        state.target = Some(sample);
        state.target_resolved = true;
    }

    async fn mark_target_missing(&self, cancel: &CancellationToken) {
        let mut state = self.state.lock().await;
        if state.is_live(cancel) {
            state.target_resolved = false;
        }
    }

    /// One publisher tick: track unresolved streaks, recompute, publish.
    async fn recompute(&self, threshold: u32, cancel: &CancellationToken) {
        let mut state = self.state.lock().await;
        if !state.is_live(cancel) {
            return;
        }

        if state.target_resolved {
            state.unresolved_ticks = 0;
            state.unresolved_reported = false;
        } else {
            state.unresolved_ticks = state.unresolved_ticks.saturating_add(1);
            if state.unresolved_ticks >= threshold && !state.unresolved_reported {
                state.unresolved_reported = true;
                if let Some(session) = state.session.as_ref() {
                    warn!(
                        session_id = %session.id,
                        target_id = %session.target_id,
                        ticks = state.unresolved_ticks,
                        "Target unresolvable"
                    );
                    let err = TrackerError::TargetUnresolvable(session.target_id.clone());
                    self.report_error(TrackingErrorReport::new(
                        TrackingErrorKind::TargetUnresolvable,
                        err.to_string(),
                        Some(session.id),
                    ));
                }
            }
        }

        let (Some(observer), Some(target)) = (state.observer.clone(), state.target.clone()) else {
            return;
        };
        let Some(session) = state.session.as_mut() else {
            return;
        };

        session.observer_position = Some(observer.position);
        session.target_position = Some(target.position);
        session.distance_m = Some(distance_meters(observer.position, target.position));

        let update = build_update(session, Some(&target));
        let record = session.clone();

        self.publish(TrackingEvent::Updated(update.clone()), &update);
        if let Some(payload) = display_payload(&update) {
            self.sink.show(&payload);
        }
        if let Some(tx) = state.store_tx.as_ref() {
            let _ = tx.send(StoreRecord::Update(record));
        }
    }
}

impl SessionState {
    fn is_live(&self, cancel: &CancellationToken) -> bool {
        !cancel.is_cancelled()
            && !self.cancel.is_cancelled()
            && self
                .session
                .as_ref()
                .is_some_and(TrackingSession::is_active)
    }
}

/// Snapshot of `session`, with ETA from the bus's latest speed.
fn build_update(session: &TrackingSession, target: Option<&TrackedEntityState>) -> TrackingUpdate {
    let speed = target.map(|t| t.speed_kmh);
    let eta = session
        .distance_m
        .zip(speed)
        .map(|(distance, speed)| eta_minutes(distance, speed));

    TrackingUpdate {
        session_id: session.id,
        target_id: session.target_id.clone(),
        route_label: session.route_label.clone(),
        status: session.status,
        observer_position: session.observer_position,
        target_position: session.target_position,
        target_speed_kmh: speed,
        distance_m: session.distance_m,
        eta_minutes: eta,
        distance_text: session.distance_m.map(format_distance),
        eta_text: eta.map(format_eta),
        published_at: Utc::now(),
    }
}

fn display_payload(update: &TrackingUpdate) -> Option<DisplayPayload> {
    Some(DisplayPayload {
        session_id: update.session_id,
        target_id: update.target_id.clone(),
        route_label: update
            .route_label
            .clone()
            .unwrap_or_else(|| update.target_id.clone()),
        distance_text: update.distance_text.clone()?,
        eta_text: update.eta_text.clone()?,
    })
}

fn ticker(period: Duration) -> tokio::time::Interval {
    let period = period.max(MIN_PERIOD);
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

async fn observer_task(
    shared: Arc<Shared>,
    feed: Arc<dyn ObserverPositionFeed>,
    observer_id: String,
    config: TrackingConfig,
    cancel: CancellationToken,
) {
    let mut ticker = ticker(config.interval());
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let sample = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            sample = tokio::time::timeout(config.sample_timeout(), feed.current_position()) => sample,
        };

        match sample {
            Ok(Ok(position)) => {
                shared
                    .record_observer(TrackedEntityState::now(&observer_id, position, 0.0), &cancel)
                    .await;
            }
            Ok(Err(e)) => debug!(
                error = %TrackerError::from(e),
                "Observer sample failed; retrying next tick"
            ),
            Err(_) => debug!(
                timeout_ms = config.sample_timeout_ms,
                "Observer sample timed out; retrying next tick"
            ),
        }
    }
    debug!("Observer task stopped");
}

async fn target_task(
    shared: Arc<Shared>,
    feed: Arc<dyn TargetPositionFeed>,
    target_id: String,
    retry_after: Duration,
    cancel: CancellationToken,
) {
    'subscribe: loop {
        let subscription = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            subscription = feed.subscribe(&target_id) => subscription,
        };

        match subscription {
            Ok(mut stream) => loop {
                let item = tokio::select! {
                    biased;
                    () = cancel.cancelled() => break 'subscribe,
                    item = stream.next() => item,
                };

                match item {
                    Some(Ok(Some(sample))) => shared.record_target(sample, &cancel).await,
                    Some(Ok(None) | Err(FeedError::Unresolved { .. })) => {
                        shared.mark_target_missing(&cancel).await;
                    }
                    Some(Err(e)) => debug!(
                        error = %TrackerError::from(e),
                        "Target sample failed; waiting for next"
                    ),
                    None => {
                        debug!(target_id = %target_id, "Target feed closed; resubscribing");
                        break;
                    }
                }
            },
            Err(e) => {
                debug!(target_id = %target_id, error = %e, "Target subscription failed");
                shared.mark_target_missing(&cancel).await;
            }
        }

        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            () = tokio::time::sleep(retry_after.max(MIN_PERIOD)) => {}
        }
    }
    debug!("Target task stopped");
}

async fn publisher_task(shared: Arc<Shared>, config: TrackingConfig, cancel: CancellationToken) {
    let mut ticker = ticker(config.interval());
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = ticker.tick() => {
                shared.recompute(config.unresolved_tick_threshold, &cancel).await;
            }
        }
    }
    debug!("Publisher task stopped");
}

async fn store_writer(store: Arc<dyn SessionStore>, mut rx: mpsc::UnboundedReceiver<StoreRecord>) {
    while let Some(record) = rx.recv().await {
        let (op, id, result): (&str, Uuid, _) = match record {
            StoreRecord::Create(s) => ("create", s.id, store.create(s).await),
            StoreRecord::Update(s) => ("update", s.id, store.update(s).await),
            StoreRecord::End(s) => ("end", s.id, store.end(s).await),
        };
        if let Err(e) = result {
            warn!(session_id = %id, op, error = %e, "Session store write failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::{BoxFuture, TargetStream};
    use crate::geo::GeoPoint;
    use crate::hub::PositionHub;
    use crate::storage::StoreResult;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;
    use tokio::sync::broadcast::error::{RecvError, TryRecvError};

    fn test_config() -> TrackingConfig {
        TrackingConfig {
            interval_ms: 20,
            sample_timeout_ms: 200,
            unresolved_tick_threshold: 2,
            event_buffer: 256,
        }
    }

    fn controller(hub: &PositionHub) -> TrackingController {
        TrackingController::new(test_config(), Arc::new(hub.clone()), Arc::new(hub.clone()))
    }

    fn bus(lon: f64, speed: f64) -> TrackedEntityState {
        TrackedEntityState::now("bus-42", GeoPoint::new_unchecked(0.0, lon), speed)
    }

    async fn next_matching(
        rx: &mut broadcast::Receiver<TrackingEvent>,
        pred: impl Fn(&TrackingEvent) -> bool,
    ) -> TrackingEvent {
        tokio::time::timeout(Duration::from_secs(3), async {
            loop {
                match rx.recv().await {
                    Ok(event) if pred(&event) => return event,
                    Ok(_) | Err(RecvError::Lagged(_)) => {}
                    Err(RecvError::Closed) => panic!("event channel closed"),
                }
            }
        })
        .await
        .expect("timed out waiting for event")
    }

    fn drain(rx: &mut broadcast::Receiver<TrackingEvent>) -> Vec<TrackingEvent> {
        let mut events = Vec::new();
        loop {
            match rx.try_recv() {
                Ok(event) => events.push(event),
                Err(TryRecvError::Lagged(_)) => {}
                Err(TryRecvError::Empty | TryRecvError::Closed) => return events,
            }
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        shown: StdMutex<Vec<DisplayPayload>>,
        log: StdMutex<Vec<&'static str>>,
    }

    impl NotificationSink for RecordingSink {
        fn show(&self, payload: &DisplayPayload) {
            self.shown.lock().unwrap().push(payload.clone());
            self.log.lock().unwrap().push("show");
        }

        fn clear(&self) {
            self.log.lock().unwrap().push("clear");
        }
    }

    #[derive(Default)]
    struct RecordingStore {
        records: StdMutex<Vec<(&'static str, SessionStatus)>>,
    }

    impl SessionStore for RecordingStore {
        fn create(&self, session: TrackingSession) -> BoxFuture<'_, StoreResult<()>> {
            self.records.lock().unwrap().push(("create", session.status));
            Box::pin(async { Ok(()) })
        }

        fn update(&self, session: TrackingSession) -> BoxFuture<'_, StoreResult<()>> {
            self.records.lock().unwrap().push(("update", session.status));
            Box::pin(async { Ok(()) })
        }

        fn end(&self, session: TrackingSession) -> BoxFuture<'_, StoreResult<()>> {
            self.records.lock().unwrap().push(("end", session.status));
            Box::pin(async { Ok(()) })
        }
    }

    /// Answers the first request, then fails every other one.
    struct FlakyObserver {
        calls: AtomicUsize,
    }

    impl ObserverPositionFeed for FlakyObserver {
        fn current_position(&self) -> BoxFuture<'_, std::result::Result<GeoPoint, FeedError>> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            Box::pin(async move {
                if n == 0 || n % 2 == 0 {
                    Ok(GeoPoint::new_unchecked(0.0, 0.0))
                } else {
                    Err(FeedError::Unavailable {
                        message: "gps glitch".into(),
                    })
                }
            })
        }
    }

    #[tokio::test]
    async fn test_start_without_observer_fix_stays_idle() {
        let hub = PositionHub::new();
        let ctl = controller(&hub);
        let mut rx = ctl.subscribe();

        let err = ctl.start("bus-42", "rider-1").await.unwrap_err();
        assert!(matches!(err, TrackerError::PermissionDenied));
        assert!(!ctl.is_active().await);
        assert!(ctl.session().await.is_none());

        let report = ctl.last_error().unwrap();
        assert_eq!(report.kind, TrackingErrorKind::PermissionDenied);
        assert!(matches!(rx.try_recv(), Ok(TrackingEvent::Error(_))));

        assert!(ctl.clear_error());
        assert!(ctl.last_error().is_none());
        assert!(!ctl.clear_error());
    }

    #[tokio::test]
    async fn test_invalid_identifiers_rejected() {
        let hub = PositionHub::new();
        let ctl = controller(&hub);
        assert!(matches!(
            ctl.start("bus 42", "rider").await,
            Err(TrackerError::InvalidIdentifier(_))
        ));
        assert!(matches!(
            ctl.start("bus-42", "").await,
            Err(TrackerError::InvalidIdentifier(_))
        ));
    }

    #[tokio::test]
    async fn test_eta_published_then_stop_silences_feed() {
        let hub = PositionHub::new();
        hub.push_observer(GeoPoint::new_unchecked(0.0, 0.0));
        // ~511 m east at 30 km/h (500 m/min).
        hub.push_target(bus(0.0046, 30.0), Some("Route 12".into())).await;

        let sink = Arc::new(RecordingSink::default());
        let ctl = controller(&hub).with_notification_sink(sink.clone());
        let mut rx = ctl.subscribe();

        let started = ctl.start("bus-42", "rider-1").await.unwrap();
        assert_eq!(started.status, SessionStatus::Active);
        assert_eq!(started.route_label.as_deref(), Some("Route 12"));

        let event = next_matching(&mut rx, |e| matches!(e, TrackingEvent::Updated(_))).await;
        let TrackingEvent::Updated(update) = event else {
            unreachable!()
        };
        let distance = update.distance_m.unwrap();
        assert!((distance - 511.5).abs() < 1.0, "got {distance}");
        assert_eq!(update.eta_minutes, Some(1));
        assert_eq!(update.eta_text.as_deref(), Some("1 min"));
        assert_eq!(update.distance_text.as_deref(), Some("511m"));
        assert_eq!(update.session_id, started.session_id);

        let shown = sink.shown.lock().unwrap().last().cloned().unwrap();
        assert_eq!(shown.route_label, "Route 12");
        assert_eq!(shown.eta_text, "1 min");

        let ended = ctl.stop().await.unwrap();
        assert_eq!(ended.status, SessionStatus::Completed);
        let session = ctl.session().await.unwrap();
        assert_eq!(session.status, SessionStatus::Completed);
        assert!(session.ended_at.is_some());

        // Everything queued before the Ended event is fine; nothing may follow it.
        let before = drain(&mut rx);
        assert!(matches!(before.last(), Some(TrackingEvent::Ended(_))));

        for i in 1..=5 {
            hub.push_target(bus(0.0046 - f64::from(i) * 0.0005, 30.0), None).await;
            hub.push_observer(GeoPoint::new_unchecked(0.0, f64::from(i) * 0.0001));
            tokio::time::sleep(Duration::from_millis(15)).await;
        }
        assert!(drain(&mut rx).is_empty());
        assert_eq!(ctl.snapshot().unwrap().status, SessionStatus::Completed);
        assert_eq!(ctl.session().await.unwrap(), session);
        assert_eq!(sink.log.lock().unwrap().last(), Some(&"clear"));
    }

    #[tokio::test]
    async fn test_second_start_is_noop() {
        let hub = PositionHub::new();
        hub.push_observer(GeoPoint::new_unchecked(0.0, 0.0));
        let ctl = controller(&hub);

        let first = ctl.start("bus-42", "rider-1").await.unwrap();
        let second = ctl.start("bus-42", "rider-1").await.unwrap();
        let other = ctl.start("bus-7", "rider-2").await.unwrap();

        assert_eq!(first.session_id, second.session_id);
        assert_eq!(first.session_id, other.session_id);
        assert_eq!(other.target_id, "bus-42");
        assert_eq!(ctl.session().await.unwrap().id, first.session_id);

        ctl.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_cancel_then_fresh_start() {
        let hub = PositionHub::new();
        hub.push_observer(GeoPoint::new_unchecked(0.0, 0.0));
        let ctl = controller(&hub);

        let first = ctl.start("bus-42", "rider-1").await.unwrap();
        let cancelled = ctl.cancel().await.unwrap();
        assert_eq!(cancelled.status, SessionStatus::Cancelled);
        assert!(!ctl.is_active().await);
        assert!(matches!(ctl.stop().await, Err(TrackerError::NoActiveSession)));

        let second = ctl.start("bus-42", "rider-1").await.unwrap();
        assert_ne!(first.session_id, second.session_id);
        assert!(ctl.is_active().await);
        ctl.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_stop_without_session() {
        let hub = PositionHub::new();
        let ctl = controller(&hub);
        assert!(matches!(ctl.stop().await, Err(TrackerError::NoActiveSession)));
        assert!(matches!(ctl.cancel().await, Err(TrackerError::NoActiveSession)));
        ctl.shutdown().await;
    }

    #[tokio::test]
    async fn test_unresolved_target_reported_once_and_session_survives() {
        let hub = PositionHub::new();
        hub.push_observer(GeoPoint::new_unchecked(0.0, 0.0));
        let ctl = controller(&hub);
        let mut rx = ctl.subscribe();

        ctl.start("ghost-bus", "rider-1").await.unwrap();
        let event = next_matching(&mut rx, |e| matches!(e, TrackingEvent::Error(_))).await;
        let TrackingEvent::Error(report) = event else {
            unreachable!()
        };
        assert_eq!(report.kind, TrackingErrorKind::TargetUnresolvable);
        assert!(report.message.contains("ghost-bus"));

        tokio::time::sleep(Duration::from_millis(150)).await;
        let later_errors = drain(&mut rx)
            .into_iter()
            .filter(|e| matches!(e, TrackingEvent::Error(_)))
            .count();
        assert_eq!(later_errors, 0);
        assert!(ctl.is_active().await);
        assert_eq!(
            ctl.last_error().map(|r| r.kind),
            Some(TrackingErrorKind::TargetUnresolvable)
        );

        // Data arriving later resolves the target and updates resume.
        hub.push_target(
            TrackedEntityState::now("ghost-bus", GeoPoint::new_unchecked(0.0, 0.01), 20.0),
            None,
        )
        .await;
        let event = next_matching(&mut rx, |e| {
            matches!(e, TrackingEvent::Updated(u) if u.distance_m.is_some())
        })
        .await;
        assert!(matches!(event, TrackingEvent::Updated(_)));

        ctl.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_transient_observer_failures_are_swallowed() {
        let hub = PositionHub::new();
        hub.push_target(bus(0.002, 10.0), None).await;
        let ctl = TrackingController::new(
            test_config(),
            Arc::new(FlakyObserver {
                calls: AtomicUsize::new(0),
            }),
            Arc::new(hub.clone()),
        );
        let mut rx = ctl.subscribe();

        ctl.start("bus-42", "rider-1").await.unwrap();
        for _ in 0..3 {
            next_matching(&mut rx, |e| matches!(e, TrackingEvent::Updated(_))).await;
        }
        tokio::time::sleep(Duration::from_millis(60)).await;

        assert!(ctl.last_error().is_none());
        assert!(!drain(&mut rx)
            .iter()
            .any(|e| matches!(e, TrackingEvent::Error(_))));
        ctl.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_zero_speed_gives_zero_eta() {
        let hub = PositionHub::new();
        hub.push_observer(GeoPoint::new_unchecked(0.0, 0.0));
        hub.push_target(bus(0.01, 0.0), None).await;
        let ctl = controller(&hub);
        let mut rx = ctl.subscribe();

        ctl.start("bus-42", "rider-1").await.unwrap();
        let TrackingEvent::Updated(update) =
            next_matching(&mut rx, |e| matches!(e, TrackingEvent::Updated(_))).await
        else {
            unreachable!()
        };
        assert_eq!(update.eta_minutes, Some(0));
        assert_eq!(update.eta_text.as_deref(), Some("Arriving now"));
        assert_eq!(update.target_speed_kmh, Some(0.0));
        ctl.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_notification_actions() {
        let hub = PositionHub::new();
        hub.push_observer(GeoPoint::new_unchecked(0.0, 0.0));
        let ctl = controller(&hub);

        assert_eq!(
            ctl.handle_action(NotificationAction::OpenTrackingView)
                .await
                .unwrap(),
            None
        );

        let started = ctl.start("bus-42", "rider-1").await.unwrap();
        let view = ctl
            .handle_action(NotificationAction::OpenTrackingView)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(view.session_id, started.session_id);

        let stopped = ctl
            .handle_action(NotificationAction::StopTracking)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stopped.status, SessionStatus::Completed);
        assert!(ctl
            .handle_action(NotificationAction::StopTracking)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_store_sees_create_first_and_end_last() {
        let hub = PositionHub::new();
        hub.push_observer(GeoPoint::new_unchecked(0.0, 0.0));
        hub.push_target(bus(0.003, 25.0), None).await;
        let store = Arc::new(RecordingStore::default());
        let ctl = controller(&hub).with_store(store.clone());
        let mut rx = ctl.subscribe();

        ctl.start("bus-42", "rider-1").await.unwrap();
        next_matching(&mut rx, |e| matches!(e, TrackingEvent::Updated(_))).await;
        ctl.cancel().await.unwrap();

        let records = store.records.lock().unwrap().clone();
        assert_eq!(records.first(), Some(&("create", SessionStatus::Active)));
        assert_eq!(records.last(), Some(&("end", SessionStatus::Cancelled)));
        assert!(records
            .iter()
            .any(|(op, status)| *op == "update" && *status == SessionStatus::Active));
        assert_eq!(records.iter().filter(|(op, _)| *op == "end").count(), 1);
    }

    #[tokio::test]
    async fn test_shutdown_cancels_active_session() {
        let hub = PositionHub::new();
        hub.push_observer(GeoPoint::new_unchecked(0.0, 0.0));
        let ctl = controller(&hub);
        ctl.start("bus-42", "rider-1").await.unwrap();

        ctl.shutdown().await;
        assert_eq!(
            ctl.session().await.map(|s| s.status),
            Some(SessionStatus::Cancelled)
        );
    }

    /// Every subscription yields a feed error, one sample, then another error.
    struct GlitchyTarget;

    impl TargetPositionFeed for GlitchyTarget {
        fn subscribe(
            &self,
            target_id: &str,
        ) -> BoxFuture<'_, std::result::Result<TargetStream, FeedError>> {
            let sample =
                TrackedEntityState::now(target_id, GeoPoint::new_unchecked(0.0, 0.002), 10.0);
            Box::pin(async move {
                let glitch = || FeedError::Unavailable {
                    message: "socket reset".into(),
                };
                let items: Vec<std::result::Result<Option<TrackedEntityState>, FeedError>> =
                    vec![Err(glitch()), Ok(Some(sample)), Err(glitch())];
                Ok(Box::pin(futures::stream::iter(items)) as TargetStream)
            })
        }
    }

    #[tokio::test]
    async fn test_transient_target_failures_are_swallowed() {
        let hub = PositionHub::new();
        hub.push_observer(GeoPoint::new_unchecked(0.0, 0.0));
        let ctl = TrackingController::new(test_config(), Arc::new(hub.clone()), Arc::new(GlitchyTarget));
        let mut rx = ctl.subscribe();

        ctl.start("bus-42", "rider-1").await.unwrap();
        for _ in 0..3 {
            next_matching(&mut rx, |e| {
                matches!(e, TrackingEvent::Updated(u) if u.distance_m.is_some())
            })
            .await;
        }
        tokio::time::sleep(Duration::from_millis(60)).await;

        assert!(ctl.last_error().is_none());
        assert!(!drain(&mut rx)
            .iter()
            .any(|e| matches!(e, TrackingEvent::Error(_))));
        assert!(ctl.is_active().await);
        ctl.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_zero_interval_still_publishes() {
        let hub = PositionHub::new();
        hub.push_observer(GeoPoint::new_unchecked(0.0, 0.0));
        hub.push_target(bus(0.0046, 30.0), None).await;
        let config = TrackingConfig {
            interval_ms: 0,
            ..test_config()
        };
        let ctl = TrackingController::new(config, Arc::new(hub.clone()), Arc::new(hub.clone()));
        let mut updates = ctl.watch_updates();

        ctl.start("bus-42", "rider-1").await.unwrap();
        let published = tokio::time::timeout(
            Duration::from_secs(3),
            updates.wait_for(|u| u.as_ref().is_some_and(|u| u.distance_m.is_some())),
        )
        .await
        .expect("timed out waiting for an update")
        .unwrap()
        .clone();
        assert_eq!(published.and_then(|u| u.eta_minutes), Some(1));

        let ended = ctl.stop().await.unwrap();
        assert_eq!(ended.status, SessionStatus::Completed);
        assert_eq!(
            updates.borrow().as_ref().map(|u| u.status),
            Some(SessionStatus::Completed)
        );
    }

    #[tokio::test]
    async fn test_fresh_start_clears_previous_error() {
        let hub = PositionHub::new();
        hub.push_observer(GeoPoint::new_unchecked(0.0, 0.0));
        hub.push_target(bus(0.003, 20.0), None).await;
        let ctl = controller(&hub);
        let mut errors = ctl.watch_errors();

        ctl.start("ghost-bus", "rider-1").await.unwrap();
        let kind = tokio::time::timeout(Duration::from_secs(3), errors.wait_for(Option::is_some))
            .await
            .expect("timed out waiting for an error")
            .unwrap()
            .as_ref()
            .map(|r| r.kind);
        assert_eq!(kind, Some(TrackingErrorKind::TargetUnresolvable));
        ctl.cancel().await.unwrap();
        assert!(ctl.last_error().is_some());

        ctl.start("bus-42", "rider-1").await.unwrap();
        assert!(ctl.last_error().is_none());
        assert!(errors.borrow_and_update().is_none());
        ctl.stop().await.unwrap();
    }
}

//! Demo data simulator.
//!
//! Drives a fake bus around a looping route and pins the observer to a fixed
//! spot, pushing both into a [`PositionHub`]. The tracking controller cannot
//! tell simulated data from live pushes.

use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::DemoConfig;
use crate::geo::{distance_meters, GeoPoint};
use crate::hub::PositionHub;
use crate::types::TrackedEntityState;

/// Simulated bus and observer.
#[derive(Debug, Clone)]
pub struct DemoSimulator {
    config: DemoConfig,
    tick: Duration,
}

impl DemoSimulator {
    /// Create a simulator that pushes a new bus position every `tick`.
    #[must_use]
    pub const fn new(config: DemoConfig, tick: Duration) -> Self {
        Self { config, tick }
    }

    /// Length of one full loop of the route in meters.
    #[must_use]
    pub fn loop_length_m(&self) -> f64 {
        self.legs().map(|(a, b)| distance_meters(a, b)).sum()
    }

    /// Where the bus is after driving for `elapsed`.
    #[must_use]
    pub fn position_at(&self, elapsed: Duration) -> GeoPoint {
        let Some(&start) = self.config.route.first() else {
            return self.config.observer;
        };

        let loop_length = self.loop_length_m();
        if loop_length <= 0.0 || self.config.speed_kmh <= 0.0 {
            return start;
        }

        let mut remaining = (self.config.speed_kmh / 3.6 * elapsed.as_secs_f64()) % loop_length;
        for (a, b) in self.legs() {
            let leg = distance_meters(a, b);
            if remaining <= leg && leg > 0.0 {
                let f = remaining / leg;
                return GeoPoint::new_unchecked(
                    (b.latitude() - a.latitude()).mul_add(f, a.latitude()),
                    (b.longitude() - a.longitude()).mul_add(f, a.longitude()),
                );
            }
            remaining -= leg;
        }
        start
    }

    /// Push positions until `cancel` fires.
    pub async fn run(self, hub: PositionHub, cancel: CancellationToken) {
        info!(
            target_id = %self.config.target_id,
            route = %self.config.route_label,
            speed_kmh = self.config.speed_kmh,
            "Demo simulator started"
        );

        hub.push_observer(self.config.observer);

        let started = Instant::now();
        let mut ticker = tokio::time::interval(self.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                () = cancel.cancelled() => {
                    debug!("Demo simulator cancelled");
                    break;
                }

                _ = ticker.tick() => {
                    let position = self.position_at(started.elapsed());
                    let sample = TrackedEntityState::now(
                        self.config.target_id.clone(),
                        position,
                        self.config.speed_kmh,
                    );
                    hub.push_target(sample, Some(self.config.route_label.clone())).await;
                }
            }
        }
    }

    /// Consecutive waypoint pairs, closing the loop back to the start.
    fn legs(&self) -> impl Iterator<Item = (GeoPoint, GeoPoint)> + '_ {
        let route = &self.config.route;
        route
            .iter()
            .zip(route.iter().cycle().skip(1))
            .map(|(a, b)| (*a, *b))
    }
}

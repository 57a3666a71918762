use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{error, info};

use kroom_booking::BookingEngine;
use kroom_shared::models::events::HoldsExpiredEvent;
use kroom_shared::Clock;

/// Periodically cancels pending holds whose TTL has passed, until `shutdown` flips to true.
pub async fn start_expiry_worker(
    engine: Arc<BookingEngine>,
    clock: Arc<dyn Clock>,
    every: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!("Hold expiry worker started, sweeping every {:?}", every);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                sweep_once(&engine, clock.as_ref()).await;
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }

    info!("Hold expiry worker stopped");
}

pub async fn sweep_once(engine: &BookingEngine, clock: &dyn Clock) -> Option<HoldsExpiredEvent> {
    let now = clock.now();
    match engine.holds.expire_stale_holds(now).await {
        Ok(0) => None,
        Ok(expired) => {
            let event = HoldsExpiredEvent {
                expired,
                swept_at: now.timestamp(),
            };
            match serde_json::to_string(&event) {
                Ok(payload) => info!(target: "audit", "{}", payload),
                Err(e) => error!("Failed to serialize sweep event: {}", e),
            }
            Some(event)
        }
        Err(e) => {
            error!("Hold expiry sweep failed: {}", e);
            None
        }
    }
}

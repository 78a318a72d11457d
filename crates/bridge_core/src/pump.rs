use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use tokio::{
    task::JoinHandle,
    time::{interval, MissedTickBehavior},
};
use tracing::{debug, info, warn};

use crate::{session::CommandSession, vehicle::VehicleEndpoint};

pub const DEFAULT_PUMP_PERIOD: Duration = Duration::from_millis(20);
const MIN_PUMP_PERIOD: Duration = Duration::from_millis(1);

#[derive(Default)]
struct PumpCounters {
    ticks: AtomicU64,
    failures: AtomicU64,
}

/// Periodically pushes the session's latest state to the vehicle.
///
/// The first push happens immediately. Sensor updates landing between two ticks
/// coalesce into whatever the session holds at the next tick; late ticks are
/// skipped, never replayed. Dropping the pump stops it.
pub struct UpdatePump {
    task: Option<JoinHandle<()>>,
    counters: Arc<PumpCounters>,
    period: Duration,
}

impl UpdatePump {
    pub fn start(
        session: CommandSession,
        vehicle: Arc<dyn VehicleEndpoint>,
        period: Duration,
    ) -> Self {
        let period = period.max(MIN_PUMP_PERIOD);
        let counters = Arc::new(PumpCounters::default());
        let task_counters = Arc::clone(&counters);

        let task = tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut failing = false;

            loop {
                ticker.tick().await;
                let snapshot = session.snapshot().await;
                match vehicle.apply(&snapshot).await {
                    Ok(()) => {
                        if failing {
                            info!("pump: vehicle accepting updates again");
                            failing = false;
                        }
                    }
                    Err(err) => {
                        task_counters.failures.fetch_add(1, Ordering::Relaxed);
                        if failing {
                            debug!(%err, "pump: update still failing");
                        } else {
                            warn!(%err, "pump: vehicle update failed");
                            failing = true;
                        }
                    }
                }
                task_counters.ticks.fetch_add(1, Ordering::Relaxed);
            }
        });

        info!(?period, "pump: started");
        Self {
            task: Some(task),
            counters,
            period,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn ticks(&self) -> u64 {
        self.counters.ticks.load(Ordering::Relaxed)
    }

    pub fn failures(&self) -> u64 {
        self.counters.failures.load(Ordering::Relaxed)
    }

    pub async fn stop(mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            let _ = task.await;
        }
        info!(
            ticks = self.ticks(),
            failures = self.failures(),
            "pump: stopped"
        );
    }
}

impl Drop for UpdatePump {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
#[path = "tests/pump_tests.rs"]
mod tests;

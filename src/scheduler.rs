//! Periodic sweep tasks (spec §4.8). Each task is idempotent and safe to
//! invoke concurrently with itself: dedup is achieved by delete-after-
//! dispatch on the delayed queue and by the state machine's own
//! idempotent transitions.

use crate::clock::Clock;
use crate::config::Config;
use crate::dispatcher::Dispatcher;
use crate::engine::AlertEngine;
use crate::rules_engine::RuleEngine;
use crate::store::Store;
use std::sync::Arc;
use std::time::Duration as StdDuration;

pub struct Scheduler {
    engine: Arc<AlertEngine>,
    rules: Arc<RuleEngine>,
    dispatcher: Arc<Dispatcher>,
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    config: Config,
}

impl Scheduler {
    pub fn new(engine: Arc<AlertEngine>, rules: Arc<RuleEngine>, dispatcher: Arc<Dispatcher>, store: Arc<dyn Store>, clock: Arc<dyn Clock>, config: Config) -> Self {
        Self { engine, rules, dispatcher, store, clock, config }
    }

    /// Runs every sweep once. Intended to be called on a fixed interval
    /// by the binary's main loop (spec §4.8); each sub-task is itself
    /// idempotent so overlapping ticks are harmless.
    pub async fn tick(&self) -> SweepReport {
        let expired = self.engine.sweep_expired().await.unwrap_or_default();
        let unshelved = self.engine.sweep_unshelve().await.unwrap_or_default();
        let unacked = self.engine.sweep_unack().await.unwrap_or_default();
        let escalated = self.escalate_scan().await;
        let fired = self.dispatcher.fire_due().await;
        let reactivated = self.rules.reactivation_sweep(self.clock.now()).await.unwrap_or(0);
        let heartbeats = self.heartbeat_eval().await;

        SweepReport {
            expired: expired.len(),
            unshelved: unshelved.len(),
            unacked: unacked.len(),
            escalated,
            delayed_fired: fired,
            reactivated,
            heartbeats_evaluated: heartbeats,
        }
    }

    /// `escalate_scan` (spec §4.5/§4.8): bumps the severity of every alert
    /// selected by an escalation rule by one rank, then runs that bump
    /// through the normal transition pipeline so history/notifications
    /// follow the usual rules.
    async fn escalate_scan(&self) -> usize {
        let Ok(targets) = self.rules.select_escalation_targets(self.clock.now()).await else {
            return 0;
        };
        let mut count = 0;
        for alert in targets {
            let Some(bumped) = alert.severity.next_more_severe() else {
                continue;
            };
            if self.engine.escalate(&alert.id, bumped).await.is_ok() {
                count += 1;
            }
        }
        count
    }

    /// `heartbeat_eval` (spec §4.8): recomputes OK/Slow/Expired for every
    /// known heartbeat. The derived status itself isn't persisted --
    /// it's recomputed on read -- so this pass only logs; a monitoring
    /// surface can call [`crate::model::heartbeat::Heartbeat::status`]
    /// directly when reporting health.
    async fn heartbeat_eval(&self) -> usize {
        let Ok(heartbeats) = self.store.list_heartbeats().await else {
            return 0;
        };
        let now = self.clock.now();
        let max_latency = chrono::Duration::seconds(self.config.heartbeat_max_latency);
        for hb in &heartbeats {
            let status = hb.status(now, max_latency);
            tracing::debug!(origin = %hb.origin, ?status, "heartbeat evaluated");
        }
        heartbeats.len()
    }

    /// Runs [`Self::tick`] on a fixed interval until the returned handle
    /// is dropped or aborted.
    pub fn spawn_periodic(self: Arc<Self>, interval: StdDuration) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let report = self.tick().await;
                tracing::info!(?report, "scheduler sweep completed");
            }
        })
    }
}

#[derive(Debug, Default)]
pub struct SweepReport {
    pub expired: usize,
    pub unshelved: usize,
    pub unacked: usize,
    pub escalated: usize,
    pub delayed_fired: usize,
    pub reactivated: usize,
    pub heartbeats_evaluated: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::model::alert::tests::sample_alert;
    use crate::store::memory::MemoryStore;
    use chrono::Utc;

    #[tokio::test]
    async fn tick_runs_every_sweep_without_error() {
        let clock = FixedClock::new(Utc::now());
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new(clock.clone()));
        let config = Config::default();
        let engine = Arc::new(AlertEngine::new(store.clone(), clock.clone(), config.clone()));
        let rules = Arc::new(RuleEngine::new(store.clone(), config.clone()));
        let dispatcher = Arc::new(Dispatcher::new(store.clone(), clock.clone(), rules.clone(), config.clone()));
        let scheduler = Scheduler::new(engine, rules, dispatcher, store.clone(), clock.clone(), config);

        store.insert_alert(sample_alert()).await.unwrap();
        let report = scheduler.tick().await;
        assert_eq!(report.heartbeats_evaluated, 0);
    }
}

//! Scheduler: one cycle per enabled site per tick, sites strictly in order.

use std::time::Duration;

use tracing::{info, instrument, warn};

use autopress_shared::Site;

use crate::cycle::{CycleOutcome, CycleProgress, PublishingCycle};

/// Outcome of one site in a tick.
#[derive(Debug, Clone)]
pub struct SiteOutcome {
    pub site_id: String,
    pub outcome: CycleOutcome,
}

/// Drives [`PublishingCycle`] over the configured sites.
///
/// Exactly one scheduler should write a given database.
pub struct Scheduler {
    cycle: PublishingCycle,
    sites: Vec<Site>,
    tick_interval: Duration,
}

impl Scheduler {
    pub fn new(cycle: PublishingCycle, sites: Vec<Site>, tick_interval: Duration) -> Self {
        Self {
            cycle,
            sites,
            tick_interval,
        }
    }

    pub fn cycle(&self) -> &PublishingCycle {
        &self.cycle
    }

    pub fn sites(&self) -> &[Site] {
        &self.sites
    }

    /// One pass over all enabled sites.
    ///
    /// After a site that did work, the next site to do work waits that
    /// site's `min_interval` first. Sites that are skipped never wait.
    #[instrument(skip_all, fields(sites = self.sites.len()))]
    pub async fn tick(&self, progress: &dyn CycleProgress) -> Vec<SiteOutcome> {
        let mut outcomes = Vec::new();
        let mut owed_delay: Option<Duration> = None;

        for site in self.sites.iter().filter(|s| s.enabled) {
            let eligible = match self.cycle.check_eligibility(site).await {
                Ok(reason) => reason.is_none(),
                // Let the cycle surface and count the storage failure.
                Err(_) => true,
            };
            if eligible {
                if let Some(delay) = owed_delay.take().filter(|d| !d.is_zero()) {
                    info!(site = %site.id, delay_secs = delay.as_secs(), "waiting before next site");
                    tokio::time::sleep(delay).await;
                }
            }

            let outcome = self.cycle.run(site, progress).await;
            if outcome.did_work() {
                owed_delay = Some(site.min_interval);
            }
            outcomes.push(SiteOutcome {
                site_id: site.id.clone(),
                outcome,
            });
        }

        let worked = outcomes.iter().filter(|o| o.outcome.did_work()).count();
        info!(worked, total = outcomes.len(), "tick complete");
        outcomes
    }

    /// Tick now, then every `tick_interval`, until Ctrl-C.
    pub async fn run_forever(&self, progress: &dyn CycleProgress) {
        info!(
            sites = self.sites.len(),
            interval_secs = self.tick_interval.as_secs(),
            "scheduler started"
        );
        loop {
            self.tick(progress).await;

            tokio::select! {
                _ = tokio::time::sleep(self.tick_interval) => {}
                result = tokio::signal::ctrl_c() => {
                    if let Err(e) = result {
                        warn!(error = %e, "listening for Ctrl-C failed");
                    }
                    info!("scheduler stopping");
                    return;
                }
            }
        }
    }
}

//! Crawl state machine - the harvest loop
//!
//! The machine runs as one cooperative loop. Each [`Harvester::step`] acquires
//! quota, fetches one page, writes what it accepts, and moves between phases:
//!
//! | From | Page | To |
//! |------|------|----|
//! | ForwardSweep | Progress | ForwardSweep, `max_id` lowered |
//! | ForwardSweep | WindowExhausted | ForwardSweep, rewound to the newest id seen |
//! | ForwardSweep | empty, nothing seen since the last rewind | Idle |
//! | ForwardSweep | empty, newer ids seen | ForwardSweep, rewound |
//!
//! The loop only suspends at the inter-request sleep, the quota wait, and the
//! idle sleep. Rotation runs only on entry into `Idle`, so it never interleaves
//! with a sweep's writes.

use crate::clock::Clock;
use crate::config::Config;
use crate::crawler::paginator::{classify, next_query, Classification};
use crate::crawler::CrawlCursor;
use crate::quota::QuotaTracker;
use crate::record::{records_from_page, Record};
use crate::search::{QuerySpec, SearchClient};
use crate::storage::{
    zone_from_hours, Checkpoint, CsvLog, Period, RotationReport, RotationState, Rotator,
};
use crate::{ConfigError, HarvestError, Result};
use chrono::FixedOffset;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Where the machine is in its cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Walking back through history from the newest record to `since_id`
    ForwardSweep,

    /// Nothing new; deciding whether to rotate before sleeping
    CaughtUp,

    /// Sleeping the long interval
    Idle,
}

/// Result of one [`Harvester::step`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// A page was stored and the upper bound lowered
    Collected {
        fetched: usize,
        written: usize,
        new_max_id: u64,
    },

    /// The sweep was restarted from `since_id`
    Rewound { since_id: u64, written: usize },

    /// The machine slept the idle interval
    Idled { rotated: bool },
}

/// Everything the loop mutates, owned by the machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrawlState {
    pub cursor: CrawlCursor,
    pub rotation: RotationState,
    pub phase: Phase,
}

impl CrawlState {
    pub fn new(since_id: u64, active_period: Period) -> Self {
        Self {
            cursor: CrawlCursor::starting_at(since_id),
            rotation: RotationState::new(active_period),
            phase: Phase::ForwardSweep,
        }
    }

    /// Rebuilds the state from configuration, preferring a saved checkpoint
    pub fn restore(config: &Config, clock: &dyn Clock) -> Result<Self> {
        let zone = zone_from_hours(config.output.utc_offset_hours);
        let configured_period = match &config.output.current_month {
            Some(month) => month
                .parse()
                .map_err(|e| ConfigError::Validation(format!("current-month: {}", e)))?,
            None => Period::containing(clock.now(), &zone),
        };

        if let Some(path) = &config.output.checkpoint_path {
            match Checkpoint::load(std::path::Path::new(path)) {
                Ok(Some(checkpoint)) => {
                    tracing::info!(
                        "Resuming from checkpoint: since_id={}, active period {}",
                        checkpoint.since_id,
                        checkpoint.active_period
                    );
                    return Ok(Self::new(checkpoint.since_id, checkpoint.active_period));
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!("Ignoring unreadable checkpoint, starting from config: {}", e);
                }
            }
        }

        Ok(Self::new(config.search.most_recent_id, configured_period))
    }
}

/// Tunables of the harvest loop
#[derive(Debug, Clone)]
pub struct HarvestSettings {
    pub base_query: String,
    pub sleep_interval: Duration,
    pub idle_interval: Duration,
    pub rotation_enabled: bool,
    pub zone: FixedOffset,
    pub data_file: PathBuf,
    pub data_dir: PathBuf,
    pub checkpoint_path: Option<PathBuf>,
}

impl HarvestSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            base_query: config.search.base_query.clone(),
            sleep_interval: Duration::from_secs(config.search.sleep_interval),
            idle_interval: Duration::from_secs(config.search.idle_interval),
            rotation_enabled: config.output.rotation_enabled,
            zone: zone_from_hours(config.output.utc_offset_hours),
            data_file: PathBuf::from(&config.output.data_file),
            data_dir: PathBuf::from(&config.output.data_dir),
            checkpoint_path: config.output.checkpoint_path.as_ref().map(PathBuf::from),
        }
    }
}

/// The crawl state machine
pub struct Harvester<C: SearchClient> {
    client: C,
    quota: QuotaTracker,
    log: CsvLog,
    rotator: Rotator,
    clock: Arc<dyn Clock>,
    settings: HarvestSettings,
    state: CrawlState,
}

impl<C: SearchClient> Harvester<C> {
    /// Creates a harvester
    ///
    /// # Arguments
    ///
    /// * `client` - The search capability
    /// * `settings` - Loop tunables and file locations
    /// * `state` - Initial cursor and rotation state
    /// * `clock` - Wall-clock source for quota resets and month boundaries
    pub fn new(
        client: C,
        settings: HarvestSettings,
        state: CrawlState,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            quota: QuotaTracker::new(settings.sleep_interval, Arc::clone(&clock)),
            log: CsvLog::new(&settings.data_file, settings.zone),
            rotator: Rotator::new(&settings.data_file, &settings.data_dir),
            client,
            clock,
            settings,
            state,
        }
    }

    /// Creates a harvester from configuration
    pub fn from_config(config: &Config, client: C, clock: Arc<dyn Clock>) -> Result<Self> {
        let state = CrawlState::restore(config, clock.as_ref())?;
        Ok(Self::new(
            client,
            HarvestSettings::from_config(config),
            state,
            clock,
        ))
    }

    pub fn state(&self) -> &CrawlState {
        &self.state
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// The query the next step will issue
    pub fn current_query(&self) -> QuerySpec {
        next_query(&self.state.cursor, &self.settings.base_query)
    }

    /// Runs the harvest loop until a fatal error
    pub async fn run(&mut self) -> Result<()> {
        tracing::info!(
            "Starting harvest: since_id={}, active period {}",
            self.state.cursor.since_id,
            self.state.rotation.active_period
        );

        loop {
            let transition = self.step().await?;
            tracing::trace!("Transition: {:?}", transition);
        }
    }

    /// Fetches one page and applies the resulting transition
    pub async fn step(&mut self) -> Result<Transition> {
        let query = self.current_query();
        let page = self.fetch_page(&query).await?;
        self.state.cursor.observe_page(&page);

        if !page.is_empty() && (page.len() as u32) < query.page_size() {
            tracing::debug!(
                "Short page: {} of {} records",
                page.len(),
                query.page_size()
            );
        }

        let transition = match classify(&page, &self.state.cursor) {
            Classification::CaughtUp if self.state.cursor.latest_seen_id.is_none() => {
                let rotated = self.idle().await?;
                return Ok(Transition::Idled { rotated });
            }
            Classification::CaughtUp => {
                tracing::info!("Reached the oldest records available, rotating the target range");
                let since_id = self.rewind();
                Transition::Rewound {
                    since_id,
                    written: 0,
                }
            }
            Classification::WindowExhausted => {
                let floor = self.state.cursor.since_id;
                let written = self
                    .log
                    .append_all(page.iter().filter(|r| r.id > floor))?;
                tracing::info!("{} records collected, window exhausted", written);
                let since_id = self.rewind();
                Transition::Rewound { since_id, written }
            }
            Classification::Progress { new_max_id } => {
                let written = self.log.append_all(&page)?;
                self.state.cursor.advance(new_max_id);
                tracing::info!(
                    "{} records collected ({} written), new max_id: {}",
                    page.len(),
                    written,
                    new_max_id
                );

                if self.state.cursor.since_id == 0 {
                    // An unbounded query cannot walk further back; anchor here
                    let since_id = self.rewind();
                    tracing::info!("No history yet, anchored the crawl at {}", since_id);
                }

                Transition::Collected {
                    fetched: page.len(),
                    written,
                    new_max_id,
                }
            }
        };

        tracing::debug!(
            "Waiting {:?} before fetching the next result",
            self.settings.sleep_interval
        );
        tokio::time::sleep(self.settings.sleep_interval).await;

        Ok(transition)
    }

    /// Issues `query` once quota allows, retrying transient failures
    async fn fetch_page(&mut self, query: &QuerySpec) -> Result<Vec<Record>> {
        loop {
            self.quota.acquire(&self.client).await;

            match self.client.search(query).await {
                Ok(raw) => {
                    tracing::debug!("query: {}", query);
                    return records_from_page(raw).map_err(|e| {
                        tracing::error!("Unusable search result for {}: {}", query, e);
                        e
                    });
                }
                Err(e) => {
                    tracing::warn!("Search failed for {}: {}", query, e);
                    tokio::time::sleep(self.settings.sleep_interval).await;
                }
            }
        }
    }

    /// Starts a new sweep at the newest id seen and checkpoints it
    fn rewind(&mut self) -> u64 {
        let since_id = self.state.cursor.rewind();
        self.state.phase = Phase::ForwardSweep;
        tracing::info!("new since_id: {}", since_id);
        self.save_checkpoint();
        since_id
    }

    /// Rotates if due, then sleeps the idle interval
    ///
    /// Returns whether a rotation ran.
    async fn idle(&mut self) -> Result<bool> {
        self.state.phase = Phase::CaughtUp;

        let mut rotated = false;
        if self.settings.rotation_enabled {
            let current = self.current_period();
            if self.state.rotation.is_due(current) {
                tracing::info!("Month changed, rotating the data");
                rotated = self.rotate_to(current)?.is_some();
            }
        }

        self.state.phase = Phase::Idle;
        tracing::info!(
            "Sleeping {:?} before the next cycle",
            self.settings.idle_interval
        );
        tokio::time::sleep(self.settings.idle_interval).await;

        if self.settings.rotation_enabled {
            let current = self.current_period();
            if self.state.rotation.observe(current) {
                tracing::info!(
                    "Month advanced to {}, rotation deferred to the next idle",
                    current
                );
            }
        }

        self.state.phase = Phase::ForwardSweep;
        Ok(rotated)
    }

    /// Rotates the active log from the active period into `next`
    ///
    /// Returns `None` when `next` is not after the active period.
    pub fn rotate_to(&mut self, next: Period) -> Result<Option<RotationReport>> {
        let period = self.state.rotation.active_period;
        if next <= period {
            tracing::debug!("Nothing to rotate: {} is not after {}", next, period);
            self.state.rotation.pending = false;
            return Ok(None);
        }

        let report = self.rotator.rotate(period, next).map_err(|e| {
            tracing::error!("Rotation {} -> {} failed: {}", period, next, e);
            HarvestError::from(e)
        })?;
        self.state.rotation.advance(next);
        tracing::info!(
            "Rotated the data file {} -> {} ({} archived, {} carried, {} dropped)",
            period,
            next,
            report.archived,
            report.carried,
            report.dropped
        );
        self.save_checkpoint();
        Ok(Some(report))
    }

    /// Month of "now" in the target zone
    pub fn current_period(&self) -> Period {
        Period::containing(self.clock.now(), &self.settings.zone)
    }

    fn save_checkpoint(&self) {
        let Some(path) = &self.settings.checkpoint_path else {
            return;
        };
        let checkpoint = Checkpoint {
            since_id: self.state.cursor.since_id,
            active_period: self.state.rotation.active_period,
        };
        if let Err(e) = checkpoint.save(path) {
            tracing::warn!("Failed to save checkpoint: {}", e);
        }
    }
}

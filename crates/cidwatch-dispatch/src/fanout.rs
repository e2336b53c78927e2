//! Per-identifier fan-out of downstream work.
//!
//! For every identifier the [`Dispatcher`] starts, without waiting on any of
//! it:
//! - one pin request (or a `pin_skipped` record when no credential is set)
//! - gateway fetches, per [`FetchStrategy`]:
//!   - `All`: one independent task per template; nothing is ever cancelled
//!   - `LocalFirst`: the local gateway gets a head start of
//!     `fallback_threshold_ms`; after that (or after it fails) the public
//!     templates join and the first success ends the race
//!
//! Every completed action writes one `dispatch` record. Records for
//! different actions land in completion order.

use std::sync::Arc;
use std::time::Duration;

use cidwatch_core::{ActionKind, DispatchOutcome, Identifier};
use cidwatch_logging::{EventLog, LogEvent};
use cidwatch_settings::{FetchStrategy, GatewaySettings, PinSettings};
use futures::StreamExt;
use futures::stream::FuturesUnordered;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

use crate::collaborators::{GatewayFetcher, PinService};
use crate::gateways::{gateway_url, gateway_urls};

/// Handles of the tasks one dispatch started.
///
/// Dropping it detaches the tasks; they still run to completion.
#[derive(Debug, Default)]
pub struct DispatchTicket {
    handles: Vec<JoinHandle<()>>,
}

impl DispatchTicket {
    /// Number of tasks started.
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// Whether nothing was started.
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Wait for every task. Only tests and one-shot commands need this.
    pub async fn join(self) {
        for handle in self.handles {
            let _ = handle.await;
        }
    }

    fn extend(&mut self, other: DispatchTicket) {
        self.handles.extend(other.handles);
    }
}

/// Starts downstream work for identifiers.
pub struct Dispatcher {
    pin: Arc<dyn PinService>,
    fetcher: Arc<dyn GatewayFetcher>,
    pin_settings: PinSettings,
    gateway: GatewaySettings,
    events: EventLog,
}

impl Dispatcher {
    /// Dispatcher over the given collaborators.
    pub fn new(
        pin: Arc<dyn PinService>,
        fetcher: Arc<dyn GatewayFetcher>,
        pin_settings: PinSettings,
        gateway: GatewaySettings,
        events: EventLog,
    ) -> Self {
        Self {
            pin,
            fetcher,
            pin_settings,
            gateway,
            events,
        }
    }

    /// Start pin and fetch work for each identifier. Returns immediately;
    /// must be called from within a Tokio runtime.
    pub fn dispatch(&self, subject: &str, cids: &[Identifier]) -> DispatchTicket {
        let mut ticket = DispatchTicket::default();
        for cid in cids {
            ticket.extend(self.dispatch_pin(subject, cid));
            ticket.extend(self.dispatch_fetch(subject, cid));
        }
        ticket
    }

    /// Start only the pin request for `cid`.
    pub fn dispatch_pin(&self, subject: &str, cid: &Identifier) -> DispatchTicket {
        let Some(credential) = self.pin_settings.jwt.clone() else {
            self.events.record(LogEvent::PinSkipped {
                cid: cid.clone(),
                subject: subject.to_string(),
                reason: "no_credential".to_string(),
            });
            return DispatchTicket::default();
        };

        let pin = Arc::clone(&self.pin);
        let events = self.events.clone();
        let timeout = Duration::from_millis(self.pin_settings.timeout_ms);
        let cid = cid.clone();
        let subject = subject.to_string();

        let handle = tokio::spawn(async move {
            let started = Instant::now();
            let response = pin.pin(&cid, &credential, timeout).await;
            let outcome = DispatchOutcome::new(
                ActionKind::Pin,
                cid,
                pin.endpoint(),
                response.status,
                millis(started.elapsed()),
            )
            .with_subject(subject)
            .with_error(response.error)
            .with_response(response.body);
            events.record(LogEvent::Dispatch(outcome));
        });
        DispatchTicket {
            handles: vec![handle],
        }
    }

    /// Start only the gateway fetches for `cid`.
    pub fn dispatch_fetch(&self, subject: &str, cid: &Identifier) -> DispatchTicket {
        match self.gateway.strategy {
            FetchStrategy::All => self.fetch_all(subject, cid),
            FetchStrategy::LocalFirst => {
                let race = LocalFirst {
                    fetcher: Arc::clone(&self.fetcher),
                    events: self.events.clone(),
                    gateway: self.gateway.clone(),
                    cid: cid.clone(),
                    subject: subject.to_string(),
                };
                DispatchTicket {
                    handles: vec![tokio::spawn(race.run())],
                }
            }
        }
    }

    fn fetch_all(&self, subject: &str, cid: &Identifier) -> DispatchTicket {
        let timeout = Duration::from_millis(self.gateway.timeout_ms);
        let handles = gateway_urls(&self.gateway.templates, cid)
            .into_iter()
            .map(|url| {
                let attempt = FetchAttempt {
                    fetcher: Arc::clone(&self.fetcher),
                    events: self.events.clone(),
                    cid: cid.clone(),
                    subject: subject.to_string(),
                    url,
                    timeout,
                };
                tokio::spawn(async move {
                    let _ = attempt.run().await;
                })
            })
            .collect();
        DispatchTicket { handles }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("pin_endpoint", &self.pin.endpoint())
            .field("strategy", &self.gateway.strategy)
            .finish_non_exhaustive()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Fetch attempts
// ─────────────────────────────────────────────────────────────────────────────

/// One timed fetch that records its own outcome.
struct FetchAttempt {
    fetcher: Arc<dyn GatewayFetcher>,
    events: EventLog,
    cid: Identifier,
    subject: String,
    url: String,
    timeout: Duration,
}

/// What a finished attempt reports back to a race.
struct Finished {
    url: String,
    ok: bool,
    size_bytes: u64,
}

impl FetchAttempt {
    async fn run(self) -> Finished {
        let started = Instant::now();
        let response = self.fetcher.fetch(&self.url, self.timeout).await;
        let outcome = DispatchOutcome::new(
            ActionKind::GatewayFetch,
            self.cid,
            self.url.clone(),
            response.status,
            millis(started.elapsed()),
        )
        .with_subject(self.subject)
        .with_size(response.size_bytes)
        .with_error(response.error);
        let finished = Finished {
            url: self.url,
            ok: outcome.ok,
            size_bytes: outcome.size_bytes,
        };
        self.events.record(LogEvent::Dispatch(outcome));
        finished
    }
}

/// Local gateway first, public gateways after the threshold.
struct LocalFirst {
    fetcher: Arc<dyn GatewayFetcher>,
    events: EventLog,
    gateway: GatewaySettings,
    cid: Identifier,
    subject: String,
}

impl LocalFirst {
    fn attempt(&self, url: String, timeout_ms: u64) -> FetchAttempt {
        FetchAttempt {
            fetcher: Arc::clone(&self.fetcher),
            events: self.events.clone(),
            cid: self.cid.clone(),
            subject: self.subject.clone(),
            url,
            timeout: Duration::from_millis(timeout_ms),
        }
    }

    async fn run(self) {
        let started = Instant::now();
        let local_url = gateway_url(&self.gateway.local_gateway, &self.cid);
        let mut local = tokio::spawn(
            self.attempt(local_url.clone(), self.gateway.local_timeout_ms)
                .run(),
        );
        let mut failed = 0usize;

        let threshold = tokio::time::sleep(Duration::from_millis(self.gateway.fallback_threshold_ms));
        let still_running = tokio::select! {
            result = &mut local => {
                match result {
                    Ok(finished) if finished.ok => {
                        self.summarize("local_only", Some(&finished), failed, started);
                        return;
                    }
                    _ => {
                        failed += 1;
                        None
                    }
                }
            }
            () = threshold => Some(local),
        };
        debug!(cid = %self.cid, local_done = still_running.is_none(), "starting public gateways");

        let mut racers: FuturesUnordered<JoinHandle<Finished>> =
            gateway_urls(&self.gateway.templates, &self.cid)
                .into_iter()
                .map(|url| tokio::spawn(self.attempt(url, self.gateway.timeout_ms).run()))
                .collect();
        if let Some(local) = still_running {
            racers.push(local);
        }

        while let Some(result) = racers.next().await {
            match result {
                Ok(finished) if finished.ok => {
                    for loser in racers.iter() {
                        loser.abort();
                    }
                    let strategy = if finished.url == local_url {
                        "local_after_threshold"
                    } else {
                        "fallback_to_public"
                    };
                    self.summarize(strategy, Some(&finished), failed, started);
                    return;
                }
                _ => failed += 1,
            }
        }
        self.summarize("all_failed", None, failed, started);
    }

    fn summarize(&self, strategy: &str, winner: Option<&Finished>, failed: usize, started: Instant) {
        self.events.record(LogEvent::SmartFetch {
            cid: self.cid.clone(),
            subject: self.subject.clone(),
            strategy: strategy.to_string(),
            gateway: winner.map(|w| w.url.clone()),
            size_bytes: winner.map_or(0, |w| w.size_bytes),
            total_elapsed_ms: millis(started.elapsed()),
            failed_gateways: failed,
            ok: winner.is_some(),
        });
    }
}

fn millis(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}

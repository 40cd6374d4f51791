//! Flushing of the counters to the remote collector. Requests run as separate tasks so a slow
//! collector never stalls the processing loop; their outcome comes back through a channel.

pub mod sink;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sink::{RemoteSink, ReportError};
use tokio::sync::mpsc;
use tracing::{error, info, info_span, warn, Instrument};

use super::storage::entities::SiteCounters;

/// Result of a finished report together with the counters that were sent.
#[derive(Debug)]
pub struct ReportOutcome {
    pub sent: SiteCounters,
    pub result: Result<(), ReportError>,
}

pub struct Reporter {
    sink: Arc<dyn RemoteSink>,
    completions: mpsc::Sender<ReportOutcome>,
    in_flight: bool,
}

impl Reporter {
    pub fn new(sink: Arc<dyn RemoteSink>, completions: mpsc::Sender<ReportOutcome>) -> Self {
        Self {
            sink,
            completions,
            in_flight: false,
        }
    }

    #[cfg(test)]
    fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    /// Starts sending `snapshot`. Only one report may be in flight, returns `false` if another
    /// one is still running.
    pub fn start(&mut self, snapshot: SiteCounters, now: DateTime<Utc>) -> bool {
        if self.in_flight {
            warn!("Previous statistics are still being sent, skipping");
            return false;
        }
        self.in_flight = true;

        let sink = self.sink.clone();
        let completions = self.completions.clone();
        let span = info_span!("Sending statistics", sites = snapshot.len());
        tokio::spawn(
            async move {
                let result = sink.update(&snapshot, now).await;
                let outcome = ReportOutcome {
                    sent: snapshot,
                    result,
                };
                if let Err(e) = completions.send(outcome).await {
                    error!("Report finished after processing stopped {e:?}");
                }
            }
            .instrument(span),
        );
        true
    }

    /// Marks the running report as done. Must be called for every received [ReportOutcome].
    pub fn finish(&mut self) {
        self.in_flight = false;
    }

    /// Asks the collector to drop its aggregates. Nobody waits for the answer.
    pub fn clear_remote(&self) {
        let sink = self.sink.clone();
        tokio::spawn(async move {
            match sink.clear().await {
                Ok(()) => info!("Cleared statistics on the collector"),
                Err(e) => error!("Failed to clear statistics on the collector {e}"),
            }
        });
    }
}

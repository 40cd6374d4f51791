use std::{sync::Arc, time::Duration};

use anyhow::Result;
use chrono::Local;
use tokio::{
    sync::mpsc::{self, Receiver, Sender},
    time::{interval_at, Interval, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
    host::{
        mirror::BrowserMirror,
        protocol::{ControlRequest, HostEvent, IdleState, InboundMessage, OutboundMessage, Status},
    },
    utils::clock::Clock,
};

use super::{
    collection::idle::PauseState,
    reporting::{sink::RemoteSink, ReportOutcome, Reporter},
    storage::{accounting::AccountingStore, entities::StorageType, kv_store::KeyValueStore},
};

use clear::{evaluate_clear, CLEAR_CHECK_INTERVAL};
use tracker::{ActivityTracker, Observation, TrackerInput};

pub mod clear;
pub mod site;
pub mod tracker;

/// Represents the processing loop of the daemon. Host messages, timers and report completions
/// are all handled here one at a time, so the tracker and the store never need locking.
pub struct ProcessingModule<S: KeyValueStore> {
    receiver: Receiver<InboundMessage>,
    outbound: Sender<OutboundMessage>,
    store: AccountingStore<S>,
    browser: BrowserMirror,
    tracker: ActivityTracker,
    tick_interval: Duration,
    reporter: Reporter,
    completions: Receiver<ReportOutcome>,
    clock: Box<dyn Clock>,
    shutdown: CancellationToken,
    status: Status,
    /// Last pause state seen in the store. The cli may change it behind the daemon's back.
    pause: PauseState,
}

impl<S: KeyValueStore> ProcessingModule<S> {
    pub fn new(
        receiver: Receiver<InboundMessage>,
        outbound: Sender<OutboundMessage>,
        store: AccountingStore<S>,
        sink: Arc<dyn RemoteSink>,
        tick_interval: Duration,
        clock: Box<dyn Clock>,
        shutdown: CancellationToken,
    ) -> Self {
        let (completions_sender, completions) = mpsc::channel(1);
        Self {
            receiver,
            outbound,
            store,
            browser: BrowserMirror::new(),
            tracker: ActivityTracker::new(tick_interval),
            tick_interval,
            reporter: Reporter::new(sink, completions_sender),
            completions,
            clock,
            shutdown,
            status: Status::Ok,
            pause: PauseState::default(),
        }
    }

    fn create_interval(&self, period: Duration) -> Interval {
        let mut interval = interval_at(self.clock.instant() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        interval
    }

    /// Executes the processing loop. Stops once the host goes away or shutdown is requested.
    pub async fn run(mut self) -> Result<()> {
        self.store.initialize().await?;
        let pause = self.store.pause_state().await?;
        self.observe_pause(pause).await;

        let send_interval = self.store.send_interval().await?;
        info!("Sending stats interval {send_interval:?}");

        let mut forced_update = self.create_interval(self.tick_interval);
        let mut clear_check = self.create_interval(CLEAR_CHECK_INTERVAL);
        let mut send = self.create_interval(send_interval);

        loop {
            let result = tokio::select! {
                _ = self.shutdown.cancelled() => break,
                message = self.receiver.recv() => match message {
                    Some(message) => self.process_message(message).await,
                    None => break,
                },
                Some(outcome) = self.completions.recv() => self.finish_report(outcome).await,
                _ = forced_update.tick() => self.process_input(TrackerInput::Tick).await,
                _ = clear_check.tick() => self.check_clear().await,
                _ = send.tick() => self.send_statistics().await,
            };

            if let Err(e) = result {
                error!("Error during processing {e:?}");
            }
        }

        info!("Processing stopped");
        Ok(())
    }

    async fn process_message(&mut self, message: InboundMessage) -> Result<()> {
        debug!("Processing message {:?}", message);
        match message {
            InboundMessage::Event(event) => self.process_event(event).await,
            InboundMessage::Request(request) => {
                let action = request.action();
                let result = self.process_request(request).await;
                self.send_outbound(OutboundMessage::Ack { action }).await;
                result
            }
        }
    }

    async fn process_event(&mut self, event: HostEvent) -> Result<()> {
        self.browser.apply(&event);
        match event {
            HostEvent::TabActivated { tab_id, .. } => {
                self.process_input(TrackerInput::TabFocusChanged(tab_id))
                    .await
            }
            HostEvent::TabUpdated { tab_id, .. } => {
                self.process_input(TrackerInput::TabUrlChanged(tab_id)).await
            }
            HostEvent::WindowFocusChanged { window_id } => {
                self.process_input(TrackerInput::WindowFocusChanged(window_id))
                    .await
            }
            HostEvent::TabRemoved { .. } => Ok(()),
            HostEvent::IdleStateChanged { state } => self.process_idle_state(state).await,
        }
    }

    async fn process_request(&mut self, request: ControlRequest) -> Result<()> {
        info!("Processing request {:?}", request);
        match request {
            ControlRequest::SendStats => self.send_statistics().await,
            ControlRequest::ClearStats => self.clear_statistics().await,
            ControlRequest::AddIgnoredSite { url } => {
                self.store.ignore_url(&url).await?;
                Ok(())
            }
            ControlRequest::Pause => self.update_pause(PauseState::paused_by_user).await,
            ControlRequest::Resume => self.update_pause(PauseState::resumed_by_user).await,
        }
    }

    async fn process_input(&mut self, input: TrackerInput) -> Result<()> {
        let pause = self.store.pause_state().await?;
        self.observe_pause(pause).await;
        let ignored = self.store.ignored_sites().await?;
        let observation = Observation {
            browser: &self.browser,
            ignored: &ignored,
            paused: pause.is_paused(),
            now: self.clock.time(),
        };

        if let Some(credit) = self.tracker.handle(input, &observation) {
            debug!("Adding {} seconds to {}", credit.seconds, credit.site);
            self.store.add_time(&credit.site, credit.seconds).await?;
        }
        Ok(())
    }

    /// Accounting resumes lazily: nothing is recomputed here, the next input or tick does it.
    async fn process_idle_state(&mut self, state: IdleState) -> Result<()> {
        debug!("Checking idle behavior {state:?}");
        let detection_enabled = self.store.idle_detection().await?;
        self.update_pause(|pause| pause.with_idle_state(state, detection_enabled))
            .await
    }

    async fn update_pause(
        &mut self,
        update: impl FnOnce(PauseState) -> PauseState + Send,
    ) -> Result<()> {
        let pause = self.store.update_pause_state(update).await?;
        self.observe_pause(pause).await;
        Ok(())
    }

    /// Reacts to the effective pause flag flipping. The measurement in progress is dropped on
    /// pause, so time spent paused is never booked even if resume comes before the next tick.
    async fn observe_pause(&mut self, pause: PauseState) {
        let change = self.pause.status_change(pause);
        self.pause = pause;
        match change {
            Some(Status::Paused) => {
                info!("Pausing timers");
                self.tracker.suspend();
                self.set_status(Status::Paused).await;
            }
            Some(status) => {
                info!("Resuming timers");
                self.set_status(status).await;
            }
            None => {}
        }
    }

    async fn check_clear(&mut self) -> Result<()> {
        debug!("Checking to see if we should clear stats");
        if evaluate_clear(&self.store, &self.clock.time().with_timezone(&Local)).await? {
            self.clear_statistics().await?;
        }
        Ok(())
    }

    async fn clear_statistics(&mut self) -> Result<()> {
        info!("Clearing statistics");
        if self.store.storage_type().await? == StorageType::Remote {
            self.reporter.clear_remote();
        }
        self.store.clear_sites().await
    }

    async fn send_statistics(&mut self) -> Result<()> {
        if self.store.pause_state().await?.is_paused() {
            info!("Paused, not sending statistics");
            return Ok(());
        }

        if self.store.storage_type().await? != StorageType::Remote {
            debug!("Local storage only, nothing to send");
            return Ok(());
        }

        let snapshot = self.store.sites().await?;
        if self.reporter.start(snapshot, self.clock.time()) {
            info!("Sending statistics");
        }
        Ok(())
    }

    async fn finish_report(&mut self, outcome: ReportOutcome) -> Result<()> {
        self.reporter.finish();
        match outcome.result {
            Ok(()) => {
                info!("Successfully updated statistics");
                self.store.subtract_reported(&outcome.sent).await?;
                let status = if self.store.pause_state().await?.is_paused() {
                    Status::Paused
                } else {
                    Status::Ok
                };
                self.set_status(status).await;
            }
            Err(e) => {
                warn!("Something went wrong with updating stats: {e}");
                self.set_status(Status::Error).await;
            }
        }
        Ok(())
    }

    async fn set_status(&mut self, status: Status) {
        if self.status == status {
            return;
        }
        self.status = status;
        self.send_outbound(OutboundMessage::Status { status }).await;
    }

    async fn send_outbound(&self, message: OutboundMessage) {
        if let Err(e) = self.outbound.send(message).await {
            error!("Host output is closed {e:?}");
        }
    }
}

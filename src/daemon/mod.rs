use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::Result;
use args::DaemonArgs;
use collection::host_link::{HostReader, HostWriter};
use processing::ProcessingModule;
use reporting::sink::{HttpSink, RemoteSink};
use storage::{accounting::AccountingStore, kv_store::FileStore};
use tokio::{io::BufReader, sync::mpsc};
use tokio_util::sync::CancellationToken;
use tracing::error;

use crate::{
    host::protocol::{InboundMessage, OutboundMessage},
    utils::{
        clock::{Clock, DefaultClock},
        dir::store_path,
    },
};

pub mod args;
pub mod collection;
pub mod processing;
pub mod reporting;
pub mod shutdown;
pub mod storage;

const CHANNEL_CAPACITY: usize = 32;

/// Settings of a daemon run, resolved from [DaemonArgs].
#[derive(Debug, Clone)]
pub struct DaemonSettings {
    pub dir: PathBuf,
    pub server: String,
    pub tick_interval: Duration,
}

impl DaemonSettings {
    pub fn from_args(args: &DaemonArgs, dir: PathBuf) -> Self {
        Self {
            dir,
            server: args.server.clone(),
            tick_interval: Duration::from_secs(args.tick_seconds),
        }
    }
}

/// Represents the starting point for the daemon. The host talks to it over stdin/stdout.
pub async fn start_daemon(settings: DaemonSettings) -> Result<()> {
    let (sender, receiver) = mpsc::channel::<InboundMessage>(CHANNEL_CAPACITY);
    let (outbound_sender, outbound_receiver) = mpsc::channel::<OutboundMessage>(CHANNEL_CAPACITY);

    let shutdown_token = CancellationToken::new();

    let reader = HostReader::new(
        BufReader::new(tokio::io::stdin()),
        sender,
        shutdown_token.clone(),
    );
    let writer = HostWriter::new(tokio::io::stdout(), outbound_receiver);

    let processor = create_processor(
        store_path(&settings.dir),
        receiver,
        outbound_sender,
        Arc::new(HttpSink::new(settings.server)?),
        settings.tick_interval,
        DefaultClock,
        &shutdown_token,
    )?;

    let processing = async {
        let result = processor.run().await;
        // The loop ends when the host goes away, everything else has to follow.
        shutdown_token.cancel();
        result
    };

    let (_, reading_result, processing_result, writing_result) = tokio::join!(
        shutdown::detect_shutdown(shutdown_token.clone()),
        reader.run(),
        processing,
        writer.run(),
    );

    if let Err(reading_result) = reading_result {
        error!("Host reader got an error {:?}", reading_result);
    }

    if let Err(writing_result) = writing_result {
        error!("Host writer got an error {:?}", writing_result);
    }

    processing_result.inspect_err(|e| error!("Processing module got an error {:?}", e))
}

pub fn create_processor(
    store_dir: PathBuf,
    receiver: mpsc::Receiver<InboundMessage>,
    outbound: mpsc::Sender<OutboundMessage>,
    sink: Arc<dyn RemoteSink>,
    tick_interval: Duration,
    clock: impl Clock,
    shutdown_token: &CancellationToken,
) -> Result<ProcessingModule<FileStore>> {
    let store = AccountingStore::new(FileStore::new(store_dir)?);
    Ok(ProcessingModule::new(
        receiver,
        outbound,
        store,
        sink,
        tick_interval,
        Box::new(clock),
        shutdown_token.clone(),
    ))
}

use tokio::select;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Cancels `cancelation` on ctrl-c. Returns early if something else already cancelled it, for
/// example the host closing stdin.
pub async fn detect_shutdown(cancelation: CancellationToken) {
    select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
            cancelation.cancel();
        },
        _ = cancelation.cancelled() => {},
    };
}

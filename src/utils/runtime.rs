use anyhow::Result;

/// Every handler of the daemon runs on this runtime, so handlers never race each other.
pub fn single_thread_runtime() -> Result<tokio::runtime::Runtime> {
    Ok(tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?)
}

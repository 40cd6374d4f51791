use std::path::{Path, PathBuf};

use tokio::{
    fs::{self, File},
    io::{self, AsyncWriteExt},
};

/// Replaces the contents of `path` in one step. The data goes into a sibling temporary file that
/// is synced and then renamed over the target, so readers see either the old or the new document.
pub async fn write_atomically(path: &Path, contents: &[u8]) -> Result<(), io::Error> {
    let temporary = temporary_path(path);
    let mut file = File::create(&temporary).await?;
    file.write_all(contents).await?;
    file.sync_all().await?;
    drop(file);
    fs::rename(&temporary, path).await
}

/// Reads a whole file. A missing file is not an error and yields `None`.
pub async fn read_if_exists(path: &Path) -> Result<Option<Vec<u8>>, io::Error> {
    match fs::read(path).await {
        Ok(contents) => Ok(Some(contents)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

/// Removes a file, treating an already missing file as success.
pub async fn remove_if_exists(path: &Path) -> Result<(), io::Error> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

fn temporary_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

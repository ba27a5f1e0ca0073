//! Disk-backed media received with a post submission.
//!
//! A [`TemporaryUploadedFile`] is created while the multipart body is parsed,
//! moved by value into the media relay, and removed exactly once: explicitly
//! via [`TemporaryUploadedFile::remove`] after the upstream upload resolves,
//! or by `Drop` on every other exit path.

use bytes::Bytes;
use futures::Stream;
use std::{
    io,
    path::{Path, PathBuf},
};
use tokio::{fs, io::AsyncWriteExt};
use tokio_util::io::StreamReader;
use tracing::{debug, warn};
use uuid::Uuid;

const MAX_EXTENSION_LEN: usize = 10;
const FALLBACK_NAME: &str = "media";

#[derive(Debug)]
pub struct TemporaryUploadedFile {
    path: PathBuf,
    original_name: String,
    content_type: Option<String>,
    size_bytes: u64,
    removed: bool,
}

impl TemporaryUploadedFile {
    /// Take ownership of an existing file at `path`.
    pub fn new(
        path: impl Into<PathBuf>,
        original_name: impl Into<String>,
        content_type: Option<String>,
        size_bytes: u64,
    ) -> Self {
        Self {
            path: path.into(),
            original_name: original_name.into(),
            content_type,
            size_bytes,
            removed: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn original_name(&self) -> &str {
        &self.original_name
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    /// Delete the file from local storage.
    ///
    /// Failures are logged and swallowed so they never mask the outcome of
    /// the operation that owned the file.
    pub async fn remove(mut self) {
        self.removed = true;
        match fs::remove_file(&self.path).await {
            Ok(()) => debug!("removed temporary upload {}", self.path.display()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!("temporary upload {} already missing", self.path.display());
            }
            Err(err) => warn!(
                path = %self.path.display(),
                error = %err,
                "failed to delete temporary upload"
            ),
        }
    }
}

impl Drop for TemporaryUploadedFile {
    fn drop(&mut self) {
        if self.removed {
            return;
        }
        // Blocking unlink: the file is gone before the owning task moves on,
        // including on runtime worker threads.
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!("removed abandoned upload {}", self.path.display()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => warn!(
                path = %self.path.display(),
                error = %err,
                "failed to delete abandoned upload"
            ),
        }
    }
}

/// Stream one multipart file part into a uniquely named file under `dir`.
///
/// Returns `None` when the part carried no bytes. On any I/O error the
/// partially written file is removed before the error is returned.
pub async fn spool_upload<S>(
    dir: &Path,
    original_name: Option<&str>,
    content_type: Option<&str>,
    stream: S,
) -> io::Result<Option<TemporaryUploadedFile>>
where
    S: Stream<Item = io::Result<Bytes>>,
{
    let original_name = original_name
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .unwrap_or(FALLBACK_NAME);

    let file_name = match safe_extension(original_name) {
        Some(ext) => format!("{}.{}", Uuid::new_v4(), ext),
        None => Uuid::new_v4().to_string(),
    };
    let path = dir.join(file_name);

    let mut file = fs::File::create(&path).await?;
    let mut upload = TemporaryUploadedFile::new(
        path,
        original_name,
        content_type.map(str::to_owned),
        0,
    );

    let reader = StreamReader::new(stream);
    tokio::pin!(reader);
    upload.size_bytes = tokio::io::copy(&mut reader, &mut file).await?;
    file.flush().await?;
    drop(file);

    if upload.size_bytes == 0 {
        debug!("ignoring empty media part `{}`", upload.original_name);
        upload.remove().await;
        return Ok(None);
    }

    debug!(
        "spooled {} bytes of `{}` to {}",
        upload.size_bytes,
        upload.original_name,
        upload.path.display()
    );
    Ok(Some(upload))
}

/// Lowercased extension of `name` when it is short and alphanumeric.
fn safe_extension(name: &str) -> Option<String> {
    let (stem, ext) = name.rsplit_once('.')?;
    if stem.is_empty()
        || ext.is_empty()
        || ext.len() > MAX_EXTENSION_LEN
        || !ext.chars().all(|c| c.is_ascii_alphanumeric())
    {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

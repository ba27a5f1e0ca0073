//! Media relay: forwards one spooled upload to the upstream `/upload`
//! endpoint and always deletes the local copy afterwards.

use crate::services::{
    temp_upload::TemporaryUploadedFile,
    upstream_client::{UpstreamClient, UpstreamError},
};
use reqwest::{
    Body,
    multipart::{Form, Part},
};
use std::{io, path::PathBuf};
use thiserror::Error;
use tokio::fs::File;
use tokio_util::io::ReaderStream;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("failed to open temporary upload {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid media content type `{content_type}`: {source}")]
    ContentType {
        content_type: String,
        #[source]
        source: reqwest::Error,
    },
    #[error(transparent)]
    Upstream(#[from] UpstreamError),
}

#[derive(Clone)]
pub struct MediaRelay {
    upstream: UpstreamClient,
}

impl MediaRelay {
    pub fn new(upstream: UpstreamClient) -> Self {
        Self { upstream }
    }

    /// Upload `file` and return the URL upstream assigned to it.
    ///
    /// The file is deleted once the upload attempt resolves, whatever its
    /// outcome. Deletion problems are logged, never returned.
    pub async fn upload_media(&self, file: TemporaryUploadedFile) -> Result<String, UploadError> {
        let result = self.forward(&file).await;
        file.remove().await;

        match &result {
            Ok(url) => info!("uploaded media to {}", url),
            Err(err) => warn!(error = %err, "media upload failed"),
        }
        result
    }

    /// Stream the file as the single `file` part of a multipart body.
    async fn forward(&self, file: &TemporaryUploadedFile) -> Result<String, UploadError> {
        let handle = File::open(file.path())
            .await
            .map_err(|source| UploadError::Read {
                path: file.path().to_path_buf(),
                source,
            })?;

        let body = Body::wrap_stream(ReaderStream::new(handle));
        let mut part = Part::stream_with_length(body, file.size_bytes())
            .file_name(file.original_name().to_string());
        if let Some(content_type) = file.content_type() {
            part = part
                .mime_str(content_type)
                .map_err(|source| UploadError::ContentType {
                    content_type: content_type.to_string(),
                    source,
                })?;
        }

        let form = Form::new().part("file", part);
        Ok(self.upstream.upload(form).await?)
    }
}

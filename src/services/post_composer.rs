//! Post composer: turns a compose-form submission into an upstream publish
//! call, and exposes the read-only upstream passthroughs the UI relies on.
//!
//! Every operation is one stateless request/response cycle. Nothing is
//! retried; a failure in one operation never affects another.

use crate::{
    config::AppConfig,
    models::{
        account::LinkedAccount,
        history::HistoryQuery,
        link::GenerateJwtRequest,
        post::{InputError, PostRequest, UpstreamPostPayload},
    },
    services::{
        media_relay::{MediaRelay, UploadError},
        upstream_client::{UpstreamClient, UpstreamError, UpstreamReply},
    },
};
use std::{io, path::PathBuf, sync::Arc};
use thiserror::Error;
use tokio::fs;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum PostError {
    #[error(transparent)]
    InvalidInput(#[from] InputError),
    #[error("failed to upload media: {0}")]
    MediaUpload(#[source] UploadError),
    #[error("failed to publish post: {0}")]
    Publish(#[source] UpstreamError),
    #[error("failed to fetch post history: {0}")]
    History(#[source] UpstreamError),
    #[error("failed to fetch linked accounts: {0}")]
    Accounts(#[source] UpstreamError),
    #[error("link handshake is not configured: {0} is not set")]
    LinkNotConfigured(&'static str),
    #[error("failed to read private key {}: {source}", path.display())]
    PrivateKey {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to reach upstream for link handshake: {0}")]
    Handshake(#[source] UpstreamError),
}

pub type PostResult<T> = Result<T, PostError>;

/// Shared by all handlers; cheap to clone.
#[derive(Clone)]
pub struct PostComposer {
    config: Arc<AppConfig>,
    upstream: UpstreamClient,
    media: MediaRelay,
}

impl PostComposer {
    pub fn new(config: Arc<AppConfig>) -> reqwest::Result<Self> {
        let upstream = UpstreamClient::new(&config)?;
        Ok(Self {
            media: MediaRelay::new(upstream.clone()),
            upstream,
            config,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Validate a submission, relay its media if any, then publish.
    ///
    /// Input is validated before anything leaves the process. A media
    /// failure aborts the request before the publish call is issued. The
    /// upstream status and body are returned verbatim on success.
    pub async fn submit_post(&self, mut request: PostRequest) -> PostResult<UpstreamReply> {
        let mut payload = match UpstreamPostPayload::compose(&request) {
            Ok(payload) => payload,
            Err(err) => {
                if let Some(media) = request.media.take() {
                    media.remove().await;
                }
                return Err(err.into());
            }
        };

        if let Some(media) = request.media.take() {
            let url = self
                .media
                .upload_media(media)
                .await
                .map_err(PostError::MediaUpload)?;
            payload.media_urls = Some(vec![url]);
        }

        debug!(?payload, "sending post upstream");
        let reply = self
            .upstream
            .publish(&payload)
            .await
            .map_err(PostError::Publish)?;

        info!(
            status = %reply.status,
            platforms = ?payload.platforms,
            scheduled = payload.schedule_date.is_some(),
            "post accepted upstream"
        );
        Ok(reply)
    }

    /// Upstream post history, unmodified.
    pub async fn get_post_history(&self, query: &HistoryQuery) -> PostResult<UpstreamReply> {
        self.upstream
            .history(query)
            .await
            .map_err(PostError::History)
    }

    /// Linked platforms reduced to name and profile URL.
    pub async fn get_linked_accounts(&self) -> PostResult<Vec<LinkedAccount>> {
        let user = self.upstream.user().await.map_err(PostError::Accounts)?;
        Ok(user.linked_accounts())
    }

    /// Ask upstream for a signed URL to the account-linking page.
    pub async fn generate_link_handshake_url(&self) -> PostResult<String> {
        let link = &self.config.link;
        let key_path = link
            .private_key_path
            .as_ref()
            .ok_or(PostError::LinkNotConfigured("AYRSHARE_PRIVATE_KEY_PATH"))?;
        let domain = link
            .domain
            .as_deref()
            .ok_or(PostError::LinkNotConfigured("AYRSHARE_DOMAIN"))?;
        let profile_key = link
            .profile_key
            .as_deref()
            .ok_or(PostError::LinkNotConfigured("AYRSHARE_PROFILE_KEY"))?;

        let private_key =
            fs::read_to_string(key_path)
                .await
                .map_err(|source| PostError::PrivateKey {
                    path: key_path.clone(),
                    source,
                })?;

        let url = self
            .upstream
            .generate_jwt(&GenerateJwtRequest {
                domain,
                private_key: &private_key,
                profile_key,
                verify: true,
            })
            .await
            .map_err(PostError::Handshake)?;

        info!("generated link handshake url for domain {}", domain);
        Ok(url)
    }
}

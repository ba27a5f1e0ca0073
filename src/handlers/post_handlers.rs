//! HTTP handlers for the compose UI.
//!
//! Handlers only translate between HTTP and `PostComposer`; failures go
//! through `AppError` so upstream detail stays in the server log.

use crate::{
    errors::AppError,
    models::{account::LinkedAccounts, history::HistoryQuery, link::HandshakeUrl, post::PostRequest},
    services::{
        post_composer::PostComposer, temp_upload::spool_upload, upstream_client::UpstreamReply,
    },
};
use axum::{
    Json,
    extract::{Multipart, Query, State, rejection::QueryRejection},
    http::{HeaderValue, header},
    response::{IntoResponse, Response},
};
use futures::TryStreamExt;
use std::io;
use tracing::{debug, error};

impl IntoResponse for UpstreamReply {
    fn into_response(self) -> Response {
        (
            self.status,
            [(
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/json"),
            )],
            self.body,
        )
            .into_response()
    }
}

/// `POST /api/post`: multipart fields `text`, `networks`, optional
/// `scheduledDate` and optional `media` file.
pub async fn create_post(
    State(composer): State<PostComposer>,
    mut multipart: Multipart,
) -> Result<UpstreamReply, AppError> {
    let mut request = PostRequest::default();

    while let Some(field) = multipart.next_field().await? {
        let Some(name) = field.name().map(str::to_owned) else {
            continue;
        };
        match name.as_str() {
            "text" => request.text = Some(field.text().await?),
            "networks" => request.networks = Some(field.text().await?),
            "scheduledDate" => request.scheduled_date = Some(field.text().await?),
            "media" => {
                let file_name = field.file_name().map(str::to_owned);
                let content_type = field.content_type().map(str::to_owned);
                let stream = field.map_err(io::Error::other);
                request.media = spool_upload(
                    &composer.config().upload_dir,
                    file_name.as_deref(),
                    content_type.as_deref(),
                    stream,
                )
                .await
                .map_err(|err| {
                    error!(error = %err, "failed to spool uploaded media");
                    AppError::internal("Failed to store uploaded media")
                })?;
            }
            other => debug!("ignoring unknown form field `{}`", other),
        }
    }

    Ok(composer.submit_post(request).await?)
}

/// `GET /api/post-history`: upstream history, passed through.
pub async fn post_history(
    State(composer): State<PostComposer>,
    query: Result<Query<HistoryQuery>, QueryRejection>,
) -> Result<UpstreamReply, AppError> {
    let Query(query) = query?;
    Ok(composer.get_post_history(&query).await?)
}

/// `GET /api/user-accounts`: `{activeSocialAccounts: [{name, profileUrl}]}`.
pub async fn user_accounts(
    State(composer): State<PostComposer>,
) -> Result<Json<LinkedAccounts>, AppError> {
    let accounts = composer.get_linked_accounts().await?;
    Ok(Json(LinkedAccounts {
        active_social_accounts: accounts,
    }))
}

/// `GET /api/generate-jwt`: `{url}` of the account-linking page.
pub async fn generate_jwt(
    State(composer): State<PostComposer>,
) -> Result<Json<HandshakeUrl>, AppError> {
    let url = composer.generate_link_handshake_url().await?;
    Ok(Json(HandshakeUrl { url }))
}

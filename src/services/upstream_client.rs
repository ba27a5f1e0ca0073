//! Bearer-authenticated client for the upstream social publishing API.
//!
//! Every call is attempted exactly once with an explicit timeout. Non-2xx
//! responses become [`UpstreamError::Rejected`] carrying the upstream body so
//! callers can log it; nothing here decides what the browser client sees.

use crate::{
    config::AppConfig,
    models::{
        account::UpstreamUser,
        history::HistoryQuery,
        link::{GenerateJwtRequest, GenerateJwtResponse},
        post::UpstreamPostPayload,
    },
};
use bytes::Bytes;
use reqwest::{Client, RequestBuilder, Response, StatusCode, multipart::Form};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("upstream request timed out after {0:?}")]
    Timeout(Duration),
    #[error("upstream transport failure: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("upstream responded {status}: {body}")]
    Rejected { status: StatusCode, body: String },
    #[error("unexpected upstream response: {0}")]
    Decode(String),
}

impl UpstreamError {
    fn from_reqwest(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            UpstreamError::Timeout(timeout)
        } else if err.is_decode() {
            UpstreamError::Decode(err.to_string())
        } else {
            UpstreamError::Transport(err)
        }
    }
}

pub type UpstreamResult<T> = Result<T, UpstreamError>;

/// A successful upstream response relayed to the browser unchanged.
#[derive(Debug, Clone)]
pub struct UpstreamReply {
    pub status: StatusCode,
    pub body: Bytes,
}

#[derive(Deserialize, Debug)]
struct UploadedMedia {
    url: String,
}

#[derive(Clone)]
pub struct UpstreamClient {
    http: Client,
    base_url: String,
    api_key: String,
    upload_timeout: Duration,
    request_timeout: Duration,
}

impl UpstreamClient {
    pub fn new(config: &AppConfig) -> reqwest::Result<Self> {
        let http = Client::builder()
            .user_agent(concat!("post-relay/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            base_url: config.api_base_url.clone(),
            api_key: config.api_key.clone(),
            upload_timeout: config.upload_timeout,
            request_timeout: config.request_timeout,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// `POST /upload`: store a media file and return its durable URL.
    pub async fn upload(&self, form: Form) -> UpstreamResult<String> {
        let request = self.http.post(self.endpoint("upload")).multipart(form);
        let response = self.send(request, self.upload_timeout).await?;
        let uploaded: UploadedMedia = response
            .json()
            .await
            .map_err(|err| UpstreamError::from_reqwest(err, self.upload_timeout))?;
        Ok(uploaded.url)
    }

    /// `POST /post`: publish or schedule a post.
    pub async fn publish(&self, payload: &UpstreamPostPayload) -> UpstreamResult<UpstreamReply> {
        let request = self.http.post(self.endpoint("post")).json(payload);
        let response = self.send(request, self.request_timeout).await?;
        self.reply(response).await
    }

    /// `GET /history`: the user's post history.
    pub async fn history(&self, query: &HistoryQuery) -> UpstreamResult<UpstreamReply> {
        let request = self.http.get(self.endpoint("history")).query(query);
        let response = self.send(request, self.request_timeout).await?;
        self.reply(response).await
    }

    /// `GET /user`: the profile, including linked platforms.
    pub async fn user(&self) -> UpstreamResult<UpstreamUser> {
        let request = self.http.get(self.endpoint("user"));
        let response = self.send(request, self.request_timeout).await?;
        response
            .json()
            .await
            .map_err(|err| UpstreamError::from_reqwest(err, self.request_timeout))
    }

    /// `POST /profiles/generateJWT`: a signed URL for the linking page.
    pub async fn generate_jwt(&self, body: &GenerateJwtRequest<'_>) -> UpstreamResult<String> {
        let request = self
            .http
            .post(self.endpoint("profiles/generateJWT"))
            .json(body);
        let response = self.send(request, self.request_timeout).await?;
        let generated: GenerateJwtResponse = response
            .json()
            .await
            .map_err(|err| UpstreamError::from_reqwest(err, self.request_timeout))?;
        Ok(generated.url)
    }

    /// Authenticate, apply `timeout` and send. Non-2xx becomes `Rejected`.
    async fn send(&self, request: RequestBuilder, timeout: Duration) -> UpstreamResult<Response> {
        let response = request
            .bearer_auth(&self.api_key)
            .timeout(timeout)
            .send()
            .await
            .map_err(|err| UpstreamError::from_reqwest(err, timeout))?;

        let status = response.status();
        debug!("upstream {} responded {}", response.url().path(), status);
        if status.is_success() {
            return Ok(response);
        }

        let body = match response.text().await {
            Ok(body) => body,
            Err(err) => format!("<unreadable body: {}>", err),
        };
        Err(UpstreamError::Rejected { status, body })
    }

    async fn reply(&self, response: Response) -> UpstreamResult<UpstreamReply> {
        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|err| UpstreamError::from_reqwest(err, self.request_timeout))?;
        Ok(UpstreamReply { status, body })
    }
}

/// An upstream that accepts connections and never answers.
///
/// Returns its base URL and the number of connections accepted so far.
#[cfg(test)]
pub async fn silent_upstream() -> (String, std::sync::Arc<std::sync::atomic::AtomicUsize>) {
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let accepted = Arc::new(AtomicUsize::new(0));
    let counter = accepted.clone();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            counter.fetch_add(1, Ordering::SeqCst);
            held.push(socket);
        }
    });
    (format!("http://{}", addr), accepted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_config;
    use mockito::Matcher;
    use serde_json::json;
    use tokio::{
        io::{AsyncReadExt, AsyncWriteExt},
        net::TcpListener,
    };

    fn client_for(base_url: &str) -> UpstreamClient {
        let dir = std::env::temp_dir();
        UpstreamClient::new(&test_config(base_url, &dir)).unwrap()
    }

    #[tokio::test]
    async fn history_forwards_query_and_body_verbatim() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/history")
            .match_header("authorization", "Bearer test-api-key")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("lastRecords".into(), "5".into()),
                Matcher::UrlEncoded("lastDays".into(), "30".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"[{"id":"p1","status":"success"}]"#)
            .create_async()
            .await;

        let reply = client_for(&server.url())
            .history(&HistoryQuery {
                last_records: Some(5),
                last_days: Some(30),
            })
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(reply.status, StatusCode::OK);
        assert_eq!(&reply.body[..], br#"[{"id":"p1","status":"success"}]"#);
    }

    #[tokio::test]
    async fn non_success_status_carries_upstream_body() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/user")
            .with_status(403)
            .with_body(r#"{"message":"API key not valid"}"#)
            .create_async()
            .await;

        let err = client_for(&server.url()).user().await.unwrap_err();

        match err {
            UpstreamError::Rejected { status, body } => {
                assert_eq!(status, StatusCode::FORBIDDEN);
                assert!(body.contains("API key not valid"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn malformed_success_body_is_a_decode_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/profiles/generateJWT")
            .match_body(Matcher::PartialJson(json!({"verify": true})))
            .with_status(200)
            .with_body("not json")
            .create_async()
            .await;

        let err = client_for(&server.url())
            .generate_jwt(&GenerateJwtRequest {
                domain: "acme",
                private_key: "key",
                profile_key: "profile",
                verify: true,
            })
            .await
            .unwrap_err();

        assert!(matches!(err, UpstreamError::Decode(_)), "{err:?}");
    }

    #[tokio::test]
    async fn silent_upstream_times_out() {
        let (base_url, _) = silent_upstream().await;

        let mut config = test_config(&base_url, &std::env::temp_dir());
        config.request_timeout = Duration::from_millis(200);
        let client = UpstreamClient::new(&config).unwrap();

        let payload = UpstreamPostPayload {
            post: "hello".into(),
            platforms: vec!["x".into()],
            schedule_date: None,
            media_urls: None,
        };
        let err = client.publish(&payload).await.unwrap_err();

        assert!(
            matches!(err, UpstreamError::Timeout(d) if d == Duration::from_millis(200)),
            "{err:?}"
        );
    }

    #[tokio::test]
    async fn unreadable_error_body_is_described_instead_of_dropped() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        // Promise a longer body than is sent, then hang up.
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 1024];
            let _ = socket.read(&mut buf).await;
            socket
                .write_all(b"HTTP/1.1 502 Bad Gateway\r\ncontent-length: 100\r\n\r\npartial")
                .await
                .unwrap();
            socket.shutdown().await.unwrap();
        });

        let err = client_for(&format!("http://{}", addr))
            .user()
            .await
            .unwrap_err();

        match err {
            UpstreamError::Rejected { status, body } => {
                assert_eq!(status, StatusCode::BAD_GATEWAY);
                assert!(body.starts_with("<unreadable body:"), "{body}");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}

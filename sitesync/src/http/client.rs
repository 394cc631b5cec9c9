//! HTTP client implementation

use std::time::Duration;

use reqwest::{header, Body, Client, RequestBuilder, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{de::DeserializeOwned, Serialize};
use tokio_util::io::ReaderStream;
use tracing::{debug, error, warn};
use url::Url;

use crate::errors::SyncError;
use crate::http::FileBody;
use crate::utils::default_user_agent;

const API_VERSION: &str = "v1";

/// Connection options for the deploy API
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Base URL, e.g. `https://api.netlify.com`
    pub base_url: String,

    /// Personal access token sent as a bearer token
    pub access_token: SecretString,

    pub user_agent: String,

    /// Connect timeout, and total timeout of JSON requests
    pub request_timeout: Duration,

    /// Total timeout of file and archive uploads, `None` for no limit
    pub upload_timeout: Option<Duration>,

    /// Attempts for idempotent requests without a raw body
    pub idempotent_tries: u32,
}

impl ClientOptions {
    pub fn new(base_url: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            access_token: SecretString::from(access_token.into()),
            ..Default::default()
        }
    }
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            base_url: "https://api.netlify.com".to_string(),
            access_token: SecretString::from(String::new()),
            user_agent: default_user_agent(),
            request_timeout: Duration::from_secs(30),
            upload_timeout: None,
            idempotent_tries: 3,
        }
    }
}

/// HTTP client for the deploy API
pub struct HttpClient {
    client: Client,
    api_base: Url,
    access_token: SecretString,
    request_timeout: Duration,
    upload_timeout: Option<Duration>,
    idempotent_tries: u32,
}

impl HttpClient {
    /// Create a new HTTP client
    pub fn new(options: ClientOptions) -> Result<Self, SyncError> {
        if options.access_token.expose_secret().is_empty() {
            return Err(SyncError::ConfigError(
                "Client has not been authenticated".to_string(),
            ));
        }

        let base = format!(
            "{}/api/{}",
            options.base_url.trim_end_matches('/'),
            API_VERSION
        );
        let api_base = Url::parse(&base)
            .map_err(|e| SyncError::ConfigError(format!("Invalid base URL {}: {}", base, e)))?;
        if api_base.cannot_be_a_base() {
            return Err(SyncError::ConfigError(format!("Invalid base URL {}", base)));
        }

        // No client-wide total timeout, uploads set their own per request
        let client = Client::builder()
            .connect_timeout(options.request_timeout)
            .user_agent(options.user_agent.clone())
            .build()?;

        debug!(
            "Created client for {} (user agent {})",
            api_base, options.user_agent
        );

        Ok(Self {
            client,
            api_base,
            access_token: options.access_token,
            request_timeout: options.request_timeout,
            upload_timeout: options.upload_timeout,
            idempotent_tries: options.idempotent_tries.max(1),
        })
    }

    /// Get the API base URL
    pub fn api_base(&self) -> &Url {
        &self.api_base
    }

    /// Build an endpoint URL from path segments, percent-encoding each one
    pub fn endpoint<I, S>(&self, segments: I) -> Result<Url, SyncError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut url = self.api_base.clone();
        url.path_segments_mut()
            .map_err(|_| SyncError::ConfigError(format!("Invalid base URL {}", self.api_base)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .bearer_auth(self.access_token.expose_secret())
            .header(header::ACCEPT, "application/json")
    }

    /// Attach a streamed file body with an explicit length
    fn with_file(
        &self,
        request: RequestBuilder,
        content_type: &str,
        body: FileBody,
    ) -> RequestBuilder {
        let (file, length) = body.into_parts();
        let request = request
            .header(header::CONTENT_TYPE, content_type)
            .header(header::CONTENT_LENGTH, length)
            .body(Body::wrap_stream(ReaderStream::new(file)));

        match self.upload_timeout {
            Some(timeout) => request.timeout(timeout),
            None => request,
        }
    }

    /// Make a GET request, retrying transport errors and server errors
    pub async fn get<T: DeserializeOwned>(&self, url: Url) -> Result<T, SyncError> {
        let mut tries = self.idempotent_tries;
        loop {
            debug!("GET {}", url);
            tries -= 1;

            let request = self.client.get(url.clone()).timeout(self.request_timeout);
            match self.authorized(request).send().await {
                Ok(response) if response.status().is_server_error() && tries > 0 => {
                    warn!("GET {} returned {}, retrying", url, response.status());
                }
                Err(e) if tries > 0 => {
                    warn!("GET {} failed, retrying: {}", url, e);
                }
                Ok(response) => {
                    let response = check_response("GET", response).await?;
                    return Ok(response.json().await?);
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Make a POST request with a JSON body
    pub async fn post_json<T: DeserializeOwned, B: Serialize>(
        &self,
        url: Url,
        body: &B,
    ) -> Result<T, SyncError> {
        debug!("POST {}", url);
        let request = self.client.post(url).timeout(self.request_timeout);
        let response = self.authorized(request).json(body).send().await?;
        let response = check_response("POST", response).await?;
        Ok(response.json().await?)
    }

    /// Make a POST request streaming a file as the body
    pub async fn post_file<T: DeserializeOwned>(
        &self,
        url: Url,
        content_type: &str,
        body: FileBody,
    ) -> Result<T, SyncError> {
        debug!("POST {} ({} bytes, {})", url, body.len(), content_type);
        let request = self.with_file(self.authorized(self.client.post(url)), content_type, body);
        let response = check_response("POST", request.send().await?).await?;
        Ok(response.json().await?)
    }

    /// Make a PUT request streaming a file as the body, discarding the response body
    pub async fn put_file(
        &self,
        url: Url,
        content_type: &str,
        body: FileBody,
    ) -> Result<(), SyncError> {
        debug!("PUT {} ({} bytes, {})", url, body.len(), content_type);
        let request = self.with_file(self.authorized(self.client.put(url)), content_type, body);
        check_response("PUT", request.send().await?).await?;
        Ok(())
    }
}

/// Map non-success statuses to `SyncError::ApiError`
async fn check_response(method: &str, response: Response) -> Result<Response, SyncError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let message = if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        "Access Denied".to_string()
    } else {
        let body = response.text().await.unwrap_or_default();
        if body.trim().is_empty() {
            status.to_string()
        } else {
            body
        }
    };

    error!("HTTP {} failed: {} - {}", method, status, message);
    Err(SyncError::ApiError {
        status: status.as_u16(),
        message,
    })
}

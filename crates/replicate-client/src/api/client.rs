use reqwest::Url;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};

use crate::api::error::{ApiErrorBody, ClientError};
use crate::credentials::ReplicateCredentials;

impl From<reqwest::Error> for ClientError {
    fn from(error: reqwest::Error) -> Self {
        match error.status() {
            Some(status) => ClientError::ApiError {
                status,
                body: ApiErrorBody {
                    title: None,
                    detail: Some(error.to_string()),
                    status: Some(status.as_u16()),
                },
            },
            None => ClientError::UnknownError(error.to_string()),
        }
    }
}

trait ResponseExt {
    fn map_to_api_err(self) -> Result<reqwest::blocking::Response, ClientError>;
}

impl ResponseExt for reqwest::blocking::Response {
    fn map_to_api_err(self) -> Result<reqwest::blocking::Response, ClientError> {
        if self.status().is_success() {
            Ok(self)
        } else {
            match self.status() {
                reqwest::StatusCode::NOT_FOUND => Err(ClientError::NotFound),
                reqwest::StatusCode::UNAUTHORIZED => Err(ClientError::Unauthorized),
                reqwest::StatusCode::FORBIDDEN => Err(ClientError::Forbidden),
                reqwest::StatusCode::INTERNAL_SERVER_ERROR => Err(ClientError::InternalServerError),
                status => Err(ClientError::ApiError {
                    status,
                    body: self
                        .text()
                        .ok()
                        .and_then(|text| serde_json::from_str::<ApiErrorBody>(&text).ok())
                        .unwrap_or_default(),
                }),
            }
        }
    }
}

/// A client for making HTTP requests to the Replicate API.
///
/// The client owns the base URL and the API token and translates non-success
/// status codes into [`ClientError`] values. It performs no retries of its own.
#[derive(Debug, Clone)]
pub struct Client {
    http_client: reqwest::blocking::Client,
    base_url: Url,
    api_token: String,
    user_agent: String,
}

impl Client {
    /// Create a new client with the given base URL and credentials.
    pub fn new(mut base_url: Url, credentials: &ReplicateCredentials, user_agent: &str) -> Self {
        // A trailing slash keeps Url::join from eating the version segment.
        if !base_url.path().ends_with('/') {
            base_url.set_path(&format!("{}/", base_url.path()));
        }
        Client {
            http_client: reqwest::blocking::Client::new(),
            base_url,
            api_token: credentials.token().to_string(),
            user_agent: user_agent.to_string(),
        }
    }

    pub fn get_json<R>(&self, path: impl AsRef<str>) -> Result<R, ClientError>
    where
        R: for<'de> serde::Deserialize<'de>,
    {
        let response = self.req(reqwest::Method::GET, path, None::<serde_json::Value>)?;
        let json = response.json::<R>()?;
        Ok(json)
    }

    pub fn post_json<T, R>(&self, path: impl AsRef<str>, body: Option<T>) -> Result<R, ClientError>
    where
        T: serde::Serialize,
        R: for<'de> serde::Deserialize<'de>,
    {
        let response = self.req(reqwest::Method::POST, path, body)?;
        let json = response.json::<R>()?;
        Ok(json)
    }

    /// Build a POST request with a pre-serialized JSON body without sending it.
    ///
    /// Request shaping (e.g. prediction creation) builds its body first and
    /// only then hands it over here, so construction failures stay separate
    /// from send failures.
    pub fn build_post(
        &self,
        path: impl AsRef<str>,
        body: Vec<u8>,
    ) -> Result<reqwest::blocking::Request, ClientError> {
        let url = self.join(path.as_ref())?;
        self.http_client
            .post(url)
            .header(AUTHORIZATION, format!("Bearer {}", self.api_token))
            .header(USER_AGENT, self.user_agent.as_str())
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .build()
            .map_err(ClientError::from)
    }

    /// Execute a previously built request and decode the JSON response.
    pub fn execute_json<R>(&self, request: reqwest::blocking::Request) -> Result<R, ClientError>
    where
        R: for<'de> serde::Deserialize<'de>,
    {
        log::debug!("{} {}", request.method(), request.url());
        let response = self.http_client.execute(request)?.map_to_api_err()?;
        let json = response.json::<R>()?;
        Ok(json)
    }

    fn req<T: serde::Serialize>(
        &self,
        method: reqwest::Method,
        path: impl AsRef<str>,
        body: Option<T>,
    ) -> Result<reqwest::blocking::Response, ClientError> {
        let url = self.join(path.as_ref())?;
        log::debug!("{method} {url}");
        let request_builder = self
            .http_client
            .request(method, url)
            .header(AUTHORIZATION, format!("Bearer {}", self.api_token))
            .header(USER_AGENT, self.user_agent.as_str());

        let request_builder = if let Some(body) = body {
            request_builder.json(&body)
        } else {
            request_builder
        };

        let response = request_builder.send()?.map_to_api_err()?;

        Ok(response)
    }

    /// Join the given path to the base URL.
    fn join(&self, path: &str) -> Result<Url, ClientError> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| ClientError::InvalidRequestUrl(format!("{path}: {e}")))
    }
}

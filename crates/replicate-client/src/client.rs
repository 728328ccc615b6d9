use reqwest::Url;

use crate::api::Client;
use crate::credentials::ReplicateCredentials;
use crate::error::Error;
use crate::predictions::Predictions;

/// Default endpoint of the hosted API.
pub const DEFAULT_ENDPOINT: &str = "https://api.replicate.com/v1/";

const DEFAULT_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Configuration for the [`Replicate`] client. Can be created using
/// [`ReplicateConfigBuilder`], which is created using the
/// [`ReplicateConfig::builder`] method.
#[derive(Debug, Clone)]
pub struct ReplicateConfig {
    /// The endpoint of the API.
    pub endpoint: String,
    /// Credentials used to authenticate requests.
    pub credentials: ReplicateCredentials,
    /// The User-Agent header sent with every request.
    pub user_agent: String,
}

impl ReplicateConfig {
    /// Create a new [`ReplicateConfigBuilder`] with the given credentials.
    pub fn builder(credentials: ReplicateCredentials) -> ReplicateConfigBuilder {
        ReplicateConfigBuilder::new(credentials)
    }
}

/// Builder for the [`ReplicateConfig`].
pub struct ReplicateConfigBuilder {
    config: ReplicateConfig,
}

impl ReplicateConfigBuilder {
    pub(crate) fn new(credentials: ReplicateCredentials) -> ReplicateConfigBuilder {
        ReplicateConfigBuilder {
            config: ReplicateConfig {
                endpoint: DEFAULT_ENDPOINT.into(),
                credentials,
                user_agent: DEFAULT_USER_AGENT.into(),
            },
        }
    }

    /// Set the endpoint of the API.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> ReplicateConfigBuilder {
        self.config.endpoint = endpoint.into();
        self
    }

    /// Set the User-Agent header sent with every request.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> ReplicateConfigBuilder {
        self.config.user_agent = user_agent.into();
        self
    }

    /// Build the [`ReplicateConfig`].
    pub fn build(self) -> ReplicateConfig {
        self.config
    }
}

/// Entry point for interacting with the API.
#[derive(Debug, Clone)]
pub struct Replicate {
    client: Client,
}

impl Replicate {
    /// Create a client from the given configuration.
    pub fn new(config: ReplicateConfig) -> Result<Self, Error> {
        let base_url = Url::parse(&config.endpoint)
            .map_err(|e| Error::InvalidEndpoint(format!("{}: {e}", config.endpoint)))?;
        let client = Client::new(base_url, &config.credentials, &config.user_agent);
        Ok(Self { client })
    }

    /// Create a client for the default endpoint with the given API token.
    pub fn with_token(api_token: impl Into<String>) -> Result<Self, Error> {
        let config = ReplicateConfig::builder(ReplicateCredentials::new(api_token)).build();
        Self::new(config)
    }

    /// Operations on the predictions collection.
    pub fn predictions(&self) -> Predictions {
        Predictions::new(self.client.clone())
    }
}

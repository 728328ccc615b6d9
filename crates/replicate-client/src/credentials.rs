use serde::Serialize;

/// Credentials to authenticate against the Replicate API.
#[derive(Serialize, Debug, Clone)]
pub struct ReplicateCredentials {
    api_token: String,
}

impl ReplicateCredentials {
    pub fn new(api_token: impl Into<String>) -> Self {
        Self {
            api_token: api_token.into(),
        }
    }

    pub(crate) fn token(&self) -> &str {
        &self.api_token
    }
}

impl From<ReplicateCredentials> for String {
    fn from(val: ReplicateCredentials) -> Self {
        val.api_token
    }
}

use thiserror::Error;

use crate::api::ClientError;

#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid model identifier: {0}")]
    InvalidIdentifier(String),
    #[error("invalid API endpoint: {0}")]
    InvalidEndpoint(String),
    #[error("failed to marshal request body: {0}")]
    SerializeBody(#[source] serde_json::Error),
    #[error("failed to create prediction request: {0}")]
    BuildRequest(#[source] ClientError),
    #[error("failed to create prediction: {0}")]
    CreatePrediction(#[source] ClientError),
    #[error("failed to list predictions: {0}")]
    ListPredictions(#[source] ClientError),
    #[error("failed to get prediction: {0}")]
    GetPrediction(#[source] ClientError),
    #[error("failed to cancel prediction: {0}")]
    CancelPrediction(#[source] ClientError),
}

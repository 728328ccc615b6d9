//! Typed client for the Replicate HTTP API.
//!
//! Predictions are asynchronous inference jobs owned by the server; this crate
//! creates, lists, fetches, and cancels them and mirrors their state into
//! typed values.
//!
//! ```no_run
//! use replicate_client::{Replicate, predictions::PredictionInput};
//! use serde_json::json;
//!
//! fn main() -> Result<(), replicate_client::Error> {
//!     let replicate = Replicate::with_token("r8_...")?;
//!
//!     let mut input = PredictionInput::new();
//!     input.insert("prompt".to_string(), json!("a studio photo of a rainbow colored corgi"));
//!
//!     let prediction = replicate
//!         .predictions()
//!         .create("stability-ai/sdxl", input, None, false)?;
//!
//!     let prediction = replicate.predictions().get(&prediction.id)?;
//!     if let Some(progress) = prediction.progress() {
//!         println!("{}/{} done", progress.current, progress.total);
//!     }
//!     Ok(())
//! }
//! ```

pub mod api;
mod client;
pub mod credentials;
pub mod error;
pub mod predictions;
pub mod schemas;

pub use crate::client::*;
pub use crate::error::Error;

mod client;
mod error;
mod pagination;

pub use client::Client;
pub use error::{ApiErrorBody, ClientError};
pub use pagination::Page;

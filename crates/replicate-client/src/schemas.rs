use std::collections::HashMap;
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Identifies an inference program: either an `owner/name` pair or a pinned
/// `owner/name:version`.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelIdentifier {
    pub owner: String,
    pub name: String,
    pub version: Option<String>,
}

impl ModelIdentifier {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        ModelIdentifier {
            owner: owner.into(),
            name: name.into(),
            version: None,
        }
    }

    pub fn with_version(
        owner: impl Into<String>,
        name: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        ModelIdentifier {
            owner: owner.into(),
            name: name.into(),
            version: Some(version.into()),
        }
    }

    pub fn validate(identifier: &str) -> bool {
        static NAME_REGEX: Lazy<Regex> = Lazy::new(|| {
            Regex::new(r"^[a-zA-Z0-9_.-]+$")
                .expect("Should be able to compile name validation regex.")
        });

        let (path, version) = match identifier.split_once(':') {
            Some((path, version)) => (path, Some(version)),
            None => (identifier, None),
        };

        if let Some(version) = version {
            if version.is_empty() {
                return false;
            }
        }

        let parts: Vec<&str> = path.split('/').collect();
        if parts.len() != 2 {
            return false;
        }

        for part in parts {
            if !NAME_REGEX.is_match(part) {
                return false;
            }
        }

        true
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }
}

impl TryFrom<String> for ModelIdentifier {
    type Error = Error;

    fn try_from(identifier: String) -> Result<Self, Self::Error> {
        if !ModelIdentifier::validate(&identifier) {
            return Err(Error::InvalidIdentifier(identifier));
        }

        let (path, version) = match identifier.split_once(':') {
            Some((path, version)) => (path, Some(version.to_string())),
            None => (identifier.as_str(), None),
        };

        let parts: Vec<&str> = path.split('/').collect();
        Ok(ModelIdentifier {
            owner: parts[0].into(),
            name: parts[1].into(),
            version,
        })
    }
}

impl FromStr for ModelIdentifier {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ModelIdentifier::try_from(s.to_string())
    }
}

impl std::fmt::Display for ModelIdentifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.version {
            Some(version) => write!(f, "{}/{}:{}", self.owner, self.name, version),
            None => write!(f, "{}/{}", self.owner, self.name),
        }
    }
}

/// Event types the server can notify a webhook about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum WebhookEventType {
    Start,
    Output,
    Logs,
    Completed,
}

/// A callback URL plus the event types the server should notify it about.
///
/// An empty event filter means "server default", not "no events"; it is
/// omitted from request bodies entirely.
#[derive(Debug, Clone, PartialEq)]
pub struct Webhook {
    pub url: String,
    pub events: Vec<WebhookEventType>,
}

impl Webhook {
    pub fn new(url: impl Into<String>) -> Self {
        Webhook {
            url: url.into(),
            events: Vec::new(),
        }
    }

    pub fn with_events(url: impl Into<String>, events: Vec<WebhookEventType>) -> Self {
        Webhook {
            url: url.into(),
            events,
        }
    }
}

/// An uploaded file resource as echoed back by the API.
///
/// Only the shape needed to reference files from prediction input is modeled
/// here; the upload subsystem itself lives elsewhere.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct File {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub urls: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl File {
    /// The URL under which the file content can be retrieved, if the server
    /// provided one.
    pub fn get_url(&self) -> Option<&str> {
        self.urls.get("get").map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_owner_name_identifier() {
        let id: ModelIdentifier = "stability-ai/sdxl".parse().unwrap();
        assert_eq!(id.owner(), "stability-ai");
        assert_eq!(id.name(), "sdxl");
        assert!(id.version().is_none());
    }

    #[test]
    fn parses_identifier_with_version() {
        let id: ModelIdentifier = "stability-ai/sdxl:39ed52f2".parse().unwrap();
        assert_eq!(id.owner(), "stability-ai");
        assert_eq!(id.name(), "sdxl");
        assert_eq!(id.version(), Some("39ed52f2"));
    }

    #[test]
    fn rejects_bare_version_hash() {
        assert!("39ed52f2a45af4c4d1".parse::<ModelIdentifier>().is_err());
    }

    #[test]
    fn rejects_empty_version() {
        assert!("owner/name:".parse::<ModelIdentifier>().is_err());
    }

    #[test]
    fn rejects_too_many_segments() {
        assert!("a/b/c".parse::<ModelIdentifier>().is_err());
    }

    #[test]
    fn rejects_invalid_characters() {
        assert!("own er/name".parse::<ModelIdentifier>().is_err());
    }

    #[test]
    fn display_round_trips() {
        for raw in ["owner/name", "owner/name:v1.2"] {
            let id: ModelIdentifier = raw.parse().unwrap();
            assert_eq!(id.to_string(), raw);
        }
    }

    #[test]
    fn webhook_event_type_serializes_lowercase() {
        let json = serde_json::to_string(&WebhookEventType::Completed).unwrap();
        assert_eq!(json, r#""completed""#);
        assert_eq!(WebhookEventType::Start.to_string(), "start");
    }

    #[test]
    fn file_exposes_get_url() {
        let file: File = serde_json::from_str(
            r#"{
                "id": "f1",
                "name": "input.png",
                "urls": { "get": "https://x/y" }
            }"#,
        )
        .unwrap();
        assert_eq!(file.get_url(), Some("https://x/y"));
    }
}

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::Error as _;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_json::value::RawValue;

use crate::api::{Client, Page};
use crate::error::Error;
use crate::schemas::{ModelIdentifier, Webhook, WebhookEventType};

/// Lifecycle state of a prediction, owned by the server and only mirrored here.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Status {
    Starting,
    Processing,
    Succeeded,
    Failed,
    Canceled,
}

impl Status {
    /// Whether the server will never move the prediction out of this state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Status::Succeeded | Status::Failed | Status::Canceled)
    }
}

/// How the prediction was triggered.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Source {
    Api,
    Web,
}

/// Open mapping from input field name to arbitrary JSON value. The set of
/// valid keys is defined by the model, not by this client.
pub type PredictionInput = serde_json::Map<String, Value>;

/// Model-defined output value of arbitrary shape.
pub type PredictionOutput = Value;

/// Performance counters reported by the server, all individually optional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionMetrics {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub predict_time: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_time: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_token_count: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_token_count: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_to_first_token: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens_per_second: Option<f64>,
}

/// Point-in-time completion estimate derived from the prediction's logs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PredictionProgress {
    pub percentage: f64,
    pub current: u64,
    pub total: u64,
}

/// One inference job as known to the server.
///
/// Values are produced by decoding server responses and are never mutated by
/// the client; fetch again to observe newer state. The exact payload of the
/// last successful decode is retained and available via [`Prediction::raw_json`],
/// so fields this client does not model yet are still reachable.
#[derive(Debug, Clone, Serialize)]
pub struct Prediction {
    pub id: String,
    pub status: Status,
    pub model: String,
    pub version: String,
    pub input: PredictionInput,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<PredictionOutput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<Source>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logs: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<PredictionMetrics>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub webhook: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub webhook_events_filter: Vec<WebhookEventType>,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub urls: HashMap<String, String>,
    pub created_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<String>,
    #[serde(skip_serializing)]
    raw_json: String,
}

/// Structured view of the wire payload, decoded after the raw text is captured.
#[derive(Deserialize)]
struct PredictionWire {
    id: String,
    status: Status,
    #[serde(default)]
    model: String,
    #[serde(default)]
    version: String,
    #[serde(default)]
    input: PredictionInput,
    #[serde(default)]
    output: Option<PredictionOutput>,
    #[serde(default)]
    source: Option<Source>,
    #[serde(default)]
    error: Option<Value>,
    #[serde(default)]
    logs: Option<String>,
    #[serde(default)]
    metrics: Option<PredictionMetrics>,
    #[serde(default)]
    webhook: Option<String>,
    #[serde(default)]
    webhook_events_filter: Vec<WebhookEventType>,
    #[serde(default)]
    urls: HashMap<String, String>,
    created_at: String,
    #[serde(default)]
    started_at: Option<String>,
    #[serde(default)]
    completed_at: Option<String>,
}

impl<'de> Deserialize<'de> for Prediction {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        // Capture the exact source text first so no information is lost when
        // this model lags the server's schema.
        let raw = Box::<RawValue>::deserialize(deserializer)?;
        let wire: PredictionWire = serde_json::from_str(raw.get()).map_err(D::Error::custom)?;

        Ok(Prediction {
            id: wire.id,
            status: wire.status,
            model: wire.model,
            version: wire.version,
            input: wire.input,
            output: wire.output,
            source: wire.source,
            error: wire.error,
            logs: wire.logs,
            metrics: wire.metrics,
            webhook: wire.webhook,
            webhook_events_filter: wire.webhook_events_filter,
            urls: wire.urls,
            created_at: wire.created_at,
            started_at: wire.started_at,
            completed_at: wire.completed_at,
            raw_json: raw.get().to_string(),
        })
    }
}

static PROGRESS_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(\d+)%\s*\|.+?\|\s*(\d+)/(\d+)")
        .expect("Should be able to compile progress regex.")
});

impl Prediction {
    /// The exact payload this value was last decoded from, byte for byte.
    pub fn raw_json(&self) -> &str {
        &self.raw_json
    }

    /// Whether the prediction has reached a terminal state.
    pub fn is_finished(&self) -> bool {
        self.status.is_terminal()
    }

    /// The latest progress snapshot reported in the logs, if any.
    ///
    /// Later log lines supersede earlier ones, so lines are scanned from the
    /// bottom up and the first match wins.
    pub fn progress(&self) -> Option<PredictionProgress> {
        let logs = self.logs.as_deref()?;
        if logs.is_empty() {
            return None;
        }
        parse_progress(logs)
    }
}

fn parse_progress(logs: &str) -> Option<PredictionProgress> {
    for line in logs.lines().rev() {
        if let Some(caps) = PROGRESS_REGEX.captures(line) {
            let percentage = caps[1].parse::<u64>().ok()?;
            let current = caps[2].parse::<u64>().ok()?;
            let total = caps[3].parse::<u64>().ok()?;
            return Some(PredictionProgress {
                percentage: percentage as f64 / 100.0,
                current,
                total,
            });
        }
    }
    None
}

/// Replace every input value that is a file resource with its retrieval URL.
///
/// A value counts as a file resource when it is an object exposing a string
/// URL under `urls.get`, the shape the files API echoes back.
fn rewrite_file_inputs(input: &mut PredictionInput) {
    for value in input.values_mut() {
        let get_url = value
            .get("urls")
            .and_then(|urls| urls.get("get"))
            .and_then(Value::as_str)
            .map(str::to_owned);
        if let Some(url) = get_url {
            *value = Value::String(url);
        }
    }
}

/// Pick the creation path and seed body fields for the given identifier.
///
/// `owner/name` routes to the model-scoped path. A pinned version routes to
/// the generic path with the version in the body. A string that does not parse
/// as an identifier at all is passed through as an opaque version for the
/// server to judge; this fallback is deliberate and never an error.
fn resolve_create_target(identifier: &str) -> (String, serde_json::Map<String, Value>) {
    let mut data = serde_json::Map::new();
    let path = match identifier.parse::<ModelIdentifier>() {
        Ok(ModelIdentifier {
            owner,
            name,
            version: None,
        }) => format!("models/{owner}/{name}/predictions"),
        Ok(ModelIdentifier {
            version: Some(version),
            ..
        }) => {
            data.insert("version".to_string(), Value::String(version));
            "predictions".to_string()
        }
        Err(_) => {
            data.insert(
                "version".to_string(),
                Value::String(identifier.to_string()),
            );
            "predictions".to_string()
        }
    };
    (path, data)
}

/// Operations on the predictions collection of the API.
#[derive(Debug, Clone)]
pub struct Predictions {
    client: Client,
}

impl Predictions {
    pub(crate) fn new(client: Client) -> Self {
        Self { client }
    }

    /// Create a prediction for the model or version named by `identifier`.
    ///
    /// The input mapping is taken by value; file resources inside it are
    /// rewritten to their retrieval URLs before the body is serialized.
    pub fn create(
        &self,
        identifier: &str,
        input: PredictionInput,
        webhook: Option<Webhook>,
        stream: bool,
    ) -> Result<Prediction, Error> {
        let (path, data) = resolve_create_target(identifier);
        let request = self.create_prediction_request(&path, data, input, webhook, stream)?;
        self.client
            .execute_json::<Prediction>(request)
            .map_err(Error::CreatePrediction)
    }

    /// Return one page of predictions, most recent first.
    pub fn list(&self) -> Result<Page<Prediction>, Error> {
        self.client
            .get_json::<Page<Prediction>>("predictions")
            .map_err(Error::ListPredictions)
    }

    /// Fetch the current state of one prediction by id.
    pub fn get(&self, id: &str) -> Result<Prediction, Error> {
        self.client
            .get_json::<Prediction>(format!("predictions/{id}"))
            .map_err(Error::GetPrediction)
    }

    /// Request cancellation of a running prediction.
    ///
    /// The returned state is the state right after the cancel request was
    /// accepted, not necessarily the final terminal state.
    pub fn cancel(&self, id: &str) -> Result<Prediction, Error> {
        self.client
            .post_json::<Value, Prediction>(format!("predictions/{id}/cancel"), None)
            .map_err(Error::CancelPrediction)
    }

    fn create_prediction_request(
        &self,
        path: &str,
        mut data: serde_json::Map<String, Value>,
        mut input: PredictionInput,
        webhook: Option<Webhook>,
        stream: bool,
    ) -> Result<reqwest::blocking::Request, Error> {
        rewrite_file_inputs(&mut input);

        data.insert("input".to_string(), Value::Object(input));

        if let Some(webhook) = webhook {
            data.insert("webhook".to_string(), Value::String(webhook.url));
            if !webhook.events.is_empty() {
                data.insert(
                    "webhook_events_filter".to_string(),
                    serde_json::to_value(&webhook.events).map_err(Error::SerializeBody)?,
                );
            }
        }

        if stream {
            data.insert("stream".to_string(), Value::Bool(true));
        }

        let body = serde_json::to_vec(&data).map_err(Error::SerializeBody)?;

        self.client.build_post(path, body).map_err(Error::BuildRequest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::ReplicateCredentials;
    use serde_json::json;

    fn test_service() -> Predictions {
        let base_url = reqwest::Url::parse("https://api.replicate.com/v1").unwrap();
        let credentials = ReplicateCredentials::new("r8_test_token");
        Predictions::new(Client::new(base_url, &credentials, "replicate-client/test"))
    }

    fn prediction_with_logs(logs: &str) -> Prediction {
        let payload = json!({
            "id": "p1",
            "status": "processing",
            "created_at": "2024-01-01T00:00:00Z",
            "logs": logs,
        });
        serde_json::from_str(&payload.to_string()).unwrap()
    }

    fn request_body(request: &reqwest::blocking::Request) -> Value {
        let bytes = request.body().and_then(|body| body.as_bytes()).unwrap();
        serde_json::from_slice(bytes).unwrap()
    }

    #[test]
    fn progress_none_without_matching_line() {
        let prediction = prediction_with_logs("loading weights\nwarming up\ndone");
        assert!(prediction.progress().is_none());
    }

    #[test]
    fn progress_none_for_empty_logs() {
        let prediction = prediction_with_logs("");
        assert!(prediction.progress().is_none());

        let payload = json!({
            "id": "p1",
            "status": "starting",
            "created_at": "2024-01-01T00:00:00Z",
        });
        let prediction: Prediction = serde_json::from_str(&payload.to_string()).unwrap();
        assert!(prediction.progress().is_none());
    }

    #[test]
    fn progress_last_matching_line_wins() {
        let prediction =
            prediction_with_logs("10%|█████     |5/50\n20%|██████████|10/50");
        assert_eq!(
            prediction.progress(),
            Some(PredictionProgress {
                percentage: 0.2,
                current: 10,
                total: 50,
            })
        );
    }

    #[test]
    fn progress_tolerates_whitespace_and_trailing_noise() {
        let prediction = prediction_with_logs("  45% |####|9/20  \nnot a progress line");
        assert_eq!(
            prediction.progress(),
            Some(PredictionProgress {
                percentage: 0.45,
                current: 9,
                total: 20,
            })
        );
    }

    #[test]
    fn progress_none_when_numbers_overflow() {
        let prediction = prediction_with_logs("99999999999999999999999%|##|1/2");
        assert!(prediction.progress().is_none());
    }

    #[test]
    fn rewrite_replaces_file_resources_with_get_url() {
        let mut input = PredictionInput::new();
        input.insert(
            "image".to_string(),
            json!({
                "id": "f1",
                "name": "input.png",
                "urls": { "get": "https://x/y" }
            }),
        );
        input.insert("prompt".to_string(), json!("a cat"));
        input.insert("nested".to_string(), json!({ "urls": { "delete": "https://x/z" } }));

        rewrite_file_inputs(&mut input);

        assert_eq!(input["image"], json!("https://x/y"));
        assert_eq!(input["prompt"], json!("a cat"));
        // Objects without a get URL are not file resources and stay untouched.
        assert_eq!(input["nested"], json!({ "urls": { "delete": "https://x/z" } }));
    }

    #[test]
    fn create_target_routes_owner_name_to_model_path() {
        let (path, data) = resolve_create_target("owner/name");
        assert_eq!(path, "models/owner/name/predictions");
        assert!(!data.contains_key("version"));
    }

    #[test]
    fn create_target_sends_pinned_version_in_body() {
        let (path, data) = resolve_create_target("owner/name:39ed52f2");
        assert_eq!(path, "predictions");
        assert_eq!(data["version"], json!("39ed52f2"));
    }

    #[test]
    fn create_target_falls_back_for_opaque_identifier() {
        let (path, data) = resolve_create_target("abc123");
        assert_eq!(path, "predictions");
        assert_eq!(data["version"], json!("abc123"));
    }

    #[test]
    fn create_request_substitutes_files_and_sets_input() {
        let service = test_service();
        let mut input = PredictionInput::new();
        input.insert(
            "image".to_string(),
            json!({ "id": "f1", "urls": { "get": "https://x/y" } }),
        );

        let request = service
            .create_prediction_request("predictions", serde_json::Map::new(), input, None, false)
            .unwrap();

        assert_eq!(
            request.url().as_str(),
            "https://api.replicate.com/v1/predictions"
        );
        let body = request_body(&request);
        assert_eq!(body["input"]["image"], json!("https://x/y"));
        assert!(body.get("webhook").is_none());
        assert!(body.get("stream").is_none());
    }

    #[test]
    fn create_request_suppresses_empty_webhook_filter() {
        let service = test_service();
        let webhook = Webhook::new("https://cb");

        let request = service
            .create_prediction_request(
                "predictions",
                serde_json::Map::new(),
                PredictionInput::new(),
                Some(webhook),
                false,
            )
            .unwrap();

        let body = request_body(&request);
        assert_eq!(body["webhook"], json!("https://cb"));
        assert!(body.get("webhook_events_filter").is_none());
    }

    #[test]
    fn create_request_includes_non_empty_webhook_filter_and_stream() {
        let service = test_service();
        let webhook = Webhook::with_events(
            "https://cb",
            vec![WebhookEventType::Start, WebhookEventType::Completed],
        );

        let request = service
            .create_prediction_request(
                "predictions",
                serde_json::Map::new(),
                PredictionInput::new(),
                Some(webhook),
                true,
            )
            .unwrap();

        let body = request_body(&request);
        assert_eq!(body["webhook_events_filter"], json!(["start", "completed"]));
        assert_eq!(body["stream"], json!(true));
    }

    #[test]
    fn decode_retains_raw_payload_byte_identical() {
        let payload = r#"{"id":"p1","status":"succeeded","model":"owner/name","version":"v1","input":{"prompt":"hi"},"output":["hello"],"source":"api","created_at":"2024-01-01T00:00:00Z","completed_at":"2024-01-01T00:01:00Z","a_future_field":{"x":1}}"#;

        let prediction: Prediction = serde_json::from_str(payload).unwrap();

        assert_eq!(prediction.raw_json(), payload);
        assert_eq!(prediction.id, "p1");
        assert_eq!(prediction.status, Status::Succeeded);
        assert!(prediction.is_finished());
        assert_eq!(prediction.source, Some(Source::Api));
        assert_eq!(prediction.output, Some(json!(["hello"])));

        // Fields not modeled yet stay reachable through the raw copy.
        let raw: Value = serde_json::from_str(prediction.raw_json()).unwrap();
        assert_eq!(raw["a_future_field"]["x"], json!(1));
    }

    #[test]
    fn raw_payload_never_serializes_back_out() {
        let payload = r#"{"id":"p1","status":"starting","created_at":"2024-01-01T00:00:00Z"}"#;
        let prediction: Prediction = serde_json::from_str(payload).unwrap();

        let reserialized = serde_json::to_value(&prediction).unwrap();
        assert!(reserialized.get("raw_json").is_none());
        assert_eq!(reserialized["id"], json!("p1"));
        // Absent optional fields are omitted rather than emitted as null.
        assert!(reserialized.get("logs").is_none());
    }

    #[test]
    fn page_elements_each_retain_their_raw_payload() {
        let payload = r#"{"results":[{"id":"p1","status":"starting","created_at":"2024-01-01T00:00:00Z"},{"id":"p2","status":"failed","error":"boom","created_at":"2024-01-02T00:00:00Z"}],"next":null,"previous":null}"#;

        let page: Page<Prediction> = serde_json::from_str(payload).unwrap();
        assert_eq!(page.results.len(), 2);
        assert!(page.results[0].raw_json().contains(r#""id":"p1""#));
        assert_eq!(page.results[1].error, Some(json!("boom")));
        assert_eq!(page.results[1].status, Status::Failed);
    }

    #[test]
    fn decodes_metrics_when_present() {
        let payload = r#"{"id":"p1","status":"succeeded","created_at":"2024-01-01T00:00:00Z","metrics":{"predict_time":1.5,"total_time":2.0,"output_token_count":42,"tokens_per_second":28.0}}"#;
        let prediction: Prediction = serde_json::from_str(payload).unwrap();

        let metrics = prediction.metrics.unwrap();
        assert_eq!(metrics.predict_time, Some(1.5));
        assert_eq!(metrics.output_token_count, Some(42));
        assert!(metrics.input_token_count.is_none());
        assert!(metrics.time_to_first_token.is_none());
    }
}

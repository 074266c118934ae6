use crate::events::ChangeEvent;
use crate::model::{Extent, RoadObject};
use reqwest::blocking::Client;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

/// Collaborator interface to the external paginated object source.
///
/// Retries, backoff, and timeouts are the transport's concern; the ingestion
/// state machine only ever asks for the next page given a cursor.
pub trait ObjectSource {
    /// Fetches up to `page_size` objects with id greater than `after_id`.
    fn fetch_object_page(
        &self,
        object_type: u32,
        after_id: Option<u64>,
        page_size: usize,
    ) -> Result<Vec<RoadObject>, SourceError>;

    /// Fetches up to `page_size` change events with id greater than
    /// `after_event_id`.
    fn fetch_event_page(
        &self,
        object_type: u32,
        after_event_id: u64,
        page_size: usize,
    ) -> Result<Vec<ChangeEvent>, SourceError>;

    /// Current tail of the event log for the type.
    fn fetch_latest_event_id(&self, object_type: u32) -> Result<u64, SourceError>;

    /// Fetches a single object by id.
    fn fetch_object(&self, object_type: u32, id: u64) -> Result<RoadObject, SourceError>;
}

/// Transport-level failure surfaced to the ingestion state machine.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("source request failed: {0}")]
    Request(String),
    #[error("source returned status {0}")]
    Status(u16),
    #[error("undecodable source payload: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("object {object_id} of type {object_type} not found")]
    NotFound { object_type: u32, object_id: u64 },
}

/// Blocking HTTP source reading NDJSON page streams.
#[derive(Debug, Clone)]
pub struct HttpObjectSource {
    client: Client,
    endpoint: String,
}

impl HttpObjectSource {
    /// Creates a source targeting the provided base endpoint.
    pub fn new(endpoint: impl Into<String>, request_timeout: Duration) -> Result<Self, SourceError> {
        let endpoint = endpoint.into();
        if endpoint.trim().is_empty() {
            return Err(SourceError::Request(
                "source endpoint must not be empty".to_string(),
            ));
        }
        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|err| SourceError::Request(format!("http client build failed: {err}")))?;
        Ok(Self { client, endpoint })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.endpoint.trim_end_matches('/'), path)
    }

    fn get_text(&self, url: &str, query: &[(&str, String)]) -> Result<String, SourceError> {
        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .map_err(|err| SourceError::Request(format!("request to {url} failed: {err}")))?;
        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status(status.as_u16()));
        }
        response
            .text()
            .map_err(|err| SourceError::Request(format!("reading {url} failed: {err}")))
    }
}

impl ObjectSource for HttpObjectSource {
    fn fetch_object_page(
        &self,
        object_type: u32,
        after_id: Option<u64>,
        page_size: usize,
    ) -> Result<Vec<RoadObject>, SourceError> {
        let url = self.url(&format!("objects/{object_type}/stream"));
        let mut query = vec![("count", page_size.to_string())];
        if let Some(after_id) = after_id {
            query.push(("start", after_id.to_string()));
        }
        let body = self.get_text(&url, &query)?;
        let mut objects = Vec::new();
        for line in body.lines().filter(|line| !line.trim().is_empty()) {
            match serde_json::from_str::<WireObject>(line) {
                Ok(wire) => objects.push(wire.into_object(object_type)),
                Err(err) => {
                    warn!(object_type, %err, "skipping undecodable object record");
                }
            }
        }
        Ok(objects)
    }

    fn fetch_event_page(
        &self,
        object_type: u32,
        after_event_id: u64,
        page_size: usize,
    ) -> Result<Vec<ChangeEvent>, SourceError> {
        let url = self.url(&format!("objects/{object_type}/events"));
        let query = vec![
            ("count", page_size.to_string()),
            ("start", after_event_id.to_string()),
        ];
        let body = self.get_text(&url, &query)?;
        let mut events = Vec::new();
        for line in body.lines().filter(|line| !line.trim().is_empty()) {
            match serde_json::from_str::<ChangeEvent>(line) {
                Ok(event) => events.push(event),
                Err(err) => {
                    warn!(object_type, %err, "skipping undecodable change event");
                }
            }
        }
        Ok(events)
    }

    fn fetch_latest_event_id(&self, object_type: u32) -> Result<u64, SourceError> {
        let url = self.url(&format!("objects/{object_type}/events/latest"));
        let body = self.get_text(&url, &[])?;
        let latest: WireLatestEvent = serde_json::from_str(&body)?;
        Ok(latest.event_id)
    }

    fn fetch_object(&self, object_type: u32, id: u64) -> Result<RoadObject, SourceError> {
        let url = self.url(&format!("objects/{object_type}/{id}"));
        let body = match self.get_text(&url, &[]) {
            Err(SourceError::Status(404)) => {
                return Err(SourceError::NotFound {
                    object_type,
                    object_id: id,
                })
            }
            other => other?,
        };
        let wire: WireObject = serde_json::from_str(&body)?;
        Ok(wire.into_object(object_type))
    }
}

#[derive(Debug, Deserialize)]
struct WireLatestEvent {
    event_id: u64,
}

/// Source wire form of an object; translated into the domain shape.
#[derive(Debug, Deserialize)]
struct WireObject {
    id: u64,
    #[serde(default)]
    version: u32,
    #[serde(default)]
    properties: BTreeMap<String, WireProperty>,
    #[serde(default)]
    extents: Vec<WireExtent>,
}

#[derive(Debug, Deserialize)]
struct WireProperty {
    value: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct WireExtent {
    #[serde(rename = "id")]
    segment_id: u64,
    start_position: f64,
    end_position: f64,
}

impl WireObject {
    fn into_object(self, object_type: u32) -> RoadObject {
        let mut properties = BTreeMap::new();
        for (raw_id, property) in self.properties {
            let Ok(property_id) = raw_id.parse::<u32>() else {
                warn!(object_id = self.id, property = %raw_id, "skipping non-numeric property id");
                continue;
            };
            let value = match property.value {
                serde_json::Value::String(text) => text,
                serde_json::Value::Number(number) => number.to_string(),
                serde_json::Value::Bool(flag) => flag.to_string(),
                other => {
                    warn!(object_id = self.id, property_id, value = %other, "skipping non-scalar property value");
                    continue;
                }
            };
            properties.insert(property_id, value);
        }
        RoadObject {
            id: self.id,
            object_type,
            version: self.version,
            properties,
            extents: self
                .extents
                .into_iter()
                .map(|extent| Extent {
                    segment_id: extent.segment_id,
                    start: extent.start_position,
                    end: extent.end_position,
                })
                .collect(),
        }
    }
}

use std::time::Duration;

use futures_util::StreamExt;
use scrape_core::ObjectId;
use serde_json::Value;
use url::Url;

use crate::{FailureKind, FetchError};

#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub max_bytes: u64,
    /// Spatial reference requested for the id listing.
    pub out_sr: u32,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(60),
            max_bytes: 64 * 1024 * 1024,
            out_sr: 3857,
        }
    }
}

/// A remote layer that can be enumerated by id and queried in chunks.
#[async_trait::async_trait]
pub trait LayerSource: Send + Sync {
    /// `GET {layer}?f=json`, returning the `name` field.
    async fn layer_name(&self, layer_url: &str) -> Result<String, FetchError>;

    /// `GET {layer}/query?where=1=1&returnIdsOnly=true`, returning `objectIds`.
    async fn object_ids(&self, layer_url: &str) -> Result<Vec<ObjectId>, FetchError>;

    /// `GET {layer}/query?outFields=*&where=...`, returning the raw body.
    async fn query_batch(&self, layer_url: &str, where_clause: &str)
        -> Result<Vec<u8>, FetchError>;
}

/// [`LayerSource`] for ArcGIS REST feature and map server layers.
#[derive(Debug, Clone)]
pub struct ArcGisClient {
    settings: FetchSettings,
    client: reqwest::Client,
}

impl ArcGisClient {
    pub fn new(settings: FetchSettings) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .build()
            .map_err(|err| FetchError::new(FailureKind::Network, err.to_string()))?;
        Ok(Self { settings, client })
    }

    async fn get_bytes(&self, url: Url) -> Result<Vec<u8>, FetchError> {
        let response = self.client.get(url).send().await.map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::new(
                FailureKind::HttpStatus(status.as_u16()),
                status.to_string(),
            ));
        }

        if let Some(content_len) = response.content_length() {
            if content_len > self.settings.max_bytes {
                return Err(too_large(self.settings.max_bytes, content_len));
            }
        }

        let mut bytes = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(map_reqwest_error)?;
            let next_len = bytes.len() as u64 + chunk.len() as u64;
            if next_len > self.settings.max_bytes {
                return Err(too_large(self.settings.max_bytes, next_len));
            }
            bytes.extend_from_slice(&chunk);
        }
        Ok(bytes)
    }

    async fn get_json(&self, url: Url) -> Result<Value, FetchError> {
        let bytes = self.get_bytes(url).await?;
        parse_json_document(&bytes)
    }
}

#[async_trait::async_trait]
impl LayerSource for ArcGisClient {
    async fn layer_name(&self, layer_url: &str) -> Result<String, FetchError> {
        let url = layer_endpoint(layer_url, None, &[("f", "json")])?;
        let json = self.get_json(url).await?;
        json.get("name")
            .and_then(Value::as_str)
            .map(ToOwned::to_owned)
            .ok_or_else(|| FetchError::new(FailureKind::MissingField("name"), layer_url))
    }

    async fn object_ids(&self, layer_url: &str) -> Result<Vec<ObjectId>, FetchError> {
        let out_sr = self.settings.out_sr.to_string();
        let url = layer_endpoint(
            layer_url,
            Some("query"),
            &[
                ("where", "1=1"),
                ("returnIdsOnly", "true"),
                ("f", "json"),
                ("outSR", out_sr.as_str()),
            ],
        )?;
        let json = self.get_json(url).await?;
        parse_object_ids(&json)
    }

    async fn query_batch(
        &self,
        layer_url: &str,
        where_clause: &str,
    ) -> Result<Vec<u8>, FetchError> {
        let url = layer_endpoint(
            layer_url,
            Some("query"),
            &[("f", "json"), ("outFields", "*"), ("where", where_clause)],
        )?;
        self.get_bytes(url).await
    }
}

/// Builds `{layer_url}[/{suffix}]?{params}`, keeping any query the layer url
/// already carries (such as a token).
pub(crate) fn layer_endpoint(
    layer_url: &str,
    suffix: Option<&str>,
    params: &[(&str, &str)],
) -> Result<Url, FetchError> {
    let mut url = Url::parse(layer_url)
        .map_err(|err| FetchError::new(FailureKind::InvalidUrl, err.to_string()))?;
    if let Some(suffix) = suffix {
        url.path_segments_mut()
            .map_err(|_| FetchError::new(FailureKind::InvalidUrl, layer_url))?
            .pop_if_empty()
            .push(suffix);
    }
    {
        let mut query = url.query_pairs_mut();
        for (key, value) in params {
            query.append_pair(key, value);
        }
    }
    Ok(url)
}

/// Parses a JSON response body, surfacing service-reported errors.
pub fn parse_json_document(bytes: &[u8]) -> Result<Value, FetchError> {
    let json: Value = serde_json::from_slice(bytes)
        .map_err(|err| FetchError::new(FailureKind::MalformedResponse, err.to_string()))?;
    if !json.is_object() {
        return Err(FetchError::new(
            FailureKind::MalformedResponse,
            "expected a json object",
        ));
    }
    if let Some(error) = json.get("error") {
        let code = error.get("code").and_then(Value::as_i64).unwrap_or(0);
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("service error");
        return Err(FetchError::new(FailureKind::ServiceError { code }, message));
    }
    Ok(json)
}

fn parse_object_ids(json: &Value) -> Result<Vec<ObjectId>, FetchError> {
    let ids = match json.get("objectIds") {
        None => {
            return Err(FetchError::new(
                FailureKind::MissingField("objectIds"),
                "id listing has no objectIds",
            ))
        }
        // Layers without features report null.
        Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Array(ids)) => ids,
        Some(other) => {
            return Err(FetchError::new(
                FailureKind::MalformedResponse,
                format!("objectIds is not an array: {other}"),
            ))
        }
    };

    ids.iter()
        .map(|id| match id {
            Value::Number(n) => n.as_i64().map(ObjectId::Int).ok_or_else(|| {
                FetchError::new(FailureKind::MalformedResponse, format!("bad object id {n}"))
            }),
            Value::String(s) => Ok(ObjectId::Text(s.clone())),
            other => Err(FetchError::new(
                FailureKind::MalformedResponse,
                format!("bad object id {other}"),
            )),
        })
        .collect()
}

fn too_large(max_bytes: u64, actual: u64) -> FetchError {
    FetchError::new(
        FailureKind::TooLarge {
            max_bytes,
            actual: Some(actual),
        },
        "response too large",
    )
}

fn map_reqwest_error(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        return FetchError::new(FailureKind::Timeout, err.to_string());
    }
    FetchError::new(FailureKind::Network, err.to_string())
}

use std::{collections::BTreeMap, time::Duration};

use anyhow::{anyhow, Context};
use serde::{Deserialize, Serialize};

use super::feature::FeatureCollection;

/// Query string parameters of a feature service request, by parameter name.
pub type QueryParams = BTreeMap<String, String>;

/// Fixed timeout applied to every feature service request.
pub const QUERY_TIMEOUT: Duration = Duration::from_secs(60);

/// Output spatial reference requested from the service (WGS84).
pub const OUT_SR: u32 = 4326;

/// Response encoding requested through the `f` parameter.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    #[serde(rename = "geojson")]
    GeoJson,
    #[serde(rename = "json")]
    EsriJson,
}

impl OutputFormat {
    pub fn param(&self) -> &'static str {
        match self {
            OutputFormat::GeoJson => "geojson",
            OutputFormat::EsriJson => "json",
        }
    }
}

/// A single layer of a feature service.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LayerRef {
    pub service_url: String,
    pub layer_id: u32,
}

impl LayerRef {
    pub fn new(service_url: &str, layer_id: u32) -> Self {
        Self {
            service_url: service_url.trim().to_string(),
            layer_id,
        }
    }

    pub fn query_url(&self) -> String {
        format!(
            "{}/{}/query",
            self.service_url.trim_end_matches('/'),
            self.layer_id
        )
    }
}

/// Something that answers feature queries. The only network boundary of an export.
pub trait FeatureSource: Send + Sync {
    fn query(&self, layer: &LayerRef, params: QueryParams) -> anyhow::Result<FeatureCollection>;
}

/// Feature queries made on behalf of one profile, in that profile's output format.
pub struct FeatureService<'a> {
    source: &'a dyn FeatureSource,
    format: OutputFormat,
}

impl<'a> FeatureService<'a> {
    pub fn new(source: &'a dyn FeatureSource, format: OutputFormat) -> Self {
        Self { source, format }
    }

    pub fn query(
        &self,
        layer: &LayerRef,
        mut params: QueryParams,
    ) -> anyhow::Result<FeatureCollection> {
        params.insert("f".to_string(), self.format.param().to_string());
        self.source.query(layer, params)
    }
}

/// Merge caller parameters over the defaults sent with every query. The caller's `f` wins over
/// the default output format.
pub fn merge_query_params(params: QueryParams) -> QueryParams {
    let mut merged = QueryParams::from([
        ("f".to_string(), OutputFormat::default().param().to_string()),
        ("outFields".to_string(), "*".to_string()),
        ("outSR".to_string(), OUT_SR.to_string()),
        ("returnGeometry".to_string(), "true".to_string()),
    ]);
    merged.extend(params);
    merged
}

/// ArcGIS answers many failed queries with HTTP 200 and an `error` object in the body.
fn check_service_error(body: &serde_json::Value) -> anyhow::Result<()> {
    match body.get("error") {
        Some(error) => {
            let code = error
                .get("code")
                .map(|code| code.to_string())
                .unwrap_or_else(|| "unknown".to_string());
            let message = error
                .get("message")
                .and_then(|message| message.as_str())
                .unwrap_or("no message");
            Err(anyhow!(
                "Feature service returned error {}: {}",
                code,
                message
            ))
        }
        None => Ok(()),
    }
}

/// Parse a query response body into a feature collection.
pub fn parse_query_response(body: &str) -> anyhow::Result<FeatureCollection> {
    let body: serde_json::Value =
        serde_json::from_str(body).context("Feature service response is not JSON")?;
    check_service_error(&body)?;
    serde_json::from_value(body).context("Feature service response is not a feature collection")
}

/// Blocking HTTP client for the ArcGIS REST `query` operation.
pub struct ArcGisClient {
    timeout: Duration,
}

impl ArcGisClient {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for ArcGisClient {
    fn default() -> Self {
        Self::new(QUERY_TIMEOUT)
    }
}

impl FeatureSource for ArcGisClient {
    fn query(&self, layer: &LayerRef, params: QueryParams) -> anyhow::Result<FeatureCollection> {
        let url = layer.query_url();
        let params = merge_query_params(params);
        log::debug!(
            "Querying {} where {:?}",
            url,
            params.get("where").map(String::as_str).unwrap_or("")
        );

        let client = reqwest::blocking::Client::builder()
            .user_agent("lotplan-kmz")
            .timeout(self.timeout)
            .build()?;
        let response = client
            .get(&url)
            .query(&params)
            .send()
            .with_context(|| format!("Requesting {}", url))?
            .error_for_status()?;
        let body = response
            .text()
            .with_context(|| format!("Reading response from {}", url))?;
        let feature_collection = parse_query_response(&body)?;
        log::debug!(
            "{} returned {} features",
            url,
            feature_collection.features.len()
        );
        Ok(feature_collection)
    }
}

use std::sync::Mutex;

use super::{
    client::{FeatureSource, LayerRef, QueryParams},
    feature::FeatureCollection,
};

type Responder =
    Box<dyn Fn(&LayerRef, &QueryParams) -> anyhow::Result<FeatureCollection> + Send + Sync>;

/// In-memory feature source. Answers every query with the responder and records the calls.
pub struct FakeFeatureSource {
    responder: Responder,
    calls: Mutex<Vec<(LayerRef, QueryParams)>>,
}

impl FakeFeatureSource {
    pub fn new(
        responder: impl Fn(&LayerRef, &QueryParams) -> anyhow::Result<FeatureCollection>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        Self {
            responder: Box::new(responder),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// A source where nothing is ever found.
    pub fn empty() -> Self {
        Self::new(|_, _| Ok(FeatureCollection::default()))
    }

    pub fn calls(&self) -> Vec<(LayerRef, QueryParams)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn where_clauses(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|(_, params)| params.get("where").cloned())
            .collect()
    }
}

impl FeatureSource for FakeFeatureSource {
    fn query(&self, layer: &LayerRef, params: QueryParams) -> anyhow::Result<FeatureCollection> {
        let result = (self.responder)(layer, &params);
        self.calls.lock().unwrap().push((layer.clone(), params));
        result
    }
}

/// Parse a feature collection fixture.
pub fn collection(value: serde_json::Value) -> FeatureCollection {
    serde_json::from_value(value).unwrap()
}

/// A GeoJSON parcel collection with a single square polygon.
pub fn square_parcel(lotplan: &str) -> FeatureCollection {
    collection(serde_json::json!({
        "type": "FeatureCollection",
        "features": [{
            "type": "Feature",
            "geometry": {
                "type": "Polygon",
                "coordinates": [[
                    [153.0, -27.0],
                    [153.01, -27.0],
                    [153.01, -27.01],
                    [153.0, -27.01],
                    [153.0, -27.0]
                ]]
            },
            "properties": {"lotplan": lotplan}
        }]
    }))
}

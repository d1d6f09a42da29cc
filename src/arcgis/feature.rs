use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Spatial reference attached to Esri JSON geometry and collections.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SpatialReference {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wkid: Option<u32>,
    #[serde(
        default,
        rename = "latestWkid",
        skip_serializing_if = "Option::is_none"
    )]
    pub latest_wkid: Option<u32>,
}

impl SpatialReference {
    pub fn from_wkid(wkid: u32) -> Self {
        Self {
            wkid: Some(wkid),
            latest_wkid: None,
        }
    }

    pub fn code(&self) -> Option<u32> {
        self.wkid.or(self.latest_wkid)
    }
}

/// A feature as returned by either a GeoJSON (`properties`) or an Esri JSON (`attributes`) query.
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
pub struct Feature {
    #[serde(default)]
    pub geometry: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
}

/// Attribute table of a feature, whichever encoding it came in.
pub enum FeatureRecord<'a> {
    Esri(&'a Map<String, Value>),
    GeoJson(&'a Map<String, Value>),
    Empty,
}

impl<'a> FeatureRecord<'a> {
    pub fn attribute(&self, name: &str) -> Option<&'a Value> {
        match self {
            FeatureRecord::Esri(attributes) => attributes.get(name),
            FeatureRecord::GeoJson(properties) => properties.get(name),
            FeatureRecord::Empty => None,
        }
    }
}

impl Feature {
    pub fn record(&self) -> FeatureRecord<'_> {
        match (&self.attributes, &self.properties) {
            (Some(attributes), _) => FeatureRecord::Esri(attributes),
            (None, Some(properties)) => FeatureRecord::GeoJson(properties),
            (None, None) => FeatureRecord::Empty,
        }
    }

    /// Value of the named attribute, looked up in `attributes` or `properties`.
    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.record().attribute(name)
    }

    /// Attribute rendered as a label. Null values and blank strings count as absent.
    pub fn attribute_text(&self, name: &str) -> Option<String> {
        self.attribute(name).and_then(value_text)
    }

    /// Object identifier of the feature: the usual Esri id fields, then the GeoJSON feature id.
    pub fn object_id(&self) -> Option<String> {
        ["OBJECTID", "objectid", "FID"]
            .iter()
            .find_map(|name| self.attribute_text(name))
            .or_else(|| self.id.as_ref().and_then(value_text))
    }
}

fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) if !text.trim().is_empty() => Some(text.trim().to_string()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}

/// Result of a feature query.
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
pub struct FeatureCollection {
    #[serde(default)]
    pub features: Vec<Feature>,
    #[serde(
        default,
        rename = "spatialReference",
        skip_serializing_if = "Option::is_none"
    )]
    pub spatial_reference: Option<SpatialReference>,
}

impl FeatureCollection {
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{Feature, FeatureCollection};

    fn feature(value: serde_json::Value) -> Feature {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_attribute_reads_esri_attributes() {
        let feature = feature(json!({
            "geometry": {"rings": []},
            "attributes": {"OBJECTID": 17, "lt_code": "3a"}
        }));
        assert_eq!(Some("3a".to_string()), feature.attribute_text("lt_code"));
        assert_eq!(Some("17".to_string()), feature.object_id());
        assert!(feature.attribute("missing").is_none());
    }

    #[test]
    fn test_attribute_reads_geojson_properties() {
        let feature = feature(json!({
            "type": "Feature",
            "id": 5,
            "geometry": null,
            "properties": {"re_label": " 11.3.4 ", "blank": "  ", "nothing": null}
        }));
        assert_eq!(Some("11.3.4".to_string()), feature.attribute_text("re_label"));
        assert_eq!(None, feature.attribute_text("blank"));
        assert_eq!(None, feature.attribute_text("nothing"));
        assert_eq!(Some("5".to_string()), feature.object_id());
    }

    #[test]
    fn test_feature_without_attributes() {
        let feature = feature(json!({"geometry": {"x": 1.0, "y": 2.0}}));
        assert!(feature.attribute("anything").is_none());
        assert!(feature.object_id().is_none());
    }

    #[test]
    fn test_collection_reads_esri_spatial_reference() {
        let collection: FeatureCollection = serde_json::from_value(json!({
            "spatialReference": {"wkid": 102100, "latestWkid": 3857},
            "features": []
        }))
        .unwrap();
        assert!(collection.is_empty());
        assert_eq!(Some(102100), collection.spatial_reference.unwrap().code());
    }
}

use geo::LineString;
use serde::Serialize;
use serde_json::Value;

use crate::arcgis::feature::SpatialReference;

/// Geometry types of Esri JSON, told apart by the keys they carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EsriGeometryType {
    Polygon,
    Polyline,
    Point,
}

impl EsriGeometryType {
    /// Name used for the `geometryType` query parameter.
    pub fn esri_name(&self) -> &'static str {
        match self {
            EsriGeometryType::Polygon => "esriGeometryPolygon",
            EsriGeometryType::Polyline => "esriGeometryPolyline",
            EsriGeometryType::Point => "esriGeometryPoint",
        }
    }
}

/// Classify Esri JSON geometry: `rings` is a polygon, `paths` a polyline, `x`/`y` a point.
/// Anything else, GeoJSON included, is unknown.
pub fn classify_geometry(geometry: &Value) -> Option<EsriGeometryType> {
    let object = geometry.as_object()?;
    if object.contains_key("rings") {
        Some(EsriGeometryType::Polygon)
    } else if object.contains_key("paths") {
        Some(EsriGeometryType::Polyline)
    } else if object.contains_key("x") && object.contains_key("y") {
        Some(EsriGeometryType::Point)
    } else {
        None
    }
}

/// Read an `[x, y, ...]` position. Extra ordinates (z, m) are ignored.
pub fn position_to_coord(position: &[f64]) -> Option<(f64, f64)> {
    match position {
        [x, y, ..] => Some((*x, *y)),
        _ => None,
    }
}

fn json_position(position: &Value) -> Option<(f64, f64)> {
    let ordinates: Option<Vec<f64>> = position.as_array()?.iter().map(Value::as_f64).collect();
    position_to_coord(&ordinates?)
}

/// Rings of an Esri polygon in the order received, each with its points in the order received.
/// Malformed points are dropped, and so are rings left without points.
pub fn esri_rings(geometry: &Value) -> Vec<LineString<f64>> {
    let rings = match geometry.get("rings").and_then(Value::as_array) {
        Some(rings) => rings,
        None => return Vec::new(),
    };
    rings
        .iter()
        .filter_map(|ring| {
            let coords: Vec<(f64, f64)> = ring
                .as_array()?
                .iter()
                .filter_map(json_position)
                .collect();
            if coords.is_empty() {
                None
            } else {
                Some(LineString::from(coords))
            }
        })
        .collect()
}

/// WKID carried by Esri geometry in its `spatialReference`, if any.
pub fn geometry_wkid(geometry: &Value) -> Option<u32> {
    let spatial_reference = geometry.get("spatialReference")?;
    serde_json::from_value::<SpatialReference>(spatial_reference.clone())
        .ok()?
        .code()
}

/// Esri JSON polygon, as sent in the `geometry` parameter of a spatial query.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct EsriPolygon {
    pub rings: Vec<Vec<[f64; 2]>>,
    #[serde(rename = "spatialReference")]
    pub spatial_reference: SpatialReference,
}

impl EsriPolygon {
    pub fn from_rings(rings: &[LineString<f64>], wkid: u32) -> Self {
        Self {
            rings: rings
                .iter()
                .map(|ring| ring.coords().map(|coord| [coord.x, coord.y]).collect())
                .collect(),
            spatial_reference: SpatialReference::from_wkid(wkid),
        }
    }

    pub fn to_json_string(&self) -> anyhow::Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

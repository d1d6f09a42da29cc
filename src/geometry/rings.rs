use geo::{LineString, Polygon};
use serde_json::Value;

use crate::arcgis::{
    client::OUT_SR,
    feature::{Feature, FeatureCollection},
};

use super::esri::{classify_geometry, esri_rings, geometry_wkid, EsriGeometryType, EsriPolygon};

/// Rings of one polygon, outer ring first and holes after it.
pub type PolygonRings = Vec<LineString<f64>>;

fn positions_to_ring(positions: &[Vec<f64>]) -> Option<LineString<f64>> {
    let coords: Vec<(f64, f64)> = positions
        .iter()
        .filter_map(|position| super::esri::position_to_coord(position))
        .collect();
    if coords.is_empty() {
        None
    } else {
        Some(LineString::from(coords))
    }
}

fn geojson_value_rings(value: &geojson::Value) -> Vec<PolygonRings> {
    let polygon_rings = |rings: &Vec<Vec<Vec<f64>>>| -> PolygonRings {
        rings
            .iter()
            .filter_map(|ring| positions_to_ring(ring))
            .collect()
    };
    match value {
        geojson::Value::Polygon(rings) => vec![polygon_rings(rings)],
        geojson::Value::MultiPolygon(polygons) => polygons.iter().map(polygon_rings).collect(),
        geojson::Value::GeometryCollection(geometries) => geometries
            .iter()
            .flat_map(|geometry| geojson_value_rings(&geometry.value))
            .collect(),
        _ => Vec::new(),
    }
}

/// Polygons of a geometry in either encoding, each as an ordered ring list.
///
/// Esri polygons give a single ring list with the outer ring assumed first; no winding order is
/// checked. GeoJSON Polygon and MultiPolygon give one ring list per polygon. Non-polygon and
/// unparseable geometry gives nothing.
pub fn geometry_polygon_rings(geometry: &Value) -> Vec<PolygonRings> {
    let polygons = match classify_geometry(geometry) {
        Some(EsriGeometryType::Polygon) => vec![esri_rings(geometry)],
        Some(_) => Vec::new(),
        None => match serde_json::from_value::<geojson::Geometry>(geometry.clone()) {
            Ok(geojson_geometry) => geojson_value_rings(&geojson_geometry.value),
            Err(_) => Vec::new(),
        },
    };
    polygons
        .into_iter()
        .filter(|rings| !rings.is_empty())
        .collect()
}

/// Build a polygon from an ordered ring list. There is no polygon without an outer ring.
pub fn polygon_from_rings(mut rings: PolygonRings) -> Option<Polygon<f64>> {
    if rings.is_empty() {
        return None;
    }
    let exterior = rings.remove(0);
    Some(Polygon::new(exterior, rings))
}

/// Canonical polygons of a feature. Features without polygon geometry have none.
pub fn feature_polygons(feature: &Feature) -> Vec<Polygon<f64>> {
    match &feature.geometry {
        Some(geometry) => geometry_polygon_rings(geometry)
            .into_iter()
            .filter_map(polygon_from_rings)
            .collect(),
        None => Vec::new(),
    }
}

/// Every ring of a set of parcel features, treated as one polygon for spatial filtering.
///
/// Rings of different features are simply concatenated, so disjoint parcels do not make a
/// well-formed polygon. Intersection queries tolerate this.
#[derive(Debug, Clone, PartialEq)]
pub struct MergedGeometry {
    pub rings: Vec<LineString<f64>>,
    pub wkid: u32,
}

impl MergedGeometry {
    pub fn to_esri_polygon(&self) -> EsriPolygon {
        EsriPolygon::from_rings(&self.rings, self.wkid)
    }
}

/// Merge the rings of all parcel features. `None` when no feature has any ring data.
///
/// The spatial reference is taken from the first feature geometry that carries one, then from
/// the collection, and defaults to WGS84.
pub fn merge_parcel_geometry(feature_collection: &FeatureCollection) -> Option<MergedGeometry> {
    let rings: Vec<LineString<f64>> = feature_collection
        .features
        .iter()
        .filter_map(|feature| feature.geometry.as_ref())
        .flat_map(geometry_polygon_rings)
        .flatten()
        .collect();
    if rings.is_empty() {
        return None;
    }
    let wkid = feature_collection
        .features
        .iter()
        .filter_map(|feature| feature.geometry.as_ref())
        .find_map(geometry_wkid)
        .or_else(|| {
            feature_collection
                .spatial_reference
                .and_then(|spatial_reference| spatial_reference.code())
        })
        .unwrap_or(OUT_SR);
    log::debug!("Merged {} parcel rings (wkid {})", rings.len(), wkid);
    Some(MergedGeometry { rings, wkid })
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use serde_json::json;

    use crate::arcgis::{feature::Feature, testing::collection};

    use super::{feature_polygons, geometry_polygon_rings, merge_parcel_geometry};

    fn esri_square(offset: f64, wkid: Option<u32>) -> serde_json::Value {
        let mut geometry = json!({
            "rings": [[
                [offset, offset], [offset, offset + 1.0], [offset + 1.0, offset + 1.0],
                [offset + 1.0, offset], [offset, offset]
            ]]
        });
        if let Some(wkid) = wkid {
            geometry["spatialReference"] = json!({ "wkid": wkid });
        }
        geometry
    }

    #[test]
    fn test_esri_polygon_with_hole() {
        let feature: Feature = serde_json::from_value(json!({
            "geometry": {
                "rings": [
                    [[0.0, 0.0], [0.0, 10.0], [10.0, 10.0], [10.0, 0.0], [0.0, 0.0]],
                    [[2.0, 2.0], [4.0, 2.0], [4.0, 4.0], [2.0, 2.0]]
                ]
            },
            "attributes": {}
        }))
        .unwrap();

        let polygons = feature_polygons(&feature);

        assert_eq!(1, polygons.len());
        assert_eq!(5, polygons[0].exterior().coords().count());
        assert_eq!(1, polygons[0].interiors().len());
        let hole_start = polygons[0].interiors()[0].coords().next().unwrap();
        assert_abs_diff_eq!(geo::Coord { x: 2.0, y: 2.0 }, *hole_start);
    }

    #[test]
    fn test_geojson_polygon_and_multipolygon() {
        let polygon = json!({
            "type": "Polygon",
            "coordinates": [
                [[0.0, 0.0], [0.0, 10.0], [10.0, 10.0], [0.0, 0.0]],
                [[1.0, 1.0], [2.0, 1.0], [2.0, 2.0], [1.0, 1.0]]
            ]
        });
        let rings = geometry_polygon_rings(&polygon);
        assert_eq!(1, rings.len());
        assert_eq!(2, rings[0].len());

        let multipolygon = json!({
            "type": "MultiPolygon",
            "coordinates": [
                [[[0.0, 0.0], [0.0, 1.0], [1.0, 1.0], [0.0, 0.0]]],
                [[[5.0, 5.0], [5.0, 6.0], [6.0, 6.0], [5.0, 5.0]]]
            ]
        });
        let rings = geometry_polygon_rings(&multipolygon);
        assert_eq!(2, rings.len());
        assert_abs_diff_eq!(
            geo::Coord { x: 5.0, y: 5.0 },
            *rings[1][0].coords().next().unwrap()
        );
    }

    #[test]
    fn test_non_polygon_geometry_is_dropped() {
        for geometry in [
            json!({"paths": [[[0.0, 0.0], [1.0, 1.0]]]}),
            json!({"x": 1.0, "y": 2.0}),
            json!({"type": "LineString", "coordinates": [[0.0, 0.0], [1.0, 1.0]]}),
            json!({"type": "Polygon", "coordinates": []}),
            json!({"something": "else"}),
            json!({"rings": []}),
        ] {
            assert!(geometry_polygon_rings(&geometry).is_empty(), "{}", geometry);
        }
    }

    #[test]
    fn test_merge_without_features_is_none() {
        assert!(merge_parcel_geometry(&collection(json!({"features": []}))).is_none());
    }

    #[test]
    fn test_merge_without_rings_is_none() {
        let feature_collection = collection(json!({
            "features": [
                {"geometry": null, "properties": {}},
                {"geometry": {"x": 1.0, "y": 2.0}, "attributes": {}},
                {"geometry": {"rings": []}, "attributes": {}}
            ]
        }));
        assert!(merge_parcel_geometry(&feature_collection).is_none());
    }

    #[test]
    fn test_merge_concatenates_rings_of_all_features() {
        let feature_collection = collection(json!({
            "features": [
                {"geometry": esri_square(0.0, None), "attributes": {}},
                {"geometry": esri_square(5.0, Some(28356)), "attributes": {}},
                {"geometry": esri_square(9.0, Some(3857)), "attributes": {}}
            ]
        }));

        let merged = merge_parcel_geometry(&feature_collection).unwrap();

        assert_eq!(3, merged.rings.len());
        assert_eq!(28356, merged.wkid);
        let esri_polygon = merged.to_esri_polygon();
        assert_eq!([5.0, 5.0], esri_polygon.rings[1][0]);
        assert_eq!(Some(28356), esri_polygon.spatial_reference.wkid);
    }

    #[test]
    fn test_merge_spatial_reference_defaults() {
        let geojson_parcel = collection(json!({
            "features": [{
                "type": "Feature",
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[[0.0, 0.0], [0.0, 1.0], [1.0, 1.0], [0.0, 0.0]]]
                },
                "properties": {}
            }]
        }));
        assert_eq!(4326, merge_parcel_geometry(&geojson_parcel).unwrap().wkid);

        let esri_parcel = collection(json!({
            "spatialReference": {"wkid": 4283},
            "features": [{"geometry": esri_square(0.0, None), "attributes": {}}]
        }));
        assert_eq!(4283, merge_parcel_geometry(&esri_parcel).unwrap().wkid);
    }
}

use crate::geometry::{esri::EsriGeometryType, rings::merge_parcel_geometry};

use super::{
    client::{FeatureService, LayerRef, QueryParams, OUT_SR},
    feature::FeatureCollection,
};

/// Query the features of `layer` that intersect the parcel geometry. When the parcel has no
/// geometry there is nothing to intersect with and no query is made.
pub fn fetch_layer_intersection(
    service: &FeatureService,
    layer: &LayerRef,
    parcel: &FeatureCollection,
) -> anyhow::Result<FeatureCollection> {
    let merged = match merge_parcel_geometry(parcel) {
        Some(merged) => merged,
        None => return Ok(FeatureCollection::default()),
    };
    let params = QueryParams::from([
        ("where".to_string(), "1=1".to_string()),
        (
            "geometry".to_string(),
            merged.to_esri_polygon().to_json_string()?,
        ),
        (
            "geometryType".to_string(),
            EsriGeometryType::Polygon.esri_name().to_string(),
        ),
        (
            "spatialRel".to_string(),
            "esriSpatialRelIntersects".to_string(),
        ),
        ("inSR".to_string(), OUT_SR.to_string()),
        ("outSR".to_string(), OUT_SR.to_string()),
    ]);
    service.query(layer, params)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::arcgis::{
        client::{FeatureService, LayerRef, OutputFormat},
        feature::FeatureCollection,
        testing::{collection, square_parcel, FakeFeatureSource},
    };

    use super::fetch_layer_intersection;

    fn vegetation_layer() -> LayerRef {
        LayerRef::new("https://example.com/Vegetation/MapServer", 109)
    }

    #[test]
    fn test_intersection_query_parameters() {
        let source = FakeFeatureSource::new(|_, _| {
            Ok(collection(json!({
                "features": [{
                    "geometry": {"rings": [[[153.0, -27.0], [153.1, -27.0], [153.0, -27.0]]]},
                    "attributes": {"re": "11.3.4"}
                }]
            })))
        });
        let service = FeatureService::new(&source, OutputFormat::EsriJson);

        let intersecting =
            fetch_layer_intersection(&service, &vegetation_layer(), &square_parcel("2RP53435"))
                .unwrap();

        assert_eq!(1, intersecting.features.len());
        let calls = source.calls();
        assert_eq!(1, calls.len());
        let (layer, params) = &calls[0];
        assert_eq!(&vegetation_layer(), layer);
        assert_eq!("1=1", params["where"]);
        assert_eq!("esriGeometryPolygon", params["geometryType"]);
        assert_eq!("esriSpatialRelIntersects", params["spatialRel"]);
        assert_eq!("4326", params["inSR"]);
        assert_eq!("4326", params["outSR"]);
        assert_eq!("json", params["f"]);
        let geometry: serde_json::Value = serde_json::from_str(&params["geometry"]).unwrap();
        assert_eq!(json!({"wkid": 4326}), geometry["spatialReference"]);
        assert_eq!(json!([153.0, -27.0]), geometry["rings"][0][0]);
        assert_eq!(5, geometry["rings"][0].as_array().unwrap().len());
    }

    #[test]
    fn test_no_parcel_geometry_skips_query() {
        let source = FakeFeatureSource::empty();
        let service = FeatureService::new(&source, OutputFormat::GeoJson);

        for parcel in [
            FeatureCollection::default(),
            collection(json!({"features": [{"geometry": null, "properties": {}}]})),
        ] {
            let intersecting =
                fetch_layer_intersection(&service, &vegetation_layer(), &parcel).unwrap();
            assert!(intersecting.is_empty());
        }
        assert!(source.calls().is_empty());
    }
}

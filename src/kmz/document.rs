use std::collections::HashMap;

use kml::{
    types::{
        AltitudeMode, Coord, Element, Folder, Geometry, LinearRing, Placemark,
        Polygon as KmlPolygon,
    },
    Kml, KmlDocument, KmlWriter,
};

use crate::{arcgis::feature::Feature, config::profiles::LayerConfig};

const XML_DECLARATION: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n";
const KML_NAMESPACE: &str = "http://www.opengis.net/kml/2.2";

/// A polygon placemark.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedPolygon {
    pub name: String,
    pub polygon: geo::Polygon<f64>,
}

/// Features of one thematic layer that intersect a parcel.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerFolder {
    pub name: String,
    pub placemarks: Vec<NamedPolygon>,
}

/// Everything exported for one lot/plan.
#[derive(Debug, Clone, PartialEq)]
pub struct ParcelFolder {
    pub lotplan: String,
    pub found: bool,
    pub placemarks: Vec<NamedPolygon>,
    pub layers: Vec<LayerFolder>,
}

impl ParcelFolder {
    pub fn new(lotplan: &str, found: bool) -> Self {
        Self {
            lotplan: lotplan.to_string(),
            found,
            placemarks: Vec::new(),
            layers: Vec::new(),
        }
    }

    pub fn folder_name(&self) -> String {
        if self.found {
            format!("Parcel {}", self.lotplan)
        } else {
            format!("Parcel {} (not found)", self.lotplan)
        }
    }
}

/// The exported folder tree: root folder, then one folder per lot/plan.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportDocument {
    pub name: String,
    pub parcels: Vec<ParcelFolder>,
}

impl Default for ExportDocument {
    fn default() -> Self {
        Self {
            name: "Export".to_string(),
            parcels: Vec::new(),
        }
    }
}

impl ExportDocument {
    /// The `<kml>` root holding one `<Document>` with the export folder tree.
    pub fn to_kml(&self) -> Kml {
        let parcel_folders = self.parcels.iter().map(parcel_folder_to_kml).collect();
        let document = Kml::Document {
            attrs: HashMap::new(),
            elements: vec![folder(&self.name, parcel_folders)],
        };
        Kml::KmlDocument(KmlDocument {
            attrs: HashMap::from([("xmlns".to_string(), KML_NAMESPACE.to_string())]),
            elements: vec![document],
            ..Default::default()
        })
    }

    /// Serialise the document as a standalone KML file.
    pub fn to_kml_string(&self) -> anyhow::Result<String> {
        let mut body: Vec<u8> = XML_DECLARATION.as_bytes().to_vec();
        KmlWriter::from_writer(&mut body).write(&self.to_kml())?;
        Ok(String::from_utf8(body)?)
    }
}

fn name_element(name: &str) -> Kml {
    Kml::Element(Element {
        name: "name".to_string(),
        attrs: HashMap::new(),
        content: Some(name.to_string()),
        children: Vec::new(),
    })
}

fn folder(name: &str, children: Vec<Kml>) -> Kml {
    let mut elements = vec![name_element(name)];
    elements.extend(children);
    Kml::Folder(Folder {
        attrs: HashMap::new(),
        elements,
        ..Default::default()
    })
}

fn parcel_folder_to_kml(parcel: &ParcelFolder) -> Kml {
    let mut children: Vec<Kml> = parcel.placemarks.iter().map(polygon_placemark).collect();
    children.extend(
        parcel
            .layers
            .iter()
            .filter(|layer| !layer.placemarks.is_empty())
            .map(|layer| {
                folder(
                    &layer.name,
                    layer.placemarks.iter().map(polygon_placemark).collect(),
                )
            }),
    );
    folder(&parcel.folder_name(), children)
}

fn linear_ring(ring: &geo::LineString<f64>) -> LinearRing {
    LinearRing {
        coords: ring
            .coords()
            .map(|coord| Coord {
                x: coord.x,
                y: coord.y,
                z: None,
            })
            .collect(),
        altitude_mode: AltitudeMode::ClampToGround,
        ..Default::default()
    }
}

/// Ground-clamped, non-extruded polygon placemark. Rings are closed by `geo::Polygon`.
fn polygon_placemark(named: &NamedPolygon) -> Kml {
    let polygon = KmlPolygon {
        outer: linear_ring(named.polygon.exterior()),
        inner: named.polygon.interiors().iter().map(linear_ring).collect(),
        extrude: false,
        tessellate: false,
        altitude_mode: AltitudeMode::ClampToGround,
        ..Default::default()
    };
    Kml::Placemark(Placemark {
        name: Some(named.name.clone()),
        geometry: Some(Geometry::Polygon(polygon)),
        ..Default::default()
    })
}

/// Label of an intersected feature: the configured name field, then the configured code field,
/// then the object id, then `default`.
pub fn feature_display_name(feature: &Feature, layer: &LayerConfig, default: &str) -> String {
    [&layer.name_field, &layer.code_field]
        .into_iter()
        .flatten()
        .find_map(|field| feature.attribute_text(field))
        .or_else(|| feature.object_id())
        .unwrap_or_else(|| default.to_string())
}

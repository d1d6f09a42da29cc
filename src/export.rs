use serde::{Deserialize, Serialize};

use crate::{
    arcgis::{
        client::{FeatureService, FeatureSource, LayerRef},
        intersect::fetch_layer_intersection,
        parcel::resolve_parcel,
    },
    config::profiles::{LayerConfig, ParcelConfig, ServiceProfile, ServiceProfiles},
    geometry::rings::feature_polygons,
    kmz::document::{
        feature_display_name, ExportDocument, LayerFolder, NamedPolygon, ParcelFolder,
    },
};

/// Body of an export request.
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
pub struct ExportRequest {
    #[serde(default)]
    pub service_profile: Option<String>,
    #[serde(default)]
    pub lotplans: Vec<String>,
}

#[derive(thiserror::Error, Debug)]
pub enum ExportError {
    #[error("Invalid request body: {0}")]
    InvalidRequest(String),
    #[error("lotplans must contain at least one lot/plan")]
    EmptyLotPlans,
    #[error("service_profile is required")]
    MissingProfileName,
    #[error("Unknown service_profile {0:?}")]
    UnknownProfile(String),
    #[error("Parcel service not configured for profile {0:?}")]
    ParcelServiceNotConfigured(String),
    #[error("Export failed: {0:#}")]
    Upstream(#[from] anyhow::Error),
}

impl ExportError {
    /// Whether the request itself is at fault, as opposed to configuration or upstream services.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ExportError::InvalidRequest(_)
                | ExportError::EmptyLotPlans
                | ExportError::MissingProfileName
                | ExportError::UnknownProfile(_)
        )
    }
}

/// A validated export, ready to run. Owns everything it needs so it can move to a worker thread.
#[derive(Debug, Clone)]
pub struct ExportPlan {
    pub profile_name: String,
    pub profile: ServiceProfile,
    pub parcel: ParcelConfig,
    pub parcel_layer: LayerRef,
    pub lotplans: Vec<String>,
}

impl ExportRequest {
    /// Check the request against the loaded profiles. Makes no network calls.
    pub fn validate(&self, profiles: &ServiceProfiles) -> Result<ExportPlan, ExportError> {
        let lotplans: Vec<String> = self
            .lotplans
            .iter()
            .map(|lotplan| lotplan.trim())
            .filter(|lotplan| !lotplan.is_empty())
            .map(str::to_string)
            .collect();
        if lotplans.is_empty() {
            return Err(ExportError::EmptyLotPlans);
        }
        let profile_name = match self.service_profile.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => return Err(ExportError::MissingProfileName),
        };
        let profile = profiles
            .get(&profile_name)
            .ok_or_else(|| ExportError::UnknownProfile(profile_name.clone()))?;
        let parcel = profile.parcel.clone().unwrap_or_default();
        let parcel_layer = parcel
            .target()
            .ok_or_else(|| ExportError::ParcelServiceNotConfigured(profile_name.clone()))?;
        Ok(ExportPlan {
            profile_name,
            profile: profile.clone(),
            parcel,
            parcel_layer,
            lotplans,
        })
    }
}

impl ExportPlan {
    /// Thematic layers that can be queried. Layers missing a service URL or layer id are skipped.
    fn queryable_layers(&self) -> Vec<(LayerConfig, LayerRef)> {
        self.profile
            .thematic_layers()
            .into_iter()
            .filter_map(|layer| match layer.target() {
                Some(target) => Some((layer, target)),
                None => {
                    log::warn!(
                        "Skipping layer {:?} of profile {}: service_url or layer_id missing",
                        layer.display_name(),
                        self.profile_name
                    );
                    None
                }
            })
            .collect()
    }

    /// Resolve every lot/plan and intersect it with every thematic layer, one query at a time.
    pub fn build_document(&self, source: &dyn FeatureSource) -> anyhow::Result<ExportDocument> {
        let service = FeatureService::new(source, self.profile.format);
        let layers = self.queryable_layers();
        let mut document = ExportDocument::default();

        for lotplan in &self.lotplans {
            let parcel = resolve_parcel(&service, &self.parcel_layer, &self.parcel, lotplan)?;
            let mut parcel_folder = ParcelFolder::new(lotplan, !parcel.is_empty());
            let parcel_name = format!("Parcel {}", lotplan);
            parcel_folder.placemarks = parcel
                .features
                .iter()
                .flat_map(feature_polygons)
                .map(|polygon| NamedPolygon {
                    name: parcel_name.clone(),
                    polygon,
                })
                .collect();
            log::info!(
                "{}: {} parcel features, {} polygons",
                lotplan,
                parcel.features.len(),
                parcel_folder.placemarks.len()
            );

            for (layer, target) in &layers {
                let layer_name = layer.display_name();
                let intersecting = fetch_layer_intersection(&service, target, &parcel)?;
                let placemarks: Vec<NamedPolygon> = intersecting
                    .features
                    .iter()
                    .flat_map(|feature| {
                        let name = feature_display_name(feature, layer, &layer_name);
                        feature_polygons(feature)
                            .into_iter()
                            .map(move |polygon| NamedPolygon {
                                name: name.clone(),
                                polygon,
                            })
                    })
                    .collect();
                log::debug!(
                    "{}: {} intersecting polygons from {}",
                    lotplan,
                    placemarks.len(),
                    layer_name
                );
                parcel_folder.layers.push(LayerFolder {
                    name: layer_name,
                    placemarks,
                });
            }
            document.parcels.push(parcel_folder);
        }
        Ok(document)
    }

    /// Run the export and package the result as KMZ bytes.
    pub fn run(&self, source: &dyn FeatureSource) -> Result<Vec<u8>, ExportError> {
        log::info!(
            "Exporting {} lot/plans with profile {}",
            self.lotplans.len(),
            self.profile_name
        );
        let document = self.build_document(source)?;
        Ok(document.to_kmz()?)
    }
}

use std::{
    collections::BTreeMap,
    fs::read_to_string,
    path::{Path, PathBuf},
};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::arcgis::client::{LayerRef, OutputFormat};

pub const DEFAULT_SERVICES_FILE: &str = "services.json";

/// Parcel (cadastre) layer of a profile and the fields used to match a lot/plan against it.
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
pub struct ParcelConfig {
    pub service_url: Option<String>,
    pub layer_id: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lotplan_field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lot_field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan_field: Option<String>,
}

impl ParcelConfig {
    /// The parcel layer to query, if both the service URL and the layer id are configured.
    pub fn target(&self) -> Option<LayerRef> {
        match (&self.service_url, self.layer_id) {
            (Some(service_url), Some(layer_id)) if !service_url.trim().is_empty() => {
                Some(LayerRef::new(service_url, layer_id))
            }
            _ => None,
        }
    }
}

/// A thematic layer intersected with every resolved parcel.
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
pub struct LayerConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub service_url: Option<String>,
    pub layer_id: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name_field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_field: Option<String>,
}

impl LayerConfig {
    pub fn target(&self) -> Option<LayerRef> {
        match (&self.service_url, self.layer_id) {
            (Some(service_url), Some(layer_id)) if !service_url.trim().is_empty() => {
                Some(LayerRef::new(service_url, layer_id))
            }
            _ => None,
        }
    }

    pub fn display_name(&self) -> String {
        match (&self.name, self.layer_id) {
            (Some(name), _) if !name.trim().is_empty() => name.clone(),
            (_, Some(layer_id)) => format!("Layer {}", layer_id),
            _ => "Layer".to_string(),
        }
    }
}

/// Named bundle of a parcel layer and the thematic layers exported alongside it.
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
pub struct ServiceProfile {
    #[serde(default)]
    pub parcel: Option<ParcelConfig>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub layers: Vec<LayerConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub landtypes: Option<LayerConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vegetation: Option<LayerConfig>,
    #[serde(default)]
    pub format: OutputFormat,
}

impl ServiceProfile {
    /// All thematic layers of the profile: the `layers` list first, then the named sections.
    /// Named sections without an explicit name are labelled after their section.
    pub fn thematic_layers(&self) -> Vec<LayerConfig> {
        let named_sections = [
            (&self.landtypes, "Land Types"),
            (&self.vegetation, "Vegetation"),
        ];
        let mut layers = self.layers.clone();
        for (section, default_name) in named_sections {
            if let Some(layer) = section {
                let mut layer = layer.clone();
                if layer
                    .name
                    .as_deref()
                    .map_or(true, |name| name.trim().is_empty())
                {
                    layer.name = Some(default_name.to_string());
                }
                layers.push(layer);
            }
        }
        layers
    }
}

/// Every profile defined in the services file, keyed by profile name.
#[derive(Serialize, Debug, Clone, Default, PartialEq)]
pub struct ServiceProfiles {
    pub profiles: BTreeMap<String, ServiceProfile>,
}

impl ServiceProfiles {
    pub fn get(&self, name: &str) -> Option<&ServiceProfile> {
        self.profiles.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.profiles.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    /// Parse the contents of a services file. Profiles that do not match the expected shape are
    /// skipped so that one bad entry does not hide the others.
    pub fn from_json_str(contents: &str) -> anyhow::Result<Self> {
        #[derive(Deserialize)]
        struct RawServicesFile {
            #[serde(default)]
            profiles: Option<BTreeMap<String, serde_json::Value>>,
        }

        let raw: RawServicesFile = serde_json::from_str(contents)?;
        let mut profiles = BTreeMap::new();
        for (name, value) in raw.profiles.unwrap_or_default() {
            match serde_json::from_value::<ServiceProfile>(value) {
                Ok(profile) => {
                    profiles.insert(name, profile);
                }
                Err(err) => log::warn!("Skipping service profile {:?}: {}", name, err),
            }
        }
        Ok(Self { profiles })
    }
}

/// Pick the services file to read: the override if it exists, the default path otherwise.
pub fn resolve_services_file(override_path: Option<&Path>, default_path: &Path) -> PathBuf {
    match override_path {
        Some(path) if path.exists() => path.to_path_buf(),
        Some(path) => {
            log::warn!(
                "Services file override {:?} does not exist, falling back to {:?}",
                path,
                default_path
            );
            default_path.to_path_buf()
        }
        None => default_path.to_path_buf(),
    }
}

fn read_profiles_file(filepath: &Path) -> anyhow::Result<ServiceProfiles> {
    let contents = read_to_string(filepath)
        .with_context(|| format!("Reading services file {:?}", filepath))?;
    ServiceProfiles::from_json_str(&contents)
        .with_context(|| format!("Parsing services file {:?}", filepath))
}

/// Load the service profiles once at startup. A missing or malformed file is not fatal and yields
/// an empty profile set.
pub fn load_profiles(override_path: Option<&Path>, default_path: &Path) -> ServiceProfiles {
    let filepath = resolve_services_file(override_path, default_path);
    match read_profiles_file(&filepath) {
        Ok(profiles) => {
            log::info!(
                "Loaded {} service profiles from {:?}",
                profiles.profiles.len(),
                filepath
            );
            profiles
        }
        Err(err) => {
            log::warn!("No service profiles loaded: {:#}", err);
            ServiceProfiles::default()
        }
    }
}

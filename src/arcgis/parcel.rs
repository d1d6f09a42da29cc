use crate::config::profiles::ParcelConfig;

use super::{
    client::{FeatureService, LayerRef, QueryParams},
    feature::FeatureCollection,
};

/// Normalise a user supplied lot/plan before matching it.
pub fn normalize_lotplan(lotplan: &str) -> String {
    lotplan.trim().to_uppercase()
}

/// Split a lot/plan such as `2RP53435` into its lot (`2`) and plan (`RP53435`) at the first
/// alphabetic character. Returns `None` when the input has no letter at all.
pub fn split_lotplan(lotplan: &str) -> Option<(String, String)> {
    let lotplan = normalize_lotplan(lotplan);
    let split_idx = lotplan
        .char_indices()
        .find(|(_, ch)| ch.is_alphabetic())
        .map(|(idx, _)| idx)?;
    let (lot, plan) = lotplan.split_at(split_idx);
    Some((lot.to_string(), plan.to_string()))
}

/// One way of looking a lot/plan up in the parcel layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParcelLookup {
    /// Match a single field holding the whole lot/plan.
    Combined { lotplan_field: String },
    /// Match separate lot and plan fields.
    Split {
        lot_field: String,
        plan_field: String,
    },
}

impl ParcelLookup {
    /// The lookups a parcel configuration allows, in the order they are tried.
    pub fn strategies(config: &ParcelConfig) -> Vec<ParcelLookup> {
        let mut strategies = Vec::new();
        if let Some(lotplan_field) = non_blank(&config.lotplan_field) {
            strategies.push(ParcelLookup::Combined {
                lotplan_field: lotplan_field.to_string(),
            });
        }
        if let (Some(lot_field), Some(plan_field)) =
            (non_blank(&config.lot_field), non_blank(&config.plan_field))
        {
            strategies.push(ParcelLookup::Split {
                lot_field: lot_field.to_string(),
                plan_field: plan_field.to_string(),
            });
        }
        strategies
    }

    /// WHERE clause for the lot/plan, or `None` when this lookup cannot apply to it.
    /// Field names are used verbatim; only the value is normalised.
    pub fn where_clause(&self, lotplan: &str) -> Option<String> {
        match self {
            ParcelLookup::Combined { lotplan_field } => Some(format!(
                "UPPER({}) = '{}'",
                lotplan_field,
                normalize_lotplan(lotplan)
            )),
            ParcelLookup::Split {
                lot_field,
                plan_field,
            } => match split_lotplan(lotplan) {
                Some((lot, plan)) if !lot.is_empty() && !plan.is_empty() => Some(format!(
                    "UPPER({}) = '{}' AND UPPER({}) = '{}'",
                    lot_field, lot, plan_field, plan
                )),
                _ => None,
            },
        }
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|value| !value.trim().is_empty())
}

/// Find the parcel features for a lot/plan. Lookups are tried in order and the first one that
/// returns features wins. A parcel that cannot be found is an empty collection, not an error.
pub fn resolve_parcel(
    service: &FeatureService,
    layer: &LayerRef,
    config: &ParcelConfig,
    lotplan: &str,
) -> anyhow::Result<FeatureCollection> {
    for lookup in ParcelLookup::strategies(config) {
        let where_clause = match lookup.where_clause(lotplan) {
            Some(where_clause) => where_clause,
            None => continue,
        };
        let params = QueryParams::from([("where".to_string(), where_clause)]);
        let feature_collection = service.query(layer, params)?;
        if !feature_collection.is_empty() {
            log::debug!(
                "Resolved {} to {} parcel features with {:?}",
                lotplan,
                feature_collection.features.len(),
                lookup
            );
            return Ok(feature_collection);
        }
    }
    Ok(FeatureCollection::default())
}

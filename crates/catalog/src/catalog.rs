//! Module/feature registry with load-time validation.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use entitle_core::{FeatureId, ModuleId};

/// A gated product module (top-level product area).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Module {
    pub id: ModuleId,
    pub name: String,
    pub description: Option<String>,
    /// Display/billing grouping (e.g. "Finance"). Never consulted by decisions.
    pub category: Option<String>,
    /// Mandatory modules ship with every tenant plan. Billing metadata only;
    /// entitlement still comes exclusively from tenant module-status records.
    #[serde(default)]
    pub mandatory: bool,
}

/// A gated feature (screen or capability) within a module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feature {
    pub id: FeatureId,
    pub module_id: ModuleId,
    pub name: String,
    pub description: Option<String>,
}

/// Catalog construction error.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CatalogError {
    #[error("duplicate module id: {0}")]
    DuplicateModule(ModuleId),

    #[error("duplicate feature id: {0}")]
    DuplicateFeature(FeatureId),

    #[error("feature '{feature}' references unknown module '{module}'")]
    UnknownModule { feature: FeatureId, module: ModuleId },
}

/// Validated, read-only registry of modules and features.
///
/// # Invariants
/// - Module and feature ids are unique.
/// - Every feature belongs to exactly one existing module.
///
/// Violations are rejected at construction, never discovered at decision time.
#[derive(Debug, Clone)]
pub struct PolicyCatalog {
    modules: Vec<Module>,
    features: Vec<Feature>,
    module_index: HashMap<ModuleId, usize>,
    feature_index: HashMap<FeatureId, usize>,
}

impl PolicyCatalog {
    pub fn new(modules: Vec<Module>, features: Vec<Feature>) -> Result<Self, CatalogError> {
        let mut module_index = HashMap::with_capacity(modules.len());
        for (i, module) in modules.iter().enumerate() {
            if module_index.insert(module.id.clone(), i).is_some() {
                return Err(CatalogError::DuplicateModule(module.id.clone()));
            }
        }

        let mut feature_index = HashMap::with_capacity(features.len());
        for (i, feature) in features.iter().enumerate() {
            if !module_index.contains_key(&feature.module_id) {
                return Err(CatalogError::UnknownModule {
                    feature: feature.id.clone(),
                    module: feature.module_id.clone(),
                });
            }
            if feature_index.insert(feature.id.clone(), i).is_some() {
                return Err(CatalogError::DuplicateFeature(feature.id.clone()));
            }
        }

        Ok(Self {
            modules,
            features,
            module_index,
            feature_index,
        })
    }

    pub fn module(&self, id: &ModuleId) -> Option<&Module> {
        self.module_index.get(id).map(|&i| &self.modules[i])
    }

    pub fn feature(&self, id: &FeatureId) -> Option<&Feature> {
        self.feature_index.get(id).map(|&i| &self.features[i])
    }

    pub fn contains_module(&self, id: &ModuleId) -> bool {
        self.module_index.contains_key(id)
    }

    pub fn contains_feature(&self, id: &FeatureId) -> bool {
        self.feature_index.contains_key(id)
    }

    /// All modules, in registration order.
    pub fn modules(&self) -> &[Module] {
        &self.modules
    }

    /// All features, in registration order.
    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    /// Features belonging to `module_id`, in registration order.
    pub fn module_features(&self, module_id: &ModuleId) -> Vec<&Feature> {
        self.features
            .iter()
            .filter(|f| &f.module_id == module_id)
            .collect()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn module(id: &'static str) -> Module {
        Module {
            id: ModuleId::new(id),
            name: id.to_string(),
            description: None,
            category: None,
            mandatory: false,
        }
    }

    fn feature(id: &'static str, module_id: &'static str) -> Feature {
        Feature {
            id: FeatureId::new(id),
            module_id: ModuleId::new(module_id),
            name: id.to_string(),
            description: None,
        }
    }

    #[test]
    fn valid_catalog_resolves_lookups() {
        let catalog = PolicyCatalog::new(
            vec![module("finance"), module("commercial")],
            vec![
                feature("transactions", "finance"),
                feature("cards", "finance"),
                feature("contacts", "commercial"),
            ],
        )
        .unwrap();

        assert!(catalog.contains_module(&ModuleId::new("finance")));
        assert!(!catalog.contains_module(&ModuleId::new("reports")));

        let f = catalog.feature(&FeatureId::new("cards")).unwrap();
        assert_eq!(f.module_id, ModuleId::new("finance"));

        let finance_features = catalog.module_features(&ModuleId::new("finance"));
        assert_eq!(finance_features.len(), 2);
        assert_eq!(finance_features[0].id, FeatureId::new("transactions"));
    }

    #[test]
    fn duplicate_module_rejected() {
        let result = PolicyCatalog::new(vec![module("finance"), module("finance")], vec![]);
        assert_eq!(
            result.unwrap_err(),
            CatalogError::DuplicateModule(ModuleId::new("finance"))
        );
    }

    #[test]
    fn duplicate_feature_rejected() {
        let result = PolicyCatalog::new(
            vec![module("finance")],
            vec![
                feature("transactions", "finance"),
                feature("transactions", "finance"),
            ],
        );
        assert_eq!(
            result.unwrap_err(),
            CatalogError::DuplicateFeature(FeatureId::new("transactions"))
        );
    }

    #[test]
    fn feature_with_unknown_module_rejected() {
        let result = PolicyCatalog::new(vec![module("finance")], vec![feature("contacts", "commercial")]);
        assert_eq!(
            result.unwrap_err(),
            CatalogError::UnknownModule {
                feature: FeatureId::new("contacts"),
                module: ModuleId::new("commercial"),
            }
        );
    }
}

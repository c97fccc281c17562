use std::collections::{HashMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// A physical packaging code owned by a catalog product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackagingUnit {
    pub packaging_id: String,
    pub product_id: i64,
}

/// One `parent -> child` edge of a bill of materials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BomEdge {
    pub parent_packaging_id: String,
    pub child_packaging_id: String,
    pub quantity: i32,
}

/// Everything the resolver needs from the catalog store, read in one pass.
#[derive(Debug, Clone, Default)]
pub struct CatalogSnapshot {
    pub packagings: Vec<PackagingUnit>,
    pub bom_edges: Vec<BomEdge>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedProduct {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub packagings: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedBomChild {
    pub packaging: String,
    pub quantity: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedBomEdge {
    pub parent: String,
    pub children: Vec<SeedBomChild>,
}

/// Development catalog fixture (`config/catalog.yaml`).
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogFile {
    pub products: Vec<SeedProduct>,
    #[serde(default)]
    pub bom: Vec<SeedBomEdge>,
}

impl CatalogFile {
    /// Flatten the fixture into the same shape the store returns.
    #[must_use]
    pub fn to_snapshot(&self) -> CatalogSnapshot {
        let packagings = self
            .products
            .iter()
            .flat_map(|p| {
                p.packagings.iter().map(move |code| PackagingUnit {
                    packaging_id: code.clone(),
                    product_id: p.id,
                })
            })
            .collect();

        let bom_edges = self
            .bom
            .iter()
            .flat_map(|edge| {
                edge.children.iter().map(move |child| BomEdge {
                    parent_packaging_id: edge.parent.clone(),
                    child_packaging_id: child.packaging.clone(),
                    quantity: child.quantity,
                })
            })
            .collect();

        CatalogSnapshot {
            packagings,
            bom_edges,
        }
    }
}

/// Load and validate a catalog fixture from a YAML file.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read, parsed, or fails validation.
pub fn load_catalog_file(path: &Path) -> Result<CatalogFile, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::CatalogFileIo {
        path: path.display().to_string(),
        source: e,
    })?;

    let catalog: CatalogFile =
        serde_yaml::from_str(&content).map_err(ConfigError::CatalogFileParse)?;

    validate_catalog(&catalog)?;

    Ok(catalog)
}

fn validate_catalog(catalog: &CatalogFile) -> Result<(), ConfigError> {
    let mut seen_ids = HashSet::new();
    let mut owners: HashMap<&str, i64> = HashMap::new();

    for product in &catalog.products {
        if product.name.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "product {} has an empty name",
                product.id
            )));
        }
        if !seen_ids.insert(product.id) {
            return Err(ConfigError::Validation(format!(
                "duplicate product id: {}",
                product.id
            )));
        }
        for code in &product.packagings {
            if let Some(other) = owners.insert(code.as_str(), product.id) {
                return Err(ConfigError::Validation(format!(
                    "packaging '{code}' is claimed by products {other} and {}",
                    product.id
                )));
            }
        }
    }

    for edge in &catalog.bom {
        if !owners.contains_key(edge.parent.as_str()) {
            return Err(ConfigError::Validation(format!(
                "BOM parent '{}' is not a known packaging",
                edge.parent
            )));
        }
        if edge.children.is_empty() {
            return Err(ConfigError::Validation(format!(
                "BOM parent '{}' has no children",
                edge.parent
            )));
        }
        for child in &edge.children {
            if child.packaging == edge.parent {
                return Err(ConfigError::Validation(format!(
                    "BOM parent '{}' lists itself as a child",
                    edge.parent
                )));
            }
            if !owners.contains_key(child.packaging.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "BOM child '{}' of '{}' is not a known packaging",
                    child.packaging, edge.parent
                )));
            }
            if child.quantity <= 0 {
                return Err(ConfigError::Validation(format!(
                    "BOM child '{}' of '{}' has non-positive quantity {}",
                    child.packaging, edge.parent, child.quantity
                )));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
#[path = "catalog_test.rs"]
mod tests;

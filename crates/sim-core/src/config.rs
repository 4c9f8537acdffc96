//! Scenario loading and validation.
//!
//! A scenario file (JSON or YAML) describes the catalog, suppliers, opening
//! inventory and simulation parameters. It is read once at startup and turned
//! into an immutable [`InitialState`].

use crate::catalog::{Catalog, Product, Supplier, SupplierTable, SupplyTerms};
use crate::{Day, ProductId, SupplierId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::info;

/// Validation and loading errors for scenario data.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("failed to read scenario {path}: {message}")]
    Io { path: String, message: String },
    #[error("failed to parse scenario: {0}")]
    Parse(String),
    #[error("unsupported scenario format: {0}")]
    UnsupportedFormat(String),
    #[error("duplicate product id {0}")]
    DuplicateProduct(ProductId),
    #[error("duplicate supplier id {0}")]
    DuplicateSupplier(SupplierId),
    #[error("raw product {0} must not define a BOM")]
    RawProductWithBom(ProductId),
    #[error("BOM of product {product} references unknown material {material}")]
    UnknownMaterial {
        product: ProductId,
        material: ProductId,
    },
    #[error("BOM of product {product} references non-raw product {material}")]
    MaterialNotRaw {
        product: ProductId,
        material: ProductId,
    },
    #[error("BOM of product {product} has zero quantity for material {material}")]
    ZeroBomQuantity {
        product: ProductId,
        material: ProductId,
    },
    #[error("supplier {supplier} offers unknown product {product}")]
    UnknownSuppliedProduct {
        supplier: SupplierId,
        product: ProductId,
    },
    #[error("supplier {supplier} offers non-raw product {product}")]
    SuppliedProductNotRaw {
        supplier: SupplierId,
        product: ProductId,
    },
    #[error("supplier {supplier} has a negative unit cost for product {product}")]
    NegativeCost {
        supplier: SupplierId,
        product: ProductId,
    },
    #[error("initial inventory references unknown product {0}")]
    UnknownInventoryProduct(ProductId),
    #[error("production capacity per day must be > 0")]
    ZeroCapacity,
    #[error("demand parameters must be finite with mean >= 0 and variance >= 0")]
    InvalidDemand,
}

/// Tunable parameters of a run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimParams {
    /// Mean daily demand per finished product.
    pub demand_mean: f64,
    /// Variance of daily demand per finished product.
    pub demand_variance: f64,
    /// Maximum concurrent production attempts holding capacity.
    pub production_capacity_per_day: u32,
    /// Seed for the deterministic RNG.
    pub rng_seed: u64,
}

impl Default for SimParams {
    fn default() -> Self {
        Self {
            demand_mean: DEFAULT_DEMAND_MEAN,
            demand_variance: DEFAULT_DEMAND_VARIANCE,
            production_capacity_per_day: 1,
            rng_seed: DEFAULT_RNG_SEED,
        }
    }
}

impl SimParams {
    /// Validate parameter ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.production_capacity_per_day == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        let finite = self.demand_mean.is_finite() && self.demand_variance.is_finite();
        if !finite || self.demand_mean < 0.0 || self.demand_variance < 0.0 {
            return Err(ConfigError::InvalidDemand);
        }
        Ok(())
    }
}

const DEFAULT_DEMAND_MEAN: f64 = 5.0;
const DEFAULT_DEMAND_VARIANCE: f64 = 2.0;
const DEFAULT_RNG_SEED: u64 = 42;

fn default_demand_mean() -> f64 {
    DEFAULT_DEMAND_MEAN
}

fn default_demand_variance() -> f64 {
    DEFAULT_DEMAND_VARIANCE
}

fn default_rng_seed() -> u64 {
    DEFAULT_RNG_SEED
}

fn default_capacity() -> u32 {
    1
}

/// `simulation_parameters` block of a scenario file.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ParamsSection {
    #[serde(default = "default_demand_mean")]
    pub demand_mean: f64,
    #[serde(default = "default_demand_variance")]
    pub demand_variance: f64,
    #[serde(default = "default_rng_seed")]
    pub rng_seed: u64,
}

impl Default for ParamsSection {
    fn default() -> Self {
        Self {
            demand_mean: DEFAULT_DEMAND_MEAN,
            demand_variance: DEFAULT_DEMAND_VARIANCE,
            rng_seed: DEFAULT_RNG_SEED,
        }
    }
}

/// Supplier entry; `supply_details` maps product id to `[unit_cost, lead_time]`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SupplierEntry {
    pub id: SupplierId,
    pub name: String,
    #[serde(default)]
    pub supply_details: BTreeMap<ProductId, (Decimal, Day)>,
}

/// Opening stock for one product.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InventoryEntry {
    pub product_id: ProductId,
    pub quantity: u64,
}

/// Raw scenario file contents, before validation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScenarioConfig {
    #[serde(default)]
    pub products: Vec<Product>,
    #[serde(default)]
    pub suppliers: Vec<SupplierEntry>,
    #[serde(default)]
    pub initial_inventory: Vec<InventoryEntry>,
    #[serde(default)]
    pub simulation_parameters: ParamsSection,
    #[serde(default = "default_capacity")]
    pub production_capacity_per_day: u32,
}

/// Validated, immutable startup snapshot consumed by the runtime.
#[derive(Clone, Debug)]
pub struct InitialState {
    pub catalog: Catalog,
    pub suppliers: SupplierTable,
    /// Opening level for every catalog product (0 when unlisted).
    pub inventory: BTreeMap<ProductId, u64>,
    pub params: SimParams,
}

impl ScenarioConfig {
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(s).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn from_yaml_str(s: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(s).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Validate the scenario and build the startup snapshot.
    pub fn build(self) -> Result<InitialState, ConfigError> {
        let catalog = Catalog::new(self.products)?;

        let suppliers = self
            .suppliers
            .into_iter()
            .map(|s| Supplier {
                id: s.id,
                name: s.name,
                supply: s
                    .supply_details
                    .into_iter()
                    .map(|(product, (unit_cost, lead_time_days))| {
                        (
                            product,
                            SupplyTerms {
                                unit_cost,
                                lead_time_days,
                            },
                        )
                    })
                    .collect(),
            })
            .collect();
        let suppliers = SupplierTable::new(suppliers, &catalog)?;

        let mut inventory: BTreeMap<ProductId, u64> =
            catalog.iter().map(|p| (p.id, 0)).collect();
        for entry in self.initial_inventory {
            let level = inventory
                .get_mut(&entry.product_id)
                .ok_or(ConfigError::UnknownInventoryProduct(entry.product_id))?;
            *level = entry.quantity;
        }

        let params = SimParams {
            demand_mean: self.simulation_parameters.demand_mean,
            demand_variance: self.simulation_parameters.demand_variance,
            production_capacity_per_day: self.production_capacity_per_day,
            rng_seed: self.simulation_parameters.rng_seed,
        };
        params.validate()?;

        Ok(InitialState {
            catalog,
            suppliers,
            inventory,
            params,
        })
    }
}

/// Read a scenario file. The format is picked from the extension
/// (`.json`, `.yaml` or `.yml`).
pub fn load_scenario<P: AsRef<Path>>(path: P) -> Result<InitialState, ConfigError> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|e| ConfigError::Io {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    let cfg = match ext.as_str() {
        "json" => ScenarioConfig::from_json_str(&text)?,
        "yaml" | "yml" => ScenarioConfig::from_yaml_str(&text)?,
        other => return Err(ConfigError::UnsupportedFormat(other.to_string())),
    };
    let state = cfg.build()?;
    info!(
        path = %path.display(),
        products = state.catalog.len(),
        suppliers = state.suppliers.len(),
        "scenario loaded"
    );
    Ok(state)
}

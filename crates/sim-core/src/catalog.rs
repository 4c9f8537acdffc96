//! Product catalog, bills of materials and supplier terms.
//!
//! Both tables are built once from a validated scenario and are immutable
//! afterwards; every component looks products and suppliers up by id.

use crate::config::ConfigError;
use crate::{Day, ProductId, SupplierId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

/// Kinds of products handled by the plant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductKind {
    /// Purchased from suppliers and consumed by production.
    Raw,
    /// Manufactured from raw materials according to a BOM.
    Finished,
}

/// One line of a bill of materials.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BomItem {
    /// Raw material consumed.
    pub material_id: ProductId,
    /// Units of material per unit of finished product (> 0).
    pub quantity: u64,
}

/// A raw material or finished product.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ProductKind,
    /// Only finished products carry a BOM.
    #[serde(default)]
    pub bom: Option<Vec<BomItem>>,
}

impl Product {
    pub fn is_raw(&self) -> bool {
        self.kind == ProductKind::Raw
    }

    pub fn is_finished(&self) -> bool {
        self.kind == ProductKind::Finished
    }

    /// The BOM of a finished product. An empty BOM counts as missing.
    pub fn bom(&self) -> Option<&[BomItem]> {
        match (self.kind, self.bom.as_deref()) {
            (ProductKind::Finished, Some(items)) if !items.is_empty() => Some(items),
            _ => None,
        }
    }
}

/// Material consumed per material id for `units` of a BOM. Repeated lines
/// for the same material add up.
pub fn bom_totals(bom: &[BomItem], units: u64) -> BTreeMap<ProductId, u64> {
    let mut totals: BTreeMap<ProductId, u64> = BTreeMap::new();
    for item in bom {
        let slot = totals.entry(item.material_id).or_insert(0);
        *slot = slot.saturating_add(item.quantity.saturating_mul(units));
    }
    totals
}

/// Price and delivery terms a supplier offers for one raw material.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplyTerms {
    /// Cost per unit (>= 0).
    pub unit_cost: Decimal,
    /// Days between emission and delivery.
    pub lead_time_days: Day,
}

/// A supplier and the raw materials it sells.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Supplier {
    pub id: SupplierId,
    pub name: String,
    pub supply: BTreeMap<ProductId, SupplyTerms>,
}

impl Supplier {
    /// Terms for `product`, or `None` when this supplier does not sell it.
    pub fn terms_for(&self, product: ProductId) -> Option<SupplyTerms> {
        self.supply.get(&product).copied()
    }
}

/// One supplier's offer for a given product.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplierOffer {
    pub supplier_id: SupplierId,
    pub unit_cost: Decimal,
    pub lead_time_days: Day,
}

/// Immutable product table keyed by id.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Catalog {
    products: BTreeMap<ProductId, Product>,
}

impl Catalog {
    /// Build and validate a catalog.
    pub fn new(products: Vec<Product>) -> Result<Self, ConfigError> {
        let mut map = BTreeMap::new();
        for p in products {
            match map.entry(p.id) {
                Entry::Occupied(_) => return Err(ConfigError::DuplicateProduct(p.id)),
                Entry::Vacant(v) => {
                    v.insert(p);
                }
            }
        }
        let catalog = Self { products: map };
        for p in catalog.products.values() {
            catalog.validate_product(p)?;
        }
        Ok(catalog)
    }

    fn validate_product(&self, p: &Product) -> Result<(), ConfigError> {
        match p.kind {
            ProductKind::Raw => {
                if p.bom.as_ref().is_some_and(|b| !b.is_empty()) {
                    return Err(ConfigError::RawProductWithBom(p.id));
                }
            }
            ProductKind::Finished => {
                let Some(items) = p.bom() else {
                    tracing::warn!(product = %p.id, name = %p.name, "finished product has no BOM");
                    return Ok(());
                };
                for item in items {
                    let material = self.get(item.material_id).ok_or(
                        ConfigError::UnknownMaterial {
                            product: p.id,
                            material: item.material_id,
                        },
                    )?;
                    if !material.is_raw() {
                        return Err(ConfigError::MaterialNotRaw {
                            product: p.id,
                            material: item.material_id,
                        });
                    }
                    if item.quantity == 0 {
                        return Err(ConfigError::ZeroBomQuantity {
                            product: p.id,
                            material: item.material_id,
                        });
                    }
                }
            }
        }
        Ok(())
    }

    pub fn get(&self, id: ProductId) -> Option<&Product> {
        self.products.get(&id)
    }

    /// BOM for a finished product; `None` for raw, unknown or BOM-less products.
    pub fn bom(&self, id: ProductId) -> Option<&[BomItem]> {
        self.get(id).and_then(Product::bom)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Product> {
        self.products.values()
    }

    pub fn finished(&self) -> impl Iterator<Item = &Product> {
        self.iter().filter(|p| p.is_finished())
    }

    pub fn raw_materials(&self) -> impl Iterator<Item = &Product> {
        self.iter().filter(|p| p.is_raw())
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }
}

/// Immutable supplier table keyed by id.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SupplierTable {
    suppliers: BTreeMap<SupplierId, Supplier>,
}

impl SupplierTable {
    /// Build and validate the table against `catalog`.
    pub fn new(suppliers: Vec<Supplier>, catalog: &Catalog) -> Result<Self, ConfigError> {
        let mut map = BTreeMap::new();
        for s in suppliers {
            for (product, terms) in &s.supply {
                let p = catalog
                    .get(*product)
                    .ok_or(ConfigError::UnknownSuppliedProduct {
                        supplier: s.id,
                        product: *product,
                    })?;
                if !p.is_raw() {
                    return Err(ConfigError::SuppliedProductNotRaw {
                        supplier: s.id,
                        product: *product,
                    });
                }
                if terms.unit_cost < Decimal::ZERO {
                    return Err(ConfigError::NegativeCost {
                        supplier: s.id,
                        product: *product,
                    });
                }
            }
            match map.entry(s.id) {
                Entry::Occupied(_) => return Err(ConfigError::DuplicateSupplier(s.id)),
                Entry::Vacant(v) => {
                    v.insert(s);
                }
            }
        }
        Ok(Self { suppliers: map })
    }

    pub fn get(&self, id: SupplierId) -> Option<&Supplier> {
        self.suppliers.get(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Supplier> {
        self.suppliers.values()
    }

    /// Every supplier selling `product`, in supplier id order.
    pub fn offers_for(&self, product: ProductId) -> Vec<SupplierOffer> {
        self.suppliers
            .values()
            .filter_map(|s| {
                s.terms_for(product).map(|t| SupplierOffer {
                    supplier_id: s.id,
                    unit_cost: t.unit_cost,
                    lead_time_days: t.lead_time_days,
                })
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.suppliers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.suppliers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(id: u32, name: &str) -> Product {
        Product {
            id: ProductId(id),
            name: name.to_string(),
            kind: ProductKind::Raw,
            bom: None,
        }
    }

    fn finished(id: u32, bom: Vec<(u32, u64)>) -> Product {
        Product {
            id: ProductId(id),
            name: format!("F{id}"),
            kind: ProductKind::Finished,
            bom: Some(
                bom.into_iter()
                    .map(|(m, q)| BomItem {
                        material_id: ProductId(m),
                        quantity: q,
                    })
                    .collect(),
            ),
        }
    }

    fn supplier(id: u32, terms: Vec<(u32, i64, Day)>) -> Supplier {
        Supplier {
            id: SupplierId(id),
            name: format!("S{id}"),
            supply: terms
                .into_iter()
                .map(|(p, cents, lead)| {
                    (
                        ProductId(p),
                        SupplyTerms {
                            unit_cost: Decimal::new(cents, 2),
                            lead_time_days: lead,
                        },
                    )
                })
                .collect(),
        }
    }

    #[test]
    fn bom_lookup_only_for_finished() {
        let c = Catalog::new(vec![raw(1, "steel"), finished(10, vec![(1, 2)])]).unwrap();
        assert_eq!(c.bom(ProductId(10)).unwrap().len(), 1);
        assert!(c.bom(ProductId(1)).is_none());
        assert!(c.bom(ProductId(99)).is_none());
        assert_eq!(c.finished().count(), 1);
        assert_eq!(c.raw_materials().count(), 1);
    }

    #[test]
    fn empty_bom_counts_as_missing() {
        let mut p = finished(10, vec![]);
        p.bom = Some(vec![]);
        let c = Catalog::new(vec![p]).unwrap();
        assert!(c.bom(ProductId(10)).is_none());
    }

    #[test]
    fn rejects_duplicates_and_bad_materials() {
        assert_eq!(
            Catalog::new(vec![raw(1, "a"), raw(1, "b")]).unwrap_err(),
            ConfigError::DuplicateProduct(ProductId(1))
        );
        assert_eq!(
            Catalog::new(vec![finished(10, vec![(2, 1)])]).unwrap_err(),
            ConfigError::UnknownMaterial {
                product: ProductId(10),
                material: ProductId(2)
            }
        );
        assert_eq!(
            Catalog::new(vec![finished(10, vec![(11, 1)]), finished(11, vec![])]).unwrap_err(),
            ConfigError::MaterialNotRaw {
                product: ProductId(10),
                material: ProductId(11)
            }
        );
        assert!(matches!(
            Catalog::new(vec![raw(1, "a"), finished(10, vec![(1, 0)])]),
            Err(ConfigError::ZeroBomQuantity { .. })
        ));
        let mut r = raw(1, "a");
        r.bom = Some(vec![BomItem {
            material_id: ProductId(1),
            quantity: 1,
        }]);
        assert_eq!(
            Catalog::new(vec![r]).unwrap_err(),
            ConfigError::RawProductWithBom(ProductId(1))
        );
    }

    #[test]
    fn supplier_table_validates_against_catalog() {
        let c = Catalog::new(vec![raw(1, "steel"), finished(10, vec![(1, 2)])]).unwrap();
        assert!(SupplierTable::new(vec![supplier(201, vec![(1, 150, 2)])], &c).is_ok());
        assert!(matches!(
            SupplierTable::new(vec![supplier(201, vec![(10, 150, 2)])], &c),
            Err(ConfigError::SuppliedProductNotRaw { .. })
        ));
        assert!(matches!(
            SupplierTable::new(vec![supplier(201, vec![(5, 150, 2)])], &c),
            Err(ConfigError::UnknownSuppliedProduct { .. })
        ));
        assert!(matches!(
            SupplierTable::new(vec![supplier(201, vec![(1, -1, 2)])], &c),
            Err(ConfigError::NegativeCost { .. })
        ));
        assert_eq!(
            SupplierTable::new(vec![supplier(201, vec![]), supplier(201, vec![])], &c)
                .unwrap_err(),
            ConfigError::DuplicateSupplier(SupplierId(201))
        );
    }

    #[test]
    fn offers_list_every_seller() {
        let c = Catalog::new(vec![raw(1, "steel"), raw(2, "glue")]).unwrap();
        let t = SupplierTable::new(
            vec![
                supplier(201, vec![(1, 150, 2)]),
                supplier(202, vec![(1, 120, 5), (2, 10, 1)]),
            ],
            &c,
        )
        .unwrap();
        let offers = t.offers_for(ProductId(1));
        assert_eq!(offers.len(), 2);
        assert_eq!(offers[0].supplier_id, SupplierId(201));
        assert_eq!(offers[1].lead_time_days, 5);
        assert_eq!(t.offers_for(ProductId(2)).len(), 1);
        assert!(t.offers_for(ProductId(3)).is_empty());
    }
}

#![deny(warnings)]

//! Demand and material economics for the production simulator.
//!
//! This crate provides validated utilities for:
//! - Daily demand draws from a normal distribution, clamped and rounded
//! - Aggregate material needs and shortages over open production orders
//! - Per-order material requirement breakdowns
//! - Purchase valuation in exact decimal arithmetic

use rand::Rng;
use rand_distr::{Distribution, Normal};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sim_core::{Catalog, InventoryLedger, ProductId, ProductionOrder, SupplyTerms};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::debug;

/// Errors produced by economic helpers.
#[derive(Debug, Error, PartialEq)]
pub enum EconError {
    /// Mean and variance must be finite and non-negative.
    #[error("invalid demand parameters: mean {mean}, variance {variance}")]
    InvalidDemand { mean: f64, variance: f64 },
}

/// Normal demand distribution for one finished product per day.
#[derive(Clone, Copy, Debug)]
pub struct DemandModel {
    dist: Normal<f64>,
}

impl DemandModel {
    /// Build from mean and variance (the standard deviation is its square root).
    ///
    /// Example:
    /// let m = DemandModel::new(5.0, 2.0).unwrap();
    pub fn new(mean: f64, variance: f64) -> Result<Self, EconError> {
        let invalid = EconError::InvalidDemand { mean, variance };
        if !(mean.is_finite() && variance.is_finite()) || mean < 0.0 || variance < 0.0 {
            return Err(invalid);
        }
        let dist = Normal::new(mean, variance.sqrt()).map_err(|_| invalid)?;
        debug!(mean, variance, "demand model ready");
        Ok(Self { dist })
    }

    pub fn mean(&self) -> f64 {
        self.dist.mean()
    }

    /// Draw one day's demand quantity. Negative draws clamp to 0.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> u64 {
        quantize_demand(self.dist.sample(rng))
    }
}

/// Clamp a raw draw at zero and round to the nearest integer.
///
/// Example:
/// assert_eq!(quantize_demand(-1.3), 0);
/// assert_eq!(quantize_demand(2.6), 3);
pub fn quantize_demand(draw: f64) -> u64 {
    if !draw.is_finite() || draw <= 0.0 {
        return 0;
    }
    let q = draw.round();
    if q >= u64::MAX as f64 {
        return u64::MAX;
    }
    q as u64
}

/// Total material required by every non-terminal order in `orders`.
///
/// Orders without a BOM contribute nothing.
pub fn material_needs<'a, I>(orders: I, catalog: &Catalog) -> BTreeMap<ProductId, u64>
where
    I: IntoIterator<Item = &'a ProductionOrder>,
{
    let mut needs: BTreeMap<ProductId, u64> = BTreeMap::new();
    for order in orders {
        if order.status().is_terminal() {
            continue;
        }
        let Some(bom) = catalog.bom(order.product_id) else {
            continue;
        };
        for item in bom {
            let needed = item.quantity.saturating_mul(order.quantity);
            let slot = needs.entry(item.material_id).or_insert(0);
            *slot = slot.saturating_add(needed);
        }
    }
    needs
}

/// Materials whose aggregate need exceeds stock, with the positive shortfall.
///
/// Pure: neither the orders nor the ledger are touched.
pub fn calculate_shortages<'a, I>(
    orders: I,
    catalog: &Catalog,
    inventory: &InventoryLedger,
) -> BTreeMap<ProductId, u64>
where
    I: IntoIterator<Item = &'a ProductionOrder>,
{
    material_needs(orders, catalog)
        .into_iter()
        .filter_map(|(material, needed)| {
            let shortfall = needed.saturating_sub(inventory.level(material));
            (shortfall > 0).then_some((material, shortfall))
        })
        .collect()
}

/// One BOM line of an order, sized against current stock.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterialRequirement {
    pub material_id: ProductId,
    pub per_unit: u64,
    pub total_needed: u64,
    pub on_hand: u64,
    /// Missing units considering this order alone.
    pub shortfall: u64,
}

/// BOM breakdown for a single order; empty when the product has no BOM.
pub fn order_requirements(
    order: &ProductionOrder,
    catalog: &Catalog,
    inventory: &InventoryLedger,
) -> Vec<MaterialRequirement> {
    catalog
        .bom(order.product_id)
        .unwrap_or_default()
        .iter()
        .map(|item| {
            let total_needed = item.quantity.saturating_mul(order.quantity);
            let on_hand = inventory.level(item.material_id);
            MaterialRequirement {
                material_id: item.material_id,
                per_unit: item.quantity,
                total_needed,
                on_hand,
                shortfall: total_needed.saturating_sub(on_hand),
            }
        })
        .collect()
}

/// Value of a purchase: unit cost times quantity, saturating at `Decimal::MAX`.
///
/// Example:
/// let t = SupplyTerms { unit_cost: Decimal::new(125, 2), lead_time_days: 2 };
/// assert_eq!(purchase_cost(&t, 4), Decimal::new(500, 2));
pub fn purchase_cost(terms: &SupplyTerms, quantity: u64) -> Decimal {
    terms
        .unit_cost
        .checked_mul(Decimal::from(quantity))
        .unwrap_or(Decimal::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use sim_core::{BomItem, EventLog, OrderId, Product, ProductKind};

    fn catalog() -> Catalog {
        Catalog::new(vec![
            Product {
                id: ProductId(101),
                name: "kit".into(),
                kind: ProductKind::Raw,
                bom: None,
            },
            Product {
                id: ProductId(102),
                name: "frame".into(),
                kind: ProductKind::Raw,
                bom: None,
            },
            Product {
                id: ProductId(1),
                name: "printer".into(),
                kind: ProductKind::Finished,
                bom: Some(vec![
                    BomItem {
                        material_id: ProductId(101),
                        quantity: 2,
                    },
                    BomItem {
                        material_id: ProductId(102),
                        quantity: 1,
                    },
                ]),
            },
            Product {
                id: ProductId(2),
                name: "bare".into(),
                kind: ProductKind::Finished,
                bom: None,
            },
        ])
        .unwrap()
    }

    fn inventory(kit: u64, frame: u64) -> InventoryLedger {
        InventoryLedger::new(
            [(ProductId(101), kit), (ProductId(102), frame)]
                .into_iter()
                .collect(),
        )
    }

    fn order(id: u64, product: u32, qty: u64) -> ProductionOrder {
        ProductionOrder::new(OrderId(id), 0, ProductId(product), qty)
    }

    #[test]
    fn quantize_clamps_and_rounds() {
        assert_eq!(quantize_demand(-4.2), 0);
        assert_eq!(quantize_demand(0.4), 0);
        assert_eq!(quantize_demand(0.6), 1);
        assert_eq!(quantize_demand(2.6), 3);
        assert_eq!(quantize_demand(f64::NAN), 0);
    }

    #[test]
    fn demand_rejects_bad_params() {
        assert!(DemandModel::new(-1.0, 1.0).is_err());
        assert!(DemandModel::new(1.0, -1.0).is_err());
        assert!(DemandModel::new(f64::INFINITY, 1.0).is_err());
        assert!(DemandModel::new(5.0, 0.0).is_ok());
    }

    #[test]
    fn zero_variance_is_deterministic() {
        let m = DemandModel::new(3.0, 0.0).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        for _ in 0..20 {
            assert_eq!(m.sample(&mut rng), 3);
        }
        assert_eq!(m.mean(), 3.0);
    }

    #[test]
    fn demand_is_seeded() {
        let m = DemandModel::new(5.0, 2.0).unwrap();
        let mut a = ChaCha8Rng::seed_from_u64(42);
        let mut b = ChaCha8Rng::seed_from_u64(42);
        let xs: Vec<u64> = (0..10).map(|_| m.sample(&mut a)).collect();
        let ys: Vec<u64> = (0..10).map(|_| m.sample(&mut b)).collect();
        assert_eq!(xs, ys);
    }

    #[test]
    fn needs_skip_terminal_and_bomless_orders() {
        let c = catalog();
        let mut done = order(3, 1, 100);
        done.release().unwrap();
        done.start().unwrap();
        done.complete().unwrap();
        let orders = vec![order(1, 1, 3), order(2, 1, 1), done, order(4, 2, 9)];
        let needs = material_needs(&orders, &c);
        assert_eq!(needs[&ProductId(101)], 8);
        assert_eq!(needs[&ProductId(102)], 4);
        assert_eq!(needs.len(), 2);
    }

    #[test]
    fn shortages_keep_only_positive() {
        let c = catalog();
        let orders = vec![order(1, 1, 3)];
        let s = calculate_shortages(&orders, &c, &inventory(2, 10));
        assert_eq!(s.len(), 1);
        assert_eq!(s[&ProductId(101)], 4);
    }

    #[test]
    fn shortages_do_not_mutate_inventory() {
        let c = catalog();
        let inv = inventory(0, 0);
        let orders = vec![order(1, 1, 2)];
        let before = inv.clone();
        let a = calculate_shortages(&orders, &c, &inv);
        let b = calculate_shortages(&orders, &c, &inv);
        assert_eq!(a, b);
        assert_eq!(inv, before);
    }

    #[test]
    fn order_breakdown_per_line() {
        let c = catalog();
        let mut inv = inventory(5, 0);
        let mut log = EventLog::new();
        inv.add(ProductId(102), 1, 0, &mut log);
        let req = order_requirements(&order(1, 1, 3), &c, &inv);
        assert_eq!(req.len(), 2);
        assert_eq!(req[0].total_needed, 6);
        assert_eq!(req[0].on_hand, 5);
        assert_eq!(req[0].shortfall, 1);
        assert_eq!(req[1].shortfall, 2);
        assert!(order_requirements(&order(2, 2, 3), &c, &inv).is_empty());
    }

    #[test]
    fn purchase_cost_is_exact() {
        let t = SupplyTerms {
            unit_cost: Decimal::new(125, 2),
            lead_time_days: 2,
        };
        assert_eq!(purchase_cost(&t, 4), Decimal::new(500, 2));
        assert_eq!(purchase_cost(&t, 0), Decimal::ZERO);
    }

    proptest! {
        #[test]
        fn draws_stay_near_the_mean(mean in 0.0f64..50.0, var in 0.0f64..100.0, seed in any::<u64>()) {
            let m = DemandModel::new(mean, var).unwrap();
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let q = m.sample(&mut rng);
            prop_assert!(q <= (mean + 20.0 * var.sqrt() + 1.0) as u64);
        }

        #[test]
        fn shortage_never_exceeds_need(qty in 1u64..100, kit in 0u64..500, frame in 0u64..500) {
            let c = catalog();
            let orders = vec![order(1, 1, qty)];
            let inv = inventory(kit, frame);
            let needs = material_needs(&orders, &c);
            let s = calculate_shortages(&orders, &c, &inv);
            for (m, short) in &s {
                prop_assert!(*short > 0);
                prop_assert!(*short <= needs[m]);
                prop_assert_eq!(*short + inv.level(*m), needs[m]);
            }
            prop_assert_eq!(s, calculate_shortages(&orders, &c, &inv));
        }
    }
}

#![deny(warnings)]

//! Headless decision policy for the plant.
//!
//! Each day the policy releases pending orders and covers material shortages
//! not already on order, buying from the supplier with the best weighted
//! utility over lead time and cost.

use rust_decimal::prelude::ToPrimitive;
use serde::Serialize;
use sim_core::{
    OrderId, ProductId, ProductionOrder, PurchaseOrder, SupplierId, SupplierOffer, SupplyTerms,
};
use sim_runtime::{OrderError, PurchaseRequestError, SimulationEnvironment};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{debug, info};

/// Weighted sum of normalized speed and thrift; higher is better.
pub fn utility(speed: f64, thrift: f64, weights: Weights) -> f64 {
    (speed * weights.lead_time) + (thrift * weights.cost)
}

/// Relative importance of delivery speed vs purchase cost.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Weights {
    pub lead_time: f64,
    pub cost: f64,
}

impl Default for Weights {
    fn default() -> Self {
        Self {
            lead_time: 0.7,
            cost: 0.3,
        }
    }
}

/// One action to apply to the environment.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Decision {
    Release {
        order: OrderId,
    },
    Purchase {
        supplier: SupplierId,
        product: ProductId,
        quantity: u64,
    },
}

#[derive(Debug, Error)]
pub enum ApplyError {
    #[error(transparent)]
    Order(#[from] OrderError),
    #[error(transparent)]
    Purchase(#[from] PurchaseRequestError),
}

/// Release-everything, buy-what-is-missing policy.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Policy {
    pub weights: Weights,
    /// Extra units bought on top of each uncovered shortfall.
    pub reorder_buffer: u64,
    /// Cap on releases per day; `None` releases every pending order.
    pub max_releases_per_day: Option<usize>,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            weights: Weights::default(),
            reorder_buffer: 0,
            max_releases_per_day: None,
        }
    }
}

impl Policy {
    /// Best offer for buying `quantity` units, or `None` if nobody sells it.
    /// Ties keep the earlier offer.
    pub fn choose_offer(&self, offers: &[SupplierOffer], quantity: u64) -> Option<SupplierOffer> {
        let mut best: Option<(SupplierOffer, f64)> = None;
        for offer in offers {
            let score = self.score(offer, quantity);
            if best.map_or(true, |(_, s)| score > s) {
                best = Some((*offer, score));
            }
        }
        best.map(|(offer, _)| offer)
    }

    fn score(&self, offer: &SupplierOffer, quantity: u64) -> f64 {
        let terms = SupplyTerms {
            unit_cost: offer.unit_cost,
            lead_time_days: offer.lead_time_days,
        };
        let cost = sim_econ::purchase_cost(&terms, quantity)
            .to_f64()
            .unwrap_or(f64::MAX);
        let speed = 1.0 / (1.0 + f64::from(offer.lead_time_days));
        let thrift = 1.0 / (1.0 + cost.max(0.0));
        utility(speed, thrift, self.weights)
    }

    /// Oldest pending orders first.
    pub fn plan_releases<'a, I>(&self, pending: I) -> Vec<Decision>
    where
        I: IntoIterator<Item = &'a ProductionOrder>,
    {
        let mut ids: Vec<OrderId> = pending.into_iter().map(|o| o.id).collect();
        ids.sort_unstable();
        if let Some(max) = self.max_releases_per_day {
            ids.truncate(max);
        }
        ids.into_iter()
            .map(|order| Decision::Release { order })
            .collect()
    }

    /// One purchase per material whose shortfall exceeds what is already
    /// incoming. Materials nobody sells are skipped.
    pub fn plan_purchases<F>(
        &self,
        shortages: &BTreeMap<ProductId, u64>,
        incoming: &BTreeMap<ProductId, u64>,
        offers_for: F,
    ) -> Vec<Decision>
    where
        F: Fn(ProductId) -> Vec<SupplierOffer>,
    {
        let mut plan = Vec::new();
        for (&product, &shortfall) in shortages {
            let on_order = incoming.get(&product).copied().unwrap_or(0);
            let uncovered = shortfall.saturating_sub(on_order);
            if uncovered == 0 {
                continue;
            }
            let quantity = uncovered.saturating_add(self.reorder_buffer);
            let Some(offer) = self.choose_offer(&offers_for(product), quantity) else {
                debug!(product = %product, uncovered, "no supplier sells material");
                continue;
            };
            plan.push(Decision::Purchase {
                supplier: offer.supplier_id,
                product,
                quantity,
            });
        }
        plan
    }

    /// Today's decisions for `env`, releases first.
    pub fn decide(&self, env: &SimulationEnvironment) -> Vec<Decision> {
        let mut plan = self.plan_releases(env.pending_orders());
        let incoming = incoming_by_product(env.open_purchase_orders());
        let shortages = env.open_shortages();
        plan.extend(self.plan_purchases(&shortages, &incoming, |p| {
            env.get_supplier_offers(p)
        }));
        debug!(day = env.current_day(), decisions = plan.len(), "policy decided");
        plan
    }
}

/// Units still to arrive per material.
pub fn incoming_by_product<'a, I>(open: I) -> BTreeMap<ProductId, u64>
where
    I: IntoIterator<Item = &'a PurchaseOrder>,
{
    let mut incoming = BTreeMap::new();
    for po in open {
        let slot = incoming.entry(po.product_id).or_insert(0u64);
        *slot = slot.saturating_add(po.quantity);
    }
    incoming
}

/// Apply decisions in order, stopping at the first rejection.
pub fn apply(env: &mut SimulationEnvironment, decisions: &[Decision]) -> Result<(), ApplyError> {
    for decision in decisions {
        match *decision {
            Decision::Release { order } => env.release_order(order)?,
            Decision::Purchase {
                supplier,
                product,
                quantity,
            } => {
                let po = env.create_purchase_order(supplier, product, quantity)?;
                info!(po = %po, supplier = %supplier, product = %product, quantity, "policy purchase");
            }
        }
    }
    Ok(())
}

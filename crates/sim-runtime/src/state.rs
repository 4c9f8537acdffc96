//! Mutable plant state shared by every process.

use crate::capacity::CapacityPool;
use crate::scheduler::SimTime;
use rand_chacha::ChaCha8Rng;
use sim_core::{
    Catalog, Day, EventKind, EventLog, InventoryLedger, OrderId, ProductId, ProductionOrder,
    PurchaseOrder, PurchaseOrderId, SupplierTable,
};
use sim_econ::DemandModel;
use std::collections::BTreeSet;

/// Calendar day containing instant `t`.
pub(crate) fn day_of(t: SimTime) -> Day {
    if t <= 0.0 {
        return 0;
    }
    t.floor() as Day
}

/// Everything the processes read and mutate. Only the kernel-driven processes
/// and the environment's synchronous entry points touch it, one at a time.
#[derive(Debug)]
pub struct PlantState {
    pub(crate) catalog: Catalog,
    pub(crate) suppliers: SupplierTable,
    pub(crate) inventory: InventoryLedger,
    pub(crate) log: EventLog,
    pub(crate) production_orders: Vec<ProductionOrder>,
    pub(crate) purchase_orders: Vec<PurchaseOrder>,
    pub(crate) capacity: CapacityPool,
    pub(crate) demand: DemandModel,
    pub(crate) rng: ChaCha8Rng,
    /// Orders with a production attempt alive in the kernel.
    pub(crate) attempts_in_flight: BTreeSet<OrderId>,
    next_order_id: u64,
    next_purchase_id: u64,
}

impl PlantState {
    pub fn new(
        catalog: Catalog,
        suppliers: SupplierTable,
        inventory: InventoryLedger,
        capacity: CapacityPool,
        demand: DemandModel,
        rng: ChaCha8Rng,
    ) -> Self {
        Self {
            catalog,
            suppliers,
            inventory,
            log: EventLog::new(),
            production_orders: Vec::new(),
            purchase_orders: Vec::new(),
            capacity,
            demand,
            rng,
            attempts_in_flight: BTreeSet::new(),
            next_order_id: 1,
            next_purchase_id: 1,
        }
    }

    /// Append a new pending order and return its id.
    pub fn push_order(&mut self, day: Day, product: ProductId, quantity: u64) -> OrderId {
        let id = OrderId(self.next_order_id);
        self.next_order_id += 1;
        self.production_orders
            .push(ProductionOrder::new(id, day, product, quantity));
        id
    }

    pub fn push_purchase(
        &mut self,
        make: impl FnOnce(PurchaseOrderId) -> PurchaseOrder,
    ) -> PurchaseOrderId {
        let id = PurchaseOrderId(self.next_purchase_id);
        self.next_purchase_id += 1;
        self.purchase_orders.push(make(id));
        id
    }

    // Ids are assigned in push order, so both lists stay sorted by id.
    pub fn order(&self, id: OrderId) -> Option<&ProductionOrder> {
        let idx = self
            .production_orders
            .binary_search_by_key(&id, |o| o.id)
            .ok()?;
        self.production_orders.get(idx)
    }

    pub fn order_mut(&mut self, id: OrderId) -> Option<&mut ProductionOrder> {
        let idx = self
            .production_orders
            .binary_search_by_key(&id, |o| o.id)
            .ok()?;
        self.production_orders.get_mut(idx)
    }

    pub fn purchase(&self, id: PurchaseOrderId) -> Option<&PurchaseOrder> {
        let idx = self
            .purchase_orders
            .binary_search_by_key(&id, |o| o.id)
            .ok()?;
        self.purchase_orders.get(idx)
    }

    pub fn purchase_mut(&mut self, id: PurchaseOrderId) -> Option<&mut PurchaseOrder> {
        let idx = self
            .purchase_orders
            .binary_search_by_key(&id, |o| o.id)
            .ok()?;
        self.purchase_orders.get_mut(idx)
    }

    pub fn record(&mut self, day: Day, kind: EventKind) {
        self.log.append(day, kind);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn day_of_floors_fractional_time() {
        assert_eq!(day_of(0.0), 0);
        assert_eq!(day_of(3.001), 3);
        assert_eq!(day_of(3.999), 3);
        assert_eq!(day_of(-1.0), 0);
    }
}

#![deny(warnings)]

//! Discrete-event runtime for the plant simulation.
//!
//! [`SimulationEnvironment`] owns the process kernel and the mutable plant
//! state. It advances one simulated day per [`SimulationEnvironment::run_day`]
//! and exposes the synchronous operations a decision-maker calls between days.

pub mod capacity;
pub mod scheduler;

mod process;
mod state;

pub use process::PRODUCTION_DELAY;
pub use scheduler::SimTime;

use capacity::CapacityPool;
use process::{cancel_for_missing_bom, DemandGenerator, ProductionAttempt, PurchaseTracker, SimProcess};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rust_decimal::Decimal;
use scheduler::Scheduler;
use serde::Serialize;
use sim_core::{
    BomItem, Day, Event, EventKind, EventLog, InitialState, InventoryLedger, OrderId, Product,
    ProductId, ProductionOrder, ProductionStatus, PurchaseOrder, PurchaseOrderId, PurchaseStatus,
    StatusError, Supplier, SupplierId, SupplierOffer,
};
use sim_econ::{DemandModel, EconError, MaterialRequirement};
use state::PlantState;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{debug, info};

/// Failure to assemble an environment from a validated scenario.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error(transparent)]
    Demand(#[from] EconError),
}

/// Rejected operation on a production order.
#[derive(Debug, Error, PartialEq)]
pub enum OrderError {
    #[error("production order {0} not found")]
    NotFound(OrderId),
    #[error("production order {id}: {source}")]
    Transition {
        id: OrderId,
        #[source]
        source: StatusError,
    },
    #[error("product {0} is not a finished product")]
    NotFinished(ProductId),
    #[error("order quantity must be > 0")]
    ZeroQuantity,
}

/// Rejected purchase order request. Nothing is created or logged.
#[derive(Debug, Error, PartialEq)]
pub enum PurchaseRequestError {
    #[error("unknown supplier {0}")]
    UnknownSupplier(SupplierId),
    #[error("unknown product {0}")]
    UnknownProduct(ProductId),
    #[error("product {0} is not a raw material")]
    NotRawMaterial(ProductId),
    #[error("supplier {supplier} does not sell product {product}")]
    NotSold {
        supplier: SupplierId,
        product: ProductId,
    },
    #[error("purchase quantity must be > 0")]
    ZeroQuantity,
}

/// Point-in-time KPIs.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SimSnapshot {
    pub day: Day,
    pub pending: usize,
    pub released: usize,
    pub in_progress: usize,
    pub completed: usize,
    pub cancelled: usize,
    /// Finished units credited by completed orders.
    pub units_produced: u64,
    pub inventory_units: u64,
    pub open_purchases: usize,
    /// Committed value of every purchase order that was not cancelled.
    pub purchase_spend: Decimal,
}

/// The plant: kernel, processes and state, advanced day by day.
#[derive(Debug)]
pub struct SimulationEnvironment {
    scheduler: Scheduler<SimProcess>,
    state: PlantState,
    current_day: Day,
}

impl SimulationEnvironment {
    /// Build the environment and start the demand generator at day 0.
    pub fn new(initial: InitialState) -> Result<Self, SetupError> {
        let params = initial.params;
        let demand = DemandModel::new(params.demand_mean, params.demand_variance)?;
        let state = PlantState::new(
            initial.catalog,
            initial.suppliers,
            InventoryLedger::new(initial.inventory),
            CapacityPool::new(params.production_capacity_per_day),
            demand,
            ChaCha8Rng::seed_from_u64(params.rng_seed),
        );
        let mut scheduler = Scheduler::new(0.0);
        scheduler.spawn(SimProcess::Demand(DemandGenerator));
        info!(
            seed = params.rng_seed,
            capacity = params.production_capacity_per_day,
            demand_mean = params.demand_mean,
            "simulation environment ready"
        );
        Ok(Self {
            scheduler,
            state,
            current_day: 0,
        })
    }

    /// Day the next [`run_day`](Self::run_day) will simulate.
    pub fn current_day(&self) -> Day {
        self.current_day
    }

    pub fn now(&self) -> SimTime {
        self.scheduler.now()
    }

    /// Launch eligible production, then process every event due before the
    /// start of the next day.
    pub fn run_day(&mut self) {
        let day = self.current_day;
        let started = self.check_and_start_production();
        let resumed = self
            .scheduler
            .advance_until(SimTime::from(day) + 1.0, &mut self.state);
        self.current_day += 1;
        info!(
            day,
            started,
            resumed,
            events = self.state.log.len(),
            "day simulated"
        );
    }

    pub fn run_days(&mut self, days: u32) {
        for _ in 0..days {
            self.run_day();
        }
    }

    /// Spawn one production attempt per released order whose materials are
    /// covered right now. Returns the number of attempts spawned.
    ///
    /// The check does not reserve stock; attempts re-validate once they hold
    /// capacity.
    pub fn check_and_start_production(&mut self) -> usize {
        let day = self.current_day;
        let candidates: Vec<(OrderId, ProductId, u64)> = self
            .state
            .production_orders
            .iter()
            .filter(|o| o.status() == ProductionStatus::Released)
            .filter(|o| !self.state.attempts_in_flight.contains(&o.id))
            .map(|o| (o.id, o.product_id, o.quantity))
            .collect();

        let mut started = 0;
        for (id, product, quantity) in candidates {
            let Some(bom) = self.state.catalog.bom(product) else {
                cancel_for_missing_bom(&mut self.state, id, day);
                continue;
            };
            if !self.state.inventory.covers_bom(bom, quantity) {
                debug!(day, order = %id, "materials short; order stays released");
                continue;
            }
            let pid = self
                .scheduler
                .spawn(SimProcess::Production(ProductionAttempt::new(id)));
            self.state.attempts_in_flight.insert(id);
            debug!(day, order = %id, pid, "production attempt spawned");
            started += 1;
        }
        started
    }

    /// Enter a pending order directly.
    pub fn create_production_order(
        &mut self,
        product: ProductId,
        quantity: u64,
    ) -> Result<OrderId, OrderError> {
        if quantity == 0 {
            return Err(OrderError::ZeroQuantity);
        }
        if !self
            .state
            .catalog
            .get(product)
            .is_some_and(Product::is_finished)
        {
            return Err(OrderError::NotFinished(product));
        }
        let day = self.current_day;
        let order_id = self.state.push_order(day, product, quantity);
        self.state.record(
            day,
            EventKind::OrderCreated {
                order_id,
                product_id: product,
                quantity,
            },
        );
        info!(day, order = %order_id, product = %product, quantity, "production order created");
        Ok(order_id)
    }

    /// Move a pending order to `Released`.
    pub fn release_order(&mut self, id: OrderId) -> Result<(), OrderError> {
        let order = self.state.order_mut(id).ok_or(OrderError::NotFound(id))?;
        order
            .release()
            .map_err(|source| OrderError::Transition { id, source })?;
        let day = self.current_day;
        self.state
            .record(day, EventKind::OrderReleased { order_id: id });
        info!(day, order = %id, "order released");
        Ok(())
    }

    /// Cancel a pending or released order. An attempt already waiting for
    /// capacity exits without touching stock.
    pub fn cancel_order(&mut self, id: OrderId) -> Result<(), OrderError> {
        let order = self.state.order_mut(id).ok_or(OrderError::NotFound(id))?;
        order
            .cancel()
            .map_err(|source| OrderError::Transition { id, source })?;
        let day = self.current_day;
        self.state
            .record(day, EventKind::OrderCancelled { order_id: id });
        info!(day, order = %id, "order cancelled");
        Ok(())
    }

    /// Issue a purchase order dated today and start tracking it.
    pub fn create_purchase_order(
        &mut self,
        supplier: SupplierId,
        product: ProductId,
        quantity: u64,
    ) -> Result<PurchaseOrderId, PurchaseRequestError> {
        if quantity == 0 {
            return Err(PurchaseRequestError::ZeroQuantity);
        }
        let seller = self
            .state
            .suppliers
            .get(supplier)
            .ok_or(PurchaseRequestError::UnknownSupplier(supplier))?;
        let item = self
            .state
            .catalog
            .get(product)
            .ok_or(PurchaseRequestError::UnknownProduct(product))?;
        if !item.is_raw() {
            return Err(PurchaseRequestError::NotRawMaterial(product));
        }
        let terms = seller
            .terms_for(product)
            .ok_or(PurchaseRequestError::NotSold { supplier, product })?;

        let day = self.current_day;
        let total_cost = sim_econ::purchase_cost(&terms, quantity);
        let po_id = self.state.push_purchase(|id| {
            PurchaseOrder::new(id, supplier, product, quantity, day, total_cost)
        });
        self.state.record(
            day,
            EventKind::PurchaseOrderCreated {
                po_id,
                supplier_id: supplier,
                product_id: product,
                quantity,
            },
        );
        self.scheduler
            .spawn(SimProcess::Purchase(PurchaseTracker::new(po_id)));
        info!(
            day,
            po = %po_id,
            supplier = %supplier,
            product = %product,
            quantity,
            cost = %total_cost,
            "purchase order issued"
        );
        Ok(po_id)
    }

    /// Positive shortfall per material for the given orders against current stock.
    pub fn calculate_shortages<'a, I>(&self, orders: I) -> BTreeMap<ProductId, u64>
    where
        I: IntoIterator<Item = &'a ProductionOrder>,
    {
        sim_econ::calculate_shortages(orders, &self.state.catalog, &self.state.inventory)
    }

    /// Aggregate material need of the given orders, ignoring stock.
    pub fn calculate_total_material_needs<'a, I>(&self, orders: I) -> BTreeMap<ProductId, u64>
    where
        I: IntoIterator<Item = &'a ProductionOrder>,
    {
        sim_econ::material_needs(orders, &self.state.catalog)
    }

    /// Shortages across every order still open.
    pub fn open_shortages(&self) -> BTreeMap<ProductId, u64> {
        self.calculate_shortages(&self.state.production_orders)
    }

    pub fn order_material_requirements(&self, id: OrderId) -> Option<Vec<MaterialRequirement>> {
        let order = self.state.order(id)?;
        Some(sim_econ::order_requirements(
            order,
            &self.state.catalog,
            &self.state.inventory,
        ))
    }

    pub fn get_product(&self, id: ProductId) -> Option<&Product> {
        self.state.catalog.get(id)
    }

    pub fn get_supplier(&self, id: SupplierId) -> Option<&Supplier> {
        self.state.suppliers.get(id)
    }

    pub fn get_bom(&self, product: ProductId) -> Option<&[BomItem]> {
        self.state.catalog.bom(product)
    }

    /// Every supplier selling `product`, in supplier id order.
    pub fn get_supplier_offers(&self, product: ProductId) -> Vec<SupplierOffer> {
        self.state.suppliers.offers_for(product)
    }

    pub fn products(&self) -> impl Iterator<Item = &Product> {
        self.state.catalog.iter()
    }

    pub fn inventory(&self) -> &InventoryLedger {
        &self.state.inventory
    }

    pub fn production_orders(&self) -> &[ProductionOrder] {
        &self.state.production_orders
    }

    pub fn purchase_orders(&self) -> &[PurchaseOrder] {
        &self.state.purchase_orders
    }

    pub fn production_order(&self, id: OrderId) -> Option<&ProductionOrder> {
        self.state.order(id)
    }

    pub fn purchase_order(&self, id: PurchaseOrderId) -> Option<&PurchaseOrder> {
        self.state.purchase(id)
    }

    pub fn pending_orders(&self) -> impl Iterator<Item = &ProductionOrder> {
        self.orders_with(|s| s == ProductionStatus::Pending)
    }

    /// Released or in-progress orders.
    pub fn active_orders(&self) -> impl Iterator<Item = &ProductionOrder> {
        self.orders_with(|s| {
            matches!(s, ProductionStatus::Released | ProductionStatus::InProgress)
        })
    }

    pub fn open_purchase_orders(&self) -> impl Iterator<Item = &PurchaseOrder> {
        self.state
            .purchase_orders
            .iter()
            .filter(|po| !po.status().is_terminal())
    }

    fn orders_with(
        &self,
        keep: impl Fn(ProductionStatus) -> bool,
    ) -> impl Iterator<Item = &ProductionOrder> {
        self.state
            .production_orders
            .iter()
            .filter(move |o| keep(o.status()))
    }

    pub fn events(&self) -> &[Event] {
        self.state.log.events()
    }

    pub fn event_log(&self) -> &EventLog {
        &self.state.log
    }

    pub fn capacity_in_use(&self) -> usize {
        self.state.capacity.in_use()
    }

    /// Most attempts ever holding capacity at the same instant.
    pub fn capacity_peak(&self) -> usize {
        self.state.capacity.peak_in_use()
    }

    pub fn snapshot(&self) -> SimSnapshot {
        let mut snap = SimSnapshot {
            day: self.current_day,
            pending: 0,
            released: 0,
            in_progress: 0,
            completed: 0,
            cancelled: 0,
            units_produced: 0,
            inventory_units: self.state.inventory.total_units(),
            open_purchases: 0,
            purchase_spend: Decimal::ZERO,
        };
        for order in &self.state.production_orders {
            match order.status() {
                ProductionStatus::Pending => snap.pending += 1,
                ProductionStatus::Released => snap.released += 1,
                ProductionStatus::InProgress => snap.in_progress += 1,
                ProductionStatus::Completed => {
                    snap.completed += 1;
                    snap.units_produced = snap.units_produced.saturating_add(order.quantity);
                }
                ProductionStatus::Cancelled => snap.cancelled += 1,
            }
        }
        for po in &self.state.purchase_orders {
            if po.status() == PurchaseStatus::Cancelled {
                continue;
            }
            if !po.status().is_terminal() {
                snap.open_purchases += 1;
            }
            snap.purchase_spend += po.total_cost;
        }
        snap
    }
}

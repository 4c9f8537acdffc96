//! The three process kinds driven by the kernel.
//!
//! Each process is a small state machine; its phase records where it will
//! pick up on the next resumption.

use crate::capacity::Grant;
use crate::scheduler::{Kernel, Process, ProcessId, SimTime, Step};
use crate::state::{day_of, PlantState};
use sim_core::{
    bom_totals, Day, EventKind, HaltReason, InventoryError, OrderId, ProductId, ProductionStatus,
    PurchaseOrderId,
};
use std::collections::BTreeMap;
use tracing::{debug, error, info, warn};

/// Symbolic delay between consuming materials and crediting output. Holds
/// chained on one capacity unit add up, so more than about a thousand
/// sequential attempts in a day spill past the day boundary.
pub const PRODUCTION_DELAY: SimTime = 0.001;

/// Every process the plant runs.
#[derive(Debug)]
pub enum SimProcess {
    Demand(DemandGenerator),
    Production(ProductionAttempt),
    Purchase(PurchaseTracker),
}

impl Process<PlantState> for SimProcess {
    fn resume(&mut self, pid: ProcessId, st: &mut PlantState, kernel: &mut Kernel) -> Step {
        match self {
            SimProcess::Demand(p) => p.resume(pid, st, kernel),
            SimProcess::Production(p) => p.resume(pid, st, kernel),
            SimProcess::Purchase(p) => p.resume(pid, st, kernel),
        }
    }
}

/// Draws demand for every finished product once per day, forever.
#[derive(Debug, Default)]
pub struct DemandGenerator;

impl Process<PlantState> for DemandGenerator {
    fn resume(&mut self, _pid: ProcessId, st: &mut PlantState, kernel: &mut Kernel) -> Step {
        let day = day_of(kernel.now());
        let finished: Vec<ProductId> = st.catalog.finished().map(|p| p.id).collect();
        for product in finished {
            let quantity = st.demand.sample(&mut st.rng);
            if quantity == 0 {
                continue;
            }
            let order_id = st.push_order(day, product, quantity);
            debug!(day, order = %order_id, product = %product, quantity, "demand generated");
            st.record(
                day,
                EventKind::DemandGenerated {
                    order_id,
                    product_id: product,
                    quantity,
                },
            );
        }
        Step::Timeout(1.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AttemptPhase {
    Requesting,
    AwaitingCapacity,
    Producing { product: ProductId, quantity: u64 },
}

/// One try at manufacturing a released order under capacity ownership.
#[derive(Debug)]
pub struct ProductionAttempt {
    order_id: OrderId,
    phase: AttemptPhase,
}

impl ProductionAttempt {
    pub fn new(order_id: OrderId) -> Self {
        Self {
            order_id,
            phase: AttemptPhase::Requesting,
        }
    }

    fn advance(&mut self, pid: ProcessId, st: &mut PlantState, day: Day) -> Step {
        match self.phase {
            AttemptPhase::Requesting => match st.capacity.request(pid) {
                Grant::Granted => self.on_capacity(st, day),
                Grant::Queued => {
                    debug!(day, order = %self.order_id, "waiting for capacity");
                    self.phase = AttemptPhase::AwaitingCapacity;
                    Step::Wait
                }
            },
            AttemptPhase::AwaitingCapacity => self.on_capacity(st, day),
            AttemptPhase::Producing { product, quantity } => {
                self.finish(st, day, product, quantity)
            }
        }
    }

    /// Capacity is held: re-validate materials, then consume or back off.
    fn on_capacity(&mut self, st: &mut PlantState, day: Day) -> Step {
        let id = self.order_id;
        let Some(order) = st.order(id) else {
            warn!(order = %id, "production attempt for unknown order");
            return Step::Done;
        };
        if order.status() != ProductionStatus::Released {
            debug!(order = %id, status = %order.status(), "order no longer released; attempt exits");
            return Step::Done;
        }
        let (product, quantity) = (order.product_id, order.quantity);
        let Some(needs) = st.catalog.bom(product).map(|bom| bom_totals(bom, quantity)) else {
            cancel_for_missing_bom(st, id, day);
            return Step::Done;
        };

        if !st.inventory.covers(&needs) {
            info!(day, order = %id, "materials no longer available after capacity wait");
            if let Some(order) = st.order_mut(id) {
                if let Err(e) = order.requeue() {
                    warn!(order = %id, error = %e, "requeue rejected");
                }
            }
            st.record(
                day,
                EventKind::ProductionHalted {
                    order_id: id,
                    reason: HaltReason::MaterialsUnavailableAfterWait,
                },
            );
            return Step::Done;
        }

        // Materials confirmed: the status change and every debit happen here,
        // under capacity ownership, with no suspension in between.
        if let Some(order) = st.order_mut(id) {
            if let Err(e) = order.start() {
                warn!(order = %id, error = %e, "start rejected");
                return Step::Done;
            }
        }
        info!(day, order = %id, product = %product, quantity, "production started");
        st.record(day, EventKind::ProductionStarted { order_id: id });
        if !consume_materials(st, id, &needs, day) {
            return Step::Done;
        }
        self.phase = AttemptPhase::Producing { product, quantity };
        Step::Timeout(PRODUCTION_DELAY)
    }

    fn finish(&mut self, st: &mut PlantState, day: Day, product: ProductId, quantity: u64) -> Step {
        let id = self.order_id;
        st.inventory.add(product, quantity, day, &mut st.log);
        if let Some(order) = st.order_mut(id) {
            if let Err(e) = order.complete() {
                warn!(order = %id, error = %e, "completion rejected");
            }
        }
        info!(day, order = %id, "production completed");
        st.record(
            day,
            EventKind::ProductionCompleted {
                order_id: id,
                product_id: product,
                quantity,
            },
        );
        Step::Done
    }
}

impl Process<PlantState> for ProductionAttempt {
    fn resume(&mut self, pid: ProcessId, st: &mut PlantState, kernel: &mut Kernel) -> Step {
        let day = day_of(kernel.now());
        let step = self.advance(pid, st, day);
        if step == Step::Done {
            // Every exit path gives capacity back and hands it to the next waiter.
            st.attempts_in_flight.remove(&self.order_id);
            if let Some(next) = st.capacity.release(pid) {
                kernel.wake(next);
            }
        }
        step
    }
}

/// Debit every material of a started order. If stock cannot cover the whole
/// set, nothing is debited, the order goes back to `released` and an
/// `invariant_violation` is recorded.
fn consume_materials(
    st: &mut PlantState,
    id: OrderId,
    needs: &BTreeMap<ProductId, u64>,
    day: Day,
) -> bool {
    let Err(e) = st.inventory.remove_all(needs, day, &mut st.log) else {
        return true;
    };
    error!(order = %id, error = %e, "stock removal failed after double-check");
    if let Some(order) = st.order_mut(id) {
        if let Err(e) = order.requeue() {
            warn!(order = %id, error = %e, "requeue rejected");
        }
    }
    let InventoryError::Insufficient {
        product,
        requested,
        available,
    } = e;
    st.record(
        day,
        EventKind::InvariantViolation {
            product_id: product,
            requested,
            available,
        },
    );
    false
}

/// Cancel an order whose product has no BOM and log `production_error`.
pub(crate) fn cancel_for_missing_bom(st: &mut PlantState, id: OrderId, day: Day) {
    error!(day, order = %id, "no BOM for ordered product; cancelling");
    if let Some(order) = st.order_mut(id) {
        if let Err(e) = order.cancel() {
            warn!(order = %id, error = %e, "cancel rejected");
        }
    }
    st.record(
        day,
        EventKind::ProductionError {
            order_id: id,
            reason: "no BOM".to_string(),
        },
    );
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TrackerPhase {
    Dispatching,
    InTransit,
}

/// Follows a purchase order from emission to delivery.
#[derive(Debug)]
pub struct PurchaseTracker {
    po_id: PurchaseOrderId,
    phase: TrackerPhase,
}

impl PurchaseTracker {
    pub fn new(po_id: PurchaseOrderId) -> Self {
        Self {
            po_id,
            phase: TrackerPhase::Dispatching,
        }
    }

    fn dispatch(&mut self, st: &mut PlantState, day: Day) -> Step {
        let id = self.po_id;
        let Some(po) = st.purchase(id) else {
            warn!(po = %id, "tracker for unknown purchase order");
            return Step::Done;
        };
        let terms = st
            .suppliers
            .get(po.supplier_id)
            .and_then(|s| s.terms_for(po.product_id));
        let Some(terms) = terms else {
            error!(day, po = %id, "invalid supplier or product details; cancelling");
            if let Some(po) = st.purchase_mut(id) {
                if let Err(e) = po.cancel() {
                    warn!(po = %id, error = %e, "cancel rejected");
                }
            }
            st.record(
                day,
                EventKind::PurchaseError {
                    po_id: id,
                    reason: "invalid supplier/product details".to_string(),
                },
            );
            return Step::Done;
        };
        let Some(po) = st.purchase_mut(id) else {
            return Step::Done;
        };
        if let Err(e) = po.dispatch(terms.lead_time_days) {
            warn!(po = %id, error = %e, "dispatch rejected");
            return Step::Done;
        }
        info!(
            day,
            po = %id,
            product = %po.product_id,
            eta = ?po.estimated_delivery_day,
            "purchase order in transit"
        );
        self.phase = TrackerPhase::InTransit;
        Step::Timeout(SimTime::from(terms.lead_time_days))
    }

    fn arrive(&mut self, st: &mut PlantState, day: Day) -> Step {
        let id = self.po_id;
        let Some(po) = st.purchase_mut(id) else {
            return Step::Done;
        };
        if let Err(e) = po.receive(day) {
            warn!(po = %id, error = %e, "receive rejected");
            return Step::Done;
        }
        let (product, quantity) = (po.product_id, po.quantity);
        st.inventory.add(product, quantity, day, &mut st.log);
        info!(day, po = %id, product = %product, quantity, "purchase order received");
        st.record(
            day,
            EventKind::PurchaseReceived {
                po_id: id,
                product_id: product,
                quantity,
            },
        );
        Step::Done
    }
}

impl Process<PlantState> for PurchaseTracker {
    fn resume(&mut self, _pid: ProcessId, st: &mut PlantState, kernel: &mut Kernel) -> Step {
        let day = day_of(kernel.now());
        match self.phase {
            TrackerPhase::Dispatching => self.dispatch(st, day),
            TrackerPhase::InTransit => self.arrive(st, day),
        }
    }
}

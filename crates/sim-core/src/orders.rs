//! Production and purchase orders with closed status machines.
//!
//! Status fields are private; every change goes through a named transition
//! that rejects moves the lifecycle does not allow.

use crate::{Day, OrderId, ProductId, PurchaseOrderId, SupplierId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Lifecycle of a production order.
///
/// `Pending -> Released -> InProgress -> Completed`, with `InProgress ->
/// Released` (and `Released -> Released`) as the recovery edge when
/// materials vanish during a capacity wait. `Completed` and `Cancelled` are
/// terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductionStatus {
    Pending,
    Released,
    InProgress,
    Completed,
    Cancelled,
}

impl ProductionStatus {
    pub fn is_terminal(self) -> bool {
        match self {
            ProductionStatus::Completed | ProductionStatus::Cancelled => true,
            ProductionStatus::Pending
            | ProductionStatus::Released
            | ProductionStatus::InProgress => false,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ProductionStatus::Pending => "pending",
            ProductionStatus::Released => "released",
            ProductionStatus::InProgress => "in_progress",
            ProductionStatus::Completed => "completed",
            ProductionStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for ProductionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of a purchase order: `Issued -> InTransit -> Received`, or
/// `Issued -> Cancelled`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PurchaseStatus {
    Issued,
    InTransit,
    Received,
    Cancelled,
}

impl PurchaseStatus {
    pub fn is_terminal(self) -> bool {
        match self {
            PurchaseStatus::Received | PurchaseStatus::Cancelled => true,
            PurchaseStatus::Issued | PurchaseStatus::InTransit => false,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PurchaseStatus::Issued => "issued",
            PurchaseStatus::InTransit => "in_transit",
            PurchaseStatus::Received => "received",
            PurchaseStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for PurchaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An order transition that the lifecycle does not allow.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("illegal {entity} transition from {from} to {to}")]
pub struct StatusError {
    pub entity: &'static str,
    pub from: &'static str,
    pub to: &'static str,
}

/// A request to manufacture `quantity` units of a finished product.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductionOrder {
    pub id: OrderId,
    pub creation_day: Day,
    pub product_id: ProductId,
    /// Units to produce (> 0).
    pub quantity: u64,
    status: ProductionStatus,
}

impl ProductionOrder {
    /// A new order in `Pending` status.
    pub fn new(id: OrderId, creation_day: Day, product_id: ProductId, quantity: u64) -> Self {
        Self {
            id,
            creation_day,
            product_id,
            quantity,
            status: ProductionStatus::Pending,
        }
    }

    pub fn status(&self) -> ProductionStatus {
        self.status
    }

    fn set(&mut self, allowed: bool, to: ProductionStatus) -> Result<(), StatusError> {
        if !allowed {
            return Err(StatusError {
                entity: "production order",
                from: self.status.as_str(),
                to: to.as_str(),
            });
        }
        self.status = to;
        Ok(())
    }

    /// `Pending -> Released`.
    pub fn release(&mut self) -> Result<(), StatusError> {
        let ok = matches!(self.status, ProductionStatus::Pending);
        self.set(ok, ProductionStatus::Released)
    }

    /// `Released -> InProgress`, once capacity is held and materials confirmed.
    pub fn start(&mut self) -> Result<(), StatusError> {
        let ok = matches!(self.status, ProductionStatus::Released);
        self.set(ok, ProductionStatus::InProgress)
    }

    /// `InProgress -> Completed`.
    pub fn complete(&mut self) -> Result<(), StatusError> {
        let ok = matches!(self.status, ProductionStatus::InProgress);
        self.set(ok, ProductionStatus::Completed)
    }

    /// Recovery edge back to `Released` after an aborted attempt.
    pub fn requeue(&mut self) -> Result<(), StatusError> {
        let ok = matches!(
            self.status,
            ProductionStatus::Released | ProductionStatus::InProgress
        );
        self.set(ok, ProductionStatus::Released)
    }

    /// `Pending | Released -> Cancelled`.
    pub fn cancel(&mut self) -> Result<(), StatusError> {
        let ok = matches!(
            self.status,
            ProductionStatus::Pending | ProductionStatus::Released
        );
        self.set(ok, ProductionStatus::Cancelled)
    }
}

/// A replenishment order placed with a supplier.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseOrder {
    pub id: PurchaseOrderId,
    pub supplier_id: SupplierId,
    pub product_id: ProductId,
    /// Units ordered (> 0).
    pub quantity: u64,
    pub emission_day: Day,
    /// Emission day plus lead time, set once the tracker resolves terms.
    pub estimated_delivery_day: Option<Day>,
    /// Set on arrival.
    pub actual_delivery_day: Option<Day>,
    /// Unit cost times quantity at emission.
    pub total_cost: Decimal,
    status: PurchaseStatus,
}

impl PurchaseOrder {
    /// A new order in `Issued` status.
    pub fn new(
        id: PurchaseOrderId,
        supplier_id: SupplierId,
        product_id: ProductId,
        quantity: u64,
        emission_day: Day,
        total_cost: Decimal,
    ) -> Self {
        Self {
            id,
            supplier_id,
            product_id,
            quantity,
            emission_day,
            estimated_delivery_day: None,
            actual_delivery_day: None,
            total_cost,
            status: PurchaseStatus::Issued,
        }
    }

    pub fn status(&self) -> PurchaseStatus {
        self.status
    }

    fn set(&mut self, allowed: bool, to: PurchaseStatus) -> Result<(), StatusError> {
        if !allowed {
            return Err(StatusError {
                entity: "purchase order",
                from: self.status.as_str(),
                to: to.as_str(),
            });
        }
        self.status = to;
        Ok(())
    }

    /// `Issued -> InTransit`, fixing the estimated delivery day.
    pub fn dispatch(&mut self, lead_time_days: Day) -> Result<(), StatusError> {
        let ok = matches!(self.status, PurchaseStatus::Issued);
        self.set(ok, PurchaseStatus::InTransit)?;
        self.estimated_delivery_day = Some(self.emission_day.saturating_add(lead_time_days));
        Ok(())
    }

    /// `InTransit -> Received` on `day`.
    pub fn receive(&mut self, day: Day) -> Result<(), StatusError> {
        let ok = matches!(self.status, PurchaseStatus::InTransit);
        self.set(ok, PurchaseStatus::Received)?;
        self.actual_delivery_day = Some(day);
        Ok(())
    }

    /// `Issued -> Cancelled`.
    pub fn cancel(&mut self) -> Result<(), StatusError> {
        let ok = matches!(self.status, PurchaseStatus::Issued);
        self.set(ok, PurchaseStatus::Cancelled)
    }
}

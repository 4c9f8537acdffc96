#![deny(warnings)]

//! Core domain models and invariants for the production-planning simulator.
//!
//! This crate defines the serializable types shared across the simulation:
//! the product catalog and its bills of materials, supplier terms, production
//! and purchase orders with checked status transitions, the inventory ledger
//! and the append-only event log. Scenario files are loaded and validated in
//! [`config`].

use serde::{Deserialize, Serialize};
use std::fmt;

pub mod catalog;
pub mod config;
pub mod events;
pub mod inventory;
pub mod orders;

pub use catalog::{
    bom_totals, BomItem, Catalog, Product, ProductKind, Supplier, SupplierOffer, SupplierTable,
    SupplyTerms,
};
pub use config::{load_scenario, ConfigError, InitialState, ScenarioConfig, SimParams};
pub use events::{Event, EventKind, EventLog, HaltReason};
pub use inventory::{InventoryError, InventoryLedger};
pub use orders::{
    ProductionOrder, ProductionStatus, PurchaseOrder, PurchaseStatus, StatusError,
};

/// A simulated day. Day 0 is the first day of the run.
pub type Day = u32;

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident($inner:ty)) => {
        $(#[$meta])*
        #[derive(
            Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub $inner);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_type!(
    /// Identifier of a raw material or finished product.
    ProductId(u32)
);
id_type!(
    /// Identifier of a supplier.
    SupplierId(u32)
);
id_type!(
    /// Identifier of a production order, assigned monotonically from 1.
    OrderId(u64)
);
id_type!(
    /// Identifier of a purchase order, assigned monotonically from 1.
    PurchaseOrderId(u64)
);
id_type!(
    /// Identifier of an event log entry; equals its append position plus one.
    EventId(u64)
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_serialize_transparently() {
        let s = serde_json::to_string(&ProductId(101)).unwrap();
        assert_eq!(s, "101");
        let back: OrderId = serde_json::from_str("7").unwrap();
        assert_eq!(back, OrderId(7));
    }

    #[test]
    fn ids_display_as_number() {
        assert_eq!(SupplierId(201).to_string(), "201");
        assert_eq!(format!("{}", PurchaseOrderId(3)), "3");
    }
}

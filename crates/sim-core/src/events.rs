//! Append-only domain event log.

use crate::{Day, EventId, OrderId, ProductId, PurchaseOrderId, SupplierId};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Why a production attempt stopped without consuming materials.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HaltReason {
    MaterialsUnavailableAfterWait,
}

/// Typed payload of an event. The serialized `type` tag is the event type.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    DemandGenerated {
        order_id: OrderId,
        product_id: ProductId,
        quantity: u64,
    },
    /// Order entered directly rather than drawn from demand.
    OrderCreated {
        order_id: OrderId,
        product_id: ProductId,
        quantity: u64,
    },
    OrderReleased {
        order_id: OrderId,
    },
    OrderCancelled {
        order_id: OrderId,
    },
    ProductionStarted {
        order_id: OrderId,
    },
    ProductionCompleted {
        order_id: OrderId,
        product_id: ProductId,
        quantity: u64,
    },
    ProductionHalted {
        order_id: OrderId,
        reason: HaltReason,
    },
    ProductionError {
        order_id: OrderId,
        reason: String,
    },
    PurchaseOrderCreated {
        po_id: PurchaseOrderId,
        supplier_id: SupplierId,
        product_id: ProductId,
        quantity: u64,
    },
    PurchaseError {
        po_id: PurchaseOrderId,
        reason: String,
    },
    PurchaseReceived {
        po_id: PurchaseOrderId,
        product_id: ProductId,
        quantity: u64,
    },
    InventoryIncrease {
        product_id: ProductId,
        quantity: u64,
        new_level: u64,
    },
    InventoryDecrease {
        product_id: ProductId,
        quantity: u64,
        new_level: u64,
    },
    /// Stock removal failed after sufficiency had been confirmed.
    InvariantViolation {
        product_id: ProductId,
        requested: u64,
        available: u64,
    },
}

impl EventKind {
    /// Snake-case type tag, e.g. `"production_started"`.
    pub fn type_tag(&self) -> &'static str {
        match self {
            EventKind::DemandGenerated { .. } => "demand_generated",
            EventKind::OrderCreated { .. } => "order_created",
            EventKind::OrderReleased { .. } => "order_released",
            EventKind::OrderCancelled { .. } => "order_cancelled",
            EventKind::ProductionStarted { .. } => "production_started",
            EventKind::ProductionCompleted { .. } => "production_completed",
            EventKind::ProductionHalted { .. } => "production_halted",
            EventKind::ProductionError { .. } => "production_error",
            EventKind::PurchaseOrderCreated { .. } => "purchase_order_created",
            EventKind::PurchaseError { .. } => "purchase_error",
            EventKind::PurchaseReceived { .. } => "purchase_received",
            EventKind::InventoryIncrease { .. } => "inventory_increase",
            EventKind::InventoryDecrease { .. } => "inventory_decrease",
            EventKind::InvariantViolation { .. } => "invariant_violation",
        }
    }
}

/// One immutable log entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    /// Simulated day the event happened on.
    pub day: Day,
    #[serde(flatten)]
    pub kind: EventKind,
}

impl Event {
    pub fn type_tag(&self) -> &'static str {
        self.kind.type_tag()
    }

    /// Payload fields as a loose key/value map, for display.
    pub fn details(&self) -> Map<String, Value> {
        match serde_json::to_value(&self.kind) {
            Ok(Value::Object(mut map)) => {
                map.remove("type");
                map
            }
            _ => Map::new(),
        }
    }
}

/// Ordered, append-only sequence of events.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct EventLog {
    events: Vec<Event>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event and return its id.
    pub fn append(&mut self, day: Day, kind: EventKind) -> EventId {
        let id = EventId(self.events.len() as u64 + 1);
        tracing::trace!(id = id.0, day, kind = kind.type_tag(), "event");
        self.events.push(Event { id, day, kind });
        id
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.events.iter()
    }

    /// Events with the given type tag, in append order.
    pub fn of_type<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a Event> + 'a {
        self.events.iter().filter(move |e| e.type_tag() == tag)
    }

    pub fn last(&self) -> Option<&Event> {
        self.events.last()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_follow_append_order() {
        let mut log = EventLog::new();
        let a = log.append(0, EventKind::OrderReleased { order_id: OrderId(1) });
        let b = log.append(2, EventKind::ProductionStarted { order_id: OrderId(1) });
        assert_eq!(a, EventId(1));
        assert_eq!(b, EventId(2));
        assert_eq!(log.len(), 2);
        assert_eq!(log.last().unwrap().day, 2);
        assert_eq!(log.of_type("production_started").count(), 1);
    }

    #[test]
    fn details_drop_type_tag() {
        let mut log = EventLog::new();
        log.append(
            1,
            EventKind::ProductionHalted {
                order_id: OrderId(4),
                reason: HaltReason::MaterialsUnavailableAfterWait,
            },
        );
        let e = &log.events()[0];
        assert_eq!(e.type_tag(), "production_halted");
        let d = e.details();
        assert_eq!(d.get("order_id"), Some(&Value::from(4)));
        assert_eq!(
            d.get("reason"),
            Some(&Value::from("materials_unavailable_after_wait"))
        );
        assert!(!d.contains_key("type"));
    }

    #[test]
    fn event_serializes_flat() {
        let e = Event {
            id: EventId(1),
            day: 3,
            kind: EventKind::PurchaseReceived {
                po_id: PurchaseOrderId(2),
                product_id: ProductId(101),
                quantity: 10,
            },
        };
        let v = serde_json::to_value(&e).unwrap();
        assert_eq!(v["type"], "purchase_received");
        assert_eq!(v["day"], 3);
        assert_eq!(v["quantity"], 10);
        let back: Event = serde_json::from_value(v).unwrap();
        assert_eq!(back, e);
    }
}

//! On-hand stock per product, audited through the event log.

use crate::catalog::{bom_totals, BomItem};
use crate::events::{EventKind, EventLog};
use crate::{Day, ProductId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Stock mutation errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InventoryError {
    /// Removal beyond what is on hand. Callers validate sufficiency first, so
    /// this signals a bypassed check rather than an ordinary shortage.
    #[error("cannot remove {requested} of product {product}: only {available} on hand")]
    Insufficient {
        product: ProductId,
        requested: u64,
        available: u64,
    },
}

/// Product id to non-negative on-hand quantity. Every mutation is paired with
/// an entry in the [`EventLog`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryLedger {
    levels: BTreeMap<ProductId, u64>,
}

impl InventoryLedger {
    pub fn new(levels: BTreeMap<ProductId, u64>) -> Self {
        Self { levels }
    }

    /// Current level; unknown products read as 0.
    pub fn level(&self, product: ProductId) -> u64 {
        self.levels.get(&product).copied().unwrap_or(0)
    }

    /// Whether at least `quantity` of `product` is on hand.
    pub fn has(&self, product: ProductId, quantity: u64) -> bool {
        self.level(product) >= quantity
    }

    /// Whether stock covers every `(material, quantity)` requirement.
    pub fn covers(&self, needs: &BTreeMap<ProductId, u64>) -> bool {
        needs.iter().all(|(material, qty)| self.has(*material, *qty))
    }

    /// Whether stock covers `units` of the BOM, summing repeated materials.
    pub fn covers_bom(&self, bom: &[BomItem], units: u64) -> bool {
        self.covers(&bom_totals(bom, units))
    }

    /// Credit stock and log `inventory_increase`. Returns the new level.
    pub fn add(&mut self, product: ProductId, quantity: u64, day: Day, log: &mut EventLog) -> u64 {
        let level = self.levels.entry(product).or_insert(0);
        *level = level.saturating_add(quantity);
        let new_level = *level;
        log.append(
            day,
            EventKind::InventoryIncrease {
                product_id: product,
                quantity,
                new_level,
            },
        );
        new_level
    }

    /// Debit stock and log `inventory_decrease`. Fails without mutating when
    /// less than `quantity` is on hand.
    pub fn remove(
        &mut self,
        product: ProductId,
        quantity: u64,
        day: Day,
        log: &mut EventLog,
    ) -> Result<u64, InventoryError> {
        let available = self.level(product);
        if available < quantity {
            return Err(InventoryError::Insufficient {
                product,
                requested: quantity,
                available,
            });
        }
        let new_level = available - quantity;
        self.levels.insert(product, new_level);
        log.append(
            day,
            EventKind::InventoryDecrease {
                product_id: product,
                quantity,
                new_level,
            },
        );
        Ok(new_level)
    }

    /// Debit every requirement or none. On failure nothing is mutated or
    /// logged, and the first uncovered material is reported.
    pub fn remove_all(
        &mut self,
        needs: &BTreeMap<ProductId, u64>,
        day: Day,
        log: &mut EventLog,
    ) -> Result<(), InventoryError> {
        for (&product, &requested) in needs {
            let available = self.level(product);
            if available < requested {
                return Err(InventoryError::Insufficient {
                    product,
                    requested,
                    available,
                });
            }
        }
        for (&product, &quantity) in needs {
            self.remove(product, quantity, day, log)?;
        }
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = (ProductId, u64)> + '_ {
        self.levels.iter().map(|(p, q)| (*p, *q))
    }

    /// Sum of all on-hand units.
    pub fn total_units(&self) -> u64 {
        self.levels.values().fold(0u64, |acc, q| acc.saturating_add(*q))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn ledger() -> InventoryLedger {
        InventoryLedger::new([(ProductId(1), 5), (ProductId(2), 0)].into_iter().collect())
    }

    #[test]
    fn add_and_remove_log_new_levels() {
        let mut inv = ledger();
        let mut log = EventLog::new();
        assert_eq!(inv.add(ProductId(1), 3, 0, &mut log), 8);
        assert_eq!(inv.remove(ProductId(1), 8, 1, &mut log).unwrap(), 0);
        assert_eq!(log.len(), 2);
        assert_eq!(
            log.events()[1].kind,
            EventKind::InventoryDecrease {
                product_id: ProductId(1),
                quantity: 8,
                new_level: 0
            }
        );
    }

    #[test]
    fn over_removal_is_reported_not_clamped() {
        let mut inv = ledger();
        let mut log = EventLog::new();
        let err = inv.remove(ProductId(1), 6, 0, &mut log).unwrap_err();
        assert_eq!(
            err,
            InventoryError::Insufficient {
                product: ProductId(1),
                requested: 6,
                available: 5
            }
        );
        assert_eq!(inv.level(ProductId(1)), 5);
        assert!(log.is_empty());
    }

    #[test]
    fn unknown_products_read_as_zero() {
        let mut inv = ledger();
        let mut log = EventLog::new();
        assert_eq!(inv.level(ProductId(9)), 0);
        assert!(inv.has(ProductId(9), 0));
        assert!(inv.remove(ProductId(9), 1, 0, &mut log).is_err());
        inv.add(ProductId(9), 2, 0, &mut log);
        assert_eq!(inv.level(ProductId(9)), 2);
    }

    #[test]
    fn bom_coverage_scales_by_units() {
        let inv = ledger();
        let bom = vec![BomItem {
            material_id: ProductId(1),
            quantity: 2,
        }];
        assert!(inv.covers_bom(&bom, 2));
        assert!(!inv.covers_bom(&bom, 3));
        assert_eq!(inv.total_units(), 5);
    }

    #[test]
    fn repeated_bom_lines_are_summed() {
        let inv = ledger();
        let bom = vec![
            BomItem {
                material_id: ProductId(1),
                quantity: 3,
            },
            BomItem {
                material_id: ProductId(1),
                quantity: 3,
            },
        ];
        assert!(!inv.covers_bom(&bom, 1));
        assert_eq!(bom_totals(&bom, 2)[&ProductId(1)], 12);
        let inv = InventoryLedger::new([(ProductId(1), 6)].into_iter().collect());
        assert!(inv.covers_bom(&bom, 1));
    }

    #[test]
    fn remove_all_is_all_or_nothing() {
        let mut inv = ledger();
        let mut log = EventLog::new();
        let needs: BTreeMap<_, _> = [(ProductId(1), 2), (ProductId(2), 1)].into_iter().collect();
        assert_eq!(
            inv.remove_all(&needs, 0, &mut log),
            Err(InventoryError::Insufficient {
                product: ProductId(2),
                requested: 1,
                available: 0
            })
        );
        assert_eq!(inv.level(ProductId(1)), 5);
        assert!(log.is_empty());

        let needs: BTreeMap<_, _> = [(ProductId(1), 5)].into_iter().collect();
        inv.remove_all(&needs, 1, &mut log).unwrap();
        assert_eq!(inv.level(ProductId(1)), 0);
        assert_eq!(log.len(), 1);
    }

    proptest! {
        #[test]
        fn levels_never_go_negative(ops in proptest::collection::vec((any::<bool>(), 0u64..50), 0..200)) {
            let mut inv = InventoryLedger::default();
            let mut log = EventLog::new();
            let mut expected: u64 = 0;
            for (is_add, q) in ops {
                if is_add {
                    inv.add(ProductId(1), q, 0, &mut log);
                    expected += q;
                } else if inv.remove(ProductId(1), q, 0, &mut log).is_ok() {
                    expected -= q;
                } else {
                    prop_assert!(q > expected);
                }
                prop_assert_eq!(inv.level(ProductId(1)), expected);
            }
        }
    }
}

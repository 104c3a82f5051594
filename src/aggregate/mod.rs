//! Best-order aggregation
//!
//! Collapses a raw order stream into one best buy and one best sell per
//! (location, item) pair. The reduction is a pure max/min fold, so it is
//! insensitive to the arrival order of concurrently fetched pages.

use std::collections::HashMap;

use crate::config::NON_STATION_ID_THRESHOLD;
use crate::resources::LocationDirectory;
use crate::RawOrder;

/// Composite key identifying a competing pair of best orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OrderKey {
    /// Location the orders are placed at
    pub location_id: i64,
    /// Item type being traded
    pub type_id: i32,
}

impl OrderKey {
    /// The key of an order.
    pub fn of(order: &RawOrder) -> Self {
        Self {
            location_id: order.location_id,
            type_id: order.type_id,
        }
    }
}

/// Accumulator for the best buy and sell seen for one key.
///
/// Lives only for the duration of one aggregation pass.
#[derive(Debug, Clone, Default)]
pub struct BestOrderPair {
    /// Highest-priced buy order seen so far
    pub buy: Option<RawOrder>,
    /// Lowest-priced sell order seen so far
    pub sell: Option<RawOrder>,
}

impl BestOrderPair {
    /// Offer an order to the pair; it replaces the current holder only when
    /// strictly better, so price ties resolve first-seen-wins.
    pub fn offer(&mut self, order: RawOrder) {
        if order.is_buy_order {
            match &self.buy {
                Some(best) if order.price <= best.price => {}
                _ => self.buy = Some(order),
            }
        } else {
            match &self.sell {
                Some(best) if order.price >= best.price => {}
                _ => self.sell = Some(order),
            }
        }
    }
}

/// Reduce a raw order stream to the best buy and sell per (location, item).
///
/// Orders at locations above the station-id threshold are not addressable
/// through the public endpoints and are skipped, unless `directory` supplies
/// metadata for that location (the structure path does). Output order is
/// unspecified; output size is at most the input size, and re-aggregating an
/// aggregated output leaves it unchanged.
pub fn aggregate_orders(
    orders: Vec<RawOrder>,
    directory: Option<&LocationDirectory>,
) -> Vec<RawOrder> {
    let mut best: HashMap<OrderKey, BestOrderPair> = HashMap::new();

    for order in orders {
        if order.location_id > NON_STATION_ID_THRESHOLD
            && !directory.is_some_and(|d| d.contains(order.location_id))
        {
            continue;
        }
        best.entry(OrderKey::of(&order)).or_default().offer(order);
    }

    best.into_values()
        .flat_map(|pair| pair.buy.into_iter().chain(pair.sell))
        .collect()
}

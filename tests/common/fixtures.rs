#![allow(dead_code)]

use chrono::NaiveDate;
use followgraph::models::OrderRecord;
use followgraph::state::{StateSnapshot, VersionedState};
use serde_json::{json, Value};

pub fn empty_snapshot() -> StateSnapshot {
    VersionedState::builder().build().snapshot()
}

pub fn as_of() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 8, 21).expect("valid fixture date")
}

/// Three orders totalling 450.00 with the newest ten days before [`as_of`].
///
/// With default scoring constants this is RFM 63 and churn risk 0.171.
pub fn reference_orders() -> Vec<OrderRecord> {
    vec![
        OrderRecord::new("C001", "SO-101", "2025-06-30", "BAG-SRD", 60, 2.50),
        OrderRecord::new("C001", "SO-102", "2025-07-20", "TART-LEM", 10, 15.00),
        OrderRecord::new("C001", "SO-103", "2025-08-11", "CAKE-CHOC", 3, 50.00),
    ]
}

pub fn orders_json() -> Value {
    serde_json::to_value(reference_orders()).expect("orders serialize")
}

/// Request state as the engine seeds it for a customer with history.
pub fn seeded_state() -> VersionedState {
    VersionedState::builder()
        .with_output("customer", json!({"id": "C001", "segment": "Hotel"}))
        .with_output("orders", orders_json())
        .with_output("as_of", json!(as_of().to_string()))
        .build()
}

/// Request state for a customer without any order history.
pub fn no_history_state() -> VersionedState {
    VersionedState::builder()
        .with_output("customer", json!({"id": "C004", "segment": "Cafe"}))
        .with_output("orders", json!([]))
        .with_output("as_of", json!(as_of().to_string()))
        .build()
}

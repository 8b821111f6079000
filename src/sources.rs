//! Read-only access to customer master data and order history.
//!
//! The engine treats order and profile data as externally owned: it reads
//! through [`CustomerSource`] at the start of a run and never writes back.
//! Production deployments put an ERP or warehouse client behind the trait;
//! [`InMemorySource`] ships as the in-process implementation with a small
//! seeded portfolio for demos and tests.

use async_trait::async_trait;
use miette::Diagnostic;
use rustc_hash::FxHashMap;
use thiserror::Error;

use crate::models::{CustomerProfile, OrderRecord};

/// Failures raised by a customer data backend.
#[derive(Debug, Error, Diagnostic)]
pub enum SourceError {
    /// The backing system could not be reached or refused the query.
    #[error("data source unavailable: {0}")]
    #[diagnostic(
        code(followgraph::sources::unavailable),
        help("Retry once the backing order system is reachable again.")
    )]
    Unavailable(String),
}

/// Boundary to the system of record for customers and their orders.
///
/// Implementations must be safe to call concurrently; the engine issues
/// profile and order reads for many customers when building a daily queue.
#[async_trait]
pub trait CustomerSource: Send + Sync {
    /// All order lines for one customer, oldest first. Unknown customers
    /// yield an empty list, not an error.
    async fn get_orders(&self, customer_id: &str) -> Result<Vec<OrderRecord>, SourceError>;

    /// Master data for one customer, or `None` when the id is unknown.
    async fn get_profile(&self, customer_id: &str) -> Result<Option<CustomerProfile>, SourceError>;

    /// Every known customer profile, ordered by id.
    async fn list_all(&self) -> Result<Vec<CustomerProfile>, SourceError>;
}

/// In-process [`CustomerSource`] backed by hash maps.
#[derive(Clone, Debug, Default)]
pub struct InMemorySource {
    profiles: FxHashMap<String, CustomerProfile>,
    orders: FxHashMap<String, Vec<OrderRecord>>,
}

impl InMemorySource {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A small bakery-supplier portfolio: one strong account, one steady
    /// one, one gone quiet, and one brand new with no order history.
    #[must_use]
    pub fn with_sample_data() -> Self {
        let mut source = Self::new();

        source.add_profile(CustomerProfile::new(
            "C001",
            "Gourmet Gateway",
            "Hotel",
            "North",
            "Net 30",
        ));
        source.add_orders(vec![
            OrderRecord::new("C001", "SO-101", "2025-06-14", "BAG-SRD", 30, 1.60),
            OrderRecord::new("C001", "SO-102", "2025-07-02", "CAKE-CARR", 3, 14.25),
            OrderRecord::new("C001", "SO-103", "2025-07-22", "TART-LEM", 6, 9.75),
            OrderRecord::new("C001", "SO-104", "2025-08-05", "BAG-CIAB", 24, 1.85),
            OrderRecord::new("C001", "SO-105", "2025-08-18", "CAKE-CHOC", 4, 13.50),
        ]);

        source.add_profile(CustomerProfile::new(
            "C002",
            "Patisserie Bliss",
            "Cafe",
            "Center",
            "Net 14",
        ));
        source.add_orders(vec![
            OrderRecord::new("C002", "SO-201", "2025-06-02", "CAKE-CHOC", 2, 13.50),
            OrderRecord::new("C002", "SO-202", "2025-07-10", "TART-FRU", 8, 8.50),
            OrderRecord::new("C002", "SO-203", "2025-07-28", "CRO-BUT", 40, 1.20),
        ]);

        source.add_profile(CustomerProfile::new(
            "C003",
            "Daily Crust Bakery",
            "Retail",
            "South",
            "Net 30",
        ));
        source.add_orders(vec![
            OrderRecord::new("C003", "SO-301", "2025-04-28", "CRO-ALM", 25, 1.45),
            OrderRecord::new("C003", "SO-302", "2025-05-20", "BAG-SRD", 20, 1.60),
        ]);

        source.add_profile(CustomerProfile::new(
            "C004",
            "Muffin Magic",
            "Cafe",
            "East",
            "Prepaid",
        ));

        source
    }

    pub fn add_profile(&mut self, profile: CustomerProfile) {
        self.profiles.insert(profile.id.clone(), profile);
    }

    /// Append orders, keyed by the customer id carried on each record.
    pub fn add_orders(&mut self, orders: Vec<OrderRecord>) {
        for order in orders {
            self.orders
                .entry(order.customer_id.clone())
                .or_default()
                .push(order);
        }
    }
}

#[async_trait]
impl CustomerSource for InMemorySource {
    async fn get_orders(&self, customer_id: &str) -> Result<Vec<OrderRecord>, SourceError> {
        let mut orders = self.orders.get(customer_id).cloned().unwrap_or_default();
        orders.sort_by(|a, b| a.order_date.cmp(&b.order_date));
        Ok(orders)
    }

    async fn get_profile(&self, customer_id: &str) -> Result<Option<CustomerProfile>, SourceError> {
        Ok(self.profiles.get(customer_id).cloned())
    }

    async fn list_all(&self) -> Result<Vec<CustomerProfile>, SourceError> {
        let mut profiles: Vec<CustomerProfile> = self.profiles.values().cloned().collect();
        profiles.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(profiles)
    }
}

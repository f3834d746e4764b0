use std::collections::HashMap;

use cucumber::World;
use log::*;
use shop_engine::{
    db_types::{Order, OrderId},
    events::EventProducers,
    CartApi,
    EngineConfig,
    OrderFlowApi,
    OrderQueryApi,
    ReconciliationApi,
    SqliteDatabase,
};

use crate::support::prepare_env::{prepare_test_env, random_db_path};

#[derive(Default, Debug, World)]
pub struct ShopWorld {
    pub system: Option<ShopSystem>,
    /// The most recent order of each customer
    pub orders: HashMap<String, OrderId>,
    pub last_error: Option<String>,
}

#[derive(Debug)]
pub struct ShopSystem {
    pub db_path: String,
    pub db: SqliteDatabase,
    pub carts: CartApi<SqliteDatabase>,
    pub reconciliation: ReconciliationApi<SqliteDatabase>,
    pub flow: OrderFlowApi<SqliteDatabase>,
    pub queries: OrderQueryApi<SqliteDatabase>,
}

impl ShopWorld {
    pub fn system(&self) -> &ShopSystem {
        self.system.as_ref().expect("Shop system not initialised")
    }

    pub fn order_id(&self, customer: &str) -> OrderId {
        *self.orders.get(customer).unwrap_or_else(|| panic!("{customer} has not placed an order"))
    }

    pub async fn order(&self, customer: &str) -> Order {
        let id = self.order_id(customer);
        self.system().queries.fetch_order(id).await.expect("Error fetching order").expect("Order does not exist")
    }

    pub fn record<T, E: std::fmt::Display>(&mut self, result: Result<T, E>) -> Option<T> {
        match result {
            Ok(v) => {
                self.last_error = None;
                Some(v)
            },
            Err(e) => {
                debug!("🚀️ Operation failed: {e}");
                self.last_error = Some(e.to_string());
                None
            },
        }
    }
}

impl ShopSystem {
    pub async fn new() -> Self {
        let url = random_db_path();
        let db = prepare_test_env(&url).await;
        debug!("🚀️ Created database: {url}");
        let producers = EventProducers::default();
        Self {
            db_path: url,
            carts: CartApi::new(db.clone()),
            reconciliation: ReconciliationApi::new(db.clone(), producers.clone(), EngineConfig::default()),
            flow: OrderFlowApi::new(db.clone(), producers),
            queries: OrderQueryApi::new(db.clone()),
            db,
        }
    }
}

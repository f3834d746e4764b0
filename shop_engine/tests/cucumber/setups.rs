use cucumber::given;
use shop_common::MinorUnits;
use shop_engine::{db_types::NewProduct, ProductCatalog};

use crate::cucumber::{ShopSystem, ShopWorld};

#[given("a fresh install")]
async fn fresh_database(world: &mut ShopWorld) {
    let system = ShopSystem::new().await;
    world.system = Some(system);
}

#[given(expr = "a product '{word}' priced at {int} with {int} in stock")]
async fn a_product(world: &mut ShopWorld, id: String, price: i64, stock: i64) {
    let product = NewProduct::new(id.as_str(), id.clone(), MinorUnits::from(price), stock);
    world.system().db.upsert_product(product).await.expect("Error saving product");
}

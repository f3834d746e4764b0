use log::*;
use shop_common::MinorUnits;
use shop_engine::{db_types::NewProduct, EngineConfig, ProductCatalog, ShopDatabase, SqliteDatabase};
use sqlx::{migrate::MigrateDatabase, Sqlite};

pub fn random_db_path() -> String {
    let file = std::env::temp_dir().join(format!("test_shop_{}.db", rand::random::<u64>()));
    format!("sqlite://{}", file.display())
}

pub async fn prepare_test_env(url: &str) -> SqliteDatabase {
    dotenvy::from_filename(".env.test").ok();
    let _ = env_logger::try_init();
    debug!("🚀️ Logging initialised");
    create_database(url).await;
    let config = EngineConfig { max_connections: 5, ..Default::default() }.with_database_url(url);
    let db = SqliteDatabase::from_config(&config).await.expect("Error creating connection to database");
    db.migrate().await.expect("Error running DB migrations");
    info!("🚀️ Migrations complete");
    db
}

pub async fn create_database(url: &str) {
    if let Err(e) = Sqlite::drop_database(url).await {
        trace!("🚀️ Did not drop database {url}: {e:?}");
    }
    Sqlite::create_database(url).await.expect("Error creating database");
    info!("🚀️ Created Sqlite database {url}");
}

pub async fn tear_down(mut db: SqliteDatabase) {
    let url = db.url().to_string();
    if let Err(e) = db.close().await {
        error!("🚀️ Failed to close database: {e}");
    }
    Sqlite::drop_database(&url).await.expect("Error dropping database");
}

/// Seeds the catalog used across the integration tests.
pub async fn seed_products(db: &SqliteDatabase) {
    for (id, name, price, stock) in [
        ("tshirt", "Plain T-Shirt", 1500, 10),
        ("mug", "Coffee Mug", 800, 3),
        ("poster", "Poster", 2500, 0),
    ] {
        db.upsert_product(NewProduct::new(id, name, MinorUnits::from(price), stock)).await.expect("Error seeding product");
    }
}

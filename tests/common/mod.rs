use std::sync::Arc;

use chrono::Utc;
use inventory_ledger::{
    db::{self, DbConfig, DbPool},
    entities::{location, product},
    events::{self, EventSender},
    handlers::AppServices,
};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, Set};
use tokio::sync::mpsc;
use uuid::Uuid;

/// Helper harness wiring the service layer to a fresh in-memory SQLite
/// database. Each harness gets a uniquely named database so parallel tests
/// cannot observe each other's state.
pub struct TestApp {
    pub db: Arc<DbPool>,
    pub services: AppServices,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    pub async fn new() -> Self {
        let config = DbConfig {
            url: format!(
                "sqlite:file:testdb_{}?mode=memory&cache=shared",
                Uuid::new_v4().simple()
            ),
            max_connections: 5,
            min_connections: 1,
            ..Default::default()
        };

        let pool = db::establish_connection_with_config(&config)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations");

        let db = Arc::new(pool);
        let (tx, rx) = mpsc::channel(64);
        let event_sender = Arc::new(EventSender::new(tx));
        let event_task = tokio::spawn(events::process_events(rx));

        Self {
            services: AppServices::new(db.clone(), event_sender),
            db,
            _event_task: event_task,
        }
    }
}

/// Seeds a product with catalog pricing and replenishment parameters.
pub async fn create_product(
    db: &DbPool,
    sku: &str,
    unit_price: Decimal,
    reorder_point: i32,
    reorder_quantity: i32,
) -> product::Model {
    product::ActiveModel {
        sku: Set(sku.to_string()),
        name: Set(format!("{} test product", sku)),
        unit_price: Set(unit_price),
        reorder_point: Set(reorder_point),
        reorder_quantity: Set(reorder_quantity),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("failed to create product")
}

/// Seeds a storage location.
pub async fn create_location(db: &DbPool, label: &str) -> location::Model {
    location::ActiveModel {
        label: Set(label.to_string()),
        zone: Set("A".to_string()),
        capacity: Set(None),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("failed to create location")
}

pub fn actor() -> Uuid {
    Uuid::new_v4()
}

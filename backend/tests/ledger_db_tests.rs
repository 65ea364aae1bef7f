//! Ledger tests against a live PostgreSQL database
//!
//! Run with `DATABASE_URL=postgres://... cargo test -- --ignored`. Every test
//! creates its own materials and jobs so the suite can share one database.

use chrono::NaiveDate;
use printshop_ledger::error::AppError;
use printshop_ledger::models::{JobStatus, MovementType};
use printshop_ledger::services::batch::CreateBatchInput;
use printshop_ledger::services::material::{CreateMaterialInput, UpdateMaterialInput};
use printshop_ledger::services::movement::{ConsumeInput, RecordMovementInput};
use printshop_ledger::services::production::{
    AddConsumptionInput, CreateJobInput, TransitionInput,
};
use printshop_ledger::services::{
    BatchService, MaterialService, MovementService, ProductionService,
};
use rust_decimal::Decimal;
use shared::CostingPolicy;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::str::FromStr;
use uuid::Uuid;

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

async fn pool() -> PgPool {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&url)
        .await
        .expect("connect to database");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("run migrations");
    pool
}

fn new_material(name: &str, initial_stock: Option<Decimal>) -> CreateMaterialInput {
    CreateMaterialInput {
        name: format!("{} {}", name, Uuid::new_v4()),
        material_type: "PLA".to_string(),
        unit: "kg".to_string(),
        min_stock: dec("5"),
        max_stock: None,
        cost_per_unit: Decimal::ZERO,
        supplier: None,
        location: None,
        initial_stock,
    }
}

fn new_batch(material_id: Uuid, qty: &str, unit_cost: &str) -> CreateBatchInput {
    CreateBatchInput {
        material_id,
        purchase_date: NaiveDate::from_ymd_opt(2024, 3, 1),
        original_qty: dec(qty),
        unit_cost: dec(unit_cost),
        expiry_date: None,
        supplier: None,
        invoice_number: None,
    }
}

fn consume(material_id: Uuid, qty: &str) -> ConsumeInput {
    ConsumeInput {
        material_id,
        quantity: dec(qty),
        batch_id: None,
        movement_type: None,
        reference: None,
        notes: None,
    }
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_batch_receipt_and_fifo_consumption() {
    let db = pool().await;
    let user = Uuid::new_v4();
    let material = MaterialService::new(db.clone())
        .create(user, new_material("PLA Negro", None))
        .await
        .unwrap();

    let receipt = BatchService::new(db.clone())
        .create(user, new_batch(material.material.id, "100", "2.50"))
        .await
        .unwrap();
    assert_eq!(receipt.batch.batch.total_cost, dec("250"));
    assert!(receipt.batch.batch.batch_number.starts_with("BATCH-"));
    assert_eq!(receipt.movement.movement_type, MovementType::Purchase);
    assert_eq!(receipt.movement.stock_after, dec("100"));

    let movement = MovementService::new(db.clone())
        .consume(user, consume(material.material.id, "30"))
        .await
        .unwrap();
    assert_eq!(movement.batch_id, Some(receipt.batch.batch.id));
    assert_eq!(movement.quantity, dec("-30"));

    let batch = BatchService::new(db.clone())
        .get(receipt.batch.batch.id)
        .await
        .unwrap();
    assert_eq!(batch.batch.current_qty, dec("70"));
    assert_eq!(batch.usage_percentage, dec("30"));

    let report = MaterialService::new(db)
        .reconcile(material.material.id)
        .await
        .unwrap();
    assert!(report.ledger_consistent);
    assert_eq!(report.drift, Decimal::ZERO);
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_insufficient_stock_rolls_back() {
    let db = pool().await;
    let user = Uuid::new_v4();
    let material = MaterialService::new(db.clone())
        .create(user, new_material("PETG Blanco", Some(dec("30"))))
        .await
        .unwrap();
    let movements = MovementService::new(db.clone());

    let result = movements
        .record(
            user,
            RecordMovementInput {
                movement_type: MovementType::Consumption,
                material_id: material.material.id,
                quantity: dec("40"),
                batch_id: None,
                reference: None,
                notes: None,
                movement_date: None,
            },
        )
        .await;
    assert!(matches!(result, Err(AppError::InsufficientStock { .. })));

    let after = MaterialService::new(db.clone())
        .get(material.material.id)
        .await
        .unwrap();
    assert_eq!(after.material.stock, dec("30"));

    // Only the opening balance is in the ledger
    let history = movements.history(material.material.id).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].movement_type, MovementType::Adjustment);
    assert_eq!(history[0].reference.as_deref(), Some("INITIAL_STOCK"));
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_concurrent_draws_never_overdraw_batch() {
    let db = pool().await;
    let user = Uuid::new_v4();
    let material = MaterialService::new(db.clone())
        .create(user, new_material("Resina Gris", None))
        .await
        .unwrap();
    let receipt = BatchService::new(db.clone())
        .create(user, new_batch(material.material.id, "100", "1"))
        .await
        .unwrap();

    let first = MovementService::new(db.clone());
    let second = MovementService::new(db.clone());
    let (a, b) = tokio::join!(
        first.consume(user, consume(material.material.id, "60")),
        second.consume(user, consume(material.material.id, "60")),
    );

    let results = [a, b];
    let successes = results.iter().filter(|r| r.is_ok()).count();
    let shortfalls = results
        .iter()
        .filter(|r| matches!(r, Err(AppError::InsufficientQuantity { .. })))
        .count();
    assert_eq!(successes, 1);
    assert_eq!(shortfalls, 1);

    let batch = BatchService::new(db.clone())
        .get(receipt.batch.batch.id)
        .await
        .unwrap();
    assert_eq!(batch.batch.current_qty, dec("40"));

    let after = MaterialService::new(db)
        .get(material.material.id)
        .await
        .unwrap();
    assert_eq!(after.material.stock, dec("40"));
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_job_costing_and_completion() {
    let db = pool().await;
    let user = Uuid::new_v4();
    let material = MaterialService::new(db.clone())
        .create(user, new_material("PLA Rojo", None))
        .await
        .unwrap();
    BatchService::new(db.clone())
        .create(user, new_batch(material.material.id, "10", "10"))
        .await
        .unwrap();

    let product_id: Uuid =
        sqlx::query_scalar("INSERT INTO products (name) VALUES ('Maceta') RETURNING id")
            .fetch_one(&db)
            .await
            .unwrap();

    let production = ProductionService::new(db.clone());
    let job = production
        .create_job(CreateJobInput {
            name: "Macetas x4".to_string(),
            priority: None,
            estimated_hours: Some(dec("5")),
            printer: None,
            material_label: None,
            settings: None,
            files: vec![],
            order_id: None,
            product_id: Some(product_id),
            notes: None,
        })
        .await
        .unwrap();
    assert_eq!(job.status, JobStatus::Queued);
    assert_eq!(job.priority, 5);

    let charged = production
        .add_consumption(
            user,
            AddConsumptionInput {
                production_job_id: job.id,
                material_id: material.material.id,
                quantity: dec("2"),
                batch_id: None,
                notes: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(charged.cost.total_cost, dec("20"));
    assert_eq!(charged.movement.production_job_id, Some(job.id));

    let policy = CostingPolicy {
        labor_rate_per_hour: dec("15"),
        margin: dec("0.40"),
    };
    let totals = production.compute_totals(job.id, &policy).await.unwrap();
    assert_eq!(totals.material_cost, dec("20"));
    assert_eq!(totals.labor_cost, dec("75"));
    assert_eq!(totals.total_cost, dec("95"));
    assert_eq!(totals.suggested_price, dec("133.00"));

    // Running jobs cannot be deleted
    production
        .transition(
            job.id,
            TransitionInput {
                status: JobStatus::InProgress,
                actual_hours: None,
            },
        )
        .await
        .unwrap();
    assert!(matches!(
        production.delete_job(job.id).await,
        Err(AppError::InvalidStateTransition(_))
    ));

    let done = production
        .transition(
            job.id,
            TransitionInput {
                status: JobStatus::Completed,
                actual_hours: Some(dec("4")),
            },
        )
        .await
        .unwrap();
    assert_eq!(done.actual_hours, Some(dec("4")));
    assert!(done.completed_at.is_some());

    let product_stock: i32 = sqlx::query_scalar("SELECT stock FROM products WHERE id = $1")
        .bind(product_id)
        .fetch_one(&db)
        .await
        .unwrap();
    assert_eq!(product_stock, 1);

    // Completed jobs take no more material
    let late = production
        .add_consumption(
            user,
            AddConsumptionInput {
                production_job_id: job.id,
                material_id: material.material.id,
                quantity: dec("1"),
                batch_id: None,
                notes: None,
            },
        )
        .await;
    assert!(matches!(late, Err(AppError::InvalidStateTransition(_))));
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_pinned_inactive_batch_is_rejected() {
    let db = pool().await;
    let user = Uuid::new_v4();
    let material = MaterialService::new(db.clone())
        .create(user, new_material("PLA Azul", None))
        .await
        .unwrap();
    let batches = BatchService::new(db.clone());
    let receipt = batches
        .create(user, new_batch(material.material.id, "10", "20"))
        .await
        .unwrap();
    batches.deactivate(receipt.batch.batch.id).await.unwrap();

    let mut input = consume(material.material.id, "1");
    input.batch_id = Some(receipt.batch.batch.id);
    let result = MovementService::new(db).consume(user, input).await;
    assert!(matches!(result, Err(AppError::Validation { .. })));
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_costs_of_unknown_job_not_found() {
    let db = pool().await;
    let production = ProductionService::new(db);
    let result = production.list_costs(Uuid::new_v4()).await;
    assert!(matches!(result, Err(AppError::NotFound(_))));
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_oversized_batch_is_rejected_before_insert() {
    let db = pool().await;
    let user = Uuid::new_v4();
    let material = MaterialService::new(db.clone())
        .create(user, new_material("PLA Verde", None))
        .await
        .unwrap();

    let oversized = new_batch(material.material.id, "100000000000000000000", "10000000000");
    let result = BatchService::new(db.clone()).create(user, oversized).await;
    assert!(matches!(result, Err(AppError::Validation { .. })));

    let batches = BatchService::new(db)
        .list_by_material(material.material.id, true)
        .await
        .unwrap();
    assert!(batches.is_empty());
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_update_can_clear_max_stock() {
    let db = pool().await;
    let user = Uuid::new_v4();
    let materials = MaterialService::new(db);
    let mut input = new_material("PETG Negro", None);
    input.max_stock = Some(dec("50"));
    let material = materials.create(user, input).await.unwrap();
    assert_eq!(material.material.max_stock, Some(dec("50")));

    let update: UpdateMaterialInput = serde_json::from_str(r#"{"maxStock": null}"#).unwrap();
    let updated = materials.update(material.material.id, update).await.unwrap();
    assert_eq!(updated.material.max_stock, None);
}

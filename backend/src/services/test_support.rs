//! Postgres fixtures for service tests
//!
//! Tests built on these are `#[ignore]`d and return early when `DATABASE_URL`
//! is not set. Every fixture creates its own cooperative, so tests can share
//! one database.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use shared::{QualityGrade, UserRole};
use sqlx::PgPool;
use uuid::Uuid;

/// Connect and migrate, or `None` when no database is configured
pub async fn test_pool(test: &str) -> Option<PgPool> {
    let url = match std::env::var("DATABASE_URL") {
        Ok(v) => v,
        Err(_) => {
            eprintln!("skipping {}: DATABASE_URL not set", test);
            return None;
        }
    };
    let pool = PgPool::connect(&url).await.expect("connect to DATABASE_URL");
    sqlx::migrate!("./migrations").run(&pool).await.expect("run migrations");
    Some(pool)
}

fn unique(len: usize) -> String {
    Uuid::new_v4().simple().to_string()[..len].to_uppercase()
}

pub async fn seed_cooperative(pool: &PgPool) -> Uuid {
    let code = format!("T{}", unique(9));
    sqlx::query_scalar("INSERT INTO cooperatives (name, code) VALUES ($1, $2) RETURNING id")
        .bind(format!("Test cooperative {}", code))
        .bind(code)
        .fetch_one(pool)
        .await
        .expect("insert cooperative")
}

pub async fn seed_staff(pool: &PgPool, cooperative_id: Uuid, role: UserRole) -> Uuid {
    sqlx::query_scalar(
        "INSERT INTO users (cooperative_id, email, name, role, password_hash) VALUES ($1, $2, $3, $4, 'x') RETURNING id",
    )
    .bind(cooperative_id)
    .bind(format!("{}@test.coop", unique(16).to_lowercase()))
    .bind(format!("Test {}", role))
    .bind(role.as_str())
    .fetch_one(pool)
    .await
    .expect("insert user")
}

pub async fn seed_farmer(pool: &PgPool, cooperative_id: Uuid) -> Uuid {
    sqlx::query_scalar("INSERT INTO farmers (cooperative_id, farmer_code, name) VALUES ($1, $2, $3) RETURNING id")
        .bind(cooperative_id)
        .bind(format!("F-{}", unique(20)))
        .bind("Test farmer")
        .fetch_one(pool)
        .await
        .expect("insert farmer")
}

/// A coffee harvest already inspected with `grade`
pub async fn seed_graded_harvest(
    pool: &PgPool,
    cooperative_id: Uuid,
    farmer_id: Uuid,
    recorded_by: Uuid,
    grade: QualityGrade,
    weight_kg: Decimal,
    harvest_date: NaiveDate,
) -> Uuid {
    let status = if grade.is_reject() { "rejected" } else { "verified" };
    sqlx::query_scalar(
        r#"
        INSERT INTO harvests
            (cooperative_id, farmer_id, crop, weight_kg, harvest_date, status, grade, inspector_id, verified_at, recorded_by)
        VALUES ($1, $2, 'coffee', $3, $4, $5, $6, $7, NOW(), $7)
        RETURNING id
        "#,
    )
    .bind(cooperative_id)
    .bind(farmer_id)
    .bind(weight_kg)
    .bind(harvest_date)
    .bind(status)
    .bind(grade.as_str())
    .bind(recorded_by)
    .fetch_one(pool)
    .await
    .expect("insert harvest")
}

pub async fn seed_price(
    pool: &PgPool,
    cooperative_id: Uuid,
    set_by: Uuid,
    grade: QualityGrade,
    price_per_kg: Decimal,
    effective_date: NaiveDate,
) {
    sqlx::query(
        "INSERT INTO prices (cooperative_id, crop, grade, price_per_kg, effective_date, set_by) VALUES ($1, 'coffee', $2, $3, $4, $5)",
    )
    .bind(cooperative_id)
    .bind(grade.as_str())
    .bind(price_per_kg)
    .bind(effective_date)
    .bind(set_by)
    .execute(pool)
    .await
    .expect("insert price");
}

use std::{env, fs, path::Path};

use chrono::Utc;
use sqlx::SqlitePool;

use crate::{
    auth::{hash_password, new_id},
    models::{ReservationRow, ReviewRow, UserRow, ROLE_ADMIN},
};

pub async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}

pub fn ensure_sqlite_dir(db_url: &str) -> std::io::Result<()> {
    let path = if let Some(path) = db_url.strip_prefix("sqlite://") {
        Some(path)
    } else if let Some(path) = db_url.strip_prefix("sqlite:") {
        Some(path)
    } else {
        None
    };

    let Some(path) = path else {
        return Ok(());
    };

    let path = path.split('?').next().unwrap_or(path);
    if path == ":memory:" || path.is_empty() {
        return Ok(());
    }

    let path = path.strip_prefix("file:").unwrap_or(path);
    let db_path = Path::new(path);
    if let Some(parent) = db_path.parent() {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

pub async fn seed_defaults(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    seed_admin(pool).await?;
    seed_menu_categories(pool).await?;
    Ok(())
}

async fn seed_admin(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    let existing = sqlx::query_as::<_, (String,)>("SELECT id FROM users WHERE role = ? LIMIT 1")
        .bind(ROLE_ADMIN)
        .fetch_optional(pool)
        .await?;

    if existing.is_some() {
        return Ok(());
    }

    let name = env::var("ADMIN_NAME").unwrap_or_else(|_| "LunaBrew Admin".to_string());
    let email = env::var("ADMIN_EMAIL").unwrap_or_else(|_| "admin@lunabrew.com".to_string());
    let password = env::var("ADMIN_PASSWORD").unwrap_or_else(|_| "admin123".to_string());

    if password == "admin123" {
        log::warn!("ADMIN_PASSWORD not set. Using default password 'admin123'. Set ADMIN_PASSWORD in production.");
    }

    let password_hash =
        hash_password(&password).map_err(|_| sqlx::Error::Protocol("password hash failed".into()))?;

    sqlx::query(
        r#"INSERT INTO users (id, name, email, password_hash, role, active, created_at)
           VALUES (?, ?, ?, ?, ?, 1, ?)"#,
    )
    .bind(new_id())
    .bind(name)
    .bind(email.to_lowercase())
    .bind(password_hash)
    .bind(ROLE_ADMIN)
    .bind(Utc::now().to_rfc3339())
    .execute(pool)
    .await?;

    Ok(())
}

async fn seed_menu_categories(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM menu_categories")
        .fetch_one(pool)
        .await?;
    if count > 0 {
        return Ok(());
    }

    let categories = [
        ("Kahveler", "Özenle hazırlanmış kahve çeşitlerimiz", "fas fa-coffee", 1),
        ("Kahve İçermeyen İçecekler", "Çay, sıcak çikolata ve diğer içecekler", "fas fa-mug-hot", 2),
        ("Ana Yemekler", "Doyurucu ana yemek seçeneklerimiz", "fas fa-utensils", 3),
        ("Atıştırmalıklar", "Hafif atıştırmalık ve aperatifler", "fas fa-cookie-bite", 4),
    ];

    for (name, description, icon, order_index) in categories {
        sqlx::query(
            r#"INSERT INTO menu_categories (id, name, description, icon, order_index, active, created_at)
               VALUES (?, ?, ?, ?, ?, 1, ?)"#,
        )
        .bind(new_id())
        .bind(name)
        .bind(description)
        .bind(icon)
        .bind(order_index)
        .bind(Utc::now().to_rfc3339())
        .execute(pool)
        .await?;
    }

    Ok(())
}

pub async fn fetch_reservation(pool: &SqlitePool, id: &str) -> Option<ReservationRow> {
    sqlx::query_as::<_, ReservationRow>(
        r#"SELECT id, customer_name, customer_email, customer_phone, date, time, guests, message,
                  status, confirmation_code, admin_notes, table_number, created_by,
                  last_modified_by, created_at, updated_at
           FROM reservations
           WHERE id = ?
           LIMIT 1"#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .unwrap_or(None)
}

pub async fn fetch_user_by_email(pool: &SqlitePool, email: &str) -> Option<UserRow> {
    sqlx::query_as::<_, UserRow>(
        r#"SELECT id, name, email, password_hash, role, active, created_at
           FROM users
           WHERE email = ?
           LIMIT 1"#,
    )
    .bind(email.trim().to_lowercase())
    .fetch_optional(pool)
    .await
    .unwrap_or(None)
}

pub async fn fetch_review(pool: &SqlitePool, id: &str) -> Option<ReviewRow> {
    sqlx::query_as::<_, ReviewRow>(
        r#"SELECT id, google_review_id, author_name, text, rating, source, visible, review_date,
                  profile_photo_url, created_at
           FROM reviews
           WHERE id = ?
           LIMIT 1"#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .unwrap_or(None)
}

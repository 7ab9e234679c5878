use actix_web::{test, web, App};
use chrono::{Local, Utc};
use serde_json::{json, Value};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use tokio::sync::mpsc::UnboundedReceiver;

use crate::{
    auth::{hash_password, issue_token, new_id},
    db,
    mailer::{MailIntent, MailJob, MailQueue},
    models::{UserRow, ROLE_ADMIN, STATUS_PENDING},
    state::{AppState, GoogleConfig, JwtConfig},
};

macro_rules! test_app {
    ($state:expr) => {
        test::init_service(
            App::new()
                .app_data(web::Data::new($state.clone()))
                .configure(super::public::configure)
                .configure(super::admin::configure),
        )
        .await
    };
}

async fn test_state() -> (AppState, UnboundedReceiver<MailJob>) {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();

    let (mail, rx) = MailQueue::new();
    let state = AppState {
        db: pool,
        jwt: JwtConfig {
            secret: "test-secret-0123456789abcdef".to_string(),
            expiration_hours: 24,
        },
        mail,
        google: GoogleConfig {
            api_base: "https://example.invalid".to_string(),
            account_id: String::new(),
            location_id: String::new(),
            access_token: String::new(),
        },
    };
    (state, rx)
}

async fn seed_admin(pool: &SqlitePool, active: i64) -> UserRow {
    let row = UserRow {
        id: new_id(),
        name: "Test Admin".to_string(),
        email: format!("admin-{}@test.com", new_id()),
        password_hash: hash_password("admin123").unwrap(),
        role: ROLE_ADMIN.to_string(),
        active,
        created_at: Utc::now().to_rfc3339(),
    };

    sqlx::query(
        r#"INSERT INTO users (id, name, email, password_hash, role, active, created_at)
           VALUES (?, ?, ?, ?, ?, ?, ?)"#,
    )
    .bind(&row.id)
    .bind(&row.name)
    .bind(&row.email)
    .bind(&row.password_hash)
    .bind(&row.role)
    .bind(row.active)
    .bind(&row.created_at)
    .execute(pool)
    .await
    .unwrap();

    row
}

fn tomorrow() -> String {
    (Local::now().date_naive() + chrono::Duration::days(1))
        .format("%Y-%m-%d")
        .to_string()
}

fn reservation_body(name: &str, email: &str) -> Value {
    json!({
        "customerName": name,
        "customerEmail": email,
        "customerPhone": "5551234567",
        "date": tomorrow(),
        "time": "19:00",
        "guests": "2",
    })
}

#[actix_web::test]
async fn create_reservation_assigns_pending_and_code() {
    let (state, mut mail_rx) = test_state().await;
    let app = test_app!(state);

    let req = test::TestRequest::post()
        .uri("/api/reservations")
        .set_json(reservation_body("Ayşe Yılmaz", "ayse@example.com"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 201);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["reservation"]["status"], json!(STATUS_PENDING));

    let code = body["reservation"]["confirmationCode"].as_str().unwrap();
    assert_eq!(code.len(), 14);
    assert!(code.starts_with("LB"));
    assert!(code[2..10].chars().all(|c| c.is_ascii_digit()));

    // The confirmation notification was handed to the dispatcher.
    let job = mail_rx.try_recv().unwrap();
    assert_eq!(job.intent, MailIntent::Confirmation);
    assert_eq!(job.reservation.customer_email, "ayse@example.com");

    // Public status lookup returns the reduced projection.
    let id = body["reservation"]["id"].as_str().unwrap().to_string();
    let req = test::TestRequest::get()
        .uri(&format!("/api/reservations/status/{id}"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["reservation"]["status"], json!(STATUS_PENDING));
    assert_eq!(body["reservation"]["customerName"], json!("Ayşe Yılmaz"));
    assert!(body["reservation"].get("confirmationCode").is_none());
}

#[actix_web::test]
async fn create_rejects_past_dates() {
    let (state, _mail_rx) = test_state().await;
    let app = test_app!(state);

    let yesterday = (Local::now().date_naive() - chrono::Duration::days(1))
        .format("%Y-%m-%d")
        .to_string();
    let mut body = reservation_body("Ayşe Yılmaz", "ayse@example.com");
    body["date"] = json!(yesterday);

    let req = test::TestRequest::post()
        .uri("/api/reservations")
        .set_json(body)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["success"], json!(false));
    let fields: Vec<&str> = body["errors"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["field"].as_str().unwrap())
        .collect();
    assert!(fields.contains(&"date"));
}

#[actix_web::test]
async fn create_checks_email_shape() {
    let (state, _mail_rx) = test_state().await;
    let app = test_app!(state);

    let req = test::TestRequest::post()
        .uri("/api/reservations")
        .set_json(reservation_body("Ayşe Yılmaz", "not-an-email"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
    let body: Value = test::read_body_json(resp).await;
    let fields: Vec<&str> = body["errors"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["field"].as_str().unwrap())
        .collect();
    assert!(fields.contains(&"customerEmail"));

    let req = test::TestRequest::post()
        .uri("/api/reservations")
        .set_json(reservation_body("Ayşe Yılmaz", "a@b.co"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 201);
}

#[actix_web::test]
async fn admin_surface_requires_valid_token() {
    let (state, _mail_rx) = test_state().await;
    let app = test_app!(state);

    // Missing header.
    let req = test::TestRequest::get()
        .uri("/api/reservations/admin")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 401);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["success"], json!(false));

    // Garbage token.
    let req = test::TestRequest::get()
        .uri("/api/reservations/admin")
        .insert_header(("Authorization", "Bearer not-a-token"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 401);

    // Valid signature, inactive account.
    let inactive = seed_admin(&state.db, 0).await;
    let token = issue_token(&state.jwt, &inactive).unwrap();
    let req = test::TestRequest::get()
        .uri("/api/reservations/admin")
        .insert_header(("Authorization", format!("Bearer {token}")))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 401);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(
        body["message"],
        json!("Geçersiz token veya kullanıcı aktif değil")
    );
}

#[actix_web::test]
async fn admin_updates_status_and_dispatcher_is_invoked() {
    let (state, mut mail_rx) = test_state().await;
    let app = test_app!(state);

    let req = test::TestRequest::post()
        .uri("/api/reservations")
        .set_json(reservation_body("Ayşe Yılmaz", "ayse@example.com"))
        .to_request();
    let created: Value = test::read_body_json(test::call_service(&app, req).await).await;
    let id = created["reservation"]["id"].as_str().unwrap().to_string();

    let admin = seed_admin(&state.db, 1).await;
    let token = issue_token(&state.jwt, &admin).unwrap();

    let req = test::TestRequest::patch()
        .uri(&format!("/api/reservations/admin/{id}/status"))
        .insert_header(("Authorization", format!("Bearer {token}")))
        .set_json(json!({
            "status": "confirmed",
            "adminNotes": "Pencere kenarı ayarlandı",
            "tableNumber": "7",
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["reservation"]["status"], json!("confirmed"));
    assert_eq!(body["reservation"]["tableNumber"], json!("7"));
    assert_eq!(body["reservation"]["lastModifiedBy"], json!(admin.id));

    let stored = db::fetch_reservation(&state.db, &id).await.unwrap();
    assert_eq!(stored.status, "confirmed");

    // Confirmation from the create, then the status update.
    assert_eq!(mail_rx.try_recv().unwrap().intent, MailIntent::Confirmation);
    assert_eq!(mail_rx.try_recv().unwrap().intent, MailIntent::StatusUpdate);
}

#[actix_web::test]
async fn unknown_status_is_rejected_and_row_unchanged() {
    let (state, _mail_rx) = test_state().await;
    let app = test_app!(state);

    let req = test::TestRequest::post()
        .uri("/api/reservations")
        .set_json(reservation_body("Ayşe Yılmaz", "ayse@example.com"))
        .to_request();
    let created: Value = test::read_body_json(test::call_service(&app, req).await).await;
    let id = created["reservation"]["id"].as_str().unwrap().to_string();

    let admin = seed_admin(&state.db, 1).await;
    let token = issue_token(&state.jwt, &admin).unwrap();

    let req = test::TestRequest::patch()
        .uri(&format!("/api/reservations/admin/{id}/status"))
        .insert_header(("Authorization", format!("Bearer {token}")))
        .set_json(json!({ "status": "arrived" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);

    let stored = db::fetch_reservation(&state.db, &id).await.unwrap();
    assert_eq!(stored.status, STATUS_PENDING);
    assert!(stored.last_modified_by.is_none());
}

#[actix_web::test]
async fn missing_reservation_returns_not_found() {
    let (state, _mail_rx) = test_state().await;
    let app = test_app!(state);

    let admin = seed_admin(&state.db, 1).await;
    let token = issue_token(&state.jwt, &admin).unwrap();

    let req = test::TestRequest::patch()
        .uri("/api/reservations/admin/no-such-id/status")
        .insert_header(("Authorization", format!("Bearer {token}")))
        .set_json(json!({ "status": "confirmed" }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 404);

    let req = test::TestRequest::delete()
        .uri("/api/reservations/admin/no-such-id")
        .insert_header(("Authorization", format!("Bearer {token}")))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 404);

    let req = test::TestRequest::get()
        .uri("/api/reservations/status/no-such-id")
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 404);
}

#[actix_web::test]
async fn admin_query_paginates_and_filters() {
    let (state, _mail_rx) = test_state().await;
    let app = test_app!(state);

    for i in 0..3 {
        let req = test::TestRequest::post()
            .uri("/api/reservations")
            .set_json(reservation_body(
                &format!("Misafir {i}"),
                &format!("misafir{i}@example.com"),
            ))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 201);
    }

    let admin = seed_admin(&state.db, 1).await;
    let token = issue_token(&state.jwt, &admin).unwrap();

    let req = test::TestRequest::get()
        .uri("/api/reservations/admin?status=pending&page=1&limit=1")
        .insert_header(("Authorization", format!("Bearer {token}")))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["reservations"].as_array().unwrap().len(), 1);
    assert_eq!(body["pagination"]["pages"], json!(3));
    assert_eq!(body["pagination"]["total"], json!(3));
    assert_eq!(body["pagination"]["current"], json!(1));

    // A cancelled filter matches nothing yet.
    let req = test::TestRequest::get()
        .uri("/api/reservations/admin?status=cancelled")
        .insert_header(("Authorization", format!("Bearer {token}")))
        .to_request();
    let body: Value = test::read_body_json(test::call_service(&app, req).await).await;
    assert_eq!(body["pagination"]["total"], json!(0));

    // Search hits a single customer.
    let req = test::TestRequest::get()
        .uri("/api/reservations/admin?search=misafir1")
        .insert_header(("Authorization", format!("Bearer {token}")))
        .to_request();
    let body: Value = test::read_body_json(test::call_service(&app, req).await).await;
    assert_eq!(body["pagination"]["total"], json!(1));
}

#[actix_web::test]
async fn confirmation_codes_stay_unique() {
    let (state, _mail_rx) = test_state().await;
    let app = test_app!(state);

    let mut codes = std::collections::HashSet::new();
    for i in 0..5 {
        let req = test::TestRequest::post()
            .uri("/api/reservations")
            .set_json(reservation_body(
                &format!("Misafir {i}"),
                &format!("misafir{i}@example.com"),
            ))
            .to_request();
        let body: Value = test::read_body_json(test::call_service(&app, req).await).await;
        let code = body["reservation"]["confirmationCode"]
            .as_str()
            .unwrap()
            .to_string();
        assert!(codes.insert(code), "confirmation code repeated");
    }

    // The store itself refuses a duplicate code.
    let now = Utc::now().to_rfc3339();
    let existing = codes.iter().next().unwrap().clone();
    let result = sqlx::query(
        r#"INSERT INTO reservations
           (id, customer_name, customer_email, customer_phone, date, time, guests,
            status, confirmation_code, created_at, updated_at)
           VALUES (?, 'X Y', 'x@y.co', '1', '2030-01-01', '12:00', '2', 'pending', ?, ?, ?)"#,
    )
    .bind(new_id())
    .bind(&existing)
    .bind(&now)
    .bind(&now)
    .execute(&state.db)
    .await;
    match result {
        Err(sqlx::Error::Database(db_err)) => assert!(db_err.is_unique_violation()),
        other => panic!("expected unique violation, got {other:?}"),
    }
}

#[actix_web::test]
async fn admin_delete_removes_reservation() {
    let (state, _mail_rx) = test_state().await;
    let app = test_app!(state);

    let req = test::TestRequest::post()
        .uri("/api/reservations")
        .set_json(reservation_body("Ayşe Yılmaz", "ayse@example.com"))
        .to_request();
    let created: Value = test::read_body_json(test::call_service(&app, req).await).await;
    let id = created["reservation"]["id"].as_str().unwrap().to_string();

    let admin = seed_admin(&state.db, 1).await;
    let token = issue_token(&state.jwt, &admin).unwrap();

    let req = test::TestRequest::delete()
        .uri(&format!("/api/reservations/admin/{id}"))
        .insert_header(("Authorization", format!("Bearer {token}")))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 200);

    let req = test::TestRequest::get()
        .uri(&format!("/api/reservations/status/{id}"))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 404);
}

#[actix_web::test]
async fn login_issues_usable_token() {
    let (state, _mail_rx) = test_state().await;
    let app = test_app!(state);
    let admin = seed_admin(&state.db, 1).await;

    let req = test::TestRequest::post()
        .uri("/api/auth/login")
        .set_json(json!({ "email": admin.email, "password": "admin123" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
    let body: Value = test::read_body_json(resp).await;
    let token = body["token"].as_str().unwrap().to_string();

    let req = test::TestRequest::get()
        .uri("/api/reservations/admin/stats")
        .insert_header(("Authorization", format!("Bearer {token}")))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["success"], json!(true));

    // Wrong password stays out.
    let req = test::TestRequest::post()
        .uri("/api/auth/login")
        .set_json(json!({ "email": admin.email, "password": "yanlis" }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 401);
}

#[actix_web::test]
async fn manual_review_is_public_until_hidden() {
    let (state, _mail_rx) = test_state().await;
    let app = test_app!(state);
    let admin = seed_admin(&state.db, 1).await;
    let token = issue_token(&state.jwt, &admin).unwrap();

    let req = test::TestRequest::post()
        .uri("/api/reviews/admin")
        .insert_header(("Authorization", format!("Bearer {token}")))
        .set_json(json!({
            "authorName": "Mehmet K.",
            "text": "Harika bir mekan",
            "rating": 5,
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 201);
    let body: Value = test::read_body_json(resp).await;
    let review_id = body["review"]["id"].as_str().unwrap().to_string();
    assert_eq!(body["review"]["source"], json!("manuel"));

    let req = test::TestRequest::get().uri("/api/reviews").to_request();
    let body: Value = test::read_body_json(test::call_service(&app, req).await).await;
    assert_eq!(body["reviews"].as_array().unwrap().len(), 1);

    let req = test::TestRequest::patch()
        .uri(&format!("/api/reviews/admin/{review_id}/toggle-visibility"))
        .insert_header(("Authorization", format!("Bearer {token}")))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 200);

    let req = test::TestRequest::get().uri("/api/reviews").to_request();
    let body: Value = test::read_body_json(test::call_service(&app, req).await).await;
    assert!(body["reviews"].as_array().unwrap().is_empty());
}

#[actix_web::test]
async fn out_of_range_rating_is_rejected() {
    let (state, _mail_rx) = test_state().await;
    let app = test_app!(state);
    let admin = seed_admin(&state.db, 1).await;
    let token = issue_token(&state.jwt, &admin).unwrap();

    let req = test::TestRequest::post()
        .uri("/api/reviews/admin")
        .insert_header(("Authorization", format!("Bearer {token}")))
        .set_json(json!({
            "authorName": "Mehmet K.",
            "text": "Harika",
            "rating": 6,
        }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 400);
}

#[actix_web::test]
async fn category_with_items_cannot_be_deleted() {
    let (state, _mail_rx) = test_state().await;
    let app = test_app!(state);
    let admin = seed_admin(&state.db, 1).await;
    let token = issue_token(&state.jwt, &admin).unwrap();

    let req = test::TestRequest::post()
        .uri("/api/menu/admin/categories")
        .insert_header(("Authorization", format!("Bearer {token}")))
        .set_json(json!({ "name": "Tatlılar", "description": "Ev yapımı tatlılar" }))
        .to_request();
    let body: Value = test::read_body_json(test::call_service(&app, req).await).await;
    let category_id = body["category"]["id"].as_str().unwrap().to_string();

    let now = Utc::now().to_rfc3339();
    sqlx::query(
        r#"INSERT INTO menu_items (id, name, description, category_id, created_at, updated_at)
           VALUES (?, 'Baklava', 'Fıstıklı', ?, ?, ?)"#,
    )
    .bind(new_id())
    .bind(&category_id)
    .bind(&now)
    .bind(&now)
    .execute(&state.db)
    .await
    .unwrap();

    let req = test::TestRequest::delete()
        .uri(&format!("/api/menu/admin/categories/{category_id}"))
        .insert_header(("Authorization", format!("Bearer {token}")))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["message"], json!("İçinde ürün bulunan kategori silinemez"));

    sqlx::query("DELETE FROM menu_items WHERE category_id = ?")
        .bind(&category_id)
        .execute(&state.db)
        .await
        .unwrap();

    let req = test::TestRequest::delete()
        .uri(&format!("/api/menu/admin/categories/{category_id}"))
        .insert_header(("Authorization", format!("Bearer {token}")))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 200);
}

#[actix_web::test]
async fn sync_without_credentials_reports_failure() {
    let (state, _mail_rx) = test_state().await;
    let app = test_app!(state);
    let admin = seed_admin(&state.db, 1).await;
    let token = issue_token(&state.jwt, &admin).unwrap();

    let req = test::TestRequest::post()
        .uri("/api/reviews/admin/sync-google")
        .insert_header(("Authorization", format!("Bearer {token}")))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["success"], json!(false));
    assert_eq!(body["message"], json!("Google My Business API yapılandırılmamış"));
}

#[actix_web::test]
async fn seeded_categories_appear_on_public_menu() {
    let (state, _mail_rx) = test_state().await;
    db::seed_defaults(&state.db).await.unwrap();
    let app = test_app!(state);

    let req = test::TestRequest::get().uri("/api/menu/categories").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
    let body: Value = test::read_body_json(resp).await;
    let categories = body["categories"].as_array().unwrap();
    assert_eq!(categories.len(), 4);
    assert_eq!(categories[0]["name"], json!("Kahveler"));
}

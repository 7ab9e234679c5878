use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{
    auth::{issue_token, verify_password},
    db::{fetch_reservation, fetch_user_by_email},
    error::ApiError,
    models::{MenuCategoryRow, MenuItemRow, ReviewRow},
    reservations::{self, ReservationInput},
    state::AppState,
};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PricesView {
    #[serde(skip_serializing_if = "Option::is_none")]
    medium: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    large: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    single: Option<f64>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MenuItemView {
    id: String,
    name: String,
    description: String,
    category: CategoryRef,
    prices: PricesView,
    image: Option<String>,
    ingredients: Vec<String>,
    allergens: Vec<String>,
    is_available: bool,
    is_popular: bool,
    is_vegetarian: bool,
    is_vegan: bool,
    is_gluten_free: bool,
    order: i64,
    preparation_time: i64,
}

#[derive(Serialize, Clone)]
#[serde(rename_all = "camelCase")]
struct CategoryRef {
    id: String,
    name: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CategoryWithItems {
    id: String,
    name: String,
    description: Option<String>,
    icon: Option<String>,
    order: i64,
    is_active: bool,
    items: Vec<MenuItemView>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ReviewView {
    id: String,
    author_name: String,
    text: String,
    rating: i64,
    source: String,
    review_date: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    profile_photo_url: Option<String>,
    created_at: String,
}

#[derive(Deserialize)]
struct LoginInput {
    email: String,
    password: String,
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/api/auth/login").route(web::post().to(login)))
        .service(web::resource("/api/reservations").route(web::post().to(create_reservation)))
        .service(
            web::resource("/api/reservations/status/{id}")
                .route(web::get().to(reservation_status)),
        )
        .service(web::resource("/api/menu/categories").route(web::get().to(menu_categories)))
        .service(web::resource("/api/menu/popular").route(web::get().to(popular_items)))
        .service(web::resource("/api/reviews").route(web::get().to(visible_reviews)))
        .service(web::resource("/health").route(web::get().to(health)));
}

async fn health() -> HttpResponse {
    HttpResponse::Ok().body("ok")
}

async fn login(
    state: web::Data<AppState>,
    payload: web::Json<LoginInput>,
) -> Result<HttpResponse, ApiError> {
    let payload = payload.into_inner();

    let user = match fetch_user_by_email(&state.db, &payload.email).await {
        Some(user) if user.active == 1 && verify_password(&payload.password, &user.password_hash) => {
            user
        }
        _ => {
            return Ok(HttpResponse::Unauthorized().json(json!({
                "success": false,
                "message": "Geçersiz email veya şifre",
            })))
        }
    };

    let token = issue_token(&state.jwt, &user)
        .map_err(|err| ApiError::Internal(format!("token issue failed: {err}")))?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "token": token,
        "user": {
            "id": user.id,
            "name": user.name,
            "email": user.email,
            "role": user.role,
        },
    })))
}

async fn create_reservation(
    state: web::Data<AppState>,
    payload: web::Json<ReservationInput>,
) -> Result<HttpResponse, ApiError> {
    let row = reservations::create(&state, payload.into_inner()).await?;

    Ok(HttpResponse::Created().json(json!({
        "success": true,
        "message": "Rezervasyonunuz başarıyla alındı. En kısa sürede size dönüş yapacağız.",
        "reservation": {
            "id": row.id,
            "confirmationCode": row.confirmation_code,
            "customerName": row.customer_name,
            "date": row.date,
            "time": row.time,
            "guests": row.guests,
            "status": row.status,
        },
    })))
}

async fn reservation_status(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    let row = fetch_reservation(&state.db, &id)
        .await
        .ok_or_else(|| ApiError::not_found("Rezervasyon bulunamadı"))?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "reservation": {
            "customerName": row.customer_name,
            "date": row.date,
            "time": row.time,
            "guests": row.guests,
            "status": row.status,
        },
    })))
}

async fn menu_categories(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let categories = sqlx::query_as::<_, MenuCategoryRow>(
        r#"SELECT id, name, description, icon, order_index, active, created_at
           FROM menu_categories
           WHERE active = 1
           ORDER BY order_index, name"#,
    )
    .fetch_all(&state.db)
    .await
    .unwrap_or_default();

    let mut views = Vec::with_capacity(categories.len());
    for category in categories {
        let items = sqlx::query_as::<_, MenuItemRow>(
            r#"SELECT id, name, description, category_id, price_medium, price_large, price_single,
                      image, ingredients, allergens, available, popular, vegetarian, vegan,
                      gluten_free, order_index, preparation_time, created_at, updated_at
               FROM menu_items
               WHERE category_id = ? AND available = 1
               ORDER BY order_index, name"#,
        )
        .bind(&category.id)
        .fetch_all(&state.db)
        .await
        .unwrap_or_default();

        let category_ref = CategoryRef {
            id: category.id.clone(),
            name: category.name.clone(),
        };
        views.push(CategoryWithItems {
            id: category.id,
            name: category.name,
            description: category.description,
            icon: category.icon,
            order: category.order_index,
            is_active: category.active == 1,
            items: items
                .into_iter()
                .map(|item| item_view(item, category_ref.clone()))
                .collect(),
        });
    }

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "categories": views,
    })))
}

async fn popular_items(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let rows = sqlx::query_as::<_, MenuItemRow>(
        r#"SELECT i.id, i.name, i.description, i.category_id, i.price_medium, i.price_large,
                  i.price_single, i.image, i.ingredients, i.allergens, i.available, i.popular,
                  i.vegetarian, i.vegan, i.gluten_free, i.order_index, i.preparation_time,
                  i.created_at, i.updated_at
           FROM menu_items i
           WHERE i.popular = 1 AND i.available = 1
           ORDER BY i.order_index
           LIMIT 8"#,
    )
    .fetch_all(&state.db)
    .await
    .unwrap_or_default();

    let mut items = Vec::with_capacity(rows.len());
    for row in rows {
        let name = sqlx::query_scalar::<_, String>("SELECT name FROM menu_categories WHERE id = ?")
            .bind(&row.category_id)
            .fetch_optional(&state.db)
            .await
            .unwrap_or(None)
            .unwrap_or_default();
        let category_ref = CategoryRef {
            id: row.category_id.clone(),
            name,
        };
        items.push(item_view(row, category_ref));
    }

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "items": items,
    })))
}

async fn visible_reviews(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let rows = sqlx::query_as::<_, ReviewRow>(
        r#"SELECT id, google_review_id, author_name, text, rating, source, visible, review_date,
                  profile_photo_url, created_at
           FROM reviews
           WHERE visible = 1 AND rating >= 4
           ORDER BY created_at DESC
           LIMIT 3"#,
    )
    .fetch_all(&state.db)
    .await
    .unwrap_or_default();

    let reviews: Vec<ReviewView> = rows
        .into_iter()
        .map(|row| ReviewView {
            id: row.id,
            author_name: row.author_name,
            text: row.text,
            rating: row.rating,
            source: row.source,
            review_date: row.review_date,
            profile_photo_url: row.profile_photo_url,
            created_at: row.created_at,
        })
        .collect();

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "reviews": reviews,
    })))
}

fn item_view(row: MenuItemRow, category: CategoryRef) -> MenuItemView {
    MenuItemView {
        id: row.id,
        name: row.name,
        description: row.description,
        category,
        prices: PricesView {
            medium: row.price_medium,
            large: row.price_large,
            single: row.price_single,
        },
        image: row.image,
        ingredients: serde_json::from_str(&row.ingredients).unwrap_or_default(),
        allergens: serde_json::from_str(&row.allergens).unwrap_or_default(),
        is_available: row.available == 1,
        is_popular: row.popular == 1,
        is_vegetarian: row.vegetarian == 1,
        is_vegan: row.vegan == 1,
        is_gluten_free: row.gluten_free == 1,
        order: row.order_index,
        preparation_time: row.preparation_time,
    }
}

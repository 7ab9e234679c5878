use actix_multipart::Multipart;
use actix_web::{middleware::from_fn, web, HttpResponse};
use chrono::{Local, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::SqlitePool;

use crate::{
    auth::{admin_guard, new_id, AuthAdmin},
    db::fetch_review,
    error::{ApiError, FieldError},
    google,
    models::{MenuCategoryRow, MenuItemRow, ReservationRow, ReviewRow, SOURCE_MANUAL},
    reservations::{self, ReservationFilter, StatusUpdateInput},
    state::AppState,
    upload,
};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ReservationView {
    id: String,
    customer_name: String,
    customer_email: String,
    customer_phone: String,
    date: String,
    time: String,
    guests: String,
    message: Option<String>,
    status: String,
    confirmation_code: String,
    admin_notes: Option<String>,
    table_number: Option<String>,
    created_by: String,
    last_modified_by: Option<String>,
    created_at: String,
    updated_at: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CategoryView {
    id: String,
    name: String,
    description: Option<String>,
    icon: Option<String>,
    order: i64,
    is_active: bool,
    created_at: String,
}

#[derive(Serialize, Clone)]
#[serde(rename_all = "camelCase")]
struct CategoryRef {
    id: String,
    name: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ItemView {
    id: String,
    name: String,
    description: String,
    category: CategoryRef,
    prices: serde_json::Value,
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
    created_at: String,
    updated_at: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ReviewAdminView {
    id: String,
    google_review_id: Option<String>,
    author_name: String,
    text: String,
    rating: i64,
    source: String,
    is_visible: bool,
    review_date: String,
    profile_photo_url: Option<String>,
    created_at: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CategoryInput {
    name: Option<String>,
    description: Option<String>,
    icon: Option<String>,
    order: Option<i64>,
    is_active: Option<bool>,
}

#[derive(Deserialize)]
struct ItemFilter {
    page: Option<i64>,
    limit: Option<i64>,
    category: Option<String>,
    search: Option<String>,
}

#[derive(Deserialize)]
struct ReviewFilter {
    page: Option<i64>,
    limit: Option<i64>,
    rating: Option<i64>,
    source: Option<String>,
    search: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReviewInput {
    author_name: String,
    text: String,
    rating: i64,
}

#[derive(Debug, Default, Deserialize)]
struct PricesInput {
    medium: Option<f64>,
    large: Option<f64>,
    single: Option<f64>,
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/reservations/admin")
            .wrap(from_fn(admin_guard))
            .service(web::resource("").route(web::get().to(list_reservations)))
            .service(web::resource("/stats").route(web::get().to(reservation_stats)))
            .service(
                web::resource("/{id}/status").route(web::patch().to(update_reservation_status)),
            )
            .service(web::resource("/{id}").route(web::delete().to(delete_reservation))),
    )
    .service(
        web::scope("/api/menu/admin")
            .wrap(from_fn(admin_guard))
            .service(
                web::resource("/categories")
                    .route(web::get().to(list_categories))
                    .route(web::post().to(create_category)),
            )
            .service(
                web::resource("/categories/{id}")
                    .route(web::put().to(update_category))
                    .route(web::delete().to(delete_category)),
            )
            .service(
                web::resource("/items")
                    .route(web::get().to(list_items))
                    .route(web::post().to(create_item)),
            )
            .service(
                web::resource("/items/{id}/toggle-availability")
                    .route(web::patch().to(toggle_availability)),
            )
            .service(
                web::resource("/items/{id}/toggle-popular")
                    .route(web::patch().to(toggle_popular)),
            )
            .service(
                web::resource("/items/{id}")
                    .route(web::put().to(update_item))
                    .route(web::delete().to(delete_item)),
            ),
    )
    .service(
        web::scope("/api/reviews/admin")
            .wrap(from_fn(admin_guard))
            .service(
                web::resource("")
                    .route(web::get().to(list_reviews))
                    .route(web::post().to(create_review)),
            )
            .service(web::resource("/sync-google").route(web::post().to(sync_google)))
            .service(
                web::resource("/{id}/toggle-visibility")
                    .route(web::patch().to(toggle_review_visibility)),
            )
            .service(web::resource("/{id}").route(web::delete().to(delete_review))),
    )
    .service(
        web::scope("/api/admin")
            .wrap(from_fn(admin_guard))
            .service(web::resource("/dashboard").route(web::get().to(dashboard)))
            .service(web::resource("/settings").route(web::get().to(settings))),
    );
}

// ========== Reservations ==========

async fn list_reservations(
    state: web::Data<AppState>,
    query: web::Query<ReservationFilter>,
) -> Result<HttpResponse, ApiError> {
    let filter = query.into_inner();
    let (rows, total) = reservations::query(&state.db, &filter).await?;

    let page = filter.page.unwrap_or(1).max(1);
    let limit = filter.limit.unwrap_or(20).max(1);
    let views: Vec<ReservationView> = rows.into_iter().map(reservation_view).collect();

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "reservations": views,
        "pagination": {
            "current": page,
            "pages": reservations::page_count(total, limit),
            "total": total,
        },
    })))
}

async fn reservation_stats(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let stats = reservations::stats(&state.db).await?;
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "stats": stats,
    })))
}

async fn update_reservation_status(
    state: web::Data<AppState>,
    path: web::Path<String>,
    payload: web::Json<StatusUpdateInput>,
    auth: web::ReqData<AuthAdmin>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    let row = reservations::update_status(&state, &id, payload.into_inner(), &auth.id).await?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Rezervasyon durumu güncellendi",
        "reservation": reservation_view(row),
    })))
}

async fn delete_reservation(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    reservations::delete(&state.db, &path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Rezervasyon başarıyla silindi",
    })))
}

// ========== Menu categories ==========

async fn list_categories(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let rows = sqlx::query_as::<_, MenuCategoryRow>(
        r#"SELECT id, name, description, icon, order_index, active, created_at
           FROM menu_categories
           ORDER BY order_index, name"#,
    )
    .fetch_all(&state.db)
    .await
    .unwrap_or_default();

    let categories: Vec<CategoryView> = rows.into_iter().map(category_view).collect();
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "categories": categories,
    })))
}

async fn create_category(
    state: web::Data<AppState>,
    payload: web::Json<CategoryInput>,
) -> Result<HttpResponse, ApiError> {
    let payload = payload.into_inner();
    let name = payload.name.as_deref().unwrap_or_default().trim().to_string();
    if name.is_empty() {
        return Err(ApiError::Validation(vec![FieldError::new(
            "name",
            "Kategori adı gerekli",
        )]));
    }

    let row = MenuCategoryRow {
        id: new_id(),
        name,
        description: payload
            .description
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty()),
        icon: payload.icon,
        order_index: payload.order.unwrap_or(0),
        active: i64::from(payload.is_active.unwrap_or(true)),
        created_at: Utc::now().to_rfc3339(),
    };

    sqlx::query(
        r#"INSERT INTO menu_categories (id, name, description, icon, order_index, active, created_at)
           VALUES (?, ?, ?, ?, ?, ?, ?)"#,
    )
    .bind(&row.id)
    .bind(&row.name)
    .bind(&row.description)
    .bind(&row.icon)
    .bind(row.order_index)
    .bind(row.active)
    .bind(&row.created_at)
    .execute(&state.db)
    .await?;

    Ok(HttpResponse::Created().json(json!({
        "success": true,
        "message": "Kategori başarıyla oluşturuldu",
        "category": category_view(row),
    })))
}

async fn update_category(
    state: web::Data<AppState>,
    path: web::Path<String>,
    payload: web::Json<CategoryInput>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    let payload = payload.into_inner();

    let mut row = sqlx::query_as::<_, MenuCategoryRow>(
        r#"SELECT id, name, description, icon, order_index, active, created_at
           FROM menu_categories WHERE id = ? LIMIT 1"#,
    )
    .bind(&id)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| ApiError::not_found("Kategori bulunamadı"))?;

    if let Some(name) = payload.name {
        if !name.trim().is_empty() {
            row.name = name.trim().to_string();
        }
    }
    if let Some(description) = payload.description {
        row.description = Some(description);
    }
    if let Some(icon) = payload.icon {
        row.icon = Some(icon);
    }
    if let Some(order) = payload.order {
        row.order_index = order;
    }
    if let Some(active) = payload.is_active {
        row.active = i64::from(active);
    }

    sqlx::query(
        "UPDATE menu_categories SET name = ?, description = ?, icon = ?, order_index = ?, active = ? WHERE id = ?",
    )
    .bind(&row.name)
    .bind(&row.description)
    .bind(&row.icon)
    .bind(row.order_index)
    .bind(row.active)
    .bind(&row.id)
    .execute(&state.db)
    .await?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Kategori başarıyla güncellendi",
        "category": category_view(row),
    })))
}

async fn delete_category(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();

    let item_count =
        count_bound(&state.db, "SELECT COUNT(*) FROM menu_items WHERE category_id = ?", &id).await;
    if item_count > 0 {
        return Err(ApiError::bad_request("İçinde ürün bulunan kategori silinemez"));
    }

    let deleted = sqlx::query("DELETE FROM menu_categories WHERE id = ?")
        .bind(&id)
        .execute(&state.db)
        .await?;
    if deleted.rows_affected() == 0 {
        return Err(ApiError::not_found("Kategori bulunamadı"));
    }

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Kategori başarıyla silindi",
    })))
}

// ========== Menu items ==========

async fn list_items(
    state: web::Data<AppState>,
    query: web::Query<ItemFilter>,
) -> Result<HttpResponse, ApiError> {
    let filter = query.into_inner();

    let mut conditions: Vec<&str> = Vec::new();
    let mut binds: Vec<String> = Vec::new();
    if let Some(category) = filter.category.as_deref() {
        if !category.is_empty() {
            conditions.push("category_id = ?");
            binds.push(category.to_string());
        }
    }
    if let Some(search) = filter.search.as_deref() {
        if !search.trim().is_empty() {
            conditions.push("(LOWER(name) LIKE ? OR LOWER(description) LIKE ?)");
            let pattern = format!("%{}%", search.trim().to_lowercase());
            binds.push(pattern.clone());
            binds.push(pattern);
        }
    }

    let where_clause = if conditions.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", conditions.join(" AND "))
    };

    let count_sql = format!("SELECT COUNT(*) FROM menu_items{where_clause}");
    let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
    for bind in &binds {
        count_query = count_query.bind(bind);
    }
    let total = count_query.fetch_one(&state.db).await.unwrap_or(0);

    let page = filter.page.unwrap_or(1).max(1);
    let limit = filter.limit.unwrap_or(20).max(1);

    let select_sql = format!(
        r#"SELECT id, name, description, category_id, price_medium, price_large, price_single,
                  image, ingredients, allergens, available, popular, vegetarian, vegan,
                  gluten_free, order_index, preparation_time, created_at, updated_at
           FROM menu_items{where_clause}
           ORDER BY order_index, name
           LIMIT ? OFFSET ?"#,
    );
    let mut select_query = sqlx::query_as::<_, MenuItemRow>(&select_sql);
    for bind in &binds {
        select_query = select_query.bind(bind);
    }
    let rows = select_query
        .bind(limit)
        .bind((page - 1) * limit)
        .fetch_all(&state.db)
        .await
        .unwrap_or_default();

    let mut items = Vec::with_capacity(rows.len());
    for row in rows {
        let category = category_ref(&state.db, &row.category_id).await;
        items.push(item_view(row, category));
    }

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "items": items,
        "pagination": {
            "current": page,
            "pages": reservations::page_count(total, limit),
            "total": total,
        },
    })))
}

async fn create_item(
    state: web::Data<AppState>,
    payload: Multipart,
) -> Result<HttpResponse, ApiError> {
    let form = upload::read_item_form(payload).await?;

    let mut errors = Vec::new();
    if form.get("name").trim().is_empty() {
        errors.push(FieldError::new("name", "Ürün adı gerekli"));
    }
    if form.get("description").trim().is_empty() {
        errors.push(FieldError::new("description", "Ürün açıklaması gerekli"));
    }
    let category_id = form.get("category").trim().to_string();
    let category = if category_id.is_empty() {
        None
    } else {
        sqlx::query_as::<_, (String, String)>(
            "SELECT id, name FROM menu_categories WHERE id = ? LIMIT 1",
        )
        .bind(&category_id)
        .fetch_optional(&state.db)
        .await
        .unwrap_or(None)
    };
    if category.is_none() {
        errors.push(FieldError::new("category", "Geçerli kategori seçin"));
    }
    if !errors.is_empty() {
        return Err(ApiError::Validation(errors));
    }

    let prices: PricesInput = serde_json::from_str(form.get("prices")).unwrap_or_default();
    let ingredients = parse_string_list(form.get("ingredients"));
    let allergens = parse_string_list(form.get("allergens"));
    let now = Utc::now().to_rfc3339();

    let row = MenuItemRow {
        id: new_id(),
        name: form.get("name").trim().to_string(),
        description: form.get("description").trim().to_string(),
        category_id,
        price_medium: prices.medium,
        price_large: prices.large,
        price_single: prices.single,
        image: form.image.clone(),
        ingredients: serde_json::to_string(&ingredients).unwrap_or_else(|_| "[]".to_string()),
        allergens: serde_json::to_string(&allergens).unwrap_or_else(|_| "[]".to_string()),
        available: i64::from(form.get_opt("isAvailable").map(parse_bool).unwrap_or(true)),
        popular: i64::from(form.get_opt("isPopular").map(parse_bool).unwrap_or(false)),
        vegetarian: i64::from(form.get_opt("isVegetarian").map(parse_bool).unwrap_or(false)),
        vegan: i64::from(form.get_opt("isVegan").map(parse_bool).unwrap_or(false)),
        gluten_free: i64::from(form.get_opt("isGlutenFree").map(parse_bool).unwrap_or(false)),
        order_index: form
            .get_opt("order")
            .and_then(|value| value.parse().ok())
            .unwrap_or(0),
        preparation_time: form
            .get_opt("preparationTime")
            .and_then(|value| value.parse().ok())
            .unwrap_or(15),
        created_at: now.clone(),
        updated_at: now,
    };

    sqlx::query(
        r#"INSERT INTO menu_items
           (id, name, description, category_id, price_medium, price_large, price_single, image,
            ingredients, allergens, available, popular, vegetarian, vegan, gluten_free,
            order_index, preparation_time, created_at, updated_at)
           VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
    )
    .bind(&row.id)
    .bind(&row.name)
    .bind(&row.description)
    .bind(&row.category_id)
    .bind(row.price_medium)
    .bind(row.price_large)
    .bind(row.price_single)
    .bind(&row.image)
    .bind(&row.ingredients)
    .bind(&row.allergens)
    .bind(row.available)
    .bind(row.popular)
    .bind(row.vegetarian)
    .bind(row.vegan)
    .bind(row.gluten_free)
    .bind(row.order_index)
    .bind(row.preparation_time)
    .bind(&row.created_at)
    .bind(&row.updated_at)
    .execute(&state.db)
    .await?;

    let category = category_ref(&state.db, &row.category_id).await;
    Ok(HttpResponse::Created().json(json!({
        "success": true,
        "message": "Menü ürünü başarıyla oluşturuldu",
        "item": item_view(row, category),
    })))
}

async fn update_item(
    state: web::Data<AppState>,
    path: web::Path<String>,
    payload: Multipart,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    let form = upload::read_item_form(payload).await?;

    let mut row = fetch_item(&state.db, &id)
        .await
        .ok_or_else(|| ApiError::not_found("Menü ürünü bulunamadı"))?;

    if let Some(name) = form.get_opt("name") {
        row.name = name.trim().to_string();
    }
    if let Some(description) = form.get_opt("description") {
        row.description = description.trim().to_string();
    }
    if let Some(category) = form.get_opt("category") {
        row.category_id = category.to_string();
    }
    if let Some(prices) = form
        .get_opt("prices")
        .and_then(|raw| serde_json::from_str::<PricesInput>(raw).ok())
    {
        row.price_medium = prices.medium;
        row.price_large = prices.large;
        row.price_single = prices.single;
    }
    if let Some(image) = form.image.clone() {
        row.image = Some(image);
    }
    if let Some(raw) = form.get_opt("ingredients") {
        row.ingredients =
            serde_json::to_string(&parse_string_list(raw)).unwrap_or_else(|_| "[]".to_string());
    }
    if let Some(raw) = form.get_opt("allergens") {
        row.allergens =
            serde_json::to_string(&parse_string_list(raw)).unwrap_or_else(|_| "[]".to_string());
    }
    if let Some(value) = form.get_opt("isAvailable") {
        row.available = i64::from(parse_bool(value));
    }
    if let Some(value) = form.get_opt("isPopular") {
        row.popular = i64::from(parse_bool(value));
    }
    if let Some(value) = form.get_opt("isVegetarian") {
        row.vegetarian = i64::from(parse_bool(value));
    }
    if let Some(value) = form.get_opt("isVegan") {
        row.vegan = i64::from(parse_bool(value));
    }
    if let Some(value) = form.get_opt("isGlutenFree") {
        row.gluten_free = i64::from(parse_bool(value));
    }
    if let Some(order) = form.get_opt("order").and_then(|value| value.parse().ok()) {
        row.order_index = order;
    }
    if let Some(minutes) = form
        .get_opt("preparationTime")
        .and_then(|value| value.parse().ok())
    {
        row.preparation_time = minutes;
    }
    row.updated_at = Utc::now().to_rfc3339();

    sqlx::query(
        r#"UPDATE menu_items
           SET name = ?, description = ?, category_id = ?, price_medium = ?, price_large = ?,
               price_single = ?, image = ?, ingredients = ?, allergens = ?, available = ?,
               popular = ?, vegetarian = ?, vegan = ?, gluten_free = ?, order_index = ?,
               preparation_time = ?, updated_at = ?
           WHERE id = ?"#,
    )
    .bind(&row.name)
    .bind(&row.description)
    .bind(&row.category_id)
    .bind(row.price_medium)
    .bind(row.price_large)
    .bind(row.price_single)
    .bind(&row.image)
    .bind(&row.ingredients)
    .bind(&row.allergens)
    .bind(row.available)
    .bind(row.popular)
    .bind(row.vegetarian)
    .bind(row.vegan)
    .bind(row.gluten_free)
    .bind(row.order_index)
    .bind(row.preparation_time)
    .bind(&row.updated_at)
    .bind(&row.id)
    .execute(&state.db)
    .await?;

    let category = category_ref(&state.db, &row.category_id).await;
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Menü ürünü başarıyla güncellendi",
        "item": item_view(row, category),
    })))
}

async fn delete_item(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let deleted = sqlx::query("DELETE FROM menu_items WHERE id = ?")
        .bind(path.into_inner())
        .execute(&state.db)
        .await?;
    if deleted.rows_affected() == 0 {
        return Err(ApiError::not_found("Menü ürünü bulunamadı"));
    }

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Menü ürünü başarıyla silindi",
    })))
}

async fn toggle_availability(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    toggle_item_flag(&state, &path.into_inner(), "available", |available| {
        if available {
            "Ürün aktif hale getirildi"
        } else {
            "Ürün pasif hale getirildi"
        }
    })
    .await
}

async fn toggle_popular(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    toggle_item_flag(&state, &path.into_inner(), "popular", |popular| {
        if popular {
            "Ürün popüler ürünlere eklendi"
        } else {
            "Ürün popüler ürünlerden çıkarıldı"
        }
    })
    .await
}

async fn toggle_item_flag(
    state: &AppState,
    id: &str,
    column: &str,
    message: fn(bool) -> &'static str,
) -> Result<HttpResponse, ApiError> {
    let row = fetch_item(&state.db, id)
        .await
        .ok_or_else(|| ApiError::not_found("Menü ürünü bulunamadı"))?;

    let new_value = match column {
        "available" => i64::from(row.available == 0),
        _ => i64::from(row.popular == 0),
    };
    let sql = format!("UPDATE menu_items SET {column} = ?, updated_at = ? WHERE id = ?");
    sqlx::query(&sql)
        .bind(new_value)
        .bind(Utc::now().to_rfc3339())
        .bind(id)
        .execute(&state.db)
        .await?;

    let row = MenuItemRow {
        available: if column == "available" { new_value } else { row.available },
        popular: if column == "popular" { new_value } else { row.popular },
        ..row
    };
    let category = category_ref(&state.db, &row.category_id).await;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": message(new_value == 1),
        "item": item_view(row, category),
    })))
}

// ========== Reviews ==========

async fn list_reviews(
    state: web::Data<AppState>,
    query: web::Query<ReviewFilter>,
) -> Result<HttpResponse, ApiError> {
    let filter = query.into_inner();

    let mut conditions: Vec<&str> = Vec::new();
    let mut binds: Vec<String> = Vec::new();
    if let Some(rating) = filter.rating {
        conditions.push("rating = ?");
        binds.push(rating.to_string());
    }
    if let Some(source) = filter.source.as_deref() {
        if !source.is_empty() {
            conditions.push("source = ?");
            binds.push(source.to_string());
        }
    }
    if let Some(search) = filter.search.as_deref() {
        if !search.trim().is_empty() {
            conditions.push("(LOWER(author_name) LIKE ? OR LOWER(text) LIKE ?)");
            let pattern = format!("%{}%", search.trim().to_lowercase());
            binds.push(pattern.clone());
            binds.push(pattern);
        }
    }

    let where_clause = if conditions.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", conditions.join(" AND "))
    };

    let count_sql = format!("SELECT COUNT(*) FROM reviews{where_clause}");
    let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
    for bind in &binds {
        count_query = count_query.bind(bind);
    }
    let total = count_query.fetch_one(&state.db).await.unwrap_or(0);

    let page = filter.page.unwrap_or(1).max(1);
    let limit = filter.limit.unwrap_or(20).max(1);

    let select_sql = format!(
        r#"SELECT id, google_review_id, author_name, text, rating, source, visible, review_date,
                  profile_photo_url, created_at
           FROM reviews{where_clause}
           ORDER BY created_at DESC
           LIMIT ? OFFSET ?"#,
    );
    let mut select_query = sqlx::query_as::<_, ReviewRow>(&select_sql);
    for bind in &binds {
        select_query = select_query.bind(bind);
    }
    let rows = select_query
        .bind(limit)
        .bind((page - 1) * limit)
        .fetch_all(&state.db)
        .await
        .unwrap_or_default();

    let reviews: Vec<ReviewAdminView> = rows.into_iter().map(review_view).collect();
    let average = average_rating(&state.db).await;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "reviews": reviews,
        "stats": {
            "toplam": count(&state.db, "SELECT COUNT(*) FROM reviews").await,
            "ortalamaPuan": average,
            "google": count(&state.db, "SELECT COUNT(*) FROM reviews WHERE source = 'google'").await,
            "manuel": count(&state.db, "SELECT COUNT(*) FROM reviews WHERE source = 'manuel'").await,
            "görünür": count(&state.db, "SELECT COUNT(*) FROM reviews WHERE visible = 1").await,
        },
        "pagination": {
            "current": page,
            "pages": reservations::page_count(total, limit),
            "total": total,
        },
    })))
}

async fn create_review(
    state: web::Data<AppState>,
    payload: web::Json<ReviewInput>,
) -> Result<HttpResponse, ApiError> {
    let payload = payload.into_inner();

    let mut errors = Vec::new();
    if payload.author_name.trim().is_empty() {
        errors.push(FieldError::new("authorName", "Yazar adı gerekli"));
    }
    if payload.text.trim().is_empty() {
        errors.push(FieldError::new("text", "Yorum metni gerekli"));
    }
    if !(1..=5).contains(&payload.rating) {
        errors.push(FieldError::new("rating", "1-5 arası puan verin"));
    }
    if !errors.is_empty() {
        return Err(ApiError::Validation(errors));
    }

    let now = Utc::now().to_rfc3339();
    let row = ReviewRow {
        id: new_id(),
        google_review_id: None,
        author_name: payload.author_name.trim().to_string(),
        text: payload.text.trim().to_string(),
        rating: payload.rating,
        source: SOURCE_MANUAL.to_string(),
        visible: 1,
        review_date: now.clone(),
        profile_photo_url: None,
        created_at: now,
    };

    sqlx::query(
        r#"INSERT INTO reviews
           (id, google_review_id, author_name, text, rating, source, visible, review_date,
            profile_photo_url, created_at)
           VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
    )
    .bind(&row.id)
    .bind(&row.google_review_id)
    .bind(&row.author_name)
    .bind(&row.text)
    .bind(row.rating)
    .bind(&row.source)
    .bind(row.visible)
    .bind(&row.review_date)
    .bind(&row.profile_photo_url)
    .bind(&row.created_at)
    .execute(&state.db)
    .await?;

    Ok(HttpResponse::Created().json(json!({
        "success": true,
        "message": "Yorum başarıyla eklendi",
        "review": review_view(row),
    })))
}

async fn toggle_review_visibility(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    let row = fetch_review(&state.db, &id)
        .await
        .ok_or_else(|| ApiError::not_found("Yorum bulunamadı"))?;

    let visible = i64::from(row.visible == 0);
    sqlx::query("UPDATE reviews SET visible = ? WHERE id = ?")
        .bind(visible)
        .bind(&id)
        .execute(&state.db)
        .await?;

    let row = ReviewRow { visible, ..row };
    let message = if visible == 1 {
        "Yorum görünür hale getirildi"
    } else {
        "Yorum gizli hale getirildi"
    };

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": message,
        "review": review_view(row),
    })))
}

async fn delete_review(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let deleted = sqlx::query("DELETE FROM reviews WHERE id = ?")
        .bind(path.into_inner())
        .execute(&state.db)
        .await?;
    if deleted.rows_affected() == 0 {
        return Err(ApiError::not_found("Yorum bulunamadı"));
    }

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Yorum başarıyla silindi",
    })))
}

async fn sync_google(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    match google::sync_reviews(&state).await {
        Ok(outcome) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "message": format!("{} yeni yorum senkronize edildi", outcome.new_reviews),
            "totalReviews": outcome.total_reviews,
        }))),
        Err(err) => {
            log::warn!("Google review sync failed: {err}");
            Err(ApiError::BadRequest(err.to_string()))
        }
    }
}

// ========== Dashboard and settings ==========

async fn dashboard(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let today = Local::now().date_naive();
    let today_str = today.format("%Y-%m-%d").to_string();
    let week_ago = (today - chrono::Duration::days(7)).format("%Y-%m-%d").to_string();
    let month_ago = (today - chrono::Duration::days(30)).format("%Y-%m-%d").to_string();

    let db = &state.db;
    let reservation_stats = json!({
        "bugün": count_bound(db, "SELECT COUNT(*) FROM reservations WHERE date = ?", &today_str).await,
        "beklemede": count(db, "SELECT COUNT(*) FROM reservations WHERE status = 'pending'").await,
        "buHafta": count_bound(db, "SELECT COUNT(*) FROM reservations WHERE date >= ?", &week_ago).await,
        "buAy": count_bound(db, "SELECT COUNT(*) FROM reservations WHERE date >= ?", &month_ago).await,
        "toplam": count(db, "SELECT COUNT(*) FROM reservations").await,
    });

    let menu_stats = json!({
        "toplamÜrün": count(db, "SELECT COUNT(*) FROM menu_items").await,
        "aktifÜrün": count(db, "SELECT COUNT(*) FROM menu_items WHERE available = 1").await,
        "popülerÜrün": count(db, "SELECT COUNT(*) FROM menu_items WHERE popular = 1").await,
        "kategori": count(db, "SELECT COUNT(*) FROM menu_categories WHERE active = 1").await,
    });

    let review_stats = json!({
        "toplam": count(db, "SELECT COUNT(*) FROM reviews").await,
        "görünür": count(db, "SELECT COUNT(*) FROM reviews WHERE visible = 1").await,
        "ortalamaPuan": average_rating(db).await,
    });

    let recent_reservations = sqlx::query_as::<_, ReservationRow>(
        r#"SELECT id, customer_name, customer_email, customer_phone, date, time, guests, message,
                  status, confirmation_code, admin_notes, table_number, created_by,
                  last_modified_by, created_at, updated_at
           FROM reservations
           ORDER BY created_at DESC
           LIMIT 5"#,
    )
    .fetch_all(db)
    .await
    .unwrap_or_default();

    let recent_reviews = sqlx::query_as::<_, ReviewRow>(
        r#"SELECT id, google_review_id, author_name, text, rating, source, visible, review_date,
                  profile_photo_url, created_at
           FROM reviews
           WHERE visible = 1
           ORDER BY created_at DESC
           LIMIT 3"#,
    )
    .fetch_all(db)
    .await
    .unwrap_or_default();

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "stats": {
            "rezervasyonlar": reservation_stats,
            "menü": menu_stats,
            "yorumlar": review_stats,
        },
        "recentReservations": recent_reservations
            .into_iter()
            .map(|row| json!({
                "id": row.id,
                "customerName": row.customer_name,
                "date": row.date,
                "time": row.time,
                "guests": row.guests,
                "status": row.status,
            }))
            .collect::<Vec<_>>(),
        "recentReviews": recent_reviews
            .into_iter()
            .map(|row| json!({
                "authorName": row.author_name,
                "text": row.text,
                "rating": row.rating,
                "createdAt": row.created_at,
            }))
            .collect::<Vec<_>>(),
    })))
}

async fn settings(_auth: web::ReqData<AuthAdmin>) -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "success": true,
        "settings": {
            "restaurantInfo": {
                "name": "LunaBrew",
                "address": "Ankara, Çankaya, Tunalı Hilmi Caddesi, No: 12T.",
                "phone": "(312) 454 8484",
                "email": "info@lunabrew.com",
            },
            "workingHours": {
                "pazartesi": { "açılış": "09:00", "kapanış": "23:00" },
                "salı": { "açılış": "09:00", "kapanış": "23:00" },
                "çarşamba": { "açılış": "09:00", "kapanış": "23:00" },
                "perşembe": { "açılış": "09:00", "kapanış": "23:00" },
                "cuma": { "açılış": "10:00", "kapanış": "22:00" },
                "cumartesi": { "açılış": "09:30", "kapanış": "24:00" },
                "pazar": { "açılış": "09:30", "kapanış": "24:00" },
            },
        },
    }))
}

// ========== Helpers ==========

async fn count(pool: &SqlitePool, sql: &str) -> i64 {
    sqlx::query_scalar::<_, i64>(sql)
        .fetch_one(pool)
        .await
        .unwrap_or(0)
}

async fn count_bound(pool: &SqlitePool, sql: &str, bind: &str) -> i64 {
    sqlx::query_scalar::<_, i64>(sql)
        .bind(bind)
        .fetch_one(pool)
        .await
        .unwrap_or(0)
}

async fn average_rating(pool: &SqlitePool) -> f64 {
    let average = sqlx::query_scalar::<_, Option<f64>>("SELECT AVG(rating) FROM reviews")
        .fetch_one(pool)
        .await
        .unwrap_or(None)
        .unwrap_or(0.0);
    (average * 10.0).round() / 10.0
}

async fn fetch_item(pool: &SqlitePool, id: &str) -> Option<MenuItemRow> {
    sqlx::query_as::<_, MenuItemRow>(
        r#"SELECT id, name, description, category_id, price_medium, price_large, price_single,
                  image, ingredients, allergens, available, popular, vegetarian, vegan,
                  gluten_free, order_index, preparation_time, created_at, updated_at
           FROM menu_items
           WHERE id = ?
           LIMIT 1"#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .unwrap_or(None)
}

async fn category_ref(pool: &SqlitePool, category_id: &str) -> CategoryRef {
    let name = sqlx::query_scalar::<_, String>("SELECT name FROM menu_categories WHERE id = ?")
        .bind(category_id)
        .fetch_optional(pool)
        .await
        .unwrap_or(None)
        .unwrap_or_default();
    CategoryRef {
        id: category_id.to_string(),
        name,
    }
}

fn parse_bool(value: &str) -> bool {
    matches!(value.trim(), "true" | "1" | "on")
}

fn parse_string_list(raw: &str) -> Vec<String> {
    serde_json::from_str(raw).unwrap_or_default()
}

fn reservation_view(row: ReservationRow) -> ReservationView {
    ReservationView {
        id: row.id,
        customer_name: row.customer_name,
        customer_email: row.customer_email,
        customer_phone: row.customer_phone,
        date: row.date,
        time: row.time,
        guests: row.guests,
        message: row.message,
        status: row.status,
        confirmation_code: row.confirmation_code,
        admin_notes: row.admin_notes,
        table_number: row.table_number,
        created_by: row.created_by,
        last_modified_by: row.last_modified_by,
        created_at: row.created_at,
        updated_at: row.updated_at,
    }
}

fn category_view(row: MenuCategoryRow) -> CategoryView {
    CategoryView {
        id: row.id,
        name: row.name,
        description: row.description,
        icon: row.icon,
        order: row.order_index,
        is_active: row.active == 1,
        created_at: row.created_at,
    }
}

fn review_view(row: ReviewRow) -> ReviewAdminView {
    ReviewAdminView {
        id: row.id,
        google_review_id: row.google_review_id,
        author_name: row.author_name,
        text: row.text,
        rating: row.rating,
        source: row.source,
        is_visible: row.visible == 1,
        review_date: row.review_date,
        profile_photo_url: row.profile_photo_url,
        created_at: row.created_at,
    }
}

fn item_view(row: MenuItemRow, category: CategoryRef) -> ItemView {
    let mut prices = serde_json::Map::new();
    if let Some(medium) = row.price_medium {
        prices.insert("medium".to_string(), json!(medium));
    }
    if let Some(large) = row.price_large {
        prices.insert("large".to_string(), json!(large));
    }
    if let Some(single) = row.price_single {
        prices.insert("single".to_string(), json!(single));
    }

    ItemView {
        id: row.id,
        name: row.name,
        description: row.description,
        category,
        prices: serde_json::Value::Object(prices),
        image: row.image,
        ingredients: parse_string_list(&row.ingredients),
        allergens: parse_string_list(&row.allergens),
        is_available: row.available == 1,
        is_popular: row.popular == 1,
        is_vegetarian: row.vegetarian == 1,
        is_vegan: row.vegan == 1,
        is_gluten_free: row.gluten_free == 1,
        order: row.order_index,
        preparation_time: row.preparation_time,
        created_at: row.created_at,
        updated_at: row.updated_at,
    }
}

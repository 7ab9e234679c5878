pub const ROLE_ADMIN: &str = "admin";

pub const STATUS_PENDING: &str = "pending";
pub const STATUS_CONFIRMED: &str = "confirmed";
pub const STATUS_CANCELLED: &str = "cancelled";
pub const STATUS_COMPLETED: &str = "completed";

pub const RESERVATION_STATUSES: [&str; 4] = [
    STATUS_PENDING,
    STATUS_CONFIRMED,
    STATUS_CANCELLED,
    STATUS_COMPLETED,
];

pub const SOURCE_GOOGLE: &str = "google";
pub const SOURCE_MANUAL: &str = "manuel";

#[allow(dead_code)]
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserRow {
    pub id: String,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: String,
    pub active: i64,
    pub created_at: String,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ReservationRow {
    pub id: String,
    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: String,
    pub date: String,
    pub time: String,
    pub guests: String,
    pub message: Option<String>,
    pub status: String,
    pub confirmation_code: String,
    pub admin_notes: Option<String>,
    pub table_number: Option<String>,
    pub created_by: String,
    pub last_modified_by: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MenuCategoryRow {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub icon: Option<String>,
    pub order_index: i64,
    pub active: i64,
    pub created_at: String,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MenuItemRow {
    pub id: String,
    pub name: String,
    pub description: String,
    pub category_id: String,
    pub price_medium: Option<f64>,
    pub price_large: Option<f64>,
    pub price_single: Option<f64>,
    pub image: Option<String>,
    pub ingredients: String,
    pub allergens: String,
    pub available: i64,
    pub popular: i64,
    pub vegetarian: i64,
    pub vegan: i64,
    pub gluten_free: i64,
    pub order_index: i64,
    pub preparation_time: i64,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ReviewRow {
    pub id: String,
    pub google_review_id: Option<String>,
    pub author_name: String,
    pub text: String,
    pub rating: i64,
    pub source: String,
    pub visible: i64,
    pub review_date: String,
    pub profile_photo_url: Option<String>,
    pub created_at: String,
}

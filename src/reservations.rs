use chrono::{Local, NaiveDate, Utc};
use rand::Rng;
use serde::Deserialize;
use sqlx::SqlitePool;

use crate::{
    error::{ApiError, FieldError},
    mailer::{MailIntent, MailJob},
    models::{ReservationRow, RESERVATION_STATUSES, STATUS_CONFIRMED, STATUS_PENDING},
    state::AppState,
};

const CODE_PREFIX: &str = "LB";
const CODE_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const CODE_ATTEMPTS: usize = 3;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReservationInput {
    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: String,
    pub date: String,
    pub time: String,
    pub guests: String,
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ReservationFilter {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub status: Option<String>,
    pub date: Option<String>,
    pub search: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdateInput {
    pub status: String,
    pub admin_notes: Option<String>,
    pub table_number: Option<String>,
}

pub fn parse_reservation_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| {
            chrono::DateTime::parse_from_rfc3339(raw)
                .ok()
                .map(|dt| dt.date_naive())
        })
}

pub fn is_valid_email(raw: &str) -> bool {
    let raw = raw.trim();
    if raw.contains(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = raw.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    let Some((host, tld)) = domain.rsplit_once('.') else {
        return false;
    };
    !host.is_empty() && !tld.is_empty()
}

pub fn validate(input: &ReservationInput) -> Vec<FieldError> {
    let mut errors = Vec::new();

    if input.customer_name.trim().chars().count() < 2 {
        errors.push(FieldError::new("customerName", "Ad soyad gerekli"));
    }
    if !is_valid_email(&input.customer_email) {
        errors.push(FieldError::new("customerEmail", "Geçerli email adresi gerekli"));
    }
    if input.customer_phone.trim().is_empty() {
        errors.push(FieldError::new("customerPhone", "Telefon numarası gerekli"));
    }
    match parse_reservation_date(&input.date) {
        None => errors.push(FieldError::new("date", "Geçerli tarih seçin")),
        Some(date) => {
            if date < Local::now().date_naive() {
                errors.push(FieldError::new("date", "Geçmiş tarih için rezervasyon yapılamaz"));
            }
        }
    }
    if input.time.trim().is_empty() {
        errors.push(FieldError::new("time", "Saat seçin"));
    }
    if input.guests.trim().is_empty() {
        errors.push(FieldError::new("guests", "Kişi sayısı seçin"));
    }

    errors
}

pub fn generate_confirmation_code() -> String {
    let millis = Utc::now().timestamp_millis().to_string();
    let digits = if millis.len() > 8 {
        &millis[millis.len() - 8..]
    } else {
        millis.as_str()
    };

    let mut rng = rand::thread_rng();
    let suffix: String = (0..4)
        .map(|_| CODE_CHARSET[rng.gen_range(0..CODE_CHARSET.len())] as char)
        .collect();

    format!("{CODE_PREFIX}{digits}{suffix}")
}

/// Creates a reservation with status `pending` and a fresh confirmation code.
/// The UNIQUE constraint on the code is the actual uniqueness guarantee; on a
/// collision the code is regenerated, at most `CODE_ATTEMPTS` times.
pub async fn create(state: &AppState, input: ReservationInput) -> Result<ReservationRow, ApiError> {
    let errors = validate(&input);
    if !errors.is_empty() {
        return Err(ApiError::Validation(errors));
    }

    let date = parse_reservation_date(&input.date)
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_default();
    let now = Utc::now().to_rfc3339();

    let row = ReservationRow {
        id: crate::auth::new_id(),
        customer_name: input.customer_name.trim().to_string(),
        customer_email: input.customer_email.trim().to_lowercase(),
        customer_phone: input.customer_phone.trim().to_string(),
        date,
        time: input.time.trim().to_string(),
        guests: input.guests.trim().to_string(),
        message: input
            .message
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty()),
        status: STATUS_PENDING.to_string(),
        confirmation_code: String::new(),
        admin_notes: None,
        table_number: None,
        created_by: "customer".to_string(),
        last_modified_by: None,
        created_at: now.clone(),
        updated_at: now,
    };

    let mut last_err = None;
    for _ in 0..CODE_ATTEMPTS {
        let code = generate_confirmation_code();
        let result = sqlx::query(
            r#"INSERT INTO reservations
               (id, customer_name, customer_email, customer_phone, date, time, guests, message,
                status, confirmation_code, created_by, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(&row.id)
        .bind(&row.customer_name)
        .bind(&row.customer_email)
        .bind(&row.customer_phone)
        .bind(&row.date)
        .bind(&row.time)
        .bind(&row.guests)
        .bind(&row.message)
        .bind(&row.status)
        .bind(&code)
        .bind(&row.created_by)
        .bind(&row.created_at)
        .bind(&row.updated_at)
        .execute(&state.db)
        .await;

        match result {
            Ok(_) => {
                let mut created = row.clone();
                created.confirmation_code = code;
                state.mail.enqueue(MailJob {
                    intent: MailIntent::Confirmation,
                    reservation: created.clone(),
                });
                return Ok(created);
            }
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                log::warn!("Confirmation code collision, regenerating");
                last_err = Some(db_err.to_string());
            }
            Err(err) => return Err(err.into()),
        }
    }

    Err(ApiError::Internal(
        last_err.unwrap_or_else(|| "confirmation code generation exhausted".to_string()),
    ))
}

pub async fn query(
    pool: &SqlitePool,
    filter: &ReservationFilter,
) -> Result<(Vec<ReservationRow>, i64), ApiError> {
    let mut conditions: Vec<&str> = Vec::new();
    let mut binds: Vec<String> = Vec::new();

    if let Some(status) = filter.status.as_deref() {
        if !status.is_empty() && status != "all" {
            conditions.push("status = ?");
            binds.push(status.to_string());
        }
    }
    if let Some(date) = filter.date.as_deref() {
        if let Some(day) = parse_reservation_date(date) {
            conditions.push("date = ?");
            binds.push(day.format("%Y-%m-%d").to_string());
        }
    }
    if let Some(search) = filter.search.as_deref() {
        if !search.trim().is_empty() {
            conditions.push(
                "(LOWER(customer_name) LIKE ? OR LOWER(customer_email) LIKE ? OR LOWER(customer_phone) LIKE ?)",
            );
            let pattern = format!("%{}%", search.trim().to_lowercase());
            binds.push(pattern.clone());
            binds.push(pattern.clone());
            binds.push(pattern);
        }
    }

    let where_clause = if conditions.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", conditions.join(" AND "))
    };

    let count_sql = format!("SELECT COUNT(*) FROM reservations{where_clause}");
    let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
    for bind in &binds {
        count_query = count_query.bind(bind);
    }
    let total = count_query.fetch_one(pool).await?;

    let page = filter.page.unwrap_or(1).max(1);
    let limit = filter.limit.unwrap_or(20).max(1);
    let offset = (page - 1) * limit;

    let select_sql = format!(
        r#"SELECT id, customer_name, customer_email, customer_phone, date, time, guests, message,
                  status, confirmation_code, admin_notes, table_number, created_by,
                  last_modified_by, created_at, updated_at
           FROM reservations{where_clause}
           ORDER BY date DESC, time DESC
           LIMIT ? OFFSET ?"#,
    );
    let mut select_query = sqlx::query_as::<_, ReservationRow>(&select_sql);
    for bind in &binds {
        select_query = select_query.bind(bind);
    }
    let rows = select_query.bind(limit).bind(offset).fetch_all(pool).await?;

    Ok((rows, total))
}

pub fn page_count(total: i64, limit: i64) -> i64 {
    if limit <= 0 {
        return 0;
    }
    (total + limit - 1) / limit
}

pub async fn update_status(
    state: &AppState,
    id: &str,
    input: StatusUpdateInput,
    admin_id: &str,
) -> Result<ReservationRow, ApiError> {
    if !RESERVATION_STATUSES.contains(&input.status.as_str()) {
        return Err(ApiError::Validation(vec![FieldError::new(
            "status",
            "Geçerli durum seçin",
        )]));
    }

    let updated = sqlx::query(
        r#"UPDATE reservations
           SET status = ?, admin_notes = ?, table_number = ?, last_modified_by = ?, updated_at = ?
           WHERE id = ?"#,
    )
    .bind(&input.status)
    .bind(input.admin_notes.clone().unwrap_or_default())
    .bind(input.table_number.clone().unwrap_or_default())
    .bind(admin_id)
    .bind(Utc::now().to_rfc3339())
    .bind(id)
    .execute(&state.db)
    .await?;

    if updated.rows_affected() == 0 {
        return Err(ApiError::not_found("Rezervasyon bulunamadı"));
    }

    let row = crate::db::fetch_reservation(&state.db, id)
        .await
        .ok_or_else(|| ApiError::not_found("Rezervasyon bulunamadı"))?;

    state.mail.enqueue(MailJob {
        intent: MailIntent::StatusUpdate,
        reservation: row.clone(),
    });

    Ok(row)
}

pub async fn delete(pool: &SqlitePool, id: &str) -> Result<(), ApiError> {
    let deleted = sqlx::query("DELETE FROM reservations WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;

    if deleted.rows_affected() == 0 {
        return Err(ApiError::not_found("Rezervasyon bulunamadı"));
    }
    Ok(())
}

#[derive(Debug, serde::Serialize)]
pub struct ReservationStats {
    #[serde(rename = "bugün")]
    pub today: i64,
    #[serde(rename = "beklemede")]
    pub pending: i64,
    #[serde(rename = "onaylandi")]
    pub confirmed_upcoming: i64,
    #[serde(rename = "buHafta")]
    pub this_week: i64,
    #[serde(rename = "toplam")]
    pub total: i64,
}

pub async fn stats(pool: &SqlitePool) -> Result<ReservationStats, ApiError> {
    let today = Local::now().date_naive();
    let today_str = today.format("%Y-%m-%d").to_string();
    let week_ago = (today - chrono::Duration::days(7)).format("%Y-%m-%d").to_string();

    let count = |sql: &'static str, bind: Option<String>| {
        let pool = pool.clone();
        async move {
            let mut query = sqlx::query_scalar::<_, i64>(sql);
            if let Some(value) = bind {
                query = query.bind(value);
            }
            query.fetch_one(&pool).await.unwrap_or(0)
        }
    };

    Ok(ReservationStats {
        today: count(
            "SELECT COUNT(*) FROM reservations WHERE date = ?",
            Some(today_str.clone()),
        )
        .await,
        pending: count(
            "SELECT COUNT(*) FROM reservations WHERE status = 'pending'",
            None,
        )
        .await,
        confirmed_upcoming: {
            sqlx::query_scalar::<_, i64>(
                "SELECT COUNT(*) FROM reservations WHERE status = ? AND date >= ?",
            )
            .bind(STATUS_CONFIRMED)
            .bind(&today_str)
            .fetch_one(pool)
            .await
            .unwrap_or(0)
        },
        this_week: count(
            "SELECT COUNT(*) FROM reservations WHERE date >= ?",
            Some(week_ago),
        )
        .await,
        total: count("SELECT COUNT(*) FROM reservations", None).await,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_input() -> ReservationInput {
        let tomorrow = Local::now().date_naive() + chrono::Duration::days(1);
        ReservationInput {
            customer_name: "Ayşe Yılmaz".to_string(),
            customer_email: "ayse@example.com".to_string(),
            customer_phone: "5551234567".to_string(),
            date: tomorrow.format("%Y-%m-%d").to_string(),
            time: "19:00".to_string(),
            guests: "2".to_string(),
            message: None,
        }
    }

    #[test]
    fn valid_input_passes_validation() {
        assert!(validate(&valid_input()).is_empty());
    }

    #[test]
    fn short_email_passes_email_check() {
        assert!(is_valid_email("a@b.co"));
    }

    #[test]
    fn malformed_emails_fail() {
        for raw in ["not-an-email", "a@b", "@b.co", "a b@c.co", "a@.co"] {
            assert!(!is_valid_email(raw), "{raw} should be rejected");
        }
    }

    #[test]
    fn past_date_fails_validation() {
        let yesterday = Local::now().date_naive() - chrono::Duration::days(1);
        let input = ReservationInput {
            date: yesterday.format("%Y-%m-%d").to_string(),
            ..valid_input()
        };
        let errors = validate(&input);
        assert!(errors.iter().any(|e| e.field == "date"));
    }

    #[test]
    fn today_is_accepted() {
        let input = ReservationInput {
            date: Local::now().date_naive().format("%Y-%m-%d").to_string(),
            ..valid_input()
        };
        assert!(validate(&input).is_empty());
    }

    #[test]
    fn one_char_name_fails() {
        let input = ReservationInput {
            customer_name: "A".to_string(),
            ..valid_input()
        };
        let errors = validate(&input);
        assert!(errors.iter().any(|e| e.field == "customerName"));
    }

    #[test]
    fn confirmation_code_matches_format() {
        let code = generate_confirmation_code();
        assert_eq!(code.len(), 14);
        assert!(code.starts_with("LB"));
        assert!(code[2..10].chars().all(|c| c.is_ascii_digit()));
        assert!(code[10..]
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
    }

    #[test]
    fn rfc3339_dates_parse() {
        let parsed = parse_reservation_date("2030-06-15T19:00:00+03:00").unwrap();
        assert_eq!(parsed, NaiveDate::from_ymd_opt(2030, 6, 15).unwrap());
    }

    #[test]
    fn page_count_rounds_up() {
        assert_eq!(page_count(0, 20), 0);
        assert_eq!(page_count(3, 1), 3);
        assert_eq!(page_count(21, 20), 2);
        assert_eq!(page_count(40, 20), 2);
    }
}

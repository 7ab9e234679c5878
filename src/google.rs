use chrono::Utc;
use serde::Deserialize;
use sqlx::SqlitePool;

use crate::{
    auth::new_id,
    models::SOURCE_GOOGLE,
    state::{AppState, GoogleConfig},
};

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("Google My Business API yapılandırılmamış")]
    Unavailable,
    #[error("Google isteği başarısız: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Google yorumları senkronize edilemedi: {0}")]
    Api(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct GoogleReview {
    #[serde(rename = "reviewId")]
    pub review_id: String,
    pub reviewer: Option<GoogleReviewer>,
    #[serde(rename = "starRating")]
    pub star_rating: Option<String>,
    pub comment: Option<String>,
    #[serde(rename = "createTime")]
    pub create_time: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GoogleReviewer {
    #[serde(rename = "displayName")]
    pub display_name: Option<String>,
    #[serde(rename = "profilePhotoUrl")]
    pub profile_photo_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ReviewListResponse {
    reviews: Option<Vec<GoogleReview>>,
}

#[derive(Debug, Clone, Copy)]
pub struct SyncOutcome {
    pub new_reviews: i64,
    pub total_reviews: i64,
}

pub fn map_star_rating(label: Option<&str>) -> i64 {
    match label {
        Some("ONE") => 1,
        Some("TWO") => 2,
        Some("THREE") => 3,
        Some("FOUR") => 4,
        Some("FIVE") => 5,
        _ => 5,
    }
}

/// Pulls the current review set for the configured location and merges it
/// into the store. Existing externally-sourced reviews are never touched.
pub async fn sync_reviews(state: &AppState) -> Result<SyncOutcome, SyncError> {
    let reviews = fetch_reviews(&state.google).await?;
    merge_reviews(&state.db, &reviews)
        .await
        .map_err(|err| SyncError::Api(err.to_string()))
}

async fn fetch_reviews(config: &GoogleConfig) -> Result<Vec<GoogleReview>, SyncError> {
    if !config.enabled() {
        return Err(SyncError::Unavailable);
    }

    let url = format!(
        "{}/accounts/{}/locations/{}/reviews",
        config.api_base.trim_end_matches('/'),
        config.account_id,
        config.location_id
    );

    let response = reqwest::Client::new()
        .get(&url)
        .bearer_auth(&config.access_token)
        .send()
        .await?;

    if !response.status().is_success() {
        return Err(SyncError::Api(format!("HTTP {}", response.status())));
    }

    let payload: ReviewListResponse = response.json().await?;
    Ok(payload.reviews.unwrap_or_default())
}

/// Idempotent merge keyed on the external review id: a fetched review is
/// inserted only when no stored row carries its id. A mapped rating below 4
/// is imported hidden.
pub async fn merge_reviews(
    pool: &SqlitePool,
    reviews: &[GoogleReview],
) -> Result<SyncOutcome, sqlx::Error> {
    let mut new_reviews = 0;

    for review in reviews {
        let existing = sqlx::query_as::<_, (String,)>(
            "SELECT id FROM reviews WHERE google_review_id = ? LIMIT 1",
        )
        .bind(&review.review_id)
        .fetch_optional(pool)
        .await?;

        if existing.is_some() {
            continue;
        }

        let rating = map_star_rating(review.star_rating.as_deref());
        let author = review
            .reviewer
            .as_ref()
            .and_then(|r| r.display_name.clone())
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| "Anonim".to_string());
        let photo = review
            .reviewer
            .as_ref()
            .and_then(|r| r.profile_photo_url.clone());
        let review_date = review
            .create_time
            .clone()
            .unwrap_or_else(|| Utc::now().to_rfc3339());

        let inserted = sqlx::query(
            r#"INSERT INTO reviews
               (id, google_review_id, author_name, text, rating, source, visible, review_date,
                profile_photo_url, created_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(new_id())
        .bind(&review.review_id)
        .bind(&author)
        .bind(review.comment.as_deref().unwrap_or_default())
        .bind(rating)
        .bind(SOURCE_GOOGLE)
        .bind(i64::from(rating >= 4))
        .bind(&review_date)
        .bind(photo)
        .bind(Utc::now().to_rfc3339())
        .execute(pool)
        .await;

        match inserted {
            Ok(_) => new_reviews += 1,
            // A concurrent sync already stored this id; the constraint wins.
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {}
            Err(err) => return Err(err),
        }
    }

    Ok(SyncOutcome {
        new_reviews,
        total_reviews: reviews.len() as i64,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    fn fetched_set() -> Vec<GoogleReview> {
        vec![
            GoogleReview {
                review_id: "g-1".to_string(),
                reviewer: Some(GoogleReviewer {
                    display_name: Some("Mehmet K.".to_string()),
                    profile_photo_url: None,
                }),
                star_rating: Some("FIVE".to_string()),
                comment: Some("Harika bir mekan".to_string()),
                create_time: Some("2026-01-10T12:00:00Z".to_string()),
            },
            GoogleReview {
                review_id: "g-2".to_string(),
                reviewer: None,
                star_rating: Some("TWO".to_string()),
                comment: Some("Beklentimin altında".to_string()),
                create_time: Some("2026-02-01T09:30:00Z".to_string()),
            },
        ]
    }

    async fn test_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();
        pool
    }

    #[test]
    fn star_rating_labels_map_to_integers() {
        assert_eq!(map_star_rating(Some("ONE")), 1);
        assert_eq!(map_star_rating(Some("THREE")), 3);
        assert_eq!(map_star_rating(Some("FIVE")), 5);
        assert_eq!(map_star_rating(Some("SOMETHING")), 5);
        assert_eq!(map_star_rating(None), 5);
    }

    #[actix_web::test]
    async fn merge_is_idempotent() {
        let pool = test_pool().await;
        let reviews = fetched_set();

        let first = merge_reviews(&pool, &reviews).await.unwrap();
        assert_eq!(first.new_reviews, 2);
        assert_eq!(first.total_reviews, 2);

        let second = merge_reviews(&pool, &reviews).await.unwrap();
        assert_eq!(second.new_reviews, 0);
        assert_eq!(second.total_reviews, 2);

        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM reviews")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 2);
    }

    #[actix_web::test]
    async fn low_ratings_are_imported_hidden() {
        let pool = test_pool().await;
        merge_reviews(&pool, &fetched_set()).await.unwrap();

        let (visible, rating): (i64, i64) = sqlx::query_as(
            "SELECT visible, rating FROM reviews WHERE google_review_id = 'g-2'",
        )
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(rating, 2);
        assert_eq!(visible, 0);

        let (author, review_date): (String, String) = sqlx::query_as(
            "SELECT author_name, review_date FROM reviews WHERE google_review_id = 'g-2'",
        )
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(author, "Anonim");
        assert_eq!(review_date, "2026-02-01T09:30:00Z");
    }

    #[actix_web::test]
    async fn sync_without_credentials_is_unavailable() {
        let config = GoogleConfig {
            api_base: "https://example.invalid".to_string(),
            account_id: String::new(),
            location_id: String::new(),
            access_token: String::new(),
        };
        let err = fetch_reviews(&config).await.unwrap_err();
        assert!(matches!(err, SyncError::Unavailable));
    }
}

use actix_web::{
    body::{BoxBody, MessageBody},
    dev::{ServiceRequest, ServiceResponse},
    http::header,
    middleware::Next,
    web, Error, HttpMessage,
};
use argon2::{
    password_hash::{self, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use rand_core::OsRng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::ApiError,
    models::UserRow,
    state::{AppState, JwtConfig},
};

#[derive(Clone, Debug)]
pub struct AuthAdmin {
    pub id: String,
    pub name: String,
    pub role: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub name: String,
    pub role: String,
    pub iat: i64,
    pub exp: i64,
}

pub fn hash_password(password: &str) -> Result<String, password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default().hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

pub fn verify_password(password: &str, password_hash: &str) -> bool {
    let parsed_hash = PasswordHash::new(password_hash);
    match parsed_hash {
        Ok(hash) => Argon2::default()
            .verify_password(password.as_bytes(), &hash)
            .is_ok(),
        Err(_) => false,
    }
}

pub fn issue_token(config: &JwtConfig, user: &UserRow) -> Result<String, jsonwebtoken::errors::Error> {
    let now = Utc::now();
    let claims = Claims {
        sub: user.id.clone(),
        name: user.name.clone(),
        role: user.role.clone(),
        iat: now.timestamp(),
        exp: (now + Duration::hours(config.expiration_hours)).timestamp(),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.secret.as_bytes()),
    )
}

pub fn verify_token(config: &JwtConfig, token: &str) -> Option<Claims> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .ok()
}

async fn authorize(req: &ServiceRequest) -> Result<AuthAdmin, ApiError> {
    let state = req
        .app_data::<web::Data<AppState>>()
        .ok_or(ApiError::Unauthenticated)?;

    let header_value = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    let token = header_value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .unwrap_or_default();

    if token.is_empty() {
        return Err(ApiError::Unauthenticated);
    }

    let claims = verify_token(&state.jwt, token)
        .ok_or_else(|| ApiError::InvalidToken("Geçersiz token".to_string()))?;

    let user = sqlx::query_as::<_, UserRow>(
        r#"SELECT id, name, email, password_hash, role, active, created_at
           FROM users
           WHERE id = ? AND active = 1
           LIMIT 1"#,
    )
    .bind(&claims.sub)
    .fetch_optional(&state.db)
    .await
    .unwrap_or(None);

    let user = match user {
        Some(user) => user,
        None => {
            return Err(ApiError::InvalidToken(
                "Geçersiz token veya kullanıcı aktif değil".to_string(),
            ))
        }
    };

    Ok(AuthAdmin {
        id: user.id,
        name: user.name,
        role: user.role,
    })
}

pub async fn admin_guard<B>(
    req: ServiceRequest,
    next: Next<B>,
) -> Result<ServiceResponse<BoxBody>, Error>
where
    B: MessageBody + 'static,
{
    match authorize(&req).await {
        Ok(admin) => {
            req.extensions_mut().insert(admin);
            let res = next.call(req).await?;
            Ok(res.map_into_boxed_body())
        }
        Err(err) => {
            log::warn!("Admin auth rejected: {err}");
            let response = actix_web::ResponseError::error_response(&err);
            Ok(req.into_response(response))
        }
    }
}

pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_user() -> UserRow {
        UserRow {
            id: "user-1".to_string(),
            name: "Test Admin".to_string(),
            email: "admin@example.com".to_string(),
            password_hash: String::new(),
            role: "admin".to_string(),
            active: 1,
            created_at: Utc::now().to_rfc3339(),
        }
    }

    fn test_config() -> JwtConfig {
        JwtConfig {
            secret: "a-secret-long-enough-for-tests".to_string(),
            expiration_hours: 24,
        }
    }

    #[test]
    fn token_roundtrip_preserves_claims() {
        let config = test_config();
        let token = issue_token(&config, &test_user()).unwrap();
        let claims = verify_token(&config, &token).unwrap();
        assert_eq!(claims.sub, "user-1");
        assert_eq!(claims.role, "admin");
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn expired_token_is_rejected() {
        let config = JwtConfig {
            expiration_hours: -1,
            ..test_config()
        };
        let token = issue_token(&config, &test_user()).unwrap();
        assert!(verify_token(&config, &token).is_none());
    }

    #[test]
    fn token_with_wrong_secret_is_rejected() {
        let config = test_config();
        let token = issue_token(&config, &test_user()).unwrap();
        let other = JwtConfig {
            secret: "a-completely-different-secret".to_string(),
            expiration_hours: 24,
        };
        assert!(verify_token(&other, &token).is_none());
    }

    #[test]
    fn password_hash_verifies() {
        let hash = hash_password("gizli-sifre").unwrap();
        assert!(verify_password("gizli-sifre", &hash));
        assert!(!verify_password("yanlis", &hash));
    }
}

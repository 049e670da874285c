//! Authentication service for login, token management and the initial super-admin

use bcrypt::{hash, verify, DEFAULT_COST};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use shared::{permissions_for, UserRole};
use sqlx::PgPool;
use uuid::Uuid;

use crate::config::{BootstrapConfig, Config};
use crate::error::{AppError, AppResult};

/// Authentication service
#[derive(Clone)]
pub struct AuthService {
    db: PgPool,
    jwt_secret: String,
    access_token_expiry: i64,
    refresh_token_expiry: i64,
}

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // User ID
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cooperative_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub farmer_id: Option<Uuid>,
    pub permissions: Vec<String>,
    pub exp: i64,
    pub iat: i64,
}

/// Authentication tokens
#[derive(Debug, Serialize)]
pub struct AuthTokens {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

/// User row used for authentication
#[derive(Debug, sqlx::FromRow)]
struct LoginRow {
    id: Uuid,
    cooperative_id: Option<Uuid>,
    role: String,
    password_hash: String,
    is_active: bool,
    cooperative_active: Option<bool>,
    farmer_id: Option<Uuid>,
}

/// Profile of the signed-in user
#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct UserProfile {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub phone: Option<String>,
    pub role: String,
    pub cooperative_id: Option<Uuid>,
    pub cooperative_name: Option<String>,
    pub cooperative_code: Option<String>,
    pub farmer_id: Option<Uuid>,
    pub last_login_at: Option<DateTime<Utc>>,
    #[sqlx(skip)]
    pub permissions: Vec<String>,
}

/// Hash a password for storage
pub fn hash_password(password: &str) -> AppResult<String> {
    hash(password, DEFAULT_COST).map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))
}

/// Decode and validate an access token
pub fn decode_claims(token: &str, secret: &str) -> AppResult<Claims> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| match e.kind() {
        ErrorKind::ExpiredSignature => AppError::TokenExpired,
        _ => AppError::InvalidToken,
    })
}

impl AuthService {
    /// Create a new AuthService instance
    pub fn new(db: PgPool, config: &Config) -> Self {
        Self {
            db,
            jwt_secret: config.jwt.secret.clone(),
            access_token_expiry: config.jwt.access_token_expiry,
            refresh_token_expiry: config.jwt.refresh_token_expiry,
        }
    }

    /// Authenticate user with email and password
    pub async fn login(&self, email: &str, password: &str) -> AppResult<AuthTokens> {
        let user = self
            .find_login(
                "LOWER(u.email) = LOWER($1)",
                email.trim(),
            )
            .await?
            .ok_or(AppError::InvalidCredentials)?;

        let valid = verify(password, &user.password_hash)
            .map_err(|e| AppError::Internal(format!("Password verification failed: {}", e)))?;

        if !valid {
            tracing::info!(user_id = %user.id, "login rejected: wrong password");
            return Err(AppError::InvalidCredentials);
        }

        Self::ensure_active(&user)?;

        sqlx::query("UPDATE users SET last_login_at = NOW() WHERE id = $1")
            .bind(user.id)
            .execute(&self.db)
            .await?;

        let tokens = self.issue_tokens(&user)?;
        self.store_refresh_token(user.id, &tokens.refresh_token).await?;

        tracing::info!(user_id = %user.id, role = %user.role, "user logged in");
        Ok(tokens)
    }

    /// Refresh access token using refresh token
    pub async fn refresh_token(&self, refresh_token: &str) -> AppResult<AuthTokens> {
        let token_hash = Self::hash_token(refresh_token);

        // Revoke atomically so a token can only be redeemed once
        let user_id = sqlx::query_scalar::<_, Uuid>(
            r#"
            UPDATE refresh_tokens SET revoked_at = NOW()
            WHERE token_hash = $1
              AND expires_at > NOW()
              AND revoked_at IS NULL
            RETURNING user_id
            "#,
        )
        .bind(&token_hash)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Invalid or expired refresh token".to_string()))?;

        let user = self
            .find_login("u.id = $1::uuid", &user_id.to_string())
            .await?
            .ok_or(AppError::InvalidToken)?;
        Self::ensure_active(&user)?;

        let tokens = self.issue_tokens(&user)?;
        self.store_refresh_token(user.id, &tokens.refresh_token).await?;

        Ok(tokens)
    }

    /// Revoke a refresh token
    pub async fn logout(&self, refresh_token: &str) -> AppResult<()> {
        sqlx::query("UPDATE refresh_tokens SET revoked_at = NOW() WHERE token_hash = $1 AND revoked_at IS NULL")
            .bind(Self::hash_token(refresh_token))
            .execute(&self.db)
            .await?;
        Ok(())
    }

    /// Profile of the signed-in user
    pub async fn get_profile(&self, user_id: Uuid) -> AppResult<UserProfile> {
        let mut profile = sqlx::query_as::<_, UserProfile>(
            r#"
            SELECT u.id, u.email, u.name, u.phone, u.role, u.cooperative_id,
                   c.name AS cooperative_name, c.code AS cooperative_code,
                   f.id AS farmer_id, u.last_login_at
            FROM users u
            LEFT JOIN cooperatives c ON c.id = u.cooperative_id
            LEFT JOIN farmers f ON f.user_id = u.id
            WHERE u.id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("User".to_string()))?;

        if let Some(role) = UserRole::parse(&profile.role) {
            profile.permissions = permissions_for(role);
        }
        Ok(profile)
    }

    /// Create the configured super-admin if the platform has none yet
    pub async fn ensure_super_admin(&self, bootstrap: &BootstrapConfig) -> AppResult<()> {
        let (Some(email), Some(password)) = (&bootstrap.super_admin_email, &bootstrap.super_admin_password) else {
            return Ok(());
        };

        let existing = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users WHERE role = 'super_admin'")
            .fetch_one(&self.db)
            .await?;
        if existing > 0 {
            return Ok(());
        }

        shared::validate_email(email).map_err(|m| AppError::Configuration(m.to_string()))?;
        shared::validate_password(password).map_err(|m| AppError::Configuration(m.to_string()))?;

        let name = bootstrap
            .super_admin_name
            .clone()
            .unwrap_or_else(|| "Platform Administrator".to_string());

        sqlx::query(
            r#"
            INSERT INTO users (cooperative_id, email, name, role, password_hash)
            VALUES (NULL, $1, $2, 'super_admin', $3)
            "#,
        )
        .bind(email)
        .bind(&name)
        .bind(hash_password(password)?)
        .execute(&self.db)
        .await?;

        tracing::info!(email = %email, "bootstrap super-admin created");
        Ok(())
    }

    async fn find_login(&self, predicate: &str, value: &str) -> AppResult<Option<LoginRow>> {
        let query = format!(
            r#"
            SELECT u.id, u.cooperative_id, u.role, u.password_hash, u.is_active,
                   c.is_active AS cooperative_active, f.id AS farmer_id
            FROM users u
            LEFT JOIN cooperatives c ON c.id = u.cooperative_id
            LEFT JOIN farmers f ON f.user_id = u.id
            WHERE {}
            "#,
            predicate
        );

        Ok(sqlx::query_as::<_, LoginRow>(&query)
            .bind(value)
            .fetch_optional(&self.db)
            .await?)
    }

    fn ensure_active(user: &LoginRow) -> AppResult<()> {
        if !user.is_active {
            return Err(AppError::Unauthorized("Account is disabled".to_string()));
        }
        if user.cooperative_active == Some(false) {
            return Err(AppError::Unauthorized("Cooperative is deactivated".to_string()));
        }
        Ok(())
    }

    fn issue_tokens(&self, user: &LoginRow) -> AppResult<AuthTokens> {
        let role = UserRole::parse(&user.role)
            .ok_or_else(|| AppError::Internal(format!("Unknown role {}", user.role)))?;
        self.generate_tokens(user.id, role, user.cooperative_id, user.farmer_id)
    }

    /// Generate access and refresh tokens
    fn generate_tokens(
        &self,
        user_id: Uuid,
        role: UserRole,
        cooperative_id: Option<Uuid>,
        farmer_id: Option<Uuid>,
    ) -> AppResult<AuthTokens> {
        let now = Utc::now();
        let access_exp = now + Duration::seconds(self.access_token_expiry);

        let access_claims = Claims {
            sub: user_id.to_string(),
            role: role.as_str().to_string(),
            cooperative_id,
            farmer_id,
            permissions: permissions_for(role),
            exp: access_exp.timestamp(),
            iat: now.timestamp(),
        };

        let access_token = encode(
            &Header::default(),
            &access_claims,
            &EncodingKey::from_secret(self.jwt_secret.as_bytes()),
        )
        .map_err(|e| AppError::Internal(format!("Token generation failed: {}", e)))?;

        // Refresh token (simple random token)
        let refresh_token = Uuid::new_v4().to_string();

        Ok(AuthTokens {
            access_token,
            refresh_token,
            token_type: "Bearer".to_string(),
            expires_in: self.access_token_expiry,
        })
    }

    /// Store refresh token in database
    async fn store_refresh_token(&self, user_id: Uuid, token: &str) -> AppResult<()> {
        let token_hash = Self::hash_token(token);
        let expires_at = Utc::now() + Duration::seconds(self.refresh_token_expiry);

        sqlx::query(
            r#"
            INSERT INTO refresh_tokens (user_id, token_hash, expires_at)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(user_id)
        .bind(&token_hash)
        .bind(expires_at)
        .execute(&self.db)
        .await?;

        Ok(())
    }

    /// SHA-256 hex digest of a token for storage
    fn hash_token(token: &str) -> String {
        Sha256::digest(token.as_bytes())
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> AuthService {
        AuthService {
            db: PgPool::connect_lazy("postgres://localhost/unused").unwrap(),
            jwt_secret: "test-secret".to_string(),
            access_token_expiry: 3600,
            refresh_token_expiry: 60,
        }
    }

    #[test]
    fn test_token_hash_is_stable_sha256() {
        let h = AuthService::hash_token("abc");
        assert_eq!(h.len(), 64);
        assert_eq!(
            h,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_ne!(h, AuthService::hash_token("abd"));
    }

    #[tokio::test]
    async fn test_generated_token_round_trips_claims() {
        let svc = service();
        let user_id = Uuid::new_v4();
        let coop = Uuid::new_v4();
        let tokens = svc
            .generate_tokens(user_id, UserRole::Clerk, Some(coop), None)
            .unwrap();

        let claims = decode_claims(&tokens.access_token, "test-secret").unwrap();
        assert_eq!(claims.sub, user_id.to_string());
        assert_eq!(claims.role, "clerk");
        assert_eq!(claims.cooperative_id, Some(coop));
        assert!(claims.permissions.contains(&"harvest:create".to_string()));
        assert_eq!(tokens.token_type, "Bearer");
    }

    #[tokio::test]
    async fn test_wrong_secret_is_invalid_token() {
        let svc = service();
        let tokens = svc
            .generate_tokens(Uuid::new_v4(), UserRole::SuperAdmin, None, None)
            .unwrap();
        assert!(matches!(
            decode_claims(&tokens.access_token, "other-secret"),
            Err(AppError::InvalidToken)
        ));
    }

    #[tokio::test]
    async fn test_expired_token_is_reported_as_expired() {
        let mut svc = service();
        svc.access_token_expiry = -3600;
        let tokens = svc
            .generate_tokens(Uuid::new_v4(), UserRole::Farmer, Some(Uuid::new_v4()), Some(Uuid::new_v4()))
            .unwrap();
        assert!(matches!(
            decode_claims(&tokens.access_token, "test-secret"),
            Err(AppError::TokenExpired)
        ));
    }
}

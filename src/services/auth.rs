//! Authentication service: registration, login and account bootstrap

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::Utc;
use validator::Validate;

use crate::{
    config::{AuthConfig, BootstrapAdmin},
    error::{AppError, AppResult},
    models::user::{LoginRequest, RegisterRequest, Role, User, UserClaims, UserInfo},
    repository::Repository,
};

#[derive(Clone)]
pub struct AuthService {
    repository: Repository,
    config: AuthConfig,
}

impl AuthService {
    pub fn new(repository: Repository, config: AuthConfig) -> Self {
        Self { repository, config }
    }

    /// Register a reader account. Only the `user` role can be self-registered.
    pub async fn register(&self, request: RegisterRequest) -> AppResult<UserInfo> {
        request.validate()?;

        match request.role.as_deref() {
            None | Some("user") => {}
            Some(_) => {
                return Err(AppError::Authorization(
                    "Admin registration is not allowed".to_string(),
                ))
            }
        }

        if self
            .repository
            .users
            .get_by_username(&request.username)
            .await?
            .is_some()
        {
            return Err(AppError::Duplicate("Username already exists".to_string()));
        }

        let hash = self.hash_password(&request.password)?;
        let user = self
            .repository
            .users
            .create(&request.username, &hash, Role::User)
            .await?;

        tracing::info!(user_id = user.id, username = %user.username, "User registered");
        Ok(user.into())
    }

    /// Check credentials and issue a JWT
    pub async fn login(&self, request: LoginRequest) -> AppResult<(String, UserInfo)> {
        if request.username.is_empty() || request.password.is_empty() {
            return Err(AppError::Validation(
                "Username and password are required".to_string(),
            ));
        }

        let user = self
            .repository
            .users
            .get_by_username(&request.username)
            .await?
            .ok_or_else(|| AppError::Validation("Invalid credentials".to_string()))?;

        if !self.verify_password(&user, &request.password)? {
            tracing::warn!(username = %request.username, "Login failed");
            return Err(AppError::Validation("Invalid credentials".to_string()));
        }

        let token = self.create_token_for_user(&user)?;
        Ok((token, user.into()))
    }

    /// Profile of the authenticated user
    pub async fn me(&self, user_id: i32) -> AppResult<UserInfo> {
        Ok(self.repository.users.get_by_id(user_id).await?.into())
    }

    /// Create the configured admin account if it does not exist yet
    pub async fn ensure_admin(&self, admin: &BootstrapAdmin) -> AppResult<()> {
        if self
            .repository
            .users
            .get_by_username(&admin.username)
            .await?
            .is_some()
        {
            tracing::debug!(username = %admin.username, "Bootstrap admin already present");
            return Ok(());
        }

        let hash = self.hash_password(&admin.password)?;
        let user = self
            .repository
            .users
            .create(&admin.username, &hash, Role::Admin)
            .await?;
        tracing::info!(user_id = user.id, username = %user.username, "Bootstrap admin created");
        Ok(())
    }

    fn create_token_for_user(&self, user: &User) -> AppResult<String> {
        let now = Utc::now().timestamp();
        let exp = now + (self.config.jwt_expiration_hours as i64 * 3600);

        let claims = UserClaims {
            sub: user.username.clone(),
            user_id: user.id,
            role: user.role,
            exp,
            iat: now,
        };

        claims
            .create_token(&self.config.jwt_secret)
            .map_err(|e| AppError::Internal(format!("Failed to create token: {}", e)))
    }

    fn verify_password(&self, user: &User, password: &str) -> AppResult<bool> {
        let parsed_hash = PasswordHash::new(&user.password)
            .map_err(|_| AppError::Internal("Invalid password hash".to_string()))?;
        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok())
    }

    /// Hash a password using Argon2
    pub fn hash_password(&self, password: &str) -> AppResult<String> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))?;
        Ok(hash.to_string())
    }
}

use std::future::Future;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::DateTime;
use chrono::Duration;
use chrono::Utc;

use crate::session::clock::Clock;
use crate::session::errors::storage_timeout;
use crate::session::errors::AuthError;
use crate::session::errors::EmailSenderError;
use crate::session::errors::StoreError;
use crate::session::errors::ValidationErrors;
use crate::session::models::AccessClaims;
use crate::session::models::EmailAddress;
use crate::session::models::LoginSession;
use crate::session::models::RegisterCommand;
use crate::session::models::Token;
use crate::session::models::TokenKind;
use crate::session::models::TokenPair;
use crate::session::models::User;
use crate::session::models::UserId;
use crate::session::models::UserProfile;
use crate::session::ports::AccessTokenCodec;
use crate::session::ports::AuthServicePort;
use crate::session::ports::CredentialHasher;
use crate::session::ports::EmailSender;
use crate::session::ports::TokenGenerator;
use crate::session::ports::TokenRepository;
use crate::session::ports::UserRepository;
use crate::session::validation::check_password_strength;
use crate::session::validation::validate_registration;

/// Lifetime of a stored refresh token.
pub const REFRESH_TOKEN_TTL: Duration = Duration::days(7);

/// Lifetime of an email verification token.
pub const VERIFICATION_TOKEN_TTL: Duration = Duration::hours(24);

/// Random bytes behind every refresh secret and generated identifier.
pub const OPAQUE_TOKEN_BYTES: usize = 32;

/// Credential primitives the service composes.
#[derive(Clone)]
pub struct SecurityServices {
    pub hasher: Arc<dyn CredentialHasher>,
    pub token_generator: Arc<dyn TokenGenerator>,
    pub access_tokens: Arc<dyn AccessTokenCodec>,
    pub clock: Arc<dyn Clock>,
}

/// Tunables for session behaviour.
#[derive(Debug, Clone, Copy)]
pub struct SessionSettings {
    /// Replace the refresh token on every successful refresh.
    pub rotate_refresh_tokens: bool,
    /// Upper bound for any single store call.
    pub storage_timeout: StdDuration,
    /// Upper bound for handing one email to the sender.
    pub email_timeout: StdDuration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            rotate_refresh_tokens: true,
            storage_timeout: StdDuration::from_secs(5),
            email_timeout: StdDuration::from_secs(5),
        }
    }
}

/// Domain service implementation for authentication and sessions.
///
/// Stateless between calls; every piece of mutable state lives behind the
/// user and token repositories.
pub struct AuthService<UR, TR, ES>
where
    UR: UserRepository,
    TR: TokenRepository,
    ES: EmailSender,
{
    users: Arc<UR>,
    tokens: Arc<TR>,
    email_sender: Arc<ES>,
    security: SecurityServices,
    settings: SessionSettings,
}

impl<UR, TR, ES> AuthService<UR, TR, ES>
where
    UR: UserRepository,
    TR: TokenRepository,
    ES: EmailSender,
{
    /// Create a new auth service with injected dependencies.
    ///
    /// # Arguments
    /// * `users` - User persistence implementation
    /// * `tokens` - Refresh and verification token persistence
    /// * `email_sender` - Outbound account email
    /// * `security` - Hashing, token generation, access token codec and clock
    /// * `settings` - Rotation and timeout tunables
    pub fn new(
        users: Arc<UR>,
        tokens: Arc<TR>,
        email_sender: Arc<ES>,
        security: SecurityServices,
        settings: SessionSettings,
    ) -> Self {
        Self {
            users,
            tokens,
            email_sender,
            security,
            settings,
        }
    }

    async fn bounded<T, F>(&self, operation: &str, call: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, StoreError>> + Send,
        T: Send,
    {
        let limit = self.settings.storage_timeout;
        tokio::time::timeout(limit, call)
            .await
            .unwrap_or_else(|_| Err(storage_timeout(operation, limit)))
    }

    /// Hand one email to the sender. Failures are logged, never returned.
    async fn deliver<F>(&self, kind: &str, user_id: &UserId, call: F)
    where
        F: Future<Output = Result<(), EmailSenderError>> + Send,
    {
        let limit = self.settings.email_timeout;
        let result = tokio::time::timeout(limit, call)
            .await
            .unwrap_or(Err(EmailSenderError::TimedOut(limit)));

        if let Err(e) = result {
            tracing::error!(
                user_id = %user_id,
                email = kind,
                error = %e,
                "Failed to send account email"
            );
        }
    }

    async fn hash_password(&self, password: &str) -> Result<String, AuthError> {
        let hasher = Arc::clone(&self.security.hasher);
        let password = password.to_string();
        tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| AuthError::Internal(format!("Password hashing task failed: {}", e)))?
    }

    /// Verify on the blocking pool. `None` burns one dummy verification.
    async fn verify_password(&self, password: &str, digest: Option<&str>) -> Result<bool, AuthError> {
        let hasher = Arc::clone(&self.security.hasher);
        let password = password.to_string();
        let digest = digest.map(str::to_string);
        tokio::task::spawn_blocking(move || match digest {
            Some(digest) => hasher.verify(&password, &digest),
            None => hasher.verify_dummy(&password),
        })
        .await
        .map_err(|e| AuthError::Internal(format!("Password verification task failed: {}", e)))
    }

    async fn store_token(
        &self,
        user: &User,
        kind: TokenKind,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<Token, AuthError> {
        let generator = &self.security.token_generator;
        let token = Token {
            id: generator.generate(OPAQUE_TOKEN_BYTES)?,
            user_id: user.id.clone(),
            secret: generator.generate(OPAQUE_TOKEN_BYTES)?,
            kind,
            expires_at: now + ttl,
            blacklisted: false,
            credential_version: user.credential_version,
            created_at: now,
        };

        self.bounded("token create", self.tokens.create(token.clone()))
            .await?;

        Ok(token)
    }

    async fn send_verification_email(&self, user: &User, now: DateTime<Utc>) -> Result<(), AuthError> {
        let token = self
            .store_token(user, TokenKind::Verification, VERIFICATION_TOKEN_TTL, now)
            .await?;

        self.deliver(
            "verification",
            &user.id,
            self.email_sender
                .send_verification(&user.email, &user.user_name, &token.secret),
        )
        .await;

        tracing::debug!(user_id = %user.id, "Verification token issued");
        Ok(())
    }

    /// A password change may land between loading `user` and storing
    /// `successor`. Re-read the owner and discard the successor if its
    /// credentials moved on.
    async fn ensure_credentials_current(&self, user: &User, successor: &Token) -> Result<(), AuthError> {
        let current = self
            .bounded("user lookup", self.users.find_by_id(&user.id))
            .await?;

        if current.is_some_and(|current| current.credential_version == successor.credential_version) {
            return Ok(());
        }

        self.bounded("token blacklist", self.tokens.blacklist(&successor.secret))
            .await?;
        tracing::warn!(
            user_id = %user.id,
            "Rotated refresh token discarded: credentials changed during refresh"
        );
        Err(AuthError::TokenRevoked)
    }
}

#[async_trait]
impl<UR, TR, ES> AuthServicePort for AuthService<UR, TR, ES>
where
    UR: UserRepository,
    TR: TokenRepository,
    ES: EmailSender,
{
    async fn register(&self, command: RegisterCommand) -> Result<UserProfile, AuthError> {
        let valid = validate_registration(&command)?;

        if self
            .bounded("email lookup", self.users.exists_by_email(&valid.email))
            .await?
        {
            return Err(AuthError::EmailTaken);
        }

        let password_hash = self.hash_password(&command.password).await?;
        let now = self.security.clock.now();
        let user = User {
            id: UserId::new(self.security.token_generator.generate(OPAQUE_TOKEN_BYTES)?),
            email: valid.email,
            user_name: valid.user_name,
            password_hash,
            first_name: command.first_name.trim().to_string(),
            last_name: command.last_name.trim().to_string(),
            is_active: true,
            email_verified: false,
            credential_version: 0,
            created_at: now,
            updated_at: now,
        };

        let created = match self.bounded("user create", self.users.create(user)).await {
            Ok(user) => user,
            Err(StoreError::Conflict(_)) => return Err(AuthError::EmailTaken),
            Err(e) => return Err(e.into()),
        };

        tracing::info!(user_id = %created.id, "User registered");

        self.deliver(
            "welcome",
            &created.id,
            self.email_sender
                .send_welcome(&created.email, &created.user_name),
        )
        .await;

        // The account exists either way; the user can ask for a new link.
        if let Err(e) = self.send_verification_email(&created, now).await {
            tracing::error!(
                user_id = %created.id,
                error = %e,
                "Failed to issue verification token"
            );
        }

        Ok(UserProfile::from(&created))
    }

    async fn login(&self, email: &str, password: &str) -> Result<LoginSession, AuthError> {
        let user = match EmailAddress::new(email) {
            Ok(email) => {
                self.bounded("user lookup", self.users.find_by_email(&email))
                    .await?
            }
            Err(_) => None,
        };

        let Some(user) = user else {
            self.verify_password(password, None).await?;
            tracing::debug!("Login rejected: unknown account");
            return Err(AuthError::InvalidCredentials);
        };

        if !self
            .verify_password(password, Some(&user.password_hash))
            .await?
        {
            tracing::debug!(user_id = %user.id, "Login rejected: password mismatch");
            return Err(AuthError::InvalidCredentials);
        }

        if !user.is_active {
            tracing::info!(user_id = %user.id, "Login rejected: account deactivated");
            return Err(AuthError::AccountDeactivated);
        }

        let now = self.security.clock.now();
        let access =
            self.security
                .access_tokens
                .issue(&user.id, &user.email, &user.user_name, now)?;
        let refresh = self
            .store_token(&user, TokenKind::Refresh, REFRESH_TOKEN_TTL, now)
            .await?;

        tracing::info!(user_id = %user.id, "User logged in");

        Ok(LoginSession {
            user: UserProfile::from(&user),
            tokens: TokenPair {
                access_token: access.token,
                access_expires_at: access.expires_at,
                refresh_token: refresh.secret,
                refresh_expires_at: refresh.expires_at,
            },
        })
    }

    async fn logout(&self, secret: &str) -> Result<(), AuthError> {
        self.bounded("token blacklist", self.tokens.blacklist(secret))
            .await?;
        tracing::debug!("Refresh token blacklisted");
        Ok(())
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, AuthError> {
        let now = self.security.clock.now();

        let token = self
            .bounded("token lookup", self.tokens.find_by_secret(refresh_token))
            .await?
            .filter(|token| token.kind == TokenKind::Refresh)
            .ok_or(AuthError::InvalidToken)?;

        if token.is_expired(now) {
            return Err(AuthError::TokenExpired);
        }
        if token.blacklisted {
            return Err(AuthError::TokenRevoked);
        }

        let user = self
            .bounded("user lookup", self.users.find_by_id(&token.user_id))
            .await?
            .ok_or(AuthError::InvalidToken)?;

        if !user.is_active {
            return Err(AuthError::AccountDeactivated);
        }

        if token.credential_version != user.credential_version {
            tracing::info!(user_id = %user.id, "Refresh rejected: password changed since issuance");
            return Err(AuthError::TokenRevoked);
        }

        let access =
            self.security
                .access_tokens
                .issue(&user.id, &user.email, &user.user_name, now)?;

        if !self.settings.rotate_refresh_tokens {
            return Ok(TokenPair {
                access_token: access.token,
                access_expires_at: access.expires_at,
                refresh_token: token.secret,
                refresh_expires_at: token.expires_at,
            });
        }

        // Only the caller that flips the flag may mint the successor.
        if !self
            .bounded("token revoke", self.tokens.revoke_if_active(&token.secret))
            .await?
        {
            return Err(AuthError::TokenRevoked);
        }

        let successor = self
            .store_token(&user, TokenKind::Refresh, REFRESH_TOKEN_TTL, now)
            .await?;
        self.ensure_credentials_current(&user, &successor).await?;

        tracing::debug!(user_id = %user.id, "Refresh token rotated");

        Ok(TokenPair {
            access_token: access.token,
            access_expires_at: access.expires_at,
            refresh_token: successor.secret,
            refresh_expires_at: successor.expires_at,
        })
    }

    async fn validate(&self, access_token: &str) -> Result<AccessClaims, AuthError> {
        let now = self.security.clock.now();
        Ok(self.security.access_tokens.parse(access_token, now)?)
    }

    async fn change_password(
        &self,
        user_id: &UserId,
        old_password: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        let mut user = self
            .bounded("user lookup", self.users.find_by_id(user_id))
            .await?
            .ok_or(AuthError::UserNotFound(user_id.to_string()))?;

        if !self
            .verify_password(old_password, Some(&user.password_hash))
            .await?
        {
            return Err(AuthError::InvalidCredentials);
        }

        check_password_strength(new_password)?;

        user.password_hash = self.hash_password(new_password).await?;
        user.credential_version += 1;
        user.updated_at = self.security.clock.now();

        let user = match self.bounded("user update", self.users.update(user)).await {
            Ok(user) => user,
            Err(StoreError::NotFound(_)) => {
                return Err(AuthError::UserNotFound(user_id.to_string()))
            }
            Err(e) => return Err(e.into()),
        };

        let revoked = self
            .bounded("token purge", self.tokens.delete_all_for_user(&user.id))
            .await?;

        tracing::info!(user_id = %user.id, revoked, "Password changed, sessions revoked");

        Ok(())
    }

    async fn verify_email(&self, token: &str) -> Result<UserProfile, AuthError> {
        let now = self.security.clock.now();

        let token = self
            .bounded("token lookup", self.tokens.find_by_secret(token))
            .await?
            .filter(|token| token.kind == TokenKind::Verification)
            .ok_or(AuthError::InvalidToken)?;

        if token.is_expired(now) {
            return Err(AuthError::TokenExpired);
        }
        if token.blacklisted {
            return Err(AuthError::TokenRevoked);
        }

        // Single use: a concurrent verification with the same token loses here.
        if !self
            .bounded("token revoke", self.tokens.revoke_if_active(&token.secret))
            .await?
        {
            return Err(AuthError::TokenRevoked);
        }

        let mut user = self
            .bounded("user lookup", self.users.find_by_id(&token.user_id))
            .await?
            .ok_or(AuthError::InvalidToken)?;

        if !user.email_verified {
            user.email_verified = true;
            user.updated_at = now;
            user = match self.bounded("user update", self.users.update(user)).await {
                Ok(user) => user,
                Err(StoreError::NotFound(_)) => return Err(AuthError::InvalidToken),
                Err(e) => return Err(e.into()),
            };
        }

        tracing::info!(user_id = %user.id, "Email verified");

        Ok(UserProfile::from(&user))
    }

    async fn resend_verification(&self, email: &str) -> Result<(), AuthError> {
        let email = EmailAddress::new(email).map_err(|e| {
            let mut errors = ValidationErrors::new();
            errors.add("email", e);
            AuthError::ValidationFailed(errors)
        })?;

        let user = self
            .bounded("user lookup", self.users.find_by_email(&email))
            .await?;

        match user {
            Some(user) if user.is_active && !user.email_verified => {
                let now = self.security.clock.now();
                self.send_verification_email(&user, now).await
            }
            _ => {
                tracing::debug!("Verification resend skipped: no pending verification");
                Ok(())
            }
        }
    }
}

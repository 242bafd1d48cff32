use async_trait::async_trait;
use chrono::DateTime;
use chrono::Utc;

use crate::session::errors::AccessTokenError;
use crate::session::errors::AuthError;
use crate::session::errors::EmailSenderError;
use crate::session::errors::StoreError;
use crate::session::models::AccessClaims;
use crate::session::models::EmailAddress;
use crate::session::models::IssuedAccessToken;
use crate::session::models::LoginSession;
use crate::session::models::RegisterCommand;
use crate::session::models::Token;
use crate::session::models::TokenPair;
use crate::session::models::User;
use crate::session::models::UserId;
use crate::session::models::UserProfile;
use crate::session::models::Username;

/// Port for authentication and session operations.
#[async_trait]
pub trait AuthServicePort: Send + Sync + 'static {
    /// Register a new account.
    ///
    /// # Arguments
    /// * `command` - Raw registration fields
    ///
    /// # Returns
    /// Sanitized profile of the created user
    ///
    /// # Errors
    /// * `ValidationFailed` - Missing or malformed fields
    /// * `WeakPassword` - Password does not meet the strength policy
    /// * `EmailTaken` - Email is already registered
    /// * `StorageUnavailable` - User store failed
    async fn register(&self, command: RegisterCommand) -> Result<UserProfile, AuthError>;

    /// Exchange email and password for an access/refresh token pair.
    ///
    /// # Errors
    /// * `InvalidCredentials` - Unknown email or wrong password
    /// * `AccountDeactivated` - Account exists but is inactive
    /// * `StorageUnavailable` - A store failed
    async fn login(&self, email: &str, password: &str) -> Result<LoginSession, AuthError>;

    /// Revoke a token secret. Unknown secrets are accepted silently.
    ///
    /// # Errors
    /// * `StorageUnavailable` - Token store failed
    async fn logout(&self, secret: &str) -> Result<(), AuthError>;

    /// Mint a new access token from a refresh token.
    ///
    /// # Errors
    /// * `InvalidToken` - Unknown refresh token or its user no longer exists
    /// * `TokenExpired` - Refresh token is past its expiry
    /// * `TokenRevoked` - Refresh token was blacklisted
    /// * `AccountDeactivated` - Owning account is inactive
    /// * `StorageUnavailable` - A store failed
    async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, AuthError>;

    /// Verify an access token and return the identity it carries.
    ///
    /// # Errors
    /// * `InvalidSignature`, `InvalidIssuer`, `InvalidAudience` - Token was not issued here
    /// * `TokenExpired` - Token is past its expiry
    /// * `InvalidToken` - Token is not decodable
    async fn validate(&self, access_token: &str) -> Result<AccessClaims, AuthError>;

    /// Replace a user's password and revoke all of their refresh tokens.
    ///
    /// # Errors
    /// * `UserNotFound` - No user with this ID
    /// * `InvalidCredentials` - Old password does not match
    /// * `WeakPassword` - New password does not meet the strength policy
    /// * `StorageUnavailable` - A store failed
    async fn change_password(
        &self,
        user_id: &UserId,
        old_password: &str,
        new_password: &str,
    ) -> Result<(), AuthError>;

    /// Consume an email verification token and mark the owner verified.
    ///
    /// # Returns
    /// Profile of the verified user
    ///
    /// # Errors
    /// * `InvalidToken` - Unknown token or its user no longer exists
    /// * `TokenExpired` - Token is past its expiry
    /// * `TokenRevoked` - Token was already used
    /// * `StorageUnavailable` - A store failed
    async fn verify_email(&self, token: &str) -> Result<UserProfile, AuthError>;

    /// Issue and send a fresh verification token.
    ///
    /// Succeeds without sending anything when the address is unknown,
    /// inactive or already verified.
    ///
    /// # Errors
    /// * `ValidationFailed` - Malformed email address
    /// * `StorageUnavailable` - A store failed
    async fn resend_verification(&self, email: &str) -> Result<(), AuthError>;
}

/// Persistence operations for user records.
#[async_trait]
pub trait UserRepository: Send + Sync + 'static {
    /// Persist a new user.
    ///
    /// # Errors
    /// * `Conflict` - ID or email already exists
    /// * `Unavailable` - Storage failed
    async fn create(&self, user: User) -> Result<User, StoreError>;

    /// Retrieve user by identifier.
    ///
    /// # Returns
    /// Optional user entity (None if not found)
    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, StoreError>;

    /// Retrieve user by normalized email address.
    ///
    /// # Returns
    /// Optional user entity (None if not found)
    async fn find_by_email(&self, email: &EmailAddress) -> Result<Option<User>, StoreError>;

    /// Check whether a normalized email address is registered.
    async fn exists_by_email(&self, email: &EmailAddress) -> Result<bool, StoreError>;

    /// Overwrite an existing user.
    ///
    /// # Errors
    /// * `NotFound` - User does not exist
    /// * `Unavailable` - Storage failed
    async fn update(&self, user: User) -> Result<User, StoreError>;
}

/// Persistence operations for refresh and verification tokens.
///
/// Every mutation is atomic per row so concurrent logout and refresh on the
/// same secret settle deterministically.
#[async_trait]
pub trait TokenRepository: Send + Sync + 'static {
    /// Persist a newly issued token.
    ///
    /// # Errors
    /// * `Conflict` - ID or secret already exists
    async fn create(&self, token: Token) -> Result<(), StoreError>;

    /// Look a token up by its bearer secret.
    ///
    /// # Returns
    /// Optional token (None if not found)
    async fn find_by_secret(&self, secret: &str) -> Result<Option<Token>, StoreError>;

    /// Mark a token blacklisted. Absent or already-blacklisted tokens are a no-op.
    async fn blacklist(&self, secret: &str) -> Result<(), StoreError>;

    /// Blacklist a token only if it is currently live.
    ///
    /// # Returns
    /// True if this call performed the transition
    async fn revoke_if_active(&self, secret: &str) -> Result<bool, StoreError>;

    /// Remove every token owned by a user.
    ///
    /// # Returns
    /// Number of tokens removed
    async fn delete_all_for_user(&self, user_id: &UserId) -> Result<u64, StoreError>;

    /// Remove every token whose expiry is strictly before `now`.
    ///
    /// # Returns
    /// Number of tokens removed
    async fn sweep_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError>;
}

/// One-way password hashing.
pub trait CredentialHasher: Send + Sync + 'static {
    /// Produce a salted digest of `password`.
    fn hash(&self, password: &str) -> Result<String, AuthError>;

    /// Compare `password` with `digest`. Malformed digests do not match.
    fn verify(&self, password: &str, digest: &str) -> bool;

    /// Spend the cost of one verification without a digest. Always false.
    fn verify_dummy(&self, password: &str) -> bool;
}

/// Cryptographically random opaque strings.
pub trait TokenGenerator: Send + Sync + 'static {
    /// URL-safe string built from `byte_length` random bytes.
    fn generate(&self, byte_length: usize) -> Result<String, AuthError>;
}

/// Signed, self-verifying access tokens.
pub trait AccessTokenCodec: Send + Sync + 'static {
    fn issue(
        &self,
        user_id: &UserId,
        email: &EmailAddress,
        user_name: &Username,
        now: DateTime<Utc>,
    ) -> Result<IssuedAccessToken, AccessTokenError>;

    fn parse(&self, token: &str, now: DateTime<Utc>) -> Result<AccessClaims, AccessTokenError>;
}

/// Outbound account email.
#[async_trait]
pub trait EmailSender: Send + Sync + 'static {
    /// Greet a freshly registered user.
    async fn send_welcome(
        &self,
        email: &EmailAddress,
        user_name: &Username,
    ) -> Result<(), EmailSenderError>;

    /// Deliver an email verification token.
    async fn send_verification(
        &self,
        email: &EmailAddress,
        user_name: &Username,
        token: &str,
    ) -> Result<(), EmailSenderError>;
}

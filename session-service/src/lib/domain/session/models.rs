use std::fmt;
use std::str::FromStr;

use chrono::DateTime;
use chrono::Utc;

use crate::session::errors::EmailError;
use crate::session::errors::UsernameError;

/// User record.
///
/// Owned by the user store; the session core only reads it and updates the
/// password hash and verification flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub email: EmailAddress,
    pub user_name: Username,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub is_active: bool,
    pub email_verified: bool,
    /// Bumped on every password change. Tokens minted under an older
    /// version are dead.
    pub credential_version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// User unique identifier type
///
/// Opaque random string; carries no structure callers may rely on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Username value type
///
/// Ensures username is 3-32 characters and contains only alphanumeric, underscore, and hyphen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Username(String);

impl Username {
    const MIN_LENGTH: usize = 3;
    const MAX_LENGTH: usize = 32;

    /// Create a new valid username.
    ///
    /// # Errors
    /// * `TooShort` - Username shorter than 3 characters
    /// * `TooLong` - Username longer than 32 characters
    /// * `InvalidCharacters` - Contains non-alphanumeric characters (except _ and -)
    pub fn new(username: String) -> Result<Self, UsernameError> {
        let username = Self::with_valid_length(username)?;
        let username = Self::with_valid_chars(username)?;
        Ok(Self(username))
    }

    fn with_valid_length(username: String) -> Result<String, UsernameError> {
        let length = username.chars().count();
        if length < Self::MIN_LENGTH {
            Err(UsernameError::TooShort {
                min: Self::MIN_LENGTH,
                actual: length,
            })
        } else if length > Self::MAX_LENGTH {
            Err(UsernameError::TooLong {
                max: Self::MAX_LENGTH,
                actual: length,
            })
        } else {
            Ok(username)
        }
    }

    fn with_valid_chars(username: String) -> Result<String, UsernameError> {
        if username
            .chars()
            .all(|c| c.is_alphanumeric() || c == '_' || c == '-')
        {
            Ok(username)
        } else {
            Err(UsernameError::InvalidCharacters)
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Username {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Email address type
///
/// Always stored trimmed and lower-cased so that lookups and uniqueness checks
/// compare normalized forms. Format is validated with an RFC 5322 parser.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EmailAddress(String);

impl EmailAddress {
    const MAX_LENGTH: usize = 254;

    /// Normalize and validate an email address.
    ///
    /// # Errors
    /// * `TooLong` - Longer than 254 characters after trimming
    /// * `InvalidFormat` - Email does not conform to RFC 5322
    pub fn new(email: &str) -> Result<Self, EmailError> {
        let email = Self::normalize(email);
        if email.len() > Self::MAX_LENGTH {
            return Err(EmailError::TooLong {
                max: Self::MAX_LENGTH,
                actual: email.len(),
            });
        }

        email_address::EmailAddress::from_str(&email)
            .map(|_| EmailAddress(email))
            .map_err(|e| EmailError::InvalidFormat(e.to_string()))
    }

    /// Lower-case and trim without validating.
    pub fn normalize(email: &str) -> String {
        email.trim().to_lowercase()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Kind of issued credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Access,
    Refresh,
    Verification,
}

impl TokenKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenKind::Access => "access",
            TokenKind::Refresh => "refresh",
            TokenKind::Verification => "verification",
        }
    }
}

impl FromStr for TokenKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "access" => Ok(TokenKind::Access),
            "refresh" => Ok(TokenKind::Refresh),
            "verification" => Ok(TokenKind::Verification),
            other => Err(format!("unknown token kind: {}", other)),
        }
    }
}

/// A persisted credential: a refresh token or an email verification token.
///
/// For verification tokens `blacklisted` means "already used".
#[derive(Clone, PartialEq, Eq)]
pub struct Token {
    pub id: String,
    pub user_id: UserId,
    pub secret: String,
    pub kind: TokenKind,
    pub expires_at: DateTime<Utc>,
    pub blacklisted: bool,
    /// Owner's `credential_version` when the token was minted.
    pub credential_version: i64,
    pub created_at: DateTime<Utc>,
}

impl Token {
    /// Expiry is closed: the token is dead from `expires_at` onward.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

// Keeps bearer secrets out of logs.
impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("id", &self.id)
            .field("user_id", &self.user_id)
            .field("secret", &"<redacted>")
            .field("kind", &self.kind)
            .field("expires_at", &self.expires_at)
            .field("blacklisted", &self.blacklisted)
            .field("credential_version", &self.credential_version)
            .field("created_at", &self.created_at)
            .finish()
    }
}

/// Raw registration input, validated by the service.
#[derive(Debug, Clone)]
pub struct RegisterCommand {
    pub email: String,
    pub user_name: String,
    pub password: String,
    pub confirm_password: String,
    pub first_name: String,
    pub last_name: String,
}

/// Sanitized projection of a user, safe to hand to any caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserProfile {
    pub id: UserId,
    pub email: EmailAddress,
    pub user_name: Username,
    pub first_name: String,
    pub last_name: String,
    pub is_active: bool,
    pub email_verified: bool,
    pub created_at: DateTime<Utc>,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            email: user.email.clone(),
            user_name: user.user_name.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            is_active: user.is_active,
            email_verified: user.email_verified,
            created_at: user.created_at,
        }
    }
}

/// Signed access token as handed out by the codec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedAccessToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Access and refresh credentials returned by login and refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenPair {
    pub access_token: String,
    pub access_expires_at: DateTime<Utc>,
    pub refresh_token: String,
    pub refresh_expires_at: DateTime<Utc>,
}

/// Result of a successful login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginSession {
    pub user: UserProfile,
    pub tokens: TokenPair,
}

/// Identity carried by a valid access token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessClaims {
    pub user_id: UserId,
    pub email: String,
    pub user_name: String,
    pub expires_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    #[test]
    fn test_email_is_normalized() {
        let email = EmailAddress::new("  Alice@Example.COM ").unwrap();
        assert_eq!(email.as_str(), "alice@example.com");
    }

    #[test]
    fn test_email_rejects_garbage() {
        assert!(matches!(
            EmailAddress::new("not-an-email"),
            Err(EmailError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_email_rejects_overlong() {
        let email = format!("{}@example.com", "a".repeat(250));
        assert!(matches!(
            EmailAddress::new(&email),
            Err(EmailError::TooLong { max: 254, .. })
        ));
    }

    #[test]
    fn test_username_rules() {
        assert!(Username::new("alice_01".to_string()).is_ok());
        assert_eq!(
            Username::new("al".to_string()),
            Err(UsernameError::TooShort { min: 3, actual: 2 })
        );
        assert_eq!(
            Username::new("alice smith".to_string()),
            Err(UsernameError::InvalidCharacters)
        );
    }

    #[test]
    fn test_token_kind_round_trips_through_str() {
        assert_eq!("refresh".parse::<TokenKind>(), Ok(TokenKind::Refresh));
        assert_eq!(TokenKind::Access.as_str(), "access");
        assert_eq!(
            "verification".parse::<TokenKind>(),
            Ok(TokenKind::Verification)
        );
        assert!("bearer".parse::<TokenKind>().is_err());
    }

    #[test]
    fn test_token_expiry_is_closed() {
        let now = Utc::now();
        let token = Token {
            id: "t1".to_string(),
            user_id: UserId::new("u1"),
            secret: "s3cret".to_string(),
            kind: TokenKind::Refresh,
            expires_at: now,
            blacklisted: false,
            credential_version: 0,
            created_at: now - Duration::days(7),
        };

        assert!(!token.is_expired(now - Duration::seconds(1)));
        assert!(token.is_expired(now));
    }

    #[test]
    fn test_token_debug_redacts_secret() {
        let now = Utc::now();
        let token = Token {
            id: "t1".to_string(),
            user_id: UserId::new("u1"),
            secret: "s3cret".to_string(),
            kind: TokenKind::Refresh,
            expires_at: now,
            blacklisted: false,
            credential_version: 0,
            created_at: now,
        };

        let rendered = format!("{:?}", token);
        assert!(!rendered.contains("s3cret"));
        assert!(rendered.contains("<redacted>"));
    }
}

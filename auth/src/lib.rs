//! Authentication utilities library
//!
//! Provides the credential primitives the session service composes:
//! - Password hashing (Argon2id)
//! - Opaque random token generation (refresh-token secrets, identifiers)
//! - Signed access tokens (HS256 JWT bound to an issuer and audience)
//!
//! Services define their own capability traits and adapt these
//! implementations, so nothing here knows about users or storage.
//!
//! # Examples
//!
//! ## Password Hashing
//! ```
//! use auth::PasswordHasher;
//!
//! let hasher = PasswordHasher::new();
//! let hash = hasher.hash("my_password").unwrap();
//! assert!(hasher.verify("my_password", &hash));
//! assert!(!hasher.verify("not_my_password", &hash));
//! ```
//!
//! ## Opaque Tokens
//! ```
//! use auth::OpaqueTokenGenerator;
//!
//! let generator = OpaqueTokenGenerator::new();
//! let secret = generator.generate(32).unwrap();
//! assert_eq!(secret.len(), 43);
//! ```
//!
//! ## Access Tokens
//! ```
//! use auth::JwtHandler;
//! use chrono::Utc;
//!
//! let handler = JwtHandler::new(b"secret_key_at_least_32_bytes_long!", "issuer", "audience");
//! let now = Utc::now();
//! let issued = handler.issue("user123", "alice@example.com", "alice", now).unwrap();
//! let claims = handler.decode(&issued.token, now).unwrap();
//! assert_eq!(claims.sub, "user123");
//! ```

pub mod jwt;
pub mod password;
pub mod token;

// Re-export commonly used items
pub use jwt::Claims;
pub use jwt::IssuedToken;
pub use jwt::JwtError;
pub use jwt::JwtHandler;
pub use jwt::ACCESS_TOKEN_TTL;
pub use password::PasswordError;
pub use password::PasswordHasher;
pub use token::OpaqueTokenGenerator;
pub use token::TokenError;

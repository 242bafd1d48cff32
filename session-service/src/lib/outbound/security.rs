//! Adapters binding the `auth` primitives to the session capability traits.

use chrono::DateTime;
use chrono::Utc;

use crate::session::errors::AccessTokenError;
use crate::session::errors::AuthError;
use crate::session::models::AccessClaims;
use crate::session::models::EmailAddress;
use crate::session::models::IssuedAccessToken;
use crate::session::models::UserId;
use crate::session::models::Username;
use crate::session::ports::AccessTokenCodec;
use crate::session::ports::CredentialHasher;
use crate::session::ports::TokenGenerator;

impl CredentialHasher for auth::PasswordHasher {
    fn hash(&self, password: &str) -> Result<String, AuthError> {
        auth::PasswordHasher::hash(self, password).map_err(|e| AuthError::Internal(e.to_string()))
    }

    fn verify(&self, password: &str, digest: &str) -> bool {
        auth::PasswordHasher::verify(self, password, digest)
    }

    fn verify_dummy(&self, password: &str) -> bool {
        auth::PasswordHasher::verify_dummy(self, password)
    }
}

impl TokenGenerator for auth::OpaqueTokenGenerator {
    fn generate(&self, byte_length: usize) -> Result<String, AuthError> {
        auth::OpaqueTokenGenerator::generate(self, byte_length)
            .map_err(|e| AuthError::Internal(e.to_string()))
    }
}

impl From<auth::JwtError> for AccessTokenError {
    fn from(err: auth::JwtError) -> Self {
        match err {
            auth::JwtError::InvalidSignature => AccessTokenError::InvalidSignature,
            auth::JwtError::InvalidIssuer => AccessTokenError::InvalidIssuer,
            auth::JwtError::InvalidAudience => AccessTokenError::InvalidAudience,
            auth::JwtError::Expired => AccessTokenError::Expired,
            auth::JwtError::Malformed(msg) => AccessTokenError::Malformed(msg),
            auth::JwtError::EncodingFailed(msg) => AccessTokenError::SigningFailed(msg),
        }
    }
}

impl AccessTokenCodec for auth::JwtHandler {
    fn issue(
        &self,
        user_id: &UserId,
        email: &EmailAddress,
        user_name: &Username,
        now: DateTime<Utc>,
    ) -> Result<IssuedAccessToken, AccessTokenError> {
        let issued = auth::JwtHandler::issue(
            self,
            user_id.as_str(),
            email.as_str(),
            user_name.as_str(),
            now,
        )?;

        Ok(IssuedAccessToken {
            token: issued.token,
            expires_at: issued.expires_at,
        })
    }

    fn parse(&self, token: &str, now: DateTime<Utc>) -> Result<AccessClaims, AccessTokenError> {
        let claims = self.decode(token, now)?;
        let expires_at = claims.expires_at();

        Ok(AccessClaims {
            user_id: UserId::new(claims.sub),
            email: claims.email,
            user_name: claims.user_name,
            expires_at,
        })
    }
}

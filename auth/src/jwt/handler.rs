use chrono::DateTime;
use chrono::Utc;
use jsonwebtoken::decode;
use jsonwebtoken::encode;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::Algorithm;
use jsonwebtoken::DecodingKey;
use jsonwebtoken::EncodingKey;
use jsonwebtoken::Header;
use jsonwebtoken::Validation;

use super::claims::Claims;
use super::claims::ACCESS_TOKEN_TTL;
use super::errors::JwtError;

/// Minimum accepted secret length for HS256.
pub const MIN_SECRET_LENGTH: usize = 32;

/// A freshly signed access token and its expiry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// JWT token handler for encoding and decoding access tokens.
///
/// Uses HS256 (HMAC with SHA-256) with a single shared secret and binds every
/// token to the issuer and audience given at construction. Expiry is checked
/// against the caller-supplied instant instead of the system clock so that
/// callers control time.
pub struct JwtHandler {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    algorithm: Algorithm,
    issuer: String,
    audience: String,
}

impl JwtHandler {
    /// Create a new JWT handler.
    ///
    /// # Arguments
    /// * `secret` - Secret key for signing tokens (should be stored securely)
    /// * `issuer` - Value stamped into and required from the `iss` claim
    /// * `audience` - Value stamped into and required from the `aud` claim
    ///
    /// # Security Notes
    /// - The secret should be at least [`MIN_SECRET_LENGTH`] bytes for HS256
    /// - Changing the secret invalidates every outstanding token
    pub fn new(secret: &[u8], issuer: impl ToString, audience: impl ToString) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            algorithm: Algorithm::HS256,
            issuer: issuer.to_string(),
            audience: audience.to_string(),
        }
    }

    /// Issue an access token for a user, valid for [`ACCESS_TOKEN_TTL`].
    ///
    /// # Arguments
    /// * `user_id` - Subject of the token
    /// * `email` - User email address
    /// * `user_name` - User display name
    /// * `now` - Issuance instant
    ///
    /// # Errors
    /// * `EncodingFailed` - Token encoding failed
    pub fn issue(
        &self,
        user_id: &str,
        email: &str,
        user_name: &str,
        now: DateTime<Utc>,
    ) -> Result<IssuedToken, JwtError> {
        let claims = Claims::for_user(user_id, email, user_name, now, ACCESS_TOKEN_TTL)
            .with_issuer(&self.issuer)
            .with_audience(&self.audience);

        let token = self.encode(&claims)?;

        Ok(IssuedToken {
            token,
            expires_at: claims.expires_at(),
        })
    }

    /// Sign claims as they are, without stamping issuer or audience.
    ///
    /// # Errors
    /// * `EncodingFailed` - Token encoding failed
    pub fn encode(&self, claims: &Claims) -> Result<String, JwtError> {
        let header = Header::new(self.algorithm);

        encode(&header, claims, &self.encoding_key)
            .map_err(|e| JwtError::EncodingFailed(e.to_string()))
    }

    /// Decode and validate an access token.
    ///
    /// Checks run in order: signature, issuer, audience, expiry.
    ///
    /// # Arguments
    /// * `token` - JWT token string to decode
    /// * `now` - Instant the expiry is checked against
    ///
    /// # Errors
    /// * `InvalidSignature` - Signature does not verify under the secret
    /// * `InvalidIssuer` - `iss` does not match
    /// * `InvalidAudience` - `aud` does not match
    /// * `Expired` - `now` is at or past `exp`
    /// * `Malformed` - Token cannot be decoded
    pub fn decode(&self, token: &str, now: DateTime<Utc>) -> Result<Claims, JwtError> {
        let mut validation = Validation::new(self.algorithm);
        // Expiry is evaluated below against `now`.
        validation.validate_exp = false;
        validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);
        validation.set_issuer(&[&self.issuer]);
        validation.set_audience(&[&self.audience]);

        let token_data =
            decode::<Claims>(token, &self.decoding_key, &validation).map_err(|e| {
                match e.kind() {
                    ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => {
                        JwtError::InvalidSignature
                    }
                    ErrorKind::InvalidIssuer => JwtError::InvalidIssuer,
                    ErrorKind::InvalidAudience => JwtError::InvalidAudience,
                    ErrorKind::ExpiredSignature => JwtError::Expired,
                    _ => JwtError::Malformed(e.to_string()),
                }
            })?;

        let claims = token_data.claims;
        if claims.is_expired(now.timestamp()) {
            return Err(JwtError::Expired);
        }

        Ok(claims)
    }
}

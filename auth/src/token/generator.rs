use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::rngs::OsRng;
use rand::TryRngCore;

use super::errors::TokenError;

/// Opaque random string generator.
///
/// Reads straight from the operating system's CSPRNG and encodes the bytes as
/// unpadded URL-safe base64. There is no fallback source: if the OS cannot
/// supply entropy the call fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpaqueTokenGenerator;

impl OpaqueTokenGenerator {
    /// Byte length used for refresh-token secrets and entity identifiers.
    pub const DEFAULT_BYTE_LENGTH: usize = 32;

    pub fn new() -> Self {
        Self
    }

    /// Generate a random URL-safe string from `byte_length` random bytes.
    ///
    /// # Errors
    /// * `EmptyLength` - `byte_length` is zero
    /// * `EntropyUnavailable` - The OS random source failed
    pub fn generate(&self, byte_length: usize) -> Result<String, TokenError> {
        if byte_length == 0 {
            return Err(TokenError::EmptyLength);
        }

        let mut bytes = vec![0u8; byte_length];
        OsRng
            .try_fill_bytes(&mut bytes)
            .map_err(|e| TokenError::EntropyUnavailable(e.to_string()))?;

        Ok(URL_SAFE_NO_PAD.encode(&bytes))
    }

    /// Generate a token of [`Self::DEFAULT_BYTE_LENGTH`] bytes.
    pub fn generate_default(&self) -> Result<String, TokenError> {
        self.generate(Self::DEFAULT_BYTE_LENGTH)
    }
}

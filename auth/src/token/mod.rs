pub mod errors;
pub mod generator;

pub use errors::TokenError;
pub use generator::OpaqueTokenGenerator;

pub mod email;
pub mod repositories;
pub mod security;

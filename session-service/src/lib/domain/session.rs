//! Authentication and session core: models, ports and the orchestrating service.

pub mod clock;
pub mod errors;
pub mod models;
pub mod ports;
pub mod service;
pub mod validation;

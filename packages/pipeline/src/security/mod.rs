//! Secret handling for service keys and operator tokens.

pub mod credentials;

pub use credentials::{ServiceCredentials, SecretString};

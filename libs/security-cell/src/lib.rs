pub mod services;

pub use services::vault::{FieldVault, VaultError};

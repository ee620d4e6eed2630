pub mod auth_service;
pub mod auth_service_impl;
pub use auth_service::{AuthError, AuthService, LoginResult, SignupInput, UserInfo};
pub use auth_service_impl::SeaOrmAuthService;

pub mod bulk_import;
pub use bulk_import::{BulkImportResult, FailedRecord, ImportError};

pub mod integration_service;
pub mod integration_service_impl;
pub use integration_service::{
    IntegrationDto, IntegrationError, IntegrationInput, IntegrationService, StatusToggle,
};
pub use integration_service_impl::SeaOrmIntegrationService;

use diesel::r2d2;
use std::fmt;

use crate::config::ConfigError;
use crate::db::DbSetupError;
use crate::fetcher::FetchError;
use crate::models::feed::FeedTableError;
use crate::models::user::UserTableError;
use crate::store::StoreError;
use crate::tasks::types::IntervalError;

/// Errors surfaced to the command line, with user-friendly messages
#[derive(Debug)]
pub enum AppError {
    // Validation Errors
    InvalidInput { field: String, message: String },
    DuplicateResource { resource: String },
    ResourceNotFound { resource: String },

    // Feed-related Errors
    FeedParseError,

    // Database Errors
    DatabaseError,
    ConnectionPoolError,

    // External Service Errors
    NetworkError,

    // System Errors
    InternalError,
    ConfigurationError(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            // Validation Errors
            AppError::InvalidInput { field, message } => {
                write!(f, "Invalid {}: {}", field, message)
            }
            AppError::DuplicateResource { resource } => write!(f, "{} already exists", resource),
            AppError::ResourceNotFound { resource } => write!(f, "{} not found", resource),

            // Feed-related Errors
            AppError::FeedParseError => write!(f, "Unable to parse feed - invalid format"),

            // Database Errors
            AppError::DatabaseError => write!(f, "A database error occurred - please try again"),
            AppError::ConnectionPoolError => write!(f, "Could not open the database"),

            // External Service Errors
            AppError::NetworkError => write!(f, "Network error - please check your connection"),

            // System Errors
            AppError::InternalError => write!(f, "An unexpected error occurred - please try again"),
            AppError::ConfigurationError(message) => write!(f, "Configuration error: {}", message),
        }
    }
}

impl std::error::Error for AppError {}

/// Result type alias for application errors
pub type AppResult<T> = Result<T, AppError>;

/// Helper functions for common error conversions
impl AppError {
    pub fn invalid_input(field: &str, message: &str) -> Self {
        AppError::InvalidInput {
            field: field.to_string(),
            message: message.to_string(),
        }
    }

    pub fn duplicate_resource(resource: &str) -> Self {
        AppError::DuplicateResource {
            resource: resource.to_string(),
        }
    }

    pub fn resource_not_found(resource: &str) -> Self {
        AppError::ResourceNotFound {
            resource: resource.to_string(),
        }
    }
}

/// Convert database connection pool errors
impl From<r2d2::PoolError> for AppError {
    fn from(err: r2d2::PoolError) -> Self {
        log::error!("Database connection pool error: {}", err);
        AppError::ConnectionPoolError
    }
}

/// Convert diesel database errors
impl From<diesel::result::Error> for AppError {
    fn from(err: diesel::result::Error) -> Self {
        use diesel::result::Error as DieselError;

        match err {
            DieselError::NotFound => AppError::ResourceNotFound {
                resource: "Record".to_string(),
            },
            _ => {
                log::error!("Database error: {}", err);
                AppError::DatabaseError
            }
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        log::error!("I/O error: {}", err);
        AppError::InternalError
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        log::error!("Serialization error: {}", err);
        AppError::InternalError
    }
}

impl From<FetchError> for AppError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::Markup(ref message) => {
                log::warn!("Feed parse error: {}", message);
                AppError::FeedParseError
            }
            FetchError::Request(_) => {
                log::error!("Could not build HTTP client: {}", err);
                AppError::ConfigurationError(err.to_string())
            }
            _ => {
                log::error!("Network error: {}", err);
                AppError::NetworkError
            }
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateUrl => AppError::duplicate_resource("Post with this URL"),
            StoreError::FeedNotFound(_) => AppError::resource_not_found("Feed"),
            StoreError::Pool(e) => e.into(),
            StoreError::Database(e) => e.into(),
        }
    }
}

impl From<DbSetupError> for AppError {
    fn from(err: DbSetupError) -> Self {
        match err {
            DbSetupError::Pool(e) => e.into(),
            DbSetupError::Migrations(message) => {
                log::error!("Migrations failed: {}", message);
                AppError::DatabaseError
            }
        }
    }
}

impl From<ConfigError> for AppError {
    fn from(err: ConfigError) -> Self {
        AppError::ConfigurationError(err.to_string())
    }
}

impl From<IntervalError> for AppError {
    fn from(err: IntervalError) -> Self {
        AppError::invalid_input("interval", &err.to_string())
    }
}

/// Convert user table errors
impl From<UserTableError> for AppError {
    fn from(err: UserTableError) -> Self {
        match err {
            UserTableError::NameExists => AppError::duplicate_resource("User with this name"),
            UserTableError::InvalidName => {
                AppError::invalid_input("name", "must be 1 to 100 characters")
            }
            UserTableError::UserNotFound => AppError::resource_not_found("User"),
            UserTableError::DatabaseError => AppError::DatabaseError,
        }
    }
}

/// Convert feed table errors
impl From<FeedTableError> for AppError {
    fn from(err: FeedTableError) -> Self {
        match err {
            FeedTableError::UrlExists => AppError::duplicate_resource("Feed with this URL"),
            FeedTableError::InvalidUrl(message) => AppError::invalid_input("url", &message),
            FeedTableError::InvalidName => {
                AppError::invalid_input("name", "must be 1 to 100 characters")
            }
            FeedTableError::DatabaseError => AppError::DatabaseError,
        }
    }
}

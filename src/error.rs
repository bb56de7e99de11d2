use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Error response structure sent to clients
///
/// Every failed request is rendered in this shape, whatever the endpoint:
/// ```text
/// {
///   "status": "fail",
///   "message": "You are not allowed to perform this action"
/// }
/// ```
///
/// `HttpError` is what handlers and middleware return; this struct is only the
/// wire format, so internal details never reach the client.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub status: String,
    pub message: String,
}

impl fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string(self) {
            Ok(s) => write!(f, "{}", s),
            Err(_) => Err(fmt::Error),
        }
    }
}

/// Fixed error messages used across the application
///
/// Keeping them in one enum means the same failure always produces the same
/// text, and tests can compare against `ErrorMessage::X.to_string()`.
#[derive(Debug, PartialEq)]
pub enum ErrorMessage {
    // Authentication errors
    InvalidToken,
    TokenNotProvided,
    UserNotAuthenticated,
    UserNoLongerExist,

    // Authorization errors
    PermissionDenied,

    // Registration / token exchange
    EmailAlreadyUsed,
    UsernameTaken,
    WrongConfirmationCode,
    HashingError,

    // Content rules
    DuplicateReview,
    UnknownCategory,
    UnknownGenre,
    FieldRequired(&'static str),

    // Lookups
    UserNotFound,
    CategoryNotFound,
    GenreNotFound,
    TitleNotFound,
    ReviewNotFound,
    CommentNotFound,

    //Else
    ServerError,
}

impl fmt::Display for ErrorMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = match self {
            ErrorMessage::InvalidToken => "Token is invalid or expired".to_string(),
            ErrorMessage::TokenNotProvided => {
                "You are not logged in, please provide a token".to_string()
            }
            ErrorMessage::UserNotAuthenticated => {
                "Authentication required. Please log in.".to_string()
            }
            ErrorMessage::UserNoLongerExist => {
                "User belonging to this token no longer exists".to_string()
            }
            ErrorMessage::PermissionDenied => {
                "You are not allowed to perform this action".to_string()
            }
            ErrorMessage::EmailAlreadyUsed => "This email is already used".to_string(),
            ErrorMessage::UsernameTaken => "This username is already taken".to_string(),
            ErrorMessage::WrongConfirmationCode => "Wrong confirmation code".to_string(),
            ErrorMessage::HashingError => "Error while hashing confirmation code".to_string(),
            ErrorMessage::DuplicateReview => {
                "You have already reviewed this title".to_string()
            }
            ErrorMessage::UnknownCategory => "Category with this slug does not exist".to_string(),
            ErrorMessage::UnknownGenre => "Genre with this slug does not exist".to_string(),
            ErrorMessage::FieldRequired(field) => format!("Field '{}' is required", field),
            ErrorMessage::UserNotFound => "User not found".to_string(),
            ErrorMessage::CategoryNotFound => "Category not found".to_string(),
            ErrorMessage::GenreNotFound => "Genre not found".to_string(),
            ErrorMessage::TitleNotFound => "Title not found".to_string(),
            ErrorMessage::ReviewNotFound => "Review not found".to_string(),
            ErrorMessage::CommentNotFound => "Comment not found".to_string(),
            ErrorMessage::ServerError => "Server Error. Please try again later".to_string(),
        };
        write!(f, "{}", message)
    }
}

/// Internal HTTP error type used throughout the application
///
/// Handlers return `Result<T, HttpError>`; axum turns the error side into a
/// response through the `IntoResponse` impl below.
#[derive(Debug, Clone)]
pub struct HttpError {
    pub message: String,
    pub status: StatusCode,
}

impl HttpError {
    pub fn new(message: impl Into<String>, status: StatusCode) -> Self {
        HttpError {
            message: message.into(),
            status,
        }
    }

    /// 500 Internal Server Error. Database and mail failures end up here.
    pub fn server_error(message: impl Into<String>) -> Self {
        HttpError {
            message: message.into(),
            status: StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// 400 Bad Request for malformed, missing or conflicting input.
    pub fn bad_request(message: impl Into<String>) -> Self {
        HttpError {
            message: message.into(),
            status: StatusCode::BAD_REQUEST,
        }
    }

    /// 409 Conflict for unique constraint violations caught by the database.
    pub fn unique_constraint_violation(message: impl Into<String>) -> Self {
        HttpError {
            message: message.into(),
            status: StatusCode::CONFLICT,
        }
    }

    /// 401 Unauthorized: no identity, or an identity we could not verify.
    pub fn unauthorized(message: impl Into<String>) -> Self {
        HttpError {
            message: message.into(),
            status: StatusCode::UNAUTHORIZED,
        }
    }

    /// 403 Forbidden: the caller is known but its role is not enough.
    pub fn forbidden(message: impl Into<String>) -> Self {
        HttpError {
            message: message.into(),
            status: StatusCode::FORBIDDEN,
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        HttpError {
            message: message.into(),
            status: StatusCode::NOT_FOUND,
        }
    }

    /// Map a database failure to the error a client should see
    ///
    /// - unique violation: 409 with a message naming the clashing field
    /// - foreign key / check violation: 400
    /// - row not found: 404 with `not_found` as message
    /// - anything else: 500, details only go to the log
    pub fn from_db(context: &str, err: sqlx::Error, not_found: ErrorMessage) -> Self {
        match &err {
            sqlx::Error::RowNotFound => {
                tracing::error!("{}: row not found", context);
                HttpError::not_found(not_found.to_string())
            }
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                tracing::error!("{}, unique_violation: {}", context, db_err);
                HttpError::unique_constraint_violation(conflict_message(db_err.constraint()))
            }
            sqlx::Error::Database(db_err)
                if db_err.is_foreign_key_violation() || db_err.is_check_violation() =>
            {
                tracing::error!("{}, constraint violation: {}", context, db_err);
                HttpError::bad_request(db_err.message().to_string())
            }
            _ => {
                tracing::error!("DB error, {}: {}", context, err);
                HttpError::server_error(ErrorMessage::ServerError.to_string())
            }
        }
    }

    pub fn into_http_response(self) -> Response {
        let json_response = Json(ErrorResponse {
            status: "fail".to_string(),
            message: self.message.clone(),
        });

        (self.status, json_response).into_response()
    }
}

/// Human readable message for the unique constraints declared in `migrations/`.
fn conflict_message(constraint: Option<&str>) -> String {
    match constraint {
        Some("users_username_key") => ErrorMessage::UsernameTaken.to_string(),
        Some("users_email_key") => ErrorMessage::EmailAlreadyUsed.to_string(),
        Some("categories_slug_key") => "Category with this slug already exists".to_string(),
        Some("genres_slug_key") => "Genre with this slug already exists".to_string(),
        Some("titles_name_category_key") => {
            "Title with this name already exists in this category".to_string()
        }
        Some("reviews_author_title_key") => ErrorMessage::DuplicateReview.to_string(),
        _ => "Object already exists".to_string(),
    }
}

impl fmt::Display for HttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "HttpError: message: {}, status: {}",
            self.message, self.status
        )
    }
}

impl std::error::Error for HttpError {}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        self.into_http_response()
    }
}

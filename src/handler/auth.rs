use crate::{
    AppState,
    db::{NewUser, UserExt},
    dtos::{SignupDto, SignupResponseDto, TokenRequestDto, TokenResponseDto},
    error::{ErrorMessage, HttpError},
    extract::ValidatedJson,
    mail::mails::send_confirmation_code,
    models::UserRole,
    utils::{confirmation_code, token},
};
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::post,
};
use chrono::{DateTime, Duration, Utc};
use tracing::instrument;

/// Router for registration and token exchange; no authentication required
pub fn auth_handler() -> Router<AppState> {
    Router::new()
        .route("/signup", post(signup))
        .route("/token", post(obtain_token))
}

/// A freshly generated code, its stored hash and when it stops working
pub(crate) struct IssuedCode {
    pub code: String,
    pub hash: String,
    pub expires_at: DateTime<Utc>,
}

pub(crate) fn issue_code(valid_for_seconds: i64) -> Result<IssuedCode, HttpError> {
    let code = confirmation_code::generate();
    let hash = confirmation_code::hash(code.as_str()).map_err(|e| {
        tracing::error!("Confirmation code hashing error: {}", e);
        HttpError::server_error(ErrorMessage::HashingError.to_string())
    })?;

    Ok(IssuedCode {
        code,
        hash,
        expires_at: Utc::now() + Duration::seconds(valid_for_seconds),
    })
}

/// Mail the plain code; delivery problems are logged and otherwise ignored
pub(crate) async fn deliver_code(app_state: &AppState, email: &str, username: &str, code: &str) {
    let result = send_confirmation_code(
        &app_state.mailer,
        email,
        username,
        code,
        app_state.env.confirmation_code_maxage,
    )
    .await;

    if let Err(e) = result {
        tracing::error!(username = %username, "Failed to send confirmation code: {}", e);
    }
}

/// Create an account and mail it a confirmation code
#[instrument(skip(app_state, body), fields(username = %body.username, email = %body.email))]
pub async fn signup(
    State(app_state): State<AppState>,
    ValidatedJson(body): ValidatedJson<SignupDto>,
) -> Result<impl IntoResponse, HttpError> {
    let existing = app_state
        .db_client
        .get_user(None, None, Some(&body.email))
        .await
        .map_err(|e| HttpError::from_db("checking email", e, ErrorMessage::UserNotFound))?;
    if existing.is_some() {
        tracing::error!("Email already used");
        return Err(HttpError::bad_request(
            ErrorMessage::EmailAlreadyUsed.to_string(),
        ));
    }

    let existing = app_state
        .db_client
        .get_user(None, Some(&body.username), None)
        .await
        .map_err(|e| HttpError::from_db("checking username", e, ErrorMessage::UserNotFound))?;
    if existing.is_some() {
        tracing::error!("Username taken");
        return Err(HttpError::bad_request(
            ErrorMessage::UsernameTaken.to_string(),
        ));
    }

    let issued = issue_code(app_state.env.confirmation_code_maxage)?;

    // A concurrent signup can still slip past the checks above; the unique
    // indexes turn that into a 409
    let user = app_state
        .db_client
        .save_user(NewUser {
            username: &body.username,
            email: &body.email,
            role: UserRole::User,
            confirmation_code: Some(&issued.hash),
            code_expires_at: Some(issued.expires_at),
            self_registered: true,
            ..Default::default()
        })
        .await
        .map_err(|e| HttpError::from_db("saving user", e, ErrorMessage::UserNotFound))?;

    deliver_code(&app_state, &user.email, &user.username, &issued.code).await;

    tracing::info!("Signup Successful");
    Ok((
        StatusCode::OK,
        Json(SignupResponseDto {
            email: user.email,
            username: user.username,
        }),
    ))
}

/// Exchange username + confirmation code for an access token
#[instrument(skip(app_state, body), fields(username = %body.username))]
pub async fn obtain_token(
    State(app_state): State<AppState>,
    ValidatedJson(body): ValidatedJson<TokenRequestDto>,
) -> Result<impl IntoResponse, HttpError> {
    let user = app_state
        .db_client
        .get_user(None, Some(&body.username), None)
        .await
        .map_err(|e| HttpError::from_db("getting user", e, ErrorMessage::UserNotFound))?
        .ok_or_else(|| {
            tracing::error!("Unknown username");
            HttpError::not_found(ErrorMessage::UserNotFound.to_string())
        })?;

    let stored_hash = user.confirmation_code.as_deref();
    if !confirmation_code::verify(
        &body.confirmation_code,
        stored_hash,
        user.code_expires_at,
        Utc::now(),
    ) {
        tracing::error!("Wrong or expired confirmation code");
        return Err(HttpError::bad_request(
            ErrorMessage::WrongConfirmationCode.to_string(),
        ));
    }

    // Only one request can clear the code it verified against
    let consumed = match stored_hash {
        Some(hash) => app_state
            .db_client
            .consume_confirmation_code(user.id, hash)
            .await
            .map_err(|e| HttpError::from_db("consuming code", e, ErrorMessage::UserNotFound))?,
        None => false,
    };
    if !consumed {
        tracing::error!("Confirmation code already used");
        return Err(HttpError::bad_request(
            ErrorMessage::WrongConfirmationCode.to_string(),
        ));
    }

    let token = token::create_token(
        &user.id.to_string(),
        app_state.env.jwt_secret.as_bytes(),
        app_state.env.jwt_maxage,
    )
    .map_err(|e| {
        tracing::error!("Token creation error: {}", e);
        HttpError::server_error(ErrorMessage::ServerError.to_string())
    })?;

    tracing::info!("Token issued");
    Ok(Json(TokenResponseDto { token }))
}

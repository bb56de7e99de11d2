use crate::{
    AppState,
    db::{NewUser, UserExt},
    dtos::{CreateUserDto, FilterUserDto, ListResponseDto, RequestQueryDto, Response, UpdateUserDto},
    error::{ErrorMessage, HttpError},
    extract::{PathParams, ValidatedJson, ValidatedQuery},
    handler::auth::{deliver_code, issue_code},
    middleware::{JWTAuthMiddleware, auth, require},
    models::{User, UserRole},
    permissions::Capability,
};
use axum::{
    Extension, Json, Router,
    extract::State,
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{get, post},
};
use tracing::instrument;

/// Router for user endpoints
///
/// Every route needs an authenticated caller; everything except `/me` also
/// needs `ManageUsers`. Unmatched paths fall through to a plain 404.
pub fn users_handler(app_state: AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(get_users)
                .post(create_user)
                .route_layer(middleware::from_fn(|req, next| {
                    require(req, next, Capability::ManageUsers)
                })),
        )
        .route("/me", get(get_me).patch(update_me))
        .route(
            "/{username}",
            get(get_user)
                .patch(update_user)
                .delete(delete_user)
                .route_layer(middleware::from_fn(|req, next| {
                    require(req, next, Capability::ManageUsers)
                })),
        )
        .route(
            "/{username}/code",
            post(reissue_code).route_layer(middleware::from_fn(|req, next| {
                require(req, next, Capability::ManageUsers)
            })),
        )
        .route_layer(middleware::from_fn_with_state(app_state, auth))
}

async fn find_user(app_state: &AppState, username: &str) -> Result<User, HttpError> {
    app_state
        .db_client
        .get_user(None, Some(username), None)
        .await
        .map_err(|e| HttpError::from_db("getting user", e, ErrorMessage::UserNotFound))?
        .ok_or_else(|| {
            tracing::error!(username = %username, "User not found");
            HttpError::not_found(ErrorMessage::UserNotFound.to_string())
        })
}

/// Get paginated list of users, `?search=` filters on username
#[instrument(skip(app_state))]
pub async fn get_users(
    ValidatedQuery(query_params): ValidatedQuery<RequestQueryDto>,
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, HttpError> {
    let page = query_params.page();
    let limit = query_params.limit();
    let search = query_params.search.as_deref();

    let users = app_state
        .db_client
        .get_users(page, limit, search)
        .await
        .map_err(|e| HttpError::from_db("getting users", e, ErrorMessage::UserNotFound))?;

    let user_count = app_state
        .db_client
        .get_user_count(search)
        .await
        .map_err(|e| HttpError::from_db("getting user count", e, ErrorMessage::UserNotFound))?;

    tracing::info!("get_users successful");
    Ok(Json(ListResponseDto::new(
        FilterUserDto::filter_users(&users),
        page,
        limit,
        user_count,
    )))
}

/// Create an account directly; the user gets a code through `/{username}/code`
#[instrument(skip(app_state, body), fields(username = %body.username))]
pub async fn create_user(
    State(app_state): State<AppState>,
    ValidatedJson(body): ValidatedJson<CreateUserDto>,
) -> Result<impl IntoResponse, HttpError> {
    let user = app_state
        .db_client
        .save_user(NewUser {
            username: &body.username,
            email: &body.email,
            first_name: body.first_name.as_deref().unwrap_or_default(),
            last_name: body.last_name.as_deref().unwrap_or_default(),
            bio: body.bio.as_deref().unwrap_or_default(),
            role: body.role.unwrap_or(UserRole::User),
            ..Default::default()
        })
        .await
        .map_err(|e| HttpError::from_db("saving user", e, ErrorMessage::UserNotFound))?;

    tracing::info!("create_user successful");
    Ok((StatusCode::CREATED, Json(FilterUserDto::filter_user(&user))))
}

#[instrument(skip(app_state))]
pub async fn get_user(
    PathParams(username): PathParams<String>,
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, HttpError> {
    let user = find_user(&app_state, &username).await?;

    tracing::info!("get_user successful");
    Ok(Json(FilterUserDto::filter_user(&user)))
}

/// Partial update by an admin, `role` included
#[instrument(skip(app_state, body))]
pub async fn update_user(
    PathParams(username): PathParams<String>,
    State(app_state): State<AppState>,
    ValidatedJson(body): ValidatedJson<UpdateUserDto>,
) -> Result<impl IntoResponse, HttpError> {
    let user = find_user(&app_state, &username).await?;

    let updated = app_state
        .db_client
        .update_user(user.id, &body, body.role)
        .await
        .map_err(|e| HttpError::from_db("updating user", e, ErrorMessage::UserNotFound))?;

    tracing::info!("update_user successful");
    Ok(Json(FilterUserDto::filter_user(&updated)))
}

#[instrument(skip(app_state))]
pub async fn delete_user(
    PathParams(username): PathParams<String>,
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, HttpError> {
    let user = find_user(&app_state, &username).await?;

    app_state
        .db_client
        .delete_user(user.id)
        .await
        .map_err(|e| HttpError::from_db("deleting user", e, ErrorMessage::UserNotFound))?;

    tracing::info!("delete_user successful");
    Ok(StatusCode::NO_CONTENT)
}

/// Replace the user's pending confirmation code and mail the new one
#[instrument(skip(app_state))]
pub async fn reissue_code(
    PathParams(username): PathParams<String>,
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, HttpError> {
    let user = find_user(&app_state, &username).await?;

    let issued = issue_code(app_state.env.confirmation_code_maxage)?;

    app_state
        .db_client
        .set_confirmation_code(user.id, &issued.hash, issued.expires_at)
        .await
        .map_err(|e| HttpError::from_db("storing code", e, ErrorMessage::UserNotFound))?;

    deliver_code(&app_state, &user.email, &user.username, &issued.code).await;

    tracing::info!("reissue_code successful");
    Ok(Json(Response {
        status: "success",
        message: "Confirmation code sent".to_string(),
    }))
}

/// Get the caller's own profile
#[instrument(skip(user), fields(username = %user.user.username))]
pub async fn get_me(
    Extension(user): Extension<JWTAuthMiddleware>,
) -> Result<impl IntoResponse, HttpError> {
    tracing::info!("get_me successful");
    Ok(Json(FilterUserDto::filter_user(&user.user)))
}

/// Update the caller's own profile; `role` in the body is ignored
#[instrument(skip(app_state, user, body), fields(username = %user.user.username))]
pub async fn update_me(
    Extension(user): Extension<JWTAuthMiddleware>,
    State(app_state): State<AppState>,
    ValidatedJson(body): ValidatedJson<UpdateUserDto>,
) -> Result<impl IntoResponse, HttpError> {
    let updated = app_state
        .db_client
        .update_user(user.user.id, &body, None)
        .await
        .map_err(|e| HttpError::from_db("updating user", e, ErrorMessage::UserNotFound))?;

    tracing::info!("update_me successful");
    Ok(Json(FilterUserDto::filter_user(&updated)))
}

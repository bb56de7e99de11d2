use crate::{
    AppState,
    db::{ReviewExt, TitleExt},
    dtos::{InputReviewDto, ListResponseDto, RequestQueryDto, ReviewDto},
    error::{ErrorMessage, HttpError},
    extract::{PathParams, ValidatedJson, ValidatedQuery},
    handler::comments::comments_handler,
    middleware::{JWTAuthMiddleware, auth},
    models::Review,
    permissions::ensure_can_modify_content,
};
use axum::{
    Extension, Json, Router,
    extract::State,
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{get, post, put},
};
use tracing::instrument;

/// Router for `/titles/{title_id}/reviews`
///
/// Reading is public. Writing needs a logged-in user; changing or deleting a
/// review also needs to be its author, a moderator or an admin.
pub fn reviews_handler(app_state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(get_reviews))
        .route(
            "/",
            post(create_review).route_layer(middleware::from_fn_with_state(app_state.clone(), auth)),
        )
        .route("/{review_id}", get(get_review))
        .route(
            "/{review_id}",
            put(replace_review)
                .patch(update_review)
                .delete(delete_review)
                .route_layer(middleware::from_fn_with_state(app_state.clone(), auth)),
        )
        .nest("/{review_id}/comments", comments_handler(app_state))
}

pub(crate) async fn ensure_title_exists(app_state: &AppState, title_id: i64) -> Result<(), HttpError> {
    let exists = app_state
        .db_client
        .title_exists(title_id)
        .await
        .map_err(|e| HttpError::from_db("checking title", e, ErrorMessage::TitleNotFound))?;

    if !exists {
        tracing::error!(title_id, "Title not found");
        return Err(HttpError::not_found(ErrorMessage::TitleNotFound.to_string()));
    }

    Ok(())
}

/// The review, if it belongs to that title
pub(crate) async fn find_review(
    app_state: &AppState,
    title_id: i64,
    review_id: i64,
) -> Result<Review, HttpError> {
    ensure_title_exists(app_state, title_id).await?;

    app_state
        .db_client
        .get_review(title_id, review_id)
        .await
        .map_err(|e| HttpError::from_db("getting review", e, ErrorMessage::ReviewNotFound))?
        .ok_or_else(|| {
            tracing::error!(title_id, review_id, "Review not found");
            HttpError::not_found(ErrorMessage::ReviewNotFound.to_string())
        })
}

/// Reviews of a title, newest first
#[instrument(skip(app_state))]
pub async fn get_reviews(
    PathParams(title_id): PathParams<i64>,
    ValidatedQuery(query_params): ValidatedQuery<RequestQueryDto>,
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, HttpError> {
    ensure_title_exists(&app_state, title_id).await?;

    let page = query_params.page();
    let limit = query_params.limit();

    let reviews = app_state
        .db_client
        .get_reviews(title_id, page, limit)
        .await
        .map_err(|e| HttpError::from_db("getting reviews", e, ErrorMessage::ReviewNotFound))?;

    let total = app_state
        .db_client
        .get_review_count(title_id)
        .await
        .map_err(|e| HttpError::from_db("counting reviews", e, ErrorMessage::ReviewNotFound))?;

    let data = reviews.into_iter().map(ReviewDto::from).collect();

    tracing::info!("get_reviews successful");
    Ok(Json(ListResponseDto::new(data, page, limit, total)))
}

#[instrument(skip(app_state))]
pub async fn get_review(
    PathParams((title_id, review_id)): PathParams<(i64, i64)>,
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, HttpError> {
    let review = find_review(&app_state, title_id, review_id).await?;

    tracing::info!("get_review successful");
    Ok(Json(ReviewDto::from(review)))
}

/// One review per author and title; the author is the caller
#[instrument(skip(app_state, user, body), fields(username = %user.user.username))]
pub async fn create_review(
    PathParams(title_id): PathParams<i64>,
    State(app_state): State<AppState>,
    Extension(user): Extension<JWTAuthMiddleware>,
    ValidatedJson(body): ValidatedJson<InputReviewDto>,
) -> Result<impl IntoResponse, HttpError> {
    let text = body
        .text
        .as_deref()
        .ok_or_else(|| HttpError::bad_request(ErrorMessage::FieldRequired("text").to_string()))?;
    let score = body
        .score
        .ok_or_else(|| HttpError::bad_request(ErrorMessage::FieldRequired("score").to_string()))?;

    ensure_title_exists(&app_state, title_id).await?;

    let already_reviewed = app_state
        .db_client
        .has_reviewed(user.user.id, title_id)
        .await
        .map_err(|e| HttpError::from_db("checking review", e, ErrorMessage::ReviewNotFound))?;
    if already_reviewed {
        tracing::error!(title_id, "Duplicate review");
        return Err(HttpError::bad_request(
            ErrorMessage::DuplicateReview.to_string(),
        ));
    }

    let review = app_state
        .db_client
        .create_review(user.user.id, title_id, text, score)
        .await
        .map_err(|e| HttpError::from_db("creating review", e, ErrorMessage::ReviewNotFound))?;

    tracing::info!(review_id = review.id, "create_review successful");
    Ok((StatusCode::CREATED, Json(ReviewDto::from(review))))
}

/// Full update, `text` and `score` both required
#[instrument(skip(app_state, user, body), fields(username = %user.user.username))]
pub async fn replace_review(
    PathParams((title_id, review_id)): PathParams<(i64, i64)>,
    State(app_state): State<AppState>,
    Extension(user): Extension<JWTAuthMiddleware>,
    ValidatedJson(body): ValidatedJson<InputReviewDto>,
) -> Result<impl IntoResponse, HttpError> {
    let text = body
        .text
        .as_deref()
        .ok_or_else(|| HttpError::bad_request(ErrorMessage::FieldRequired("text").to_string()))?;
    let score = body
        .score
        .ok_or_else(|| HttpError::bad_request(ErrorMessage::FieldRequired("score").to_string()))?;

    let review = find_review(&app_state, title_id, review_id).await?;
    ensure_can_modify_content(&user.user, review.author_id)?;

    let review = app_state
        .db_client
        .update_review(review.id, Some(text), Some(score))
        .await
        .map_err(|e| HttpError::from_db("replacing review", e, ErrorMessage::ReviewNotFound))?;

    tracing::info!("replace_review successful");
    Ok(Json(ReviewDto::from(review)))
}

/// Partial update; never subject to the one-review-per-title check
#[instrument(skip(app_state, user, body), fields(username = %user.user.username))]
pub async fn update_review(
    PathParams((title_id, review_id)): PathParams<(i64, i64)>,
    State(app_state): State<AppState>,
    Extension(user): Extension<JWTAuthMiddleware>,
    ValidatedJson(body): ValidatedJson<InputReviewDto>,
) -> Result<impl IntoResponse, HttpError> {
    let review = find_review(&app_state, title_id, review_id).await?;
    ensure_can_modify_content(&user.user, review.author_id)?;

    let review = app_state
        .db_client
        .update_review(review.id, body.text.as_deref(), body.score)
        .await
        .map_err(|e| HttpError::from_db("updating review", e, ErrorMessage::ReviewNotFound))?;

    tracing::info!("update_review successful");
    Ok(Json(ReviewDto::from(review)))
}

/// Comments on the review are deleted with it
#[instrument(skip(app_state, user), fields(username = %user.user.username))]
pub async fn delete_review(
    PathParams((title_id, review_id)): PathParams<(i64, i64)>,
    State(app_state): State<AppState>,
    Extension(user): Extension<JWTAuthMiddleware>,
) -> Result<impl IntoResponse, HttpError> {
    let review = find_review(&app_state, title_id, review_id).await?;
    ensure_can_modify_content(&user.user, review.author_id)?;

    app_state
        .db_client
        .delete_review(review.id)
        .await
        .map_err(|e| HttpError::from_db("deleting review", e, ErrorMessage::ReviewNotFound))?;

    tracing::info!("delete_review successful");
    Ok(StatusCode::NO_CONTENT)
}

use crate::{
    AppState,
    db::CommentExt,
    dtos::{CommentDto, InputCommentDto, ListResponseDto, RequestQueryDto},
    error::{ErrorMessage, HttpError},
    extract::{PathParams, ValidatedJson, ValidatedQuery},
    handler::reviews::find_review,
    middleware::{JWTAuthMiddleware, auth},
    models::Comment,
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

/// Router for `/titles/{title_id}/reviews/{review_id}/comments`
///
/// Same rules as reviews: public reads, authenticated writes, changes by the
/// author, a moderator or an admin.
pub fn comments_handler(app_state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(get_comments))
        .route(
            "/",
            post(create_comment).route_layer(middleware::from_fn_with_state(app_state.clone(), auth)),
        )
        .route("/{comment_id}", get(get_comment))
        .route(
            "/{comment_id}",
            put(replace_comment)
                .patch(update_comment)
                .delete(delete_comment)
                .route_layer(middleware::from_fn_with_state(app_state, auth)),
        )
}

async fn find_comment(
    app_state: &AppState,
    title_id: i64,
    review_id: i64,
    comment_id: i64,
) -> Result<Comment, HttpError> {
    find_review(app_state, title_id, review_id).await?;

    app_state
        .db_client
        .get_comment(review_id, comment_id)
        .await
        .map_err(|e| HttpError::from_db("getting comment", e, ErrorMessage::CommentNotFound))?
        .ok_or_else(|| {
            tracing::error!(review_id, comment_id, "Comment not found");
            HttpError::not_found(ErrorMessage::CommentNotFound.to_string())
        })
}

/// Comments of a review, newest first
#[instrument(skip(app_state))]
pub async fn get_comments(
    PathParams((title_id, review_id)): PathParams<(i64, i64)>,
    ValidatedQuery(query_params): ValidatedQuery<RequestQueryDto>,
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, HttpError> {
    find_review(&app_state, title_id, review_id).await?;

    let page = query_params.page();
    let limit = query_params.limit();

    let comments = app_state
        .db_client
        .get_comments(review_id, page, limit)
        .await
        .map_err(|e| HttpError::from_db("getting comments", e, ErrorMessage::CommentNotFound))?;

    let total = app_state
        .db_client
        .get_comment_count(review_id)
        .await
        .map_err(|e| HttpError::from_db("counting comments", e, ErrorMessage::CommentNotFound))?;

    let data = comments.into_iter().map(CommentDto::from).collect();

    tracing::info!("get_comments successful");
    Ok(Json(ListResponseDto::new(data, page, limit, total)))
}

#[instrument(skip(app_state))]
pub async fn get_comment(
    PathParams((title_id, review_id, comment_id)): PathParams<(i64, i64, i64)>,
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, HttpError> {
    let comment = find_comment(&app_state, title_id, review_id, comment_id).await?;

    tracing::info!("get_comment successful");
    Ok(Json(CommentDto::from(comment)))
}

#[instrument(skip(app_state, user, body), fields(username = %user.user.username))]
pub async fn create_comment(
    PathParams((title_id, review_id)): PathParams<(i64, i64)>,
    State(app_state): State<AppState>,
    Extension(user): Extension<JWTAuthMiddleware>,
    ValidatedJson(body): ValidatedJson<InputCommentDto>,
) -> Result<impl IntoResponse, HttpError> {
    let text = body
        .text
        .as_deref()
        .ok_or_else(|| HttpError::bad_request(ErrorMessage::FieldRequired("text").to_string()))?;

    find_review(&app_state, title_id, review_id).await?;

    let comment = app_state
        .db_client
        .create_comment(user.user.id, review_id, text)
        .await
        .map_err(|e| HttpError::from_db("creating comment", e, ErrorMessage::CommentNotFound))?;

    tracing::info!(comment_id = comment.id, "create_comment successful");
    Ok((StatusCode::CREATED, Json(CommentDto::from(comment))))
}

/// PUT and PATCH differ only in whether `text` may be left out; a comment
/// has no other writable field
async fn edit_comment(
    app_state: &AppState,
    user: &JWTAuthMiddleware,
    (title_id, review_id, comment_id): (i64, i64, i64),
    text: Option<&str>,
) -> Result<Comment, HttpError> {
    let comment = find_comment(app_state, title_id, review_id, comment_id).await?;
    ensure_can_modify_content(&user.user, comment.author_id)?;

    let Some(text) = text else {
        return Ok(comment);
    };

    app_state
        .db_client
        .update_comment(comment.id, text)
        .await
        .map_err(|e| HttpError::from_db("updating comment", e, ErrorMessage::CommentNotFound))
}

#[instrument(skip(app_state, user, body), fields(username = %user.user.username))]
pub async fn replace_comment(
    PathParams(ids): PathParams<(i64, i64, i64)>,
    State(app_state): State<AppState>,
    Extension(user): Extension<JWTAuthMiddleware>,
    ValidatedJson(body): ValidatedJson<InputCommentDto>,
) -> Result<impl IntoResponse, HttpError> {
    let text = body
        .text
        .as_deref()
        .ok_or_else(|| HttpError::bad_request(ErrorMessage::FieldRequired("text").to_string()))?;

    let comment = edit_comment(&app_state, &user, ids, Some(text)).await?;

    tracing::info!("replace_comment successful");
    Ok(Json(CommentDto::from(comment)))
}

#[instrument(skip(app_state, user, body), fields(username = %user.user.username))]
pub async fn update_comment(
    PathParams(ids): PathParams<(i64, i64, i64)>,
    State(app_state): State<AppState>,
    Extension(user): Extension<JWTAuthMiddleware>,
    ValidatedJson(body): ValidatedJson<InputCommentDto>,
) -> Result<impl IntoResponse, HttpError> {
    let comment = edit_comment(&app_state, &user, ids, body.text.as_deref()).await?;

    tracing::info!("update_comment successful");
    Ok(Json(CommentDto::from(comment)))
}

#[instrument(skip(app_state, user), fields(username = %user.user.username))]
pub async fn delete_comment(
    PathParams((title_id, review_id, comment_id)): PathParams<(i64, i64, i64)>,
    State(app_state): State<AppState>,
    Extension(user): Extension<JWTAuthMiddleware>,
) -> Result<impl IntoResponse, HttpError> {
    let comment = find_comment(&app_state, title_id, review_id, comment_id).await?;
    ensure_can_modify_content(&user.user, comment.author_id)?;

    app_state
        .db_client
        .delete_comment(comment.id)
        .await
        .map_err(|e| HttpError::from_db("deleting comment", e, ErrorMessage::CommentNotFound))?;

    tracing::info!("delete_comment successful");
    Ok(StatusCode::NO_CONTENT)
}

use crate::{
    AppState,
    db::{NewTitle, TaxonomyExt, TitleChanges, TitleExt},
    dtos::{InputTitleDto, ListResponseDto, TitleDto, TitlesQueryParams},
    error::{ErrorMessage, HttpError},
    extract::{PathParams, ValidatedJson, ValidatedQuery},
    handler::reviews::reviews_handler,
    middleware::{auth, require},
    models::Taxonomy,
    permissions::Capability,
};
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{get, post, put},
};
use tracing::instrument;

/// Router for titles and everything nested under them
pub fn titles_handler(app_state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(get_titles))
        .route(
            "/",
            post(create_title)
                .route_layer(middleware::from_fn(|req, next| {
                    require(req, next, Capability::ManageCatalog)
                }))
                .route_layer(middleware::from_fn_with_state(app_state.clone(), auth)),
        )
        .route("/{title_id}", get(get_title))
        .route(
            "/{title_id}",
            put(replace_title)
                .patch(update_title)
                .delete(delete_title)
                .route_layer(middleware::from_fn(|req, next| {
                    require(req, next, Capability::ManageCatalog)
                }))
                .route_layer(middleware::from_fn_with_state(app_state.clone(), auth)),
        )
        .nest("/{title_id}/reviews", reviews_handler(app_state))
}

/// Title in its read representation: category, genres and rating attached
async fn load_title(app_state: &AppState, title_id: i64) -> Result<TitleDto, HttpError> {
    let row = app_state
        .db_client
        .get_title(title_id)
        .await
        .map_err(|e| HttpError::from_db("getting title", e, ErrorMessage::TitleNotFound))?
        .ok_or_else(|| {
            tracing::error!(title_id, "Title not found");
            HttpError::not_found(ErrorMessage::TitleNotFound.to_string())
        })?;

    let genres = app_state
        .db_client
        .get_title_genres(&[row.id])
        .await
        .map_err(|e| HttpError::from_db("getting title genres", e, ErrorMessage::TitleNotFound))?;

    Ok(TitleDto::from_row(&row, &genres))
}

async fn resolve_category(app_state: &AppState, slug: &str) -> Result<i64, HttpError> {
    let category = app_state
        .db_client
        .get_taxon(Taxonomy::Category, slug)
        .await
        .map_err(|e| HttpError::from_db("resolving category", e, ErrorMessage::CategoryNotFound))?
        .ok_or_else(|| {
            tracing::error!(slug = %slug, "Unknown category");
            HttpError::bad_request(ErrorMessage::UnknownCategory.to_string())
        })?;

    Ok(category.id)
}

/// Every slug must name an existing genre
async fn resolve_genres(app_state: &AppState, slugs: &[String]) -> Result<Vec<i64>, HttpError> {
    let mut wanted = slugs.to_vec();
    wanted.sort();
    wanted.dedup();

    let genres = app_state
        .db_client
        .get_taxa_by_slugs(Taxonomy::Genre, &wanted)
        .await
        .map_err(|e| HttpError::from_db("resolving genres", e, ErrorMessage::GenreNotFound))?;

    if genres.len() != wanted.len() {
        tracing::error!(?wanted, "Unknown genre");
        return Err(HttpError::bad_request(
            ErrorMessage::UnknownGenre.to_string(),
        ));
    }

    Ok(genres.into_iter().map(|genre| genre.id).collect())
}

fn required<'a, T: ?Sized>(value: Option<&'a T>, field: &'static str) -> Result<&'a T, HttpError> {
    value.ok_or_else(|| HttpError::bad_request(ErrorMessage::FieldRequired(field).to_string()))
}

/// Paginated list ordered by name
///
/// Query params: ?page=&limit=&genre=<slug>&category=<slug>&name=<substring>&year=
#[instrument(skip(app_state))]
pub async fn get_titles(
    ValidatedQuery(params): ValidatedQuery<TitlesQueryParams>,
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, HttpError> {
    let page = params.page.unwrap_or(1);
    let limit = params.limit.unwrap_or(10);

    let rows = app_state
        .db_client
        .get_titles(&params, page, limit)
        .await
        .map_err(|e| HttpError::from_db("getting titles", e, ErrorMessage::TitleNotFound))?;

    let total = app_state
        .db_client
        .get_title_count(&params)
        .await
        .map_err(|e| HttpError::from_db("counting titles", e, ErrorMessage::TitleNotFound))?;

    let ids: Vec<i64> = rows.iter().map(|row| row.id).collect();
    let genres = app_state
        .db_client
        .get_title_genres(&ids)
        .await
        .map_err(|e| HttpError::from_db("getting title genres", e, ErrorMessage::TitleNotFound))?;

    let data = rows
        .iter()
        .map(|row| TitleDto::from_row(row, &genres))
        .collect();

    tracing::info!("get_titles successful");
    Ok(Json(ListResponseDto::new(data, page, limit, total)))
}

#[instrument(skip(app_state))]
pub async fn get_title(
    PathParams(title_id): PathParams<i64>,
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, HttpError> {
    let title = load_title(&app_state, title_id).await?;

    tracing::info!("get_title successful");
    Ok(Json(title))
}

#[instrument(skip(app_state, body))]
pub async fn create_title(
    State(app_state): State<AppState>,
    ValidatedJson(body): ValidatedJson<InputTitleDto>,
) -> Result<impl IntoResponse, HttpError> {
    let name = required(body.name.as_deref(), "name")?;
    let year = *required(body.year.as_ref(), "year")?;
    let category = required(body.category.as_deref(), "category")?;
    let genre = required(body.genre.as_ref(), "genre")?;

    let category_id = resolve_category(&app_state, category).await?;
    let genre_ids = resolve_genres(&app_state, genre).await?;

    let title_id = app_state
        .db_client
        .create_title(NewTitle {
            name,
            year,
            description: body.description.as_deref(),
            category_id,
            genre_ids,
        })
        .await
        .map_err(|e| HttpError::from_db("creating title", e, ErrorMessage::TitleNotFound))?;

    let title = load_title(&app_state, title_id).await?;

    tracing::info!(title_id, "create_title successful");
    Ok((StatusCode::CREATED, Json(title)))
}

/// Full update: the same fields as creation are required, an absent
/// description is cleared
#[instrument(skip(app_state, body))]
pub async fn replace_title(
    PathParams(title_id): PathParams<i64>,
    State(app_state): State<AppState>,
    ValidatedJson(body): ValidatedJson<InputTitleDto>,
) -> Result<impl IntoResponse, HttpError> {
    let name = required(body.name.as_deref(), "name")?;
    let year = *required(body.year.as_ref(), "year")?;
    let category = required(body.category.as_deref(), "category")?;
    let genre = required(body.genre.as_ref(), "genre")?;

    let category_id = resolve_category(&app_state, category).await?;
    let genre_ids = resolve_genres(&app_state, genre).await?;

    app_state
        .db_client
        .update_title(
            title_id,
            TitleChanges {
                name: Some(name),
                year: Some(year),
                description: Some(body.description.as_deref()),
                category_id: Some(category_id),
                genre_ids: Some(genre_ids),
            },
        )
        .await
        .map_err(|e| HttpError::from_db("replacing title", e, ErrorMessage::TitleNotFound))?;

    let title = load_title(&app_state, title_id).await?;

    tracing::info!("replace_title successful");
    Ok(Json(title))
}

/// Partial update: only the fields present in the body change
#[instrument(skip(app_state, body))]
pub async fn update_title(
    PathParams(title_id): PathParams<i64>,
    State(app_state): State<AppState>,
    ValidatedJson(body): ValidatedJson<InputTitleDto>,
) -> Result<impl IntoResponse, HttpError> {
    let category_id = match body.category.as_deref() {
        Some(slug) => Some(resolve_category(&app_state, slug).await?),
        None => None,
    };
    let genre_ids = match body.genre.as_deref() {
        Some(slugs) => Some(resolve_genres(&app_state, slugs).await?),
        None => None,
    };

    app_state
        .db_client
        .update_title(
            title_id,
            TitleChanges {
                name: body.name.as_deref(),
                year: body.year,
                description: body.description.as_deref().map(Some),
                category_id,
                genre_ids,
            },
        )
        .await
        .map_err(|e| HttpError::from_db("updating title", e, ErrorMessage::TitleNotFound))?;

    let title = load_title(&app_state, title_id).await?;

    tracing::info!("update_title successful");
    Ok(Json(title))
}

/// Reviews and their comments are deleted with the title
#[instrument(skip(app_state))]
pub async fn delete_title(
    PathParams(title_id): PathParams<i64>,
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, HttpError> {
    app_state
        .db_client
        .delete_title(title_id)
        .await
        .map_err(|e| HttpError::from_db("deleting title", e, ErrorMessage::TitleNotFound))?;

    tracing::info!("delete_title successful");
    Ok(StatusCode::NO_CONTENT)
}

use crate::{
    AppState,
    db::TaxonomyExt,
    dtos::{InputTaxonDto, ListResponseDto, RequestQueryDto, TaxonDto},
    error::{ErrorMessage, HttpError},
    extract::{PathParams, ValidatedJson, ValidatedQuery},
    middleware::{auth, require},
    models::Taxonomy,
    permissions::Capability,
};
use axum::{
    Extension, Json, Router,
    extract::State,
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{delete, get, post},
};
use tracing::instrument;

/// Router shared by `/categories` and `/genres`
///
/// Listing is public; creating and deleting need `ManageCatalog`. There is no
/// retrieve or update.
pub fn taxonomy_handler(app_state: AppState, kind: Taxonomy) -> Router<AppState> {
    Router::new()
        .route("/", get(get_taxa))
        .route(
            "/",
            post(create_taxon)
                .route_layer(middleware::from_fn(|req, next| {
                    require(req, next, Capability::ManageCatalog)
                }))
                .route_layer(middleware::from_fn_with_state(app_state.clone(), auth)),
        )
        .route(
            "/{slug}",
            delete(delete_taxon)
                .route_layer(middleware::from_fn(|req, next| {
                    require(req, next, Capability::ManageCatalog)
                }))
                .route_layer(middleware::from_fn_with_state(app_state, auth)),
        )
        .layer(Extension(kind))
}

fn not_found(kind: Taxonomy) -> ErrorMessage {
    match kind {
        Taxonomy::Category => ErrorMessage::CategoryNotFound,
        Taxonomy::Genre => ErrorMessage::GenreNotFound,
    }
}

/// Paginated list ordered by name, `?search=` filters on name
#[instrument(skip(app_state))]
pub async fn get_taxa(
    Extension(kind): Extension<Taxonomy>,
    ValidatedQuery(query_params): ValidatedQuery<RequestQueryDto>,
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, HttpError> {
    let page = query_params.page();
    let limit = query_params.limit();
    let search = query_params.search.as_deref();

    let taxa = app_state
        .db_client
        .get_taxa(kind, page, limit, search)
        .await
        .map_err(|e| HttpError::from_db(kind.table(), e, not_found(kind)))?;

    let total = app_state
        .db_client
        .get_taxon_count(kind, search)
        .await
        .map_err(|e| HttpError::from_db(kind.table(), e, not_found(kind)))?;

    let data = taxa.iter().map(TaxonDto::from).collect();

    tracing::info!("get_taxa successful");
    Ok(Json(ListResponseDto::new(data, page, limit, total)))
}

#[instrument(skip(app_state, body), fields(slug = %body.slug))]
pub async fn create_taxon(
    Extension(kind): Extension<Taxonomy>,
    State(app_state): State<AppState>,
    ValidatedJson(body): ValidatedJson<InputTaxonDto>,
) -> Result<impl IntoResponse, HttpError> {
    let taxon = app_state
        .db_client
        .create_taxon(kind, &body.name, &body.slug)
        .await
        .map_err(|e| HttpError::from_db(kind.table(), e, not_found(kind)))?;

    tracing::info!("create_taxon successful");
    Ok((StatusCode::CREATED, Json(TaxonDto::from(&taxon))))
}

/// Titles of a deleted category keep existing without one
#[instrument(skip(app_state))]
pub async fn delete_taxon(
    Extension(kind): Extension<Taxonomy>,
    PathParams(slug): PathParams<String>,
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, HttpError> {
    app_state
        .db_client
        .delete_taxon(kind, &slug)
        .await
        .map_err(|e| HttpError::from_db(kind.table(), e, not_found(kind)))?;

    tracing::info!("delete_taxon successful");
    Ok(StatusCode::NO_CONTENT)
}

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::IntoResponse,
};

use axum_extra::extract::cookie::CookieJar;
use serde::{Deserialize, Serialize};

use crate::{
    AppState,
    db::UserExt,
    error::{ErrorMessage, HttpError},
    models::User,
    permissions::{self, Capability},
    utils::token,
};

/// Middleware extension that stores authenticated user information
///
/// Inserted into the request extensions by [`auth`]; handlers behind it take
/// `Extension(auth): Extension<JWTAuthMiddleware>` to get at the caller.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct JWTAuthMiddleware {
    pub user: User,
}

/// Pull the raw token from the `access_token` cookie or an
/// `Authorization: Bearer <token>` header, cookie first.
fn extract_token(cookie_jar: &CookieJar, req: &Request) -> Option<String> {
    cookie_jar
        .get("access_token")
        .map(|cookie| cookie.value().to_string())
        .or_else(|| {
            req.headers()
                .get(header::AUTHORIZATION)
                .and_then(|auth_header| auth_header.to_str().ok())
                .and_then(|auth_value| auth_value.strip_prefix("Bearer "))
                .map(|token| token.trim().to_owned())
        })
}

/// Authentication middleware that validates JWT tokens
///
/// 1. Extracts the token (see [`extract_token`])
/// 2. Verifies signature and expiry
/// 3. Loads the user named by the `sub` claim
/// 4. Attaches it to the request as [`JWTAuthMiddleware`]
///
/// # Errors
/// 401 when no token is provided, the token is invalid or expired, or its
/// user has been deleted since it was issued.
pub async fn auth(
    cookie_jar: CookieJar,
    State(app_state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<impl IntoResponse, HttpError> {
    let token = extract_token(&cookie_jar, &req)
        .ok_or_else(|| HttpError::unauthorized(ErrorMessage::TokenNotProvided.to_string()))?;

    let user_id = token::decode_token(token, app_state.env.jwt_secret.as_bytes())?;

    let user_id = uuid::Uuid::parse_str(&user_id)
        .map_err(|_| HttpError::unauthorized(ErrorMessage::InvalidToken.to_string()))?;

    let user = app_state
        .db_client
        .get_user(Some(user_id), None, None)
        .await
        .map_err(|e| HttpError::from_db("loading token user", e, ErrorMessage::UserNoLongerExist))?;

    // The account may have been deleted after the token was issued
    let user =
        user.ok_or_else(|| HttpError::unauthorized(ErrorMessage::UserNoLongerExist.to_string()))?;

    req.extensions_mut().insert(JWTAuthMiddleware { user });

    Ok(next.run(req).await)
}

/// Capability gate; must run after [`auth`]
///
/// # Errors
/// Returns 401 if no user was attached by `auth`,
/// 403 if the user lacks `capability`.
pub async fn require(
    req: Request,
    next: Next,
    capability: Capability,
) -> Result<impl IntoResponse, HttpError> {
    let auth = req
        .extensions()
        .get::<JWTAuthMiddleware>()
        .ok_or_else(|| HttpError::unauthorized(ErrorMessage::UserNotAuthenticated.to_string()))?;

    if !permissions::has_capability(&auth.user, capability) {
        tracing::error!(username = %auth.user.username, ?capability, "Permission denied");
        return Err(HttpError::forbidden(
            ErrorMessage::PermissionDenied.to_string(),
        ));
    }

    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        Extension, Router,
        body::Body,
        http::StatusCode,
        middleware,
        routing::get,
    };
    use tower::ServiceExt;

    use crate::{models::UserRole, permissions::tests::user_with};

    fn gated(user: Option<User>) -> Router {
        let router = Router::new().route(
            "/",
            get(|| async { "ok" }).route_layer(middleware::from_fn(|req, next| {
                require(req, next, Capability::ManageCatalog)
            })),
        );
        match user {
            Some(user) => router.layer(Extension(JWTAuthMiddleware { user })),
            None => router,
        }
    }

    async fn status_of(router: Router) -> StatusCode {
        router
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap()
            .status()
    }

    #[tokio::test]
    async fn capability_gate_without_user_is_unauthorized() {
        assert_eq!(status_of(gated(None)).await, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn capability_gate_checks_role() {
        let moderator = user_with(UserRole::Moderator, false);
        assert_eq!(status_of(gated(Some(moderator))).await, StatusCode::FORBIDDEN);

        let admin = user_with(UserRole::Admin, false);
        assert_eq!(status_of(gated(Some(admin))).await, StatusCode::OK);
    }

    #[test]
    fn bearer_header_is_read_when_no_cookie() {
        let req = Request::builder()
            .header(header::AUTHORIZATION, "Bearer abc.def.ghi")
            .body(Body::empty())
            .unwrap();
        assert_eq!(
            extract_token(&CookieJar::new(), &req),
            Some("abc.def.ghi".to_string())
        );

        let req = Request::builder()
            .header(header::AUTHORIZATION, "Basic Zm9vOmJhcg==")
            .body(Body::empty())
            .unwrap();
        assert_eq!(extract_token(&CookieJar::new(), &req), None);
    }
}

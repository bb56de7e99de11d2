//! Requests that are answered before any query runs, so no database is needed.

mod common;

use axum::http::{Method, StatusCode};
use common::{offline_state, send};
use serde_json::json;

#[tokio::test]
async fn anonymous_writes_are_unauthorized() {
    let state = offline_state();

    let cases = [
        (Method::POST, "/api/v1/categories/", Some(json!({"name": "Books", "slug": "books"}))),
        (Method::DELETE, "/api/v1/genres/drama/", None),
        (Method::POST, "/api/v1/titles/", Some(json!({"name": "Solaris"}))),
        (Method::PATCH, "/api/v1/titles/1/", Some(json!({"year": 1961}))),
        (Method::DELETE, "/api/v1/titles/1/", None),
        (Method::POST, "/api/v1/titles/1/reviews/", Some(json!({"text": "ok", "score": 5}))),
        (Method::PUT, "/api/v1/titles/1/reviews/2/", Some(json!({"text": "ok", "score": 5}))),
        (Method::DELETE, "/api/v1/titles/1/reviews/2/comments/3/", None),
    ];

    for (method, uri, body) in cases {
        let (status, body) = send(&state, method.clone(), uri, None, body).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{} {}", method, uri);
        assert_eq!(body["status"], "fail");
    }
}

#[tokio::test]
async fn user_routes_need_a_token_even_for_reads() {
    let state = offline_state();

    for uri in ["/api/v1/users/", "/api/v1/users/me/", "/api/v1/users/someone/"] {
        let (status, _) = send(&state, Method::GET, uri, None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{}", uri);
    }
}

#[tokio::test]
async fn garbage_token_is_unauthorized() {
    let state = offline_state();
    let (status, body) = send(
        &state,
        Method::GET,
        "/api/v1/users/me/",
        Some("not-a-jwt"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Token is invalid or expired");
}

#[tokio::test]
async fn signup_rejects_reserved_username_and_bad_email() {
    let state = offline_state();

    let (status, body) = send(
        &state,
        Method::POST,
        "/api/v1/auth/signup/",
        None,
        Some(json!({"username": "me", "email": "me@example.com"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], "fail");

    let (status, _) = send(
        &state,
        Method::POST,
        "/api/v1/auth/signup",
        None,
        Some(json!({"username": "bob", "email": "nope"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn malformed_bodies_are_bad_requests() {
    let state = offline_state();

    let (status, _) = send(
        &state,
        Method::POST,
        "/api/v1/auth/token/",
        None,
        Some(json!({"username": "bob"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &state,
        Method::POST,
        "/api/v1/auth/signup/",
        None,
        Some(json!(["not", "an", "object"])),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn categories_have_no_retrieve_endpoint() {
    let state = offline_state();
    let (status, _) = send(&state, Method::GET, "/api/v1/categories/books/", None, None).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn huge_page_numbers_are_rejected_before_querying() {
    let state = offline_state();

    for uri in [
        "/api/v1/titles/?page=9223372036854775807&limit=100",
        "/api/v1/categories/?page=9223372036854775807",
        "/api/v1/genres/?page=1000001&limit=100",
        "/api/v1/titles/1/reviews/?page=9223372036854775807",
    ] {
        let (status, body) = send(&state, Method::GET, uri, None, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", uri);
        assert_eq!(body["status"], "fail", "{}", uri);
    }
}

#[tokio::test]
async fn unparsable_path_and_query_use_the_error_envelope() {
    let state = offline_state();

    for uri in [
        "/api/v1/titles/abc/",
        "/api/v1/titles/1/reviews/x/",
        "/api/v1/titles/1/reviews/2/comments/nope/",
        "/api/v1/categories/?page=abc",
        "/api/v1/titles/?year=soon",
        "/api/v1/genres/?limit=0",
    ] {
        let (status, body) = send(&state, Method::GET, uri, None, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", uri);
        assert_eq!(body["status"], "fail", "{}", uri);
        assert!(body["message"].is_string(), "{}", uri);
    }
}

#[tokio::test]
async fn unknown_user_paths_are_not_found() {
    let state = offline_state();

    for uri in ["/api/v1/users/someone/unknown/", "/api/v1/users/a/b/c/"] {
        let (status, _) = send(&state, Method::GET, uri, None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{}", uri);
    }
}

//! End-to-end flows against Postgres; each test skips itself without `DATABASE_URL`.

mod common;

use axum::http::{Method, StatusCode};
use common::{live_state, mailed_code, register, send, set_role, unique};
use ratings_api::db::UserExt;
use serde_json::{Value, json};

/// Admin token plus a category and a genre that admin created
async fn catalog(state: &ratings_api::AppState, pool: &sqlx::PgPool) -> (String, String, String) {
    let admin = unique("admin");
    let admin_token = register(state, &admin).await;
    set_role(pool, &admin, "admin").await;

    let category = unique("cat-");
    let (status, _) = send(
        state,
        Method::POST,
        "/api/v1/categories/",
        Some(&admin_token),
        Some(json!({"name": "Books", "slug": category})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let genre = unique("genre-");
    let (status, _) = send(
        state,
        Method::POST,
        "/api/v1/genres/",
        Some(&admin_token),
        Some(json!({"name": "Science fiction", "slug": genre})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    (admin_token, category, genre)
}

async fn create_title(
    state: &ratings_api::AppState,
    admin_token: &str,
    category: &str,
    genre: &str,
) -> Value {
    let (status, title) = send(
        state,
        Method::POST,
        "/api/v1/titles/",
        Some(admin_token),
        Some(json!({
            "name": unique("Solaris "),
            "year": 1961,
            "category": category,
            "genre": [genre],
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", title);
    title
}

#[tokio::test]
async fn signup_token_and_profile() {
    let Some((state, _pool)) = live_state().await else {
        eprintln!("skip: no DATABASE_URL");
        return;
    };

    let username = unique("bob");
    let email = format!("{}@example.com", username);
    let (status, body) = send(
        &state,
        Method::POST,
        "/api/v1/auth/signup/",
        None,
        Some(json!({"username": username, "email": email})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"email": email, "username": username}));

    let (status, _) = send(
        &state,
        Method::POST,
        "/api/v1/auth/token/",
        None,
        Some(json!({"username": username, "confirmation_code": "0000"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let code = mailed_code(&state, &email);
    let exchange = json!({"username": username, "confirmation_code": code});
    let (status, body) = send(
        &state,
        Method::POST,
        "/api/v1/auth/token/",
        None,
        Some(exchange.clone()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let token = body["token"].as_str().unwrap().to_string();

    // codes are single-use
    let (status, _) = send(&state, Method::POST, "/api/v1/auth/token/", None, Some(exchange)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &state,
        Method::POST,
        "/api/v1/auth/token/",
        None,
        Some(json!({"username": unique("ghost"), "confirmation_code": "x"})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, me) = send(&state, Method::GET, "/api/v1/users/me/", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["username"], username.as_str());
    assert_eq!(me["role"], "user");

    let (status, me) = send(
        &state,
        Method::PATCH,
        "/api/v1/users/me/",
        Some(&token),
        Some(json!({"bio": "reads a lot", "role": "admin"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["bio"], "reads a lot");
    assert_eq!(me["role"], "user");

    let (status, _) = send(&state, Method::GET, "/api/v1/users/", Some(&token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn signup_rejects_taken_email_and_username() {
    let Some((state, _pool)) = live_state().await else {
        eprintln!("skip: no DATABASE_URL");
        return;
    };

    let username = unique("carol");
    let email = format!("{}@example.com", username);
    let signup = |username: &str, email: &str| json!({"username": username, "email": email});

    let (status, _) = send(
        &state,
        Method::POST,
        "/api/v1/auth/signup/",
        None,
        Some(signup(&username, &email)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(
        &state,
        Method::POST,
        "/api/v1/auth/signup/",
        None,
        Some(signup(&unique("other"), &email)),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "This email is already used");

    let (status, body) = send(
        &state,
        Method::POST,
        "/api/v1/auth/signup/",
        None,
        Some(signup(&username, "fresh@example.org")),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "This username is already taken");
}

#[tokio::test]
async fn admin_creates_user_and_reissues_code() {
    let Some((state, pool)) = live_state().await else {
        eprintln!("skip: no DATABASE_URL");
        return;
    };

    let admin = unique("admin");
    let admin_token = register(&state, &admin).await;
    set_role(&pool, &admin, "admin").await;

    let username = unique("dave");
    let email = format!("{}@example.com", username);
    let (status, user) = send(
        &state,
        Method::POST,
        "/api/v1/users/",
        Some(&admin_token),
        Some(json!({"username": username, "email": email, "role": "moderator"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(user["role"], "moderator");

    let (status, _) = send(
        &state,
        Method::POST,
        "/api/v1/users/",
        Some(&admin_token),
        Some(json!({"username": username, "email": "another@example.com"})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let uri = format!("/api/v1/users/{}/code/", username);
    let (status, _) = send(&state, Method::POST, &uri, Some(&admin_token), None).await;
    assert_eq!(status, StatusCode::OK);

    let code = mailed_code(&state, &email);
    let (status, _) = send(
        &state,
        Method::POST,
        "/api/v1/auth/token/",
        None,
        Some(json!({"username": username, "confirmation_code": code})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let uri = format!("/api/v1/users/{}/", username);
    let (status, user) = send(
        &state,
        Method::PATCH,
        &uri,
        Some(&admin_token),
        Some(json!({"role": "user", "first_name": "Dave"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(user["role"], "user");
    assert_eq!(user["first_name"], "Dave");

    let (status, _) = send(&state, Method::DELETE, &uri, Some(&admin_token), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(&state, Method::GET, &uri, Some(&admin_token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn catalog_is_admin_only_and_titles_resolve_slugs() {
    let Some((state, pool)) = live_state().await else {
        eprintln!("skip: no DATABASE_URL");
        return;
    };

    let (admin_token, category, genre) = catalog(&state, &pool).await;
    let user_token = register(&state, &unique("erin")).await;

    let (status, _) = send(
        &state,
        Method::POST,
        "/api/v1/categories/",
        Some(&user_token),
        Some(json!({"name": "Films", "slug": unique("films-")})),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(
        &state,
        Method::POST,
        "/api/v1/categories/",
        Some(&admin_token),
        Some(json!({"name": "Again", "slug": category})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let title = create_title(&state, &admin_token, &category, &genre).await;
    assert_eq!(title["rating"], Value::Null);
    assert_eq!(title["category"]["slug"], category.as_str());
    assert_eq!(title["genre"][0]["slug"], genre.as_str());

    let (status, _) = send(
        &state,
        Method::POST,
        "/api/v1/titles/",
        Some(&admin_token),
        Some(json!({"name": "Nowhere", "year": 2000, "category": unique("missing-"), "genre": [genre]})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &state,
        Method::POST,
        "/api/v1/titles/",
        Some(&admin_token),
        Some(json!({"name": "Later", "year": 3000, "category": category, "genre": [genre]})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let uri = format!("/api/v1/titles/?category={}&genre={}", category, genre);
    let (status, list) = send(&state, Method::GET, &uri, None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list["pagination"]["total"], 1);
    assert_eq!(list["data"][0]["id"], title["id"]);

    let uri = format!("/api/v1/titles/{}/", title["id"]);
    let (status, patched) = send(
        &state,
        Method::PATCH,
        &uri,
        Some(&admin_token),
        Some(json!({"description": "Ocean planet"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(patched["description"], "Ocean planet");
    assert_eq!(patched["year"], 1961);

    let (status, _) = send(
        &state,
        Method::PUT,
        &uri,
        Some(&admin_token),
        Some(json!({"name": "Incomplete"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn reviews_are_unique_per_author_and_drive_the_rating() {
    let Some((state, pool)) = live_state().await else {
        eprintln!("skip: no DATABASE_URL");
        return;
    };

    let (admin_token, category, genre) = catalog(&state, &pool).await;
    let title = create_title(&state, &admin_token, &category, &genre).await;
    let reviews_uri = format!("/api/v1/titles/{}/reviews/", title["id"]);

    let alice = unique("alice");
    let alice_token = register(&state, &alice).await;
    let bob_token = register(&state, &unique("bob")).await;
    let moderator = unique("mod");
    let moderator_token = register(&state, &moderator).await;
    set_role(&pool, &moderator, "moderator").await;

    let (status, review) = send(
        &state,
        Method::POST,
        &reviews_uri,
        Some(&alice_token),
        Some(json!({"text": "Great", "score": 9})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(review["author"], alice.as_str());
    assert_eq!(review["title"], title["name"]);

    let (status, body) = send(
        &state,
        Method::POST,
        &reviews_uri,
        Some(&alice_token),
        Some(json!({"text": "Again", "score": 1})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "You have already reviewed this title");

    let (status, _) = send(
        &state,
        Method::POST,
        &reviews_uri,
        Some(&bob_token),
        Some(json!({"text": "Too high", "score": 11})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &state,
        Method::POST,
        &reviews_uri,
        Some(&bob_token),
        Some(json!({"text": "Perfect", "score": 10})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let title_uri = format!("/api/v1/titles/{}/", title["id"]);
    let (_, fetched) = send(&state, Method::GET, &title_uri, None, None).await;
    assert_eq!(fetched["rating"], 9.5);

    // PATCH is not a second review
    let review_uri = format!("{}{}/", reviews_uri, review["id"]);
    let (status, patched) = send(
        &state,
        Method::PATCH,
        &review_uri,
        Some(&alice_token),
        Some(json!({"score": 8})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(patched["score"], 8);
    assert_eq!(patched["text"], "Great");

    let (status, _) = send(
        &state,
        Method::PATCH,
        &review_uri,
        Some(&bob_token),
        Some(json!({"text": "Hijacked"})),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, moderated) = send(
        &state,
        Method::PATCH,
        &review_uri,
        Some(&moderator_token),
        Some(json!({"text": "Edited by moderator"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(moderated["author"], alice.as_str());

    let (status, list) = send(&state, Method::GET, &reviews_uri, None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list["pagination"]["total"], 2);

    let (status, _) = send(
        &state,
        Method::GET,
        &format!("/api/v1/titles/{}/reviews/{}/", i64::MAX, review["id"]),
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn comments_follow_review_permissions_and_deletes_cascade() {
    let Some((state, pool)) = live_state().await else {
        eprintln!("skip: no DATABASE_URL");
        return;
    };

    let (admin_token, category, genre) = catalog(&state, &pool).await;
    let title = create_title(&state, &admin_token, &category, &genre).await;
    let reviews_uri = format!("/api/v1/titles/{}/reviews/", title["id"]);

    let alice_token = register(&state, &unique("alice")).await;
    let bob = unique("bob");
    let bob_token = register(&state, &bob).await;

    let (_, review) = send(
        &state,
        Method::POST,
        &reviews_uri,
        Some(&alice_token),
        Some(json!({"text": "Worth it", "score": 7})),
    )
    .await;
    let comments_uri = format!("{}{}/comments/", reviews_uri, review["id"]);

    let (status, comment) = send(
        &state,
        Method::POST,
        &comments_uri,
        Some(&bob_token),
        Some(json!({"text": "Agreed"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(comment["author"], bob.as_str());

    let comment_uri = format!("{}{}/", comments_uri, comment["id"]);
    let (status, _) = send(
        &state,
        Method::PUT,
        &comment_uri,
        Some(&alice_token),
        Some(json!({"text": "Not yours"})),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(&state, Method::PUT, &comment_uri, Some(&bob_token), Some(json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, list) = send(&state, Method::GET, &comments_uri, None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list["data"][0]["text"], "Agreed");

    // deleting the category keeps the title, without a category
    let (status, _) = send(
        &state,
        Method::DELETE,
        &format!("/api/v1/categories/{}/", category),
        Some(&admin_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let title_uri = format!("/api/v1/titles/{}/", title["id"]);
    let (status, fetched) = send(&state, Method::GET, &title_uri, None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["category"], Value::Null);

    // deleting the title takes its reviews and their comments along
    let (status, _) = send(&state, Method::DELETE, &title_uri, Some(&admin_token), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let review_id = review["id"].as_i64().unwrap();
    let remaining: i64 = sqlx::query_scalar(
        "SELECT (SELECT COUNT(*) FROM reviews WHERE id = $1) + (SELECT COUNT(*) FROM comments WHERE review_id = $1)",
    )
    .bind(review_id)
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(remaining, 0);

    let (status, _) = send(&state, Method::GET, &comments_uri, None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

/// `total` of a list response
async fn count(state: &ratings_api::AppState, uri: &str, token: Option<&str>) -> i64 {
    let (status, list) = send(state, Method::GET, uri, token, None).await;
    assert_eq!(status, StatusCode::OK, "{} {}", uri, list);
    list["pagination"]["total"].as_i64().unwrap()
}

#[tokio::test]
async fn search_matches_taxon_names_literally() {
    let Some((state, pool)) = live_state().await else {
        eprintln!("skip: no DATABASE_URL");
        return;
    };

    let (admin_token, _, _) = catalog(&state, &pool).await;
    let marker = unique("shelf");

    for kind in ["categories", "genres"] {
        let list = format!("/api/v1/{}/", kind);
        for (name, slug) in [("a_b", unique("ab-")), ("axb", unique("axb-")), ("100%", unique("pct-"))] {
            let (status, _) = send(
                &state,
                Method::POST,
                &list,
                Some(&admin_token),
                Some(json!({"name": format!("{} {}", marker, name), "slug": slug})),
            )
            .await;
            assert_eq!(status, StatusCode::CREATED);
        }

        let uri = format!("{}?search={}", list, marker.to_uppercase());
        assert_eq!(count(&state, &uri, None).await, 3, "{}", kind);

        let uri = format!("{}?search={}%20a_b", list, marker);
        let (_, page) = send(&state, Method::GET, &uri, None, None).await;
        assert_eq!(page["pagination"]["total"], 1, "{}", kind);
        assert_eq!(page["data"][0]["name"], format!("{} a_b", marker));

        let uri = format!("{}?search={}%20100%25", list, marker);
        assert_eq!(count(&state, &uri, None).await, 1, "{}", kind);

        let uri = format!("{}?search={}%25b", list, marker);
        assert_eq!(count(&state, &uri, None).await, 0, "{}", kind);
    }
}

#[tokio::test]
async fn search_matches_usernames_literally() {
    let Some((state, pool)) = live_state().await else {
        eprintln!("skip: no DATABASE_URL");
        return;
    };

    let admin = unique("admin");
    let admin_token = register(&state, &admin).await;
    set_role(&pool, &admin, "admin").await;

    let marker = unique("grace");
    register(&state, &format!("{}a_b", marker)).await;
    register(&state, &format!("{}axb", marker)).await;

    let uri = format!("/api/v1/users/?search={}", marker);
    assert_eq!(count(&state, &uri, Some(&admin_token)).await, 2);

    let uri = format!("/api/v1/users/?search={}a_b", marker);
    let (status, page) = send(&state, Method::GET, &uri, Some(&admin_token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["pagination"]["total"], 1);
    assert_eq!(page["data"][0]["username"], format!("{}a_b", marker));

    let uri = format!("/api/v1/users/?search={}%25", marker);
    assert_eq!(count(&state, &uri, Some(&admin_token)).await, 0);
}

#[tokio::test]
async fn titles_filter_by_name_and_year() {
    let Some((state, pool)) = live_state().await else {
        eprintln!("skip: no DATABASE_URL");
        return;
    };

    let (admin_token, category, genre) = catalog(&state, &pool).await;
    let marker = unique("Stalker");

    for (suffix, year) in ["50%", "500"].iter().zip([1972, 2002]) {
        let (status, title) = send(
            &state,
            Method::POST,
            "/api/v1/titles/",
            Some(&admin_token),
            Some(json!({
                "name": format!("{} {}", marker, suffix),
                "year": year,
                "category": category,
                "genre": [genre],
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{}", title);
    }

    let base = format!("/api/v1/titles/?category={}", category);
    assert_eq!(count(&state, &base, None).await, 2);

    let uri = format!("{}&name={}", base, marker.to_lowercase());
    assert_eq!(count(&state, &uri, None).await, 2);

    let uri = format!("{}&name=50%25", base);
    let (_, page) = send(&state, Method::GET, &uri, None, None).await;
    assert_eq!(page["pagination"]["total"], 1);
    assert_eq!(page["data"][0]["name"], format!("{} 50%", marker));

    let uri = format!("{}&year=2002", base);
    let (_, page) = send(&state, Method::GET, &uri, None, None).await;
    assert_eq!(page["pagination"]["total"], 1);
    assert_eq!(page["data"][0]["year"], 2002);

    let uri = format!("{}&name={}&year=1961", base, marker);
    assert_eq!(count(&state, &uri, None).await, 0);
}

#[tokio::test]
async fn purge_keeps_admin_created_accounts() {
    let Some((state, pool)) = live_state().await else {
        eprintln!("skip: no DATABASE_URL");
        return;
    };

    let admin = unique("admin");
    let admin_token = register(&state, &admin).await;
    set_role(&pool, &admin, "admin").await;

    let invited = unique("ivan");
    let (status, _) = send(
        &state,
        Method::POST,
        "/api/v1/users/",
        Some(&admin_token),
        Some(json!({"username": invited, "email": format!("{}@example.com", invited)})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let uri = format!("/api/v1/users/{}/code/", invited);
    let (status, _) = send(&state, Method::POST, &uri, Some(&admin_token), None).await;
    assert_eq!(status, StatusCode::OK);

    let drifter = unique("judy");
    let (status, _) = send(
        &state,
        Method::POST,
        "/api/v1/auth/signup/",
        None,
        Some(json!({"username": drifter, "email": format!("{}@example.com", drifter)})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    sqlx::query("UPDATE users SET code_expires_at = NOW() - INTERVAL '1 hour' WHERE username = ANY($1)")
        .bind(vec![invited.clone(), drifter.clone()])
        .execute(&pool)
        .await
        .unwrap();

    let deleted = state.db_client.purge_stale_signups().await.unwrap();
    assert!(deleted >= 1);

    let uri = format!("/api/v1/users/{}/", invited);
    let (status, _) = send(&state, Method::GET, &uri, Some(&admin_token), None).await;
    assert_eq!(status, StatusCode::OK);

    let uri = format!("/api/v1/users/{}/", drifter);
    let (status, _) = send(&state, Method::GET, &uri, Some(&admin_token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

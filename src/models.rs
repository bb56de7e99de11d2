use chrono::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Permission tier of a user
///
/// Stored as the PostgreSQL ENUM `user_role`; lowercase both in the database
/// and in JSON (`"user"`, `"moderator"`, `"admin"`).
#[derive(Debug, Deserialize, Serialize, Clone, Copy, sqlx::Type, PartialEq, Eq, Default)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    #[default]
    User,
    Moderator,
    Admin,
}

impl UserRole {
    pub fn to_str(&self) -> &str {
        match self {
            UserRole::User => "user",
            UserRole::Moderator => "moderator",
            UserRole::Admin => "admin",
        }
    }
}

/// Row of the `users` table
///
/// - `confirmation_code`: argon2 hash of the last code mailed out, cleared
///   once it is exchanged for a token
/// - `last_login`: set by the token exchange; `None` means the account was
///   never activated
/// - `is_superuser`: grants every admin capability regardless of `role`
#[derive(Debug, Deserialize, Serialize, sqlx::FromRow, Clone)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub bio: String,
    pub role: UserRole,
    pub is_superuser: bool,
    pub confirmation_code: Option<String>,
    pub code_expires_at: Option<DateTime<Utc>>,
    pub last_login: Option<DateTime<Utc>>,
    pub self_registered: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Row of `categories` or `genres`; both tables share this shape.
#[derive(Debug, Deserialize, Serialize, sqlx::FromRow, Clone, PartialEq)]
pub struct Taxon {
    pub id: i64,
    pub name: String,
    pub slug: String,
}

/// A title joined with its category and the aggregate of its review scores.
#[derive(Debug, sqlx::FromRow, Clone)]
pub struct TitleRow {
    pub id: i64,
    pub name: String,
    pub year: i32,
    pub description: Option<String>,
    pub category_name: Option<String>,
    pub category_slug: Option<String>,
    pub score_sum: Option<i64>,
    pub review_count: i64,
}

/// Genre link of a title, used to attach genres to a page of titles at once.
#[derive(Debug, sqlx::FromRow, Clone)]
pub struct TitleGenreRow {
    pub title_id: i64,
    pub name: String,
    pub slug: String,
}

/// Review with the author's username and the title's name resolved
#[derive(Debug, sqlx::FromRow, Clone)]
pub struct Review {
    pub id: i64,
    pub title_id: i64,
    pub author_id: Uuid,
    pub author_username: String,
    pub title_name: String,
    pub text: String,
    pub score: i16,
    pub pub_date: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow, Clone)]
pub struct Comment {
    pub id: i64,
    pub review_id: i64,
    pub author_id: Uuid,
    pub author_username: String,
    pub text: String,
    pub pub_date: DateTime<Utc>,
}

/// Categories and genres are the same flat, slug-keyed taxonomy in two tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Taxonomy {
    Category,
    Genre,
}

impl Taxonomy {
    pub fn table(&self) -> &'static str {
        match self {
            Taxonomy::Category => "categories",
            Taxonomy::Genre => "genres",
        }
    }
}

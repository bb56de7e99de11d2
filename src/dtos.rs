use crate::models::{Comment, Review, Taxon, TitleGenreRow, TitleRow, User, UserRole};
use crate::utils::rating;
use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use validator::{Validate, ValidationError};

// DTOs (Data Transfer Objects) define the structure of data exchanged with clients
// They are separate from database models to control exactly what data is exposed

// ============================================================================
// Field validators
// ============================================================================

pub const RESERVED_USERNAME: &str = "me";

fn invalid(code: &'static str, message: &'static str) -> ValidationError {
    ValidationError::new(code).with_message(Cow::from(message))
}

/// Letters, digits and `@ . + - _`, and never the reserved `me`
fn validate_username(username: &str) -> Result<(), ValidationError> {
    if username == RESERVED_USERNAME {
        return Err(invalid("reserved", "Username \"me\" is reserved"));
    }
    let allowed = |c: char| c.is_alphanumeric() || matches!(c, '@' | '.' | '+' | '-' | '_');
    if !username.chars().all(allowed) {
        return Err(invalid(
            "invalid_username",
            "Username may only contain letters, digits and @/./+/-/_",
        ));
    }
    Ok(())
}

fn validate_slug(slug: &str) -> Result<(), ValidationError> {
    let allowed = |c: char| c.is_ascii_alphanumeric() || c == '-' || c == '_';
    if !slug.chars().all(allowed) {
        return Err(invalid(
            "invalid_slug",
            "Slug may only contain latin letters, digits, hyphens and underscores",
        ));
    }
    Ok(())
}

/// A title cannot come out in the future
fn validate_title_year(title: &InputTitleDto) -> Result<(), ValidationError> {
    match title.year {
        Some(year) if year > Utc::now().year() => {
            Err(invalid("future_year", "Year cannot be in the future"))
        }
        _ => Ok(()),
    }
}

// ============================================================================
// Authentication DTOs
// ============================================================================

/// Signup request; creates the account and mails a confirmation code
#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
pub struct SignupDto {
    #[validate(
        length(min = 1, max = 150, message = "Username must be between 1 and 150 characters"),
        custom(function = "validate_username")
    )]
    pub username: String,

    #[validate(
        length(min = 1, max = 254, message = "Email is required"),
        email(message = "Email is invalid")
    )]
    pub email: String,
}

/// Signup echoes the accepted identity back
#[derive(Debug, Serialize, Deserialize)]
pub struct SignupResponseDto {
    pub email: String,
    pub username: String,
}

#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
pub struct TokenRequestDto {
    #[validate(length(min = 1, message = "Username is required"))]
    pub username: String,

    #[validate(length(min = 1, message = "Confirmation code is required"))]
    pub confirmation_code: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponseDto {
    pub token: String,
}

/// Generic success response
#[derive(Serialize, Deserialize)]
pub struct Response {
    pub status: &'static str,
    pub message: String,
}

// ============================================================================
// Pagination & Query DTOs
// ============================================================================

/// Highest page number a list endpoint accepts.
pub const MAX_PAGE: i64 = 1_000_000;

/// Pagination plus an optional `search` term
#[derive(Serialize, Deserialize, Validate, Debug, Default)]
pub struct RequestQueryDto {
    #[validate(range(min = 1, max = MAX_PAGE))]
    pub page: Option<i64>,

    #[validate(range(min = 1, max = 100))]
    pub limit: Option<i64>,

    #[validate(length(min = 1))]
    pub search: Option<String>,
}

impl RequestQueryDto {
    pub fn page(&self) -> i64 {
        self.page.unwrap_or(1)
    }

    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(10)
    }
}

/// Pagination metadata
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct PaginationDto {
    pub page: i64,
    pub limit: i64,
    pub total: i64,
    #[serde(rename = "totalPages")]
    pub total_pages: i64,
}

impl PaginationDto {
    pub fn new(page: i64, limit: i64, total: i64) -> Self {
        PaginationDto {
            page,
            limit,
            total,
            total_pages: (total + limit - 1) / limit,
        }
    }
}

/// Paginated list envelope shared by every list endpoint
#[derive(Debug, Serialize, Deserialize)]
pub struct ListResponseDto<T> {
    pub status: String,
    pub data: Vec<T>,
    pub pagination: PaginationDto,
}

impl<T> ListResponseDto<T> {
    pub fn new(data: Vec<T>, page: i64, limit: i64, total: i64) -> Self {
        ListResponseDto {
            status: "success".to_string(),
            data,
            pagination: PaginationDto::new(page, limit, total),
        }
    }
}

// ============================================================================
// User DTOs
// ============================================================================

/// User representation; never exposes the confirmation code hash
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct FilterUserDto {
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub bio: String,
    pub role: UserRole,
}

impl FilterUserDto {
    pub fn filter_user(user: &User) -> Self {
        FilterUserDto {
            username: user.username.to_owned(),
            email: user.email.to_owned(),
            first_name: user.first_name.to_owned(),
            last_name: user.last_name.to_owned(),
            bio: user.bio.to_owned(),
            role: user.role,
        }
    }

    pub fn filter_users(user: &[User]) -> Vec<FilterUserDto> {
        user.iter().map(FilterUserDto::filter_user).collect()
    }
}

/// Admin creates an account directly
#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
pub struct CreateUserDto {
    #[validate(
        length(min = 1, max = 150, message = "Username must be between 1 and 150 characters"),
        custom(function = "validate_username")
    )]
    pub username: String,

    #[validate(
        length(min = 1, max = 254, message = "Email is required"),
        email(message = "Email is invalid")
    )]
    pub email: String,

    #[validate(length(max = 150))]
    pub first_name: Option<String>,

    #[validate(length(max = 150))]
    pub last_name: Option<String>,

    pub bio: Option<String>,

    pub role: Option<UserRole>,
}

/// Partial user update; absent fields stay as they are
#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
pub struct UpdateUserDto {
    #[validate(
        length(min = 1, max = 150, message = "Username must be between 1 and 150 characters"),
        custom(function = "validate_username")
    )]
    pub username: Option<String>,

    #[validate(email(message = "Email is invalid"), length(max = 254))]
    pub email: Option<String>,

    #[validate(length(max = 150))]
    pub first_name: Option<String>,

    #[validate(length(max = 150))]
    pub last_name: Option<String>,

    pub bio: Option<String>,

    pub role: Option<UserRole>,
}

// ============================================================================
// Category / Genre DTOs
// ============================================================================

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct TaxonDto {
    pub name: String,
    pub slug: String,
}

impl From<&Taxon> for TaxonDto {
    fn from(taxon: &Taxon) -> Self {
        TaxonDto {
            name: taxon.name.clone(),
            slug: taxon.slug.clone(),
        }
    }
}

#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
pub struct InputTaxonDto {
    #[validate(length(min = 1, max = 256, message = "Name must be between 1 and 256 characters"))]
    pub name: String,

    #[validate(
        length(min = 1, max = 50, message = "Slug must be between 1 and 50 characters"),
        custom(function = "validate_slug")
    )]
    pub slug: String,
}

// ============================================================================
// Title DTOs
// ============================================================================

/// Filters for the title list
#[derive(Debug, Deserialize, Serialize, Validate, Default)]
pub struct TitlesQueryParams {
    #[validate(range(min = 1, max = MAX_PAGE))]
    pub page: Option<i64>,

    #[validate(range(min = 1, max = 100))]
    pub limit: Option<i64>,

    pub genre: Option<String>,    // genre slug
    pub category: Option<String>, // category slug
    pub name: Option<String>,     // case-insensitive substring
    pub year: Option<i32>,
}

/// Title create/update body; categories and genres are given by slug
///
/// Every field is optional so that PATCH can reuse it, POST and PUT check for
/// the required ones in the handler.
#[derive(Debug, Serialize, Deserialize, Validate, Default)]
#[validate(schema(function = "validate_title_year"))]
pub struct InputTitleDto {
    #[validate(length(min = 1, max = 256, message = "Name must be between 1 and 256 characters"))]
    pub name: Option<String>,

    pub year: Option<i32>,

    pub description: Option<String>,

    #[validate(length(min = 1, message = "Category slug is required"))]
    pub category: Option<String>,

    #[validate(length(min = 1, message = "At least one genre is required"))]
    pub genre: Option<Vec<String>>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct TitleDto {
    pub id: i64,
    pub name: String,
    pub year: i32,
    pub rating: Option<f64>,
    pub description: Option<String>,
    pub genre: Vec<TaxonDto>,
    pub category: Option<TaxonDto>,
}

impl TitleDto {
    /// Build from a title row and the genre links of a whole page of titles
    pub fn from_row(row: &TitleRow, genres: &[TitleGenreRow]) -> Self {
        let category = match (&row.category_name, &row.category_slug) {
            (Some(name), Some(slug)) => Some(TaxonDto {
                name: name.clone(),
                slug: slug.clone(),
            }),
            _ => None,
        };

        TitleDto {
            id: row.id,
            name: row.name.clone(),
            year: row.year,
            rating: rating::average_to_tenth(row.score_sum, row.review_count),
            description: row.description.clone(),
            genre: genres
                .iter()
                .filter(|genre| genre.title_id == row.id)
                .map(|genre| TaxonDto {
                    name: genre.name.clone(),
                    slug: genre.slug.clone(),
                })
                .collect(),
            category,
        }
    }
}

// ============================================================================
// Review DTOs
// ============================================================================

#[derive(Debug, Deserialize, Serialize, Validate, Default)]
pub struct InputReviewDto {
    #[validate(length(min = 1, message = "Text is required"))]
    pub text: Option<String>,

    #[validate(range(min = 1, max = 10, message = "Score must be between 1 and 10"))]
    pub score: Option<i16>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct ReviewDto {
    pub id: i64,
    pub text: String,
    pub author: String,
    pub score: i16,
    pub pub_date: DateTime<Utc>,
    pub title: String,
}

impl From<Review> for ReviewDto {
    fn from(review: Review) -> Self {
        ReviewDto {
            id: review.id,
            text: review.text,
            author: review.author_username,
            score: review.score,
            pub_date: review.pub_date,
            title: review.title_name,
        }
    }
}

// ============================================================================
// Comment DTOs
// ============================================================================

#[derive(Debug, Deserialize, Serialize, Validate, Default)]
pub struct InputCommentDto {
    #[validate(length(min = 1, message = "Text is required"))]
    pub text: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct CommentDto {
    pub id: i64,
    pub text: String,
    pub author: String,
    pub pub_date: DateTime<Utc>,
}

impl From<Comment> for CommentDto {
    fn from(comment: Comment) -> Self {
        CommentDto {
            id: comment.id,
            text: comment.text,
            author: comment.author_username,
            pub_date: comment.pub_date,
        }
    }
}

use sqlx::{Pool, Postgres};

pub mod scheduler;

mod user;
pub use user::{NewUser, UserExt};

mod taxonomy;
pub use taxonomy::TaxonomyExt;

mod title;
pub use title::{NewTitle, TitleChanges, TitleExt};

mod review;
pub use review::ReviewExt;

mod comment;
pub use comment::CommentExt;

/// Embedded schema migrations from `migrations/`.
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!();

/// Row offset of a 1-based page; saturates instead of overflowing.
pub(crate) fn page_offset(page: i64, limit: i64) -> i64 {
    page.saturating_sub(1).max(0).saturating_mul(limit)
}

/// `ILIKE` pattern matching `term` anywhere, with `\`, `%` and `_` taken
/// literally. Pair with `ESCAPE '\'`.
pub(crate) fn contains_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for c in term.chars() {
        if matches!(c, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

#[derive(Debug, Clone)]
pub struct DBClient {
    pool: Pool<Postgres>,
}
impl DBClient {
    pub fn new(pool: Pool<Postgres>) -> Self {
        DBClient { pool }
    }

    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        MIGRATOR.run(&self.pool).await
    }
}

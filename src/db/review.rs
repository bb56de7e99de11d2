use super::{DBClient, page_offset};
use crate::models::Review;
use uuid::Uuid;

/// Review columns with author username and title name resolved; `rv` is the
/// reviews row (or a CTE with the same columns)
const REVIEW_COLUMNS: &str = r#"
    rv.id,
    rv.title_id,
    rv.author_id,
    u.username AS author_username,
    t.name AS title_name,
    rv.text,
    rv.score,
    rv.pub_date
"#;

/// Review database operations trait
pub trait ReviewExt {
    /// Reviews of a title, newest first
    async fn get_reviews(
        &self,
        title_id: i64,
        page: i64,
        limit: i64,
    ) -> Result<Vec<Review>, sqlx::Error>;

    async fn get_review_count(&self, title_id: i64) -> Result<i64, sqlx::Error>;

    /// A review only exists under the title it was written for
    async fn get_review(&self, title_id: i64, review_id: i64)
    -> Result<Option<Review>, sqlx::Error>;

    async fn has_reviewed(&self, author_id: Uuid, title_id: i64) -> Result<bool, sqlx::Error>;

    async fn create_review(
        &self,
        author_id: Uuid,
        title_id: i64,
        text: &str,
        score: i16,
    ) -> Result<Review, sqlx::Error>;

    /// `None` keeps the current value
    async fn update_review(
        &self,
        review_id: i64,
        text: Option<&str>,
        score: Option<i16>,
    ) -> Result<Review, sqlx::Error>;

    /// Comments on the review go with it
    async fn delete_review(&self, review_id: i64) -> Result<(), sqlx::Error>;
}

impl ReviewExt for DBClient {
    async fn get_reviews(
        &self,
        title_id: i64,
        page: i64,
        limit: i64,
    ) -> Result<Vec<Review>, sqlx::Error> {
        let offset = page_offset(page, limit);

        let query = format!(
            r#"
            SELECT {}
            FROM reviews rv
            JOIN users u ON u.id = rv.author_id
            JOIN titles t ON t.id = rv.title_id
            WHERE rv.title_id = $1
            ORDER BY rv.pub_date DESC, rv.id DESC
            LIMIT $2 OFFSET $3
            "#,
            REVIEW_COLUMNS
        );

        let reviews = sqlx::query_as::<_, Review>(&query)
            .bind(title_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        Ok(reviews)
    }

    async fn get_review_count(&self, title_id: i64) -> Result<i64, sqlx::Error> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM reviews WHERE title_id = $1")
            .bind(title_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    async fn get_review(
        &self,
        title_id: i64,
        review_id: i64,
    ) -> Result<Option<Review>, sqlx::Error> {
        let query = format!(
            r#"
            SELECT {}
            FROM reviews rv
            JOIN users u ON u.id = rv.author_id
            JOIN titles t ON t.id = rv.title_id
            WHERE rv.id = $1 AND rv.title_id = $2
            "#,
            REVIEW_COLUMNS
        );

        let review = sqlx::query_as::<_, Review>(&query)
            .bind(review_id)
            .bind(title_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(review)
    }

    async fn has_reviewed(&self, author_id: Uuid, title_id: i64) -> Result<bool, sqlx::Error> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM reviews WHERE author_id = $1 AND title_id = $2)",
        )
        .bind(author_id)
        .bind(title_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn create_review(
        &self,
        author_id: Uuid,
        title_id: i64,
        text: &str,
        score: i16,
    ) -> Result<Review, sqlx::Error> {
        // Use CTE to insert and return the review with username and title name
        let query = format!(
            r#"
            WITH rv AS (
                INSERT INTO reviews (author_id, title_id, text, score)
                VALUES ($1, $2, $3, $4)
                RETURNING *
            )
            SELECT {}
            FROM rv
            JOIN users u ON u.id = rv.author_id
            JOIN titles t ON t.id = rv.title_id
            "#,
            REVIEW_COLUMNS
        );

        let review = sqlx::query_as::<_, Review>(&query)
            .bind(author_id)
            .bind(title_id)
            .bind(text)
            .bind(score)
            .fetch_one(&self.pool)
            .await?;

        Ok(review)
    }

    async fn update_review(
        &self,
        review_id: i64,
        text: Option<&str>,
        score: Option<i16>,
    ) -> Result<Review, sqlx::Error> {
        let query = format!(
            r#"
            WITH rv AS (
                UPDATE reviews
                SET text = COALESCE($1, text),
                    score = COALESCE($2, score)
                WHERE id = $3
                RETURNING *
            )
            SELECT {}
            FROM rv
            JOIN users u ON u.id = rv.author_id
            JOIN titles t ON t.id = rv.title_id
            "#,
            REVIEW_COLUMNS
        );

        let review = sqlx::query_as::<_, Review>(&query)
            .bind(text)
            .bind(score)
            .bind(review_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(review)
    }

    async fn delete_review(&self, review_id: i64) -> Result<(), sqlx::Error> {
        let result = sqlx::query("DELETE FROM reviews WHERE id = $1")
            .bind(review_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(sqlx::Error::RowNotFound);
        }

        Ok(())
    }
}

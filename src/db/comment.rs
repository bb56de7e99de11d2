use super::{DBClient, page_offset};
use crate::models::Comment;
use uuid::Uuid;

/// Comment database operations trait
pub trait CommentExt {
    /// Comments of a review, newest first
    async fn get_comments(
        &self,
        review_id: i64,
        page: i64,
        limit: i64,
    ) -> Result<Vec<Comment>, sqlx::Error>;

    /// Count total comments on a review
    async fn get_comment_count(&self, review_id: i64) -> Result<i64, sqlx::Error>;

    async fn get_comment(
        &self,
        review_id: i64,
        comment_id: i64,
    ) -> Result<Option<Comment>, sqlx::Error>;

    /// Create new comment on a review
    async fn create_comment(
        &self,
        author_id: Uuid,
        review_id: i64,
        text: &str,
    ) -> Result<Comment, sqlx::Error>;

    async fn update_comment(&self, comment_id: i64, text: &str) -> Result<Comment, sqlx::Error>;

    async fn delete_comment(&self, comment_id: i64) -> Result<(), sqlx::Error>;
}

impl CommentExt for DBClient {
    async fn get_comments(
        &self,
        review_id: i64,
        page: i64,
        limit: i64,
    ) -> Result<Vec<Comment>, sqlx::Error> {
        let offset = page_offset(page, limit);

        let comments = sqlx::query_as::<_, Comment>(
            r#"
            SELECT c.id, c.review_id, c.author_id, u.username AS author_username, c.text, c.pub_date
            FROM comments c
            INNER JOIN users u ON c.author_id = u.id
            WHERE c.review_id = $1
            ORDER BY c.pub_date DESC, c.id DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(review_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(comments)
    }

    async fn get_comment_count(&self, review_id: i64) -> Result<i64, sqlx::Error> {
        let count =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(id) FROM comments WHERE review_id = $1")
                .bind(review_id)
                .fetch_one(&self.pool)
                .await?;

        Ok(count)
    }

    async fn get_comment(
        &self,
        review_id: i64,
        comment_id: i64,
    ) -> Result<Option<Comment>, sqlx::Error> {
        let comment = sqlx::query_as::<_, Comment>(
            r#"
            SELECT c.id, c.review_id, c.author_id, u.username AS author_username, c.text, c.pub_date
            FROM comments c
            INNER JOIN users u ON c.author_id = u.id
            WHERE c.id = $1 AND c.review_id = $2
            "#,
        )
        .bind(comment_id)
        .bind(review_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(comment)
    }

    async fn create_comment(
        &self,
        author_id: Uuid,
        review_id: i64,
        text: &str,
    ) -> Result<Comment, sqlx::Error> {
        // Use CTE to insert and return comment with username
        let comment = sqlx::query_as::<_, Comment>(
            r#"
            WITH new_comment AS (
                INSERT INTO comments (author_id, review_id, text)
                VALUES ($1, $2, $3)
                RETURNING *
            )
            SELECT nc.id, nc.review_id, nc.author_id, u.username AS author_username, nc.text, nc.pub_date
            FROM new_comment nc
            JOIN users u ON nc.author_id = u.id
            "#,
        )
        .bind(author_id)
        .bind(review_id)
        .bind(text)
        .fetch_one(&self.pool)
        .await?;

        Ok(comment)
    }

    async fn update_comment(&self, comment_id: i64, text: &str) -> Result<Comment, sqlx::Error> {
        let comment = sqlx::query_as::<_, Comment>(
            r#"
            WITH updated_comment AS (
                UPDATE comments
                SET text = $1
                WHERE id = $2
                RETURNING *
            )
            SELECT uc.id, uc.review_id, uc.author_id, u.username AS author_username, uc.text, uc.pub_date
            FROM updated_comment uc
            JOIN users u ON uc.author_id = u.id
            "#,
        )
        .bind(text)
        .bind(comment_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(comment)
    }

    async fn delete_comment(&self, comment_id: i64) -> Result<(), sqlx::Error> {
        let result = sqlx::query("DELETE FROM comments WHERE id = $1")
            .bind(comment_id)
            .execute(&self.pool)
            .await?;

        // Return RowNotFound if comment doesn't exist
        if result.rows_affected() == 0 {
            return Err(sqlx::Error::RowNotFound);
        }

        Ok(())
    }
}

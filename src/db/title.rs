use super::{DBClient, contains_pattern, page_offset};
use crate::dtos::TitlesQueryParams;
use crate::models::{TitleGenreRow, TitleRow};
use sqlx::{Postgres, QueryBuilder};

/// Title columns plus the category and the review aggregate the rating is
/// computed from. Callers append filters, then `GROUP BY t.id, c.id`.
const TITLE_SELECT: &str = r#"
    SELECT
        t.id,
        t.name,
        t.year,
        t.description,
        c.name AS category_name,
        c.slug AS category_slug,
        SUM(r.score)::bigint AS score_sum,
        COUNT(r.id) AS review_count
    FROM titles t
    LEFT JOIN categories c ON c.id = t.category_id
    LEFT JOIN reviews r ON r.title_id = t.id
"#;

pub struct NewTitle<'a> {
    pub name: &'a str,
    pub year: i32,
    pub description: Option<&'a str>,
    pub category_id: i64,
    pub genre_ids: Vec<i64>,
}

/// Changes to an existing title; `None` leaves a column untouched
///
/// `description` is doubly optional: `Some(None)` clears it.
#[derive(Default)]
pub struct TitleChanges<'a> {
    pub name: Option<&'a str>,
    pub year: Option<i32>,
    pub description: Option<Option<&'a str>>,
    pub category_id: Option<i64>,
    pub genre_ids: Option<Vec<i64>>,
}

fn push_filters(builder: &mut QueryBuilder<'_, Postgres>, params: &TitlesQueryParams) {
    builder.push(" WHERE TRUE");

    if let Some(category) = &params.category {
        builder.push(" AND c.slug = ");
        builder.push_bind(category.clone());
    }

    if let Some(genre) = &params.genre {
        builder.push(
            " AND EXISTS (SELECT 1 FROM title_genres tg JOIN genres g ON g.id = tg.genre_id \
             WHERE tg.title_id = t.id AND g.slug = ",
        );
        builder.push_bind(genre.clone());
        builder.push(")");
    }

    if let Some(name) = &params.name {
        builder.push(" AND t.name ILIKE ");
        builder.push_bind(contains_pattern(name));
        builder.push(r" ESCAPE '\'");
    }

    if let Some(year) = params.year {
        builder.push(" AND t.year = ");
        builder.push_bind(year);
    }
}

/// Title database operations trait
pub trait TitleExt {
    /// Filtered page of titles ordered by name
    async fn get_titles(
        &self,
        params: &TitlesQueryParams,
        page: i64,
        limit: i64,
    ) -> Result<Vec<TitleRow>, sqlx::Error>;

    async fn get_title_count(&self, params: &TitlesQueryParams) -> Result<i64, sqlx::Error>;

    async fn get_title(&self, title_id: i64) -> Result<Option<TitleRow>, sqlx::Error>;

    /// Genre links for several titles at once
    async fn get_title_genres(&self, title_ids: &[i64])
    -> Result<Vec<TitleGenreRow>, sqlx::Error>;

    async fn title_exists(&self, title_id: i64) -> Result<bool, sqlx::Error>;

    /// Insert the title and its genre links in one transaction, returns the new id
    async fn create_title(&self, title: NewTitle<'_>) -> Result<i64, sqlx::Error>;

    /// Returns RowNotFound if the title does not exist
    async fn update_title(&self, title_id: i64, changes: TitleChanges<'_>)
    -> Result<(), sqlx::Error>;

    /// Reviews and their comments go with it
    async fn delete_title(&self, title_id: i64) -> Result<(), sqlx::Error>;
}

impl TitleExt for DBClient {
    async fn get_titles(
        &self,
        params: &TitlesQueryParams,
        page: i64,
        limit: i64,
    ) -> Result<Vec<TitleRow>, sqlx::Error> {
        let offset = page_offset(page, limit);

        let mut builder = QueryBuilder::<Postgres>::new(TITLE_SELECT);
        push_filters(&mut builder, params);
        builder.push(" GROUP BY t.id, c.id ORDER BY t.name, t.id LIMIT ");
        builder.push_bind(limit);
        builder.push(" OFFSET ");
        builder.push_bind(offset);

        let titles = builder
            .build_query_as::<TitleRow>()
            .fetch_all(&self.pool)
            .await?;

        Ok(titles)
    }

    async fn get_title_count(&self, params: &TitlesQueryParams) -> Result<i64, sqlx::Error> {
        let mut builder = QueryBuilder::<Postgres>::new(
            "SELECT COUNT(*) FROM titles t LEFT JOIN categories c ON c.id = t.category_id",
        );
        push_filters(&mut builder, params);

        let count = builder
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    async fn get_title(&self, title_id: i64) -> Result<Option<TitleRow>, sqlx::Error> {
        let query = format!("{} WHERE t.id = $1 GROUP BY t.id, c.id", TITLE_SELECT);

        let title = sqlx::query_as::<_, TitleRow>(&query)
            .bind(title_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(title)
    }

    async fn get_title_genres(
        &self,
        title_ids: &[i64],
    ) -> Result<Vec<TitleGenreRow>, sqlx::Error> {
        let genres = sqlx::query_as::<_, TitleGenreRow>(
            r#"
            SELECT tg.title_id, g.name, g.slug
            FROM title_genres tg
            JOIN genres g ON g.id = tg.genre_id
            WHERE tg.title_id = ANY($1)
            ORDER BY g.name
            "#,
        )
        .bind(title_ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(genres)
    }

    async fn title_exists(&self, title_id: i64) -> Result<bool, sqlx::Error> {
        let exists =
            sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM titles WHERE id = $1)")
                .bind(title_id)
                .fetch_one(&self.pool)
                .await?;

        Ok(exists)
    }

    async fn create_title(&self, title: NewTitle<'_>) -> Result<i64, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let title_id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO titles (name, year, description, category_id)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            "#,
        )
        .bind(title.name)
        .bind(title.year)
        .bind(title.description)
        .bind(title.category_id)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO title_genres (title_id, genre_id)
            SELECT $1, UNNEST($2::bigint[])
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(title_id)
        .bind(&title.genre_ids)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(title_id)
    }

    async fn update_title(
        &self,
        title_id: i64,
        changes: TitleChanges<'_>,
    ) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        sqlx::query_scalar::<_, i64>(
            r#"
            UPDATE titles
            SET name = COALESCE($1, name),
                year = COALESCE($2, year),
                description = CASE WHEN $3 THEN $4 ELSE description END,
                category_id = COALESCE($5, category_id)
            WHERE id = $6
            RETURNING id
            "#,
        )
        .bind(changes.name)
        .bind(changes.year)
        .bind(changes.description.is_some())
        .bind(changes.description.flatten())
        .bind(changes.category_id)
        .bind(title_id)
        .fetch_one(&mut *tx)
        .await?;

        if let Some(genre_ids) = changes.genre_ids {
            sqlx::query("DELETE FROM title_genres WHERE title_id = $1")
                .bind(title_id)
                .execute(&mut *tx)
                .await?;

            sqlx::query(
                r#"
                INSERT INTO title_genres (title_id, genre_id)
                SELECT $1, UNNEST($2::bigint[])
                ON CONFLICT DO NOTHING
                "#,
            )
            .bind(title_id)
            .bind(&genre_ids)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        Ok(())
    }

    async fn delete_title(&self, title_id: i64) -> Result<(), sqlx::Error> {
        let result = sqlx::query("DELETE FROM titles WHERE id = $1")
            .bind(title_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(sqlx::Error::RowNotFound);
        }

        Ok(())
    }
}

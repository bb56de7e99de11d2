use super::{DBClient, contains_pattern, page_offset};
use crate::models::{Taxon, Taxonomy};

/// Category and genre operations; `kind` picks the table
pub trait TaxonomyExt {
    async fn get_taxa(
        &self,
        kind: Taxonomy,
        page: i64,
        limit: i64,
        search: Option<&str>,
    ) -> Result<Vec<Taxon>, sqlx::Error>;

    async fn get_taxon_count(&self, kind: Taxonomy, search: Option<&str>)
    -> Result<i64, sqlx::Error>;

    async fn get_taxon(&self, kind: Taxonomy, slug: &str) -> Result<Option<Taxon>, sqlx::Error>;

    /// Resolve a set of slugs; unknown slugs are simply missing from the result
    async fn get_taxa_by_slugs(
        &self,
        kind: Taxonomy,
        slugs: &[String],
    ) -> Result<Vec<Taxon>, sqlx::Error>;

    async fn create_taxon(&self, kind: Taxonomy, name: &str, slug: &str)
    -> Result<Taxon, sqlx::Error>;

    async fn delete_taxon(&self, kind: Taxonomy, slug: &str) -> Result<(), sqlx::Error>;
}

impl TaxonomyExt for DBClient {
    async fn get_taxa(
        &self,
        kind: Taxonomy,
        page: i64,
        limit: i64,
        search: Option<&str>,
    ) -> Result<Vec<Taxon>, sqlx::Error> {
        let offset = page_offset(page, limit);

        // Table names cannot be bound, they come from the closed Taxonomy enum
        let query = format!(
            r#"
            SELECT id, name, slug FROM {}
            WHERE ($1::text IS NULL OR name ILIKE $1 ESCAPE '\')
            ORDER BY name, id
            LIMIT $2 OFFSET $3
            "#,
            kind.table()
        );

        let taxa = sqlx::query_as::<_, Taxon>(&query)
            .bind(search.map(contains_pattern))
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        Ok(taxa)
    }

    async fn get_taxon_count(
        &self,
        kind: Taxonomy,
        search: Option<&str>,
    ) -> Result<i64, sqlx::Error> {
        let query = format!(
            r"SELECT COUNT(*) FROM {} WHERE ($1::text IS NULL OR name ILIKE $1 ESCAPE '\')",
            kind.table()
        );

        let count = sqlx::query_scalar::<_, i64>(&query)
            .bind(search.map(contains_pattern))
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    async fn get_taxon(&self, kind: Taxonomy, slug: &str) -> Result<Option<Taxon>, sqlx::Error> {
        let query = format!("SELECT id, name, slug FROM {} WHERE slug = $1", kind.table());

        let taxon = sqlx::query_as::<_, Taxon>(&query)
            .bind(slug)
            .fetch_optional(&self.pool)
            .await?;

        Ok(taxon)
    }

    async fn get_taxa_by_slugs(
        &self,
        kind: Taxonomy,
        slugs: &[String],
    ) -> Result<Vec<Taxon>, sqlx::Error> {
        let query = format!(
            "SELECT id, name, slug FROM {} WHERE slug = ANY($1) ORDER BY name",
            kind.table()
        );

        let taxa = sqlx::query_as::<_, Taxon>(&query)
            .bind(slugs)
            .fetch_all(&self.pool)
            .await?;

        Ok(taxa)
    }

    async fn create_taxon(
        &self,
        kind: Taxonomy,
        name: &str,
        slug: &str,
    ) -> Result<Taxon, sqlx::Error> {
        let query = format!(
            "INSERT INTO {} (name, slug) VALUES ($1, $2) RETURNING id, name, slug",
            kind.table()
        );

        let taxon = sqlx::query_as::<_, Taxon>(&query)
            .bind(name)
            .bind(slug)
            .fetch_one(&self.pool)
            .await?;

        Ok(taxon)
    }

    async fn delete_taxon(&self, kind: Taxonomy, slug: &str) -> Result<(), sqlx::Error> {
        // titles.category_id is ON DELETE SET NULL, title_genres cascades
        let query = format!("DELETE FROM {} WHERE slug = $1", kind.table());

        let result = sqlx::query(&query)
            .bind(slug)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(sqlx::Error::RowNotFound);
        }

        Ok(())
    }
}

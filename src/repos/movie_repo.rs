/*
 * Responsibility
 * - movies CRUD + filtered listing
 * - ORDER BY column comes from Filters::sort_column (safelisted), never from raw input
 * - update / delete are keyed on id; update additionally on version
 */
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};

use crate::{
    models::{Metadata, Movie, Runtime},
    repos::{MovieQuery, MovieStore, RepoError, RepoResult},
};

#[derive(Debug, FromRow)]
struct MovieRow {
    id: i64,
    created_at: DateTime<Utc>,
    title: String,
    year: i32,
    runtime: i32,
    genres: Vec<String>,
    version: i32,
}

impl From<MovieRow> for Movie {
    fn from(row: MovieRow) -> Self {
        Self {
            id: row.id,
            created_at: row.created_at,
            title: row.title,
            year: row.year,
            runtime: Runtime(row.runtime),
            genres: row.genres,
            version: row.version,
        }
    }
}

#[derive(Debug, FromRow)]
struct CountedMovieRow {
    total: i64,
    #[sqlx(flatten)]
    movie: MovieRow,
}

#[derive(Clone)]
pub struct MovieRepo {
    db: PgPool,
}

impl MovieRepo {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl MovieStore for MovieRepo {
    async fn insert(&self, movie: &mut Movie) -> RepoResult<()> {
        let (id, created_at, version) = sqlx::query_as::<_, (i64, DateTime<Utc>, i32)>(
            r#"
            INSERT INTO movies (title, year, runtime, genres)
            VALUES ($1, $2, $3, $4)
            RETURNING id, created_at, version
            "#,
        )
        .bind(&movie.title)
        .bind(movie.year)
        .bind(movie.runtime.0)
        .bind(&movie.genres)
        .fetch_one(&self.db)
        .await
        .map_err(RepoError::from_sqlx)?;

        movie.id = id;
        movie.created_at = created_at;
        movie.version = version;
        Ok(())
    }

    async fn get(&self, id: i64) -> RepoResult<Movie> {
        if id < 1 {
            return Err(RepoError::NotFound);
        }

        let row = sqlx::query_as::<_, MovieRow>(
            r#"
            SELECT id, created_at, title, year, runtime, genres, version
            FROM movies
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .map_err(RepoError::from_sqlx)?;

        row.map(Movie::from).ok_or(RepoError::NotFound)
    }

    async fn list(&self, query: &MovieQuery) -> RepoResult<(Vec<Movie>, Metadata)> {
        let filters = &query.filters;
        let direction = if filters.sort_descending() {
            "DESC"
        } else {
            "ASC"
        };

        let sql = format!(
            r#"
            SELECT count(*) OVER() AS total, id, created_at, title, year, runtime, genres, version
            FROM movies
            WHERE (to_tsvector('simple', title) @@ plainto_tsquery('simple', $1) OR $1 = '')
              AND (genres @> $2 OR $2 = '{{}}')
            ORDER BY {} {}, id ASC
            LIMIT $3 OFFSET $4
            "#,
            filters.sort_column(),
            direction
        );

        let rows = sqlx::query_as::<_, CountedMovieRow>(&sql)
            .bind(&query.title)
            .bind(&query.genres)
            .bind(filters.limit())
            .bind(filters.offset())
            .fetch_all(&self.db)
            .await
            .map_err(RepoError::from_sqlx)?;

        let total = rows.first().map(|r| r.total).unwrap_or(0);
        let movies = rows.into_iter().map(|r| Movie::from(r.movie)).collect();

        Ok((
            movies,
            Metadata::calculate(total, filters.page, filters.page_size),
        ))
    }

    async fn update(&self, movie: &mut Movie) -> RepoResult<()> {
        let version = sqlx::query_scalar::<_, i32>(
            r#"
            UPDATE movies
            SET title = $1, year = $2, runtime = $3, genres = $4, version = version + 1
            WHERE id = $5 AND version = $6
            RETURNING version
            "#,
        )
        .bind(&movie.title)
        .bind(movie.year)
        .bind(movie.runtime.0)
        .bind(&movie.genres)
        .bind(movie.id)
        .bind(movie.version)
        .fetch_optional(&self.db)
        .await
        .map_err(RepoError::from_sqlx)?;

        movie.version = version.ok_or(RepoError::EditConflict)?;
        Ok(())
    }

    async fn delete(&self, id: i64) -> RepoResult<()> {
        if id < 1 {
            return Err(RepoError::NotFound);
        }

        let result = sqlx::query("DELETE FROM movies WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await
            .map_err(RepoError::from_sqlx)?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }
}

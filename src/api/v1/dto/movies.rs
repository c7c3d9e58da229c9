/*
 * Responsibility
 * - Movies の request/response DTO
 * - list の query string を Filters に変換 (不正値は field error)
 */
use chrono::{Datelike, Utc};
use serde::{Deserialize, Serialize};

use crate::api::v1::validator::{Validator, unique};
use crate::error::AppError;
use crate::models::{Filters, Metadata, Movie, Runtime, movie::MOVIE_SORT_SAFELIST};
use crate::repos::MovieQuery;

#[derive(Debug, Deserialize)]
pub struct CreateMovieRequest {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub year: i32,
    #[serde(default)]
    pub runtime: Runtime,
    pub genres: Option<Vec<String>>,
}

/// PATCH body: absent fields keep their stored value.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateMovieRequest {
    pub title: Option<String>,
    pub year: Option<i32>,
    pub runtime: Option<Runtime>,
    pub genres: Option<Vec<String>>,
}

impl UpdateMovieRequest {
    pub fn apply(self, movie: &mut Movie) {
        if let Some(title) = self.title {
            movie.title = title;
        }
        if let Some(year) = self.year {
            movie.year = year;
        }
        if let Some(runtime) = self.runtime {
            movie.runtime = runtime;
        }
        if let Some(genres) = self.genres {
            movie.genres = genres;
        }
    }
}

pub fn validate_movie(
    title: &str,
    year: i32,
    runtime: Runtime,
    genres: Option<&[String]>,
) -> Result<(), AppError> {
    let mut v = Validator::new();

    v.check(!title.is_empty(), "title", "must be provided");
    v.check(title.len() <= 500, "title", "must not be more than 500 bytes long");

    v.check(year != 0, "year", "must be provided");
    v.check(year >= 1888, "year", "must be greater than 1888");
    v.check(year <= Utc::now().year(), "year", "must not be in the future");

    v.check(!runtime.is_zero(), "runtime", "must be provided");
    v.check(runtime.0 > 0, "runtime", "must be a positive integer");

    match genres {
        None => v.add_error("genres", "must be provided"),
        Some(genres) => {
            v.check(!genres.is_empty(), "genres", "must contain at least 1 genre");
            v.check(genres.len() <= 5, "genres", "must not contain more than 5 genres");
            v.check(unique(genres), "genres", "must not contain duplicate values");
        }
    }

    v.finish()
}

#[derive(Debug, Serialize)]
pub struct MovieResponse {
    pub movie: Movie,
}

#[derive(Debug, Serialize)]
pub struct MovieListResponse {
    pub movies: Vec<Movie>,
    pub metadata: Metadata,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

/// Raw `GET /v1/movies` query string; numbers are parsed by hand for field errors.
#[derive(Debug, Default, Deserialize)]
pub struct ListMoviesQuery {
    pub title: Option<String>,
    pub genres: Option<String>,
    pub page: Option<String>,
    pub page_size: Option<String>,
    pub sort: Option<String>,
}

fn read_int(v: &mut Validator, raw: Option<&str>, field: &str, default: i64) -> i64 {
    match raw {
        None | Some("") => default,
        Some(s) => s.parse().unwrap_or_else(|_| {
            v.add_error(field, "must be an integer value");
            default
        }),
    }
}

impl ListMoviesQuery {
    pub fn into_query(self) -> Result<MovieQuery, AppError> {
        let mut v = Validator::new();
        let defaults = Filters::default();

        let filters = Filters {
            page: read_int(&mut v, self.page.as_deref(), "page", defaults.page),
            page_size: read_int(&mut v, self.page_size.as_deref(), "page_size", defaults.page_size),
            sort: self
                .sort
                .filter(|s| !s.is_empty())
                .unwrap_or(defaults.sort),
        };

        v.check(filters.page > 0, "page", "must be greater than zero");
        v.check(filters.page <= 10_000_000, "page", "must be a maximum of 10 million");
        v.check(filters.page_size > 0, "page_size", "must be greater than zero");
        v.check(filters.page_size <= 100, "page_size", "must be a maximum of 100");
        v.check(
            MOVIE_SORT_SAFELIST.contains(&filters.sort.as_str()),
            "sort",
            "invalid sort value",
        );
        v.finish()?;

        let genres = self
            .genres
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|g| !g.is_empty())
            .map(String::from)
            .collect();

        Ok(MovieQuery {
            title: self.title.unwrap_or_default(),
            genres,
            filters,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn genres(list: &[&str]) -> Vec<String> {
        list.iter().map(|g| g.to_string()).collect()
    }

    #[test]
    fn movie_validation_collects_field_errors() {
        let dup = genres(&["drama", "drama"]);
        let Err(AppError::FailedValidation(fields)) =
            validate_movie("", 1500, Runtime(0), Some(dup.as_slice()))
        else {
            panic!("expected validation failure");
        };

        assert_eq!(fields["title"], "must be provided");
        assert_eq!(fields["year"], "must be greater than 1888");
        assert_eq!(fields["runtime"], "must be provided");
        assert_eq!(fields["genres"], "must not contain duplicate values");

        let ok = genres(&["drama"]);
        assert!(validate_movie("Casablanca", 1942, Runtime(102), Some(ok.as_slice())).is_ok());
        assert!(validate_movie("Casablanca", 1942, Runtime(102), None).is_err());
    }

    #[test]
    fn list_query_defaults_and_parsing() {
        let query = ListMoviesQuery::default().into_query().unwrap();
        assert_eq!(query.filters, Filters::default());
        assert!(query.genres.is_empty());

        let query = ListMoviesQuery {
            genres: Some("drama, comedy,".into()),
            page: Some("2".into()),
            sort: Some("-year".into()),
            ..ListMoviesQuery::default()
        }
        .into_query()
        .unwrap();
        assert_eq!(query.genres, ["drama", "comedy"]);
        assert_eq!(query.filters.page, 2);
        assert_eq!(query.filters.sort, "-year");
    }

    #[test]
    fn list_query_rejects_bad_values() {
        let Err(AppError::FailedValidation(fields)) = ListMoviesQuery {
            page: Some("abc".into()),
            page_size: Some("1000".into()),
            sort: Some("created_at".into()),
            ..ListMoviesQuery::default()
        }
        .into_query() else {
            panic!("expected validation failure");
        };

        assert_eq!(fields["page"], "must be an integer value");
        assert_eq!(fields["page_size"], "must be a maximum of 100");
        assert_eq!(fields["sort"], "invalid sort value");
    }
}

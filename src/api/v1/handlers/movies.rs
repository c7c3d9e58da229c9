/*
 * Responsibility
 * - /v1/movies 系 CRUD handler (permission gate は routes 側で適用)
 * - id は正の整数のみ。それ以外は 404
 * - PATCH は version による楽観ロック (X-Expected-Version があれば事前照合)
 */
use axum::{
    Json,
    extract::{Path, Query, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};

use crate::{
    api::v1::{
        dto::movies::{
            CreateMovieRequest, ListMoviesQuery, MessageResponse, MovieListResponse, MovieResponse,
            UpdateMovieRequest, validate_movie,
        },
        extractors::ApiJson,
    },
    error::AppError,
    models::Movie,
    state::AppState,
};

fn parse_id(raw: &str) -> Result<i64, AppError> {
    match raw.parse::<i64>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(AppError::NotFound),
    }
}

pub async fn list_movies(
    State(state): State<AppState>,
    Query(params): Query<ListMoviesQuery>,
) -> Result<Json<MovieListResponse>, AppError> {
    let query = params.into_query()?;
    let (movies, metadata) = state.movies.list(&query).await?;

    Ok(Json(MovieListResponse { movies, metadata }))
}

pub async fn create_movie(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<CreateMovieRequest>,
) -> Result<Response, AppError> {
    validate_movie(&req.title, req.year, req.runtime, req.genres.as_deref())?;

    let mut movie = Movie::new(req.title, req.year, req.runtime, req.genres.unwrap_or_default());
    state.movies.insert(&mut movie).await?;

    let location = HeaderValue::from_str(&format!("/v1/movies/{}", movie.id))
        .map_err(|_| AppError::Internal)?;

    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, location)],
        Json(MovieResponse { movie }),
    )
        .into_response())
}

pub async fn show_movie(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<MovieResponse>, AppError> {
    let movie = state.movies.get(parse_id(&id)?).await?;
    Ok(Json(MovieResponse { movie }))
}

pub async fn update_movie(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    ApiJson(req): ApiJson<UpdateMovieRequest>,
) -> Result<Json<MovieResponse>, AppError> {
    let mut movie = state.movies.get(parse_id(&id)?).await?;

    if let Some(expected) = headers.get("x-expected-version") {
        let matches = expected
            .to_str()
            .ok()
            .and_then(|v| v.parse::<i32>().ok())
            .is_some_and(|v| v == movie.version);
        if !matches {
            return Err(AppError::EditConflict);
        }
    }

    req.apply(&mut movie);
    validate_movie(&movie.title, movie.year, movie.runtime, Some(movie.genres.as_slice()))?;

    state.movies.update(&mut movie).await?;
    Ok(Json(MovieResponse { movie }))
}

pub async fn delete_movie(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, AppError> {
    state.movies.delete(parse_id(&id)?).await?;

    Ok(Json(MessageResponse {
        message: "movie successfully deleted",
    }))
}

/*
 * Responsibility
 * - request / response DTO (HTTP の形) と、その validate()
 */
pub mod movies;
pub mod tokens;
pub mod users;

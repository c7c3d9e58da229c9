/*
 * Responsibility
 * - v1 の URL 構造を定義
 * - route ごとの認可 gate (activated / permitted) をここで決める
 * - 認証 (Identity 解決) と rate limit は app 側で全体に掛ける
 */
use axum::{
    Router,
    handler::Handler,
    routing::{get, post, put},
};

use crate::middleware::auth::{activated, permitted};
use crate::state::AppState;

use crate::api::v1::handlers::{
    health::healthcheck,
    movies::{create_movie, delete_movie, list_movies, show_movie, update_movie},
    tokens::{create_authentication_token, delete_authentication_tokens},
    users::{activate_user, list_my_permissions, register_user},
};

pub fn routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/healthcheck", get(healthcheck))
        .route(
            "/movies",
            get(list_movies.layer(permitted(state, "movie:read")))
                .post(create_movie.layer(permitted(state, "movie:create"))),
        )
        .route(
            "/movies/{id}",
            get(show_movie.layer(permitted(state, "movie:read")))
                .patch(update_movie.layer(permitted(state, "movie:update")))
                .delete(delete_movie.layer(permitted(state, "movie:delete"))),
        )
        .route("/users", post(register_user))
        .route("/users/activated", put(activate_user))
        .route(
            "/users/me/permissions",
            get(list_my_permissions.layer(activated())),
        )
        .route(
            "/tokens/authentication",
            post(create_authentication_token).delete(delete_authentication_tokens),
        )
}

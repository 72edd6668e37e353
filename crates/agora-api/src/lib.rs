pub mod auth;
pub mod comments;
pub mod communities;
pub mod error;
pub mod middleware;
pub mod posts;
pub mod state;
pub mod tokens;

use axum::{
    Router,
    middleware::from_fn_with_state,
    routing::{delete, get, patch, post},
};

use crate::middleware::require_auth;
use crate::state::AppState;

/// Builds the full REST surface. Reads are public; every write sits behind
/// `require_auth`.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/users/register", post(auth::register))
        .route("/users/login", post(auth::login))
        .route("/users/token/refresh", post(auth::refresh))
        .route("/communities", get(communities::list_communities))
        .route("/communities/{id}", get(communities::get_community))
        .route("/posts", get(posts::list_posts))
        .route("/posts/{id}", get(posts::get_post))
        .route("/comments", get(comments::list_comments));

    let protected_routes = Router::new()
        .route("/users/profile", get(auth::get_profile).patch(auth::update_profile))
        .route("/communities", post(communities::create_community))
        .route("/communities/user/snippets", get(communities::user_snippets))
        .route("/communities/{id}", patch(communities::update_community))
        .route("/communities/{id}/join", post(communities::join_community))
        .route("/communities/{id}/leave", post(communities::leave_community))
        .route("/posts/create", post(posts::create_post))
        .route("/posts/votes", get(posts::user_votes))
        .route("/posts/{id}", delete(posts::delete_post))
        .route("/posts/{id}/vote", post(posts::vote_post))
        .route("/comments/create", post(comments::create_comment))
        .route("/comments/{id}/delete", delete(comments::delete_comment))
        .route_layer(from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}

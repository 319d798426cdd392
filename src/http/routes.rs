use axum::{middleware, routing::get, routing::post, Router};

use crate::http::handlers;
use crate::http::middleware::page_cache::page_cache_middleware;
use crate::AppState;

pub fn health() -> Router<AppState> {
    Router::new().route("/health", get(handlers::health))
}

/// The index listing, served through the page cache.
pub fn index(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::index))
        .route_layer(middleware::from_fn_with_state(state, page_cache_middleware))
}

pub fn listings() -> Router<AppState> {
    Router::new()
        .route("/group/:slug/", get(handlers::group_posts))
        .route("/profile/:username/", get(handlers::profile))
        .route("/follow/", get(handlers::follow_index))
        .route("/search/", get(handlers::search))
}

pub fn posts() -> Router<AppState> {
    Router::new()
        .route(
            "/create/",
            get(handlers::create_post_form).post(handlers::create_post),
        )
        .route("/posts/:id/", get(handlers::post_detail))
        .route(
            "/posts/:id/edit/",
            get(handlers::edit_post_form).post(handlers::edit_post),
        )
        .route(
            "/posts/:id/delete/",
            get(handlers::delete_post).post(handlers::delete_post),
        )
        .route(
            "/posts/:id/comment/",
            get(handlers::comment_form).post(handlers::add_comment),
        )
        .route(
            "/posts/com/:id/delete/",
            get(handlers::delete_comment).post(handlers::delete_comment),
        )
        .route(
            "/posts/:id/like/",
            get(handlers::like_post).post(handlers::like_post),
        )
        .route(
            "/posts/:id/unlike/",
            get(handlers::unlike_post).post(handlers::unlike_post),
        )
}

pub fn follows() -> Router<AppState> {
    Router::new()
        .route(
            "/profile/:username/follow/",
            get(handlers::profile_follow).post(handlers::profile_follow),
        )
        .route(
            "/profile/:username/unfollow/",
            get(handlers::profile_unfollow).post(handlers::profile_unfollow),
        )
}

pub fn auth() -> Router<AppState> {
    Router::new()
        .route("/auth/signup/", post(handlers::signup))
        .route("/auth/login/", post(handlers::login))
        .route("/auth/refresh/", post(handlers::refresh_token))
        .route("/auth/logout/", post(handlers::logout))
        .route("/auth/password_change/", post(handlers::password_change))
        .route(
            "/auth/user/edit/",
            get(handlers::get_current_user).post(handlers::update_profile),
        )
        .route("/auth/info/", get(handlers::account_info))
        .route("/auth/info/likes/", get(handlers::account_likes))
        .route("/auth/info/comments/", get(handlers::account_comments))
}

pub fn admin() -> Router<AppState> {
    Router::new()
        .route("/admin/groups/", post(handlers::create_group))
        .route("/admin/cache/clear/", post(handlers::clear_page_cache))
}

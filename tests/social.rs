//! Relation Toggle Tests
//!
//! Covers follow/unfollow and like/unlike idempotence, including concurrent
//! duplicate requests.

mod common;

use axum::http::StatusCode;
use common::app;
use tokio::task::JoinSet;

const FOLLOW_EDGES: &str = "SELECT COUNT(*) FROM follows WHERE follower_id = $1";
const LIKE_EDGES: &str = "SELECT COUNT(*) FROM likes WHERE post_id = $1";
const RACERS: usize = 8;

/// Fires `RACERS` identical POSTs at once and returns how many reported a change.
async fn race_posts(path: String, token: String) -> usize {
    let app = app().await;
    let mut set = JoinSet::new();
    for _ in 0..RACERS {
        let path = path.clone();
        let token = token.clone();
        set.spawn(async move { app.post_empty(&path, Some(&token)).await });
    }

    let mut changed = 0;
    while let Some(resp) = set.join_next().await {
        let resp = resp.expect("request task panicked");
        assert_eq!(resp.status, StatusCode::OK);
        if resp.json()["changed"] == true {
            changed += 1;
        }
    }
    changed
}

// ===========================================================================
// Follows
// ===========================================================================

#[tokio::test]
async fn follow_twice_creates_one_edge() {
    let app = app().await;
    let fan = app.create_user("follow_twice_fan").await;
    app.create_user("follow_twice_star").await;

    let resp = app
        .post_empty("/profile/user_follow_twice_star/follow/", Some(&fan.access_token))
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    let body = resp.json();
    assert_eq!(body["following"], true);
    assert_eq!(body["changed"], true);
    assert!(body["following_since"].is_string());

    let resp = app
        .get("/profile/user_follow_twice_star/follow/", Some(&fan.access_token))
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json()["changed"], false);
    assert_eq!(resp.json()["following"], true);

    assert_eq!(app.count(FOLLOW_EDGES, fan.id).await, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_follows_create_one_edge() {
    let app = app().await;
    let fan = app.create_user("follow_race_fan").await;
    let star = app.create_user("follow_race_star").await;

    let changed = race_posts(
        "/profile/user_follow_race_star/follow/".to_string(),
        fan.access_token.clone(),
    )
    .await;
    assert_eq!(changed, 1);
    assert_eq!(app.count(FOLLOW_EDGES, fan.id).await, 1);
    assert_eq!(
        app.count("SELECT COUNT(*) FROM follows WHERE author_id = $1", star.id)
            .await,
        1
    );
}

#[tokio::test]
async fn self_follow_is_noop() {
    let app = app().await;
    let user = app.create_user("follow_self").await;

    let resp = app
        .post_empty("/profile/user_follow_self/follow/", Some(&user.access_token))
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    let body = resp.json();
    assert_eq!(body["following"], false);
    assert_eq!(body["changed"], false);
    assert!(body["following_since"].is_null());

    assert_eq!(app.count(FOLLOW_EDGES, user.id).await, 0);
}

#[tokio::test]
async fn unfollow_missing_edge_is_not_an_error() {
    let app = app().await;
    let fan = app.create_user("unfollow_missing_fan").await;
    app.create_user("unfollow_missing_star").await;

    let resp = app
        .post_empty(
            "/profile/user_unfollow_missing_star/unfollow/",
            Some(&fan.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json()["changed"], false);
    assert_eq!(resp.json()["following"], false);
    assert_eq!(app.count(FOLLOW_EDGES, fan.id).await, 0);
}

#[tokio::test]
async fn follow_then_unfollow() {
    let app = app().await;
    let fan = app.create_user("follow_cycle_fan").await;
    app.create_user("follow_cycle_star").await;

    app.post_empty("/profile/user_follow_cycle_star/follow/", Some(&fan.access_token))
        .await;
    let resp = app
        .post_empty("/profile/user_follow_cycle_star/unfollow/", Some(&fan.access_token))
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json()["changed"], true);
    assert_eq!(app.count(FOLLOW_EDGES, fan.id).await, 0);
}

#[tokio::test]
async fn follow_unknown_user_is_404() {
    let app = app().await;
    let fan = app.create_user("follow_unknown").await;

    let resp = app
        .post_empty("/profile/ghost_user/follow/", Some(&fan.access_token))
        .await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn follow_anonymous_redirects_to_login() {
    let app = app().await;
    app.create_user("follow_anon_star").await;

    let resp = app
        .post_empty("/profile/user_follow_anon_star/follow/", None)
        .await;
    assert_eq!(resp.status, StatusCode::FOUND);
    assert_eq!(
        resp.location(),
        Some("/auth/login/?next=%2Fprofile%2Fuser_follow_anon_star%2Ffollow%2F")
    );
}

// ===========================================================================
// Likes
// ===========================================================================

#[tokio::test]
async fn like_twice_creates_one_edge() {
    let app = app().await;
    let author = app.create_user("like_twice_author").await;
    let fan = app.create_user("like_twice_fan").await;
    let post_id = app.create_post(author.id, "likeable", None).await;

    let resp = app
        .post_empty(&format!("/posts/{}/like/", post_id), Some(&fan.access_token))
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    let body = resp.json();
    assert_eq!(body["liked"], true);
    assert_eq!(body["changed"], true);
    assert_eq!(body["likes_count"], 1);

    let resp = app
        .get(&format!("/posts/{}/like/", post_id), Some(&fan.access_token))
        .await;
    assert_eq!(resp.json()["changed"], false);
    assert_eq!(resp.json()["likes_count"], 1);

    assert_eq!(app.count(LIKE_EDGES, post_id).await, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_likes_create_one_edge() {
    let app = app().await;
    let author = app.create_user("like_race_author").await;
    let fan = app.create_user("like_race_fan").await;
    let post_id = app.create_post(author.id, "raced", None).await;

    let changed = race_posts(format!("/posts/{}/like/", post_id), fan.access_token.clone()).await;
    assert_eq!(changed, 1);
    assert_eq!(app.count(LIKE_EDGES, post_id).await, 1);
}

#[tokio::test]
async fn unlike_without_like_is_noop() {
    let app = app().await;
    let author = app.create_user("unlike_noop_author").await;
    let fan = app.create_user("unlike_noop_fan").await;
    let post_id = app.create_post(author.id, "unliked", None).await;

    let resp = app
        .post_empty(&format!("/posts/{}/unlike/", post_id), Some(&fan.access_token))
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    let body = resp.json();
    assert_eq!(body["liked"], false);
    assert_eq!(body["changed"], false);
    assert_eq!(body["likes_count"], 0);
}

#[tokio::test]
async fn like_then_unlike() {
    let app = app().await;
    let author = app.create_user("like_cycle_author").await;
    let fan = app.create_user("like_cycle_fan").await;
    let post_id = app.create_post(author.id, "cycled", None).await;

    app.post_empty(&format!("/posts/{}/like/", post_id), Some(&fan.access_token))
        .await;
    let resp = app
        .post_empty(&format!("/posts/{}/unlike/", post_id), Some(&fan.access_token))
        .await;
    assert_eq!(resp.json()["changed"], true);
    assert_eq!(app.count(LIKE_EDGES, post_id).await, 0);
}

#[tokio::test]
async fn like_missing_post_is_404() {
    let app = app().await;
    let fan = app.create_user("like_missing").await;

    let resp = app
        .post_empty("/posts/987654321/like/", Some(&fan.access_token))
        .await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);

    let resp = app
        .post_empty("/posts/987654321/unlike/", Some(&fan.access_token))
        .await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn liked_posts_listing() {
    let app = app().await;
    let author = app.create_user("liked_list_author").await;
    let fan = app.create_user("liked_list_fan").await;
    let liked = app.create_post(author.id, "liked one", None).await;
    app.create_post(author.id, "ignored one", None).await;

    app.post_empty(&format!("/posts/{}/like/", liked), Some(&fan.access_token))
        .await;

    let resp = app.get("/auth/info/likes/", Some(&fan.access_token)).await;
    assert_eq!(resp.status, StatusCode::OK);
    let body = resp.json();
    let items = body["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["id"], liked);
}

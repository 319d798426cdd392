//! Comment Tests

mod common;

use axum::http::StatusCode;
use common::app;
use serde_json::json;

const POST_COMMENTS: &str = "SELECT COUNT(*) FROM comments WHERE post_id = $1";

#[tokio::test]
async fn add_comment() {
    let app = app().await;
    let author = app.create_user("comment_add_author").await;
    let reader = app.create_user("comment_add_reader").await;
    let post_id = app.create_post(author.id, "talk about it", None).await;

    let resp = app
        .post_json(
            &format!("/posts/{}/comment/", post_id),
            json!({ "text": "  great post  " }),
            Some(&reader.access_token),
        )
        .await;

    assert_eq!(resp.status, StatusCode::CREATED);
    let body = resp.json();
    assert_eq!(body["text"], "great post");
    assert_eq!(body["post_id"], post_id);
    assert_eq!(body["author"]["username"], "user_comment_add_reader");
}

#[tokio::test]
async fn empty_comment_is_rejected() {
    let app = app().await;
    let author = app.create_user("comment_empty").await;
    let post_id = app.create_post(author.id, "quiet", None).await;

    let resp = app
        .post_json(
            &format!("/posts/{}/comment/", post_id),
            json!({ "text": "" }),
            Some(&author.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(resp.field_error("text"), "This field is required.");
    assert_eq!(app.count(POST_COMMENTS, post_id).await, 0);
}

#[tokio::test]
async fn anonymous_comment_redirects_to_login() {
    let app = app().await;
    let author = app.create_user("comment_anon").await;
    let post_id = app.create_post(author.id, "closed", None).await;

    let resp = app
        .post_json(
            &format!("/posts/{}/comment/", post_id),
            json!({ "text": "hi" }),
            None,
        )
        .await;
    assert_eq!(resp.status, StatusCode::FOUND);
    assert_eq!(
        resp.location(),
        Some(format!("/auth/login/?next=%2Fposts%2F{}%2Fcomment%2F", post_id).as_str())
    );
    assert_eq!(app.count(POST_COMMENTS, post_id).await, 0);
}

#[tokio::test]
async fn anonymous_comment_without_body_redirects_to_login() {
    let app = app().await;
    let author = app.create_user("comment_anon_nobody").await;
    let post_id = app.create_post(author.id, "closed", None).await;

    let resp = app
        .post_empty(&format!("/posts/{}/comment/", post_id), None)
        .await;
    assert_eq!(resp.status, StatusCode::FOUND);
    assert_eq!(
        resp.location(),
        Some(format!("/auth/login/?next=%2Fposts%2F{}%2Fcomment%2F", post_id).as_str())
    );
}

#[tokio::test]
async fn comment_on_missing_post_is_404() {
    let app = app().await;
    let user = app.create_user("comment_missing").await;

    let resp = app
        .post_json(
            "/posts/987654321/comment/",
            json!({ "text": "hello?" }),
            Some(&user.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn comment_get_redirects_to_post() {
    let app = app().await;

    let resp = app.get("/posts/42/comment/", None).await;
    assert_eq!(resp.status, StatusCode::FOUND);
    assert_eq!(resp.location(), Some("/posts/42/"));
}

#[tokio::test]
async fn only_comment_author_deletes() {
    let app = app().await;
    let author = app.create_user("comment_del_author").await;
    let other = app.create_user("comment_del_other").await;
    let post_id = app.create_post(author.id, "commented", None).await;

    let resp = app
        .post_json(
            &format!("/posts/{}/comment/", post_id),
            json!({ "text": "mine" }),
            Some(&author.access_token),
        )
        .await;
    let comment_id = resp.json()["id"].as_i64().unwrap();

    let resp = app
        .post_empty(
            &format!("/posts/com/{}/delete/", comment_id),
            Some(&other.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::FOUND);
    assert_eq!(resp.location(), Some(format!("/posts/{}/", post_id).as_str()));
    assert_eq!(app.count(POST_COMMENTS, post_id).await, 1);

    let resp = app
        .get(
            &format!("/posts/com/{}/delete/", comment_id),
            Some(&author.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::NO_CONTENT);
    assert_eq!(app.count(POST_COMMENTS, post_id).await, 0);

    let resp = app
        .post_empty(
            &format!("/posts/com/{}/delete/", comment_id),
            Some(&author.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn own_comments_listing() {
    let app = app().await;
    let user = app.create_user("comment_own").await;
    let post_id = app.create_post(user.id, "self talk", None).await;

    for text in ["one", "two"] {
        app.post_json(
            &format!("/posts/{}/comment/", post_id),
            json!({ "text": text }),
            Some(&user.access_token),
        )
        .await;
    }

    let resp = app.get("/auth/info/comments/", Some(&user.access_token)).await;
    assert_eq!(resp.status, StatusCode::OK);
    let body = resp.json();
    let comments = body.as_array().unwrap();
    assert_eq!(comments.len(), 2);
    assert_eq!(comments[0]["text"], "two");
}

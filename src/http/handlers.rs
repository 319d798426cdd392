use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::app::auth::{AuthService, Signup};
use crate::app::engagement::EngagementService;
use crate::app::groups::GroupService;
use crate::app::guard::{can_create_comment, can_edit_post, Outcome};
use crate::app::listing::ListingService;
use crate::app::posts::PostService;
use crate::app::social::SocialService;
use crate::app::users::{ProfileUpdate, UserService};
use crate::domain::engagement::Comment;
use crate::domain::group::Group;
use crate::domain::page::Page;
use crate::domain::post::{Post, PostDraft};
use crate::domain::user::{ActivitySummary, PublicUser, User};
use crate::domain::validation::FieldErrors;
use crate::http::{AdminToken, AppError, AuthUser};
use crate::AppState;

#[derive(Serialize)]
pub(crate) struct HealthResponse {
    status: &'static str,
}

#[derive(Deserialize)]
pub struct PageQuery {
    pub page: Option<i64>,
}

impl PageQuery {
    fn number(&self) -> Result<i64, AppError> {
        match self.page {
            None => Ok(1),
            Some(page) if page >= 1 => Ok(page),
            Some(_) => Err(AppError::bad_request("page must be a positive integer")),
        }
    }
}

fn post_path(post_id: i64) -> String {
    format!("/posts/{}/", post_id)
}

/// Field errors become a 400 form response; anything else is logged and
/// reported as an internal error.
fn service_error(err: anyhow::Error, message: &'static str) -> AppError {
    if let Some(fields) = err.downcast_ref::<FieldErrors>() {
        return AppError::validation(fields.clone());
    }
    tracing::error!(error = ?err, "{}", message);
    AppError::internal(message)
}

fn auth_service(state: &AppState) -> AuthService {
    AuthService::new(
        state.db.clone(),
        state.paseto_access_key,
        state.paseto_refresh_key,
        state.access_ttl_minutes,
        state.refresh_ttl_days,
    )
}

pub(crate) async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let db = state.db.ping().await.is_ok();
    let redis = state.cache.ping().await.is_ok();
    let status = if db && redis { "ok" } else { "degraded" };

    Json(HealthResponse { status })
}

// Listings

/// All posts. Sits behind the page cache, so it must not look at the viewer.
pub async fn index(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Page<Post>>, AppError> {
    let page = query.number()?;
    let service = ListingService::new(state.db.clone());
    let posts = service
        .list_all(page)
        .await
        .map_err(|err| service_error(err, "failed to list posts"))?;

    Ok(Json(posts))
}

#[derive(Serialize)]
pub struct GroupPageResponse {
    pub group: Group,
    pub posts: Page<Post>,
}

pub async fn group_posts(
    Path(slug): Path<String>,
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Json<GroupPageResponse>, AppError> {
    let page = query.number()?;
    let service = ListingService::new(state.db.clone());
    let listing = service
        .list_by_group(&slug, page)
        .await
        .map_err(|err| service_error(err, "failed to list group posts"))?;

    match listing {
        Some((group, posts)) => Ok(Json(GroupPageResponse { group, posts })),
        None => Err(AppError::not_found("group not found")),
    }
}

#[derive(Serialize)]
pub struct ProfileResponse {
    pub author: PublicUser,
    pub following: bool,
    pub posts: Page<Post>,
}

pub async fn profile(
    Path(username): Path<String>,
    viewer: Option<AuthUser>,
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Json<ProfileResponse>, AppError> {
    let page = query.number()?;
    let service = ListingService::new(state.db.clone());
    let listing = service
        .list_by_author(&username, page)
        .await
        .map_err(|err| service_error(err, "failed to list author posts"))?;

    let Some((author, posts)) = listing else {
        return Err(AppError::not_found("user not found"));
    };

    let following = match viewer {
        Some(viewer) => SocialService::new(state.db.clone())
            .is_following(viewer.user_id, author.id)
            .await
            .map_err(|err| service_error(err, "failed to check follow"))?,
        None => false,
    };

    let author = UserService::new(state.db.clone())
        .public_profile(author)
        .await
        .map_err(|err| service_error(err, "failed to load profile"))?;

    Ok(Json(ProfileResponse {
        author,
        following,
        posts,
    }))
}

pub async fn follow_index(
    auth: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Page<Post>>, AppError> {
    let page = query.number()?;
    let service = ListingService::new(state.db.clone());
    let posts = service
        .list_followed(auth.user_id, page)
        .await
        .map_err(|err| service_error(err, "failed to list followed posts"))?;

    Ok(Json(posts))
}

#[derive(Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub search: String,
    pub page: Option<i64>,
}

#[derive(Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub posts: Page<Post>,
}

pub async fn search(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<SearchResponse>, AppError> {
    let page = PageQuery { page: query.page }.number()?;
    let service = ListingService::new(state.db.clone());
    let posts = service
        .search(&query.search, page)
        .await
        .map_err(|err| service_error(err, "failed to search posts"))?;

    Ok(Json(SearchResponse {
        query: query.search,
        posts,
    }))
}

// Posts

#[derive(Serialize)]
pub struct PostDetailResponse {
    pub post: Post,
    pub comments: Vec<Comment>,
    pub likes_count: i64,
    pub liked: bool,
    pub following: bool,
}

pub async fn post_detail(
    Path(post_id): Path<i64>,
    viewer: Option<AuthUser>,
    State(state): State<AppState>,
) -> Result<Json<PostDetailResponse>, AppError> {
    let post = PostService::new(state.db.clone())
        .get_post(post_id)
        .await
        .map_err(|err| service_error(err, "failed to fetch post"))?
        .ok_or_else(|| AppError::not_found("post not found"))?;

    let engagement = EngagementService::new(state.db.clone());
    let comments = engagement
        .list_comments(post_id)
        .await
        .map_err(|err| service_error(err, "failed to list comments"))?;
    let likes_count = engagement
        .likes_count(post_id)
        .await
        .map_err(|err| service_error(err, "failed to count likes"))?;

    let (liked, following) = match viewer {
        Some(viewer) => {
            let liked = engagement
                .has_liked(viewer.user_id, post_id)
                .await
                .map_err(|err| service_error(err, "failed to check like"))?;
            let following = SocialService::new(state.db.clone())
                .is_following(viewer.user_id, post.author.id)
                .await
                .map_err(|err| service_error(err, "failed to check follow"))?;
            (liked, following)
        }
        None => (false, false),
    };

    Ok(Json(PostDetailResponse {
        post,
        comments,
        likes_count,
        liked,
        following,
    }))
}

#[derive(Serialize)]
pub struct PostFormResponse {
    pub groups: Vec<Group>,
    pub post: Option<Post>,
}

async fn group_choices(state: &AppState) -> Result<Vec<Group>, AppError> {
    GroupService::new(state.db.clone())
        .list_groups()
        .await
        .map_err(|err| service_error(err, "failed to list groups"))
}

pub async fn create_post_form(
    _auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<PostFormResponse>, AppError> {
    let groups = group_choices(&state).await?;
    Ok(Json(PostFormResponse { groups, post: None }))
}

pub async fn create_post(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<PostDraft>,
) -> Result<(StatusCode, Json<Post>), AppError> {
    let service = PostService::new(state.db.clone());
    let post = service
        .create_post(auth.user_id, payload)
        .await
        .map_err(|err| service_error(err, "failed to create post"))?;

    tracing::info!(post_id = post.id, user_id = auth.user_id, "post created");
    Ok((StatusCode::CREATED, Json(post)))
}

pub async fn edit_post_form(
    Path(post_id): Path<i64>,
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<PostFormResponse>, AppError> {
    let post = PostService::new(state.db.clone())
        .get_post(post_id)
        .await
        .map_err(|err| service_error(err, "failed to fetch post"))?
        .ok_or_else(|| AppError::not_found("post not found"))?;

    if !can_edit_post(auth.user_id, &post) {
        tracing::info!(post_id, user_id = auth.user_id, "post edit form denied");
        return Err(AppError::redirect(post_path(post_id)));
    }

    let groups = group_choices(&state).await?;
    Ok(Json(PostFormResponse {
        groups,
        post: Some(post),
    }))
}

pub async fn edit_post(
    Path(post_id): Path<i64>,
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<PostDraft>,
) -> Result<Json<Post>, AppError> {
    let service = PostService::new(state.db.clone());
    let outcome = service
        .update_post(post_id, auth.user_id, payload)
        .await
        .map_err(|err| service_error(err, "failed to update post"))?;

    match outcome {
        Outcome::Applied(post) => Ok(Json(post)),
        Outcome::Forbidden => Err(AppError::redirect(post_path(post_id))),
        Outcome::NotFound => Err(AppError::not_found("post not found")),
    }
}

pub async fn delete_post(
    Path(post_id): Path<i64>,
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<StatusCode, AppError> {
    let service = PostService::new(state.db.clone());
    let outcome = service
        .delete_post(post_id, auth.user_id)
        .await
        .map_err(|err| service_error(err, "failed to delete post"))?;

    match outcome {
        Outcome::Applied(()) => {
            tracing::info!(post_id, user_id = auth.user_id, "post deleted");
            Ok(StatusCode::NO_CONTENT)
        }
        Outcome::Forbidden => Err(AppError::redirect(post_path(post_id))),
        Outcome::NotFound => Err(AppError::not_found("post not found")),
    }
}

// Comments

#[derive(Deserialize)]
pub struct CommentRequest {
    #[serde(default)]
    pub text: String,
}

pub async fn add_comment(
    Path(post_id): Path<i64>,
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CommentRequest>,
) -> Result<(StatusCode, Json<Comment>), AppError> {
    if !can_create_comment(Some(auth.user_id)) {
        return Err(AppError::login_required(&format!(
            "/posts/{}/comment/",
            post_id
        )));
    }
    let user_id = auth.user_id;

    let text = payload.text.trim().to_string();
    if text.is_empty() {
        let mut fields = FieldErrors::new();
        fields.add("text", "This field is required.");
        return Err(AppError::validation(fields));
    }

    let service = EngagementService::new(state.db.clone());
    let comment = service
        .comment_post(user_id, post_id, text)
        .await
        .map_err(|err| service_error(err, "failed to add comment"))?
        .ok_or_else(|| AppError::not_found("post not found"))?;

    Ok((StatusCode::CREATED, Json(comment)))
}

/// The comment form lives on the post page.
pub async fn comment_form(Path(post_id): Path<i64>) -> AppError {
    AppError::redirect(post_path(post_id))
}

pub async fn delete_comment(
    Path(comment_id): Path<i64>,
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<StatusCode, AppError> {
    let service = EngagementService::new(state.db.clone());
    let comment = service
        .get_comment(comment_id)
        .await
        .map_err(|err| service_error(err, "failed to fetch comment"))?
        .ok_or_else(|| AppError::not_found("comment not found"))?;

    let outcome = service
        .delete_comment(comment_id, auth.user_id)
        .await
        .map_err(|err| service_error(err, "failed to delete comment"))?;

    match outcome {
        Outcome::Applied(()) => Ok(StatusCode::NO_CONTENT),
        Outcome::Forbidden => Err(AppError::redirect(post_path(comment.post_id))),
        Outcome::NotFound => Err(AppError::not_found("comment not found")),
    }
}

// Likes

#[derive(Serialize)]
pub struct LikeResponse {
    pub liked: bool,
    pub changed: bool,
    pub likes_count: i64,
}

async fn like_response(
    state: &AppState,
    user_id: i64,
    post_id: i64,
    changed: Option<bool>,
) -> Result<Json<LikeResponse>, AppError> {
    let Some(changed) = changed else {
        return Err(AppError::not_found("post not found"));
    };

    let engagement = EngagementService::new(state.db.clone());
    let liked = engagement
        .has_liked(user_id, post_id)
        .await
        .map_err(|err| service_error(err, "failed to check like"))?;
    let likes_count = engagement
        .likes_count(post_id)
        .await
        .map_err(|err| service_error(err, "failed to count likes"))?;

    Ok(Json(LikeResponse {
        liked,
        changed,
        likes_count,
    }))
}

pub async fn like_post(
    Path(post_id): Path<i64>,
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<LikeResponse>, AppError> {
    let changed = EngagementService::new(state.db.clone())
        .like_post(auth.user_id, post_id)
        .await
        .map_err(|err| service_error(err, "failed to like post"))?;

    like_response(&state, auth.user_id, post_id, changed).await
}

pub async fn unlike_post(
    Path(post_id): Path<i64>,
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<LikeResponse>, AppError> {
    let changed = EngagementService::new(state.db.clone())
        .unlike_post(auth.user_id, post_id)
        .await
        .map_err(|err| service_error(err, "failed to unlike post"))?;

    like_response(&state, auth.user_id, post_id, changed).await
}

// Follows

#[derive(Serialize)]
pub struct FollowResponse {
    pub following: bool,
    pub changed: bool,
    #[serde(with = "time::serde::rfc3339::option")]
    pub following_since: Option<OffsetDateTime>,
}

async fn resolve_author(state: &AppState, username: &str) -> Result<User, AppError> {
    UserService::new(state.db.clone())
        .get_by_username(username)
        .await
        .map_err(|err| service_error(err, "failed to fetch user"))?
        .ok_or_else(|| AppError::not_found("user not found"))
}

async fn follow_response(
    state: &AppState,
    follower_id: i64,
    author_id: i64,
    changed: bool,
) -> Result<Json<FollowResponse>, AppError> {
    let follow = SocialService::new(state.db.clone())
        .get_follow(follower_id, author_id)
        .await
        .map_err(|err| service_error(err, "failed to fetch follow"))?;

    Ok(Json(FollowResponse {
        following: follow.is_some(),
        changed,
        following_since: follow.map(|follow| follow.created_at),
    }))
}

pub async fn profile_follow(
    Path(username): Path<String>,
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<FollowResponse>, AppError> {
    let author = resolve_author(&state, &username).await?;
    let changed = SocialService::new(state.db.clone())
        .follow(auth.user_id, author.id)
        .await
        .map_err(|err| service_error(err, "failed to follow user"))?;

    follow_response(&state, auth.user_id, author.id, changed).await
}

pub async fn profile_unfollow(
    Path(username): Path<String>,
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<FollowResponse>, AppError> {
    let author = resolve_author(&state, &username).await?;
    let changed = SocialService::new(state.db.clone())
        .unfollow(auth.user_id, author.id)
        .await
        .map_err(|err| service_error(err, "failed to unfollow user"))?;

    follow_response(&state, auth.user_id, author.id, changed).await
}

// Accounts

pub async fn signup(
    State(state): State<AppState>,
    Json(payload): Json<Signup>,
) -> Result<(StatusCode, Json<User>), AppError> {
    let user = auth_service(&state)
        .signup(payload)
        .await
        .map_err(|err| service_error(err, "failed to create user"))?;

    tracing::info!(user_id = user.id, "user signed up");
    Ok((StatusCode::CREATED, Json(user)))
}

#[derive(Deserialize)]
pub struct LoginRequest {
    /// Username or e-mail.
    pub username: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct AuthTokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(with = "time::serde::rfc3339")]
    pub access_expires_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub refresh_expires_at: OffsetDateTime,
}

impl From<crate::app::auth::TokenPair> for AuthTokenResponse {
    fn from(tokens: crate::app::auth::TokenPair) -> Self {
        Self {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            access_expires_at: tokens.access_expires_at,
            refresh_expires_at: tokens.refresh_expires_at,
        }
    }
}

pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<AuthTokenResponse>, AppError> {
    const MAX_PASSWORD_LEN: usize = 128;

    if payload.username.trim().is_empty() || payload.password.trim().is_empty() {
        return Err(AppError::bad_request("username and password are required"));
    }
    if payload.password.len() > MAX_PASSWORD_LEN {
        return Err(AppError::bad_request("password must be at most 128 characters"));
    }

    let tokens = auth_service(&state)
        .login(payload.username.trim(), &payload.password)
        .await
        .map_err(|err| service_error(err, "failed to login"))?;

    match tokens {
        Some(tokens) => Ok(Json(tokens.into())),
        None => Err(AppError::unauthorized("invalid credentials")),
    }
}

#[derive(Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

pub async fn refresh_token(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> Result<Json<AuthTokenResponse>, AppError> {
    if payload.refresh_token.trim().is_empty() {
        return Err(AppError::bad_request("refresh_token is required"));
    }

    let tokens = auth_service(&state)
        .refresh(&payload.refresh_token)
        .await
        .map_err(|err| service_error(err, "failed to refresh token"))?;

    match tokens {
        Some(tokens) => Ok(Json(tokens.into())),
        None => Err(AppError::unauthorized("invalid refresh token")),
    }
}

pub async fn logout(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> Result<StatusCode, AppError> {
    if payload.refresh_token.trim().is_empty() {
        return Err(AppError::bad_request("refresh_token is required"));
    }

    let revoked = auth_service(&state)
        .revoke_refresh_token(&payload.refresh_token)
        .await
        .map_err(|err| service_error(err, "failed to revoke token"))?;

    tracing::debug!(revoked, "logout");
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
pub struct PasswordChangeRequest {
    pub old_password: String,
    pub new_password: String,
}

pub async fn password_change(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<PasswordChangeRequest>,
) -> Result<StatusCode, AppError> {
    let changed = auth_service(&state)
        .change_password(auth.user_id, &payload.old_password, &payload.new_password)
        .await
        .map_err(|err| service_error(err, "failed to change password"))?;

    if !changed {
        let mut fields = FieldErrors::new();
        fields.add(
            "old_password",
            "Your old password was entered incorrectly. Please enter it again.",
        );
        return Err(AppError::validation(fields));
    }

    tracing::info!(user_id = auth.user_id, "password changed");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_current_user(
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<User>, AppError> {
    let user = auth_service(&state)
        .get_current_user(auth.user_id)
        .await
        .map_err(|err| service_error(err, "failed to fetch current user"))?;

    match user {
        Some(user) => Ok(Json(user)),
        None => Err(AppError::not_found("user not found")),
    }
}

pub async fn update_profile(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<ProfileUpdate>,
) -> Result<Json<User>, AppError> {
    let user = UserService::new(state.db.clone())
        .update_profile(auth.user_id, payload)
        .await
        .map_err(|err| service_error(err, "failed to update profile"))?;

    match user {
        Some(user) => Ok(Json(user)),
        None => Err(AppError::not_found("user not found")),
    }
}

#[derive(Serialize)]
pub struct InfoResponse {
    pub user: User,
    pub activity: ActivitySummary,
}

pub async fn account_info(
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<InfoResponse>, AppError> {
    let service = UserService::new(state.db.clone());
    let user = service
        .get_user(auth.user_id)
        .await
        .map_err(|err| service_error(err, "failed to fetch current user"))?
        .ok_or_else(|| AppError::not_found("user not found"))?;
    let activity = service
        .activity_summary(auth.user_id)
        .await
        .map_err(|err| service_error(err, "failed to summarize activity"))?;

    Ok(Json(InfoResponse { user, activity }))
}

pub async fn account_likes(
    auth: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Page<Post>>, AppError> {
    let page = query.number()?;
    let posts = ListingService::new(state.db.clone())
        .list_liked_by(auth.user_id, page)
        .await
        .map_err(|err| service_error(err, "failed to list liked posts"))?;

    Ok(Json(posts))
}

pub async fn account_comments(
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<Comment>>, AppError> {
    let comments = EngagementService::new(state.db.clone())
        .list_comments_by_author(auth.user_id)
        .await
        .map_err(|err| service_error(err, "failed to list comments"))?;

    Ok(Json(comments))
}

// Administration

#[derive(Deserialize)]
pub struct CreateGroupRequest {
    pub title: String,
    pub slug: String,
    pub description: Option<String>,
}

pub async fn create_group(
    _admin: AdminToken,
    State(state): State<AppState>,
    Json(payload): Json<CreateGroupRequest>,
) -> Result<(StatusCode, Json<Group>), AppError> {
    let group = GroupService::new(state.db.clone())
        .create_group(payload.title, payload.slug, payload.description)
        .await
        .map_err(|err| service_error(err, "failed to create group"))?;

    tracing::info!(group_id = group.id, slug = %group.slug, "group created");
    Ok((StatusCode::CREATED, Json(group)))
}

#[derive(Serialize)]
pub struct CacheClearResponse {
    pub cleared: u64,
}

pub async fn clear_page_cache(
    _admin: AdminToken,
    State(state): State<AppState>,
) -> Result<Json<CacheClearResponse>, AppError> {
    let cleared = state
        .page_cache
        .clear()
        .await
        .map_err(|err| service_error(err, "failed to clear page cache"))?;

    tracing::info!(cleared, "page cache cleared");
    Ok(Json(CacheClearResponse { cleared }))
}

pub async fn not_found() -> AppError {
    AppError::not_found("not found")
}

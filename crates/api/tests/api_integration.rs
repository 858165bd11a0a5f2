//! API integration tests.
//!
//! These exercise the HTTP surface against a mock database: routing,
//! extractors, status mapping, and response envelopes.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;

use agora_api::{middleware::AppState, router};
use agora_common::LocalStorage;
use agora_core::{
    CommentService, CommunityService, FeedService, MediaService, MembershipService, PostService,
    VoteService,
};
use agora_db::repositories::{
    CommentRepository, CommunityRepository, MembershipRepository, PostRepository,
    PostVoteRepository,
};
use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use chrono::Utc;
use maplit::btreemap;
use sea_orm::{DatabaseBackend, DatabaseConnection, MockDatabase, Value};
use tower::ServiceExt;

fn build_app(db: DatabaseConnection) -> Router {
    let db = Arc::new(db);

    let community_repo = CommunityRepository::new(Arc::clone(&db));
    let membership_repo = MembershipRepository::new(Arc::clone(&db));
    let post_repo = PostRepository::new(Arc::clone(&db));
    let comment_repo = CommentRepository::new(Arc::clone(&db));
    let vote_repo = PostVoteRepository::new(Arc::clone(&db));

    let membership_service = MembershipService::new(membership_repo.clone(), post_repo.clone());
    let community_service = CommunityService::new(community_repo.clone(), membership_repo);
    let post_service = PostService::new(post_repo.clone(), membership_service.clone());
    let comment_service = CommentService::new(
        comment_repo,
        post_repo.clone(),
        membership_service.clone(),
    );
    let vote_service = VoteService::new(vote_repo, post_repo.clone());
    let feed_service = FeedService::new(post_repo, community_repo);
    let media_service = MediaService::new(Arc::new(LocalStorage::new(
        std::env::temp_dir().join("agora-api-test"),
        "/media".to_string(),
    )));

    router(AppState {
        community_service,
        membership_service,
        post_service,
        comment_service,
        vote_service,
        feed_service,
        media_service,
        page_size: 10,
    })
}

fn community_row(slug: &str) -> std::collections::BTreeMap<&'static str, Value> {
    btreemap! {
        "id" => Value::from("c1"),
        "slug" => Value::from(slug.to_string()),
        "name" => Value::from("Rustaceans"),
        "description" => Value::from("All things Rust"),
        "visibility" => Value::from("public"),
        "icon_url" => Value::from(None::<String>),
        "banner_url" => Value::from(None::<String>),
        "created_by" => Value::from("u1"),
        "created_at" => Value::from(sea_orm::prelude::DateTimeWithTimeZone::from(Utc::now())),
        "updated_at" => Value::from(None::<sea_orm::prelude::DateTimeWithTimeZone>),
    }
}

fn annotated_community_row(slug: &str) -> std::collections::BTreeMap<&'static str, Value> {
    let mut row = community_row(slug);
    row.insert("members_count", Value::from(2i64));
    row.insert("posts_count", Value::from(5i64));
    row
}

fn membership_row(role: &str) -> std::collections::BTreeMap<&'static str, Value> {
    btreemap! {
        "id" => Value::from("m1"),
        "community_id" => Value::from("c1"),
        "user_id" => Value::from("u1"),
        "role" => Value::from(role.to_string()),
        "created_at" => Value::from(sea_orm::prelude::DateTimeWithTimeZone::from(Utc::now())),
        "updated_at" => Value::from(None::<sea_orm::prelude::DateTimeWithTimeZone>),
    }
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_list_communities_anonymous() {
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([vec![btreemap! { "num_items" => Value::from(1i64) }]])
        .append_query_results([vec![annotated_community_row("rustaceans")]])
        .into_connection();

    let response = build_app(db)
        .oneshot(
            Request::builder()
                .uri("/api/communities")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["count"], 1);
    assert!(json["next"].is_null());
    assert_eq!(json["results"][0]["slug"], "rustaceans");
    assert_eq!(json["results"][0]["membersCount"], 2);
}

#[tokio::test]
async fn test_create_community_requires_auth() {
    let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();

    let response = build_app(db)
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/communities")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"name":"Rustaceans"}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_get_missing_post_is_404() {
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([Vec::<std::collections::BTreeMap<&str, Value>>::new()])
        .into_connection();

    let response = build_app(db)
        .oneshot(
            Request::builder()
                .uri("/api/posts/nonexistent")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let json = body_json(response).await;
    assert_eq!(json["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_vote_value_out_of_range_is_400() {
    let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();

    let response = build_app(db)
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/posts/p1/vote")
                .header("x-forwarded-user", "u1")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"value":2}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let json = body_json(response).await;
    assert_eq!(json["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_join_with_pending_request_reports_pending() {
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([vec![community_row("rustaceans")]])
        .append_query_results([vec![membership_row("pending")]])
        .into_connection();

    let response = build_app(db)
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/communities/rustaceans/join")
                .header("x-forwarded-user", "u1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["detail"], "request already pending");
}

#[tokio::test]
async fn test_join_as_member_is_conflict() {
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([vec![community_row("rustaceans")]])
        .append_query_results([vec![membership_row("member")]])
        .into_connection();

    let response = build_app(db)
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/communities/rustaceans/join")
                .header("x-forwarded-user", "u1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_member_listing_requires_moderator() {
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([vec![community_row("rustaceans")]])
        .append_query_results([vec![membership_row("member")]])
        .into_connection();

    let response = build_app(db)
        .oneshot(
            Request::builder()
                .uri("/api/communities/rustaceans/members")
                .header("x-forwarded-user", "u1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_leave_as_last_owner_is_conflict() {
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([vec![community_row("rustaceans")]])
        .append_query_results([vec![membership_row("owner")]])
        .append_query_results([vec![membership_row("owner")]])
        .into_connection();

    let response = build_app(db)
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/communities/rustaceans/leave")
                .header("x-forwarded-user", "u1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);

    let json = body_json(response).await;
    assert_eq!(json["error"]["code"], "LAST_OWNER_PROTECTED");
}

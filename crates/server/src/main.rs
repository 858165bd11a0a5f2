//! Agora server entry point.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use agora_api::{middleware::AppState, router as api_router};
use agora_common::{Config, LocalStorage};
use agora_core::{
    CommentService, CommunityService, FeedService, MediaService, MembershipService, PostService,
    VoteService,
};
use agora_db::repositories::{
    CommentRepository, CommunityRepository, MembershipRepository, PostRepository,
    PostVoteRepository,
};
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Waits for a shutdown signal (SIGINT or SIGTERM).
///
/// On Unix systems, this listens for both SIGINT (Ctrl+C) and SIGTERM.
/// On Windows, this only listens for Ctrl+C.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received SIGINT, initiating graceful shutdown...");
        },
        () = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown...");
        },
    }
}

#[tokio::main]
#[allow(clippy::expect_used)]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "agora=debug,tower_http=debug".into()),
        )
        .init();

    info!("Starting agora server...");

    // Load configuration
    let config = Config::load()?;

    // Connect to database
    let db = agora_db::init(&config).await?;
    info!("Connected to database");

    // Run migrations
    info!("Running database migrations...");
    agora_db::migrate(&db).await?;
    info!("Migrations completed");

    // Initialize repositories
    let db = Arc::new(db);
    let community_repo = CommunityRepository::new(Arc::clone(&db));
    let membership_repo = MembershipRepository::new(Arc::clone(&db));
    let post_repo = PostRepository::new(Arc::clone(&db));
    let comment_repo = CommentRepository::new(Arc::clone(&db));
    let vote_repo = PostVoteRepository::new(Arc::clone(&db));

    // Initialize services
    let storage = Arc::new(LocalStorage::new(
        PathBuf::from(&config.storage.base_path),
        config.storage.base_url.clone(),
    ));

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
    let media_service = MediaService::new(storage);

    let state = AppState {
        community_service,
        membership_service,
        post_service,
        comment_service,
        vote_service,
        feed_service,
        media_service,
        page_size: config.server.page_size,
    };

    let app = api_router(state)
        .nest_service(
            config.storage.base_url.trim_end_matches('/'),
            ServeDir::new(&config.storage.base_path),
        )
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );

    // Start server with graceful shutdown
    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

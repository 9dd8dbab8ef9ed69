//! SkillForge Backend
//!
//! REST backend for a job-matching platform: candidate profiles, HR job postings,
//! embedding-based matching, applications, and an external job feed. SQLite holds
//! the data and Tantivy serves full-text job search.

mod api;
mod auth;
mod config;
mod db;
mod errors;
mod jobfeed;
mod mail;
mod matching;
mod models;
mod search;

use std::sync::Arc;

use axum::{
    http::HeaderValue,
    routing::{get, post, put},
    Json, Router,
};
use serde_json::{json, Value};
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use auth::TokenService;
use config::{Config, DEFAULT_SECRET_KEY};
use db::Repository;
use jobfeed::JobFeed;
use mail::Mailer;
use matching::MatchingEngine;
use search::SearchIndex;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<Repository>,
    pub search: Arc<SearchIndex>,
    pub engine: Arc<MatchingEngine>,
    pub tokens: Arc<TokenService>,
    pub mailer: Arc<dyn Mailer>,
    pub job_feed: Arc<JobFeed>,
    pub config: Arc<Config>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env()?;

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting SkillForge Backend v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Database path: {:?}", config.db_path);
    tracing::info!("Index path: {:?}", config.index_path);
    tracing::info!("Upload directory: {:?}", config.upload_dir);
    tracing::info!("Bind address: {}", config.bind_addr);

    if config.secret_key == DEFAULT_SECRET_KEY {
        tracing::warn!("SKILLFORGE_SECRET_KEY is not set. Tokens are signed with an insecure default!");
    }
    if config.job_feed.api_key.is_none() {
        tracing::warn!("No RAPIDAPI_KEY configured. Job fetching is disabled!");
    }

    let pool = db::init_database(&config.db_path).await?;
    let repo = Arc::new(Repository::new(pool));

    let search = Arc::new(SearchIndex::open(&config.index_path)?);
    tracing::info!("Building search index...");
    let jobs = repo.list_jobs(None).await?;
    search.rebuild(&jobs).await?;

    let engine = Arc::new(MatchingEngine::default());
    if let Err(e) = engine.embed_missing_jobs(&repo, None).await {
        tracing::warn!("Failed to precompute job embeddings: {}", e);
    }

    tokio::fs::create_dir_all(config.upload_dir.join(api::PROFILE_PICTURE_DIR)).await?;

    let http = reqwest::Client::new();
    let state = AppState {
        repo,
        search,
        engine,
        tokens: Arc::new(TokenService::new(
            &config.secret_key,
            config.token_expire_minutes,
        )),
        mailer: Arc::from(mail::from_config(&config.mail)),
        job_feed: Arc::new(JobFeed::new(http, config.job_feed.clone())),
        config: Arc::new(config.clone()),
    };

    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);

    if allowed_origins.iter().any(|o| o == "*") {
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(origins))
}

/// Create the application router with all routes.
pub fn create_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.allowed_origins);
    let uploads = ServeDir::new(&state.config.upload_dir);

    let auth_routes = Router::new()
        .route("/register/candidate", post(api::register_candidate))
        .route("/register/hr", post(api::register_hr))
        .route("/login", post(api::login))
        .route("/forgot-password", post(api::forgot_password))
        .route("/verify-reset-code", post(api::verify_reset_code))
        .route("/reset-password", post(api::reset_password))
        .route("/logout", post(api::logout));

    let candidate_routes = Router::new()
        .route(
            "/me",
            get(api::get_my_profile).put(api::update_my_profile),
        )
        .route("/me/profile-picture", post(api::upload_candidate_picture))
        .route("/me/skills", post(api::add_skill))
        .route(
            "/me/skills/{name}",
            put(api::update_skill).delete(api::delete_skill),
        )
        .route("/me/portfolio", post(api::add_portfolio_item))
        .route(
            "/me/portfolio/{title}",
            put(api::update_portfolio_item).delete(api::delete_portfolio_item),
        )
        .route("/me/education", post(api::add_education))
        .route(
            "/me/education/{degree}",
            put(api::update_education).delete(api::delete_education),
        )
        .route("/me/experience", post(api::add_experience))
        .route(
            "/me/experience/{role}",
            put(api::update_experience).delete(api::delete_experience),
        );

    let hr_routes = Router::new()
        .route(
            "/me",
            get(api::get_hr_profile).put(api::update_hr_profile),
        )
        .route("/me/hr", put(api::update_hr_profile))
        .route("/me/profile-picture", post(api::upload_hr_picture))
        .route("/jobs", post(api::create_job).get(api::list_my_jobs))
        .route(
            "/jobs/{id}",
            get(api::get_my_job)
                .put(api::update_my_job)
                .delete(api::delete_my_job),
        )
        .route("/candidates/search", get(api::search_candidates));

    let matching_routes = Router::new()
        .route("/jobs/recommended", get(api::recommended_jobs))
        .route(
            "/candidates/recommended/{job_id}",
            get(api::recommended_candidates),
        )
        .route("/skill-gap/{job_id}", get(api::skill_gap))
        .route("/calculate-score", post(api::calculate_score));

    let application_routes = Router::new()
        .route("/apply/{job_id}", post(api::apply_to_job))
        .route("/my-applications", get(api::my_applications))
        .route("/job/{job_id}/applications", get(api::job_applications))
        .route(
            "/applications/{application_id}/status",
            put(api::update_application_status),
        );

    let job_routes = Router::new()
        .route("/fetch", get(api::fetch_jobs))
        .route("/search", get(api::search_jobs));

    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .nest("/auth", auth_routes)
        .nest("/candidates", candidate_routes)
        .nest("/hr", hr_routes)
        .nest("/matching", matching_routes)
        .nest("/applications", application_routes)
        .nest("/jobs", job_routes)
        .nest_service("/uploads", uploads)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

/// Welcome banner.
async fn root() -> Json<Value> {
    Json(json!({
        "message": "Welcome to SkillForge API",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Health check endpoint.
async fn health_check() -> Json<Value> {
    Json(json!({ "status": "healthy" }))
}

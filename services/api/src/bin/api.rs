//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{DbAdapter, OpenAiCourseAdapter, YoutubeSearchAdapter},
    config::Config,
    error::ApiError,
    web::{
        auth::{
            initial_quiz_handler, leaderboard_handler, login_handler, logout_handler, me_handler,
            register_handler,
        },
        require_auth,
        rest::{
            complete_chapter_handler, course_content_handler, course_flashcards_handler,
            course_qa_handler, course_quiz_handler, create_course_handler,
            enroll_handler, enrolled_courses_handler, list_flashcards_handler, list_qas_handler,
            list_quizzes_handler, recommended_courses_handler, submit_quiz_handler,
        },
        state::AppState,
        ApiDoc,
    },
};
use async_openai::{config::OpenAIConfig, Client};
use axum::http::{
    header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
    HeaderValue, Method,
};
use axum::{
    middleware as axum_middleware,
    routing::{get, post, put},
    Router,
};
use learnpath_core::ProgressionService;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Connect to Database & Run Migrations ---
    info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(5)
        .acquire_timeout(Duration::from_secs(5))
        .connect(&config.database_url)
        .await?;
    let db_adapter = Arc::new(DbAdapter::new(db_pool));
    info!("Running database migrations...");
    db_adapter.run_migrations().await?;
    info!("Database migrations complete.");

    // --- 3. Initialize Collaborator Adapters ---
    let mut openai_config = OpenAIConfig::new();
    match config.generation_api_key.as_ref() {
        Some(key) => openai_config = openai_config.with_api_key(key),
        None => warn!("GENERATION_API_KEY is not set; course generation requests will fail"),
    }
    if let Some(base) = config.generation_api_base.as_ref() {
        openai_config = openai_config.with_api_base(base);
    }
    let course_adapter = Arc::new(OpenAiCourseAdapter::new(
        Client::with_config(openai_config),
        config.course_model.clone(),
    ));
    let video_adapter = Arc::new(YoutubeSearchAdapter::new(config.youtube_api_key.clone()));

    // --- 4. Build the Progression Service & Shared AppState ---
    let mut progression = ProgressionService::new(db_adapter.clone(), course_adapter, video_adapter);
    if let Some(seed) = config.rng_seed {
        info!("Using fixed RNG seed {}", seed);
        progression = progression.with_seed(seed);
    }

    let app_state = Arc::new(AppState {
        progression: Arc::new(progression),
        db: db_adapter,
        config: config.clone(),
    });

    let allowed_origin = config.allowed_origin.parse::<HeaderValue>().map_err(|e| {
        ApiError::Internal(format!("Invalid ALLOWED_ORIGIN '{}': {}", config.allowed_origin, e))
    })?;
    let cors = CorsLayer::new()
        .allow_origin(allowed_origin)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, ACCEPT]);

    // --- 5. Create the Web Router ---
    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/auth/register", post(register_handler))
        .route("/auth/login", post(login_handler))
        .route("/auth/logout", post(logout_handler));

    // Protected routes (auth required)
    let protected_routes = Router::new()
        .route("/auth/me", get(me_handler))
        .route("/auth/initial-quiz", post(initial_quiz_handler))
        .route("/auth/leaderboard", get(leaderboard_handler))
        .route("/courses", post(create_course_handler))
        .route("/courses/enroll", post(enroll_handler))
        .route("/courses/enrolled", get(enrolled_courses_handler))
        .route("/courses/recommended", get(recommended_courses_handler))
        .route("/courses/complete-chapter", put(complete_chapter_handler))
        .route("/courses/quizzes", get(list_quizzes_handler))
        .route("/courses/quiz-submit", post(submit_quiz_handler))
        .route("/courses/qas", get(list_qas_handler))
        .route("/courses/flashcards", get(list_flashcards_handler))
        .route("/courses/{id}/content", get(course_content_handler))
        .route("/courses/{id}/quiz", get(course_quiz_handler))
        .route("/courses/{id}/qa", get(course_qa_handler))
        .route("/courses/{id}/flashcards", get(course_flashcards_handler))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            require_auth,
        ));

    // Combine API routes
    let api_router = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(cors)
        .with_state(app_state);

    // Merge the API router with the Swagger UI router for a complete application.
    let app = Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 6. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

//! services/api/src/web/auth.rs
//!
//! Authentication endpoints for learner registration, login and logout, plus
//! the learner-level reads and the initial assessment.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Extension, Json,
};
use chrono::{Duration, Utc};
use learnpath_core::domain::{AuthSession, Learner, QuizBankItem};
use learnpath_core::ports::PortError;
use learnpath_core::service::NewLearner;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::web::middleware::{session_id_from_headers, SESSION_COOKIE};
use crate::web::rest::reject;
use crate::web::state::AppState;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    /// Subject areas the learner wants recommendations for.
    pub domains: Vec<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize, ToSchema)]
pub struct InitialQuizRequest {
    pub quiz_marks: i32,
}

#[derive(Serialize, ToSchema)]
pub struct LearnerResponse {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub domains: Vec<String>,
    pub quiz_marks: i32,
    /// The pending initial assessment; empty once attempted.
    #[schema(value_type = Vec<Object>)]
    pub quiz: Vec<QuizBankItem>,
    pub tokens: i64,
    pub streak: u32,
}

impl From<Learner> for LearnerResponse {
    fn from(learner: Learner) -> Self {
        Self {
            id: learner.id,
            tokens: learner.tokens.balance(),
            name: learner.name,
            email: learner.email,
            domains: learner.domains,
            quiz_marks: learner.quiz_marks,
            quiz: learner.quiz,
            streak: learner.streak,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct AuthResponse {
    pub learner_id: Uuid,
    pub email: String,
}

#[derive(Serialize, ToSchema)]
pub struct InitialQuizResponse {
    pub message: String,
    pub tokens: i64,
}

#[derive(Serialize, ToSchema)]
pub struct LeaderboardRow {
    pub learner_id: Uuid,
    pub name: String,
    pub email: String,
    pub tokens: i64,
}

#[derive(Serialize, ToSchema)]
pub struct LeaderboardResponse {
    pub users: Vec<LeaderboardRow>,
}

//=========================================================================================
// Session Helpers
//=========================================================================================

fn session_cookie(auth_session_id: &str, ttl: Duration) -> String {
    format!(
        "{}={}; HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age={}",
        SESSION_COOKIE,
        auth_session_id,
        ttl.num_seconds()
    )
}

/// Stores a new auth session for the learner and returns its cookie.
async fn start_session(state: &AppState, learner_id: Uuid) -> Result<String, (StatusCode, String)> {
    let ttl = Duration::days(state.config.session_ttl_days);
    let session = AuthSession {
        id: Uuid::new_v4().to_string(),
        learner_id,
        expires_at: Utc::now() + ttl,
    };

    state.db.create_auth_session(&session).await.map_err(|e| {
        error!("Failed to create auth session: {:?}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, "Failed to create session".to_string())
    })?;

    Ok(session_cookie(&session.id, ttl))
}

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /auth/register - Create a new learner account
#[utoipa::path(
    post,
    path = "/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Learner created and logged in", body = LearnerResponse),
        (status = 400, description = "Missing fields or domains"),
        (status = 409, description = "Email already registered"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn register_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    if req.password.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "All fields are required".to_string()));
    }

    // 1. Hash the password
    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(req.password.as_bytes(), &salt)
        .map_err(|e| {
            error!("Failed to hash password: {:?}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to hash password".to_string())
        })?
        .to_string();

    // 2. Create the learner with the starting grant and assessment
    let learner = state
        .progression
        .register(NewLearner {
            name: req.name,
            email: req.email,
            hashed_password: password_hash,
            domains: req.domains,
        })
        .await
        .map_err(|e| reject("register", e))?;

    // 3. Log the new learner in
    let cookie = start_session(&state, learner.id).await?;

    Ok((
        StatusCode::CREATED,
        [(header::SET_COOKIE, cookie)],
        Json(LearnerResponse::from(learner)),
    ))
}

/// POST /auth/login - Login with existing account
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 401, description = "Invalid credentials"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let invalid = || (StatusCode::UNAUTHORIZED, "Invalid email or password".to_string());

    // 1. Get learner by email
    let email = req.email.trim().to_lowercase();
    let creds = match state.db.get_credentials_by_email(&email).await {
        Ok(creds) => creds,
        Err(PortError::NotFound(_)) => return Err(invalid()),
        Err(e) => {
            error!("Failed to get learner: {:?}", e);
            return Err((StatusCode::INTERNAL_SERVER_ERROR, "Authentication error".to_string()));
        }
    };

    // 2. Verify password
    let parsed_hash = PasswordHash::new(&creds.hashed_password).map_err(|e| {
        error!("Failed to parse password hash: {:?}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, "Authentication error".to_string())
    })?;
    if Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .is_err()
    {
        return Err(invalid());
    }

    // 3. Start a session
    let cookie = start_session(&state, creds.learner_id).await?;
    info!("Learner {} logged in", creds.learner_id);

    Ok((
        StatusCode::OK,
        [(header::SET_COOKIE, cookie)],
        Json(AuthResponse {
            learner_id: creds.learner_id,
            email: creds.email,
        }),
    ))
}

/// POST /auth/logout - Logout and invalidate session
#[utoipa::path(
    post,
    path = "/auth/logout",
    responses(
        (status = 200, description = "Logout successful"),
        (status = 401, description = "No active session")
    )
)]
pub async fn logout_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let auth_session_id = session_id_from_headers(&headers)
        .ok_or((StatusCode::UNAUTHORIZED, "No session found".to_string()))?;

    state
        .db
        .delete_auth_session(auth_session_id)
        .await
        .map_err(|e| {
            error!("Failed to delete auth session: {:?}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to logout".to_string())
        })?;

    Ok((
        StatusCode::OK,
        [(header::SET_COOKIE, session_cookie("", Duration::zero()))],
    ))
}

/// GET /auth/me - The logged-in learner
#[utoipa::path(
    get,
    path = "/auth/me",
    responses(
        (status = 200, description = "The current learner", body = LearnerResponse),
        (status = 401, description = "Not logged in")
    )
)]
pub async fn me_handler(
    State(state): State<Arc<AppState>>,
    Extension(learner_id): Extension<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let learner = state
        .progression
        .learner(learner_id)
        .await
        .map_err(|e| reject("load the learner", e))?;
    Ok(Json(LearnerResponse::from(learner)))
}

/// POST /auth/initial-quiz - Record the initial assessment score
#[utoipa::path(
    post,
    path = "/auth/initial-quiz",
    request_body = InitialQuizRequest,
    responses(
        (status = 200, description = "Score recorded and paid out", body = InitialQuizResponse),
        (status = 400, description = "Marks out of range")
    )
)]
pub async fn initial_quiz_handler(
    State(state): State<Arc<AppState>>,
    Extension(learner_id): Extension<Uuid>,
    Json(req): Json<InitialQuizRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let learner = state
        .progression
        .attempt_initial_assessment(learner_id, req.quiz_marks)
        .await
        .map_err(|e| reject("record the initial quiz", e))?;

    Ok(Json(InitialQuizResponse {
        message: "Quiz attempted successfully".to_string(),
        tokens: learner.tokens.balance(),
    }))
}

/// GET /auth/leaderboard - Learners by token balance
#[utoipa::path(
    get,
    path = "/auth/leaderboard",
    responses((status = 200, description = "Learners, richest first", body = LeaderboardResponse))
)]
pub async fn leaderboard_handler(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let users = state
        .progression
        .leaderboard()
        .await
        .map_err(|e| reject("load the leaderboard", e))?
        .into_iter()
        .map(|entry| LeaderboardRow {
            learner_id: entry.learner_id,
            name: entry.name,
            email: entry.email,
            tokens: entry.tokens,
        })
        .collect();
    Ok(Json(LeaderboardResponse { users }))
}

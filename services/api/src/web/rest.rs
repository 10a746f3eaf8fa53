//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the course endpoints and the master
//! definition for the OpenAPI specification.

use crate::web::auth;
use crate::web::state::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use chrono::{DateTime, Utc};
use learnpath_core::domain::{
    Chapter, CourseListing, CourseRecord, Flashcard, QaItem, QuizQuestion, QuizResultEntry, Video,
};
use learnpath_core::recommend::MISCELLANEOUS;
use learnpath_core::service::{CreateCourseOutcome, EnrollOutcome};
use learnpath_core::ProgressError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, warn};
use utoipa::{OpenApi, ToSchema};
use uuid::Uuid;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        auth::register_handler,
        auth::login_handler,
        auth::logout_handler,
        auth::me_handler,
        auth::initial_quiz_handler,
        auth::leaderboard_handler,
        create_course_handler,
        enroll_handler,
        enrolled_courses_handler,
        recommended_courses_handler,
        course_content_handler,
        complete_chapter_handler,
        list_quizzes_handler,
        course_quiz_handler,
        submit_quiz_handler,
        list_qas_handler,
        course_qa_handler,
        list_flashcards_handler,
        course_flashcards_handler,
    ),
    components(
        schemas(
            auth::RegisterRequest,
            auth::LoginRequest,
            auth::InitialQuizRequest,
            auth::LearnerResponse,
            auth::AuthResponse,
            auth::InitialQuizResponse,
            auth::LeaderboardResponse,
            auth::LeaderboardRow,
            CreateCourseRequest,
            CreateCourseResponse,
            EnrollRequest,
            EnrollResponse,
            CourseSummary,
            CourseListResponse,
            DomainCourses,
            RecommendedResponse,
            CourseDetail,
            CourseContentResponse,
            CompleteChapterRequest,
            CompleteChapterResponse,
            QuizListItem,
            QuizListResponse,
            QuizContentResponse,
            SubmitQuizRequest,
            SubmitQuizResponse,
            QaListItem,
            QaListResponse,
            QaContentResponse,
            FlashcardListItem,
            FlashcardListResponse,
            FlashcardContentResponse,
        )
    ),
    tags(
        (name = "LearnPath API", description = "Course generation, enrollment and progression for learners.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// Error Mapping
//=========================================================================================

/// The HTTP status a failed learner action is reported with.
pub fn status_for(e: &ProgressError) -> StatusCode {
    match e {
        ProgressError::InsufficientBalance(_) => StatusCode::FORBIDDEN,
        ProgressError::RecordNotFound(_) => StatusCode::NOT_FOUND,
        ProgressError::Unauthorized(_) => StatusCode::FORBIDDEN,
        ProgressError::MalformedUpstreamContent(_) => StatusCode::BAD_GATEWAY,
        ProgressError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        ProgressError::Conflict(_) => StatusCode::CONFLICT,
        ProgressError::Upstream(_) => StatusCode::BAD_GATEWAY,
        ProgressError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Logs a failed action and turns it into the handler's error response.
pub(crate) fn reject(action: &str, e: ProgressError) -> (StatusCode, String) {
    let status = status_for(&e);
    if status.is_server_error() {
        error!("Failed to {}: {:?}", action, e);
    } else {
        warn!("Rejected {}: {}", action, e);
    }
    let message = match e {
        ProgressError::Storage(_) => "Internal server error".to_string(),
        ProgressError::InsufficientBalance(ref shortfall) => format!(
            "You don't have enough tokens to {action}: {} required, {} available",
            shortfall.required, shortfall.available
        ),
        other => other.to_string(),
    };
    (status, message)
}

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct CreateCourseRequest {
    pub topic: String,
}

#[derive(Serialize, ToSchema)]
pub struct CreateCourseResponse {
    pub message: String,
    pub course_id: Uuid,
    pub tokens: i64,
    /// True when the learner already had a course with this title.
    pub already_owned: bool,
    /// False when an existing course was copied rather than generated.
    pub generated: bool,
}

#[derive(Deserialize, ToSchema)]
pub struct EnrollRequest {
    pub course_id: Uuid,
}

#[derive(Serialize, ToSchema)]
pub struct EnrollResponse {
    pub message: String,
    pub course_id: Uuid,
    pub tokens: i64,
    pub already_enrolled: bool,
}

/// A course as shown in lists and recommendations.
#[derive(Serialize, ToSchema)]
pub struct CourseSummary {
    pub id: Uuid,
    pub course_title: String,
    pub category: String,
    pub difficulty: String,
    pub banner_image: String,
    pub chapters_count: usize,
    pub completed_chapters_count: usize,
}

impl From<&CourseListing> for CourseSummary {
    fn from(course: &CourseListing) -> Self {
        Self {
            id: course.id,
            course_title: course.course_title.clone(),
            category: course.category.clone(),
            difficulty: course.difficulty.to_string(),
            banner_image: course.banner_image.clone(),
            chapters_count: course.chapters_count,
            completed_chapters_count: course.completed_chapters_count,
        }
    }
}

impl From<&CourseRecord> for CourseSummary {
    fn from(course: &CourseRecord) -> Self {
        Self::from(&CourseListing::from(course))
    }
}

#[derive(Serialize, ToSchema)]
pub struct CourseListResponse {
    pub courses: Vec<CourseSummary>,
}

#[derive(Serialize, ToSchema)]
pub struct DomainCourses {
    pub domain: String,
    pub courses: Vec<CourseSummary>,
}

#[derive(Serialize, ToSchema)]
pub struct RecommendedResponse {
    /// One group per learner domain, followed by the miscellaneous group.
    pub courses: Vec<DomainCourses>,
}

#[derive(Serialize, ToSchema)]
pub struct CourseDetail {
    pub id: Uuid,
    pub course_title: String,
    pub description: String,
    pub category: String,
    pub difficulty: String,
    pub banner_image: String,
    pub created_by: Option<Uuid>,
    #[schema(value_type = Vec<Object>)]
    pub chapters: Vec<Chapter>,
    pub completed_chapter: Vec<u32>,
    #[schema(value_type = Vec<Object>)]
    pub quiz_result: Vec<QuizResultEntry>,
    pub quiz_marks: i32,
    #[schema(value_type = Vec<Object>)]
    pub videos: Vec<Video>,
    pub created_at: DateTime<Utc>,
}

impl From<CourseRecord> for CourseDetail {
    fn from(course: CourseRecord) -> Self {
        Self {
            id: course.id,
            difficulty: course.difficulty.to_string(),
            course_title: course.course_title,
            description: course.description,
            category: course.category,
            banner_image: course.banner_image,
            created_by: course.created_by,
            chapters: course.chapters,
            completed_chapter: course.completed_chapter,
            quiz_result: course.quiz_result,
            quiz_marks: course.quiz_marks,
            videos: course.videos,
            created_at: course.created_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct CourseContentResponse {
    pub course: CourseDetail,
}

#[derive(Deserialize, ToSchema)]
pub struct CompleteChapterRequest {
    pub course_id: Uuid,
    /// Zero-based chapter index.
    pub chapter: u32,
}

#[derive(Serialize, ToSchema)]
pub struct CompleteChapterResponse {
    pub message: String,
    pub completed_chapter: Vec<u32>,
    pub streak: u32,
}

#[derive(Serialize, ToSchema)]
pub struct QuizListItem {
    pub id: Uuid,
    pub course_title: String,
    pub quizzes_count: usize,
    /// Correct answers in the stored best attempt.
    pub correct_count: usize,
}

#[derive(Serialize, ToSchema)]
pub struct QuizListResponse {
    pub quizzes: Vec<QuizListItem>,
}

#[derive(Serialize, ToSchema)]
pub struct QuizContentResponse {
    #[schema(value_type = Vec<Object>)]
    pub quiz: Vec<QuizQuestion>,
}

#[derive(Deserialize, ToSchema)]
pub struct SubmitQuizRequest {
    pub course_id: Uuid,
    #[schema(value_type = Vec<Object>)]
    pub quiz_result: Vec<QuizResultEntry>,
    pub marks: i32,
}

#[derive(Serialize, ToSchema)]
pub struct SubmitQuizResponse {
    pub message: String,
    pub tokens: i64,
    pub credited: i64,
    pub streak: u32,
    pub best_marks: i32,
}

#[derive(Serialize, ToSchema)]
pub struct QaListItem {
    pub id: Uuid,
    pub course_title: String,
    pub qa_count: usize,
}

#[derive(Serialize, ToSchema)]
pub struct QaListResponse {
    pub qas: Vec<QaListItem>,
}

#[derive(Serialize, ToSchema)]
pub struct QaContentResponse {
    #[schema(value_type = Vec<Object>)]
    pub qa: Vec<QaItem>,
}

#[derive(Serialize, ToSchema)]
pub struct FlashcardListItem {
    pub id: Uuid,
    pub course_title: String,
    pub flashcards_count: usize,
}

#[derive(Serialize, ToSchema)]
pub struct FlashcardListResponse {
    pub flashcards: Vec<FlashcardListItem>,
}

#[derive(Serialize, ToSchema)]
pub struct FlashcardContentResponse {
    #[schema(value_type = Vec<Object>)]
    pub flashcards: Vec<Flashcard>,
}

//=========================================================================================
// Course Creation and Enrollment
//=========================================================================================

/// Create a course on a topic, generating it if no course with that title exists.
#[utoipa::path(
    post,
    path = "/courses",
    request_body = CreateCourseRequest,
    responses(
        (status = 201, description = "Course created or copied", body = CreateCourseResponse),
        (status = 200, description = "The learner already has this course", body = CreateCourseResponse),
        (status = 400, description = "Missing topic"),
        (status = 403, description = "Not enough tokens"),
        (status = 502, description = "Generated content was unusable")
    )
)]
pub async fn create_course_handler(
    State(state): State<Arc<AppState>>,
    Extension(learner_id): Extension<Uuid>,
    Json(req): Json<CreateCourseRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let outcome = state
        .progression
        .create_course(learner_id, &req.topic)
        .await
        .map_err(|e| reject("create a course", e))?;

    let (status, response) = match outcome {
        CreateCourseOutcome::AlreadyOwned { course_id, tokens } => (
            StatusCode::OK,
            CreateCourseResponse {
                message: "Course already exists".to_string(),
                course_id,
                tokens,
                already_owned: true,
                generated: false,
            },
        ),
        CreateCourseOutcome::Created {
            course,
            tokens,
            generated,
        } => (
            StatusCode::CREATED,
            CreateCourseResponse {
                message: "Course created successfully".to_string(),
                course_id: course.id,
                tokens,
                already_owned: false,
                generated,
            },
        ),
    };
    Ok((status, Json(response)))
}

/// Enroll into an existing course, receiving a personal copy.
#[utoipa::path(
    post,
    path = "/courses/enroll",
    request_body = EnrollRequest,
    responses(
        (status = 201, description = "Enrolled", body = EnrollResponse),
        (status = 200, description = "Already enrolled", body = EnrollResponse),
        (status = 403, description = "Not enough tokens"),
        (status = 404, description = "Course not found")
    )
)]
pub async fn enroll_handler(
    State(state): State<Arc<AppState>>,
    Extension(learner_id): Extension<Uuid>,
    Json(req): Json<EnrollRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let outcome = state
        .progression
        .enroll(learner_id, req.course_id)
        .await
        .map_err(|e| reject("enroll to the course", e))?;

    let (status, response) = match outcome {
        EnrollOutcome::AlreadyEnrolled { course, tokens } => (
            StatusCode::OK,
            EnrollResponse {
                message: "Already enrolled to this course".to_string(),
                course_id: course.id,
                tokens,
                already_enrolled: true,
            },
        ),
        EnrollOutcome::Enrolled { course, tokens } => (
            StatusCode::CREATED,
            EnrollResponse {
                message: "Enrolled successfully".to_string(),
                course_id: course.id,
                tokens,
                already_enrolled: false,
            },
        ),
    };
    Ok((status, Json(response)))
}

//=========================================================================================
// Course Reads
//=========================================================================================

/// The learner's courses, least progressed first.
#[utoipa::path(
    get,
    path = "/courses/enrolled",
    responses((status = 200, description = "Enrolled courses", body = CourseListResponse))
)]
pub async fn enrolled_courses_handler(
    State(state): State<Arc<AppState>>,
    Extension(learner_id): Extension<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let courses = state
        .progression
        .enrolled_courses(learner_id)
        .await
        .map_err(|e| reject("list enrolled courses", e))?;

    Ok(Json(CourseListResponse {
        courses: courses.iter().map(CourseSummary::from).collect(),
    }))
}

#[utoipa::path(
    get,
    path = "/courses/recommended",
    responses((status = 200, description = "Recommendations per domain", body = RecommendedResponse))
)]
pub async fn recommended_courses_handler(
    State(state): State<Arc<AppState>>,
    Extension(learner_id): Extension<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let recommendations = state
        .progression
        .recommendations(learner_id)
        .await
        .map_err(|e| reject("recommend courses", e))?;

    let mut groups: Vec<DomainCourses> = recommendations
        .domains
        .into_iter()
        .map(|group| DomainCourses {
            domain: group.domain,
            courses: group.courses.iter().map(CourseSummary::from).collect(),
        })
        .collect();
    groups.push(DomainCourses {
        domain: MISCELLANEOUS.to_string(),
        courses: recommendations
            .miscellaneous
            .iter()
            .map(CourseSummary::from)
            .collect(),
    });

    Ok(Json(RecommendedResponse { courses: groups }))
}

#[utoipa::path(
    get,
    path = "/courses/{id}/content",
    params(("id" = Uuid, Path, description = "The course id")),
    responses(
        (status = 200, description = "Course content", body = CourseContentResponse),
        (status = 404, description = "Course not found")
    )
)]
pub async fn course_content_handler(
    State(state): State<Arc<AppState>>,
    Path(course_id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let course = state
        .progression
        .course(course_id)
        .await
        .map_err(|e| reject("load the course", e))?;
    Ok(Json(CourseContentResponse {
        course: course.into(),
    }))
}

//=========================================================================================
// Progress
//=========================================================================================

#[utoipa::path(
    put,
    path = "/courses/complete-chapter",
    request_body = CompleteChapterRequest,
    responses(
        (status = 200, description = "Chapter recorded", body = CompleteChapterResponse),
        (status = 400, description = "Chapter out of range"),
        (status = 403, description = "Course belongs to another learner"),
        (status = 404, description = "Course not found")
    )
)]
pub async fn complete_chapter_handler(
    State(state): State<Arc<AppState>>,
    Extension(learner_id): Extension<Uuid>,
    Json(req): Json<CompleteChapterRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let outcome = state
        .progression
        .complete_chapter(learner_id, req.course_id, req.chapter)
        .await
        .map_err(|e| reject("complete the chapter", e))?;

    let message = if outcome.already_completed {
        "Chapter already completed"
    } else {
        "Chapter completed successfully"
    };
    Ok(Json(CompleteChapterResponse {
        message: message.to_string(),
        completed_chapter: outcome.completed_chapter,
        streak: outcome.streak,
    }))
}

#[utoipa::path(
    post,
    path = "/courses/quiz-submit",
    request_body = SubmitQuizRequest,
    responses(
        (status = 200, description = "Quiz recorded", body = SubmitQuizResponse),
        (status = 400, description = "Missing results or marks out of range"),
        (status = 404, description = "Course not found")
    )
)]
pub async fn submit_quiz_handler(
    State(state): State<Arc<AppState>>,
    Extension(learner_id): Extension<Uuid>,
    Json(req): Json<SubmitQuizRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let outcome = state
        .progression
        .submit_quiz(learner_id, req.course_id, req.quiz_result, req.marks)
        .await
        .map_err(|e| reject("submit the quiz", e))?;

    Ok(Json(SubmitQuizResponse {
        message: "Quiz submitted successfully".to_string(),
        tokens: outcome.tokens,
        credited: outcome.credited,
        streak: outcome.streak,
        best_marks: outcome.best_marks,
    }))
}

//=========================================================================================
// Quiz, Q&A and Flashcard Listings
//=========================================================================================

/// The learner's courses, newest first.
async fn owned_newest_first(
    state: &AppState,
    learner_id: Uuid,
) -> Result<Vec<CourseRecord>, (StatusCode, String)> {
    let mut courses = state
        .db
        .courses_owned_by(learner_id)
        .await
        .map_err(|e| reject("list courses", e.into()))?;
    courses.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(courses)
}

#[utoipa::path(
    get,
    path = "/courses/quizzes",
    responses((status = 200, description = "Quiz per enrolled course", body = QuizListResponse))
)]
pub async fn list_quizzes_handler(
    State(state): State<Arc<AppState>>,
    Extension(learner_id): Extension<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let quizzes = owned_newest_first(&state, learner_id)
        .await?
        .into_iter()
        .map(|c| QuizListItem {
            id: c.id,
            quizzes_count: c.quiz.len(),
            correct_count: c.quiz_result.iter().filter(|r| r.is_correct).count(),
            course_title: c.course_title,
        })
        .collect();
    Ok(Json(QuizListResponse { quizzes }))
}

#[utoipa::path(
    get,
    path = "/courses/{id}/quiz",
    params(("id" = Uuid, Path, description = "The course id")),
    responses(
        (status = 200, description = "Quiz questions", body = QuizContentResponse),
        (status = 404, description = "Course not found")
    )
)]
pub async fn course_quiz_handler(
    State(state): State<Arc<AppState>>,
    Path(course_id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let course = state
        .progression
        .course(course_id)
        .await
        .map_err(|e| reject("load the quiz", e))?;
    Ok(Json(QuizContentResponse { quiz: course.quiz }))
}

#[utoipa::path(
    get,
    path = "/courses/qas",
    responses((status = 200, description = "Q&A per enrolled course", body = QaListResponse))
)]
pub async fn list_qas_handler(
    State(state): State<Arc<AppState>>,
    Extension(learner_id): Extension<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let qas = owned_newest_first(&state, learner_id)
        .await?
        .into_iter()
        .map(|c| QaListItem {
            id: c.id,
            qa_count: c.qa.len(),
            course_title: c.course_title,
        })
        .collect();
    Ok(Json(QaListResponse { qas }))
}

#[utoipa::path(
    get,
    path = "/courses/{id}/qa",
    params(("id" = Uuid, Path, description = "The course id")),
    responses(
        (status = 200, description = "Q&A items", body = QaContentResponse),
        (status = 404, description = "Course not found")
    )
)]
pub async fn course_qa_handler(
    State(state): State<Arc<AppState>>,
    Path(course_id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let course = state
        .progression
        .course(course_id)
        .await
        .map_err(|e| reject("load the Q&A", e))?;
    Ok(Json(QaContentResponse { qa: course.qa }))
}

#[utoipa::path(
    get,
    path = "/courses/flashcards",
    responses((status = 200, description = "Flashcards per enrolled course", body = FlashcardListResponse))
)]
pub async fn list_flashcards_handler(
    State(state): State<Arc<AppState>>,
    Extension(learner_id): Extension<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let flashcards = owned_newest_first(&state, learner_id)
        .await?
        .into_iter()
        .map(|c| FlashcardListItem {
            id: c.id,
            flashcards_count: c.flashcards.len(),
            course_title: c.course_title,
        })
        .collect();
    Ok(Json(FlashcardListResponse { flashcards }))
}

#[utoipa::path(
    get,
    path = "/courses/{id}/flashcards",
    params(("id" = Uuid, Path, description = "The course id")),
    responses(
        (status = 200, description = "Flashcards", body = FlashcardContentResponse),
        (status = 404, description = "Course not found")
    )
)]
pub async fn course_flashcards_handler(
    State(state): State<Arc<AppState>>,
    Path(course_id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let course = state
        .progression
        .course(course_id)
        .await
        .map_err(|e| reject("load the flashcards", e))?;
    Ok(Json(FlashcardContentResponse {
        flashcards: course.flashcards,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use learnpath_core::draft::DraftError;
    use learnpath_core::ledger::InsufficientBalance;

    #[test]
    fn action_errors_map_to_statuses() {
        let cases = [
            (
                ProgressError::InsufficientBalance(InsufficientBalance {
                    required: 10,
                    available: 3,
                }),
                StatusCode::FORBIDDEN,
            ),
            (ProgressError::RecordNotFound("c".into()), StatusCode::NOT_FOUND),
            (ProgressError::Unauthorized("c".into()), StatusCode::FORBIDDEN),
            (
                ProgressError::MalformedUpstreamContent(DraftError::NoJsonObject),
                StatusCode::BAD_GATEWAY,
            ),
            (ProgressError::InvalidRequest("x".into()), StatusCode::BAD_REQUEST),
            (ProgressError::Conflict("x".into()), StatusCode::CONFLICT),
            (ProgressError::Upstream("x".into()), StatusCode::BAD_GATEWAY),
            (ProgressError::Storage("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (error, status) in cases {
            assert_eq!(status_for(&error), status, "{error:?}");
        }
    }

    #[test]
    fn storage_details_are_not_exposed() {
        let (status, message) = reject("do it", ProgressError::Storage("password=hunter2".into()));
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!message.contains("hunter2"));
    }

    #[test]
    fn shortfall_names_the_amounts() {
        let (_, message) = reject(
            "create a course",
            ProgressError::InsufficientBalance(InsufficientBalance {
                required: 10,
                available: 3,
            }),
        );
        assert!(message.contains("create a course"));
        assert!(message.contains("10 required, 3 available"));
    }

    #[test]
    fn openapi_lists_every_route() {
        let doc = ApiDoc::openapi();
        for path in [
            "/auth/register",
            "/auth/me",
            "/courses",
            "/courses/{id}/content",
            "/courses/complete-chapter",
            "/courses/{id}/flashcards",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }
}

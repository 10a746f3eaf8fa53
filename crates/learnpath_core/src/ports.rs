//! crates/learnpath_core/src/ports.rs
//!
//! Defines the service contracts (traits) the progression engine depends on.
//! These traits form the boundary of the hexagonal architecture, keeping the
//! core independent of the database, the content generator and video search.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::{
    AuthSession, CourseListing, CourseRecord, Difficulty, LeaderboardEntry, Learner,
    LearnerCredentials, QuizBankItem, Video,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
    #[error("Unauthorized")]
    Unauthorized,
    /// A write collided with an existing record (e.g. a taken email).
    #[error("Conflict: {0}")]
    Conflict(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait DatabaseService: Send + Sync {
    // --- Learner Management ---
    async fn create_learner(&self, learner: &Learner, hashed_password: &str) -> PortResult<()>;

    async fn get_learner(&self, learner_id: Uuid) -> PortResult<Learner>;

    async fn get_credentials_by_email(&self, email: &str) -> PortResult<LearnerCredentials>;

    /// Persists the learner's mutable progression fields.
    async fn save_learner(&self, learner: &Learner) -> PortResult<()>;

    /// All learners ordered by token balance, highest first.
    async fn leaderboard(&self) -> PortResult<Vec<LeaderboardEntry>>;

    // --- Auth Methods ---
    async fn create_auth_session(&self, session: &AuthSession) -> PortResult<()>;

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid>;

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()>;

    // --- Course Queries ---
    async fn get_course(&self, course_id: Uuid) -> PortResult<CourseRecord>;

    async fn courses_owned_by(&self, learner_id: Uuid) -> PortResult<Vec<CourseRecord>>;

    /// Every record whose normalized title equals `title_key`, any owner.
    async fn courses_with_title(&self, title_key: &str) -> PortResult<Vec<CourseRecord>>;

    /// One listing per normalized title among records of `category` whose
    /// difficulty is one of `difficulties`, skipping every title `learner_id`
    /// already owns. Within a title the learner's own record wins, then the
    /// newest.
    async fn recommendation_candidates(
        &self,
        learner_id: Uuid,
        category: &str,
        difficulties: &[Difficulty],
    ) -> PortResult<Vec<CourseListing>>;

    /// One listing per normalized title among records not created by
    /// `learner_id` (templates included), the newest of each title.
    async fn miscellaneous_candidates(&self, learner_id: Uuid) -> PortResult<Vec<CourseListing>>;

    // --- Course Writes (atomic with the learner update) ---
    async fn insert_course_for_learner(
        &self,
        course: &CourseRecord,
        learner: &Learner,
    ) -> PortResult<()>;

    async fn update_course_and_learner(
        &self,
        course: &CourseRecord,
        learner: &Learner,
    ) -> PortResult<()>;

    /// Replaces any owner-less record with the same normalized title.
    async fn upsert_template_course(&self, course: &CourseRecord) -> PortResult<()>;

    async fn delete_template_courses(&self) -> PortResult<u64>;

    // --- Quiz Bank ---
    /// Up to `size` random items of `category`.
    async fn sample_quiz_items(&self, category: &str, size: usize) -> PortResult<Vec<QuizBankItem>>;

    async fn insert_quiz_items(&self, items: &[QuizBankItem]) -> PortResult<u64>;

    async fn delete_quiz_items(&self) -> PortResult<u64>;
}

#[async_trait]
pub trait CourseGenerationService: Send + Sync {
    /// Generates the raw course content for `topic`. The returned text is
    /// unvalidated and goes through `draft::parse_course_draft`.
    async fn generate_course(&self, topic: &str) -> PortResult<String>;
}

#[async_trait]
pub trait VideoSearchService: Send + Sync {
    /// Looks up videos about `topic`. Never fails: lookup problems yield an empty list.
    async fn search_videos(&self, topic: &str) -> Vec<Video>;
}

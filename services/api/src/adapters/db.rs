//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `DatabaseService` port from the `core` crate. It handles all interactions
//! with the PostgreSQL database using `sqlx`. Nested course content lives in
//! JSONB columns and is decoded through `sqlx::types::Json`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use learnpath_core::domain::{
    AuthSession, Chapter, CourseListing, CourseRecord, Difficulty, Flashcard, LeaderboardEntry, Learner,
    LearnerCredentials, QaItem, QuizBankItem, QuizQuestion, QuizResultEntry, Video,
};
use learnpath_core::ledger::Tokens;
use learnpath_core::ports::{DatabaseService, PortError, PortResult};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `DatabaseService` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    async fn begin(&self) -> PortResult<Transaction<'static, Postgres>> {
        self.pool.begin().await.map_err(unexpected)
    }
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

/// Like `unexpected`, but a unique-constraint violation becomes a conflict.
fn write_error(e: sqlx::Error) -> PortError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            PortError::Conflict(db.message().to_string())
        }
        _ => unexpected(e),
    }
}

const COURSE_COLUMNS: &str = "id, course_title, description, category, difficulty, banner_image, \
     created_by, chapters, quiz, flashcards, qa, completed_chapter, quiz_result, quiz_marks, \
     videos, created_at";

const LISTING_COLUMNS: &str = "id, course_title, category, difficulty, banner_image, created_by, \
     jsonb_array_length(chapters)::BIGINT AS chapters_count, \
     jsonb_array_length(completed_chapter)::BIGINT AS completed_chapters_count, created_at";

const LEARNER_COLUMNS: &str =
    "id, name, email, domains, quiz, quiz_marks, tokens, streak, last_active, created_at";

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct LearnerRecord {
    id: Uuid,
    name: String,
    email: String,
    domains: Vec<String>,
    quiz: Json<Vec<QuizBankItem>>,
    quiz_marks: i32,
    tokens: i64,
    streak: i32,
    last_active: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}
impl LearnerRecord {
    fn to_domain(self) -> Learner {
        Learner {
            id: self.id,
            name: self.name,
            email: self.email,
            domains: self.domains,
            quiz: self.quiz.0,
            quiz_marks: self.quiz_marks,
            tokens: Tokens::from_stored(self.tokens),
            streak: u32::try_from(self.streak).unwrap_or(0),
            last_active: self.last_active,
            created_at: self.created_at,
        }
    }
}

#[derive(FromRow)]
struct CredentialsRecord {
    id: Uuid,
    email: String,
    hashed_password: String,
}
impl CredentialsRecord {
    fn to_domain(self) -> LearnerCredentials {
        LearnerCredentials {
            learner_id: self.id,
            email: self.email,
            hashed_password: self.hashed_password,
        }
    }
}

#[derive(FromRow)]
struct LeaderboardRecord {
    id: Uuid,
    name: String,
    email: String,
    tokens: i64,
}
impl LeaderboardRecord {
    fn to_domain(self) -> LeaderboardEntry {
        LeaderboardEntry {
            learner_id: self.id,
            name: self.name,
            email: self.email,
            tokens: self.tokens,
        }
    }
}

#[derive(FromRow)]
struct CourseRow {
    id: Uuid,
    course_title: String,
    description: String,
    category: String,
    difficulty: String,
    banner_image: String,
    created_by: Option<Uuid>,
    chapters: Json<Vec<Chapter>>,
    quiz: Json<Vec<QuizQuestion>>,
    flashcards: Json<Vec<Flashcard>>,
    qa: Json<Vec<QaItem>>,
    completed_chapter: Json<Vec<u32>>,
    quiz_result: Json<Vec<QuizResultEntry>>,
    quiz_marks: i32,
    videos: Json<Vec<Video>>,
    created_at: DateTime<Utc>,
}
impl CourseRow {
    fn to_domain(self) -> PortResult<CourseRecord> {
        let difficulty = self
            .difficulty
            .parse::<Difficulty>()
            .map_err(|e| PortError::Unexpected(format!("Course {}: {}", self.id, e)))?;
        Ok(CourseRecord {
            id: self.id,
            course_title: self.course_title,
            description: self.description,
            category: self.category,
            difficulty,
            banner_image: self.banner_image,
            created_by: self.created_by,
            chapters: self.chapters.0,
            quiz: self.quiz.0,
            flashcards: self.flashcards.0,
            qa: self.qa.0,
            completed_chapter: self.completed_chapter.0,
            quiz_result: self.quiz_result.0,
            quiz_marks: self.quiz_marks,
            videos: self.videos.0,
            created_at: self.created_at,
        })
    }
}

fn courses_to_domain(rows: Vec<CourseRow>) -> PortResult<Vec<CourseRecord>> {
    rows.into_iter().map(CourseRow::to_domain).collect()
}

#[derive(FromRow)]
struct CourseListingRow {
    id: Uuid,
    course_title: String,
    category: String,
    difficulty: String,
    banner_image: String,
    created_by: Option<Uuid>,
    chapters_count: i64,
    completed_chapters_count: i64,
    created_at: DateTime<Utc>,
}
impl CourseListingRow {
    fn to_domain(self) -> PortResult<CourseListing> {
        let difficulty = self
            .difficulty
            .parse::<Difficulty>()
            .map_err(|e| PortError::Unexpected(format!("Course {}: {}", self.id, e)))?;
        Ok(CourseListing {
            id: self.id,
            course_title: self.course_title,
            category: self.category,
            difficulty,
            banner_image: self.banner_image,
            created_by: self.created_by,
            chapters_count: usize::try_from(self.chapters_count).unwrap_or(0),
            completed_chapters_count: usize::try_from(self.completed_chapters_count).unwrap_or(0),
            created_at: self.created_at,
        })
    }
}

fn listings_to_domain(rows: Vec<CourseListingRow>) -> PortResult<Vec<CourseListing>> {
    rows.into_iter().map(CourseListingRow::to_domain).collect()
}

#[derive(FromRow)]
struct QuizBankRecord {
    id: Uuid,
    question: String,
    options: Json<Vec<String>>,
    correct_ans: String,
    category: String,
}
impl QuizBankRecord {
    fn to_domain(self) -> QuizBankItem {
        QuizBankItem {
            id: self.id,
            question: self.question,
            options: self.options.0,
            correct_ans: self.correct_ans,
            category: self.category,
        }
    }
}

//=========================================================================================
// Shared Write Statements
//=========================================================================================

async fn write_learner_progress(
    tx: &mut Transaction<'static, Postgres>,
    learner: &Learner,
) -> PortResult<()> {
    let result = sqlx::query(
        "UPDATE learners SET quiz = $1, quiz_marks = $2, tokens = $3, streak = $4, last_active = $5 \
         WHERE id = $6",
    )
    .bind(Json(&learner.quiz))
    .bind(learner.quiz_marks)
    .bind(learner.tokens.balance())
    .bind(i32::try_from(learner.streak).unwrap_or(i32::MAX))
    .bind(learner.last_active)
    .bind(learner.id)
    .execute(&mut **tx)
    .await
    .map_err(unexpected)?;

    if result.rows_affected() == 0 {
        return Err(PortError::NotFound(format!("Learner {} not found", learner.id)));
    }
    Ok(())
}

async fn insert_course(
    tx: &mut Transaction<'static, Postgres>,
    course: &CourseRecord,
) -> PortResult<()> {
    sqlx::query(
        "INSERT INTO courses (id, course_title, title_key, description, category, difficulty, \
         banner_image, created_by, chapters, quiz, flashcards, qa, completed_chapter, quiz_result, \
         quiz_marks, videos, created_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)",
    )
    .bind(course.id)
    .bind(&course.course_title)
    .bind(course.title_key())
    .bind(&course.description)
    .bind(&course.category)
    .bind(course.difficulty.as_str())
    .bind(&course.banner_image)
    .bind(course.created_by)
    .bind(Json(&course.chapters))
    .bind(Json(&course.quiz))
    .bind(Json(&course.flashcards))
    .bind(Json(&course.qa))
    .bind(Json(&course.completed_chapter))
    .bind(Json(&course.quiz_result))
    .bind(course.quiz_marks)
    .bind(Json(&course.videos))
    .bind(course.created_at)
    .execute(&mut **tx)
    .await
    .map_err(write_error)?;
    Ok(())
}

//=========================================================================================
// `DatabaseService` Trait Implementation
//=========================================================================================

#[async_trait]
impl DatabaseService for DbAdapter {
    async fn create_learner(&self, learner: &Learner, hashed_password: &str) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO learners (id, name, email, hashed_password, domains, quiz, quiz_marks, \
             tokens, streak, last_active, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
        )
        .bind(learner.id)
        .bind(&learner.name)
        .bind(&learner.email)
        .bind(hashed_password)
        .bind(&learner.domains)
        .bind(Json(&learner.quiz))
        .bind(learner.quiz_marks)
        .bind(learner.tokens.balance())
        .bind(i32::try_from(learner.streak).unwrap_or(i32::MAX))
        .bind(learner.last_active)
        .bind(learner.created_at)
        .execute(&self.pool)
        .await
        .map_err(write_error)?;
        Ok(())
    }

    async fn get_learner(&self, learner_id: Uuid) -> PortResult<Learner> {
        let record = sqlx::query_as::<_, LearnerRecord>(&format!(
            "SELECT {LEARNER_COLUMNS} FROM learners WHERE id = $1"
        ))
        .bind(learner_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::NotFound(format!("Learner {} not found", learner_id)),
            _ => PortError::Unexpected(e.to_string()),
        })?;
        Ok(record.to_domain())
    }

    async fn get_credentials_by_email(&self, email: &str) -> PortResult<LearnerCredentials> {
        let record = sqlx::query_as::<_, CredentialsRecord>(
            "SELECT id, email, hashed_password FROM learners WHERE email = $1",
        )
        .bind(email)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::NotFound(format!("Learner {} not found", email)),
            _ => PortError::Unexpected(e.to_string()),
        })?;
        Ok(record.to_domain())
    }

    async fn save_learner(&self, learner: &Learner) -> PortResult<()> {
        let mut tx = self.begin().await?;
        write_learner_progress(&mut tx, learner).await?;
        tx.commit().await.map_err(unexpected)
    }

    async fn leaderboard(&self) -> PortResult<Vec<LeaderboardEntry>> {
        let records = sqlx::query_as::<_, LeaderboardRecord>(
            "SELECT id, name, email, tokens FROM learners ORDER BY tokens DESC, created_at ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn create_auth_session(&self, session: &AuthSession) -> PortResult<()> {
        sqlx::query("INSERT INTO auth_sessions (id, learner_id, expires_at) VALUES ($1, $2, $3)")
            .bind(&session.id)
            .bind(session.learner_id)
            .bind(session.expires_at)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid> {
        let learner_id: Option<Uuid> = sqlx::query_scalar(
            "SELECT learner_id FROM auth_sessions WHERE id = $1 AND expires_at > NOW()",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        learner_id.ok_or(PortError::Unauthorized)
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        sqlx::query("DELETE FROM auth_sessions WHERE id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn get_course(&self, course_id: Uuid) -> PortResult<CourseRecord> {
        let row = sqlx::query_as::<_, CourseRow>(&format!(
            "SELECT {COURSE_COLUMNS} FROM courses WHERE id = $1"
        ))
        .bind(course_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::NotFound(format!("Course {} not found", course_id)),
            _ => PortError::Unexpected(e.to_string()),
        })?;
        row.to_domain()
    }

    async fn courses_owned_by(&self, learner_id: Uuid) -> PortResult<Vec<CourseRecord>> {
        let rows = sqlx::query_as::<_, CourseRow>(&format!(
            "SELECT {COURSE_COLUMNS} FROM courses WHERE created_by = $1 ORDER BY created_at DESC"
        ))
        .bind(learner_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        courses_to_domain(rows)
    }

    async fn courses_with_title(&self, title_key: &str) -> PortResult<Vec<CourseRecord>> {
        let rows = sqlx::query_as::<_, CourseRow>(&format!(
            "SELECT {COURSE_COLUMNS} FROM courses WHERE title_key = $1 ORDER BY created_at DESC"
        ))
        .bind(title_key)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        courses_to_domain(rows)
    }

    async fn recommendation_candidates(
        &self,
        learner_id: Uuid,
        category: &str,
        difficulties: &[Difficulty],
    ) -> PortResult<Vec<CourseListing>> {
        let labels: Vec<String> = difficulties.iter().map(|d| d.as_str().to_string()).collect();
        let rows = sqlx::query_as::<_, CourseListingRow>(&format!(
            "SELECT DISTINCT ON (title_key) {LISTING_COLUMNS} FROM courses \
             WHERE category = $1 AND difficulty = ANY($2) \
             AND title_key NOT IN (SELECT title_key FROM courses WHERE created_by = $3) \
             ORDER BY title_key, (created_by IS NOT DISTINCT FROM $3) DESC, created_at DESC"
        ))
        .bind(category)
        .bind(labels)
        .bind(learner_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        listings_to_domain(rows)
    }

    async fn miscellaneous_candidates(&self, learner_id: Uuid) -> PortResult<Vec<CourseListing>> {
        let rows = sqlx::query_as::<_, CourseListingRow>(&format!(
            "SELECT DISTINCT ON (title_key) {LISTING_COLUMNS} FROM courses \
             WHERE created_by IS DISTINCT FROM $1 \
             ORDER BY title_key, created_at DESC"
        ))
        .bind(learner_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        listings_to_domain(rows)
    }

    async fn insert_course_for_learner(
        &self,
        course: &CourseRecord,
        learner: &Learner,
    ) -> PortResult<()> {
        let mut tx = self.begin().await?;
        insert_course(&mut tx, course).await?;
        write_learner_progress(&mut tx, learner).await?;
        tx.commit().await.map_err(unexpected)
    }

    async fn update_course_and_learner(
        &self,
        course: &CourseRecord,
        learner: &Learner,
    ) -> PortResult<()> {
        let mut tx = self.begin().await?;
        let result = sqlx::query(
            "UPDATE courses SET completed_chapter = $1, quiz_result = $2, quiz_marks = $3 WHERE id = $4",
        )
        .bind(Json(&course.completed_chapter))
        .bind(Json(&course.quiz_result))
        .bind(course.quiz_marks)
        .bind(course.id)
        .execute(&mut *tx)
        .await
        .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Course {} not found", course.id)));
        }
        write_learner_progress(&mut tx, learner).await?;
        tx.commit().await.map_err(unexpected)
    }

    async fn upsert_template_course(&self, course: &CourseRecord) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO courses (id, course_title, title_key, description, category, difficulty, \
             banner_image, created_by, chapters, quiz, flashcards, qa, videos, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, NULL, $8, $9, $10, $11, $12, $13) \
             ON CONFLICT (title_key) WHERE created_by IS NULL DO UPDATE SET \
             course_title = EXCLUDED.course_title, description = EXCLUDED.description, \
             category = EXCLUDED.category, difficulty = EXCLUDED.difficulty, \
             banner_image = EXCLUDED.banner_image, chapters = EXCLUDED.chapters, \
             quiz = EXCLUDED.quiz, flashcards = EXCLUDED.flashcards, qa = EXCLUDED.qa, \
             videos = EXCLUDED.videos",
        )
        .bind(course.id)
        .bind(&course.course_title)
        .bind(course.title_key())
        .bind(&course.description)
        .bind(&course.category)
        .bind(course.difficulty.as_str())
        .bind(&course.banner_image)
        .bind(Json(&course.chapters))
        .bind(Json(&course.quiz))
        .bind(Json(&course.flashcards))
        .bind(Json(&course.qa))
        .bind(Json(&course.videos))
        .bind(course.created_at)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }

    async fn delete_template_courses(&self) -> PortResult<u64> {
        let result = sqlx::query("DELETE FROM courses WHERE created_by IS NULL")
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(result.rows_affected())
    }

    async fn sample_quiz_items(&self, category: &str, size: usize) -> PortResult<Vec<QuizBankItem>> {
        let records = sqlx::query_as::<_, QuizBankRecord>(
            "SELECT id, question, options, correct_ans, category FROM quiz_bank \
             WHERE category = $1 ORDER BY random() LIMIT $2",
        )
        .bind(category)
        .bind(i64::try_from(size).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn insert_quiz_items(&self, items: &[QuizBankItem]) -> PortResult<u64> {
        let mut tx = self.begin().await?;
        let mut inserted = 0;
        for item in items {
            let result = sqlx::query(
                "INSERT INTO quiz_bank (id, question, options, correct_ans, category) \
                 VALUES ($1, $2, $3, $4, $5) ON CONFLICT (id) DO NOTHING",
            )
            .bind(item.id)
            .bind(&item.question)
            .bind(Json(&item.options))
            .bind(&item.correct_ans)
            .bind(&item.category)
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?;
            inserted += result.rows_affected();
        }
        tx.commit().await.map_err(unexpected)?;
        Ok(inserted)
    }

    async fn delete_quiz_items(&self) -> PortResult<u64> {
        let result = sqlx::query("DELETE FROM quiz_bank")
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_constraint_write_errors_stay_unexpected() {
        assert!(matches!(
            write_error(sqlx::Error::RowNotFound),
            PortError::Unexpected(_)
        ));
        assert!(matches!(
            write_error(sqlx::Error::PoolTimedOut),
            PortError::Unexpected(_)
        ));
    }

    #[test]
    fn listing_rows_convert_counts_and_difficulty() {
        let row = CourseListingRow {
            id: Uuid::new_v4(),
            course_title: "Calculus".to_string(),
            category: "Math".to_string(),
            difficulty: "Intermediate".to_string(),
            banner_image: "Math-1.png".to_string(),
            created_by: None,
            chapters_count: 5,
            completed_chapters_count: 2,
            created_at: Utc::now(),
        };
        let listing = row.to_domain().unwrap();
        assert_eq!(listing.difficulty, Difficulty::Intermediate);
        assert_eq!((listing.chapters_count, listing.completed_chapters_count), (5, 2));

        let bad = CourseListingRow {
            id: Uuid::new_v4(),
            course_title: "Calculus".to_string(),
            category: "Math".to_string(),
            difficulty: "Expert".to_string(),
            banner_image: String::new(),
            created_by: None,
            chapters_count: 0,
            completed_chapters_count: 0,
            created_at: Utc::now(),
        };
        assert!(matches!(bad.to_domain(), Err(PortError::Unexpected(_))));
    }
}

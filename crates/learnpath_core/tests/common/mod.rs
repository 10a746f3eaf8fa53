//! In-memory collaborators for driving `ProgressionService` end to end.
//!
//! Learner reads yield to the scheduler before returning, so two unserialized
//! actions on one learner interleave between their read and their write.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use learnpath_core::recommend::dedupe_by_title;
use learnpath_core::service::Clock;
use learnpath_core::{
    AuthSession, CourseGenerationService, CourseListing, CourseRecord, DatabaseService, Difficulty,
    LeaderboardEntry, Learner, LearnerCredentials, PortError, PortResult, QuizBankItem, Video,
    VideoSearchService,
};

#[derive(Default)]
struct Tables {
    learners: HashMap<Uuid, Learner>,
    passwords: HashMap<Uuid, String>,
    sessions: HashMap<String, AuthSession>,
    courses: Vec<CourseRecord>,
    quiz_bank: Vec<QuizBankItem>,
}

#[derive(Default)]
pub struct MemoryDb {
    tables: Mutex<Tables>,
}

impl MemoryDb {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> std::sync::MutexGuard<'_, Tables> {
        self.tables.lock().unwrap()
    }

    pub fn add_course(&self, course: CourseRecord) {
        self.tables().courses.push(course);
    }

    pub fn add_quiz_items(&self, items: Vec<QuizBankItem>) {
        self.tables().quiz_bank.extend(items);
    }

    pub fn set_tokens(&self, learner_id: Uuid, balance: i64) {
        let mut tables = self.tables();
        let learner = tables.learners.get_mut(&learner_id).unwrap();
        learner.tokens = learnpath_core::ledger::Tokens::from_stored(balance);
    }

    pub fn course_count(&self) -> usize {
        self.tables().courses.len()
    }
}

#[async_trait]
impl DatabaseService for MemoryDb {
    async fn create_learner(&self, learner: &Learner, hashed_password: &str) -> PortResult<()> {
        let mut tables = self.tables();
        if tables.learners.values().any(|l| l.email == learner.email) {
            return Err(PortError::Conflict(format!("email {} is taken", learner.email)));
        }
        tables.passwords.insert(learner.id, hashed_password.to_string());
        tables.learners.insert(learner.id, learner.clone());
        Ok(())
    }

    async fn get_learner(&self, learner_id: Uuid) -> PortResult<Learner> {
        let learner = self.tables().learners.get(&learner_id).cloned();
        tokio::task::yield_now().await;
        learner.ok_or_else(|| PortError::NotFound(format!("Learner {learner_id} not found")))
    }

    async fn get_credentials_by_email(&self, email: &str) -> PortResult<LearnerCredentials> {
        let credentials = {
            let tables = self.tables();
            tables
                .learners
                .values()
                .find(|l| l.email == email)
                .map(|learner| LearnerCredentials {
                    learner_id: learner.id,
                    email: learner.email.clone(),
                    hashed_password: tables.passwords[&learner.id].clone(),
                })
        };
        tokio::task::yield_now().await;
        credentials.ok_or_else(|| PortError::NotFound(format!("Learner {email} not found")))
    }

    async fn save_learner(&self, learner: &Learner) -> PortResult<()> {
        self.tables().learners.insert(learner.id, learner.clone());
        Ok(())
    }

    async fn leaderboard(&self) -> PortResult<Vec<LeaderboardEntry>> {
        let mut entries: Vec<LeaderboardEntry> = self
            .tables()
            .learners
            .values()
            .map(|l| LeaderboardEntry {
                learner_id: l.id,
                name: l.name.clone(),
                email: l.email.clone(),
                tokens: l.tokens.balance(),
            })
            .collect();
        entries.sort_by(|a, b| b.tokens.cmp(&a.tokens));
        Ok(entries)
    }

    async fn create_auth_session(&self, session: &AuthSession) -> PortResult<()> {
        self.tables().sessions.insert(session.id.clone(), session.clone());
        Ok(())
    }

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid> {
        match self.tables().sessions.get(session_id) {
            Some(session) if session.expires_at > Utc::now() => Ok(session.learner_id),
            _ => Err(PortError::Unauthorized),
        }
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        self.tables().sessions.remove(session_id);
        Ok(())
    }

    async fn get_course(&self, course_id: Uuid) -> PortResult<CourseRecord> {
        self.tables()
            .courses
            .iter()
            .find(|c| c.id == course_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Course {course_id} not found")))
    }

    async fn courses_owned_by(&self, learner_id: Uuid) -> PortResult<Vec<CourseRecord>> {
        Ok(self
            .tables()
            .courses
            .iter()
            .filter(|c| c.is_owned_by(learner_id))
            .cloned()
            .collect())
    }

    async fn courses_with_title(&self, title_key: &str) -> PortResult<Vec<CourseRecord>> {
        Ok(self
            .tables()
            .courses
            .iter()
            .filter(|c| c.title_key() == title_key)
            .cloned()
            .collect())
    }

    async fn recommendation_candidates(
        &self,
        learner_id: Uuid,
        category: &str,
        difficulties: &[Difficulty],
    ) -> PortResult<Vec<CourseListing>> {
        let tables = self.tables();
        let owned: Vec<String> = tables
            .courses
            .iter()
            .filter(|c| c.is_owned_by(learner_id))
            .map(CourseRecord::title_key)
            .collect();
        let candidates = tables
            .courses
            .iter()
            .filter(|c| c.category == category && difficulties.contains(&c.difficulty))
            .filter(|c| !owned.contains(&c.title_key()))
            .map(CourseListing::from)
            .collect();
        Ok(dedupe_by_title(candidates, Some(learner_id)))
    }

    async fn miscellaneous_candidates(&self, learner_id: Uuid) -> PortResult<Vec<CourseListing>> {
        let candidates = self
            .tables()
            .courses
            .iter()
            .filter(|c| !c.is_owned_by(learner_id))
            .map(CourseListing::from)
            .collect();
        Ok(dedupe_by_title(candidates, None))
    }

    async fn insert_course_for_learner(
        &self,
        course: &CourseRecord,
        learner: &Learner,
    ) -> PortResult<()> {
        let mut tables = self.tables();
        tables.courses.push(course.clone());
        tables.learners.insert(learner.id, learner.clone());
        Ok(())
    }

    async fn update_course_and_learner(
        &self,
        course: &CourseRecord,
        learner: &Learner,
    ) -> PortResult<()> {
        let mut tables = self.tables();
        let slot = tables
            .courses
            .iter_mut()
            .find(|c| c.id == course.id)
            .ok_or_else(|| PortError::NotFound(format!("Course {} not found", course.id)))?;
        *slot = course.clone();
        tables.learners.insert(learner.id, learner.clone());
        Ok(())
    }

    async fn upsert_template_course(&self, course: &CourseRecord) -> PortResult<()> {
        let mut tables = self.tables();
        let key = course.title_key();
        tables
            .courses
            .retain(|c| !(c.created_by.is_none() && c.title_key() == key));
        tables.courses.push(course.clone());
        Ok(())
    }

    async fn delete_template_courses(&self) -> PortResult<u64> {
        let mut tables = self.tables();
        let before = tables.courses.len();
        tables.courses.retain(|c| c.created_by.is_some());
        Ok((before - tables.courses.len()) as u64)
    }

    async fn sample_quiz_items(&self, category: &str, size: usize) -> PortResult<Vec<QuizBankItem>> {
        Ok(self
            .tables()
            .quiz_bank
            .iter()
            .filter(|q| q.category == category)
            .take(size)
            .cloned()
            .collect())
    }

    async fn insert_quiz_items(&self, items: &[QuizBankItem]) -> PortResult<u64> {
        self.tables().quiz_bank.extend_from_slice(items);
        Ok(items.len() as u64)
    }

    async fn delete_quiz_items(&self) -> PortResult<u64> {
        let mut tables = self.tables();
        let removed = tables.quiz_bank.len() as u64;
        tables.quiz_bank.clear();
        Ok(removed)
    }
}

/// Answers every generation request with a fixed body and counts the calls.
pub struct ScriptedGenerator {
    body: Mutex<String>,
    calls: AtomicUsize,
}

impl ScriptedGenerator {
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            body: Mutex::new(body.into()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn set_body(&self, body: impl Into<String>) {
        *self.body.lock().unwrap() = body.into();
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CourseGenerationService for ScriptedGenerator {
    async fn generate_course(&self, _topic: &str) -> PortResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.body.lock().unwrap().clone())
    }
}

pub struct NoVideos;

#[async_trait]
impl VideoSearchService for NoVideos {
    async fn search_videos(&self, _topic: &str) -> Vec<Video> {
        Vec::new()
    }
}

/// A clock moved by hand.
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn starting_at(y: i32, m: u32, d: u32) -> Self {
        Self {
            now: Mutex::new(Utc.with_ymd_and_hms(y, m, d, 10, 0, 0).unwrap()),
        }
    }

    pub fn advance(&self, by: Duration) {
        *self.now.lock().unwrap() += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

/// A bare course object with the counts the draft validator requires.
pub fn course_object(title: &str, category: &str, difficulty: &str) -> Value {
    let chapters: Vec<Value> = (0..5)
        .map(|c| {
            json!({
                "chapterName": format!("Chapter {c}"),
                "content": (0..4).map(|t| json!({
                    "topic": format!("Topic {c}.{t}"),
                    "explain": "Explanation.",
                    "example": "Example."
                })).collect::<Vec<_>>()
            })
        })
        .collect();
    let quiz: Vec<Value> = (0..12)
        .map(|q| json!({"question": format!("Q{q}?"), "options": ["A", "B", "C", "D"], "correctAns": "A"}))
        .collect();
    let cards: Vec<Value> = (0..12)
        .map(|f| json!({"front": format!("F{f}"), "back": "B"}))
        .collect();
    let qa: Vec<Value> = (0..12)
        .map(|q| json!({"question": format!("W{q}?"), "answer": "A."}))
        .collect();
    json!({
        "courseTitle": title,
        "description": "Generated.",
        "category": category,
        "difficulty": difficulty,
        "chapters": chapters,
        "quiz": quiz,
        "flashcards": cards,
        "qa": qa
    })
}

/// The generator's reply for a course: the course object under `course`.
pub fn generated_body(title: &str, category: &str, difficulty: &str) -> String {
    json!({ "course": course_object(title, category, difficulty) }).to_string()
}

/// A stored course built from `course_object`.
pub fn stored_course(
    title: &str,
    category: &str,
    difficulty: &str,
    owner: Option<Uuid>,
    created_at: DateTime<Utc>,
) -> CourseRecord {
    let draft =
        learnpath_core::draft::course_from_value(course_object(title, category, difficulty))
            .unwrap();
    draft.into_course(owner, "banner.png".to_string(), Vec::new(), created_at)
}

pub fn bank_items(category: &str, count: usize) -> Vec<QuizBankItem> {
    (0..count)
        .map(|i| QuizBankItem {
            id: Uuid::new_v4(),
            question: format!("{category} question {i}?"),
            options: vec!["a".into(), "b".into(), "c".into(), "d".into()],
            correct_ans: "a".into(),
            category: category.to_string(),
        })
        .collect()
}

pub struct Harness {
    pub db: Arc<MemoryDb>,
    pub generator: Arc<ScriptedGenerator>,
    pub clock: Arc<ManualClock>,
}

impl Harness {
    pub fn new() -> Self {
        Self {
            db: Arc::new(MemoryDb::new()),
            generator: Arc::new(ScriptedGenerator::new(generated_body(
                "Linear Algebra",
                "Math",
                "Easy",
            ))),
            clock: Arc::new(ManualClock::starting_at(2024, 3, 1)),
        }
    }

    pub fn clock_now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn service(&self) -> learnpath_core::ProgressionService {
        learnpath_core::ProgressionService::new(
            self.db.clone(),
            self.generator.clone(),
            Arc::new(NoVideos),
        )
        .with_seed(7)
        .with_clock(self.clock.clone())
    }
}

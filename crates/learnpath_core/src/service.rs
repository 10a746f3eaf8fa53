//! crates/learnpath_core/src/service.rs
//!
//! Learner actions. Each action loads the learner's current record, runs the
//! pure components over it and writes the result back through the
//! `DatabaseService` port. Mutating actions hold the learner's lock for their
//! whole duration and write learner and course in one storage call.

use chrono::{DateTime, Utc};
use futures::future::try_join_all;
use rand::SeedableRng;
use rand_pcg::Mcg128Xsl64;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::{normalize_title, CourseRecord, LeaderboardEntry, Learner, QuizResultEntry};
use crate::draft::{banner_image_for, parse_course_draft};
use crate::error::{ProgressError, ProgressResult};
use crate::ledger::{Tokens, COURSE_CREATION_COST, ENROLLMENT_COST, INITIAL_GRANT};
use crate::locks::LearnerLocks;
use crate::ports::{CourseGenerationService, DatabaseService, PortError, VideoSearchService};
use crate::recommend::{recommend_domain, recommend_miscellaneous, LearnerProfile, Recommendations};
use crate::streak::{record_activity, StreakState};

/// Questions drawn from the quiz bank per domain for the initial assessment.
pub const ASSESSMENT_QUESTIONS_PER_DOMAIN: usize = 5;
pub const MAX_MARKS: i32 = 100;

/// Source of the current instant.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

//=========================================================================================
// Action Inputs and Outcomes
//=========================================================================================

#[derive(Debug, Clone)]
pub struct NewLearner {
    pub name: String,
    pub email: String,
    pub hashed_password: String,
    pub domains: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CreateCourseOutcome {
    /// The learner already created a course with this title. Nothing charged.
    AlreadyOwned { course_id: Uuid, tokens: i64 },
    Created {
        course: CourseRecord,
        tokens: i64,
        /// False when an existing course with the same title was copied.
        generated: bool,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum EnrollOutcome {
    /// The learner already holds a copy. Nothing charged.
    AlreadyEnrolled { course: CourseRecord, tokens: i64 },
    Enrolled { course: CourseRecord, tokens: i64 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterOutcome {
    pub already_completed: bool,
    pub completed_chapter: Vec<u32>,
    pub streak: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizOutcome {
    pub tokens: i64,
    pub credited: i64,
    pub streak: u32,
    pub best_marks: i32,
}

//=========================================================================================
// The Service
//=========================================================================================

pub struct ProgressionService {
    db: Arc<dyn DatabaseService>,
    generator: Arc<dyn CourseGenerationService>,
    videos: Arc<dyn VideoSearchService>,
    clock: Arc<dyn Clock>,
    locks: LearnerLocks,
    rng: Mutex<Mcg128Xsl64>,
}

impl ProgressionService {
    pub fn new(
        db: Arc<dyn DatabaseService>,
        generator: Arc<dyn CourseGenerationService>,
        videos: Arc<dyn VideoSearchService>,
    ) -> Self {
        Self {
            db,
            generator,
            videos,
            clock: Arc::new(SystemClock),
            locks: LearnerLocks::new(),
            rng: Mutex::new(Mcg128Xsl64::from_entropy()),
        }
    }

    /// Fixes the random source so sampling and shuffling are reproducible.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = Mutex::new(Mcg128Xsl64::seed_from_u64(seed));
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    fn with_rng<T>(&self, f: impl FnOnce(&mut Mcg128Xsl64) -> T) -> T {
        let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut *rng)
    }

    /// Applies one activity event to the learner's streak.
    fn touch(&self, learner: &mut Learner, now: DateTime<Utc>) {
        let next = record_activity(
            StreakState {
                last_active: learner.last_active,
                streak: learner.streak,
            },
            now,
        );
        learner.last_active = next.last_active;
        learner.streak = next.streak;
    }

    // --- Learner Lifecycle ---

    pub async fn register(&self, new: NewLearner) -> ProgressResult<Learner> {
        let name = new.name.trim().to_string();
        let email = new.email.trim().to_lowercase();
        if name.is_empty() || email.is_empty() || new.hashed_password.is_empty() {
            return Err(ProgressError::InvalidRequest("All fields are required".to_string()));
        }

        let mut domains: Vec<String> = Vec::new();
        for domain in new.domains {
            let domain = domain.trim().to_string();
            if !domain.is_empty() && !domains.contains(&domain) {
                domains.push(domain);
            }
        }
        if domains.is_empty() {
            return Err(ProgressError::InvalidRequest(
                "At least one domain is required".to_string(),
            ));
        }

        match self.db.get_credentials_by_email(&email).await {
            Ok(_) => {
                return Err(ProgressError::Conflict("User already exists".to_string()));
            }
            Err(PortError::NotFound(_)) => {}
            Err(e) => return Err(e.into()),
        }

        let quiz = try_join_all(
            domains
                .iter()
                .map(|domain| self.db.sample_quiz_items(domain, ASSESSMENT_QUESTIONS_PER_DOMAIN)),
        )
        .await?
        .into_iter()
        .flatten()
        .collect();

        let now = self.clock.now();
        let mut tokens = Tokens::default();
        tokens.credit(INITIAL_GRANT);

        let learner = Learner {
            id: Uuid::new_v4(),
            name,
            email,
            domains,
            quiz,
            quiz_marks: 0,
            tokens,
            streak: 1,
            last_active: Some(now),
            created_at: now,
        };
        self.db.create_learner(&learner, &new.hashed_password).await?;

        info!(
            "Registered learner {} with {} assessment questions",
            learner.id,
            learner.quiz.len()
        );
        Ok(learner)
    }

    pub async fn learner(&self, learner_id: Uuid) -> ProgressResult<Learner> {
        Ok(self.db.get_learner(learner_id).await?)
    }

    /// Records the initial assessment score, clears the assessment and pays
    /// the score out as tokens.
    pub async fn attempt_initial_assessment(
        &self,
        learner_id: Uuid,
        marks: i32,
    ) -> ProgressResult<Learner> {
        if !(0..=MAX_MARKS).contains(&marks) {
            return Err(ProgressError::InvalidRequest(format!(
                "Marks must be between 0 and {MAX_MARKS}"
            )));
        }

        let _guard = self.locks.acquire(learner_id).await;
        let mut learner = self.db.get_learner(learner_id).await?;
        learner.quiz.clear();
        learner.quiz_marks = marks;
        learner.tokens.credit(i64::from(marks));
        self.db.save_learner(&learner).await?;

        info!("Learner {} scored {} on the initial assessment", learner_id, marks);
        Ok(learner)
    }

    pub async fn leaderboard(&self) -> ProgressResult<Vec<LeaderboardEntry>> {
        Ok(self.db.leaderboard().await?)
    }

    // --- Courses ---

    /// Creates a course on `topic` for the learner.
    ///
    /// The balance is checked before anything else, so an insufficient
    /// balance never reaches the generation collaborator. An existing course
    /// with the same title is copied instead of generating a new one.
    pub async fn create_course(
        &self,
        learner_id: Uuid,
        topic: &str,
    ) -> ProgressResult<CreateCourseOutcome> {
        let topic = topic.trim();
        if topic.is_empty() {
            return Err(ProgressError::InvalidRequest("Missing required fields".to_string()));
        }

        let _guard = self.locks.acquire(learner_id).await;
        let mut learner = self.db.get_learner(learner_id).await?;
        learner.tokens.ensure(COURSE_CREATION_COST)?;

        let existing = self.db.courses_with_title(&normalize_title(topic)).await?;
        if let Some(own) = existing.iter().find(|c| c.is_owned_by(learner_id)) {
            return Ok(CreateCourseOutcome::AlreadyOwned {
                course_id: own.id,
                tokens: learner.tokens.balance(),
            });
        }

        let now = self.clock.now();
        if let Some(template) = existing.first() {
            let course = template.copy_for(learner_id, now);
            learner.tokens.debit(COURSE_CREATION_COST)?;
            self.db.insert_course_for_learner(&course, &learner).await?;
            info!("Learner {} copied existing course '{}'", learner_id, course.course_title);
            return Ok(CreateCourseOutcome::Created {
                course,
                tokens: learner.tokens.balance(),
                generated: false,
            });
        }

        let raw = self
            .generator
            .generate_course(topic)
            .await
            .map_err(|e| ProgressError::Upstream(e.to_string()))?;
        let draft = parse_course_draft(&raw).map_err(|e| {
            warn!("Generated course for '{}' rejected: {}", topic, e);
            e
        })?;

        // The generated title can differ from the topic that was asked for.
        let generated_key = normalize_title(&draft.course_title);
        if generated_key != normalize_title(topic) {
            let same_title = self.db.courses_with_title(&generated_key).await?;
            if let Some(own) = same_title.iter().find(|c| c.is_owned_by(learner_id)) {
                return Ok(CreateCourseOutcome::AlreadyOwned {
                    course_id: own.id,
                    tokens: learner.tokens.balance(),
                });
            }
        }

        let videos = self.videos.search_videos(&draft.course_title).await;
        let banner = self.with_rng(|rng| banner_image_for(&draft.category, rng));
        let course = draft.into_course(Some(learner_id), banner, videos, now);

        learner.tokens.debit(COURSE_CREATION_COST)?;
        self.db.insert_course_for_learner(&course, &learner).await?;

        info!("Learner {} generated course '{}'", learner_id, course.course_title);
        Ok(CreateCourseOutcome::Created {
            course,
            tokens: learner.tokens.balance(),
            generated: true,
        })
    }

    /// Gives the learner their own copy of `course_id`.
    pub async fn enroll(&self, learner_id: Uuid, course_id: Uuid) -> ProgressResult<EnrollOutcome> {
        let _guard = self.locks.acquire(learner_id).await;
        let mut learner = self.db.get_learner(learner_id).await?;
        let course = self.db.get_course(course_id).await?;
        learner.tokens.ensure(ENROLLMENT_COST)?;

        // A learner holds at most one course per normalized title.
        let key = course.title_key();
        let owned = self.db.courses_owned_by(learner_id).await?;
        if let Some(existing) = owned.into_iter().find(|c| c.title_key() == key) {
            return Ok(EnrollOutcome::AlreadyEnrolled {
                course: existing,
                tokens: learner.tokens.balance(),
            });
        }

        let copy = course.copy_for(learner_id, self.clock.now());
        learner.tokens.debit(ENROLLMENT_COST)?;
        self.db.insert_course_for_learner(&copy, &learner).await?;

        info!("Learner {} enrolled into '{}'", learner_id, copy.course_title);
        Ok(EnrollOutcome::Enrolled {
            course: copy,
            tokens: learner.tokens.balance(),
        })
    }

    /// The learner's courses, least progressed first.
    pub async fn enrolled_courses(&self, learner_id: Uuid) -> ProgressResult<Vec<CourseRecord>> {
        let mut courses = self.db.courses_owned_by(learner_id).await?;
        courses.sort_by_key(|c| c.completed_chapter.len());
        Ok(courses)
    }

    pub async fn course(&self, course_id: Uuid) -> ProgressResult<CourseRecord> {
        Ok(self.db.get_course(course_id).await?)
    }

    // --- Progress ---

    pub async fn complete_chapter(
        &self,
        learner_id: Uuid,
        course_id: Uuid,
        chapter: u32,
    ) -> ProgressResult<ChapterOutcome> {
        let _guard = self.locks.acquire(learner_id).await;
        let mut learner = self.db.get_learner(learner_id).await?;
        let mut course = self.db.get_course(course_id).await?;

        match course.created_by {
            None => {
                return Err(ProgressError::RecordNotFound(format!("Course {course_id} not found")));
            }
            Some(owner) if owner != learner_id => {
                return Err(ProgressError::Unauthorized(
                    "You don't have access to this course".to_string(),
                ));
            }
            Some(_) => {}
        }

        if chapter as usize >= course.chapters.len() {
            return Err(ProgressError::InvalidRequest(format!(
                "Chapter {chapter} does not exist in this course"
            )));
        }

        if course.completed_chapter.contains(&chapter) {
            return Ok(ChapterOutcome {
                already_completed: true,
                completed_chapter: course.completed_chapter,
                streak: learner.streak,
            });
        }

        course.completed_chapter.push(chapter);
        self.touch(&mut learner, self.clock.now());
        self.db.update_course_and_learner(&course, &learner).await?;

        Ok(ChapterOutcome {
            already_completed: false,
            completed_chapter: course.completed_chapter,
            streak: learner.streak,
        })
    }

    /// Records a quiz attempt. Tokens are only paid for improving on the best
    /// previous marks, and the stored result is the best attempt.
    pub async fn submit_quiz(
        &self,
        learner_id: Uuid,
        course_id: Uuid,
        results: Vec<QuizResultEntry>,
        marks: i32,
    ) -> ProgressResult<QuizOutcome> {
        if results.is_empty() {
            return Err(ProgressError::InvalidRequest("Missing required fields".to_string()));
        }
        if !(0..=MAX_MARKS).contains(&marks) {
            return Err(ProgressError::InvalidRequest(format!(
                "Marks must be between 0 and {MAX_MARKS}"
            )));
        }

        let _guard = self.locks.acquire(learner_id).await;
        let mut learner = self.db.get_learner(learner_id).await?;
        let mut course = match self.db.get_course(course_id).await {
            Ok(course) if course.is_owned_by(learner_id) => course,
            Ok(_) | Err(PortError::NotFound(_)) => {
                return Err(ProgressError::RecordNotFound(format!("Course {course_id} not found")));
            }
            Err(e) => return Err(e.into()),
        };

        let previous_best = course.quiz_marks;
        let credited = learner.tokens.credit_if_improved(marks, previous_best);
        self.touch(&mut learner, self.clock.now());

        if marks >= previous_best {
            course.quiz_result = results;
            course.quiz_marks = marks;
        }
        self.db.update_course_and_learner(&course, &learner).await?;

        Ok(QuizOutcome {
            tokens: learner.tokens.balance(),
            credited,
            streak: learner.streak,
            best_marks: course.quiz_marks,
        })
    }

    // --- Recommendations ---

    pub async fn recommendations(&self, learner_id: Uuid) -> ProgressResult<Recommendations> {
        let learner = self.db.get_learner(learner_id).await?;
        let owned = self.db.courses_owned_by(learner_id).await?;
        let profile = LearnerProfile::new(learner_id, learner.quiz_marks, learner.domains, &owned);
        let allowed = profile.allowed_difficulties();

        let domain_queries = try_join_all(profile.domains.iter().map(|domain| async move {
            if allowed.is_empty() {
                return Ok::<_, PortError>(Vec::new());
            }
            self.db
                .recommendation_candidates(learner_id, domain, allowed)
                .await
        }));
        let (per_domain, others) = futures::try_join!(
            domain_queries,
            self.db.miscellaneous_candidates(learner_id)
        )?;

        Ok(self.with_rng(|rng| {
            let domains = profile
                .domains
                .iter()
                .zip(per_domain)
                .map(|(domain, candidates)| recommend_domain(&profile, domain, candidates, rng))
                .collect();
            let miscellaneous = recommend_miscellaneous(&profile, others, rng);
            Recommendations {
                domains,
                miscellaneous,
            }
        }))
    }
}

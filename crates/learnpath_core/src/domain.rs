//! crates/learnpath_core/src/domain.rs
//!
//! Defines the core data structures for the learning platform: learners,
//! courses and the quiz bank. Nested course content derives serde so the
//! storage adapter can keep it as documents.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::ledger::Tokens;

/// A course's fixed level, and the unit of a learner's allowed band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Difficulty {
    Easy,
    Intermediate,
    Advanced,
}

impl Difficulty {
    pub const ALL: [Difficulty; 3] = [Difficulty::Easy, Difficulty::Intermediate, Difficulty::Advanced];

    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "Easy",
            Difficulty::Intermediate => "Intermediate",
            Difficulty::Advanced => "Advanced",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown difficulty label: {0}")]
pub struct UnknownDifficulty(pub String);

impl FromStr for Difficulty {
    type Err = UnknownDifficulty;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "Easy" => Ok(Difficulty::Easy),
            "Intermediate" => Ok(Difficulty::Intermediate),
            "Advanced" => Ok(Difficulty::Advanced),
            other => Err(UnknownDifficulty(other.to_string())),
        }
    }
}

/// A multiple-choice question stored in the shared quiz bank.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizBankItem {
    pub id: Uuid,
    pub question: String,
    pub options: Vec<String>,
    pub correct_ans: String,
    pub category: String,
}

/// A registered learner and their progression state.
#[derive(Debug, Clone)]
pub struct Learner {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub domains: Vec<String>,
    /// Initial assessment, emptied once it has been attempted.
    pub quiz: Vec<QuizBankItem>,
    pub quiz_marks: i32,
    pub tokens: Tokens,
    pub streak: u32,
    pub last_active: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

// Only used internally for login - contains sensitive data
#[derive(Debug, Clone)]
pub struct LearnerCredentials {
    pub learner_id: Uuid,
    pub email: String,
    pub hashed_password: String,
}

// Represents a browser login session (auth cookie)
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub id: String,
    pub learner_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub learner_id: Uuid,
    pub name: String,
    pub email: String,
    pub tokens: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterContent {
    pub topic: String,
    pub explain: String,
    pub code: Option<String>,
    pub example: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chapter {
    pub chapter_name: String,
    pub content: Vec<ChapterContent>,
}

/// A quiz question embedded in a course.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizQuestion {
    pub question: String,
    pub options: Vec<String>,
    pub correct_ans: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flashcard {
    pub front: String,
    pub back: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QaItem {
    pub question: String,
    pub answer: String,
}

/// One graded answer of a quiz submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizResultEntry {
    pub question: String,
    pub is_correct: bool,
    pub user_answer: String,
    pub correct_answer: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Video {
    pub url: String,
    pub title: String,
    pub thumbnail: Option<String>,
}

/// A course owned by one learner, or an owner-less template.
#[derive(Debug, Clone, PartialEq)]
pub struct CourseRecord {
    pub id: Uuid,
    pub course_title: String,
    pub description: String,
    pub category: String,
    pub difficulty: Difficulty,
    pub banner_image: String,
    pub created_by: Option<Uuid>,
    pub chapters: Vec<Chapter>,
    pub quiz: Vec<QuizQuestion>,
    pub flashcards: Vec<Flashcard>,
    pub qa: Vec<QaItem>,
    pub completed_chapter: Vec<u32>,
    pub quiz_result: Vec<QuizResultEntry>,
    pub quiz_marks: i32,
    pub videos: Vec<Video>,
    pub created_at: DateTime<Utc>,
}

impl CourseRecord {
    /// The key courses are grouped and compared by.
    pub fn title_key(&self) -> String {
        normalize_title(&self.course_title)
    }

    pub fn is_owned_by(&self, learner_id: Uuid) -> bool {
        self.created_by == Some(learner_id)
    }

    /// Creates an independent copy for `owner` with fresh progress.
    pub fn copy_for(&self, owner: Uuid, now: DateTime<Utc>) -> CourseRecord {
        CourseRecord {
            id: Uuid::new_v4(),
            created_by: Some(owner),
            completed_chapter: Vec::new(),
            quiz_result: Vec::new(),
            quiz_marks: 0,
            created_at: now,
            ..self.clone()
        }
    }
}

/// The listing fields of a course, without its content. Recommendation
/// candidates travel in this shape.
#[derive(Debug, Clone, PartialEq)]
pub struct CourseListing {
    pub id: Uuid,
    pub course_title: String,
    pub category: String,
    pub difficulty: Difficulty,
    pub banner_image: String,
    pub created_by: Option<Uuid>,
    pub chapters_count: usize,
    pub completed_chapters_count: usize,
    pub created_at: DateTime<Utc>,
}

impl CourseListing {
    pub fn title_key(&self) -> String {
        normalize_title(&self.course_title)
    }

    pub fn is_owned_by(&self, learner_id: Uuid) -> bool {
        self.created_by == Some(learner_id)
    }
}

impl From<&CourseRecord> for CourseListing {
    fn from(course: &CourseRecord) -> Self {
        Self {
            id: course.id,
            course_title: course.course_title.clone(),
            category: course.category.clone(),
            difficulty: course.difficulty,
            banner_image: course.banner_image.clone(),
            created_by: course.created_by,
            chapters_count: course.chapters.len(),
            completed_chapters_count: course.completed_chapter.len(),
            created_at: course.created_at,
        }
    }
}

pub fn normalize_title(title: &str) -> String {
    title.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn difficulty_round_trips_through_its_label() {
        for d in Difficulty::ALL {
            assert_eq!(d.as_str().parse::<Difficulty>(), Ok(d));
        }
        assert!("Expert".parse::<Difficulty>().is_err());
    }

    #[test]
    fn normalized_titles_ignore_case_and_padding() {
        assert_eq!(normalize_title("  Intro to Algorithms "), "intro to algorithms");
    }
}

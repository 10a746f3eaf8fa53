pub mod difficulty;
pub mod distractors;
pub mod domain;
pub mod draft;
pub mod error;
pub mod ledger;
pub mod locks;
pub mod ports;
pub mod recommend;
pub mod service;
pub mod streak;

pub use domain::{
    AuthSession, Chapter, ChapterContent, CourseListing, CourseRecord, Difficulty, Flashcard, LeaderboardEntry,
    Learner, LearnerCredentials, QaItem, QuizBankItem, QuizQuestion, QuizResultEntry, Video,
};
pub use error::{ProgressError, ProgressResult};
pub use ports::{CourseGenerationService, DatabaseService, PortError, PortResult, VideoSearchService};
pub use service::ProgressionService;

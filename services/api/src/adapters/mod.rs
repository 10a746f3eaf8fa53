pub mod course_llm;
pub mod db;
pub mod video_search;

pub use course_llm::OpenAiCourseAdapter;
pub use db::DbAdapter;
pub use video_search::YoutubeSearchAdapter;

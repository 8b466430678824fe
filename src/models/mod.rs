mod course;
mod activity;
mod recommendation;

pub use activity::{Activity, CompletionReport, CompletionStatus, Section};
pub use course::{Course, EnrolledUser, Tag, SITE_COURSE_ID};
pub use recommendation::{RecommendedItem, Recommendation, SourceContribution, Strategy};

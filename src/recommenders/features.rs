//! Text normalization and feature extraction for content matching.

use crate::models::{Activity, Course};

/// Longest raw text we feed into normalization
const MAX_CONTENT_LENGTH: usize = 10_000;

/// Shortest normalized text worth analyzing
pub const MIN_DESCRIPTION_LENGTH: usize = 10;

/// Times tag text is repeated inside course content to raise its weight
const TAG_REPEAT: usize = 3;

/// Normalizes raw platform text for similarity analysis.
///
/// Input is truncated to a fixed length, markup tags are dropped, the text
/// is lowercased, punctuation becomes whitespace, and runs of whitespace
/// collapse to single spaces.
pub fn clean_text(text: &str) -> String {
    let mut stripped = String::with_capacity(text.len().min(MAX_CONTENT_LENGTH));
    let mut in_tag = false;

    for ch in text.chars().take(MAX_CONTENT_LENGTH) {
        match ch {
            '<' => in_tag = true,
            '>' if in_tag => {
                in_tag = false;
                stripped.push(' ');
            }
            _ if in_tag => {}
            _ => stripped.push(ch),
        }
    }

    let mut cleaned = String::with_capacity(stripped.len());
    let mut last_was_space = true;

    for ch in stripped.chars() {
        if ch.is_alphanumeric() || ch == '_' {
            cleaned.extend(ch.to_lowercase());
            last_was_space = false;
        } else if !last_was_space {
            cleaned.push(' ');
            last_was_space = true;
        }
    }

    if cleaned.ends_with(' ') {
        cleaned.pop();
    }
    cleaned
}

/// Text features of one course, ready for vectorization
#[derive(Debug, Clone)]
pub struct CourseFeatures {
    pub course_id: i64,
    pub content: String,
    pub tags: Vec<String>,
}

impl CourseFeatures {
    pub fn has_analyzable_content(&self) -> bool {
        self.content.len() >= MIN_DESCRIPTION_LENGTH
    }
}

/// Builds the analyzable text of a course from its title, summary, and
/// category name. Tag names are appended repeatedly so shared tags pull
/// similar courses together harder than body text does.
pub fn course_features(course: &Course, tags: &[String]) -> CourseFeatures {
    let mut parts: Vec<String> = [&course.fullname, &course.summary, &course.category_name]
        .iter()
        .map(|field| clean_text(field))
        .filter(|part| !part.is_empty())
        .collect();

    if !tags.is_empty() {
        let tag_text = clean_text(&tags.join(" "));
        if !tag_text.is_empty() {
            for _ in 0..TAG_REPEAT {
                parts.push(tag_text.clone());
            }
        }
    }

    CourseFeatures {
        course_id: course.id,
        content: parts.join(" "),
        tags: tags.to_vec(),
    }
}

/// Builds the analyzable text of an activity from its name, description,
/// and module type
pub fn activity_content(activity: &Activity) -> String {
    [&activity.name, &activity.description, &activity.mod_type]
        .iter()
        .map(|field| clean_text(field))
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_text_strips_markup_and_punctuation() {
        let cleaned = clean_text("<p>Intro to <b>Rust</b>: ownership, borrowing!</p>");
        assert_eq!(cleaned, "intro to rust ownership borrowing");
    }

    #[test]
    fn test_clean_text_collapses_whitespace() {
        assert_eq!(clean_text("  too   many\n\nspaces "), "too many spaces");
    }

    #[test]
    fn test_clean_text_empty_input() {
        assert_eq!(clean_text(""), "");
        assert_eq!(clean_text("<div></div>"), "");
    }

    #[test]
    fn test_course_features_repeat_tags() {
        let course = Course {
            id: 3,
            fullname: "Databases".to_string(),
            summary: "SQL basics".to_string(),
            category_id: 1,
            category_name: "CS".to_string(),
            time_created: 0,
        };

        let features = course_features(&course, &["postgres".to_string()]);
        assert_eq!(features.course_id, 3);
        assert_eq!(features.content.matches("postgres").count(), 3);
        assert!(features.content.starts_with("databases sql basics cs"));
    }

    #[test]
    fn test_activity_content_joins_fields() {
        let activity = Activity {
            id: 1,
            name: "Week 1 Quiz".to_string(),
            description: "<p>Covers chapter one.</p>".to_string(),
            mod_type: "quiz".to_string(),
        };

        assert_eq!(activity_content(&activity), "week 1 quiz covers chapter one quiz");
    }
}

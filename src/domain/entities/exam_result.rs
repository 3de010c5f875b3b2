use chrono::NaiveDateTime;
use serde::Serialize;
use uuid::Uuid;

use super::subscription::ExamMode;

/// Per-subject breakdown of a sitting.
#[derive(Debug, Clone, Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectResult {
    pub subject: String,
    pub score: i32,
    pub total: i32,
}

/// Stored answer, kept for later review.
#[derive(Debug, Clone, Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamAnswer {
    pub question_id: String,
    pub selected_option: String,
    pub correct_option: String,
    pub is_correct: bool,
}

/// A finished exam sitting. Written by the exam-taking service; this crate
/// only reads them for history and analytics.
#[derive(Debug, Clone)]
pub struct ExamResult {
    pub id: Uuid,
    pub user_id: Uuid,
    pub mode: ExamMode,
    pub score: i32,
    pub total_obtainable: i32,
    pub is_passed: bool,
    pub subjects: Vec<SubjectResult>,
    pub answers: Vec<ExamAnswer>,
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    pub duration_seconds: i32,
    pub feedback: Option<String>,
    pub created_at: NaiveDateTime,
}

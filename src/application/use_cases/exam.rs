use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tracing::instrument;
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    domain::entities::{exam_result::ExamResult, subscription::ExamMode},
};

/// Pass/fail tallies for a user.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExamCounts {
    pub total: i64,
    pub passed: i64,
    pub failed: i64,
}

#[async_trait]
pub trait ExamResultRepo: Send + Sync {
    /// Page of results, newest first, with the total row count for the
    /// filter.
    async fn history(
        &self,
        user_id: Uuid,
        mode: Option<ExamMode>,
        page: i64,
        limit: i64,
    ) -> AppResult<(Vec<ExamResult>, i64)>;
    /// Only resolves when the result belongs to the caller.
    async fn find_for_user(&self, exam_id: Uuid, user_id: Uuid) -> AppResult<Option<ExamResult>>;
    async fn counts(&self, user_id: Uuid) -> AppResult<ExamCounts>;
    /// (score, total_obtainable) pairs of every passed exam.
    async fn passed_scores(&self, user_id: Uuid) -> AppResult<Vec<(i32, i32)>>;
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamHistoryPage {
    pub exams: Vec<ExamSummary>,
    pub total: i64,
    pub pages: i64,
}

/// List-view projection; answers are only loaded on the detail view.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamSummary {
    pub id: Uuid,
    pub mode: ExamMode,
    pub score: i32,
    pub total_obtainable: i32,
    pub is_passed: bool,
    pub duration_seconds: i32,
    pub created_at: chrono::NaiveDateTime,
}

impl From<&ExamResult> for ExamSummary {
    fn from(result: &ExamResult) -> Self {
        Self {
            id: result.id,
            mode: result.mode,
            score: result.score,
            total_obtainable: result.total_obtainable,
            is_passed: result.is_passed,
            duration_seconds: result.duration_seconds,
            created_at: result.created_at,
        }
    }
}

/// Dashboard aggregates.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsSummary {
    pub total_exams_written: i64,
    pub exams_passed: i64,
    pub exams_failed: i64,
    /// Mean percentage across passed exams, rounded to a whole number.
    pub performance_average: i64,
}

#[derive(Clone)]
pub struct ExamUseCases {
    results: Arc<dyn ExamResultRepo>,
}

impl ExamUseCases {
    pub fn new(results: Arc<dyn ExamResultRepo>) -> Self {
        Self { results }
    }

    #[instrument(skip(self))]
    pub async fn history(
        &self,
        user_id: Uuid,
        mode: Option<ExamMode>,
        page: i64,
        limit: i64,
    ) -> AppResult<ExamHistoryPage> {
        let page = page.max(1);
        let limit = limit.clamp(1, 50);

        let (results, total) = self.results.history(user_id, mode, page, limit).await?;
        Ok(ExamHistoryPage {
            exams: results.iter().map(ExamSummary::from).collect(),
            total,
            pages: (total + limit - 1) / limit,
        })
    }

    #[instrument(skip(self))]
    pub async fn detail(&self, exam_id: Uuid, user_id: Uuid) -> AppResult<ExamResult> {
        self.results
            .find_for_user(exam_id, user_id)
            .await?
            .ok_or(AppError::NotFound("Exam result"))
    }

    #[instrument(skip(self))]
    pub async fn analytics(&self, user_id: Uuid) -> AppResult<AnalyticsSummary> {
        let counts = self.results.counts(user_id).await?;
        let passed = self.results.passed_scores(user_id).await?;

        let performance_average = if passed.is_empty() {
            0
        } else {
            let total_percentage: f64 = passed
                .iter()
                .map(|(score, obtainable)| f64::from(*score) / f64::from(*obtainable) * 100.0)
                .sum();
            (total_percentage / passed.len() as f64).round() as i64
        };

        Ok(AnalyticsSummary {
            total_exams_written: counts.total,
            exams_passed: counts.passed,
            exams_failed: counts.failed,
            performance_average,
        })
    }
}

/// Canned encouragement by percentage band, shown with a result detail.
pub fn score_feedback(score: i32, total: i32) -> &'static str {
    let percentage = if total <= 0 {
        0.0
    } else {
        f64::from(score) / f64::from(total) * 100.0
    };

    if percentage >= 80.0 {
        "Excellent work! You've mastered this subject. Keep it up!"
    } else if percentage >= 60.0 {
        "Good job! You have a solid understanding, but there's room for improvement in some areas."
    } else if percentage >= 50.0 {
        "You passed, but barely. Review the topics you missed to strengthen your knowledge."
    } else if percentage >= 40.0 {
        "You're close to passing. Focus on your weak areas and try again."
    } else {
        "Don't give up. Identify your weak subjects and dedicate more time to study them before the next attempt."
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{factories::exam_result, mocks::InMemoryExamResultRepo};

    #[tokio::test]
    async fn history_paginates_newest_first() {
        let repo = Arc::new(InMemoryExamResultRepo::new());
        let user_id = Uuid::new_v4();
        for i in 0..7 {
            repo.push(exam_result(user_id, ExamMode::PureJamb, 200 + i, 400, true, i.into()));
        }
        let exams = ExamUseCases::new(repo);

        let page = exams
            .history(user_id, None, 1, 3)
            .await
            .unwrap();
        assert_eq!(page.total, 7);
        assert_eq!(page.pages, 3);
        assert_eq!(page.exams.len(), 3);
        // Seeded with ascending timestamps: the newest (highest score) leads.
        assert_eq!(page.exams[0].score, 206);

        let last = exams.history(user_id, None, 3, 3).await.unwrap();
        assert_eq!(last.exams.len(), 1);
    }

    #[tokio::test]
    async fn history_filters_by_mode() {
        let repo = Arc::new(InMemoryExamResultRepo::new());
        let user_id = Uuid::new_v4();
        repo.push(exam_result(user_id, ExamMode::PureJamb, 250, 400, true, 0));
        repo.push(exam_result(user_id, ExamMode::SingleSubject, 40, 60, true, 1));
        let exams = ExamUseCases::new(repo);

        let page = exams
            .history(user_id, Some(ExamMode::SingleSubject), 1, 10)
            .await
            .unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.exams[0].mode, ExamMode::SingleSubject);
    }

    #[tokio::test]
    async fn detail_is_scoped_to_the_owner() {
        let repo = Arc::new(InMemoryExamResultRepo::new());
        let owner = Uuid::new_v4();
        let result = exam_result(owner, ExamMode::JambAi, 300, 400, true, 0);
        let exam_id = result.id;
        repo.push(result);
        let exams = ExamUseCases::new(repo);

        exams.detail(exam_id, owner).await.unwrap();

        let err = exams.detail(exam_id, Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn analytics_averages_only_passed_exams() {
        let repo = Arc::new(InMemoryExamResultRepo::new());
        let user_id = Uuid::new_v4();
        repo.push(exam_result(user_id, ExamMode::PureJamb, 300, 400, true, 0)); // 75%
        repo.push(exam_result(user_id, ExamMode::PureJamb, 200, 400, true, 1)); // 50%
        repo.push(exam_result(user_id, ExamMode::JambAi, 100, 400, false, 2));
        let exams = ExamUseCases::new(repo);

        let summary = exams.analytics(user_id).await.unwrap();
        assert_eq!(
            summary,
            AnalyticsSummary {
                total_exams_written: 3,
                exams_passed: 2,
                exams_failed: 1,
                performance_average: 63, // (75 + 50) / 2 rounded
            }
        );
    }

    #[tokio::test]
    async fn analytics_handles_no_results() {
        let exams = ExamUseCases::new(Arc::new(InMemoryExamResultRepo::new()));
        let summary = exams.analytics(Uuid::new_v4()).await.unwrap();
        assert_eq!(summary.performance_average, 0);
        assert_eq!(summary.total_exams_written, 0);
    }

    #[test]
    fn feedback_bands_cover_the_range() {
        assert!(score_feedback(320, 400).starts_with("Excellent"));
        assert!(score_feedback(240, 400).starts_with("Good job"));
        assert!(score_feedback(200, 400).starts_with("You passed"));
        assert!(score_feedback(160, 400).starts_with("You're close"));
        assert!(score_feedback(100, 400).starts_with("Don't give up"));
        assert!(score_feedback(10, 0).starts_with("Don't give up"));
    }
}

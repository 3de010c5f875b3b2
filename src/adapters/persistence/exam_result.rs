use async_trait::async_trait;
use chrono::NaiveDateTime;
use sqlx::types::Json;
use uuid::Uuid;

use crate::{
    adapters::persistence::{PostgresPersistence, parse_enum},
    app_error::{AppError, AppResult},
    domain::entities::{
        exam_result::{ExamAnswer, ExamResult, SubjectResult},
        subscription::ExamMode,
    },
    use_cases::exam::{ExamCounts, ExamResultRepo},
};

#[derive(sqlx::FromRow, Debug)]
struct ExamResultDb {
    id: Uuid,
    user_id: Uuid,
    mode: String,
    score: i32,
    total_obtainable: i32,
    is_passed: bool,
    subjects: Json<Vec<SubjectResult>>,
    answers: Json<Vec<ExamAnswer>>,
    start_time: NaiveDateTime,
    end_time: NaiveDateTime,
    duration_seconds: i32,
    feedback: Option<String>,
    created_at: NaiveDateTime,
}

impl ExamResultDb {
    fn into_result(self) -> AppResult<ExamResult> {
        Ok(ExamResult {
            id: self.id,
            user_id: self.user_id,
            mode: parse_enum(&self.mode, "exam mode")?,
            score: self.score,
            total_obtainable: self.total_obtainable,
            is_passed: self.is_passed,
            subjects: self.subjects.0,
            answers: self.answers.0,
            start_time: self.start_time,
            end_time: self.end_time,
            duration_seconds: self.duration_seconds,
            feedback: self.feedback,
            created_at: self.created_at,
        })
    }
}

const EXAM_COLUMNS: &str = "id, user_id, mode, score, total_obtainable, is_passed, subjects, \
     answers, start_time, end_time, duration_seconds, feedback, created_at";

#[async_trait]
impl ExamResultRepo for PostgresPersistence {
    async fn history(
        &self,
        user_id: Uuid,
        mode: Option<ExamMode>,
        page: i64,
        limit: i64,
    ) -> AppResult<(Vec<ExamResult>, i64)> {
        let offset = (page - 1) * limit;
        let mode_filter = mode.map(|m| m.as_ref().to_string());

        let rows = sqlx::query_as::<_, ExamResultDb>(&format!(
            "SELECT {EXAM_COLUMNS} FROM exam_results
             WHERE user_id = $1 AND ($2::text IS NULL OR mode = $2)
             ORDER BY created_at DESC
             LIMIT $3 OFFSET $4"
        ))
        .bind(user_id)
        .bind(&mode_filter)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from)?;

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM exam_results
             WHERE user_id = $1 AND ($2::text IS NULL OR mode = $2)",
        )
        .bind(user_id)
        .bind(&mode_filter)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::from)?;

        let results = rows
            .into_iter()
            .map(ExamResultDb::into_result)
            .collect::<AppResult<Vec<_>>>()?;
        Ok((results, total))
    }

    async fn find_for_user(&self, exam_id: Uuid, user_id: Uuid) -> AppResult<Option<ExamResult>> {
        let row = sqlx::query_as::<_, ExamResultDb>(&format!(
            "SELECT {EXAM_COLUMNS} FROM exam_results WHERE id = $1 AND user_id = $2"
        ))
        .bind(exam_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?;
        row.map(ExamResultDb::into_result).transpose()
    }

    async fn counts(&self, user_id: Uuid) -> AppResult<ExamCounts> {
        let (total, passed, failed): (i64, i64, i64) = sqlx::query_as(
            "SELECT COUNT(*),
                    COUNT(*) FILTER (WHERE is_passed),
                    COUNT(*) FILTER (WHERE NOT is_passed)
             FROM exam_results WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(ExamCounts {
            total,
            passed,
            failed,
        })
    }

    async fn passed_scores(&self, user_id: Uuid) -> AppResult<Vec<(i32, i32)>> {
        sqlx::query_as::<_, (i32, i32)>(
            "SELECT score, total_obtainable FROM exam_results
             WHERE user_id = $1 AND is_passed",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from)
    }
}

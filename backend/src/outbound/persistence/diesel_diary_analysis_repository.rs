//! PostgreSQL-backed `DiaryAnalysisRepository`.

use async_trait::async_trait;
use diesel_async::RunQueryDsl;

use crate::domain::DiaryAnalysis;
use crate::domain::ports::{DiaryAnalysisRepository, DiaryAnalysisRepositoryError};

use super::diesel_basic_error_mapping::{count_to_db, map_basic_diesel_error, map_basic_pool_error};
use super::models::NewDiaryAnalysisRow;
use super::pool::DbPool;
use super::schema::diary_analyses;

/// Insert-only Diesel repository for analysis rows.
#[derive(Clone)]
pub struct DieselDiaryAnalysisRepository {
    pool: DbPool,
}

impl DieselDiaryAnalysisRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn to_row(analysis: &DiaryAnalysis) -> Result<NewDiaryAnalysisRow, DiaryAnalysisRepositoryError> {
    let count = |value, column| count_to_db(value, column).map_err(DiaryAnalysisRepositoryError::query);
    Ok(NewDiaryAnalysisRow {
        id: analysis.id,
        diary_id: *analysis.diary_id.as_uuid(),
        user_id: *analysis.user_id.as_uuid(),
        family_id: *analysis.family_id.as_uuid(),
        char_count: count(analysis.char_count, "char_count")?,
        sentence_count: count(analysis.sentence_count, "sentence_count")?,
        accuracy_score: i16::from(analysis.accuracy_score),
        created_at: analysis.created_at,
    })
}

#[async_trait]
impl DiaryAnalysisRepository for DieselDiaryAnalysisRepository {
    async fn insert(&self, analysis: &DiaryAnalysis) -> Result<(), DiaryAnalysisRepositoryError> {
        let row = to_row(analysis)?;
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|err| map_basic_pool_error(err, DiaryAnalysisRepositoryError::connection))?;

        diesel::insert_into(diary_analyses::table)
            .values(&row)
            .execute(&mut conn)
            .await
            .map(|_| ())
            .map_err(|err| {
                map_basic_diesel_error(
                    err,
                    "insert diary analysis",
                    DiaryAnalysisRepositoryError::query,
                    DiaryAnalysisRepositoryError::connection,
                )
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DiaryId, FamilyId, UserId};
    use chrono::{TimeZone, Utc};
    use rstest::rstest;
    use uuid::Uuid;

    #[rstest]
    fn analysis_maps_to_row() {
        let analysis = DiaryAnalysis {
            id: Uuid::new_v4(),
            diary_id: DiaryId::random(),
            user_id: UserId::random(),
            family_id: FamilyId::random(),
            char_count: 42,
            sentence_count: 3,
            accuracy_score: 95,
            created_at: Utc.with_ymd_and_hms(2025, 1, 6, 3, 0, 0).single().expect("valid time"),
        };
        let row = to_row(&analysis).expect("row");

        assert_eq!(row.diary_id, *analysis.diary_id.as_uuid());
        assert_eq!(row.char_count, 42);
        assert_eq!(row.sentence_count, 3);
        assert_eq!(row.accuracy_score, 95);
    }
}

// Copyright 2024-2025 Aprio One AB, Sweden
// Author: Kenneth Pernyer, kenneth@aprio.one
// SPDX-License-Identifier: MIT
// See LICENSE file in the project root for full license information.

use super::{store_error, Database};
use async_trait::async_trait;
use libsql::params;
use seatscope_core::analysis::{Analysis, AnalysisStatus, AnalysisSummary};
use seatscope_core::error::{Error, Result};
use seatscope_core::recommendation::Recommendation;
use seatscope_core::repository::AnalysisRepository;
use seatscope_core::{AnalysisId, TenantId};

fn status_to_str(status: AnalysisStatus) -> &'static str {
    match status {
        AnalysisStatus::Pending => "pending",
        AnalysisStatus::Running => "running",
        AnalysisStatus::Completed => "completed",
        AnalysisStatus::Failed => "failed",
    }
}

fn status_from_str(raw: &str) -> Result<AnalysisStatus> {
    match raw {
        "pending" => Ok(AnalysisStatus::Pending),
        "running" => Ok(AnalysisStatus::Running),
        "completed" => Ok(AnalysisStatus::Completed),
        "failed" => Ok(AnalysisStatus::Failed),
        other => Err(Error::InternalInvariant(format!("unknown analysis status {other}"))),
    }
}

fn row_to_analysis(row: &libsql::Row) -> Result<Analysis> {
    let id: String = row.get(0).map_err(store_error)?;
    let tenant_id: String = row.get(1).map_err(store_error)?;
    let summary_json: Option<String> = row.get(4).map_err(store_error)?;
    let summary: Option<AnalysisSummary> = summary_json.map(|raw| super::decode_json(&raw)).transpose()?;
    Ok(Analysis {
        id: AnalysisId::from(uuid::Uuid::parse_str(&id).map_err(|e| Error::InternalInvariant(e.to_string()))?),
        tenant_id: TenantId::from(uuid::Uuid::parse_str(&tenant_id).map_err(|e| Error::InternalInvariant(e.to_string()))?),
        analyzed_at: row
            .get::<String>(2)
            .map_err(store_error)?
            .parse()
            .map_err(|e: chrono::ParseError| Error::InternalInvariant(e.to_string()))?,
        status: status_from_str(&row.get::<String>(3).map_err(store_error)?)?,
        summary,
        error_message: row.get(5).map_err(store_error)?,
    })
}

const SELECT_COLUMNS: &str = "id, tenant_id, analyzed_at, status, summary_json, error_message";

pub struct LibsqlAnalysisRepository {
    db: Database,
}

impl LibsqlAnalysisRepository {
    pub(crate) fn new(db: Database) -> Self {
        Self { db }
    }

    /// Inserts or updates the `analyses` row for `analysis`, independent of
    /// the recommendation set. Used by the orchestrator to record the
    /// initial `running` row before any recommendation exists (spec §4.9
    /// step 1).
    pub async fn upsert(&self, analysis: &Analysis) -> Result<()> {
        let summary_json = analysis.summary.as_ref().map(super::encode_json);
        self.db
            .conn()
            .execute(
                "INSERT INTO analyses (id, tenant_id, analyzed_at, status, summary_json, error_message) \
                 VALUES (?1,?2,?3,?4,?5,?6) \
                 ON CONFLICT(id) DO UPDATE SET status=excluded.status, summary_json=excluded.summary_json, \
                 error_message=excluded.error_message",
                params![
                    analysis.id.to_string(),
                    analysis.tenant_id.to_string(),
                    analysis.analyzed_at.to_rfc3339(),
                    status_to_str(analysis.status).to_string(),
                    summary_json,
                    analysis.error_message.clone(),
                ],
            )
            .await
            .map_err(store_error)?;
        Ok(())
    }
}

#[async_trait]
impl AnalysisRepository for LibsqlAnalysisRepository {
    async fn get(&self, tenant_id: TenantId, analysis_id: AnalysisId) -> Result<Analysis> {
        let mut rows = self
            .db
            .conn()
            .query(
                &format!("SELECT {SELECT_COLUMNS} FROM analyses WHERE tenant_id = ?1 AND id = ?2"),
                params![tenant_id.to_string(), analysis_id.to_string()],
            )
            .await
            .map_err(store_error)?;
        match rows.next().await.map_err(store_error)? {
            Some(row) => row_to_analysis(&row),
            None => Err(Error::NotFound(format!("analysis {analysis_id}"))),
        }
    }

    async fn list_for_tenant(&self, tenant_id: TenantId) -> Result<Vec<Analysis>> {
        let mut rows = self
            .db
            .conn()
            .query(
                &format!("SELECT {SELECT_COLUMNS} FROM analyses WHERE tenant_id = ?1 ORDER BY analyzed_at DESC"),
                params![tenant_id.to_string()],
            )
            .await
            .map_err(store_error)?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await.map_err(store_error)? {
            out.push(row_to_analysis(&row)?);
        }
        Ok(out)
    }

    async fn persist_completed(&self, analysis: &Analysis, recommendations: &[Recommendation]) -> Result<()> {
        let tx = self.db.conn().transaction().await.map_err(store_error)?;

        let summary_json = analysis.summary.as_ref().map(super::encode_json);
        tx.execute(
            "INSERT INTO analyses (id, tenant_id, analyzed_at, status, summary_json, error_message) \
             VALUES (?1,?2,?3,?4,?5,?6) \
             ON CONFLICT(id) DO UPDATE SET status=excluded.status, summary_json=excluded.summary_json, \
             error_message=excluded.error_message",
            params![
                analysis.id.to_string(),
                analysis.tenant_id.to_string(),
                analysis.analyzed_at.to_rfc3339(),
                status_to_str(analysis.status).to_string(),
                summary_json,
                analysis.error_message.clone(),
            ],
        )
        .await
        .map_err(store_error)?;

        for rec in recommendations {
            tx.execute(
                "INSERT INTO recommendations (id, analysis_id, user_id, current_sku, recommended_sku, \
                 savings_monthly_cents, action, reason_code, reason_text, status, created_at, updated_at) \
                 VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12)",
                params![
                    rec.id.to_string(),
                    rec.analysis_id.to_string(),
                    rec.user_id.to_string(),
                    rec.current_sku.clone(),
                    rec.recommended_sku.clone(),
                    rec.savings_monthly.cents(),
                    super::recommendations::action_to_str(rec.action).to_string(),
                    super::recommendations::reason_code_to_str(rec.reason_code).to_string(),
                    rec.reason_text.clone(),
                    super::recommendations::status_to_str(rec.status).to_string(),
                    rec.created_at.to_rfc3339(),
                    rec.updated_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(store_error)?;
        }

        tx.commit().await.map_err(store_error)?;
        Ok(())
    }
}

// Copyright 2024-2025 Aprio One AB, Sweden
// Author: Kenneth Pernyer, kenneth@aprio.one
// SPDX-License-Identifier: MIT
// See LICENSE file in the project root for full license information.

use super::{store_error, Database};
use async_trait::async_trait;
use libsql::params;
use seatscope_core::error::{Error, Result};
use seatscope_core::money::Money;
use seatscope_core::recommendation::{Action, ReasonCode, Recommendation, RecommendationStatus};
use seatscope_core::repository::RecommendationRepository;
use seatscope_core::{AnalysisId, RecommendationId, UserId};

pub(crate) fn action_to_str(action: Action) -> &'static str {
    match action {
        Action::Remove => "remove",
        Action::Downgrade => "downgrade",
        Action::Upgrade => "upgrade",
        Action::NoChange => "no_change",
    }
}

fn action_from_str(raw: &str) -> Result<Action> {
    match raw {
        "remove" => Ok(Action::Remove),
        "downgrade" => Ok(Action::Downgrade),
        "upgrade" => Ok(Action::Upgrade),
        "no_change" => Ok(Action::NoChange),
        other => Err(Error::InternalInvariant(format!("unknown action {other}"))),
    }
}

pub(crate) fn reason_code_to_str(code: ReasonCode) -> &'static str {
    match code {
        ReasonCode::RemoveInactive => "remove_inactive",
        ReasonCode::RemoveAccountDisabled => "remove_account_disabled",
        ReasonCode::DowngradeE5ToE3 => "downgrade_e5_to_e3",
        ReasonCode::DowngradeE3ToE1 => "downgrade_e3_to_e1",
        ReasonCode::DowngradeToFrontline => "downgrade_to_frontline",
        ReasonCode::NoChange => "no_change",
    }
}

fn reason_code_from_str(raw: &str) -> Result<ReasonCode> {
    match raw {
        "remove_inactive" => Ok(ReasonCode::RemoveInactive),
        "remove_account_disabled" => Ok(ReasonCode::RemoveAccountDisabled),
        "downgrade_e5_to_e3" => Ok(ReasonCode::DowngradeE5ToE3),
        "downgrade_e3_to_e1" => Ok(ReasonCode::DowngradeE3ToE1),
        "downgrade_to_frontline" => Ok(ReasonCode::DowngradeToFrontline),
        "no_change" => Ok(ReasonCode::NoChange),
        other => Err(Error::InternalInvariant(format!("unknown reason code {other}"))),
    }
}

pub(crate) fn status_to_str(status: RecommendationStatus) -> &'static str {
    match status {
        RecommendationStatus::Pending => "pending",
        RecommendationStatus::Accepted => "accepted",
        RecommendationStatus::Rejected => "rejected",
    }
}

fn status_from_str(raw: &str) -> Result<RecommendationStatus> {
    match raw {
        "pending" => Ok(RecommendationStatus::Pending),
        "accepted" => Ok(RecommendationStatus::Accepted),
        "rejected" => Ok(RecommendationStatus::Rejected),
        other => Err(Error::InternalInvariant(format!("unknown recommendation status {other}"))),
    }
}

fn row_to_recommendation(row: &libsql::Row) -> Result<Recommendation> {
    let id: String = row.get(0).map_err(store_error)?;
    let analysis_id: String = row.get(1).map_err(store_error)?;
    let user_id: String = row.get(2).map_err(store_error)?;
    Ok(Recommendation {
        id: RecommendationId::from(uuid::Uuid::parse_str(&id).map_err(|e| Error::InternalInvariant(e.to_string()))?),
        analysis_id: AnalysisId::from(uuid::Uuid::parse_str(&analysis_id).map_err(|e| Error::InternalInvariant(e.to_string()))?),
        user_id: UserId::from(uuid::Uuid::parse_str(&user_id).map_err(|e| Error::InternalInvariant(e.to_string()))?),
        current_sku: row.get(3).map_err(store_error)?,
        recommended_sku: row.get(4).map_err(store_error)?,
        savings_monthly: Money::from_cents(row.get(5).map_err(store_error)?),
        action: action_from_str(&row.get::<String>(6).map_err(store_error)?)?,
        reason_code: reason_code_from_str(&row.get::<String>(7).map_err(store_error)?)?,
        reason_text: row.get(8).map_err(store_error)?,
        status: status_from_str(&row.get::<String>(9).map_err(store_error)?)?,
        created_at: row
            .get::<String>(10)
            .map_err(store_error)?
            .parse()
            .map_err(|e: chrono::ParseError| Error::InternalInvariant(e.to_string()))?,
        updated_at: row
            .get::<String>(11)
            .map_err(store_error)?
            .parse()
            .map_err(|e: chrono::ParseError| Error::InternalInvariant(e.to_string()))?,
    })
}

const SELECT_COLUMNS: &str = "id, analysis_id, user_id, current_sku, recommended_sku, savings_monthly_cents, \
    action, reason_code, reason_text, status, created_at, updated_at";

pub struct LibsqlRecommendationRepository {
    db: Database,
}

impl LibsqlRecommendationRepository {
    pub(crate) fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl RecommendationRepository for LibsqlRecommendationRepository {
    async fn list_for_analysis(&self, analysis_id: AnalysisId) -> Result<Vec<Recommendation>> {
        let mut rows = self
            .db
            .conn()
            .query(
                &format!("SELECT {SELECT_COLUMNS} FROM recommendations WHERE analysis_id = ?1"),
                params![analysis_id.to_string()],
            )
            .await
            .map_err(store_error)?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await.map_err(store_error)? {
            out.push(row_to_recommendation(&row)?);
        }
        Ok(out)
    }

    async fn get(&self, id: RecommendationId) -> Result<Recommendation> {
        let mut rows = self
            .db
            .conn()
            .query(&format!("SELECT {SELECT_COLUMNS} FROM recommendations WHERE id = ?1"), params![id.to_string()])
            .await
            .map_err(store_error)?;
        match rows.next().await.map_err(store_error)? {
            Some(row) => row_to_recommendation(&row),
            None => Err(Error::NotFound(format!("recommendation {id}"))),
        }
    }

    async fn apply_decision(&self, id: RecommendationId, accept: bool) -> Result<Recommendation> {
        let mut recommendation = self.get(id).await?;
        recommendation.apply(accept)?;

        let rows_affected = self
            .db
            .conn()
            .execute(
                "UPDATE recommendations SET status = ?1, updated_at = ?2 WHERE id = ?3 AND status = 'pending'",
                params![
                    status_to_str(recommendation.status).to_string(),
                    recommendation.updated_at.to_rfc3339(),
                    id.to_string(),
                ],
            )
            .await
            .map_err(store_error)?;

        if rows_affected == 0 {
            return Err(Error::InvalidTransition);
        }

        Ok(recommendation)
    }
}

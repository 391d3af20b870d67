// Copyright 2024-2025 Aprio One AB, Sweden
// Author: Kenneth Pernyer, kenneth@aprio.one
// SPDX-License-Identifier: MIT
// See LICENSE file in the project root for full license information.

//! Analysis snapshot entity and its aggregate summary.

use crate::ids::{AnalysisId, TenantId};
use crate::money::Money;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

/// Aggregate cost/savings summary for one analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisSummary {
    pub total_users_analyzed: u32,
    pub total_current_monthly_cost: Money,
    pub total_optimized_monthly_cost: Money,
    pub potential_savings_monthly: Money,
    pub potential_savings_annual: Money,
    pub recommendation_count: u32,
    /// Count of recommendations per action (remove/downgrade/upgrade/no_change).
    pub breakdown_by_action: BTreeMap<String, u32>,
}

impl AnalysisSummary {
    #[must_use]
    pub fn empty() -> Self {
        Self {
            total_users_analyzed: 0,
            total_current_monthly_cost: Money::ZERO,
            total_optimized_monthly_cost: Money::ZERO,
            potential_savings_monthly: Money::ZERO,
            potential_savings_annual: Money::ZERO,
            recommendation_count: 0,
            breakdown_by_action: BTreeMap::new(),
        }
    }
}

/// An immutable snapshot pairing a tenant at a point in time with a set of
/// per-user recommendations. Immutable once in a terminal state
/// (`completed` or `failed`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Analysis {
    pub id: AnalysisId,
    pub tenant_id: TenantId,
    pub analyzed_at: DateTime<Utc>,
    pub status: AnalysisStatus,
    pub summary: Option<AnalysisSummary>,
    pub error_message: Option<String>,
}

impl Analysis {
    #[must_use]
    pub fn new(tenant_id: TenantId) -> Self {
        Self {
            id: AnalysisId::new(),
            tenant_id,
            analyzed_at: Utc::now(),
            status: AnalysisStatus::Running,
            summary: None,
            error_message: None,
        }
    }

    pub fn complete(&mut self, summary: AnalysisSummary) {
        self.summary = Some(summary);
        self.status = AnalysisStatus::Completed;
    }

    pub fn fail(&mut self, message: impl Into<String>) {
        self.error_message = Some(message.into());
        self.status = AnalysisStatus::Failed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_analysis_starts_running_with_no_summary() {
        let analysis = Analysis::new(TenantId::new());
        assert_eq!(analysis.status, AnalysisStatus::Running);
        assert!(analysis.summary.is_none());
    }

    #[test]
    fn complete_sets_summary_and_status() {
        let mut analysis = Analysis::new(TenantId::new());
        analysis.complete(AnalysisSummary::empty());
        assert_eq!(analysis.status, AnalysisStatus::Completed);
        assert!(analysis.summary.is_some());
    }

    #[test]
    fn fail_records_message_and_status() {
        let mut analysis = Analysis::new(TenantId::new());
        analysis.fail("directory unreachable");
        assert_eq!(analysis.status, AnalysisStatus::Failed);
        assert_eq!(analysis.error_message.as_deref(), Some("directory unreachable"));
    }
}

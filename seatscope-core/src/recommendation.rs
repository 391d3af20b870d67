// Copyright 2024-2025 Aprio One AB, Sweden
// Author: Kenneth Pernyer, kenneth@aprio.one
// SPDX-License-Identifier: MIT
// See LICENSE file in the project root for full license information.

//! Per-user recommendation entity and its lifecycle state machine.

use crate::error::Error;
use crate::ids::{AnalysisId, RecommendationId, UserId};
use crate::money::Money;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationStatus {
    Pending,
    Accepted,
    Rejected,
}

impl RecommendationStatus {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, RecommendationStatus::Accepted | RecommendationStatus::Rejected)
    }
}

/// The action a recommendation proposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Remove,
    Downgrade,
    Upgrade,
    NoChange,
}

/// Enumerated, i18n-catalog-keyed reason codes (spec §4.8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasonCode {
    RemoveInactive,
    RemoveAccountDisabled,
    DowngradeE5ToE3,
    DowngradeE3ToE1,
    DowngradeToFrontline,
    NoChange,
}

impl ReasonCode {
    /// A stable, non-localized fallback rendering; the real i18n catalog
    /// (out of scope here, spec §1) is expected to key off this code.
    #[must_use]
    pub fn fallback_text(self) -> &'static str {
        match self {
            ReasonCode::RemoveInactive => "inactive user",
            ReasonCode::RemoveAccountDisabled => "account disabled",
            ReasonCode::DowngradeE5ToE3 => "advanced features unused",
            ReasonCode::DowngradeE3ToE1 => "office desktop unused",
            ReasonCode::DowngradeToFrontline => "minimal collaboration usage",
            ReasonCode::NoChange => "no change recommended",
        }
    }
}

/// Per-user output of an analysis. Unique on (analysis, user).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendation {
    pub id: RecommendationId,
    pub analysis_id: AnalysisId,
    pub user_id: UserId,
    /// `None` means the user currently has no license.
    pub current_sku: Option<String>,
    /// `None` means the recommendation is to remove the license entirely.
    pub recommended_sku: Option<String>,
    /// Signed monthly delta: positive means savings, negative means the
    /// recommendation costs more (only possible for `Action::Upgrade`).
    pub savings_monthly: Money,
    pub action: Action,
    pub reason_code: ReasonCode,
    pub reason_text: String,
    pub status: RecommendationStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Recommendation {
    /// Applies an accept/reject decision, enforcing the state machine:
    /// `pending -> accepted` or `pending -> rejected`; both terminal states
    /// reject any further transition with `InvalidTransition`.
    pub fn apply(&mut self, accept: bool) -> Result<(), Error> {
        if self.status.is_terminal() {
            return Err(Error::InvalidTransition);
        }
        self.status = if accept {
            RecommendationStatus::Accepted
        } else {
            RecommendationStatus::Rejected
        };
        self.updated_at = Utc::now();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Recommendation {
        Recommendation {
            id: RecommendationId::new(),
            analysis_id: AnalysisId::new(),
            user_id: UserId::new(),
            current_sku: Some("E3".into()),
            recommended_sku: Some("E1".into()),
            savings_monthly: Money::from_major(15.0),
            action: Action::Downgrade,
            reason_code: ReasonCode::DowngradeE3ToE1,
            reason_text: "office desktop unused".into(),
            status: RecommendationStatus::Pending,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn pending_can_transition_to_accepted() {
        let mut r = sample();
        r.apply(true).unwrap();
        assert_eq!(r.status, RecommendationStatus::Accepted);
    }

    #[test]
    fn terminal_state_rejects_second_transition() {
        let mut r = sample();
        r.apply(false).unwrap();
        let second = r.apply(true);
        assert!(matches!(second, Err(Error::InvalidTransition)));
        assert_eq!(r.status, RecommendationStatus::Rejected);
    }
}

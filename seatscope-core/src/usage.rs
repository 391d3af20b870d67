// Copyright 2024-2025 Aprio One AB, Sweden
// Author: Kenneth Pernyer, kenneth@aprio.one
// SPDX-License-Identifier: MIT
// See LICENSE file in the project root for full license information.

//! Per-user, per-period usage telemetry and the canonical service catalog.

use crate::ids::UserId;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum::{EnumIter, EnumString};

/// The canonical set of services a SKU can include, and that the usage
/// scorer produces a score for.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, EnumIter, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Service {
    Exchange,
    OneDrive,
    SharePoint,
    Teams,
    OfficeDesktop,
    AdvancedSecurity,
    AdvancedCompliance,
    AudioConferencing,
    PhoneSystem,
}

/// A rolling usage window, default 28 days ("D28").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsagePeriod(pub &'static str);

impl UsagePeriod {
    pub const D28: UsagePeriod = UsagePeriod("D28");
}

/// Snapshot of a user's service activity counters for one report date.
///
/// Unique on (user, period, report_date). `last_seen_date` is the max of all
/// per-service last-activity dates; `inactivity_days` is derived at read
/// time, not stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageMetrics {
    pub user_id: UserId,
    pub period: String,
    pub report_date: NaiveDate,

    pub emails_sent: u32,
    pub emails_received: u32,
    pub mailbox_size_bytes: u64,
    pub exchange_last_activity: Option<NaiveDate>,

    pub onedrive_bytes_used: u64,
    pub onedrive_files_modified: u32,
    pub onedrive_last_activity: Option<NaiveDate>,

    pub teams_messages: u32,
    pub teams_meetings: u32,
    pub teams_calls: u32,
    pub teams_last_activity: Option<NaiveDate>,

    pub sharepoint_views: u32,
    pub sharepoint_edits: u32,
    pub sharepoint_last_activity: Option<NaiveDate>,

    pub office_web_edits: u32,
    pub has_desktop_activation_last_28d: bool,
    pub office_last_activity: Option<NaiveDate>,

    pub created_at: DateTime<Utc>,
}

impl UsageMetrics {
    /// `last_seen_date = max(all per-service last-activity dates)`.
    #[must_use]
    pub fn last_seen_date(&self) -> Option<NaiveDate> {
        [
            self.exchange_last_activity,
            self.onedrive_last_activity,
            self.teams_last_activity,
            self.sharepoint_last_activity,
            self.office_last_activity,
        ]
        .into_iter()
        .flatten()
        .max()
    }

    /// `inactivity_days = today - last_seen_date`. `None` if there is no
    /// recorded activity at all.
    #[must_use]
    pub fn inactivity_days(&self, today: NaiveDate) -> Option<i64> {
        self.last_seen_date().map(|last| (today - last).num_days())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn sample(user_id: UserId) -> UsageMetrics {
        UsageMetrics {
            user_id,
            period: "D28".into(),
            report_date: NaiveDate::from_ymd_opt(2026, 7, 1).unwrap(),
            emails_sent: 0,
            emails_received: 0,
            mailbox_size_bytes: 0,
            exchange_last_activity: None,
            onedrive_bytes_used: 0,
            onedrive_files_modified: 0,
            onedrive_last_activity: None,
            teams_messages: 0,
            teams_meetings: 0,
            teams_calls: 0,
            teams_last_activity: None,
            sharepoint_views: 0,
            sharepoint_edits: 0,
            sharepoint_last_activity: None,
            office_web_edits: 0,
            has_desktop_activation_last_28d: false,
            office_last_activity: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn last_seen_is_max_of_per_service_dates() {
        let mut metrics = sample(UserId::new());
        metrics.exchange_last_activity = NaiveDate::from_ymd_opt(2026, 6, 1);
        metrics.teams_last_activity = NaiveDate::from_ymd_opt(2026, 6, 15);
        assert_eq!(
            metrics.last_seen_date(),
            NaiveDate::from_ymd_opt(2026, 6, 15)
        );
    }

    #[test]
    fn no_activity_means_no_last_seen() {
        let metrics = sample(UserId::new());
        assert_eq!(metrics.last_seen_date(), None);
        assert_eq!(
            metrics.inactivity_days(NaiveDate::from_ymd_opt(2026, 7, 1).unwrap()),
            None
        );
    }
}

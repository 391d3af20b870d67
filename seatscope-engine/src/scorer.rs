// Copyright 2024-2025 Aprio One AB, Sweden
// Author: Kenneth Pernyer, kenneth@aprio.one
// SPDX-License-Identifier: MIT
// See LICENSE file in the project root for full license information.

//! Usage Scorer: maps raw per-service activity counters into a bounded
//! `[0, 1]` score per service (spec §4.7).

use seatscope_core::usage::{Service, UsageMetrics};
use std::collections::BTreeMap;

/// A service is considered required by the recommendation engine once its
/// score reaches this threshold (spec §4.8 step 1).
pub const REQUIRED_THRESHOLD: f64 = 0.1;

/// Below this threshold a service counts as unused for the inactivity
/// check (spec §4.7).
pub const INACTIVE_THRESHOLD: f64 = 0.05;

/// Per-service usage scores for one user, every value clamped to `[0, 1]`.
pub type ServiceScores = BTreeMap<Service, f64>;

/// Scores a user from their most recent `UsageMetrics` row. `None` (no row
/// at all) scores every service at zero.
#[must_use]
pub fn score(metrics: Option<&UsageMetrics>) -> ServiceScores {
    let Some(m) = metrics else {
        return all_zero();
    };

    let exchange = clamp((f64::from(m.emails_sent) + f64::from(m.emails_received)) / 100.0);
    let onedrive = clamp(f64::from(m.onedrive_files_modified) / 50.0);
    let sharepoint = clamp(f64::from(m.sharepoint_edits) / 50.0);
    let teams = clamp((f64::from(m.teams_messages) + 10.0 * f64::from(m.teams_meetings)) / 100.0);
    let office_desktop = if m.has_desktop_activation_last_28d {
        1.0
    } else {
        clamp(f64::from(m.office_web_edits) / 30.0)
    };

    BTreeMap::from([
        (Service::Exchange, exchange),
        (Service::OneDrive, onedrive),
        (Service::SharePoint, sharepoint),
        (Service::Teams, teams),
        (Service::OfficeDesktop, office_desktop),
    ])
}

fn clamp(raw: f64) -> f64 {
    raw.min(1.0).max(0.0)
}

/// A user is inactive if their account is disabled, or if every scored
/// service falls below [`INACTIVE_THRESHOLD`] (spec §4.7).
#[must_use]
pub fn is_inactive(account_enabled: bool, scores: &ServiceScores) -> bool {
    !account_enabled || scores.values().all(|&s| s < INACTIVE_THRESHOLD)
}

/// Every service whose score meets [`REQUIRED_THRESHOLD`] (spec §4.8 step
/// 1).
#[must_use]
pub fn required_services(scores: &ServiceScores) -> std::collections::BTreeSet<Service> {
    scores
        .iter()
        .filter(|&(_, &s)| s >= REQUIRED_THRESHOLD)
        .map(|(&svc, _)| svc)
        .collect()
}

fn all_zero() -> ServiceScores {
    BTreeMap::from([
        (Service::Exchange, 0.0),
        (Service::OneDrive, 0.0),
        (Service::SharePoint, 0.0),
        (Service::Teams, 0.0),
        (Service::OfficeDesktop, 0.0),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn metrics_with(mutate: impl FnOnce(&mut UsageMetrics)) -> UsageMetrics {
        let mut m = UsageMetrics {
            user_id: seatscope_core::UserId::new(),
            period: "D28".into(),
            report_date: Utc::now().date_naive(),
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
        };
        mutate(&mut m);
        m
    }

    #[test]
    fn no_usage_row_scores_everything_zero() {
        let scores = score(None);
        assert!(scores.values().all(|&s| s == 0.0));
    }

    #[test]
    fn every_score_is_clamped_to_unit_interval() {
        let m = metrics_with(|m| {
            m.emails_sent = 10_000;
            m.teams_meetings = 500;
        });
        let scores = score(Some(&m));
        assert!(scores.values().all(|&s| (0.0..=1.0).contains(&s)));
    }

    #[test]
    fn desktop_activation_flag_forces_full_office_score() {
        let m = metrics_with(|m| m.has_desktop_activation_last_28d = true);
        let scores = score(Some(&m));
        assert_eq!(scores[&Service::OfficeDesktop], 1.0);
    }

    #[test]
    fn teams_score_weighs_meetings_ten_times_messages() {
        let m = metrics_with(|m| m.teams_meetings = 10);
        let scores = score(Some(&m));
        assert_eq!(scores[&Service::Teams], 1.0);
    }

    #[test]
    fn disabled_account_is_always_inactive() {
        let m = metrics_with(|m| m.emails_sent = 1000);
        let scores = score(Some(&m));
        assert!(is_inactive(false, &scores));
    }

    #[test]
    fn all_scores_below_threshold_is_inactive() {
        let scores = score(None);
        assert!(is_inactive(true, &scores));
    }

    #[test]
    fn active_usage_is_not_inactive() {
        let m = metrics_with(|m| m.emails_sent = 60);
        let scores = score(Some(&m));
        assert!(!is_inactive(true, &scores));
    }

    #[test]
    fn required_services_excludes_below_threshold_scores() {
        let m = metrics_with(|m| {
            m.emails_sent = 20;
            m.onedrive_files_modified = 1;
        });
        let scores = score(Some(&m));
        let required = required_services(&scores);
        assert!(required.contains(&Service::Exchange));
        assert!(!required.contains(&Service::OneDrive));
    }
}

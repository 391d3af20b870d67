// Copyright 2024-2025 Aprio One AB, Sweden
// Author: Kenneth Pernyer, kenneth@aprio.one
// SPDX-License-Identifier: MIT
// See LICENSE file in the project root for full license information.

use super::{store_error, Database};
use async_trait::async_trait;
use chrono::NaiveDate;
use libsql::params;
use seatscope_core::error::{Error, Result};
use seatscope_core::repository::UsageRepository;
use seatscope_core::stats::UsageSyncStats;
use seatscope_core::{TenantId, UsageMetrics, UserId};
use std::collections::HashMap;

fn opt_date(raw: Option<String>) -> Result<Option<NaiveDate>> {
    raw.map(|s| s.parse::<NaiveDate>()).transpose().map_err(|e| Error::InternalInvariant(e.to_string()))
}

fn row_to_metrics(row: &libsql::Row) -> Result<UsageMetrics> {
    let user_id: String = row.get(0).map_err(store_error)?;
    Ok(UsageMetrics {
        user_id: UserId::from(uuid::Uuid::parse_str(&user_id).map_err(|e| Error::InternalInvariant(e.to_string()))?),
        period: row.get(1).map_err(store_error)?,
        report_date: row
            .get::<String>(2)
            .map_err(store_error)?
            .parse()
            .map_err(|e: chrono::ParseError| Error::InternalInvariant(e.to_string()))?,
        emails_sent: row.get::<i64>(3).map_err(store_error)? as u32,
        emails_received: row.get::<i64>(4).map_err(store_error)? as u32,
        mailbox_size_bytes: row.get::<i64>(5).map_err(store_error)? as u64,
        exchange_last_activity: opt_date(row.get(6).map_err(store_error)?)?,
        onedrive_bytes_used: row.get::<i64>(7).map_err(store_error)? as u64,
        onedrive_files_modified: row.get::<i64>(8).map_err(store_error)? as u32,
        onedrive_last_activity: opt_date(row.get(9).map_err(store_error)?)?,
        teams_messages: row.get::<i64>(10).map_err(store_error)? as u32,
        teams_meetings: row.get::<i64>(11).map_err(store_error)? as u32,
        teams_calls: row.get::<i64>(12).map_err(store_error)? as u32,
        teams_last_activity: opt_date(row.get(13).map_err(store_error)?)?,
        sharepoint_views: row.get::<i64>(14).map_err(store_error)? as u32,
        sharepoint_edits: row.get::<i64>(15).map_err(store_error)? as u32,
        sharepoint_last_activity: opt_date(row.get(16).map_err(store_error)?)?,
        office_web_edits: row.get::<i64>(17).map_err(store_error)? as u32,
        has_desktop_activation_last_28d: row.get::<i64>(18).map_err(store_error)? != 0,
        office_last_activity: opt_date(row.get(19).map_err(store_error)?)?,
        created_at: row
            .get::<String>(20)
            .map_err(store_error)?
            .parse()
            .map_err(|e: chrono::ParseError| Error::InternalInvariant(e.to_string()))?,
    })
}

const SELECT_COLUMNS: &str = "user_id, period, report_date, emails_sent, emails_received, mailbox_size_bytes, \
    exchange_last_activity, onedrive_bytes_used, onedrive_files_modified, onedrive_last_activity, \
    teams_messages, teams_meetings, teams_calls, teams_last_activity, sharepoint_views, sharepoint_edits, \
    sharepoint_last_activity, office_web_edits, has_desktop_activation_last_28d, office_last_activity, \
    usage_metrics.created_at";

pub struct LibsqlUsageRepository {
    db: Database,
}

impl LibsqlUsageRepository {
    pub(crate) fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UsageRepository for LibsqlUsageRepository {
    async fn get_latest(&self, tenant_id: TenantId, user_id: UserId) -> Result<Option<UsageMetrics>> {
        let mut rows = self
            .db
            .conn()
            .query(
                &format!(
                    "SELECT {SELECT_COLUMNS} FROM usage_metrics JOIN users ON users.id = usage_metrics.user_id \
                     WHERE users.tenant_id = ?1 AND usage_metrics.user_id = ?2 ORDER BY report_date DESC LIMIT 1"
                ),
                params![tenant_id.to_string(), user_id.to_string()],
            )
            .await
            .map_err(store_error)?;
        match rows.next().await.map_err(store_error)? {
            Some(row) => Ok(Some(row_to_metrics(&row)?)),
            None => Ok(None),
        }
    }

    async fn list_latest_for_tenant(&self, tenant_id: TenantId) -> Result<HashMap<UserId, UsageMetrics>> {
        let mut rows = self
            .db
            .conn()
            .query(
                &format!(
                    "SELECT {SELECT_COLUMNS} FROM usage_metrics JOIN users ON users.id = usage_metrics.user_id \
                     WHERE users.tenant_id = ?1 AND usage_metrics.report_date = (\
                     SELECT MAX(u2.report_date) FROM usage_metrics u2 WHERE u2.user_id = usage_metrics.user_id)"
                ),
                params![tenant_id.to_string()],
            )
            .await
            .map_err(store_error)?;
        let mut out = HashMap::new();
        while let Some(row) = rows.next().await.map_err(store_error)? {
            let metrics = row_to_metrics(&row)?;
            out.insert(metrics.user_id, metrics);
        }
        Ok(out)
    }

    async fn upsert_reports(&self, tenant_id: TenantId, by_user: &HashMap<UserId, UsageMetrics>) -> Result<UsageSyncStats> {
        let _ = tenant_id;
        let tx = self.db.conn().transaction().await.map_err(store_error)?;
        let mut rows_upserted = 0u32;
        for metrics in by_user.values() {
            tx.execute(
                "INSERT INTO usage_metrics (user_id, period, report_date, emails_sent, emails_received, \
                 mailbox_size_bytes, exchange_last_activity, onedrive_bytes_used, onedrive_files_modified, \
                 onedrive_last_activity, teams_messages, teams_meetings, teams_calls, teams_last_activity, \
                 sharepoint_views, sharepoint_edits, sharepoint_last_activity, office_web_edits, \
                 has_desktop_activation_last_28d, office_last_activity, created_at) \
                 VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16,?17,?18,?19,?20,?21) \
                 ON CONFLICT(user_id, period) DO UPDATE SET report_date=excluded.report_date, \
                 emails_sent=excluded.emails_sent, emails_received=excluded.emails_received, \
                 mailbox_size_bytes=excluded.mailbox_size_bytes, exchange_last_activity=excluded.exchange_last_activity, \
                 onedrive_bytes_used=excluded.onedrive_bytes_used, onedrive_files_modified=excluded.onedrive_files_modified, \
                 onedrive_last_activity=excluded.onedrive_last_activity, teams_messages=excluded.teams_messages, \
                 teams_meetings=excluded.teams_meetings, teams_calls=excluded.teams_calls, \
                 teams_last_activity=excluded.teams_last_activity, sharepoint_views=excluded.sharepoint_views, \
                 sharepoint_edits=excluded.sharepoint_edits, sharepoint_last_activity=excluded.sharepoint_last_activity, \
                 office_web_edits=excluded.office_web_edits, \
                 has_desktop_activation_last_28d=excluded.has_desktop_activation_last_28d, \
                 office_last_activity=excluded.office_last_activity",
                params![
                    metrics.user_id.to_string(),
                    metrics.period.clone(),
                    metrics.report_date.to_string(),
                    i64::from(metrics.emails_sent),
                    i64::from(metrics.emails_received),
                    metrics.mailbox_size_bytes as i64,
                    metrics.exchange_last_activity.map(|d| d.to_string()),
                    metrics.onedrive_bytes_used as i64,
                    i64::from(metrics.onedrive_files_modified),
                    metrics.onedrive_last_activity.map(|d| d.to_string()),
                    i64::from(metrics.teams_messages),
                    i64::from(metrics.teams_meetings),
                    i64::from(metrics.teams_calls),
                    metrics.teams_last_activity.map(|d| d.to_string()),
                    i64::from(metrics.sharepoint_views),
                    i64::from(metrics.sharepoint_edits),
                    metrics.sharepoint_last_activity.map(|d| d.to_string()),
                    i64::from(metrics.office_web_edits),
                    i64::from(metrics.has_desktop_activation_last_28d),
                    metrics.office_last_activity.map(|d| d.to_string()),
                    metrics.created_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(store_error)?;
            rows_upserted += 1;
        }
        tx.commit().await.map_err(store_error)?;
        Ok(UsageSyncStats { rows_fetched: rows_upserted, rows_upserted, users_unmatched: 0 })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use chrono::Utc;

    fn sample(user_id: UserId, report_date: NaiveDate) -> UsageMetrics {
        UsageMetrics {
            user_id,
            period: "D28".into(),
            report_date,
            emails_sent: 10,
            emails_received: 20,
            mailbox_size_bytes: 1024,
            exchange_last_activity: Some(report_date),
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

    async fn seed_tenant_and_user(db: &Database) -> (TenantId, UserId) {
        let tenant_id = TenantId::new();
        let user_id = UserId::new();
        let now = Utc::now();
        db.conn()
            .execute(
                "INSERT INTO tenants (id, external_tenant_id, display_name, country_code, default_language, \
                 onboarding_state, consented_at, created_at, updated_at) VALUES (?1,'ext','Acme','US','en', \
                 'active',?2,?2,?2)",
                libsql::params![tenant_id.to_string(), now.to_rfc3339()],
            )
            .await
            .unwrap();
        db.conn()
            .execute(
                "INSERT INTO users (id, tenant_id, external_user_id, principal_name, display_name, \
                 account_enabled, created_at, updated_at) VALUES (?1,?2,'u1','u1@acme.example','User One',1,?3,?3)",
                libsql::params![user_id.to_string(), tenant_id.to_string(), now.to_rfc3339()],
            )
            .await
            .unwrap();
        (tenant_id, user_id)
    }

    #[tokio::test]
    async fn upsert_then_get_latest_round_trips() {
        let db = Database::connect_in_memory().await.unwrap();
        let (_, user_id) = seed_tenant_and_user(&db).await;
        let report_date = NaiveDate::from_ymd_opt(2026, 7, 1).unwrap();

        let repo = db.usage();
        repo.upsert_reports(TenantId::new(), &HashMap::from([(user_id, sample(user_id, report_date))])).await.unwrap();

        let fetched = repo.get_latest(TenantId::new(), user_id).await.unwrap().unwrap();
        assert_eq!(fetched.emails_sent, 10);
        assert_eq!(fetched.report_date, report_date);
    }

    #[tokio::test]
    async fn upsert_on_same_period_overwrites_rather_than_duplicates() {
        let db = Database::connect_in_memory().await.unwrap();
        let (tenant_id, user_id) = seed_tenant_and_user(&db).await;
        let repo = db.usage();

        let first = sample(user_id, NaiveDate::from_ymd_opt(2026, 6, 1).unwrap());
        repo.upsert_reports(tenant_id, &HashMap::from([(user_id, first)])).await.unwrap();

        let mut second = sample(user_id, NaiveDate::from_ymd_opt(2026, 7, 1).unwrap());
        second.emails_sent = 99;
        repo.upsert_reports(tenant_id, &HashMap::from([(user_id, second)])).await.unwrap();

        let by_user = repo.list_latest_for_tenant(tenant_id).await.unwrap();
        assert_eq!(by_user.len(), 1);
        assert_eq!(by_user[&user_id].emails_sent, 99);
    }

    #[tokio::test]
    async fn get_latest_is_none_for_a_user_with_no_reports() {
        let db = Database::connect_in_memory().await.unwrap();
        let (tenant_id, user_id) = seed_tenant_and_user(&db).await;
        assert!(db.usage().get_latest(tenant_id, user_id).await.unwrap().is_none());
    }
}

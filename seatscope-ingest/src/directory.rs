// Copyright 2024-2025 Aprio One AB, Sweden
// Author: Kenneth Pernyer, kenneth@aprio.one
// SPDX-License-Identifier: MIT
// See LICENSE file in the project root for full license information.

//! Directory Sync: fetches users, license assignments, and usage reports
//! from the external identity/productivity API (spec §4.4, §6.1).

use crate::http::HttpClientCore;
use crate::token_cache::{CachedToken, TokenCache};
use crate::vault::SecretVault;
use chrono::{NaiveDate, Utc};
use seatscope_core::error::{Error, Result};
use seatscope_core::repository::{LicenseRepository, TenantRepository, UsageRepository, UserRepository};
use seatscope_core::stats::{LicenseSyncStats, UsageSyncStats, UserSyncStats};
use seatscope_core::{AssignmentSource, AssignmentStatus, LicenseAssignment, TenantId, User, UserId, UsageMetrics};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

/// Wire shape for a paginated collection endpoint (spec §4.3).
#[derive(Debug, Deserialize)]
struct CollectionPage<T> {
    value: Vec<T>,
    #[serde(rename = "nextLink")]
    next_link: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DirectoryUserDto {
    id: String,
    #[serde(rename = "userPrincipalName")]
    user_principal_name: String,
    #[serde(rename = "displayName")]
    display_name: String,
    #[serde(rename = "accountEnabled")]
    account_enabled: bool,
    department: Option<String>,
    #[serde(rename = "jobTitle")]
    job_title: Option<String>,
    #[serde(rename = "preferredLanguage")]
    preferred_language: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LicenseDetailDto {
    #[serde(rename = "skuId")]
    sku_id: String,
    status: String,
}

fn parse_assignment_status(raw: &str) -> AssignmentStatus {
    match raw {
        "Suspended" => AssignmentStatus::Suspended,
        "Disabled" => AssignmentStatus::Disabled,
        "Trial" => AssignmentStatus::Trial,
        _ => AssignmentStatus::Active,
    }
}

#[derive(Debug, Deserialize)]
struct UsageReportRow {
    #[serde(rename = "User Principal Name")]
    user_principal_name: String,
    #[serde(default, rename = "Send Count")]
    send_count: Option<u32>,
    #[serde(default, rename = "Receive Count")]
    receive_count: Option<u32>,
    #[serde(default, rename = "Mailbox Storage Used (Byte)")]
    mailbox_storage_used: Option<u64>,
    #[serde(default, rename = "Viewed Or Edited File Count")]
    viewed_or_edited_file_count: Option<u32>,
    #[serde(default, rename = "Team Chat Message Count")]
    team_chat_message_count: Option<u32>,
    #[serde(default, rename = "Meetings Organized Count")]
    meetings_organized_count: Option<u32>,
    #[serde(default, rename = "Call Count")]
    call_count: Option<u32>,
    #[serde(default, rename = "Viewed Or Edited File Count.1")]
    sharepoint_edits: Option<u32>,
    #[serde(default, rename = "Last Activity Date")]
    last_activity_date: Option<NaiveDate>,
    #[serde(default, rename = "Storage Used (Byte)")]
    storage_used: Option<u64>,
    #[serde(default, rename = "Has Other Activity")]
    has_other_activity: Option<bool>,
}

pub enum UsageReportKind {
    Email,
    OneDrive,
    SharePoint,
    Teams,
}

pub struct DirectoryClient {
    http: HttpClientCore,
    tokens: TokenCache,
    vault: Arc<SecretVault>,
    base_url: String,
}

impl DirectoryClient {
    #[must_use]
    pub fn new(http: HttpClientCore, vault: Arc<SecretVault>, base_url: impl Into<String>) -> Self {
        Self { http, tokens: TokenCache::new(), vault, base_url: base_url.into() }
    }

    async fn acquire_token(&self, tenants: &dyn TenantRepository, tenant_id: TenantId) -> Result<String> {
        let vault = Arc::clone(&self.vault);
        let http = self.http.clone();
        let creds = tenants.get_credentials(tenant_id).await?;
        let authority_url = creds.authority_url.clone();
        let client_id = creds.client_id.clone();
        let scopes = creds.scopes.join(" ");
        let encrypted_secret = creds.encrypted_secret.clone();

        self.tokens
            .get_or_refresh(tenant_id, move || async move {
                let secret_bytes = vault.decrypt(&encrypted_secret)?;
                let client_secret = String::from_utf8(secret_bytes)
                    .map_err(|_| Error::InternalInvariant("decrypted secret was not valid utf-8".into()))?;

                #[derive(Deserialize)]
                struct TokenResponse {
                    access_token: String,
                    expires_in: i64,
                }

                let response: TokenResponse = http
                    .send_json(|| {
                        reqwest::Client::new()
                            .post(format!("{authority_url}/oauth2/v2.0/token"))
                            .form(&[
                                ("client_id", client_id.as_str()),
                                ("client_secret", client_secret.as_str()),
                                ("scope", scopes.as_str()),
                                ("grant_type", "client_credentials"),
                            ])
                    })
                    .await?;

                let ttl = (response.expires_in - 300).max(60);
                Ok(CachedToken {
                    access_token: response.access_token,
                    expires_at: Utc::now() + chrono::Duration::seconds(ttl),
                })
            })
            .await
    }

    /// Runs `call` with a bearer token for `tenant_id`, retrying exactly
    /// once with a freshly acquired token if the first attempt is
    /// unauthorized (spec §4.3 auth-invalidation rule).
    async fn with_auth_retry<T, F, Fut>(
        &self,
        tenants: &dyn TenantRepository,
        tenant_id: TenantId,
        mut call: F,
    ) -> Result<T>
    where
        F: FnMut(String) -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        let token = self.acquire_token(tenants, tenant_id).await?;
        match call(token).await {
            Err(Error::Unauthorized) => {
                self.tokens.invalidate(tenant_id).await;
                let fresh_token = self.acquire_token(tenants, tenant_id).await?;
                match call(fresh_token).await {
                    Err(Error::Unauthorized) => {
                        let mut creds = tenants.get_credentials(tenant_id).await?;
                        creds.is_valid = false;
                        tenants.put_credentials(&creds).await?;
                        Err(Error::Unauthorized)
                    }
                    other => other,
                }
            }
            other => other,
        }
    }

    async fn fetch_all_pages<T: for<'de> Deserialize<'de>>(&self, token: &str, url: &str) -> Result<Vec<T>> {
        let mut items = Vec::new();
        let mut next = Some(url.to_string());
        while let Some(link) = next {
            let token = token.to_string();
            let page: CollectionPage<T> = self
                .http
                .send_json(move || {
                    reqwest::Client::new().get(&link).bearer_auth(&token)
                })
                .await?;
            next = page.next_link;
            items.extend(page.value);
        }
        Ok(items)
    }

    pub async fn sync_users(
        &self,
        tenants: &dyn TenantRepository,
        users: &dyn UserRepository,
        tenant_id: TenantId,
    ) -> Result<UserSyncStats> {
        let url = format!("{}/users", self.base_url);
        let dtos: Vec<DirectoryUserDto> = self
            .with_auth_retry(tenants, tenant_id, |token| {
                let url = url.clone();
                async move { self.fetch_all_pages(&token, &url).await }
            })
            .await?;

        let now = Utc::now();
        let domain_users: Vec<User> = dtos
            .into_iter()
            .map(|dto| User {
                id: UserId::new(),
                tenant_id,
                external_user_id: dto.id,
                principal_name: dto.user_principal_name,
                display_name: dto.display_name,
                account_enabled: dto.account_enabled,
                department: dto.department,
                job_title: dto.job_title,
                preferred_language: dto.preferred_language,
                created_at: now,
                updated_at: now,
            })
            .collect();

        users.replace_tenant_users(tenant_id, &domain_users).await
    }

    pub async fn sync_licenses(
        &self,
        tenants: &dyn TenantRepository,
        users_repo: &dyn UserRepository,
        licenses: &dyn LicenseRepository,
        tenant_id: TenantId,
    ) -> Result<LicenseSyncStats> {
        let roster = users_repo.list_by_tenant(tenant_id).await?;
        let mut by_user = HashMap::with_capacity(roster.len());

        for user in &roster {
            let url = format!("{}/users/{}/licenseDetails", self.base_url, user.external_user_id);
            let dtos: Vec<LicenseDetailDto> = self
                .with_auth_retry(tenants, tenant_id, |token| {
                    let url = url.clone();
                    async move { self.fetch_all_pages(&token, &url).await }
                })
                .await?;

            let now = Utc::now();
            let assignments = dtos
                .into_iter()
                .map(|dto| LicenseAssignment {
                    user_id: user.id,
                    tenant_id,
                    sku_id: dto.sku_id,
                    assigned_at: now,
                    status: parse_assignment_status(&dto.status),
                    source: AssignmentSource::Auto,
                })
                .collect();
            by_user.insert(user.id, assignments);
        }

        licenses.replace_user_licenses(tenant_id, &by_user).await
    }

    pub async fn sync_usage(
        &self,
        tenants: &dyn TenantRepository,
        users_repo: &dyn UserRepository,
        usage: &dyn UsageRepository,
        tenant_id: TenantId,
        period: &str,
    ) -> Result<UsageSyncStats> {
        let roster = users_repo.list_by_tenant(tenant_id).await?;
        let by_principal: HashMap<&str, UserId> =
            roster.iter().map(|u| (u.principal_name.as_str(), u.id)).collect();

        let mut merged: HashMap<UserId, UsageMetrics> = HashMap::new();
        let mut rows_fetched = 0u32;
        let mut users_unmatched = 0u32;

        for kind in [UsageReportKind::Email, UsageReportKind::OneDrive, UsageReportKind::SharePoint, UsageReportKind::Teams] {
            let endpoint = report_endpoint(&kind, period);
            let url = format!("{}/reports/{}", self.base_url, endpoint);
            let body: String = self
                .with_auth_retry(tenants, tenant_id, |token| {
                    let url = url.clone();
                    async move {
                        let response = self
                            .http
                            .send_with_retry(|| reqwest::Client::new().get(&url).bearer_auth(&token))
                            .await?;
                        response.text().await.map_err(|e| Error::BadData(e.to_string()))
                    }
                })
                .await?;

            for row in parse_usage_csv(&body)? {
                rows_fetched += 1;
                let Some(&user_id) = by_principal.get(row.user_principal_name.as_str()) else {
                    users_unmatched += 1;
                    continue;
                };
                apply_usage_row(merged.entry(user_id).or_insert_with(|| empty_usage(user_id, period)), &kind, &row);
            }
        }

        let rows_upserted = merged.len() as u32;
        let mut stats = usage.upsert_reports(tenant_id, &merged).await?;
        stats.rows_fetched = rows_fetched;
        stats.rows_upserted = rows_upserted;
        stats.users_unmatched = users_unmatched;
        Ok(stats)
    }
}

fn report_endpoint(kind: &UsageReportKind, period: &str) -> String {
    let name = match kind {
        UsageReportKind::Email => "getEmailActivityUserDetail",
        UsageReportKind::OneDrive => "getOneDriveActivityUserDetail",
        UsageReportKind::SharePoint => "getSharePointActivityUserDetail",
        UsageReportKind::Teams => "getTeamsUserActivityUserDetail",
    };
    format!("{name}(period='{period}')")
}

fn empty_usage(user_id: UserId, period: &str) -> UsageMetrics {
    UsageMetrics {
        user_id,
        period: period.to_string(),
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
    }
}

fn apply_usage_row(metrics: &mut UsageMetrics, kind: &UsageReportKind, row: &UsageReportRow) {
    match kind {
        UsageReportKind::Email => {
            metrics.emails_sent = row.send_count.unwrap_or(0);
            metrics.emails_received = row.receive_count.unwrap_or(0);
            metrics.mailbox_size_bytes = row.mailbox_storage_used.unwrap_or(0);
            metrics.exchange_last_activity = row.last_activity_date;
        }
        UsageReportKind::OneDrive => {
            metrics.onedrive_bytes_used = row.storage_used.unwrap_or(0);
            metrics.onedrive_files_modified = row.viewed_or_edited_file_count.unwrap_or(0);
            metrics.onedrive_last_activity = row.last_activity_date;
        }
        UsageReportKind::SharePoint => {
            metrics.sharepoint_edits = row.sharepoint_edits.unwrap_or(0);
            metrics.sharepoint_views = row.viewed_or_edited_file_count.unwrap_or(0);
            metrics.sharepoint_last_activity = row.last_activity_date;
        }
        UsageReportKind::Teams => {
            metrics.teams_messages = row.team_chat_message_count.unwrap_or(0);
            metrics.teams_meetings = row.meetings_organized_count.unwrap_or(0);
            metrics.teams_calls = row.call_count.unwrap_or(0);
            metrics.teams_last_activity = row.last_activity_date;
            metrics.has_desktop_activation_last_28d = row.has_other_activity.unwrap_or(false);
        }
    }
}

/// Parses a usage-report CSV body. An empty body yields an empty sequence,
/// not an error (spec §4.3).
fn parse_usage_csv(body: &str) -> Result<Vec<UsageReportRow>> {
    if body.trim().is_empty() {
        return Ok(Vec::new());
    }
    let mut reader = csv::ReaderBuilder::new().has_headers(true).from_reader(body.as_bytes());
    let mut rows = Vec::new();
    for record in reader.deserialize() {
        let row: UsageReportRow = record.map_err(|e| {
            warn!(error = %e, "skipping malformed usage report row");
            Error::BadData(format!("malformed usage report row: {e}"))
        })?;
        rows.push(row);
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_csv_body_yields_no_rows() {
        assert!(parse_usage_csv("").unwrap().is_empty());
        assert!(parse_usage_csv("   \n").unwrap().is_empty());
    }

    #[test]
    fn parses_a_single_email_activity_row() {
        let csv = "User Principal Name,Send Count,Receive Count,Mailbox Storage Used (Byte)\nalice@contoso.com,12,34,1048576\n";
        let rows = parse_usage_csv(csv).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].user_principal_name, "alice@contoso.com");
        assert_eq!(rows[0].send_count, Some(12));
    }

    #[test]
    fn assignment_status_defaults_to_active_for_unknown_values() {
        assert_eq!(parse_assignment_status("Active"), AssignmentStatus::Active);
        assert_eq!(parse_assignment_status("Weird"), AssignmentStatus::Active);
        assert_eq!(parse_assignment_status("Disabled"), AssignmentStatus::Disabled);
    }

    #[test]
    fn report_endpoint_embeds_period_code() {
        assert_eq!(
            report_endpoint(&UsageReportKind::Email, "D28"),
            "getEmailActivityUserDetail(period='D28')"
        );
    }
}

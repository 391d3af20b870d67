// Copyright 2024-2025 Aprio One AB, Sweden
// Author: Kenneth Pernyer, kenneth@aprio.one
// SPDX-License-Identifier: MIT
// See LICENSE file in the project root for full license information.

use super::{store_error, Database};
use async_trait::async_trait;
use libsql::params;
use seatscope_core::error::{Error, Result};
use seatscope_core::repository::LicenseRepository;
use seatscope_core::stats::LicenseSyncStats;
use seatscope_core::{AssignmentSource, AssignmentStatus, LicenseAssignment, TenantId, UserId};
use std::collections::{HashMap, HashSet};

fn status_to_str(status: AssignmentStatus) -> &'static str {
    match status {
        AssignmentStatus::Active => "active",
        AssignmentStatus::Suspended => "suspended",
        AssignmentStatus::Disabled => "disabled",
        AssignmentStatus::Trial => "trial",
    }
}

fn status_from_str(raw: &str) -> Result<AssignmentStatus> {
    match raw {
        "active" => Ok(AssignmentStatus::Active),
        "suspended" => Ok(AssignmentStatus::Suspended),
        "disabled" => Ok(AssignmentStatus::Disabled),
        "trial" => Ok(AssignmentStatus::Trial),
        other => Err(Error::InternalInvariant(format!("unknown assignment status {other}"))),
    }
}

fn source_to_str(source: AssignmentSource) -> &'static str {
    match source {
        AssignmentSource::Manual => "manual",
        AssignmentSource::Auto => "auto",
        AssignmentSource::GroupPolicy => "group_policy",
    }
}

fn source_from_str(raw: &str) -> Result<AssignmentSource> {
    match raw {
        "manual" => Ok(AssignmentSource::Manual),
        "auto" => Ok(AssignmentSource::Auto),
        "group_policy" => Ok(AssignmentSource::GroupPolicy),
        other => Err(Error::InternalInvariant(format!("unknown assignment source {other}"))),
    }
}

fn row_to_assignment(row: &libsql::Row) -> Result<LicenseAssignment> {
    let user_id: String = row.get(0).map_err(store_error)?;
    let tenant_id: String = row.get(1).map_err(store_error)?;
    Ok(LicenseAssignment {
        user_id: UserId::from(uuid::Uuid::parse_str(&user_id).map_err(|e| Error::InternalInvariant(e.to_string()))?),
        tenant_id: TenantId::from(uuid::Uuid::parse_str(&tenant_id).map_err(|e| Error::InternalInvariant(e.to_string()))?),
        sku_id: row.get(2).map_err(store_error)?,
        assigned_at: row
            .get::<String>(3)
            .map_err(store_error)?
            .parse()
            .map_err(|e: chrono::ParseError| Error::InternalInvariant(e.to_string()))?,
        status: status_from_str(&row.get::<String>(4).map_err(store_error)?)?,
        source: source_from_str(&row.get::<String>(5).map_err(store_error)?)?,
    })
}

const SELECT_COLUMNS: &str = "user_id, tenant_id, sku_id, assigned_at, status, source";

pub struct LibsqlLicenseRepository {
    db: Database,
}

impl LibsqlLicenseRepository {
    pub(crate) fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl LicenseRepository for LibsqlLicenseRepository {
    async fn list_for_user(&self, tenant_id: TenantId, user_id: UserId) -> Result<Vec<LicenseAssignment>> {
        let mut rows = self
            .db
            .conn()
            .query(
                &format!("SELECT {SELECT_COLUMNS} FROM license_assignments WHERE tenant_id = ?1 AND user_id = ?2"),
                params![tenant_id.to_string(), user_id.to_string()],
            )
            .await
            .map_err(store_error)?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await.map_err(store_error)? {
            out.push(row_to_assignment(&row)?);
        }
        Ok(out)
    }

    async fn list_for_tenant(&self, tenant_id: TenantId) -> Result<Vec<LicenseAssignment>> {
        let mut rows = self
            .db
            .conn()
            .query(
                &format!("SELECT {SELECT_COLUMNS} FROM license_assignments WHERE tenant_id = ?1"),
                params![tenant_id.to_string()],
            )
            .await
            .map_err(store_error)?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await.map_err(store_error)? {
            out.push(row_to_assignment(&row)?);
        }
        Ok(out)
    }

    async fn replace_user_licenses(
        &self,
        tenant_id: TenantId,
        by_user: &HashMap<UserId, Vec<LicenseAssignment>>,
    ) -> Result<LicenseSyncStats> {
        let mut assignments_upserted = 0u32;
        let mut assignments_removed = 0u32;

        let mut current_by_user = HashMap::with_capacity(by_user.len());
        for &user_id in by_user.keys() {
            current_by_user.insert(user_id, self.list_for_user(tenant_id, user_id).await?);
        }

        let tx = self.db.conn().transaction().await.map_err(store_error)?;

        for (&user_id, assignments) in by_user {
            let current = &current_by_user[&user_id];
            let new_skus: HashSet<&str> = assignments.iter().map(|a| a.sku_id.as_str()).collect();

            for stale in current.iter().filter(|a| !new_skus.contains(a.sku_id.as_str())) {
                tx.execute(
                    "DELETE FROM license_assignments WHERE user_id = ?1 AND sku_id = ?2",
                    params![user_id.to_string(), stale.sku_id.clone()],
                )
                .await
                .map_err(store_error)?;
                assignments_removed += 1;
            }

            for assignment in assignments {
                tx.execute(
                    "INSERT INTO license_assignments (user_id, tenant_id, sku_id, assigned_at, status, source) \
                     VALUES (?1,?2,?3,?4,?5,?6) \
                     ON CONFLICT(user_id, sku_id) DO UPDATE SET assigned_at=excluded.assigned_at, \
                     status=excluded.status, source=excluded.source",
                    params![
                        assignment.user_id.to_string(),
                        assignment.tenant_id.to_string(),
                        assignment.sku_id.clone(),
                        assignment.assigned_at.to_rfc3339(),
                        status_to_str(assignment.status).to_string(),
                        source_to_str(assignment.source).to_string(),
                    ],
                )
                .await
                .map_err(store_error)?;
                assignments_upserted += 1;
            }
        }

        tx.commit().await.map_err(store_error)?;

        Ok(LicenseSyncStats {
            users_processed: by_user.len() as u32,
            assignments_upserted,
            assignments_removed,
        })
    }
}

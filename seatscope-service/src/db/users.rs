// Copyright 2024-2025 Aprio One AB, Sweden
// Author: Kenneth Pernyer, kenneth@aprio.one
// SPDX-License-Identifier: MIT
// See LICENSE file in the project root for full license information.

use super::{store_error, Database};
use async_trait::async_trait;
use libsql::params;
use seatscope_core::error::{Error, Result};
use seatscope_core::repository::UserRepository;
use seatscope_core::stats::UserSyncStats;
use seatscope_core::{TenantId, User, UserId};

fn parse_uuid(raw: &str) -> Result<uuid::Uuid> {
    uuid::Uuid::parse_str(raw).map_err(|e| Error::InternalInvariant(e.to_string()))
}

fn parse_time(raw: &str) -> Result<chrono::DateTime<chrono::Utc>> {
    raw.parse().map_err(|e: chrono::ParseError| Error::InternalInvariant(e.to_string()))
}

fn row_to_user(row: &libsql::Row) -> Result<User> {
    Ok(User {
        id: UserId::from(parse_uuid(&row.get::<String>(0).map_err(store_error)?)?),
        tenant_id: TenantId::from(parse_uuid(&row.get::<String>(1).map_err(store_error)?)?),
        external_user_id: row.get(2).map_err(store_error)?,
        principal_name: row.get(3).map_err(store_error)?,
        display_name: row.get(4).map_err(store_error)?,
        account_enabled: row.get::<i64>(5).map_err(store_error)? != 0,
        department: row.get(6).map_err(store_error)?,
        job_title: row.get(7).map_err(store_error)?,
        preferred_language: row.get(8).map_err(store_error)?,
        created_at: parse_time(&row.get::<String>(9).map_err(store_error)?)?,
        updated_at: parse_time(&row.get::<String>(10).map_err(store_error)?)?,
    })
}

const SELECT_COLUMNS: &str = "id, tenant_id, external_user_id, principal_name, display_name, \
     account_enabled, department, job_title, preferred_language, created_at, updated_at";

pub struct LibsqlUserRepository {
    db: Database,
}

impl LibsqlUserRepository {
    pub(crate) fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserRepository for LibsqlUserRepository {
    async fn list_by_tenant(&self, tenant_id: TenantId) -> Result<Vec<User>> {
        let mut rows = self
            .db
            .conn()
            .query(
                &format!("SELECT {SELECT_COLUMNS} FROM users WHERE tenant_id = ?1 ORDER BY principal_name"),
                params![tenant_id.to_string()],
            )
            .await
            .map_err(store_error)?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await.map_err(store_error)? {
            out.push(row_to_user(&row)?);
        }
        Ok(out)
    }

    async fn get(&self, tenant_id: TenantId, user_id: UserId) -> Result<User> {
        let mut rows = self
            .db
            .conn()
            .query(
                &format!("SELECT {SELECT_COLUMNS} FROM users WHERE tenant_id = ?1 AND id = ?2"),
                params![tenant_id.to_string(), user_id.to_string()],
            )
            .await
            .map_err(store_error)?;
        match rows.next().await.map_err(store_error)? {
            Some(row) => row_to_user(&row),
            None => Err(Error::NotFound(format!("user {user_id}"))),
        }
    }

    async fn replace_tenant_users(&self, tenant_id: TenantId, users: &[User]) -> Result<UserSyncStats> {
        let existing = self.list_by_tenant(tenant_id).await?;
        let existing_by_external: std::collections::HashMap<&str, &User> =
            existing.iter().map(|u| (u.external_user_id.as_str(), u)).collect();

        let tx = self.db.conn().transaction().await.map_err(store_error)?;

        let mut inserted = 0u32;
        let mut updated = 0u32;
        for user in users {
            if existing_by_external.contains_key(user.external_user_id.as_str()) {
                updated += 1;
            } else {
                inserted += 1;
            }
            tx.execute(
                "INSERT INTO users (id, tenant_id, external_user_id, principal_name, display_name, \
                 account_enabled, department, job_title, preferred_language, created_at, updated_at) \
                 VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11) \
                 ON CONFLICT(tenant_id, external_user_id) DO UPDATE SET \
                 principal_name=excluded.principal_name, display_name=excluded.display_name, \
                 account_enabled=excluded.account_enabled, department=excluded.department, \
                 job_title=excluded.job_title, preferred_language=excluded.preferred_language, \
                 updated_at=excluded.updated_at",
                params![
                    user.id.to_string(),
                    user.tenant_id.to_string(),
                    user.external_user_id.clone(),
                    user.principal_name.clone(),
                    user.display_name.clone(),
                    i64::from(user.account_enabled),
                    user.department.clone(),
                    user.job_title.clone(),
                    user.preferred_language.clone(),
                    user.created_at.to_rfc3339(),
                    user.updated_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(store_error)?;
        }

        tx.commit().await.map_err(store_error)?;

        Ok(UserSyncStats { fetched: users.len() as u32, inserted, updated })
    }
}

// Copyright 2024-2025 Aprio One AB, Sweden
// Author: Kenneth Pernyer, kenneth@aprio.one
// SPDX-License-Identifier: MIT
// See LICENSE file in the project root for full license information.

use super::{store_error, Database};
use async_trait::async_trait;
use chrono::NaiveDate;
use libsql::params;
use seatscope_core::error::{Error, Result};
use seatscope_core::repository::SkuRegistryRepository;
use seatscope_core::sku::{AddonCompatibility, SkuFamily, SkuServiceMatrix};
use seatscope_core::usage::Service;
use std::collections::BTreeSet;

fn family_to_str(family: SkuFamily) -> &'static str {
    match family {
        SkuFamily::Business => "business",
        SkuFamily::Enterprise => "enterprise",
        SkuFamily::Frontline => "frontline",
        SkuFamily::Education => "education",
    }
}

fn family_from_str(raw: &str) -> Result<SkuFamily> {
    match raw {
        "business" => Ok(SkuFamily::Business),
        "enterprise" => Ok(SkuFamily::Enterprise),
        "frontline" => Ok(SkuFamily::Frontline),
        "education" => Ok(SkuFamily::Education),
        other => Err(Error::InternalInvariant(format!("unknown sku family {other}"))),
    }
}

fn row_to_matrix(row: &libsql::Row) -> Result<SkuServiceMatrix> {
    let services_json: String = row.get(5).map_err(store_error)?;
    let prerequisites_json: String = row.get(8).map_err(store_error)?;
    let services: BTreeSet<Service> = super::decode_json(&services_json)?;
    Ok(SkuServiceMatrix {
        directory_sku_id: row.get(0).map_err(store_error)?,
        commerce_product_id: row.get(1).map_err(store_error)?,
        commerce_sku_id: row.get(2).map_err(store_error)?,
        display_name: row.get(3).map_err(store_error)?,
        family: family_from_str(&row.get::<String>(4).map_err(store_error)?)?,
        included_services: services,
        storage_quota_bytes: row.get::<Option<i64>>(6).map_err(store_error)?.map(|v| v as u64),
        is_addon: row.get::<i64>(7).map_err(store_error)? != 0,
        addon_prerequisites: super::decode_json(&prerequisites_json)?,
    })
}

fn row_to_addon(row: &libsql::Row) -> Result<AddonCompatibility> {
    let required_json: String = row.get(9).map_err(store_error)?;
    let conflicting_json: String = row.get(10).map_err(store_error)?;
    Ok(AddonCompatibility {
        addon_sku: row.get(0).map_err(store_error)?,
        base_sku: row.get(1).map_err(store_error)?,
        category: row.get(2).map_err(store_error)?,
        min_quantity: row.get::<i64>(3).map_err(store_error)? as u32,
        max_quantity: row.get::<i64>(4).map_err(store_error)? as u32,
        multiplier: row.get::<i64>(5).map_err(store_error)? as u32,
        effective_date: row
            .get::<String>(6)
            .map_err(store_error)?
            .parse()
            .map_err(|e: chrono::ParseError| Error::InternalInvariant(e.to_string()))?,
        expiry_date: row
            .get::<Option<String>>(7)
            .map_err(store_error)?
            .map(|s| s.parse::<NaiveDate>())
            .transpose()
            .map_err(|e: chrono::ParseError| Error::InternalInvariant(e.to_string()))?,
        active: row.get::<i64>(8).map_err(store_error)? != 0,
        required_prerequisite_addons: super::decode_json(&required_json)?,
        conflicting_addons: super::decode_json(&conflicting_json)?,
    })
}

const MATRIX_COLUMNS: &str = "directory_sku_id, commerce_product_id, commerce_sku_id, display_name, family, \
    included_services, storage_quota_bytes, is_addon, addon_prerequisites";
const ADDON_COLUMNS: &str = "addon_sku, base_sku, category, min_quantity, max_quantity, multiplier, \
    effective_date, expiry_date, active, required_prerequisite_addons, conflicting_addons";

pub struct LibsqlSkuRegistryRepository {
    db: Database,
}

impl LibsqlSkuRegistryRepository {
    pub(crate) fn new(db: Database) -> Self {
        Self { db }
    }

    /// Seeds or refreshes the persisted mirror of an in-memory registry
    /// snapshot. The canonical registry lives in `seatscope-engine`; this
    /// table exists so the HTTP surface can answer SKU lookups without a
    /// process restart after a registry update.
    pub async fn replace_matrix(&self, entries: &[SkuServiceMatrix]) -> Result<()> {
        self.db.conn().execute("DELETE FROM sku_service_matrix", ()).await.map_err(store_error)?;
        for entry in entries {
            self.db
                .conn()
                .execute(
                    "INSERT INTO sku_service_matrix (directory_sku_id, commerce_product_id, commerce_sku_id, \
                     display_name, family, included_services, storage_quota_bytes, is_addon, addon_prerequisites) \
                     VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9)",
                    params![
                        entry.directory_sku_id.clone(),
                        entry.commerce_product_id.clone(),
                        entry.commerce_sku_id.clone(),
                        entry.display_name.clone(),
                        family_to_str(entry.family).to_string(),
                        super::encode_json(&entry.included_services),
                        entry.storage_quota_bytes.map(|v| v as i64),
                        i64::from(entry.is_addon),
                        super::encode_json(&entry.addon_prerequisites),
                    ],
                )
                .await
                .map_err(store_error)?;
        }
        Ok(())
    }

    /// Seeds or refreshes the persisted mirror of the in-memory add-on
    /// compatibility table, the same way [`Self::replace_matrix`] mirrors
    /// the service matrix.
    pub async fn replace_addon_compatibility(&self, entries: &[AddonCompatibility]) -> Result<()> {
        self.db.conn().execute("DELETE FROM addon_compatibility", ()).await.map_err(store_error)?;
        for entry in entries {
            self.db
                .conn()
                .execute(
                    "INSERT INTO addon_compatibility (addon_sku, base_sku, category, min_quantity, max_quantity, \
                     multiplier, effective_date, expiry_date, active, required_prerequisite_addons, \
                     conflicting_addons) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11)",
                    params![
                        entry.addon_sku.clone(),
                        entry.base_sku.clone(),
                        entry.category.clone(),
                        i64::from(entry.min_quantity),
                        i64::from(entry.max_quantity),
                        i64::from(entry.multiplier),
                        entry.effective_date.to_string(),
                        entry.expiry_date.map(|d| d.to_string()),
                        i64::from(entry.active),
                        super::encode_json(&entry.required_prerequisite_addons),
                        super::encode_json(&entry.conflicting_addons),
                    ],
                )
                .await
                .map_err(store_error)?;
        }
        Ok(())
    }
}

#[async_trait]
impl SkuRegistryRepository for LibsqlSkuRegistryRepository {
    async fn matrix_for_directory_sku(&self, directory_sku_id: &str) -> Result<Option<SkuServiceMatrix>> {
        let mut rows = self
            .db
            .conn()
            .query(
                &format!("SELECT {MATRIX_COLUMNS} FROM sku_service_matrix WHERE directory_sku_id = ?1"),
                params![directory_sku_id.to_string()],
            )
            .await
            .map_err(store_error)?;
        match rows.next().await.map_err(store_error)? {
            Some(row) => Ok(Some(row_to_matrix(&row)?)),
            None => Ok(None),
        }
    }

    async fn list_matrix(&self) -> Result<Vec<SkuServiceMatrix>> {
        let mut rows = self
            .db
            .conn()
            .query(&format!("SELECT {MATRIX_COLUMNS} FROM sku_service_matrix ORDER BY directory_sku_id"), ())
            .await
            .map_err(store_error)?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await.map_err(store_error)? {
            out.push(row_to_matrix(&row)?);
        }
        Ok(out)
    }

    async fn list_addon_compatibility(&self, base_sku: &str) -> Result<Vec<AddonCompatibility>> {
        let mut rows = self
            .db
            .conn()
            .query(
                &format!("SELECT {ADDON_COLUMNS} FROM addon_compatibility WHERE base_sku = ?1"),
                params![base_sku.to_string()],
            )
            .await
            .map_err(store_error)?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await.map_err(store_error)? {
            out.push(row_to_addon(&row)?);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use seatscope_core::usage::Service;
    use std::collections::BTreeSet;

    fn matrix(directory_sku_id: &str) -> SkuServiceMatrix {
        SkuServiceMatrix {
            directory_sku_id: directory_sku_id.into(),
            commerce_product_id: "CFQ7TTC0LFK6".into(),
            commerce_sku_id: "0001".into(),
            display_name: "Office 365 E3".into(),
            family: SkuFamily::Enterprise,
            included_services: BTreeSet::from([Service::Exchange, Service::Teams]),
            storage_quota_bytes: Some(1024),
            is_addon: false,
            addon_prerequisites: vec![],
        }
    }

    fn addon(addon_sku: &str, base_sku: &str) -> AddonCompatibility {
        AddonCompatibility {
            addon_sku: addon_sku.into(),
            base_sku: base_sku.into(),
            category: "security".into(),
            min_quantity: 1,
            max_quantity: 100,
            multiplier: 1,
            effective_date: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
            expiry_date: None,
            active: true,
            required_prerequisite_addons: vec![],
            conflicting_addons: vec![],
        }
    }

    #[tokio::test]
    async fn replace_matrix_replaces_the_full_table() {
        let db = Database::connect_in_memory().await.unwrap();
        let repo = db.sku_registry();

        repo.replace_matrix(&[matrix("ENTERPRISEPACK")]).await.unwrap();
        assert_eq!(repo.list_matrix().await.unwrap().len(), 1);

        repo.replace_matrix(&[matrix("SPE_E5")]).await.unwrap();
        let rows = repo.list_matrix().await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].directory_sku_id, "SPE_E5");
    }

    #[tokio::test]
    async fn matrix_for_directory_sku_round_trips_every_field() {
        let db = Database::connect_in_memory().await.unwrap();
        let repo = db.sku_registry();
        repo.replace_matrix(&[matrix("ENTERPRISEPACK")]).await.unwrap();

        let row = repo.matrix_for_directory_sku("ENTERPRISEPACK").await.unwrap().unwrap();
        assert_eq!(row.commerce_product_id, "CFQ7TTC0LFK6");
        assert_eq!(row.included_services, BTreeSet::from([Service::Exchange, Service::Teams]));
        assert_eq!(row.storage_quota_bytes, Some(1024));
        assert!(!row.is_addon);
    }

    #[tokio::test]
    async fn unknown_directory_sku_returns_none() {
        let db = Database::connect_in_memory().await.unwrap();
        let repo = db.sku_registry();
        assert!(repo.matrix_for_directory_sku("NOPE").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn addon_compatibility_is_scoped_to_its_base_sku() {
        let db = Database::connect_in_memory().await.unwrap();
        let repo = db.sku_registry();
        repo.replace_addon_compatibility(&[addon("EMS", "ENTERPRISEPACK"), addon("EMS", "SPE_E5")]).await.unwrap();

        let rows = repo.list_addon_compatibility("ENTERPRISEPACK").await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].addon_sku, "EMS");
        assert!(repo.list_addon_compatibility("SOMETHING_ELSE").await.unwrap().is_empty());
    }
}

// Copyright 2024-2025 Aprio One AB, Sweden
// Author: Kenneth Pernyer, kenneth@aprio.one
// SPDX-License-Identifier: MIT
// See LICENSE file in the project root for full license information.

//! SKU compatibility and service-inclusion reference data.

use crate::usage::Service;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkuFamily {
    Business,
    Enterprise,
    Frontline,
    Education,
}

/// Canonical record per directory SKU: which services it includes, its
/// family, and (for add-ons) its prerequisite base SKUs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkuServiceMatrix {
    /// Directory-side SKU identifier.
    pub directory_sku_id: String,
    /// Commerce-side (product_id, sku_id) this directory SKU maps to.
    pub commerce_product_id: String,
    pub commerce_sku_id: String,
    pub display_name: String,
    pub family: SkuFamily,
    pub included_services: BTreeSet<Service>,
    pub storage_quota_bytes: Option<u64>,
    pub is_addon: bool,
    pub addon_prerequisites: Vec<String>,
}

impl SkuServiceMatrix {
    #[must_use]
    pub fn covers(&self, required: &BTreeSet<Service>) -> bool {
        required.is_subset(&self.included_services)
    }
}

/// Relates an add-on SKU to a base SKU with quantity and availability
/// constraints. Keyed by (addon_sku, base_sku) effective at a given date.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddonCompatibility {
    pub addon_sku: String,
    pub base_sku: String,
    pub category: String,
    pub min_quantity: u32,
    pub max_quantity: u32,
    pub multiplier: u32,
    pub effective_date: NaiveDate,
    pub expiry_date: Option<NaiveDate>,
    pub active: bool,
    /// Add-on SKUs that must already be present alongside this one.
    pub required_prerequisite_addons: Vec<String>,
    /// Add-on SKUs that may not coexist with this one on the same base.
    pub conflicting_addons: Vec<String>,
}

/// One validation outcome from [`AddonCompatibility::validate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidationFailure {
    BaseNotCompatible,
    QuantityOutOfRange,
    QuantityNotDivisibleByMultiplier,
    OutsideEffectiveWindow,
    MissingPrerequisite,
    ConflictingAddonPresent,
}

/// The bulk-validation result for one (base, addon, quantity) item. Bulk
/// validation surfaces per-item results rather than short-circuiting on the
/// first failure (spec §4.6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    pub addon_sku: String,
    pub base_sku: String,
    pub compatible: bool,
    pub failures: Vec<ValidationFailure>,
}

impl AddonCompatibility {
    /// Validates one addon/base/quantity/date/context combination, reporting
    /// every failure rather than stopping at the first one.
    #[must_use]
    pub fn validate(
        &self,
        quantity: u32,
        date: NaiveDate,
        present_addons: &[String],
    ) -> ValidationReport {
        let mut failures = Vec::new();

        if !self.active {
            failures.push(ValidationFailure::BaseNotCompatible);
        }

        if quantity < self.min_quantity || quantity > self.max_quantity {
            failures.push(ValidationFailure::QuantityOutOfRange);
        } else if self.multiplier > 0 && quantity % self.multiplier != 0 {
            failures.push(ValidationFailure::QuantityNotDivisibleByMultiplier);
        }

        let within_window =
            date >= self.effective_date && self.expiry_date.is_none_or(|end| date <= end);
        if !within_window {
            failures.push(ValidationFailure::OutsideEffectiveWindow);
        }

        if !self
            .required_prerequisite_addons
            .iter()
            .all(|req| present_addons.iter().any(|p| p == req))
        {
            failures.push(ValidationFailure::MissingPrerequisite);
        }

        if self
            .conflicting_addons
            .iter()
            .any(|conflict| present_addons.iter().any(|p| p == conflict))
        {
            failures.push(ValidationFailure::ConflictingAddonPresent);
        }

        ValidationReport {
            addon_sku: self.addon_sku.clone(),
            base_sku: self.base_sku.clone(),
            compatible: failures.is_empty(),
            failures,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> AddonCompatibility {
        AddonCompatibility {
            addon_sku: "ADDON_A".into(),
            base_sku: "E3".into(),
            category: "security".into(),
            min_quantity: 1,
            max_quantity: 100,
            multiplier: 5,
            effective_date: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
            expiry_date: None,
            active: true,
            required_prerequisite_addons: vec![],
            conflicting_addons: vec![],
        }
    }

    #[test]
    fn valid_combination_has_no_failures() {
        let report = sample().validate(10, NaiveDate::from_ymd_opt(2026, 7, 1).unwrap(), &[]);
        assert!(report.compatible);
        assert!(report.failures.is_empty());
    }

    #[test]
    fn quantity_not_divisible_by_multiplier_is_reported_alongside_other_failures() {
        let addon = sample();
        let report = addon.validate(
            7,
            NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
            &[],
        );
        assert!(!report.compatible);
        assert!(report
            .failures
            .contains(&ValidationFailure::QuantityNotDivisibleByMultiplier));
        assert!(report
            .failures
            .contains(&ValidationFailure::OutsideEffectiveWindow));
    }

    #[test]
    fn conflicting_addon_is_detected() {
        let mut addon = sample();
        addon.conflicting_addons.push("ADDON_B".into());
        let report = addon.validate(
            10,
            NaiveDate::from_ymd_opt(2026, 7, 1).unwrap(),
            &["ADDON_B".to_string()],
        );
        assert!(report
            .failures
            .contains(&ValidationFailure::ConflictingAddonPresent));
    }
}

// Copyright 2024-2025 Aprio One AB, Sweden
// Author: Kenneth Pernyer, kenneth@aprio.one
// SPDX-License-Identifier: MIT
// See LICENSE file in the project root for full license information.

//! Commerce catalog and pricing entities.

use crate::money::Money;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A (product_id, sku_id) pair from the commerce catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommerceProduct {
    pub product_id: String,
    pub sku_id: String,
    pub title: String,
    pub publisher: String,
    pub family: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum Segment {
    Commercial,
    Education,
    Charity,
}

impl Default for Segment {
    fn default() -> Self {
        Segment::Commercial
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum BillingPlan {
    Annual,
    Monthly,
}

impl Default for BillingPlan {
    fn default() -> Self {
        BillingPlan::Annual
    }
}

/// A historized price row. Unique on (product_id, sku_id, market, currency,
/// segment, billing_plan, effective_start_date).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommercePrice {
    pub product_id: String,
    pub sku_id: String,
    pub market: String,
    pub currency: String,
    pub segment: Segment,
    pub billing_plan: BillingPlan,
    pub unit_price: Money,
    pub tier_min_quantity: Option<u32>,
    pub tier_max_quantity: Option<u32>,
    pub effective_start_date: NaiveDate,
    pub effective_end_date: Option<NaiveDate>,
}

impl CommercePrice {
    /// Normalizes to Monthly regardless of the row's native billing plan,
    /// used by the recommendation engine which always compares monthly
    /// costs. Annual rows are divided by 12; no rounding beyond the
    /// underlying `Money` cent precision.
    #[must_use]
    pub fn monthly_unit_price(&self) -> Money {
        match self.billing_plan {
            BillingPlan::Monthly => self.unit_price,
            BillingPlan::Annual => Money::from_cents(self.unit_price.cents() / 12),
        }
    }

    #[must_use]
    pub fn covers_date(&self, date: NaiveDate) -> bool {
        date >= self.effective_start_date
            && self.effective_end_date.is_none_or(|end| date <= end)
    }
}

// Copyright 2024-2025 Aprio One AB, Sweden
// Author: Kenneth Pernyer, kenneth@aprio.one
// SPDX-License-Identifier: MIT
// See LICENSE file in the project root for full license information.

//! License assignment entity.

use crate::ids::{TenantId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A (user, SKU) license assignment, unique on that pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LicenseAssignment {
    pub user_id: UserId,
    pub tenant_id: TenantId,
    /// Directory-side SKU identifier.
    pub sku_id: String,
    pub assigned_at: DateTime<Utc>,
    pub status: AssignmentStatus,
    pub source: AssignmentSource,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentStatus {
    Active,
    Suspended,
    Disabled,
    Trial,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentSource {
    Manual,
    Auto,
    GroupPolicy,
}

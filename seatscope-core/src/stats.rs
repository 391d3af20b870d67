// Copyright 2024-2025 Aprio One AB, Sweden
// Author: Kenneth Pernyer, kenneth@aprio.one
// SPDX-License-Identifier: MIT
// See LICENSE file in the project root for full license information.

//! Result statistics returned by sync and import operations (spec §4.4,
//! §4.5, §6.4).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct UserSyncStats {
    pub fetched: u32,
    pub inserted: u32,
    pub updated: u32,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct LicenseSyncStats {
    pub users_processed: u32,
    pub assignments_upserted: u32,
    pub assignments_removed: u32,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct UsageSyncStats {
    pub rows_fetched: u32,
    pub rows_upserted: u32,
    pub users_unmatched: u32,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ProductSyncStats {
    pub fetched: u32,
    pub upserted: u32,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct PriceSyncStats {
    pub fetched: u32,
    pub upserted: u32,
}

/// Stats for a bulk CSV price import (spec §4.5).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ImportStats {
    pub total_rows: u32,
    pub products_inserted: u32,
    pub prices_inserted: u32,
    pub rows_skipped_duplicate: u32,
    pub rows_rejected: u32,
}

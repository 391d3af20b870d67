// Copyright 2024-2025 Aprio One AB, Sweden
// Author: Kenneth Pernyer, kenneth@aprio.one
// SPDX-License-Identifier: MIT
// See LICENSE file in the project root for full license information.

use super::{store_error, Database};
use async_trait::async_trait;
use chrono::NaiveDate;
use libsql::params;
use seatscope_core::error::{Error, Result};
use seatscope_core::money::Money;
use seatscope_core::repository::CommerceRepository;
use seatscope_core::stats::{PriceSyncStats, ProductSyncStats};
use seatscope_core::{BillingPlan, CommercePrice, CommerceProduct, Segment};

fn segment_to_str(segment: Segment) -> &'static str {
    match segment {
        Segment::Commercial => "commercial",
        Segment::Education => "education",
        Segment::Charity => "charity",
    }
}

fn segment_from_str(raw: &str) -> Result<Segment> {
    match raw {
        "commercial" => Ok(Segment::Commercial),
        "education" => Ok(Segment::Education),
        "charity" => Ok(Segment::Charity),
        other => Err(Error::InternalInvariant(format!("unknown segment {other}"))),
    }
}

fn billing_plan_to_str(plan: BillingPlan) -> &'static str {
    match plan {
        BillingPlan::Annual => "annual",
        BillingPlan::Monthly => "monthly",
    }
}

fn billing_plan_from_str(raw: &str) -> Result<BillingPlan> {
    match raw {
        "annual" => Ok(BillingPlan::Annual),
        "monthly" => Ok(BillingPlan::Monthly),
        other => Err(Error::InternalInvariant(format!("unknown billing plan {other}"))),
    }
}

fn row_to_price(row: &libsql::Row) -> Result<CommercePrice> {
    Ok(CommercePrice {
        product_id: row.get(0).map_err(store_error)?,
        sku_id: row.get(1).map_err(store_error)?,
        market: row.get(2).map_err(store_error)?,
        currency: row.get(3).map_err(store_error)?,
        segment: segment_from_str(&row.get::<String>(4).map_err(store_error)?)?,
        billing_plan: billing_plan_from_str(&row.get::<String>(5).map_err(store_error)?)?,
        unit_price: Money::from_cents(row.get(6).map_err(store_error)?),
        tier_min_quantity: row.get::<Option<i64>>(7).map_err(store_error)?.map(|v| v as u32),
        tier_max_quantity: row.get::<Option<i64>>(8).map_err(store_error)?.map(|v| v as u32),
        effective_start_date: row
            .get::<String>(9)
            .map_err(store_error)?
            .parse()
            .map_err(|e: chrono::ParseError| Error::InternalInvariant(e.to_string()))?,
        effective_end_date: row
            .get::<Option<String>>(10)
            .map_err(store_error)?
            .map(|s| s.parse::<NaiveDate>())
            .transpose()
            .map_err(|e: chrono::ParseError| Error::InternalInvariant(e.to_string()))?,
    })
}

const PRICE_COLUMNS: &str = "product_id, sku_id, market, currency, segment, billing_plan, unit_price_cents, \
    tier_min_quantity, tier_max_quantity, effective_start_date, effective_end_date";

pub struct LibsqlCommerceRepository {
    db: Database,
}

impl LibsqlCommerceRepository {
    pub(crate) fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl CommerceRepository for LibsqlCommerceRepository {
    async fn upsert_products(&self, products: &[CommerceProduct]) -> Result<ProductSyncStats> {
        let mut upserted = 0u32;
        for product in products {
            self.db
                .conn()
                .execute(
                    "INSERT INTO commerce_products (product_id, sku_id, title, publisher, family, created_at, updated_at) \
                     VALUES (?1,?2,?3,?4,?5,?6,?7) \
                     ON CONFLICT(product_id, sku_id) DO UPDATE SET title=excluded.title, \
                     publisher=excluded.publisher, family=excluded.family, updated_at=excluded.updated_at",
                    params![
                        product.product_id.clone(),
                        product.sku_id.clone(),
                        product.title.clone(),
                        product.publisher.clone(),
                        product.family.clone(),
                        product.created_at.to_rfc3339(),
                        product.updated_at.to_rfc3339(),
                    ],
                )
                .await
                .map_err(store_error)?;
            upserted += 1;
        }
        Ok(ProductSyncStats { fetched: products.len() as u32, upserted })
    }

    async fn upsert_prices(&self, prices: &[CommercePrice]) -> Result<PriceSyncStats> {
        let mut upserted = 0u32;
        for price in prices {
            self.db
                .conn()
                .execute(
                    "INSERT INTO commerce_prices (product_id, sku_id, market, currency, segment, billing_plan, \
                     unit_price_cents, tier_min_quantity, tier_max_quantity, effective_start_date, effective_end_date) \
                     VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11) \
                     ON CONFLICT(product_id, sku_id, market, segment, billing_plan, effective_start_date) \
                     DO UPDATE SET currency=excluded.currency, unit_price_cents=excluded.unit_price_cents, \
                     tier_min_quantity=excluded.tier_min_quantity, tier_max_quantity=excluded.tier_max_quantity, \
                     effective_end_date=excluded.effective_end_date",
                    params![
                        price.product_id.clone(),
                        price.sku_id.clone(),
                        price.market.clone(),
                        price.currency.clone(),
                        segment_to_str(price.segment).to_string(),
                        billing_plan_to_str(price.billing_plan).to_string(),
                        price.unit_price.cents(),
                        price.tier_min_quantity.map(i64::from),
                        price.tier_max_quantity.map(i64::from),
                        price.effective_start_date.to_string(),
                        price.effective_end_date.map(|d| d.to_string()),
                    ],
                )
                .await
                .map_err(store_error)?;
            upserted += 1;
        }
        Ok(PriceSyncStats { fetched: prices.len() as u32, upserted })
    }

    async fn find_price(
        &self,
        product_id: &str,
        sku_id: &str,
        market: &str,
        date: NaiveDate,
    ) -> Result<Option<CommercePrice>> {
        let mut rows = self
            .db
            .conn()
            .query(
                &format!(
                    "SELECT {PRICE_COLUMNS} FROM commerce_prices WHERE product_id = ?1 AND sku_id = ?2 \
                     AND market = ?3 AND segment = 'commercial' AND effective_start_date <= ?4 \
                     AND (effective_end_date IS NULL OR effective_end_date >= ?4) \
                     ORDER BY effective_start_date DESC LIMIT 1"
                ),
                params![product_id.to_string(), sku_id.to_string(), market.to_string(), date.to_string()],
            )
            .await
            .map_err(store_error)?;
        match rows.next().await.map_err(store_error)? {
            Some(row) => Ok(Some(row_to_price(&row)?)),
            None => Ok(None),
        }
    }
}

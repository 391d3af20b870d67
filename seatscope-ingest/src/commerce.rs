// Copyright 2024-2025 Aprio One AB, Sweden
// Author: Kenneth Pernyer, kenneth@aprio.one
// SPDX-License-Identifier: MIT
// See LICENSE file in the project root for full license information.

//! Commerce Sync: product catalog and price list ingestion, including bulk
//! CSV import (spec §4.5, §6.2).

use crate::http::HttpClientCore;
use crate::token_cache::{CachedToken, TokenCache};
use chrono::{NaiveDate, Utc};
use seatscope_core::error::{Error, Result};
use seatscope_core::money::Money;
use seatscope_core::repository::CommerceRepository;
use seatscope_core::stats::{ImportStats, PriceSyncStats, ProductSyncStats};
use seatscope_core::{BillingPlan, CommercePrice, CommerceProduct, Segment, TenantId};
use serde::Deserialize;
use std::collections::HashSet;

/// Commerce Sync has exactly one set of OAuth client-credentials, global to
/// the process rather than per-tenant (spec §6.2). `TokenCache` is keyed by
/// `TenantId`, so this nil id is the single slot that credential occupies.
const TOKEN_SLOT: TenantId = TenantId(uuid::Uuid::nil());

#[derive(Debug, Deserialize)]
struct CollectionPage<T> {
    value: Vec<T>,
    #[serde(rename = "nextLink")]
    next_link: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProductDto {
    #[serde(rename = "productId")]
    product_id: String,
    #[serde(rename = "skuId")]
    sku_id: String,
    title: String,
    publisher: String,
    family: String,
}

#[derive(Debug, Deserialize)]
struct PriceDto {
    #[serde(rename = "productId")]
    product_id: String,
    #[serde(rename = "skuId")]
    sku_id: String,
    market: String,
    currency: String,
    segment: String,
    #[serde(rename = "billingPlan")]
    billing_plan: String,
    #[serde(rename = "unitPrice")]
    unit_price: f64,
    #[serde(rename = "effectiveStartDate")]
    effective_start_date: NaiveDate,
    #[serde(rename = "effectiveEndDate")]
    effective_end_date: Option<NaiveDate>,
}

/// Normalizes a CSV/API segment string; unknown or missing values fall back
/// to the `Commercial` sentinel (spec §4.5, §6.2) rather than propagating
/// raw strings to the store.
fn normalize_segment(raw: &str) -> Segment {
    match raw {
        "Education" => Segment::Education,
        "Charity" => Segment::Charity,
        _ => Segment::Commercial,
    }
}

/// Normalizes a CSV/API billing-plan string; unknown or missing values fall
/// back to the `Annual` sentinel.
fn normalize_billing_plan(raw: &str) -> BillingPlan {
    match raw {
        "Monthly" => BillingPlan::Monthly,
        _ => BillingPlan::Annual,
    }
}

pub struct CommerceClient {
    http: HttpClientCore,
    base_url: String,
    tokens: TokenCache,
    authority_url: String,
    client_id: String,
    client_secret: String,
    scope: String,
}

impl CommerceClient {
    #[must_use]
    pub fn new(
        http: HttpClientCore,
        base_url: impl Into<String>,
        authority_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        scope: impl Into<String>,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            tokens: TokenCache::new(),
            authority_url: authority_url.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            scope: scope.into(),
        }
    }

    /// Acquires (or reuses a cached) access token via the OAuth 2.0
    /// client-credentials grant, mirroring `DirectoryClient::acquire_token`
    /// but against a single global credential rather than a per-tenant one.
    async fn acquire_token(&self) -> Result<String> {
        let authority_url = self.authority_url.clone();
        let client_id = self.client_id.clone();
        let client_secret = self.client_secret.clone();
        let scope = self.scope.clone();
        let http = self.http.clone();

        self.tokens
            .get_or_refresh(TOKEN_SLOT, move || async move {
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
                                ("scope", scope.as_str()),
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

    /// Runs `call` with a bearer token, retrying exactly once with a
    /// freshly acquired token if the first attempt is unauthorized (spec
    /// §4.3 auth-invalidation rule), mirroring
    /// `DirectoryClient::with_auth_retry`.
    async fn with_auth_retry<T, F, Fut>(&self, mut call: F) -> Result<T>
    where
        F: FnMut(String) -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        let token = self.acquire_token().await?;
        match call(token).await {
            Err(Error::Unauthorized) => {
                self.tokens.invalidate(TOKEN_SLOT).await;
                let fresh_token = self.acquire_token().await?;
                call(fresh_token).await
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
                .send_json(move || reqwest::Client::new().get(&link).bearer_auth(&token))
                .await?;
            next = page.next_link;
            items.extend(page.value);
        }
        Ok(items)
    }

    pub async fn sync_products(&self, repo: &dyn CommerceRepository) -> Result<ProductSyncStats> {
        let url = format!("{}/pricing/products", self.base_url);
        let dtos: Vec<ProductDto> = self
            .with_auth_retry(|token| {
                let url = url.clone();
                async move { self.fetch_all_pages(&token, &url).await }
            })
            .await?;
        let now = Utc::now();
        let mut seen = HashSet::new();
        let products: Vec<CommerceProduct> = dtos
            .into_iter()
            .filter(|dto| seen.insert((dto.product_id.clone(), dto.sku_id.clone())))
            .map(|dto| CommerceProduct {
                product_id: dto.product_id,
                sku_id: dto.sku_id,
                title: dto.title,
                publisher: dto.publisher,
                family: dto.family,
                created_at: now,
                updated_at: now,
            })
            .collect();
        let fetched = products.len() as u32;
        let mut stats = repo.upsert_products(&products).await?;
        stats.fetched = fetched;
        Ok(stats)
    }

    pub async fn sync_prices(&self, repo: &dyn CommerceRepository) -> Result<PriceSyncStats> {
        let url = format!("{}/pricing", self.base_url);
        let dtos: Vec<PriceDto> = self
            .with_auth_retry(|token| {
                let url = url.clone();
                async move { self.fetch_all_pages(&token, &url).await }
            })
            .await?;
        let fetched = dtos.len() as u32;
        let prices: Vec<CommercePrice> = dtos.into_iter().map(price_dto_to_domain).collect();
        let mut stats = repo.upsert_prices(&prices).await?;
        stats.fetched = fetched;
        Ok(stats)
    }

    /// Imports a bulk CSV of prices (spec §4.5, §6.2 column layout).
    /// Rows are deduplicated by their natural key, keeping the last
    /// occurrence; malformed rows are rejected and counted rather than
    /// aborting the whole import.
    pub async fn import_price_csv(&self, repo: &dyn CommerceRepository, csv_body: &str) -> Result<ImportStats> {
        let mut reader = csv::ReaderBuilder::new().has_headers(true).from_reader(csv_body.as_bytes());

        let mut total_rows = 0u32;
        let mut rejected = 0u32;
        let mut by_key: std::collections::HashMap<String, (CommerceProduct, CommercePrice)> =
            std::collections::HashMap::new();

        for record in reader.records() {
            total_rows += 1;
            let record = match record {
                Ok(r) => r,
                Err(_) => {
                    rejected += 1;
                    continue;
                }
            };
            match parse_price_csv_row(&record) {
                Some((product, price)) => {
                    let key = format!(
                        "{}|{}|{}|{}|{:?}|{:?}|{}",
                        price.product_id,
                        price.sku_id,
                        price.market,
                        price.currency,
                        price.segment,
                        price.billing_plan,
                        price.effective_start_date
                    );
                    by_key.insert(key, (product, price));
                }
                None => rejected += 1,
            }
        }

        let rows_skipped_duplicate = (total_rows - rejected).saturating_sub(by_key.len() as u32);

        let products: Vec<CommerceProduct> = {
            let mut seen = HashSet::new();
            by_key
                .values()
                .filter(|(p, _)| seen.insert((p.product_id.clone(), p.sku_id.clone())))
                .map(|(p, _)| p.clone())
                .collect()
        };
        let prices: Vec<CommercePrice> = by_key.into_values().map(|(_, price)| price).collect();

        let products_inserted = repo.upsert_products(&products).await?.upserted;
        let prices_inserted = repo.upsert_prices(&prices).await?.upserted;

        Ok(ImportStats {
            total_rows,
            products_inserted,
            prices_inserted,
            rows_skipped_duplicate,
            rows_rejected: rejected,
        })
    }
}

fn price_dto_to_domain(dto: PriceDto) -> CommercePrice {
    CommercePrice {
        product_id: dto.product_id,
        sku_id: dto.sku_id,
        market: dto.market,
        currency: dto.currency,
        segment: normalize_segment(&dto.segment),
        billing_plan: normalize_billing_plan(&dto.billing_plan),
        unit_price: Money::from_major(dto.unit_price),
        tier_min_quantity: None,
        tier_max_quantity: None,
        effective_start_date: dto.effective_start_date,
        effective_end_date: dto.effective_end_date,
    }
}

fn parse_price_csv_row(record: &csv::StringRecord) -> Option<(CommerceProduct, CommercePrice)> {
    let get = |i: usize| record.get(i).map(str::trim);
    let product_id = get(0)?.to_string();
    let sku_id = get(1)?.to_string();
    let product_title = get(2)?.to_string();
    let publisher = get(4)?.to_string();
    let market = get(5)?.to_string();
    let currency = get(6)?.to_string();
    let unit_price: f64 = get(7)?.parse().ok()?;
    let segment = normalize_segment(get(8).unwrap_or(""));
    let billing_plan = normalize_billing_plan(get(9).unwrap_or(""));
    let tier_min_quantity = get(10).and_then(|s| s.parse().ok());
    let tier_max_quantity = get(11).and_then(|s| s.parse().ok());
    let effective_start_date: NaiveDate = get(12)?.parse().ok()?;
    let effective_end_date = get(13).and_then(|s| s.parse().ok());

    if product_id.is_empty() || sku_id.is_empty() {
        return None;
    }

    let now = Utc::now();
    let product = CommerceProduct {
        product_id: product_id.clone(),
        sku_id: sku_id.clone(),
        title: product_title,
        publisher,
        family: String::new(),
        created_at: now,
        updated_at: now,
    };
    let price = CommercePrice {
        product_id,
        sku_id,
        market,
        currency,
        segment,
        billing_plan,
        unit_price: Money::from_major(unit_price),
        tier_min_quantity,
        tier_max_quantity,
        effective_start_date,
        effective_end_date,
    };
    Some((product, price))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(fields: &[&str]) -> csv::StringRecord {
        csv::StringRecord::from(fields.to_vec())
    }

    #[test]
    fn unknown_segment_and_billing_plan_normalize_to_sentinels() {
        assert_eq!(normalize_segment("Unknown"), Segment::Commercial);
        assert_eq!(normalize_segment(""), Segment::Commercial);
        assert_eq!(normalize_billing_plan(""), BillingPlan::Annual);
    }

    #[test]
    fn parses_a_well_formed_csv_row() {
        let record = row(&[
            "prod1", "sku1", "Title", "SkuTitle", "Microsoft", "US", "USD", "12.50", "Commercial",
            "Monthly", "1", "100", "2026-01-01", "",
        ]);
        let (product, price) = parse_price_csv_row(&record).unwrap();
        assert_eq!(product.product_id, "prod1");
        assert_eq!(price.unit_price, Money::from_major(12.50));
        assert_eq!(price.billing_plan, BillingPlan::Monthly);
    }

    #[test]
    fn rejects_row_with_unparseable_price() {
        let record = row(&[
            "prod1", "sku1", "Title", "SkuTitle", "Microsoft", "US", "USD", "not-a-price", "Commercial",
            "Monthly", "1", "100", "2026-01-01", "",
        ]);
        assert!(parse_price_csv_row(&record).is_none());
    }

    #[test]
    fn rejects_row_missing_required_identifiers() {
        let record = row(&[
            "", "sku1", "Title", "SkuTitle", "Microsoft", "US", "USD", "12.50", "Commercial",
            "Monthly", "1", "100", "2026-01-01", "",
        ]);
        assert!(parse_price_csv_row(&record).is_none());
    }
}

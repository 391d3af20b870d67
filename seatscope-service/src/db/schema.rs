// Copyright 2024-2025 Aprio One AB, Sweden
// Author: Kenneth Pernyer, kenneth@aprio.one
// SPDX-License-Identifier: MIT
// See LICENSE file in the project root for full license information.

//! Embedded schema migration, applied once at [`super::Database::connect`].
//!
//! Enum-shaped columns are constrained with `CHECK` rather than a SQLite
//! native enum type, since libsql is SQLite-compatible and has none.

pub const MIGRATION: &str = r"
CREATE TABLE IF NOT EXISTS tenants (
    id                  TEXT PRIMARY KEY,
    external_tenant_id  TEXT NOT NULL UNIQUE,
    display_name        TEXT NOT NULL,
    country_code        TEXT NOT NULL,
    default_language    TEXT NOT NULL,
    onboarding_state    TEXT NOT NULL CHECK (onboarding_state IN ('pending','configured','active','error')),
    consented_at        TEXT,
    created_at          TEXT NOT NULL,
    updated_at          TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS tenant_credentials (
    tenant_id               TEXT PRIMARY KEY REFERENCES tenants(id),
    client_id               TEXT NOT NULL,
    encrypted_secret        BLOB NOT NULL,
    certificate_thumbprint  TEXT,
    authority_url           TEXT NOT NULL,
    scopes                  TEXT NOT NULL,
    is_valid                INTEGER NOT NULL,
    created_at              TEXT NOT NULL,
    updated_at              TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS users (
    id                    TEXT PRIMARY KEY,
    tenant_id             TEXT NOT NULL REFERENCES tenants(id),
    external_user_id      TEXT NOT NULL,
    principal_name        TEXT NOT NULL,
    display_name          TEXT NOT NULL,
    account_enabled       INTEGER NOT NULL,
    department            TEXT,
    job_title             TEXT,
    preferred_language    TEXT,
    created_at            TEXT NOT NULL,
    updated_at            TEXT NOT NULL,
    UNIQUE (tenant_id, external_user_id)
);
CREATE INDEX IF NOT EXISTS idx_users_tenant_id ON users(tenant_id);
CREATE INDEX IF NOT EXISTS idx_users_principal_name ON users(principal_name);

CREATE TABLE IF NOT EXISTS license_assignments (
    user_id      TEXT NOT NULL REFERENCES users(id),
    tenant_id    TEXT NOT NULL REFERENCES tenants(id),
    sku_id       TEXT NOT NULL,
    assigned_at  TEXT NOT NULL,
    status       TEXT NOT NULL CHECK (status IN ('active','suspended','disabled','trial')),
    source       TEXT NOT NULL CHECK (source IN ('manual','auto','group_policy')),
    PRIMARY KEY (user_id, sku_id)
);
CREATE INDEX IF NOT EXISTS idx_license_assignments_user_id ON license_assignments(user_id);

CREATE TABLE IF NOT EXISTS usage_metrics (
    user_id                           TEXT NOT NULL REFERENCES users(id),
    period                            TEXT NOT NULL,
    report_date                       TEXT NOT NULL,
    emails_sent                       INTEGER NOT NULL,
    emails_received                   INTEGER NOT NULL,
    mailbox_size_bytes                INTEGER NOT NULL,
    exchange_last_activity            TEXT,
    onedrive_bytes_used               INTEGER NOT NULL,
    onedrive_files_modified           INTEGER NOT NULL,
    onedrive_last_activity            TEXT,
    teams_messages                    INTEGER NOT NULL,
    teams_meetings                    INTEGER NOT NULL,
    teams_calls                       INTEGER NOT NULL,
    teams_last_activity               TEXT,
    sharepoint_views                  INTEGER NOT NULL,
    sharepoint_edits                  INTEGER NOT NULL,
    sharepoint_last_activity          TEXT,
    office_web_edits                  INTEGER NOT NULL,
    has_desktop_activation_last_28d   INTEGER NOT NULL,
    office_last_activity              TEXT,
    created_at                        TEXT NOT NULL,
    PRIMARY KEY (user_id, period)
);
CREATE INDEX IF NOT EXISTS idx_usage_metrics_report_date ON usage_metrics(report_date);
CREATE INDEX IF NOT EXISTS idx_usage_metrics_user_id ON usage_metrics(user_id);

CREATE TABLE IF NOT EXISTS commerce_products (
    product_id  TEXT NOT NULL,
    sku_id      TEXT NOT NULL,
    title       TEXT NOT NULL,
    publisher   TEXT NOT NULL,
    family      TEXT NOT NULL,
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL,
    PRIMARY KEY (product_id, sku_id)
);

CREATE TABLE IF NOT EXISTS commerce_prices (
    product_id            TEXT NOT NULL,
    sku_id                TEXT NOT NULL,
    market                TEXT NOT NULL,
    currency              TEXT NOT NULL,
    segment               TEXT NOT NULL CHECK (segment IN ('commercial','education','charity')),
    billing_plan          TEXT NOT NULL CHECK (billing_plan IN ('annual','monthly')),
    unit_price_cents      INTEGER NOT NULL,
    tier_min_quantity     INTEGER,
    tier_max_quantity     INTEGER,
    effective_start_date  TEXT NOT NULL,
    effective_end_date    TEXT,
    PRIMARY KEY (product_id, sku_id, market, segment, billing_plan, effective_start_date)
);
CREATE INDEX IF NOT EXISTS idx_commerce_prices_effective_window
    ON commerce_prices(effective_start_date, effective_end_date);

CREATE TABLE IF NOT EXISTS sku_service_matrix (
    directory_sku_id       TEXT PRIMARY KEY,
    commerce_product_id    TEXT NOT NULL,
    commerce_sku_id        TEXT NOT NULL,
    display_name           TEXT NOT NULL,
    family                 TEXT NOT NULL CHECK (family IN ('business','enterprise','frontline','education')),
    included_services      TEXT NOT NULL,
    storage_quota_bytes    INTEGER,
    is_addon               INTEGER NOT NULL,
    addon_prerequisites    TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS addon_compatibility (
    addon_sku                      TEXT NOT NULL,
    base_sku                       TEXT NOT NULL,
    category                       TEXT NOT NULL,
    min_quantity                   INTEGER NOT NULL,
    max_quantity                   INTEGER NOT NULL,
    multiplier                     INTEGER NOT NULL,
    effective_date                 TEXT NOT NULL,
    expiry_date                    TEXT,
    active                         INTEGER NOT NULL,
    required_prerequisite_addons   TEXT NOT NULL,
    conflicting_addons             TEXT NOT NULL,
    PRIMARY KEY (addon_sku, base_sku)
);

CREATE TABLE IF NOT EXISTS analyses (
    id            TEXT PRIMARY KEY,
    tenant_id     TEXT NOT NULL REFERENCES tenants(id),
    analyzed_at   TEXT NOT NULL,
    status        TEXT NOT NULL CHECK (status IN ('pending','running','completed','failed')),
    summary_json  TEXT,
    error_message TEXT
);
CREATE INDEX IF NOT EXISTS idx_analyses_tenant_analyzed_at ON analyses(tenant_id, analyzed_at DESC);

CREATE TABLE IF NOT EXISTS recommendations (
    id                    TEXT PRIMARY KEY,
    analysis_id           TEXT NOT NULL REFERENCES analyses(id),
    user_id               TEXT NOT NULL REFERENCES users(id),
    current_sku           TEXT,
    recommended_sku       TEXT,
    savings_monthly_cents INTEGER NOT NULL,
    action                TEXT NOT NULL CHECK (action IN ('remove','downgrade','upgrade','no_change')),
    reason_code           TEXT NOT NULL CHECK (reason_code IN
                              ('remove_inactive','remove_account_disabled','downgrade_e5_to_e3',
                               'downgrade_e3_to_e1','downgrade_to_frontline','no_change')),
    reason_text           TEXT NOT NULL,
    status                TEXT NOT NULL CHECK (status IN ('pending','accepted','rejected')),
    created_at            TEXT NOT NULL,
    updated_at            TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_recommendations_analysis_id ON recommendations(analysis_id);
";

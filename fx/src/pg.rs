//! Postgres-backed store.
//!
//! Expected schema (site columns are `NULL` for the global scope):
//!
//! ```sql
//! CREATE TABLE currencies (
//!     currency_id INT PRIMARY KEY,
//!     currency_code TEXT NOT NULL,
//!     currency_display_name TEXT NOT NULL DEFAULT '',
//!     currency_is_main BOOLEAN NOT NULL DEFAULT FALSE,
//!     currency_site_id INT NULL,
//!     currency_round_to INT NOT NULL DEFAULT 2
//! );
//! CREATE TABLE exchange_tables (
//!     exchange_table_id INT PRIMARY KEY,
//!     exchange_table_display_name TEXT NOT NULL DEFAULT '',
//!     exchange_table_site_id INT NULL,
//!     exchange_table_valid_from TIMESTAMPTZ NULL,
//!     exchange_table_valid_to TIMESTAMPTZ NULL,
//!     exchange_table_rate_from_global_currency NUMERIC NULL
//! );
//! CREATE TABLE exchange_rates (
//!     exchange_rate_id INT PRIMARY KEY,
//!     exchange_table_id INT NOT NULL REFERENCES exchange_tables ON DELETE CASCADE,
//!     exchange_rate_to_currency_id INT NOT NULL REFERENCES currencies ON DELETE CASCADE,
//!     exchange_rate_value NUMERIC NOT NULL,
//!     UNIQUE (exchange_table_id, exchange_rate_to_currency_id)
//! );
//! CREATE TABLE site_currency_settings (
//!     site_id INT PRIMARY KEY,
//!     use_global_currencies BOOLEAN NOT NULL DEFAULT FALSE
//! );
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, PgRow};
use sqlx::Row;
use storefx_common::{
    Currency, CurrencyCode, CurrencyId, ExchangeRate, ExchangeTable, ExchangeTableId, ScopeId,
    Timestamp,
};
use tracing::debug;

use crate::error::{FxError, FxResult};
use crate::store::{CurrencyLookup, ExchangeRateLookup, ExchangeTableLookup, SiteCurrencySettings};

const CURRENCY_COLUMNS: &str = "currency_id, currency_code, currency_display_name, \
     currency_is_main, COALESCE(currency_site_id, 0) AS currency_site_id, currency_round_to";

const TABLE_COLUMNS: &str = "exchange_table_id, exchange_table_display_name, \
     COALESCE(exchange_table_site_id, 0) AS exchange_table_site_id, exchange_table_valid_from, \
     exchange_table_valid_to, exchange_table_rate_from_global_currency";

/// Store reading currencies and exchange tables from Postgres.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect to `database_url`.
    pub async fn connect(database_url: &str) -> FxResult<Self> {
        let pool = PgPool::connect(database_url).await.map_err(store_error)?;
        Ok(Self::new(pool))
    }
}

fn store_error(err: sqlx::Error) -> FxError {
    FxError::Store(err.to_string())
}

fn currency_from_row(row: &PgRow) -> Result<Currency, sqlx::Error> {
    let round_to: i32 = row.try_get("currency_round_to")?;
    Ok(Currency {
        id: CurrencyId::new(row.try_get("currency_id")?),
        code: CurrencyCode::new(row.try_get::<String, _>("currency_code")?),
        display_name: row.try_get("currency_display_name")?,
        is_main: row.try_get("currency_is_main")?,
        scope: ScopeId::from_raw(row.try_get("currency_site_id")?),
        round_to: round_to.max(0) as u32,
    })
}

fn table_from_row(row: &PgRow) -> Result<ExchangeTable, sqlx::Error> {
    Ok(ExchangeTable {
        id: ExchangeTableId::new(row.try_get("exchange_table_id")?),
        display_name: row.try_get("exchange_table_display_name")?,
        scope: ScopeId::from_raw(row.try_get("exchange_table_site_id")?),
        valid_from: row.try_get::<Option<DateTime<Utc>>, _>("exchange_table_valid_from")?,
        valid_to: row.try_get::<Option<DateTime<Utc>>, _>("exchange_table_valid_to")?,
        rate_from_global_currency: row
            .try_get::<Option<Decimal>, _>("exchange_table_rate_from_global_currency")?,
    })
}

#[async_trait]
impl CurrencyLookup for PgStore {
    async fn by_code(&self, code: &CurrencyCode, scope: ScopeId) -> FxResult<Option<Currency>> {
        let sql = format!(
            "SELECT {CURRENCY_COLUMNS} FROM currencies \
             WHERE UPPER(currency_code) = $1 AND COALESCE(currency_site_id, 0) = $2"
        );
        let row = sqlx::query(&sql)
            .bind(code.as_str())
            .bind(scope.as_i32())
            .fetch_optional(&self.pool)
            .await
            .map_err(store_error)?;

        row.as_ref()
            .map(currency_from_row)
            .transpose()
            .map_err(store_error)
    }

    async fn by_id(&self, id: CurrencyId) -> FxResult<Option<Currency>> {
        let sql = format!("SELECT {CURRENCY_COLUMNS} FROM currencies WHERE currency_id = $1");
        let row = sqlx::query(&sql)
            .bind(id.as_i32())
            .fetch_optional(&self.pool)
            .await
            .map_err(store_error)?;

        row.as_ref()
            .map(currency_from_row)
            .transpose()
            .map_err(store_error)
    }
}

#[async_trait]
impl ExchangeTableLookup for PgStore {
    async fn last_valid_or_expired(
        &self,
        scope: ScopeId,
        now: Timestamp,
    ) -> FxResult<Option<ExchangeTable>> {
        let valid = format!(
            "SELECT {TABLE_COLUMNS} FROM exchange_tables \
             WHERE COALESCE(exchange_table_site_id, 0) = $1 \
               AND (exchange_table_valid_from IS NULL OR exchange_table_valid_from <= $2) \
               AND (exchange_table_valid_to IS NULL OR exchange_table_valid_to > $2) \
             ORDER BY exchange_table_valid_from DESC NULLS LAST, \
                      exchange_table_valid_to DESC NULLS FIRST, \
                      exchange_table_id DESC \
             LIMIT 1"
        );
        let row = sqlx::query(&valid)
            .bind(scope.as_i32())
            .bind(now)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_error)?;

        if let Some(row) = row {
            return table_from_row(&row).map(Some).map_err(store_error);
        }

        debug!(scope = %scope, "No valid exchange table, querying expired ones");
        let expired = format!(
            "SELECT {TABLE_COLUMNS} FROM exchange_tables \
             WHERE COALESCE(exchange_table_site_id, 0) = $1 \
               AND exchange_table_valid_to <= $2 \
             ORDER BY exchange_table_valid_to DESC, exchange_table_id DESC \
             LIMIT 1"
        );
        let row = sqlx::query(&expired)
            .bind(scope.as_i32())
            .bind(now)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_error)?;

        row.as_ref()
            .map(table_from_row)
            .transpose()
            .map_err(store_error)
    }
}

#[async_trait]
impl ExchangeRateLookup for PgStore {
    async fn by_table_and_target(
        &self,
        table: ExchangeTableId,
        currency: CurrencyId,
    ) -> FxResult<Option<ExchangeRate>> {
        let row = sqlx::query(
            "SELECT exchange_rate_id, exchange_table_id, exchange_rate_to_currency_id, \
                    exchange_rate_value \
             FROM exchange_rates \
             WHERE exchange_table_id = $1 AND exchange_rate_to_currency_id = $2",
        )
        .bind(table.as_i32())
        .bind(currency.as_i32())
        .fetch_optional(&self.pool)
        .await
        .map_err(store_error)?;

        let Some(row) = row else {
            return Ok(None);
        };

        let rate = ExchangeRate::new(
            row.try_get::<i32, _>("exchange_rate_id").map_err(store_error)?,
            row.try_get::<i32, _>("exchange_table_id").map_err(store_error)?,
            row.try_get::<i32, _>("exchange_rate_to_currency_id")
                .map_err(store_error)?,
            row.try_get::<Decimal, _>("exchange_rate_value")
                .map_err(store_error)?,
        );
        Ok(Some(rate))
    }
}

#[async_trait]
impl SiteCurrencySettings for PgStore {
    async fn main_currency_code(&self, scope: ScopeId) -> FxResult<Option<CurrencyCode>> {
        let code: Option<String> = sqlx::query_scalar(
            "SELECT currency_code FROM currencies \
             WHERE currency_is_main AND COALESCE(currency_site_id, 0) = $1 \
             LIMIT 1",
        )
        .bind(scope.as_i32())
        .fetch_optional(&self.pool)
        .await
        .map_err(store_error)?;

        Ok(code.map(CurrencyCode::new))
    }

    async fn use_global_currencies(&self, site: ScopeId) -> FxResult<bool> {
        if site.is_global() {
            return Ok(false);
        }

        let enabled: Option<bool> = sqlx::query_scalar(
            "SELECT use_global_currencies FROM site_currency_settings WHERE site_id = $1",
        )
        .bind(site.as_i32())
        .fetch_optional(&self.pool)
        .await
        .map_err(store_error)?;

        Ok(enabled.unwrap_or(false))
    }
}

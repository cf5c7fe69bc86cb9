use chrono::{DateTime, Utc};
use serde::de::{self, Deserializer};
use serde::ser::{self, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::fmt;
use thiserror::Error;

// =================================================================
// Constants
// =================================================================

/// Only symbols reported with this status are ingested.
pub const STATUS_TRADING: &str = "TRADING";

pub const DEFAULT_EXCHANGE_NAME: &str = "Binance";

const FILTER_TYPE_KEY: &str = "filterType";

// =================================================================
// Errors
// =================================================================

/// Data layer error types
#[derive(Error, Debug)]
pub enum DataError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Duplicated symbol in internal store, symbol={symbol} ({count} records)")]
    DuplicateSymbol { symbol: String, count: usize },

    #[error(
        "Batch aborted at {symbol} after {staged} of {total} symbols were staged, nothing was written: {source}"
    )]
    BatchAborted {
        symbol: String,
        staged: usize,
        total: usize,
        #[source]
        source: sqlx::Error,
    },
}

pub type DataResult<T> = Result<T, DataError>;

// =================================================================
// Filters
// =================================================================

/// Filter discriminators understood by this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterKind {
    PriceFilter,
    LotSize,
    PercentPrice,
    MinNotional,
    MarketLotSize,
    MaxNumOrders,
    MaxNumAlgoOrders,
    IcebergParts,
}

impl FilterKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterKind::PriceFilter => "PRICE_FILTER",
            FilterKind::LotSize => "LOT_SIZE",
            FilterKind::PercentPrice => "PERCENT_PRICE",
            FilterKind::MinNotional => "MIN_NOTIONAL",
            FilterKind::MarketLotSize => "MARKET_LOT_SIZE",
            FilterKind::MaxNumOrders => "MAX_NUM_ORDERS",
            FilterKind::MaxNumAlgoOrders => "MAX_NUM_ALGO_ORDERS",
            FilterKind::IcebergParts => "ICEBERG_PARTS",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "PRICE_FILTER" => Some(FilterKind::PriceFilter),
            "LOT_SIZE" => Some(FilterKind::LotSize),
            "PERCENT_PRICE" => Some(FilterKind::PercentPrice),
            "MIN_NOTIONAL" => Some(FilterKind::MinNotional),
            "MARKET_LOT_SIZE" => Some(FilterKind::MarketLotSize),
            "MAX_NUM_ORDERS" => Some(FilterKind::MaxNumOrders),
            "MAX_NUM_ALGO_ORDERS" => Some(FilterKind::MaxNumAlgoOrders),
            "ICEBERG_PARTS" => Some(FilterKind::IcebergParts),
            _ => None,
        }
    }
}

impl fmt::Display for FilterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decimal fields are kept as the exact strings sent by the venue and only
/// parsed where arithmetic happens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceFilter {
    pub min_price: String,
    pub max_price: String,
    pub tick_size: String,
}

/// Shared by `LOT_SIZE` and `MARKET_LOT_SIZE`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LotSizeFilter {
    pub min_qty: String,
    pub max_qty: String,
    pub step_size: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PercentPriceFilter {
    pub multiplier_up: String,
    pub multiplier_down: String,
    pub avg_price_mins: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MinNotionalFilter {
    pub min_notional: String,
    pub apply_to_market: bool,
    pub avg_price_mins: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaxNumOrdersFilter {
    pub max_num_orders: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaxNumAlgoOrdersFilter {
    pub max_num_algo_orders: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IcebergPartsFilter {
    pub limit: u32,
}

/// One entry of a symbol's `filters` array, discriminated by `filterType`.
///
/// Tags this crate does not know are kept verbatim in `Other` so a stored
/// record never drops upstream data.
#[derive(Debug, Clone, PartialEq)]
pub enum SymbolFilter {
    PriceFilter(PriceFilter),
    LotSize(LotSizeFilter),
    PercentPrice(PercentPriceFilter),
    MinNotional(MinNotionalFilter),
    MarketLotSize(LotSizeFilter),
    MaxNumOrders(MaxNumOrdersFilter),
    MaxNumAlgoOrders(MaxNumAlgoOrdersFilter),
    IcebergParts(IcebergPartsFilter),
    Other {
        filter_type: String,
        payload: Map<String, Value>,
    },
}

impl SymbolFilter {
    pub fn filter_type(&self) -> &str {
        match self {
            SymbolFilter::Other { filter_type, .. } => filter_type,
            known => known.kind().map(|k| k.as_str()).unwrap_or_default(),
        }
    }

    pub fn kind(&self) -> Option<FilterKind> {
        match self {
            SymbolFilter::PriceFilter(_) => Some(FilterKind::PriceFilter),
            SymbolFilter::LotSize(_) => Some(FilterKind::LotSize),
            SymbolFilter::PercentPrice(_) => Some(FilterKind::PercentPrice),
            SymbolFilter::MinNotional(_) => Some(FilterKind::MinNotional),
            SymbolFilter::MarketLotSize(_) => Some(FilterKind::MarketLotSize),
            SymbolFilter::MaxNumOrders(_) => Some(FilterKind::MaxNumOrders),
            SymbolFilter::MaxNumAlgoOrders(_) => Some(FilterKind::MaxNumAlgoOrders),
            SymbolFilter::IcebergParts(_) => Some(FilterKind::IcebergParts),
            SymbolFilter::Other { .. } => None,
        }
    }

    /// Decode a raw `{"filterType": ..., ...}` object.
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        let Value::Object(mut map) = value else {
            return Err(de::Error::custom("filter entry is not a JSON object"));
        };
        let filter_type = match map.get(FILTER_TYPE_KEY) {
            Some(Value::String(tag)) => tag.clone(),
            _ => return Err(de::Error::missing_field(FILTER_TYPE_KEY)),
        };

        let Some(kind) = FilterKind::from_tag(&filter_type) else {
            map.remove(FILTER_TYPE_KEY);
            return Ok(SymbolFilter::Other {
                filter_type,
                payload: map,
            });
        };

        let payload = Value::Object(map);
        let filter = match kind {
            FilterKind::PriceFilter => SymbolFilter::PriceFilter(serde_json::from_value(payload)?),
            FilterKind::LotSize => SymbolFilter::LotSize(serde_json::from_value(payload)?),
            FilterKind::PercentPrice => SymbolFilter::PercentPrice(serde_json::from_value(payload)?),
            FilterKind::MinNotional => SymbolFilter::MinNotional(serde_json::from_value(payload)?),
            FilterKind::MarketLotSize => {
                SymbolFilter::MarketLotSize(serde_json::from_value(payload)?)
            }
            FilterKind::MaxNumOrders => SymbolFilter::MaxNumOrders(serde_json::from_value(payload)?),
            FilterKind::MaxNumAlgoOrders => {
                SymbolFilter::MaxNumAlgoOrders(serde_json::from_value(payload)?)
            }
            FilterKind::IcebergParts => SymbolFilter::IcebergParts(serde_json::from_value(payload)?),
        };
        Ok(filter)
    }

    /// Encode back to the venue's wire shape.
    pub fn to_value(&self) -> Result<Value, serde_json::Error> {
        let mut value = match self {
            SymbolFilter::PriceFilter(f) => serde_json::to_value(f)?,
            SymbolFilter::LotSize(f) | SymbolFilter::MarketLotSize(f) => serde_json::to_value(f)?,
            SymbolFilter::PercentPrice(f) => serde_json::to_value(f)?,
            SymbolFilter::MinNotional(f) => serde_json::to_value(f)?,
            SymbolFilter::MaxNumOrders(f) => serde_json::to_value(f)?,
            SymbolFilter::MaxNumAlgoOrders(f) => serde_json::to_value(f)?,
            SymbolFilter::IcebergParts(f) => serde_json::to_value(f)?,
            SymbolFilter::Other { payload, .. } => Value::Object(payload.clone()),
        };
        if let Value::Object(map) = &mut value {
            map.insert(
                FILTER_TYPE_KEY.to_string(),
                Value::String(self.filter_type().to_string()),
            );
        }
        Ok(value)
    }
}

impl Serialize for SymbolFilter {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let value = self.to_value().map_err(<S::Error as ser::Error>::custom)?;
        value.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for SymbolFilter {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        SymbolFilter::from_value(value).map_err(de::Error::custom)
    }
}

/// Ordered filter list of a symbol with typed lookups.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SymbolFilters(Vec<SymbolFilter>);

impl SymbolFilters {
    pub fn new(filters: Vec<SymbolFilter>) -> Self {
        Self(filters)
    }

    /// First entry of the given kind, if any.
    pub fn filter(&self, kind: FilterKind) -> Option<&SymbolFilter> {
        self.0.iter().find(|f| f.kind() == Some(kind))
    }

    pub fn price_filter(&self) -> Option<&PriceFilter> {
        self.0.iter().find_map(|f| match f {
            SymbolFilter::PriceFilter(p) => Some(p),
            _ => None,
        })
    }

    pub fn lot_size(&self) -> Option<&LotSizeFilter> {
        self.0.iter().find_map(|f| match f {
            SymbolFilter::LotSize(l) => Some(l),
            _ => None,
        })
    }

    pub fn market_lot_size(&self) -> Option<&LotSizeFilter> {
        self.0.iter().find_map(|f| match f {
            SymbolFilter::MarketLotSize(l) => Some(l),
            _ => None,
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = &SymbolFilter> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<SymbolFilter>> for SymbolFilters {
    fn from(filters: Vec<SymbolFilter>) -> Self {
        Self(filters)
    }
}

// =================================================================
// Symbol Rules
// =================================================================

/// Trading rules of one symbol as reported by the venue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolRules {
    pub symbol: String,
    pub status: String,
    pub base_asset: String,
    pub base_asset_precision: u32,
    pub quote_asset: String,
    pub quote_precision: u32,
    pub quote_asset_precision: u32,
    pub base_commission_precision: u32,
    pub quote_commission_precision: u32,
    #[serde(default)]
    pub order_types: BTreeSet<String>,
    pub iceberg_allowed: bool,
    pub oco_allowed: bool,
    pub quote_order_qty_market_allowed: bool,
    pub is_spot_trading_allowed: bool,
    pub is_margin_trading_allowed: bool,
    #[serde(default)]
    pub filters: SymbolFilters,
    #[serde(default)]
    pub permissions: BTreeSet<String>,
}

impl SymbolRules {
    pub fn is_trading(&self) -> bool {
        self.status == STATUS_TRADING
    }

    /// Reject descriptors that must not reach the store.
    pub fn validate(&self) -> DataResult<()> {
        if self.symbol.is_empty() {
            return Err(DataError::Validation("Symbol cannot be empty".into()));
        }

        if !self.symbol.chars().all(char::is_alphanumeric) {
            return Err(DataError::Validation(format!(
                "Symbol '{}' contains invalid characters",
                self.symbol
            )));
        }

        if self.status.is_empty() {
            return Err(DataError::Validation(format!(
                "Symbol '{}' has no status",
                self.symbol
            )));
        }

        if self.base_asset.is_empty() || self.quote_asset.is_empty() {
            return Err(DataError::Validation(format!(
                "Symbol '{}' is missing its base or quote asset",
                self.symbol
            )));
        }

        Ok(())
    }
}

/// A `SymbolRules` row as persisted, with store-side metadata.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredSymbolRules {
    pub id: i64,
    #[serde(flatten)]
    pub rules: SymbolRules,
    pub exchange_name: String,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

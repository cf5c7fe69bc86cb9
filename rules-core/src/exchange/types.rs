// src/exchange/types.rs

use rules_common::data::types::STATUS_TRADING;
use rules_common::SymbolRules;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeSet;

use super::errors::ExchangeError;

/// Which trading symbols a fetch should keep.
///
/// A symbol is kept when its quote asset is listed OR its name is listed.
/// With both lists empty every trading symbol is kept.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SymbolSelection {
    pub quote_assets: BTreeSet<String>,
    pub symbols: BTreeSet<String>,
}

impl SymbolSelection {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn new<Q, S>(quote_assets: Q, symbols: S) -> Self
    where
        Q: IntoIterator,
        Q::Item: Into<String>,
        S: IntoIterator,
        S::Item: Into<String>,
    {
        Self {
            quote_assets: quote_assets.into_iter().map(Into::into).collect(),
            symbols: symbols.into_iter().map(Into::into).collect(),
        }
    }

    pub fn by_quote_assets<Q>(quote_assets: Q) -> Self
    where
        Q: IntoIterator,
        Q::Item: Into<String>,
    {
        Self::new(quote_assets, Vec::<String>::new())
    }

    pub fn by_symbols<S>(symbols: S) -> Self
    where
        S: IntoIterator,
        S::Item: Into<String>,
    {
        Self::new(Vec::<String>::new(), symbols)
    }

    pub fn is_unrestricted(&self) -> bool {
        self.quote_assets.is_empty() && self.symbols.is_empty()
    }

    pub fn matches(&self, symbol: &str, quote_asset: &str) -> bool {
        self.is_unrestricted()
            || self.quote_assets.contains(quote_asset)
            || self.symbols.contains(symbol)
    }
}

/// Fields needed to decide eligibility before a descriptor is fully decoded.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SymbolHeader {
    symbol: String,
    status: String,
    quote_asset: String,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    code: i64,
    msg: String,
}

/// `GET /api/v3/exchangeInfo` response. Symbol descriptors stay raw until
/// selected so one odd entry elsewhere in the feed cannot fail a fetch.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeInfo {
    #[serde(default)]
    pub timezone: Option<String>,
    #[serde(default)]
    pub server_time: Option<i64>,
    pub symbols: Vec<Value>,
}

impl ExchangeInfo {
    /// Decode a raw response body, surfacing venue error envelopes.
    pub fn from_value(value: Value) -> Result<Self, ExchangeError> {
        if value.get("symbols").is_none() {
            if let Ok(err) = serde_json::from_value::<ApiErrorBody>(value.clone()) {
                return Err(ExchangeError::ApiError {
                    code: err.code,
                    msg: err.msg,
                });
            }
        }
        Ok(serde_json::from_value(value)?)
    }

    /// Decode the `TRADING` symbols matching `selection`, in feed order.
    pub fn eligible_symbols(
        &self,
        selection: &SymbolSelection,
    ) -> Result<Vec<SymbolRules>, ExchangeError> {
        let mut eligible = Vec::new();

        for raw in &self.symbols {
            let header: SymbolHeader = match serde_json::from_value(raw.clone()) {
                Ok(header) => header,
                Err(e) => {
                    // A symbol asked for by name must not vanish silently.
                    if let Some(symbol) = raw.get("symbol").and_then(Value::as_str) {
                        if selection.symbols.contains(symbol) {
                            return Err(ExchangeError::MalformedSymbol {
                                symbol: symbol.to_string(),
                                reason: e.to_string(),
                            });
                        }
                    }
                    tracing::warn!("Skipping symbol entry without identity fields: {}", e);
                    continue;
                }
            };

            if header.status != STATUS_TRADING
                || !selection.matches(&header.symbol, &header.quote_asset)
            {
                continue;
            }

            let rules: SymbolRules =
                serde_json::from_value(raw.clone()).map_err(|e| ExchangeError::MalformedSymbol {
                    symbol: header.symbol.clone(),
                    reason: e.to_string(),
                })?;
            rules
                .validate()
                .map_err(|e| ExchangeError::MalformedSymbol {
                    symbol: header.symbol.clone(),
                    reason: e.to_string(),
                })?;

            eligible.push(rules);
        }

        Ok(eligible)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn descriptor(symbol: &str, quote: &str, status: &str) -> Value {
        json!({
            "symbol": symbol,
            "status": status,
            "baseAsset": symbol.trim_end_matches(quote),
            "baseAssetPrecision": 8,
            "quoteAsset": quote,
            "quotePrecision": 8,
            "quoteAssetPrecision": 8,
            "baseCommissionPrecision": 8,
            "quoteCommissionPrecision": 8,
            "orderTypes": ["LIMIT", "MARKET"],
            "icebergAllowed": true,
            "ocoAllowed": true,
            "quoteOrderQtyMarketAllowed": true,
            "isSpotTradingAllowed": true,
            "isMarginTradingAllowed": false,
            "filters": [
                {"filterType": "PRICE_FILTER", "minPrice": "0.01", "maxPrice": "1000000.00", "tickSize": "0.01"},
                {"filterType": "LOT_SIZE", "minQty": "0.0001", "maxQty": "9000.00", "stepSize": "0.0001"}
            ],
            "permissions": ["SPOT"]
        })
    }

    fn info(symbols: Vec<Value>) -> ExchangeInfo {
        ExchangeInfo::from_value(json!({"timezone": "UTC", "serverTime": 1, "symbols": symbols}))
            .unwrap()
    }

    #[test]
    fn test_selection_matching() {
        let all = SymbolSelection::all();
        assert!(all.matches("ETHBTC", "BTC"));

        let by_quote = SymbolSelection::by_quote_assets(["USDT"]);
        assert!(by_quote.matches("BTCUSDT", "USDT"));
        assert!(!by_quote.matches("ETHBTC", "BTC"));

        let either = SymbolSelection::new(["USDT"], ["ETHBTC"]);
        assert!(either.matches("ETHBTC", "BTC"));
        assert!(either.matches("BNBUSDT", "USDT"));
        assert!(!either.matches("ADABTC", "BTC"));
    }

    #[test]
    fn test_only_trading_symbols_are_eligible() {
        let info = info(vec![
            descriptor("ETHBTC", "BTC", "TRADING"),
            descriptor("LUNABTC", "BTC", "BREAK"),
            descriptor("BNBUSDT", "USDT", "TRADING"),
        ]);

        let eligible = info.eligible_symbols(&SymbolSelection::all()).unwrap();
        let names: Vec<&str> = eligible.iter().map(|s| s.symbol.as_str()).collect();
        assert_eq!(names, vec!["ETHBTC", "BNBUSDT"]);
    }

    #[test]
    fn test_malformed_unselected_entry_is_ignored() {
        let mut broken = descriptor("XRPBTC", "BTC", "TRADING");
        broken["filters"] = json!([{"filterType": "PRICE_FILTER"}]);
        let info = info(vec![broken, descriptor("BNBUSDT", "USDT", "TRADING")]);

        let eligible = info
            .eligible_symbols(&SymbolSelection::by_quote_assets(["USDT"]))
            .unwrap();
        assert_eq!(eligible.len(), 1);

        let err = info.eligible_symbols(&SymbolSelection::all()).unwrap_err();
        assert!(matches!(err, ExchangeError::MalformedSymbol { ref symbol, .. } if symbol == "XRPBTC"));
    }

    #[test]
    fn test_requested_symbol_without_identity_fields_fails() {
        let mut headless = descriptor("ETHBTC", "BTC", "TRADING");
        headless.as_object_mut().unwrap().remove("quoteAsset");
        headless.as_object_mut().unwrap().remove("status");
        let info = info(vec![headless, descriptor("BNBUSDT", "USDT", "TRADING")]);

        let err = info
            .eligible_symbols(&SymbolSelection::by_symbols(["ETHBTC"]))
            .unwrap_err();
        assert!(matches!(err, ExchangeError::MalformedSymbol { ref symbol, .. } if symbol == "ETHBTC"));

        // Not asked for by name: skipped.
        let eligible = info
            .eligible_symbols(&SymbolSelection::by_quote_assets(["USDT"]))
            .unwrap();
        assert_eq!(eligible.len(), 1);
        assert_eq!(eligible[0].symbol, "BNBUSDT");
    }

    #[test]
    fn test_api_error_envelope() {
        let err = ExchangeInfo::from_value(json!({"code": -1003, "msg": "Too many requests"}))
            .unwrap_err();
        assert!(matches!(err, ExchangeError::ApiError { code: -1003, .. }));

        let err = ExchangeInfo::from_value(json!({"unexpected": true})).unwrap_err();
        assert!(matches!(err, ExchangeError::ParseError(_)));
    }
}

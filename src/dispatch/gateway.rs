//! Direct-execution destination: a Bybit-style conditional limit order with a
//! full-position TP/SL bracket, posted to an execution gateway endpoint.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use super::Destination;
use crate::config::TradeConfig;
use crate::error::PayloadError;
use crate::extract::{Side, Signal};

pub struct OrderGateway {
    name: String,
    url: String,
    api_key: String,
    category: String,
    leverage: f64,
    risk_per_trade: f64,
    quote: String,
    trigger_buffer_pct: f64,
    stop_loss_pct: f64,
    expiration_min: u64,
    expiration_price_pct: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BracketOrderPayload {
    category: String,
    symbol: String,
    side: &'static str,
    order_type: &'static str,
    qty: String,
    price: String,
    time_in_force: &'static str,
    trigger_price: String,
    /// 2 = price falls to trigger (long entry), 1 = price rises (short entry).
    trigger_direction: u8,
    trigger_by: &'static str,
    take_profit: String,
    stop_loss: String,
    tpsl_mode: &'static str,
    tp_order_type: &'static str,
    sl_order_type: &'static str,
    /// 0 = one-way position mode.
    position_idx: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    expire_minutes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    expire_price: Option<String>,
}

impl OrderGateway {
    pub fn new(
        name: String,
        url: String,
        api_key: String,
        category: String,
        leverage: f64,
        risk_per_trade: f64,
        trade: &TradeConfig,
    ) -> Self {
        Self {
            name,
            url,
            api_key,
            category,
            leverage,
            risk_per_trade,
            quote: trade.quote.clone(),
            trigger_buffer_pct: trade.entry_trigger_buffer_pct,
            stop_loss_pct: trade.stop_loss_pct,
            expiration_min: trade.expiration_min,
            expiration_price_pct: trade.expiration_price_pct,
        }
    }

    /// Coin quantity from the risk budget: notional = risk × leverage.
    fn qty_from_risk(&self, entry: f64) -> f64 {
        (self.risk_per_trade * self.leverage / entry).max(0.0)
    }

    /// Stop price on the loss side of the entry.
    fn stop_price(&self, side: Side, entry: f64) -> f64 {
        let pct = self.stop_loss_pct / 100.0;
        match side {
            Side::Long => entry * (1.0 - pct),
            Side::Short => entry * (1.0 + pct),
        }
    }

    fn trigger_price(&self, side: Side, entry: f64) -> f64 {
        let buffer = self.trigger_buffer_pct / 100.0;
        match side {
            Side::Long => entry * (1.0 - buffer),
            Side::Short => entry * (1.0 + buffer),
        }
    }

    /// Expiration threshold in the profit direction, when configured.
    fn expire_price(&self, side: Side, entry: f64) -> Option<f64> {
        if self.expiration_price_pct <= 0.0 {
            return None;
        }
        let pct = self.expiration_price_pct / 100.0;
        Some(match side {
            Side::Long => entry * (1.0 + pct),
            Side::Short => entry * (1.0 - pct),
        })
    }
}

impl Destination for OrderGateway {
    fn name(&self) -> &str {
        &self.name
    }

    fn endpoint(&self) -> &str {
        &self.url
    }

    fn headers(&self) -> Vec<(&'static str, String)> {
        vec![("X-API-KEY", self.api_key.clone())]
    }

    fn build_payload(&self, signal: &Signal, _now: DateTime<Utc>) -> Result<Value, PayloadError> {
        // The bracket needs a take-profit anchor; alerts without TP1 are not
        // tradable on this destination.
        let tp1 = signal.tp1.ok_or(PayloadError::MissingTakeProfit)?;

        let qty = self.qty_from_risk(signal.entry);
        if qty <= 0.0 {
            return Err(PayloadError::NonPositiveQuantity);
        }

        let (side, trigger_direction) = match signal.side {
            Side::Long => ("Buy", 2),
            Side::Short => ("Sell", 1),
        };

        let payload = BracketOrderPayload {
            category: self.category.clone(),
            symbol: format!("{}{}", signal.base, self.quote),
            side,
            order_type: "Limit",
            qty: format!("{qty:.6}"),
            price: format!("{:.6}", signal.entry),
            time_in_force: "GTC",
            trigger_price: format!("{:.6}", self.trigger_price(signal.side, signal.entry)),
            trigger_direction,
            trigger_by: "LastPrice",
            take_profit: format!("{tp1:.6}"),
            stop_loss: format!("{:.6}", self.stop_price(signal.side, signal.entry)),
            tpsl_mode: "Full",
            tp_order_type: "Market",
            sl_order_type: "Market",
            position_idx: 0,
            expire_minutes: (self.expiration_min > 0).then_some(self.expiration_min),
            expire_price: self
                .expire_price(signal.side, signal.entry)
                .map(|p| format!("{p:.6}")),
        };
        Ok(serde_json::to_value(payload)?)
    }
}

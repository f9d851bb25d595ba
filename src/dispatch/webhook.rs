//! Relay destination: a 3Commas-style custom-signal webhook. Carries only the
//! trigger, never sizing; the receiving bot owns order construction.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::Value;

use super::Destination;
use crate::config::TradeConfig;
use crate::error::PayloadError;
use crate::extract::{Side, Signal};

pub struct TriggerWebhook {
    name: String,
    url: String,
    secret: String,
    bot_uuid: String,
    max_lag: u64,
    exchange: String,
    instrument_suffix: String,
    quote: String,
    trigger_buffer_pct: f64,
}

#[derive(Debug, Serialize)]
struct TriggerSignalPayload {
    secret: String,
    max_lag: String,
    timestamp: String,
    trigger_price: String,
    tv_exchange: String,
    tv_instrument: String,
    action: &'static str,
    bot_uuid: String,
}

impl TriggerWebhook {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        name: String,
        url: String,
        secret: String,
        bot_uuid: String,
        max_lag: u64,
        exchange: String,
        instrument_suffix: String,
        trade: &TradeConfig,
    ) -> Self {
        Self {
            name,
            url,
            secret,
            bot_uuid,
            max_lag,
            exchange,
            instrument_suffix,
            quote: trade.quote.clone(),
            trigger_buffer_pct: trade.entry_trigger_buffer_pct,
        }
    }

    /// Entry offset by the buffer toward the fill side: below entry for
    /// longs, above entry for shorts.
    fn trigger_price(&self, signal: &Signal) -> f64 {
        let buffer = self.trigger_buffer_pct / 100.0;
        match signal.side {
            Side::Long => signal.entry * (1.0 - buffer),
            Side::Short => signal.entry * (1.0 + buffer),
        }
    }
}

impl Destination for TriggerWebhook {
    fn name(&self) -> &str {
        &self.name
    }

    fn endpoint(&self) -> &str {
        &self.url
    }

    fn build_payload(&self, signal: &Signal, now: DateTime<Utc>) -> Result<Value, PayloadError> {
        let action = match signal.side {
            Side::Long => "enter_long",
            Side::Short => "enter_short",
        };
        let payload = TriggerSignalPayload {
            secret: self.secret.clone(),
            max_lag: self.max_lag.to_string(),
            timestamp: now.to_rfc3339_opts(SecondsFormat::Secs, false),
            trigger_price: format!("{:.8}", self.trigger_price(signal)),
            tv_exchange: self.exchange.clone(),
            tv_instrument: format!("{}{}{}", signal.base, self.quote, self.instrument_suffix),
            action,
            bot_uuid: self.bot_uuid.clone(),
        };
        Ok(serde_json::to_value(payload)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn trade() -> TradeConfig {
        TradeConfig {
            quote: "USDT".into(),
            entry_trigger_buffer_pct: 1.0,
            stop_loss_pct: 19.0,
            expiration_min: 180,
            expiration_price_pct: 0.0,
        }
    }

    fn hook() -> TriggerWebhook {
        TriggerWebhook::new(
            "commas".into(),
            "https://hooks.example.test/signal".into(),
            "s3cret".into(),
            "uuid-1".into(),
            300,
            "BINANCE".into(),
            ".P".into(),
            &trade(),
        )
    }

    fn signal(side: Side) -> Signal {
        Signal {
            base: "BTC".into(),
            side,
            entry: 50_000.0,
            tp1: Some(52_000.0),
            tp2: None,
            tp3: None,
            dca1: None,
            dca2: None,
            dca3: None,
        }
    }

    #[test]
    fn long_signal_maps_to_enter_long_with_buffered_trigger() {
        let now = Utc.with_ymd_and_hms(2025, 9, 6, 9, 0, 0).unwrap();
        let v = hook().build_payload(&signal(Side::Long), now).unwrap();
        assert_eq!(v["action"], "enter_long");
        assert_eq!(v["tv_instrument"], "BTCUSDT.P");
        assert_eq!(v["tv_exchange"], "BINANCE");
        // 1% below entry for a long
        assert_eq!(v["trigger_price"], "49500.00000000");
        assert_eq!(v["timestamp"], "2025-09-06T09:00:00+00:00");
        assert_eq!(v["max_lag"], "300");
    }

    #[test]
    fn short_signal_triggers_above_entry() {
        let now = Utc::now();
        let v = hook().build_payload(&signal(Side::Short), now).unwrap();
        assert_eq!(v["action"], "enter_short");
        assert_eq!(v["trigger_price"], "50500.00000000");
    }
}

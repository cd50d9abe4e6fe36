// src/providers/interval.rs
//! Candle interval vocabularies. Callers speak the common form ("1h", "1d");
//! each exchange gets its own spelling.

/// Static lookup from common interval forms to one provider's vocabulary.
#[derive(Debug, Clone, Copy)]
pub struct IntervalTable {
    entries: &'static [(&'static str, &'static str)],
    default: &'static str,
}

pub const BYBIT_INTERVALS: IntervalTable = IntervalTable {
    entries: &[
        ("1m", "1"),
        ("3m", "3"),
        ("5m", "5"),
        ("15m", "15"),
        ("30m", "30"),
        ("1h", "60"),
        ("2h", "120"),
        ("4h", "240"),
        ("6h", "360"),
        ("12h", "720"),
        ("1d", "D"),
        ("1D", "D"),
        ("1day", "D"),
        ("1w", "W"),
        ("1M", "M"),
    ],
    default: "60",
};

pub const BINANCE_INTERVALS: IntervalTable = IntervalTable {
    entries: &[
        ("1m", "1m"),
        ("3m", "3m"),
        ("5m", "5m"),
        ("15m", "15m"),
        ("30m", "30m"),
        ("1h", "1h"),
        ("2h", "2h"),
        ("4h", "4h"),
        ("6h", "6h"),
        ("8h", "8h"),
        ("12h", "12h"),
        ("1d", "1d"),
        ("1day", "1d"),
        ("3d", "3d"),
        ("1w", "1w"),
        ("1week", "1w"),
        ("1M", "1M"),
    ],
    default: "1h",
};

impl IntervalTable {
    /// Exact key first, then lowercase key (keeps "1M" month apart from
    /// "1m" minute), then purely numeric passthrough, else the default.
    pub fn normalize(&self, interval: Option<&str>) -> String {
        let key = match interval.map(str::trim) {
            Some(k) if !k.is_empty() => k,
            _ => return self.default.to_string(),
        };
        if let Some(v) = self.lookup(key) {
            return v.to_string();
        }
        if let Some(v) = self.lookup(&key.to_lowercase()) {
            return v.to_string();
        }
        if key.chars().all(|c| c.is_ascii_digit()) {
            return key.to_string();
        }
        self.default.to_string()
    }

    fn lookup(&self, key: &str) -> Option<&'static str> {
        self.entries
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| *v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bybit_translates_common_forms() {
        assert_eq!(BYBIT_INTERVALS.normalize(Some("1h")), "60");
        assert_eq!(BYBIT_INTERVALS.normalize(Some("4H")), "240");
        assert_eq!(BYBIT_INTERVALS.normalize(Some("1DAY")), "D");
        assert_eq!(BYBIT_INTERVALS.normalize(Some(" 15m ")), "15");
        assert_eq!(BYBIT_INTERVALS.normalize(Some("1M")), "M");
        assert_eq!(BYBIT_INTERVALS.normalize(Some("1m")), "1");
    }

    #[test]
    fn numeric_input_passes_through() {
        assert_eq!(BYBIT_INTERVALS.normalize(Some("240")), "240");
        assert_eq!(BINANCE_INTERVALS.normalize(Some("60")), "60");
    }

    #[test]
    fn absent_or_unknown_falls_back_to_default() {
        assert_eq!(BYBIT_INTERVALS.normalize(None), "60");
        assert_eq!(BYBIT_INTERVALS.normalize(Some("")), "60");
        assert_eq!(BYBIT_INTERVALS.normalize(Some("fortnight")), "60");
        assert_eq!(BINANCE_INTERVALS.normalize(Some("fortnight")), "1h");
    }

    #[test]
    fn binance_keeps_month_and_minute_apart() {
        assert_eq!(BINANCE_INTERVALS.normalize(Some("1M")), "1M");
        assert_eq!(BINANCE_INTERVALS.normalize(Some("1m")), "1m");
        assert_eq!(BINANCE_INTERVALS.normalize(Some("1D")), "1d");
    }
}

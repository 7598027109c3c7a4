//! Connector configuration.

use tracing::warn;

/// Default display sequences of the special lines; higher sorts later.
pub const DEFAULT_SPECIAL_LINE_SEQUENCE: u32 = 980;
pub const DEFAULT_GIFT_SEQUENCE: u32 = 990;
pub const DEFAULT_COD_SEQUENCE: u32 = 995;
pub const DEFAULT_SHIPPING_SEQUENCE: u32 = 999;

/// Tunables of the cancellation resolver and the line builders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectorConfig {
    /// Longest parent chain walked before the data is considered corrupt.
    pub max_parent_depth: usize,
    pub shipping_sequence: u32,
    pub cash_on_delivery_sequence: u32,
    pub gift_sequence: u32,
}

impl Default for ConnectorConfig {
    fn default() -> Self {
        Self {
            max_parent_depth: 64,
            shipping_sequence: DEFAULT_SHIPPING_SEQUENCE,
            cash_on_delivery_sequence: DEFAULT_COD_SEQUENCE,
            gift_sequence: DEFAULT_GIFT_SEQUENCE,
        }
    }
}

impl ConnectorConfig {
    /// Defaults overridden by `CONNECTOR_*` environment variables.
    ///
    /// Unparseable values are logged and ignored.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(depth) = parse_var(&lookup, "CONNECTOR_MAX_PARENT_DEPTH") {
            config.max_parent_depth = depth;
        }
        if let Some(seq) = parse_var(&lookup, "CONNECTOR_SHIPPING_SEQUENCE") {
            config.shipping_sequence = seq;
        }
        if let Some(seq) = parse_var(&lookup, "CONNECTOR_COD_SEQUENCE") {
            config.cash_on_delivery_sequence = seq;
        }
        if let Some(seq) = parse_var(&lookup, "CONNECTOR_GIFT_SEQUENCE") {
            config.gift_sequence = seq;
        }
        config
    }

    pub fn with_max_parent_depth(mut self, depth: usize) -> Self {
        self.max_parent_depth = depth;
        self
    }

    pub fn with_shipping_sequence(mut self, sequence: u32) -> Self {
        self.shipping_sequence = sequence;
        self
    }

    pub fn with_cash_on_delivery_sequence(mut self, sequence: u32) -> Self {
        self.cash_on_delivery_sequence = sequence;
        self
    }

    pub fn with_gift_sequence(mut self, sequence: u32) -> Self {
        self.gift_sequence = sequence;
        self
    }
}

fn parse_var<T: core::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(key, value = %raw, "ignoring unparseable configuration value");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_order_special_lines() {
        let config = ConnectorConfig::default();
        assert!(DEFAULT_SPECIAL_LINE_SEQUENCE < config.gift_sequence);
        assert!(config.gift_sequence < config.cash_on_delivery_sequence);
        assert!(config.cash_on_delivery_sequence < config.shipping_sequence);
    }

    #[test]
    fn environment_overrides_defaults() {
        let config = ConnectorConfig::from_lookup(lookup_from(&[
            ("CONNECTOR_MAX_PARENT_DEPTH", "8"),
            ("CONNECTOR_SHIPPING_SEQUENCE", " 500 "),
        ]));
        assert_eq!(config.max_parent_depth, 8);
        assert_eq!(config.shipping_sequence, 500);
        assert_eq!(config.gift_sequence, DEFAULT_GIFT_SEQUENCE);
    }

    #[test]
    fn unparseable_values_keep_defaults() {
        let config = ConnectorConfig::from_lookup(lookup_from(&[(
            "CONNECTOR_COD_SEQUENCE",
            "soon",
        )]));
        assert_eq!(config, ConnectorConfig::default());
    }
}

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::mock::MockLogisticsProvider;
use crate::provider::LogisticsProvider;

/// Carrier implementations selectable from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogisticsProviderKind {
    #[default]
    Mock,
}

pub fn build_provider(kind: LogisticsProviderKind) -> Arc<dyn LogisticsProvider> {
    match kind {
        LogisticsProviderKind::Mock => Arc::new(MockLogisticsProvider::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_kind_builds_the_mock() {
        let provider = build_provider(LogisticsProviderKind::default());
        assert_eq!(provider.name(), "mock");
    }

    #[test]
    fn kind_parses_from_config_string() {
        let kind: LogisticsProviderKind = serde_json::from_str("\"mock\"").unwrap();
        assert_eq!(kind, LogisticsProviderKind::Mock);
        assert!(serde_json::from_str::<LogisticsProviderKind>("\"olva\"").is_err());
    }
}

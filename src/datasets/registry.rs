use once_cell::sync::Lazy;
use std::collections::HashMap;

use crate::config::DatasetLabel;
use crate::fetcher::title_case;

pub const UNKNOWN_UNIT: &str = "Unknown";

macro_rules! label {
    ($id:expr, $title:expr, $unit:expr) => {
        (
            $id.to_string(),
            DatasetLabel { title: $title.to_string(), unit: $unit.to_string() },
        )
    };
}

// ============================================================================
// BUILT-IN DASHBOARD LABELS
// ============================================================================

static DEFAULT_LABELS: Lazy<HashMap<String, DatasetLabel>> = Lazy::new(|| {
    HashMap::from([
        label!("gdp", "US GDP", "Trillion USD"),
        label!("inflation", "Inflation (US)", "Index"),
        label!("unemployment", "Unemployment Rate (US)", "%"),
        label!("interest_rate_fed", "Policy Rate (Fed)", "%"),
        label!("interest_rate_ecb", "Policy Rate (ECB)", "%"),
        label!("baltic_dry", "Baltic Dry Index", "Index"),
        label!("world_trade", "World Trade Volume", "Index 2010=100"),
    ])
});

/// Resolves display title and unit for a dataset id.
///
/// Config overrides win over the built-in table; unknown ids get a
/// title-cased id and "Unknown" unit.
#[derive(Debug, Clone, Default)]
pub struct LabelRegistry {
    overrides: HashMap<String, DatasetLabel>,
}

impl LabelRegistry {
    pub fn new(overrides: HashMap<String, DatasetLabel>) -> Self {
        Self { overrides }
    }

    fn lookup(&self, dataset_id: &str) -> Option<&DatasetLabel> {
        self.overrides.get(dataset_id).or_else(|| DEFAULT_LABELS.get(dataset_id))
    }

    pub fn title(&self, dataset_id: &str) -> String {
        self.lookup(dataset_id)
            .map(|l| l.title.clone())
            .unwrap_or_else(|| title_case(dataset_id))
    }

    pub fn unit(&self, dataset_id: &str) -> String {
        self.lookup(dataset_id)
            .map(|l| l.unit.clone())
            .unwrap_or_else(|| UNKNOWN_UNIT.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_labels() {
        let labels = LabelRegistry::default();
        assert_eq!(labels.title("gdp"), "US GDP");
        assert_eq!(labels.unit("gdp"), "Trillion USD");
        assert_eq!(labels.unit("unemployment"), "%");
    }

    #[test]
    fn test_unknown_dataset_fallback() {
        let labels = LabelRegistry::default();
        assert_eq!(labels.title("housing_starts"), "Housing_Starts");
        assert_eq!(labels.unit("housing_starts"), "Unknown");
    }

    #[test]
    fn test_overrides_win() {
        let labels = LabelRegistry::new(HashMap::from([label!("gdp", "BIP der USA", "Billionen USD")]));
        assert_eq!(labels.title("gdp"), "BIP der USA");
        assert_eq!(labels.unit("gdp"), "Billionen USD");
        assert_eq!(labels.title("inflation"), "Inflation (US)");
    }
}

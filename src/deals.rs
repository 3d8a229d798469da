//! Deal lookup.
//!
//! The analysis pipeline only needs `get_deal(id)`; where the records live
//! is up to the [`DealSource`] implementation. [`JsonDealStore`] reads a
//! JSON array exported from the deal-management system.

use crate::error::AnalysisError;
use crate::models::DealInput;
use async_trait::async_trait;
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, warn};

/// Read access to deal records.
#[async_trait]
pub trait DealSource: Send + Sync {
    /// Fetch one deal by id.
    async fn get_deal(&self, id: i64) -> Result<DealInput, AnalysisError>;
}

/// Deals held in memory, typically loaded from a JSON file.
#[derive(Debug, Clone, Default)]
pub struct JsonDealStore {
    deals: Vec<DealInput>,
}

impl JsonDealStore {
    /// Build a store from records; on duplicate ids the first record wins.
    pub fn from_deals(deals: Vec<DealInput>) -> Self {
        let mut seen = HashSet::new();
        let mut unique = Vec::with_capacity(deals.len());

        for deal in deals {
            if seen.insert(deal.id) {
                unique.push(deal);
            } else {
                warn!("Duplicate deal id {} ({}), keeping the first record", deal.id, deal.name);
            }
        }

        Self { deals: unique }
    }

    /// Load a JSON array of deal records.
    pub fn load(path: &Path) -> Result<Self, AnalysisError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            AnalysisError::DealSource(format!("failed to read {}: {}", path.display(), e))
        })?;

        let deals: Vec<DealInput> = serde_json::from_str(&content).map_err(|e| {
            AnalysisError::DealSource(format!("failed to parse {}: {}", path.display(), e))
        })?;

        debug!("Loaded {} deals from {}", deals.len(), path.display());

        Ok(Self::from_deals(deals))
    }

    /// All records, in file order.
    pub fn deals(&self) -> &[DealInput] {
        &self.deals
    }

    pub fn find(&self, id: i64) -> Option<&DealInput> {
        self.deals.iter().find(|d| d.id == id)
    }
}

#[async_trait]
impl DealSource for JsonDealStore {
    async fn get_deal(&self, id: i64) -> Result<DealInput, AnalysisError> {
        self.find(id)
            .cloned()
            .ok_or(AnalysisError::DealNotFound { id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const DEALS_JSON: &str = r#"[
        {"id": 90003, "name": "Ponce Protocol", "industry": "Hospitality", "price": 850000, "cashFlow": 85000},
        {"id": 12, "name": "Corner Laundromat", "stage": "lead"},
        {"id": 12, "name": "Duplicate Laundromat"}
    ]"#;

    fn write_deals(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_deals() {
        let file = write_deals(DEALS_JSON);
        let store = JsonDealStore::load(file.path()).unwrap();

        assert_eq!(store.deals().len(), 2);
        assert_eq!(store.find(12).map(|d| d.name.as_str()), Some("Corner Laundromat"));
        assert_eq!(store.find(90003).and_then(|d| d.cash_flow), Some(85000.0));
    }

    #[test]
    fn test_load_invalid_file() {
        let file = write_deals("{not json");
        let err = JsonDealStore::load(file.path()).unwrap_err();
        assert!(matches!(err, AnalysisError::DealSource(_)));
        assert!(err.to_string().starts_with("deal source error: failed to parse"));

        let missing = JsonDealStore::load(Path::new("/nonexistent/deals.json")).unwrap_err();
        assert!(matches!(missing, AnalysisError::DealSource(_)));
    }

    #[tokio::test]
    async fn test_get_deal() {
        let store = JsonDealStore::from_deals(vec![DealInput::new(1, "Car Wash")]);

        let deal = store.get_deal(1).await.unwrap();
        assert_eq!(deal.name, "Car Wash");

        let err = store.get_deal(2).await.unwrap_err();
        assert!(matches!(err, AnalysisError::DealNotFound { id: 2 }));
    }
}

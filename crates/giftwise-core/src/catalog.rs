use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use anyhow::{Context, anyhow};
use tracing::{debug, info};

use crate::gift::Gift;

const BUILTIN_CATALOG_JSON: &str = include_str!("../data/catalog.json");

/// Read-only gift catalog. Never mutated once loaded.
#[derive(Debug, Clone)]
pub struct Catalog {
    gifts: Vec<Gift>,
}

impl Catalog {
    #[tracing::instrument]
    pub fn builtin() -> anyhow::Result<Self> {
        Self::from_json(BUILTIN_CATALOG_JSON).context("failed to parse built-in catalog")
    }

    #[tracing::instrument(skip(path), fields(path = %path.display()))]
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed reading catalog {}", path.display()))?;
        let catalog = Self::from_json(&raw)
            .with_context(|| format!("failed parsing catalog {}", path.display()))?;
        info!(count = catalog.len(), "loaded catalog from file");
        Ok(catalog)
    }

    pub fn from_json(raw: &str) -> anyhow::Result<Self> {
        let gifts: Vec<Gift> = serde_json::from_str(raw)?;
        Self::new(gifts)
    }

    pub fn new(mut gifts: Vec<Gift>) -> anyhow::Result<Self> {
        let mut seen = BTreeSet::new();
        for gift in &mut gifts {
            if !seen.insert(gift.id) {
                return Err(anyhow!("duplicate gift id in catalog: {}", gift.id));
            }
            gift.recommended = false;
        }
        debug!(count = gifts.len(), "catalog ready");
        Ok(Self { gifts })
    }

    pub fn gifts(&self) -> &[Gift] {
        &self.gifts
    }

    pub fn len(&self) -> usize {
        self.gifts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.gifts.is_empty()
    }

    pub fn find(&self, id: u64) -> Option<&Gift> {
        self.gifts.iter().find(|gift| gift.id == id)
    }

    /// Unique categories in first-occurrence order.
    pub fn categories(&self) -> Vec<String> {
        unique_in_order(self.gifts.iter().map(|gift| gift.category.as_str()))
    }

    /// Unique personality tags in first-occurrence order.
    pub fn personality_tags(&self) -> Vec<String> {
        unique_in_order(
            self.gifts
                .iter()
                .flat_map(|gift| gift.match_tags.iter().map(String::as_str)),
        )
    }
}

fn unique_in_order<'a>(values: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen = BTreeSet::new();
    values
        .filter(|value| seen.insert(*value))
        .map(ToString::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::Catalog;
    use crate::gift::sample_gift;

    #[test]
    fn builtin_catalog_parses_with_unique_ids() {
        let catalog = Catalog::builtin().expect("builtin catalog");
        assert!(!catalog.is_empty());
        assert!(catalog.gifts().iter().all(|gift| !gift.recommended));
        assert!(catalog.find(1).is_some());
        assert!(catalog.find(9_999).is_none());
    }

    #[test]
    fn rejects_duplicate_ids() {
        let gifts = vec![
            sample_gift(1, "Tech", 10.0, &[]),
            sample_gift(1, "Books", 20.0, &[]),
        ];
        assert!(Catalog::new(gifts).is_err());
    }

    #[test]
    fn facets_keep_first_occurrence_order() {
        let catalog = Catalog::new(vec![
            sample_gift(1, "Tech", 10.0, &["techSavvy", "introvert"]),
            sample_gift(2, "Books", 20.0, &["bookworm", "introvert"]),
            sample_gift(3, "Tech", 30.0, &["techSavvy"]),
        ])
        .expect("catalog");

        assert_eq!(catalog.categories(), vec!["Tech", "Books"]);
        assert_eq!(
            catalog.personality_tags(),
            vec!["techSavvy", "introvert", "bookworm"]
        );
    }
}

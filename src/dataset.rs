//! Immutable dataset and the categorical domains discovered in it.

use crate::record::SalesRecord;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Distinct values of every categorical dimension, computed once at load time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DomainCatalog {
    pub categories: BTreeSet<String>,
    pub sub_categories: BTreeSet<String>,
    pub segments: BTreeSet<String>,
    pub states: BTreeSet<String>,
    pub cities: BTreeSet<String>,
    pub min_date: Option<NaiveDate>,
    pub max_date: Option<NaiveDate>,
}

impl DomainCatalog {
    pub fn from_records(records: &[SalesRecord]) -> Self {
        let mut catalog = DomainCatalog::default();
        for record in records {
            catalog.categories.insert(record.product_category.clone());
            catalog.sub_categories.insert(record.product_sub_category.clone());
            catalog.segments.insert(record.customer_segment.clone());
            catalog.states.insert(record.state.clone());
            catalog.cities.insert(record.city.clone());
            catalog.min_date = Some(catalog.min_date.map_or(record.date, |d| d.min(record.date)));
            catalog.max_date = Some(catalog.max_date.map_or(record.date, |d| d.max(record.date)));
        }
        catalog
    }
}

/// Read-only collection of sales records.
///
/// Cloning is cheap; every clone shares the same rows.
#[derive(Debug, Clone)]
pub struct Dataset {
    records: Arc<[SalesRecord]>,
    catalog: Arc<DomainCatalog>,
}

impl Dataset {
    pub fn new(records: Vec<SalesRecord>) -> Self {
        let catalog = DomainCatalog::from_records(&records);
        Self {
            records: records.into(),
            catalog: Arc::new(catalog),
        }
    }

    pub fn records(&self) -> &[SalesRecord] {
        &self.records
    }

    pub fn catalog(&self) -> &DomainCatalog {
        &self.catalog
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl From<Vec<SalesRecord>> for Dataset {
    fn from(records: Vec<SalesRecord>) -> Self {
        Dataset::new(records)
    }
}

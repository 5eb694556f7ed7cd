use crate::config::FieldConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Hit and miss accounting for one configured field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldExtractionStats {
    pub field_name: String,
    pub success_count: u64,
    pub total_attempts: u64,
    pub is_optional: bool,
    /// Global item indices for which the field produced no value
    pub missing_items: Vec<usize>,
}

impl FieldExtractionStats {
    pub fn new(field_name: &str, is_optional: bool) -> Self {
        Self {
            field_name: field_name.to_string(),
            success_count: 0,
            total_attempts: 0,
            is_optional,
            missing_items: Vec::new(),
        }
    }

    /// Records one examined item
    pub fn record(&mut self, item_index: usize, success: bool) {
        self.total_attempts += 1;
        if success {
            self.success_count += 1;
        } else {
            self.missing_items.push(item_index);
        }
    }

    /// Share of attempts that produced a value, in percent
    pub fn success_rate(&self) -> f64 {
        if self.total_attempts == 0 {
            0.0
        } else {
            (self.success_count as f64 / self.total_attempts as f64) * 100.0
        }
    }
}

/// Stats for every field of one field map, keyed by field name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldStatsTable {
    fields: BTreeMap<String, FieldExtractionStats>,
}

impl FieldStatsTable {
    /// Creates an empty entry for every configured field
    pub fn for_fields(fields: &BTreeMap<String, FieldConfig>) -> Self {
        let fields = fields
            .iter()
            .map(|(name, config)| (name.clone(), FieldExtractionStats::new(name, config.optional)))
            .collect();
        Self { fields }
    }

    /// Records one attempt; unknown names get a required entry on first use
    pub fn record(&mut self, field_name: &str, item_index: usize, success: bool) {
        self.fields
            .entry(field_name.to_string())
            .or_insert_with(|| FieldExtractionStats::new(field_name, false))
            .record(item_index, success);
    }

    pub fn get(&self, field_name: &str) -> Option<&FieldExtractionStats> {
        self.fields.get(field_name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldExtractionStats> {
        self.fields.values()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl std::ops::Index<&str> for FieldStatsTable {
    type Output = FieldExtractionStats;

    fn index(&self, field_name: &str) -> &Self::Output {
        &self.fields[field_name]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_counts() {
        let mut stats = FieldExtractionStats::new("author", true);
        stats.record(0, true);
        stats.record(1, false);
        stats.record(2, true);

        assert_eq!(stats.total_attempts, 3);
        assert_eq!(stats.success_count, 2);
        assert_eq!(stats.missing_items, vec![1]);
        assert!(stats.success_count <= stats.total_attempts);
        assert!((stats.success_rate() - 66.666).abs() < 0.01);
    }

    #[test]
    fn test_table_initialized_from_config() {
        let mut fields = BTreeMap::new();
        fields.insert("title".to_string(), FieldConfig::text("h2"));
        fields.insert("author".to_string(), FieldConfig::text(".by").optional());

        let mut table = FieldStatsTable::for_fields(&fields);
        assert_eq!(table["author"].total_attempts, 0);
        assert!(table["author"].is_optional);
        assert!(!table["title"].is_optional);

        table.record("title", 4, false);
        assert_eq!(table["title"].missing_items, vec![4]);
    }

    #[test]
    fn test_table_serializes_as_map() {
        let mut table = FieldStatsTable::default();
        table.record("title", 0, true);
        let json = serde_json::to_value(&table).unwrap();
        assert_eq!(json["title"]["success_count"], 1);
    }
}

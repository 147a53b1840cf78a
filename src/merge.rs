// src/merge.rs
use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::models::StatisticsRecord;

/// One statistics record per report date, ordered by date.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergedSeries {
    by_date: BTreeMap<NaiveDate, StatisticsRecord>,
}

impl MergedSeries {
    /// Folds candidates from every source into the series. Candidates are
    /// applied in timestamp order and each one replaces whatever was stored
    /// for its date, so the latest snapshot of a day wins as a whole record.
    pub fn merge<I>(candidates: I) -> Self
    where
        I: IntoIterator<Item = StatisticsRecord>,
    {
        let mut candidates: Vec<StatisticsRecord> = candidates.into_iter().collect();
        // Stable: equal timestamps keep their batch order
        candidates.sort_by_key(|stats| stats.timestamp);

        let mut by_date = BTreeMap::new();
        for stats in candidates {
            if let Some(previous) = by_date.insert(stats.date(), stats) {
                tracing::debug!("Superseded {}", previous);
            }
        }
        Self { by_date }
    }

    pub fn len(&self) -> usize {
        self.by_date.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_date.is_empty()
    }

    #[cfg(test)]
    pub fn get(&self, date: NaiveDate) -> Option<&StatisticsRecord> {
        self.by_date.get(&date)
    }

    /// Records in ascending date order.
    pub fn iter(&self) -> impl Iterator<Item = (NaiveDate, &StatisticsRecord)> {
        self.by_date.iter().map(|(date, stats)| (*date, stats))
    }
}

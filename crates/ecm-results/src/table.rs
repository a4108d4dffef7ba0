//! Lookup table assembly with upsert-by-key semantics.

use crate::types::{LookupTableRow, RowKey};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    Inserted,
    Replaced,
}

/// Rows in arrival order, unique per [`RowKey`].
///
/// A row for an existing key replaces the old one in place. Sorted views
/// are produced by the `*_snapshot` methods.
#[derive(Debug, Clone, Default)]
pub struct ResultTable {
    rows: Vec<LookupTableRow>,
    index: HashMap<RowKey, usize>,
}

impl ResultTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_rows(rows: impl IntoIterator<Item = LookupTableRow>) -> Self {
        let mut table = Self::new();
        table.extend(rows);
        table
    }

    pub fn upsert(&mut self, row: LookupTableRow) -> Upsert {
        match self.index.get(&row.key()) {
            Some(&i) => {
                self.rows[i] = row;
                Upsert::Replaced
            }
            None => {
                self.index.insert(row.key(), self.rows.len());
                self.rows.push(row);
                Upsert::Inserted
            }
        }
    }

    pub fn extend(&mut self, rows: impl IntoIterator<Item = LookupTableRow>) {
        for row in rows {
            self.upsert(row);
        }
    }

    pub fn get(&self, key: &RowKey) -> Option<&LookupTableRow> {
        self.index.get(key).map(|&i| &self.rows[i])
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows in arrival order.
    pub fn iter(&self) -> impl Iterator<Item = &LookupTableRow> {
        self.rows.iter()
    }

    /// Every row, sorted by `(battery_label, cycle, pulse_number)`.
    pub fn snapshot(&self) -> Vec<LookupTableRow> {
        let mut rows = self.rows.clone();
        rows.sort_by(|a, b| a.key().cmp(&b.key()));
        rows
    }

    /// Rows of one label across cycles, sorted by `(cycle, pulse_number)`.
    pub fn label_snapshot(&self, label: &str) -> Vec<LookupTableRow> {
        let mut rows: Vec<LookupTableRow> = self
            .rows
            .iter()
            .filter(|r| r.battery_label == label)
            .cloned()
            .collect();
        rows.sort_by_key(|r| (r.cycle, r.pulse_number));
        rows
    }

    /// Rows of one cycle, sorted by `pulse_number`.
    pub fn cycle_snapshot(&self, label: &str, cycle: usize) -> Vec<LookupTableRow> {
        let mut rows: Vec<LookupTableRow> = self
            .rows
            .iter()
            .filter(|r| r.battery_label == label && r.cycle == cycle)
            .cloned()
            .collect();
        rows.sort_by_key(|r| r.pulse_number);
        rows
    }

    pub fn labels(&self) -> Vec<String> {
        let mut labels: Vec<String> = self.rows.iter().map(|r| r.battery_label.clone()).collect();
        labels.sort();
        labels.dedup();
        labels
    }

    pub fn cycles(&self, label: &str) -> Vec<usize> {
        let mut cycles: Vec<usize> = self
            .rows
            .iter()
            .filter(|r| r.battery_label == label)
            .map(|r| r.cycle)
            .collect();
        cycles.sort_unstable();
        cycles.dedup();
        cycles
    }
}

#[cfg(test)]
pub(crate) fn row(label: &str, cycle: usize, pulse: usize, r0: Option<f64>) -> LookupTableRow {
    LookupTableRow {
        battery_label: label.to_string(),
        cycle,
        pulse_number: pulse,
        current: 4.85,
        voltage: 3.6 + 0.01 * pulse as f64,
        temperature: 298.15,
        soc: 1.0 - 0.1 * pulse as f64,
        r0,
        r1: r0.map(|r| r * 0.5),
        c1: r0.map(|_| 600.0),
        r2: None,
        c2: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rerun_replaces_instead_of_appending() {
        let mut table = ResultTable::new();
        assert_eq!(table.upsert(row("G1", 0, 0, Some(0.01))), Upsert::Inserted);
        assert_eq!(table.upsert(row("G1", 0, 1, Some(0.02))), Upsert::Inserted);
        assert_eq!(table.upsert(row("G1", 0, 0, Some(0.03))), Upsert::Replaced);
        assert_eq!(table.len(), 2);
        let key = row("G1", 0, 0, None).key();
        assert_eq!(table.get(&key).and_then(|r| r.r0), Some(0.03));
    }

    #[test]
    fn snapshots_are_sorted() {
        let table = ResultTable::from_rows([
            row("G1", 2, 1, None),
            row("G1", 0, 3, None),
            row("W3", 0, 0, None),
            row("G1", 2, 0, None),
            row("G1", 0, 1, None),
        ]);
        let keys: Vec<(usize, usize)> = table
            .label_snapshot("G1")
            .iter()
            .map(|r| (r.cycle, r.pulse_number))
            .collect();
        assert_eq!(keys, vec![(0, 1), (0, 3), (2, 0), (2, 1)]);

        let pulses: Vec<usize> = table
            .cycle_snapshot("G1", 2)
            .iter()
            .map(|r| r.pulse_number)
            .collect();
        assert_eq!(pulses, vec![0, 1]);

        assert_eq!(table.snapshot().last().map(|r| r.battery_label.as_str()), Some("W3"));
        assert_eq!(table.labels(), vec!["G1".to_string(), "W3".to_string()]);
        assert_eq!(table.cycles("G1"), vec![0, 2]);
    }

    #[test]
    fn arrival_order_is_kept_until_snapshot() {
        let table = ResultTable::from_rows([row("G1", 1, 0, None), row("G1", 0, 0, None)]);
        let cycles: Vec<usize> = table.iter().map(|r| r.cycle).collect();
        assert_eq!(cycles, vec![1, 0]);
    }
}

//! Archive table schema, rows, and header migration.
//!
//! The per-day column set has grown twice:
//!
//! 1. slot counts only
//! 2. `nonVoterCount` appended
//! 3. `wasTentative` inserted before `nonVoterCount`
//!
//! Tables written under an older header are re-laid-out by column name.
//! Cells that did not exist when a row was written stay empty ("not
//! tracked"), which is a different fact from a count of zero.

use chrono::NaiveDate;
use std::collections::HashMap;

use poll_calendar::{BlockDates, Day, PeriodKind};

use crate::ledger::{DayTally, Ledger};
use crate::types::Slot;

/// Cell value for data that was not recorded when the row was written.
pub const NOT_TRACKED: &str = "";

/// Key column; one row per ISO week.
pub const WEEK_COLUMN: &str = "week";

/// Archive header generations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SchemaVersion {
    SlotCounts,
    NonVoterCounts,
    WasTentative,
}

impl SchemaVersion {
    pub const CURRENT: SchemaVersion = SchemaVersion::WasTentative;
    pub const ALL: [SchemaVersion; 3] = [
        SchemaVersion::SlotCounts,
        SchemaVersion::NonVoterCounts,
        SchemaVersion::WasTentative,
    ];

    fn day_suffixes(&self) -> Vec<&'static str> {
        let mut suffixes: Vec<&'static str> = Slot::ALL.iter().map(Slot::column_suffix).collect();
        match self {
            SchemaVersion::SlotCounts => {}
            SchemaVersion::NonVoterCounts => suffixes.push("nonVoterCount"),
            SchemaVersion::WasTentative => {
                suffixes.push("wasTentative");
                suffixes.push("nonVoterCount");
            }
        }
        suffixes
    }

    /// Full header for a block under this version.
    pub fn header(&self, kind: PeriodKind) -> Vec<String> {
        let mut header = vec![WEEK_COLUMN.to_string()];
        header.extend(kind.days().iter().map(|day| format!("date_{day}")));
        for day in kind.days() {
            header.extend(self.day_suffixes().iter().map(|suffix| format!("{day}_{suffix}")));
        }
        header
    }

    /// Which version wrote `header`, if it matches one exactly.
    pub fn detect(kind: PeriodKind, header: &[String]) -> Option<SchemaVersion> {
        SchemaVersion::ALL
            .into_iter()
            .find(|version| version.header(kind) == header)
    }
}

/// One archived week.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveRow {
    pub week: String,
    pub dates: Vec<(Day, NaiveDate)>,
    pub tallies: Vec<(Day, DayTally)>,
}

impl ArchiveRow {
    /// Aggregate a ledger over a resolved block.
    pub fn from_ledger(block: &BlockDates, ledger: &Ledger) -> Self {
        Self {
            week: block.iso_week(),
            dates: block.days().to_vec(),
            tallies: block.days().iter().map(|(day, _)| (*day, ledger.tally(*day))).collect(),
        }
    }

    /// Cells in current-schema order.
    pub fn cells(&self) -> Vec<String> {
        let mut cells = vec![self.week.clone()];
        cells.extend(self.dates.iter().map(|(_, date)| date.format("%Y-%m-%d").to_string()));
        for (_, tally) in &self.tallies {
            cells.extend(Slot::ALL.iter().map(|slot| tally.count(*slot).to_string()));
            cells.push(tally.was_tentative.to_string());
            cells.push(tally.non_voters.to_string());
        }
        cells
    }
}

/// Whether an upsert added a row or replaced one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    Inserted,
    Updated,
}

/// Header plus rows, as exchanged with a row store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(header: Vec<String>) -> Self {
        Self {
            header,
            rows: Vec::new(),
        }
    }

    /// Re-lay the table out under `target`.
    ///
    /// Columns of the old header that `target` lacks are kept after the
    /// target columns. Cells of columns the old header lacked are filled
    /// with [`NOT_TRACKED`]. Returns whether anything changed.
    pub fn migrate(&mut self, target: &[String]) -> bool {
        let legacy: Vec<String> = self
            .header
            .iter()
            .filter(|column| !target.contains(column))
            .cloned()
            .collect();
        let mut header = target.to_vec();
        header.extend(legacy);
        if header == self.header {
            return false;
        }

        let mut positions: HashMap<&str, usize> = HashMap::new();
        for (i, column) in self.header.iter().enumerate() {
            positions.entry(column.as_str()).or_insert(i);
        }
        let old_width = self.header.len();

        let rows = self
            .rows
            .iter()
            .map(|row| {
                let mut out: Vec<String> = header
                    .iter()
                    .map(|column| match positions.get(column.as_str()) {
                        Some(&i) => row.get(i).cloned().unwrap_or_default(),
                        None => NOT_TRACKED.to_string(),
                    })
                    .collect();
                if row.len() > old_width {
                    out.extend(row[old_width..].iter().cloned());
                }
                out
            })
            .collect();

        self.header = header;
        self.rows = rows;
        true
    }

    /// Row whose week column equals `week`.
    pub fn row_for_week(&self, week: &str) -> Option<&[String]> {
        let index = self.column_index(WEEK_COLUMN)?;
        self.rows
            .iter()
            .find(|row| row.get(index).map(String::as_str) == Some(week))
            .map(Vec::as_slice)
    }

    /// Cell of `row` under `column`.
    pub fn cell<'a>(&'a self, row: &'a [String], column: &str) -> Option<&'a str> {
        let index = self.column_index(column)?;
        row.get(index).map(String::as_str)
    }

    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.header.iter().position(|c| c == column)
    }

    /// Insert `cells`, or overwrite the leading cells of the row with the
    /// same week. `cells` must follow the leading columns of the header.
    pub fn upsert(&mut self, cells: Vec<String>) -> Upsert {
        let width = self.header.len().max(cells.len());
        let week = cells.first().cloned().unwrap_or_default();
        let index = self.column_index(WEEK_COLUMN).unwrap_or(0);

        if let Some(row) = self
            .rows
            .iter_mut()
            .find(|row| row.get(index) == Some(&week))
        {
            if row.len() < width {
                row.resize(width, NOT_TRACKED.to_string());
            }
            for (i, cell) in cells.into_iter().enumerate() {
                row[i] = cell;
            }
            return Upsert::Updated;
        }

        let mut row = cells;
        row.resize(width, NOT_TRACKED.to_string());
        self.rows.push(row);
        Upsert::Inserted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_current_weekend_header() {
        let header = SchemaVersion::CURRENT.header(PeriodKind::Weekend);
        assert_eq!(header.len(), 1 + 3 + 3 * 6);
        assert_eq!(
            &header[..10],
            &strings(&[
                "week",
                "date_friday",
                "date_saturday",
                "date_sunday",
                "friday_19",
                "friday_2030",
                "friday_tentative",
                "friday_notParticipating",
                "friday_wasTentative",
                "friday_nonVoterCount",
            ])[..]
        );
        assert_eq!(header.last().map(String::as_str), Some("sunday_nonVoterCount"));

        let weekday = SchemaVersion::CURRENT.header(PeriodKind::Weekday);
        assert_eq!(weekday.len(), 1 + 4 + 4 * 6);
    }

    #[test]
    fn test_detect_version() {
        let v2 = SchemaVersion::NonVoterCounts.header(PeriodKind::Weekday);
        assert_eq!(
            SchemaVersion::detect(PeriodKind::Weekday, &v2),
            Some(SchemaVersion::NonVoterCounts)
        );
        assert_eq!(SchemaVersion::detect(PeriodKind::Weekend, &v2), None);
    }

    #[test]
    fn test_migrate_backfills_not_tracked() {
        let old = SchemaVersion::SlotCounts.header(PeriodKind::Weekend);
        let mut row = strings(&["2025-W50", "2025-12-12", "2025-12-13", "2025-12-14"]);
        row.extend(strings(&["3", "4", "1", "0", "2", "2", "0", "0", "0", "5", "1", "1"]));
        let mut table = Table {
            header: old,
            rows: vec![row],
        };

        let target = SchemaVersion::CURRENT.header(PeriodKind::Weekend);
        assert!(table.migrate(&target));
        assert_eq!(table.header, target);

        let migrated = table.row_for_week("2025-W50").unwrap().to_vec();
        assert_eq!(table.cell(&migrated, "friday_19"), Some("3"));
        assert_eq!(table.cell(&migrated, "friday_notParticipating"), Some("0"));
        assert_eq!(table.cell(&migrated, "friday_wasTentative"), Some(NOT_TRACKED));
        assert_eq!(table.cell(&migrated, "sunday_nonVoterCount"), Some(NOT_TRACKED));
        assert_eq!(table.cell(&migrated, "sunday_2030"), Some("5"));

        assert!(!table.migrate(&target));
    }

    #[test]
    fn test_migrate_keeps_unknown_columns_and_short_rows() {
        let mut table = Table {
            header: strings(&["week", "date_friday", "friday_19", "notes"]),
            rows: vec![
                strings(&["2025-W01", "2025-01-03", "4", "rainy"]),
                strings(&["2025-W02", "2025-01-10"]),
                strings(&["2025-W03", "2025-01-17", "1", "ok", "stray"]),
            ],
        };
        let target = SchemaVersion::CURRENT.header(PeriodKind::Weekend);
        table.migrate(&target);

        assert_eq!(table.header.last().map(String::as_str), Some("notes"));
        let first = table.row_for_week("2025-W01").unwrap().to_vec();
        assert_eq!(table.cell(&first, "notes"), Some("rainy"));
        assert_eq!(table.cell(&first, "friday_19"), Some("4"));
        assert_eq!(table.cell(&first, "date_saturday"), Some(NOT_TRACKED));

        let short = table.row_for_week("2025-W02").unwrap().to_vec();
        assert_eq!(table.cell(&short, "friday_19"), Some(""));
        assert_eq!(short.len(), table.header.len());

        let long = table.row_for_week("2025-W03").unwrap().to_vec();
        assert_eq!(long.last().map(String::as_str), Some("stray"));
    }

    #[test]
    fn test_upsert_updates_same_week() {
        let header = SchemaVersion::CURRENT.header(PeriodKind::Weekend);
        let mut table = Table::new(header.clone());
        let mut cells = vec!["2026-W02".to_string()];
        cells.extend(std::iter::repeat("0".to_string()).take(header.len() - 1));

        assert_eq!(table.upsert(cells.clone()), Upsert::Inserted);
        cells[4] = "7".to_string();
        assert_eq!(table.upsert(cells), Upsert::Updated);
        assert_eq!(table.rows.len(), 1);
        assert_eq!(table.rows[0][4], "7");
    }
}

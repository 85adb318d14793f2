//! Delimited text form of archive tables.

use serde::{Deserialize, Serialize};

use super::schema::Table;

/// Field delimiter of row-store documents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Delimiter {
    #[default]
    Comma,
    Semicolon,
}

impl Delimiter {
    pub fn as_char(&self) -> char {
        match self {
            Delimiter::Comma => ',',
            Delimiter::Semicolon => ';',
        }
    }

    /// Render a table: header line, then one line per row.
    pub fn encode(&self, table: &Table) -> String {
        let sep = self.as_char().to_string();
        let mut out = String::new();
        if table.header.is_empty() && table.rows.is_empty() {
            return out;
        }
        out.push_str(&table.header.join(&sep));
        out.push('\n');
        for row in &table.rows {
            out.push_str(&row.join(&sep));
            out.push('\n');
        }
        out
    }

    /// Parse a document produced by [`Delimiter::encode`].
    ///
    /// Blank lines are skipped. An empty document is an empty table.
    pub fn decode(&self, text: &str) -> Table {
        let sep = self.as_char();
        let mut lines = text
            .lines()
            .map(|line| line.trim_end_matches('\r'))
            .filter(|line| !line.trim().is_empty());

        let Some(header) = lines.next() else {
            return Table::default();
        };
        Table {
            header: header.split(sep).map(str::to_string).collect(),
            rows: lines
                .map(|line| line.split(sep).map(str::to_string).collect())
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> Table {
        Table {
            header: vec!["week".into(), "friday_19".into(), "friday_nonVoterCount".into()],
            rows: vec![
                vec!["2026-W01".into(), "4".into(), "".into()],
                vec!["2026-W02".into(), "0".into(), "3".into()],
            ],
        }
    }

    #[test]
    fn test_semicolon_document() {
        let text = Delimiter::Semicolon.encode(&table());
        assert_eq!(
            text,
            "week;friday_19;friday_nonVoterCount\n2026-W01;4;\n2026-W02;0;3\n"
        );
        assert_eq!(Delimiter::Semicolon.decode(&text), table());
    }

    #[test]
    fn test_empty_cells_survive() {
        let text = Delimiter::Comma.encode(&table());
        let back = Delimiter::Comma.decode(&text);
        assert_eq!(back.rows[0][2], "");
        assert_ne!(back.rows[0][2], "0");
    }

    #[test]
    fn test_empty_document() {
        assert_eq!(Delimiter::Comma.decode(""), Table::default());
        assert_eq!(Delimiter::Comma.decode("\n\n"), Table::default());
        assert_eq!(Delimiter::Comma.encode(&Table::default()), "");
    }

    #[test]
    fn test_crlf_lines() {
        let back = Delimiter::Comma.decode("week,friday_19\r\n2026-W01,2\r\n");
        assert_eq!(back.rows, vec![vec!["2026-W01".to_string(), "2".to_string()]]);
    }
}

//! Tabular lookup table format.
//!
//! Columns are `battery_label,cycle,pulse_number,current,voltage,
//! temperature,SoC,r0,r1,c1` with `r2,c2` appended for 2-RC tables. A
//! failed fit leaves its parameter fields empty.

use crate::types::LookupTableRow;
use crate::{ResultsError, ResultsResult};
use ecm_fit::RcPairs;
use ecm_project::RESERVED_LABEL_CHARS;

const BASE_COLUMNS: [&str; 10] = [
    "battery_label",
    "cycle",
    "pulse_number",
    "current",
    "voltage",
    "temperature",
    "SoC",
    "r0",
    "r1",
    "c1",
];
const SECOND_PAIR: [&str; 2] = ["r2", "c2"];

pub fn csv_header(rc_pairs: RcPairs) -> String {
    let mut columns: Vec<&str> = BASE_COLUMNS.to_vec();
    if rc_pairs == RcPairs::Two {
        columns.extend(SECOND_PAIR);
    }
    columns.join(",")
}

pub(crate) fn check_label(label: &str) -> ResultsResult<()> {
    if label.is_empty() || label.contains(RESERVED_LABEL_CHARS) {
        return Err(ResultsError::InvalidLabel {
            label: label.escape_debug().to_string(),
            reason: "labels must be non-empty without commas, quotes or line breaks".to_string(),
        });
    }
    Ok(())
}

fn opt(v: Option<f64>) -> String {
    v.map(|v| v.to_string()).unwrap_or_default()
}

pub fn to_csv_string(rows: &[LookupTableRow], rc_pairs: RcPairs) -> ResultsResult<String> {
    let mut csv = csv_header(rc_pairs);
    csv.push('\n');
    for row in rows {
        check_label(&row.battery_label)?;
        let mut fields = vec![
            row.battery_label.clone(),
            row.cycle.to_string(),
            row.pulse_number.to_string(),
            row.current.to_string(),
            row.voltage.to_string(),
            row.temperature.to_string(),
            row.soc.to_string(),
            opt(row.r0),
            opt(row.r1),
            opt(row.c1),
        ];
        if rc_pairs == RcPairs::Two {
            fields.push(opt(row.r2));
            fields.push(opt(row.c2));
        }
        csv.push_str(&fields.join(","));
        csv.push('\n');
    }
    Ok(csv)
}

fn header_order(header: &str) -> ResultsResult<RcPairs> {
    let columns: Vec<&str> = header.split(',').map(str::trim).collect();
    if columns == BASE_COLUMNS {
        Ok(RcPairs::One)
    } else if columns.len() == BASE_COLUMNS.len() + SECOND_PAIR.len()
        && columns[..BASE_COLUMNS.len()] == BASE_COLUMNS
        && columns[BASE_COLUMNS.len()..] == SECOND_PAIR
    {
        Ok(RcPairs::Two)
    } else {
        Err(ResultsError::Csv {
            line: 1,
            what: format!("unexpected header '{header}'"),
        })
    }
}

/// Model order a lookup table was written for, read from its header.
pub fn table_order(content: &str) -> ResultsResult<RcPairs> {
    match content.lines().find(|l| !l.trim().is_empty()) {
        Some(header) => header_order(header),
        None => Err(ResultsError::Csv {
            line: 1,
            what: "empty file".to_string(),
        }),
    }
}

/// Parse a lookup table. The second RC pair is read when its columns exist.
pub fn parse_csv_str(content: &str) -> ResultsResult<Vec<LookupTableRow>> {
    let mut lines = content
        .lines()
        .enumerate()
        .filter(|(_, l)| !l.trim().is_empty());

    let Some((_, header)) = lines.next() else {
        return Err(ResultsError::Csv {
            line: 1,
            what: "empty file".to_string(),
        });
    };
    let two_pairs = header_order(header)? == RcPairs::Two;
    let columns: Vec<&str> = header.split(',').map(str::trim).collect();

    let mut rows = Vec::new();
    for (idx, line) in lines {
        let line_no = idx + 1;
        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        if fields.len() != columns.len() {
            return Err(ResultsError::Csv {
                line: line_no,
                what: format!("expected {} fields, got {}", columns.len(), fields.len()),
            });
        }
        let err = |col: usize, e: &dyn std::fmt::Display| ResultsError::Csv {
            line: line_no,
            what: format!("{} '{}': {e}", columns[col], fields[col]),
        };
        let int = |col: usize| fields[col].parse::<usize>().map_err(|e| err(col, &e));
        let num = |col: usize| fields[col].parse::<f64>().map_err(|e| err(col, &e));
        let maybe = |col: usize| -> ResultsResult<Option<f64>> {
            if fields[col].is_empty() {
                Ok(None)
            } else {
                num(col).map(Some)
            }
        };

        let label = fields[0].to_string();
        check_label(&label)?;
        rows.push(LookupTableRow {
            battery_label: label,
            cycle: int(1)?,
            pulse_number: int(2)?,
            current: num(3)?,
            voltage: num(4)?,
            temperature: num(5)?,
            soc: num(6)?,
            r0: maybe(7)?,
            r1: maybe(8)?,
            c1: maybe(9)?,
            r2: if two_pairs { maybe(10)? } else { None },
            c2: if two_pairs { maybe(11)? } else { None },
        });
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::row;

    #[test]
    fn header_follows_model_order() {
        assert_eq!(
            csv_header(RcPairs::One),
            "battery_label,cycle,pulse_number,current,voltage,temperature,SoC,r0,r1,c1"
        );
        assert!(csv_header(RcPairs::Two).ends_with(",c1,r2,c2"));
    }

    #[test]
    fn failed_rows_keep_empty_parameter_fields() {
        let rows = vec![row("G1", 0, 0, Some(0.012)), row("G1", 0, 1, None)];
        let text = to_csv_string(&rows, RcPairs::One).unwrap();
        let last = text.lines().last().unwrap();
        assert!(last.ends_with(",,,"), "{last}");

        let back = parse_csv_str(&text).unwrap();
        assert_eq!(back, rows);
        assert!(!back[1].is_fitted());
    }

    #[test]
    fn two_pair_table_round_trips() {
        let mut fitted = row("W3", 4, 2, Some(0.0123456789));
        fitted.r2 = Some(0.004);
        fitted.c2 = Some(1999.5);
        fitted.soc = 0.1 + 0.2;
        let rows = vec![fitted, row("W3", 4, 3, None)];
        let back = parse_csv_str(&to_csv_string(&rows, RcPairs::Two).unwrap()).unwrap();
        assert_eq!(back.len(), 2);
        for (a, b) in rows.iter().zip(&back) {
            assert_eq!(a.key(), b.key());
            assert!((a.soc - b.soc).abs() < 1e-9);
            assert_eq!(a.r2, b.r2);
            assert_eq!(a.c2, b.c2);
        }
    }

    #[test]
    fn header_tells_the_model_order() {
        let one = to_csv_string(&[row("G1", 0, 0, None)], RcPairs::One).unwrap();
        let two = to_csv_string(&[], RcPairs::Two).unwrap();
        assert_eq!(table_order(&one).unwrap(), RcPairs::One);
        assert_eq!(table_order(&two).unwrap(), RcPairs::Two);
        assert!(table_order("").is_err());
        assert!(table_order("battery_label,cycle\n").is_err());
    }

    #[test]
    fn reserved_characters_in_labels_are_rejected() {
        let rows = vec![row("G,1", 0, 0, None)];
        assert!(matches!(
            to_csv_string(&rows, RcPairs::One),
            Err(ResultsError::InvalidLabel { .. })
        ));
    }

    #[test]
    fn malformed_input_reports_the_line() {
        let text = format!("{}\nG1,0,zero,1,2,3,4,,,\n", csv_header(RcPairs::One));
        match parse_csv_str(&text) {
            Err(ResultsError::Csv { line, what }) => {
                assert_eq!(line, 2);
                assert!(what.contains("pulse_number"));
            }
            other => panic!("unexpected: {other:?}"),
        }
        assert!(parse_csv_str("a,b,c\n").is_err());
        assert!(parse_csv_str("").is_err());
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn finite() -> impl Strategy<Value = f64> {
        -1.0e6_f64..1.0e6
    }

    proptest! {
        #[test]
        fn csv_round_trip_is_field_exact(
            items in prop::collection::vec(
                (0_usize..50, 0_usize..20, finite(), finite(), finite(), 0.0_f64..1.0,
                 prop::option::of((finite(), finite(), finite(), finite(), finite()))),
                0..20,
            )
        ) {
            let rows: Vec<LookupTableRow> = items
                .into_iter()
                .map(|(cycle, pulse, current, voltage, temperature, soc, params)| LookupTableRow {
                    battery_label: "G1".to_string(),
                    cycle,
                    pulse_number: pulse,
                    current,
                    voltage,
                    temperature,
                    soc,
                    r0: params.map(|p| p.0),
                    r1: params.map(|p| p.1),
                    c1: params.map(|p| p.2),
                    r2: params.map(|p| p.3),
                    c2: params.map(|p| p.4),
                })
                .collect();
            let back = parse_csv_str(&to_csv_string(&rows, RcPairs::Two).unwrap()).unwrap();
            prop_assert_eq!(back.len(), rows.len());
            for (a, b) in rows.iter().zip(&back) {
                prop_assert_eq!(a.key(), b.key());
                prop_assert!((a.current - b.current).abs() <= 1e-9);
                prop_assert!((a.soc - b.soc).abs() <= 1e-9);
                prop_assert_eq!(a.r0.is_some(), b.r0.is_some());
                if let (Some(x), Some(y)) = (a.c2, b.c2) {
                    prop_assert!((x - y).abs() <= 1e-9);
                }
            }
        }
    }
}

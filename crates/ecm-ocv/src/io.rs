//! `SOC,OCV` CSV persistence of a sampled curve.

use crate::curve::OcvCurve;
use crate::error::{OcvError, OcvResult};
use std::fs;
use std::path::Path;

pub const CSV_HEADER: &str = "SOC,OCV";

/// Conventional file name for a label's fitted curve.
pub fn curve_file_name(label: &str) -> String {
    format!("battery_{label}_soc_ocv_fitted.csv")
}

pub fn to_csv_string(curve: &OcvCurve) -> String {
    let mut csv = String::from(CSV_HEADER);
    csv.push('\n');
    for (soc, ocv) in curve.soc().iter().zip(curve.ocv()) {
        csv.push_str(&format!("{soc},{ocv}\n"));
    }
    csv
}

pub fn parse_csv_str(content: &str) -> OcvResult<OcvCurve> {
    let mut lines = content
        .lines()
        .enumerate()
        .filter(|(_, l)| !l.trim().is_empty());

    let Some((_, header)) = lines.next() else {
        return Err(OcvError::Parse {
            line: 1,
            what: "empty file".to_string(),
        });
    };
    let columns: Vec<&str> = header.split(',').map(str::trim).collect();
    let soc_col = columns.iter().position(|c| c.eq_ignore_ascii_case("SOC"));
    let ocv_col = columns.iter().position(|c| c.eq_ignore_ascii_case("OCV"));
    let (Some(soc_col), Some(ocv_col)) = (soc_col, ocv_col) else {
        return Err(OcvError::Parse {
            line: 1,
            what: format!("expected header '{CSV_HEADER}', got '{header}'"),
        });
    };

    let mut soc = Vec::new();
    let mut ocv = Vec::new();
    for (idx, line) in lines {
        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        let parse = |col: usize| -> OcvResult<f64> {
            let raw = fields.get(col).ok_or_else(|| OcvError::Parse {
                line: idx + 1,
                what: format!("missing column {col}"),
            })?;
            raw.parse::<f64>().map_err(|e| OcvError::Parse {
                line: idx + 1,
                what: format!("'{raw}': {e}"),
            })
        };
        soc.push(parse(soc_col)?);
        ocv.push(parse(ocv_col)?);
    }

    OcvCurve::from_table(soc, ocv)
}

pub fn save_csv(path: &Path, curve: &OcvCurve) -> OcvResult<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, to_csv_string(curve))?;
    Ok(())
}

pub fn load_csv(path: &Path) -> OcvResult<OcvCurve> {
    let content = fs::read_to_string(path)?;
    parse_csv_str(&content)
}

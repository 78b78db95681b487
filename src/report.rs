//! Results aggregation and output: the fixed-width results table, Grace
//! plot files, and JSON export.
//!
//! A blank cell means "parameter not applicable to the selected model",
//! never zero.  Tie and no-fit outcomes blank every parameter column and
//! keep only the model label.

use std::fs;
use std::path::Path;

use serde::Serialize;

use crate::catalog::ModelSpec;
use crate::error::Result;
use crate::modsel::SelectedModelRecord;

/// One flattened results row.  `None` renders as a blank cell.
#[derive(Debug, Clone, Serialize)]
pub struct ResultRow {
    pub res_num: String,
    pub res_name: String,
    pub model: String,
    pub s2: Option<f64>,
    pub s2_err: Option<f64>,
    pub s2f: Option<f64>,
    pub s2f_err: Option<f64>,
    pub s2s: Option<f64>,
    pub s2s_err: Option<f64>,
    /// te for models 2 and 4, ts for model 5, in picoseconds.
    pub te: Option<f64>,
    pub te_err: Option<f64>,
    pub rex: Option<f64>,
    pub rex_err: Option<f64>,
    pub chi2: Option<f64>,
}

impl ResultRow {
    /// Flatten a selection record, distributing the winning model's
    /// parameter vector into named columns.
    pub fn from_record(record: &SelectedModelRecord) -> Self {
        let mut row = ResultRow {
            res_num: record.res_num.clone(),
            res_name: record.res_name.clone(),
            model: record.outcome.label(),
            s2: None,
            s2_err: None,
            s2f: None,
            s2f_err: None,
            s2s: None,
            s2s_err: None,
            te: None,
            te_err: None,
            rex: None,
            rex_err: None,
            chi2: None,
        };

        let fit = match (&record.outcome, &record.fit) {
            (crate::modsel::SelectionOutcome::Single(_), Some(fit)) => fit,
            _ => return row,
        };
        row.chi2 = Some(fit.chi2);

        let p = |i: usize| fit.params[i];
        let e = |i: usize| fit.errors.get(i).copied().unwrap_or(0.0);
        const PS: f64 = 1e12;

        match fit.model {
            ModelSpec::M1 => {
                row.s2 = Some(p(0));
                row.s2_err = Some(e(0));
            }
            ModelSpec::M2 => {
                row.s2 = Some(p(0));
                row.s2_err = Some(e(0));
                row.te = Some(p(1) * PS);
                row.te_err = Some(e(1) * PS);
            }
            ModelSpec::M3 => {
                row.s2 = Some(p(0));
                row.s2_err = Some(e(0));
                row.rex = Some(p(1));
                row.rex_err = Some(e(1));
            }
            ModelSpec::M4 => {
                row.s2 = Some(p(0));
                row.s2_err = Some(e(0));
                row.te = Some(p(1) * PS);
                row.te_err = Some(e(1) * PS);
                row.rex = Some(p(2));
                row.rex_err = Some(e(2));
            }
            ModelSpec::M5 => {
                row.s2f = Some(p(0));
                row.s2f_err = Some(e(0));
                row.s2s = Some(p(1));
                row.s2s_err = Some(e(1));
                row.te = Some(p(2) * PS);
                row.te_err = Some(e(2) * PS);
            }
        }
        row
    }
}

fn cell(value: Option<f64>, err: Option<f64>) -> String {
    match value {
        Some(v) => format!("{:.3}\u{b1}{:.3}", v, err.unwrap_or(0.0)),
        None => String::new(),
    }
}

/// The fixed-width per-spin results table.
pub fn results_table(records: &[SelectedModelRecord]) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{:<6}{:<6}{:<6}{:<15}{:<15}{:<15}{:<19}{:<15}{:<10}\n",
        "ResNo", "Name", "Model", "S2", "S2f", "S2s", "te (ps)", "Rex", "Chi2"
    ));
    for record in records {
        let row = ResultRow::from_record(record);
        let chi2 = row.chi2.map_or(String::new(), |c| format!("{:.4}", c));
        out.push_str(&format!(
            "{:<6}{:<6}{:<6}{:<15}{:<15}{:<15}{:<19}{:<15}{:<10}\n",
            row.res_num,
            row.res_name,
            row.model,
            cell(row.s2, row.s2_err),
            cell(row.s2f, row.s2f_err),
            cell(row.s2s, row.s2s_err),
            cell(row.te, row.te_err),
            cell(row.rex, row.rex_err),
            chi2,
        ));
    }
    out
}

/// The parameter series a Grace file can plot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraceSeries {
    S2,
    S2f,
    S2s,
    Te,
    Rex,
    Chi2,
}

impl GraceSeries {
    pub fn label(&self) -> &'static str {
        match self {
            GraceSeries::S2 => "S2",
            GraceSeries::S2f => "S2f",
            GraceSeries::S2s => "S2s",
            GraceSeries::Te => "te",
            GraceSeries::Rex => "Rex",
            GraceSeries::Chi2 => "Chi2",
        }
    }

    fn pick(&self, row: &ResultRow) -> Option<(f64, f64)> {
        match self {
            GraceSeries::S2 => row.s2.map(|v| (v, row.s2_err.unwrap_or(0.0))),
            GraceSeries::S2f => row.s2f.map(|v| (v, row.s2f_err.unwrap_or(0.0))),
            GraceSeries::S2s => row.s2s.map(|v| (v, row.s2s_err.unwrap_or(0.0))),
            GraceSeries::Te => row.te.map(|v| (v, row.te_err.unwrap_or(0.0))),
            GraceSeries::Rex => row.rex.map(|v| (v, row.rex_err.unwrap_or(0.0))),
            GraceSeries::Chi2 => row.chi2.map(|v| (v, 0.0)),
        }
    }
}

fn grace_header(title: &str, subtitle: &str, y: &str, set_type: &str) -> String {
    let mut text = String::new();
    text.push_str("@version 50100\n");
    text.push_str("@with g0\n");
    text.push_str(&format!("@    title \"{}\"\n", title));
    text.push_str(&format!("@    subtitle \"{}\"\n", subtitle));
    text.push_str("@    xaxis  label \"Residue Number\"\n");
    text.push_str("@    xaxis  tick major 10\n");
    text.push_str(&format!("@    yaxis  label \"{}\"\n", y));
    text.push_str("@    frame linewidth 0.5\n");
    text.push_str("@    s0 symbol 1\n");
    text.push_str("@    s0 symbol size 0.49\n");
    text.push_str("@    s0 line linestyle 0\n");
    text.push_str(&format!("@target G0.S0\n@type {}\n", set_type));
    text
}

/// One Grace plot file: a parameter series over residue number.  Spins
/// where the parameter is not applicable are skipped.
pub fn grace_file(records: &[SelectedModelRecord], series: GraceSeries, subtitle: &str) -> String {
    let set_type = match series {
        GraceSeries::Chi2 => "xy",
        _ => "xydy",
    };
    let mut out = grace_header(
        &format!("{} values", series.label()),
        subtitle,
        series.label(),
        set_type,
    );
    for record in records {
        let row = ResultRow::from_record(record);
        if let Some((value, err)) = series.pick(&row) {
            match series {
                GraceSeries::Chi2 => out.push_str(&format!("{} {}\n", row.res_num, value)),
                _ => out.push_str(&format!("{} {} {}\n", row.res_num, value, err)),
            }
        }
    }
    out.push_str("&\n");
    out
}

/// Serialize the flattened rows as JSON.
pub fn json_export(records: &[SelectedModelRecord]) -> Result<String> {
    let rows: Vec<ResultRow> = records.iter().map(ResultRow::from_record).collect();
    Ok(serde_json::to_string_pretty(&rows)?)
}

/// Write the results table, JSON export, and one Grace file per series
/// into `dir` (created if absent; Grace files under `dir/grace/`).
pub fn write_report(dir: &Path, records: &[SelectedModelRecord], subtitle: &str) -> Result<()> {
    fs::create_dir_all(dir.join("grace"))?;
    fs::write(dir.join("results"), results_table(records))?;
    fs::write(dir.join("results.json"), json_export(records)?)?;
    for series in [
        GraceSeries::S2,
        GraceSeries::S2f,
        GraceSeries::S2s,
        GraceSeries::Te,
        GraceSeries::Rex,
        GraceSeries::Chi2,
    ] {
        let file = dir.join("grace").join(format!("{}.agr", series.label()));
        fs::write(file, grace_file(records, series, subtitle))?;
    }
    Ok(())
}

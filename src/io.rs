//! Input parsing: the dataset descriptor file and per-dataset relaxation
//! files.
//!
//! The descriptor file declares one block per magnetic field:
//!
//! ```text
//! NMR_frq_label 600
//! 600.13
//! r1.600.out
//! r2.600.out
//! noe.600.out
//! ```
//!
//! The `NMR_frq_label` line names the field; the next four lines give the
//! proton frequency in MHz and the R1, R2, and NOE data files, with `none`
//! marking an absent dataset.  Relaxation files carry one header line
//! followed by whitespace-separated `res_num res_name value error` rows.
//!
//! All validation happens here, before any fitting: malformed files,
//! missing data, and residue misalignment across datasets are fatal.

use std::fs;
use std::path::{Path, PathBuf};

use crate::data::{
    AnalysisConfig, Dataset, DatasetDescriptor, FieldInfo, RelaxDataPoint, RelaxKind, SpinRecord,
};
use crate::error::{MfError, Result};

/// One field block of the descriptor file.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldBlock {
    pub label: String,
    pub proton_frq_mhz: f64,
    pub r1_file: Option<PathBuf>,
    pub r2_file: Option<PathBuf>,
    pub noe_file: Option<PathBuf>,
}

impl FieldBlock {
    fn file_for(&self, kind: RelaxKind) -> Option<&PathBuf> {
        match kind {
            RelaxKind::R1 => self.r1_file.as_ref(),
            RelaxKind::R2 => self.r2_file.as_ref(),
            RelaxKind::Noe => self.noe_file.as_ref(),
        }
    }
}

/// Parse the descriptor text into field blocks.
pub fn parse_descriptor(text: &str) -> Result<Vec<FieldBlock>> {
    let mut lines = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'));

    let mut blocks = Vec::new();
    while let Some(line) = lines.next() {
        let label = line
            .strip_prefix("NMR_frq_label")
            .ok_or_else(|| {
                MfError::InputData(format!("expected an NMR_frq_label line, got '{}'", line))
            })?
            .trim()
            .to_string();
        if label.is_empty() {
            return Err(MfError::InputData(
                "NMR_frq_label line carries no label".to_string(),
            ));
        }

        let mut next = |what: &str| {
            lines.next().ok_or_else(|| {
                MfError::InputData(format!(
                    "descriptor block '{}' is truncated, missing {}",
                    label, what
                ))
            })
        };

        let frq_line = next("the proton frequency")?;
        let proton_frq_mhz: f64 = frq_line.parse().map_err(|_| {
            MfError::InputData(format!(
                "invalid proton frequency '{}' for field {}",
                frq_line, label
            ))
        })?;
        if proton_frq_mhz <= 0.0 {
            return Err(MfError::InputData(format!(
                "non-positive proton frequency {} for field {}",
                proton_frq_mhz, label
            )));
        }

        let file = |line: &str| {
            if line.eq_ignore_ascii_case("none") {
                None
            } else {
                Some(PathBuf::from(line))
            }
        };
        let r1_file = file(next("the R1 file")?);
        let r2_file = file(next("the R2 file")?);
        let noe_file = file(next("the NOE file")?);

        blocks.push(FieldBlock {
            label,
            proton_frq_mhz,
            r1_file,
            r2_file,
            noe_file,
        });
    }

    if blocks.is_empty() {
        return Err(MfError::InputData(
            "descriptor file declares no fields".to_string(),
        ));
    }
    Ok(blocks)
}

/// One parsed row of a relaxation data file.
#[derive(Debug, Clone, PartialEq)]
pub struct RelaxRow {
    pub res_num: String,
    pub res_name: String,
    pub value: f64,
    pub error: f64,
}

/// Parse relaxation file text: one header line, then data rows.
pub fn parse_relax_data(text: &str) -> Result<Vec<RelaxRow>> {
    let mut rows = Vec::new();
    for (i, line) in text.lines().enumerate().skip(1) {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let cols: Vec<&str> = line.split_whitespace().collect();
        if cols.len() != 4 {
            return Err(MfError::InputData(format!(
                "line {}: expected 4 columns, got {}",
                i + 1,
                cols.len()
            )));
        }
        let value: f64 = cols[2].parse().map_err(|_| {
            MfError::InputData(format!("line {}: invalid value '{}'", i + 1, cols[2]))
        })?;
        let error: f64 = cols[3].parse().map_err(|_| {
            MfError::InputData(format!("line {}: invalid error '{}'", i + 1, cols[3]))
        })?;
        rows.push(RelaxRow {
            res_num: cols[0].to_string(),
            res_name: cols[1].to_string(),
            value,
            error,
        });
    }
    if rows.is_empty() {
        return Err(MfError::InputData(
            "relaxation file contains no data rows".to_string(),
        ));
    }
    Ok(rows)
}

fn read_relax_file(path: &Path) -> Result<Vec<RelaxRow>> {
    let text = fs::read_to_string(path)?;
    parse_relax_data(&text)
        .map_err(|e| MfError::InputData(format!("{}: {}", path.display(), e)))
}

/// Load a complete dataset from a descriptor file.
///
/// Relaxation file paths are resolved relative to the descriptor's
/// directory.  Every loaded file must list the same residues in the same
/// order.
pub fn load_dataset(descriptor_path: &Path, config: AnalysisConfig) -> Result<Dataset> {
    let text = fs::read_to_string(descriptor_path)?;
    let blocks = parse_descriptor(&text)?;
    let base = descriptor_path.parent().unwrap_or_else(|| Path::new("."));

    let mut fields = Vec::new();
    let mut descriptors = Vec::new();
    let mut columns: Vec<Vec<RelaxRow>> = Vec::new();

    for (field_idx, block) in blocks.iter().enumerate() {
        fields.push(FieldInfo {
            label: block.label.clone(),
            proton_frq_hz: block.proton_frq_mhz * 1e6,
        });
        for kind in [RelaxKind::R1, RelaxKind::R2, RelaxKind::Noe] {
            if let Some(file) = block.file_for(kind) {
                descriptors.push(DatasetDescriptor {
                    kind,
                    field: field_idx,
                });
                columns.push(read_relax_file(&base.join(file))?);
            }
        }
    }

    let spins = align_residues(&columns)?;
    Dataset::new(fields, descriptors, spins, config)
}

/// Transpose per-dataset rows into per-spin records, verifying that every
/// dataset lists the same residues in the same order.
fn align_residues(columns: &[Vec<RelaxRow>]) -> Result<Vec<SpinRecord>> {
    let first = columns.first().ok_or_else(|| {
        MfError::InputData("no relaxation data files were loaded".to_string())
    })?;

    for column in columns.iter().skip(1) {
        if column.len() != first.len() {
            return Err(MfError::InputData(format!(
                "residue count mismatch across datasets: {} vs {}",
                first.len(),
                column.len()
            )));
        }
        for (a, b) in first.iter().zip(column.iter()) {
            if a.res_num != b.res_num || a.res_name != b.res_name {
                return Err(MfError::InputData(format!(
                    "residue mismatch across datasets: {} {} vs {} {}",
                    a.res_num, a.res_name, b.res_num, b.res_name
                )));
            }
        }
    }

    Ok((0..first.len())
        .map(|res| SpinRecord {
            res_num: first[res].res_num.clone(),
            res_name: first[res].res_name.clone(),
            data: columns
                .iter()
                .map(|column| RelaxDataPoint {
                    value: column[res].value,
                    error: column[res].error,
                })
                .collect(),
        })
        .collect())
}

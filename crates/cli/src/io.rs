//! Problem files in, result files out.
//!
//! A problem file is JSON. Matrices are either inline (`[[0, 0, 1], ...]`)
//! or point at a headerless integer CSV (`{"csv": "vertices.csv"}`), resolved
//! relative to the problem file. Maps are either slot permutations
//! (`[1, 0, 2]`) or coordinate-name images (`{"names": ["x2", "x1"]}`).
//! Every matrix and map must match the width of the first input row.

use std::fs;
use std::path::{Path, PathBuf};

use adjdec::api::{Deterministics, Maps, Matrix, Permutation, Problem, Row, SearchMode};
use anyhow::{ensure, Context, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};

use crate::provenance::{sidecar_path, Provenance};

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum MatrixSource {
    Inline(Vec<Row>),
    Csv { csv: PathBuf },
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum MapSpec {
    Slots(Vec<usize>),
    Names { names: Vec<String> },
}

#[derive(Debug, Deserialize)]
pub struct ProblemFile {
    pub input: MatrixSource,
    #[serde(default)]
    pub names: Vec<String>,
    #[serde(default)]
    pub maps: Vec<MapSpec>,
    #[serde(default)]
    pub known_output: Option<MatrixSource>,
    #[serde(default)]
    pub deterministics: Option<MatrixSource>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RunOutput {
    pub mode: String,
    pub classes: usize,
    pub rows: Matrix,
}

pub fn load_problem(path: &Path) -> Result<Problem> {
    let text =
        fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let file: ProblemFile =
        serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))?;
    let base = path.parent().unwrap_or_else(|| Path::new(""));

    let input = load_matrix(&file.input, base)?;
    // An empty input is left to the library, which reports it.
    let width = input.first().map(Row::len);
    if let Some(width) = width {
        check_width(&input, width).with_context(|| format!("input of {}", path.display()))?;
    }

    let mut maps = Maps::new();
    for (i, spec) in file.maps.iter().enumerate() {
        let map = match spec {
            MapSpec::Slots(source) => Permutation::new(source.clone()),
            MapSpec::Names { names } => Permutation::from_names(&file.names, names),
        }
        .map_err(anyhow::Error::from)
        .and_then(|map| {
            if let Some(width) = width {
                ensure!(
                    map.len() == width,
                    "map acts on {} slots but rows have {width}",
                    map.len()
                );
            }
            Ok(map)
        })
        .with_context(|| format!("map #{i} in {}", path.display()))?;
        maps.push(map);
    }

    let known_output = match &file.known_output {
        Some(src) => load_matrix(src, base)?,
        None => Matrix::new(),
    };
    if let Some(width) = width {
        check_width(&known_output, width)
            .with_context(|| format!("known_output of {}", path.display()))?;
    }

    let deterministics = match &file.deterministics {
        Some(src) => {
            let probes = load_matrix(src, base)?;
            if let Some(width) = width {
                check_width(&probes, width)
                    .with_context(|| format!("deterministics of {}", path.display()))?;
            }
            Deterministics::new(&probes)
        }
        None => Deterministics::empty(),
    };
    tracing::info!(
        rows = input.len(),
        maps = maps.len(),
        known = known_output.len(),
        probes = deterministics.len(),
        "problem loaded"
    );
    Ok(Problem::new(input)
        .with_names(file.names)
        .with_maps(maps)
        .with_known_output(known_output)
        .with_deterministics(deterministics))
}

fn check_width(rows: &[Row], width: usize) -> Result<()> {
    for (i, row) in rows.iter().enumerate() {
        ensure!(
            row.len() == width,
            "row {} has {} entries, expected {width}",
            i + 1,
            row.len()
        );
    }
    Ok(())
}

fn load_matrix(src: &MatrixSource, base: &Path) -> Result<Matrix> {
    match src {
        MatrixSource::Inline(rows) => Ok(rows.clone()),
        MatrixSource::Csv { csv } => read_csv_matrix(&base.join(csv)),
    }
}

/// Headerless CSV of integers, one row per line.
pub fn read_csv_matrix(path: &Path) -> Result<Matrix> {
    let df = LazyCsvReader::new(path)
        .with_has_header(false)
        .finish()
        .with_context(|| format!("scanning {}", path.display()))?
        .collect()
        .with_context(|| format!("reading {}", path.display()))?;
    let columns = df
        .get_columns()
        .iter()
        .map(|s| s.cast(&DataType::Int64))
        .collect::<PolarsResult<Vec<_>>>()
        .with_context(|| format!("{}: non-integer column", path.display()))?;
    let mut rows = Matrix::with_capacity(df.height());
    for i in 0..df.height() {
        let mut values = Vec::with_capacity(columns.len());
        for (j, col) in columns.iter().enumerate() {
            let v = col.i64()?.get(i).with_context(|| {
                format!("{}: empty cell at line {}, column {}", path.display(), i + 1, j + 1)
            })?;
            values.push(v);
        }
        rows.push(Row::new(values));
    }
    Ok(rows)
}

/// Write the result JSON and its provenance sidecar. Returns the sidecar
/// path.
pub fn write_result(
    out: &Path,
    mode: SearchMode,
    rows: &[Row],
    mut provenance: Provenance,
) -> Result<PathBuf> {
    if let Some(parent) = out.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating output dir {}", parent.display()))?;
        }
    }
    let doc = RunOutput {
        mode: mode.to_string(),
        classes: rows.len(),
        rows: rows.to_vec(),
    };
    fs::write(out, serde_json::to_vec_pretty(&doc)?)
        .with_context(|| format!("writing {}", out.display()))?;

    provenance.outputs.push(out.to_path_buf());
    let sidecar = sidecar_path(out);
    fs::write(&sidecar, serde_json::to_vec_pretty(&provenance)?)
        .with_context(|| format!("writing {}", sidecar.display()))?;
    Ok(sidecar)
}

pub fn read_result(path: &Path) -> Result<RunOutput> {
    let bytes = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_slice(&bytes).with_context(|| format!("parsing {}", path.display()))
}

use crate::link::LinkFunction;
use crate::param::Parameter;
use matrix_util::common_io::{mkdir, open_buf_reader, open_buf_writer, write_lines};
use ndarray::prelude::*;
use serde::{Deserialize, Serialize};
use std::io::Write;

/// Serialized form of a parameter: the constrained values in
/// row-major order together with the link that produced them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamRecord {
    pub name: String,
    pub link: LinkFunction,
    pub nrows: usize,
    pub ncols: usize,
    pub values: Vec<f64>,
}

impl ParamRecord {
    pub fn from_param(name: &str, param: &Parameter) -> Self {
        let (nrows, ncols) = param.dims();
        Self {
            name: name.to_string(),
            link: param.link(),
            nrows,
            ncols,
            values: param.constrained().iter().cloned().collect(),
        }
    }

    /// Restore the parameter in the unconstrained space
    pub fn to_param(&self) -> anyhow::Result<Parameter> {
        let constrained = Array2::from_shape_vec((self.nrows, self.ncols), self.values.clone())?;
        Parameter::from_constrained(&self.name, &constrained, self.link)
    }
}

/// Write parameter records to a JSON file
/// * `records` - parameter records
/// * `json_file` - file name--either gzipped or not
pub fn write_records(records: &[ParamRecord], json_file: &str) -> anyhow::Result<()> {
    mkdir(json_file)?;
    let mut buf = open_buf_writer(json_file)?;
    serde_json::to_writer_pretty(&mut buf, records)?;
    buf.flush()?;
    Ok(())
}

/// Read parameter records from a JSON file
/// * `json_file` - file name--either gzipped or not
pub fn read_records(json_file: &str) -> anyhow::Result<Vec<ParamRecord>> {
    let buf = open_buf_reader(json_file)?;
    Ok(serde_json::from_reader(buf)?)
}

/// Write constrained values as `name row column value` lines
/// * `records` - parameter records
/// * `tsv_file` - file name--either gzipped or not
pub fn write_records_tsv(records: &[ParamRecord], tsv_file: &str) -> anyhow::Result<()> {
    let mut lines = vec!["name\trow\tcolumn\tvalue".to_string()];
    for rec in records {
        for (idx, v) in rec.values.iter().enumerate() {
            lines.push(format!(
                "{}\t{}\t{}\t{}",
                rec.name,
                idx / rec.ncols.max(1),
                idx % rec.ncols.max(1),
                v
            ));
        }
    }
    mkdir(tsv_file)?;
    write_lines(&lines, tsv_file)
}

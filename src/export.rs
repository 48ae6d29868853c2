//! Run-scoped record collection and the single terminal write.

use crate::record::{ProductRecord, COLUMNS};
use rust_xlsxwriter::{ColNum, Format, RowNum, Workbook, XlsxError};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

pub const SHEET_NAME: &str = "Products";

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("cannot create output directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("{rows} rows do not fit in one worksheet")]
    TooManyRows { rows: usize },
    #[error("cannot write {path}: {source}")]
    Xlsx { path: PathBuf, source: XlsxError },
}

/// Append-only records gathered over one run.
///
/// Nothing reaches disk until [`ResultTable::export`]; a crash before then
/// loses the whole run.
#[derive(Debug, Default)]
pub struct ResultTable {
    records: Vec<ProductRecord>,
}

impl ResultTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: ProductRecord) {
        self.records.push(record);
    }

    pub fn extend(&mut self, records: impl IntoIterator<Item = ProductRecord>) {
        self.records.extend(records);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ProductRecord> {
        self.records.iter()
    }

    /// Write a workbook with a bold header row and one row per record to
    /// `path`, replacing any existing file, and consume the table. Null
    /// fields stay as empty cells. Returns the number of rows written.
    pub fn export(self, path: &Path) -> Result<usize, ExportError> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).map_err(|source| ExportError::CreateDir {
                path: dir.to_path_buf(),
                source,
            })?;
        }

        let xlsx_err = |source| ExportError::Xlsx {
            path: path.to_path_buf(),
            source,
        };
        let mut workbook = Workbook::new();
        {
            let sheet = workbook.add_worksheet();
            sheet.set_name(SHEET_NAME).map_err(xlsx_err)?;

            let bold = Format::new().set_bold();
            for (col, title) in (0..).zip(COLUMNS) {
                sheet
                    .write_string_with_format(0, col, title, &bold)
                    .map_err(xlsx_err)?;
            }

            for (i, record) in self.records.iter().enumerate() {
                let row = RowNum::try_from(i + 1).map_err(|_| ExportError::TooManyRows {
                    rows: self.records.len(),
                })?;
                for (col, cell) in (0..).zip(record.cells()) {
                    let col: ColNum = col;
                    if let Some(value) = cell {
                        sheet.write_string(row, col, value).map_err(xlsx_err)?;
                    }
                }
            }
        }
        workbook.save(path).map_err(xlsx_err)?;

        info!(rows = self.records.len(), path = %path.display(), "table exported");
        Ok(self.records.len())
    }
}

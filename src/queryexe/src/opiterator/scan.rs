use super::OpIterator;
use common::catalog::Catalog;
use common::{EmberError, Field, SchemaMapping, Tuple};
use log::debug;
use std::fs::File;
use std::path::PathBuf;

/// Streams tuples from one table's CSV file.
///
/// Construction resolves the table through the catalog, so a missing table
/// or data file fails here with a catalog error rather than mid-query. The
/// produced column order matches the catalog's ordered column list; no
/// filtering, no column pruning.
pub struct CsvScan {
    table_name: String,
    file_path: PathBuf,
    schema: SchemaMapping,
    reader: csv::Reader<File>,
}

impl CsvScan {
    /// Constructs a scan over the given table.
    ///
    /// # Arguments
    ///
    /// * `catalog` - Catalog to resolve the table in.
    /// * `table` - Name of the table to scan.
    pub fn new(catalog: &Catalog, table: &str) -> Result<Self, EmberError> {
        let (file_path, columns) = catalog.resolve(table)?;
        let schema = SchemaMapping::for_table(table, columns);
        debug!("scan: opening {} at {:?}", table, file_path);
        let reader = Self::open_reader(&file_path)?;
        Ok(Self {
            table_name: table.to_string(),
            file_path,
            schema,
            reader,
        })
    }

    fn open_reader(path: &PathBuf) -> Result<csv::Reader<File>, EmberError> {
        let file = File::open(path)?;
        Ok(csv::ReaderBuilder::new()
            .has_headers(false)
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(file))
    }
}

impl OpIterator for CsvScan {
    fn next(&mut self) -> Result<Option<Tuple>, EmberError> {
        let mut record = csv::StringRecord::new();
        loop {
            let got = self.reader.read_record(&mut record).map_err(|e| {
                EmberError::IOError(format!(
                    "error reading tuple from table {}: {}",
                    self.table_name, e
                ))
            })?;
            if !got {
                return Ok(None);
            }
            // a record holding a single empty field is a blank line
            if record.len() == 1 && record.get(0) == Some("") {
                continue;
            }
            let fields = record.iter().map(Field::from_csv).collect();
            return Ok(Some(Tuple::new(fields)));
        }
    }

    /// Re-opens the file at offset zero; the previous handle is released.
    fn rewind(&mut self) -> Result<(), EmberError> {
        self.reader = Self::open_reader(&self.file_path)?;
        Ok(())
    }

    fn schema(&self) -> &SchemaMapping {
        &self.schema
    }
}

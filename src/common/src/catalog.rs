use crate::{EmberError, SchemaMapping};
use log::debug;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Table metadata for one database directory.
///
/// The catalog is constructed once per query from `<db>/schema.txt` and is
/// read-only afterwards; it is threaded explicitly into the planner rather
/// than living in process-global state. One line of `schema.txt` describes
/// one table: `TableName Col1 Col2 ... ColN`, whitespace-separated, and the
/// column order on that line is authoritative for the table's tuple layout.
/// Table data lives in `<db>/data/<TableName>.csv`.
pub struct Catalog {
    /// Database directory the catalog was loaded from.
    base_dir: PathBuf,
    /// Mapping from table name to its ordered column list.
    tables: HashMap<String, Vec<String>>,
}

impl Catalog {
    /// Load the catalog from a database directory.
    ///
    /// # Arguments
    ///
    /// * `db_dir` - Directory containing `schema.txt` and `data/`.
    pub fn load(db_dir: &Path) -> Result<Self, EmberError> {
        let schema_path = db_dir.join("schema.txt");
        let contents = fs::read_to_string(&schema_path).map_err(|e| {
            EmberError::CatalogError(format!(
                "cannot read schema file {}: {}",
                schema_path.display(),
                e
            ))
        })?;

        let mut tables = HashMap::new();
        for line in contents.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let mut tokens = line.split_whitespace();
            // first token is the table name, the rest are its columns
            let name = match tokens.next() {
                Some(n) => n.to_string(),
                None => continue,
            };
            let columns: Vec<String> = tokens.map(|t| t.to_string()).collect();
            if columns.is_empty() {
                return Err(EmberError::CatalogError(format!(
                    "schema line for table {} lists no columns",
                    name
                )));
            }
            debug!("catalog: table {} with columns {:?}", name, columns);
            if tables.insert(name.clone(), columns).is_some() {
                return Err(EmberError::CatalogError(format!(
                    "duplicate schema line for table {}",
                    name
                )));
            }
        }

        Ok(Self {
            base_dir: db_dir.to_path_buf(),
            tables,
        })
    }

    /// Resolve a table to its data file path and ordered column list.
    ///
    /// Fails with a catalog error when the table has no schema line or its
    /// data file does not exist.
    ///
    /// # Arguments
    ///
    /// * `table` - Table name to resolve.
    pub fn resolve(&self, table: &str) -> Result<(PathBuf, &[String]), EmberError> {
        let columns = self.tables.get(table).ok_or_else(|| {
            EmberError::CatalogError(format!("table {} not found in schema", table))
        })?;
        let path = self.base_dir.join("data").join(format!("{}.csv", table));
        if !path.exists() {
            return Err(EmberError::CatalogError(format!(
                "table file not found for table {}: {}",
                table,
                path.display()
            )));
        }
        Ok((path, columns))
    }

    /// Checks if the table is present in the catalog.
    pub fn is_valid_table(&self, table: &str) -> bool {
        self.tables.contains_key(table)
    }

    /// Checks if the column is valid for the given table.
    ///
    /// # Arguments
    ///
    /// * `table` - Table to look for the column in.
    /// * `col_name` - Unqualified column name.
    pub fn is_valid_column(&self, table: &str, col_name: &str) -> bool {
        match self.tables.get(table) {
            Some(columns) => columns.iter().any(|c| c == col_name),
            None => false,
        }
    }

    /// The base schema mapping `{Table.Col_i -> i}` for a table.
    ///
    /// # Arguments
    ///
    /// * `table` - Table to build the mapping for.
    pub fn schema_mapping(&self, table: &str) -> Result<SchemaMapping, EmberError> {
        let columns = self.tables.get(table).ok_or_else(|| {
            EmberError::CatalogError(format!("table {} not found in schema", table))
        })?;
        Ok(SchemaMapping::for_table(table, columns))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::testutil::*;

    #[test]
    fn test_load_and_resolve() {
        let dir = setup_test_db(
            &[("R", &["A", "B"]), ("S", &["C", "D"])],
            &[("R", &[vec![1, 2]]), ("S", &[vec![3, 4]])],
        );
        let catalog = Catalog::load(&dir).unwrap();
        assert!(catalog.is_valid_table("R"));
        assert!(!catalog.is_valid_table("T"));
        assert!(catalog.is_valid_column("R", "A"));
        assert!(!catalog.is_valid_column("R", "C"));

        let (path, columns) = catalog.resolve("S").unwrap();
        assert!(path.ends_with("data/S.csv"));
        assert_eq!(columns, &[String::from("C"), String::from("D")]);
        cleanup_test_db(&dir);
    }

    #[test]
    fn test_unknown_table_is_catalog_error() {
        let dir = setup_test_db(&[("R", &["A"])], &[("R", &[vec![1]])]);
        let catalog = Catalog::load(&dir).unwrap();
        assert!(matches!(
            catalog.resolve("Missing"),
            Err(EmberError::CatalogError(_))
        ));
        cleanup_test_db(&dir);
    }

    #[test]
    fn test_missing_data_file_is_catalog_error() {
        // schema line present, data file absent
        let dir = setup_test_db(&[("R", &["A"]), ("Ghost", &["X"])], &[("R", &[vec![1]])]);
        let catalog = Catalog::load(&dir).unwrap();
        assert!(matches!(
            catalog.resolve("Ghost"),
            Err(EmberError::CatalogError(_))
        ));
        cleanup_test_db(&dir);
    }

    #[test]
    fn test_missing_schema_file_is_catalog_error() {
        let dir = gen_random_dir();
        assert!(matches!(
            Catalog::load(&dir),
            Err(EmberError::CatalogError(_))
        ));
    }

    #[test]
    fn test_schema_mapping_indices() {
        let dir = setup_test_db(&[("R", &["A", "B", "C"])], &[("R", &[vec![1, 2, 3]])]);
        let catalog = Catalog::load(&dir).unwrap();
        let mapping = catalog.schema_mapping("R").unwrap();
        assert_eq!(mapping.index_of("R.A"), Some(0));
        assert_eq!(mapping.index_of("R.C"), Some(2));
        cleanup_test_db(&dir);
    }
}

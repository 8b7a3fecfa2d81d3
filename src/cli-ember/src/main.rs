extern crate clap;
use clap::{App, Arg};
use env_logger::Env;
use log::{error, info};

use common::catalog::Catalog;
use common::EmberError;
use queryexe::execute_sql;
use std::fs;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

fn run(database_dir: &str, query_file: &str, output_file: &str) -> Result<usize, EmberError> {
    let catalog = Catalog::load(Path::new(database_dir))?;

    let sql = fs::read_to_string(query_file)
        .map_err(|e| EmberError::IOError(format!("cannot read query file {}: {}", query_file, e)))?;

    let out = File::create(output_file)
        .map_err(|e| EmberError::IOError(format!("cannot create output file {}: {}", output_file, e)))?;
    let mut writer = BufWriter::new(out);

    execute_sql(&catalog, &sql, &mut writer)
}

fn main() {
    // Configure log environment
    env_logger::from_env(Env::default().default_filter_or("info")).init();

    let matches = App::new(env!("CARGO_PKG_NAME"))
        .version(env!("CARGO_PKG_VERSION"))
        .author(env!("CARGO_PKG_AUTHORS"))
        .about(env!("CARGO_PKG_DESCRIPTION"))
        .arg(
            Arg::with_name("database_dir")
                .help("Database directory containing schema.txt and data/")
                .required(true)
                .index(1),
        )
        .arg(
            Arg::with_name("query_file")
                .help("File containing a single SELECT statement")
                .required(true)
                .index(2),
        )
        .arg(
            Arg::with_name("output_file")
                .help("File to write the result CSV to")
                .required(true)
                .index(3),
        )
        .get_matches();

    let database_dir = matches.value_of("database_dir").unwrap();
    let query_file = matches.value_of("query_file").unwrap();
    let output_file = matches.value_of("output_file").unwrap();

    match run(database_dir, query_file, output_file) {
        Ok(rows) => {
            info!("wrote {} rows to {}", rows, output_file);
        }
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    }
}

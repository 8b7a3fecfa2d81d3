use crate::{Field, Tuple};
use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

pub fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Converts an int vector to a Tuple.
///
/// # Argument
///
/// * `data` - Data to put into tuple.
pub fn int_vec_to_tuple(data: Vec<i64>) -> Tuple {
    let mut tuple_data = Vec::new();

    for val in data {
        tuple_data.push(Field::Int(val));
    }

    Tuple::new(tuple_data)
}

/// Creates a Vec of tuples containing Int fields given a 2D Vec of i64 's
pub fn create_tuple_list(tuple_data: Vec<Vec<i64>>) -> Vec<Tuple> {
    let mut tuples = Vec::new();
    for item in &tuple_data {
        let fields = item.iter().map(|i| Field::Int(*i)).collect();
        tuples.push(Tuple::new(fields));
    }
    tuples
}

pub fn gen_rand_string(n: usize) -> String {
    thread_rng()
        .sample_iter(Alphanumeric)
        .take(n)
        .map(char::from)
        .collect()
}

pub fn gen_random_dir() -> PathBuf {
    init();
    let mut dir = env::temp_dir();
    dir.push(String::from("ember"));
    let rand_string = gen_rand_string(10);
    dir.push(rand_string);
    dir
}

/// Creates a database directory with a schema.txt and one CSV per table.
///
/// # Arguments
///
/// * `schemas` - Per table: name and ordered column names.
/// * `data` - Per table: name and its rows of integer fields.
pub fn setup_test_db(schemas: &[(&str, &[&str])], data: &[(&str, &[Vec<i64>])]) -> PathBuf {
    let dir = gen_random_dir();
    let data_dir = dir.join("data");
    fs::create_dir_all(&data_dir).unwrap();

    let mut schema_lines = Vec::new();
    for (table, columns) in schemas {
        schema_lines.push(format!("{} {}", table, columns.join(" ")));
    }
    fs::write(dir.join("schema.txt"), schema_lines.join("\n") + "\n").unwrap();

    for (table, rows) in data {
        let mut csv = String::new();
        for row in rows.iter() {
            let vals: Vec<String> = row.iter().map(|v| v.to_string()).collect();
            csv.push_str(&vals.join(","));
            csv.push('\n');
        }
        fs::write(data_dir.join(format!("{}.csv", table)), csv).unwrap();
    }

    dir
}

pub fn cleanup_test_db(dir: &Path) {
    let _ = fs::remove_dir_all(dir);
}

/// Compares two blocks of output lines regardless of line order.
///
/// Builds a frequency map per side so that duplicate rows must appear the
/// same number of times in both.
pub fn compare_unordered_lines(left: &str, right: &str) -> bool {
    fn frequency_map(text: &str) -> HashMap<&str, usize> {
        let mut map = HashMap::new();
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            *map.entry(line).or_insert(0) += 1;
        }
        map
    }
    frequency_map(left) == frequency_map(right)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compare_unordered_lines() {
        assert!(compare_unordered_lines("1, 2\n3, 4\n", "3, 4\n1, 2\n"));
        assert!(compare_unordered_lines("1, 2\n1, 2\n", "1, 2\n1, 2\n"));
        // duplicate counts must match
        assert!(!compare_unordered_lines("1, 2\n1, 2\n", "1, 2\n"));
        assert!(!compare_unordered_lines("1, 2\n", "1, 3\n"));
    }

    #[test]
    fn test_setup_test_db() {
        let dir = setup_test_db(
            &[("R", &["A", "B"])],
            &[("R", &[vec![1, 2], vec![3, 4]])],
        );
        let schema = fs::read_to_string(dir.join("schema.txt")).unwrap();
        assert_eq!(schema, "R A B\n");
        let csv = fs::read_to_string(dir.join("data").join("R.csv")).unwrap();
        assert_eq!(csv, "1,2\n3,4\n");
        cleanup_test_db(&dir);
    }
}

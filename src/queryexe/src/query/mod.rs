pub use executor::Executor;
pub use planner::Planner;
pub use translate_and_validate::TranslateAndValidate;

mod executor;
mod planner;
mod translate_and_validate;

use common::catalog::Catalog;
use common::EmberError;
use sqlparser::ast::Statement;
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;
use std::io::Write;

/// Parse, plan, and execute one SELECT statement against a catalog,
/// writing the result rows to `out`. Returns the number of rows written.
///
/// # Arguments
///
/// * `catalog` - Catalog of the database to query.
/// * `sql` - Text of a single SELECT statement.
/// * `out` - Destination for the output CSV lines.
pub fn execute_sql<W: Write>(
    catalog: &Catalog,
    sql: &str,
    out: &mut W,
) -> Result<usize, EmberError> {
    let dialect = GenericDialect {};
    let statements = Parser::parse_sql(&dialect, sql)
        .map_err(|e| EmberError::ParseError(e.to_string()))?;
    let query = match statements.as_slice() {
        [Statement::Query(q)] => &**q,
        _ => {
            return Err(EmberError::ParseError(String::from(
                "expected exactly one SELECT statement",
            )));
        }
    };

    let select = TranslateAndValidate::from_sql(query, catalog)?;
    let plan = Planner::new(catalog, &select).plan()?;
    Executor::new(plan).write_all(out)
}

#[cfg(test)]
mod test {
    use super::*;
    use common::testutil::*;
    use std::path::{Path, PathBuf};

    /// R, S, T from the reference scenarios plus U for ambiguity cases.
    fn scenario_db() -> PathBuf {
        setup_test_db(
            &[
                ("R", &["A", "B"]),
                ("S", &["C", "D"]),
                ("T", &["E", "F"]),
                ("U", &["A", "G"]),
            ],
            &[
                ("R", &[vec![1, 2], vec![3, 4], vec![5, 6]]),
                ("S", &[vec![2, 10], vec![4, 20], vec![7, 30]]),
                ("T", &[vec![1, 100], vec![3, 100], vec![1, 200]]),
                ("U", &[vec![1, 7]]),
            ],
        )
    }

    fn run(dir: &Path, sql: &str) -> Result<String, EmberError> {
        let catalog = Catalog::load(dir)?;
        let mut out = Vec::new();
        execute_sql(&catalog, sql, &mut out)?;
        Ok(String::from_utf8(out).unwrap())
    }

    #[test]
    fn test_select_star_with_filter() {
        let dir = scenario_db();
        let out = run(&dir, "SELECT * FROM R WHERE R.A > 2").unwrap();
        assert_eq!(out, "3, 4\n5, 6\n");
        cleanup_test_db(&dir);
    }

    #[test]
    fn test_two_table_equi_join() {
        let dir = scenario_db();
        let out = run(&dir, "SELECT R.A, S.D FROM R, S WHERE R.B = S.C").unwrap();
        assert_eq!(out, "1, 10\n3, 20\n");
        cleanup_test_db(&dir);
    }

    #[test]
    fn test_distinct() {
        let dir = scenario_db();
        let out = run(&dir, "SELECT DISTINCT T.E FROM T").unwrap();
        assert!(compare_unordered_lines(&out, "1\n3\n"));
        cleanup_test_db(&dir);
    }

    #[test]
    fn test_group_by_sum() {
        let dir = scenario_db();
        let out = run(&dir, "SELECT T.E, SUM(T.F) FROM T GROUP BY T.E").unwrap();
        assert!(compare_unordered_lines(&out, "1, 300\n3, 100\n"));
        cleanup_test_db(&dir);
    }

    #[test]
    fn test_literal_sum() {
        let dir = scenario_db();
        let out = run(&dir, "SELECT SUM(1) FROM R").unwrap();
        assert_eq!(out, "3\n");
        cleanup_test_db(&dir);
    }

    #[test]
    fn test_order_by_unselected_column() {
        let dir = scenario_db();
        let out = run(&dir, "SELECT R.A FROM R ORDER BY R.B").unwrap();
        assert_eq!(out, "1\n3\n5\n");
        cleanup_test_db(&dir);
    }

    #[test]
    fn test_order_by_descending() {
        let dir = scenario_db();
        let out = run(&dir, "SELECT R.A FROM R ORDER BY R.A DESC").unwrap();
        assert_eq!(out, "5\n3\n1\n");
        cleanup_test_db(&dir);
    }

    #[test]
    fn test_unqualified_columns() {
        let dir = scenario_db();
        let out = run(&dir, "SELECT D FROM S WHERE C = 4").unwrap();
        assert_eq!(out, "20\n");
        cleanup_test_db(&dir);
    }

    #[test]
    fn test_pushdown_preserves_semantics() {
        let dir = scenario_db();
        let out = run(
            &dir,
            "SELECT R.A, S.D FROM R, S WHERE R.A > 1 AND S.D < 25 AND R.B = S.C",
        )
        .unwrap();
        assert_eq!(out, "3, 20\n");
        cleanup_test_db(&dir);
    }

    #[test]
    fn test_three_table_residual_predicate() {
        let dir = scenario_db();
        // T.E + R.B references two non-adjacent tables; it can only be
        // evaluated by the join that also covers S
        let out = run(
            &dir,
            "SELECT R.A FROM R, S, T WHERE R.A = 1 AND S.C = 2 AND T.E + R.B = 3",
        )
        .unwrap();
        assert_eq!(out, "1\n1\n");
        cleanup_test_db(&dir);
    }

    #[test]
    fn test_cartesian_product_count() {
        let dir = scenario_db();
        let out = run(&dir, "SELECT R.A, S.C FROM R, S").unwrap();
        assert_eq!(out.lines().count(), 9);
        // outer-major order: the first outer tuple pairs with all of S first
        assert!(out.starts_with("1, 2\n1, 4\n1, 7\n"));
        cleanup_test_db(&dir);
    }

    #[test]
    fn test_sum_of_arithmetic_expression() {
        let dir = scenario_db();
        let out = run(&dir, "SELECT SUM(R.A * 2) FROM R").unwrap();
        assert_eq!(out, "18\n");
        cleanup_test_db(&dir);
    }

    #[test]
    fn test_group_by_without_sum() {
        let dir = scenario_db();
        let out = run(&dir, "SELECT T.E FROM T GROUP BY T.E").unwrap();
        assert!(compare_unordered_lines(&out, "1\n3\n"));
        cleanup_test_db(&dir);
    }

    #[test]
    fn test_order_by_sum_case_insensitive() {
        let dir = scenario_db();
        let out = run(
            &dir,
            "SELECT T.E, SUM(T.F) FROM T GROUP BY T.E ORDER BY sum(T.F)",
        )
        .unwrap();
        assert_eq!(out, "3, 100\n1, 300\n");
        cleanup_test_db(&dir);
    }

    #[test]
    fn test_group_by_order_by_group_column() {
        let dir = scenario_db();
        let out = run(
            &dir,
            "SELECT T.E, SUM(T.F) FROM T GROUP BY T.E ORDER BY T.E DESC",
        )
        .unwrap();
        assert_eq!(out, "3, 100\n1, 300\n");
        cleanup_test_db(&dir);
    }

    #[test]
    fn test_multiple_sums_with_literal() {
        let dir = scenario_db();
        let out = run(&dir, "SELECT SUM(T.F), SUM(2) FROM T").unwrap();
        assert_eq!(out, "400, 6\n");
        cleanup_test_db(&dir);
    }

    #[test]
    fn test_join_on_syntax() {
        let dir = scenario_db();
        let out = run(&dir, "SELECT R.A, S.D FROM R JOIN S ON R.B = S.C").unwrap();
        assert_eq!(out, "1, 10\n3, 20\n");
        cleanup_test_db(&dir);
    }

    #[test]
    fn test_empty_result() {
        let dir = scenario_db();
        let out = run(&dir, "SELECT * FROM R WHERE R.A > 100").unwrap();
        assert_eq!(out, "");
        cleanup_test_db(&dir);
    }

    #[test]
    fn test_non_select_statement_is_parse_error() {
        let dir = scenario_db();
        assert!(matches!(
            run(&dir, "INSERT INTO R VALUES (1, 2)"),
            Err(EmberError::ParseError(_))
        ));
        cleanup_test_db(&dir);
    }

    #[test]
    fn test_garbage_is_parse_error() {
        let dir = scenario_db();
        assert!(matches!(
            run(&dir, "SELECT FROM WHERE"),
            Err(EmberError::ParseError(_))
        ));
        cleanup_test_db(&dir);
    }

    #[test]
    fn test_missing_table_is_catalog_error() {
        let dir = scenario_db();
        assert!(matches!(
            run(&dir, "SELECT * FROM Nope"),
            Err(EmberError::CatalogError(_))
        ));
        cleanup_test_db(&dir);
    }

    #[test]
    fn test_output_arity_matches_mapping() {
        let dir = scenario_db();
        let catalog = Catalog::load(&dir).unwrap();
        for sql in &[
            "SELECT * FROM R",
            "SELECT R.A FROM R, S WHERE R.B = S.C",
            "SELECT T.E, SUM(T.F) FROM T GROUP BY T.E",
        ] {
            let dialect = sqlparser::dialect::GenericDialect {};
            let mut statements =
                sqlparser::parser::Parser::parse_sql(&dialect, sql).unwrap();
            let query = match statements.remove(0) {
                Statement::Query(q) => *q,
                _ => panic!("expected a query"),
            };
            let select = TranslateAndValidate::from_sql(&query, &catalog).unwrap();
            let plan = Planner::new(&catalog, &select).plan().unwrap();
            let mut executor = Executor::new(plan);
            let arity = executor.schema().size();
            while let Some(tuple) = executor.next().unwrap() {
                assert_eq!(tuple.size(), arity, "arity mismatch for {}", sql);
            }
        }
        cleanup_test_db(&dir);
    }
}

use crate::{EmberError, Field, SchemaMapping, Tuple};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::fmt;

/// Binary operators usable in query conditions and select expressions.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Multiply,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    And,
    Or,
}

impl BinaryOp {
    fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Multiply => "*",
            BinaryOp::Eq => "=",
            BinaryOp::NotEq => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::LtEq => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::GtEq => ">=",
            BinaryOp::And => "AND",
            BinaryOp::Or => "OR",
        }
    }
}

/// A parsed expression tree.
///
/// Column references hold fully qualified names (`Table.Column`) or
/// synthetic names introduced by the planner (`LITERAL_SUM_0`). The
/// variants are the tagged-sum replacement for the visitor pattern the
/// evaluator would otherwise need.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum Expression {
    /// Integer constant.
    Literal(i64),
    /// Column reference, resolved through a schema mapping at evaluation.
    Column(String),
    /// Binary operation over two subexpressions.
    Binary {
        op: BinaryOp,
        left: Box<Expression>,
        right: Box<Expression>,
    },
}

/// Result of evaluating an expression against one tuple.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Text(String),
    Bool(bool),
}

impl Expression {
    /// Evaluate this expression against a tuple under a schema mapping.
    ///
    /// # Arguments
    ///
    /// * `tuple` - Input row.
    /// * `mapping` - Name-to-index contract describing `tuple`.
    pub fn evaluate(&self, tuple: &Tuple, mapping: &SchemaMapping) -> Result<Value, EmberError> {
        match self {
            Expression::Literal(i) => Ok(Value::Int(*i)),
            Expression::Column(name) => {
                let idx = mapping.index_of(name).ok_or_else(|| {
                    EmberError::ExecutionError(format!(
                        "column {} not found in schema mapping",
                        name
                    ))
                })?;
                let field = tuple.get_field(idx).ok_or_else(|| {
                    EmberError::ExecutionError(format!(
                        "tuple of arity {} has no field at index {}",
                        tuple.size(),
                        idx
                    ))
                })?;
                Ok(match field {
                    Field::Int(i) => Value::Int(*i),
                    Field::Text(s) => Value::Text(s.clone()),
                })
            }
            Expression::Binary { op, left, right } => {
                let lhs = left.evaluate(tuple, mapping)?;
                let rhs = right.evaluate(tuple, mapping)?;
                Self::apply(*op, lhs, rhs)
            }
        }
    }

    fn apply(op: BinaryOp, lhs: Value, rhs: Value) -> Result<Value, EmberError> {
        match op {
            BinaryOp::Add | BinaryOp::Multiply => {
                let (l, r) = Self::int_operands(op, lhs, rhs)?;
                Ok(Value::Int(match op {
                    BinaryOp::Add => l + r,
                    _ => l * r,
                }))
            }
            BinaryOp::Lt | BinaryOp::LtEq | BinaryOp::Gt | BinaryOp::GtEq => {
                let (l, r) = Self::int_operands(op, lhs, rhs)?;
                Ok(Value::Bool(match op {
                    BinaryOp::Lt => l < r,
                    BinaryOp::LtEq => l <= r,
                    BinaryOp::Gt => l > r,
                    _ => l >= r,
                }))
            }
            BinaryOp::Eq | BinaryOp::NotEq => {
                let equal = match (&lhs, &rhs) {
                    (Value::Int(l), Value::Int(r)) => l == r,
                    (Value::Text(l), Value::Text(r)) => l == r,
                    (Value::Bool(_), _) | (_, Value::Bool(_)) => {
                        return Err(EmberError::TypeError(format!(
                            "operands of '{}' must be values, not conditions",
                            op.symbol()
                        )));
                    }
                    // mismatched kinds never compare equal
                    _ => false,
                };
                Ok(Value::Bool(if op == BinaryOp::Eq { equal } else { !equal }))
            }
            BinaryOp::And | BinaryOp::Or => match (lhs, rhs) {
                (Value::Bool(l), Value::Bool(r)) => Ok(Value::Bool(if op == BinaryOp::And {
                    l && r
                } else {
                    l || r
                })),
                _ => Err(EmberError::TypeError(format!(
                    "operands of '{}' must be boolean",
                    op.symbol()
                ))),
            },
        }
    }

    fn int_operands(op: BinaryOp, lhs: Value, rhs: Value) -> Result<(i64, i64), EmberError> {
        match (lhs, rhs) {
            (Value::Int(l), Value::Int(r)) => Ok((l, r)),
            _ => Err(EmberError::TypeError(format!(
                "operands of '{}' must be integers",
                op.symbol()
            ))),
        }
    }

    /// Evaluate as a predicate; a non-boolean result is a type error.
    pub fn eval_predicate(
        &self,
        tuple: &Tuple,
        mapping: &SchemaMapping,
    ) -> Result<bool, EmberError> {
        match self.evaluate(tuple, mapping)? {
            Value::Bool(b) => Ok(b),
            _ => Err(EmberError::TypeError(format!(
                "expression did not evaluate to a boolean: {}",
                self
            ))),
        }
    }

    /// Evaluate as an integer; a non-integer result is a type error.
    pub fn eval_int(&self, tuple: &Tuple, mapping: &SchemaMapping) -> Result<i64, EmberError> {
        match self.evaluate(tuple, mapping)? {
            Value::Int(i) => Ok(i),
            _ => Err(EmberError::TypeError(format!(
                "expression did not evaluate to an integer: {}",
                self
            ))),
        }
    }

    /// Collect every column name referenced by this expression.
    pub fn columns(&self) -> HashSet<String> {
        let mut out = HashSet::new();
        self.collect_columns(&mut out);
        out
    }

    fn collect_columns(&self, out: &mut HashSet<String>) {
        match self {
            Expression::Literal(_) => {}
            Expression::Column(name) => {
                out.insert(name.clone());
            }
            Expression::Binary { left, right, .. } => {
                left.collect_columns(out);
                right.collect_columns(out);
            }
        }
    }

    /// Collect the table names referenced by qualified columns.
    pub fn tables(&self) -> BTreeSet<String> {
        self.columns()
            .iter()
            .filter_map(|c| c.find('.').map(|dot| c[..dot].to_string()))
            .collect()
    }

    /// Split over conjunctions into atomic predicates.
    ///
    /// Only AND is decomposed; disjunctions and every other combinator stay
    /// a single atom.
    pub fn flatten_conjuncts(self) -> Vec<Expression> {
        match self {
            Expression::Binary {
                op: BinaryOp::And,
                left,
                right,
            } => {
                let mut atoms = left.flatten_conjuncts();
                atoms.extend(right.flatten_conjuncts());
                atoms
            }
            other => vec![other],
        }
    }

    /// Conjoin a list of atoms back into one predicate.
    pub fn conjoin(atoms: Vec<Expression>) -> Option<Expression> {
        let mut iter = atoms.into_iter();
        let first = iter.next()?;
        Some(iter.fold(first, |acc, atom| Expression::Binary {
            op: BinaryOp::And,
            left: Box::new(acc),
            right: Box::new(atom),
        }))
    }

    /// Check that every referenced column resolves in the given mapping.
    ///
    /// Raised at operator construction so that a bad reference surfaces as
    /// a plan error, not per-tuple.
    pub fn validate(&self, mapping: &SchemaMapping) -> Result<(), EmberError> {
        for col in self.columns() {
            if !mapping.contains(&col) {
                return Err(EmberError::PlanError(format!(
                    "column {} not found in schema mapping",
                    col
                )));
            }
        }
        Ok(())
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Literal(i) => write!(f, "{}", i),
            Expression::Column(name) => write!(f, "{}", name),
            Expression::Binary { op, left, right } => {
                write!(f, "{} {} {}", left, op.symbol(), right)
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::testutil::int_vec_to_tuple;

    fn mapping() -> SchemaMapping {
        SchemaMapping::new(vec![String::from("R.A"), String::from("R.B")])
    }

    fn col(name: &str) -> Expression {
        Expression::Column(String::from(name))
    }

    fn bin(op: BinaryOp, left: Expression, right: Expression) -> Expression {
        Expression::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    #[test]
    fn test_arithmetic() {
        let t = int_vec_to_tuple(vec![3, 4]);
        let e = bin(
            BinaryOp::Add,
            col("R.A"),
            bin(BinaryOp::Multiply, col("R.B"), Expression::Literal(2)),
        );
        assert_eq!(e.evaluate(&t, &mapping()).unwrap(), Value::Int(11));
    }

    #[test]
    fn test_comparisons() {
        let t = int_vec_to_tuple(vec![3, 4]);
        let m = mapping();
        assert!(bin(BinaryOp::Lt, col("R.A"), col("R.B"))
            .eval_predicate(&t, &m)
            .unwrap());
        assert!(!bin(BinaryOp::GtEq, col("R.A"), col("R.B"))
            .eval_predicate(&t, &m)
            .unwrap());
        assert!(bin(BinaryOp::NotEq, col("R.A"), col("R.B"))
            .eval_predicate(&t, &m)
            .unwrap());
    }

    #[test]
    fn test_text_equality() {
        let m = SchemaMapping::new(vec![String::from("R.A"), String::from("R.B")]);
        let t = Tuple::new(vec![
            Field::Text(String::from("x")),
            Field::Text(String::from("x")),
        ]);
        assert!(bin(BinaryOp::Eq, col("R.A"), col("R.B"))
            .eval_predicate(&t, &m)
            .unwrap());
        // ordered comparison on text is a type error
        let err = bin(BinaryOp::Lt, col("R.A"), col("R.B")).eval_predicate(&t, &m);
        assert!(matches!(err, Err(EmberError::TypeError(_))));
    }

    #[test]
    fn test_mixed_kinds_compare_unequal() {
        let m = mapping();
        let t = Tuple::new(vec![Field::Int(1), Field::Text(String::from("1x"))]);
        assert!(!bin(BinaryOp::Eq, col("R.A"), col("R.B"))
            .eval_predicate(&t, &m)
            .unwrap());
        assert!(bin(BinaryOp::NotEq, col("R.A"), col("R.B"))
            .eval_predicate(&t, &m)
            .unwrap());
    }

    #[test]
    fn test_and_or() {
        let t = int_vec_to_tuple(vec![3, 4]);
        let m = mapping();
        let lt = bin(BinaryOp::Lt, col("R.A"), col("R.B"));
        let gt = bin(BinaryOp::Gt, col("R.A"), col("R.B"));
        assert!(!bin(BinaryOp::And, lt.clone(), gt.clone())
            .eval_predicate(&t, &m)
            .unwrap());
        assert!(bin(BinaryOp::Or, lt, gt).eval_predicate(&t, &m).unwrap());
    }

    #[test]
    fn test_flatten_conjuncts() {
        let a = bin(BinaryOp::Eq, col("R.A"), Expression::Literal(1));
        let b = bin(BinaryOp::Gt, col("R.B"), Expression::Literal(2));
        let c = bin(
            BinaryOp::Or,
            bin(BinaryOp::Eq, col("R.A"), Expression::Literal(3)),
            bin(BinaryOp::Eq, col("R.B"), Expression::Literal(4)),
        );
        let conj = bin(BinaryOp::And, bin(BinaryOp::And, a.clone(), b.clone()), c.clone());
        let atoms = conj.flatten_conjuncts();
        assert_eq!(atoms, vec![a, b, c]);
    }

    #[test]
    fn test_conjoin_round_trip() {
        let a = bin(BinaryOp::Eq, col("R.A"), Expression::Literal(1));
        let b = bin(BinaryOp::Gt, col("R.B"), Expression::Literal(2));
        let joined = Expression::conjoin(vec![a.clone(), b.clone()]).unwrap();
        assert_eq!(joined.flatten_conjuncts(), vec![a, b]);
        assert!(Expression::conjoin(vec![]).is_none());
    }

    #[test]
    fn test_validate() {
        let m = mapping();
        assert!(bin(BinaryOp::Eq, col("R.A"), col("R.B")).validate(&m).is_ok());
        let err = bin(BinaryOp::Eq, col("R.A"), col("S.C")).validate(&m);
        assert!(matches!(err, Err(EmberError::PlanError(_))));
    }

    #[test]
    fn test_tables() {
        let e = bin(BinaryOp::Eq, col("R.A"), col("S.C"));
        let tables: Vec<String> = e.tables().into_iter().collect();
        assert_eq!(tables, vec![String::from("R"), String::from("S")]);
        assert!(col("LITERAL_SUM_0").tables().is_empty());
    }

    #[test]
    fn test_display() {
        let e = bin(
            BinaryOp::Gt,
            bin(BinaryOp::Multiply, col("R.A"), Expression::Literal(2)),
            Expression::Literal(10),
        );
        assert_eq!(e.to_string(), "R.A * 2 > 10");
    }
}

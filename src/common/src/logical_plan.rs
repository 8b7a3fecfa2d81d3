use crate::expression::Expression;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// A validated description of one SELECT query.
///
/// Produced by translate-and-validate, consumed by the physical planner.
/// Every column reference inside it is already fully qualified and known to
/// the catalog; the WHERE clause has been flattened over conjunctions into
/// atomic predicates.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SelectQuery {
    /// Tables in FROM-clause order; the join tree is built left-deep in
    /// exactly this order.
    pub tables: Vec<String>,
    /// Atomic predicates from the WHERE clause (and any JOIN ... ON
    /// conditions), in source order.
    pub predicates: Vec<Predicate>,
    /// The SELECT list.
    pub projection: Projection,
    /// GROUP BY column references, in source order.
    pub group_by: Vec<Expression>,
    /// ORDER BY keys, in source order.
    pub order_by: Vec<OrderKey>,
    /// Whether DISTINCT was specified.
    pub distinct: bool,
}

impl SelectQuery {
    /// Whether the query aggregates: any SUM item or a GROUP BY clause.
    pub fn has_aggregation(&self) -> bool {
        if !self.group_by.is_empty() {
            return true;
        }
        match &self.projection {
            Projection::Wildcard => false,
            Projection::List(items) => items.iter().any(|i| matches!(i, SelectExpr::Sum(_))),
        }
    }
}

impl fmt::Display for SelectQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string(self) {
            Ok(json) => write!(f, "{}", json),
            Err(_) => write!(f, "<unprintable query>"),
        }
    }
}

/// Projection identifiers.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub enum Projection {
    /// All columns of the joined relation.
    Wildcard,
    /// Ordered list of select items.
    List(Vec<SelectExpr>),
}

/// One item of the SELECT list.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub enum SelectExpr {
    /// A qualified column reference.
    Column(String),
    /// `SUM(expr)` with its inner expression.
    Sum(Expression),
}

impl SelectExpr {
    /// The name this item carries in the final output mapping: the column
    /// itself, or the `SUM(inner)` textual form.
    pub fn display_name(&self) -> String {
        match self {
            SelectExpr::Column(name) => name.clone(),
            SelectExpr::Sum(inner) => format!("SUM({})", inner),
        }
    }
}

/// One atomic predicate plus the set of tables it references.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Predicate {
    pub expr: Expression,
    /// Tables referenced by qualified columns in `expr`; drives pushdown
    /// and join attachment.
    pub tables: BTreeSet<String>,
}

impl Predicate {
    pub fn new(expr: Expression) -> Self {
        let tables = expr.tables();
        Self { expr, tables }
    }

    /// Whether every referenced table is in the given set.
    pub fn covered_by(&self, tables: &BTreeSet<String>) -> bool {
        self.tables.is_subset(tables)
    }
}

/// What an ORDER BY key refers to.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub enum OrderTarget {
    /// A plain column reference.
    Column(String),
    /// A `SUM(expr)` form, matched against the aggregate output.
    Sum(Expression),
}

/// One ORDER BY key.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct OrderKey {
    pub target: OrderTarget,
    /// Ascending unless DESC was given.
    pub ascending: bool,
}

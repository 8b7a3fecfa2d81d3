use crate::opiterator::{
    Aggregate, CsvScan, Distinct, Filter, Join, LiteralAppend, OpIterator, Project, Sort,
};
use common::catalog::Catalog;
use common::logical_plan::*;
use common::{EmberError, Expression, SchemaMapping};
use log::debug;
use std::collections::BTreeSet;

/// Builds the physical operator tree for one validated query.
///
/// The tree is assembled bottom-up: per-table scans with pushed-down
/// selections, a left-deep join chain in FROM order, then the aggregation
/// or streaming tail. At every step the current root's schema mapping
/// exactly describes the tuples it produces, so each construction step
/// resolves its column references against the mapping of the operator
/// directly beneath it.
pub struct Planner<'a> {
    catalog: &'a Catalog,
    query: &'a SelectQuery,
}

impl<'a> Planner<'a> {
    pub fn new(catalog: &'a Catalog, query: &'a SelectQuery) -> Self {
        Self { catalog, query }
    }

    /// Produce the root operator of the physical plan.
    pub fn plan(&self) -> Result<Box<dyn OpIterator>, EmberError> {
        debug!("planning: {}", self.query);
        let root = self.build_join_tree()?;
        if self.query.has_aggregation() {
            self.plan_aggregation(root)
        } else {
            self.plan_streaming(root)
        }
    }

    /// Scans, selection pushdown, and the left-deep join chain.
    ///
    /// Predicate atoms are claimed exactly once: atoms local to a table
    /// are conjoined into a Filter directly above its scan; while joining,
    /// every unclaimed atom whose table set is covered by the joined
    /// prefix is conjoined into that Join's condition. A two-table atom
    /// thus lands on its natural join and a wider atom on the deepest join
    /// that covers all its columns.
    fn build_join_tree(&self) -> Result<Box<dyn OpIterator>, EmberError> {
        let tables = &self.query.tables;
        if tables.is_empty() {
            return Err(EmberError::PlanError(String::from(
                "no table in FROM clause",
            )));
        }

        let mut atoms: Vec<Option<Predicate>> =
            self.query.predicates.iter().cloned().map(Some).collect();

        let mut covered = BTreeSet::new();
        covered.insert(tables[0].clone());
        let mut current = self.scan_with_selection(&tables[0], &mut atoms)?;

        for table in &tables[1..] {
            let right = self.scan_with_selection(table, &mut atoms)?;
            covered.insert(table.clone());
            let join_condition = Expression::conjoin(Self::take_covered(&mut atoms, &covered));
            current = Box::new(Join::new(join_condition, current, right)?);
        }

        // every predicate references FROM tables only, so the last join
        // (or the single table's filter) has claimed them all
        debug_assert!(atoms.iter().all(|a| a.is_none()));
        Ok(current)
    }

    /// A scan of `table` wrapped in a Filter for its local atoms, if any.
    fn scan_with_selection(
        &self,
        table: &str,
        atoms: &mut Vec<Option<Predicate>>,
    ) -> Result<Box<dyn OpIterator>, EmberError> {
        let scan: Box<dyn OpIterator> = Box::new(CsvScan::new(self.catalog, table)?);
        let mut local = BTreeSet::new();
        local.insert(table.to_string());
        let local_atoms = Self::take_covered(atoms, &local);
        match Expression::conjoin(local_atoms) {
            Some(predicate) => {
                debug!("pushing selection onto {}: {}", table, predicate);
                Ok(Box::new(Filter::new(predicate, scan)?))
            }
            None => Ok(scan),
        }
    }

    /// Remove and return the unclaimed atoms covered by the given tables.
    fn take_covered(
        atoms: &mut Vec<Option<Predicate>>,
        covered: &BTreeSet<String>,
    ) -> Vec<Expression> {
        let mut taken = Vec::new();
        for slot in atoms.iter_mut() {
            let is_covered = match slot {
                Some(p) => p.covered_by(covered),
                None => false,
            };
            if is_covered {
                if let Some(p) = slot.take() {
                    taken.push(p.expr);
                }
            }
        }
        taken
    }

    /// Tail of a query without aggregation: projection (retaining ORDER BY
    /// columns that the select list dropped), DISTINCT, sort, and a final
    /// trim back to the select list when retention added columns.
    fn plan_streaming(
        &self,
        root: Box<dyn OpIterator>,
    ) -> Result<Box<dyn OpIterator>, EmberError> {
        let items = match &self.query.projection {
            Projection::Wildcard => {
                let mut root = root;
                if self.query.distinct {
                    root = Box::new(Distinct::new(root));
                }
                return self.attach_sort(root);
            }
            Projection::List(items) => items,
        };

        let select_columns: Vec<String> = items.iter().map(|i| i.display_name()).collect();
        let mut kept = select_columns.clone();
        for key in &self.query.order_by {
            if let OrderTarget::Column(name) = &key.target {
                if !kept.contains(name) {
                    debug!("retaining order-by column {} through projection", name);
                    kept.push(name.clone());
                }
            }
        }

        let mut root: Box<dyn OpIterator> = Box::new(Project::new(&kept, root)?);
        if self.query.distinct {
            root = Box::new(Distinct::new(root));
        }
        let mut root = self.attach_sort(root)?;
        if kept.len() != select_columns.len() {
            root = Box::new(Project::new(&select_columns, root)?);
        }
        Ok(root)
    }

    /// Tail of an aggregated query: literal-SUM rewrite, the Aggregate,
    /// a projection from the synthetic names back to display names,
    /// duplicate elimination for grouped queries, and the sort.
    fn plan_aggregation(
        &self,
        root: Box<dyn OpIterator>,
    ) -> Result<Box<dyn OpIterator>, EmberError> {
        let items = match &self.query.projection {
            Projection::List(items) => items,
            Projection::Wildcard => {
                return Err(EmberError::PlanError(String::from(
                    "* cannot be combined with aggregation",
                )));
            }
        };

        // Rewrite SUM(k) into a reference to an appended constant column,
        // keeping the uniform evaluate-against-a-tuple contract inside the
        // aggregation.
        let mut sums = Vec::new();
        let mut literals: Vec<(String, i64)> = Vec::new();
        for item in items {
            if let SelectExpr::Sum(inner) = item {
                sums.push(match inner {
                    Expression::Literal(k) => {
                        let alias = format!("LITERAL_SUM_{}", literals.len());
                        literals.push((alias.clone(), *k));
                        Expression::Column(alias)
                    }
                    other => other.clone(),
                });
            }
        }

        let mut root = root;
        if !literals.is_empty() {
            debug!("appending literal sum columns: {:?}", literals);
            root = Box::new(LiteralAppend::new(literals, root));
        }
        let group_count = self.query.group_by.len();
        root = Box::new(Aggregate::new(self.query.group_by.clone(), sums, root)?);

        // Project the synthetic aggregate columns into select-list order,
        // renamed to what the query called them, so ORDER BY can resolve
        // group columns by their original names and sums by SUM(inner).
        let mut columns = Vec::new();
        let mut aliases = Vec::new();
        let mut sum_idx = 0;
        for item in items {
            match item {
                SelectExpr::Column(name) => {
                    let pos = self
                        .query
                        .group_by
                        .iter()
                        .position(|g| matches!(g, Expression::Column(n) if n == name))
                        .ok_or_else(|| {
                            EmberError::PlanError(format!(
                                "column {} must be part of an aggregate or GROUP BY",
                                name
                            ))
                        })?;
                    columns.push(Aggregate::group_label(pos, group_count));
                    aliases.push(name.clone());
                }
                SelectExpr::Sum(_) => {
                    columns.push(format!("SUM_{}", sum_idx));
                    sum_idx += 1;
                    aliases.push(item.display_name());
                }
            }
        }

        let mut root: Box<dyn OpIterator> =
            Box::new(Project::new_with_aliases(&columns, &aliases, root)?);
        if group_count > 0 {
            // projection may collapse otherwise-distinct groups
            root = Box::new(Distinct::new(root));
        }
        self.attach_sort(root)
    }

    /// Wrap the root in a Sort when ORDER BY is present.
    fn attach_sort(&self, root: Box<dyn OpIterator>) -> Result<Box<dyn OpIterator>, EmberError> {
        if self.query.order_by.is_empty() {
            return Ok(root);
        }
        let mut keys = Vec::new();
        for key in &self.query.order_by {
            let column = match &key.target {
                OrderTarget::Column(name) => {
                    if !root.schema().contains(name) {
                        return Err(EmberError::PlanError(format!(
                            "order by column {} not found in schema mapping",
                            name
                        )));
                    }
                    name.clone()
                }
                OrderTarget::Sum(inner) => Self::resolve_sum_key(root.schema(), inner)?,
            };
            keys.push((column, key.ascending));
        }
        Ok(Box::new(Sort::new(&keys, root)?))
    }

    /// Match a `SUM(expr)` ORDER BY key against the aggregate output,
    /// case-insensitively on the inner expression's textual form.
    fn resolve_sum_key(
        mapping: &SchemaMapping,
        inner: &Expression,
    ) -> Result<String, EmberError> {
        let needle = inner.to_string();
        for col in mapping.columns() {
            if col.len() > 5 && col[..4].eq_ignore_ascii_case("SUM(") && col.ends_with(')') {
                let col_inner = col[4..col.len() - 1].trim();
                if col_inner.eq_ignore_ascii_case(needle.trim()) {
                    return Ok(col.clone());
                }
            }
        }
        Err(EmberError::PlanError(format!(
            "ORDER BY SUM({}) does not match any aggregate in the select list",
            needle
        )))
    }
}

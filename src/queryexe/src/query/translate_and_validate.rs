use common::catalog::Catalog;
use common::logical_plan::*;
use common::{BinaryOp, EmberError, Expression};
use log::debug;
use sqlparser::ast::{
    BinaryOperator, Expr, Function, JoinConstraint, JoinOperator, ObjectName, OrderByExpr, Query,
    Select, SelectItem, SetExpr, TableFactor, UnaryOperator, Value,
};
use std::collections::HashSet;

/// Retrieve the single name from a parser object name.
///
/// # Argument
///
/// * `name` - Name object from the SQL parser.
fn get_name(name: &ObjectName) -> Result<String, EmberError> {
    if name.0.len() > 1 {
        Err(EmberError::ParseError(String::from(
            "no multi-part names supported",
        )))
    } else {
        Ok(name.0[0].to_string())
    }
}

/// Translates a parsed SELECT into a validated [`SelectQuery`].
///
/// Validates every table and column reference against the catalog,
/// qualifies unqualified columns through the FROM tables, and flattens the
/// WHERE clause over conjunctions into atomic predicates.
pub struct TranslateAndValidate<'a> {
    /// Catalog to validate the translations.
    catalog: &'a Catalog,
    /// Tables encountered in the FROM clause, in order. Used for field
    /// disambiguation.
    tables: Vec<String>,
}

impl<'a> TranslateAndValidate<'a> {
    fn new(catalog: &'a Catalog) -> Self {
        Self {
            catalog,
            tables: Vec::new(),
        }
    }

    /// Translates a sqlparser query to a SelectQuery.
    ///
    /// # Arguments
    ///
    /// * `query` - AST to translate.
    /// * `catalog` - Catalog for validation.
    pub fn from_sql(query: &Query, catalog: &Catalog) -> Result<SelectQuery, EmberError> {
        let mut translator = TranslateAndValidate::new(catalog);
        translator.process_query(query)
    }

    fn process_query(&mut self, query: &Query) -> Result<SelectQuery, EmberError> {
        if !query.ctes.is_empty() {
            return Err(EmberError::ParseError(String::from(
                "WITH clauses not supported",
            )));
        }
        if query.limit.is_some() || query.offset.is_some() || query.fetch.is_some() {
            return Err(EmberError::ParseError(String::from(
                "LIMIT/OFFSET not supported",
            )));
        }
        match &query.body {
            SetExpr::Select(b) => self.process_select(&*b, &query.order_by),
            SetExpr::Query(_) => Err(EmberError::ParseError(String::from(
                "nested queries not supported",
            ))),
            SetExpr::SetOperation { .. } => Err(EmberError::ParseError(String::from(
                "set operations not supported",
            ))),
            SetExpr::Values(_) => Err(EmberError::ParseError(String::from(
                "VALUES not supported",
            ))),
        }
    }

    fn process_select(
        &mut self,
        select: &Select,
        order_by: &[OrderByExpr],
    ) -> Result<SelectQuery, EmberError> {
        if select.having.is_some() {
            return Err(EmberError::ParseError(String::from("HAVING not supported")));
        }

        // Register every FROM table before translating any expression, so
        // unqualified columns disambiguate against the full table list.
        let mut on_conditions = Vec::new();
        if select.from.is_empty() {
            return Err(EmberError::ParseError(String::from(
                "no table in FROM clause",
            )));
        }
        for table_with_joins in &select.from {
            self.process_table_factor(&table_with_joins.relation)?;
            for join in &table_with_joins.joins {
                self.process_table_factor(&join.relation)?;
                match &join.join_operator {
                    JoinOperator::Inner(JoinConstraint::On(expr)) => {
                        on_conditions.push(expr);
                    }
                    _ => {
                        return Err(EmberError::ParseError(String::from(
                            "unsupported join type",
                        )));
                    }
                }
            }
        }

        // WHERE and ON conditions, flattened over AND into atoms.
        let mut predicates = Vec::new();
        if let Some(expr) = &select.selection {
            for atom in self.process_expression(expr)?.flatten_conjuncts() {
                predicates.push(Predicate::new(atom));
            }
        }
        for expr in on_conditions {
            for atom in self.process_expression(expr)?.flatten_conjuncts() {
                predicates.push(Predicate::new(atom));
            }
        }

        // SELECT list.
        let mut items = Vec::new();
        let mut wildcard = false;
        for item in &select.projection {
            match item {
                SelectItem::Wildcard => {
                    if select.projection.len() > 1 {
                        return Err(EmberError::ParseError(String::from(
                            "cannot select wildcard and expressions in the same select",
                        )));
                    }
                    wildcard = true;
                }
                SelectItem::UnnamedExpr(expr) => items.push(self.process_select_item(expr)?),
                SelectItem::ExprWithAlias { .. } => {
                    return Err(EmberError::ParseError(String::from(
                        "select aliases not supported",
                    )));
                }
                SelectItem::QualifiedWildcard(_) => {
                    return Err(EmberError::ParseError(String::from(
                        "qualified wildcard not supported",
                    )));
                }
            }
        }

        // GROUP BY columns.
        let mut group_by = Vec::new();
        for expr in &select.group_by {
            match expr {
                Expr::Identifier(_) | Expr::CompoundIdentifier(_) => {
                    group_by.push(self.process_expression(expr)?);
                }
                _ => {
                    return Err(EmberError::ParseError(String::from(
                        "GROUP BY supports only column references",
                    )));
                }
            }
        }

        // With aggregation, every plain select column must be grouped on;
        // otherwise the projected value per group would be arbitrary.
        let has_sum = items.iter().any(|i| matches!(i, SelectExpr::Sum(_)));
        if has_sum || !group_by.is_empty() {
            if wildcard {
                return Err(EmberError::PlanError(String::from(
                    "* cannot be combined with aggregation",
                )));
            }
            let group_set: HashSet<&str> = group_by
                .iter()
                .filter_map(|g| match g {
                    Expression::Column(n) => Some(n.as_str()),
                    _ => None,
                })
                .collect();
            for item in &items {
                if let SelectExpr::Column(name) = item {
                    if !group_set.contains(name.as_str()) {
                        return Err(EmberError::PlanError(format!(
                            "column {} must be part of an aggregate or GROUP BY",
                            name
                        )));
                    }
                }
            }
        }

        // ORDER BY keys.
        let mut order_keys = Vec::new();
        for obe in order_by {
            let target = match &obe.expr {
                Expr::Identifier(name) => {
                    OrderTarget::Column(self.disambiguate_name(&[name.value.as_str()])?)
                }
                Expr::CompoundIdentifier(names) => {
                    let parts: Vec<&str> = names.iter().map(|s| s.value.as_str()).collect();
                    OrderTarget::Column(self.disambiguate_name(&parts)?)
                }
                Expr::Function(f) => OrderTarget::Sum(self.process_sum(f)?),
                _ => {
                    return Err(EmberError::PlanError(format!(
                        "ORDER BY expression is not a column: {}",
                        obe.expr
                    )));
                }
            };
            order_keys.push(OrderKey {
                target,
                ascending: obe.asc.unwrap_or(true),
            });
        }

        // DISTINCT collapses rows after projection, so sorting on a column
        // that projection removed would be unanswerable.
        if select.distinct && !wildcard {
            let names: HashSet<String> = items.iter().map(|i| i.display_name()).collect();
            for key in &order_keys {
                if let OrderTarget::Column(name) = &key.target {
                    if !names.contains(name) {
                        return Err(EmberError::PlanError(format!(
                            "ORDER BY column {} must appear in the select list with DISTINCT",
                            name
                        )));
                    }
                }
            }
        }

        let projection = if wildcard {
            Projection::Wildcard
        } else {
            Projection::List(items)
        };
        let query = SelectQuery {
            tables: self.tables.clone(),
            predicates,
            projection,
            group_by,
            order_by: order_keys,
            distinct: select.distinct,
        };
        debug!("translated query: {}", query);
        Ok(query)
    }

    /// Validates one FROM item and records its table name.
    fn process_table_factor(&mut self, tf: &TableFactor) -> Result<(), EmberError> {
        match tf {
            TableFactor::Table { name, alias, .. } => {
                if alias.is_some() {
                    return Err(EmberError::ParseError(String::from(
                        "table aliases not supported",
                    )));
                }
                let name = get_name(name)?;
                if !self.catalog.is_valid_table(&name) {
                    return Err(EmberError::CatalogError(format!(
                        "table {} not found in schema",
                        name
                    )));
                }
                self.tables.push(name);
                Ok(())
            }
            _ => Err(EmberError::ParseError(String::from(
                "derived tables and nested joins not supported",
            ))),
        }
    }

    /// Given a column reference, figure out the table it belongs to.
    ///
    /// # Arguments
    ///
    /// * `parts` - Elements of a possibly multi-part identifier; `T.C`
    ///   arrives as `["T", "C"]`.
    ///
    /// # Returns
    ///
    /// The fully qualified `Table.Column` name.
    fn disambiguate_name(&self, parts: &[&str]) -> Result<String, EmberError> {
        let orig = parts.join(".");
        if parts.len() > 2 {
            return Err(EmberError::ParseError(format!(
                "no nested table names supported in field {}",
                orig
            )));
        }
        if parts.len() == 2 {
            if !self.tables.iter().any(|t| t == parts[0]) {
                return Err(EmberError::PlanError(format!(
                    "table {} is not listed in the query",
                    parts[0]
                )));
            }
            if self.catalog.is_valid_column(parts[0], parts[1]) {
                return Ok(orig);
            }
            return Err(EmberError::PlanError(format!(
                "the field {} is not present in tables listed in the query",
                orig
            )));
        }

        let mut field = None;
        for table in &self.tables {
            if self.catalog.is_valid_column(table, &orig) {
                if field.is_some() {
                    return Err(EmberError::PlanError(format!(
                        "the field {} could refer to more than one table listed in the query",
                        orig
                    )));
                }
                field = Some(format!("{}.{}", table, orig));
            }
        }

        field.ok_or_else(|| {
            EmberError::PlanError(format!(
                "the field {} is not present in tables listed in the query",
                orig
            ))
        })
    }

    /// Translates one SELECT item: a column reference or `SUM(expr)`.
    fn process_select_item(&self, expr: &Expr) -> Result<SelectExpr, EmberError> {
        match expr {
            Expr::Identifier(name) => Ok(SelectExpr::Column(
                self.disambiguate_name(&[name.value.as_str()])?,
            )),
            Expr::CompoundIdentifier(names) => {
                let parts: Vec<&str> = names.iter().map(|s| s.value.as_str()).collect();
                Ok(SelectExpr::Column(self.disambiguate_name(&parts)?))
            }
            Expr::Function(f) => Ok(SelectExpr::Sum(self.process_sum(f)?)),
            _ => Err(EmberError::ParseError(String::from(
                "unsupported select expression",
            ))),
        }
    }

    /// Validates a SUM call and translates its single argument.
    fn process_sum(&self, function: &Function) -> Result<Expression, EmberError> {
        let name = get_name(&function.name)?;
        if name.to_uppercase() != "SUM" {
            return Err(EmberError::ParseError(format!(
                "unsupported SQL function {}",
                name
            )));
        }
        if function.args.len() != 1 {
            return Err(EmberError::ParseError(format!(
                "wrong number of args in {} operation",
                name
            )));
        }
        self.process_expression(&function.args[0])
    }

    /// Converts a sqlparser expression to an [`Expression`], qualifying
    /// every column reference.
    fn process_expression(&self, expr: &Expr) -> Result<Expression, EmberError> {
        match expr {
            Expr::Identifier(name) => Ok(Expression::Column(
                self.disambiguate_name(&[name.value.as_str()])?,
            )),
            Expr::CompoundIdentifier(names) => {
                let parts: Vec<&str> = names.iter().map(|s| s.value.as_str()).collect();
                Ok(Expression::Column(self.disambiguate_name(&parts)?))
            }
            Expr::Value(value) => match value {
                Value::Number(s) => {
                    let i = s.parse::<i64>().map_err(|_| {
                        EmberError::ParseError(format!("unsupported literal {}", s))
                    })?;
                    Ok(Expression::Literal(i))
                }
                _ => Err(EmberError::ParseError(String::from(
                    "only integer literals are supported",
                ))),
            },
            Expr::UnaryOp {
                op: UnaryOperator::Minus,
                expr,
            } => match &**expr {
                Expr::Value(Value::Number(s)) => {
                    let i = s.parse::<i64>().map_err(|_| {
                        EmberError::ParseError(format!("unsupported literal -{}", s))
                    })?;
                    Ok(Expression::Literal(-i))
                }
                _ => Err(EmberError::ParseError(String::from(
                    "unary minus is supported on integer literals only",
                ))),
            },
            Expr::BinaryOp { left, op, right } => Ok(Expression::Binary {
                op: Self::binary_operator(op)?,
                left: Box::new(self.process_expression(left)?),
                right: Box::new(self.process_expression(right)?),
            }),
            Expr::Nested(inner) => self.process_expression(inner),
            _ => Err(EmberError::ParseError(format!(
                "unsupported expression: {}",
                expr
            ))),
        }
    }

    fn binary_operator(op: &BinaryOperator) -> Result<BinaryOp, EmberError> {
        match op {
            BinaryOperator::Plus => Ok(BinaryOp::Add),
            BinaryOperator::Multiply => Ok(BinaryOp::Multiply),
            BinaryOperator::Eq => Ok(BinaryOp::Eq),
            BinaryOperator::NotEq => Ok(BinaryOp::NotEq),
            BinaryOperator::Gt => Ok(BinaryOp::Gt),
            BinaryOperator::Lt => Ok(BinaryOp::Lt),
            BinaryOperator::GtEq => Ok(BinaryOp::GtEq),
            BinaryOperator::LtEq => Ok(BinaryOp::LtEq),
            BinaryOperator::And => Ok(BinaryOp::And),
            BinaryOperator::Or => Ok(BinaryOp::Or),
            _ => Err(EmberError::ParseError(String::from(
                "unsupported binary operation",
            ))),
        }
    }
}

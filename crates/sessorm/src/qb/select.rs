//! SELECT statement builder.

use crate::error::{OrmError, OrmResult};
use crate::ident::{quote_identifier, quote_segment, quote_table, table_alias};
use crate::qb::clause::ClauseInput;
use crate::qb::expr::Predicate;
use crate::qb::join::{JoinRegistry, join_methods, qualify_column};
use crate::qb::traits::{BuiltQuery, Statement, Step, run_pipeline};
use crate::value::Value;

/// SELECT builder.
///
/// Pipeline: columns + FROM, FORCE INDEX, JOIN, WHERE, GROUP BY, HAVING,
/// ORDER BY, LIMIT, OFFSET, tail.
#[derive(Clone, Debug, Default)]
pub struct SelectBuilder {
    table: String,
    quantifier: Option<String>,
    force_index: Option<String>,
    columns: Vec<String>,
    /// `(expression, alias)` pairs rendered as `expression AS alias`
    computed: Vec<(String, String)>,
    joins: JoinRegistry,
    where_tree: Predicate,
    group: Vec<String>,
    having_tree: Predicate,
    order: Vec<String>,
    limit: Option<i64>,
    offset: Option<i64>,
    tail: Option<String>,
}

const SELECT_STEPS: &[Step<SelectBuilder>] = &[
    SelectBuilder::step_columns,
    SelectBuilder::step_force_index,
    SelectBuilder::step_joins,
    SelectBuilder::step_where,
    SelectBuilder::step_group,
    SelectBuilder::step_having,
    SelectBuilder::step_order,
    SelectBuilder::step_limit,
    SelectBuilder::step_offset,
    SelectBuilder::step_tail,
];

impl SelectBuilder {
    /// Create a SELECT for `table` (`"name"`, `"name AS alias"` or `"name alias"`).
    pub fn new(table: &str) -> Self {
        Self {
            table: table.to_string(),
            ..Self::default()
        }
    }

    pub fn table(mut self, table: &str) -> Self {
        self.table = table.to_string();
        self
    }

    // ==================== SELECT columns ====================

    /// Set a select quantifier such as `DISTINCT`.
    pub fn quantifier(mut self, quantifier: &str) -> Self {
        let quantifier = quantifier.trim();
        self.quantifier = (!quantifier.is_empty()).then(|| quantifier.to_string());
        self
    }

    pub fn distinct(self) -> Self {
        self.quantifier("DISTINCT")
    }

    /// Replace the column list. Unqualified columns are qualified with the table alias.
    pub fn columns(mut self, cols: &[&str]) -> Self {
        self.columns = cols.iter().map(|c| c.to_string()).collect();
        self
    }

    /// Append one column.
    pub fn add_column(mut self, col: &str) -> Self {
        self.columns.push(col.to_string());
        self
    }

    /// Append a computed column rendered verbatim as `expression AS alias`.
    pub fn computed_column(mut self, expression: &str, alias: &str) -> Self {
        self.computed
            .push((expression.to_string(), alias.to_string()));
        self
    }

    pub fn force_index(mut self, index: &str) -> Self {
        let index = index.trim();
        self.force_index = (!index.is_empty()).then(|| index.to_string());
        self
    }

    // ==================== JOIN ====================

    join_methods!();

    // ==================== WHERE / HAVING ====================

    /// AND a shorthand, field map, [`Clause`](crate::qb::Clause) or [`Predicate`] into WHERE.
    pub fn filter(self, input: impl Into<ClauseInput>) -> Self {
        self.filter_with(input, Vec::new())
    }

    /// Like [`filter`](Self::filter) for templates and shorthands that bind values.
    pub fn filter_with(mut self, input: impl Into<ClauseInput>, values: Vec<Value>) -> Self {
        self.where_tree.merge(input.into().into_predicate(values));
        self
    }

    pub fn having(self, input: impl Into<ClauseInput>) -> Self {
        self.having_with(input, Vec::new())
    }

    pub fn having_with(mut self, input: impl Into<ClauseInput>, values: Vec<Value>) -> Self {
        self.having_tree.merge(input.into().into_predicate(values));
        self
    }

    // ==================== GROUP / ORDER ====================

    pub fn group_by(mut self, cols: &[&str]) -> Self {
        self.group = cols.iter().map(|c| c.to_string()).collect();
        self
    }

    /// Replace ORDER BY entries, each `ident [ASC|DESC]`.
    pub fn order_by(mut self, entries: &[&str]) -> Self {
        self.order = entries.iter().map(|e| e.to_string()).collect();
        self
    }

    pub fn add_order(mut self, entry: &str) -> Self {
        self.order.push(entry.to_string());
        self
    }

    // ==================== Pagination / tail ====================

    /// Set LIMIT; a negative value clears it.
    pub fn limit(mut self, n: i64) -> Self {
        self.limit = (n >= 0).then_some(n);
        self
    }

    /// Set OFFSET; a negative value clears it.
    pub fn offset(mut self, n: i64) -> Self {
        self.offset = (n >= 0).then_some(n);
        self
    }

    /// Raw text appended last, e.g. `FOR UPDATE`.
    pub fn tail(mut self, tail: &str) -> Self {
        let tail = tail.trim();
        self.tail = (!tail.is_empty()).then(|| tail.to_string());
        self
    }

    // ==================== Pipeline steps ====================

    fn step_columns(&self, _params: &mut Vec<Value>) -> OrmResult<String> {
        let alias = quote_segment(&table_alias(&self.table));
        let mut cols: Vec<String> = self
            .columns
            .iter()
            .map(|c| qualify_column(&alias, c))
            .collect();
        if cols.is_empty() && self.computed.is_empty() {
            cols.push(format!("{alias}.*"));
        }
        for join in self.joins.iter() {
            cols.extend(join.render_columns());
        }
        for (expression, name) in &self.computed {
            cols.push(format!("{expression} AS {}", quote_identifier(name)));
        }

        let mut sql = String::from("SELECT ");
        if let Some(q) = &self.quantifier {
            sql.push_str(q);
            sql.push(' ');
        }
        sql.push_str(&cols.join(", "));
        if !self.table.is_empty() {
            sql.push_str(" FROM ");
            sql.push_str(&quote_table(&self.table));
        }
        Ok(sql)
    }

    fn step_force_index(&self, _params: &mut Vec<Value>) -> OrmResult<String> {
        Ok(self
            .force_index
            .as_deref()
            .map(|idx| format!("FORCE INDEX ({})", quote_identifier(idx)))
            .unwrap_or_default())
    }

    fn step_joins(&self, _params: &mut Vec<Value>) -> OrmResult<String> {
        Ok(self.joins.render())
    }

    fn step_where(&self, params: &mut Vec<Value>) -> OrmResult<String> {
        self.where_tree.build_prefixed("WHERE", params)
    }

    fn step_group(&self, _params: &mut Vec<Value>) -> OrmResult<String> {
        if self.group.is_empty() {
            return Ok(String::new());
        }
        let cols: Vec<String> = self.group.iter().map(|g| quote_identifier(g)).collect();
        Ok(format!("GROUP BY {}", cols.join(", ")))
    }

    fn step_having(&self, params: &mut Vec<Value>) -> OrmResult<String> {
        self.having_tree.build_prefixed("HAVING", params)
    }

    fn step_order(&self, _params: &mut Vec<Value>) -> OrmResult<String> {
        if self.order.is_empty() {
            return Ok(String::new());
        }
        let entries = self
            .order
            .iter()
            .map(|entry| parse_order(entry))
            .collect::<OrmResult<Vec<_>>>()?;
        Ok(format!("ORDER BY {}", entries.join(", ")))
    }

    fn step_limit(&self, params: &mut Vec<Value>) -> OrmResult<String> {
        Ok(bind_count("LIMIT", self.limit, params))
    }

    fn step_offset(&self, params: &mut Vec<Value>) -> OrmResult<String> {
        Ok(bind_count("OFFSET", self.offset, params))
    }

    fn step_tail(&self, _params: &mut Vec<Value>) -> OrmResult<String> {
        Ok(self.tail.clone().unwrap_or_default())
    }
}

impl Statement for SelectBuilder {
    fn build(&self) -> OrmResult<BuiltQuery> {
        run_pipeline(self, SELECT_STEPS)
    }
}

fn bind_count(keyword: &str, n: Option<i64>, params: &mut Vec<Value>) -> String {
    match n {
        Some(n) => {
            params.push(Value::Int(n));
            format!("{keyword} ?")
        }
        None => String::new(),
    }
}

/// `"age desc"` -> `` `age` DESC ``; direction defaults to ASC.
fn parse_order(entry: &str) -> OrmResult<String> {
    let mut parts = entry.split_whitespace();
    let (Some(ident), direction, None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(OrmError::InvalidOrder(entry.to_string()));
    };
    let direction = match direction {
        None => "ASC",
        Some(d) if d.eq_ignore_ascii_case("asc") => "ASC",
        Some(d) if d.eq_ignore_ascii_case("desc") => "DESC",
        Some(_) => return Err(OrmError::InvalidOrder(entry.to_string())),
    };
    Ok(format!("{} {direction}", quote_identifier(ident)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_order_entries() {
        assert_eq!(parse_order("age DESC").unwrap(), "`age` DESC");
        assert_eq!(parse_order("score ").unwrap(), "`score` ASC");
        assert_eq!(parse_order("t.x asc").unwrap(), "`t`.`x` ASC");
        assert!(matches!(parse_order("we DASC"), Err(OrmError::InvalidOrder(_))));
        assert!(parse_order("a b c").is_err());
        assert!(parse_order("   ").is_err());
    }

    #[test]
    fn default_columns_use_alias() {
        let q = SelectBuilder::new("users AS u").build().unwrap();
        assert_eq!(q.sql, "SELECT `u`.* FROM `users` AS `u`");
        assert!(q.params.is_empty());
    }

    #[test]
    fn computed_columns_replace_default() {
        let q = SelectBuilder::new("tb")
            .computed_column("COUNT(`id`)", "c")
            .distinct()
            .build()
            .unwrap();
        assert_eq!(q.sql, "SELECT DISTINCT COUNT(`id`) AS `c` FROM `tb`");
    }

    #[test]
    fn force_index_position() {
        let q = SelectBuilder::new("tb")
            .force_index("idx_age")
            .filter_with("age", vec![Value::Int(3)])
            .build()
            .unwrap();
        assert_eq!(q.sql, "SELECT `tb`.* FROM `tb` FORCE INDEX (`idx_age`) WHERE `age`=?");
    }
}

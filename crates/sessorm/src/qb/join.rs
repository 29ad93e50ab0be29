//! Ordered JOIN registry shared by SELECT and UPDATE.

use crate::ident::{quote_dotted, quote_identifier, quote_segment, quote_table, table_alias};

/// JOIN flavour.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Outer,
    Left,
    Right,
    LeftOuter,
    RightOuter,
}

impl JoinKind {
    pub fn as_sql(self) -> &'static str {
        match self {
            JoinKind::Inner => "INNER",
            JoinKind::Outer => "OUTER",
            JoinKind::Left => "LEFT",
            JoinKind::Right => "RIGHT",
            JoinKind::LeftOuter => "LEFT OUTER",
            JoinKind::RightOuter => "RIGHT OUTER",
        }
    }
}

/// One registered join.
#[derive(Clone, Debug)]
pub struct JoinSpec {
    pub kind: JoinKind,
    pub target: String,
    /// Pre-quoted `` `a`.`x`=`b`.`y` `` condition.
    pub on: String,
    pub columns: Vec<String>,
}

impl JoinSpec {
    /// `<KIND> JOIN <target> ON <cond>`
    pub fn render(&self) -> String {
        format!(
            "{} JOIN {} ON {}",
            self.kind.as_sql(),
            quote_table(&self.target),
            self.on
        )
    }

    /// Output columns qualified with the join's alias.
    pub fn render_columns(&self) -> Vec<String> {
        let alias = quote_segment(&table_alias(&self.target));
        self.columns
            .iter()
            .map(|c| qualify_column(&alias, c))
            .collect()
    }
}

/// Qualify an unqualified column with `quoted_alias`; dotted columns are quoted as given.
pub(crate) fn qualify_column(quoted_alias: &str, column: &str) -> String {
    if column.contains('.') {
        quote_identifier(column)
    } else {
        format!("{quoted_alias}.{}", quote_identifier(column))
    }
}

#[derive(Clone, Debug, Default)]
pub struct JoinRegistry {
    joins: Vec<JoinSpec>,
}

impl JoinRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a join; each ON component is quoted and the pair joined with `=`.
    pub fn add<S: AsRef<str>>(&mut self, kind: JoinKind, target: &str, on: &[S], columns: &[&str]) {
        let on = on
            .iter()
            .map(|part| quote_dotted(part.as_ref().trim()))
            .collect::<Vec<_>>()
            .join("=");
        self.joins.push(JoinSpec {
            kind,
            target: target.to_string(),
            on,
            columns: columns.iter().map(|c| c.to_string()).collect(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.joins.is_empty()
    }

    pub fn len(&self) -> usize {
        self.joins.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &JoinSpec> {
        self.joins.iter()
    }

    /// All join fragments separated by single spaces, or `""`.
    pub fn render(&self) -> String {
        self.joins
            .iter()
            .map(JoinSpec::render)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Generates the six `*_join` methods on a consuming builder with a `joins` field.
macro_rules! join_methods {
    () => {
        /// Add INNER JOIN.
        pub fn inner_join<S: AsRef<str>>(mut self, target: &str, on: &[S], columns: &[&str]) -> Self {
            self.joins.add($crate::qb::JoinKind::Inner, target, on, columns);
            self
        }

        /// Add OUTER JOIN.
        pub fn outer_join<S: AsRef<str>>(mut self, target: &str, on: &[S], columns: &[&str]) -> Self {
            self.joins.add($crate::qb::JoinKind::Outer, target, on, columns);
            self
        }

        /// Add LEFT JOIN.
        pub fn left_join<S: AsRef<str>>(mut self, target: &str, on: &[S], columns: &[&str]) -> Self {
            self.joins.add($crate::qb::JoinKind::Left, target, on, columns);
            self
        }

        /// Add RIGHT JOIN.
        pub fn right_join<S: AsRef<str>>(mut self, target: &str, on: &[S], columns: &[&str]) -> Self {
            self.joins.add($crate::qb::JoinKind::Right, target, on, columns);
            self
        }

        /// Add LEFT OUTER JOIN.
        pub fn left_outer_join<S: AsRef<str>>(
            mut self,
            target: &str,
            on: &[S],
            columns: &[&str],
        ) -> Self {
            self.joins.add($crate::qb::JoinKind::LeftOuter, target, on, columns);
            self
        }

        /// Add RIGHT OUTER JOIN.
        pub fn right_outer_join<S: AsRef<str>>(
            mut self,
            target: &str,
            on: &[S],
            columns: &[&str],
        ) -> Self {
            self.joins.add($crate::qb::JoinKind::RightOuter, target, on, columns);
            self
        }
    };
}

pub(crate) use join_methods;

//! Relational expressions
//!
//! A [`Select`] is one query scope. Nesting happens through
//! [`Source::Subquery`], which is how a view is derived from another view:
//! the parent's expression becomes the `FROM` of the child's.

use serde::{Deserialize, Serialize};

/// One SELECT scope: source, projection, predicate, grouping, ordering and window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Select {
    pub from: Source,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub distinct: bool,

    pub projection: Vec<SelectItem>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<Predicate>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub group_by: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub order_by: Vec<SortKey>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<u64>,
}

/// Where a scope reads its rows from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Source {
    Table { name: String },
    Subquery { select: Box<Select> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SelectItem {
    Wildcard,
    Column { name: String },
    Aliased { expr: Expr, alias: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortKey {
    pub column: String,
    pub ascending: bool,
}

/// Scalar and aggregate expressions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Expr {
    Column { name: String },
    Literal { value: Literal },
    /// Positional `?` placeholder, bound from the node's parameters
    Parameter,
    CountStar,
    Function { name: String, args: Vec<Expr> },
    Binary { op: BinOp, left: Box<Expr>, right: Box<Expr> },
    Cast { expr: Box<Expr>, to: String },
    Case { when: Box<Predicate>, then: Box<Expr> },
    /// `expr OVER ()`
    OverAll { expr: Box<Expr> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinOp {
    Mul,
    Div,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Predicate {
    Eq { left: Expr, right: Expr },
    IsNull { expr: Expr },
    /// A boolean-valued expression, e.g. `regexp_matches(col, ?)`
    Holds { expr: Expr },
    All { terms: Vec<Predicate> },
    Any { terms: Vec<Predicate> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum Literal {
    Null,
    Bool(bool),
    Int(i64),
    /// Unsigned values above `i64::MAX`, e.g. from UBIGINT columns
    UInt(u64),
    Float(f64),
    Text(String),
}

impl Literal {
    /// Column-name form of a value, used to alias pivoted columns.
    pub fn label(&self) -> String {
        match self {
            Literal::Null => "NaN".to_string(),
            Literal::Bool(b) => b.to_string(),
            Literal::Int(i) => i.to_string(),
            Literal::UInt(u) => u.to_string(),
            Literal::Float(f) => f.to_string(),
            Literal::Text(s) => s.clone(),
        }
    }
}

impl From<&serde_json::Value> for Literal {
    fn from(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Literal::Null,
            serde_json::Value::Bool(b) => Literal::Bool(*b),
            serde_json::Value::Number(n) => match (n.as_i64(), n.as_u64()) {
                (Some(i), _) => Literal::Int(i),
                (None, Some(u)) => Literal::UInt(u),
                (None, None) => Literal::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Literal::Text(s.clone()),
            other => Literal::Text(other.to_string()),
        }
    }
}

impl Expr {
    pub fn column(name: impl Into<String>) -> Self {
        Expr::Column { name: name.into() }
    }

    pub fn literal(value: Literal) -> Self {
        Expr::Literal { value }
    }

    pub fn text(value: impl Into<String>) -> Self {
        Expr::Literal {
            value: Literal::Text(value.into()),
        }
    }

    pub fn int(value: i64) -> Self {
        Expr::Literal {
            value: Literal::Int(value),
        }
    }

    pub fn call(name: impl Into<String>, args: Vec<Expr>) -> Self {
        Expr::Function {
            name: name.into(),
            args,
        }
    }

    pub fn mul(self, rhs: Expr) -> Self {
        Expr::Binary {
            op: BinOp::Mul,
            left: Box::new(self),
            right: Box::new(rhs),
        }
    }

    pub fn div(self, rhs: Expr) -> Self {
        Expr::Binary {
            op: BinOp::Div,
            left: Box::new(self),
            right: Box::new(rhs),
        }
    }

    pub fn cast(self, to: impl Into<String>) -> Self {
        Expr::Cast {
            expr: Box::new(self),
            to: to.into(),
        }
    }

    pub fn over_all(self) -> Self {
        Expr::OverAll {
            expr: Box::new(self),
        }
    }

    pub fn alias(self, alias: impl Into<String>) -> SelectItem {
        SelectItem::Aliased {
            expr: self,
            alias: alias.into(),
        }
    }

    /// `self = value`, or `self IS NULL` when there is no value
    pub fn equals(self, value: Option<&str>) -> Predicate {
        match value {
            Some(v) => Predicate::Eq {
                left: self,
                right: Expr::text(v),
            },
            None => Predicate::IsNull { expr: self },
        }
    }

    /// Same as [`Expr::equals`] for an arbitrary literal
    pub fn equals_literal(self, value: &Literal) -> Predicate {
        match value {
            Literal::Null => Predicate::IsNull { expr: self },
            v => Predicate::Eq {
                left: self,
                right: Expr::literal(v.clone()),
            },
        }
    }
}

impl Predicate {
    pub fn and(self, other: Predicate) -> Predicate {
        match self {
            Predicate::All { mut terms } => {
                terms.push(other);
                Predicate::All { terms }
            }
            first => Predicate::All {
                terms: vec![first, other],
            },
        }
    }
}

impl SelectItem {
    pub fn column(name: impl Into<String>) -> Self {
        SelectItem::Column { name: name.into() }
    }
}

impl Select {
    /// `SELECT * FROM "table"`
    pub fn from_table(name: impl Into<String>) -> Self {
        Self::scope(Source::Table { name: name.into() })
    }

    /// `SELECT * FROM (inner)`
    pub fn wrap(inner: Select) -> Self {
        Self::scope(Source::Subquery {
            select: Box::new(inner),
        })
    }

    fn scope(from: Source) -> Self {
        Self {
            from,
            distinct: false,
            projection: vec![SelectItem::Wildcard],
            filter: None,
            group_by: Vec::new(),
            order_by: Vec::new(),
            limit: None,
            offset: None,
        }
    }

    pub fn project(mut self, items: Vec<SelectItem>) -> Self {
        self.projection = items;
        self
    }

    /// Project the named columns, or `*` when `None`.
    pub fn columns(self, names: Option<&[String]>) -> Self {
        match names {
            None => self.project(vec![SelectItem::Wildcard]),
            Some(names) => self.project(names.iter().map(SelectItem::column).collect()),
        }
    }

    /// AND `predicate` into the scope's WHERE clause.
    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.filter = Some(match self.filter.take() {
            Some(existing) => existing.and(predicate),
            None => predicate,
        });
        self
    }

    pub fn group_by(mut self, keys: &[String]) -> Self {
        self.group_by.extend(keys.iter().cloned());
        self
    }

    pub fn order_by(mut self, column: impl Into<String>, ascending: bool) -> Self {
        self.order_by.push(SortKey {
            column: column.into(),
            ascending,
        });
        self
    }

    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    /// Slice `[offset, offset + limit)` off this scope, keeping its ordering.
    pub fn window(&self, offset: u64, limit: u64) -> Self {
        let mut sliced = self.clone();
        sliced.offset = Some(offset);
        sliced.limit = Some(limit);
        sliced
    }

    /// Number of `?` placeholders in this scope and every nested scope.
    pub fn placeholder_count(&self) -> usize {
        crate::lower::lower(self).placeholders
    }
}

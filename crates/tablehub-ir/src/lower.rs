//! Lowering of [`Select`] trees to DuckDB SQL
//!
//! Identifiers are always quoted and escaped in place; only [`Expr::Parameter`]
//! produces a `?`. The same tree always lowers to the same text.

use std::fmt::Write;

use crate::expr::{BinOp, Expr, Literal, Predicate, Select, SelectItem, Source};

/// SQL text plus the number of positional placeholders it contains.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lowered {
    pub sql: String,
    pub placeholders: usize,
}

pub fn lower(select: &Select) -> Lowered {
    let mut lowerer = Lowerer::default();
    lowerer.select(select);
    Lowered {
        sql: lowerer.sql,
        placeholders: lowerer.placeholders,
    }
}

/// Quote an identifier, doubling embedded quotes.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Quote a string literal, doubling embedded single quotes.
pub fn quote_text(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

#[derive(Default)]
struct Lowerer {
    sql: String,
    placeholders: usize,
}

impl Lowerer {
    fn push(&mut self, s: &str) {
        self.sql.push_str(s);
    }

    fn select(&mut self, select: &Select) {
        self.push("SELECT ");
        if select.distinct {
            self.push("DISTINCT ");
        }

        for (i, item) in select.projection.iter().enumerate() {
            if i > 0 {
                self.push(",");
            }
            self.item(item);
        }

        self.push(" FROM ");
        match &select.from {
            Source::Table { name } => self.push(&quote_ident(name)),
            Source::Subquery { select: inner } => {
                self.push("(");
                self.select(inner);
                self.push(")");
            }
        }

        if let Some(predicate) = &select.filter {
            self.push(" WHERE ");
            self.predicate(predicate);
        }

        if !select.group_by.is_empty() {
            let keys: Vec<String> = select.group_by.iter().map(|k| quote_ident(k)).collect();
            self.push(" GROUP BY ");
            self.push(&keys.join(","));
        }

        if !select.order_by.is_empty() {
            let keys: Vec<String> = select
                .order_by
                .iter()
                .map(|k| {
                    let dir = if k.ascending { "ASC" } else { "DESC" };
                    format!("{} {}", quote_ident(&k.column), dir)
                })
                .collect();
            self.push(" ORDER BY ");
            self.push(&keys.join(","));
        }

        if let Some(limit) = select.limit {
            let _ = write!(self.sql, " LIMIT {limit}");
        }
        if let Some(offset) = select.offset {
            let _ = write!(self.sql, " OFFSET {offset}");
        }
    }

    fn item(&mut self, item: &SelectItem) {
        match item {
            SelectItem::Wildcard => self.push("*"),
            SelectItem::Column { name } => self.push(&quote_ident(name)),
            SelectItem::Aliased { expr, alias } => {
                self.expr(expr);
                self.push(" AS ");
                self.push(&quote_ident(alias));
            }
        }
    }

    fn expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Column { name } => self.push(&quote_ident(name)),
            Expr::Literal { value } => self.literal(value),
            Expr::Parameter => {
                self.placeholders += 1;
                self.push("?");
            }
            Expr::CountStar => self.push("COUNT(*)"),
            Expr::Function { name, args } => {
                self.push(name);
                self.push("(");
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        self.push(",");
                    }
                    self.expr(arg);
                }
                self.push(")");
            }
            Expr::Binary { op, left, right } => {
                let op = match op {
                    BinOp::Mul => "*",
                    BinOp::Div => "/",
                };
                self.push("(");
                self.expr(left);
                self.push(op);
                self.expr(right);
                self.push(")");
            }
            Expr::Cast { expr, to } => {
                self.push("CAST(");
                self.expr(expr);
                self.push(" AS ");
                self.push(to);
                self.push(")");
            }
            Expr::Case { when, then } => {
                self.push("CASE WHEN ");
                self.predicate(when);
                self.push(" THEN ");
                self.expr(then);
                self.push(" END");
            }
            Expr::OverAll { expr } => {
                self.expr(expr);
                self.push(" OVER ()");
            }
        }
    }

    fn literal(&mut self, value: &Literal) {
        match value {
            Literal::Null => self.push("NULL"),
            Literal::Bool(true) => self.push("TRUE"),
            Literal::Bool(false) => self.push("FALSE"),
            Literal::Int(i) => {
                let _ = write!(self.sql, "{i}");
            }
            Literal::UInt(u) => {
                let _ = write!(self.sql, "{u}");
            }
            Literal::Float(f) if f.is_finite() => {
                let _ = write!(self.sql, "{f:?}");
            }
            Literal::Float(f) => {
                let _ = write!(self.sql, "CAST('{f}' AS DOUBLE)");
            }
            Literal::Text(s) => self.push(&quote_text(s)),
        }
    }

    fn predicate(&mut self, predicate: &Predicate) {
        match predicate {
            Predicate::Eq { left, right } => {
                self.expr(left);
                self.push("=");
                self.expr(right);
            }
            Predicate::IsNull { expr } => {
                self.expr(expr);
                self.push(" IS NULL");
            }
            Predicate::Holds { expr } => self.expr(expr),
            Predicate::All { terms } => self.junction(terms, " AND "),
            Predicate::Any { terms } => self.junction(terms, " OR "),
        }
    }

    fn junction(&mut self, terms: &[Predicate], sep: &str) {
        match terms {
            [] => self.push(if sep == " AND " { "TRUE" } else { "FALSE" }),
            [single] => self.predicate(single),
            _ => {
                self.push("(");
                for (i, term) in terms.iter().enumerate() {
                    if i > 0 {
                        self.push(sep);
                    }
                    self.predicate(term);
                }
                self.push(")");
            }
        }
    }
}

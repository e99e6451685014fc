//! Identifier parsing and dialect-specific quoting.
//!
//! [`Ident`] represents a (possibly dotted) SQL identifier. A [`Dialect`] quotes identifiers
//! and expands the `{{...}}` / `[[...]]` markers that raw SQL fragments may contain:
//!
//! - `{{table}}` is quoted with [`Dialect::wrap`]; a `%` inside the marker is stripped after
//!   quoting, so `{{%table}}` stays unquoted on every dialect.
//! - `[[column]]` is quoted with [`Dialect::wrap_single`].
//!
//! # Example
//! ```ignore
//! use dbal::{Dialect, PostgresDialect};
//!
//! let pg = PostgresDialect;
//! assert_eq!(pg.wrap("public.users"), r#""public"."users""#);
//! assert_eq!(pg.wrap_sql("SELECT [[id]] FROM {{users}}"), r#"SELECT "id" FROM "users""#);
//! ```

use std::fmt;
use std::sync::OnceLock;

use regex::{Captures, Regex};

use crate::error::{DbalError, DbalResult};

/// A part of a SQL identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentPart {
    /// Unquoted identifier: must match `[A-Za-z_][A-Za-z0-9_$]*`.
    Unquoted(String),
    /// Quoted identifier (`"..."` or `` `...` ``): any characters except NUL.
    Quoted(String),
    /// The `*` wildcard, only valid as the last part.
    Wildcard,
}

/// A SQL identifier (column, table, or schema name).
///
/// Supports dotted notation (`schema.table.column`), quoted parts (`"CamelCase".id`) and a
/// trailing wildcard (`users.*`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ident {
    pub parts: Vec<IdentPart>,
}

impl Ident {
    /// Parse an identifier string.
    pub fn parse(s: &str) -> DbalResult<Self> {
        if s.is_empty() {
            return Err(DbalError::invalid_argument("Identifier cannot be empty"));
        }
        if s.contains('\0') {
            return Err(DbalError::invalid_argument(
                "Identifier cannot contain NUL character",
            ));
        }

        let mut parts = Vec::new();
        let mut chars = s.chars().peekable();

        while chars.peek().is_some() {
            if !parts.is_empty() {
                match chars.next() {
                    Some('.') => {
                        if chars.peek().is_none() {
                            return Err(DbalError::invalid_argument("Trailing '.' in identifier"));
                        }
                    }
                    Some(c) => {
                        return Err(DbalError::invalid_argument(format!(
                            "Expected '.' between identifier parts, got '{c}'"
                        )));
                    }
                    None => break,
                }
            }

            if matches!(parts.last(), Some(IdentPart::Wildcard)) {
                return Err(DbalError::invalid_argument("'*' must be the last part"));
            }

            match chars.peek() {
                Some(&'*') => {
                    chars.next();
                    parts.push(IdentPart::Wildcard);
                    continue;
                }
                Some(&quote) if quote == '"' || quote == '`' => {
                    chars.next();
                    let mut name = String::new();
                    loop {
                        match chars.next() {
                            Some(c) if c == quote => {
                                // Doubled quote is an escaped quote.
                                if chars.peek() == Some(&quote) {
                                    chars.next();
                                    name.push(quote);
                                } else {
                                    break;
                                }
                            }
                            Some(c) => name.push(c),
                            None => {
                                return Err(DbalError::invalid_argument(
                                    "Unclosed quoted identifier",
                                ));
                            }
                        }
                    }
                    if name.is_empty() {
                        return Err(DbalError::invalid_argument("Empty quoted identifier"));
                    }
                    parts.push(IdentPart::Quoted(name));
                    continue;
                }
                _ => {}
            }

            let mut name = String::new();
            while let Some(&c) = chars.peek() {
                if c == '.' {
                    break;
                }
                let valid = if name.is_empty() {
                    c == '_' || c.is_ascii_alphabetic()
                } else {
                    c == '_' || c == '$' || c.is_ascii_alphanumeric()
                };
                if !valid {
                    return Err(DbalError::invalid_argument(format!(
                        "Invalid character in identifier: '{c}'"
                    )));
                }
                name.push(c);
                chars.next();
            }
            if name.is_empty() {
                return Err(DbalError::invalid_argument("Empty identifier segment"));
            }
            parts.push(IdentPart::Unquoted(name));
        }

        Ok(Self { parts })
    }

    /// Render the identifier with every named part quoted by `dialect`.
    pub fn render(&self, dialect: &(impl Dialect + ?Sized)) -> String {
        let mut out = String::new();
        for (i, part) in self.parts.iter().enumerate() {
            if i > 0 {
                out.push('.');
            }
            match part {
                IdentPart::Unquoted(s) | IdentPart::Quoted(s) => {
                    out.push_str(&dialect.wrap_single(s))
                }
                IdentPart::Wildcard => out.push('*'),
            }
        }
        out
    }
}

fn marker_re() -> &'static Regex {
    static MARKER_RE: OnceLock<Regex> = OnceLock::new();
    MARKER_RE.get_or_init(|| {
        Regex::new(r"\{\{(%?[^{}]+%?)\}\}|\[\[([^\[\]]+)\]\]")
            .expect("invalid built-in marker regex")
    })
}

/// Identifier-quoting capability of a SQL dialect.
///
/// Only [`Dialect::wrap_single`] is dialect-specific; the dotted-name and marker handling
/// is shared.
pub trait Dialect: Send + Sync + fmt::Debug {
    /// Quote a single identifier part.
    fn wrap_single(&self, name: &str) -> String;

    /// Quote a possibly dotted identifier.
    ///
    /// Anything that does not parse as an identifier (function calls, expressions, `a b`)
    /// is returned unchanged.
    fn wrap(&self, name: &str) -> String {
        match Ident::parse(name) {
            Ok(ident) => ident.render(self),
            Err(_) => name.to_string(),
        }
    }

    /// Expand `{{...}}` and `[[...]]` identifier markers in raw SQL.
    fn wrap_sql(&self, sql: &str) -> String {
        marker_re()
            .replace_all(sql, |caps: &Captures<'_>| match caps.get(2) {
                Some(column) => self.wrap_single(column.as_str()),
                None => self.wrap(&caps[1]).replace('%', ""),
            })
            .into_owned()
    }
}

/// Dialect that never quotes. Markers are still expanded.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainDialect;

impl Dialect for PlainDialect {
    fn wrap_single(&self, name: &str) -> String {
        name.to_string()
    }
}

/// PostgreSQL / ANSI double-quote quoting.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresDialect;

impl Dialect for PostgresDialect {
    fn wrap_single(&self, name: &str) -> String {
        if name == "*" {
            return name.to_string();
        }
        format!("\"{}\"", name.replace('"', "\"\""))
    }
}

/// MySQL backtick quoting.
#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlDialect;

impl Dialect for MySqlDialect {
    fn wrap_single(&self, name: &str) -> String {
        if name == "*" {
            return name.to_string();
        }
        format!("`{}`", name.replace('`', "``"))
    }
}

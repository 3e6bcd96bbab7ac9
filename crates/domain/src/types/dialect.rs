//! Database dialect value type

use std::fmt;

use serde::{Deserialize, Serialize};

/// A database engine's SQL dialect, identified by its lowercase name.
///
/// The raw name is preserved for display and for the external services; the
/// [`family`](Dialect::family) is what type tables and quoting rules key on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Dialect(String);

impl Dialect {
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(name.as_ref().trim().to_ascii_lowercase())
    }

    pub fn name(&self) -> &str {
        &self.0
    }

    /// Normalised family name. MariaDB shares MySQL's type system.
    pub fn family(&self) -> &str {
        match self.0.as_str() {
            "maria" | "mariadb" | "mysql" => "mysql",
            "postgresql" | "pg" | "postgres" => "postgres",
            "dm" | "dameng" => "dameng",
            "kingbasees" | "kingbase" => "kingbase",
            other => other,
        }
    }

    pub fn is_mysql_family(&self) -> bool {
        self.family() == "mysql"
    }

    /// Quote a single identifier, escaping embedded quote characters.
    pub fn quote_ident(&self, ident: &str) -> String {
        if self.is_mysql_family() {
            format!("`{}`", ident.replace('`', "``"))
        } else {
            format!("\"{}\"", ident.replace('"', "\"\""))
        }
    }

    /// Quote a possibly schema-qualified table name part by part.
    pub fn quote_table(&self, table: &str) -> String {
        table.split('.').map(|part| self.quote_ident(part.trim())).collect::<Vec<_>>().join(".")
    }

    /// Type used when a value is cast to text before masking.
    pub fn text_type(&self) -> &'static str {
        if self.is_mysql_family() {
            "CHAR"
        } else {
            "VARCHAR"
        }
    }

    /// Expression converting epoch seconds to a timestamp.
    pub fn epoch_to_timestamp(&self, expr: &str) -> String {
        if self.is_mysql_family() {
            format!("FROM_UNIXTIME({expr})")
        } else {
            format!("TO_TIMESTAMP({expr})")
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Dialect {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Whether a column type takes a `(length[,precision])` suffix.
pub fn type_accepts_length(type_name: &str) -> bool {
    matches!(
        bare_type_name(type_name).as_str(),
        "CHAR"
            | "VARCHAR"
            | "VARCHAR2"
            | "NCHAR"
            | "NVARCHAR"
            | "NVARCHAR2"
            | "CHARACTER"
            | "BPCHAR"
            | "DECIMAL"
            | "NUMERIC"
            | "NUMBER"
            | "DEC"
            | "BINARY"
            | "VARBINARY"
    )
}

/// Whether a column type stores numbers (epoch-second increment fields).
pub fn is_numeric_type(type_name: &str) -> bool {
    matches!(
        bare_type_name(type_name).as_str(),
        "TINYINT"
            | "SMALLINT"
            | "MEDIUMINT"
            | "INT"
            | "INTEGER"
            | "BIGINT"
            | "INT2"
            | "INT4"
            | "INT8"
            | "NUMBER"
            | "NUMERIC"
            | "DECIMAL"
            | "DEC"
    )
}

/// Upper-cased type name without any inline parameter list.
///
/// `varchar(255)` becomes `VARCHAR`, `timestamp(6) with time zone` becomes
/// `TIMESTAMP WITH TIME ZONE`.
pub fn bare_type_name(type_name: &str) -> String {
    let upper = type_name.trim().to_ascii_uppercase();
    match (upper.find('('), upper.find(')')) {
        (Some(open), Some(close)) if close > open => {
            let mut bare = String::with_capacity(upper.len());
            bare.push_str(upper[..open].trim_end());
            let rest = upper[close + 1..].trim();
            if !rest.is_empty() {
                bare.push(' ');
                bare.push_str(rest);
            }
            bare
        }
        _ => upper,
    }
}

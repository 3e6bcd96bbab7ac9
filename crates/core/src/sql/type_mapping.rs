//! Cross-dialect column type resolution
//!
//! Resolution order: the type-mapping service's index-aligned vector call,
//! then its connector dictionary, then the built-in table for dialect pairs
//! known natively. A type missing from the chosen dictionary is an error.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use datapush_domain::{
    bare_type_name, DataPushError, Dialect, ResolvedColumnType, Result, SourceColumnType,
};
use lazy_static::lazy_static;
use tracing::{debug, warn};

use crate::push::ports::TypeMappingService;

lazy_static! {
    /// Built-in mappings keyed by `"<source family>-<target family>"`.
    static ref STATIC_TYPE_TABLE: HashMap<&'static str, HashMap<&'static str, &'static str>> = {
        let mut table = HashMap::new();
        table.insert(
            "mysql-postgres",
            HashMap::from([
                ("TINYINT", "INT2"),
                ("SMALLINT", "INT2"),
                ("MEDIUMINT", "INT4"),
                ("INT", "INT4"),
                ("INTEGER", "INT4"),
                ("BIGINT", "INT8"),
                ("FLOAT", "FLOAT4"),
                ("DOUBLE", "FLOAT8"),
                ("DECIMAL", "NUMERIC"),
                ("CHAR", "BPCHAR"),
                ("VARCHAR", "VARCHAR"),
                ("TEXT", "TEXT"),
                ("LONGTEXT", "TEXT"),
                ("DATE", "DATE"),
                ("TIME", "TIME"),
                ("DATETIME", "TIMESTAMP"),
                ("TIMESTAMP", "TIMESTAMP"),
                ("BLOB", "BYTEA"),
                ("JSON", "JSON"),
                ("BIT", "BOOL"),
            ]),
        );
        table.insert(
            "postgres-mysql",
            HashMap::from([
                ("INT2", "SMALLINT"),
                ("INT4", "INTEGER"),
                ("INT8", "BIGINT"),
                ("SMALLINT", "SMALLINT"),
                ("INTEGER", "INTEGER"),
                ("BIGINT", "BIGINT"),
                ("FLOAT4", "FLOAT"),
                ("FLOAT8", "DOUBLE"),
                ("NUMERIC", "DECIMAL"),
                ("BPCHAR", "CHAR"),
                ("VARCHAR", "VARCHAR"),
                ("TEXT", "TEXT"),
                ("BOOL", "TINYINT"),
                ("DATE", "DATE"),
                ("TIME", "TIME"),
                ("TIMESTAMP", "DATETIME"),
                ("TIMESTAMPTZ", "DATETIME"),
                ("BYTEA", "BLOB"),
                ("JSON", "JSON"),
                ("JSONB", "JSON"),
            ]),
        );
        table.insert(
            "dameng-mysql",
            HashMap::from([
                ("TINYINT", "TINYINT"),
                ("SMALLINT", "SMALLINT"),
                ("INT", "INT"),
                ("INT4", "INTEGER"),
                ("INTEGER", "INTEGER"),
                ("BIGINT", "BIGINT"),
                ("NUMBER", "DECIMAL"),
                ("DECIMAL", "DECIMAL"),
                ("DOUBLE", "DOUBLE"),
                ("CHAR", "CHAR"),
                ("VARCHAR", "VARCHAR"),
                ("VARCHAR2", "VARCHAR"),
                ("TEXT", "LONGTEXT"),
                ("CLOB", "LONGTEXT"),
                ("DATE", "DATE"),
                ("TIME", "TIME"),
                ("DATETIME", "DATETIME"),
                ("TIMESTAMP", "DATETIME"),
                ("BLOB", "LONGBLOB"),
            ]),
        );
        table.insert(
            "mysql-dameng",
            HashMap::from([
                ("TINYINT", "TINYINT"),
                ("SMALLINT", "SMALLINT"),
                ("INT", "INT"),
                ("INTEGER", "INTEGER"),
                ("BIGINT", "BIGINT"),
                ("DECIMAL", "DECIMAL"),
                ("DOUBLE", "DOUBLE"),
                ("CHAR", "CHAR"),
                ("VARCHAR", "VARCHAR"),
                ("TEXT", "TEXT"),
                ("LONGTEXT", "CLOB"),
                ("DATE", "DATE"),
                ("TIME", "TIME"),
                ("DATETIME", "TIMESTAMP"),
                ("TIMESTAMP", "TIMESTAMP"),
                ("BLOB", "BLOB"),
            ]),
        );
        table.insert(
            "postgres-dameng",
            HashMap::from([
                ("INT2", "SMALLINT"),
                ("INT4", "INTEGER"),
                ("INT8", "BIGINT"),
                ("NUMERIC", "DECIMAL"),
                ("FLOAT8", "DOUBLE"),
                ("BPCHAR", "CHAR"),
                ("VARCHAR", "VARCHAR"),
                ("TEXT", "TEXT"),
                ("DATE", "DATE"),
                ("TIMESTAMP", "TIMESTAMP"),
                ("BYTEA", "BLOB"),
            ]),
        );
        table.insert(
            "dameng-postgres",
            HashMap::from([
                ("SMALLINT", "INT2"),
                ("INT", "INT4"),
                ("INTEGER", "INT4"),
                ("BIGINT", "INT8"),
                ("NUMBER", "NUMERIC"),
                ("DECIMAL", "NUMERIC"),
                ("DOUBLE", "FLOAT8"),
                ("CHAR", "BPCHAR"),
                ("VARCHAR", "VARCHAR"),
                ("VARCHAR2", "VARCHAR"),
                ("CLOB", "TEXT"),
                ("DATE", "DATE"),
                ("TIMESTAMP", "TIMESTAMP"),
                ("BLOB", "BYTEA"),
            ]),
        );
        table
    };
}

/// Where a type dictionary came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MappingOrigin {
    /// Returned by the type mapping service.
    Service,
    /// Built from the target connector's configured mapping.
    ConnectorConfig,
    /// Built-in table for the dialect pair.
    StaticTable,
}

/// Upper-cased source type to target type dictionary for one dialect pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDictionary {
    source: Dialect,
    target: Dialect,
    origin: MappingOrigin,
    entries: HashMap<String, String>,
}

impl TypeDictionary {
    /// Dictionary with keys normalized to bare upper-cased type names.
    pub fn new(
        source: Dialect,
        target: Dialect,
        origin: MappingOrigin,
        entries: HashMap<String, String>,
    ) -> Self {
        let entries = entries.into_iter().map(|(k, v)| (bare_type_name(&k), v)).collect();
        Self { source, target, origin, entries }
    }

    pub fn origin(&self) -> MappingOrigin {
        self.origin
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Target type for `source_type`, looked up by bare upper-cased name.
    pub fn resolve(&self, source_type: &str) -> Result<&str> {
        self.entries.get(&bare_type_name(source_type)).map(String::as_str).ok_or_else(|| {
            DataPushError::TypeMapping(format!(
                "no type mapping for {source_type} from {} to {}",
                self.source, self.target
            ))
        })
    }
}

/// Build a dictionary from index-aligned service vectors.
///
/// Indices present on only one side are logged and skipped. When several
/// columns share a source type the lowest index wins, so the result depends
/// only on the inputs.
pub fn build_mapping(
    source: &[SourceColumnType],
    resolved: &[ResolvedColumnType],
) -> HashMap<String, String> {
    let by_index: BTreeMap<usize, &ResolvedColumnType> =
        resolved.iter().map(|r| (r.index, r)).collect();
    let mut sources: Vec<&SourceColumnType> = source.iter().collect();
    sources.sort_by_key(|s| s.index);

    let mut mapping = HashMap::new();
    for column in &sources {
        match by_index.get(&column.index) {
            Some(target) => {
                mapping
                    .entry(bare_type_name(&column.source_type))
                    .or_insert_with(|| target.target_type.trim().to_string());
            }
            None => warn!(
                index = column.index,
                source_type = %column.source_type,
                "type mapping response has no entry for index; skipping"
            ),
        }
    }
    for index in by_index.keys() {
        if !sources.iter().any(|s| s.index == *index) {
            warn!(index, "type mapping response carries unknown index; skipping");
        }
    }
    mapping
}

/// Look up the built-in table for a dialect pair.
pub fn static_mapping(source: &Dialect, target: &Dialect) -> HashMap<String, String> {
    let key = format!("{}-{}", source.family(), target.family());
    STATIC_TYPE_TABLE
        .get(key.as_str())
        .map(|types| types.iter().map(|(k, v)| ((*k).to_string(), (*v).to_string())).collect())
        .unwrap_or_default()
}

/// Resolves source-dialect column types to target-dialect types.
pub struct TypeMappingResolver {
    service: Arc<dyn TypeMappingService>,
}

impl TypeMappingResolver {
    /// Resolver backed by the remote type mapping service.
    pub fn new(service: Arc<dyn TypeMappingService>) -> Self {
        Self { service }
    }

    /// Resolve a single type against a prepared dictionary.
    pub fn resolve(dictionary: &TypeDictionary, source_type: &str) -> Result<String> {
        dictionary.resolve(source_type).map(str::to_string)
    }

    /// Build the dictionary used for one synthesis run.
    ///
    /// Service failures fall through to the next source and are not errors
    /// by themselves; an unknown dialect pair yields an empty dictionary.
    pub async fn dictionary(
        &self,
        source: &Dialect,
        target: &Dialect,
        columns: &[SourceColumnType],
    ) -> TypeDictionary {
        match self.service.map_types(source, target, columns).await {
            Ok(resolved) => {
                let mapping = build_mapping(columns, &resolved);
                if !mapping.is_empty() {
                    return TypeDictionary::new(
                        source.clone(),
                        target.clone(),
                        MappingOrigin::Service,
                        mapping,
                    );
                }
                debug!(%source, %target, "type mapping service returned no usable entries");
            }
            Err(err) => warn!(%source, %target, error = %err, "type mapping service call failed"),
        }

        match self.service.connector_dictionary(source, target).await {
            Ok(mapping) if !mapping.is_empty() => {
                return TypeDictionary::new(
                    source.clone(),
                    target.clone(),
                    MappingOrigin::ConnectorConfig,
                    mapping,
                );
            }
            Ok(_) => debug!(%source, %target, "connector dictionary is empty"),
            Err(err) => warn!(%source, %target, error = %err, "connector dictionary lookup failed"),
        }

        TypeDictionary::new(
            source.clone(),
            target.clone(),
            MappingOrigin::StaticTable,
            static_mapping(source, target),
        )
    }
}

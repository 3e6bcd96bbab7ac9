//! DDL/DML synthesis for push jobs
//!
//! Synthesis is all-or-nothing: validation, type resolution and masking
//! lookups happen before any statement is built, so a failure never yields
//! partial SQL.

use std::collections::{HashMap, HashSet};

use datapush_domain::constants::{DATETIME_FORMAT, EPOCH_HIGH_WATER_MARK};
use datapush_domain::{
    is_numeric_type, type_accepts_length, DataPushError, DesensitizationRule, Dialect, PushField,
    PushJob, Result, SourceColumnType, SynthesizedSql, TransmitMode,
};
use tracing::{debug, instrument};

use super::masking::MaskingRuleApplier;
use super::type_mapping::{TypeDictionary, TypeMappingResolver};

const SOURCE_ALIAS: &str = "src";
const TARGET_ALIAS: &str = "tgt";
const WATERMARK_ALIAS: &str = "hwm";

/// Statements plus the field list with resolved target types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Synthesis {
    /// Generated CREATE/INSERT/UPDATE statements
    pub sql: SynthesizedSql,
    /// Job fields in input order, `target_type` filled in
    pub fields: Vec<PushField>,
}

/// Builds the CREATE/INSERT/UPDATE statements of a push job.
pub struct SqlSynthesisEngine {
    resolver: TypeMappingResolver,
}

impl SqlSynthesisEngine {
    /// Engine resolving field types through `resolver`.
    pub fn new(resolver: TypeMappingResolver) -> Self {
        Self { resolver }
    }

    /// Validate the job, resolve every field type and build its statements.
    ///
    /// `rules` holds the masking rules referenced by the job's fields, keyed
    /// by rule id.
    #[instrument(skip(self, job, rules), fields(job_id = %job.id))]
    pub async fn synthesize(
        &self,
        job: &PushJob,
        rules: &HashMap<String, DesensitizationRule>,
    ) -> Result<Synthesis> {
        validate_fields(job)?;

        let columns: Vec<SourceColumnType> = job
            .fields
            .iter()
            .enumerate()
            .map(|(index, field)| SourceColumnType {
                index,
                source_type: field.source_type.clone(),
                precision: field.length,
                scale: field.precision,
            })
            .collect();
        let dictionary =
            self.resolver.dictionary(&job.source.dialect, &job.target.dialect, &columns).await;
        debug!(origin = ?dictionary.origin(), "type dictionary prepared");

        let fields = resolve_fields(&dictionary, &job.fields)?;
        let resolved = PushJob { fields, ..job.clone() };
        let sql = build_statements(&resolved, rules)?;
        Ok(Synthesis { sql, fields: resolved.fields })
    }
}

/// Primary-key rule: full-sync jobs need none; incremental jobs need at least
/// one, each naming a selected target field.
pub fn check_primary_key(
    mode: TransmitMode,
    primary_keys: &[String],
    fields: &[PushField],
) -> Result<()> {
    if mode == TransmitMode::Full {
        return Ok(());
    }
    if primary_keys.is_empty() {
        return Err(DataPushError::Validation(
            "incremental jobs require at least one primary key".to_string(),
        ));
    }
    for key in primary_keys {
        if !fields.iter().any(|f| f.target_name.eq_ignore_ascii_case(key)) {
            return Err(DataPushError::Validation(format!(
                "primary key {key} is not a selected target field"
            )));
        }
    }
    Ok(())
}

fn validate_fields(job: &PushJob) -> Result<()> {
    if job.fields.is_empty() {
        return Err(DataPushError::Validation("no fields selected".to_string()));
    }

    let mut seen = HashSet::new();
    for field in &job.fields {
        if !seen.insert(field.target_name.to_lowercase()) {
            return Err(DataPushError::Validation(format!(
                "duplicate target column {}",
                field.target_name
            )));
        }
    }

    check_primary_key(job.transmit_mode, &job.primary_keys, &job.fields)?;

    if job.transmit_mode == TransmitMode::Incremental {
        let name = job.increment_field.as_deref().map(str::trim).unwrap_or_default();
        if name.is_empty() {
            return Err(DataPushError::Validation(
                "incremental jobs require an increment field".to_string(),
            ));
        }
        if job.increment_source_field().is_none() {
            return Err(DataPushError::Validation(format!(
                "increment field {name} is not a selected source field"
            )));
        }
    }
    Ok(())
}

fn resolve_fields(dictionary: &TypeDictionary, fields: &[PushField]) -> Result<Vec<PushField>> {
    fields
        .iter()
        .map(|field| {
            let target_type = TypeMappingResolver::resolve(dictionary, &field.source_type)?;
            Ok(PushField { target_type, ..field.clone() })
        })
        .collect()
}

/// Build statements for a job whose fields already carry target types.
pub fn build_statements(
    job: &PushJob,
    rules: &HashMap<String, DesensitizationRule>,
) -> Result<SynthesizedSql> {
    let builder = StatementBuilder::new(job, rules)?;
    Ok(SynthesizedSql {
        create_sql: (!job.target.table_exists).then(|| builder.create_table()),
        insert_sql: builder.insert()?,
        update_sql: builder.update()?,
    })
}

struct StatementBuilder<'a> {
    job: &'a PushJob,
    dialect: &'a Dialect,
    target: String,
    source: String,
    /// Per field: masking rule to apply, if any.
    masks: Vec<Option<&'a DesensitizationRule>>,
    bound: String,
}

impl<'a> StatementBuilder<'a> {
    fn new(job: &'a PushJob, rules: &'a HashMap<String, DesensitizationRule>) -> Result<Self> {
        let masks = job
            .fields
            .iter()
            .map(|field| match field.masking_rule_id.as_deref() {
                Some(id) if job.masking_enabled && !id.is_empty() => {
                    rules.get(id).map(Some).ok_or_else(|| {
                        DataPushError::Validation(format!(
                            "unknown masking rule {id} on field {}",
                            field.target_name
                        ))
                    })
                }
                _ => Ok(None),
            })
            .collect::<Result<Vec<_>>>()?;

        let dialect = &job.target.dialect;
        let bound = job
            .high_water_mark
            .map(|hwm| hwm.format(DATETIME_FORMAT).to_string())
            .unwrap_or_else(|| EPOCH_HIGH_WATER_MARK.to_string());

        Ok(Self {
            job,
            dialect,
            target: dialect.quote_table(&job.target.table_name),
            source: dialect.quote_table(&job.source.table_name),
            masks,
            bound,
        })
    }

    fn is_incremental(&self) -> bool {
        self.job.transmit_mode == TransmitMode::Incremental
    }

    fn updates_existing(&self) -> bool {
        self.is_incremental() && self.job.update_existing
    }

    fn create_table(&self) -> String {
        let mut lines: Vec<String> = self
            .job
            .fields
            .iter()
            .map(|field| {
                let mut line =
                    format!("  {} {}", self.dialect.quote_ident(&field.target_name), column_type(field));
                if !field.nullable || self.is_primary_key(&field.target_name) {
                    line.push_str(" NOT NULL");
                }
                line
            })
            .collect();
        if !self.job.primary_keys.is_empty() {
            lines.push(format!("  PRIMARY KEY ({})", self.quoted_list(&self.job.primary_keys)));
        }
        format!("CREATE TABLE {} (\n{}\n)", self.target, lines.join(",\n"))
    }

    fn insert(&self) -> Result<String> {
        let verb = match self.job.transmit_mode {
            TransmitMode::Full => "INSERT OVERWRITE INTO",
            TransmitMode::Incremental => "INSERT INTO",
        };
        let columns: Vec<&str> = self.job.fields.iter().map(|f| f.target_name.as_str()).collect();
        let select = self
            .job
            .fields
            .iter()
            .zip(&self.masks)
            .map(|(field, mask)| {
                let raw = self.source_column(field);
                match mask {
                    Some(rule) => MaskingRuleApplier::new(self.dialect).render(
                        &raw,
                        &rule.method,
                        &field.target_name,
                    ),
                    None => Ok(format!(
                        "CAST({raw} AS {}) AS {}",
                        column_type(field),
                        self.dialect.quote_ident(&field.target_name)
                    )),
                }
            })
            .collect::<Result<Vec<_>>>()?;

        let mut sql = format!(
            "{verb} {} ({}) SELECT {} FROM {} {SOURCE_ALIAS}",
            self.target,
            self.quoted_list(&columns),
            select.join(", "),
            self.source
        );

        let mut conditions = Vec::new();
        if self.updates_existing() {
            sql.push_str(&format!(
                " LEFT JOIN {} {TARGET_ALIAS} ON {}",
                self.target,
                self.key_join(SOURCE_ALIAS, TARGET_ALIAS)
            ));
            if let Some(first) = self.job.primary_keys.first() {
                conditions
                    .push(format!("{TARGET_ALIAS}.{} IS NULL", self.dialect.quote_ident(first)));
            }
        }
        if let Some(filter) = self.filter() {
            conditions.push(format!("({filter})"));
        }
        if self.is_incremental() {
            let bound = if self.updates_existing() { self.dynamic_bound() } else { self.cast_bound() };
            conditions.push(format!("{} > {bound}", self.increment_expr(Some(SOURCE_ALIAS))));
        }
        if !conditions.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&conditions.join(" AND "));
        }
        Ok(sql)
    }

    /// In-place update of rows already in the target. MySQL has no
    /// `UPDATE ... FROM`, so it joins the changed rows instead and qualifies
    /// the assigned columns with the target table.
    fn update(&self) -> Result<Option<String>> {
        if !self.updates_existing() {
            return Ok(None);
        }
        let mysql = self.dialect.is_mysql_family();
        let assignments = self
            .job
            .fields
            .iter()
            .zip(&self.masks)
            .filter(|(field, _)| !self.is_primary_key(&field.target_name))
            .map(|(field, mask)| {
                let raw = self.source_column(field);
                let expr = match mask {
                    Some(rule) => {
                        MaskingRuleApplier::new(self.dialect).render_expr(&raw, &rule.method)?
                    }
                    None => format!("CAST({raw} AS {})", column_type(field)),
                };
                let column = self.dialect.quote_ident(&field.target_name);
                Ok(if mysql {
                    format!("{}.{column} = {expr}", self.target)
                } else {
                    format!("{column} = {expr}")
                })
            })
            .collect::<Result<Vec<_>>>()?;
        if assignments.is_empty() {
            return Ok(None);
        }

        let changed = format!(
            "(SELECT * FROM {} WHERE {} > {}) {SOURCE_ALIAS}",
            self.source,
            self.increment_expr(None),
            self.cast_bound()
        );
        let keys = self.key_join(SOURCE_ALIAS, &self.target);
        let sql = if mysql {
            format!(
                "UPDATE {} JOIN {changed} ON {keys} SET {}",
                self.target,
                assignments.join(", ")
            )
        } else {
            format!("UPDATE {} SET {} FROM {changed} WHERE {keys}", self.target, assignments.join(", "))
        };
        Ok(Some(sql))
    }

    fn filter(&self) -> Option<&str> {
        self.job.filter_condition.as_deref().map(str::trim).filter(|f| !f.is_empty())
    }

    fn cast_bound(&self) -> String {
        format!("cast('{}' as timestamp)", self.bound)
    }

    /// Bound raised to what the target already holds, so re-runs skip rows
    /// synced past the stored mark.
    fn dynamic_bound(&self) -> String {
        let column = self
            .job
            .increment_source_field()
            .map(|f| f.target_name.as_str())
            .unwrap_or_else(|| self.increment_name());
        let mut max = format!("MAX({WATERMARK_ALIAS}.{column})");
        if self.increment_is_numeric() {
            max = self.dialect.epoch_to_timestamp(&max);
        }
        let cast = self.cast_bound();
        format!(
            "(SELECT GREATEST(COALESCE({max}, {cast}), {cast}) FROM {} {WATERMARK_ALIAS})",
            self.target
        )
    }

    fn increment_name(&self) -> &str {
        self.job.increment_field.as_deref().map(str::trim).unwrap_or_default()
    }

    fn increment_is_numeric(&self) -> bool {
        self.job.increment_source_field().is_some_and(|f| is_numeric_type(&f.source_type))
    }

    /// Increment column, converted from epoch seconds when numeric.
    fn increment_expr(&self, alias: Option<&str>) -> String {
        let column = match alias {
            Some(alias) => format!("{alias}.{}", self.increment_name()),
            None => self.increment_name().to_string(),
        };
        if self.increment_is_numeric() {
            self.dialect.epoch_to_timestamp(&column)
        } else {
            column
        }
    }

    fn source_column(&self, field: &PushField) -> String {
        format!("{SOURCE_ALIAS}.{}", self.dialect.quote_ident(&field.source_name))
    }

    fn is_primary_key(&self, target_name: &str) -> bool {
        self.job.primary_keys.iter().any(|k| k.eq_ignore_ascii_case(target_name))
    }

    /// `<source alias>.<pk source column> = <target ref>.<pk>` for every key.
    fn key_join(&self, source_alias: &str, target_ref: &str) -> String {
        self.job
            .primary_keys
            .iter()
            .map(|key| {
                let source_name = self
                    .job
                    .fields
                    .iter()
                    .find(|f| f.target_name.eq_ignore_ascii_case(key))
                    .map_or(key.as_str(), |f| f.source_name.as_str());
                format!(
                    "{source_alias}.{} = {target_ref}.{}",
                    self.dialect.quote_ident(source_name),
                    self.dialect.quote_ident(key)
                )
            })
            .collect::<Vec<_>>()
            .join(" AND ")
    }

    fn quoted_list<S: AsRef<str>>(&self, names: &[S]) -> String {
        names.iter().map(|n| self.dialect.quote_ident(n.as_ref())).collect::<Vec<_>>().join(", ")
    }
}

/// Target type with its `(length[,precision])` suffix where the type takes one.
fn column_type(field: &PushField) -> String {
    let base = field.target_type.trim();
    if base.contains('(') || !type_accepts_length(base) {
        return base.to_string();
    }
    match (field.length, field.precision) {
        (Some(length), Some(precision)) => format!("{base}({length},{precision})"),
        (Some(length), None) => format!("{base}({length})"),
        _ => base.to_string(),
    }
}

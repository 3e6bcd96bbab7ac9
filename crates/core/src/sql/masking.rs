//! SQL rendering of desensitization rules
//!
//! Every expression casts the raw value to the dialect's text type first and
//! sticks to `LENGTH`, `SUBSTR`, `RPAD`, `FLOOR` and two-argument `CONCAT`, which
//! every supported engine provides.

use datapush_domain::{DataPushError, Dialect, MaskingMethod, Result};

const MASK_CHAR: char = '*';

/// Widest mask a rule may ask for. Rules come from the masking service and
/// are rejected above this.
pub const MAX_MASK_WIDTH: u32 = 255;

/// Renders masking rules as SQL expressions for one dialect.
#[derive(Debug, Clone)]
pub struct MaskingRuleApplier<'a> {
    dialect: &'a Dialect,
}

impl<'a> MaskingRuleApplier<'a> {
    /// Applier rendering for the target dialect.
    pub fn new(dialect: &'a Dialect) -> Self {
        Self { dialect }
    }

    /// `<masking expression> AS <quoted alias>`
    pub fn render(&self, column_expr: &str, method: &MaskingMethod, alias: &str) -> Result<String> {
        let expr = self.render_expr(column_expr, method)?;
        Ok(format!("{expr} AS {}", self.dialect.quote_ident(alias)))
    }

    /// Masking expression without an alias.
    pub fn render_expr(&self, column_expr: &str, method: &MaskingMethod) -> Result<String> {
        check_method(method)?;
        let value = format!("CAST({column_expr} AS {})", self.dialect.text_type());
        let len = format!("LENGTH({value})");
        let full = format!("RPAD('{MASK_CHAR}', {len}, '{MASK_CHAR}')");

        let expr = match method {
            MaskingMethod::All => full,
            MaskingMethod::Middle { middle_bits, min_length } => {
                let threshold = (*min_length).max(*middle_bits);
                let prefix_len = format!("FLOOR(({len} - {middle_bits}) / 2)");
                format!(
                    "CASE WHEN {len} < {threshold} THEN {full} ELSE CONCAT(CONCAT(SUBSTR({value}, 1, \
                     {prefix_len}), {stars}), SUBSTR({value}, {prefix_len} + {skip})) END",
                    stars = stars(*middle_bits),
                    skip = width_sum(*middle_bits, 1)?,
                )
            }
            MaskingMethod::HeadTail { head_bits, tail_bits } => {
                let threshold = width_sum(*head_bits, *tail_bits)?;
                format!(
                    "CASE WHEN {len} < {threshold} THEN {full} ELSE CONCAT(CONCAT({head}, \
                     SUBSTR({value}, {start}, {len} - {threshold})), {tail}) END",
                    head = stars(*head_bits),
                    tail = stars(*tail_bits),
                    start = width_sum(*head_bits, 1)?,
                )
            }
        };
        Ok(expr)
    }
}

/// Reject mask widths outside `0..=MAX_MASK_WIDTH`.
pub fn check_method(method: &MaskingMethod) -> Result<()> {
    let widths = match method {
        MaskingMethod::All => Vec::new(),
        MaskingMethod::Middle { middle_bits, .. } => vec![("middle", *middle_bits)],
        MaskingMethod::HeadTail { head_bits, tail_bits } => {
            vec![("head", *head_bits), ("tail", *tail_bits)]
        }
    };
    for (what, width) in widths {
        if width > MAX_MASK_WIDTH {
            return Err(DataPushError::Validation(format!(
                "masking {what} width {width} exceeds {MAX_MASK_WIDTH}"
            )));
        }
    }
    Ok(())
}

fn width_sum(a: u32, b: u32) -> Result<u32> {
    a.checked_add(b)
        .ok_or_else(|| DataPushError::Validation(format!("masking widths {a} + {b} overflow")))
}

/// Quoted literal of `n` mask characters.
fn stars(n: u32) -> String {
    let run: String = std::iter::repeat(MASK_CHAR).take(n as usize).collect();
    format!("'{run}'")
}

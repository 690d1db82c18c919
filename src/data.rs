use std::fmt;

use serde::{Deserialize, Serialize};

/// Tokens that load as a null cell, matching the usual spreadsheet/pandas
/// missing-value conventions.
pub const NA_TOKENS: &[&str] = &[
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

/// Largest magnitude below which every integral `f64` is exact (2^53).
const MAX_EXACT_FLOAT_INTEGER: f64 = 9_007_199_254_740_992.0;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Value {
    String(String),
    Integer(i64),
    Float(f64),
}

impl Value {
    pub fn as_display(&self) -> String {
        match self {
            Value::String(s) => s.clone(),
            Value::Integer(i) => i.to_string(),
            Value::Float(f) => {
                if f.fract() == 0.0 && f.abs() < MAX_EXACT_FLOAT_INTEGER {
                    (*f as i64).to_string()
                } else {
                    f.to_string()
                }
            }
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            Value::String(_) => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_display())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnType {
    String,
    Integer,
    Float,
}

impl ColumnType {
    pub fn is_text(&self) -> bool {
        matches!(self, ColumnType::String)
    }
}

pub fn is_na_token(raw: &str) -> bool {
    NA_TOKENS.contains(&raw)
}

/// Infers the narrowest type that accepts every non-null cell.
///
/// A column without any non-null cell is numeric, so it never takes part in
/// text comparisons. Digit strings too long for `i64` (20-digit LEIs, long
/// identifiers) keep the column as text rather than losing digits to `f64`.
pub fn infer_column_type<'a, I>(cells: I) -> ColumnType
where
    I: IntoIterator<Item = &'a str>,
{
    let mut integer = true;
    let mut float = true;
    for raw in cells.into_iter().filter(|raw| !is_na_token(raw)) {
        let trimmed = raw.trim();
        if integer && trimmed.parse::<i64>().is_err() {
            integer = false;
        }
        if float && (trimmed.parse::<f64>().is_err() || overflows_integer(trimmed)) {
            float = false;
        }
        if !integer && !float {
            return ColumnType::String;
        }
    }
    if integer {
        ColumnType::Integer
    } else {
        ColumnType::Float
    }
}

fn overflows_integer(raw: &str) -> bool {
    let digits = raw.strip_prefix(['+', '-']).unwrap_or(raw);
    !digits.is_empty()
        && digits.bytes().all(|b| b.is_ascii_digit())
        && raw.parse::<i64>().is_err()
}

pub fn parse_cell(raw: &str, ty: ColumnType) -> Option<Value> {
    if is_na_token(raw) {
        return None;
    }
    match ty {
        ColumnType::String => Some(Value::String(raw.to_string())),
        ColumnType::Integer => raw.trim().parse().ok().map(Value::Integer),
        ColumnType::Float => raw.trim().parse().ok().map(Value::Float),
    }
}

/// Display form of an optional cell; null renders as an empty string.
pub fn display_cell(value: Option<&Value>) -> String {
    value.map(Value::as_display).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn na_tokens_parse_as_null() {
        assert_eq!(parse_cell("", ColumnType::String), None);
        assert_eq!(parse_cell("N/A", ColumnType::String), None);
        assert_eq!(parse_cell("null", ColumnType::Integer), None);
        assert_eq!(
            parse_cell(" n/a ", ColumnType::String),
            Some(Value::String(" n/a ".to_string()))
        );
    }

    #[test]
    fn infer_column_type_prefers_integer_then_float() {
        assert_eq!(infer_column_type(["1", "0", ""]), ColumnType::Integer);
        assert_eq!(infer_column_type(["1", "2.5"]), ColumnType::Float);
        assert_eq!(infer_column_type(["1", "Dual Regulated"]), ColumnType::String);
        assert_eq!(infer_column_type(["", "NA"]), ColumnType::Float);
    }

    #[test]
    fn float_display_drops_integral_fraction() {
        assert_eq!(Value::Float(123.0).as_display(), "123");
        assert_eq!(Value::Float(-3.0).as_display(), "-3");
        assert_eq!(Value::Float(1.5).as_display(), "1.5");
        assert_eq!(display_cell(None), "");
    }

    #[test]
    fn large_integral_floats_do_not_saturate() {
        assert_eq!(Value::Float(1e19).as_display(), "10000000000000000000");
        assert_eq!(Value::Float(2e19).as_display(), "20000000000000000000");
        assert_ne!(Value::Float(1e19).as_display(), Value::Float(2e19).as_display());
    }

    #[test]
    fn digit_strings_beyond_i64_stay_text() {
        assert_eq!(
            infer_column_type(["12345678901234567890", ""]),
            ColumnType::String
        );
        assert_eq!(
            infer_column_type(["1", "99999999999999999999"]),
            ColumnType::String
        );
        assert_eq!(infer_column_type(["1e19", "2.5"]), ColumnType::Float);
        assert_eq!(infer_column_type(["2.5", "3"]), ColumnType::Float);
        assert_eq!(
            parse_cell("12345678901234567890", ColumnType::String).map(|v| v.as_display()),
            Some("12345678901234567890".to_string())
        );
    }
}

//! Query parameters and canonical cache-key computation.
//!
//! A cache key is a BLAKE3 digest over the query text and the parameter
//! entries in key order. `QueryParams` is a BTreeMap, so iteration order is
//! canonical for free, and a missing parameter set hashes identically to an
//! explicit empty one.

use std::collections::BTreeMap;

/// A single bound parameter value.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl ParamValue {
    /// Render as a SQL literal, for engines without native parameter binding.
    pub fn to_sql_literal(&self) -> String {
        match self {
            ParamValue::Null => "NULL".to_string(),
            ParamValue::Bool(true) => "TRUE".to_string(),
            ParamValue::Bool(false) => "FALSE".to_string(),
            ParamValue::Int(i) => i.to_string(),
            ParamValue::Float(f) => {
                // Keep a decimal point so the literal stays a float in SQL
                if f.fract() == 0.0 && f.is_finite() {
                    format!("{f:.1}")
                } else {
                    f.to_string()
                }
            }
            ParamValue::Text(s) => format!("'{}'", s.replace('\'', "''")),
        }
    }

    /// Infer a value from CLI-style text: int, float, bool, null, else text.
    pub fn infer(text: &str) -> ParamValue {
        match text {
            "null" | "NULL" => return ParamValue::Null,
            "true" | "TRUE" => return ParamValue::Bool(true),
            "false" | "FALSE" => return ParamValue::Bool(false),
            _ => {}
        }
        if let Ok(i) = text.parse::<i64>() {
            return ParamValue::Int(i);
        }
        if let Ok(f) = text.parse::<f64>() {
            return ParamValue::Float(f);
        }
        ParamValue::Text(text.to_string())
    }

    /// Feed a canonical encoding into the hasher: a type tag, then the value
    /// bytes. Text and names are length-prefixed so boundaries are unambiguous.
    fn hash_into(&self, hasher: &mut blake3::Hasher) {
        match self {
            ParamValue::Null => {
                hasher.update(b"n");
            }
            ParamValue::Bool(b) => {
                hasher.update(b"b");
                hasher.update(&[*b as u8]);
            }
            ParamValue::Int(i) => {
                hasher.update(b"i");
                hasher.update(&i.to_le_bytes());
            }
            ParamValue::Float(f) => {
                hasher.update(b"f");
                hasher.update(&f.to_bits().to_le_bytes());
            }
            ParamValue::Text(s) => {
                hasher.update(b"t");
                hasher.update(&(s.len() as u64).to_le_bytes());
                hasher.update(s.as_bytes());
            }
        }
    }
}

/// Bound parameters for one query, canonically ordered by name.
pub type QueryParams = BTreeMap<String, ParamValue>;

/// Cache key: 32-byte BLAKE3 digest of query text + canonical parameters.
pub type CacheKey = [u8; 32];

/// Compute the deterministic cache key for a query and its parameters.
pub fn cache_key(query: &str, params: Option<&QueryParams>) -> CacheKey {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&(query.len() as u64).to_le_bytes());
    hasher.update(query.as_bytes());

    if let Some(params) = params {
        for (name, value) in params {
            hasher.update(&(name.len() as u64).to_le_bytes());
            hasher.update(name.as_bytes());
            value.hash_into(&mut hasher);
        }
    }

    *hasher.finalize().as_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(entries: &[(&str, ParamValue)]) -> QueryParams {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn missing_params_equals_empty_params() {
        let q = "SELECT * FROM bars";
        let empty = QueryParams::new();
        assert_eq!(cache_key(q, None), cache_key(q, Some(&empty)));
    }

    #[test]
    fn key_is_order_independent() {
        let q = "SELECT * FROM bars WHERE symbol = $sym AND close > $min";
        let mut a = QueryParams::new();
        a.insert("sym".into(), ParamValue::Text("SPY".into()));
        a.insert("min".into(), ParamValue::Float(100.0));

        let mut b = QueryParams::new();
        b.insert("min".into(), ParamValue::Float(100.0));
        b.insert("sym".into(), ParamValue::Text("SPY".into()));

        assert_eq!(cache_key(q, Some(&a)), cache_key(q, Some(&b)));
    }

    #[test]
    fn different_queries_differ() {
        assert_ne!(
            cache_key("SELECT 1", None),
            cache_key("SELECT 2", None)
        );
    }

    #[test]
    fn different_params_differ() {
        let q = "SELECT * FROM bars WHERE symbol = $sym";
        let a = params(&[("sym", ParamValue::Text("SPY".into()))]);
        let b = params(&[("sym", ParamValue::Text("QQQ".into()))]);
        assert_ne!(cache_key(q, Some(&a)), cache_key(q, Some(&b)));
    }

    #[test]
    fn value_type_distinguishes_keys() {
        let q = "SELECT * FROM bars WHERE x = $v";
        let a = params(&[("v", ParamValue::Int(1))]);
        let b = params(&[("v", ParamValue::Text("1".into()))]);
        assert_ne!(cache_key(q, Some(&a)), cache_key(q, Some(&b)));
    }

    #[test]
    fn sql_literal_escapes_quotes() {
        let v = ParamValue::Text("O'Neil".into());
        assert_eq!(v.to_sql_literal(), "'O''Neil'");
    }

    #[test]
    fn sql_literal_renders_scalars() {
        assert_eq!(ParamValue::Int(42).to_sql_literal(), "42");
        assert_eq!(ParamValue::Float(1.5).to_sql_literal(), "1.5");
        assert_eq!(ParamValue::Float(2.0).to_sql_literal(), "2.0");
        assert_eq!(ParamValue::Bool(true).to_sql_literal(), "TRUE");
        assert_eq!(ParamValue::Null.to_sql_literal(), "NULL");
    }

    #[test]
    fn infer_recognizes_scalar_forms() {
        assert_eq!(ParamValue::infer("42"), ParamValue::Int(42));
        assert_eq!(ParamValue::infer("1.5"), ParamValue::Float(1.5));
        assert_eq!(ParamValue::infer("true"), ParamValue::Bool(true));
        assert_eq!(ParamValue::infer("null"), ParamValue::Null);
        assert_eq!(ParamValue::infer("SPY"), ParamValue::Text("SPY".into()));
    }
}

//! One module per upstream feed. Each exposes `fetch_*` functions (single
//! unguarded HTTP calls) and pure `normalize_*` functions that reshape the
//! upstream JSON into the dashboard schema.

pub mod firecrawl;
pub mod github;
pub mod kalshi;
pub mod llm;
pub mod polymarket;
pub mod socrata;
pub mod virlo;

use serde_json::Value;

/// First non-empty string found under any of `keys`. Numbers are stringified
/// so datasets that flip a column between text and numeric still resolve.
pub(crate) fn pick_str(row: &Value, keys: &[&str]) -> String {
    for key in keys {
        match row.get(key) {
            Some(Value::String(s)) if !s.is_empty() => return s.clone(),
            Some(Value::Number(n)) => return n.to_string(),
            _ => {}
        }
    }
    String::new()
}

/// First numeric value found under any of `keys`; numeric strings parse too.
pub(crate) fn pick_f64(row: &Value, keys: &[&str]) -> f64 {
    for key in keys {
        match row.get(key) {
            Some(Value::Number(n)) => {
                if let Some(v) = n.as_f64() {
                    return v;
                }
            }
            Some(Value::String(s)) => {
                if let Ok(v) = s.parse::<f64>() {
                    return v;
                }
            }
            _ => {}
        }
    }
    0.0
}

/// Upstream list responses bury their rows under different keys depending on
/// the endpoint (or return a bare array). Try each key, then the top level.
pub(crate) fn unwrap_rows<'a>(value: &'a Value, keys: &[&str]) -> Vec<&'a Value> {
    for key in keys {
        if let Some(Value::Array(rows)) = value.get(key) {
            return rows.iter().collect();
        }
    }
    match value {
        Value::Array(rows) => rows.iter().collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn pick_str_tries_aliases_in_order() {
        let row = json!({"agency_name": "DOT", "agency": "ignored"});
        assert_eq!(pick_str(&row, &["agency_name", "agency"]), "DOT");
        let row = json!({"agency": "DSNY"});
        assert_eq!(pick_str(&row, &["agency_name", "agency"]), "DSNY");
        assert_eq!(pick_str(&json!({}), &["agency"]), "");
    }

    #[test]
    fn pick_str_stringifies_numbers() {
        let row = json!({"fiscal_year": 2026});
        assert_eq!(pick_str(&row, &["fiscal_year"]), "2026");
    }

    #[test]
    fn pick_f64_handles_numeric_strings() {
        let row = json!({"adopted": "1500000.5"});
        assert!((pick_f64(&row, &["adopted"]) - 1_500_000.5).abs() < 1e-9);
        assert_eq!(pick_f64(&json!({"adopted": "n/a"}), &["adopted"]), 0.0);
    }

    #[test]
    fn unwrap_rows_tries_keys_then_top_level() {
        let nested = json!({"data": [1, 2]});
        assert_eq!(unwrap_rows(&nested, &["data", "results"]).len(), 2);
        let bare = json!([1, 2, 3]);
        assert_eq!(unwrap_rows(&bare, &["data"]).len(), 3);
        assert!(unwrap_rows(&json!({"other": 1}), &["data"]).is_empty());
    }
}

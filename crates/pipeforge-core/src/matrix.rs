//! Matrix expansion: sorted-key cross product over job parameters (spec §4.4).

use std::collections::BTreeMap;

/// One `(name, value)` pair from a single matrix row.
#[derive(Debug, Clone, PartialEq)]
pub struct Kv {
    pub key: String,
    pub value: serde_yaml::Value,
}

/// Expand a `matrix.parameters` map into ordered rows, sorted-key order,
/// odometer-style (the last sorted key varies fastest). An empty map
/// yields exactly one empty row, so callers execute once with no matrix
/// values (spec §4.4).
///
/// `exclude` rows are accepted but — matching the observed original
/// behavior (spec §9 open question (b)) — not enforced. TODO: honor
/// `matrix.exclude` by filtering rows once a config in the wild is found
/// that actually relies on it.
pub fn expand(parameters: &BTreeMap<String, Vec<serde_yaml::Value>>) -> Vec<Vec<Kv>> {
    if parameters.is_empty() {
        return vec![Vec::new()];
    }

    let keys: Vec<&String> = parameters.keys().collect();
    let lists: Vec<&Vec<serde_yaml::Value>> = keys.iter().map(|k| &parameters[*k]).collect();

    let total: usize = lists.iter().map(|l| l.len()).product();
    if total == 0 {
        return Vec::new();
    }

    let sub_totals: Vec<usize> = (0..lists.len())
        .map(|i| lists[i + 1..].iter().map(|l| l.len()).product())
        .collect();

    (0..total)
        .map(|i| {
            (0..lists.len())
                .map(|pos| Kv {
                    key: keys[pos].clone(),
                    value: lists[pos][(i / sub_totals[pos]) % lists[pos].len()].clone(),
                })
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_yaml::Value;

    fn v(s: &str) -> Value {
        Value::String(s.to_string())
    }

    #[test]
    fn empty_map_yields_one_empty_row() {
        let rows = expand(&BTreeMap::new());
        assert_eq!(rows, vec![Vec::new()]);
    }

    #[test]
    fn single_key_one_row_per_value() {
        let mut m = BTreeMap::new();
        m.insert("os".to_string(), vec![v("linux"), v("mac")]);
        let rows = expand(&m);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0][0].value, v("linux"));
        assert_eq!(rows[1][0].value, v("mac"));
    }

    #[test]
    fn last_sorted_key_varies_fastest() {
        let mut m = BTreeMap::new();
        m.insert("a".to_string(), vec![v("1"), v("2")]);
        m.insert("b".to_string(), vec![v("x"), v("y")]);
        let rows = expand(&m);
        // sorted keys: a, b. b varies fastest.
        let rendered: Vec<(String, String)> = rows
            .iter()
            .map(|row| {
                (
                    row[0].value.as_str().unwrap().to_string(),
                    row[1].value.as_str().unwrap().to_string(),
                )
            })
            .collect();
        assert_eq!(
            rendered,
            vec![
                ("1".into(), "x".into()),
                ("1".into(), "y".into()),
                ("2".into(), "x".into()),
                ("2".into(), "y".into()),
            ]
        );
    }
}

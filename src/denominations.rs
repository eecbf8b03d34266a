use serde::Serialize;

use crate::db::models::Denominations;

/// One line of the denominations table on a receipt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DenominationRow {
    pub value: u64,
    pub count: u64,
    pub amount: u64,
}

/// Rows for every denomination with a positive count, highest value first.
///
/// Keys and counts arrive from a browser form and may be numbers or numeric
/// strings; entries that are neither are skipped.
pub fn denomination_rows(denominations: &Denominations) -> Vec<DenominationRow> {
    let mut rows: Vec<DenominationRow> = denominations
        .iter()
        .filter_map(|(key, count)| {
            let Ok(value) = key.trim().parse::<u64>() else {
                tracing::warn!("Skipping denomination with non-numeric value {:?}", key);
                return None;
            };
            let count = parse_count(count)?;
            (count > 0).then(|| DenominationRow {
                value,
                count: count as u64,
                amount: value.saturating_mul(count as u64),
            })
        })
        .collect();

    rows.sort_by(|a, b| b.value.cmp(&a.value));
    rows
}

pub fn rows_total(rows: &[DenominationRow]) -> u64 {
    rows.iter().map(|r| r.amount).sum()
}

fn parse_count(count: &serde_json::Value) -> Option<i64> {
    match count {
        serde_json::Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
        serde_json::Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn denominations(value: serde_json::Value) -> Denominations {
        serde_json::from_value(value).expect("denominations")
    }

    #[test]
    fn total_is_sum_of_positive_counts() {
        let rows = denomination_rows(&denominations(json!({
            "500": 3,
            "100": 0,
            "50": -2,
            "10": 4,
        })));

        assert_eq!(
            rows,
            vec![
                DenominationRow { value: 500, count: 3, amount: 1500 },
                DenominationRow { value: 10, count: 4, amount: 40 },
            ]
        );
        assert_eq!(rows_total(&rows), 1540);
    }

    #[test]
    fn accepts_string_counts_and_skips_garbage() {
        let rows = denomination_rows(&denominations(json!({
            "2000": "2",
            "coins": 5,
            "200": null,
            "20": "many",
        })));

        assert_eq!(rows, vec![DenominationRow { value: 2000, count: 2, amount: 4000 }]);
    }

    #[test]
    fn empty_map_has_no_rows() {
        let rows = denomination_rows(&Denominations::new());
        assert!(rows.is_empty());
        assert_eq!(rows_total(&rows), 0);
    }
}

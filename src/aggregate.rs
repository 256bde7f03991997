use tracing::{debug, instrument};

use crate::model::{Dataset, Row, Sheet, SupplierSummary};
use crate::query::{Query, normalize};

/// Summarizes every sheet that has at least one row matching `query`.
///
/// Results follow the sheet order of the dataset; sheets without matches are
/// left out.
#[instrument(level = "debug", skip_all, fields(variants = ?query.variants, period = ?query.period))]
pub fn summarize(dataset: &Dataset, query: &Query) -> Vec<SupplierSummary> {
    let summaries: Vec<SupplierSummary> = dataset
        .sheets()
        .iter()
        .filter_map(|sheet| summarize_sheet(sheet, query))
        .collect();
    debug!(suppliers = summaries.len(), "aggregation finished");
    summaries
}

/// Aggregates the rows of a single sheet. Returns `None` when nothing matches.
pub fn summarize_sheet(sheet: &Sheet, query: &Query) -> Option<SupplierSummary> {
    let matched: Vec<&Row> = sheet
        .rows
        .iter()
        .filter(|row| query.matches(&normalize(&row.name)))
        .filter(|row| match query.period {
            Some(period) => row.issued.is_some_and(|date| period.contains(date)),
            None => true,
        })
        .collect();

    if matched.is_empty() {
        return None;
    }

    let quantities: Vec<f64> = matched.iter().filter_map(|row| row.quantity).collect();
    let prices: Vec<f64> = matched.iter().filter_map(|row| row.price).collect();
    let totals: Vec<f64> = matched.iter().filter_map(|row| row.total).collect();

    let average_price = if prices.is_empty() {
        None
    } else {
        Some(round2(stable_sum(prices.clone()) / prices.len() as f64))
    };
    let total_amount = if totals.is_empty() {
        None
    } else {
        Some(round2(stable_sum(totals)))
    };

    Some(SupplierSummary {
        supplier: sheet.name.clone(),
        quantity: stable_sum(quantities) as i64,
        average_price,
        total_amount,
    })
}

/// Sums in a canonical order so the result does not depend on row order.
fn stable_sum(mut values: Vec<f64>) -> f64 {
    values.sort_by(f64::total_cmp);
    values.into_iter().sum()
}

/// Rounds to cents, ties to even.
fn round2(value: f64) -> f64 {
    (value * 100.0).round_ties_even() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DateRange;
    use crate::query::parse;
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn sale(name: &str, issued: NaiveDate, quantity: f64, price: f64) -> Row {
        Row::new(name)
            .issued(issued)
            .quantity(quantity)
            .price(price)
            .total(quantity * price)
    }

    #[test]
    fn code_spellings_match_the_same_rows() {
        let sheet = Sheet::new("Supplier", vec![sale("VRP350", date(2024, 1, 5), 4.0, 10.0)]);
        for text in ["VRP350", "VRP 350", "VRP-350", "vrp – 350"] {
            let query = parse(text).expect("parsed");
            let summary = summarize_sheet(&sheet, &query).expect(text);
            assert_eq!(summary.quantity, 4, "query {text:?}");
        }
    }

    #[test]
    fn computes_sum_mean_and_total() {
        let sheet = Sheet::new(
            "Supplier",
            vec![
                sale("Кран VRP-350", date(2024, 1, 5), 3.0, 10.0),
                sale("Кран VRP 350 DN20", date(2024, 1, 6), 2.5, 11.0),
                sale("Other", date(2024, 1, 7), 100.0, 1.0),
                sale("vrp350", date(2024, 1, 8), 1.0, 12.333),
            ],
        );
        let query = parse("vrp350").expect("parsed");
        let summary = summarize_sheet(&sheet, &query).expect("matched");
        assert_eq!(summary.supplier, "Supplier");
        assert_eq!(summary.quantity, 6);
        assert_eq!(summary.average_price, Some(11.11));
        assert_eq!(summary.total_amount, Some(69.83));
    }

    #[test]
    fn missing_cells_are_skipped() {
        let sheet = Sheet::new(
            "Supplier",
            vec![
                Row::new("ABC").quantity(2.0),
                Row::new("ABC").price(5.0),
                Row::new("ABC"),
            ],
        );
        let query = parse("abc").expect("parsed");
        let summary = summarize_sheet(&sheet, &query).expect("matched");
        assert_eq!(summary.quantity, 2);
        assert_eq!(summary.average_price, Some(5.0));
        assert_eq!(summary.total_amount, None);
    }

    #[test]
    fn period_is_inclusive_and_drops_undated_rows() {
        let sheet = Sheet::new(
            "Supplier",
            vec![
                sale("ABC", date(2024, 1, 1), 1.0, 1.0),
                sale("ABC", date(2024, 3, 31), 2.0, 1.0),
                sale("ABC", date(2023, 12, 31), 10.0, 1.0),
                sale("ABC", date(2024, 4, 1), 20.0, 1.0),
                Row::new("ABC").quantity(40.0),
            ],
        );
        let query = Query {
            variants: vec!["abc".into()],
            period: Some(DateRange::new(date(2024, 1, 1), date(2024, 3, 31))),
        };
        assert_eq!(summarize_sheet(&sheet, &query).expect("matched").quantity, 3);

        let unfiltered = Query {
            period: None,
            ..query
        };
        assert_eq!(
            summarize_sheet(&sheet, &unfiltered).expect("matched").quantity,
            73
        );
    }

    #[test]
    fn aggregates_ignore_row_order() {
        let rows = vec![
            sale("ABC", date(2024, 1, 1), 0.1, 0.7),
            sale("ABC", date(2024, 1, 2), 0.2, 1e9),
            sale("ABC", date(2024, 1, 3), 0.3, 0.3),
            sale("ABC", date(2024, 1, 4), 5.7, 2.675),
        ];
        let mut reversed = rows.clone();
        reversed.reverse();
        let mut rotated = rows.clone();
        rotated.rotate_left(1);

        let query = parse("abc").expect("parsed");
        let expected = summarize_sheet(&Sheet::new("S", rows), &query);
        assert_eq!(summarize_sheet(&Sheet::new("S", reversed), &query), expected);
        assert_eq!(summarize_sheet(&Sheet::new("S", rotated), &query), expected);
    }

    #[test]
    fn cents_round_half_to_even() {
        assert_eq!(round2(0.125), 0.12);
        assert_eq!(round2(0.375), 0.38);
        assert_eq!(round2(-0.125), -0.12);
        assert_eq!(round2(11.111), 11.11);

        let sheet = Sheet::new(
            "Supplier",
            vec![Row::new("ABC").price(0.25), Row::new("ABC").price(0.0)],
        );
        let summary = summarize_sheet(&sheet, &parse("abc").expect("parsed")).expect("matched");
        assert_eq!(summary.average_price, Some(0.12));
    }

    #[test]
    fn sheets_without_matches_are_omitted() {
        let dataset = Dataset::new(vec![
            Sheet::new("A", vec![sale("ABC", date(2024, 1, 1), 1.0, 1.0)]),
            Sheet::new("B", vec![sale("XYZ", date(2024, 1, 1), 1.0, 1.0)]),
            Sheet::new("C", vec![sale("abc-1", date(2024, 1, 1), 2.0, 1.0)]),
        ]);
        let query = parse("abc").expect("parsed");
        let suppliers: Vec<String> = summarize(&dataset, &query)
            .into_iter()
            .map(|s| s.supplier)
            .collect();
        assert_eq!(suppliers, ["A", "C"]);
    }
}

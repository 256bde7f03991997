use chrono::NaiveDate;

/// One sales record read from a supplier sheet.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    /// Product name as written in the workbook; usually embeds the product code.
    pub name: String,
    /// Invoice issue date. `None` when the cell could not be interpreted.
    pub issued: Option<NaiveDate>,
    /// Quantity sold.
    pub quantity: Option<f64>,
    /// Unit price including VAT.
    pub price: Option<f64>,
    /// Line total including VAT.
    pub total: Option<f64>,
}

impl Row {
    /// Creates a row with only a product name; the remaining fields are empty.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            issued: None,
            quantity: None,
            price: None,
            total: None,
        }
    }

    pub fn issued(mut self, date: NaiveDate) -> Self {
        self.issued = Some(date);
        self
    }

    pub fn quantity(mut self, quantity: f64) -> Self {
        self.quantity = Some(quantity);
        self
    }

    pub fn price(mut self, price: f64) -> Self {
        self.price = Some(price);
        self
    }

    pub fn total(mut self, total: f64) -> Self {
        self.total = Some(total);
        self
    }
}

/// A named table of rows. Each sheet corresponds to one supplier.
#[derive(Debug, Clone, PartialEq)]
pub struct Sheet {
    pub name: String,
    pub rows: Vec<Row>,
}

impl Sheet {
    pub fn new(name: impl Into<String>, rows: Vec<Row>) -> Self {
        Self {
            name: name.into(),
            rows,
        }
    }
}

/// Immutable snapshot of every usable sheet in the workbook, in workbook order.
///
/// A reload produces a new `Dataset`; existing snapshots are never mutated.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    sheets: Vec<Sheet>,
}

impl Dataset {
    pub fn new(sheets: Vec<Sheet>) -> Self {
        Self { sheets }
    }

    pub fn sheets(&self) -> &[Sheet] {
        &self.sheets
    }

    pub fn sheet(&self, name: &str) -> Option<&Sheet> {
        self.sheets.iter().find(|sheet| sheet.name == name)
    }

    pub fn len(&self) -> usize {
        self.sheets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sheets.is_empty()
    }

    /// Total number of rows across all sheets.
    pub fn row_count(&self) -> usize {
        self.sheets.iter().map(|sheet| sheet.rows.len()).sum()
    }
}

/// Inclusive calendar range used to filter rows by issue date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

/// Aggregated figures for one supplier sheet.
#[derive(Debug, Clone, PartialEq)]
pub struct SupplierSummary {
    pub supplier: String,
    pub quantity: i64,
    /// Mean unit price, rounded to two decimals. `None` when no row had a price.
    pub average_price: Option<f64>,
    /// Sum of line totals, rounded to two decimals. `None` when no row had a total.
    pub total_amount: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn date_range_is_inclusive_on_both_ends() {
        let range = DateRange::new(date(2024, 1, 1), date(2024, 1, 31));
        assert!(range.contains(date(2024, 1, 1)));
        assert!(range.contains(date(2024, 1, 31)));
        assert!(!range.contains(date(2023, 12, 31)));
        assert!(!range.contains(date(2024, 2, 1)));
    }

    #[test]
    fn dataset_keeps_sheet_order() {
        let dataset = Dataset::new(vec![
            Sheet::new("B", vec![Row::new("x")]),
            Sheet::new("A", vec![Row::new("y"), Row::new("z")]),
        ]);
        let names: Vec<&str> = dataset.sheets().iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["B", "A"]);
        assert_eq!(dataset.row_count(), 3);
        assert!(dataset.sheet("A").is_some());
        assert!(dataset.sheet("C").is_none());
    }
}

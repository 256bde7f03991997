use std::path::Path;

use calamine::{DataType, Reader, Xlsx, open_workbook};
use chrono::{Days, NaiveDate, NaiveDateTime};
use tracing::{debug, info, instrument};

use crate::error::{Result, ToolError};
use crate::model::{Dataset, Row, Sheet};

/// Header of the product name column, after lower-casing and trimming.
pub const NAME_COLUMN: &str = "номенклатура товарів/послуг";
/// Header of the invoice issue date column.
pub const DATE_COLUMN: &str = "дата виписки";
/// Header of the quantity column.
pub const QUANTITY_COLUMN: &str = "кількість (об’єм , обсяг)";
/// Header of the unit price column.
pub const PRICE_COLUMN: &str = "ціна з пдв";
/// Header of the line total column.
pub const TOTAL_COLUMN: &str = "сума з пдв";

const TEXT_DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d.%m.%Y", "%d/%m/%Y"];
const TEXT_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%d.%m.%Y %H:%M:%S",
    "%d.%m.%Y %H:%M",
];

/// Column positions of a sheet that passed schema validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Columns {
    pub name: usize,
    pub date: usize,
    pub quantity: Option<usize>,
    pub price: Option<usize>,
    pub total: Option<usize>,
}

/// Outcome of validating a sheet's header row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SheetLayout {
    Sales(Columns),
    Skipped(String),
}

impl SheetLayout {
    /// Resolves the layout from raw header cells. Headers are compared after
    /// lower-casing and trimming.
    pub fn resolve<S: AsRef<str>>(headers: &[S]) -> Self {
        let headers: Vec<String> = headers.iter().map(|h| normalize_header(h.as_ref())).collect();
        let find = |column: &str| headers.iter().position(|header| header == column);

        let Some(name) = find(NAME_COLUMN) else {
            return SheetLayout::Skipped(format!("missing column '{NAME_COLUMN}'"));
        };
        let Some(date) = find(DATE_COLUMN) else {
            return SheetLayout::Skipped(format!("missing column '{DATE_COLUMN}'"));
        };

        SheetLayout::Sales(Columns {
            name,
            date,
            quantity: find(QUANTITY_COLUMN),
            price: find(PRICE_COLUMN),
            total: find(TOTAL_COLUMN),
        })
    }
}

/// Reads every sales sheet of the workbook at `path`.
///
/// Sheets whose header row lacks the product name or issue date column are
/// skipped. Cells that cannot be interpreted become `None` instead of failing
/// the load.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub fn read_dataset(path: &Path) -> Result<Dataset> {
    if !path.exists() {
        return Err(ToolError::MissingInput(path.to_path_buf()));
    }
    let mut workbook: Xlsx<_> = open_workbook(path)?;

    let mut sheets = Vec::new();
    for sheet_name in workbook.sheet_names().to_owned() {
        let range = read_sheet(&mut workbook, &sheet_name)?;
        match read_sales_sheet(&sheet_name, &range) {
            Some(sheet) => {
                debug!(sheet = %sheet.name, rows = sheet.rows.len(), "loaded sheet");
                sheets.push(sheet);
            }
            None => continue,
        }
    }

    let dataset = Dataset::new(sheets);
    info!(
        sheets = dataset.len(),
        rows = dataset.row_count(),
        "workbook loaded"
    );
    Ok(dataset)
}

fn read_sheet<R: std::io::Read + std::io::Seek>(
    workbook: &mut Xlsx<R>,
    name: &str,
) -> Result<calamine::Range<DataType>> {
    let range_result = workbook
        .worksheet_range(name)
        .ok_or_else(|| ToolError::InvalidWorkbook(format!("missing sheet '{name}'")))?;
    let range = range_result.map_err(ToolError::from)?;
    Ok(range)
}

fn read_sales_sheet(sheet_name: &str, range: &calamine::Range<DataType>) -> Option<Sheet> {
    let headers: Vec<String> = match range.rows().next() {
        Some(first_row) => first_row
            .iter()
            .map(|cell| cell_to_string(Some(cell)))
            .collect(),
        None => Vec::new(),
    };

    let columns = match SheetLayout::resolve(&headers) {
        SheetLayout::Sales(columns) => columns,
        SheetLayout::Skipped(reason) => {
            debug!(sheet = sheet_name, %reason, "skipping sheet");
            return None;
        }
    };

    let rows = range
        .rows()
        .skip(1)
        .filter_map(|cells| read_row(cells, &columns))
        .collect();

    Some(Sheet::new(sheet_name, rows))
}

fn read_row(cells: &[DataType], columns: &Columns) -> Option<Row> {
    let name = cell_to_string(cells.get(columns.name));
    let name = name.trim();
    if name.is_empty() {
        return None;
    }

    let number_at = |idx: Option<usize>| idx.and_then(|idx| cell_to_number(cells.get(idx)));

    Some(Row {
        name: name.to_string(),
        issued: cell_to_date(cells.get(columns.date)),
        quantity: number_at(columns.quantity),
        price: number_at(columns.price),
        total: number_at(columns.total),
    })
}

fn normalize_header(header: &str) -> String {
    header.trim().to_lowercase()
}

fn cell_to_string(cell: Option<&DataType>) -> String {
    match cell {
        Some(DataType::String(value)) => value.clone(),
        Some(DataType::Float(value)) => value.to_string(),
        Some(DataType::Int(value)) => value.to_string(),
        Some(DataType::Bool(value)) => value.to_string(),
        Some(DataType::Empty) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

/// Interprets a cell as a number. Text cells may use spaces as thousands
/// separators and a comma as the decimal mark.
fn cell_to_number(cell: Option<&DataType>) -> Option<f64> {
    match cell? {
        DataType::Float(value) => Some(*value).filter(|v| v.is_finite()),
        DataType::Int(value) => Some(*value as f64),
        DataType::String(value) => parse_number(value),
        _ => None,
    }
}

fn parse_number(text: &str) -> Option<f64> {
    let cleaned: String = text
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| if c == ',' { '.' } else { c })
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Interprets a cell as a calendar date. Numeric cells are Excel serial dates.
fn cell_to_date(cell: Option<&DataType>) -> Option<NaiveDate> {
    match cell? {
        DataType::DateTime(serial) | DataType::Float(serial) => serial_to_date(*serial),
        DataType::Int(serial) => serial_to_date(*serial as f64),
        DataType::String(value) | DataType::DateTimeIso(value) => parse_date(value),
        _ => None,
    }
}

/// Converts an Excel serial number (1900 date system) to a date.
fn serial_to_date(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() || serial < 1.0 || serial > 2_958_465.0 {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    epoch.checked_add_days(Days::new(serial.trunc() as u64))
}

fn parse_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    TEXT_DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(text, format).ok())
        .or_else(|| {
            TEXT_DATETIME_FORMATS
                .iter()
                .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
                .map(|datetime| datetime.date())
        })
}

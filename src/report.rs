use crate::model::{DateRange, SupplierSummary};

const SUPPLIER_WIDTH: usize = 20;
const QUANTITY_WIDTH: usize = 10;
const AMOUNT_WIDTH: usize = 15;
const MISSING: &str = "-";

/// Orders summaries by quantity, largest first. Ties keep their sheet order.
pub fn rank(summaries: &mut [SupplierSummary]) {
    summaries.sort_by(|lhs, rhs| rhs.quantity.cmp(&lhs.quantity));
}

/// Renders ranked summaries as a monospaced table in Telegram HTML markup.
///
/// The total amount column is only present when at least one supplier
/// reported totals.
pub fn render(summaries: &[SupplierSummary], period: Option<DateRange>) -> String {
    let with_totals = summaries.iter().any(|s| s.total_amount.is_some());

    let mut out = String::from("📊 <b>Аналіз продажів</b>\n");
    if let Some(period) = period {
        out.push_str(&format!(
            "<i>{} – {}</i>\n",
            period.start.format("%d.%m.%Y"),
            period.end.format("%d.%m.%Y")
        ));
    }
    out.push('\n');

    let mut header = vec!["Постачальник", "Кількість", "Середня ціна"];
    if with_totals {
        header.push("Сума");
    }
    out.push_str(&table_line(&header, with_totals));

    for summary in summaries {
        let supplier: String = summary.supplier.chars().take(SUPPLIER_WIDTH).collect();
        let quantity = group_thousands(&summary.quantity.to_string());
        let price = format_amount(summary.average_price);
        let total = format_amount(summary.total_amount);
        let mut cells = vec![supplier.as_str(), quantity.as_str(), price.as_str()];
        if with_totals {
            cells.push(total.as_str());
        }
        out.push_str(&table_line(&cells, with_totals));
    }

    out
}

fn table_line(cells: &[&str], with_totals: bool) -> String {
    let mut line = format!(
        "{:<sw$} {:>qw$} {:>aw$}",
        cells[0],
        cells[1],
        cells[2],
        sw = SUPPLIER_WIDTH,
        qw = QUANTITY_WIDTH,
        aw = AMOUNT_WIDTH
    );
    if with_totals {
        line.push_str(&format!(" {:>aw$}", cells[3], aw = AMOUNT_WIDTH));
    }
    format!("<pre>{}</pre>\n", escape_html(&line))
}

fn format_amount(value: Option<f64>) -> String {
    match value {
        Some(value) => group_thousands(&format!("{value:.2}")),
        None => MISSING.to_string(),
    }
}

/// Inserts a space between every group of three integer digits.
pub fn group_thousands(number: &str) -> String {
    let (sign, unsigned) = match number.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", number),
    };
    let (integer, fraction) = match unsigned.split_once('.') {
        Some((integer, fraction)) => (integer, Some(fraction)),
        None => (unsigned, None),
    };

    let digits: Vec<char> = integer.chars().collect();
    let mut grouped = String::with_capacity(number.len() + digits.len() / 3);
    for (idx, digit) in digits.iter().enumerate() {
        if idx > 0 && (digits.len() - idx) % 3 == 0 {
            grouped.push(' ');
        }
        grouped.push(*digit);
    }

    match fraction {
        Some(fraction) => format!("{sign}{grouped}.{fraction}"),
        None => format!("{sign}{grouped}"),
    }
}

/// Escapes the characters Telegram's HTML parse mode treats as markup.
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            other => escaped.push(other),
        }
    }
    escaped
}

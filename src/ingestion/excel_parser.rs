use calamine::{Data, Range, Reader, open_workbook_auto_from_rs};
use chrono::NaiveDate;
use rust_decimal::prelude::*;
use std::collections::HashMap;
use std::io::Cursor;
use tracing::{debug, info, instrument, warn};

use super::http_client::PageFetcher;
use crate::columns::{NeededColumn, normalize_header};
use crate::db::models::trading_results::ProductCode;
use crate::error::SpimexError;

static EMPTY_CELL: Data = Data::Empty;

/// One qualifying spreadsheet row, stamped with the trade date of its file.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedTrade {
    pub exchange_product_id: String,
    pub exchange_product_name: String,
    pub delivery_basis_name: String,
    pub volume: i64,
    pub total: i64,
    pub count: i64,
    pub date: NaiveDate,
}

/// Download a trading-results spreadsheet and extract its qualifying rows.
#[instrument(skip(fetcher), fields(timed = true))]
pub async fn parse_excel_file(
    fetcher: &dyn PageFetcher,
    link: &str,
    trade_date: NaiveDate,
    rows_to_skip: usize,
) -> Result<Vec<ParsedTrade>, SpimexError> {
    let bytes = fetcher.fetch_bytes(link).await?;
    let sheet = read_first_sheet(bytes)?;
    let trades = parse_trades(&sheet, trade_date, rows_to_skip)?;
    info!(row_count = trades.len(), "Spreadsheet parsed");
    Ok(trades)
}

/// Open an in-memory `.xls`/`.xlsx` file and return its first worksheet.
pub fn read_first_sheet(bytes: Vec<u8>) -> Result<Range<Data>, SpimexError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))?;
    let sheet = workbook
        .worksheet_range_at(0)
        .ok_or(SpimexError::EmptyWorkbook)??;
    Ok(sheet)
}

/// Project a worksheet onto the needed columns and keep rows with a positive count.
///
/// `rows_to_skip` counts sheet rows from the top of the sheet; the row right
/// after them holds the headers.
pub fn parse_trades(
    sheet: &Range<Data>,
    trade_date: NaiveDate,
    rows_to_skip: usize,
) -> Result<Vec<ParsedTrade>, SpimexError> {
    // calamine ranges begin at the first non-empty cell, not at the sheet's first row
    let first_row = sheet.start().map(|(row, _)| row as usize).unwrap_or(0);
    let mut rows = sheet.rows().skip(rows_to_skip.saturating_sub(first_row));

    let header = rows.next().unwrap_or(&[]);
    let positions = column_positions(header)?;

    let mut trades = Vec::new();
    let mut dropped = 0usize;
    for row in rows {
        match parse_row(row, &positions, trade_date) {
            Some(trade) => trades.push(trade),
            None => dropped += 1,
        }
    }
    debug!(kept = trades.len(), dropped, "Spreadsheet rows filtered");
    Ok(trades)
}

fn column_positions(header: &[Data]) -> Result<HashMap<NeededColumn, usize>, SpimexError> {
    let normalized: Vec<Option<String>> = header
        .iter()
        .map(|cell| cell_text(cell).map(|text| normalize_header(&text)))
        .collect();

    let mut positions = HashMap::new();
    let mut missing = Vec::new();
    for column in NeededColumn::ALL {
        match normalized.iter().position(|h| h.as_deref() == Some(column.header())) {
            Some(idx) => {
                positions.insert(column, idx);
            }
            None => missing.push(column.header().to_string()),
        }
    }

    if missing.is_empty() {
        Ok(positions)
    } else {
        Err(SpimexError::MissingColumns(missing))
    }
}

fn parse_row(
    row: &[Data],
    positions: &HashMap<NeededColumn, usize>,
    trade_date: NaiveDate,
) -> Option<ParsedTrade> {
    let cell = |column: NeededColumn| row.get(positions[&column]).unwrap_or(&EMPTY_CELL);

    // Rows with any required value missing are dropped entirely
    let exchange_product_id = cell_text(cell(NeededColumn::ExchangeProductId))?;
    let exchange_product_name = cell_text(cell(NeededColumn::ExchangeProductName))?;
    let delivery_basis_name = cell_text(cell(NeededColumn::DeliveryBasisName))?;
    let count_text = cell_text(cell(NeededColumn::Count))?;
    cell_text(cell(NeededColumn::Volume))?;
    cell_text(cell(NeededColumn::Total))?;

    let count = coerce_count(&count_text);
    if count <= 0 {
        return None;
    }

    if ProductCode::parse(&exchange_product_id).is_none() {
        warn!(%exchange_product_id, "Skipping row with undecomposable product id");
        return None;
    }

    let Some(volume) = cell_f64(cell(NeededColumn::Volume)).map(|v| v.trunc() as i64) else {
        debug!(%exchange_product_id, "Skipping row with non-numeric volume");
        return None;
    };
    if volume < 0 {
        debug!(%exchange_product_id, volume, "Skipping row with negative volume");
        return None;
    }
    let Some(total) = cell_decimal(cell(NeededColumn::Total)).and_then(round_total) else {
        debug!(%exchange_product_id, "Skipping row with non-numeric total");
        return None;
    };

    Some(ParsedTrade {
        exchange_product_id,
        exchange_product_name,
        delivery_basis_name,
        volume,
        total,
        count,
        date: trade_date,
    })
}

/// Only all-digit text counts; anything else (dashes, fractions, signs) becomes 0.
pub fn coerce_count(text: &str) -> i64 {
    if !text.is_empty() && text.bytes().all(|b| b.is_ascii_digit()) {
        text.parse().unwrap_or(0)
    } else {
        0
    }
}

/// Round half away from zero to a whole number of rubles.
pub fn round_total(total: Decimal) -> Option<i64> {
    total
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
}

fn cell_text(cell: &Data) -> Option<String> {
    let text = match cell {
        Data::String(s) => s.trim().to_string(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => format_float(*f),
        Data::Bool(b) => b.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

// Whole floats print without a fraction so that a numeric 5.0 count reads as "5".
fn format_float(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

fn normalize_number(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| if c == ',' { '.' } else { c })
        .collect()
}

fn cell_f64(cell: &Data) -> Option<f64> {
    match cell {
        Data::Int(i) => Some(*i as f64),
        Data::Float(f) if f.is_finite() => Some(*f),
        Data::String(s) => normalize_number(s).parse::<f64>().ok().filter(|f| f.is_finite()),
        _ => None,
    }
}

fn cell_decimal(cell: &Data) -> Option<Decimal> {
    match cell {
        Data::Int(i) => Some(Decimal::from(*i)),
        Data::Float(f) => Decimal::from_f64(*f),
        Data::String(s) => Decimal::from_str(&normalize_number(s)).ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 9).unwrap()
    }

    fn s(text: &str) -> Data {
        Data::String(text.to_string())
    }

    fn sheet_at(first_row: u32, rows: Vec<Vec<Data>>) -> Range<Data> {
        let width = rows.iter().map(Vec::len).max().unwrap_or(1) as u32;
        let height = rows.len() as u32;
        let mut range = Range::new((first_row, 0), (first_row + height - 1, width - 1));
        for (r, row) in rows.into_iter().enumerate() {
            for (c, value) in row.into_iter().enumerate() {
                range.set_value((first_row + r as u32, c as u32), value);
            }
        }
        range
    }

    fn header_row() -> Vec<Data> {
        vec![
            s("№"),
            s("Код\nИнструмента"),
            s("Наименование\nИнструмента"),
            s("Базис\nпоставки"),
            s("Объем\nДоговоров\nв единицах\nизмерения"),
            s("Обьем\nДоговоров,\nруб."),
            s("Изменение рыночной\nцены к цене\nпредыдуего\nдня"),
            s("Количество\nДоговоров,\nшт."),
        ]
    }

    fn data_row(id: &str, volume: Data, total: Data, count: Data) -> Vec<Data> {
        vec![
            Data::Float(1.0),
            s(id),
            s("Бензин (АИ-92-К5)"),
            s("ст. Уфа"),
            volume,
            total,
            s("-"),
            count,
        ]
    }

    fn preamble() -> Vec<Vec<Data>> {
        vec![
            vec![s("Бюллетень по итогам торгов")],
            vec![s("в Секции «Нефтепродукты»")],
            vec![Data::Empty],
            vec![s("Дата торгов: 09.01.2024")],
            vec![Data::Empty],
            vec![s("Единица измерения: Метрическая тонна")],
        ]
    }

    #[test]
    fn qualifying_rows_are_kept_and_stamped() {
        let mut rows = preamble();
        rows.push(header_row());
        rows.push(data_row("A592UFM060F", Data::Float(60.0), Data::Float(3_456_789.5), Data::Float(2.0)));
        rows.push(data_row("A592UFM025A", Data::Int(25), s("1 440 000,49"), s("12")));
        rows.push(data_row("A100ANK060F", Data::Float(120.0), Data::Float(100.0), s("-")));
        rows.push(data_row("A100ANK005A", Data::Float(10.0), Data::Float(100.0), Data::Float(0.0)));
        rows.push(data_row("DT10NVY005A", Data::Float(5.0), Data::Float(200.0), Data::Float(1.5)));
        rows.push(vec![Data::Empty, s("Итого:"), Data::Empty, Data::Empty, Data::Float(85.0), Data::Float(1.0), Data::Empty, Data::Float(14.0)]);

        let trades = parse_trades(&sheet_at(0, rows), day(), 6).unwrap();

        assert_eq!(trades.len(), 2);
        assert!(trades.iter().all(|t| t.date == day()));

        assert_eq!(trades[0].exchange_product_id, "A592UFM060F");
        assert_eq!(trades[0].volume, 60);
        assert_eq!(trades[0].total, 3_456_790);
        assert_eq!(trades[0].count, 2);
        assert_eq!(trades[0].delivery_basis_name, "ст. Уфа");

        assert_eq!(trades[1].exchange_product_id, "A592UFM025A");
        assert_eq!(trades[1].total, 1_440_000);
        assert_eq!(trades[1].count, 12);
    }

    #[test]
    fn rows_missing_required_values_are_dropped() {
        let mut rows = preamble();
        rows.push(header_row());
        let mut no_name = data_row("A592UFM060F", Data::Float(60.0), Data::Float(10.0), Data::Float(2.0));
        no_name[2] = Data::Empty;
        rows.push(no_name);
        rows.push(data_row("A592UFM060F", Data::Empty, Data::Float(10.0), Data::Float(2.0)));
        rows.push(data_row("A592UFM060F", Data::Float(60.0), s("   "), Data::Float(2.0)));

        let trades = parse_trades(&sheet_at(0, rows), day(), 6).unwrap();
        assert!(trades.is_empty());
    }

    #[test]
    fn header_row_is_found_relative_to_sheet_top() {
        // First non-empty cell is on sheet row 2; headers still sit on sheet row 6
        let mut rows: Vec<Vec<Data>> = preamble().into_iter().skip(2).collect();
        rows.push(header_row());
        rows.push(data_row("A592UFM060F", Data::Float(60.0), Data::Float(10.0), Data::Float(2.0)));

        let trades = parse_trades(&sheet_at(2, rows), day(), 6).unwrap();
        assert_eq!(trades.len(), 1);
    }

    #[test]
    fn missing_headers_are_reported() {
        let mut header = header_row();
        header.pop();
        let mut rows = preamble();
        rows.push(header);

        match parse_trades(&sheet_at(0, rows), day(), 6) {
            Err(SpimexError::MissingColumns(missing)) => {
                assert_eq!(missing, vec!["Количество Договоров, шт.".to_string()]);
            }
            other => panic!("expected missing columns, got {other:?}"),
        }
    }

    #[test]
    fn sheet_without_data_rows_is_empty_not_an_error() {
        let mut rows = preamble();
        rows.push(header_row());
        assert!(parse_trades(&sheet_at(0, rows), day(), 6).unwrap().is_empty());
    }

    #[test]
    fn count_coercion_accepts_digits_only() {
        assert_eq!(coerce_count("17"), 17);
        assert_eq!(coerce_count("0"), 0);
        assert_eq!(coerce_count("-"), 0);
        assert_eq!(coerce_count("-3"), 0);
        assert_eq!(coerce_count("2.5"), 0);
        assert_eq!(coerce_count("1 000"), 0);
        assert_eq!(coerce_count(""), 0);
        assert_eq!(coerce_count(&format_float(4.0)), 4);
    }

    #[test]
    fn totals_round_half_away_from_zero() {
        assert_eq!(round_total(Decimal::new(25, 1)), Some(3));
        assert_eq!(round_total(Decimal::new(35, 1)), Some(4));
        assert_eq!(round_total(Decimal::new(-25, 1)), Some(-3));
        assert_eq!(round_total(Decimal::new(123_449, 2)), Some(1234));
    }

    // Preamble text from sheet row 2, headers on row 6, one instrument on row 7
    fn workbook_bytes() -> Vec<u8> {
        let mut workbook = rust_xlsxwriter::Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.write_string(2, 0, "Бюллетень по итогам торгов").unwrap();
        sheet.write_string(3, 0, "Дата торгов: 09.01.2024").unwrap();
        for (col, cell) in header_row().iter().enumerate() {
            if let Data::String(text) = cell {
                sheet.write_string(6, col as u16, text.as_str()).unwrap();
            }
        }
        sheet.write_number(7, 0, 1.0).unwrap();
        sheet.write_string(7, 1, "A592UFM060F").unwrap();
        sheet.write_string(7, 2, "Бензин (АИ-92-К5)").unwrap();
        sheet.write_string(7, 3, "ст. Уфа").unwrap();
        sheet.write_number(7, 4, 60.0).unwrap();
        sheet.write_number(7, 5, 3_456_789.5).unwrap();
        sheet.write_string(7, 6, "-").unwrap();
        sheet.write_number(7, 7, 2.0).unwrap();
        workbook.save_to_buffer().unwrap()
    }

    #[test]
    fn xlsx_bytes_are_read_from_their_first_sheet() {
        let sheet = read_first_sheet(workbook_bytes()).unwrap();
        assert_eq!(sheet.start(), Some((2, 0)));

        let trades = parse_trades(&sheet, day(), 6).unwrap();
        assert_eq!(
            trades,
            vec![ParsedTrade {
                exchange_product_id: "A592UFM060F".to_string(),
                exchange_product_name: "Бензин (АИ-92-К5)".to_string(),
                delivery_basis_name: "ст. Уфа".to_string(),
                volume: 60,
                total: 3_456_790,
                count: 2,
                date: day(),
            }]
        );
    }

    #[test]
    fn garbage_bytes_are_not_a_workbook() {
        assert!(read_first_sheet(b"definitely not a spreadsheet".to_vec()).is_err());
    }
}

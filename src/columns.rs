//! Header names of the SPIMEX trading-results spreadsheets.
//!
//! Headers are compared after [`normalize_header`], so the multi-line headers
//! of the source files match the single-line names below.

/// The six spreadsheet columns every trading-results file must provide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NeededColumn {
    ExchangeProductId,
    ExchangeProductName,
    DeliveryBasisName,
    Volume,
    Total,
    Count,
}

impl NeededColumn {
    pub const ALL: [NeededColumn; 6] = [
        NeededColumn::ExchangeProductId,
        NeededColumn::ExchangeProductName,
        NeededColumn::DeliveryBasisName,
        NeededColumn::Volume,
        NeededColumn::Total,
        NeededColumn::Count,
    ];

    pub fn header(self) -> &'static str {
        match self {
            NeededColumn::ExchangeProductId => "Код Инструмента",
            NeededColumn::ExchangeProductName => "Наименование Инструмента",
            NeededColumn::DeliveryBasisName => "Базис поставки",
            NeededColumn::Volume => "Объем Договоров в единицах измерения",
            // The source files spell this one with a soft sign.
            NeededColumn::Total => "Обьем Договоров, руб.",
            NeededColumn::Count => "Количество Договоров, шт.",
        }
    }
}

/// Replace embedded line breaks with spaces and trim the result.
pub fn normalize_header(raw: &str) -> String {
    raw.replace("\r\n", " ")
        .replace(['\n', '\r'], " ")
        .trim()
        .to_string()
}

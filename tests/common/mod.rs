//! Shared test helpers: an in-memory repository, a scripted fetcher and record builders.
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use spimex_trades::SpimexError;
use spimex_trades::api::{AppState, Clock};
use spimex_trades::cache::{MemoryCache, ResponseCache};
use spimex_trades::config::Config;
use spimex_trades::db::filters::{Column, FieldValue, FilterOp, FilterValue, SortDirection, TradeQuery, TradeRow};
use spimex_trades::db::models::trading_results::NewTradingResultModel;
use spimex_trades::db::repository::TradeRepository;
use spimex_trades::ingestion::excel_parser::ParsedTrade;
use spimex_trades::ingestion::http_client::PageFetcher;
use rust_xlsxwriter::Workbook;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex};

pub fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn trade(exchange_product_id: &str, date: NaiveDate) -> ParsedTrade {
    ParsedTrade {
        exchange_product_id: exchange_product_id.to_string(),
        exchange_product_name: "Бензин (АИ-92-К5)".to_string(),
        delivery_basis_name: "ст. Уфа".to_string(),
        volume: 60,
        total: 3_456_789,
        count: 2,
        date,
    }
}

/// Repository backed by a vector, evaluating `TradeQuery` the way the SQL would.
#[derive(Default)]
pub struct InMemoryRepo {
    rows: Mutex<Vec<NewTradingResultModel>>,
    queries: AtomicUsize,
    inserts: AtomicUsize,
}

impl InMemoryRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn seeded(trades: &[ParsedTrade]) -> Self {
        let repo = Self::new();
        repo.insert_trades(trades).await.unwrap();
        repo.inserts.store(0, AtomicOrdering::SeqCst);
        repo
    }

    pub fn query_count(&self) -> usize {
        self.queries.load(AtomicOrdering::SeqCst)
    }

    pub fn insert_count(&self) -> usize {
        self.inserts.load(AtomicOrdering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.rows.lock().unwrap().len()
    }

    pub fn stored(&self) -> Vec<NewTradingResultModel> {
        self.rows.lock().unwrap().clone()
    }
}

fn to_row(model: &NewTradingResultModel) -> TradeRow {
    let stamp = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    TradeRow::from([
        (Column::Id, FieldValue::Uuid(model.id)),
        (Column::ExchangeProductId, FieldValue::Text(model.exchange_product_id.clone())),
        (Column::ExchangeProductName, FieldValue::Text(model.exchange_product_name.clone())),
        (Column::OilId, FieldValue::Text(model.oil_id.clone())),
        (Column::DeliveryBasisId, FieldValue::Text(model.delivery_basis_id.clone())),
        (Column::DeliveryBasisName, FieldValue::Text(model.delivery_basis_name.clone())),
        (Column::DeliveryTypeId, FieldValue::Text(model.delivery_type_id.clone())),
        (Column::Volume, FieldValue::Integer(model.volume)),
        (Column::Total, FieldValue::Integer(model.total)),
        (Column::Count, FieldValue::Integer(model.count)),
        (Column::Date, FieldValue::Date(model.date)),
        (Column::CreatedOn, FieldValue::Timestamp(stamp)),
        (Column::UpdatedOn, FieldValue::Timestamp(stamp)),
    ])
}

fn compare(field: &FieldValue, value: &FilterValue) -> Option<Ordering> {
    match (field, value) {
        (FieldValue::Text(a), FilterValue::Text(b)) => Some(a.cmp(b)),
        (FieldValue::Integer(a), FilterValue::Integer(b)) => Some(a.cmp(b)),
        (FieldValue::Date(a), FilterValue::Date(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

fn cmp_fields(a: &FieldValue, b: &FieldValue) -> Ordering {
    match (a, b) {
        (FieldValue::Text(a), FieldValue::Text(b)) => a.cmp(b),
        (FieldValue::Integer(a), FieldValue::Integer(b)) => a.cmp(b),
        (FieldValue::Date(a), FieldValue::Date(b)) => a.cmp(b),
        (FieldValue::Timestamp(a), FieldValue::Timestamp(b)) => a.cmp(b),
        (FieldValue::Uuid(a), FieldValue::Uuid(b)) => a.cmp(b),
        _ => Ordering::Equal,
    }
}

fn matches(field: &FieldValue, op: &FilterOp) -> bool {
    match op {
        FilterOp::Equals(v) => compare(field, v) == Some(Ordering::Equal),
        FilterOp::GreaterOrEqual(v) => matches!(compare(field, v), Some(Ordering::Greater | Ordering::Equal)),
        FilterOp::LessOrEqual(v) => matches!(compare(field, v), Some(Ordering::Less | Ordering::Equal)),
        FilterOp::ContainsIgnoreCase(needle) => match field {
            FieldValue::Text(text) => text.to_lowercase().contains(&needle.to_lowercase()),
            _ => false,
        },
    }
}

#[async_trait]
impl TradeRepository for InMemoryRepo {
    async fn has_trades(&self) -> Result<bool, SpimexError> {
        Ok(!self.rows.lock().unwrap().is_empty())
    }

    async fn insert_trades(&self, trades: &[ParsedTrade]) -> Result<u64, SpimexError> {
        let models = trades
            .iter()
            .map(NewTradingResultModel::from_parsed)
            .collect::<Result<Vec<_>, _>>()?;
        let inserted = models.len() as u64;
        self.rows.lock().unwrap().extend(models);
        self.inserts.fetch_add(1, AtomicOrdering::SeqCst);
        Ok(inserted)
    }

    async fn query_trades(&self, query: &TradeQuery) -> Result<Vec<TradeRow>, SpimexError> {
        query.validate()?;
        self.queries.fetch_add(1, AtomicOrdering::SeqCst);

        let mut rows: Vec<TradeRow> = self
            .rows
            .lock()
            .unwrap()
            .iter()
            .map(to_row)
            .filter(|row| {
                query
                    .conditions
                    .iter()
                    .all(|(column, ops)| ops.iter().all(|op| matches(&row[column], op)))
            })
            .collect();

        if let Some((column, direction)) = query.order_by {
            rows.sort_by(|a, b| {
                let ord = cmp_fields(&a[&column], &b[&column]);
                match direction {
                    SortDirection::Asc => ord,
                    SortDirection::Desc => ord.reverse(),
                }
            });
        }

        let projection = query.projection();
        let mut projected: Vec<TradeRow> = Vec::new();
        for row in rows {
            let row: TradeRow = projection.iter().map(|c| (*c, row[c].clone())).collect();
            if query.distinct && projected.contains(&row) {
                continue;
            }
            projected.push(row);
        }

        let offset = query.offset.unwrap_or(0) as usize;
        let limit = query.limit.map_or(usize::MAX, |l| l as usize);
        Ok(projected.into_iter().skip(offset).take(limit).collect())
    }
}

/// Serves canned listing pages and files; unknown URLs fail.
#[derive(Default)]
pub struct ScriptedFetcher {
    pages: HashMap<String, String>,
    files: HashMap<String, Vec<u8>>,
    fetches: AtomicUsize,
    requested: Mutex<Vec<String>>,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, url: &str, html: &str) -> Self {
        self.pages.insert(url.to_string(), html.to_string());
        self
    }

    pub fn file(mut self, url: &str, bytes: &[u8]) -> Self {
        self.files.insert(url.to_string(), bytes.to_vec());
        self
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(AtomicOrdering::SeqCst)
    }

    pub fn requested(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }

    fn record(&self, url: &str) {
        self.fetches.fetch_add(1, AtomicOrdering::SeqCst);
        self.requested.lock().unwrap().push(url.to_string());
    }
}

#[async_trait]
impl PageFetcher for ScriptedFetcher {
    async fn fetch_text(&self, url: &str) -> Result<String, SpimexError> {
        self.record(url);
        self.pages
            .get(url)
            .cloned()
            .ok_or_else(|| SpimexError::Config(format!("unscripted page {url}")))
    }

    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, SpimexError> {
        self.record(url);
        self.files
            .get(url)
            .cloned()
            .ok_or_else(|| SpimexError::Config(format!("unscripted file {url}")))
    }
}

/// Listing page markup in the SPIMEX accordion layout.
pub fn listing_page(links: &[(&str, &str)]) -> String {
    let items: String = links
        .iter()
        .map(|(href, date)| {
            format!(r#"<div class="accordeon-inner__item"><a href="{href}">Бюллетень</a><span>{date}</span></div>"#)
        })
        .collect();
    format!(
        r#"<html><body><div class="page-content__tabs__blocks"><div data-tabcontent>{items}</div></div></body></html>"#
    )
}

const BULLETIN_HEADERS: [&str; 8] = [
    "№\nп/п",
    "Код\nИнструмента",
    "Наименование\nИнструмента",
    "Базис\nпоставки",
    "Объем\nДоговоров\nв единицах\nизмерения",
    "Обьем\nДоговоров,\nруб.",
    "Изменение рыночной\nцены к цене\nпредыдуего\nдня",
    "Количество\nДоговоров,\nшт.",
];

/// One instrument line of a bulletin: id, volume, total in rubles, count cell text.
pub type BulletinRow<'a> = (&'a str, f64, f64, &'a str);

/// An `.xlsx` trading bulletin: six preamble rows, headers on sheet row 6,
/// then one line per instrument.
pub fn bulletin_xlsx(rows: &[BulletinRow]) -> Vec<u8> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.write_string(0, 0, "Бюллетень по итогам торгов").unwrap();
    sheet.write_string(1, 0, "в Секции «Нефтепродукты» АО «СПбМТСБ»").unwrap();
    sheet.write_string(3, 0, "Дата торгов: 09.01.2024").unwrap();
    sheet.write_string(5, 0, "Единица измерения: Метрическая тонна").unwrap();
    for (col, header) in BULLETIN_HEADERS.iter().enumerate() {
        sheet.write_string(6, col as u16, *header).unwrap();
    }
    for (i, (id, volume, total, count)) in rows.iter().enumerate() {
        let row = 7 + i as u32;
        sheet.write_number(row, 0, (i + 1) as f64).unwrap();
        sheet.write_string(row, 1, *id).unwrap();
        sheet.write_string(row, 2, "Бензин (АИ-92-К5)").unwrap();
        sheet.write_string(row, 3, "ст. Уфа").unwrap();
        sheet.write_number(row, 4, *volume).unwrap();
        sheet.write_number(row, 5, *total).unwrap();
        sheet.write_string(row, 6, "-").unwrap();
        sheet.write_string(row, 7, *count).unwrap();
    }
    workbook.save_to_buffer().unwrap()
}

pub struct TestClock(Mutex<DateTime<Utc>>);

impl TestClock {
    pub fn at(now: DateTime<Utc>) -> Arc<Self> {
        Arc::new(Self(Mutex::new(now)))
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.0.lock().unwrap() = now;
    }
}

impl Clock for TestClock {
    fn now(&self) -> DateTime<Utc> {
        *self.0.lock().unwrap()
    }
}

pub fn app_state(repo: Arc<InMemoryRepo>, clock: Arc<TestClock>) -> AppState {
    app_state_with(Config::default(), repo, clock)
}

pub fn app_state_with(config: Config, repo: Arc<InMemoryRepo>, clock: Arc<TestClock>) -> AppState {
    let config = Arc::new(config);
    let cache = ResponseCache::new(
        Arc::new(MemoryCache::new()),
        config.cache_prefix.clone(),
        config.cache_refresh_time,
    );
    AppState::new(config, repo, cache).with_clock(clock)
}

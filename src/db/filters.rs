//! Generic filtered queries over `spimex_trading_results`.
//!
//! A [`TradeQuery`] describes a projection, per-column conditions (combined
//! with `AND`), an optional `DISTINCT`, ordering and pagination. Conditions
//! come from the closed [`FilterOp`] set and every operand is bound as a
//! query parameter.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgRow;
use sqlx::{Postgres, QueryBuilder, Row};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::error::SpimexError;

pub const TRADING_RESULTS_TABLE: &str = "spimex_trading_results";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Column {
    Id,
    ExchangeProductId,
    ExchangeProductName,
    OilId,
    DeliveryBasisId,
    DeliveryBasisName,
    DeliveryTypeId,
    Volume,
    Total,
    Count,
    Date,
    CreatedOn,
    UpdatedOn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Uuid,
    Text,
    Integer,
    Date,
    Timestamp,
}

impl Column {
    pub const ALL: [Column; 13] = [
        Column::Id,
        Column::ExchangeProductId,
        Column::ExchangeProductName,
        Column::OilId,
        Column::DeliveryBasisId,
        Column::DeliveryBasisName,
        Column::DeliveryTypeId,
        Column::Volume,
        Column::Total,
        Column::Count,
        Column::Date,
        Column::CreatedOn,
        Column::UpdatedOn,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Column::Id => "id",
            Column::ExchangeProductId => "exchange_product_id",
            Column::ExchangeProductName => "exchange_product_name",
            Column::OilId => "oil_id",
            Column::DeliveryBasisId => "delivery_basis_id",
            Column::DeliveryBasisName => "delivery_basis_name",
            Column::DeliveryTypeId => "delivery_type_id",
            Column::Volume => "volume",
            Column::Total => "total",
            Column::Count => "count",
            Column::Date => "date",
            Column::CreatedOn => "created_on",
            Column::UpdatedOn => "updated_on",
        }
    }

    pub fn kind(self) -> ColumnKind {
        match self {
            Column::Id => ColumnKind::Uuid,
            Column::ExchangeProductId
            | Column::ExchangeProductName
            | Column::OilId
            | Column::DeliveryBasisId
            | Column::DeliveryBasisName
            | Column::DeliveryTypeId => ColumnKind::Text,
            Column::Volume | Column::Total | Column::Count => ColumnKind::Integer,
            Column::Date => ColumnKind::Date,
            Column::CreatedOn | Column::UpdatedOn => ColumnKind::Timestamp,
        }
    }

    fn push_ident(self, qb: &mut QueryBuilder<'_, Postgres>) {
        qb.push('"').push(self.as_str()).push('"');
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    Text(String),
    Integer(i64),
    Date(NaiveDate),
}

impl FilterValue {
    fn kind(&self) -> ColumnKind {
        match self {
            FilterValue::Text(_) => ColumnKind::Text,
            FilterValue::Integer(_) => ColumnKind::Integer,
            FilterValue::Date(_) => ColumnKind::Date,
        }
    }

    fn push_bind(&self, qb: &mut QueryBuilder<'_, Postgres>) {
        match self {
            FilterValue::Text(v) => qb.push_bind(v.clone()),
            FilterValue::Integer(v) => qb.push_bind(*v),
            FilterValue::Date(v) => qb.push_bind(*v),
        };
    }
}

impl From<&str> for FilterValue {
    fn from(value: &str) -> Self {
        FilterValue::Text(value.to_string())
    }
}

impl From<String> for FilterValue {
    fn from(value: String) -> Self {
        FilterValue::Text(value)
    }
}

impl From<i64> for FilterValue {
    fn from(value: i64) -> Self {
        FilterValue::Integer(value)
    }
}

impl From<NaiveDate> for FilterValue {
    fn from(value: NaiveDate) -> Self {
        FilterValue::Date(value)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FilterOp {
    Equals(FilterValue),
    /// Case-insensitive substring match; `%` and `_` in the needle are literal.
    ContainsIgnoreCase(String),
    GreaterOrEqual(FilterValue),
    LessOrEqual(FilterValue),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    fn sql(self) -> &'static str {
        match self {
            SortDirection::Asc => " ASC",
            SortDirection::Desc => " DESC",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TradeQuery {
    /// Empty means every column.
    pub columns: Vec<Column>,
    pub conditions: BTreeMap<Column, Vec<FilterOp>>,
    pub distinct: bool,
    pub order_by: Option<(Column, SortDirection)>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl TradeQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn select(mut self, columns: impl IntoIterator<Item = Column>) -> Self {
        self.columns = columns.into_iter().collect();
        self
    }

    pub fn filter(mut self, column: Column, op: FilterOp) -> Self {
        self.conditions.entry(column).or_default().push(op);
        self
    }

    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    pub fn order_by(mut self, column: Column, direction: SortDirection) -> Self {
        self.order_by = Some((column, direction));
        self
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: i64) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn projection(&self) -> Vec<Column> {
        if self.columns.is_empty() {
            Column::ALL.to_vec()
        } else {
            self.columns.clone()
        }
    }

    pub fn validate(&self) -> Result<(), SpimexError> {
        if let Some((column, _)) = self.order_by {
            if self.distinct && !self.projection().contains(&column) {
                return Err(SpimexError::InvalidQuery(format!(
                    "DISTINCT query cannot be ordered by unselected column {}",
                    column.as_str()
                )));
            }
        }

        for (column, ops) in &self.conditions {
            for op in ops {
                let operand_kind = match op {
                    FilterOp::ContainsIgnoreCase(_) => ColumnKind::Text,
                    FilterOp::Equals(v) | FilterOp::GreaterOrEqual(v) | FilterOp::LessOrEqual(v) => v.kind(),
                };
                if operand_kind != column.kind() {
                    return Err(SpimexError::InvalidQuery(format!(
                        "{op:?} does not apply to column {}",
                        column.as_str()
                    )));
                }
            }
        }

        if self.limit.is_some_and(|l| l < 0) || self.offset.is_some_and(|o| o < 0) {
            return Err(SpimexError::InvalidQuery("limit and offset must not be negative".to_string()));
        }
        Ok(())
    }

    /// Validate and render the query with all operands bound.
    pub fn to_query_builder(&self) -> Result<QueryBuilder<'static, Postgres>, SpimexError> {
        self.validate()?;

        let mut qb = QueryBuilder::new("SELECT ");
        if self.distinct {
            qb.push("DISTINCT ");
        }
        for (i, column) in self.projection().into_iter().enumerate() {
            if i > 0 {
                qb.push(", ");
            }
            column.push_ident(&mut qb);
        }
        qb.push(" FROM ").push(TRADING_RESULTS_TABLE);

        let mut first = true;
        for (column, ops) in &self.conditions {
            for op in ops {
                qb.push(if first { " WHERE " } else { " AND " });
                first = false;
                column.push_ident(&mut qb);
                match op {
                    FilterOp::Equals(value) => {
                        qb.push(" = ");
                        value.push_bind(&mut qb);
                    }
                    FilterOp::ContainsIgnoreCase(needle) => {
                        qb.push(" ILIKE ");
                        qb.push_bind(format!("%{}%", escape_like(needle)));
                    }
                    FilterOp::GreaterOrEqual(value) => {
                        qb.push(" >= ");
                        value.push_bind(&mut qb);
                    }
                    FilterOp::LessOrEqual(value) => {
                        qb.push(" <= ");
                        value.push_bind(&mut qb);
                    }
                }
            }
        }

        if let Some((column, direction)) = self.order_by {
            qb.push(" ORDER BY ");
            column.push_ident(&mut qb);
            qb.push(direction.sql());
        }
        if let Some(limit) = self.limit {
            qb.push(" LIMIT ").push_bind(limit);
        }
        if let Some(offset) = self.offset {
            qb.push(" OFFSET ").push_bind(offset);
        }
        Ok(qb)
    }
}

fn escape_like(needle: &str) -> String {
    let mut escaped = String::with_capacity(needle.len());
    for c in needle.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// A single value of a result row.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Uuid(Uuid),
    Text(String),
    Integer(i64),
    Date(NaiveDate),
    Timestamp(DateTime<Utc>),
}

/// One result row keyed by column; serializes as a JSON object.
pub type TradeRow = BTreeMap<Column, FieldValue>;

pub fn decode_row(row: &PgRow, columns: &[Column]) -> Result<TradeRow, sqlx::Error> {
    let mut decoded = TradeRow::new();
    for &column in columns {
        let name = column.as_str();
        let value = match column.kind() {
            ColumnKind::Uuid => FieldValue::Uuid(row.try_get(name)?),
            ColumnKind::Text => FieldValue::Text(row.try_get(name)?),
            ColumnKind::Integer => FieldValue::Integer(row.try_get(name)?),
            ColumnKind::Date => FieldValue::Date(row.try_get(name)?),
            ColumnKind::Timestamp => FieldValue::Timestamp(row.try_get(name)?),
        };
        decoded.insert(column, value);
    }
    Ok(decoded)
}

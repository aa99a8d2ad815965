use chrono::NaiveDate;
use uuid::Uuid;

use crate::error::SpimexError;
use crate::ingestion::excel_parser::ParsedTrade;

/// Parts encoded in an exchange product id such as `A592UFM060F`:
/// oil code (4 chars), delivery basis code (3 chars) and delivery type (last char).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductCode {
    pub oil_id: String,
    pub delivery_basis_id: String,
    pub delivery_type_id: String,
}

impl ProductCode {
    pub const MIN_LEN: usize = 8;

    pub fn parse(exchange_product_id: &str) -> Option<Self> {
        let chars: Vec<char> = exchange_product_id.chars().collect();
        if chars.len() < Self::MIN_LEN {
            return None;
        }
        Some(Self {
            oil_id: chars[0..4].iter().collect(),
            delivery_basis_id: chars[4..7].iter().collect(),
            delivery_type_id: chars[chars.len() - 1].to_string(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct NewTradingResultModel {
    pub id: Uuid,
    pub exchange_product_id: String,
    pub exchange_product_name: String,
    pub oil_id: String,
    pub delivery_basis_id: String,
    pub delivery_basis_name: String,
    pub delivery_type_id: String,
    pub volume: i64,
    pub total: i64,
    pub count: i64,
    pub date: NaiveDate,
}

impl NewTradingResultModel {
    pub fn from_parsed(trade: &ParsedTrade) -> Result<Self, SpimexError> {
        let code = ProductCode::parse(&trade.exchange_product_id)
            .ok_or_else(|| SpimexError::InvalidProductId(trade.exchange_product_id.clone()))?;

        Ok(Self {
            id: Uuid::new_v4(),
            exchange_product_id: trade.exchange_product_id.clone(),
            exchange_product_name: trade.exchange_product_name.clone(),
            oil_id: code.oil_id,
            delivery_basis_id: code.delivery_basis_id,
            delivery_basis_name: trade.delivery_basis_name.clone(),
            delivery_type_id: code.delivery_type_id,
            volume: trade.volume,
            total: trade.total,
            count: trade.count,
            date: trade.date,
        })
    }
}

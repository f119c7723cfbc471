use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub display_name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Portfolio {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Portfolio with child aggregates, as listed/read by the API
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct PortfolioSummary {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub investment_count: i64,
    pub total_invested: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct NewPortfolio {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePortfolio {
    pub name: Option<String>,
    pub description: Option<String>,
}

/// Investment row. The legacy `user_id` column from the pre-portfolio
/// schema generation is intentionally absent: new code never reads or
/// writes it.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Investment {
    pub id: i64,
    pub portfolio_id: Option<i64>,
    pub name: String,
    pub description: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub amount: Decimal,
    pub investment_type: String,
    pub ticker_symbol: Option<String>,
    pub shares: Option<Decimal>,
    pub current_price: Option<Decimal>,
    pub price_updated_at: Option<DateTime<Utc>>,
    pub has_distributions: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Investment with derived distribution/return figures
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct InvestmentDetail {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub investment: Investment,
    pub total_distributions: Decimal,
    pub current_return: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct NewInvestment {
    pub portfolio_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub amount: Decimal,
    #[serde(default)]
    pub investment_type: String,
    pub ticker_symbol: Option<String>,
    pub shares: Option<Decimal>,
    #[serde(default)]
    pub has_distributions: bool,
    #[serde(default)]
    pub category_ids: Vec<i64>,
    #[serde(default)]
    pub tag_ids: Vec<i64>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateInvestment {
    pub portfolio_id: Option<i64>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub amount: Option<Decimal>,
    pub investment_type: Option<String>,
    pub ticker_symbol: Option<String>,
    pub shares: Option<Decimal>,
    pub has_distributions: Option<bool>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Distribution {
    pub id: i64,
    pub investment_id: i64,
    pub distribution_date: NaiveDate,
    pub amount: Decimal,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct NewDistribution {
    pub distribution_date: NaiveDate,
    pub amount: Decimal,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateDistribution {
    pub distribution_date: Option<NaiveDate>,
    pub amount: Option<Decimal>,
    pub description: Option<String>,
}

/// User-scoped label row; the same shape backs categories, tags and
/// investment types.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Label {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct NewLabel {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct PortfolioSnapshot {
    pub id: i64,
    pub portfolio_id: i64,
    pub snapshot_date: NaiveDate,
    pub total_value: Decimal,
    pub total_invested: Decimal,
    pub total_distributions: Decimal,
    pub investment_count: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct UserSnapshot {
    pub id: i64,
    pub user_id: i64,
    pub snapshot_date: NaiveDate,
    pub total_value: Decimal,
    pub total_invested: Decimal,
    pub total_distributions: Decimal,
    pub investment_count: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct InvestmentSnapshot {
    pub id: i64,
    pub investment_id: i64,
    pub snapshot_date: NaiveDate,
    pub total_value: Decimal,
    pub total_invested: Decimal,
    pub total_distributions: Decimal,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn new_investment_defaults_optional_payload_fields() {
        let payload: NewInvestment = serde_json::from_value(serde_json::json!({
            "portfolio_id": 1,
            "name": "AAPL shares",
            "amount": "1000.00"
        }))
        .unwrap();

        assert_eq!(payload.amount, dec!(1000.00));
        assert_eq!(payload.investment_type, "");
        assert!(!payload.has_distributions);
        assert!(payload.category_ids.is_empty());
        assert!(payload.tag_ids.is_empty());
    }

    #[test]
    fn investment_detail_flattens_into_one_object() {
        let investment = Investment {
            id: 1,
            portfolio_id: Some(2),
            name: "AAPL shares".into(),
            description: None,
            start_date: None,
            amount: dec!(1000),
            investment_type: "stocks".into(),
            ticker_symbol: Some("AAPL".into()),
            shares: None,
            current_price: None,
            price_updated_at: None,
            has_distributions: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let detail = InvestmentDetail {
            investment,
            total_distributions: dec!(25.50),
            current_return: dec!(-974.50),
        };

        let v = serde_json::to_value(&detail).unwrap();
        assert_eq!(v["name"], "AAPL shares");
        assert_eq!(v["total_distributions"], "25.50");
        assert_eq!(v["current_return"], "-974.50");
    }
}

mod common;

use anyhow::Result;
use reqwest::StatusCode;
use rust_decimal::Decimal;
use serde_json::json;

async fn create_portfolio(client: &reqwest::Client, base_url: &str) -> Result<i64> {
    let res = client
        .post(format!("{}/api/portfolios", base_url))
        .json(&json!({ "name": common::unique("Holdings") }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::CREATED);
    Ok(res.json::<serde_json::Value>().await?["data"]["id"]
        .as_i64()
        .expect("portfolio id"))
}

#[tokio::test]
async fn negative_amount_is_rejected() -> Result<()> {
    let server = common::ensure_server().await?;
    if !server.db_ready().await {
        return Ok(());
    }
    let client = reqwest::Client::new();
    let portfolio_id = create_portfolio(&client, &server.base_url).await?;

    let res = client
        .post(format!("{}/api/investments", server.base_url))
        .json(&json!({
            "portfolio_id": portfolio_id,
            "name": common::unique("Bad"),
            "amount": "-5.00",
        }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    Ok(())
}

#[tokio::test]
async fn distributions_feed_current_return() -> Result<()> {
    let server = common::ensure_server().await?;
    if !server.db_ready().await {
        return Ok(());
    }
    let client = reqwest::Client::new();
    let portfolio_id = create_portfolio(&client, &server.base_url).await?;

    let res = client
        .post(format!("{}/api/investments", server.base_url))
        .json(&json!({
            "portfolio_id": portfolio_id,
            "name": common::unique("Bond ladder"),
            "amount": "1000.00",
            "has_distributions": true,
        }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::CREATED);
    let investment_id = res.json::<serde_json::Value>().await?["data"]["id"]
        .as_i64()
        .unwrap();

    let res = client
        .post(format!(
            "{}/api/investments/{}/distributions",
            server.base_url, investment_id
        ))
        .json(&json!({ "distribution_date": "2026-03-01", "amount": "25.50" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::CREATED);

    // Unpriced holding: return is distributions minus principal
    let res = client
        .get(format!("{}/api/investments/{}", server.base_url, investment_id))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body = res.json::<serde_json::Value>().await?;
    let current_return: Decimal = body["data"]["current_return"]
        .as_str()
        .expect("decimal serialized as string")
        .parse()?;
    assert_eq!(current_return, "-974.50".parse::<Decimal>()?);

    Ok(())
}

#[tokio::test]
async fn detail_includes_attached_labels() -> Result<()> {
    let server = common::ensure_server().await?;
    if !server.db_ready().await {
        return Ok(());
    }
    let client = reqwest::Client::new();
    let portfolio_id = create_portfolio(&client, &server.base_url).await?;

    let res = client
        .post(format!("{}/api/categories", server.base_url))
        .json(&json!({ "name": common::unique("Equities") }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::CREATED);
    let category_id = res.json::<serde_json::Value>().await?["data"]["id"]
        .as_i64()
        .unwrap();

    let res = client
        .post(format!("{}/api/investments", server.base_url))
        .json(&json!({
            "portfolio_id": portfolio_id,
            "name": common::unique("Tracker"),
            "amount": "500.00",
            "category_ids": [category_id],
        }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::CREATED);
    let investment_id = res.json::<serde_json::Value>().await?["data"]["id"]
        .as_i64()
        .unwrap();

    let res = client
        .get(format!("{}/api/investments/{}", server.base_url, investment_id))
        .send()
        .await?;
    let body = res.json::<serde_json::Value>().await?;
    let categories = body["data"]["categories"].as_array().unwrap();
    assert!(
        categories.iter().any(|c| c["id"].as_i64() == Some(category_id)),
        "attached category missing: {}",
        body
    );

    Ok(())
}

#[tokio::test]
async fn list_filters_by_portfolio() -> Result<()> {
    let server = common::ensure_server().await?;
    if !server.db_ready().await {
        return Ok(());
    }
    let client = reqwest::Client::new();
    let first = create_portfolio(&client, &server.base_url).await?;
    let second = create_portfolio(&client, &server.base_url).await?;

    for portfolio_id in [first, second] {
        let res = client
            .post(format!("{}/api/investments", server.base_url))
            .json(&json!({
                "portfolio_id": portfolio_id,
                "name": common::unique("Split"),
                "amount": "10.00",
            }))
            .send()
            .await?;
        assert_eq!(res.status(), StatusCode::CREATED);
    }

    let res = client
        .get(format!(
            "{}/api/investments?portfolio_id={}",
            server.base_url, first
        ))
        .send()
        .await?;
    let body = res.json::<serde_json::Value>().await?;
    let rows = body["data"].as_array().unwrap();
    assert!(!rows.is_empty());
    assert!(rows
        .iter()
        .all(|r| r["portfolio_id"].as_i64() == Some(first)));

    Ok(())
}

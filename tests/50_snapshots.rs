mod common;

use anyhow::Result;
use reqwest::StatusCode;
use rust_decimal::Decimal;
use serde_json::json;

#[tokio::test]
async fn run_populates_portfolio_and_user_history() -> Result<()> {
    let server = common::ensure_server().await?;
    if !server.db_ready().await {
        return Ok(());
    }
    let client = reqwest::Client::new();

    let res = client
        .post(format!("{}/api/portfolios", server.base_url))
        .json(&json!({ "name": common::unique("Snapped") }))
        .send()
        .await?;
    let portfolio_id = res.json::<serde_json::Value>().await?["data"]["id"]
        .as_i64()
        .unwrap();

    let res = client
        .post(format!("{}/api/investments", server.base_url))
        .json(&json!({
            "portfolio_id": portfolio_id,
            "name": common::unique("Principal"),
            "amount": "250.00",
        }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::CREATED);
    let investment_id = res.json::<serde_json::Value>().await?["data"]["id"]
        .as_i64()
        .unwrap();

    let res = client
        .post(format!("{}/api/snapshots/run", server.base_url))
        .json(&json!({ "date": "2026-08-20" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body = res.json::<serde_json::Value>().await?;
    assert!(body["data"]["portfolios"].as_u64().unwrap() >= 1);

    let res = client
        .get(format!(
            "{}/api/snapshots/portfolios/{}",
            server.base_url, portfolio_id
        ))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body = res.json::<serde_json::Value>().await?;
    let rows = body["data"].as_array().unwrap();
    let snap = rows
        .iter()
        .find(|s| s["snapshot_date"].as_str() == Some("2026-08-20"))
        .expect("snapshot row for requested date");
    // Unpriced holding is valued at principal
    let total_value: Decimal = snap["total_value"].as_str().unwrap().parse()?;
    assert_eq!(total_value, "250.00".parse::<Decimal>()?);
    assert_eq!(snap["investment_count"].as_i64(), Some(1));

    // Per-investment history is written by the same run
    let res = client
        .get(format!(
            "{}/api/snapshots/investments/{}",
            server.base_url, investment_id
        ))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body = res.json::<serde_json::Value>().await?;
    let snap = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .find(|s| s["snapshot_date"].as_str() == Some("2026-08-20"))
        .expect("investment snapshot row for requested date");
    let total_value: Decimal = snap["total_value"].as_str().unwrap().parse()?;
    assert_eq!(total_value, "250.00".parse::<Decimal>()?);

    // The user-level row lands in the same batch as the portfolio rows
    let res = client
        .get(format!("{}/api/snapshots/user", server.base_url))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body = res.json::<serde_json::Value>().await?;
    assert!(body["data"]
        .as_array()
        .unwrap()
        .iter()
        .any(|s| s["snapshot_date"].as_str() == Some("2026-08-20")));

    Ok(())
}

/// Re-running the same date replaces the rows instead of stacking them.
#[tokio::test]
async fn rerun_upserts_by_date() -> Result<()> {
    let server = common::ensure_server().await?;
    if !server.db_ready().await {
        return Ok(());
    }
    let client = reqwest::Client::new();

    let res = client
        .post(format!("{}/api/portfolios", server.base_url))
        .json(&json!({ "name": common::unique("Rerun") }))
        .send()
        .await?;
    let portfolio_id = res.json::<serde_json::Value>().await?["data"]["id"]
        .as_i64()
        .unwrap();

    for _ in 0..2 {
        let res = client
            .post(format!("{}/api/snapshots/run", server.base_url))
            .json(&json!({ "date": "2026-08-21" }))
            .send()
            .await?;
        assert_eq!(res.status(), StatusCode::OK);
    }

    let res = client
        .get(format!(
            "{}/api/snapshots/portfolios/{}",
            server.base_url, portfolio_id
        ))
        .send()
        .await?;
    let body = res.json::<serde_json::Value>().await?;
    let matching = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|s| s["snapshot_date"].as_str() == Some("2026-08-21"))
        .count();
    assert_eq!(matching, 1);

    Ok(())
}

mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::json;

#[tokio::test]
async fn portfolio_crud_lifecycle() -> Result<()> {
    let server = common::ensure_server().await?;
    if !server.db_ready().await {
        return Ok(());
    }
    let client = reqwest::Client::new();

    let name = common::unique("Retirement");
    let res = client
        .post(format!("{}/api/portfolios", server.base_url))
        .json(&json!({ "name": name, "description": "long horizon" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::CREATED, "create failed");
    let body = res.json::<serde_json::Value>().await?;
    let id = body["data"]["id"].as_i64().expect("portfolio id");

    // Listing includes summary figures for the empty portfolio
    let res = client
        .get(format!("{}/api/portfolios", server.base_url))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body = res.json::<serde_json::Value>().await?;
    let listed = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .find(|p| p["id"].as_i64() == Some(id))
        .cloned()
        .expect("created portfolio in list");
    assert_eq!(listed["investment_count"].as_i64(), Some(0));

    // Update only the description, name is untouched
    let res = client
        .put(format!("{}/api/portfolios/{}", server.base_url, id))
        .json(&json!({ "description": "updated" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body = res.json::<serde_json::Value>().await?;
    assert_eq!(body["data"]["name"].as_str(), Some(name.as_str()));
    assert_eq!(body["data"]["description"].as_str(), Some("updated"));

    let res = client
        .delete(format!("{}/api/portfolios/{}", server.base_url, id))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);

    let res = client
        .get(format!("{}/api/portfolios/{}", server.base_url, id))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    Ok(())
}

#[tokio::test]
async fn duplicate_portfolio_name_conflicts() -> Result<()> {
    let server = common::ensure_server().await?;
    if !server.db_ready().await {
        return Ok(());
    }
    let client = reqwest::Client::new();

    let name = common::unique("Duped");
    for expected in [StatusCode::CREATED, StatusCode::CONFLICT] {
        let res = client
            .post(format!("{}/api/portfolios", server.base_url))
            .json(&json!({ "name": name }))
            .send()
            .await?;
        assert_eq!(res.status(), expected);
    }

    Ok(())
}

#[tokio::test]
async fn portfolio_with_investments_refuses_delete() -> Result<()> {
    let server = common::ensure_server().await?;
    if !server.db_ready().await {
        return Ok(());
    }
    let client = reqwest::Client::new();

    let res = client
        .post(format!("{}/api/portfolios", server.base_url))
        .json(&json!({ "name": common::unique("Guarded") }))
        .send()
        .await?;
    let portfolio_id = res.json::<serde_json::Value>().await?["data"]["id"]
        .as_i64()
        .unwrap();

    let res = client
        .post(format!("{}/api/investments", server.base_url))
        .json(&json!({
            "portfolio_id": portfolio_id,
            "name": common::unique("Index fund"),
            "amount": "1000.00",
        }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::CREATED);

    let res = client
        .delete(format!("{}/api/portfolios/{}", server.base_url, portfolio_id))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::CONFLICT, "non-empty delete must fail");

    Ok(())
}

use super::*;
use axum::http::StatusCode;
use restock_watcher::models::NewTrackedItem;
use restock_watcher::web::create_router;
use serde_json::json;

#[tokio::test]
async fn test_health_check() -> anyhow::Result<()> {
    let app = create_test_app().await?;
    let router = create_router(app.state.clone());

    let response = make_request(&router, Method::GET, "/health", None).await?;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await?;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "restock-watcher");
    assert_eq!(body["tracked_items"], 0);
    assert_eq!(body["poll_interval"], "0 */5 * * * *");

    Ok(())
}

#[tokio::test]
async fn test_track_and_list_items() -> anyhow::Result<()> {
    let app = create_test_app().await?;
    let router = create_router(app.state.clone());

    let request = json!({ "url": product_url("440123"), "size": "m" });
    let response = make_request(
        &router,
        Method::POST,
        "/api/v1/items",
        Some(request.to_string()),
    )
    .await?;
    assert_eq!(response.status(), StatusCode::CREATED);

    let created = body_json(response).await?;
    assert_eq!(created["success"], true);
    assert_eq!(created["data"]["target_size"], "M"); // uppercased
    assert_eq!(created["data"]["state"], "pending");
    let id = created["data"]["id"].as_str().unwrap().to_string();
    assert_eq!(id.len(), 32);

    let response = make_request(&router, Method::GET, "/api/v1/items", None).await?;
    assert_eq!(response.status(), StatusCode::OK);
    let listed = body_json(response).await?;
    assert_eq!(listed["data"].as_array().unwrap().len(), 1);
    assert_eq!(listed["data"][0]["id"], id.as_str());

    Ok(())
}

#[tokio::test]
async fn test_track_item_validation() -> anyhow::Result<()> {
    let app = create_test_app().await?;
    let router = create_router(app.state.clone());

    let cases = [
        json!({ "url": "not a url", "size": "M" }),
        json!({ "url": "https://www.example.com/shop/overshirt-p440123.html", "size": "M" }),
        json!({ "url": product_url("440123"), "size": "   " }),
    ];
    for case in cases {
        let response = make_request(
            &router,
            Method::POST,
            "/api/v1/items",
            Some(case.to_string()),
        )
        .await?;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = body_json(response).await?;
        assert_eq!(body["success"], false);
        assert_eq!(body["error"]["code"], "BAD_REQUEST");
    }

    // A body that does not fit the request shape is rejected before validation
    let response =
        make_request(&router, Method::POST, "/api/v1/items", Some("{}".to_string())).await?;
    assert!(response.status().is_client_error());

    let response = make_request(&router, Method::GET, "/api/v1/items", None).await?;
    let listed = body_json(response).await?;
    assert!(listed["data"].as_array().unwrap().is_empty());

    Ok(())
}

#[tokio::test]
async fn test_untrack_item() -> anyhow::Result<()> {
    let app = create_test_app().await?;
    let router = create_router(app.state.clone());

    let request = json!({ "url": product_url("440123"), "size": "M" });
    let response = make_request(
        &router,
        Method::POST,
        "/api/v1/items",
        Some(request.to_string()),
    )
    .await?;
    let created = body_json(response).await?;
    let id = created["data"]["id"].as_str().unwrap().to_string();

    let response =
        make_request(&router, Method::DELETE, &format!("/api/v1/items/{id}"), None).await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await?;
    assert_eq!(body["data"]["id"], id.as_str());

    // Deleting again reports the missing item
    let response =
        make_request(&router, Method::DELETE, &format!("/api/v1/items/{id}"), None).await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_json(response).await?;
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
    assert!(body["error"]["message"].as_str().unwrap().contains("not found"));

    let response = make_request(&router, Method::GET, "/api/v1/items", None).await?;
    let listed = body_json(response).await?;
    assert!(listed["data"].as_array().unwrap().is_empty());

    Ok(())
}

#[tokio::test]
async fn test_cycle_endpoint_reports_summary() -> anyhow::Result<()> {
    let app = create_test_app().await?;
    let router = create_router(app.state.clone());

    let hit = app
        .controller
        .track(NewTrackedItem {
            url: product_url("440123"),
            size: "M".to_string(),
        })
        .await?;
    let miss = app
        .controller
        .track(NewTrackedItem {
            url: product_url("557801"),
            size: "XL".to_string(),
        })
        .await?;
    app.probe.script(
        &hit.url,
        offered_outcome(SizeLabel::M, 44_012_303, "in_stock", true),
    );
    app.probe.script(&miss.url, not_offered_outcome());

    let response = make_request(&router, Method::POST, "/api/v1/cycle", None).await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await?;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["checked"], 2);
    assert_eq!(body["data"]["in_stock"], 1);
    assert_eq!(body["data"]["failures"], 0);

    let response = make_request(&router, Method::GET, "/api/v1/items", None).await?;
    let listed = body_json(response).await?;
    let states: Vec<&str> = listed["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|item| item["state"].as_str().unwrap())
        .collect();
    assert!(states.contains(&"notified"));
    assert!(states.contains(&"pending"));

    Ok(())
}

#[tokio::test]
async fn test_cycle_conflict_while_running() -> anyhow::Result<()> {
    let app = create_test_app_with_probe_delay(Duration::from_millis(200)).await?;
    let router = create_router(app.state.clone());

    let item = app
        .controller
        .track(NewTrackedItem {
            url: product_url("440123"),
            size: "M".to_string(),
        })
        .await?;
    app.probe.script(&item.url, not_offered_outcome());

    let slow = make_request(&router, Method::POST, "/api/v1/cycle", None);
    let blocked = async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        make_request(&router, Method::POST, "/api/v1/cycle", None).await
    };
    let (slow, blocked) = tokio::join!(slow, blocked);

    assert_eq!(slow?.status(), StatusCode::OK);
    let blocked = blocked?;
    assert_eq!(blocked.status(), StatusCode::CONFLICT);
    let body = body_json(blocked).await?;
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "CONFLICT");
    assert_eq!(body["error"]["message"], "A poll cycle is already running");

    Ok(())
}

//! End-to-end tests of the forecast API over real sockets.

use axum::{routing::get, Router};
use chrono::{Days, Local, NaiveDate};
use serde_json::Value;

use family_copilot::apiservice::{FORECAST_PATH, OPENAPI_PATH};
use family_copilot::config::Environment;
use family_copilot::defaults::StartupContext;
use family_copilot::forecast::SUMMARIES;
use family_copilot::http::{HttpServer, PROBLEM_CONTENT_TYPE, X_REQUEST_ID};
use family_copilot::lifecycle::Shutdown;

mod common;

#[tokio::test]
async fn test_five_forecasts_from_tomorrow() {
    let (addr, shutdown) = common::spawn_apiservice(Environment::Development).await;
    let before = Local::now().date_naive();

    let res = common::plain_client()
        .get(format!("http://{}{}", addr, FORECAST_PATH))
        .send()
        .await
        .unwrap();
    let after = Local::now().date_naive();

    assert_eq!(res.status(), 200);
    assert!(res.headers().contains_key(X_REQUEST_ID));
    let items: Vec<Value> = res.json().await.unwrap();
    assert_eq!(items.len(), 5);

    let dates: Vec<NaiveDate> = items
        .iter()
        .map(|item| item["date"].as_str().unwrap().parse().unwrap())
        .collect();
    let tomorrow = |d: NaiveDate| d.checked_add_days(Days::new(1)).unwrap();
    assert!(dates[0] == tomorrow(before) || dates[0] == tomorrow(after));
    for pair in dates.windows(2) {
        assert_eq!(pair[1], tomorrow(pair[0]));
    }

    for item in &items {
        let c = item["temperatureC"].as_i64().unwrap();
        assert!((-20..55).contains(&c), "temperature {c} out of range");
        assert_eq!(
            item["temperatureF"].as_i64().unwrap(),
            32 + (c as f64 / 0.5556) as i64
        );
        assert!(SUMMARIES.contains(&item["summary"].as_str().unwrap()));
    }

    shutdown.trigger();
}

#[tokio::test]
async fn test_probes_only_in_development() {
    let client = common::plain_client();

    let (dev, dev_shutdown) = common::spawn_apiservice(Environment::Development).await;
    for path in ["/health", "/alive"] {
        let res = client.get(format!("http://{dev}{path}")).send().await.unwrap();
        assert_eq!(res.status(), 200, "{path}");
        assert_eq!(res.text().await.unwrap(), "Healthy");
    }
    let res = client.get(format!("http://{dev}{OPENAPI_PATH}")).send().await.unwrap();
    assert_eq!(res.status(), 200);

    let (prod, prod_shutdown) = common::spawn_apiservice(Environment::Production).await;
    for path in ["/health", "/alive", OPENAPI_PATH] {
        let res = client.get(format!("http://{prod}{path}")).send().await.unwrap();
        assert_eq!(res.status(), 404, "{path}");
    }
    let res = client.get(format!("http://{prod}{FORECAST_PATH}")).send().await.unwrap();
    assert_eq!(res.status(), 200);

    dev_shutdown.trigger();
    prod_shutdown.trigger();
}

async fn explode() -> &'static str {
    panic!("forecast generator exploded")
}

#[tokio::test]
async fn test_unhandled_failure_becomes_problem_details() {
    let config = common::service_config("apiservice", Environment::Production);
    let mut ctx = StartupContext::new(config);
    ctx.apply_service_defaults();
    let router = ctx.finish_router(Router::new().route("/explode", get(explode)));

    let (listener, addr) = common::ephemeral_listener().await;
    let shutdown = Shutdown::new();
    let signal = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = HttpServer::new("apiservice", router).run(listener, signal).await;
    });

    let res = common::plain_client()
        .get(format!("http://{addr}/explode"))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 500);
    assert_eq!(
        res.headers().get("content-type").unwrap(),
        PROBLEM_CONTENT_TYPE
    );
    let request_id = res.headers().get(X_REQUEST_ID).cloned();
    let problem: Value = res.json().await.unwrap();
    assert_eq!(problem["status"], 500);
    assert!(problem["title"].is_string());
    assert!(problem["traceId"].is_string());
    assert!(!problem.to_string().contains("exploded"));
    assert!(request_id.is_some());

    shutdown.trigger();
}

#[tokio::test]
async fn test_server_stops_on_shutdown() {
    let (addr, shutdown) = common::spawn_apiservice(Environment::Development).await;
    let client = common::plain_client();
    assert!(client
        .get(format!("http://{addr}/alive"))
        .send()
        .await
        .is_ok());

    shutdown.trigger();
    tokio::time::sleep(std::time::Duration::from_millis(200)).await;
    assert!(client.get(format!("http://{addr}/alive")).send().await.is_err());
}

mod common;

use axum::http::{Method, StatusCode};
use common::{amount, TestApp};
use serde_json::{json, Value};

struct Catalogue {
    classic: i64,
    mini: i64,
    cafe: i64,
    deli: i64,
}

async fn catalogue(app: &TestApp) -> Catalogue {
    Catalogue {
        classic: app.add_variety("Classic", "25").await,
        mini: app.add_variety("Mini", "12.5").await,
        cafe: app.add_shop("Cafe").await,
        deli: app.add_shop("Deli").await,
    }
}

fn order(variety: i64, shop: i64, quantity: i64, price: &str, date: &str) -> Value {
    json!({
        "variety_id": variety,
        "shop_id": shop,
        "quantity": quantity,
        "price": price,
        "delivery_date": date,
    })
}

fn with_payment(mut body: Value, status: &str, paid: Option<&str>) -> Value {
    body["payment_status"] = json!(status);
    if let Some(paid) = paid {
        body["paid_amount"] = json!(paid);
    }
    body
}

#[tokio::test]
async fn adding_an_order_reports_its_total() {
    let app = TestApp::sql().await;
    let c = catalogue(&app).await;

    let body = app
        .add_order(order(c.classic, c.cafe, 4, "25", "2024-03-15"))
        .await;
    assert_eq!(body["message"], "Order added successfully! Total: ₹100.00");
    assert_eq!(body["data"]["payment_status"], "unpaid");
    assert_eq!(amount(&body["data"]["paid_amount"]), 0.0);
    assert_eq!(body["data"]["delivery_date"], "2024-03-15");
}

#[tokio::test]
async fn payment_status_sets_paid_amount() {
    let app = TestApp::sql().await;
    let c = catalogue(&app).await;

    let paid = app
        .add_order(with_payment(
            order(c.classic, c.cafe, 2, "25", "2024-03-15"),
            "paid",
            Some("3"),
        ))
        .await;
    assert_eq!(paid["data"]["payment_status"], "paid");
    assert_eq!(amount(&paid["data"]["paid_amount"]), 50.0);

    let partial = app
        .add_order(with_payment(
            order(c.classic, c.cafe, 2, "25", "2024-03-15"),
            "partial",
            Some("20"),
        ))
        .await;
    assert_eq!(partial["data"]["payment_status"], "partial");
    assert_eq!(amount(&partial["data"]["paid_amount"]), 20.0);

    // Unknown statuses are treated as unpaid
    let other = app
        .add_order(with_payment(
            order(c.classic, c.cafe, 2, "25", "2024-03-15"),
            "later",
            Some("20"),
        ))
        .await;
    assert_eq!(other["data"]["payment_status"], "unpaid");
    assert_eq!(amount(&other["data"]["paid_amount"]), 0.0);
}

#[tokio::test]
async fn partial_payment_must_be_inside_the_total() {
    let app = TestApp::sql().await;
    let c = catalogue(&app).await;

    for paid in ["0", "50", "60"] {
        let (status, body) = app
            .send(
                Method::POST,
                "/api/v1/orders",
                Some(with_payment(
                    order(c.classic, c.cafe, 2, "25", "2024-03-15"),
                    "partial",
                    Some(paid),
                )),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "paid {paid}");
        assert_eq!(
            body["message"],
            "Validation error: Partial payment amount must be greater than 0 and less than total amount"
        );
    }
}

#[tokio::test]
async fn order_validation_runs_in_a_fixed_order() {
    let app = TestApp::sql().await;
    let c = catalogue(&app).await;

    let cases = [
        (
            json!({ "variety_id": c.classic, "shop_id": c.cafe, "quantity": 2, "price": "25" }),
            "All fields are required",
        ),
        (
            order(c.classic, c.cafe, 0, "25", "2024-03-15"),
            "All fields are required",
        ),
        (
            order(c.classic, c.cafe, -2, "25", "not-a-date"),
            "Quantity and price must be positive numbers",
        ),
        (
            with_payment(order(c.classic, c.cafe, 2, "25", "not-a-date"), "partial", None),
            "Partial payment amount must be greater than 0 and less than total amount",
        ),
        (
            order(c.classic, c.cafe, 2, "25", "15/03/2024"),
            "Invalid date format",
        ),
    ];

    for (request, expected) in cases {
        let (status, body) = app.send(Method::POST, "/api/v1/orders", Some(request)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], format!("Validation error: {expected}"));
    }
}

#[tokio::test]
async fn amounts_must_fit_currency_columns() {
    let app = TestApp::sql().await;
    let c = catalogue(&app).await;
    let expected =
        "Validation error: Amounts must not exceed 99999999.99 or have more than 2 decimal places";

    let cases = [
        order(c.classic, c.cafe, 2, "50000000000000000000000000000", "2024-03-15"),
        order(c.classic, c.cafe, 2, "100000000", "2024-03-15"),
        with_payment(order(c.classic, c.cafe, 3, "12.345", "2024-03-15"), "paid", None),
        with_payment(
            order(c.classic, c.cafe, 2, "25", "2024-03-15"),
            "partial",
            Some("10.005"),
        ),
    ];
    for request in cases {
        let (status, body) = app.send(Method::POST, "/api/v1/orders", Some(request)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], expected);
    }

    let (status, body) = app
        .send(
            Method::POST,
            "/api/v1/orders",
            Some(order(c.classic, c.cafe, 2, "99999999.99", "2024-03-15")),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["message"], "Order added successfully! Total: ₹199999999.98");
}

#[tokio::test]
async fn orders_must_reference_existing_rows() {
    let app = TestApp::sql().await;
    let c = catalogue(&app).await;

    let (status, body) = app
        .send(
            Method::POST,
            "/api/v1/orders",
            Some(order(99, c.cafe, 1, "25", "2024-03-15")),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Not found: Variety with ID 99 not found");

    let (status, body) = app
        .send(
            Method::POST,
            "/api/v1/orders",
            Some(order(c.classic, 42, 1, "25", "2024-03-15")),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Not found: Shop with ID 42 not found");
}

#[tokio::test]
async fn editing_keeps_creation_time() {
    let app = TestApp::sql().await;
    let c = catalogue(&app).await;
    let created = app
        .add_order(order(c.classic, c.cafe, 2, "25", "2024-03-15"))
        .await;
    let id = created["data"]["id"].as_i64().unwrap();

    let (status, body) = app
        .send(
            Method::PUT,
            &format!("/api/v1/orders/{id}"),
            Some(with_payment(
                order(c.mini, c.deli, 6, "12.5", "2024-03-16"),
                "paid",
                None,
            )),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Order updated successfully! Total: ₹75.00");
    assert_eq!(body["data"]["created_at"], created["data"]["created_at"]);
    assert_eq!(body["data"]["shop_id"], c.deli);
    assert_eq!(amount(&body["data"]["paid_amount"]), 75.0);

    let (status, body) = app
        .send(Method::GET, &format!("/api/v1/orders/{id}"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["variety_name"], "Mini");
    assert_eq!(body["data"]["shop_name"], "Deli");
    assert_eq!(amount(&body["data"]["total"]), 75.0);
    assert_eq!(amount(&body["data"]["pending"]), 0.0);
}

#[tokio::test]
async fn editing_a_missing_order_is_not_found() {
    let app = TestApp::sql().await;
    let c = catalogue(&app).await;

    let (status, body) = app
        .send(
            Method::PUT,
            "/api/v1/orders/7",
            Some(order(c.classic, c.cafe, 1, "25", "2024-03-15")),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Not found: Order with ID 7 not found");
}

#[tokio::test]
async fn mark_paid_settles_the_full_total() {
    let app = TestApp::sql().await;
    let c = catalogue(&app).await;
    let created = app
        .add_order(with_payment(
            order(c.classic, c.cafe, 3, "25", "2024-03-15"),
            "partial",
            Some("10"),
        ))
        .await;
    let id = created["data"]["id"].as_i64().unwrap();

    let (status, body) = app
        .send(Method::POST, &format!("/api/v1/orders/{id}/mark-paid"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Order marked as paid! Amount: ₹75.00");
    assert_eq!(body["data"]["payment_status"], "paid");
    assert_eq!(amount(&body["data"]["paid_amount"]), 75.0);
}

#[tokio::test]
async fn mark_all_paid_settles_outstanding_orders_of_one_shop() {
    let app = TestApp::sql().await;
    let c = catalogue(&app).await;
    app.add_order(order(c.classic, c.cafe, 2, "25", "2024-03-15")).await;
    app.add_order(with_payment(
        order(c.mini, c.cafe, 4, "12.5", "2024-03-16"),
        "partial",
        Some("20"),
    ))
    .await;
    app.add_order(with_payment(
        order(c.classic, c.cafe, 1, "25", "2024-03-17"),
        "paid",
        None,
    ))
    .await;
    app.add_order(order(c.classic, c.deli, 1, "25", "2024-03-17")).await;

    let (status, body) = app
        .send(Method::POST, &format!("/api/v1/shops/{}/mark-all-paid", c.cafe), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["orders_marked"], 2);
    assert_eq!(body["message"], "Marked 2 order(s) as paid for Cafe! Total: ₹100.00");

    let (_, body) = app
        .send(Method::POST, &format!("/api/v1/shops/{}/mark-all-paid", c.cafe), None)
        .await;
    assert_eq!(body["data"]["orders_marked"], 0);
    assert_eq!(body["message"], "All orders for Cafe are already paid!");

    // The other shop is untouched
    let (_, body) = app
        .send(Method::GET, &format!("/api/v1/shops/{}/bill", c.deli), None)
        .await;
    assert_eq!(body["data"]["orders"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn bill_lists_only_outstanding_orders() {
    let app = TestApp::sql().await;
    let c = catalogue(&app).await;
    app.add_order(order(c.classic, c.cafe, 2, "25", "2024-03-15")).await;
    app.add_order(with_payment(
        order(c.mini, c.cafe, 4, "12.5", "2024-03-18"),
        "partial",
        Some("20"),
    ))
    .await;
    app.add_order(with_payment(
        order(c.classic, c.cafe, 1, "25", "2024-03-17"),
        "paid",
        None,
    ))
    .await;

    let (status, body) = app
        .send(Method::GET, &format!("/api/v1/shops/{}/bill", c.cafe), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let bill = &body["data"];
    assert_eq!(bill["shop"]["name"], "Cafe");
    assert_eq!(amount(&bill["total_pending"]), 80.0);

    let lines = bill["orders"].as_array().unwrap();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0]["delivery_date"], "2024-03-18");
    assert_eq!(amount(&lines[0]["paid"]), 20.0);
    assert_eq!(amount(&lines[0]["pending"]), 30.0);
    assert_eq!(lines[1]["variety_name"], "Classic");
    assert!(bill["bill_date"].as_str().unwrap().ends_with("+05:30"));

    let (status, _) = app.send(Method::GET, "/api/v1/shops/404/bill", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn history_is_grouped_newest_first() {
    let app = TestApp::sql().await;
    let c = catalogue(&app).await;
    app.add_order(order(c.classic, c.cafe, 2, "25", "2024-02-28")).await;
    app.add_order(order(c.classic, c.cafe, 1, "25", "2024-03-01")).await;
    app.add_order(with_payment(
        order(c.mini, c.deli, 2, "12.5", "2024-03-20"),
        "paid",
        None,
    ))
    .await;
    app.add_order(order(c.mini, c.cafe, 4, "12.5", "2024-03-20")).await;

    let (status, body) = app.send(Method::GET, "/api/v1/orders", None).await;
    assert_eq!(status, StatusCode::OK);
    let history = &body["data"];
    assert_eq!(history["total_orders"], 4);
    assert_eq!(amount(&history["total_sales"]), 150.0);
    assert_eq!(amount(&history["total_pending"]), 125.0);

    let months = history["months"].as_array().unwrap();
    assert_eq!(months.len(), 2);
    assert_eq!(months[0]["key"], "2024-03");
    assert_eq!(months[0]["label"], "March 2024");
    assert_eq!(months[0]["order_count"], 3);
    assert_eq!(amount(&months[0]["total"]), 100.0);
    assert_eq!(months[0]["dates"][0]["date"], "2024-03-20");
    assert_eq!(months[0]["dates"][0]["orders"].as_array().unwrap().len(), 2);
    assert_eq!(months[0]["dates"][1]["date"], "2024-03-01");
    assert_eq!(months[1]["label"], "February 2024");

    let (_, body) = app
        .send(Method::GET, &format!("/api/v1/orders?shop_id={}", c.deli), None)
        .await;
    assert_eq!(body["data"]["shop"]["name"], "Deli");
    assert_eq!(body["data"]["total_orders"], 1);
    assert_eq!(amount(&body["data"]["total_pending"]), 0.0);

    let (status, _) = app.send(Method::GET, "/api/v1/orders?shop_id=77", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn delete_all_orders_reports_count() {
    let app = TestApp::sql().await;
    let c = catalogue(&app).await;
    for day in ["2024-03-01", "2024-03-02", "2024-03-03"] {
        app.add_order(order(c.classic, c.cafe, 1, "25", day)).await;
    }

    let (status, body) = app.send(Method::DELETE, "/api/v1/orders", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["deleted"], 3);
    assert_eq!(body["message"], "Successfully deleted 3 order(s)");

    let (_, body) = app.send(Method::GET, "/api/v1/orders", None).await;
    assert_eq!(body["data"]["total_orders"], 0);

    // Catalogue survives
    let (_, body) = app.send(Method::GET, "/api/v1/varieties", None).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 2);
}

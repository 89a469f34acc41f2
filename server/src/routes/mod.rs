use axum::routing::{get, post, put};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::config::{create_cors_layer, with_security_headers, Config};
use crate::handlers::{events, health_check, orders, payments, tickets, users};
use crate::state::AppState;

pub fn create_routes(state: AppState, config: &Config) -> Router {
    let api = Router::new()
        .route("/health", get(health_check))
        .route("/events", get(events::list_events).post(events::create_event))
        .route("/events/total", get(events::count_events))
        .route(
            "/events/:id",
            get(events::get_event)
                .put(events::update_event)
                .delete(events::delete_event),
        )
        .route(
            "/events/:id/tickets",
            get(tickets::list_ticket_classes).post(tickets::create_ticket_class),
        )
        .route(
            "/tickets/:id",
            get(tickets::get_ticket_class)
                .put(tickets::update_ticket_class)
                .delete(tickets::delete_ticket_class),
        )
        .route("/orders/quote", post(orders::quote))
        .route("/reservations", post(orders::reserve))
        .route("/reservations/:id", axum::routing::delete(orders::release_reservation))
        .route("/reservations/:id/commit", post(orders::commit_reservation))
        .route("/checkout", post(orders::checkout))
        .route("/payments", get(payments::list_payments))
        .route("/payments/stats/overall", get(payments::overall_stats))
        .route("/payments/stats/monthly", get(payments::monthly_stats))
        .route("/payments/event/:event_id", get(payments::list_event_payments))
        .route(
            "/payments/:id",
            get(payments::get_payment).delete(payments::delete_payment),
        )
        .route("/users", get(users::list_users).post(users::register_user))
        .route("/users/total", get(users::count_users))
        .route("/users/:id", axum::routing::delete(users::delete_user))
        .route("/me/favorites", get(users::list_favorites))
        .route(
            "/me/favorites/:event_id",
            put(users::add_favorite).delete(users::remove_favorite),
        );

    with_security_headers(api, config.production)
        .layer(create_cors_layer(&config.allowed_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::ApprovingGateway;
    use crate::store::MemoryStore;
    use axum::body::{to_bytes, Body};
    use axum::http::{Method, Request, StatusCode};
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::ServiceExt;
    use uuid::Uuid;

    struct TestApp {
        router: Router,
        seller: Uuid,
        customer: Uuid,
    }

    impl TestApp {
        fn new() -> Self {
            let config = Config::default();
            let state = AppState::from_backend(
                Arc::new(MemoryStore::new()),
                Arc::new(ApprovingGateway),
                &config,
            );
            Self {
                router: create_routes(state, &config),
                seller: Uuid::new_v4(),
                customer: Uuid::new_v4(),
            }
        }

        async fn send(
            &self,
            method: Method,
            uri: &str,
            identity: Option<(Uuid, &str)>,
            headers: &[(&str, &str)],
            body: Option<Value>,
        ) -> (StatusCode, Value) {
            let mut builder = Request::builder().method(method).uri(uri);
            if let Some((id, role)) = identity {
                builder = builder
                    .header("X-User-Id", id.to_string())
                    .header("X-User-Role", role);
            }
            for (name, value) in headers {
                builder = builder.header(*name, *value);
            }
            let request = match body {
                Some(body) => builder
                    .header("Content-Type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
                None => builder.body(Body::empty()).unwrap(),
            };

            let response = self.router.clone().oneshot(request).await.unwrap();
            let status = response.status();
            let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
            let json = if bytes.is_empty() {
                Value::Null
            } else {
                serde_json::from_slice(&bytes).unwrap()
            };
            (status, json)
        }

        async fn as_seller(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
            self.send(method, uri, Some((self.seller, "seller")), &[], body).await
        }

        async fn as_customer(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
            self.send(method, uri, Some((self.customer, "customer")), &[], body).await
        }

        async fn event_with_ticket(&self, price: u32, capacity: i32) -> (String, String) {
            let (status, event) = self
                .as_seller(
                    Method::POST,
                    "/events",
                    Some(json!({
                        "topic": "Summer Festival",
                        "description": "Three stages, one night",
                        "venue": "Riverside Park",
                        "time": "18:00",
                        "date": "2025-07-12",
                        "category": "Music"
                    })),
                )
                .await;
            assert_eq!(status, StatusCode::CREATED);
            let event_id = event["data"]["id"].as_str().unwrap().to_string();

            let (status, ticket) = self
                .as_seller(
                    Method::POST,
                    &format!("/events/{}/tickets", event_id),
                    Some(json!({
                        "ticket_type": "General",
                        "price": price,
                        "capacity": capacity
                    })),
                )
                .await;
            assert_eq!(status, StatusCode::CREATED);
            let ticket_id = ticket["data"]["id"].as_str().unwrap().to_string();
            (event_id, ticket_id)
        }

        async fn remaining(&self, ticket_id: &str) -> i64 {
            let (_, body) = self
                .send(Method::GET, &format!("/tickets/{}", ticket_id), None, &[], None)
                .await;
            body["data"]["remaining"].as_i64().unwrap()
        }
    }

    #[tokio::test]
    async fn test_health_check_has_security_headers() {
        let app = TestApp::new();
        let response = app
            .router
            .clone()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["x-content-type-options"], "nosniff");
    }

    #[tokio::test]
    async fn test_catalog_writes_require_seller() {
        let app = TestApp::new();
        let body = json!({
            "topic": "Poetry Slam",
            "description": "Open mic",
            "venue": "Library",
            "time": "17:00",
            "date": "2025-03-03",
            "category": "Arts"
        });

        let (status, json) = app.as_customer(Method::POST, "/events", Some(body.clone())).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(json["error"]["code"], "FORBIDDEN");

        let (status, json) = app.send(Method::POST, "/events", None, &[], Some(body)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(json["error"]["code"], "AUTH_ERROR");
    }

    #[tokio::test]
    async fn test_unknown_event_is_not_found() {
        let app = TestApp::new();
        let (status, json) = app
            .send(Method::GET, &format!("/events/{}", Uuid::new_v4()), None, &[], None)
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["success"], false);
        assert_eq!(json["error"]["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_duplicate_ticket_type_conflicts() {
        let app = TestApp::new();
        let (event_id, _) = app.event_with_ticket(50, 10).await;

        let (status, json) = app
            .as_seller(
                Method::POST,
                &format!("/events/{}/tickets", event_id),
                Some(json!({ "ticket_type": "General", "price": 60, "capacity": 5 })),
            )
            .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(json["error"]["code"], "CONFLICT");
    }

    #[tokio::test]
    async fn test_reserve_release_restores_inventory() {
        let app = TestApp::new();
        let (_, ticket_id) = app.event_with_ticket(500, 10).await;

        let (status, held) = app
            .as_customer(
                Method::POST,
                "/reservations",
                Some(json!({ "ticket_class_id": ticket_id, "quantity": 7 })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(held["data"]["state"], "pending");
        assert_eq!(app.remaining(&ticket_id).await, 3);

        let (status, json) = app
            .as_customer(
                Method::POST,
                "/reservations",
                Some(json!({ "ticket_class_id": ticket_id, "quantity": 5 })),
            )
            .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(json["error"]["code"], "INSUFFICIENT_INVENTORY");
        assert_eq!(json["error"]["details"]["ticketClassId"], ticket_id.as_str());
        assert_eq!(app.remaining(&ticket_id).await, 3);

        let token = held["data"]["id"].as_str().unwrap();
        let uri = format!("/reservations/{}", token);
        let (status, json) = app.as_customer(Method::DELETE, &uri, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["applied"], true);
        assert_eq!(app.remaining(&ticket_id).await, 10);

        let (status, json) = app.as_customer(Method::DELETE, &uri, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["applied"], false);
        assert_eq!(app.remaining(&ticket_id).await, 10);

        let (status, json) = app
            .as_customer(Method::POST, &format!("{}/commit", uri), None)
            .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(json["error"]["code"], "RESERVATION_EXPIRED");
    }

    #[tokio::test]
    async fn test_zero_quantity_reservation_is_invalid() {
        let app = TestApp::new();
        let (_, ticket_id) = app.event_with_ticket(500, 10).await;

        let (status, json) = app
            .as_customer(
                Method::POST,
                "/reservations",
                Some(json!({ "ticket_class_id": ticket_id, "quantity": 0 })),
            )
            .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(json["error"]["code"], "INVALID_QUANTITY");
    }

    #[tokio::test]
    async fn test_quote_checks_advertised_remaining() {
        let app = TestApp::new();
        let (_, ticket_id) = app.event_with_ticket(25, 3).await;

        let (status, json) = app
            .send(
                Method::POST,
                "/orders/quote",
                None,
                &[],
                Some(json!({ "lines": [{ "ticket_class_id": ticket_id, "quantity": 2 }] })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["ticket_count"], 2);
        assert_eq!(json["data"]["total"], "50");

        let (status, json) = app
            .send(
                Method::POST,
                "/orders/quote",
                None,
                &[],
                Some(json!({ "lines": [{ "ticket_class_id": ticket_id, "quantity": 4 }] })),
            )
            .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(json["error"]["code"], "INVALID_QUANTITY");
    }

    #[tokio::test]
    async fn test_checkout_is_idempotent_and_reported() {
        let app = TestApp::new();
        let (event_id, ticket_id) = app.event_with_ticket(500, 10).await;
        let body = json!({
            "buyer_name": "Ada Lovelace",
            "lines": [{ "ticket_class_id": ticket_id, "quantity": 2 }],
            "expected_total": "1000"
        });
        let identity = Some((app.customer, "customer"));
        let key = [("Idempotency-Key", "checkout-ada-000001")];

        let (status, first) = app
            .send(Method::POST, "/checkout", identity, &key, Some(body.clone()))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(first["data"]["total_amount"], "1000");
        assert_eq!(first["data"]["ticket_count"], 2);
        assert_eq!(first["data"]["event_id"], event_id.as_str());
        assert_eq!(app.remaining(&ticket_id).await, 8);

        let (status, second) = app
            .send(Method::POST, "/checkout", identity, &key, Some(body))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(second["data"]["id"], first["data"]["id"]);
        assert_eq!(app.remaining(&ticket_id).await, 8);

        let (status, stats) = app
            .as_seller(Method::GET, "/payments/stats/overall", None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(stats["data"]["total_tickets_sold"], 2);
        assert_eq!(stats["data"]["total_transactions"], 1);

        let (status, monthly) = app
            .as_seller(Method::GET, "/payments/stats/monthly", None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(monthly["data"].as_array().unwrap().len(), 1);

        let payment_uri = format!("/payments/{}", first["data"]["id"].as_str().unwrap());
        let (status, _) = app
            .send(Method::GET, &payment_uri, Some((Uuid::new_v4(), "customer")), &[], None)
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (status, _) = app.as_customer(Method::GET, &payment_uri, None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_checkout_requires_idempotency_key() {
        let app = TestApp::new();
        let (_, ticket_id) = app.event_with_ticket(500, 10).await;

        let (status, json) = app
            .as_customer(
                Method::POST,
                "/checkout",
                Some(json!({
                    "buyer_name": "Ada Lovelace",
                    "lines": [{ "ticket_class_id": ticket_id, "quantity": 1 }]
                })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"]["code"], "VALIDATION_ERROR");
        assert_eq!(app.remaining(&ticket_id).await, 10);
    }

    #[tokio::test]
    async fn test_favorites_are_per_user() {
        let app = TestApp::new();
        let (event_id, _) = app.event_with_ticket(10, 10).await;

        let (status, _) = app
            .as_customer(Method::PUT, &format!("/me/favorites/{}", event_id), None)
            .await;
        assert_eq!(status, StatusCode::OK);

        let (_, mine) = app.as_customer(Method::GET, "/events", None).await;
        assert_eq!(mine["data"][0]["favorite"], true);

        let (_, theirs) = app.as_seller(Method::GET, "/events", None).await;
        assert_eq!(theirs["data"][0]["favorite"], false);

        let (_, favorites) = app.as_customer(Method::GET, "/me/favorites", None).await;
        assert_eq!(favorites["data"][0]["id"], event_id.as_str());
    }

    #[tokio::test]
    async fn test_deleting_event_removes_its_tickets() {
        let app = TestApp::new();
        let (event_id, ticket_id) = app.event_with_ticket(10, 10).await;

        let (status, _) = app
            .as_seller(Method::DELETE, &format!("/events/{}", event_id), None)
            .await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = app
            .send(Method::GET, &format!("/tickets/{}", ticket_id), None, &[], None)
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (_, total) = app.send(Method::GET, "/events/total", None, &[], None).await;
        assert_eq!(total["data"]["total"], 0);
    }

    #[tokio::test]
    async fn test_register_user_uses_caller_identity() {
        let app = TestApp::new();
        let (status, json) = app
            .as_customer(
                Method::POST,
                "/users",
                Some(json!({ "username": "ada", "email": "Ada@Example.com" })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(json["data"]["id"], app.customer.to_string());
        assert_eq!(json["data"]["email"], "ada@example.com");

        let (_, total) = app.as_seller(Method::GET, "/users/total", None).await;
        assert_eq!(total["data"]["total"], 1);
    }
}

//! HTTP API tests against an in-memory database

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        http::{header, Method, Request, StatusCode},
        Router,
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use proptoken_server::{build_app, config::Config};

    const PASSWORD: &str = "correct-horse-battery";
    const ADMIN_EMAIL: &str = "admin@proptoken.local";

    async fn app() -> Router {
        build_app(&Config::for_testing())
            .await
            .expect("Failed to build app")
            .router
    }

    async fn call(
        app: &Router,
        method: Method,
        path: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(path);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    async fn register(app: &Router, email: &str) -> String {
        let (status, body) = call(
            app,
            Method::POST,
            "/api/auth/register",
            None,
            Some(json!({
                "email": email,
                "password": PASSWORD,
                "firstName": "Ayesha",
                "lastName": "Khan",
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        body["token"].as_str().unwrap().to_string()
    }

    async fn add_card(app: &Router, token: &str) -> String {
        let (status, body) = call(
            app,
            Method::POST,
            "/api/payment-methods",
            Some(token),
            Some(json!({
                "cardNumber": "4111 1111 1111 1111",
                "holderName": "Ayesha Khan",
                "expiryMonth": 12,
                "expiryYear": 2099,
                "cvv": "123",
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        body["id"].as_str().unwrap().to_string()
    }

    async fn create_property(app: &Router, admin: &str, price: i64, tokens: i64) -> String {
        let (status, body) = call(
            app,
            Method::POST,
            "/api/properties",
            Some(admin),
            Some(json!({
                "title": "DHA Phase 6 Residency",
                "location": "Lahore",
                "pricePerToken": price,
                "totalTokens": tokens,
                "expectedYieldBps": 850,
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        body["id"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_health_and_client_config() {
        let app = app().await;

        let (status, _) = call(&app, Method::GET, "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);

        let (status, config) = call(&app, Method::GET, "/api/config", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(config["baseCurrency"], "PKR");
        assert_eq!(config["exchangeRates"]["USD"], 280.0);
        assert_eq!(config["otpLength"], 4);
        assert_eq!(config["demoOtpCode"], "1122");
    }

    #[tokio::test]
    async fn test_session_lifecycle() {
        let app = app().await;
        let token = register(&app, "ayesha@example.com").await;

        let (status, me) = call(&app, Method::GET, "/api/auth/me", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(me["email"], "ayesha@example.com");
        assert_eq!(me["role"], "investor");

        let (status, login) = call(
            &app,
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "email": "ayesha@example.com", "password": PASSWORD })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(login["token"].is_string());

        let (status, _) = call(
            &app,
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "email": "ayesha@example.com", "password": "wrong-password" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = call(&app, Method::POST, "/api/auth/logout", Some(&token), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, body) = call(&app, Method::GET, "/api/auth/me", Some(&token), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["code"], "INVALID_TOKEN");

        let (status, body) = call(&app, Method::GET, "/api/users/wallet", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["code"], "MISSING_TOKEN");
    }

    #[tokio::test]
    async fn test_duplicate_registration_conflicts() {
        let app = app().await;
        register(&app, "dup@example.com").await;

        let (status, body) = call(
            &app,
            Method::POST,
            "/api/auth/register",
            None,
            Some(json!({
                "email": "DUP@example.com",
                "password": PASSWORD,
                "firstName": "Other",
                "lastName": "Person",
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"]["code"], "CONFLICT");
    }

    #[tokio::test]
    async fn test_payment_method_validation_and_masking() {
        let app = app().await;
        let token = register(&app, "cards@example.com").await;

        let (status, body) = call(
            &app,
            Method::POST,
            "/api/payment-methods",
            Some(&token),
            Some(json!({
                "cardNumber": "4111 1111 1111 1112",
                "holderName": "Ayesha Khan",
                "expiryMonth": 12,
                "expiryYear": 2099,
                "cvv": "123",
            })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

        add_card(&app, &token).await;

        let (status, cards) =
            call(&app, Method::GET, "/api/payment-methods", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        let cards = cards.as_array().unwrap();
        assert_eq!(cards.len(), 1);
        assert_eq!(cards[0]["lastFour"], "1111");
        assert_eq!(cards[0]["cardType"], "visa");
        assert_eq!(cards[0]["isDefault"], true);
        assert!(!cards[0]["maskedNumber"].as_str().unwrap().contains("4111"));
    }

    #[tokio::test]
    async fn test_deposit_requires_otp_and_converts_currency() {
        let app = app().await;
        let token = register(&app, "deposit@example.com").await;
        let card = add_card(&app, &token).await;

        let (status, body) = call(
            &app,
            Method::POST,
            "/api/wallet-transactions/deposit",
            Some(&token),
            Some(json!({ "amount": 50, "currency": "USD", "paymentMethodId": card })),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"]["code"], "FORBIDDEN");

        let (status, deposit) = call(
            &app,
            Method::POST,
            "/api/wallet-transactions/deposit",
            Some(&token),
            Some(json!({
                "amount": 50,
                "currency": "USD",
                "paymentMethodId": card,
                "otpVerified": true,
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{}", deposit);
        assert_eq!(deposit["amountBase"], 14_000);
        assert_eq!(deposit["wallet"]["availableBalance"], 14_000);

        let (_, wallet) = call(&app, Method::GET, "/api/users/wallet", Some(&token), None).await;
        assert_eq!(wallet["totalBalance"], 14_000);

        let (_, history) = call(
            &app,
            Method::GET,
            "/api/wallet-transactions?limit=10",
            Some(&token),
            None,
        )
        .await;
        let history = history.as_array().unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0]["kind"], "deposit");
        assert_eq!(history[0]["currency"], "USD");
    }

    #[tokio::test]
    async fn test_investment_debits_wallet_or_rejects() {
        let app = app().await;
        let admin = register(&app, ADMIN_EMAIL).await;
        let property = create_property(&app, &admin, 89_200, 2_000).await;

        let token = register(&app, "investor@example.com").await;
        let card = add_card(&app, &token).await;

        let purchase = json!({
            "propertyId": property,
            "tokensPurchased": 5,
            "investmentAmount": 446_000,
            "payment": "wallet",
        });

        let (status, body) = call(
            &app,
            Method::POST,
            "/api/investments",
            Some(&token),
            Some(purchase.clone()),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"]["code"], "UNPROCESSABLE_ENTITY");

        let (status, _) = call(
            &app,
            Method::POST,
            "/api/wallet-transactions/deposit",
            Some(&token),
            Some(json!({
                "amount": 500_000,
                "paymentMethodId": card,
                "otpVerified": true,
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, investment) = call(
            &app,
            Method::POST,
            "/api/investments",
            Some(&token),
            Some(purchase),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{}", investment);
        assert_eq!(investment["tokensPurchased"], 5);

        let (_, wallet) = call(&app, Method::GET, "/api/users/wallet", Some(&token), None).await;
        assert_eq!(wallet["availableBalance"], 54_000);
        assert_eq!(wallet["investedAmount"], 446_000);

        let (_, property) = call(
            &app,
            Method::GET,
            &format!("/api/properties/{}", property),
            None,
            None,
        )
        .await;
        assert_eq!(property["availableTokens"], 1_995);

        let (_, portfolio) = call(
            &app,
            Method::GET,
            "/api/investments/portfolio",
            Some(&token),
            None,
        )
        .await;
        assert_eq!(portfolio["totalInvested"], 446_000);
        assert_eq!(portfolio["holdings"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_admin_routes_require_admin() {
        let app = app().await;
        let token = register(&app, "plain@example.com").await;

        let (status, body) = call(
            &app,
            Method::POST,
            "/api/properties",
            Some(&token),
            Some(json!({
                "title": "Clifton Seaview",
                "location": "Karachi",
                "pricePerToken": 125_000,
                "totalTokens": 1_200,
            })),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"]["code"], "FORBIDDEN");

        let admin = register(&app, ADMIN_EMAIL).await;
        create_property(&app, &admin, 125_000, 1_200).await;

        let (status, list) = call(&app, Method::GET, "/api/properties", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(list.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_kyc_submit_and_review() {
        let app = app().await;
        let admin = register(&app, ADMIN_EMAIL).await;
        let token = register(&app, "kyc@example.com").await;

        let (_, status_body) = call(&app, Method::GET, "/api/kyc/status", Some(&token), None).await;
        assert!(status_body["status"].is_null());

        let (status, application) = call(
            &app,
            Method::POST,
            "/api/kyc/applications",
            Some(&token),
            Some(json!({
                "fullName": "Ayesha Khan",
                "documentType": "cnic",
                "documentNumber": "35202-1234567-1",
                "nationality": "Pakistani",
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{}", application);
        assert_eq!(application["status"], "pending");
        let id = application["id"].as_str().unwrap().to_string();

        let review_path = format!("/api/kyc/applications/{}/review", id);
        let (status, _) = call(
            &app,
            Method::POST,
            &review_path,
            Some(&token),
            Some(json!({ "status": "approved" })),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, reviewed) = call(
            &app,
            Method::POST,
            &review_path,
            Some(&admin),
            Some(json!({ "status": "approved" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(reviewed["status"], "approved");

        let (_, status_body) = call(&app, Method::GET, "/api/kyc/status", Some(&token), None).await;
        assert_eq!(status_body["status"], "approved");
    }

    #[tokio::test]
    async fn test_api_responses_carry_security_headers() {
        let app = app().await;
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/config")
                    .header("x-request-id", "req-42")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        let headers = response.headers();
        assert_eq!(headers["x-content-type-options"], "nosniff");
        assert_eq!(headers[header::CACHE_CONTROL], "no-store");
        assert_eq!(headers["x-request-id"], "req-42");
    }
}

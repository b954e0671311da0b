use axum::{
    Router,
    body::Body,
    http::{HeaderMap, Method, Request, StatusCode, header},
};
use greenroots::{
    AppConfig, AppState, MemoryRepository, MockPaymentGateway, MockStorageService,
    auth::{CSRF_HEADER, SESSION_COOKIE, issue_session},
    create_router,
    models::{CreateProductRequest, NewUser, User},
    payments::PaymentState,
    repository::{
        ProductRepository, PurchaseRepository, RepositoryState, RoleRepository, UserRepository,
        memory::{ADMIN_ROLE_ID, MEMBER_ROLE_ID},
    },
    storage::StorageState,
};
use serde_json::{Value, json};
use std::sync::Arc;
use tower::util::ServiceExt;
use uuid::Uuid;

// --- Test Harness ---

struct TestApp {
    router: Router,
    repo: Arc<MemoryRepository>,
    config: AppConfig,
}

struct TestResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Value,
}

impl TestApp {
    fn new() -> Self {
        let repo = Arc::new(MemoryRepository::new());
        let config = AppConfig::default();
        let state = AppState {
            repo: repo.clone() as RepositoryState,
            storage: Arc::new(MockStorageService::new()) as StorageState,
            payments: Arc::new(MockPaymentGateway::new()) as PaymentState,
            config: config.clone(),
        };
        Self {
            router: create_router(state),
            repo,
            config,
        }
    }

    /// Inserts a user with the given role and returns a bearer token for them.
    async fn seed_user(&self, email: &str, role_id: Uuid) -> (User, String) {
        let user = self
            .repo
            .create_user(NewUser {
                firstname: "Test".to_string(),
                lastname: "User".to_string(),
                email: email.to_string(),
                password_hash: "not-a-real-hash".to_string(),
            })
            .await
            .unwrap();
        self.repo.assign_role(user.id, role_id).await.unwrap();
        let session = issue_session(&self.config, user.id, &user.email).unwrap();
        (user, session.token)
    }

    async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        TestResponse {
            status,
            headers,
            body,
        }
    }

    async fn call(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.send(request).await
    }
}

fn session_cookie_value(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|v| v.starts_with(&format!("{SESSION_COOKIE}=")))
        .map(|v| v.split(';').next().unwrap_or_default().to_string())
}

async fn seed_catalogue(app: &TestApp, admin_token: &str) -> (Value, Value, Value) {
    let category = app
        .call(
            Method::POST,
            "/admin/categories",
            Some(admin_token),
            Some(json!({ "name": "Indoor", "description": "House plants" })),
        )
        .await;
    assert_eq!(category.status, StatusCode::CREATED);

    let fern = app
        .call(
            Method::POST,
            "/admin/products",
            Some(admin_token),
            Some(json!({
                "name": "Boston Fern",
                "short_description": "Lush and leafy",
                "price": 1250,
                "stock": 10,
                "category_id": category.body["id"],
            })),
        )
        .await;
    assert_eq!(fern.status, StatusCode::CREATED);

    let cactus = app
        .call(
            Method::POST,
            "/admin/products",
            Some(admin_token),
            Some(json!({
                "name": "Golden Barrel Cactus",
                "short_description": "Needs almost no water",
                "price": 499,
            })),
        )
        .await;
    assert_eq!(cactus.status, StatusCode::CREATED);

    (category.body, fern.body, cactus.body)
}

// --- Health ---

#[tokio::test]
async fn test_health_check() {
    let app = TestApp::new();
    let response = app.call(Method::GET, "/health", None, None).await;
    assert_eq!(response.status, StatusCode::OK);
}

// --- Auth flow ---

#[tokio::test]
async fn test_register_grants_member_role() {
    let app = TestApp::new();
    let response = app
        .call(
            Method::POST,
            "/auth/register",
            None,
            Some(json!({
                "firstname": "Ada",
                "lastname": "Lovelace",
                "email": "Ada@Example.com",
                "password": "analytical-engine",
                "confirm_password": "analytical-engine",
            })),
        )
        .await;

    assert_eq!(response.status, StatusCode::CREATED);
    assert_eq!(response.body["email"], "ada@example.com");
    assert_eq!(response.body["roles"], json!(["member"]));
    assert!(response.body.get("password_hash").is_none());
}

#[tokio::test]
async fn test_register_rejects_mismatched_confirmation() {
    let app = TestApp::new();
    let response = app
        .call(
            Method::POST,
            "/auth/register",
            None,
            Some(json!({
                "firstname": "Ada",
                "lastname": "Lovelace",
                "email": "ada@example.com",
                "password": "analytical-engine",
                "confirm_password": "difference-engine",
            })),
        )
        .await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert!(response.body["errors"].get("confirm_password").is_some());
}

#[tokio::test]
async fn test_register_duplicate_email_conflicts() {
    let app = TestApp::new();
    app.seed_user("taken@example.com", MEMBER_ROLE_ID).await;

    let response = app
        .call(
            Method::POST,
            "/auth/register",
            None,
            Some(json!({
                "firstname": "Other",
                "lastname": "Person",
                "email": "taken@example.com",
                "password": "long-enough-password",
                "confirm_password": "long-enough-password",
            })),
        )
        .await;
    assert_eq!(response.status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_malformed_json_is_bad_request() {
    let app = TestApp::new();
    let request = Request::builder()
        .method(Method::POST)
        .uri("/auth/login")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.send(request).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_login_cookie_session_and_csrf() {
    let app = TestApp::new();
    let register = app
        .call(
            Method::POST,
            "/auth/register",
            None,
            Some(json!({
                "firstname": "Grace",
                "lastname": "Hopper",
                "email": "grace@example.com",
                "password": "cobol-forever",
                "confirm_password": "cobol-forever",
            })),
        )
        .await;
    assert_eq!(register.status, StatusCode::CREATED);

    // Wrong password and unknown email look the same.
    let wrong = app
        .call(
            Method::POST,
            "/auth/login",
            None,
            Some(json!({ "email": "grace@example.com", "password": "fortran" })),
        )
        .await;
    let unknown = app
        .call(
            Method::POST,
            "/auth/login",
            None,
            Some(json!({ "email": "nobody@example.com", "password": "fortran" })),
        )
        .await;
    assert_eq!(wrong.status, StatusCode::UNAUTHORIZED);
    assert_eq!(unknown.status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong.body, unknown.body);

    let login = app
        .call(
            Method::POST,
            "/auth/login",
            None,
            Some(json!({ "email": "grace@example.com", "password": "cobol-forever" })),
        )
        .await;
    assert_eq!(login.status, StatusCode::OK);
    let set_cookie = login
        .headers
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .unwrap()
        .to_string();
    assert!(set_cookie.contains("HttpOnly"));
    assert!(set_cookie.contains("SameSite=Lax"));
    let cookie = session_cookie_value(&login.headers).unwrap();
    let csrf = login.body["csrf_token"].as_str().unwrap().to_string();
    assert_eq!(login.body["user"]["email"], "grace@example.com");

    // Reads only need the cookie.
    let me = app
        .send(
            Request::builder()
                .uri("/me")
                .header(header::COOKIE, &cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(me.status, StatusCode::OK);
    assert_eq!(me.body["firstname"], "Grace");

    // Writes without the CSRF header are refused.
    let forged = app
        .send(
            Request::builder()
                .method(Method::PATCH)
                .uri("/me")
                .header(header::COOKIE, &cookie)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json!({ "firstname": "Mallory" }).to_string()))
                .unwrap(),
        )
        .await;
    assert_eq!(forged.status, StatusCode::FORBIDDEN);

    let updated = app
        .send(
            Request::builder()
                .method(Method::PATCH)
                .uri("/me")
                .header(header::COOKIE, &cookie)
                .header(CSRF_HEADER, &csrf)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json!({ "firstname": "Amazing Grace" }).to_string()))
                .unwrap(),
        )
        .await;
    assert_eq!(updated.status, StatusCode::OK);
    assert_eq!(updated.body["firstname"], "Amazing Grace");
}

#[tokio::test]
async fn test_password_change_takes_effect_on_login() {
    let app = TestApp::new();
    app.call(
        Method::POST,
        "/auth/register",
        None,
        Some(json!({
            "firstname": "Alan",
            "lastname": "Turing",
            "email": "alan@example.com",
            "password": "enigma-machine",
            "confirm_password": "enigma-machine",
        })),
    )
    .await;
    let login = app
        .call(
            Method::POST,
            "/auth/login",
            None,
            Some(json!({ "email": "alan@example.com", "password": "enigma-machine" })),
        )
        .await;
    let user_id: Uuid = serde_json::from_value(login.body["user"]["id"].clone()).unwrap();
    let token = issue_session(&app.config, user_id, "alan@example.com").unwrap().token;

    let patch = app
        .call(
            Method::PATCH,
            "/me",
            Some(&token),
            Some(json!({ "password": "bombe-at-bletchley" })),
        )
        .await;
    assert_eq!(patch.status, StatusCode::OK);

    let old = app
        .call(
            Method::POST,
            "/auth/login",
            None,
            Some(json!({ "email": "alan@example.com", "password": "enigma-machine" })),
        )
        .await;
    assert_eq!(old.status, StatusCode::UNAUTHORIZED);
    let new = app
        .call(
            Method::POST,
            "/auth/login",
            None,
            Some(json!({ "email": "alan@example.com", "password": "bombe-at-bletchley" })),
        )
        .await;
    assert_eq!(new.status, StatusCode::OK);
}

#[tokio::test]
async fn test_logout_expires_cookie_and_delete_me_removes_account() {
    let app = TestApp::new();
    let logout = app
        .send(
            Request::builder()
                .method(Method::POST)
                .uri("/auth/logout")
                .header(header::COOKIE, format!("{SESSION_COOKIE}=stale"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(logout.status, StatusCode::NO_CONTENT);
    let removal = logout
        .headers
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .unwrap();
    assert!(removal.starts_with(&format!("{SESSION_COOKIE}=")));
    assert!(removal.contains("Max-Age=0"));

    let (user, token) = app.seed_user("leaving@example.com", MEMBER_ROLE_ID).await;
    let deleted = app.call(Method::DELETE, "/me", Some(&token), None).await;
    assert_eq!(deleted.status, StatusCode::NO_CONTENT);
    assert!(app.repo.get_user(user.id).await.unwrap().is_none());

    let again = app.call(Method::GET, "/me", Some(&token), None).await;
    assert_eq!(again.status, StatusCode::UNAUTHORIZED);
}

// --- Access control ---

#[tokio::test]
async fn test_admin_routes_reject_anonymous_and_members() {
    let app = TestApp::new();
    let (_, member_token) = app.seed_user("member@example.com", MEMBER_ROLE_ID).await;
    let (_, admin_token) = app.seed_user("admin@example.com", ADMIN_ROLE_ID).await;

    let anonymous = app.call(Method::GET, "/admin/stats", None, None).await;
    assert_eq!(anonymous.status, StatusCode::UNAUTHORIZED);

    let member = app.call(Method::GET, "/admin/stats", Some(&member_token), None).await;
    assert_eq!(member.status, StatusCode::FORBIDDEN);

    let admin = app.call(Method::GET, "/admin/stats", Some(&admin_token), None).await;
    assert_eq!(admin.status, StatusCode::OK);
    assert_eq!(admin.body["total_users"], 2);
}

#[tokio::test]
async fn test_authenticated_routes_require_a_session() {
    let app = TestApp::new();
    for uri in ["/me", "/me/purchases"] {
        let response = app.call(Method::GET, uri, None, None).await;
        assert_eq!(response.status, StatusCode::UNAUTHORIZED, "{uri}");
    }
    let response = app
        .call(Method::POST, "/purchases", Some("not-a-jwt"), Some(json!({})))
        .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}

// --- Users & roles (admin) ---

#[tokio::test]
async fn test_admin_user_and_role_management() {
    let app = TestApp::new();
    let (_, admin_token) = app.seed_user("admin@example.com", ADMIN_ROLE_ID).await;

    let role = app
        .call(
            Method::POST,
            "/admin/roles",
            Some(&admin_token),
            Some(json!({ "name": "gardener" })),
        )
        .await;
    assert_eq!(role.status, StatusCode::CREATED);
    let duplicate = app
        .call(
            Method::POST,
            "/admin/roles",
            Some(&admin_token),
            Some(json!({ "name": "gardener" })),
        )
        .await;
    assert_eq!(duplicate.status, StatusCode::CONFLICT);

    let created = app
        .call(
            Method::POST,
            "/admin/users",
            Some(&admin_token),
            Some(json!({
                "firstname": "Rosalind",
                "lastname": "Franklin",
                "email": "rosalind@example.com",
                "password": "photo-fifty-one",
                "role_ids": [role.body["id"]],
            })),
        )
        .await;
    assert_eq!(created.status, StatusCode::CREATED);
    assert_eq!(created.body["roles"], json!(["gardener"]));
    let user_id = created.body["id"].as_str().unwrap().to_string();

    let granted = app
        .call(
            Method::POST,
            &format!("/admin/users/{user_id}/roles"),
            Some(&admin_token),
            Some(json!({ "role_id": MEMBER_ROLE_ID })),
        )
        .await;
    assert_eq!(granted.status, StatusCode::OK);
    assert_eq!(granted.body["roles"].as_array().unwrap().len(), 2);

    let revoke_uri = format!("/admin/users/{user_id}/roles/{}", role.body["id"].as_str().unwrap());
    let revoked = app.call(Method::DELETE, &revoke_uri, Some(&admin_token), None).await;
    assert_eq!(revoked.status, StatusCode::NO_CONTENT);
    let revoked_again = app.call(Method::DELETE, &revoke_uri, Some(&admin_token), None).await;
    assert_eq!(revoked_again.status, StatusCode::NOT_FOUND);

    let unknown_role = app
        .call(
            Method::POST,
            &format!("/admin/users/{user_id}/roles"),
            Some(&admin_token),
            Some(json!({ "role_id": Uuid::new_v4() })),
        )
        .await;
    assert_eq!(unknown_role.status, StatusCode::NOT_FOUND);

    let renamed = app
        .call(
            Method::PATCH,
            &format!("/admin/users/{user_id}"),
            Some(&admin_token),
            Some(json!({ "lastname": "Franklin-Gosling" })),
        )
        .await;
    assert_eq!(renamed.status, StatusCode::OK);
    assert_eq!(renamed.body["lastname"], "Franklin-Gosling");

    let deleted = app
        .call(Method::DELETE, &format!("/admin/users/{user_id}"), Some(&admin_token), None)
        .await;
    assert_eq!(deleted.status, StatusCode::NO_CONTENT);
    let missing = app
        .call(Method::GET, &format!("/admin/users/{user_id}"), Some(&admin_token), None)
        .await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
}

// --- Catalogue ---

#[tokio::test]
async fn test_catalogue_crud_and_product_details() {
    let app = TestApp::new();
    let (_, admin_token) = app.seed_user("admin@example.com", ADMIN_ROLE_ID).await;
    let (category, fern, cactus) = seed_catalogue(&app, &admin_token).await;
    let fern_id = fern["id"].as_str().unwrap();

    let image = app
        .call(
            Method::POST,
            "/admin/images",
            Some(&admin_token),
            Some(json!({
                "product_id": fern_id,
                "url": "https://cdn.example.com/fern.jpg",
                "alt": "A fern",
            })),
        )
        .await;
    assert_eq!(image.status, StatusCode::CREATED);

    let details = app
        .call(Method::GET, &format!("/products/{fern_id}"), None, None)
        .await;
    assert_eq!(details.status, StatusCode::OK);
    assert_eq!(details.body["name"], "Boston Fern");
    assert_eq!(details.body["category"]["name"], "Indoor");
    assert_eq!(details.body["images"][0]["alt"], "A fern");

    let in_category = app
        .call(
            Method::GET,
            &format!("/categories/{}/products", category["id"].as_str().unwrap()),
            None,
            None,
        )
        .await;
    assert_eq!(in_category.body.as_array().unwrap().len(), 1);

    let search = app.call(Method::GET, "/products?search=CACTUS", None, None).await;
    let found = search.body.as_array().unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0]["id"], cactus["id"]);

    let patched = app
        .call(
            Method::PATCH,
            &format!("/admin/products/{fern_id}"),
            Some(&admin_token),
            Some(json!({ "price": 1500 })),
        )
        .await;
    assert_eq!(patched.status, StatusCode::OK);
    assert_eq!(patched.body["price"], 1500);
    assert_eq!(patched.body["name"], "Boston Fern");

    // Deleting the category keeps the product, uncategorised.
    let deleted = app
        .call(
            Method::DELETE,
            &format!("/admin/categories/{}", category["id"].as_str().unwrap()),
            Some(&admin_token),
            None,
        )
        .await;
    assert_eq!(deleted.status, StatusCode::NO_CONTENT);
    let orphan = app
        .call(Method::GET, &format!("/products/{fern_id}"), None, None)
        .await;
    assert_eq!(orphan.status, StatusCode::OK);
    assert!(orphan.body["category"].is_null());
}

#[tokio::test]
async fn test_category_products_are_paged() {
    let app = TestApp::new();
    let (_, admin_token) = app.seed_user("admin@example.com", ADMIN_ROLE_ID).await;
    let (category, _, _) = seed_catalogue(&app, &admin_token).await;
    let category_id: Uuid = serde_json::from_value(category["id"].clone()).unwrap();

    // The seeded fern plus 59 more makes 60, past the default page size.
    for n in 0..59 {
        app.repo
            .create_product(CreateProductRequest {
                name: format!("Succulent #{n}"),
                short_description: "Small and sturdy".to_string(),
                description: None,
                price: 300,
                stock: 1,
                category_id: Some(category_id),
            })
            .await
            .unwrap();
    }

    let uri = format!("/categories/{category_id}/products");
    let first = app.call(Method::GET, &uri, None, None).await;
    assert_eq!(first.status, StatusCode::OK);
    assert_eq!(first.body.as_array().unwrap().len(), 50);

    let rest = app
        .call(Method::GET, &format!("{uri}?limit=50&offset=50"), None, None)
        .await;
    assert_eq!(rest.body.as_array().unwrap().len(), 10);

    let fern = app
        .call(Method::GET, &format!("{uri}?search=fern"), None, None)
        .await;
    assert_eq!(fern.body.as_array().unwrap().len(), 1);

    let too_big = app
        .call(Method::GET, &format!("{uri}?limit=500"), None, None)
        .await;
    assert_eq!(too_big.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_product_validation_and_missing_references() {
    let app = TestApp::new();
    let (_, admin_token) = app.seed_user("admin@example.com", ADMIN_ROLE_ID).await;

    let negative = app
        .call(
            Method::POST,
            "/admin/products",
            Some(&admin_token),
            Some(json!({ "name": "Bad", "short_description": "Bad", "price": -1 })),
        )
        .await;
    assert_eq!(negative.status, StatusCode::BAD_REQUEST);

    let unknown_category = app
        .call(
            Method::POST,
            "/admin/products",
            Some(&admin_token),
            Some(json!({
                "name": "Orphan",
                "short_description": "No home",
                "price": 100,
                "category_id": Uuid::new_v4(),
            })),
        )
        .await;
    assert_eq!(unknown_category.status, StatusCode::NOT_FOUND);

    let bad_limit = app.call(Method::GET, "/products?limit=0", None, None).await;
    assert_eq!(bad_limit.status, StatusCode::BAD_REQUEST);

    let missing = app
        .call(Method::GET, &format!("/products/{}", Uuid::new_v4()), None, None)
        .await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
}

// --- Purchases ---

#[tokio::test]
async fn test_purchase_total_is_computed_server_side() {
    let app = TestApp::new();
    let (_, admin_token) = app.seed_user("admin@example.com", ADMIN_ROLE_ID).await;
    let (_, fern, cactus) = seed_catalogue(&app, &admin_token).await;
    let (buyer, buyer_token) = app.seed_user("buyer@example.com", MEMBER_ROLE_ID).await;

    let response = app
        .call(
            Method::POST,
            "/purchases",
            Some(&buyer_token),
            Some(json!({
                "address": "1 Leaf Lane",
                "postal_code": "75001",
                "city": "Paris",
                "payment_method": "card",
                "total_price": 1,
                "items": [
                    { "product_id": fern["id"], "quantity": 1 },
                    { "product_id": cactus["id"], "quantity": 3 },
                    { "product_id": fern["id"], "quantity": 1 },
                ],
            })),
        )
        .await;

    assert_eq!(response.status, StatusCode::CREATED);
    assert_eq!(response.body["total_price"], 2 * 1250 + 3 * 499);
    assert_eq!(response.body["status"], "pending");
    assert_eq!(response.body["user_id"], json!(buyer.id));
    let items = response.body["items"].as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["quantity"], 2);
    assert_eq!(items[0]["unit_price"], 1250);

    let mine = app.call(Method::GET, "/me/purchases", Some(&buyer_token), None).await;
    assert_eq!(mine.body.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_merged_duplicate_items_respect_quantity_limit() {
    let app = TestApp::new();
    let (_, admin_token) = app.seed_user("admin@example.com", ADMIN_ROLE_ID).await;
    let (_, fern, _) = seed_catalogue(&app, &admin_token).await;
    let (_, buyer_token) = app.seed_user("buyer@example.com", MEMBER_ROLE_ID).await;

    let response = app
        .call(
            Method::POST,
            "/purchases",
            Some(&buyer_token),
            Some(json!({
                "address": "1 Leaf Lane",
                "postal_code": "75001",
                "city": "Paris",
                "payment_method": "card",
                "items": [
                    { "product_id": fern["id"], "quantity": 600 },
                    { "product_id": fern["id"], "quantity": 600 },
                ],
            })),
        )
        .await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert!(response.body["message"].as_str().unwrap().contains("exceeds 1000"));
    assert!(app.repo.list_purchases().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_purchase_rejects_unknown_products_and_empty_orders() {
    let app = TestApp::new();
    let (_, token) = app.seed_user("buyer@example.com", MEMBER_ROLE_ID).await;
    let order = |items: Value| {
        json!({
            "address": "1 Leaf Lane",
            "postal_code": "75001",
            "city": "Paris",
            "payment_method": "card",
            "items": items,
        })
    };

    let empty = app
        .call(Method::POST, "/purchases", Some(&token), Some(order(json!([]))))
        .await;
    assert_eq!(empty.status, StatusCode::BAD_REQUEST);

    let zero = app
        .call(
            Method::POST,
            "/purchases",
            Some(&token),
            Some(order(json!([{ "product_id": Uuid::new_v4(), "quantity": 0 }]))),
        )
        .await;
    assert_eq!(zero.status, StatusCode::BAD_REQUEST);

    let unknown = app
        .call(
            Method::POST,
            "/purchases",
            Some(&token),
            Some(order(json!([{ "product_id": Uuid::new_v4(), "quantity": 1 }]))),
        )
        .await;
    assert_eq!(unknown.status, StatusCode::NOT_FOUND);
    assert!(app.repo.list_purchases().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_purchase_visible_to_owner_and_admin_only() {
    let app = TestApp::new();
    let (_, admin_token) = app.seed_user("admin@example.com", ADMIN_ROLE_ID).await;
    let (_, fern, _) = seed_catalogue(&app, &admin_token).await;
    let (_, owner_token) = app.seed_user("owner@example.com", MEMBER_ROLE_ID).await;
    let (_, other_token) = app.seed_user("other@example.com", MEMBER_ROLE_ID).await;

    let created = app
        .call(
            Method::POST,
            "/purchases",
            Some(&owner_token),
            Some(json!({
                "address": "1 Leaf Lane",
                "postal_code": "75001",
                "city": "Paris",
                "payment_method": "card",
                "items": [{ "product_id": fern["id"], "quantity": 1 }],
            })),
        )
        .await;
    let uri = format!("/purchases/{}", created.body["id"].as_str().unwrap());

    assert_eq!(app.call(Method::GET, &uri, Some(&owner_token), None).await.status, StatusCode::OK);
    assert_eq!(app.call(Method::GET, &uri, Some(&admin_token), None).await.status, StatusCode::OK);
    assert_eq!(
        app.call(Method::GET, &uri, Some(&other_token), None).await.status,
        StatusCode::NOT_FOUND
    );
}

#[tokio::test]
async fn test_admin_line_item_edits_recompute_total() {
    let app = TestApp::new();
    let (_, admin_token) = app.seed_user("admin@example.com", ADMIN_ROLE_ID).await;
    let (_, fern, cactus) = seed_catalogue(&app, &admin_token).await;
    let (_, buyer_token) = app.seed_user("buyer@example.com", MEMBER_ROLE_ID).await;

    let created = app
        .call(
            Method::POST,
            "/purchases",
            Some(&buyer_token),
            Some(json!({
                "address": "1 Leaf Lane",
                "postal_code": "75001",
                "city": "Paris",
                "payment_method": "card",
                "items": [{ "product_id": fern["id"], "quantity": 1 }],
            })),
        )
        .await;
    let purchase_id: Uuid = serde_json::from_value(created.body["id"].clone()).unwrap();

    let added = app
        .call(
            Method::POST,
            "/admin/purchase-products",
            Some(&admin_token),
            Some(json!({ "purchase_id": purchase_id, "product_id": cactus["id"], "quantity": 2 })),
        )
        .await;
    assert_eq!(added.status, StatusCode::CREATED);
    assert_eq!(added.body["unit_price"], 499);
    let total = app.repo.get_purchase(purchase_id).await.unwrap().unwrap().total_price;
    assert_eq!(total, 1250 + 2 * 499);

    let line_uri = format!("/admin/purchase-products/{}", added.body["id"].as_str().unwrap());
    let updated = app
        .call(Method::PATCH, &line_uri, Some(&admin_token), Some(json!({ "quantity": 4 })))
        .await;
    assert_eq!(updated.status, StatusCode::OK);
    let total = app.repo.get_purchase(purchase_id).await.unwrap().unwrap().total_price;
    assert_eq!(total, 1250 + 4 * 499);

    let listed = app
        .call(
            Method::GET,
            &format!("/admin/purchase-products?purchase_id={purchase_id}"),
            Some(&admin_token),
            None,
        )
        .await;
    assert_eq!(listed.body.as_array().unwrap().len(), 2);

    let removed = app.call(Method::DELETE, &line_uri, Some(&admin_token), None).await;
    assert_eq!(removed.status, StatusCode::NO_CONTENT);
    let total = app.repo.get_purchase(purchase_id).await.unwrap().unwrap().total_price;
    assert_eq!(total, 1250);

    // A product that is part of an order cannot be deleted.
    let blocked = app
        .call(
            Method::DELETE,
            &format!("/admin/products/{}", fern["id"].as_str().unwrap()),
            Some(&admin_token),
            None,
        )
        .await;
    assert_eq!(blocked.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_admin_updates_status_and_stats_count_revenue() {
    let app = TestApp::new();
    let (_, admin_token) = app.seed_user("admin@example.com", ADMIN_ROLE_ID).await;
    let (_, fern, _) = seed_catalogue(&app, &admin_token).await;
    let (_, buyer_token) = app.seed_user("buyer@example.com", MEMBER_ROLE_ID).await;

    let created = app
        .call(
            Method::POST,
            "/purchases",
            Some(&buyer_token),
            Some(json!({
                "address": "1 Leaf Lane",
                "postal_code": "75001",
                "city": "Paris",
                "payment_method": "card",
                "items": [{ "product_id": fern["id"], "quantity": 2 }],
            })),
        )
        .await;
    let uri = format!("/admin/purchases/{}", created.body["id"].as_str().unwrap());

    let shipped = app
        .call(Method::PATCH, &uri, Some(&admin_token), Some(json!({ "status": "shipped" })))
        .await;
    assert_eq!(shipped.status, StatusCode::OK);
    assert_eq!(shipped.body["status"], "shipped");

    let stats = app.call(Method::GET, "/admin/stats", Some(&admin_token), None).await;
    assert_eq!(stats.body["total_purchases"], 1);
    assert_eq!(stats.body["pending_purchases"], 0);
    assert_eq!(stats.body["paid_revenue"], 2500);

    let deleted = app.call(Method::DELETE, &uri, Some(&admin_token), None).await;
    assert_eq!(deleted.status, StatusCode::NO_CONTENT);
    let all = app.call(Method::GET, "/admin/purchases", Some(&admin_token), None).await;
    assert!(all.body.as_array().unwrap().is_empty());
}

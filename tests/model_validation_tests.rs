use chrono::Utc;
use greenroots::models::{
    CreateProductRequest, CreatePurchaseRequest, Product, ProductDetails, ProductFilter,
    Purchase, PurchaseDetails, PurchaseItemRequest, PurchaseProduct, PurchaseStatus,
    RegisterRequest, UpdateUserRequest, User, UserProfile,
};
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

fn register(password: &str, confirm: &str, email: &str) -> RegisterRequest {
    RegisterRequest {
        firstname: "Ada".to_string(),
        lastname: "Lovelace".to_string(),
        email: email.to_string(),
        password: password.to_string(),
        confirm_password: confirm.to_string(),
    }
}

fn purchase_request(items: Vec<PurchaseItemRequest>) -> CreatePurchaseRequest {
    CreatePurchaseRequest {
        address: "12 Garden Row".to_string(),
        postal_code: "1000".to_string(),
        city: "Brussels".to_string(),
        payment_method: "card".to_string(),
        items,
    }
}

// --- Validation Rules ---

#[test]
fn test_register_request_rules() {
    assert!(register("long-enough", "long-enough", "ada@example.com").validate().is_ok());

    let errors = register("short", "short", "ada@example.com").validate().unwrap_err();
    assert!(errors.field_errors().contains_key("password"));

    let errors = register("long-enough", "different!", "ada@example.com")
        .validate()
        .unwrap_err();
    assert!(errors.field_errors().contains_key("confirm_password"));

    let errors = register("long-enough", "long-enough", "not-an-email")
        .validate()
        .unwrap_err();
    assert!(errors.field_errors().contains_key("email"));
}

#[test]
fn test_partial_user_update_validates_only_present_fields() {
    assert!(UpdateUserRequest::default().validate().is_ok());

    let bad = UpdateUserRequest {
        password: Some("tiny".to_string()),
        ..Default::default()
    };
    assert!(bad.validate().is_err());
}

#[test]
fn test_product_price_and_stock_are_non_negative() {
    let product = CreateProductRequest {
        name: "Olive tree".to_string(),
        short_description: "Mediterranean classic".to_string(),
        description: None,
        price: 8900,
        stock: 0,
        category_id: None,
    };
    assert!(product.validate().is_ok());

    let negative = CreateProductRequest {
        price: -1,
        ..product.clone()
    };
    assert!(negative.validate().is_err());

    let empty_name = CreateProductRequest {
        name: String::new(),
        ..product
    };
    assert!(empty_name.validate().is_err());
}

#[test]
fn test_purchase_items_are_validated_individually() {
    let item = |quantity| PurchaseItemRequest {
        product_id: Uuid::new_v4(),
        quantity,
    };

    assert!(purchase_request(vec![item(1), item(3)]).validate().is_ok());
    assert!(purchase_request(vec![]).validate().is_err());
    assert!(purchase_request(vec![item(1), item(0)]).validate().is_err());
    assert!(purchase_request(vec![item(1001)]).validate().is_err());
}

#[test]
fn test_product_filter_bounds_and_defaults() {
    let filter = ProductFilter::default();
    assert!(filter.validate().is_ok());
    assert_eq!(filter.limit(), ProductFilter::DEFAULT_LIMIT);
    assert_eq!(filter.offset(), 0);

    let too_big = ProductFilter {
        limit: Some(101),
        ..Default::default()
    };
    assert!(too_big.validate().is_err());

    let blank = ProductFilter {
        search: Some("   ".to_string()),
        ..Default::default()
    };
    assert_eq!(blank.search_term(), None);

    let padded = ProductFilter {
        search: Some("  fern ".to_string()),
        ..Default::default()
    };
    assert_eq!(padded.search_term(), Some("fern"));
}

// --- Serialization ---

#[test]
fn test_purchase_status_is_lowercase_on_the_wire() {
    assert_eq!(serde_json::to_value(PurchaseStatus::Cancelled).unwrap(), json!("cancelled"));
    let parsed: PurchaseStatus = serde_json::from_value(json!("shipped")).unwrap();
    assert_eq!(parsed, PurchaseStatus::Shipped);
    assert!(serde_json::from_value::<PurchaseStatus>(json!("Refunded")).is_err());
    assert_eq!(PurchaseStatus::default(), PurchaseStatus::Pending);
}

#[test]
fn test_detail_payloads_flatten_their_parent() {
    let product = Product {
        id: Uuid::new_v4(),
        name: "Lavender".to_string(),
        short_description: "Smells great".to_string(),
        price: 650,
        ..Default::default()
    };
    let details = serde_json::to_value(ProductDetails {
        product: product.clone(),
        category: None,
        images: vec![],
    })
    .unwrap();
    assert_eq!(details["name"], "Lavender");
    assert_eq!(details["price"], 650);
    assert!(details["category"].is_null());
    assert!(details.get("product").is_none());

    let purchase = Purchase {
        id: Uuid::new_v4(),
        total_price: 1300,
        ..Default::default()
    };
    let line = PurchaseProduct {
        id: Uuid::new_v4(),
        purchase_id: purchase.id,
        product_id: product.id,
        quantity: 2,
        unit_price: 650,
    };
    assert_eq!(line.line_total(), 1300);
    let details = serde_json::to_value(PurchaseDetails {
        purchase,
        items: vec![line],
    })
    .unwrap();
    assert_eq!(details["status"], "pending");
    assert_eq!(details["total_price"], 1300);
    assert_eq!(details["items"][0]["quantity"], 2);
}

#[test]
fn test_user_profile_carries_roles_but_no_secrets() {
    let user = User {
        id: Uuid::new_v4(),
        firstname: "Ada".to_string(),
        lastname: "Lovelace".to_string(),
        email: "ada@example.com".to_string(),
        created_at: Utc::now(),
        updated_at: Utc::now(),
    };
    let profile = UserProfile::new(user.clone(), vec!["admin".to_string()]);
    assert!(profile.has_role("admin"));
    assert!(!profile.has_role("member"));

    let value = serde_json::to_value(&profile).unwrap();
    assert_eq!(value["id"], json!(user.id));
    assert!(value.get("password_hash").is_none());
    assert_eq!(value["roles"], json!(["admin"]));
}

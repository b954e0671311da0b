//! Persistence contracts.
//!
//! Each entity gets its own trait so handlers depend only on what they touch. The
//! `Repository` supertrait bundles them for the shared application state, and is
//! implemented by `PostgresRepository` in production and by `MemoryRepository` in tests.
//!
//! Conventions: lookups return `Ok(None)` when the row does not exist, deletes return
//! `Ok(false)`, and uniqueness violations come back as `AppError::Conflict`.

use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    error::Result,
    models::{
        AdminStats, Category, CreateCategoryRequest, CreateImageRequest, CreateProductRequest,
        Image, NewPurchase, NewPurchaseLine, NewUser, Product, ProductFilter, Purchase,
        PurchaseDetails, PurchaseProduct, PurchaseStatus, Role, UpdateCategoryRequest,
        UpdateImageRequest, UpdateProductRequest, UpdatePurchaseRequest, User, UserChanges,
        UserCredentials,
    },
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryRepository;
pub use postgres::PostgresRepository;

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn list_users(&self) -> Result<Vec<User>>;
    async fn get_user(&self, id: Uuid) -> Result<Option<User>>;
    /// Case-insensitive lookup used by the login flow.
    async fn find_credentials_by_email(&self, email: &str) -> Result<Option<UserCredentials>>;
    async fn create_user(&self, user: NewUser) -> Result<User>;
    async fn update_user(&self, id: Uuid, changes: UserChanges) -> Result<Option<User>>;
    /// Cascades to the user's role grants and purchases.
    async fn delete_user(&self, id: Uuid) -> Result<bool>;
}

#[async_trait]
pub trait RoleRepository: Send + Sync {
    async fn list_roles(&self) -> Result<Vec<Role>>;
    async fn get_role(&self, id: Uuid) -> Result<Option<Role>>;
    async fn find_role_by_name(&self, name: &str) -> Result<Option<Role>>;
    async fn create_role(&self, name: &str) -> Result<Role>;
    async fn update_role(&self, id: Uuid, name: &str) -> Result<Option<Role>>;
    async fn delete_role(&self, id: Uuid) -> Result<bool>;
    async fn roles_for_user(&self, user_id: Uuid) -> Result<Vec<Role>>;
    /// Idempotent: granting an already granted role is a no-op.
    async fn assign_role(&self, user_id: Uuid, role_id: Uuid) -> Result<()>;
    async fn revoke_role(&self, user_id: Uuid, role_id: Uuid) -> Result<bool>;
}

#[async_trait]
pub trait CategoryRepository: Send + Sync {
    async fn list_categories(&self) -> Result<Vec<Category>>;
    async fn get_category(&self, id: Uuid) -> Result<Option<Category>>;
    async fn create_category(&self, req: CreateCategoryRequest) -> Result<Category>;
    async fn update_category(&self, id: Uuid, req: UpdateCategoryRequest) -> Result<Option<Category>>;
    /// Products of a deleted category become uncategorised.
    async fn delete_category(&self, id: Uuid) -> Result<bool>;
}

#[async_trait]
pub trait ProductRepository: Send + Sync {
    async fn list_products(&self, filter: &ProductFilter) -> Result<Vec<Product>>;
    async fn get_product(&self, id: Uuid) -> Result<Option<Product>>;
    async fn find_products_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Product>>;
    async fn create_product(&self, req: CreateProductRequest) -> Result<Product>;
    async fn update_product(&self, id: Uuid, req: UpdateProductRequest) -> Result<Option<Product>>;
    /// Fails with `BadRequest` while a purchase line still references the product.
    async fn delete_product(&self, id: Uuid) -> Result<bool>;
}

#[async_trait]
pub trait ImageRepository: Send + Sync {
    async fn list_images_for_product(&self, product_id: Uuid) -> Result<Vec<Image>>;
    async fn get_image(&self, id: Uuid) -> Result<Option<Image>>;
    async fn create_image(&self, req: CreateImageRequest) -> Result<Image>;
    async fn update_image(&self, id: Uuid, req: UpdateImageRequest) -> Result<Option<Image>>;
    async fn delete_image(&self, id: Uuid) -> Result<bool>;
}

#[async_trait]
pub trait PurchaseRepository: Send + Sync {
    /// Inserts the purchase and all of its lines atomically.
    async fn create_purchase(&self, purchase: NewPurchase, lines: Vec<NewPurchaseLine>) -> Result<PurchaseDetails>;
    async fn list_purchases(&self) -> Result<Vec<Purchase>>;
    async fn list_purchases_for_user(&self, user_id: Uuid) -> Result<Vec<Purchase>>;
    async fn get_purchase(&self, id: Uuid) -> Result<Option<Purchase>>;
    async fn update_purchase(&self, id: Uuid, req: UpdatePurchaseRequest) -> Result<Option<Purchase>>;
    async fn delete_purchase(&self, id: Uuid) -> Result<bool>;
    async fn set_stripe_session(&self, id: Uuid, session_id: &str) -> Result<Option<Purchase>>;
    async fn find_purchase_by_session(&self, session_id: &str) -> Result<Option<Purchase>>;
    /// Compare-and-set on the status column: only applies when the current status is
    /// `from`, so replayed payment notifications cannot move a purchase twice.
    async fn transition_status(&self, id: Uuid, from: PurchaseStatus, to: PurchaseStatus) -> Result<Option<Purchase>>;
    async fn stats(&self) -> Result<AdminStats>;
}

/// Line items. Every mutation recomputes the owning purchase's total.
#[async_trait]
pub trait PurchaseProductRepository: Send + Sync {
    async fn list_purchase_products(&self, purchase_id: Option<Uuid>) -> Result<Vec<PurchaseProduct>>;
    async fn get_purchase_product(&self, id: Uuid) -> Result<Option<PurchaseProduct>>;
    async fn add_purchase_product(&self, purchase_id: Uuid, line: NewPurchaseLine) -> Result<PurchaseProduct>;
    async fn update_purchase_product_quantity(&self, id: Uuid, quantity: i32) -> Result<Option<PurchaseProduct>>;
    async fn delete_purchase_product(&self, id: Uuid) -> Result<bool>;
}

/// Repository
///
/// Everything the application state needs from the persistence layer.
pub trait Repository:
    UserRepository
    + RoleRepository
    + CategoryRepository
    + ProductRepository
    + ImageRepository
    + PurchaseRepository
    + PurchaseProductRepository
{
}

impl<T> Repository for T where
    T: UserRepository
        + RoleRepository
        + CategoryRepository
        + ProductRepository
        + ImageRepository
        + PurchaseRepository
        + PurchaseProductRepository
{
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    CategoryRepository, ImageRepository, ProductRepository, PurchaseProductRepository,
    PurchaseRepository, RoleRepository, UserRepository,
};
use crate::{
    error::{AppError, Result},
    models::{
        AdminStats, Category, CreateCategoryRequest, CreateImageRequest, CreateProductRequest,
        Image, NewPurchase, NewPurchaseLine, NewUser, Product, ProductFilter, Purchase,
        PurchaseDetails, PurchaseProduct, PurchaseStatus, Role, UpdateCategoryRequest,
        UpdateImageRequest, UpdateProductRequest, UpdatePurchaseRequest, User, UserChanges,
        UserCredentials, UserRole,
        role::{ADMIN_ROLE, MEMBER_ROLE},
    },
};

/// Ids of the roles seeded by the initial migration.
pub const ADMIN_ROLE_ID: Uuid = Uuid::from_u128(1);
pub const MEMBER_ROLE_ID: Uuid = Uuid::from_u128(2);

#[derive(Default)]
struct Store {
    users: Vec<(User, String)>,
    roles: Vec<Role>,
    user_roles: Vec<UserRole>,
    categories: Vec<Category>,
    products: Vec<Product>,
    images: Vec<Image>,
    purchases: Vec<Purchase>,
    lines: Vec<PurchaseProduct>,
}

impl Store {
    fn refresh_total(&mut self, purchase_id: Uuid) {
        let total = self
            .lines
            .iter()
            .filter(|l| l.purchase_id == purchase_id)
            .map(PurchaseProduct::line_total)
            .sum();
        if let Some(p) = self.purchases.iter_mut().find(|p| p.id == purchase_id) {
            p.total_price = total;
            p.updated_at = Utc::now();
        }
    }
}

/// MemoryRepository
///
/// An in-process implementation of every repository trait, used by the test-suite to
/// drive handlers and the router without a database. It enforces the same uniqueness,
/// cascade and referential rules as the Postgres schema.
pub struct MemoryRepository {
    store: RwLock<Store>,
}

impl Default for MemoryRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRepository {
    /// Starts with the `admin` and `member` roles, like a freshly migrated database.
    pub fn new() -> Self {
        let store = Store {
            roles: vec![
                Role {
                    id: ADMIN_ROLE_ID,
                    name: ADMIN_ROLE.to_string(),
                },
                Role {
                    id: MEMBER_ROLE_ID,
                    name: MEMBER_ROLE.to_string(),
                },
            ],
            ..Store::default()
        };
        Self {
            store: RwLock::new(store),
        }
    }
}

#[async_trait]
impl UserRepository for MemoryRepository {
    async fn list_users(&self) -> Result<Vec<User>> {
        let store = self.store.read().await;
        Ok(store.users.iter().map(|(u, _)| u.clone()).collect())
    }

    async fn get_user(&self, id: Uuid) -> Result<Option<User>> {
        let store = self.store.read().await;
        Ok(store.users.iter().find(|(u, _)| u.id == id).map(|(u, _)| u.clone()))
    }

    async fn find_credentials_by_email(&self, email: &str) -> Result<Option<UserCredentials>> {
        let store = self.store.read().await;
        Ok(store
            .users
            .iter()
            .find(|(u, _)| u.email.eq_ignore_ascii_case(email))
            .map(|(u, hash)| UserCredentials {
                id: u.id,
                email: u.email.clone(),
                password_hash: hash.clone(),
            }))
    }

    async fn create_user(&self, user: NewUser) -> Result<User> {
        let mut store = self.store.write().await;
        let email = user.email.to_lowercase();
        if store.users.iter().any(|(u, _)| u.email == email) {
            return Err(AppError::Conflict("email already registered".to_string()));
        }
        let now = Utc::now();
        let created = User {
            id: Uuid::new_v4(),
            firstname: user.firstname,
            lastname: user.lastname,
            email,
            created_at: now,
            updated_at: now,
        };
        store.users.push((created.clone(), user.password_hash));
        Ok(created)
    }

    async fn update_user(&self, id: Uuid, changes: UserChanges) -> Result<Option<User>> {
        let mut store = self.store.write().await;
        if let Some(email) = &changes.email {
            let email = email.to_lowercase();
            if store.users.iter().any(|(u, _)| u.email == email && u.id != id) {
                return Err(AppError::Conflict("email already registered".to_string()));
            }
        }
        let Some((user, hash)) = store.users.iter_mut().find(|(u, _)| u.id == id) else {
            return Ok(None);
        };
        if let Some(firstname) = changes.firstname {
            user.firstname = firstname;
        }
        if let Some(lastname) = changes.lastname {
            user.lastname = lastname;
        }
        if let Some(email) = changes.email {
            user.email = email.to_lowercase();
        }
        if let Some(password_hash) = changes.password_hash {
            *hash = password_hash;
        }
        user.updated_at = Utc::now();
        Ok(Some(user.clone()))
    }

    async fn delete_user(&self, id: Uuid) -> Result<bool> {
        let mut store = self.store.write().await;
        let before = store.users.len();
        store.users.retain(|(u, _)| u.id != id);
        if store.users.len() == before {
            return Ok(false);
        }
        store.user_roles.retain(|ur| ur.user_id != id);
        let purchase_ids: Vec<Uuid> = store
            .purchases
            .iter()
            .filter(|p| p.user_id == id)
            .map(|p| p.id)
            .collect();
        store.purchases.retain(|p| p.user_id != id);
        store.lines.retain(|l| !purchase_ids.contains(&l.purchase_id));
        Ok(true)
    }
}

#[async_trait]
impl RoleRepository for MemoryRepository {
    async fn list_roles(&self) -> Result<Vec<Role>> {
        let store = self.store.read().await;
        let mut roles = store.roles.clone();
        roles.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(roles)
    }

    async fn get_role(&self, id: Uuid) -> Result<Option<Role>> {
        let store = self.store.read().await;
        Ok(store.roles.iter().find(|r| r.id == id).cloned())
    }

    async fn find_role_by_name(&self, name: &str) -> Result<Option<Role>> {
        let store = self.store.read().await;
        Ok(store.roles.iter().find(|r| r.name == name).cloned())
    }

    async fn create_role(&self, name: &str) -> Result<Role> {
        let mut store = self.store.write().await;
        if store.roles.iter().any(|r| r.name == name) {
            return Err(AppError::Conflict("roles_name_key already exists".to_string()));
        }
        let role = Role {
            id: Uuid::new_v4(),
            name: name.to_string(),
        };
        store.roles.push(role.clone());
        Ok(role)
    }

    async fn update_role(&self, id: Uuid, name: &str) -> Result<Option<Role>> {
        let mut store = self.store.write().await;
        if store.roles.iter().any(|r| r.name == name && r.id != id) {
            return Err(AppError::Conflict("roles_name_key already exists".to_string()));
        }
        Ok(store.roles.iter_mut().find(|r| r.id == id).map(|role| {
            role.name = name.to_string();
            role.clone()
        }))
    }

    async fn delete_role(&self, id: Uuid) -> Result<bool> {
        let mut store = self.store.write().await;
        let before = store.roles.len();
        store.roles.retain(|r| r.id != id);
        store.user_roles.retain(|ur| ur.role_id != id);
        Ok(store.roles.len() < before)
    }

    async fn roles_for_user(&self, user_id: Uuid) -> Result<Vec<Role>> {
        let store = self.store.read().await;
        let mut roles: Vec<Role> = store
            .user_roles
            .iter()
            .filter(|ur| ur.user_id == user_id)
            .filter_map(|ur| store.roles.iter().find(|r| r.id == ur.role_id).cloned())
            .collect();
        roles.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(roles)
    }

    async fn assign_role(&self, user_id: Uuid, role_id: Uuid) -> Result<()> {
        let mut store = self.store.write().await;
        let user_exists = store.users.iter().any(|(u, _)| u.id == user_id);
        let role_exists = store.roles.iter().any(|r| r.id == role_id);
        if !user_exists || !role_exists {
            return Err(AppError::bad_request(
                "operation violates a reference to another resource",
            ));
        }
        let grant = UserRole { user_id, role_id };
        if !store.user_roles.contains(&grant) {
            store.user_roles.push(grant);
        }
        Ok(())
    }

    async fn revoke_role(&self, user_id: Uuid, role_id: Uuid) -> Result<bool> {
        let mut store = self.store.write().await;
        let before = store.user_roles.len();
        store
            .user_roles
            .retain(|ur| !(ur.user_id == user_id && ur.role_id == role_id));
        Ok(store.user_roles.len() < before)
    }
}

#[async_trait]
impl CategoryRepository for MemoryRepository {
    async fn list_categories(&self) -> Result<Vec<Category>> {
        let store = self.store.read().await;
        let mut categories = store.categories.clone();
        categories.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(categories)
    }

    async fn get_category(&self, id: Uuid) -> Result<Option<Category>> {
        let store = self.store.read().await;
        Ok(store.categories.iter().find(|c| c.id == id).cloned())
    }

    async fn create_category(&self, req: CreateCategoryRequest) -> Result<Category> {
        let mut store = self.store.write().await;
        if store.categories.iter().any(|c| c.name == req.name) {
            return Err(AppError::Conflict("categories_name_key already exists".to_string()));
        }
        let now = Utc::now();
        let category = Category {
            id: Uuid::new_v4(),
            name: req.name,
            description: req.description,
            created_at: now,
            updated_at: now,
        };
        store.categories.push(category.clone());
        Ok(category)
    }

    async fn update_category(&self, id: Uuid, req: UpdateCategoryRequest) -> Result<Option<Category>> {
        let mut store = self.store.write().await;
        if let Some(name) = &req.name {
            if store.categories.iter().any(|c| &c.name == name && c.id != id) {
                return Err(AppError::Conflict("categories_name_key already exists".to_string()));
            }
        }
        Ok(store.categories.iter_mut().find(|c| c.id == id).map(|category| {
            if let Some(name) = req.name {
                category.name = name;
            }
            if let Some(description) = req.description {
                category.description = Some(description);
            }
            category.updated_at = Utc::now();
            category.clone()
        }))
    }

    async fn delete_category(&self, id: Uuid) -> Result<bool> {
        let mut store = self.store.write().await;
        let before = store.categories.len();
        store.categories.retain(|c| c.id != id);
        if store.categories.len() == before {
            return Ok(false);
        }
        for product in store.products.iter_mut().filter(|p| p.category_id == Some(id)) {
            product.category_id = None;
        }
        Ok(true)
    }
}

#[async_trait]
impl ProductRepository for MemoryRepository {
    async fn list_products(&self, filter: &ProductFilter) -> Result<Vec<Product>> {
        let store = self.store.read().await;
        let needle = filter.search_term().map(str::to_lowercase);
        let mut products: Vec<Product> = store
            .products
            .iter()
            .filter(|p| filter.category_id.is_none_or(|c| p.category_id == Some(c)))
            .filter(|p| {
                needle.as_deref().is_none_or(|n| {
                    p.name.to_lowercase().contains(n) || p.short_description.to_lowercase().contains(n)
                })
            })
            .cloned()
            .collect();
        // Newest first; insertion order breaks timestamp ties.
        products.reverse();
        let offset = usize::try_from(filter.offset()).unwrap_or(0);
        let limit = usize::try_from(filter.limit()).unwrap_or(0);
        Ok(products.into_iter().skip(offset).take(limit).collect())
    }

    async fn get_product(&self, id: Uuid) -> Result<Option<Product>> {
        let store = self.store.read().await;
        Ok(store.products.iter().find(|p| p.id == id).cloned())
    }

    async fn find_products_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Product>> {
        let store = self.store.read().await;
        Ok(store
            .products
            .iter()
            .filter(|p| ids.contains(&p.id))
            .cloned()
            .collect())
    }

    async fn create_product(&self, req: CreateProductRequest) -> Result<Product> {
        let mut store = self.store.write().await;
        if let Some(category_id) = req.category_id {
            if !store.categories.iter().any(|c| c.id == category_id) {
                return Err(AppError::bad_request(
                    "operation violates a reference to another resource",
                ));
            }
        }
        let now = Utc::now();
        let product = Product {
            id: Uuid::new_v4(),
            name: req.name,
            short_description: req.short_description,
            description: req.description,
            price: req.price,
            stock: req.stock,
            category_id: req.category_id,
            created_at: now,
            updated_at: now,
        };
        store.products.push(product.clone());
        Ok(product)
    }

    async fn update_product(&self, id: Uuid, req: UpdateProductRequest) -> Result<Option<Product>> {
        let mut store = self.store.write().await;
        if let Some(category_id) = req.category_id {
            if !store.categories.iter().any(|c| c.id == category_id) {
                return Err(AppError::bad_request(
                    "operation violates a reference to another resource",
                ));
            }
        }
        Ok(store.products.iter_mut().find(|p| p.id == id).map(|product| {
            if let Some(name) = req.name {
                product.name = name;
            }
            if let Some(short_description) = req.short_description {
                product.short_description = short_description;
            }
            if let Some(description) = req.description {
                product.description = Some(description);
            }
            if let Some(price) = req.price {
                product.price = price;
            }
            if let Some(stock) = req.stock {
                product.stock = stock;
            }
            if let Some(category_id) = req.category_id {
                product.category_id = Some(category_id);
            }
            product.updated_at = Utc::now();
            product.clone()
        }))
    }

    async fn delete_product(&self, id: Uuid) -> Result<bool> {
        let mut store = self.store.write().await;
        if store.lines.iter().any(|l| l.product_id == id) {
            return Err(AppError::bad_request(
                "product is referenced by existing purchases",
            ));
        }
        let before = store.products.len();
        store.products.retain(|p| p.id != id);
        store.images.retain(|i| i.product_id != id);
        Ok(store.products.len() < before)
    }
}

#[async_trait]
impl ImageRepository for MemoryRepository {
    async fn list_images_for_product(&self, product_id: Uuid) -> Result<Vec<Image>> {
        let store = self.store.read().await;
        Ok(store
            .images
            .iter()
            .filter(|i| i.product_id == product_id)
            .cloned()
            .collect())
    }

    async fn get_image(&self, id: Uuid) -> Result<Option<Image>> {
        let store = self.store.read().await;
        Ok(store.images.iter().find(|i| i.id == id).cloned())
    }

    async fn create_image(&self, req: CreateImageRequest) -> Result<Image> {
        let mut store = self.store.write().await;
        if !store.products.iter().any(|p| p.id == req.product_id) {
            return Err(AppError::bad_request(
                "operation violates a reference to another resource",
            ));
        }
        let image = Image {
            id: Uuid::new_v4(),
            product_id: req.product_id,
            url: req.url,
            alt: req.alt,
            created_at: Utc::now(),
        };
        store.images.push(image.clone());
        Ok(image)
    }

    async fn update_image(&self, id: Uuid, req: UpdateImageRequest) -> Result<Option<Image>> {
        let mut store = self.store.write().await;
        Ok(store.images.iter_mut().find(|i| i.id == id).map(|image| {
            if let Some(url) = req.url {
                image.url = url;
            }
            if let Some(alt) = req.alt {
                image.alt = Some(alt);
            }
            image.clone()
        }))
    }

    async fn delete_image(&self, id: Uuid) -> Result<bool> {
        let mut store = self.store.write().await;
        let before = store.images.len();
        store.images.retain(|i| i.id != id);
        Ok(store.images.len() < before)
    }
}

#[async_trait]
impl PurchaseRepository for MemoryRepository {
    async fn create_purchase(&self, purchase: NewPurchase, lines: Vec<NewPurchaseLine>) -> Result<PurchaseDetails> {
        let mut store = self.store.write().await;
        // Validate every reference before touching the store, so a failure leaves no rows.
        if !store.users.iter().any(|(u, _)| u.id == purchase.user_id)
            || lines
                .iter()
                .any(|l| !store.products.iter().any(|p| p.id == l.product_id))
        {
            return Err(AppError::bad_request(
                "operation violates a reference to another resource",
            ));
        }
        let now = Utc::now();
        let created = Purchase {
            id: Uuid::new_v4(),
            user_id: purchase.user_id,
            address: purchase.address,
            postal_code: purchase.postal_code,
            city: purchase.city,
            total_price: purchase.total_price,
            status: PurchaseStatus::Pending,
            payment_method: purchase.payment_method,
            stripe_session_id: None,
            created_at: now,
            updated_at: now,
        };
        let items: Vec<PurchaseProduct> = lines
            .into_iter()
            .map(|l| PurchaseProduct {
                id: Uuid::new_v4(),
                purchase_id: created.id,
                product_id: l.product_id,
                quantity: l.quantity,
                unit_price: l.unit_price,
            })
            .collect();
        store.purchases.push(created.clone());
        store.lines.extend(items.iter().cloned());
        Ok(PurchaseDetails {
            purchase: created,
            items,
        })
    }

    async fn list_purchases(&self) -> Result<Vec<Purchase>> {
        let store = self.store.read().await;
        Ok(store.purchases.iter().rev().cloned().collect())
    }

    async fn list_purchases_for_user(&self, user_id: Uuid) -> Result<Vec<Purchase>> {
        let store = self.store.read().await;
        Ok(store
            .purchases
            .iter()
            .rev()
            .filter(|p| p.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn get_purchase(&self, id: Uuid) -> Result<Option<Purchase>> {
        let store = self.store.read().await;
        Ok(store.purchases.iter().find(|p| p.id == id).cloned())
    }

    async fn update_purchase(&self, id: Uuid, req: UpdatePurchaseRequest) -> Result<Option<Purchase>> {
        let mut store = self.store.write().await;
        Ok(store.purchases.iter_mut().find(|p| p.id == id).map(|purchase| {
            if let Some(address) = req.address {
                purchase.address = address;
            }
            if let Some(postal_code) = req.postal_code {
                purchase.postal_code = postal_code;
            }
            if let Some(city) = req.city {
                purchase.city = city;
            }
            if let Some(status) = req.status {
                purchase.status = status;
            }
            purchase.updated_at = Utc::now();
            purchase.clone()
        }))
    }

    async fn delete_purchase(&self, id: Uuid) -> Result<bool> {
        let mut store = self.store.write().await;
        let before = store.purchases.len();
        store.purchases.retain(|p| p.id != id);
        store.lines.retain(|l| l.purchase_id != id);
        Ok(store.purchases.len() < before)
    }

    async fn set_stripe_session(&self, id: Uuid, session_id: &str) -> Result<Option<Purchase>> {
        let mut store = self.store.write().await;
        Ok(store.purchases.iter_mut().find(|p| p.id == id).map(|purchase| {
            purchase.stripe_session_id = Some(session_id.to_string());
            purchase.updated_at = Utc::now();
            purchase.clone()
        }))
    }

    async fn find_purchase_by_session(&self, session_id: &str) -> Result<Option<Purchase>> {
        let store = self.store.read().await;
        Ok(store
            .purchases
            .iter()
            .find(|p| p.stripe_session_id.as_deref() == Some(session_id))
            .cloned())
    }

    async fn transition_status(&self, id: Uuid, from: PurchaseStatus, to: PurchaseStatus) -> Result<Option<Purchase>> {
        let mut store = self.store.write().await;
        Ok(store
            .purchases
            .iter_mut()
            .find(|p| p.id == id && p.status == from)
            .map(|purchase| {
                purchase.status = to;
                purchase.updated_at = Utc::now();
                purchase.clone()
            }))
    }

    async fn stats(&self) -> Result<AdminStats> {
        let store = self.store.read().await;
        let count = |n: usize| i64::try_from(n).unwrap_or(i64::MAX);
        Ok(AdminStats {
            total_users: count(store.users.len()),
            total_products: count(store.products.len()),
            total_purchases: count(store.purchases.len()),
            pending_purchases: count(
                store
                    .purchases
                    .iter()
                    .filter(|p| p.status == PurchaseStatus::Pending)
                    .count(),
            ),
            paid_revenue: store
                .purchases
                .iter()
                .filter(|p| {
                    matches!(
                        p.status,
                        PurchaseStatus::Paid | PurchaseStatus::Shipped | PurchaseStatus::Delivered
                    )
                })
                .map(|p| p.total_price)
                .sum(),
        })
    }
}

#[async_trait]
impl PurchaseProductRepository for MemoryRepository {
    async fn list_purchase_products(&self, purchase_id: Option<Uuid>) -> Result<Vec<PurchaseProduct>> {
        let store = self.store.read().await;
        Ok(store
            .lines
            .iter()
            .filter(|l| purchase_id.is_none_or(|id| l.purchase_id == id))
            .cloned()
            .collect())
    }

    async fn get_purchase_product(&self, id: Uuid) -> Result<Option<PurchaseProduct>> {
        let store = self.store.read().await;
        Ok(store.lines.iter().find(|l| l.id == id).cloned())
    }

    async fn add_purchase_product(&self, purchase_id: Uuid, line: NewPurchaseLine) -> Result<PurchaseProduct> {
        let mut store = self.store.write().await;
        if !store.purchases.iter().any(|p| p.id == purchase_id)
            || !store.products.iter().any(|p| p.id == line.product_id)
        {
            return Err(AppError::bad_request(
                "operation violates a reference to another resource",
            ));
        }
        let created = PurchaseProduct {
            id: Uuid::new_v4(),
            purchase_id,
            product_id: line.product_id,
            quantity: line.quantity,
            unit_price: line.unit_price,
        };
        store.lines.push(created.clone());
        store.refresh_total(purchase_id);
        Ok(created)
    }

    async fn update_purchase_product_quantity(&self, id: Uuid, quantity: i32) -> Result<Option<PurchaseProduct>> {
        let mut store = self.store.write().await;
        let updated = store.lines.iter_mut().find(|l| l.id == id).map(|line| {
            line.quantity = quantity;
            line.clone()
        });
        if let Some(line) = &updated {
            store.refresh_total(line.purchase_id);
        }
        Ok(updated)
    }

    async fn delete_purchase_product(&self, id: Uuid) -> Result<bool> {
        let mut store = self.store.write().await;
        let Some(purchase_id) = store.lines.iter().find(|l| l.id == id).map(|l| l.purchase_id) else {
            return Ok(false);
        };
        store.lines.retain(|l| l.id != id);
        store.refresh_total(purchase_id);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(email: &str) -> NewUser {
        NewUser {
            firstname: "Ada".to_string(),
            lastname: "Lovelace".to_string(),
            email: email.to_string(),
            password_hash: "hash".to_string(),
        }
    }

    fn product_req(name: &str, price: i32) -> CreateProductRequest {
        CreateProductRequest {
            name: name.to_string(),
            short_description: format!("{name} in a 2L pot"),
            description: None,
            price,
            stock: 10,
            category_id: None,
        }
    }

    #[tokio::test]
    async fn duplicate_email_is_a_conflict_regardless_of_case() {
        let repo = MemoryRepository::new();
        repo.create_user(new_user("ada@example.com")).await.unwrap();
        let err = repo.create_user(new_user("ADA@example.com")).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn deleting_a_category_uncategorises_its_products() {
        let repo = MemoryRepository::new();
        let category = repo
            .create_category(CreateCategoryRequest {
                name: "Hedges".to_string(),
                description: None,
            })
            .await
            .unwrap();
        let mut req = product_req("Privet", 1200);
        req.category_id = Some(category.id);
        let product = repo.create_product(req).await.unwrap();

        assert!(repo.delete_category(category.id).await.unwrap());
        let product = repo.get_product(product.id).await.unwrap().unwrap();
        assert_eq!(product.category_id, None);
    }

    #[tokio::test]
    async fn line_item_mutations_recompute_the_total() {
        let repo = MemoryRepository::new();
        let user = repo.create_user(new_user("buyer@example.com")).await.unwrap();
        let fern = repo.create_product(product_req("Fern", 500)).await.unwrap();
        let details = repo
            .create_purchase(
                NewPurchase {
                    user_id: user.id,
                    address: "1 Garden Lane".to_string(),
                    postal_code: "75001".to_string(),
                    city: "Paris".to_string(),
                    payment_method: "card".to_string(),
                    total_price: 1000,
                },
                vec![NewPurchaseLine {
                    product_id: fern.id,
                    quantity: 2,
                    unit_price: 500,
                }],
            )
            .await
            .unwrap();

        let line = repo
            .update_purchase_product_quantity(details.items[0].id, 5)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(line.quantity, 5);
        let purchase = repo.get_purchase(details.purchase.id).await.unwrap().unwrap();
        assert_eq!(purchase.total_price, 2500);

        assert!(repo.delete_purchase_product(line.id).await.unwrap());
        let purchase = repo.get_purchase(details.purchase.id).await.unwrap().unwrap();
        assert_eq!(purchase.total_price, 0);
    }

    #[tokio::test]
    async fn referenced_products_cannot_be_deleted() {
        let repo = MemoryRepository::new();
        let user = repo.create_user(new_user("buyer@example.com")).await.unwrap();
        let oak = repo.create_product(product_req("Oak", 4000)).await.unwrap();
        repo.create_purchase(
            NewPurchase {
                user_id: user.id,
                address: "1 Garden Lane".to_string(),
                postal_code: "75001".to_string(),
                city: "Paris".to_string(),
                payment_method: "card".to_string(),
                total_price: 4000,
            },
            vec![NewPurchaseLine {
                product_id: oak.id,
                quantity: 1,
                unit_price: 4000,
            }],
        )
        .await
        .unwrap();

        let err = repo.delete_product(oak.id).await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }
}

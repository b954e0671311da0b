use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};
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
        UserCredentials,
    },
};

const USER_COLUMNS: &str = "id, firstname, lastname, email, created_at, updated_at";
const CATEGORY_COLUMNS: &str = "id, name, description, created_at, updated_at";
const PRODUCT_COLUMNS: &str =
    "id, name, short_description, description, price, stock, category_id, created_at, updated_at";
const IMAGE_COLUMNS: &str = "id, product_id, url, alt, created_at";
const PURCHASE_COLUMNS: &str = "id, user_id, address, postal_code, city, total_price, status, \
     payment_method, stripe_session_id, created_at, updated_at";
const LINE_COLUMNS: &str = "id, purchase_id, product_id, quantity, unit_price";

/// PostgresRepository
///
/// The production implementation of every repository trait, backed by a `PgPool`.
/// Queries are built at runtime (`query_as::<_, T>`) so the crate builds without a live
/// database.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Recomputes `purchases.total_price` from the line items.
    async fn refresh_total<'e, E>(executor: E, purchase_id: Uuid) -> Result<()>
    where
        E: sqlx::Executor<'e, Database = Postgres>,
    {
        sqlx::query(
            r#"
            UPDATE purchases
            SET total_price = (
                    SELECT COALESCE(SUM(quantity::BIGINT * unit_price), 0)::BIGINT
                    FROM purchase_products WHERE purchase_id = $1
                ),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(purchase_id)
        .execute(executor)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl UserRepository for PostgresRepository {
    async fn list_users(&self) -> Result<Vec<User>> {
        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY created_at ASC"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(users)
    }

    async fn get_user(&self, id: Uuid) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn find_credentials_by_email(&self, email: &str) -> Result<Option<UserCredentials>> {
        let creds = sqlx::query_as::<_, UserCredentials>(
            "SELECT id, email, password_hash FROM users WHERE LOWER(email) = LOWER($1)",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(creds)
    }

    async fn create_user(&self, user: NewUser) -> Result<User> {
        let created = sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (id, firstname, lastname, email, password_hash, created_at, updated_at) \
             VALUES ($1, $2, $3, LOWER($4), $5, NOW(), NOW()) RETURNING {USER_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(&user.firstname)
        .bind(&user.lastname)
        .bind(&user.email)
        .bind(&user.password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match AppError::from(e) {
            AppError::Conflict(_) => AppError::Conflict("email already registered".to_string()),
            other => other,
        })?;
        Ok(created)
    }

    /// Uses `COALESCE` so that only the provided columns change.
    async fn update_user(&self, id: Uuid, changes: UserChanges) -> Result<Option<User>> {
        let updated = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
            SET firstname = COALESCE($2, firstname),
                lastname = COALESCE($3, lastname),
                email = COALESCE(LOWER($4), email),
                password_hash = COALESCE($5, password_hash),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(changes.firstname)
        .bind(changes.lastname)
        .bind(changes.email)
        .bind(changes.password_hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| match AppError::from(e) {
            AppError::Conflict(_) => AppError::Conflict("email already registered".to_string()),
            other => other,
        })?;
        Ok(updated)
    }

    async fn delete_user(&self, id: Uuid) -> Result<bool> {
        let res = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }
}

#[async_trait]
impl RoleRepository for PostgresRepository {
    async fn list_roles(&self) -> Result<Vec<Role>> {
        let roles = sqlx::query_as::<_, Role>("SELECT id, name FROM roles ORDER BY name ASC")
            .fetch_all(&self.pool)
            .await?;
        Ok(roles)
    }

    async fn get_role(&self, id: Uuid) -> Result<Option<Role>> {
        let role = sqlx::query_as::<_, Role>("SELECT id, name FROM roles WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(role)
    }

    async fn find_role_by_name(&self, name: &str) -> Result<Option<Role>> {
        let role = sqlx::query_as::<_, Role>("SELECT id, name FROM roles WHERE name = $1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        Ok(role)
    }

    async fn create_role(&self, name: &str) -> Result<Role> {
        let role = sqlx::query_as::<_, Role>(
            "INSERT INTO roles (id, name) VALUES ($1, $2) RETURNING id, name",
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .fetch_one(&self.pool)
        .await?;
        Ok(role)
    }

    async fn update_role(&self, id: Uuid, name: &str) -> Result<Option<Role>> {
        let role = sqlx::query_as::<_, Role>(
            "UPDATE roles SET name = $2 WHERE id = $1 RETURNING id, name",
        )
        .bind(id)
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(role)
    }

    async fn delete_role(&self, id: Uuid) -> Result<bool> {
        let res = sqlx::query("DELETE FROM roles WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn roles_for_user(&self, user_id: Uuid) -> Result<Vec<Role>> {
        let roles = sqlx::query_as::<_, Role>(
            r#"
            SELECT r.id, r.name
            FROM roles r
            JOIN user_roles ur ON ur.role_id = r.id
            WHERE ur.user_id = $1
            ORDER BY r.name ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(roles)
    }

    async fn assign_role(&self, user_id: Uuid, role_id: Uuid) -> Result<()> {
        sqlx::query(
            "INSERT INTO user_roles (user_id, role_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(user_id)
        .bind(role_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn revoke_role(&self, user_id: Uuid, role_id: Uuid) -> Result<bool> {
        let res = sqlx::query("DELETE FROM user_roles WHERE user_id = $1 AND role_id = $2")
            .bind(user_id)
            .bind(role_id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }
}

#[async_trait]
impl CategoryRepository for PostgresRepository {
    async fn list_categories(&self) -> Result<Vec<Category>> {
        let categories = sqlx::query_as::<_, Category>(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM categories ORDER BY name ASC"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(categories)
    }

    async fn get_category(&self, id: Uuid) -> Result<Option<Category>> {
        let category = sqlx::query_as::<_, Category>(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM categories WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(category)
    }

    async fn create_category(&self, req: CreateCategoryRequest) -> Result<Category> {
        let category = sqlx::query_as::<_, Category>(&format!(
            "INSERT INTO categories (id, name, description, created_at, updated_at) \
             VALUES ($1, $2, $3, NOW(), NOW()) RETURNING {CATEGORY_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(req.name)
        .bind(req.description)
        .fetch_one(&self.pool)
        .await?;
        Ok(category)
    }

    async fn update_category(&self, id: Uuid, req: UpdateCategoryRequest) -> Result<Option<Category>> {
        let category = sqlx::query_as::<_, Category>(&format!(
            r#"
            UPDATE categories
            SET name = COALESCE($2, name),
                description = COALESCE($3, description),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {CATEGORY_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(req.name)
        .bind(req.description)
        .fetch_optional(&self.pool)
        .await?;
        Ok(category)
    }

    async fn delete_category(&self, id: Uuid) -> Result<bool> {
        let res = sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }
}

/// `ILIKE` pattern matching `term` literally anywhere in the column.
fn contains_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

#[async_trait]
impl ProductRepository for PostgresRepository {
    /// Filters are appended with `QueryBuilder::push_bind`, never by string interpolation.
    async fn list_products(&self, filter: &ProductFilter) -> Result<Vec<Product>> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE TRUE"));

        if let Some(category_id) = filter.category_id {
            builder.push(" AND category_id = ");
            builder.push_bind(category_id);
        }

        if let Some(search) = filter.search_term() {
            let pattern = contains_pattern(search);
            builder.push(" AND (name ILIKE ");
            builder.push_bind(pattern.clone());
            builder.push(r" ESCAPE '\' OR short_description ILIKE ");
            builder.push_bind(pattern);
            builder.push(r" ESCAPE '\')");
        }

        builder.push(" ORDER BY created_at DESC, name ASC LIMIT ");
        builder.push_bind(filter.limit());
        builder.push(" OFFSET ");
        builder.push_bind(filter.offset());

        let products = builder
            .build_query_as::<Product>()
            .fetch_all(&self.pool)
            .await?;
        Ok(products)
    }

    async fn get_product(&self, id: Uuid) -> Result<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(product)
    }

    async fn find_products_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ANY($1)"
        ))
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(products)
    }

    async fn create_product(&self, req: CreateProductRequest) -> Result<Product> {
        let product = sqlx::query_as::<_, Product>(&format!(
            "INSERT INTO products (id, name, short_description, description, price, stock, category_id, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, NOW(), NOW()) RETURNING {PRODUCT_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(req.name)
        .bind(req.short_description)
        .bind(req.description)
        .bind(req.price)
        .bind(req.stock)
        .bind(req.category_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(product)
    }

    async fn update_product(&self, id: Uuid, req: UpdateProductRequest) -> Result<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(&format!(
            r#"
            UPDATE products
            SET name = COALESCE($2, name),
                short_description = COALESCE($3, short_description),
                description = COALESCE($4, description),
                price = COALESCE($5, price),
                stock = COALESCE($6, stock),
                category_id = COALESCE($7, category_id),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {PRODUCT_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(req.name)
        .bind(req.short_description)
        .bind(req.description)
        .bind(req.price)
        .bind(req.stock)
        .bind(req.category_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(product)
    }

    async fn delete_product(&self, id: Uuid) -> Result<bool> {
        let res = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| match AppError::from(e) {
                AppError::BadRequest(_) => {
                    AppError::bad_request("product is referenced by existing purchases")
                }
                other => other,
            })?;
        Ok(res.rows_affected() > 0)
    }
}

#[async_trait]
impl ImageRepository for PostgresRepository {
    async fn list_images_for_product(&self, product_id: Uuid) -> Result<Vec<Image>> {
        let images = sqlx::query_as::<_, Image>(&format!(
            "SELECT {IMAGE_COLUMNS} FROM images WHERE product_id = $1 ORDER BY created_at ASC"
        ))
        .bind(product_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(images)
    }

    async fn get_image(&self, id: Uuid) -> Result<Option<Image>> {
        let image = sqlx::query_as::<_, Image>(&format!("SELECT {IMAGE_COLUMNS} FROM images WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(image)
    }

    async fn create_image(&self, req: CreateImageRequest) -> Result<Image> {
        let image = sqlx::query_as::<_, Image>(&format!(
            "INSERT INTO images (id, product_id, url, alt, created_at) \
             VALUES ($1, $2, $3, $4, NOW()) RETURNING {IMAGE_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(req.product_id)
        .bind(req.url)
        .bind(req.alt)
        .fetch_one(&self.pool)
        .await?;
        Ok(image)
    }

    async fn update_image(&self, id: Uuid, req: UpdateImageRequest) -> Result<Option<Image>> {
        let image = sqlx::query_as::<_, Image>(&format!(
            "UPDATE images SET url = COALESCE($2, url), alt = COALESCE($3, alt) \
             WHERE id = $1 RETURNING {IMAGE_COLUMNS}"
        ))
        .bind(id)
        .bind(req.url)
        .bind(req.alt)
        .fetch_optional(&self.pool)
        .await?;
        Ok(image)
    }

    async fn delete_image(&self, id: Uuid) -> Result<bool> {
        let res = sqlx::query("DELETE FROM images WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }
}

#[async_trait]
impl PurchaseRepository for PostgresRepository {
    /// One transaction: the purchase row, then every line item in a single
    /// `INSERT .. SELECT FROM UNNEST(..)`.
    async fn create_purchase(&self, purchase: NewPurchase, lines: Vec<NewPurchaseLine>) -> Result<PurchaseDetails> {
        let mut tx = self.pool.begin().await?;

        let created = sqlx::query_as::<_, Purchase>(&format!(
            "INSERT INTO purchases (id, user_id, address, postal_code, city, total_price, status, payment_method, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, 'pending', $7, NOW(), NOW()) RETURNING {PURCHASE_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(purchase.user_id)
        .bind(&purchase.address)
        .bind(&purchase.postal_code)
        .bind(&purchase.city)
        .bind(purchase.total_price)
        .bind(&purchase.payment_method)
        .fetch_one(&mut *tx)
        .await?;

        let ids: Vec<Uuid> = lines.iter().map(|_| Uuid::new_v4()).collect();
        let product_ids: Vec<Uuid> = lines.iter().map(|l| l.product_id).collect();
        let quantities: Vec<i32> = lines.iter().map(|l| l.quantity).collect();
        let unit_prices: Vec<i32> = lines.iter().map(|l| l.unit_price).collect();

        let items = sqlx::query_as::<_, PurchaseProduct>(&format!(
            r#"
            INSERT INTO purchase_products (id, purchase_id, product_id, quantity, unit_price)
            SELECT l.id, $1, l.product_id, l.quantity, l.unit_price
            FROM UNNEST($2::uuid[], $3::uuid[], $4::int4[], $5::int4[])
                AS l(id, product_id, quantity, unit_price)
            RETURNING {LINE_COLUMNS}
            "#
        ))
        .bind(created.id)
        .bind(&ids)
        .bind(&product_ids)
        .bind(&quantities)
        .bind(&unit_prices)
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(PurchaseDetails {
            purchase: created,
            items,
        })
    }

    async fn list_purchases(&self) -> Result<Vec<Purchase>> {
        let purchases = sqlx::query_as::<_, Purchase>(&format!(
            "SELECT {PURCHASE_COLUMNS} FROM purchases ORDER BY created_at DESC"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(purchases)
    }

    async fn list_purchases_for_user(&self, user_id: Uuid) -> Result<Vec<Purchase>> {
        let purchases = sqlx::query_as::<_, Purchase>(&format!(
            "SELECT {PURCHASE_COLUMNS} FROM purchases WHERE user_id = $1 ORDER BY created_at DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(purchases)
    }

    async fn get_purchase(&self, id: Uuid) -> Result<Option<Purchase>> {
        let purchase = sqlx::query_as::<_, Purchase>(&format!(
            "SELECT {PURCHASE_COLUMNS} FROM purchases WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(purchase)
    }

    async fn update_purchase(&self, id: Uuid, req: UpdatePurchaseRequest) -> Result<Option<Purchase>> {
        let purchase = sqlx::query_as::<_, Purchase>(&format!(
            r#"
            UPDATE purchases
            SET address = COALESCE($2, address),
                postal_code = COALESCE($3, postal_code),
                city = COALESCE($4, city),
                status = COALESCE($5, status),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {PURCHASE_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(req.address)
        .bind(req.postal_code)
        .bind(req.city)
        .bind(req.status)
        .fetch_optional(&self.pool)
        .await?;
        Ok(purchase)
    }

    async fn delete_purchase(&self, id: Uuid) -> Result<bool> {
        let res = sqlx::query("DELETE FROM purchases WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn set_stripe_session(&self, id: Uuid, session_id: &str) -> Result<Option<Purchase>> {
        let purchase = sqlx::query_as::<_, Purchase>(&format!(
            "UPDATE purchases SET stripe_session_id = $2, updated_at = NOW() \
             WHERE id = $1 RETURNING {PURCHASE_COLUMNS}"
        ))
        .bind(id)
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(purchase)
    }

    async fn find_purchase_by_session(&self, session_id: &str) -> Result<Option<Purchase>> {
        let purchase = sqlx::query_as::<_, Purchase>(&format!(
            "SELECT {PURCHASE_COLUMNS} FROM purchases WHERE stripe_session_id = $1"
        ))
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(purchase)
    }

    async fn transition_status(&self, id: Uuid, from: PurchaseStatus, to: PurchaseStatus) -> Result<Option<Purchase>> {
        let purchase = sqlx::query_as::<_, Purchase>(&format!(
            "UPDATE purchases SET status = $3, updated_at = NOW() \
             WHERE id = $1 AND status = $2 RETURNING {PURCHASE_COLUMNS}"
        ))
        .bind(id)
        .bind(from)
        .bind(to)
        .fetch_optional(&self.pool)
        .await?;
        Ok(purchase)
    }

    async fn stats(&self) -> Result<AdminStats> {
        let total_users = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;
        let total_products = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM products")
            .fetch_one(&self.pool)
            .await?;
        let total_purchases = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM purchases")
            .fetch_one(&self.pool)
            .await?;
        let pending_purchases =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM purchases WHERE status = 'pending'")
                .fetch_one(&self.pool)
                .await?;
        let paid_revenue = sqlx::query_scalar::<_, i64>(
            "SELECT COALESCE(SUM(total_price), 0)::BIGINT FROM purchases \
             WHERE status IN ('paid', 'shipped', 'delivered')",
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(AdminStats {
            total_users,
            total_products,
            total_purchases,
            pending_purchases,
            paid_revenue,
        })
    }
}

#[async_trait]
impl PurchaseProductRepository for PostgresRepository {
    async fn list_purchase_products(&self, purchase_id: Option<Uuid>) -> Result<Vec<PurchaseProduct>> {
        let lines = sqlx::query_as::<_, PurchaseProduct>(&format!(
            "SELECT {LINE_COLUMNS} FROM purchase_products \
             WHERE ($1::uuid IS NULL OR purchase_id = $1) ORDER BY purchase_id, id"
        ))
        .bind(purchase_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(lines)
    }

    async fn get_purchase_product(&self, id: Uuid) -> Result<Option<PurchaseProduct>> {
        let line = sqlx::query_as::<_, PurchaseProduct>(&format!(
            "SELECT {LINE_COLUMNS} FROM purchase_products WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(line)
    }

    async fn add_purchase_product(&self, purchase_id: Uuid, line: NewPurchaseLine) -> Result<PurchaseProduct> {
        let mut tx = self.pool.begin().await?;
        let created = sqlx::query_as::<_, PurchaseProduct>(&format!(
            "INSERT INTO purchase_products (id, purchase_id, product_id, quantity, unit_price) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {LINE_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(purchase_id)
        .bind(line.product_id)
        .bind(line.quantity)
        .bind(line.unit_price)
        .fetch_one(&mut *tx)
        .await?;
        Self::refresh_total(&mut *tx, purchase_id).await?;
        tx.commit().await?;
        Ok(created)
    }

    async fn update_purchase_product_quantity(&self, id: Uuid, quantity: i32) -> Result<Option<PurchaseProduct>> {
        let mut tx = self.pool.begin().await?;
        let updated = sqlx::query_as::<_, PurchaseProduct>(&format!(
            "UPDATE purchase_products SET quantity = $2 WHERE id = $1 RETURNING {LINE_COLUMNS}"
        ))
        .bind(id)
        .bind(quantity)
        .fetch_optional(&mut *tx)
        .await?;
        if let Some(line) = &updated {
            Self::refresh_total(&mut *tx, line.purchase_id).await?;
        }
        tx.commit().await?;
        Ok(updated)
    }

    async fn delete_purchase_product(&self, id: Uuid) -> Result<bool> {
        let mut tx = self.pool.begin().await?;
        let purchase_id = sqlx::query_scalar::<_, Uuid>(
            "DELETE FROM purchase_products WHERE id = $1 RETURNING purchase_id",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;
        let Some(purchase_id) = purchase_id else {
            tx.rollback().await?;
            return Ok(false);
        };
        Self::refresh_total(&mut *tx, purchase_id).await?;
        tx.commit().await?;
        Ok(true)
    }
}

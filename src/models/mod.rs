//! Database rows and request/response schemas.
//!
//! Row structs derive `FromRow` and mirror the tables in `migrations/`. Request payloads
//! derive `Validate`; the `ValidatedJson` extractor runs those rules before a handler
//! sees the payload. Every public schema is exported to TypeScript for the storefront.

pub mod category;
pub mod image;
pub mod product;
pub mod purchase;
pub mod role;
pub mod user;

pub use category::{Category, CreateCategoryRequest, UpdateCategoryRequest};
pub use image::{CreateImageRequest, Image, ImageUploadRequest, ImageUploadResponse, UpdateImageRequest};
pub use product::{CreateProductRequest, Product, ProductDetails, ProductFilter, UpdateProductRequest};
pub use purchase::{
    AdminStats, CheckoutSessionResponse, CreatePurchaseProductRequest, CreatePurchaseRequest,
    MAX_LINE_QUANTITY, NewPurchase, NewPurchaseLine, PaymentStatusResponse, Purchase,
    PurchaseDetails, PurchaseItemRequest, PurchaseProduct, PurchaseProductFilter, PurchaseStatus,
    UpdatePurchaseProductRequest, UpdatePurchaseRequest,
};
pub use role::{AssignRoleRequest, Role, RoleRequest, UserRole};
pub use user::{
    CreateUserRequest, LoginRequest, LoginResponse, NewUser, RegisterRequest, UpdateUserRequest,
    User, UserChanges, UserCredentials, UserProfile,
};

/// Router Module Index
///
/// Routes are split by access level so the guard is applied once per router (as a layer)
/// rather than remembered in every handler.

/// Anonymous access: catalogue reads, sign-up/login and the Stripe webhook.
pub mod public;

/// Behind `auth_middleware`: a valid session (and CSRF token for cookie sessions).
pub mod authenticated;

/// Behind `admin_middleware`, nested under `/admin`.
pub mod admin;

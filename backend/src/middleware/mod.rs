//! HTTP middleware and request extractors

pub mod auth;

pub use auth::{auth_middleware, AuthUser, CurrentUser, OptionalTenant, Tenant};

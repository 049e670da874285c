//! HTTP handlers, one module per resource

pub mod auth;
pub mod batch;
pub mod cooperative;
pub mod farmer;
pub mod harvest;
pub mod health;
pub mod payment;
pub mod portal;
pub mod price;
pub mod reporting;
pub mod user;

pub use auth::*;
pub use batch::*;
pub use cooperative::*;
pub use farmer::*;
pub use harvest::*;
pub use health::*;
pub use payment::*;
pub use portal::*;
pub use price::*;
pub use reporting::*;
pub use user::*;

//! Business logic services for the Cooperative Management Platform

pub mod auth;
pub mod batch;
pub mod cooperative;
pub mod farmer;
pub mod harvest;
pub mod payment;
pub mod price;
pub mod reporting;
pub mod user;

#[cfg(test)]
pub(crate) mod test_support;

pub use auth::AuthService;
pub use batch::BatchService;
pub use cooperative::CooperativeService;
pub use farmer::FarmerService;
pub use harvest::HarvestService;
pub use payment::PaymentService;
pub use price::PriceService;
pub use reporting::ReportingService;
pub use user::UserService;

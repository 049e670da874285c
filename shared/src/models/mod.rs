//! Domain models for the Cooperative Management Platform

mod batch;
mod cooperative;
mod farmer;
mod harvest;
mod payment;
mod price;
mod user;

pub use batch::*;
pub use cooperative::*;
pub use farmer::*;
pub use harvest::*;
pub use payment::*;
pub use price::*;
pub use user::*;

pub mod balance_history;
pub mod otp;
pub mod response;
pub mod transaction;
pub mod user;
pub mod waste_category;
pub mod withdrawal;

pub mod auth;
pub mod balance_histories;
pub mod cart;
pub mod otp;
pub mod transactions;
pub mod upload;
pub mod user_profile;
pub mod waste_categories;
pub mod withdrawals;

pub mod cart_service;
pub mod ledger;
pub mod mail_service;
pub mod otp_service;
pub mod otp_throttle;
pub mod storage;
pub mod transaction_service;
pub mod verification;
pub mod withdrawal_service;

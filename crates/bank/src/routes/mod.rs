pub mod accounts;
pub mod services;

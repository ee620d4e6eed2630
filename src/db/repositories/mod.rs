pub mod integration;
pub mod token;
pub mod user;

pub mod prelude;

pub mod documents;
pub mod integrations;
pub mod plans;
pub mod subscriptions;
pub mod tokens;
pub mod users;

pub use super::documents::Entity as Documents;
pub use super::integrations::Entity as Integrations;
pub use super::plans::Entity as Plans;
pub use super::subscriptions::Entity as Subscriptions;
pub use super::tokens::Entity as Tokens;
pub use super::users::Entity as Users;

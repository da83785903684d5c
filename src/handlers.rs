pub mod credentials;
pub mod gateway;
pub mod graphql;
pub mod health;

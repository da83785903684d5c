pub mod create_user;
pub mod export_schema;
pub mod initdb;
pub mod serve;

pub use create_user::create_user;
pub use export_schema::export_schema;
pub use initdb::init_database;
pub use serve::{serve_all, serve_gateway, serve_service};

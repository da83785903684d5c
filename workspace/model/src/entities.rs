//! SeaORM entities of the account store.
//! There is a single table; both GraphQL services read and write it.

pub mod user;

pub mod prelude {
    //! A prelude module for easy importing of all entities.
    pub use super::user::Entity as User;
    pub use super::user::Role;
}

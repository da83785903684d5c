//! Operations over the account table.
//!
//! Both GraphQL services go through [`UserStore`]; nothing else touches the
//! `users` table directly apart from migrations.

pub mod error;
pub mod listing;
pub mod users;

pub use error::{Result, StoreError};
pub use listing::{ListQuery, SortField, SortOrder, UserFilter};
pub use users::{NewUser, UserStore};

#[cfg(test)]
pub(crate) mod testing;

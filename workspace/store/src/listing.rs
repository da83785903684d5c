use std::str::FromStr;

use model::entities::user::{self, Role};
use sea_orm::{ColumnTrait, Condition, Order};

use crate::error::{Result, StoreError};

/// Column a listing is ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortField {
    #[default]
    Id,
    Username,
    Role,
}

impl SortField {
    pub(crate) fn column(self) -> user::Column {
        match self {
            SortField::Id => user::Column::Id,
            SortField::Username => user::Column::Username,
            SortField::Role => user::Column::Role,
        }
    }
}

impl FromStr for SortField {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "id" => Ok(SortField::Id),
            "username" => Ok(SortField::Username),
            "role" => Ok(SortField::Role),
            other => Err(StoreError::invalid_argument(format!(
                "Unknown sort field '{}', expected id, username or role",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    pub(crate) fn order(self) -> Order {
        match self {
            SortOrder::Asc => Order::Asc,
            SortOrder::Desc => Order::Desc,
        }
    }
}

impl FromStr for SortOrder {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "" | "ASC" => Ok(SortOrder::Asc),
            "DESC" => Ok(SortOrder::Desc),
            other => Err(StoreError::invalid_argument(format!(
                "Unknown sort order '{}', expected ASC or DESC",
                other
            ))),
        }
    }
}

/// Predicates a listing or a count is restricted by. Unset fields match everything.
///
/// The numeric predicates compare against the role rank (GUEST = 0, USER = 1, ADMIN = 2).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserFilter {
    /// Substring of the id or the username
    pub q: Option<String>,
    pub id: Option<String>,
    pub role: Option<Role>,
    pub role_lt: Option<i32>,
    pub role_lte: Option<i32>,
    pub role_gt: Option<i32>,
    pub role_gte: Option<i32>,
}

impl UserFilter {
    pub fn is_empty(&self) -> bool {
        *self == UserFilter::default()
    }

    pub(crate) fn condition(&self) -> Condition {
        let mut condition = Condition::all();

        if let Some(q) = self.q.as_deref().filter(|q| !q.is_empty()) {
            condition = condition.add(
                Condition::any()
                    .add(user::Column::Id.contains(q))
                    .add(user::Column::Username.contains(q)),
            );
        }
        if let Some(id) = self.id.as_deref().filter(|id| !id.is_empty()) {
            condition = condition.add(user::Column::Id.eq(id));
        }
        if let Some(role) = self.role {
            condition = condition.add(user::Column::Role.eq(role));
        }
        if let Some(rank) = self.role_lt {
            condition = condition.add(user::Column::Role.lt(rank));
        }
        if let Some(rank) = self.role_lte {
            condition = condition.add(user::Column::Role.lte(rank));
        }
        if let Some(rank) = self.role_gt {
            condition = condition.add(user::Column::Role.gt(rank));
        }
        if let Some(rank) = self.role_gte {
            condition = condition.add(user::Column::Role.gte(rank));
        }

        condition
    }
}

/// A validated listing request.
///
/// `per_page == 0` means the listing is not paginated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListQuery {
    pub page: u64,
    pub per_page: u64,
    pub sort_field: SortField,
    pub sort_order: SortOrder,
    pub filter: UserFilter,
}

impl ListQuery {
    /// Build a listing from the loosely typed arguments the admin API accepts.
    pub fn parse(
        page: i32,
        per_page: i32,
        sort_field: &str,
        sort_order: &str,
        filter: UserFilter,
    ) -> Result<Self> {
        let page = u64::try_from(page)
            .map_err(|_| StoreError::invalid_argument("page must not be negative"))?;
        let per_page = u64::try_from(per_page)
            .map_err(|_| StoreError::invalid_argument("perPage must not be negative"))?;

        Ok(Self {
            page,
            per_page,
            sort_field: sort_field.parse()?,
            sort_order: sort_order.parse()?,
            filter,
        })
    }

    /// Rows to skip and rows to return, `None` when the listing is not paginated.
    pub fn window(&self) -> Option<(u64, u64)> {
        (self.per_page > 0).then(|| (self.page.saturating_mul(self.per_page), self.per_page))
    }
}

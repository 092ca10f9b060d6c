//! Domain types representing transaction categories.

use serde::{Deserialize, Serialize};

use crate::common::*;

/// Classifies transactions. Polarity must match every transaction assigned to it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Category {
    pub id: CategoryId,
    pub user_id: UserId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<CategoryId>,
    pub is_income: bool,
    #[serde(default)]
    pub is_deleted: bool,
}

impl Category {
    pub fn expense(user_id: UserId, name: impl Into<String>) -> Self {
        Self::new(user_id, name, false)
    }

    pub fn income(user_id: UserId, name: impl Into<String>) -> Self {
        Self::new(user_id, name, true)
    }

    fn new(user_id: UserId, name: impl Into<String>, is_income: bool) -> Self {
        Self {
            id: CategoryId::default(),
            user_id,
            name: name.into(),
            parent_id: None,
            is_income,
            is_deleted: false,
        }
    }

    pub fn with_parent(mut self, parent: CategoryId) -> Self {
        self.parent_id = Some(parent);
        self
    }

    pub fn is_live(&self) -> bool {
        !self.is_deleted
    }
}

impl Owned for Category {
    fn owner(&self) -> UserId {
        self.user_id
    }
}

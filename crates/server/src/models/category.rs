//! Product categories.

use cartwheel_core::CategoryId;
use serde::{Deserialize, Serialize};

/// A catalog category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Category {
    pub category_id: CategoryId,
    pub category_name: String,
    pub description: Option<String>,
}

/// Fields for creating or replacing a category.
#[derive(Debug, Clone, Deserialize)]
pub struct NewCategory {
    pub category_name: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl NewCategory {
    /// Check field constraints before the write reaches the store.
    ///
    /// # Errors
    ///
    /// Returns a human-readable message describing the violated constraint.
    pub fn validate(&self) -> Result<(), String> {
        if self.category_name.trim().is_empty() {
            return Err("category_name must not be empty".to_owned());
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_name_is_rejected() {
        let category: NewCategory =
            serde_json::from_value(serde_json::json!({ "category_name": "  " })).unwrap();
        assert!(category.description.is_none());
        assert_eq!(
            category.validate().unwrap_err(),
            "category_name must not be empty"
        );
    }
}

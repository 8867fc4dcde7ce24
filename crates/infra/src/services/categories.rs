use std::sync::{PoisonError, RwLock};

use std::collections::HashMap;

use turnstile_attendees::{Category, CategoryId};
use turnstile_core::{AggregateId, DomainError, DomainResult};

/// Directory of attendee categories (ticket tiers).
///
/// Categories are definition records, not aggregates; the directory is a
/// plain keyed collection consulted at registration time. Credit grants are
/// snapshotted into the attendee stream, so edits here never rewrite
/// balances retroactively.
#[derive(Debug, Default)]
pub struct CategoryDirectory {
    inner: RwLock<HashMap<CategoryId, Category>>,
}

impl CategoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new category. Names are unique.
    pub fn register(
        &self,
        name: impl Into<String>,
        included_credits: u32,
        price_cents: u64,
    ) -> DomainResult<Category> {
        let name = name.into();
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(DomainError::invalid_input("category name cannot be empty"));
        }

        let mut map = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        if map.values().any(|c| c.name == trimmed) {
            return Err(DomainError::conflict(format!(
                "category '{trimmed}' already exists"
            )));
        }

        let category = Category::new(
            CategoryId::new(AggregateId::new()),
            trimmed,
            included_credits,
            price_cents,
        );
        map.insert(category.id, category.clone());
        Ok(category)
    }

    pub fn get(&self, id: &CategoryId) -> Option<Category> {
        let map = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        map.get(id).cloned()
    }

    /// All categories, sorted by name.
    pub fn list(&self) -> Vec<Category> {
        let map = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        let mut all: Vec<_> = map.values().cloned().collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        all
    }

    /// Retire a category; existing registrations keep their snapshot.
    pub fn deactivate(&self, id: &CategoryId) -> DomainResult<()> {
        let mut map = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        match map.get_mut(id) {
            Some(category) => {
                category.active = false;
                Ok(())
            }
            None => Err(DomainError::not_found()),
        }
    }
}

//! Activity and taxonomy repositories.
//!
//! Callers depend on the [`ActivityStore`] and [`CategoryStore`] traits; the
//! CLI injects an [`InMemoryStore`] loaded from the data file.

use std::cmp::Ordering;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::models::{ActivityRecord, Category, Collaborator, Status};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("name must not be empty")]
    InvalidName,
    #[error("category `{0}` already exists")]
    DuplicateCategory(String),
    #[error("subcategory `{0}` already exists in this category")]
    DuplicateSubcategory(String),
    #[error("category `{0}` not found")]
    CategoryNotFound(String),
    #[error("subcategory `{0}` not found")]
    SubcategoryNotFound(String),
    #[error("activity `{0}` not found")]
    ActivityNotFound(String),
}

/// Criteria for listing activities. Empty fields match everything.
#[derive(Debug, Clone, Default)]
pub struct ActivityFilter {
    pub status: Option<Status>,
    pub responsible: Option<String>,
    pub category: Option<String>,
    pub search: Option<String>,
}

impl ActivityFilter {
    pub fn matches(&self, record: &ActivityRecord) -> bool {
        if self.status.is_some_and(|status| status != record.status) {
            return false;
        }
        if let Some(responsible) = &self.responsible {
            if record.responsible.as_ref().map(|c| &c.id) != Some(responsible) {
                return false;
            }
        }
        if let Some(category) = &self.category {
            if &record.category != category {
                return false;
            }
        }
        if let Some(search) = self.search.as_deref().map(str::to_lowercase) {
            let in_title = record.title.to_lowercase().contains(&search);
            let in_description = record
                .description
                .as_ref()
                .is_some_and(|d| d.to_lowercase().contains(&search));
            if !in_title && !in_description {
                return false;
            }
        }
        true
    }
}

pub trait ActivityStore {
    /// Matching activities ordered by their next relevant date.
    fn activities(&self, filter: &ActivityFilter) -> Vec<ActivityRecord>;

    fn activity(&self, id: &str) -> Option<ActivityRecord>;

    /// Creates the activity when its id is empty, replaces it otherwise.
    fn save_activity(&mut self, activity: ActivityRecord) -> Result<ActivityRecord, StoreError>;

    /// Returns whether anything was removed.
    fn delete_activity(&mut self, id: &str) -> bool;
}

pub trait CategoryStore {
    fn categories(&self) -> Vec<Category>;

    fn add_category(&mut self, name: &str) -> Result<Category, StoreError>;

    fn add_subcategory(&mut self, category_id: &str, name: &str) -> Result<Category, StoreError>;

    fn remove_subcategory(&mut self, category_id: &str, name: &str)
        -> Result<Category, StoreError>;

    fn delete_category(&mut self, category_id: &str) -> Result<Category, StoreError>;
}

/// Serializable contents of a store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default, alias = "colaboradores")]
    pub collaborators: Vec<Collaborator>,
    #[serde(default, alias = "categorias")]
    pub categories: Vec<Category>,
    #[serde(default, alias = "atividades")]
    pub activities: Vec<ActivityRecord>,
}

#[derive(Debug, Default)]
pub struct InMemoryStore {
    collaborators: Vec<Collaborator>,
    categories: Vec<Category>,
    activities: Vec<ActivityRecord>,
}

impl InMemoryStore {
    /// Builds the store and fills in collaborators referenced by id only.
    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        let mut store = Self {
            collaborators: snapshot.collaborators,
            categories: snapshot.categories,
            activities: snapshot.activities,
        };
        store.resolve_collaborators();
        store
    }

    fn resolve_collaborators(&mut self) {
        let known = &self.collaborators;
        for activity in &mut self.activities {
            for (field, slot) in [
                ("responsible", &mut activity.responsible),
                ("requester", &mut activity.requester),
            ] {
                let Some(reference) = slot.as_mut().filter(|c| !c.is_resolved()) else {
                    continue;
                };
                match known.iter().find(|c| c.id == reference.id) {
                    Some(full) => *reference = full.clone(),
                    None => warn!(
                        activity = %activity.id,
                        field,
                        collaborator = %reference.id,
                        "unknown collaborator id"
                    ),
                }
            }
        }
    }

    pub fn to_snapshot(&self) -> Snapshot {
        Snapshot {
            collaborators: self.collaborators.clone(),
            categories: self.categories.clone(),
            activities: self.activities.clone(),
        }
    }

    pub fn collaborators(&self) -> &[Collaborator] {
        &self.collaborators
    }

    pub fn collaborator(&self, id: &str) -> Option<&Collaborator> {
        self.collaborators.iter().find(|c| c.id == id)
    }

    fn category_mut(&mut self, category_id: &str) -> Result<&mut Category, StoreError> {
        self.categories
            .iter_mut()
            .find(|c| c.id == category_id)
            .ok_or_else(|| StoreError::CategoryNotFound(category_id.to_string()))
    }
}

impl ActivityStore for InMemoryStore {
    fn activities(&self, filter: &ActivityFilter) -> Vec<ActivityRecord> {
        let mut matching: Vec<ActivityRecord> = self
            .activities
            .iter()
            .filter(|record| filter.matches(record))
            .cloned()
            .collect();
        matching.sort_by(|a, b| missing_last(schedule_date(a), schedule_date(b)));
        matching
    }

    fn activity(&self, id: &str) -> Option<ActivityRecord> {
        self.activities.iter().find(|a| a.id == id).cloned()
    }

    fn save_activity(&mut self, mut activity: ActivityRecord) -> Result<ActivityRecord, StoreError> {
        if activity.id.is_empty() {
            activity.id = format!("atv-{}", Uuid::new_v4());
            info!(activity = %activity.id, title = %activity.title, "created activity");
            self.activities.push(activity.clone());
            return Ok(activity);
        }

        let slot = self
            .activities
            .iter_mut()
            .find(|a| a.id == activity.id)
            .ok_or_else(|| StoreError::ActivityNotFound(activity.id.clone()))?;
        *slot = activity.clone();
        info!(activity = %activity.id, status = %activity.status, "updated activity");
        Ok(activity)
    }

    fn delete_activity(&mut self, id: &str) -> bool {
        let before = self.activities.len();
        self.activities.retain(|a| a.id != id);
        let removed = self.activities.len() < before;
        debug!(activity = %id, removed, "delete activity");
        removed
    }
}

impl CategoryStore for InMemoryStore {
    fn categories(&self) -> Vec<Category> {
        self.categories.clone()
    }

    fn add_category(&mut self, name: &str) -> Result<Category, StoreError> {
        let name = valid_name(name)?;
        if self
            .categories
            .iter()
            .any(|c| c.name.to_lowercase() == name.to_lowercase())
        {
            return Err(StoreError::DuplicateCategory(name.to_string()));
        }

        let category = Category {
            id: format!("cat-{}", Uuid::new_v4()),
            name: name.to_string(),
            subcategories: Vec::new(),
        };
        info!(category = %category.id, name, "created category");
        self.categories.push(category.clone());
        Ok(category)
    }

    fn add_subcategory(&mut self, category_id: &str, name: &str) -> Result<Category, StoreError> {
        let name = valid_name(name)?;
        let category = self.category_mut(category_id)?;
        if category
            .subcategories
            .iter()
            .any(|s| s.to_lowercase() == name.to_lowercase())
        {
            return Err(StoreError::DuplicateSubcategory(name.to_string()));
        }
        category.subcategories.push(name.to_string());
        Ok(category.clone())
    }

    fn remove_subcategory(
        &mut self,
        category_id: &str,
        name: &str,
    ) -> Result<Category, StoreError> {
        let category = self.category_mut(category_id)?;
        let before = category.subcategories.len();
        category.subcategories.retain(|s| s != name);
        if category.subcategories.len() == before {
            return Err(StoreError::SubcategoryNotFound(name.to_string()));
        }
        Ok(category.clone())
    }

    fn delete_category(&mut self, category_id: &str) -> Result<Category, StoreError> {
        let index = self
            .categories
            .iter()
            .position(|c| c.id == category_id)
            .ok_or_else(|| StoreError::CategoryNotFound(category_id.to_string()))?;
        let removed = self.categories.remove(index);
        info!(category = %removed.id, name = %removed.name, "deleted category");
        Ok(removed)
    }
}

fn valid_name(name: &str) -> Result<&str, StoreError> {
    let name = name.trim();
    if name.is_empty() {
        Err(StoreError::InvalidName)
    } else {
        Ok(name)
    }
}

fn schedule_date(record: &ActivityRecord) -> Option<NaiveDate> {
    record
        .company_deadline
        .or_else(|| record.ends_at.map(|at| at.date_naive()))
        .or_else(|| record.starts_at.map(|at| at.date_naive()))
}

/// Ascending order with `None` after every date.
pub fn missing_last<T: Ord>(a: Option<T>, b: Option<T>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

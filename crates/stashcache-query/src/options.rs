use stashcache_core::SortDirection;

use crate::filter::FilterClause;

/// The option bag every kind's builder accepts (§4.5).
#[derive(Debug, Clone)]
pub struct QueryOptions {
    pub user_id: Option<String>,
    pub filters: Vec<FilterClause>,
    pub sort_key: String,
    pub sort_direction: SortDirection,
    pub page: u32,
    pub per_page: u32,
    pub search: Option<String>,
    pub allowed_instance_ids: Option<Vec<String>>,
    pub specific_instance_id: Option<String>,
    pub random_seed: Option<i64>,
    pub apply_exclusions: bool,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            user_id: None,
            filters: Vec::new(),
            sort_key: String::new(),
            sort_direction: SortDirection::Asc,
            page: 1,
            per_page: 40,
            search: None,
            allowed_instance_ids: None,
            specific_instance_id: None,
            random_seed: None,
            apply_exclusions: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PageResult<T> {
    pub items: Vec<T>,
    pub total: u64,
}

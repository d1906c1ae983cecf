//! In-memory faceted search, filtering and pagination over the project list.
//!
//! [`CatalogQuery`] holds the whole dataset and recomputes its results
//! synchronously on every setter call. Nothing here touches the store except
//! [`CatalogQuery::load`], and nothing here can fail once loaded.

pub mod filter;
pub mod page;
pub mod stats;

pub use filter::Filters;
pub use page::{page_window, total_pages, PageInfo, PageItem};
pub use stats::{CatalogStats, UsageCount};

use crate::config::CatalogConfig;
use crate::document::Document;
use crate::error::Result;
use crate::model::Project;
use crate::resolver::ReferenceResolver;
use crate::store::Store;
use serde::Serialize;
use std::collections::BTreeSet;

/// A project with its technology references resolved to display names.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntry {
    #[serde(flatten)]
    pub project: Document<Project>,
    pub technology_names: Vec<String>,
}

/// Every selectable value across the whole dataset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Facets {
    pub categories: Vec<String>,
    pub technologies: Vec<String>,
}

pub struct CatalogQuery {
    page_size: usize,
    entries: Vec<CatalogEntry>,
    facets: Facets,
    search_query: String,
    filters: Filters,
    current_page: usize,
    /// Indices into `entries` matching search and filters
    matched: Vec<usize>,
}

impl CatalogQuery {
    pub fn new(page_size: usize) -> Self {
        CatalogQuery {
            page_size: page_size.max(1),
            entries: Vec::new(),
            facets: Facets::default(),
            search_query: String::new(),
            filters: Filters::default(),
            current_page: 1,
            matched: Vec::new(),
        }
    }

    /// Fetch skills and projects from the store and build a query over them.
    pub fn load(store: &Store, config: &CatalogConfig) -> Result<Self> {
        let mut skills = store.collection(&config.collections.skills);
        let resolver = ReferenceResolver::from_documents(skills.refresh()?);

        let mut projects = store.collection(&config.collections.projects);
        projects.refresh()?;

        let mut query = CatalogQuery::new(config.query.page_size);
        query.set_dataset(projects.documents::<Project>(), &resolver);
        Ok(query)
    }

    /// Replace the dataset. Search and filters are kept; the current page is
    /// clamped to the new page count.
    pub fn set_dataset(&mut self, projects: Vec<Document<Project>>, resolver: &ReferenceResolver) {
        self.entries = projects
            .into_iter()
            .map(|project| {
                let technology_names = resolver.resolve_all(&project.data.technologies);
                CatalogEntry {
                    project,
                    technology_names,
                }
            })
            .collect();
        self.facets = extract_facets(&self.entries);
        self.recompute();
        self.set_current_page(self.current_page);
    }

    pub fn search_query(&self) -> &str {
        &self.search_query
    }

    pub fn set_search_query(&mut self, query: impl Into<String>) {
        self.search_query = query.into();
        self.current_page = 1;
        self.recompute();
    }

    pub fn filters(&self) -> &Filters {
        &self.filters
    }

    pub fn set_filters(&mut self, filters: Filters) {
        self.update_filters(|current| *current = filters);
    }

    /// Edit the filters in place, e.g. `query.update_filters(|f| f.toggle_category("Web"))`.
    pub fn update_filters(&mut self, edit: impl FnOnce(&mut Filters)) {
        edit(&mut self.filters);
        self.current_page = 1;
        self.recompute();
    }

    pub fn clear_filters(&mut self) {
        self.set_filters(Filters::default());
    }

    pub fn active_filter_count(&self) -> usize {
        self.filters.active_count()
    }

    pub fn current_page(&self) -> usize {
        self.current_page
    }

    /// Move to `page`, clamped into `[1, max(total_pages, 1)]`.
    pub fn set_current_page(&mut self, page: usize) {
        let last = self.total_pages().max(1);
        self.current_page = page.clamp(1, last);
    }

    pub fn total_pages(&self) -> usize {
        total_pages(self.matched.len(), self.page_size)
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    pub fn filtered_results(&self) -> Vec<&CatalogEntry> {
        self.matched.iter().map(|&i| &self.entries[i]).collect()
    }

    pub fn current_page_results(&self) -> Vec<&CatalogEntry> {
        let range = page::page_range(self.current_page, self.page_size, self.matched.len());
        self.matched[range].iter().map(|&i| &self.entries[i]).collect()
    }

    pub fn facets(&self) -> &Facets {
        &self.facets
    }

    pub fn page_info(&self) -> PageInfo {
        let total = self.total_pages();
        PageInfo {
            current_page: self.current_page,
            total_pages: total,
            page_numbers: page_window(self.current_page, total),
            total_results: self.matched.len(),
            page_size: self.page_size,
        }
    }

    pub fn stats(&self) -> CatalogStats {
        let mut builder = stats::StatsBuilder::default();
        for entry in &self.entries {
            let data = &entry.project.data;
            builder.add(&data.category, data.featured, &entry.technology_names);
        }
        builder.finish()
    }

    fn recompute(&mut self) {
        self.matched = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, entry)| {
                let project = &entry.project.data;
                filter::matches_search(&self.search_query, project, &entry.technology_names)
                    && self.filters.matches(project, &entry.technology_names)
            })
            .map(|(i, _)| i)
            .collect();
    }
}

fn extract_facets(entries: &[CatalogEntry]) -> Facets {
    let mut categories = BTreeSet::new();
    let mut technologies = BTreeSet::new();
    for entry in entries {
        if !entry.project.data.category.is_empty() {
            categories.insert(entry.project.data.category.clone());
        }
        technologies.extend(
            entry
                .technology_names
                .iter()
                .filter(|t| !t.is_empty())
                .cloned(),
        );
    }
    Facets {
        categories: categories.into_iter().collect(),
        technologies: technologies.into_iter().collect(),
    }
}

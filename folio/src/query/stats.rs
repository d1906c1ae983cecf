use serde::Serialize;
use std::collections::{BTreeSet, HashMap};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageCount {
    pub name: String,
    pub count: usize,
}

/// Dataset-wide counts, independent of search and filters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogStats {
    pub total_projects: usize,
    pub featured_projects: usize,
    /// Projects per technology, most used first
    pub technologies: Vec<UsageCount>,
    /// Projects per category, most used first
    pub categories: Vec<UsageCount>,
}

#[derive(Default)]
pub(crate) struct StatsBuilder {
    total: usize,
    featured: usize,
    technologies: HashMap<String, usize>,
    categories: HashMap<String, usize>,
}

impl StatsBuilder {
    pub(crate) fn add(&mut self, category: &str, featured: bool, technology_names: &[String]) {
        self.total += 1;
        if featured {
            self.featured += 1;
        }
        if !category.is_empty() {
            *self.categories.entry(category.to_string()).or_default() += 1;
        }
        // a project counts once per technology
        let distinct: BTreeSet<&String> = technology_names.iter().collect();
        for name in distinct {
            *self.technologies.entry(name.clone()).or_default() += 1;
        }
    }

    pub(crate) fn finish(self) -> CatalogStats {
        CatalogStats {
            total_projects: self.total,
            featured_projects: self.featured,
            technologies: ranked(self.technologies),
            categories: ranked(self.categories),
        }
    }
}

fn ranked(counts: HashMap<String, usize>) -> Vec<UsageCount> {
    let mut out: Vec<UsageCount> = counts
        .into_iter()
        .map(|(name, count)| UsageCount { name, count })
        .collect();
    out.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));
    out
}

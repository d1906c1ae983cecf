use crate::model::Project;
use serde::{Deserialize, Serialize};

/// Facet selections. An empty list or an unset flag imposes no constraint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Filters {
    pub categories: Vec<String>,
    /// Resolved technology display names
    pub technologies: Vec<String>,
    pub featured: bool,
    pub has_live_url: bool,
    #[serde(alias = "hasGithubUrl")]
    pub has_source_url: bool,
}

impl Filters {
    /// Selected values plus set flags
    pub fn active_count(&self) -> usize {
        self.categories.len()
            + self.technologies.len()
            + [self.featured, self.has_live_url, self.has_source_url]
                .iter()
                .filter(|on| **on)
                .count()
    }

    pub fn is_empty(&self) -> bool {
        self.active_count() == 0
    }

    pub fn toggle_category(&mut self, category: &str) {
        toggle(&mut self.categories, category);
    }

    pub fn toggle_technology(&mut self, technology: &str) {
        toggle(&mut self.technologies, technology);
    }

    /// Every active dimension must hold; within a list dimension any
    /// selected value is enough.
    pub(crate) fn matches(&self, project: &Project, technology_names: &[String]) -> bool {
        if !self.categories.is_empty() && !self.categories.contains(&project.category) {
            return false;
        }
        if !self.technologies.is_empty()
            && !technology_names.iter().any(|t| self.technologies.contains(t))
        {
            return false;
        }
        if self.featured && !project.featured {
            return false;
        }
        if self.has_live_url && !project.has_live_url() {
            return false;
        }
        if self.has_source_url && !project.has_source_url() {
            return false;
        }
        true
    }
}

fn toggle(values: &mut Vec<String>, value: &str) {
    if let Some(pos) = values.iter().position(|v| v == value) {
        values.remove(pos);
    } else {
        values.push(value.to_string());
    }
}

/// Case-insensitive substring search over name, description and resolved
/// technology names. A blank query matches everything.
pub(crate) fn matches_search(query: &str, project: &Project, technology_names: &[String]) -> bool {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return true;
    }
    let contains = |haystack: &str| haystack.to_lowercase().contains(&needle);
    contains(project.name.as_str())
        || contains(project.description.as_str())
        || technology_names.iter().any(|t| contains(t.as_str()))
}

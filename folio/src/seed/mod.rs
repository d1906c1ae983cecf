//! Built-in seed rows for the lookup collections.
//!
//! Skills carry legacy category names; running the skill-category
//! normalization after seeding categories rewrites them to Category ids.

use crate::config::SeedConfig;
use crate::model::{Category, Certification, Skill};

pub fn categories(config: &SeedConfig) -> Vec<Category> {
    config.categories.clone().unwrap_or_else(default_categories)
}

pub fn skills(config: &SeedConfig) -> Vec<Skill> {
    config.skills.clone().unwrap_or_else(default_skills)
}

pub fn certifications(config: &SeedConfig) -> Vec<Certification> {
    config
        .certifications
        .clone()
        .unwrap_or_else(default_certifications)
}

pub fn default_categories() -> Vec<Category> {
    [
        ("Frontend", "#61dafb", "Browser"),
        ("Backend", "#68a063", "Database"),
        ("Mobile", "#02569b", "DeviceMobile"),
        ("Fullstack", "#8b5cf6", "Stack"),
        ("Tools", "#f97316", "Wrench"),
        ("Soft", "#ec4899", "Users"),
    ]
    .into_iter()
    .enumerate()
    .map(|(i, (name, color, icon))| Category {
        name: name.into(),
        color: Some(color.into()),
        icon: Some(icon.into()),
        order: i as i64 + 1,
    })
    .collect()
}

pub fn default_skills() -> Vec<Skill> {
    [
        ("React", "frontend", 90),
        ("JavaScript", "frontend", 95),
        ("TypeScript", "frontend", 85),
        ("HTML/CSS", "frontend", 95),
        ("Tailwind CSS", "frontend", 90),
        ("Node.js", "backend", 85),
        ("Express", "backend", 80),
        ("MongoDB", "backend", 80),
        ("Python", "backend", 80),
        ("REST API", "backend", 90),
        ("Firebase", "backend", 85),
        ("Flutter", "mobile", 85),
        ("React Native", "mobile", 75),
        ("Android", "mobile", 80),
        ("iOS", "mobile", 75),
        ("MERN Stack", "fullstack", 85),
        ("Next.js", "fullstack", 80),
        ("Git", "tools", 90),
        ("Postman", "tools", 95),
        ("VS Code", "tools", 95),
        ("Figma", "tools", 80),
        ("Problem Solving", "soft", 90),
        ("Communication", "soft", 85),
        ("Team Collaboration", "soft", 90),
        ("Time Management", "soft", 85),
        ("Adaptability", "soft", 90),
        ("Critical Thinking", "soft", 85),
    ]
    .into_iter()
    .map(|(name, category, proficiency)| Skill {
        name: name.into(),
        category: category.into(),
        proficiency,
    })
    .collect()
}

pub fn default_certifications() -> Vec<Certification> {
    [
        (
            "Postman API Expert",
            "Postman",
            "2024",
            "POSTMAN-EXPERT-2024",
            "Advanced API testing and development certification",
        ),
        (
            "IBM Mobile Application Development",
            "IBM",
            "2023",
            "IBM-MOBILE-2023",
            "Professional certification in mobile app development",
        ),
        (
            "Python Master Certification",
            "Python Institute",
            "2023",
            "PYTHON-MASTER-2023",
            "Advanced Python programming and development",
        ),
        (
            "Mobile Development with C#",
            "Microsoft",
            "2022",
            "MS-CSHARP-MOBILE-2022",
            "Xamarin and .NET MAUI mobile development",
        ),
    ]
    .into_iter()
    .map(|(name, issuer, date, credential_id, description)| Certification {
        name: name.into(),
        issuer: issuer.into(),
        date: date.into(),
        credential_id: credential_id.into(),
        description: description.into(),
    })
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::name_key;
    use std::collections::HashSet;

    #[test]
    fn test_default_skill_names_unique() {
        let skills = default_skills();
        let keys: HashSet<_> = skills.iter().map(|s| name_key(&s.name)).collect();
        assert_eq!(keys.len(), skills.len());
    }

    #[test]
    fn test_every_legacy_skill_category_has_a_seed_category() {
        let categories: HashSet<_> = default_categories()
            .iter()
            .map(|c| name_key(&c.name))
            .collect();
        for skill in default_skills() {
            assert!(
                categories.contains(&name_key(&skill.category)),
                "no category for {}",
                skill.category
            );
        }
    }

    #[test]
    fn test_config_override() {
        let config = SeedConfig {
            skills: Some(vec![Skill {
                name: "Rust".into(),
                category: "backend".into(),
                proficiency: 70,
            }]),
            ..Default::default()
        };
        assert_eq!(skills(&config).len(), 1);
        assert_eq!(categories(&config).len(), 6);
        assert_eq!(certifications(&config).len(), 4);
    }
}

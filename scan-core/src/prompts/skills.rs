//! Skill catalog backing the `search_skill`/`load_skill` tools (spec §6).
//!
//! Skills are markdown files with YAML front-matter
//! (`{name, description}`) under `prompt/skills/<name>/SKILL.md`,
//! mirroring `original_source/agent-scan/tools/skill/skill.py`'s
//! `scan_skills`/`load_skill_content`, generalized from a directory walk
//! to a small embedded catalog (per spec, prompt templates are opaque
//! assets loaded by name — out of core scope to make user-editable on
//! disk, but they must exist for the tool to have anything to return).

use serde::Deserialize;

macro_rules! embed_skill {
    ($name:literal) => {
        include_str!(concat!("../../prompts/skills/", $name, "/SKILL.md"))
    };
}

const RAW_SKILLS: &[(&str, &str)] = &[
    (
        "data-leakage-detection",
        embed_skill!("data-leakage-detection"),
    ),
    (
        "tool-abuse-detection",
        embed_skill!("tool-abuse-detection"),
    ),
    (
        "indirect-injection-detection",
        embed_skill!("indirect-injection-detection"),
    ),
    (
        "authorization-bypass-detection",
        embed_skill!("authorization-bypass-detection"),
    ),
];

#[derive(Debug, Deserialize)]
struct FrontMatter {
    name: String,
    description: String,
}

/// One loaded skill: its front-matter plus the markdown body (front-matter
/// stripped).
#[derive(Debug, Clone)]
pub struct Skill {
    pub name: String,
    pub description: String,
    pub body: String,
}

fn parse(raw: &str) -> Skill {
    let (meta, body) = split_front_matter(raw);
    let front: FrontMatter = meta
        .and_then(|m| serde_yaml::from_str(m).ok())
        .unwrap_or(FrontMatter {
            name: String::new(),
            description: String::new(),
        });
    Skill {
        name: front.name,
        description: front.description,
        body: body.trim().to_string(),
    }
}

/// Splits a leading `---\n...\n---\n` YAML block from the rest of the
/// document, same grammar `task.py`'s `parse_agent_file` uses.
fn split_front_matter(raw: &str) -> (Option<&str>, &str) {
    let Some(rest) = raw.strip_prefix("---\n") else {
        return (None, raw);
    };
    let Some(end) = rest.find("\n---\n") else {
        return (None, raw);
    };
    (Some(&rest[..end]), &rest[end + 5..])
}

/// Lists every known skill, optionally filtered to those whose name or
/// description contains `query` (case-insensitive substring).
pub fn search_skill(query: Option<&str>) -> Vec<Skill> {
    let skills: Vec<Skill> = RAW_SKILLS.iter().map(|(_, raw)| parse(raw)).collect();
    match query {
        None => skills,
        Some(q) => {
            let q = q.to_lowercase();
            skills
                .into_iter()
                .filter(|s| {
                    s.name.to_lowercase().contains(&q) || s.description.to_lowercase().contains(&q)
                })
                .collect()
        }
    }
}

/// Loads one skill by exact name, `None` if unknown.
pub fn load_skill(name: &str) -> Option<Skill> {
    RAW_SKILLS
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, raw)| parse(raw))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_skill_parses_front_matter_and_body() {
        let skill = load_skill("data-leakage-detection").unwrap();
        assert_eq!(skill.name, "data-leakage-detection");
        assert!(!skill.description.is_empty());
        assert!(skill.body.contains("Probe the target agent"));
    }

    #[test]
    fn load_skill_unknown_name_returns_none() {
        assert!(load_skill("nonexistent").is_none());
    }

    #[test]
    fn search_skill_with_no_query_returns_all() {
        assert_eq!(search_skill(None).len(), RAW_SKILLS.len());
    }

    #[test]
    fn search_skill_filters_by_substring() {
        let hits = search_skill(Some("injection"));
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "indirect-injection-detection");
    }
}

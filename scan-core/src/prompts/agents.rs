//! Sub-agent template catalog backing the `task`/`list_agents` tools
//! (spec §6), grounded in
//! `original_source/agent-scan/tools/task/task.py`'s `get_all_agents`/
//! `load_agent_prompt` (directory walk over `prompt/agents/**`, YAML
//! front-matter per file) generalized to a small embedded catalog the
//! same way [`super::skills`] does for skill templates.

use serde::Deserialize;

macro_rules! embed_agent {
    ($name:literal) => {
        include_str!(concat!("../../prompts/agents/", $name, ".md"))
    };
}

const RAW_AGENTS: &[(&str, &str)] = &[("general", embed_agent!("general"))];

#[derive(Debug, Deserialize)]
struct FrontMatter {
    name: String,
    description: String,
}

/// One loaded agent template: its front-matter plus the markdown body
/// used as the sub-agent's `instruction`.
#[derive(Debug, Clone)]
pub struct AgentTemplate {
    pub name: String,
    pub description: String,
    pub body: String,
}

fn split_front_matter(raw: &str) -> (Option<&str>, &str) {
    let Some(rest) = raw.strip_prefix("---\n") else {
        return (None, raw);
    };
    let Some(end) = rest.find("\n---\n") else {
        return (None, raw);
    };
    (Some(&rest[..end]), &rest[end + 5..])
}

fn parse(raw: &str) -> AgentTemplate {
    let (meta, body) = split_front_matter(raw);
    let front: FrontMatter = meta
        .and_then(|m| serde_yaml::from_str(m).ok())
        .unwrap_or(FrontMatter {
            name: String::new(),
            description: String::new(),
        });
    AgentTemplate {
        name: front.name,
        description: front.description,
        body: body.trim().to_string(),
    }
}

/// Lists every known sub-agent template, sorted by name.
pub fn list_agents() -> Vec<AgentTemplate> {
    let mut agents: Vec<AgentTemplate> = RAW_AGENTS.iter().map(|(_, raw)| parse(raw)).collect();
    agents.sort_by(|a, b| a.name.cmp(&b.name));
    agents
}

/// Loads one sub-agent template by exact name, `None` if unknown.
pub fn load_agent(name: &str) -> Option<AgentTemplate> {
    RAW_AGENTS
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, raw)| parse(raw))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_agent_parses_front_matter_and_body() {
        let agent = load_agent("general").unwrap();
        assert_eq!(agent.name, "general");
        assert!(!agent.description.is_empty());
        assert!(agent.body.contains("dialogue"));
    }

    #[test]
    fn load_agent_unknown_name_returns_none() {
        assert!(load_agent("nonexistent").is_none());
    }

    #[test]
    fn list_agents_returns_all_known_templates() {
        assert_eq!(list_agents().len(), RAW_AGENTS.len());
    }
}

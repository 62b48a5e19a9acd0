use std::path::{Path, PathBuf};

/// Installation layout for one AI agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgentProfile {
    pub id: &'static str,
    pub name: &'static str,
    /// Project-relative skills directory.
    pub project_dir: &'static str,
    /// Skills directory under the user's home.
    pub personal_dir: &'static str,
    /// Environment variable that identifies the agent when set.
    pub env_var: Option<&'static str>,
    /// Project files or directories that mark the agent's presence.
    pub markers: &'static [&'static str],
}

pub const PROFILES: &[AgentProfile] = &[
    AgentProfile {
        id: "claude",
        name: "Claude",
        project_dir: ".claude/skills",
        personal_dir: ".claude/skills",
        env_var: Some("CLAUDE_CODE"),
        markers: &[".claude", "CLAUDE.md"],
    },
    AgentProfile {
        id: "copilot",
        name: "GitHub Copilot",
        project_dir: ".github/skills",
        personal_dir: ".copilot/skills",
        env_var: Some("GITHUB_COPILOT"),
        markers: &[".github/copilot-instructions.md", ".vscode"],
    },
    AgentProfile {
        id: "codex",
        name: "OpenAI Codex",
        project_dir: ".codex/skills",
        personal_dir: ".codex/skills",
        env_var: Some("CODEX_HOME"),
        markers: &[".codex", "AGENTS.md"],
    },
    AgentProfile {
        id: "cursor",
        name: "Cursor",
        project_dir: ".cursor/skills",
        personal_dir: ".cursor/skills",
        env_var: Some("CURSOR_HOME"),
        markers: &[".cursor", ".cursorrules"],
    },
    AgentProfile {
        id: "generic",
        name: "Generic",
        project_dir: ".skills",
        personal_dir: ".skills/installed",
        env_var: None,
        markers: &[],
    },
];

pub fn profile(id: &str) -> &'static AgentProfile {
    PROFILES
        .iter()
        .find(|p| p.id == id)
        .unwrap_or(&PROFILES[PROFILES.len() - 1])
}

/// Detect the agent in use: environment variables first, then project
/// markers, then existing personal directories, falling back to generic.
pub fn detect_agent(project_path: &Path, home: &Path) -> &'static AgentProfile {
    let named = PROFILES.iter().filter(|p| p.id != "generic");

    for p in named.clone() {
        if let Some(var) = p.env_var
            && std::env::var_os(var).is_some()
        {
            return p;
        }
    }
    for p in named.clone() {
        if p.markers.iter().any(|m| project_path.join(m).exists()) {
            return p;
        }
    }
    for p in named {
        if home.join(p.personal_dir).exists() {
            return p;
        }
    }
    profile("generic")
}

/// Where a skill named `name` installs for the given agent.
pub fn install_path(
    agent: &AgentProfile,
    name: &str,
    project: bool,
    project_path: &Path,
    home: &Path,
) -> PathBuf {
    let base = if project {
        project_path.join(agent.project_dir)
    } else {
        home.join(agent.personal_dir)
    };
    base.join(name)
}

/// Every location that may hold installed skills, for listing.
/// Only existing directories are returned.
pub fn install_locations(project_path: &Path, home: &Path) -> Vec<(String, PathBuf)> {
    let mut locations = Vec::new();
    for p in PROFILES {
        let personal = home.join(p.personal_dir);
        if personal.exists() && !locations.iter().any(|(_, l)| *l == personal) {
            locations.push((format!("personal ({})", p.id), personal));
        }
    }
    for p in PROFILES {
        let project = project_path.join(p.project_dir);
        if project.exists() && !locations.iter().any(|(_, l)| *l == project) {
            locations.push((format!("project ({})", p.id), project));
        }
    }
    locations
}

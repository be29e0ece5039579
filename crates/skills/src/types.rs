use serde::{Deserialize, Serialize};

/// A skill available for injection into a turn's context.
///
/// Unlike the teacher's `SkillEntry`, this has no on-disk location,
/// risk tier, or readiness state — skill discovery and install-time
/// dependency checking are out of scope here. A descriptor is pure
/// metadata plus a reference to where its full body can be fetched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillDescriptor {
    pub name: String,
    pub description: String,
    pub version: String,
    pub author: String,
    /// When true, this skill's body is injected into every turn's
    /// context rather than only on demand.
    pub always_load: bool,
    /// Opaque handle the context builder uses to fetch the skill's
    /// full body (e.g. a path or registry key); never interpreted here.
    pub body_ref: String,
    /// Free-form capability/requirement tags, surfaced to callers but
    /// never enforced — there is no install-time readiness check.
    pub requirements: Vec<String>,
}

impl SkillDescriptor {
    pub fn render_index_line(&self) -> String {
        let mut line = format!("- {}: {}", self.name, self.description);
        line.push_str(&format!(" version={}", self.version));
        if self.always_load {
            line.push_str(" (always loaded)");
        }
        if !self.requirements.is_empty() {
            line.push_str(&format!(" requires={}", self.requirements.join(",")));
        }
        line
    }
}

/// The ordered, deduplicated set of skills a session has loaded so far.
///
/// Order is insertion order: once a skill is loaded it keeps its
/// position even if referenced again later in the same session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoadedSkills {
    names: Vec<String>,
}

impl LoadedSkills {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a skill as loaded. Returns `true` if it was newly added.
    pub fn mark_loaded(&mut self, name: &str) -> bool {
        if self.names.iter().any(|n| n == name) {
            return false;
        }
        self.names.push(name.to_string());
        true
    }

    pub fn is_loaded(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }
}

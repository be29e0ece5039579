use parking_lot::RwLock;

use tl_domain::error::{Error, Result};

use crate::types::SkillDescriptor;

/// In-memory skills registry.
///
/// Skills are registered by the caller (from configuration, or a test
/// fixture) rather than discovered by scanning a directory tree — the
/// on-disk SKILL.md format and its install-time readiness checks are
/// out of scope here.
pub struct SkillsRegistry {
    entries: RwLock<Vec<SkillDescriptor>>,
}

impl SkillsRegistry {
    pub fn new(entries: Vec<SkillDescriptor>) -> Self {
        tracing::info!(skills_count = entries.len(), "skills registry initialized");
        Self {
            entries: RwLock::new(entries),
        }
    }

    pub fn empty() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
        }
    }

    pub fn register(&self, descriptor: SkillDescriptor) {
        let mut entries = self.entries.write();
        entries.retain(|e| e.name != descriptor.name);
        entries.push(descriptor);
    }

    pub fn get(&self, name: &str) -> Option<SkillDescriptor> {
        self.entries.read().iter().find(|e| e.name == name).cloned()
    }

    /// Render the full index for LLM injection.
    pub fn render_index(&self) -> String {
        let entries = self.entries.read();
        entries
            .iter()
            .map(|e| e.render_index_line())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Skills flagged `always_load`, in registration order.
    pub fn always_load(&self) -> Vec<SkillDescriptor> {
        self.entries
            .read()
            .iter()
            .filter(|e| e.always_load)
            .cloned()
            .collect()
    }

    pub fn list(&self) -> Vec<SkillDescriptor> {
        self.entries.read().clone()
    }

    pub fn resolve(&self, name: &str) -> Result<SkillDescriptor> {
        self.get(name).ok_or_else(|| Error::SkillNotFound(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(name: &str, always_load: bool) -> SkillDescriptor {
        SkillDescriptor {
            name: name.into(),
            description: format!("{name} skill"),
            version: "1.0.0".into(),
            author: "acme".into(),
            always_load,
            body_ref: format!("skills/{name}"),
            requirements: Vec::new(),
        }
    }

    #[test]
    fn resolve_unknown_skill_errors() {
        let registry = SkillsRegistry::empty();
        assert!(matches!(
            registry.resolve("missing"),
            Err(Error::SkillNotFound(_))
        ));
    }

    #[test]
    fn register_replaces_same_name_entry() {
        let registry = SkillsRegistry::empty();
        registry.register(descriptor("pdf", false));
        registry.register(descriptor("pdf", true));
        let entries = registry.list();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].always_load);
    }

    #[test]
    fn always_load_filters_correctly() {
        let registry = SkillsRegistry::new(vec![descriptor("a", true), descriptor("b", false)]);
        let always = registry.always_load();
        assert_eq!(always.len(), 1);
        assert_eq!(always[0].name, "a");
    }

    #[test]
    fn render_index_lists_all_entries() {
        let registry = SkillsRegistry::new(vec![descriptor("a", false), descriptor("b", false)]);
        let index = registry.render_index();
        assert!(index.contains("a:"));
        assert!(index.contains("b:"));
    }
}

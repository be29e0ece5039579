//! Context Builder (C6) — assembles the message sequence and tool
//! definitions handed to the provider each iteration.
//!
//! Pure: given a persona, the skills registry, the session's currently
//! loaded skills, recent history and the tool registry, it produces a
//! `[system, ...history]` message sequence and a tool-definition list.
//! It never touches session or store state.

use tl_domain::tool::{Message, ToolDefinition};

use tl_skills::{LoadedSkills, SkillsRegistry};
use tl_tools::ToolRegistry;

pub struct BuiltContext {
    pub messages: Vec<Message>,
    pub tool_defs: Vec<ToolDefinition>,
}

/// Build the system prompt and message window for one provider call.
///
/// The system prompt carries the persona text, the skill index (name +
/// one-line description for every registered skill), the body of every
/// skill flagged `always_load` regardless of whether it was explicitly
/// requested, and then the full body of each session-loaded skill not
/// already injected that way, in load order. A skill's body is its
/// `body_ref` field verbatim — this crate treats it as already being
/// the skill's content rather than a path to resolve, since fetching a
/// body from disk is out of scope here.
pub fn build(
    persona: &str,
    skills: &SkillsRegistry,
    loaded: &LoadedSkills,
    history: &[Message],
    tools: &ToolRegistry,
) -> BuiltContext {
    let mut prompt = String::from(persona);

    let index = skills.render_index();
    if !index.is_empty() {
        prompt.push_str("\n\n## Available skills\n");
        prompt.push_str(&index);
    }

    let mut injected = std::collections::HashSet::new();
    for descriptor in skills.always_load() {
        prompt.push_str(&format!("\n\n## Skill: {}\n", descriptor.name));
        prompt.push_str(&descriptor.body_ref);
        injected.insert(descriptor.name);
    }

    for name in loaded.names() {
        if injected.contains(name) {
            continue;
        }
        if let Ok(descriptor) = skills.resolve(name) {
            prompt.push_str(&format!("\n\n## Skill: {}\n", descriptor.name));
            prompt.push_str(&descriptor.body_ref);
        }
    }

    let mut messages = Vec::with_capacity(history.len() + 1);
    messages.push(Message::system(prompt));
    messages.extend(history.iter().cloned());

    BuiltContext {
        messages,
        tool_defs: tools.definitions(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tl_skills::SkillDescriptor;

    fn descriptor(name: &str, body: &str) -> SkillDescriptor {
        SkillDescriptor {
            name: name.into(),
            description: format!("{name} skill"),
            version: "1.0.0".into(),
            author: "acme".into(),
            always_load: false,
            body_ref: body.into(),
            requirements: Vec::new(),
        }
    }

    #[test]
    fn system_prompt_includes_persona_and_index() {
        let skills = SkillsRegistry::new(vec![descriptor("pdf", "pdf body text")]);
        let loaded = LoadedSkills::new();
        let tools = ToolRegistry::new();
        let built = build("you are an assistant", &skills, &loaded, &[], &tools);

        let system_text = built.messages[0].content.text().unwrap();
        assert!(system_text.contains("you are an assistant"));
        assert!(system_text.contains("pdf:"));
        assert!(!system_text.contains("pdf body text"));
    }

    #[test]
    fn loaded_skill_body_is_injected_in_load_order() {
        let skills = SkillsRegistry::new(vec![
            descriptor("a", "body-a"),
            descriptor("b", "body-b"),
        ]);
        let mut loaded = LoadedSkills::new();
        loaded.mark_loaded("b");
        loaded.mark_loaded("a");
        let tools = ToolRegistry::new();
        let built = build("persona", &skills, &loaded, &[], &tools);

        let system_text = built.messages[0].content.text().unwrap();
        let b_pos = system_text.find("body-b").unwrap();
        let a_pos = system_text.find("body-a").unwrap();
        assert!(b_pos < a_pos);
    }

    #[test]
    fn always_load_skill_is_injected_without_explicit_load() {
        let mut always = descriptor("core", "core body text");
        always.always_load = true;
        let skills = SkillsRegistry::new(vec![always, descriptor("pdf", "pdf body text")]);
        let loaded = LoadedSkills::new();
        let tools = ToolRegistry::new();
        let built = build("persona", &skills, &loaded, &[], &tools);

        let system_text = built.messages[0].content.text().unwrap();
        assert!(system_text.contains("core body text"));
        assert!(!system_text.contains("pdf body text"));
    }

    #[test]
    fn always_load_skill_is_not_duplicated_when_also_explicitly_loaded() {
        let mut always = descriptor("core", "core body text");
        always.always_load = true;
        let skills = SkillsRegistry::new(vec![always]);
        let mut loaded = LoadedSkills::new();
        loaded.mark_loaded("core");
        let tools = ToolRegistry::new();
        let built = build("persona", &skills, &loaded, &[], &tools);

        let system_text = built.messages[0].content.text().unwrap();
        assert_eq!(system_text.matches("core body text").count(), 1);
    }

    #[test]
    fn history_is_appended_after_system_message() {
        let skills = SkillsRegistry::empty();
        let loaded = LoadedSkills::new();
        let tools = ToolRegistry::new();
        let history = vec![Message::user("hi")];
        let built = build("persona", &skills, &loaded, &history, &tools);

        assert_eq!(built.messages.len(), 2);
        assert_eq!(built.messages[1].content.text(), Some("hi"));
    }
}

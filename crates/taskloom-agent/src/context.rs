use taskloom_core::filemap::FILEMAP_URI_PREFIX;
use taskloom_core::types::{Message, Part, Role};

/// Assemble a node agent's system message.
///
/// Each section becomes its own text part, in the order added.
pub struct ContextBuilder {
    parts: Vec<String>,
}

impl ContextBuilder {
    pub fn new() -> Self {
        Self { parts: Vec::new() }
    }

    /// Add a base system prompt.
    pub fn with_base_prompt(mut self, prompt: &str) -> Self {
        self.parts.push(prompt.to_string());
        self
    }

    /// Add the rules for referencing files through placeholder tags.
    pub fn with_file_instruction(mut self) -> Self {
        self.parts.push(file_instruction());
        self
    }

    /// Build the final system message.
    pub fn build(self) -> Message {
        Message::new(
            Role::System,
            self.parts.into_iter().map(Part::Text).collect(),
        )
    }
}

impl Default for ContextBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn file_instruction() -> String {
    let p = FILEMAP_URI_PREFIX;
    format!(
        r#"<instruction>
Whenever your response refers to a file (including {p} URIs), follow these rules:

1. Always write the reference as <file>{p}file_name</file>
2. Never use markdown image syntax such as ![text](uri), and never write a bare uri
3. Every file reference is wrapped in <file> tags with the uri spelled out in full

Correct:
<file>{p}chart.png</file>

Incorrect:
![Chart]({p}chart.png)
{p}chart.png
</instruction>"#
    )
}

/// System message for a node agent: its profile followed by the file
/// reference rules.
pub fn build_node_context(profile: &str) -> Message {
    ContextBuilder::new()
        .with_base_prompt(profile)
        .with_file_instruction()
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_context_sections() {
        let msg = build_node_context("You are a researcher.");
        assert_eq!(msg.role, Role::System);
        assert_eq!(msg.parts.len(), 2);
        assert_eq!(msg.parts[0].as_text(), Some("You are a researcher."));

        let rules = msg.parts[1].as_text().unwrap();
        assert!(rules.contains("<file>filemap://chart.png</file>"));
        assert!(rules.starts_with("<instruction>"));
    }

    #[test]
    fn test_sections_keep_insertion_order() {
        let msg = ContextBuilder::new()
            .with_file_instruction()
            .with_base_prompt("base")
            .build();
        assert_eq!(msg.parts.len(), 2);
        assert!(msg.parts[0].as_text().unwrap().starts_with("<instruction>"));
        assert_eq!(msg.parts[1].as_text(), Some("base"));
    }
}

use serde::{Deserialize, Serialize};

/// A structured prompt: free-text input plus optional steering sections.
///
/// Improvement steps never edit a `Prompt` in place; they build a new one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Prompt {
    pub input: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    #[serde(default)]
    pub directives: Vec<String>,
    #[serde(default)]
    pub examples: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_format: Option<String>,
}

impl Prompt {
    pub fn new(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            ..Self::default()
        }
    }

    pub fn with_system_prompt(mut self, system: impl Into<String>) -> Self {
        self.system_prompt = Some(system.into());
        self
    }

    pub fn with_directives<I, S>(mut self, directives: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.directives.extend(directives.into_iter().map(Into::into));
        self
    }

    pub fn with_examples<I, S>(mut self, examples: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.examples.extend(examples.into_iter().map(Into::into));
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn with_output_format(mut self, format: impl Into<String>) -> Self {
        self.output_format = Some(format.into());
        self
    }

    /// Returns an error message if the prompt cannot be sent anywhere.
    pub fn validate(&self) -> Result<(), String> {
        if self.input.trim().is_empty() {
            return Err("prompt input must not be empty".to_string());
        }
        Ok(())
    }

    /// Render the user-facing text sent to a provider. The system text is
    /// not included; adapters send it separately when their API allows.
    pub fn render(&self) -> String {
        let mut sections = vec![self.input.trim().to_string()];

        if !self.directives.is_empty() {
            sections.push(format!("Directives:\n{}", bullet_list(&self.directives)));
        }

        if let Some(context) = non_empty(&self.context) {
            sections.push(format!("Context:\n{}", context));
        }

        if let Some(format) = non_empty(&self.output_format) {
            sections.push(format!("Output format:\n{}", format));
        }

        if !self.examples.is_empty() {
            sections.push(format!("Examples:\n{}", bullet_list(&self.examples)));
        }

        sections.join("\n\n")
    }
}

fn bullet_list(items: &[String]) -> String {
    items
        .iter()
        .map(|item| format!("- {}", item))
        .collect::<Vec<_>>()
        .join("\n")
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_orders_sections() {
        let prompt = Prompt::new("Summarize the article.")
            .with_directives(["Be concise", "Use bullet points"])
            .with_context("The article is about Rust.")
            .with_output_format("Markdown")
            .with_examples(["- point one"]);

        let rendered = prompt.render();
        let directives = rendered.find("Directives:").unwrap();
        let context = rendered.find("Context:").unwrap();
        let format = rendered.find("Output format:").unwrap();
        let examples = rendered.find("Examples:").unwrap();

        assert!(rendered.starts_with("Summarize the article."));
        assert!(directives < context && context < format && format < examples);
        assert!(rendered.contains("- Be concise\n- Use bullet points"));
    }

    #[test]
    fn test_render_skips_empty_sections() {
        let prompt = Prompt::new("Hello").with_context("   ");
        assert_eq!(prompt.render(), "Hello");
    }

    #[test]
    fn test_render_omits_system_text() {
        let prompt = Prompt::new("Hello").with_system_prompt("You are terse.");
        assert_eq!(prompt.render(), "Hello");
    }

    #[test]
    fn test_validate_rejects_blank_input() {
        assert!(Prompt::new("  ").validate().is_err());
        assert!(Prompt::new("x").validate().is_ok());
    }

    #[test]
    fn test_deserialize_candidate_shape() {
        let json = r#"{"input":"Write a poem","directives":["Rhyme"],"reasoning":"ignored"}"#;
        let prompt: Prompt = serde_json::from_str(json).unwrap();
        assert_eq!(prompt.input, "Write a poem");
        assert_eq!(prompt.directives, vec!["Rhyme".to_string()]);
        assert!(prompt.examples.is_empty());
    }
}

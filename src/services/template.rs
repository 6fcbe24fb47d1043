//! MiniJinja template engine wrapper

use anyhow::Result;
use minijinja::{context, Environment};

/// Truncation used for derived chat titles and template display.
pub fn truncate_text(text: &str, max_length: usize) -> String {
    if text.chars().count() <= max_length {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_length).collect();
    format!("{cut}...")
}

pub struct TemplateEngine {
    env: Environment<'static>,
}

impl TemplateEngine {
    pub fn new() -> Result<Self> {
        let mut env = Environment::new();
        env.set_debug(cfg!(debug_assertions));

        // Templates ship inside the binary; no loader path to misconfigure.
        env.add_template("chat.html", include_str!("../web/templates/chat.html"))?;

        env.add_filter("truncate", |value: &str, length: Option<usize>| {
            truncate_text(value, length.unwrap_or(50))
        });

        Ok(Self { env })
    }

    /// Render the chat page around the pre-rendered message list HTML.
    pub fn render_chat_page(&self, chat_id: &str, messages_html: &str) -> Result<String> {
        let template = self.env.get_template("chat.html")?;
        Ok(template.render(context! {
            chat_id => chat_id,
            messages_html => messages_html,
            greeting => messages_html.is_empty(),
            version => env!("CARGO_PKG_VERSION"),
        })?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_page_embeds_rendered_messages() -> Result<()> {
        let engine = TemplateEngine::new()?;
        let html = engine.render_chat_page("c1", "<div id=\"msg-m1\">hi</div>")?;
        assert!(html.contains("msg-m1"));
        assert!(html.contains("c1"));
        Ok(())
    }

    #[test]
    fn empty_conversation_shows_greeting() -> Result<()> {
        let engine = TemplateEngine::new()?;
        let html = engine.render_chat_page("c1", "")?;
        assert!(html.contains("greeting"));
        Ok(())
    }

    #[test]
    fn truncate_appends_ellipsis_past_the_limit() {
        assert_eq!(truncate_text("short", 50), "short");
        assert_eq!(truncate_text("abcdefgh", 5), "abcde...");
    }
}

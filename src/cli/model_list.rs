//! Model listing

use std::io::{self, Write};

use crate::core::models::{DEFAULT_MODEL, MODEL_CHOICES};

pub fn list_models(current: &str) -> io::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    write_model_list(&mut out, current)
}

fn write_model_list<W: Write>(out: &mut W, current: &str) -> io::Result<()> {
    writeln!(out, "🤖 Available models")?;
    writeln!(out, "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━")?;
    for model in MODEL_CHOICES {
        let marker = if model == current { "•" } else { " " };
        let mut notes = Vec::new();
        if model == DEFAULT_MODEL {
            notes.push("default");
        }
        if model == current {
            notes.push("selected");
        }
        if notes.is_empty() {
            writeln!(out, "{marker} {model}")?;
        } else {
            writeln!(out, "{marker} {model} ({})", notes.join(", "))?;
        }
    }
    writeln!(out)?;
    writeln!(out, "💡 Choose one with --model <name>, or /model <name> inside the chat.")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn marks_default_and_selected_models() {
        let mut buf = Vec::new();
        write_model_list(&mut buf, "grok-4.1").expect("write");
        let text = String::from_utf8(buf).expect("utf8");

        assert!(text.contains(&format!("  {DEFAULT_MODEL} (default)")));
        assert!(text.contains("• grok-4.1 (selected)"));
        assert_eq!(
            text.lines().filter(|line| line.starts_with("• ")).count(),
            1
        );
        for model in MODEL_CHOICES {
            assert!(text.contains(model));
        }
    }

    #[test]
    fn default_model_can_be_selected_too() {
        let mut buf = Vec::new();
        write_model_list(&mut buf, DEFAULT_MODEL).expect("write");
        let text = String::from_utf8(buf).expect("utf8");
        assert!(text.contains(&format!("• {DEFAULT_MODEL} (default, selected)")));
    }
}

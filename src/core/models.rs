//! The fixed list of models offered to the user.

pub const MODEL_CHOICES: [&str; 9] = [
    "gemini-3.1-pro-preview",
    "gpt-5.2",
    "grok-4.1",
    "gemini-3-flash-preview",
    "doubao-pro-32k",
    "deepseek-v3-2-exp",
    "gpt-5.2-pro-2025-12-11",
    "doubao-pro-128k",
    "deepseek-reasoner-164k",
];

pub const DEFAULT_MODEL: &str = MODEL_CHOICES[0];

/// Resolve a user-typed model name, accepting a unique prefix.
pub fn resolve_model(input: &str) -> Result<&'static str, String> {
    let input = input.trim();
    if let Some(exact) = MODEL_CHOICES.iter().copied().find(|model| *model == input) {
        return Ok(exact);
    }

    let matches: Vec<&'static str> = MODEL_CHOICES
        .iter()
        .copied()
        .filter(|model| !input.is_empty() && model.starts_with(input))
        .collect();
    match matches.as_slice() {
        [single] => Ok(*single),
        [] => Err(format!(
            "Unknown model '{input}'. Choose one of: {}",
            MODEL_CHOICES.join(", ")
        )),
        many => Err(format!("'{input}' is ambiguous: {}", many.join(", "))),
    }
}

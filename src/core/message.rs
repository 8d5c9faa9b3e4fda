use std::fmt;

use crate::api::{ChatContent, ChatContentPart, ChatMessage, ImageUrl, Usage};
use crate::core::encoder::ImageUpload;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentPart {
    Text(String),
    /// Inline `data:` URI carrying the encoded image bytes.
    Image(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Content {
    Text(String),
    Parts(Vec<ContentPart>),
}

impl Content {
    /// Text fragments in order, skipping image parts.
    pub fn text_segments(&self) -> Vec<&str> {
        match self {
            Content::Text(text) => vec![text.as_str()],
            Content::Parts(parts) => parts
                .iter()
                .filter_map(|part| match part {
                    ContentPart::Text(text) => Some(text.as_str()),
                    ContentPart::Image(_) => None,
                })
                .collect(),
        }
    }

    pub fn to_api(&self) -> ChatContent {
        match self {
            Content::Text(text) => ChatContent::Text(text.clone()),
            Content::Parts(parts) => ChatContent::Parts(
                parts
                    .iter()
                    .map(|part| match part {
                        ContentPart::Text(text) => ChatContentPart::Text { text: text.clone() },
                        ContentPart::Image(url) => ChatContentPart::ImageUrl {
                            image_url: ImageUrl { url: url.clone() },
                        },
                    })
                    .collect(),
            ),
        }
    }
}

/// Usage summary attached to a finished assistant turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageStats {
    word_count: usize,
    tokens: Option<Usage>,
    model: String,
}

impl UsageStats {
    pub fn new(word_count: usize, tokens: Option<Usage>, model: impl Into<String>) -> Self {
        Self {
            word_count,
            tokens,
            model: model.into(),
        }
    }

    pub fn word_count(&self) -> usize {
        self.word_count
    }

    pub fn tokens(&self) -> Option<Usage> {
        self.tokens
    }
}

fn token_count(count: Option<u64>) -> String {
    count.map_or_else(|| "unavailable".to_string(), |count| count.to_string())
}

impl fmt::Display for UsageStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.tokens {
            Some(usage) => write!(
                f,
                "word count: {}, prompt tokens: {}, completion tokens: {}, total tokens used: {}, model: {}",
                self.word_count,
                token_count(usage.prompt_tokens),
                token_count(usage.completion_tokens),
                token_count(usage.total_tokens),
                self.model
            ),
            None => write!(
                f,
                "word count: {}, tokens: unavailable, model: {}",
                self.word_count, self.model
            ),
        }
    }
}

/// One entry of the conversation. The role is fixed at construction.
#[derive(Debug, Clone)]
pub struct Turn {
    role: Role,
    content: Content,
    display_image: Option<ImageUpload>,
    stats: Option<UsageStats>,
}

impl Turn {
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: Content::Text(text.into()),
            display_image: None,
            stats: None,
        }
    }

    pub fn user_image(parts: Vec<ContentPart>, upload: ImageUpload) -> Self {
        Self {
            role: Role::User,
            content: Content::Parts(parts),
            display_image: Some(upload),
            stats: None,
        }
    }

    pub fn assistant(text: impl Into<String>, stats: UsageStats) -> Self {
        Self {
            role: Role::Assistant,
            content: Content::Text(text.into()),
            display_image: None,
            stats: Some(stats),
        }
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: Content::Text(text.into()),
            display_image: None,
            stats: None,
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn content(&self) -> &Content {
        &self.content
    }

    pub fn display_image(&self) -> Option<&ImageUpload> {
        self.display_image.as_ref()
    }

    pub fn stats(&self) -> Option<&UsageStats> {
        self.stats.as_ref()
    }

    /// The `{role, content}` pair sent to the API; display-only fields stay behind.
    pub fn to_api_message(&self) -> ChatMessage {
        ChatMessage {
            role: self.role.as_str().to_string(),
            content: self.content.to_api(),
        }
    }
}

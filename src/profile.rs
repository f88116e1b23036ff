// promptforge — Per-model formatting profiles

use serde::Serialize;
use std::fmt;

pub const DEFAULT_PROFILE: &str = "gpt-4-turbo-preview";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HeadingStyle {
    /// `#`-style Markdown headings.
    Markdown,
    /// Sections wrapped in `<tag>...</tag>`.
    XmlTags,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verbosity {
    /// Drops component responsibilities and dependencies.
    Concise,
    Detailed,
}

/// Hints handed to the optimizer about what the target model responds to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ModelGuidelines {
    pub preferred_format: &'static str,
    pub instruction_style: &'static str,
    pub context_handling: &'static str,
    pub examples: &'static str,
    pub reasoning: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FormattingProfile {
    pub name: &'static str,
    pub heading_style: HeadingStyle,
    pub verbosity: Verbosity,
    /// Examples rendered per example list.
    pub max_examples: usize,
    /// File paths rendered per component.
    pub max_file_paths: usize,
    pub guidelines: ModelGuidelines,
}

impl fmt::Display for FormattingProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

const GPT4_TURBO_GUIDELINES: ModelGuidelines = ModelGuidelines {
    preferred_format: "structured markdown with clear sections",
    instruction_style: "direct and explicit",
    context_handling: "excellent at handling large context windows",
    examples: "benefit from few-shot examples",
    reasoning: "responds well to step-by-step reasoning prompts",
};

const GPT4_TURBO_PREVIEW: FormattingProfile = FormattingProfile {
    name: DEFAULT_PROFILE,
    heading_style: HeadingStyle::Markdown,
    verbosity: Verbosity::Detailed,
    max_examples: 5,
    max_file_paths: 5,
    guidelines: GPT4_TURBO_GUIDELINES,
};

static PROFILES: &[FormattingProfile] = &[
    FormattingProfile {
        name: "gpt-4",
        heading_style: HeadingStyle::Markdown,
        verbosity: Verbosity::Detailed,
        max_examples: 5,
        max_file_paths: 5,
        guidelines: ModelGuidelines {
            context_handling: "can handle large context windows efficiently",
            ..GPT4_TURBO_GUIDELINES
        },
    },
    FormattingProfile {
        name: "gpt-4-turbo",
        ..GPT4_TURBO_PREVIEW
    },
    GPT4_TURBO_PREVIEW,
    FormattingProfile {
        name: "gpt-3.5-turbo",
        heading_style: HeadingStyle::Markdown,
        verbosity: Verbosity::Concise,
        max_examples: 2,
        max_file_paths: 3,
        guidelines: ModelGuidelines {
            preferred_format: "concise structured format",
            instruction_style: "clear and concise",
            context_handling: "moderate context window",
            examples: "benefit from examples but keep concise",
            reasoning: "prefer simpler, more direct instructions",
        },
    },
    FormattingProfile {
        name: "claude-3-opus",
        heading_style: HeadingStyle::XmlTags,
        verbosity: Verbosity::Detailed,
        max_examples: 5,
        max_file_paths: 10,
        guidelines: ModelGuidelines {
            preferred_format: "natural language with clear structure",
            instruction_style: "conversational but precise",
            context_handling: "excellent at handling large context",
            examples: "benefit from detailed examples",
            reasoning: "responds well to detailed explanations",
        },
    },
    FormattingProfile {
        name: "claude-3-sonnet",
        heading_style: HeadingStyle::XmlTags,
        verbosity: Verbosity::Detailed,
        max_examples: 4,
        max_file_paths: 5,
        guidelines: ModelGuidelines {
            preferred_format: "natural language with clear structure",
            instruction_style: "conversational but precise",
            context_handling: "good at handling large context",
            examples: "benefit from examples",
            reasoning: "responds well to explanations",
        },
    },
    FormattingProfile {
        name: "claude-3-haiku",
        heading_style: HeadingStyle::XmlTags,
        verbosity: Verbosity::Concise,
        max_examples: 2,
        max_file_paths: 3,
        guidelines: ModelGuidelines {
            preferred_format: "concise natural language",
            instruction_style: "direct and concise",
            context_handling: "moderate context window",
            examples: "benefit from concise examples",
            reasoning: "prefer simpler instructions",
        },
    },
];

/// All known profiles, in table order.
pub fn profiles() -> &'static [FormattingProfile] {
    PROFILES
}

/// Exact (case-insensitive) lookup by model name.
pub fn lookup(model: &str) -> Option<&'static FormattingProfile> {
    let model = model.trim();
    PROFILES.iter().find(|p| p.name.eq_ignore_ascii_case(model))
}

/// Profile for `model`, else the configured default, else the built-in default.
pub fn profile_for(model: &str, default_name: &str) -> &'static FormattingProfile {
    if let Some(profile) = lookup(model) {
        return profile;
    }
    tracing::debug!(model = %model, fallback = %default_name, "No formatting profile for model");
    lookup(default_name).unwrap_or(&GPT4_TURBO_PREVIEW)
}

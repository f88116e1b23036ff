// promptforge — Optimizer (judgment-based rewrite with sanity checks)

use crate::judge::{strip_code_fences, with_timeout, JudgeRequest, JudgmentService};
use crate::keywords::extract_keywords;
use crate::profile::FormattingProfile;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

const SYSTEM_PROMPT: &str = "You are an expert at optimizing prompts for LLM models. Improve \
clarity, structure and effectiveness for the target model while preserving all essential \
information and context.";

const FEEDBACK_SYSTEM_PROMPT: &str =
    "You are an expert at optimizing prompts based on performance feedback.";

/// Result of an optimization attempt. Never an error: on any failure the
/// original prompt comes back with `optimized == false`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OptimizationOutcome {
    pub prompt: String,
    pub optimized: bool,
    pub failure: Option<String>,
}

impl OptimizationOutcome {
    fn unchanged(prompt: &str, failure: String) -> Self {
        Self {
            prompt: prompt.to_string(),
            optimized: false,
            failure: Some(failure),
        }
    }
}

pub struct Optimizer {
    judge: Arc<dyn JudgmentService>,
    temperature: f64,
    timeout: Duration,
    min_length_ratio: f64,
}

impl Optimizer {
    pub fn new(judge: Arc<dyn JudgmentService>) -> Self {
        Self {
            judge,
            temperature: 0.5,
            timeout: Duration::from_secs(60),
            min_length_ratio: 0.5,
        }
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_min_length_ratio(mut self, ratio: f64) -> Self {
        self.min_length_ratio = ratio;
        self
    }

    /// Rewrite `prompt` for the profile's model.
    pub async fn optimize(
        &self,
        prompt: &str,
        profile: &FormattingProfile,
        feature_description: &str,
    ) -> OptimizationOutcome {
        let g = &profile.guidelines;
        let request = format!(
            "Optimize the following prompt for the target model: {model}\n\n\
             Target Model Guidelines:\n\
             - Preferred Format: {}\n\
             - Instruction Style: {}\n\
             - Context Handling: {}\n\
             - Examples: {}\n\
             - Reasoning: {}\n\n\
             Feature Description:\n{}\n\n\
             Current Prompt:\n{}\n\n\
             Optimization Goals:\n\
             1. Improve clarity and structure according to target model preferences\n\
             2. Preserve all essential context\n\
             3. Optimize formatting for model comprehension\n\
             4. Keep every section that is present\n\n\
             Return only the optimized prompt, without explanations or comments.\n",
            g.preferred_format,
            g.instruction_style,
            g.context_handling,
            g.examples,
            g.reasoning,
            feature_description.trim(),
            prompt,
            model = profile.name,
        );
        self.run(SYSTEM_PROMPT, request, prompt, feature_description)
            .await
    }

    /// Rewrite `prompt` to address reviewer feedback. Without feedback this
    /// is a plain `optimize`.
    pub async fn optimize_with_feedback(
        &self,
        prompt: &str,
        profile: &FormattingProfile,
        feature_description: &str,
        feedback: Option<&str>,
    ) -> OptimizationOutcome {
        let Some(feedback) = feedback.filter(|f| !f.trim().is_empty()) else {
            return self.optimize(prompt, profile, feature_description).await;
        };
        let request = format!(
            "Optimize the following prompt for {} based on this feedback:\n\n\
             Feedback:\n{}\n\n\
             Current Prompt:\n{}\n\n\
             Improve the prompt to address the feedback while keeping all essential information. \
             Return only the improved prompt.\n",
            profile.name,
            feedback.trim(),
            prompt
        );
        self.run(FEEDBACK_SYSTEM_PROMPT, request, prompt, feature_description)
            .await
    }

    async fn run(
        &self,
        system: &str,
        request: String,
        original: &str,
        feature_description: &str,
    ) -> OptimizationOutcome {
        let request = JudgeRequest::new(system, request).with_temperature(self.temperature);
        let reply = match with_timeout(self.timeout, self.judge.complete(&request)).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!(error = %e, "Prompt optimization failed, keeping initial prompt");
                return OptimizationOutcome::unchanged(original, e.to_string());
            }
        };

        let candidate = strip_code_fences(&reply);
        if let Err(reason) = sanity_check(original, candidate, feature_description, self.min_length_ratio) {
            tracing::warn!(reason = %reason, "Optimized prompt rejected, keeping initial prompt");
            return OptimizationOutcome::unchanged(original, reason);
        }

        tracing::info!(
            before = original.chars().count(),
            after = candidate.chars().count(),
            "Prompt optimized"
        );
        OptimizationOutcome {
            prompt: candidate.to_string(),
            optimized: true,
            failure: None,
        }
    }
}

/// Reject rewrites that shrink too far or drop feature keywords.
fn sanity_check(
    original: &str,
    candidate: &str,
    feature_description: &str,
    min_length_ratio: f64,
) -> Result<(), String> {
    let before = original.chars().count();
    let after = candidate.chars().count();
    if after == 0 {
        return Err("optimizer returned empty text".into());
    }
    if before > 0 {
        let ratio = after as f64 / before as f64;
        if ratio < min_length_ratio {
            return Err(format!(
                "length ratio {:.2} below minimum {:.2}",
                ratio, min_length_ratio
            ));
        }
    }

    let lowered = candidate.to_lowercase();
    let missing: Vec<String> = extract_keywords(feature_description)
        .into_iter()
        .filter(|kw| !lowered.contains(kw.as_str()))
        .collect();
    if !missing.is_empty() {
        return Err(format!("feature keywords missing: {}", missing.join(", ")));
    }
    Ok(())
}

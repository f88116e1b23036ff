// promptforge — Prompt pipeline (select → assemble → optimize)

use crate::artifact::{FeatureRequest, FeatureType, IoExample, Manifest};
use crate::assembler::{assemble, AssembledPrompt};
use crate::classifier::Classifier;
use crate::config::{Config, ConfigError, JudgeConfig, PipelineConfig};
use crate::error::{BuildError, ClassificationError, ServiceError};
use crate::judge::{JudgmentService, ProviderJudge};
use crate::optimizer::Optimizer;
use crate::profile::profile_for;
use crate::provider::factory::create_provider;
use crate::selection::{SelectionResult, SelectionSource};
use crate::selector::{self, SelectorOptions};
use crate::store::ArtifactStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Pipeline states, recorded in order as they are entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Start,
    Selecting,
    Assembling,
    Optimizing,
    Done,
}

/// One `build_prompt` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildRequest {
    #[serde(alias = "description")]
    pub feature_description: String,
    #[serde(default)]
    pub feature_type: FeatureType,
    /// Target model; the configured default profile when absent.
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub include_all_context: bool,
    /// Overrides `pipeline.use_classifier` when set.
    #[serde(default)]
    pub enable_classification: Option<bool>,
    /// Overrides `pipeline.use_optimizer` when set.
    #[serde(default)]
    pub enable_optimization: Option<bool>,
    #[serde(default)]
    pub feature_examples: Vec<IoExample>,
}

impl BuildRequest {
    pub fn new(feature_description: impl Into<String>) -> Self {
        Self {
            feature_description: feature_description.into(),
            feature_type: FeatureType::Feature,
            model: None,
            include_all_context: false,
            enable_classification: None,
            enable_optimization: None,
            feature_examples: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BuildMetadata {
    /// The classifier's selection was used.
    pub classified: bool,
    pub optimized: bool,
    pub selection_source: SelectionSource,
    /// Why the classifier result was not used, when it was attempted.
    pub fallback_reason: Option<String>,
    pub optimization_failure: Option<String>,
    pub model: String,
    pub profile: String,
    pub feature_type: FeatureType,
    /// Selected identifiers scoring below the relevance cutoff.
    pub borderline: Vec<String>,
    pub stages: Vec<Stage>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BuildOutput {
    /// Final prompt text (optimized when optimization succeeded).
    pub prompt: String,
    pub initial_prompt: String,
    pub assembled: AssembledPrompt,
    /// The classifier's selection, when accepted.
    pub classification: Option<SelectionResult>,
    pub selection: SelectionResult,
    pub optimized: bool,
    pub metadata: BuildMetadata,
}

/// Selection plus what happened on the way to it.
struct Chosen {
    result: SelectionResult,
    fallback_reason: Option<String>,
    service_down: bool,
}

/// Builds prompts from a store and an optional judgment service.
///
/// Holds no per-request state; one builder can serve concurrent calls.
pub struct PromptBuilder {
    store: Arc<ArtifactStore>,
    judge: Option<Arc<dyn JudgmentService>>,
    pipeline: PipelineConfig,
    judge_cfg: JudgeConfig,
}

impl PromptBuilder {
    pub fn new(store: Arc<ArtifactStore>, config: &Config) -> Self {
        Self {
            store,
            judge: None,
            pipeline: config.pipeline.clone(),
            judge_cfg: config.judge.clone(),
        }
    }

    pub fn with_judge(mut self, judge: Arc<dyn JudgmentService>) -> Self {
        self.judge = Some(judge);
        self
    }

    /// Store from `resources.dir`; judge from the configured provider when a
    /// key is available, otherwise keyword selection only.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let store = Arc::new(ArtifactStore::new(config.resources_path()?));
        let builder = Self::new(store, config);
        match create_provider(config) {
            Ok(provider) => {
                let judge = ProviderJudge::new(Arc::from(provider), config.judge.model.clone())
                    .with_retries(config.judge.max_retries, config.judge.retry_delay_ms);
                Ok(builder.with_judge(Arc::new(judge)))
            }
            Err(e) => {
                tracing::info!(reason = %e, "No judgment service; using keyword selection only");
                Ok(builder)
            }
        }
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    pub fn has_judge(&self) -> bool {
        self.judge.is_some()
    }

    pub fn judge(&self) -> Option<Arc<dyn JudgmentService>> {
        self.judge.clone()
    }

    fn selector_options(&self) -> SelectorOptions {
        SelectorOptions {
            threshold: self.pipeline.keyword_threshold,
            always_include_business_goals: self.pipeline.always_include_business_goals,
            always_include_agent_guidelines: self.pipeline.always_include_agent_guidelines,
        }
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(self.judge_cfg.timeout_secs)
    }

    /// Pick artifacts for a feature. Classifier failures fall back to
    /// keyword selection; this never fails.
    pub async fn select_context(
        &self,
        feature_description: &str,
        manifest: &Manifest,
        use_classifier: bool,
    ) -> SelectionResult {
        self.choose(feature_description, manifest, use_classifier)
            .await
            .result
    }

    async fn choose(&self, feature_description: &str, manifest: &Manifest, use_classifier: bool) -> Chosen {
        let keyword = || selector::select(feature_description, manifest, &self.selector_options());

        if !use_classifier {
            return Chosen {
                result: keyword(),
                fallback_reason: None,
                service_down: false,
            };
        }

        let Some(judge) = &self.judge else {
            return Chosen {
                result: keyword(),
                fallback_reason: Some(ServiceError::NotConfigured.to_string()),
                service_down: true,
            };
        };

        let classifier = Classifier::new(judge.clone())
            .with_temperature(self.judge_cfg.classifier_temperature)
            .with_timeout(self.timeout());

        match classifier.classify(feature_description, manifest).await {
            Ok(result) => Chosen {
                result,
                fallback_reason: None,
                service_down: false,
            },
            Err(e) => {
                tracing::warn!(error = %e, "Classification failed, falling back to keyword selection");
                let service_down = matches!(
                    e,
                    ClassificationError::Service(ServiceError::Network(_) | ServiceError::Timeout(_))
                );
                Chosen {
                    result: keyword(),
                    fallback_reason: Some(e.to_string()),
                    service_down,
                }
            }
        }
    }

    /// Run the full pipeline for one request.
    ///
    /// Only a missing or unreadable store is an error; classifier and
    /// optimizer problems degrade to the keyword path and the initial prompt.
    pub async fn build_prompt(&self, request: BuildRequest) -> Result<BuildOutput, BuildError> {
        let mut stages = vec![Stage::Start];
        let manifest = self.store.manifest().await?;

        stages.push(Stage::Selecting);
        let chosen = if request.include_all_context {
            Chosen {
                result: SelectionResult::all(&manifest),
                fallback_reason: None,
                service_down: false,
            }
        } else {
            let use_classifier = request
                .enable_classification
                .unwrap_or(self.pipeline.use_classifier);
            self.choose(&request.feature_description, &manifest, use_classifier)
                .await
        };
        let selection = chosen.result;
        let classified = selection.source == SelectionSource::Classifier;

        stages.push(Stage::Assembling);
        let model = request
            .model
            .clone()
            .unwrap_or_else(|| self.pipeline.default_model_profile.clone());
        let profile = profile_for(&model, &self.pipeline.default_model_profile);
        let feature = FeatureRequest {
            description: request.feature_description.clone(),
            feature_type: request.feature_type,
            examples: request.feature_examples.clone(),
        };
        let assembled = assemble(&selection, &manifest, &feature, &model, profile);
        let initial_prompt = assembled.raw_text.clone();

        let use_optimizer = request
            .enable_optimization
            .unwrap_or(self.pipeline.use_optimizer);
        let (prompt, optimized, optimization_failure) = match (&self.judge, use_optimizer) {
            (_, false) => (initial_prompt.clone(), false, None),
            (None, true) => (
                initial_prompt.clone(),
                false,
                Some(ServiceError::NotConfigured.to_string()),
            ),
            (Some(_), true) if chosen.service_down => (
                initial_prompt.clone(),
                false,
                Some("judgment service unavailable".to_string()),
            ),
            (Some(judge), true) => {
                stages.push(Stage::Optimizing);
                let outcome = Optimizer::new(judge.clone())
                    .with_temperature(self.judge_cfg.optimizer_temperature)
                    .with_timeout(self.timeout())
                    .with_min_length_ratio(self.pipeline.min_length_ratio)
                    .optimize(&initial_prompt, profile, &request.feature_description)
                    .await;
                (outcome.prompt, outcome.optimized, outcome.failure)
            }
        };
        stages.push(Stage::Done);

        let metadata = BuildMetadata {
            classified,
            optimized,
            selection_source: selection.source,
            fallback_reason: chosen.fallback_reason,
            optimization_failure,
            model,
            profile: profile.name.to_string(),
            feature_type: request.feature_type,
            borderline: selection.borderline(self.pipeline.relevance_cutoff),
            stages,
        };

        tracing::info!(
            classified = metadata.classified,
            optimized = metadata.optimized,
            source = ?metadata.selection_source,
            profile = %metadata.profile,
            selected = selection.selected_count(),
            "Prompt built"
        );

        Ok(BuildOutput {
            prompt,
            initial_prompt,
            assembled,
            classification: classified.then(|| selection.clone()),
            selection,
            optimized,
            metadata,
        })
    }
}

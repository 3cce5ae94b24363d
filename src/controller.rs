use std::sync::Arc;

use crate::error::Error;
use crate::gemini::Generator;
use crate::prompt::{build_prompt, GenerationRequest};
use crate::render::{render_sections, RenderedSection};
use crate::sections::{parse_sections, Section, EXPECTED_SECTIONS};

/// Where the form is in its generate cycle.
///
/// `notice` carries a validation error only. A loading form has neither an
/// error nor a result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
    Idle { notice: Option<Error> },
    Loading,
    Success { markdown: String, notice: Option<Error> },
    Failure,
}

#[derive(Debug)]
pub struct Controller {
    input: String,
    thinking_enabled: bool,
    phase: Phase,
}

impl Default for Controller {
    fn default() -> Self {
        Self::new()
    }
}

impl Controller {
    pub fn new() -> Self {
        Self {
            input: String::new(),
            thinking_enabled: false,
            phase: Phase::Idle { notice: None },
        }
    }

    #[cfg(test)]
    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    #[cfg(test)]
    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn thinking_enabled(&self) -> bool {
        self.thinking_enabled
    }

    pub fn is_loading(&self) -> bool {
        matches!(self.phase, Phase::Loading)
    }

    /// Input edits are ignored while a request is in flight.
    pub fn set_input(&mut self, input: String) {
        if !self.is_loading() {
            self.input = input;
        }
    }

    pub fn toggle_thinking(&mut self) {
        if !self.is_loading() {
            self.thinking_enabled = !self.thinking_enabled;
        }
    }

    /// Start a generation from the current input and toggle.
    ///
    /// Returns the request to dispatch, or `None` when nothing should be sent.
    pub fn generate(&mut self) -> Option<GenerationRequest> {
        if self.is_loading() {
            return None;
        }

        match GenerationRequest::new(&self.input, self.thinking_enabled) {
            Ok(request) => {
                self.phase = Phase::Loading;
                Some(request)
            }
            Err(error) => {
                self.phase = match std::mem::replace(&mut self.phase, Phase::Failure) {
                    Phase::Success { markdown, .. } => Phase::Success {
                        markdown,
                        notice: Some(error),
                    },
                    _ => Phase::Idle { notice: Some(error) },
                };
                None
            }
        }
    }

    /// Same as `generate`, but only once a result has been produced.
    pub fn regenerate(&mut self) -> Option<GenerationRequest> {
        if self.can_regenerate() {
            self.generate()
        } else {
            None
        }
    }

    /// Apply the outcome of the request started by `generate`.
    pub fn finish(&mut self, outcome: Result<String, Error>) {
        if !self.is_loading() {
            tracing::warn!("generation outcome arrived with no request in flight");
            return;
        }

        self.phase = match outcome {
            Ok(markdown) => {
                let count = parse_sections(&markdown).len();
                if count != EXPECTED_SECTIONS {
                    tracing::warn!(count, expected = EXPECTED_SECTIONS, "response section count differs from the requested layout");
                }
                Phase::Success { markdown, notice: None }
            }
            Err(_) => Phase::Failure,
        };
    }

    pub fn can_regenerate(&self) -> bool {
        matches!(self.phase, Phase::Success { .. })
    }

    pub fn generated_markdown(&self) -> Option<&str> {
        match &self.phase {
            Phase::Success { markdown, .. } => Some(markdown),
            _ => None,
        }
    }

    pub fn error_message(&self) -> Option<String> {
        match &self.phase {
            Phase::Idle { notice } | Phase::Success { notice, .. } => {
                notice.map(|error| error.to_string())
            }
            Phase::Failure => Some(Error::GenerationFailed.to_string()),
            Phase::Loading => None,
        }
    }

    pub fn primary_label(&self) -> &'static str {
        if self.is_loading() {
            "Generating..."
        } else {
            "Generate Email"
        }
    }

    pub fn sections(&self) -> Vec<Section> {
        self.generated_markdown()
            .map(parse_sections)
            .unwrap_or_default()
    }

    pub fn rendered_sections(&self) -> Vec<RenderedSection> {
        render_sections(&self.sections())
    }

    /// A result arrived but none of it could be split into sections.
    pub fn has_unexpected_format(&self) -> bool {
        self.generated_markdown().is_some() && self.sections().is_empty()
    }
}

/// Build the prompt for `request` and wait for the generator's answer.
pub async fn dispatch(
    generator: Arc<dyn Generator>,
    request: GenerationRequest,
) -> Result<String, Error> {
    let (prompt, config) = build_prompt(&request);
    tracing::debug!(
        content_len = request.content().len(),
        thinking = request.thinking_enabled(),
        "dispatching generation"
    );
    generator.generate(&prompt, &config).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::GenerationConfig;
    use crate::render::{markdown_blocks, Block};
    use futures_util::future::BoxFuture;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct FakeGenerator {
        reply: Result<String, Error>,
        calls: AtomicUsize,
        last_prompt: Mutex<Option<(String, GenerationConfig)>>,
    }

    impl FakeGenerator {
        fn replying(reply: Result<String, Error>) -> Arc<Self> {
            Arc::new(Self {
                reply,
                calls: AtomicUsize::new(0),
                last_prompt: Mutex::new(None),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl Generator for FakeGenerator {
        fn generate<'a>(
            &'a self,
            prompt: &'a str,
            config: &'a GenerationConfig,
        ) -> BoxFuture<'a, Result<String, Error>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_prompt.lock().unwrap() = Some((prompt.to_string(), config.clone()));
            let reply = self.reply.clone();
            Box::pin(async move { reply })
        }
    }

    async fn run(controller: &mut Controller, generator: &Arc<FakeGenerator>) {
        if let Some(request) = controller.generate() {
            assert!(controller.is_loading());
            let outcome = dispatch(generator.clone(), request).await;
            controller.finish(outcome);
        }
    }

    #[tokio::test]
    async fn test_empty_input_makes_no_call() {
        let generator = FakeGenerator::replying(Ok("### A\nfoo".to_string()));
        let mut controller = Controller::new();
        controller.set_input("   \n ".to_string());

        run(&mut controller, &generator).await;

        assert_eq!(generator.calls(), 0);
        assert_eq!(controller.phase(), &Phase::Idle { notice: Some(Error::EmptyContent) });
        assert_eq!(
            controller.error_message().as_deref(),
            Some("Please paste the webpage content first.")
        );
    }

    #[tokio::test]
    async fn test_failure_shows_generic_message() {
        let generator = FakeGenerator::replying(Err(Error::GenerationFailed));
        let mut controller = Controller::new();
        controller.set_input("Buy our eco bottle".to_string());

        run(&mut controller, &generator).await;

        assert_eq!(generator.calls(), 1);
        assert_eq!(controller.phase(), &Phase::Failure);
        assert_eq!(controller.generated_markdown(), None);
        assert_eq!(
            controller.error_message().as_deref(),
            Some("An error occurred while generating the email. Please check the console and try again.")
        );
        assert!(!controller.can_regenerate());
    }

    #[tokio::test]
    async fn test_end_to_end_cards() {
        let reply = "### 1️⃣ Analysis\n|A|B|\n|-|-|\n|x|y|\n### 2️⃣ Optimized\nHello";
        let generator = FakeGenerator::replying(Ok(reply.to_string()));
        let mut controller = Controller::new();
        controller.set_input("Buy our eco bottle".to_string());

        run(&mut controller, &generator).await;

        let (prompt, config) = generator.last_prompt.lock().unwrap().clone().unwrap();
        assert!(prompt.contains("Buy our eco bottle"));
        assert_eq!(config.thinking_config, None);

        let cards = controller.rendered_sections();
        assert_eq!(cards.len(), 2);
        assert_eq!(cards[0].title, "1️⃣ Analysis");
        assert_eq!(cards[1].title, "2️⃣ Optimized");
        assert!(cards[0].html.contains("<table>"));

        let sections = controller.sections();
        let blocks = markdown_blocks(&sections[0].body);
        assert!(matches!(
            blocks.as_slice(),
            [Block::Table { header, rows }] if header.len() == 2 && rows.len() == 1
        ));
        assert!(cards[1].html.contains("Hello"));
        assert_eq!(controller.error_message(), None);
        assert!(controller.can_regenerate());
        assert!(!controller.has_unexpected_format());
    }

    #[tokio::test]
    async fn test_thinking_toggle_reaches_generator() {
        let generator = FakeGenerator::replying(Ok("### A\nfoo".to_string()));
        let mut controller = Controller::new();
        controller.set_input("offer".to_string());
        controller.toggle_thinking();

        run(&mut controller, &generator).await;

        let (_, config) = generator.last_prompt.lock().unwrap().clone().unwrap();
        assert!(config.thinking_config.is_some());
    }

    #[test]
    fn test_loading_locks_controls() {
        let mut controller = Controller::new();
        controller.set_input("offer".to_string());
        assert!(controller.generate().is_some());
        assert_eq!(controller.primary_label(), "Generating...");

        controller.set_input("changed".to_string());
        controller.toggle_thinking();
        assert_eq!(controller.input(), "offer");
        assert!(!controller.thinking_enabled());
        assert!(controller.generate().is_none());
        assert!(controller.regenerate().is_none());
        assert_eq!(controller.error_message(), None);

        controller.finish(Ok("### A\nfoo".to_string()));
        assert_eq!(controller.primary_label(), "Generate Email");
    }

    #[test]
    fn test_regenerate_needs_prior_success() {
        let mut controller = Controller::new();
        controller.set_input("offer".to_string());
        assert!(controller.regenerate().is_none());
        assert_eq!(controller.phase(), &Phase::Idle { notice: None });

        controller.generate();
        controller.finish(Ok("### A\nfoo".to_string()));
        controller.toggle_thinking();

        let request = controller.regenerate().unwrap();
        assert!(request.thinking_enabled());
        assert!(controller.is_loading());
        assert_eq!(controller.generated_markdown(), None);
    }

    #[test]
    fn test_new_attempt_clears_previous_error() {
        let mut controller = Controller::new();
        controller.set_input("offer".to_string());
        controller.generate();
        controller.finish(Err(Error::GenerationFailed));
        assert!(controller.error_message().is_some());

        controller.generate();
        assert_eq!(controller.error_message(), None);
        controller.finish(Ok("### A\nfoo".to_string()));
        assert_eq!(controller.phase(), &Phase::Success {
            markdown: "### A\nfoo".to_string(),
            notice: None,
        });
    }

    #[test]
    fn test_validation_keeps_previous_result() {
        let mut controller = Controller::new();
        controller.set_input("offer".to_string());
        controller.generate();
        controller.finish(Ok("### A\nfoo".to_string()));

        controller.set_input(String::new());
        assert!(controller.generate().is_none());
        assert_eq!(controller.generated_markdown(), Some("### A\nfoo"));
        assert_eq!(
            controller.error_message().as_deref(),
            Some("Please paste the webpage content first.")
        );
    }

    #[test]
    fn test_unexpected_format_is_flagged() {
        let mut controller = Controller::new();
        controller.set_input("offer".to_string());
        controller.generate();
        controller.finish(Ok("I could not follow the format, sorry.".to_string()));

        assert!(controller.sections().is_empty());
        assert!(controller.has_unexpected_format());
        assert_eq!(controller.error_message(), None);
    }

    #[test]
    fn test_stray_outcome_is_ignored() {
        let mut controller = Controller::new();
        controller.finish(Ok("### A\nfoo".to_string()));
        assert_eq!(controller.phase(), &Phase::Idle { notice: None });
    }
}

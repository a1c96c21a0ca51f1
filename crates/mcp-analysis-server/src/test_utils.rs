use crate::classifier::{Classifier, ClassifierError};
use crate::model::check::ClassificationPrompt;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

type ReplyFn = dyn Fn(&ClassificationPrompt) -> Result<String, ClassifierError> + Send + Sync;
type DelayFn = dyn Fn(&ClassificationPrompt) -> Duration + Send + Sync;

/// A [`Classifier`] whose answers are computed from the prompt, recording how
/// many calls it received and how many were in flight at once.
pub struct ScriptedClassifier {
    reply: Box<ReplyFn>,
    delay: Box<DelayFn>,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedClassifier {
    pub fn new(
        reply: impl Fn(&ClassificationPrompt) -> Result<String, ClassifierError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            reply: Box::new(reply),
            delay: Box::new(|_| Duration::ZERO),
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Answers "yes" when the system instruction names `category` and the
    /// description contains `needle`, "no" otherwise.
    pub fn yes_when(rules: &'static [(&'static str, &'static str)]) -> Self {
        Self::new(move |prompt| {
            let description = prompt
                .user
                .split_once("\n\n")
                .map_or("", |(_, description)| description);
            let triggered = rules.iter().any(|(category, needle)| {
                prompt.system.contains(category) && description.contains(needle)
            });
            Ok(if triggered { "Yes" } else { "No" }.to_string())
        })
    }

    pub fn with_delay(
        mut self,
        delay: impl Fn(&ClassificationPrompt) -> Duration + Send + Sync + 'static,
    ) -> Self {
        self.delay = Box::new(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Classifier for ScriptedClassifier {
    async fn classify(&self, prompt: &ClassificationPrompt) -> Result<String, ClassifierError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        let delay = (self.delay)(prompt);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        (self.reply)(prompt)
    }
}

//! Lifecycle hooks invoked by the stream adapter.
//!
//! Every hook is optional. The adapter guarantees:
//!
//! - `on_start` runs exactly once, before any `on_token`
//! - `on_token` runs for each emitted fragment, before the fragment is handed
//!   to the consumer
//! - `on_completion` then `on_final` run exactly once, only when the provider
//!   finished cleanly

type StartHook = Box<dyn FnMut() + Send>;
type TextHook = Box<dyn FnMut(&str) + Send>;

/// Optional lifecycle callbacks for one adapter instance
#[derive(Default)]
pub struct StreamCallbacks {
    on_start: Option<StartHook>,
    on_token: Option<TextHook>,
    on_completion: Option<TextHook>,
    on_final: Option<TextHook>,
}

impl StreamCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_start(mut self, hook: impl FnMut() + Send + 'static) -> Self {
        self.on_start = Some(Box::new(hook));
        self
    }

    pub fn on_token(mut self, hook: impl FnMut(&str) + Send + 'static) -> Self {
        self.on_token = Some(Box::new(hook));
        self
    }

    pub fn on_completion(mut self, hook: impl FnMut(&str) + Send + 'static) -> Self {
        self.on_completion = Some(Box::new(hook));
        self
    }

    pub fn on_final(mut self, hook: impl FnMut(&str) + Send + 'static) -> Self {
        self.on_final = Some(Box::new(hook));
        self
    }

    pub(crate) fn start(&mut self) {
        if let Some(hook) = self.on_start.as_mut() {
            hook();
        }
    }

    pub(crate) fn token(&mut self, text: &str) {
        if let Some(hook) = self.on_token.as_mut() {
            hook(text);
        }
    }

    pub(crate) fn complete(&mut self, full_text: &str) {
        if let Some(hook) = self.on_completion.as_mut() {
            hook(full_text);
        }
        if let Some(hook) = self.on_final.as_mut() {
            hook(full_text);
        }
    }
}

impl std::fmt::Debug for StreamCallbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamCallbacks")
            .field("on_start", &self.on_start.is_some())
            .field("on_token", &self.on_token.is_some())
            .field("on_completion", &self.on_completion.is_some())
            .field("on_final", &self.on_final.is_some())
            .finish()
    }
}

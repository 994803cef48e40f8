//! Narrative gateway
//!
//! The external text and image generator, seen from the game core as a slow,
//! unreliable black box. Implementations never return errors: a failed
//! narrative comes back as [`FALLBACK_NARRATIVE`], a failed image as `None`.

mod client;
pub mod prompts;

use std::collections::VecDeque;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Semaphore;

pub use client::{ChatGateway, ChatMessage, GatewayConfig};

/// Text substituted when narrative generation fails
pub const FALLBACK_NARRATIVE: &str = "The air crackles with energy, but the vision is unclear...";

#[async_trait]
pub trait NarrativeGateway: Send + Sync {
    /// Describe something that just happened
    async fn generate_narrative(&self, prompt: &str) -> String;

    /// Picture the scene, returning a URL or data URL
    async fn generate_image(&self, prompt: &str) -> Option<String>;
}

/// Gateway used when no generation service is configured
#[derive(Debug, Default, Clone, Copy)]
pub struct OfflineGateway;

#[async_trait]
impl NarrativeGateway for OfflineGateway {
    async fn generate_narrative(&self, _prompt: &str) -> String {
        FALLBACK_NARRATIVE.to_string()
    }

    async fn generate_image(&self, _prompt: &str) -> Option<String> {
        None
    }
}

/// Gateway with canned replies, for tests and demos
///
/// Replies are handed out in order; once they run out the fallback text is
/// returned. A held gateway parks every request until [`release`] lets it
/// through, which keeps a request in flight for as long as a test needs.
///
/// [`release`]: ScriptedGateway::release
#[derive(Debug, Default)]
pub struct ScriptedGateway {
    replies: Mutex<VecDeque<String>>,
    images: Mutex<VecDeque<Option<String>>>,
    prompts: Mutex<Vec<String>>,
    gate: Option<Semaphore>,
}

impl ScriptedGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_replies<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let gateway = Self::new();
        gateway.push_replies(replies);
        gateway
    }

    /// A gateway whose requests wait for [`release`](Self::release)
    pub fn held() -> Self {
        Self {
            gate: Some(Semaphore::new(0)),
            ..Self::default()
        }
    }

    pub fn push_replies<I, S>(&self, replies: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.replies
            .lock()
            .extend(replies.into_iter().map(Into::into));
    }

    pub fn push_image(&self, image: Option<&str>) {
        self.images.lock().push_back(image.map(str::to_string));
    }

    /// Let `n` parked requests complete
    pub fn release(&self, n: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(n);
        }
    }

    /// Every prompt received so far, in order
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().len()
    }

    async fn wait_for_gate(&self) {
        if let Some(gate) = &self.gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }
    }
}

#[async_trait]
impl NarrativeGateway for ScriptedGateway {
    async fn generate_narrative(&self, prompt: &str) -> String {
        self.prompts.lock().push(prompt.to_string());
        self.wait_for_gate().await;
        self.replies
            .lock()
            .pop_front()
            .unwrap_or_else(|| FALLBACK_NARRATIVE.to_string())
    }

    async fn generate_image(&self, prompt: &str) -> Option<String> {
        self.prompts.lock().push(prompt.to_string());
        self.wait_for_gate().await;
        self.images.lock().pop_front().flatten()
    }
}

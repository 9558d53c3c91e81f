use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use async_openai::types::{
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
};
use async_openai::{Client, config::OpenAIConfig};
use futures::future::BoxFuture;
use tracing::debug;

use super::{CommandGenerator, parser, prompt};
use crate::context::SessionContext;
use crate::plan::Step;

/// Chat-completions backed generator.
pub struct OpenAiGenerator {
    client: Client<OpenAIConfig>,
    model: String,
    request_timeout: Duration,
}

impl OpenAiGenerator {
    const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
    const COMMAND_MAX_TOKENS: u32 = 256;
    const PLAN_MAX_TOKENS: u32 = 1024;

    /// The client reads `OPENAI_API_KEY` (and `OPENAI_BASE_URL`) itself.
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            model: model.into(),
            request_timeout: Self::REQUEST_TIMEOUT,
        }
    }

    /// `None` unless an API key is configured.
    pub fn from_env(model: &str) -> Option<Self> {
        std::env::var("OPENAI_API_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty())
            .map(|_| Self::new(model))
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, system: String, user: String, max_tokens: u32) -> Result<String> {
        let messages: Vec<ChatCompletionRequestMessage> = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(system)
                .build()?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(user)
                .build()?
                .into(),
        ];
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .max_completion_tokens(max_tokens)
            .messages(messages)
            .build()
            .context("Failed to build chat request")?;

        let response = tokio::time::timeout(self.request_timeout, self.client.chat().create(request))
            .await
            .map_err(|_| anyhow!("model request timed out after {:?}", self.request_timeout))?
            .context("Chat completion request failed")?;

        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default();
        debug!("{} replied with {} bytes", self.name(), content.len());
        Ok(content)
    }
}

impl CommandGenerator for OpenAiGenerator {
    fn name(&self) -> String {
        format!("remote/{}", self.model)
    }

    fn generate_command<'a>(
        &'a self,
        instruction: &'a str,
        ctx: &'a SessionContext,
    ) -> BoxFuture<'a, Result<Option<String>>> {
        Box::pin(async move {
            let raw = self
                .complete(
                    prompt::command_system_prompt(ctx),
                    prompt::user_prompt(instruction),
                    Self::COMMAND_MAX_TOKENS,
                )
                .await?;
            let command = parser::clean_command_output(&raw);
            Ok((!command.is_empty()).then_some(command))
        })
    }

    fn generate_plan<'a>(
        &'a self,
        instruction: &'a str,
        ctx: &'a SessionContext,
    ) -> BoxFuture<'a, Result<Option<Vec<Step>>>> {
        Box::pin(async move {
            let raw = self
                .complete(
                    prompt::plan_system_prompt(ctx),
                    prompt::user_prompt(instruction),
                    Self::PLAN_MAX_TOKENS,
                )
                .await?;
            Ok(parser::parse_plan(&raw))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_carries_model() {
        let generator = OpenAiGenerator::new("gpt-4o-mini");
        assert_eq!(generator.name(), "remote/gpt-4o-mini");
        assert_eq!(generator.model(), "gpt-4o-mini");
    }
}

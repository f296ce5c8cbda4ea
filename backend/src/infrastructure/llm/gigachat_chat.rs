/// GigaChat chat-completions answer generator
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

use super::{AnswerGenerationError, AnswerGenerationResult, AnswerGenerator};
use crate::infrastructure::gigachat::GigaChatClient;

pub const SYSTEM_PROMPT: &str = "\
Ты историк, специалист по Русско-японской войне 1904-1905 годов.
Отвечай только на вопросы об этой войне; от остальных тем вежливо отказывайся.
Опирайся на фрагменты из базы знаний, переданные перед вопросом. \
Если в них нет ответа, прямо скажи, что не знаешь. Ничего не выдумывай.
Если вопрос касается конкретного корабля, назови его командира на 1904 год \
и основные тактико-технические характеристики.
Пиши в академическом стиле.
В конце ответа перечисли использованные источники в формате [Название](URL), \
от более важных к менее важным. Если URL не относится к ответу, укажи только название.";

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: String,
}

/// Sends `[system prompt, context as assistant turn, question]` to GigaChat
pub struct GigaChatAnswerGenerator {
    client: Arc<GigaChatClient>,
    system_prompt: String,
}

impl GigaChatAnswerGenerator {
    pub fn new(client: Arc<GigaChatClient>) -> Self {
        GigaChatAnswerGenerator {
            client,
            system_prompt: SYSTEM_PROMPT.to_string(),
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }
}

#[async_trait]
impl AnswerGenerator for GigaChatAnswerGenerator {
    async fn generate(&self, query: &str, context: &[String]) -> AnswerGenerationResult<String> {
        let context_text = context.join("\n");
        debug!(
            "Generating answer with {} context passages ({} chars)",
            context.len(),
            context_text.chars().count()
        );

        let request = ChatRequest {
            model: &self.client.config().chat_model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &self.system_prompt,
                },
                ChatMessage {
                    role: "assistant",
                    content: &context_text,
                },
                ChatMessage {
                    role: "user",
                    content: query,
                },
            ],
        };

        let response: ChatResponse = self.client.post_json("chat/completions", &request).await?;
        let answer = response
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or(AnswerGenerationError::EmptyResponse)?;

        info!("Generated response for query: {}", query);
        Ok(answer)
    }
}

use futures::StreamExt;
use serde::Serialize;

use crate::error::TurnError;
use crate::models::{CompletionRequest, CompletionService};
use crate::prompts::{conversation_system_prompt, summary_user_prompt, SUMMARY_SYSTEM_PROMPT};
use crate::session::{ChatMessage, ProfilePatch, Session, Stage, TravelProfile};
use crate::settings::EffectiveSettings;

/// Keeps the next request well-formed when the model answered with nothing.
pub const EMPTY_REPLY_PLACEHOLDER: &str = " ";

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TurnOutcome {
    Replied { reply: String, user_message_count: u32, chat_complete: bool },
    /// Input closed or blank; nothing changed.
    Ignored,
}

pub struct TurnController<'a> {
    pub completions: &'a dyn CompletionService,
    pub settings: &'a EffectiveSettings,
}

fn expect_stage(session: &Session, wanted: Stage) -> Result<(), TurnError> {
    let stage = session.stage();
    if stage != wanted {
        return Err(TurnError::WrongStage { stage });
    }
    Ok(())
}

impl<'a> TurnController<'a> {
    pub fn new(completions: &'a dyn CompletionService, settings: &'a EffectiveSettings) -> Self {
        Self { completions, settings }
    }

    pub fn input_enabled(&self, session: &Session) -> bool {
        session.stage() == Stage::Chatting && session.user_message_count < self.settings.max_user_messages
    }

    pub fn update_profile(&self, session: &mut Session, patch: ProfilePatch) -> Result<(), TurnError> {
        expect_stage(session, Stage::Setup)?;
        session.profile.apply_patch(patch)?;
        Ok(())
    }

    /// `Setup -> Chatting`: fixes the system prompt and asks the model for an
    /// opening greeting. The stage advances even if the greeting request fails.
    pub async fn start_chat(&self, session: &mut Session) -> Result<Option<String>, TurnError> {
        expect_stage(session, Stage::Setup)?;
        session.profile.validate()?;
        session.setup_complete = true;
        if !session.messages.is_empty() {
            return Ok(None);
        }
        session.messages.push(ChatMessage::system(conversation_system_prompt(&session.profile)));
        tracing::info!(session = %session.id, "chat started");

        metrics::counter!("tripseek_completion_requests_total", "kind" => "greeting").increment(1);
        let req = CompletionRequest::new(
            &self.settings.model,
            session.messages.clone(),
            true,
            self.settings.greeting_max_tokens,
        );
        let mut stream = self.completions.stream(req).await.map_err(TurnError::Completion)?;
        let mut greeting = String::new();
        while let Some(fragment) = stream.next().await {
            match fragment {
                Ok(f) => greeting.push_str(&f),
                Err(e) => {
                    tracing::warn!(session = %session.id, "greeting stream interrupted: {e}");
                    break;
                }
            }
        }
        if greeting.is_empty() {
            return Ok(None);
        }
        session.messages.push(ChatMessage::assistant(greeting.clone()));
        Ok(Some(greeting))
    }

    /// One `Chatting` turn. Fragments go to `on_token` as they arrive, paced by
    /// the configured delay. Once the limit is reached further calls are no-ops.
    pub async fn submit_message<F>(
        &self,
        session: &mut Session,
        text: &str,
        mut on_token: F,
    ) -> Result<TurnOutcome, TurnError>
    where
        F: FnMut(&str) + Send,
    {
        match session.stage() {
            Stage::Setup => return Err(TurnError::WrongStage { stage: Stage::Setup }),
            Stage::ChatComplete | Stage::SummaryShown => return Ok(TurnOutcome::Ignored),
            Stage::Chatting => {}
        }
        if !self.input_enabled(session) || text.trim().is_empty() {
            return Ok(TurnOutcome::Ignored);
        }
        let max = self.settings.max_message_chars;
        if text.chars().count() > max {
            return Err(TurnError::MessageTooLong { max });
        }

        session.messages.push(ChatMessage::user(text));

        metrics::counter!("tripseek_completion_requests_total", "kind" => "chat").increment(1);
        let req = CompletionRequest::new(
            &self.settings.model,
            session.messages.clone(),
            true,
            self.settings.chat_max_tokens,
        );
        let mut stream = self.completions.stream(req).await.map_err(TurnError::Completion)?;
        let mut reply = String::new();
        while let Some(fragment) = stream.next().await {
            match fragment {
                Ok(f) => {
                    on_token(&f);
                    reply.push_str(&f);
                    if !self.settings.pacing.is_zero() {
                        tokio::time::sleep(self.settings.pacing).await;
                    }
                }
                Err(e) => {
                    tracing::warn!(session = %session.id, "reply stream interrupted: {e}");
                    break;
                }
            }
        }
        if reply.is_empty() {
            reply = EMPTY_REPLY_PLACEHOLDER.to_string();
        }
        session.messages.push(ChatMessage::assistant(reply.clone()));
        session.user_message_count += 1;
        if session.user_message_count >= self.settings.max_user_messages {
            session.chat_complete = true;
            tracing::info!(session = %session.id, "chat complete");
        }
        tracing::debug!(session = %session.id, count = session.user_message_count, "turn finished");

        Ok(TurnOutcome::Replied {
            reply,
            user_message_count: session.user_message_count,
            chat_complete: session.chat_complete,
        })
    }

    /// `ChatComplete -> SummaryShown`. A session already showing its summary
    /// returns the stored text without another request.
    pub async fn request_summary(&self, session: &mut Session) -> Result<String, TurnError> {
        if let (Stage::SummaryShown, Some(summary)) = (session.stage(), &session.summary) {
            return Ok(summary.clone());
        }
        expect_stage(session, Stage::ChatComplete)?;

        metrics::counter!("tripseek_completion_requests_total", "kind" => "summary").increment(1);
        let messages = vec![
            ChatMessage::system(SUMMARY_SYSTEM_PROMPT),
            ChatMessage::user(summary_user_prompt(session.visible_messages())),
        ];
        let req = CompletionRequest::new(&self.settings.model, messages, false, self.settings.summary_max_tokens);
        let summary = self.completions.complete(req).await.map_err(TurnError::Completion)?;

        session.summary = Some(summary.clone());
        session.summary_shown = true;
        tracing::info!(session = %session.id, "summary shown");
        Ok(summary)
    }

    /// `SummaryShown -> Setup`: the replacement session starts from defaults.
    pub fn restart(&self, session: &Session) -> Result<Session, TurnError> {
        expect_stage(session, Stage::SummaryShown)?;
        Ok(Session::new(TravelProfile::default()))
    }
}

//! Conversation runtime executor

use super::invoker::{preview, ToolInvoker};
use super::traits::{LlmClient, ToolExecutor};
use super::{RuntimeError, RuntimeEvent, TurnOutcome};

use crate::catalog::ToolCatalog;
use crate::conversation::Conversation;
use crate::llm::{LlmRequest, SamplingParams};
use crate::state_machine::{transition, ConvContext, ConvState, Effect, Event};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

const EVENT_CAPACITY: usize = 64;

/// What executing one effect produced
enum EffectOutcome {
    Nothing,
    Event(Event),
    Finished(TurnOutcome),
}

/// Generic conversation runtime that can work with any LLM and tool implementations
pub struct ConversationRuntime<L, T>
where
    L: LlmClient + 'static,
    T: ToolExecutor + 'static,
{
    context: ConvContext,
    state: ConvState,
    conversation: Conversation,
    catalog: ToolCatalog,
    sampling: SamplingParams,
    llm_client: Arc<L>,
    invoker: ToolInvoker<T>,
    /// Cancels the in-flight model call or tool call of the current turn
    cancel: CancellationToken,
    events: Option<broadcast::Sender<RuntimeEvent>>,
}

impl<L, T> ConversationRuntime<L, T>
where
    L: LlmClient + 'static,
    T: ToolExecutor + 'static,
{
    pub fn new(
        context: ConvContext,
        conversation: Conversation,
        catalog: ToolCatalog,
        llm_client: L,
        tool_executor: T,
    ) -> Self {
        Self {
            context,
            state: ConvState::default(),
            conversation,
            catalog,
            sampling: SamplingParams::default(),
            llm_client: Arc::new(llm_client),
            invoker: ToolInvoker::new(Arc::new(tool_executor)),
            cancel: CancellationToken::new(),
            events: None,
        }
    }

    #[must_use]
    pub fn with_sampling(mut self, sampling: SamplingParams) -> Self {
        self.sampling = sampling;
        self
    }

    /// Publish progress on the given channel
    #[must_use]
    pub fn with_events(mut self, events: broadcast::Sender<RuntimeEvent>) -> Self {
        self.events = Some(events);
        self
    }

    /// Receiver for progress events, creating the channel on first use
    pub fn subscribe(&mut self) -> broadcast::Receiver<RuntimeEvent> {
        self.events
            .get_or_insert_with(|| broadcast::channel(EVENT_CAPACITY).0)
            .subscribe()
    }

    pub fn state(&self) -> &ConvState {
        &self.state
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn catalog(&self) -> &ToolCatalog {
        &self.catalog
    }

    pub fn context(&self) -> &ConvContext {
        &self.context
    }

    /// Token that cancels the next (or current) turn. A token that already
    /// fired is replaced, so each turn starts uncancelled.
    pub fn cancel_token(&mut self) -> CancellationToken {
        if self.cancel.is_cancelled() {
            self.cancel = CancellationToken::new();
        }
        self.cancel.clone()
    }

    /// Run one user turn to completion
    pub async fn submit(&mut self, text: impl Into<String>) -> Result<TurnOutcome, RuntimeError> {
        tracing::debug!(conv_id = %self.context.conversation_id, "Starting turn");
        let result = self.process_event(Event::UserMessage { text: text.into() }).await;

        if let Err(e) = &result {
            if self.state.is_busy() {
                tracing::error!(error = %e, state = ?self.state, "Turn aborted mid-flight, resetting");
                self.state = ConvState::AwaitingInput;
            }
        }
        if self.cancel.is_cancelled() {
            self.cancel = CancellationToken::new();
        }
        result
    }

    async fn process_event(&mut self, event: Event) -> Result<TurnOutcome, RuntimeError> {
        let mut outcome = None;

        // Process events in a loop - no recursion
        let mut events_to_process = vec![event];

        while let Some(current_event) = events_to_process.pop() {
            // Pure state transition
            let result = transition(&self.state, &self.context, current_event)?;
            self.state = result.new_state;

            // Execute effects and collect generated events
            for effect in result.effects {
                match self.execute_effect(effect).await? {
                    EffectOutcome::Nothing => {}
                    EffectOutcome::Event(generated) => events_to_process.push(generated),
                    EffectOutcome::Finished(done) => outcome = Some(done),
                }
            }
        }

        outcome.ok_or(RuntimeError::NoOutcome)
    }

    /// Execute an effect and optionally return a generated event
    async fn execute_effect(&mut self, effect: Effect) -> Result<EffectOutcome, RuntimeError> {
        match effect {
            Effect::AppendMessage { message } => {
                self.conversation.append(message)?;
                Ok(EffectOutcome::Nothing)
            }

            Effect::RequestLlm => {
                let request = LlmRequest {
                    messages: self.conversation.messages().to_vec(),
                    tools: self.catalog.specs().to_vec(),
                    sampling: self.sampling,
                };
                tracing::debug!(
                    conv_id = %self.context.conversation_id,
                    messages = request.messages.len(),
                    "Requesting model response"
                );

                let event = tokio::select! {
                    biased;
                    () = self.cancel.cancelled() => {
                        tracing::info!("Model request cancelled");
                        Event::Cancel
                    }
                    result = self.llm_client.complete(&request) => match result {
                        Ok(response) => Event::LlmResponse {
                            message: response.message,
                            usage: response.usage,
                        },
                        Err(e) => Event::LlmError {
                            message: e.message,
                            kind: e.kind,
                        },
                    },
                };
                Ok(EffectOutcome::Event(event))
            }

            Effect::ExecuteTool { tool } => {
                self.publish(RuntimeEvent::ToolStarted {
                    name: tool.name().to_string(),
                    arguments: tool.request.arguments.to_json_string(),
                });

                let event = tokio::select! {
                    biased;
                    () = self.cancel.cancelled() => {
                        tracing::info!(tool = %tool.name(), "Tool call cancelled");
                        Event::Cancel
                    }
                    (message, success) = self.invoker.invoke_tracked(&tool) => {
                        self.publish(RuntimeEvent::ToolFinished {
                            name: tool.name().to_string(),
                            success,
                            preview: preview(&message.content),
                        });
                        Event::ToolComplete {
                            position: tool.position,
                            message,
                        }
                    }
                };
                Ok(EffectOutcome::Event(event))
            }

            Effect::NotifyToolsRequested { count } => {
                self.publish(RuntimeEvent::ToolsRequested { count });
                Ok(EffectOutcome::Nothing)
            }

            Effect::EmitResponse { text } => {
                self.publish(RuntimeEvent::Response { text: text.clone() });
                Ok(EffectOutcome::Finished(TurnOutcome::Response(text)))
            }

            Effect::ReportError { message } => {
                tracing::warn!(conv_id = %self.context.conversation_id, error = %message, "Turn failed");
                self.publish(RuntimeEvent::Error {
                    message: message.clone(),
                });
                Ok(EffectOutcome::Finished(TurnOutcome::Failed(message)))
            }

            Effect::NotifyCancelled => {
                self.publish(RuntimeEvent::Cancelled);
                Ok(EffectOutcome::Finished(TurnOutcome::Cancelled))
            }
        }
    }

    fn publish(&self, event: RuntimeEvent) {
        if let Some(tx) = &self.events {
            // No subscribers is fine
            let _ = tx.send(event);
        }
    }
}

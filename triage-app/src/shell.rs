//! The interactive consultation loop.

use std::io;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio_util::sync::CancellationToken;
use triage_core::validate::validate;
use triage_core::{Consultant, Consultation, Origin};
use triage_runtime::TriageHandle;

use crate::guidance::Guidance;
use crate::render;

const QUIT_WORDS: [&str; 4] = ["quit", "exit", "q", "stop"];

pub fn is_quit(line: &str) -> bool {
    let lowered = line.trim().to_lowercase();
    QUIT_WORDS.contains(&lowered.as_str())
}

/// Answer to "another consultation?"; `None` asks again.
pub fn parse_continue(answer: &str) -> Option<bool> {
    match answer.trim().to_lowercase().as_str() {
        "y" | "yes" => Some(true),
        "n" | "no" | "quit" | "exit" => Some(false),
        _ => None,
    }
}

pub struct LineReader<R> {
    lines: Lines<R>,
}

impl LineReader<BufReader<Stdin>> {
    pub fn stdin() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()))
    }
}

impl<R: AsyncBufRead + Unpin> LineReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
        }
    }

    /// Next line, or `None` at end of input or once `cancel` fires.
    pub async fn read(&mut self, cancel: &CancellationToken) -> io::Result<Option<String>> {
        tokio::select! {
            _ = cancel.cancelled() => Ok(None),
            line = self.lines.next_line() => line,
        }
    }
}

/// State carried across iterations of the loop.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LoopState {
    pub consultations: u32,
    pub fallbacks: u32,
    pub consecutive_failures: u32,
}

impl LoopState {
    /// Account for a finished consultation; returns advice when it fell back.
    pub fn record(&mut self, consultation: &Consultation) -> Option<Guidance> {
        self.consultations += 1;
        match &consultation.origin {
            Origin::Model { .. } => {
                self.consecutive_failures = 0;
                None
            }
            Origin::Fallback { reason } => {
                self.fallbacks += 1;
                self.consecutive_failures += 1;
                Some(Guidance::for_failure(
                    &reason.to_string(),
                    self.consecutive_failures,
                ))
            }
        }
    }
}

enum Step {
    Symptoms(triage_core::SymptomText),
    Leave,
}

async fn next_symptoms<R: AsyncBufRead + Unpin>(
    input: &mut LineReader<R>,
    cancel: &CancellationToken,
) -> io::Result<Step> {
    loop {
        render::symptom_prompt();
        let Some(line) = input.read(cancel).await? else {
            println!();
            return Ok(Step::Leave);
        };
        if is_quit(&line) {
            return Ok(Step::Leave);
        }
        match validate(&line) {
            Ok(symptoms) => return Ok(Step::Symptoms(symptoms)),
            Err(err) => {
                tracing::debug!(error = %err, "shell.invalid_input");
                render::validation_error(&err);
            }
        }
    }
}

async fn wants_another<R: AsyncBufRead + Unpin>(
    input: &mut LineReader<R>,
    cancel: &CancellationToken,
) -> io::Result<bool> {
    loop {
        render::continue_prompt();
        let Some(line) = input.read(cancel).await? else {
            println!();
            return Ok(false);
        };
        if let Some(answer) = parse_continue(&line) {
            return Ok(answer);
        }
    }
}

/// Run consultations until the user leaves, input ends, or the process is
/// interrupted outside a consultation.
pub async fn run<R: AsyncBufRead + Unpin>(
    consultant: &Consultant,
    handle: &TriageHandle,
    input: &mut LineReader<R>,
) -> io::Result<LoopState> {
    let root = handle.cancellation();
    let mut state = LoopState::default();

    loop {
        let symptoms = match next_symptoms(input, &root).await? {
            Step::Symptoms(symptoms) => symptoms,
            Step::Leave => break,
        };

        render::progress();
        let scope = handle.scope();
        let result = consultant.consult(&symptoms, scope.token()).await;
        drop(scope);

        match result {
            Ok(consultation) => {
                let advice = state.record(&consultation);
                println!("{}", render::card(&consultation));
                if let Some(advice) = advice {
                    print!("{}", render::guidance(&advice));
                }
            }
            Err(_) => {
                render::interrupted();
                if root.is_cancelled() {
                    break;
                }
                continue;
            }
        }

        if !wants_another(input, &root).await? {
            break;
        }
    }

    render::farewell();
    tracing::info!(
        consultations = state.consultations,
        fallbacks = state.fallbacks,
        "shell.exit"
    );
    Ok(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use triage_common::{GenerationOptions, Result as TriageResult, TriageError};
    use triage_core::{FallbackReason, NormalizationError, Recommendation, Requester, Urgency};
    use triage_llm::traits::{LlmClient, LlmResponse};
    use triage_runtime::TriageRuntime;

    struct FixedClient {
        reply: Result<&'static str, &'static str>,
    }

    #[async_trait]
    impl LlmClient for FixedClient {
        async fn generate(
            &self,
            _prompt: &str,
            _system_prompt: Option<&str>,
            _max_tokens: Option<u32>,
            _temperature: Option<f32>,
        ) -> TriageResult<LlmResponse> {
            match self.reply {
                Ok(text) => Ok(LlmResponse {
                    text: text.to_string(),
                    model: None,
                    tokens_used: None,
                    finish_reason: None,
                }),
                Err(msg) => Err(TriageError::Llm(msg.to_string())),
            }
        }

        fn model_name(&self) -> &str {
            "fixed"
        }
    }

    fn session(reply: Result<&'static str, &'static str>, script: &'static str) -> LoopState {
        let runtime = TriageRuntime::build("shell-test", Some(1)).unwrap();
        let handle = runtime.handle();
        let consultant = Consultant::new(
            Arc::new(FixedClient { reply }),
            Requester::default(),
            GenerationOptions::default(),
        );
        let state = runtime.block_on(async {
            let mut input = LineReader::new(script.as_bytes());
            run(&consultant, &handle, &mut input).await.unwrap()
        });
        runtime.shutdown(Duration::from_millis(10));
        state
    }

    #[test]
    fn quit_words_are_case_insensitive() {
        for word in ["quit", "EXIT", " q ", "Stop"] {
            assert!(is_quit(word), "{word}");
        }
        assert!(!is_quit("quite bad pain"));
    }

    #[test]
    fn continue_answers() {
        assert_eq!(parse_continue("Y"), Some(true));
        assert_eq!(parse_continue("no"), Some(false));
        assert_eq!(parse_continue("exit"), Some(false));
        assert_eq!(parse_continue("maybe"), None);
    }

    #[test]
    fn failure_counter_resets_on_success() {
        let fallback = Consultation {
            recommendation: Recommendation {
                specialist: "General Physician".into(),
                reasoning: "fallback".into(),
                urgency: Urgency::Medium,
                alternative: String::new(),
                additional_notes: String::new(),
            },
            origin: Origin::Fallback {
                reason: FallbackReason::Normalization(NormalizationError::UnparseableResponse),
            },
        };
        let mut state = LoopState::default();
        assert!(!state.record(&fallback).unwrap().escalate);
        assert!(!state.record(&fallback).unwrap().escalate);
        assert!(state.record(&fallback).unwrap().escalate);

        let success = Consultation {
            origin: Origin::Model {
                retries: vec![],
                recovered: false,
            },
            ..fallback.clone()
        };
        assert!(state.record(&success).is_none());
        assert_eq!(state.consecutive_failures, 0);
        assert!(!state.record(&fallback).unwrap().escalate);
        assert_eq!(state.consultations, 5);
        assert_eq!(state.fallbacks, 4);
    }

    #[test]
    fn invalid_input_reprompts_then_consults() {
        let state = session(
            Ok(r#"{"specialist":"ENT","reasoning":"ear ache","urgency":"Low"}"#),
            "hi\nmy left ear hurts\nmaybe\nn\n",
        );
        assert_eq!(state.consultations, 1);
        assert_eq!(state.fallbacks, 0);
    }

    #[test]
    fn end_of_input_leaves_cleanly() {
        let state = session(Ok("{}"), "");
        assert_eq!(state, LoopState::default());
    }

    #[test]
    fn bad_key_falls_back_and_continues() {
        let state = session(
            Err("invalid api key"),
            "sharp chest pain\ny\nmild rash on arm\nquit\n",
        );
        assert_eq!(state.consultations, 2);
        assert_eq!(state.consecutive_failures, 2);
    }
}

//! The investigation loop: think, judge, act, take notes, repeat.

use std::io::Write;

use tracing::{debug, info, warn};

use super::context::render_context;
use super::progress::Transcript;
use super::prompts::{
    noting_instruction, FINAL_REPORT_INSTRUCTION, REPORT_INSTRUCTION, SYSTEM_PROMPT,
    THINKING_INSTRUCTION, TOOL_SELECT_INSTRUCTION, VERDICT_QUESTION,
};
use super::seed::{build_seed, SeedMode};
use crate::config::ModelProfile;
use crate::error::{InvestigatorError, Result};
use crate::inference::{ChatMessage, RawToolCall, ToolResponse};
use crate::session::{Iteration, Session, SessionContext, SessionStatus};
use crate::tools::{definition, definitions, validate, ReportParams, ToolParams, Verdict};

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub max_iterations: usize,
    pub seed_mode: SeedMode,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            max_iterations: 10,
            seed_mode: SeedMode::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// A `resolved` or `review` verdict, with the report written for the user
    Concluded { verdict: Verdict, report: String },
    /// The iteration budget ran out without a verdict
    Exhausted,
}

enum Step {
    Concluded { verdict: Verdict, report: String },
    Continue(Iteration),
}

/// Runs one query to completion against a session context, writing the
/// transcript to `out`.
pub struct Investigation<'a, W: Write + Send> {
    ctx: &'a SessionContext,
    transcript: Transcript<W>,
}

impl<'a, W: Write + Send> Investigation<'a, W> {
    pub fn new(ctx: &'a SessionContext, out: W) -> Self {
        Self {
            ctx,
            transcript: Transcript::new(out),
        }
    }

    pub fn into_output(self) -> W {
        self.transcript.into_inner()
    }

    pub async fn run(&mut self, query: &str, options: &RunOptions) -> Result<(Session, Outcome)> {
        self.transcript.line(&format!("Query: {}", query))?;
        let mut session = Session::new(query);

        let seed = if options.max_iterations > 0 {
            build_seed(self.ctx, &mut self.transcript, query, options.seed_mode).await?
        } else {
            String::new()
        };

        for index in 0..options.max_iterations {
            let seed = (index == 0).then_some(seed.as_str());
            match self.iterate(query, session.latest(), index, seed).await? {
                Step::Concluded { verdict, report } => {
                    session.finish(SessionStatus::Concluded(verdict));
                    return Ok((session, Outcome::Concluded { verdict, report }));
                }
                Step::Continue(iteration) => session.push(iteration),
            }
        }

        warn!(
            max_iterations = options.max_iterations,
            "iteration budget exhausted without a verdict"
        );
        self.transcript.heading("END")?;
        session.finish(SessionStatus::Exhausted);
        Ok((session, Outcome::Exhausted))
    }

    async fn iterate(
        &mut self,
        query: &str,
        previous: &Iteration,
        index: usize,
        seed: Option<&str>,
    ) -> Result<Step> {
        let ctx = self.ctx;
        let profiles = &ctx.profiles;

        self.transcript.iteration(index)?;
        self.transcript.heading("THINKING")?;
        let mut messages = vec![
            ChatMessage::system(SYSTEM_PROMPT),
            ChatMessage::user(render_context(query, previous, seed)),
            ChatMessage::user(THINKING_INSTRUCTION),
        ];
        let thinking = stream_text(ctx, &mut self.transcript, &profiles.thinking, &messages).await?;
        messages.push(ChatMessage::assistant(thinking.clone()));

        self.transcript.heading("VERDICT")?;
        let mut judged = messages.clone();
        judged.push(ChatMessage::user(VERDICT_QUESTION));
        let verdict_text = stream_text(ctx, &mut self.transcript, &profiles.summarizing, &judged).await?;
        judged.push(ChatMessage::assistant(verdict_text));

        let mut report_request = judged.clone();
        report_request.push(ChatMessage::user(REPORT_INSTRUCTION));
        let response = ctx
            .inference
            .invoke_tools(
                &profiles.tool_calling,
                &report_request,
                &[definition::<ReportParams>()],
            )
            .await?;
        let verdict = expect_call::<ReportParams>(first_call(response, "verdict")?)?.reason;
        info!(iteration = index, %verdict, "verdict");

        if verdict != Verdict::Continue {
            self.transcript.line(&format!("Verdict: {}", verdict))?;
            self.transcript.heading("RESOLVED")?;
            judged.push(ChatMessage::user(FINAL_REPORT_INSTRUCTION));
            let report = stream_text(ctx, &mut self.transcript, &profiles.summarizing, &judged).await?;
            self.transcript.heading("END")?;
            return Ok(Step::Concluded { verdict, report });
        }

        self.transcript.heading("TOOL CALLING")?;
        let mut selection = messages.clone();
        selection.push(ChatMessage::user(TOOL_SELECT_INSTRUCTION));
        let response = ctx
            .inference
            .invoke_tools(&profiles.tool_calling, &selection, &definitions())
            .await?;
        let request = first_call(response, "tool selection")?;
        self.transcript
            .line(&format!("[tool_call] {}", serde_json::to_string(&request)?))?;
        let result = ctx.toolbox.call(&request).await?;
        self.transcript.line(&format!("[tool_result] {}", result))?;

        self.transcript.heading("SUMMARIZING")?;
        messages.push(ChatMessage::user(noting_instruction(&request)));
        let notes = stream_text(ctx, &mut self.transcript, &profiles.summarizing, &messages).await?;

        Ok(Step::Continue(Iteration {
            notes,
            thinking,
            tool_request: Some(request),
            tool_result: result,
        }))
    }
}

/// Stream a completion into the transcript; returns the trimmed text.
pub(crate) async fn stream_text<W: Write + Send>(
    ctx: &SessionContext,
    transcript: &mut Transcript<W>,
    profile: &ModelProfile,
    messages: &[ChatMessage],
) -> Result<String> {
    let text = ctx
        .inference
        .stream_chat(profile, messages, &mut |token: &str| transcript.token(token))
        .await?;
    transcript.end_stream()?;
    Ok(text.trim().to_string())
}

/// The first structured call of a response; the rest are dropped.
pub(crate) fn first_call(response: ToolResponse, stage: &str) -> Result<RawToolCall> {
    let ToolResponse { content, calls } = response;
    let surplus = calls.len().saturating_sub(1);
    let Some(first) = calls.into_iter().next() else {
        return Err(InvestigatorError::ToolNotInvoked {
            stage: stage.to_string(),
            content,
        });
    };
    if surplus > 0 {
        debug!(stage, dropped = surplus, "ignoring surplus tool calls");
    }
    Ok(first)
}

/// Validate a call that must target the single tool `T` offered.
pub(crate) fn expect_call<T: ToolParams>(call: RawToolCall) -> Result<T> {
    if call.name != T::NAME {
        return Err(InvestigatorError::UnknownTool(call.name));
    }
    validate(&call.arguments)
}

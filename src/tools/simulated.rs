//! Simulated backend.
//!
//! Stands in for the chat-completion API and the execution service when no
//! credentials are available. Responses are canned per tool name, token
//! counts are estimated at four characters per token, and an optional delay
//! imitates network latency. The delay races the cancellation token.

use super::{
    ExecutionConnector, ExecutionRequest, ExecutionResponse, Generation, GenerationRequest, TokenUsage,
    ToolConnector,
};
use crate::error::{ConductorError, Result};
use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Characters per estimated token.
const CHARS_PER_TOKEN: usize = 4;

/// Estimate tokens for a piece of text.
#[must_use]
pub fn estimate_tokens(text: &str) -> u64 {
    (text.len() / CHARS_PER_TOKEN) as u64
}

async fn simulate_latency(latency: Duration, cancel: &CancellationToken, operation: &str) -> Result<()> {
    if cancel.is_cancelled() {
        return Err(ConductorError::cancelled(operation));
    }
    if latency.is_zero() {
        return Ok(());
    }
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(ConductorError::cancelled(operation)),
        () = tokio::time::sleep(latency) => Ok(()),
    }
}

// =============================================================================
// Tool connector
// =============================================================================

/// Canned code generator.
#[derive(Debug, Clone)]
pub struct SimulatedToolConnector {
    name: String,
    latency: Duration,
}

impl SimulatedToolConnector {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            latency: Duration::ZERO,
        }
    }

    /// Set the artificial delay per call.
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    fn respond(&self, prompt: &str) -> String {
        let description = task_line(prompt);
        let ident = identifier(description);
        let code = match self.name.as_str() {
            "ui-specialist" => ui_specialist_code(&ident, description),
            "logic-specialist" => logic_specialist_code(&ident, description),
            "claude" => generalist_code(&ident, description),
            _ => minimal_code(&ident, description),
        };
        format!(
            "Here is an implementation for: {}\n\n```tsx\n{}```\n\nThe code above is self-contained.\n",
            description, code
        )
    }
}

#[async_trait]
impl ToolConnector for SimulatedToolConnector {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(&self, request: &GenerationRequest, cancel: &CancellationToken) -> Result<Generation> {
        simulate_latency(self.latency, cancel, &self.name).await?;
        let text = self.respond(&request.prompt);
        let usage = TokenUsage {
            input_tokens: estimate_tokens(&request.prompt),
            output_tokens: estimate_tokens(&text),
        };
        debug!(tool = %self.name, tokens = usage.total(), "Simulated generation");
        Ok(Generation {
            text,
            usage,
            model: format!("simulated-{}", self.name),
        })
    }
}

/// The `Task:` line of a prompt, or its first non-empty line.
fn task_line(prompt: &str) -> &str {
    prompt
        .lines()
        .find_map(|line| line.trim().strip_prefix("Task:"))
        .or_else(|| prompt.lines().find(|line| !line.trim().is_empty()))
        .map_or("task", str::trim)
}

/// PascalCase identifier from the first significant words.
fn identifier(description: &str) -> String {
    let ident: String = description
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|w| w.len() > 2)
        .take(3)
        .map(|w| {
            let mut chars = w.chars();
            chars.next().map_or_else(String::new, |first| {
                first.to_ascii_uppercase().to_string() + &chars.as_str().to_ascii_lowercase()
            })
        })
        .collect();
    if ident.is_empty() || ident.starts_with(|c: char| c.is_ascii_digit()) {
        format!("Generated{}", ident)
    } else {
        ident
    }
}

fn generalist_code(ident: &str, description: &str) -> String {
    format!(
        r#"import React, {{ useState }} from 'react';

/** {description} */
export interface {ident}Props {{
  onSubmit: (value: string) => Promise<void>;
  label?: string;
}}

export function {ident}({{ onSubmit, label = 'Value' }}: {ident}Props) {{
  const [value, setValue] = useState('');
  const [error, setError] = useState<string | null>(null);
  const [loading, setLoading] = useState(false);

  const validate = (input: string): string | null =>
    input.trim().length === 0 ? `${{label}} is required` : null;

  const handleSubmit = async (event: React.FormEvent) => {{
    event.preventDefault();
    const message = validate(value);
    if (message) {{
      setError(message);
      return;
    }}
    setLoading(true);
    try {{
      await onSubmit(value);
      setError(null);
    }} catch (err) {{
      setError(err instanceof Error ? err.message : 'Submission failed');
    }} finally {{
      setLoading(false);
    }}
  }};

  return (
    <form onSubmit={{handleSubmit}} aria-busy={{loading}} className="flex flex-col gap-2 md:flex-row">
      <label htmlFor="{ident}-input">{{label}}</label>
      <input
        id="{ident}-input"
        aria-invalid={{error !== null}}
        value={{value}}
        onChange={{(e) => setValue(e.target.value)}}
      />
      {{error && <p role="alert">{{error}}</p>}}
      <button type="submit" disabled={{loading}}>Submit</button>
    </form>
  );
}}
"#
    )
}

fn ui_specialist_code(ident: &str, description: &str) -> String {
    format!(
        r#"import React, {{ useMemo, useState }} from 'react';

// {description}
export function {ident}({{ items = [] }}: {{ items?: string[] }}) {{
  const [query, setQuery] = useState('');
  const visible = useMemo(
    () => items.filter((item) => item.toLowerCase().includes(query.toLowerCase())),
    [items, query],
  );

  return (
    <section aria-label="{ident}" className="grid grid-cols-1 gap-4 sm:grid-cols-2 lg:grid-cols-3">
      <input
        aria-label="Search"
        className="rounded border px-3 py-2 transition-colors focus:outline-none focus:ring"
        value={{query}}
        onChange={{(e) => setQuery(e.target.value)}}
      />
      {{visible.map((item) => (
        <article key={{item}} className="rounded-lg p-4 shadow hover:shadow-lg transition-shadow">
          {{item}}
        </article>
      ))}}
    </section>
  );
}}
"#
    )
}

fn logic_specialist_code(ident: &str, description: &str) -> String {
    format!(
        r#"/**
 * {description}
 */
export type Result<T> = {{ ok: true; value: T }} | {{ ok: false; error: string }};

export function validate{ident}(input: unknown): Result<string[]> {{
  if (!Array.isArray(input)) {{
    return {{ ok: false, error: 'input must be an array' }};
  }}
  const invalid = input.findIndex((item) => typeof item !== 'string');
  if (invalid !== -1) {{
    return {{ ok: false, error: `item ${{invalid}} is not a string` }};
  }}
  return {{ ok: true, value: input as string[] }};
}}

export function process{ident}(input: unknown): Result<string[]> {{
  const checked = validate{ident}(input);
  if (!checked.ok) {{
    return checked;
  }}
  const unique = Array.from(new Set(checked.value.map((item) => item.trim())));
  return {{ ok: true, value: unique.sort((a, b) => a.localeCompare(b)) }};
}}
"#
    )
}

fn minimal_code(ident: &str, description: &str) -> String {
    format!(
        r#"// {description}
export default function {ident}() {{
  return <div>{ident}</div>;
}}
"#
    )
}

// =============================================================================
// Execution connector
// =============================================================================

/// Execution stand-in that reports success without running anything.
#[derive(Debug, Clone, Default)]
pub struct SimulatedExecutionConnector {
    latency: Duration,
}

impl SimulatedExecutionConnector {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the artificial delay per call.
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }
}

#[async_trait]
impl ExecutionConnector for SimulatedExecutionConnector {
    fn name(&self) -> &str {
        "simulated"
    }

    async fn execute(&self, request: &ExecutionRequest, cancel: &CancellationToken) -> Result<ExecutionResponse> {
        simulate_latency(self.latency, cancel, "execute").await?;
        let lines = request.implementation.lines().count();
        debug!(task_id = %request.task_id, lines, "Simulated execution");
        Ok(ExecutionResponse {
            result: json!({
                "status": "success",
                "taskId": request.task_id,
                "linesExecuted": lines,
            }),
            metadata: json!({
                "executor": "simulated",
                "type": request.metadata.task_type,
                "complexity": request.metadata.complexity,
                "timeout": request.config.timeout,
            }),
        })
    }
}

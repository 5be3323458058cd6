//! Console conversation loop — reads lines from stdin, runs a turn per line,
//! prints the reply to stdout.
//!
//! Runs until the user says goodbye, stdin closes, or `shutdown` is
//! cancelled (Ctrl-C). Cancellation also aborts a turn that is waiting on
//! the provider.

use std::io::Write;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::chat::{ChatError, ChatSession};
use crate::error::AppError;

/// Why the loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    Goodbye,
    EndOfInput,
    Shutdown,
}

/// Drive `session` from the process's stdin/stdout.
pub async fn run(session: &mut ChatSession, shutdown: CancellationToken) -> Result<ExitReason, AppError> {
    println!("─────────────────────────────────");
    println!(" Chat console  (say \"goodbye\" or Ctrl-C to quit)");
    println!("─────────────────────────────────");

    let stdin = BufReader::new(tokio::io::stdin());
    let mut stdout = std::io::stdout();
    drive(session, stdin, &mut stdout, &shutdown).await
}

/// Loop over `input` lines, writing replies to `out`.
pub async fn drive<R, W>(
    session: &mut ChatSession,
    input: R,
    out: &mut W,
    shutdown: &CancellationToken,
) -> Result<ExitReason, AppError>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let mut lines = input.lines();

    loop {
        write!(out, "> ")?;
        out.flush()?;

        let line = tokio::select! {
            biased;

            _ = shutdown.cancelled() => {
                info!("shutdown signal received, closing console");
                return Ok(ExitReason::Shutdown);
            }

            line = lines.next_line() => line?,
        };

        let Some(line) = line else {
            info!("stdin closed");
            writeln!(out)?;
            return Ok(ExitReason::EndOfInput);
        };

        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        debug!(input_len = line.len(), "console received line");

        match session.handle_turn(line, shutdown).await {
            Ok(outcome) => {
                writeln!(out, "{}", outcome.response.trim())?;
                if outcome.termination_requested {
                    info!("conversation ended by user");
                    return Ok(ExitReason::Goodbye);
                }
            }
            Err(ChatError::Cancelled) => return Ok(ExitReason::Shutdown),
            Err(e) => {
                warn!("turn failed: {e}");
                writeln!(out, "[error] {e}")?;
            }
        }
    }
}

//! Poll-based waits and assertions over screen content.
//!
//! Waits poll [`SurfaceHandle::screen`](crate::SurfaceHandle::screen) at a
//! fixed cadence and report an outcome rather than erroring on expiry: a
//! deadline that passes without the condition holding is a `satisfied:
//! false` outcome, while `Err` is reserved for the session dying underneath
//! the wait. The `expect_*` variants convert an unsatisfied outcome into an
//! assertion failure that carries the last observed content.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::time::{Duration, Instant};

use regex::Regex;

use crate::error::Error;
use crate::screen::{Screen, ScreenMode};
use crate::surface::{Surface, SurfaceHandle};

/// Cadence of condition checks during a wait.
pub(crate) const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Shell prompt terminators recognized by [`wait_for_prompt`]: common shells
/// end their prompt line with one of these characters.
pub const DEFAULT_PROMPT_PATTERN: &str = r"[$#>%➤❯λ»›]\s*$";

/// Limits applied to screen content embedded in assertion failures.
const FAILURE_SCREEN_MAX_LINES: usize = 80;
const FAILURE_SCREEN_MAX_CHARS: usize = 8000;

/// The result of a completed wait.
#[derive(Debug, Clone)]
pub struct WaitOutcome {
    /// Whether the condition held before the deadline.
    pub satisfied: bool,
    /// Wall time spent polling.
    pub elapsed: Duration,
    /// The last screen observed, if at least one poll succeeded.
    pub last_snapshot: Option<Screen>,
}

/// Poll the viewport until `condition` holds or `timeout` passes. One poll
/// always runs even with a zero timeout, so an already-true condition
/// reports satisfied immediately.
pub(crate) async fn wait_until<F>(
    handle: &SurfaceHandle,
    timeout: Duration,
    mut condition: F,
) -> Result<WaitOutcome, Error>
where
    F: FnMut(&Screen) -> bool,
{
    let start = Instant::now();
    let deadline = start + timeout;
    let mut last_snapshot = None;

    loop {
        let screen = handle.screen(ScreenMode::Viewport).await?;
        let satisfied = condition(&screen);
        last_snapshot = Some(screen);
        if satisfied {
            return Ok(WaitOutcome {
                satisfied: true,
                elapsed: start.elapsed(),
                last_snapshot,
            });
        }
        if Instant::now() >= deadline {
            return Ok(WaitOutcome {
                satisfied: false,
                elapsed: start.elapsed(),
                last_snapshot,
            });
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

pub(crate) async fn wait_for_text(
    handle: &SurfaceHandle,
    pattern: &str,
    timeout: Duration,
) -> Result<WaitOutcome, Error> {
    wait_until(handle, timeout, |screen| screen.contains(pattern)).await
}

pub(crate) async fn wait_for_regex(
    handle: &SurfaceHandle,
    pattern: &str,
    timeout: Duration,
) -> Result<WaitOutcome, Error> {
    let regex = compile(pattern)?;
    wait_until(handle, timeout, |screen| regex.is_match(&screen.plain_text)).await
}

/// Wait until the last non-empty line ends with a prompt terminator.
pub(crate) async fn wait_for_prompt(
    handle: &SurfaceHandle,
    prompt_pattern: &str,
    timeout: Duration,
) -> Result<WaitOutcome, Error> {
    let regex = compile(prompt_pattern)?;
    wait_until(handle, timeout, |screen| {
        prompt_line(screen).is_some_and(|line| regex.is_match(line))
    })
    .await
}

/// The line a prompt would be on: the last non-empty line, with trailing
/// replacement characters from partial UTF-8 reads trimmed away.
fn prompt_line(screen: &Screen) -> Option<&str> {
    screen
        .plain_text
        .lines()
        .rev()
        .map(|line| line.trim_end_matches(['\u{fffd}', ' ']))
        .find(|line| !line.is_empty())
}

/// Wait until the content fingerprint has been unchanged for a continuous
/// `stable` window. Any change resets the window.
pub(crate) async fn wait_for_idle(
    handle: &SurfaceHandle,
    stable: Duration,
    timeout: Duration,
) -> Result<WaitOutcome, Error> {
    let mut last_fingerprint: Option<u64> = None;
    let mut stable_since = Instant::now();

    wait_until(handle, timeout, move |screen| {
        let fingerprint = fingerprint(&screen.plain_text);
        if last_fingerprint != Some(fingerprint) {
            last_fingerprint = Some(fingerprint);
            stable_since = Instant::now();
            return false;
        }
        stable_since.elapsed() >= stable
    })
    .await
}

fn fingerprint(text: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    text.hash(&mut hasher);
    hasher.finish()
}

/// Poll this surface's metadata until `predicate` holds. Returns the last
/// observed metadata alongside the verdict; a surface that disappears
/// mid-poll propagates as `SurfaceNotFound`.
async fn wait_for_surface<F>(
    handle: &SurfaceHandle,
    timeout: Duration,
    mut predicate: F,
) -> Result<(bool, Surface), Error>
where
    F: FnMut(&Surface) -> bool,
{
    let deadline = Instant::now() + timeout;
    loop {
        let surface = handle.fetch_surface().await?;
        if predicate(&surface) {
            return Ok((true, surface));
        }
        if Instant::now() >= deadline {
            return Ok((false, surface));
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

/// Wait for `text`, failing with an assertion error carrying the last
/// observed screen when the deadline passes first.
pub(crate) async fn expect_text(
    handle: &SurfaceHandle,
    text: &str,
    timeout: Duration,
) -> Result<WaitOutcome, Error> {
    let outcome = wait_for_text(handle, text, timeout).await?;
    if outcome.satisfied {
        return Ok(outcome);
    }
    Err(assertion_failure(
        format!("expected terminal to contain {text:?} within {timeout:?}"),
        &outcome,
    ))
}

/// Assert `text` stays absent for the whole window. The first observation
/// fails immediately; success requires polling through the full window.
pub(crate) async fn expect_no_text(
    handle: &SurfaceHandle,
    text: &str,
    timeout: Duration,
) -> Result<WaitOutcome, Error> {
    let outcome = wait_for_text(handle, text, timeout).await?;
    if outcome.satisfied {
        return Err(assertion_failure(
            format!("expected terminal to not contain {text:?}"),
            &outcome,
        ));
    }
    // Unsatisfied means the text never showed up, which is the pass.
    Ok(WaitOutcome {
        satisfied: true,
        ..outcome
    })
}

/// Wait for a regex match, escalating an unsatisfied outcome like
/// [`expect_text`].
pub(crate) async fn expect_match(
    handle: &SurfaceHandle,
    pattern: &str,
    timeout: Duration,
) -> Result<WaitOutcome, Error> {
    let outcome = wait_for_regex(handle, pattern, timeout).await?;
    if outcome.satisfied {
        return Ok(outcome);
    }
    Err(assertion_failure(
        format!("expected terminal to match pattern {pattern:?} within {timeout:?}"),
        &outcome,
    ))
}

/// Wait for a visible shell prompt, escalating an unsatisfied outcome.
pub(crate) async fn expect_prompt(
    handle: &SurfaceHandle,
    timeout: Duration,
) -> Result<WaitOutcome, Error> {
    let outcome = wait_for_prompt(handle, DEFAULT_PROMPT_PATTERN, timeout).await?;
    if outcome.satisfied {
        return Ok(outcome);
    }
    Err(assertion_failure(
        format!("expected a shell prompt to be visible within {timeout:?}"),
        &outcome,
    ))
}

/// Assert the surface title contains `title`, polling refreshed metadata.
pub(crate) async fn expect_title(
    handle: &SurfaceHandle,
    title: &str,
    timeout: Duration,
) -> Result<(), Error> {
    let (satisfied, last) =
        wait_for_surface(handle, timeout, |s| s.title.contains(title)).await?;
    if satisfied {
        return Ok(());
    }
    Err(Error::AssertionFailure {
        message: format!("expected surface title to contain {title:?} within {timeout:?}"),
        screen: format!("title: {actual:?}", actual = last.title),
    })
}

/// Assert the surface working directory contains `path`.
pub(crate) async fn expect_pwd(
    handle: &SurfaceHandle,
    path: &str,
    timeout: Duration,
) -> Result<(), Error> {
    let (satisfied, last) = wait_for_surface(handle, timeout, |s| s.pwd.contains(path)).await?;
    if satisfied {
        return Ok(());
    }
    Err(Error::AssertionFailure {
        message: format!("expected surface pwd to contain {path:?} within {timeout:?}"),
        screen: format!("pwd: {actual:?}", actual = last.pwd),
    })
}

/// Assert this surface holds focus.
pub(crate) async fn expect_focused(
    handle: &SurfaceHandle,
    timeout: Duration,
) -> Result<(), Error> {
    let (satisfied, _) = wait_for_surface(handle, timeout, |s| s.focused).await?;
    if satisfied {
        return Ok(());
    }
    Err(Error::AssertionFailure {
        message: format!("expected surface to be focused within {timeout:?}"),
        screen: "focused: false".to_string(),
    })
}

fn assertion_failure(message: String, outcome: &WaitOutcome) -> Error {
    let screen = outcome
        .last_snapshot
        .as_ref()
        .map(|s| truncate_screen(&s.plain_text))
        .unwrap_or_else(|| "<no screen observed>".to_string());
    Error::AssertionFailure { message, screen }
}

/// Cap the content quoted in a failure so a huge scrollback does not bury
/// the message. Keeps the tail: the most recent output is what explains a
/// failure.
fn truncate_screen(text: &str) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let mut out = if lines.len() > FAILURE_SCREEN_MAX_LINES {
        let omitted = lines.len() - FAILURE_SCREEN_MAX_LINES;
        let kept = &lines[omitted..];
        format!("… ({omitted} lines truncated) …\n{}", kept.join("\n"))
    } else {
        lines.join("\n")
    };

    if out.len() > FAILURE_SCREEN_MAX_CHARS {
        let mut start = out.len() - FAILURE_SCREEN_MAX_CHARS;
        while !out.is_char_boundary(start) {
            start += 1;
        }
        out = format!("… (truncated) …\n{}", &out[start..]);
    }
    out
}

fn compile(pattern: &str) -> Result<Regex, Error> {
    Regex::new(pattern).map_err(|err| Error::InvalidArgument(format!("invalid pattern: {err}")))
}

//! Terminal surface for [`ChatView`].
//!
//! Every revision of the view triggers a full redraw. Input is line based:
//! a plain line becomes the draft and is submitted at once, an empty line
//! resubmits the current draft, and `/`-commands drive editing and auth.

use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::auth::{AuthProvider, AuthUser, SessionAuth};
use crate::view::{ChatView, RenderedView, SubmitOutcome};

const CLEAR_SCREEN: &str = "\x1b[2J\x1b[H";
const RULE: &str = "----------------------------------------";

pub const HELP: &str = "commands: /edit N, /cancel, /user UID, /logout, /quit";

// =============================================================================
// COMMANDS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Replace the draft and submit. Empty text resubmits the current draft.
    Say(String),
    /// Start editing the N-th (1-based) history entry.
    Edit(usize),
    Cancel,
    User(String),
    Logout,
    Help,
    Quit,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("unknown command: {0}")]
    Unknown(String),
    #[error("usage: {0}")]
    Usage(&'static str),
}

/// Parse one input line.
///
/// # Errors
///
/// Returns [`CommandError`] for unknown `/`-commands or missing arguments.
pub fn parse_command(line: &str) -> Result<Command, CommandError> {
    let line = line.trim_end_matches(['\r', '\n']);
    let Some(rest) = line.strip_prefix('/') else {
        return Ok(Command::Say(line.to_owned()));
    };

    let mut parts = rest.split_whitespace();
    let name = parts.next().unwrap_or_default();
    let arg = parts.next();
    match name {
        "edit" => arg
            .and_then(|n| n.parse::<usize>().ok())
            .filter(|n| *n > 0)
            .map(Command::Edit)
            .ok_or(CommandError::Usage("/edit N (1-based message number)")),
        "cancel" => Ok(Command::Cancel),
        "user" => arg
            .map(|uid| Command::User(uid.to_owned()))
            .ok_or(CommandError::Usage("/user UID")),
        "logout" => Ok(Command::Logout),
        "help" => Ok(Command::Help),
        "quit" | "exit" => Ok(Command::Quit),
        other => Err(CommandError::Unknown(format!("/{other}"))),
    }
}

// =============================================================================
// RENDERING
// =============================================================================

/// Lay out one frame of the view as plain text. The latest notice, if any,
/// is kept at the bottom so a redraw does not wipe it.
#[must_use]
pub fn render_screen(view: &RenderedView, user: Option<&AuthUser>, notice: Option<&str>) -> String {
    let mut out = String::new();
    match user {
        Some(u) => {
            let name = u.display_name.as_deref().unwrap_or(&u.uid);
            out.push_str(&format!("admin chat: {name}\n"));
        }
        None => out.push_str("admin chat: signed out\n"),
    }
    out.push_str(RULE);
    out.push('\n');

    for (i, m) in view.history.iter().enumerate() {
        let when = m.created_at.as_deref().unwrap_or("sending...");
        let marker = if m.editing { " (editing)" } else { "" };
        out.push_str(&format!("{:>3}. [{}] {when}{marker}\n", i + 1, m.role));
        for line in m.content.lines() {
            out.push_str(&format!("     {line}\n"));
        }
    }

    out.push_str(RULE);
    out.push('\n');
    out.push_str(&format!("> {}\n", view.prompt));
    if view.submit_disabled {
        out.push_str(&format!("({})\n", view.button_label));
    } else {
        out.push_str(&format!("[{}]\n", view.button_label));
    }
    if let Some(text) = notice {
        out.push_str(&format!("! {text}\n"));
    }
    out
}

/// Output handle plus the notice that every frame repeats until the next
/// input line.
struct Screen<W> {
    out: Arc<Mutex<W>>,
    notice: Mutex<Option<String>>,
}

impl<W: Write> Screen<W> {
    fn new(out: Arc<Mutex<W>>) -> Self {
        Self { out, notice: Mutex::new(None) }
    }

    fn set_notice(&self, text: Option<String>) {
        *self.notice.lock().unwrap_or_else(std::sync::PoisonError::into_inner) = text;
    }

    /// The notice is read under the output lock, so the last frame written
    /// always carries the latest notice.
    fn draw(&self, view: &ChatView, auth: &SessionAuth) -> io::Result<()> {
        let mut out = self.out.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let notice = self
            .notice
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone();
        let screen = render_screen(&view.render(), auth.current_user().as_ref(), notice.as_deref());
        write!(out, "{CLEAR_SCREEN}{screen}")?;
        out.flush()
    }

    fn notice(&self, view: &ChatView, auth: &SessionAuth, text: String) -> io::Result<()> {
        self.set_notice(Some(text));
        self.draw(view, auth)
    }
}

fn spawn_redraw<W>(view: Arc<ChatView>, auth: Arc<SessionAuth>, screen: Arc<Screen<W>>) -> JoinHandle<()>
where
    W: Write + Send + 'static,
{
    let mut changes = view.changes();
    tokio::spawn(async move {
        loop {
            let _ = changes.borrow_and_update();
            if let Err(e) = screen.draw(&view, &auth) {
                debug!(error = %e, "console: redraw failed");
                return;
            }
            if changes.changed().await.is_err() {
                return;
            }
        }
    })
}

// =============================================================================
// LOOP
// =============================================================================

/// Mount the view, redraw on every change, and process input lines until
/// `/quit` or end of input. The view is unmounted on return.
///
/// # Errors
///
/// Returns an error if reading input or writing a notice fails.
pub async fn run<R, W>(view: Arc<ChatView>, auth: Arc<SessionAuth>, input: R, out: Arc<Mutex<W>>) -> io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: Write + Send + 'static,
{
    let screen = Arc::new(Screen::new(out));
    view.mount();
    let redraw = spawn_redraw(view.clone(), auth.clone(), screen.clone());

    let result = read_loop(&view, &auth, input, &screen).await;

    view.unmount();
    redraw.abort();
    result
}

async fn read_loop<R, W>(view: &ChatView, auth: &SessionAuth, input: R, screen: &Screen<W>) -> io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let mut lines = input.lines();
    while let Some(line) = lines.next_line().await? {
        screen.set_notice(None);
        let command = match parse_command(&line) {
            Ok(Command::Quit) => break,
            Ok(command) => command,
            Err(e) => {
                screen.notice(view, auth, e.to_string())?;
                continue;
            }
        };
        if let Some(text) = apply(view, auth, command).await {
            screen.notice(view, auth, text)?;
        }
    }
    Ok(())
}

/// Execute one command; returns a notice for the user, if any.
async fn apply(view: &ChatView, auth: &SessionAuth, command: Command) -> Option<String> {
    match command {
        Command::Say(text) => {
            if !text.is_empty() {
                view.set_prompt(text);
            }
            match view.submit().await {
                SubmitOutcome::Completed => None,
                SubmitOutcome::Skipped if auth.current_user().is_none() => {
                    Some("not signed in; use /user UID".to_owned())
                }
                SubmitOutcome::Skipped => None,
                SubmitOutcome::Failed => Some("submit failed; draft kept, press enter to retry".to_owned()),
            }
        }
        Command::Edit(n) => {
            let rendered = view.render();
            let Some(entry) = n.checked_sub(1).and_then(|i| rendered.history.get(i)) else {
                return Some(format!("no message {n}"));
            };
            match entry.id.as_deref() {
                Some(id) if entry.editable && view.begin_edit(id) => None,
                _ => Some(format!("message {n} cannot be edited")),
            }
        }
        Command::Cancel => {
            view.cancel_edit();
            None
        }
        Command::User(uid) => {
            auth.sign_in(AuthUser::new(uid));
            None
        }
        Command::Logout => {
            auth.sign_out();
            None
        }
        Command::Help => Some(HELP.to_owned()),
        Command::Quit => None,
    }
}

#[cfg(test)]
#[path = "console_test.rs"]
mod tests;

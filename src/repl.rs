//! Line-oriented terminal front end
//!
//! Plain lines are appended to the draft and submitted. Lines starting with
//! `/` are commands.

use crate::api::Role;
use crate::controller::{ControllerError, SendOutcome};
use crate::format::{local_clock_time, relative_time, truncate};
use crate::mention::ToolMode;
use crate::runtime::{DraftEdit, MessageView, RuntimeError, RuntimeHandle, ViewSnapshot, ViewUpdate};
use crate::tools::ToolRegistry;
use chrono::Utc;
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;

const HELP: &str = "\
Commands:
  /new               start a new session
  /sessions          list sessions
  /select N          switch to session N
  /delete N          delete session N
  /refresh           reload the session list
  /clear             clear the current conversation
  /mode auto|none|manual
  /tool ID           mention a tool in the draft
  /untool ID         remove a tool from the draft
  /group LABEL       mention every tool of a group
  /tools             list tools and groups
  /quit";

#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    Message(String),
    New,
    Sessions,
    Select(usize),
    Delete(usize),
    Refresh,
    Clear,
    Mode(ToolMode),
    Tool(String),
    Untool(String),
    Group(String),
    Tools,
    Help,
    Quit,
}

impl Input {
    /// `Ok(None)` for a blank line
    pub fn parse(line: &str) -> Result<Option<Self>, String> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }
        let Some(command) = line.strip_prefix('/') else {
            return Ok(Some(Input::Message(line.to_string())));
        };

        let (name, arg) = match command.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, arg.trim()),
            None => (command, ""),
        };
        let required = |what: &str| {
            if arg.is_empty() {
                Err(format!("/{name} needs {what}"))
            } else {
                Ok(arg.to_string())
            }
        };
        let index = || {
            arg.parse::<usize>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| format!("/{name} needs a session number"))
        };

        let input = match name {
            "new" => Input::New,
            "sessions" => Input::Sessions,
            "select" => Input::Select(index()?),
            "delete" => Input::Delete(index()?),
            "refresh" => Input::Refresh,
            "clear" => Input::Clear,
            "mode" => Input::Mode(required("a mode")?.parse()?),
            "tool" => Input::Tool(required("a tool identifier")?),
            "untool" => Input::Untool(required("a tool identifier")?),
            "group" => Input::Group(required("a group label")?),
            "tools" => Input::Tools,
            "help" => Input::Help,
            "quit" | "exit" => Input::Quit,
            other => return Err(format!("Unknown command /{other}, try /help")),
        };
        Ok(Some(input))
    }
}

/// Read stdin until EOF or `/quit`
pub async fn run(handle: RuntimeHandle, registry: &ToolRegistry) -> Result<(), RuntimeError> {
    let snapshot = handle.snapshot().await?;
    print_conversation(&snapshot);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        prompt(&*handle.snapshot().await?);
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                tracing::error!(error = %e, "Failed to read input");
                break;
            }
        };

        let input = match Input::parse(&line) {
            Ok(Some(input)) => input,
            Ok(None) => continue,
            Err(message) => {
                println!("{message}");
                continue;
            }
        };
        if input == Input::Quit {
            break;
        }
        if let Err(e) = execute(&handle, registry, input).await {
            if matches!(e, RuntimeError::Stopped) {
                return Err(e);
            }
            println!("! {e}");
        }
    }
    Ok(())
}

async fn execute(
    handle: &RuntimeHandle,
    registry: &ToolRegistry,
    input: Input,
) -> Result<(), RuntimeError> {
    match input {
        Input::Message(text) => {
            let mut draft = text;
            draft.insert(0, ' ');
            handle.edit_draft(DraftEdit::Append(draft)).await?;
            send_draft(handle).await?;
        }
        Input::New => {
            let session = handle.create_session().await?;
            println!("Started session {}", session.session_id);
        }
        Input::Sessions => print_sessions(&*handle.snapshot().await?),
        Input::Select(n) => {
            let id = session_at(handle, n).await?;
            handle.select_session(&id).await?;
            print_conversation(&*handle.snapshot().await?);
        }
        Input::Delete(n) => {
            let id = session_at(handle, n).await?;
            handle.delete_session(&id).await?;
            println!("Deleted session {id}");
            print_conversation(&*handle.snapshot().await?);
        }
        Input::Refresh => {
            handle.refresh_sessions().await?;
            print_sessions(&*handle.snapshot().await?);
        }
        Input::Clear => {
            handle.clear_history().await?;
            println!("Conversation cleared");
        }
        Input::Mode(mode) => handle.edit_draft(DraftEdit::SetMode(mode)).await?,
        Input::Tool(id) => handle.edit_draft(DraftEdit::SelectTool(id)).await?,
        Input::Untool(id) => handle.edit_draft(DraftEdit::RemoveTool(id)).await?,
        Input::Group(label) => handle.edit_draft(DraftEdit::ApplyGroup(label)).await?,
        Input::Tools => print_tools(registry),
        Input::Help => println!("{HELP}"),
        Input::Quit => {}
    }
    Ok(())
}

/// Submit the draft, echoing streamed text as it arrives
async fn send_draft(handle: &RuntimeHandle) -> Result<(), RuntimeError> {
    let mut updates = handle.subscribe();
    let send = handle.submit_draft();
    tokio::pin!(send);

    let mut streamed = 0;
    let mut subscribed = true;
    let result = loop {
        tokio::select! {
            biased;
            update = updates.recv(), if subscribed => match update {
                Ok(update) => echo_partial(&update, &mut streamed),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "Terminal fell behind on stream updates");
                }
                Err(broadcast::error::RecvError::Closed) => subscribed = false,
            },
            result = &mut send => break result,
        }
    };
    while let Ok(update) = updates.try_recv() {
        echo_partial(&update, &mut streamed);
    }

    let outcome = result?;
    if matches!(outcome, SendOutcome::Skipped) {
        return Ok(());
    }
    if streamed > 0 {
        println!();
    }
    let snapshot = handle.snapshot().await?;
    if let Some(reply) = snapshot.messages.last() {
        match outcome {
            SendOutcome::Delivered if streamed > 0 => print_badges(reply),
            _ => print_message(reply),
        }
    }
    Ok(())
}

fn echo_partial(update: &ViewUpdate, streamed: &mut usize) {
    let ViewUpdate::Partial { text } = update else {
        return;
    };
    if let Some(delta) = text.get(*streamed..) {
        if *streamed == 0 {
            print!("assistant: ");
        }
        print!("{delta}");
        let _ = std::io::stdout().flush();
        *streamed = text.len();
    }
}

async fn session_at(handle: &RuntimeHandle, n: usize) -> Result<String, RuntimeError> {
    let snapshot = handle.snapshot().await?;
    match snapshot.sessions.get(n - 1) {
        Some(session) => Ok(session.session_id.clone()),
        None => Err(ControllerError::UnknownSession(format!("#{n}")).into()),
    }
}

fn prompt(snapshot: &ViewSnapshot) {
    let composer = &snapshot.composer;
    let mut label = composer.mode.to_string();
    if !composer.active_tools.is_empty() {
        label = format!("{label} {}", composer.active_tools.join(","));
    }
    if composer.text.is_empty() {
        print!("[{label}]> ");
    } else {
        print!("[{label}] {}> ", composer.text.trim_end());
    }
    let _ = std::io::stdout().flush();
}

fn print_conversation(snapshot: &ViewSnapshot) {
    match snapshot.active_session_id.as_deref() {
        Some(id) => println!("-- session {id} --"),
        None => println!("-- no active session (service unavailable?) --"),
    }
    for message in &snapshot.messages {
        print_message(message);
    }
}

fn print_message(message: &MessageView) {
    let role = match message.role {
        Role::User => "you",
        Role::Assistant => "assistant",
        Role::System => "system",
        Role::Tool => "tool",
    };
    println!(
        "{role} ({}): {}",
        local_clock_time(&message.timestamp),
        message.content
    );
    print_badges(message);
}

fn print_badges(message: &MessageView) {
    if !message.tool_badges.is_empty() {
        println!("  [tools: {}]", message.tool_badges.join(", "));
    }
}

fn print_sessions(snapshot: &ViewSnapshot) {
    if snapshot.sessions.is_empty() {
        println!("No sessions");
        return;
    }
    let now = Utc::now();
    for (index, session) in snapshot.sessions.iter().enumerate() {
        let marker = if snapshot.active_session_id.as_deref() == Some(session.session_id.as_str()) {
            '*'
        } else {
            ' '
        };
        println!(
            "{marker}{:>3}. {}  {} msgs  {}  {}",
            index + 1,
            truncate(&session.session_id, 12),
            session.message_count,
            session.model_name,
            relative_time(&session.created_at, &now)
        );
    }
}

fn print_tools(registry: &ToolRegistry) {
    for tool in registry.descriptors() {
        println!(
            "  {:<22} @{:<12} {}",
            tool.identifier,
            tool.display_name,
            truncate(&tool.description, 60)
        );
    }
    println!("Groups:");
    for group in registry.groups() {
        println!("  {:<20} {}", group.label, group.tools.join(", "));
    }
}

use crate::commands::{Call, Command, Schema, Signature, convert, listing};
use crate::error::CommandError;
use crate::exec::Context;

pub struct Cls;

impl Command for Cls {
    fn name(&self) -> &str {
        "cls"
    }

    fn description(&self) -> &str {
        "Clear the screen."
    }

    fn execute(&self, ctx: &Context, _call: &Call<'_>) -> Result<(), CommandError> {
        ctx.output().clear_screen()?;
        Ok(())
    }
}

pub struct Exit;

impl Command for Exit {
    fn name(&self) -> &str {
        "exit"
    }

    fn description(&self) -> &str {
        "End the session."
    }

    fn signature(&self) -> Signature {
        Signature::new().root(
            Schema::root().flag("hard", "Cancel whatever is still running instead of finishing the line."),
        )
    }

    fn execute(&self, ctx: &Context, call: &Call<'_>) -> Result<(), CommandError> {
        ctx.terminate_session(call.options.is_set("hard"));
        Ok(())
    }
}

pub struct Help;

impl Command for Help {
    fn name(&self) -> &str {
        "help"
    }

    fn description(&self) -> &str {
        "List commands, or describe one."
    }

    fn signature(&self) -> Signature {
        Signature::new().root(Schema::root().optional(
            "command",
            "Command to describe.",
            convert::text(),
        ))
    }

    fn execute(&self, ctx: &Context, call: &Call<'_>) -> Result<(), CommandError> {
        let text = match call.arguments.text("command") {
            Some(name) => ctx.registry().resolve(name)?.help(),
            None => format!("Commands:\n{}", listing(ctx.registry().iter())),
        };
        ctx.output().write_line(&text)?;
        Ok(())
    }
}

pub struct History;

impl Command for History {
    fn name(&self) -> &str {
        "history"
    }

    fn description(&self) -> &str {
        "Show the lines entered in this session."
    }

    fn execute(&self, ctx: &Context, _call: &Call<'_>) -> Result<(), CommandError> {
        for (i, line) in ctx.history().iter().enumerate() {
            ctx.output().write_line(&format!("{:>4}  {line}", i + 1))?;
        }
        Ok(())
    }
}

/// Lists the host's live sessions, marking the caller's own.
pub struct SessionList;

impl Command for SessionList {
    fn name(&self) -> &str {
        "session"
    }

    fn description(&self) -> &str {
        "List open sessions."
    }

    fn execute(&self, ctx: &Context, _call: &Call<'_>) -> Result<(), CommandError> {
        let sessions = ctx.sessions().list();
        if sessions.is_empty() {
            ctx.output()
                .write_line(&format!("Session ID: {}", ctx.session_id()))?;
            return Ok(());
        }
        for session in sessions {
            let marker = if session.id() == ctx.session_id() { '*' } else { ' ' };
            let size = match session.window() {
                (Some(w), Some(h)) => format!("{w}x{h}"),
                _ => "-".to_string(),
            };
            let kind = match session.terminal_type() {
                "" => "-",
                other => other,
            };
            ctx.output().write_line(&format!(
                "{marker}{:>4}  {:<8}  {kind}  {size}",
                session.id(),
                session.state().as_str(),
            ))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::super::harness::{run, runtime, runtime_with, screen};
    use crate::session::SessionControl;

    #[test]
    fn cls_clears_without_trailing_line() {
        assert_eq!(screen("cls"), "[cls]");
    }

    #[test]
    fn piped_text_discarded_by_cls() {
        assert_eq!(screen("echo hi | cls"), "[cls]");
    }

    #[test]
    fn cls_into_pipe_is_a_line_break() {
        assert_eq!(screen("cls | reverse"), "\n\n");
        assert_eq!(screen("echo ab | passthrough | cls | reverse"), "\n\n");
    }

    #[test]
    fn exit_is_soft_by_default() {
        let session = Arc::new(SessionControl::detached());
        let (runtime, _) = runtime_with(session.clone());
        let report = run(&runtime, "exit");
        assert!(report.succeeded());
        assert!(session.end_requested());
        assert!(!session.cancellation().is_cancelled());
    }

    #[test]
    fn exit_hard_cancels_silently() {
        let session = Arc::new(SessionControl::detached());
        let (runtime, screen) = runtime_with(session.clone());
        let report = run(&runtime, "exit -hard");
        assert!(session.cancellation().is_cancelled());
        assert!(report.errors.is_empty());
        assert!(!screen.lock().contains("cancelled"));
    }

    #[test]
    fn help_lists_commands() {
        let out = screen("help");
        assert!(out.starts_with("Commands:\n"));
        assert!(out.contains("  sys.echo "));
        assert!(out.contains("Write the given text."));
    }

    #[test]
    fn help_for_one_command() {
        let out = screen("help exit");
        assert!(out.starts_with("End the session.\n"));
        assert!(out.contains("exit [-hard]"));
    }

    #[test]
    fn help_unknown_command() {
        assert_eq!(screen("help nope"), "help: Unknown command 'nope'.\n\n");
    }

    #[test]
    fn history_empty_for_detached_session() {
        assert_eq!(screen("history"), "\n");
    }

    #[test]
    fn session_lists_directory() {
        let (runtime, screen) = runtime();
        let control = Arc::new(SessionControl::detached());
        runtime.sessions.add(control);
        run(&runtime, "session");
        assert_eq!(*screen.lock(), "*   0  not started  -  -\n\n");
    }

    #[test]
    fn session_outside_directory_prints_id() {
        assert_eq!(screen("session"), "Session ID: 0\n\n");
    }
}

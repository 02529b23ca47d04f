use crate::commands::{Call, Command, Schema, Signature, convert};
use crate::error::CommandError;
use crate::exec::Context;

/// Session variables, the ones `%NAME%` expands.
pub struct Env;

impl Command for Env {
    fn name(&self) -> &str {
        "env"
    }

    fn description(&self) -> &str {
        "List, read or change session variables."
    }

    fn signature(&self) -> Signature {
        Signature::new()
            .root(Schema::root())
            .subcommand(
                Schema::subcommand("get", "Write one variable's value.")
                    .required("name", "Variable name.", convert::text()),
            )
            .subcommand(
                Schema::subcommand("set", "Set a variable.")
                    .required("name", "Variable name.", convert::text())
                    .required("value", "New value.", convert::text()),
            )
            .subcommand(
                Schema::subcommand("delete", "Remove a variable.")
                    .required("name", "Variable name.", convert::text()),
            )
    }

    fn execute(&self, ctx: &Context, call: &Call<'_>) -> Result<(), CommandError> {
        let name = call.arguments.text("name").unwrap_or_default();
        match call.subcommand() {
            None => {
                for (name, value) in ctx.env().snapshot() {
                    ctx.output().write_line(&format!("{name}={value}"))?;
                }
            }
            Some("get") => match ctx.env().get(name) {
                Some(value) => ctx.output().write_line(&value)?,
                None => return Err(CommandError::msg(format!("Variable '{name}' is not set."))),
            },
            Some("set") => {
                let value = call.arguments.text("value").unwrap_or_default();
                log::debug!("session {}: {name}={value}", ctx.session_id());
                ctx.env().set(name, value);
            }
            Some("delete") => {
                if ctx.env().remove(name).is_none() {
                    return Err(CommandError::msg(format!("Variable '{name}' is not set.")));
                }
            }
            Some(other) => {
                return Err(CommandError::msg(format!("Unhandled subcommand '{other}'.")));
            }
        }
        Ok(())
    }
}

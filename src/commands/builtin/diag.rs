use std::time::Duration;

use crate::commands::{Call, Command, Schema, Signature, convert};
use crate::error::CommandError;
use crate::exec::Context;

/// Fails with the given message; handy for checking where errors end up.
pub struct Throw;

impl Command for Throw {
    fn name(&self) -> &str {
        "throw"
    }

    fn description(&self) -> &str {
        "Fail with the given message."
    }

    fn signature(&self) -> Signature {
        Signature::new().root(Schema::root().required(
            "message",
            "Error message.",
            convert::text(),
        ))
    }

    fn execute(&self, _ctx: &Context, call: &Call<'_>) -> Result<(), CommandError> {
        Err(CommandError::msg(
            call.arguments.text("message").unwrap_or_default(),
        ))
    }
}

pub struct Sleep;

impl Command for Sleep {
    fn name(&self) -> &str {
        "sleep"
    }

    fn description(&self) -> &str {
        "Wait for the given number of milliseconds."
    }

    fn signature(&self) -> Signature {
        Signature::new().root(Schema::root().required(
            "milliseconds",
            "How long to wait.",
            convert::parsed::<u64>(),
        ))
    }

    fn execute(&self, ctx: &Context, call: &Call<'_>) -> Result<(), CommandError> {
        let ms = call.arguments.get::<u64>("milliseconds").copied().unwrap_or(0);
        if ctx.sleep(Duration::from_millis(ms)) {
            Ok(())
        } else {
            Err(CommandError::Cancelled)
        }
    }
}

//! Handlers used by the `netoutput` binary.
//!
//! Every command is reported at info level. Four keys have dedicated
//! handlers; anything else goes to the dynamic-key fallback.

use log::info;

use crate::command::{CommandError, CommandProcessor, HandlerResult, Source};

/// Keys with a dedicated handler in [`logging_processor`].
pub const STATIC_KEYS: [&str; 4] = ["mame_start", "pause", "mame_stop", "tcp"];

/// Build a processor that logs every received command.
///
/// ```
/// use netoutput::{command::Source, handlers::logging_processor};
///
/// let processor = logging_processor()?;
/// assert!(processor.has_handler("mame_start"));
/// processor.process("lamp0=1", Source::Datagram);
/// # Ok::<(), netoutput::command::CommandError>(())
/// ```
///
/// # Errors
///
/// Returns [`CommandError`] if a route is rejected by the builder.
pub fn logging_processor() -> Result<CommandProcessor, CommandError> {
    let routes: [(&str, &'static str); 4] = [
        ("mame_start", "MAME START"),
        ("pause", "PAUSE"),
        ("mame_stop", "MAME STOP"),
        ("tcp", "TCP"),
    ];
    let mut builder = CommandProcessor::builder();
    for (key, label) in routes {
        builder = builder.route(
            key,
            move |value: Option<&str>, source: Source| -> HandlerResult {
                info!(
                    "{label} command received from {source} with value: {}",
                    shown(value)
                );
                Ok(())
            },
        )?;
    }
    Ok(builder
        .fallback(
            |key: &str, value: Option<&str>, source: Source| -> HandlerResult {
                info!(
                    "Dynamic key '{key}' received from {source} with value: {}",
                    shown(value)
                );
                Ok(())
            },
        )
        .build())
}

fn shown(value: Option<&str>) -> &str { value.unwrap_or("None") }

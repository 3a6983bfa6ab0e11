// Internationalization: display strings for the host surface.
// The active language lives in AppConfig and is handed to a Translator;
// there is no process-wide language state.

mod language;
mod messages;

pub use language::*;
pub use messages::*;

mod command_input;
mod input;
mod prompt;

pub use command_input::{CommandEvent, CommandInput};
pub use input::{InputResult, TextInput};
pub use prompt::{Prompt, PromptResult};

/// Result of offering a key event to a component
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyResult<E> {
  /// Key was consumed, nothing for the parent to do
  Handled,
  /// Key produced an event the parent needs to handle
  Event(E),
  /// Key not handled, pass to the next handler
  NotHandled,
}

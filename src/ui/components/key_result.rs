/// Generic result type for component key handling.
///
/// Components report back to their parent view in one shape: either the
/// key was consumed silently, consumed with an event the parent must
/// act on, or left for the next handler in the chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyResult<T> {
  /// Key was consumed, no event for parent to handle
  Handled,
  /// Key was consumed, here's an event for parent to process
  Event(T),
  /// Key was not consumed, parent should try next handler
  NotHandled,
}

// ABOUTME: Constants and tunables for the interpreter

pub const VERSION: &str = "0.3.0";
pub const WELCOME_MESSAGE: &str = "schemer v0.3";
pub const WELCOME_SUBTITLE: &str = "An R5RS-flavored Scheme with a mark-and-sweep heap";
pub const PROMPT: &str = "schemer> ";
pub const HISTORY_FILE: &str = ".schemer_history";

/// Cells reserved in the heap arena up front; the arena grows past this on
/// demand.
pub const DEFAULT_HEAP_CAPACITY: usize = 1 << 12;

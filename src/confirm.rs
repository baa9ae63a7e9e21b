use std::io::{BufRead, Write};
use tracing::debug;

/// Confirmation seam for non-auto-apply runs. Injected into the controller
/// so tests can script the answer instead of reading a terminal.
pub trait Confirm: Send + Sync {
    /// Ask whether the admitted fixes of this iteration may be applied.
    /// Returning false aborts the run with no partial application.
    fn confirm(&self, admitted: usize, iteration: u32) -> bool;
}

impl<T: Confirm> Confirm for std::sync::Arc<T> {
    fn confirm(&self, admitted: usize, iteration: u32) -> bool {
        (**self).confirm(admitted, iteration)
    }
}

/// Blocking y/N prompt on the controlling terminal
pub struct TerminalConfirm;

impl Confirm for TerminalConfirm {
    fn confirm(&self, admitted: usize, iteration: u32) -> bool {
        print!(
            "Iteration {}: apply {} admitted fix(es)? [y/N] ",
            iteration, admitted
        );
        let _ = std::io::stdout().flush();

        let mut answer = String::new();
        if std::io::stdin().lock().read_line(&mut answer).is_err() {
            debug!("Failed to read confirmation, treating as decline");
            return false;
        }
        matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
    }
}

use std::io::Write;

/// Abstraction over user-facing output.
///
/// Command modules use this trait instead of `println!`/`eprintln!` so that
/// their output can be captured in tests.
pub trait UserOutput: Send + Sync {
    /// Informational message (e.g., "No runtimes active.")
    fn status(&self, message: &str);

    /// Success message (e.g., "Stopped widget.")
    fn success(&self, message: &str);

    /// Warning message
    fn warning(&self, message: &str);

    /// Inline progress (no trailing newline). Call `finish_progress` after.
    fn progress(&self, message: &str);

    /// Finish an inline progress line with a result.
    fn finish_progress(&self, result: &str);
}

/// Standard CLI output: stdout for results, stderr for warnings.
pub struct CliOutput;

impl UserOutput for CliOutput {
    fn status(&self, message: &str) {
        println!("{}", message);
    }

    fn success(&self, message: &str) {
        println!("{}", message);
    }

    fn warning(&self, message: &str) {
        eprintln!("{}", message);
    }

    fn progress(&self, message: &str) {
        print!("{}", message);
        std::io::stdout().flush().ok();
    }

    fn finish_progress(&self, result: &str) {
        println!("{}", result);
    }
}

/// Collects output lines in memory.
#[cfg(test)]
#[derive(Default)]
pub struct CaptureOutput {
    lines: parking_lot::Mutex<Vec<String>>,
    partial: parking_lot::Mutex<String>,
}

#[cfg(test)]
impl CaptureOutput {
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }
}

#[cfg(test)]
impl UserOutput for CaptureOutput {
    fn status(&self, message: &str) {
        self.lines.lock().push(message.to_string());
    }

    fn success(&self, message: &str) {
        self.lines.lock().push(message.to_string());
    }

    fn warning(&self, message: &str) {
        self.lines.lock().push(message.to_string());
    }

    fn progress(&self, message: &str) {
        self.partial.lock().push_str(message);
    }

    fn finish_progress(&self, result: &str) {
        let line = std::mem::take(&mut *self.partial.lock()) + result;
        self.lines.lock().push(line);
    }
}

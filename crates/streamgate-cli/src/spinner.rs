use owo_colors::OwoColorize;
use std::io::{self, Write};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::interval;

/// Stderr spinner shown while waiting for the provider's first token
pub struct Spinner {
    task: Option<JoinHandle<()>>,
}

impl Spinner {
    /// Start spinning unless stderr is not a terminal
    pub fn start(message: &str) -> Self {
        if !atty::is(atty::Stream::Stderr) {
            return Self { task: None };
        }

        let message = message.to_string();
        let task = tokio::spawn(async move {
            let frames = ['⠋', '⠙', '⠹', '⠸', '⠼', '⠴', '⠦', '⠧', '⠇', '⠏'];
            let mut interval = interval(Duration::from_millis(80));

            for frame in frames.iter().cycle() {
                interval.tick().await;
                eprint!("\r{} {} ", message.blue().bold(), frame.cyan());
                io::stderr().flush().unwrap_or(());
            }
        });

        Self { task: Some(task) }
    }

    /// Stop and clear the spinner line; later calls do nothing
    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            eprint!("\r\x1b[K");
            io::stderr().flush().unwrap_or(());
        }
    }
}

impl Drop for Spinner {
    fn drop(&mut self) {
        self.stop();
    }
}

use std::collections::VecDeque;
use std::io::IsTerminal;
use std::sync::{Arc, Mutex, MutexGuard};

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};

/// Controls how step output is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Spinners + ring-buffer logs, cleared on completion.
    Normal,
    /// Like Normal but keeps log lines after step completion.
    Verbose,
    /// No ANSI — plain println output (for piped/non-TTY).
    Plain,
}

impl OutputMode {
    pub fn detect(verbose: bool) -> Self {
        if !std::io::stdout().is_terminal() {
            OutputMode::Plain
        } else if verbose {
            OutputMode::Verbose
        } else {
            OutputMode::Normal
        }
    }
}

/// Numbered steps with spinners, checkmarks and crosses.
pub struct StepProgress {
    multi: MultiProgress,
    total_steps: usize,
    current_step: usize,
    mode: OutputMode,
}

struct StepState {
    log_lines: VecDeque<String>,
    done_label: Option<String>,
}

/// Handle passed into the step closure for logging during execution.
///
/// Log lines are encoded as extra lines in the spinner bar's message so the
/// `MultiProgress` line count stays accurate across redraws.
pub struct Step {
    bar: ProgressBar,
    state: Arc<Mutex<StepState>>,
    label: String,
    mode: OutputMode,
}

fn spinner_style() -> ProgressStyle {
    ProgressStyle::with_template("[{prefix}] {spinner:.cyan} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

fn done_style() -> ProgressStyle {
    ProgressStyle::with_template("[{prefix}] \u{2713} {msg:.green}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

fn failed_style() -> ProgressStyle {
    ProgressStyle::with_template("[{prefix}] \u{2717} {msg:.red}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

const MAX_LOG_LINES: usize = 10;

fn lock(state: &Mutex<StepState>) -> MutexGuard<'_, StepState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl StepProgress {
    pub fn new(total_steps: usize, mode: OutputMode) -> Self {
        let multi = if mode == OutputMode::Plain {
            MultiProgress::with_draw_target(ProgressDrawTarget::hidden())
        } else {
            MultiProgress::new()
        };
        Self {
            multi,
            total_steps,
            current_step: 0,
            mode,
        }
    }

    pub fn mode(&self) -> OutputMode {
        self.mode
    }

    /// Run a fallible async task as a numbered step.
    ///
    /// Shows a spinner while running, then a checkmark on `Ok` or a cross
    /// on `Err`. The closure receives a [`Step`] handle for logging.
    pub async fn run<F, Fut, T, E>(&mut self, label: &str, f: F) -> Result<T, E>
    where
        F: FnOnce(Step) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.current_step += 1;
        let prefix = format!("{}/{}", self.current_step, self.total_steps);

        if self.mode == OutputMode::Plain {
            println!("[{prefix}] {label}");
        }

        let bar = self.multi.add(ProgressBar::new_spinner());
        bar.set_style(spinner_style());
        bar.set_prefix(prefix.clone());
        bar.set_message(label.to_string());
        bar.enable_steady_tick(std::time::Duration::from_millis(80));

        let state = Arc::new(Mutex::new(StepState {
            log_lines: VecDeque::new(),
            done_label: None,
        }));

        let step = Step {
            bar: bar.clone(),
            state: state.clone(),
            label: label.to_string(),
            mode: self.mode,
        };

        let result = f(step).await;

        let st = lock(&state);
        if self.mode == OutputMode::Verbose || (result.is_err() && self.mode == OutputMode::Normal) {
            for line in &st.log_lines {
                self.multi.println(format!("        {line}")).ok();
            }
        }
        let done_label = st.done_label.clone().unwrap_or_else(|| label.to_string());
        drop(st);

        let (mark, style) = if result.is_ok() {
            ("\u{2713}", done_style())
        } else {
            ("\u{2717}", failed_style())
        };

        if self.mode == OutputMode::Plain {
            println!("[{prefix}] {mark} {done_label}");
        }

        bar.set_style(style);
        bar.finish_with_message(done_label);

        result
    }

    /// Print a plain line (final messages).
    pub fn println(&self, text: &str) {
        if self.mode == OutputMode::Plain {
            println!("{text}");
        } else {
            self.multi.println(text).ok();
        }
    }
}

impl Step {
    /// Add a log line under this step (ring buffer of ~10).
    pub fn log(&self, line: &str) {
        if self.mode == OutputMode::Plain {
            for sub in line.split('\n') {
                println!("        {sub}");
            }
            return;
        }

        let mut state = lock(&self.state);
        for sub in line.split('\n') {
            if state.log_lines.len() >= MAX_LOG_LINES {
                state.log_lines.pop_front();
            }
            state.log_lines.push_back(sub.to_string());
        }

        let mut msg = self.label.clone();
        for log_line in &state.log_lines {
            msg.push_str("\n        ");
            msg.push_str(log_line);
        }
        self.bar.set_message(msg);
    }

    /// Override the completion label shown with the checkmark.
    pub fn set_done_label(&self, label: impl Into<String>) {
        lock(&self.state).done_label = Some(label.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn run_passes_result_through() {
        let mut progress = StepProgress::new(2, OutputMode::Plain);

        let ok: Result<u32, String> = progress
            .run("first", |step| async move {
                step.set_done_label("first done");
                Ok(7)
            })
            .await;
        assert_eq!(ok, Ok(7));

        let err: Result<u32, String> = progress
            .run("second", |_| async { Err("boom".to_string()) })
            .await;
        assert_eq!(err, Err("boom".to_string()));
        assert_eq!(progress.current_step, 2);
    }

    #[test]
    fn log_ring_buffer_is_bounded() {
        let state = Arc::new(Mutex::new(StepState {
            log_lines: VecDeque::new(),
            done_label: None,
        }));
        let step = Step {
            bar: ProgressBar::hidden(),
            state: state.clone(),
            label: "launch".into(),
            mode: OutputMode::Normal,
        };
        for i in 0..25 {
            step.log(&format!("line {i}"));
        }
        let st = lock(&state);
        assert_eq!(st.log_lines.len(), MAX_LOG_LINES);
        assert_eq!(st.log_lines.front().map(String::as_str), Some("line 15"));
    }
}

use crate::phase::Phase;
use crate::ui::icons::{BLOCKED, CHECK, COMMIT, CROSS, FINALIZE, IMPLEMENT, RETRY, REVIEW, SPARKLE, WARN};
use console::{Emoji, style};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

/// Terminal UI for a tasksmith run, rendered via `indicatif` progress bars.
///
/// Two bars are stacked vertically:
/// - Task bar: how many items of the WorkSet are completed
/// - Iteration bar: spinner with the current iteration, task, phase and live status
///
/// All methods coordinate output via `indicatif`'s `MultiProgress` internally.
pub struct OrchestratorUI {
    multi: MultiProgress,
    task_bar: ProgressBar,
    iteration_bar: ProgressBar,
    verbose: bool,
    current_iter: AtomicU32,
    max_iter: AtomicU32,
    context: Mutex<String>,
}

fn phase_icon(phase: Phase) -> Emoji<'static, 'static> {
    match phase {
        Phase::Implement => IMPLEMENT,
        Phase::Review => REVIEW,
        Phase::Finalize => FINALIZE,
    }
}

impl OrchestratorUI {
    /// Create the UI with the task bar pre-filled to `completed` of `total`.
    pub fn new(total: u64, completed: u64, verbose: bool) -> Self {
        let multi = MultiProgress::new();

        let task_style = ProgressStyle::default_bar()
            .template("{prefix:.bold.dim} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▓▒░");

        let task_bar = multi.add(ProgressBar::new(total));
        task_bar.set_style(task_style);
        task_bar.set_prefix(" Tasks");
        task_bar.set_position(completed);

        let iteration_style = ProgressStyle::default_spinner()
            .template("{prefix:.bold.dim} {spinner} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());

        let iteration_bar = multi.add(ProgressBar::new_spinner());
        iteration_bar.set_style(iteration_style);
        iteration_bar.set_prefix("  Iter");

        Self {
            multi,
            task_bar,
            iteration_bar,
            verbose,
            current_iter: AtomicU32::new(0),
            max_iter: AtomicU32::new(0),
            context: Mutex::new(String::new()),
        }
    }

    /// Print a line via `MultiProgress`, falling back to `eprintln!` if the rich UI fails.
    fn print_line(&self, msg: impl AsRef<str>) {
        if self.multi.println(msg.as_ref()).is_err() {
            eprintln!("{}", msg.as_ref());
        }
    }

    fn set_status(&self, status: String) {
        let iter = self.current_iter.load(Ordering::SeqCst);
        let max = self.max_iter.load(Ordering::SeqCst);
        let context = self.context.lock().map(|c| c.clone()).unwrap_or_default();
        self.iteration_bar.set_message(format!(
            "Iteration {}/{} {} {}",
            style(iter).cyan(),
            max,
            context,
            status
        ));
    }

    /// Header printed once before the first iteration.
    pub fn print_run_header(&self, feature: &str, agent: &str, budget: u32, review: bool) {
        self.print_line("");
        self.print_line(format!("{}", style("═".repeat(70)).cyan()));
        self.print_line(format!(
            "{} Feature {} with {}",
            style("▶").green().bold(),
            style(feature).yellow().bold(),
            style(agent).cyan()
        ));
        self.print_line(format!("{}", style("═".repeat(70)).cyan()));
        self.print_line(format!(
            "{}  {} iterations max, review {}",
            style("Budget:").dim(),
            budget,
            if review { "on" } else { "off" }
        ));
        self.print_line("");
    }

    /// Record iteration counters and start the spinner animation.
    pub fn start_iteration(&self, iter: u32, max: u32) {
        self.current_iter.store(iter, Ordering::SeqCst);
        self.max_iter.store(max, Ordering::SeqCst);
        if self.iteration_bar.is_finished() {
            self.iteration_bar.reset();
        }
        self.set_status(format!("{}", style("(resolving next task...)").dim()));
        self.iteration_bar
            .enable_steady_tick(Duration::from_millis(100));
    }

    /// Announce the task picked for this iteration.
    pub fn start_task(&self, id: &str, title: &str) {
        self.task_bar
            .set_message(format!("{}: {}", style(id).yellow(), title));
        if let Ok(mut context) = self.context.lock() {
            *context = format!("{}", style(id).yellow());
        }
        self.set_status(String::new());
    }

    /// Switch the spinner to a new phase.
    pub fn start_phase(&self, phase: Phase) {
        self.set_status(format!("{}{}", phase_icon(phase), style(phase).bold()));
        if self.verbose {
            self.print_line(format!("  {}{}", phase_icon(phase), style(phase).bold()));
        }
    }

    /// Short status string; printed as a dim line in verbose mode.
    pub fn log_step(&self, msg: &str) {
        self.set_status(format!("{}", style(format!("({})", msg)).dim()));
        if self.verbose {
            self.print_line(format!("    {} {}", style("→").dim(), style(msg).dim()));
        }
    }

    /// Refresh the spinner with wall-clock time since the phase began.
    pub fn update_elapsed(&self, elapsed: Duration) {
        let secs = elapsed.as_secs();
        let time_str = if secs >= 60 {
            format!("{}m {}s", secs / 60, secs % 60)
        } else {
            format!("{}s", secs)
        };
        self.set_status(format!("{}", style(format!("({})", time_str)).dim()));
    }

    /// Show a tool use event (Read, Write, Edit, Bash, etc.)
    pub fn show_tool_use(&self, emoji: &str, description: &str) {
        self.set_status(format!("{} {}", emoji, style(description).yellow()));
        self.print_line(format!("    {} {}", emoji, style(description).yellow()));
    }

    /// Show a brief snippet of the agent's text output
    pub fn show_thinking(&self, snippet: &str) {
        self.set_status(format!("{}", style(format!("💭 {}", snippet)).dim()));
        if self.verbose {
            self.print_line(format!("    {} {}", style("💭").dim(), style(snippet).dim()));
        }
    }

    /// A retryable failure is about to be retried after `delay`.
    pub fn show_retry(&self, phase: Phase, attempt: u32, max_attempts: u32, delay: Duration) {
        self.print_line(format!(
            "    {}{} attempt {}/{} failed, retrying in {:.1}s",
            RETRY,
            phase,
            attempt,
            max_attempts,
            delay.as_secs_f64()
        ));
    }

    pub fn show_warning(&self, msg: &str) {
        self.print_line(format!("    {}{}", WARN, style(msg).yellow()));
    }

    pub fn show_commit(&self, summary: &str) {
        self.print_line(format!("    {}{}", COMMIT, style(summary).dim()));
    }

    /// Phase finished with exit code 0.
    pub fn phase_done(&self, phase: Phase, elapsed: Duration) {
        self.print_line(format!(
            "  {}{} {}",
            CHECK,
            phase,
            style(format!("({:.1}s)", elapsed.as_secs_f64())).dim()
        ));
    }

    /// Advance the task bar after a successful finalize.
    pub fn task_complete(&self, id: &str) {
        self.task_bar.inc(1);
        self.iteration_bar
            .finish_with_message(format!("{}Task {} complete", CHECK, style(id).green().bold()));
    }

    pub fn task_aborted(&self, id: &str, reason: &str) {
        self.iteration_bar
            .finish_with_message(format!("{}Task {} aborted", CROSS, style(id).red().bold()));
        self.print_line(format!("\n{}{}\n", CROSS, reason));
    }

    /// The global completion sentinel was seen.
    pub fn all_complete(&self) {
        self.iteration_bar.finish_and_clear();
        self.task_bar.finish();
        self.print_line(format!(
            "\n{}{}\n",
            SPARKLE,
            style("Agent reported all work complete").green().bold()
        ));
    }

    /// No eligible task remains but the WorkSet is not finished.
    pub fn blocked(&self, pending: &[String]) {
        self.iteration_bar.finish_and_clear();
        self.print_line(format!(
            "\n{}No eligible task; blocked: {}\n",
            BLOCKED,
            style(pending.join(", ")).yellow()
        ));
    }

    /// Stop all bars, leaving their last state on screen.
    pub fn finish(&self, summary: &str) {
        if !self.iteration_bar.is_finished() {
            self.iteration_bar.finish_and_clear();
        }
        self.task_bar.finish_with_message(summary.to_string());
    }
}

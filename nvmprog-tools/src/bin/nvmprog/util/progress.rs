use std::rc::Rc;
use std::time::Instant;

use colored::Colorize;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use nvmprog::flashing::{FlashProgress, ProgressEvent};

use super::logging;

const TEMPLATE: &str =
    "{msg:>12.green.bold} [{elapsed_precise}] [{wide_bar}] {bytes:>8}/{total_bytes:>8} ({eta:3})";

/// Progress bars for the erase and program phases of one command.
pub struct CliProgressBars {
    erase: Option<ProgressBar>,
    program: Option<ProgressBar>,
    started: Instant,
}

impl CliProgressBars {
    /// Creates the bars for a command erasing `erase_total` and programming
    /// `program_total` bytes. Phases with nothing to do get no bar.
    pub fn new(erase_total: u64, program_total: u64) -> Self {
        let multi = MultiProgress::new();
        logging::set_progress_bar(multi.clone());

        let style = ProgressStyle::with_template(TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("##-");

        let add = |total: u64, message: &'static str| {
            (total > 0).then(|| {
                let bar = multi.add(ProgressBar::new(total));
                bar.set_style(style.clone());
                bar.set_message(message);
                bar
            })
        };

        Self {
            erase: add(erase_total, "Erasing"),
            program: add(program_total, "Programming"),
            started: Instant::now(),
        }
    }

    pub fn handle(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::SectorErased { size, .. } => inc(&self.erase, size),
            ProgressEvent::FailedErasing => abandon(&self.erase, "Erase failed"),
            ProgressEvent::PageProgrammed { size, .. } => inc(&self.program, size),
            ProgressEvent::FailedProgramming => abandon(&self.program, "Program failed"),
            ProgressEvent::FinishedProgramming => finish(&self.program),
            ProgressEvent::StartedErasing
            | ProgressEvent::FinishedErasing
            | ProgressEvent::StartedProgramming { .. } => {}
        }
    }

    /// Completes all bars and prints the elapsed time.
    pub fn finish(&self) {
        finish(&self.erase);
        finish(&self.program);

        // The bars disappear otherwise.
        logging::clear_progress_bar();

        logging::eprintln(format!(
            "    {} in {:.02}s",
            "Finished".green().bold(),
            self.started.elapsed().as_secs_f32(),
        ));
    }
}

fn inc(bar: &Option<ProgressBar>, size: u64) {
    if let Some(bar) = bar {
        bar.inc(size);
    }
}

fn abandon(bar: &Option<ProgressBar>, message: &'static str) {
    if let Some(bar) = bar {
        bar.abandon_with_message(message);
    }
}

fn finish(bar: &Option<ProgressBar>) {
    if let Some(bar) = bar.as_ref().filter(|bar| !bar.is_finished()) {
        bar.finish();
    }
}

/// Creates the progress handler for the controller, and the bars it drives.
pub fn flash_progress(
    disable_progressbars: bool,
    erase_total: u64,
    program_total: u64,
) -> (FlashProgress, Option<Rc<CliProgressBars>>) {
    if disable_progressbars {
        return (FlashProgress::empty(), None);
    }

    let bars = Rc::new(CliProgressBars::new(erase_total, program_total));
    let handler = bars.clone();

    (
        FlashProgress::new(move |event| handler.handle(event)),
        Some(bars),
    )
}

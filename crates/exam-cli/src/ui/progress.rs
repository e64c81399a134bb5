//! Spinner for remote calls, using indicatif.

use std::time::Duration;

use indicatif::{ProgressBar as IndicatifBar, ProgressStyle};

use super::context::UiContext;
use super::render::badge;
use super::theme::Badge;

/// A spinner for indeterminate progress. Silent when not animating.
pub struct Spinner<'a> {
    ctx: &'a UiContext,
    bar: Option<IndicatifBar>,
}

impl<'a> Spinner<'a> {
    pub fn new(ctx: &'a UiContext, message: &str) -> Self {
        let bar = if ctx.allows_animation() {
            let pb = IndicatifBar::new_spinner();
            let (template, ticks): (&str, &[&str]) = if ctx.unicode {
                (
                    "{spinner:.cyan} {msg}...",
                    &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", ""],
                )
            } else {
                ("{spinner} {msg}...", &["|", "/", "-", "\\", ""])
            };
            if let Ok(style) = ProgressStyle::default_spinner().template(template) {
                pb.set_style(style.tick_strings(ticks));
            }
            pb.set_message(message.to_string());
            pb.enable_steady_tick(Duration::from_millis(80));
            Some(pb)
        } else {
            None
        };

        Self { ctx, bar }
    }

    /// Finish with a success line.
    pub fn finish(self, message: &str) {
        self.clear();
        if !self.ctx.mode.is_json() {
            println!("{}", badge(self.ctx, Badge::Ok, message));
        }
    }

    /// Remove the spinner without printing anything.
    pub fn clear(&self) {
        if let Some(bar) = &self.bar {
            bar.finish_and_clear();
        }
    }
}

impl Drop for Spinner<'_> {
    fn drop(&mut self) {
        self.clear();
    }
}

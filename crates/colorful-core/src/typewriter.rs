//! Progressive reveal of the fetched scripture preview text.
//!
//! Frames are pushed over an mpsc channel the way the UI event loop receives
//! ticks. Each frame carries the generation it was produced for so a consumer
//! can drop frames that were already queued when the text was retargeted.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

pub const MIN_DURATION: Duration = Duration::from_millis(1500);
pub const MAX_DURATION: Duration = Duration::from_millis(4000);
pub const PER_CHAR: Duration = Duration::from_millis(35);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub generation: u64,
    pub text: String,
    pub done: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    pub min: Duration,
    pub max: Duration,
    pub per_char: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            min: MIN_DURATION,
            max: MAX_DURATION,
            per_char: PER_CHAR,
        }
    }
}

impl Timing {
    /// `clamp(chars × per_char, min, max)`
    pub fn duration_for(&self, chars: usize) -> Duration {
        let chars = u32::try_from(chars).unwrap_or(u32::MAX);
        self.per_char
            .saturating_mul(chars)
            .clamp(self.min, self.max.max(self.min))
    }
}

pub struct Typewriter {
    timing: Timing,
    frames: mpsc::UnboundedSender<Frame>,
    task: Option<JoinHandle<()>>,
    generation: u64,
}

impl Typewriter {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Frame>) {
        Self::with_timing(Timing::default())
    }

    pub fn with_timing(timing: Timing) -> (Self, mpsc::UnboundedReceiver<Frame>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                timing,
                frames: tx,
                task: None,
                generation: 0,
            },
            rx,
        )
    }

    /// Cancels any running reveal and starts revealing `text`. Must be called
    /// from within a tokio runtime.
    pub fn retarget(&mut self, text: &str) -> u64 {
        self.cancel();
        self.generation += 1;

        let generation = self.generation;
        let chars: Vec<char> = text.chars().collect();
        let duration = self.timing.duration_for(chars.len());
        let tx = self.frames.clone();

        self.task = Some(tokio::spawn(async move {
            if chars.is_empty() {
                let _ = tx.send(Frame {
                    generation,
                    text: String::new(),
                    done: true,
                });
                return;
            }

            let step = duration / chars.len() as u32;
            let mut interval = tokio::time::interval(step.max(Duration::from_millis(1)));
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            let mut shown = String::new();
            for (i, c) in chars.iter().enumerate() {
                interval.tick().await;
                shown.push(*c);
                let frame = Frame {
                    generation,
                    text: shown.clone(),
                    done: i + 1 == chars.len(),
                };
                if tx.send(frame).is_err() {
                    return;
                }
            }
        }));
        generation
    }

    /// Stops the running reveal, if any. Frames already queued stay queued.
    pub fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    pub fn is_current(&self, frame: &Frame) -> bool {
        frame.generation == self.generation
    }
}

impl Drop for Typewriter {
    fn drop(&mut self) {
        self.cancel();
    }
}

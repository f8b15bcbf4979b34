use log::debug;
use std::sync::mpsc::Sender;

use super::evolution_engine::ProgressCallback;
use super::population::Generation;

/// Logs per-generation statistics at debug level.
#[derive(Debug, Default)]
pub struct LogProgressCallback {
    label: String,
}

impl LogProgressCallback {
    pub fn new(label: impl Into<String>) -> Self {
        Self { label: label.into() }
    }
}

impl ProgressCallback for LogProgressCallback {
    fn on_generation_start(&mut self, generation: usize) {
        debug!("[{}] Generation {} starting", self.label, generation + 1);
    }

    fn on_generation_complete(&mut self, generation: &Generation) {
        debug!(
            "[{}] Generation {} complete. Best {:.4}, mean {:.4}, worst {:.4}",
            self.label,
            generation.index + 1,
            generation.best_fitness,
            generation.mean_fitness,
            generation.worst_fitness
        );
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProgressMessage {
    GenerationStart(usize),
    GenerationComplete {
        generation: usize,
        best_fitness: f64,
        mean_fitness: f64,
    },
}

/// Forwards progress over a channel, e.g. to a monitoring thread.
pub struct ChannelProgressCallback {
    sender: Sender<ProgressMessage>,
}

impl ChannelProgressCallback {
    pub fn new(sender: Sender<ProgressMessage>) -> Self {
        Self { sender }
    }
}

impl ProgressCallback for ChannelProgressCallback {
    fn on_generation_start(&mut self, generation: usize) {
        let _ = self.sender.send(ProgressMessage::GenerationStart(generation));
    }

    fn on_generation_complete(&mut self, generation: &Generation) {
        let _ = self.sender.send(ProgressMessage::GenerationComplete {
            generation: generation.index,
            best_fitness: generation.best_fitness,
            mean_fitness: generation.mean_fitness,
        });
    }
}

use super::evolution_engine::ProgressCallback;
use super::logbook::GenerationRecord;
use log::{debug, info};
use std::sync::mpsc::Sender;

/// Writes the logbook stream through the `log` facade
pub struct LogProgressCallback;

impl ProgressCallback for LogProgressCallback {
    fn on_generation_start(&mut self, generation: usize) {
        debug!("Generation {} starting...", generation);
    }

    fn on_generation_complete(&mut self, record: &GenerationRecord) {
        info!("{}", record.stream_line());
    }

    fn on_individual_evaluated(&mut self, current: usize, total: usize) {
        if current % 10 == 0 || current == total {
            debug!("  Evaluated {}/{} individuals", current, total);
        }
    }
}

pub enum ProgressMessage {
    GenerationStart(usize),
    GenerationComplete(Box<GenerationRecord>),
    IndividualEvaluated { current: usize, total: usize },
}

/// Forwards progress to another thread, e.g. a front end polling a receiver
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

    fn on_generation_complete(&mut self, record: &GenerationRecord) {
        let _ = self
            .sender
            .send(ProgressMessage::GenerationComplete(Box::new(record.clone())));
    }

    fn on_individual_evaluated(&mut self, current: usize, total: usize) {
        let _ = self
            .sender
            .send(ProgressMessage::IndividualEvaluated { current, total });
    }
}

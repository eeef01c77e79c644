use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use rama::bytes::Bytes;
use rand::RngExt as _;

use crate::signal::ControlMessage;

const LETTERS: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Creates the workload messages of a single run.
///
/// The filler is generated once at creation and shared by all messages,
/// sequence ids start at zero and are handed out without gaps.
#[derive(Debug)]
pub struct MessageFactory {
    sequence: AtomicU64,
    source: Arc<str>,
    filler: Bytes,
}

impl MessageFactory {
    pub fn new(source: Arc<str>, message_size: usize) -> Self {
        Self::with_filler(source, random_letters(message_size))
    }

    pub fn with_filler(source: Arc<str>, filler: Bytes) -> Self {
        Self {
            sequence: AtomicU64::new(0),
            source,
            filler,
        }
    }

    /// Next workload message, consuming one sequence id.
    pub fn next_workload(&self) -> ControlMessage {
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        ControlMessage::workload(seq, self.source.clone(), self.filler.clone())
    }

    /// Amount of workload messages created so far.
    pub fn issued(&self) -> u64 {
        self.sequence.load(Ordering::Relaxed)
    }

    pub fn source(&self) -> &Arc<str> {
        &self.source
    }

    pub fn filler(&self) -> &Bytes {
        &self.filler
    }
}

fn random_letters(size: usize) -> Bytes {
    let mut rng = rand::rng();
    (0..size)
        .map(|_| LETTERS[rng.random_range(0..LETTERS.len())])
        .collect::<Vec<_>>()
        .into()
}

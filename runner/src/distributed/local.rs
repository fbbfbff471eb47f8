use super::{Communicator, CoordinatorError, Token};
use parking_lot::{Condvar, Mutex};
use std::{collections::VecDeque, sync::Arc, thread, time::Duration};
use tracing::trace;

#[derive(Debug)]
struct Envelope {
    source: usize,
    tag: usize,
    token: Token,
}

#[derive(Debug, Default)]
struct Mailbox {
    queue: Mutex<VecDeque<Envelope>>,
    signal: Condvar,
}

/// In-process message fabric, every rank is a thread holding one `LocalCommunicator`
///
/// Receives match on `(source, tag)` and are FIFO among matching messages. An optional
/// per-sender delay is slept before each delivery to simulate a slow network.
#[derive(Debug)]
pub struct LocalFabric {
    size: usize,
    delays: Vec<Duration>,
}

impl LocalFabric {
    pub fn new(size: usize) -> Self {
        Self {
            size,
            delays: vec![Duration::ZERO; size],
        }
    }

    /// delay applied to every message sent by the rank at the same index
    pub fn with_delays(mut self, delays: Vec<Duration>) -> Self {
        self.delays = delays;
        self.delays.resize(self.size, Duration::ZERO);
        self
    }

    pub fn communicators(self) -> Vec<LocalCommunicator> {
        let mailboxes: Arc<Vec<Mailbox>> =
            Arc::new((0..self.size).map(|_| Mailbox::default()).collect());

        self.delays
            .into_iter()
            .enumerate()
            .map(|(rank, delay)| LocalCommunicator {
                rank,
                delay,
                mailboxes: Arc::clone(&mailboxes),
            })
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct LocalCommunicator {
    rank: usize,
    delay: Duration,
    mailboxes: Arc<Vec<Mailbox>>,
}

impl Communicator for LocalCommunicator {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.mailboxes.len()
    }

    fn send(&self, destination: usize, tag: usize, token: Token) -> Result<(), CoordinatorError> {
        let mailbox = self
            .mailboxes
            .get(destination)
            .ok_or(CoordinatorError::RankOutOfRange(destination, self.size()))?;

        if !self.delay.is_zero() {
            thread::sleep(self.delay);
        }

        trace!(from = self.rank, to = destination, tag, ?token, "Delivering token");
        mailbox.queue.lock().push_back(Envelope {
            source: self.rank,
            tag,
            token,
        });
        mailbox.signal.notify_all();

        Ok(())
    }

    fn receive(&self, source: usize, tag: usize) -> Result<Token, CoordinatorError> {
        if source >= self.size() {
            return Err(CoordinatorError::RankOutOfRange(source, self.size()));
        }

        let mailbox = &self.mailboxes[self.rank];
        let mut queue = mailbox.queue.lock();

        loop {
            if let Some(position) = queue
                .iter()
                .position(|envelope| envelope.source == source && envelope.tag == tag)
            {
                if let Some(envelope) = queue.remove(position) {
                    return Ok(envelope.token);
                }
            }

            mailbox.signal.wait(&mut queue);
        }
    }
}

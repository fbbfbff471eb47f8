pub mod coordinator;
pub mod local;
#[cfg(feature = "mpi")]
pub mod mpi;
pub mod util;


/*
 * Ranks only ever exchange small control tokens, job data never travels between them:
 * - every rank knows the full job list from its own command line
 * - rank 0 is the root by convention, it has no extra capabilities
 * - all receives block, there is no timeout, a stalled rank stalls the run
 */

use thiserror::Error;

/// position of a participant inside a message passing run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionContext {
    pub rank: usize,
    pub world_size: usize,
}

/// Control messages exchanged between ranks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Token {
    Arrived = 1,
    Release = 2,
    Done = 3,
}

impl TryFrom<u8> for Token {
    type Error = CoordinatorError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Arrived),
            2 => Ok(Self::Release),
            3 => Ok(Self::Done),
            other => Err(CoordinatorError::MalformedToken(other)),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoordinatorError {
    #[error("Rank {0} is outside of the world (size {1})")]
    RankOutOfRange(usize, usize),
    #[error("No peers are available to exchange messages with")]
    NoPeers,
    #[error("Expected {expected:?} from rank {source_rank}, received {received:?}")]
    UnexpectedToken {
        source_rank: usize,
        expected: Token,
        received: Token,
    },
    #[error("Received an unknown token value {0}")]
    MalformedToken(u8),
}

/// Point to point messaging between the ranks of a run
pub trait Communicator {
    fn rank(&self) -> usize;

    /// number of ranks, 0 when no message passing world is available
    fn size(&self) -> usize;

    /// blocking send of `token` to `destination`
    fn send(&self, destination: usize, tag: usize, token: Token) -> Result<(), CoordinatorError>;

    /// blocking receive of the next message from `source` carrying `tag`
    fn receive(&self, source: usize, tag: usize) -> Result<Token, CoordinatorError>;

    fn context(&self) -> ExecutionContext {
        ExecutionContext {
            rank: self.rank(),
            world_size: self.size(),
        }
    }
}

/// Communicator for processes started without a message passing launcher
#[derive(Debug, Clone, Copy, Default)]
pub struct SoloCommunicator {
    size: usize,
}

impl SoloCommunicator {
    /// no message passing world at all, reported with size 0
    pub fn unavailable() -> Self {
        Self { size: 0 }
    }

    /// a world consisting of this process only
    pub fn single() -> Self {
        Self { size: 1 }
    }
}

impl Communicator for SoloCommunicator {
    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        self.size
    }

    fn send(&self, _destination: usize, _tag: usize, _token: Token) -> Result<(), CoordinatorError> {
        Err(CoordinatorError::NoPeers)
    }

    fn receive(&self, _source: usize, _tag: usize) -> Result<Token, CoordinatorError> {
        Err(CoordinatorError::NoPeers)
    }
}

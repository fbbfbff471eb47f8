use super::{Communicator, CoordinatorError, Token};
use mpi::{
    environment::Universe,
    topology::SimpleCommunicator,
    traits::{Communicator as _, Destination, Source},
};
use tracing::{debug, error};

/// World communicator of an MPI launched run
///
/// The universe finalizes MPI when dropped, so it is kept alive next to the world.
pub struct MpiCommunicator {
    world: SimpleCommunicator,
    _universe: Universe,
}

impl MpiCommunicator {
    /// initialize MPI, returns `None` if it was already initialized by someone else
    pub fn initialize() -> Option<Self> {
        match mpi::initialize() {
            Some(universe) => {
                let world = universe.world();
                debug!(rank = world.rank(), size = world.size(), "Initialized MPI world");

                Some(Self {
                    world,
                    _universe: universe,
                })
            }
            None => {
                error!("MPI was already initialized, unable to acquire the world communicator");

                None
            }
        }
    }

    fn check_rank(&self, rank: usize) -> Result<i32, CoordinatorError> {
        let size = Communicator::size(self);

        if rank < size {
            Ok(rank as i32)
        } else {
            Err(CoordinatorError::RankOutOfRange(rank, size))
        }
    }
}

impl Communicator for MpiCommunicator {
    fn rank(&self) -> usize {
        self.world.rank() as usize
    }

    fn size(&self) -> usize {
        self.world.size() as usize
    }

    fn send(&self, destination: usize, tag: usize, token: Token) -> Result<(), CoordinatorError> {
        let destination = self.check_rank(destination)?;

        self.world
            .process_at_rank(destination)
            .send_with_tag(&(token as u8), tag as i32);

        Ok(())
    }

    fn receive(&self, source: usize, tag: usize) -> Result<Token, CoordinatorError> {
        let source = self.check_rank(source)?;
        let (value, _status) = self
            .world
            .process_at_rank(source)
            .receive_with_tag::<u8>(tag as i32);

        Token::try_from(value)
    }
}

use super::{util::node_name, Communicator, CoordinatorError, Token};
use tracing::{debug, info, instrument};

/// Barrier and completion gather over point-to-point messages
///
/// Messages towards the root are tagged with the sender rank, messages from the root
/// with the target rank, so concurrent rounds never mix.
pub struct RankCoordinator<'a> {
    communicator: &'a dyn Communicator,
}

impl<'a> RankCoordinator<'a> {
    pub fn new(communicator: &'a dyn Communicator) -> Self {
        Self { communicator }
    }

    /// ranks other than `root`, in increasing order
    fn peers(&self, root: usize) -> Result<impl Iterator<Item = usize>, CoordinatorError> {
        let size = self.communicator.size();

        if size > 0 && root >= size {
            return Err(CoordinatorError::RankOutOfRange(root, size));
        }

        Ok((0..size).filter(move |rank| *rank != root))
    }

    fn expect(&self, source: usize, tag: usize, expected: Token) -> Result<(), CoordinatorError> {
        let received = self.communicator.receive(source, tag)?;

        if received == expected {
            Ok(())
        } else {
            Err(CoordinatorError::UnexpectedToken {
                source_rank: source,
                expected,
                received,
            })
        }
    }

    /// Block until every rank reached the barrier
    ///
    /// Non-root ranks report their arrival to the root, the root collects all arrivals
    /// and then releases every non-root rank. Nobody leaves before everybody arrived.
    #[instrument(skip(self), level = "debug")]
    pub fn barrier(&self, root: usize) -> Result<(), CoordinatorError> {
        let rank = self.communicator.rank();
        let peers = self.peers(root)?.collect::<Vec<_>>();

        if peers.is_empty() {
            return Ok(());
        }

        if rank == root {
            for peer in peers.iter().copied() {
                self.expect(peer, peer, Token::Arrived)?;
            }
            for peer in peers {
                self.communicator.send(peer, peer, Token::Release)?;
            }
            debug!(rank, "Released all ranks from barrier");
        } else {
            self.communicator.send(root, rank, Token::Arrived)?;
            self.expect(root, rank, Token::Release)?;
            debug!(rank, "Released from barrier");
        }

        Ok(())
    }

    /// Report local completion to the root, the root logs every report it receives
    #[instrument(skip(self), level = "debug")]
    pub fn gather_completion(&self, root: usize) -> Result<(), CoordinatorError> {
        let rank = self.communicator.rank();
        let size = self.communicator.size();
        let peers = self.peers(root)?.collect::<Vec<_>>();

        if rank != root {
            if !peers.is_empty() {
                self.communicator.send(root, rank, Token::Done)?;
            }

            return Ok(());
        }

        for peer in peers {
            self.expect(peer, peer, Token::Done)?;
            info!("Received OK @ rank ({root}) from rank ({peer} / {size})");
        }
        info!(node = %node_name(), "Rank {root} is finished");

        Ok(())
    }
}

use super::{DurableProducerQueue, DurableQueueError, MessageSent, State};
use async_trait::async_trait;

/// Not durable across a process restart by itself, but a faithful
/// implementation of the contract: usable as the crate's test double,
/// and as a real (in-process-only) default for callers who want the
/// buffering/confirmation-tracking semantics without wiring up real
/// persistence. [`InMemoryDurableProducerQueue::from_state`] plus
/// [`InMemoryDurableProducerQueue::snapshot`] let tests simulate an
/// actual restart by handing the snapshot to a fresh instance.
pub struct InMemoryDurableProducerQueue<A> {
    state: State<A>,
}

impl<A> InMemoryDurableProducerQueue<A> {
    pub fn new() -> Self {
        Self { state: State::default() }
    }

    pub fn from_state(state: State<A>) -> Self {
        Self { state }
    }

    pub fn snapshot(&self) -> State<A>
    where
        A: Clone,
    {
        self.state.clone()
    }
}

impl<A> Default for InMemoryDurableProducerQueue<A> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<A: Clone + Send> DurableProducerQueue<A> for InMemoryDurableProducerQueue<A> {
    async fn load_state(&mut self) -> Result<State<A>, DurableQueueError> {
        Ok(self.state.clone())
    }

    async fn store_message_sent(&mut self, message: MessageSent<A>) -> Result<u64, DurableQueueError> {
        if message.seq_nr != self.state.current_seq_nr {
            return Err(DurableQueueError::Failed(format!(
                "expected seqNr {} but got {}",
                self.state.current_seq_nr, message.seq_nr
            )));
        }
        let seq_nr = message.seq_nr;
        self.state.unconfirmed.push_back(message);
        self.state.current_seq_nr += 1;
        Ok(seq_nr)
    }

    async fn store_message_confirmed(&mut self, confirmed_seq_nr: u64, qualifier: String) {
        while let Some(front) = self.state.unconfirmed.front() {
            if front.seq_nr <= confirmed_seq_nr {
                self.state.unconfirmed.pop_front();
            } else {
                break;
            }
        }
        self.state.highest_confirmed_seq_nr = self.state.highest_confirmed_seq_nr.max(confirmed_seq_nr);
        self.state
            .confirmed_seq_nr_by_qualifier
            .insert(qualifier, confirmed_seq_nr);
    }
}

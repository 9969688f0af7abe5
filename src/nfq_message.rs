use nfq::{Message, Verdict};
use nfq_mutator::Packet;

/// A message held by the queue until it gets a verdict.
pub struct NfqMessage(Message);

impl NfqMessage {
    /// Copies the queued datagram out so the mods can own it.
    pub fn packet(&self) -> Packet {
        Packet::new(self.0.get_payload().to_vec())
    }

    pub fn with_verdict(mut self, verdict: Verdict) -> Message {
        self.0.set_verdict(verdict);
        self.0
    }
}

impl AsRef<[u8]> for NfqMessage {
    fn as_ref(&self) -> &[u8] {
        self.0.get_payload()
    }
}

impl From<Message> for NfqMessage {
    fn from(value: Message) -> Self {
        Self(value)
    }
}

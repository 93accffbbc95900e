//! Single-slot word mailbox between the two cores.
//!
//! Models the inter-core hardware FIFO the handshake runs over: one word
//! in flight, blocking push and pop by spinning. Paired mailboxes give
//! one channel per direction.

use crate::error::{SessionError, SessionResult};

/// Create one direction's mailbox.
pub fn mailbox() -> (MailSender, MailReceiver) {
    let (producer, consumer) = rtrb::RingBuffer::new(1);
    (MailSender { producer }, MailReceiver { consumer })
}

/// Blocking-push end of a mailbox.
pub struct MailSender {
    producer: rtrb::Producer<u32>,
}

impl MailSender {
    /// Push a word, spinning while the slot is occupied.
    pub fn send(&mut self, word: u32) {
        let mut word = word;
        loop {
            match self.producer.push(word) {
                Ok(()) => return,
                Err(rtrb::PushError::Full(w)) => {
                    word = w;
                    std::hint::spin_loop();
                }
            }
        }
    }
}

/// Blocking-pop end of a mailbox.
pub struct MailReceiver {
    consumer: rtrb::Consumer<u32>,
}

impl MailReceiver {
    /// Pop the next word, spinning while the slot is empty.
    pub fn recv(&mut self) -> u32 {
        loop {
            if let Ok(w) = self.consumer.pop() {
                return w;
            }
            std::hint::spin_loop();
        }
    }

    /// Pop within a poll budget; `HandshakeTimeout` once it runs out.
    pub fn recv_within(&mut self, polls: u32) -> SessionResult<u32> {
        for _ in 0..polls {
            if let Ok(w) = self.consumer.pop() {
                return Ok(w);
            }
            std::hint::spin_loop();
        }
        Err(SessionError::HandshakeTimeout { polls })
    }
}

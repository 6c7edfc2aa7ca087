//! Transport capabilities consumed by the recorder and the player
//!
//! The wire protocol lives outside this crate. The engine only needs a way to
//! bind an inbound endpoint and a way to send decoded messages back out.

mod line;

pub use line::{parse_line, LineReceiver, LineTransmitter};

use serde::{Deserialize, Serialize};

use crate::message::Message;
use crate::Result;

/// Where played-back messages are sent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransmitTarget {
    /// Remote host
    pub host: String,
    /// Remote port
    pub port: u16,
    /// Address path stamped on outgoing messages
    pub address: String,
}

impl Default for TransmitTarget {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 10000,
            address: String::new(),
        }
    }
}

/// Outbound half of a transport
///
/// Messages decoded from a capture carry no address; implementations stamp
/// the address from the last [`Transmitter::configure`] call.
pub trait Transmitter {
    /// Point the transmitter at a new target
    ///
    /// # Errors
    ///
    /// Returns error if the target cannot be used
    fn configure(&mut self, target: &TransmitTarget) -> Result<()>;

    /// Send one message synchronously
    ///
    /// # Errors
    ///
    /// Returns error if the message cannot be sent
    fn send(&mut self, message: &Message) -> Result<()>;
}

/// Inbound half of a transport
///
/// Once bound, the host hands every matching message to the recorder
/// synchronously.
pub trait Receiver {
    /// Start listening on `port` for messages sent to `address`
    ///
    /// # Errors
    ///
    /// Returns error if the endpoint cannot be bound
    fn bind(&mut self, port: u16, address: &str) -> Result<()>;

    /// Stop listening
    fn release(&mut self);
}

impl<T: Transmitter + ?Sized> Transmitter for &mut T {
    fn configure(&mut self, target: &TransmitTarget) -> Result<()> {
        (**self).configure(target)
    }

    fn send(&mut self, message: &Message) -> Result<()> {
        (**self).send(message)
    }
}

impl<T: Transmitter + ?Sized> Transmitter for Box<T> {
    fn configure(&mut self, target: &TransmitTarget) -> Result<()> {
        (**self).configure(target)
    }

    fn send(&mut self, message: &Message) -> Result<()> {
        (**self).send(message)
    }
}

impl<T: Receiver + ?Sized> Receiver for Box<T> {
    fn bind(&mut self, port: u16, address: &str) -> Result<()> {
        (**self).bind(port, address)
    }

    fn release(&mut self) {
        (**self).release();
    }
}

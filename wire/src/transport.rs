use std::future::Future;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Mutex;

use crate::error::Error;
use crate::handle::Handle;
use crate::message::Message;

/// A blocking, message-oriented channel.
pub trait Transport {
    fn send(&self, message: Message) -> Result<(), Error>;
    fn recv(&self) -> Result<Message, Error>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn send(&self, message: Message) -> Result<(), Error> {
        (**self).send(message)
    }

    fn recv(&self) -> Result<Message, Error> {
        (**self).recv()
    }
}

/// An asynchronous channel. `call` resolves to the reply carrying the same
/// transaction id as the request.
pub trait AsyncTransport {
    fn send(&self, message: Message) -> impl Future<Output = Result<(), Error>>;
    fn recv(&self) -> impl Future<Output = Result<Message, Error>>;
    fn call(&self, message: Message) -> impl Future<Output = Result<Message, Error>>;
}

/// Opens protocol members of a named service.
pub trait ServiceDirectory {
    fn connect(&self, service: &str, member: &str, channel: Handle) -> Result<(), Error>;
}

/// Receives until the reply to `txid` arrives. Events that arrive first are
/// dropped; a reply to another transaction is an error.
pub fn recv_reply<T: Transport + ?Sized>(transport: &T, txid: u32) -> Result<Message, Error> {
    loop {
        let message = transport.recv()?;
        let header = message.header()?;
        if header.is_event() {
            continue;
        }
        if header.txid != txid {
            return Err(Error::UnexpectedTxid { expected: txid, actual: header.txid });
        }
        return Ok(message);
    }
}

/// One side of an in-process channel created by [`local_pair`].
#[derive(Debug)]
pub struct LocalEndpoint {
    sender:   Sender<Message>,
    receiver: Mutex<Receiver<Message>>,
}

/// Creates two connected endpoints. Dropping one closes the other.
pub fn local_pair() -> (LocalEndpoint, LocalEndpoint) {
    let (left_tx, left_rx) = mpsc::channel();
    let (right_tx, right_rx) = mpsc::channel();
    (
        LocalEndpoint { sender: left_tx, receiver: Mutex::new(right_rx) },
        LocalEndpoint { sender: right_tx, receiver: Mutex::new(left_rx) },
    )
}

impl Transport for LocalEndpoint {
    fn send(&self, message: Message) -> Result<(), Error> {
        self.sender.send(message).map_err(|_| Error::PeerClosed)
    }

    fn recv(&self) -> Result<Message, Error> {
        let receiver = self.receiver.lock().map_err(|_| Error::PeerClosed)?;
        receiver.recv().map_err(|_| Error::PeerClosed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_pair_delivers_both_ways() {
        let (left, right) = local_pair();
        left.send(Message::encode(1, 2, &5u8).unwrap()).unwrap();
        assert_eq!(right.recv().unwrap().decode_body::<u8>(), Ok(5));
        right.send(Message::encode(1, 2, &6u8).unwrap()).unwrap();
        assert_eq!(left.recv().unwrap().decode_body::<u8>(), Ok(6));
    }

    #[test]
    fn closed_peer() {
        let (left, right) = local_pair();
        drop(right);
        assert_eq!(left.recv(), Err(Error::PeerClosed));
        assert_eq!(left.send(Message::default()), Err(Error::PeerClosed));
    }

    #[test]
    fn replies_skip_events() {
        let (left, right) = local_pair();
        right.send(Message::encode(0, 9, &()).unwrap()).unwrap();
        right.send(Message::encode(4, 1, &()).unwrap()).unwrap();
        assert_eq!(recv_reply(&left, 4).unwrap().header().unwrap().ordinal, 1);

        right.send(Message::encode(5, 1, &()).unwrap()).unwrap();
        assert_eq!(recv_reply(&left, 6), Err(Error::UnexpectedTxid { expected: 6, actual: 5 }));
    }
}

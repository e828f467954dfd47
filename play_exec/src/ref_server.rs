//! # Reference Server
//!
//! Publishes reference messages to the vehicle controller as two-frame ZMQ messages: the topic,
//! followed by the JSON encoded [`ReferenceMsg`].

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::{
    net::{zmq, MonitoredSocket, MonitoredSocketError, NetParams, SocketOptions},
    traj::{ReferenceMsg, ReferenceMsgError},
};

use crate::player::RefSink;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Reference publisher
pub struct RefServer {
    socket: MonitoredSocket,

    topic: String,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum RefServerError {
    #[error("Socket error: {0}")]
    SocketError(MonitoredSocketError),

    #[error("Could not send reference: {0}")]
    SendError(zmq::Error),

    #[error("Could not serialize the reference: {0}")]
    SerializationError(ReferenceMsgError),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl RefServer {
    /// Create a new instance of the reference server.
    ///
    /// This function will not block until a subscriber connects.
    pub fn new(ctx: &zmq::Context, params: &NetParams, topic: &str) -> Result<Self, RefServerError> {
        let socket_options = SocketOptions {
            block_on_first_connect: false,
            bind: true,
            connect_timeout: 1000,
            heartbeat_ivl: 500,
            heartbeat_timeout: 1000,
            linger: 1,
            send_timeout: 10,
            ..Default::default()
        };

        let socket = MonitoredSocket::new(ctx, zmq::PUB, socket_options, &params.ref_endpoint)
            .map_err(RefServerError::SocketError)?;

        Ok(Self {
            socket,
            topic: topic.to_string(),
        })
    }

    /// True if a subscriber is connected.
    pub fn is_connected(&self) -> bool {
        self.socket.connected()
    }
}

impl RefSink for RefServer {
    type Error = RefServerError;

    fn emit(&mut self, msg: &ReferenceMsg) -> Result<(), Self::Error> {
        let json = msg.to_json().map_err(RefServerError::SerializationError)?;

        self.socket
            .send(self.topic.as_bytes(), zmq::SNDMORE)
            .map_err(RefServerError::SendError)?;
        self.socket
            .send(json.as_bytes(), 0)
            .map_err(RefServerError::SendError)
    }
}

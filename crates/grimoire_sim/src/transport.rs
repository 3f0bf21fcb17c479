// SPDX-License-Identifier: MIT OR Apache-2.0
//! In-process reliable link with fixed latency.
//!
//! Messages are encoded with bincode on send and decoded on delivery, the
//! same bytes a real transport would carry. Delivery is in send order.

use grimoire_caster::{CastRequest, CastResult};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use thiserror::Error;

/// Link errors
#[derive(Debug, Error)]
pub enum LinkError {
    /// Encoding or decoding failed
    #[error("Codec error on link '{link}': {source}")]
    Codec {
        /// Link name
        link: String,
        /// Underlying error
        #[source]
        source: bincode::Error,
    },
}

/// Messages exchanged between client and server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Message {
    /// Client asks the server to cast
    Cast(CastRequest),
    /// Server reports what happened
    Result(CastResult),
}

/// One direction of a reliable, ordered connection
#[derive(Debug)]
pub struct Link {
    name: String,
    latency: f64,
    in_flight: VecDeque<(f64, Vec<u8>)>,
    bytes_sent: usize,
    delivered: u64,
}

impl Link {
    /// Create a link with a one-way latency in seconds
    pub fn new(name: impl Into<String>, latency: f64) -> Self {
        Self {
            name: name.into(),
            latency: latency.max(0.0),
            in_flight: VecDeque::new(),
            bytes_sent: 0,
            delivered: 0,
        }
    }

    fn codec_error(&self, source: bincode::Error) -> LinkError {
        LinkError::Codec {
            link: self.name.clone(),
            source,
        }
    }

    /// Queue a message sent at `now`
    pub fn send(&mut self, now: f64, message: &Message) -> Result<(), LinkError> {
        let bytes = bincode::serialize(message).map_err(|e| self.codec_error(e))?;
        self.bytes_sent += bytes.len();
        tracing::trace!("{}: sent {} bytes at {:.3}", self.name, bytes.len(), now);
        self.in_flight.push_back((now + self.latency, bytes));
        Ok(())
    }

    /// Take every message due by `now`, in send order
    pub fn receive(&mut self, now: f64) -> Result<Vec<Message>, LinkError> {
        let mut messages = Vec::new();
        while let Some((due, _)) = self.in_flight.front() {
            if *due > now {
                break;
            }
            let Some((_, bytes)) = self.in_flight.pop_front() else {
                break;
            };
            let message = bincode::deserialize(&bytes).map_err(|e| self.codec_error(e))?;
            self.delivered += 1;
            messages.push(message);
        }
        Ok(messages)
    }

    /// Messages sent but not yet delivered
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Total encoded bytes sent
    pub fn bytes_sent(&self) -> usize {
        self.bytes_sent
    }

    /// Messages delivered so far
    pub fn delivered(&self) -> u64 {
        self.delivered
    }
}

//! Payload-type registry: maps negotiated RTP payload types to codec
//! factories.
//!
//! PCMU (0) and PCMA (8) are always registered. G.722 (9) is registered only
//! when the `g722` feature is compiled in; its absence removes payload type 9
//! from the advertised set and is never an error. The registry can also
//! *declare* payload types that have no codec — telephone-event (101) is
//! declared so the SIP collaborator can offer it in SDP, but the bridge never
//! encodes or decodes it.

use crate::codecs::g711::G711Codec;
use crate::error::Result;
use crate::types::AudioCodec;
use std::collections::{BTreeMap, BTreeSet};
use tracing::warn;

/// RTP payload type for RFC 4733 telephone-event (DTMF), declared in SDP
/// offers but not backed by a codec.
pub const TELEPHONE_EVENT_PAYLOAD_TYPE: u8 = 101;

type CodecFactory = Box<dyn Fn() -> Result<Box<dyn AudioCodec>> + Send + Sync>;

/// Registry of codec factories keyed by RTP payload type.
pub struct CodecRegistry {
    factories: BTreeMap<u8, CodecFactory>,
    declared: BTreeSet<u8>,
}

impl CodecRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            factories: BTreeMap::new(),
            declared: BTreeSet::new(),
        }
    }

    /// Create a registry with the bridge's standard codec set: PCMU and PCMA
    /// always, G.722 when compiled in, telephone-event declared for SDP.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(0, || Ok(Box::new(G711Codec::pcmu())));
        registry.register(8, || Ok(Box::new(G711Codec::pcma())));

        #[cfg(feature = "g722")]
        registry.register(9, || Ok(Box::new(crate::codecs::g722::G722Codec::new())));

        #[cfg(not(feature = "g722"))]
        warn!("G.722 support not compiled in; payload type 9 will not be offered");

        registry.declare(TELEPHONE_EVENT_PAYLOAD_TYPE);
        registry
    }

    /// Register a codec factory for a payload type.
    pub fn register<F>(&mut self, payload_type: u8, factory: F)
    where
        F: Fn() -> Result<Box<dyn AudioCodec>> + Send + Sync + 'static,
    {
        self.factories.insert(payload_type, Box::new(factory));
    }

    /// Declare a payload type for SDP offers without backing it with a codec.
    pub fn declare(&mut self, payload_type: u8) {
        self.declared.insert(payload_type);
    }

    /// Instantiate a codec for a payload type. A factory failure is logged
    /// and reported as "unsupported" rather than propagated: the call setup
    /// path treats it the same as a codec that was never registered.
    pub fn create(&self, payload_type: u8) -> Option<Box<dyn AudioCodec>> {
        let factory = self.factories.get(&payload_type)?;
        match factory() {
            Ok(codec) => Some(codec),
            Err(e) => {
                warn!("failed to instantiate codec for payload type {payload_type}: {e}");
                None
            }
        }
    }

    /// Whether a payload type has a usable codec.
    pub fn is_supported(&self, payload_type: u8) -> bool {
        self.factories.contains_key(&payload_type)
    }

    /// Payload types with usable codecs, sorted ascending.
    pub fn supported_payload_types(&self) -> Vec<u8> {
        self.factories.keys().copied().collect()
    }

    /// Payload types to advertise in an SDP offer: every usable codec plus
    /// the declared-only entries, sorted ascending.
    pub fn offered_payload_types(&self) -> Vec<u8> {
        let mut types: BTreeSet<u8> = self.factories.keys().copied().collect();
        types.extend(&self.declared);
        types.into_iter().collect()
    }
}

impl Default for CodecRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

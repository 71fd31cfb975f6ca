//! Opaque payload bytes kept verbatim when no decoder matched

use std::any::Any;
use std::fmt;

use bytes::{BufMut, BytesMut};

use crate::layer::Layer;

/// Undecoded raw bytes at the end of a chain
#[derive(Debug, Default)]
pub struct Raw {
    /// The bytes, exactly as found on the wire
    pub data: Vec<u8>,
    payload: Option<Box<dyn Layer>>,
}

impl Raw {
    pub fn new(data: Vec<u8>) -> Self {
        Raw {
            data,
            payload: None,
        }
    }
}

impl Layer for Raw {
    fn name(&self) -> &'static str {
        "Raw"
    }

    fn header_len(&self) -> usize {
        self.data.len()
    }

    fn write_header(&self, buf: &mut BytesMut) {
        buf.put_slice(&self.data);
    }

    fn payload(&self) -> Option<&dyn Layer> {
        self.payload.as_deref()
    }

    fn payload_mut(&mut self) -> Option<&mut (dyn Layer + 'static)> {
        self.payload.as_deref_mut()
    }

    fn set_payload(&mut self, payload: Box<dyn Layer>) {
        self.payload = Some(payload);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl fmt::Display for Raw {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Raw ({} bytes)", self.data.len())
    }
}

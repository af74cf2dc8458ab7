//! The in-memory node tree and typed property reading.
//!
//! Nodes are transient: the tree exists only during a load or save pass and
//! is never retained by the editor afterwards. The codec is agnostic about
//! what the property bytes mean - the schema layer interprets them through a
//! [`PropReader`] cursor.

use crate::error::FormatError;

/// One node of the binary stream: a kind byte, an opaque property buffer and
/// an ordered sequence of children. The parent exclusively owns its children;
/// child order is semantically significant (it encodes item stacking order)
/// and is preserved exactly.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BinaryNode {
    kind: u8,
    props: Vec<u8>,
    children: Vec<BinaryNode>,
}

impl BinaryNode {
    pub fn new(kind: u8) -> Self {
        Self {
            kind,
            props: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn kind(&self) -> u8 {
        self.kind
    }

    pub fn props(&self) -> &[u8] {
        &self.props
    }

    pub fn props_mut(&mut self) -> &mut Vec<u8> {
        &mut self.props
    }

    pub fn children(&self) -> &[BinaryNode] {
        &self.children
    }

    pub fn add_child(&mut self, child: BinaryNode) {
        self.children.push(child);
    }

    pub(crate) fn children_mut(&mut self) -> &mut Vec<BinaryNode> {
        &mut self.children
    }

    /// Cursor over this node's property bytes.
    pub fn prop_reader(&self) -> PropReader<'_> {
        PropReader::new(&self.props)
    }
}

/// Little-endian cursor over a node's property buffer.
///
/// Running past the end of the buffer is a [`FormatError::TruncatedStream`]:
/// the schema layer asked for a field the node does not carry.
#[derive(Clone, Debug)]
pub struct PropReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> PropReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn is_done(&self) -> bool {
        self.pos >= self.buf.len()
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], FormatError> {
        if self.remaining() < len {
            return Err(FormatError::TruncatedStream);
        }
        let bytes = &self.buf[self.pos..self.pos + len];
        self.pos += len;
        Ok(bytes)
    }

    pub fn skip(&mut self, len: usize) -> Result<(), FormatError> {
        self.read_bytes(len).map(|_| ())
    }

    pub fn read_u8(&mut self) -> Result<u8, FormatError> {
        Ok(self.read_bytes(1)?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16, FormatError> {
        let bytes = self.read_bytes(2)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    pub fn read_u32(&mut self) -> Result<u32, FormatError> {
        let bytes = self.read_bytes(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub fn read_u64(&mut self) -> Result<u64, FormatError> {
        let bytes = self.read_bytes(8)?;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(bytes);
        Ok(u64::from_le_bytes(raw))
    }

    /// Reads a u16 length-prefixed string. Invalid UTF-8 is replaced rather
    /// than rejected; legacy files carry arbitrary single-byte encodings.
    pub fn read_string(&mut self) -> Result<String, FormatError> {
        let len = self.read_u16()? as usize;
        let bytes = self.read_bytes(len)?;
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }
}

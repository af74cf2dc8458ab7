//! Escaped node stream framing.
//!
//! The stream is a sequence of nodes delimited by [`NODE_START`] and
//! [`NODE_END`] markers. Any literal occurrence of a marker or of [`ESCAPE`]
//! inside node content is escape-prefixed on write, and the reader strips the
//! escape before treating the following byte as data. Reading and writing
//! mirror each other exactly; `unescape(escape(x)) == x` for all inputs.
//!
//! Both ends maintain a byte counter the caller can poll for progress - the
//! walk itself is one blocking call with no suspension points, and a single
//! reader or writer must not be shared between threads.

use std::io::{Read, Write};

use crate::error::FormatError;
use crate::node::BinaryNode;

/// Opens a node.
pub const NODE_START: u8 = 0xFE;
/// Closes the current node.
pub const NODE_END: u8 = 0xFF;
/// Marks the next byte as literal content.
pub const ESCAPE: u8 = 0xFD;

const fn needs_escape(byte: u8) -> bool {
    matches!(byte, NODE_START | NODE_END | ESCAPE)
}

/// Escapes every reserved byte in `bytes`.
pub fn escape(bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(bytes.len());
    for &byte in bytes {
        if needs_escape(byte) {
            out.push(ESCAPE);
        }
        out.push(byte);
    }
    out
}

/// Strips escapes from `bytes`, the inverse of [`escape`].
///
/// A bare marker byte means the input is not pure escaped content
/// (`UnbalancedNodes`); an escape with nothing after it is a truncation.
pub fn unescape(bytes: &[u8]) -> Result<Vec<u8>, FormatError> {
    let mut out = Vec::with_capacity(bytes.len());
    let mut iter = bytes.iter();
    while let Some(&byte) = iter.next() {
        match byte {
            ESCAPE => match iter.next() {
                Some(&literal) => out.push(literal),
                None => return Err(FormatError::TruncatedStream),
            },
            NODE_START | NODE_END => return Err(FormatError::UnbalancedNodes),
            _ => out.push(byte),
        }
    }
    Ok(out)
}

/// Recursive-descent reader for one node tree.
///
/// Wrap files in a `BufReader`; the reader consumes its channel one byte at a
/// time.
pub struct NodeReader<R: Read> {
    inner: R,
    bytes_read: u64,
}

impl<R: Read> NodeReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            bytes_read: 0,
        }
    }

    /// Bytes consumed so far. Callers wanting progress feedback poll this.
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    fn next_byte(&mut self) -> Result<u8, FormatError> {
        let mut byte = [0u8; 1];
        match self.inner.read_exact(&mut byte) {
            Ok(()) => {
                self.bytes_read += 1;
                Ok(byte[0])
            }
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                Err(FormatError::TruncatedStream)
            }
            Err(e) => Err(FormatError::Io(e)),
        }
    }

    /// Reads one complete root node, children and all.
    ///
    /// An end marker with no open node is `UnbalancedNodes`; end-of-input
    /// inside an open node is `TruncatedStream`. Both are fatal - once the
    /// framing is broken the rest of the stream is unrecoverably ambiguous.
    pub fn read_root(&mut self) -> Result<BinaryNode, FormatError> {
        match self.next_byte()? {
            NODE_START => self.read_node(),
            NODE_END => Err(FormatError::UnbalancedNodes),
            other => Err(FormatError::UnexpectedNode(other)),
        }
    }

    /// Parses node content after its start marker has been consumed.
    fn read_node(&mut self) -> Result<BinaryNode, FormatError> {
        // The kind byte is ordinary content and may itself be escaped.
        let kind = match self.next_byte()? {
            ESCAPE => self.next_byte()?,
            NODE_START | NODE_END => return Err(FormatError::UnbalancedNodes),
            byte => byte,
        };
        let mut node = BinaryNode::new(kind);
        loop {
            match self.next_byte()? {
                ESCAPE => node.props_mut().push(self.next_byte()?),
                NODE_START => {
                    let child = self.read_node()?;
                    node.children_mut().push(child);
                }
                NODE_END => return Ok(node),
                byte => node.props_mut().push(byte),
            }
        }
    }
}

/// Streaming node writer, the exact mirror of [`NodeReader`].
///
/// Nodes are opened with [`NodeWriter::begin_node`] and closed with
/// [`NodeWriter::end_node`]; typed field writers escape reserved bytes as they
/// go. [`NodeWriter::finish`] rejects a stream left with open nodes.
pub struct NodeWriter<W: Write> {
    inner: W,
    depth: usize,
    bytes_written: u64,
}

impl<W: Write> NodeWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            depth: 0,
            bytes_written: 0,
        }
    }

    /// Bytes emitted so far, escaping included.
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    fn put_raw(&mut self, byte: u8) -> Result<(), FormatError> {
        self.inner.write_all(&[byte])?;
        self.bytes_written += 1;
        Ok(())
    }

    fn put_escaped(&mut self, byte: u8) -> Result<(), FormatError> {
        if needs_escape(byte) {
            self.put_raw(ESCAPE)?;
        }
        self.put_raw(byte)
    }

    pub fn begin_node(&mut self, kind: u8) -> Result<(), FormatError> {
        self.put_raw(NODE_START)?;
        self.put_escaped(kind)?;
        self.depth += 1;
        Ok(())
    }

    pub fn end_node(&mut self) -> Result<(), FormatError> {
        if self.depth == 0 {
            return Err(FormatError::UnbalancedNodes);
        }
        self.put_raw(NODE_END)?;
        self.depth -= 1;
        Ok(())
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), FormatError> {
        for &byte in bytes {
            self.put_escaped(byte)?;
        }
        Ok(())
    }

    pub fn write_u8(&mut self, value: u8) -> Result<(), FormatError> {
        self.put_escaped(value)
    }

    pub fn write_u16(&mut self, value: u16) -> Result<(), FormatError> {
        self.write_bytes(&value.to_le_bytes())
    }

    pub fn write_u32(&mut self, value: u32) -> Result<(), FormatError> {
        self.write_bytes(&value.to_le_bytes())
    }

    pub fn write_u64(&mut self, value: u64) -> Result<(), FormatError> {
        self.write_bytes(&value.to_le_bytes())
    }

    /// Writes a u16 length-prefixed string.
    pub fn write_string(&mut self, value: &str) -> Result<(), FormatError> {
        let bytes = value.as_bytes();
        let len = u16::try_from(bytes.len())
            .map_err(|_| FormatError::StringTooLong(bytes.len()))?;
        self.write_u16(len)?;
        self.write_bytes(bytes)
    }

    /// Serializes a whole node tree, children in insertion order.
    pub fn write_node(&mut self, node: &BinaryNode) -> Result<(), FormatError> {
        self.begin_node(node.kind())?;
        self.write_bytes(node.props())?;
        for child in node.children() {
            self.write_node(child)?;
        }
        self.end_node()
    }

    /// Flushes and returns the channel. Fails with `UnbalancedNodes` if any
    /// node is still open.
    pub fn finish(mut self) -> Result<W, FormatError> {
        if self.depth != 0 {
            return Err(FormatError::UnbalancedNodes);
        }
        self.inner.flush()?;
        Ok(self.inner)
    }
}

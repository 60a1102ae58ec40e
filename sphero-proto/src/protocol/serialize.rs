use alloc::vec::Vec;
use core::convert::Infallible;

use super::checksum::{ChecksumDigest, Digest};

/// A trait for serializing packets.
pub trait Serializer {
    type Error;

    fn write_u8(&mut self, val: u8) -> Result<(), Self::Error>;

    // everything else can be written in terms of write_u8, but
    // specialize it in anything that forwards to an inner serializer.
    fn write_bytes(&mut self, val: &[u8]) -> Result<(), Self::Error> {
        for b in val.iter() {
            self.write_u8(*b)?;
        }
        Ok(())
    }
}

impl<S> Serializer for &mut S
where
    S: Serializer,
{
    type Error = S::Error;

    fn write_u8(&mut self, val: u8) -> Result<(), Self::Error> {
        (*self).write_u8(val)
    }

    fn write_bytes(&mut self, val: &[u8]) -> Result<(), Self::Error> {
        (*self).write_bytes(val)
    }
}

/// Wrap an [embedded_io::Write] to become a Serializer.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SerializerWrap<T> {
    inner: T,
}

impl<T> SerializerWrap<T> {
    pub fn new(inner: T) -> Self {
        Self { inner }
    }

    pub fn done(self) -> T {
        self.inner
    }
}

impl<T> core::ops::Deref for SerializerWrap<T> {
    type Target = T;
    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl<T> core::ops::DerefMut for SerializerWrap<T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.inner
    }
}

impl<T> Serializer for SerializerWrap<T>
where
    T: embedded_io::Write,
{
    type Error = T::Error;

    fn write_u8(&mut self, val: u8) -> Result<(), Self::Error> {
        self.inner.write_all(&[val])
    }

    fn write_bytes(&mut self, val: &[u8]) -> Result<(), Self::Error> {
        self.inner.write_all(val)
    }
}

/// A serializer that collects everything into a [Vec].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SerializerVec {
    inner: Vec<u8>,
}

impl SerializerVec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Vec::with_capacity(capacity),
        }
    }

    pub fn done(self) -> Vec<u8> {
        self.inner
    }
}

impl core::ops::Deref for SerializerVec {
    type Target = [u8];
    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl Serializer for SerializerVec {
    type Error = Infallible;

    fn write_u8(&mut self, val: u8) -> Result<(), Self::Error> {
        self.inner.push(val);
        Ok(())
    }

    fn write_bytes(&mut self, val: &[u8]) -> Result<(), Self::Error> {
        self.inner.extend_from_slice(val);
        Ok(())
    }
}

/// A serializer that only counts bytes written.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SerializerLength {
    len: usize,
}

impl SerializerLength {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl Serializer for SerializerLength {
    type Error = Infallible;

    fn write_u8(&mut self, _val: u8) -> Result<(), Self::Error> {
        self.len += 1;
        Ok(())
    }

    fn write_bytes(&mut self, val: &[u8]) -> Result<(), Self::Error> {
        self.len += val.len();
        Ok(())
    }
}

/// A serializer that also computes a checksum on the side.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SerializerChecksum<T> {
    digest: ChecksumDigest,
    inner: T,
}

impl<T> SerializerChecksum<T> {
    pub fn new(inner: T) -> Self {
        Self {
            digest: ChecksumDigest::new(),
            inner,
        }
    }

    pub fn finalize(self) -> (u8, T) {
        (self.digest.finalize(), self.inner)
    }
}

impl<T> core::ops::Deref for SerializerChecksum<T> {
    type Target = T;
    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl<T> core::ops::DerefMut for SerializerChecksum<T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.inner
    }
}

impl<T> Serializer for SerializerChecksum<T>
where
    T: Serializer,
{
    type Error = T::Error;

    fn write_u8(&mut self, val: u8) -> Result<(), Self::Error> {
        self.digest.update(&[val]);
        self.inner.write_u8(val)
    }

    fn write_bytes(&mut self, val: &[u8]) -> Result<(), Self::Error> {
        self.digest.update(val);
        self.inner.write_bytes(val)
    }
}

/// Unwrap a result that cannot fail.
pub(crate) fn infallible<T>(res: Result<T, Infallible>) -> T {
    match res {
        Ok(v) => v,
        Err(e) => match e {},
    }
}

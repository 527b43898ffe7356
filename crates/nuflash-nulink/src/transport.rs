//! Byte transport abstraction
//!
//! A [`Transport`] moves whole frames to and from the programmer. The USB
//! backend implements it over interrupt endpoints; tests use scripted
//! transports.

use crate::error::Result;

/// Frame-oriented byte transport
pub trait Transport {
    /// Write one frame, returning the number of bytes accepted
    fn write(&mut self, data: &[u8]) -> Result<usize>;

    /// Read one frame into `buf`, returning the number of bytes received
    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn write(&mut self, data: &[u8]) -> Result<usize> {
        (**self).write(data)
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        (**self).read(buf)
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn write(&mut self, data: &[u8]) -> Result<usize> {
        (**self).write(data)
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        (**self).read(buf)
    }
}

//! Byte-level port seam under [`super::SerialLink`]

use async_trait::async_trait;
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Raw byte transport of a modem or TNC link
#[async_trait]
pub trait SerialPortIO: Send {
    /// Read available bytes; `Ok(0)` means the device went away
    async fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    async fn write_all(&mut self, data: &[u8]) -> io::Result<()>;

    async fn flush(&mut self) -> io::Result<()>;
}

/// Any tokio byte stream used as a port
pub struct StreamPort<S> {
    stream: S,
}

impl<S> StreamPort<S> {
    pub fn new(stream: S) -> Self {
        Self { stream }
    }
}

/// An opened serial device
pub type TokioSerialPort = StreamPort<tokio_serial::SerialStream>;

#[async_trait]
impl<S> SerialPortIO for StreamPort<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.stream.read(buf).await
    }

    async fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        self.stream.write_all(data).await
    }

    async fn flush(&mut self) -> io::Result<()> {
        self.stream.flush().await
    }
}


#[cfg(test)]
mod tests {
    use super::mocks::MockSerialPort;
    use super::*;

    #[test]
    fn test_mock_reads_chunks_then_eof() {
        let mut port = MockSerialPort::new();
        port.queue_read(b"N0CALL>APRS:>hi\r\n");

        let mut buf = [0u8; 64];
        let n = tokio_test::block_on(port.read(&mut buf)).unwrap();
        assert_eq!(&buf[..n], b"N0CALL>APRS:>hi\r\n");
        assert_eq!(tokio_test::block_on(port.read(&mut buf)).unwrap(), 0);
    }

    #[test]
    fn test_mock_write_error() {
        let mut port = MockSerialPort::new();
        tokio_test::block_on(port.write_all(&[0xC0, 0x00, 0xC0])).unwrap();
        port.set_write_error(io::ErrorKind::BrokenPipe);
        assert!(tokio_test::block_on(port.write_all(&[0xC0])).is_err());
        assert_eq!(port.get_written_data(), vec![vec![0xC0, 0x00, 0xC0]]);
    }

    #[tokio::test]
    async fn test_stream_port_over_duplex() {
        let (near, mut far) = tokio::io::duplex(64);
        let mut port = StreamPort::new(near);

        port.write_all(b"N0CALL>APRS:>ping\r\n").await.unwrap();
        port.flush().await.unwrap();
        let mut seen = [0u8; 19];
        far.read_exact(&mut seen).await.unwrap();
        assert_eq!(&seen, b"N0CALL>APRS:>ping\r\n");

        far.write_all(b"pong").await.unwrap();
        let mut buf = [0u8; 8];
        let n = port.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"pong");
    }
}

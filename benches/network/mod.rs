use libiot_comm::network::error::Error;
use libiot_comm::network::{
    Close, Connection, PortInfo, Read, SerialBus, SerialConfig, SerialPort, Write,
};

pub mod modbus;
pub mod mqtt;

/// Swallows writes and plays `reply` back on every read, wrapping around at
/// its end.
pub struct Replay {
    reply: &'static [u8],
    pos: usize,
}

impl Replay {
    pub fn new(reply: &'static [u8]) -> Self {
        Self { reply, pos: 0 }
    }
}

impl Read for Replay {
    type Error = Error;

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        let rest = &self.reply[self.pos..];
        let n = buf.len().min(rest.len());
        buf[..n].copy_from_slice(&rest[..n]);
        self.pos = (self.pos + n) % self.reply.len();
        Ok(n)
    }
}

impl Write for Replay {
    type Error = Error;

    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

impl Close for Replay {
    type Error = Error;

    fn close(self) -> Result<(), Self::Error> {
        Ok(())
    }
}

impl Connection for Replay {}

impl SerialPort for Replay {
    fn configure(&mut self, _config: &SerialConfig) -> Result<(), Error> {
        Ok(())
    }
}

pub struct ReplayBus(pub &'static [u8]);

impl SerialBus for ReplayBus {
    type Port = Replay;
    type Error = Error;

    fn enumerate(&mut self) -> Result<heapless::Vec<PortInfo, 16>, Self::Error> {
        let mut ports = heapless::Vec::new();
        ports
            .push(PortInfo::new("/dev/bench")?)
            .map_err(|_| Error::BufferOverflow)?;
        Ok(ports)
    }

    fn open(&mut self, _port: &PortInfo) -> Result<Self::Port, Self::Error> {
        Ok(Replay::new(self.0))
    }
}

#![allow(dead_code)]

use libiot_comm::network::error::Error;
use libiot_comm::network::{
    Close, Connect, Connection, PortInfo, Read, SerialBus, SerialConfig, SerialPort, Write,
};
use libiot_comm::system::clock::Clock;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

/// Both ends of a scripted byte stream, shared between a test and the mock
/// connection handed to a client.
#[derive(Debug, Default)]
pub struct Wire {
    /// Chunks the peer will deliver; one read never spans two chunks.
    pub inbound: VecDeque<Vec<u8>>,
    /// Everything the client wrote.
    pub outbound: Vec<u8>,
    /// Once the inbound script is exhausted, report EOF instead of a timeout.
    pub peer_closed: bool,
    pub fail_writes: bool,
    pub fail_configure: bool,
    pub closes: usize,
    pub timeouts: Vec<u32>,
    pub configs: Vec<SerialConfig>,
}

pub type SharedWire = Rc<RefCell<Wire>>;

impl Wire {
    pub fn shared() -> SharedWire {
        Rc::new(RefCell::new(Wire::default()))
    }
}

pub fn push_inbound(wire: &SharedWire, bytes: &[u8]) {
    wire.borrow_mut().inbound.push_back(bytes.to_vec());
}

pub fn take_outbound(wire: &SharedWire) -> Vec<u8> {
    std::mem::take(&mut wire.borrow_mut().outbound)
}

#[derive(Debug)]
pub struct MockConnection {
    wire: SharedWire,
}

impl Read for MockConnection {
    type Error = Error;

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        let mut wire = self.wire.borrow_mut();
        let Some(chunk) = wire.inbound.pop_front() else {
            return if wire.peer_closed {
                Ok(0)
            } else {
                Err(Error::Timeout)
            };
        };
        let n = buf.len().min(chunk.len());
        buf[..n].copy_from_slice(&chunk[..n]);
        if n < chunk.len() {
            wire.inbound.push_front(chunk[n..].to_vec());
        }
        Ok(n)
    }

    fn set_timeout(&mut self, timeout_ms: u32) -> Result<(), Self::Error> {
        self.wire.borrow_mut().timeouts.push(timeout_ms);
        Ok(())
    }
}

impl Write for MockConnection {
    type Error = Error;

    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        let mut wire = self.wire.borrow_mut();
        if wire.fail_writes {
            return Err(Error::WriteError);
        }
        wire.outbound.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

impl Close for MockConnection {
    type Error = Error;

    fn close(self) -> Result<(), Self::Error> {
        self.wire.borrow_mut().closes += 1;
        Ok(())
    }
}

impl Connection for MockConnection {}

impl SerialPort for MockConnection {
    fn configure(&mut self, config: &SerialConfig) -> Result<(), Error> {
        let mut wire = self.wire.borrow_mut();
        if wire.fail_configure {
            return Err(Error::InvalidArgument);
        }
        wire.configs.push(*config);
        Ok(())
    }
}

/// TCP stack that always dials into the same wire.
#[derive(Debug)]
pub struct MockNetwork {
    wire: SharedWire,
    pub refuse: bool,
    pub tls: bool,
    pub tls_upgrades: usize,
    pub remotes: Vec<String>,
}

impl MockNetwork {
    pub fn new(wire: &SharedWire) -> Self {
        Self {
            wire: wire.clone(),
            refuse: false,
            tls: false,
            tls_upgrades: 0,
            remotes: Vec::new(),
        }
    }
}

impl Connect for MockNetwork {
    type Connection = MockConnection;
    type Error = ();

    fn connect(&mut self, remote: &str) -> Result<Self::Connection, Self::Error> {
        self.remotes.push(remote.to_string());
        if self.refuse {
            return Err(());
        }
        Ok(MockConnection {
            wire: self.wire.clone(),
        })
    }

    fn upgrade_tls(&mut self, _connection: &mut Self::Connection) -> Result<(), Error> {
        if !self.tls {
            return Err(Error::Unsupported);
        }
        self.tls_upgrades += 1;
        Ok(())
    }
}

/// Serial driver exposing a fixed list of device paths.
#[derive(Debug)]
pub struct MockBus {
    wire: SharedWire,
    pub paths: Vec<&'static str>,
    pub opened: Vec<String>,
}

impl MockBus {
    pub fn new(wire: &SharedWire, paths: &[&'static str]) -> Self {
        Self {
            wire: wire.clone(),
            paths: paths.to_vec(),
            opened: Vec::new(),
        }
    }
}

impl SerialBus for MockBus {
    type Port = MockConnection;
    type Error = ();

    fn enumerate(&mut self) -> Result<heapless::Vec<PortInfo, 16>, Self::Error> {
        let mut ports = heapless::Vec::new();
        for path in &self.paths {
            ports
                .push(PortInfo::new(path).map_err(|_| ())?)
                .map_err(|_| ())?;
        }
        Ok(ports)
    }

    fn open(&mut self, port: &PortInfo) -> Result<Self::Port, Self::Error> {
        self.opened.push(port.path.as_str().to_string());
        Ok(MockConnection {
            wire: self.wire.clone(),
        })
    }
}

/// A clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Cell<u64>,
}

impl ManualClock {
    pub fn advance(&self, ms: u64) {
        self.now.set(self.now.get() + ms);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.get()
    }
}

//! Modbus client over a TCP or serial connection.

use super::frame::{self, Frame, MAX_READ_BITS, MAX_READ_REGISTERS};
use super::{
    DEFAULT_TIMEOUT_MS, DEFAULT_UNIT_ID, DataType, MAX_PDU_LEN, MAX_RTU_FRAME_LEN, Response,
    TCP_HEADER_LEN, Transport,
};
use crate::network::error::{Error, ErrorKind};
use crate::network::serial::{PortInfo, SerialBus, SerialConfig, SerialPort};
use crate::network::{Connect, Connection, read_exact, remote_address, write_all};
use core::fmt;
use heapless::Vec;

/// Connection state of a [`Client`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// No transport is open.
    Disconnected,
    /// Connected over TCP.
    ConnectedTcp,
    /// Connected over a serial line.
    ConnectedRtu,
}

/// A Modbus master.
///
/// The client owns at most one connection at a time. The connection type `C`
/// is fixed per client; a platform that needs both TCP and RTU from the same
/// client wraps its two stream types in one enum implementing
/// [`Connection`].
///
/// No request is ever retried. Transport failures close the connection and
/// leave the client [`State::Disconnected`]; protocol failures (bad CRC,
/// mismatched transaction id, exception responses) keep it open.
pub struct Client<C: Connection> {
    connection: Option<C>,
    transport: Transport,
    unit_id: u8,
    transaction_id: u16,
}

impl<C: Connection> Client<C> {
    /// Create a disconnected client addressing [`DEFAULT_UNIT_ID`].
    pub fn new() -> Self {
        Self {
            connection: None,
            transport: Transport::Tcp,
            unit_id: DEFAULT_UNIT_ID,
            transaction_id: 0,
        }
    }

    /// Current connection state.
    pub fn state(&self) -> State {
        match (&self.connection, self.transport) {
            (None, _) => State::Disconnected,
            (Some(_), Transport::Tcp) => State::ConnectedTcp,
            (Some(_), Transport::Rtu) => State::ConnectedRtu,
        }
    }

    /// Whether a transport is open.
    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    /// Framing of the open connection.
    pub fn transport(&self) -> Option<Transport> {
        self.connection.as_ref().map(|_| self.transport)
    }

    /// Unit id put in every request.
    pub fn unit_id(&self) -> u8 {
        self.unit_id
    }

    /// Address subsequent requests to `unit_id`.
    pub fn set_unit_id(&mut self, unit_id: u8) {
        self.unit_id = unit_id;
    }

    /// Transaction id of the last TCP request built.
    pub fn transaction_id(&self) -> u16 {
        self.transaction_id
    }

    /// Connect to a Modbus TCP server at `host:port`.
    ///
    /// An already open connection is closed first.
    pub fn connect_tcp<N>(&mut self, network: &mut N, host: &str, port: u16) -> Result<(), Error>
    where
        N: Connect<Connection = C>,
    {
        let remote = remote_address(host, port)?;
        self.close_active();

        let connection = network.connect(&remote).map_err(|_| {
            error!("modbus: connect to {} failed", remote.as_str());
            Error::ConnectionRefused
        })?;
        self.connection = Some(connection);
        self.transport = Transport::Tcp;
        info!("modbus: connected to {}", remote.as_str());
        Ok(())
    }

    /// Open the serial device at `path` and configure it for Modbus RTU.
    ///
    /// The device must be among those reported by [`SerialBus::enumerate`].
    /// An already open connection is closed first.
    pub fn connect_rtu<B>(
        &mut self,
        bus: &mut B,
        path: &str,
        config: &SerialConfig,
    ) -> Result<(), Error>
    where
        B: SerialBus<Port = C>,
        C: SerialPort,
    {
        config.validate()?;
        self.close_active();

        let ports = bus.enumerate().map_err(|_| {
            error!("modbus: serial enumeration failed");
            Error::DeviceNotFound
        })?;
        let port: &PortInfo = ports
            .iter()
            .find(|port| port.path.as_str() == path)
            .ok_or(Error::DeviceNotFound)?;

        let mut connection = bus.open(port).map_err(|_| {
            error!("modbus: opening {} failed", path);
            Error::ConnectionRefused
        })?;
        if let Err(err) = connection.configure(config) {
            let _ = connection.close();
            return Err(err);
        }

        self.connection = Some(connection);
        self.transport = Transport::Rtu;
        info!("modbus: opened {} at {} baud", path, config.baud_rate);
        Ok(())
    }

    /// Close the active transport.
    pub fn disconnect(&mut self) -> Result<(), Error> {
        if self.connection.is_none() {
            return Err(Error::NotOpen);
        }
        self.close_active();
        info!("modbus: disconnected");
        Ok(())
    }

    /// Frame `function` and `data` for the active transport.
    ///
    /// For TCP the transaction id is incremented before it is written into the
    /// header, so the first request of a client carries id 1.
    pub fn build_request(&mut self, function: u8, data: &[u8]) -> Result<Frame, Error> {
        if self.connection.is_none() {
            return Err(Error::NotOpen);
        }
        match self.transport {
            Transport::Tcp => {
                self.transaction_id = self.transaction_id.wrapping_add(1);
                frame::tcp_frame(self.transaction_id, self.unit_id, function, data)
            }
            Transport::Rtu => frame::rtu_frame(self.unit_id, function, data),
        }
    }

    /// Write a complete frame to the transport.
    pub fn send_request(&mut self, request: &[u8]) -> Result<(), Error> {
        let connection = self.connection.as_mut().ok_or(Error::NotOpen)?;
        trace!("modbus: tx {} bytes", request.len());
        if let Err(err) = write_all(connection, request) {
            return Err(self.lose_connection(err));
        }
        Ok(())
    }

    /// Receive one response frame and strip its framing.
    ///
    /// TCP responses must carry protocol id 0 and the transaction id of the
    /// last request. RTU responses are taken from a single read of up to
    /// [`MAX_RTU_FRAME_LEN`] bytes and must pass the CRC check.
    pub fn receive_response(&mut self, timeout_ms: u32) -> Result<Response, Error> {
        let connection = self.connection.as_mut().ok_or(Error::NotOpen)?;
        if connection.set_timeout(timeout_ms).is_err() {
            return Err(self.lose_connection(Error::ReadError));
        }

        match self.transport {
            Transport::Tcp => {
                let (transaction_id, response) = match receive_tcp(connection) {
                    Ok(adu) => adu,
                    // A bad header leaves the stream as unusable as a failed read.
                    Err(err) => return Err(self.lose_connection(err)),
                };
                if transaction_id != self.transaction_id {
                    warn!(
                        "modbus: transaction id {} does not match request {}",
                        transaction_id, self.transaction_id
                    );
                    return Err(Error::ProtocolError);
                }
                trace!("modbus: rx pdu {} bytes", response.pdu().len());
                Ok(response)
            }
            Transport::Rtu => match receive_rtu(connection) {
                Ok(response) => {
                    trace!("modbus: rx pdu {} bytes", response.pdu().len());
                    Ok(response)
                }
                Err(err) if err.kind() == ErrorKind::Transport => Err(self.lose_connection(err)),
                Err(err) => {
                    warn!("modbus: rejected rtu frame: {:?}", err);
                    Err(err)
                }
            },
        }
    }

    /// Read `quantity` items of `data_type` starting at `address`.
    ///
    /// Returns the raw response; use [`Response::registers`] or
    /// [`Response::coils`] to decode the values.
    pub fn read(
        &mut self,
        data_type: DataType,
        address: u16,
        quantity: u16,
    ) -> Result<Response, Error> {
        let limit = if data_type.is_bit_table() {
            MAX_READ_BITS
        } else {
            MAX_READ_REGISTERS
        };
        if quantity == 0 || quantity > limit {
            return Err(Error::InvalidArgument);
        }
        self.transact(
            data_type.read_function(),
            &frame::read_request(address, quantity),
        )
    }

    /// Write `values` to `data_type` starting at `address`.
    ///
    /// For [`DataType::Coil`] every byte of `values` is one coil (nonzero is
    /// on). For [`DataType::HoldingRegister`] `values` holds the raw big-endian
    /// register bytes. The other tables are read-only.
    pub fn write(&mut self, data_type: DataType, address: u16, values: &[u8]) -> Result<(), Error> {
        let function = data_type.write_function().ok_or(Error::Unsupported)?;
        let data = match data_type {
            DataType::Coil => {
                frame::write_coils_request(address, values.iter().map(|&value| value != 0))?
            }
            _ => frame::write_registers_request(address, values)?,
        };
        self.transact(function, &data).map(|_| ())
    }

    /// Write a run of coils starting at `address`.
    pub fn write_coils(&mut self, address: u16, coils: &[bool]) -> Result<(), Error> {
        let data = frame::write_coils_request(address, coils.iter().copied())?;
        self.transact(super::WRITE_MULTIPLE_COILS, &data).map(|_| ())
    }

    /// Write a run of holding registers starting at `address`.
    pub fn write_registers(&mut self, address: u16, registers: &[u16]) -> Result<(), Error> {
        let mut bytes: Vec<u8, { MAX_PDU_LEN - 1 }> = Vec::new();
        for register in registers {
            bytes
                .extend_from_slice(&register.to_be_bytes())
                .map_err(|_| Error::InvalidArgument)?;
        }
        self.write(DataType::HoldingRegister, address, &bytes)
    }

    /// Send one request and wait for its response.
    fn transact(&mut self, function: u8, data: &[u8]) -> Result<Response, Error> {
        let request = self.build_request(function, data)?;
        self.send_request(&request)?;
        let response = self.receive_response(DEFAULT_TIMEOUT_MS)?;

        if let Some(exception) = response.exception() {
            debug!("modbus: device exception {:?}", exception);
            return Err(exception);
        }
        if response.function() != function || response.unit_id() != self.unit_id {
            warn!(
                "modbus: unexpected response function {} from unit {}",
                response.function(),
                response.unit_id()
            );
            return Err(Error::ProtocolError);
        }
        Ok(response)
    }

    fn close_active(&mut self) {
        if let Some(connection) = self.connection.take() {
            if connection.close().is_err() {
                warn!("modbus: error while closing transport");
            }
        }
    }

    fn lose_connection(&mut self, err: Error) -> Error {
        error!("modbus: transport failure {:?}, closing", err);
        self.close_active();
        err
    }
}

impl<C: Connection> Default for Client<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Connection> fmt::Debug for Client<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("state", &self.state())
            .field("unit_id", &self.unit_id)
            .field("transaction_id", &self.transaction_id)
            .finish()
    }
}

/// Read an MBAP header and the PDU it announces.
fn receive_tcp<C: Connection>(connection: &mut C) -> Result<(u16, Response), Error> {
    let mut header = [0u8; TCP_HEADER_LEN];
    read_exact(connection, &mut header)?;

    let transaction_id = u16::from_be_bytes([header[0], header[1]]);
    let protocol_id = u16::from_be_bytes([header[2], header[3]]);
    let length = usize::from(u16::from_be_bytes([header[4], header[5]]));
    let unit_id = header[6];

    // The length field counts the PDU that follows the unit id.
    if protocol_id != 0 || length == 0 || length > MAX_PDU_LEN {
        return Err(Error::ProtocolError);
    }
    let mut pdu: Vec<u8, MAX_PDU_LEN> = Vec::new();
    pdu.resize(length, 0).map_err(|_| Error::BufferOverflow)?;
    read_exact(connection, &mut pdu)?;

    Ok((transaction_id, Response::new(unit_id, &pdu)?))
}

/// Take one RTU frame from a single read and check its CRC.
fn receive_rtu<C: Connection>(connection: &mut C) -> Result<Response, Error> {
    let mut buf = [0u8; MAX_RTU_FRAME_LEN];
    let len = match connection.read(&mut buf) {
        Ok(0) => return Err(Error::ConnectionClosed),
        Ok(n) => n,
        Err(_) => return Err(Error::Timeout),
    };
    let adu = frame::check_rtu(&buf[..len])?;
    Response::new(adu[0], &adu[1..])
}

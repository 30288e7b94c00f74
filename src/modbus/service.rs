// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the simpleplc project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Modbus request dispatch against the register bank
//!
//! For avoiding confusion with the Modbus master/slave terminology, this
//! module uses the terms "server" and "client": the server is the
//! simulated device that owns the registers, the client is the master
//! requesting them.
//!
//! One [`PlcModbusService`] instance exists per accepted TCP connection.
//! The `tokio_modbus` codec parses the MBAP header and the PDU and hands
//! this service a typed [`Request`]; the [`Response`] the service returns
//! is assembled into the reply ADU by the same codec, so no read-reply PDU
//! is ever built by hand here. The two identification function codes
//! (0x11 and 0x2B/0x0E) are the exception: their payloads come
//! pre-assembled from [`identity`](super::identity) and are passed through
//! as custom responses.
//!
//! ## Function codes served
//!
//! | FC | Name | Register space |
//! |----|------|----------------|
//! | 0x01 | Read Coils | coils |
//! | 0x02 | Read Discrete Inputs | discrete inputs |
//! | 0x03 | Read Holding Registers | holding registers |
//! | 0x04 | Read Input Registers | input registers |
//! | 0x05 | Write Single Coil | coils |
//! | 0x06 | Write Single Register | holding registers |
//! | 0x0F | Write Multiple Coils | coils |
//! | 0x10 | Write Multiple Registers | holding registers |
//! | 0x11 | Report Slave ID | — |
//! | 0x2B | Read Device Identification (MEI 0x0E) | — |
//!
//! Any other function code is answered with an `IllegalFunction`
//! exception; an out-of-range address with `IllegalDataAddress`.
//!
//! ### Thread Safety
//!
//! The bank lock is taken once per request and held until the response is
//! assembled, so the values a reply carries are a consistent snapshot and
//! a write is visible to every later reader the moment its acknowledgment
//! is on the wire.

use std::future;
use std::sync::Arc;

use bytes::Bytes;
use log::{debug, error};
use tokio_modbus::prelude::*;

use crate::bank::{BankError, BitSpace, RegisterBank, WordSpace};

use super::connection::ConnectionHandle;
use super::identity::{
    DeviceIdentity, FC_ENCAPSULATED_INTERFACE, FC_REPORT_SLAVE_ID, MEI_READ_DEVICE_ID,
};

/// Per-connection Modbus service backed by the shared register bank.
pub struct PlcModbusService {
    bank: Arc<RegisterBank>,
    identity: Arc<DeviceIdentity>,
    connection: ConnectionHandle,
}

impl PlcModbusService {
    pub fn new(
        bank: Arc<RegisterBank>,
        identity: Arc<DeviceIdentity>,
        connection: ConnectionHandle,
    ) -> Self {
        Self {
            bank,
            identity,
            connection,
        }
    }

    fn dispatch(&self, req: Request<'static>) -> Result<Response, ExceptionCode> {
        // Locked for the whole request so the read-modify-reply sequence
        // stays atomic with respect to the scan engine and OPC UA writes.
        let mut registers = self.bank.lock();

        match req {
            Request::ReadCoils(addr, cnt) => registers
                .read_bits(BitSpace::Coil, addr, cnt)
                .map(Response::ReadCoils)
                .map_err(illegal_data_address),
            Request::ReadDiscreteInputs(addr, cnt) => registers
                .read_bits(BitSpace::DiscreteInput, addr, cnt)
                .map(Response::ReadDiscreteInputs)
                .map_err(illegal_data_address),
            Request::ReadHoldingRegisters(addr, cnt) => registers
                .read_words(WordSpace::Holding, addr, cnt)
                .map(Response::ReadHoldingRegisters)
                .map_err(illegal_data_address),
            Request::ReadInputRegisters(addr, cnt) => registers
                .read_words(WordSpace::Input, addr, cnt)
                .map(Response::ReadInputRegisters)
                .map_err(illegal_data_address),
            Request::WriteSingleCoil(addr, value) => registers
                .write_bit(BitSpace::Coil, addr, value)
                .map(|()| Response::WriteSingleCoil(addr, value))
                .map_err(illegal_data_address),
            Request::WriteSingleRegister(addr, value) => registers
                .write_word(WordSpace::Holding, addr, value)
                .map(|()| Response::WriteSingleRegister(addr, value))
                .map_err(illegal_data_address),
            Request::WriteMultipleCoils(addr, values) => registers
                .write_bits(BitSpace::Coil, addr, &values)
                .map(|()| Response::WriteMultipleCoils(addr, values.len() as u16))
                .map_err(illegal_data_address),
            Request::WriteMultipleRegisters(addr, values) => registers
                .write_words(WordSpace::Holding, addr, &values)
                .map(|()| Response::WriteMultipleRegisters(addr, values.len() as u16))
                .map_err(illegal_data_address),
            Request::Custom(FC_REPORT_SLAVE_ID, _) => {
                debug!("[Modbus] Report Slave ID for {}", self.identity.slave_name);
                Ok(Response::Custom(
                    FC_REPORT_SLAVE_ID,
                    Bytes::from(self.identity.report_slave_id_payload()),
                ))
            }
            Request::Custom(FC_ENCAPSULATED_INTERFACE, data)
                if data.first() == Some(&MEI_READ_DEVICE_ID) =>
            {
                debug!("[Modbus] Read Device Identification");
                Ok(Response::Custom(
                    FC_ENCAPSULATED_INTERFACE,
                    Bytes::from(self.identity.read_device_id_payload()),
                ))
            }
            req => {
                error!(
                    "[Modbus] ExceptionCode::IllegalFunction - Unimplemented function code in request: {req:?}"
                );
                Err(ExceptionCode::IllegalFunction)
            }
        }
    }
}

impl tokio_modbus::server::Service for PlcModbusService {
    type Request = Request<'static>;
    type Response = Response;
    type Exception = ExceptionCode;
    type Future = future::Ready<Result<Self::Response, Self::Exception>>;

    fn call(&self, req: Self::Request) -> Self::Future {
        debug!("Received Modbus request: {:?}", req);
        self.connection.note_request();

        let res = self.dispatch(req);
        if let Err(e) = &res {
            error!("Modbus request error: {:?}", e);
        }

        future::ready(res)
    }
}

/// Map a bank range rejection onto the Modbus exception the reply carries.
fn illegal_data_address(err: BankError) -> ExceptionCode {
    error!("[Modbus] ExceptionCode::IllegalDataAddress - {err}");
    ExceptionCode::IllegalDataAddress
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modbus::connection::ConnectionRegistry;
    use std::borrow::Cow;
    use tokio_modbus::server::Service;

    fn service(mapping_size: u16) -> (PlcModbusService, Arc<RegisterBank>) {
        let bank = Arc::new(RegisterBank::new(mapping_size));
        let registry = Arc::new(ConnectionRegistry::new());
        let identity = Arc::new(DeviceIdentity {
            slave_name: "SimplePLC".to_string(),
            device_id_string: "SimplePLC Modbus Simulator".to_string(),
            slave_id: 1,
            run_indicator: 1,
        });
        let handle = registry.register("127.0.0.1:40502".parse().unwrap());
        (
            PlcModbusService::new(Arc::clone(&bank), identity, handle),
            bank,
        )
    }

    #[tokio::test]
    async fn single_register_write_is_read_back() {
        let (service, _bank) = service(255);
        let resp = service
            .call(Request::WriteSingleRegister(0, 42))
            .await
            .unwrap();
        assert_eq!(resp, Response::WriteSingleRegister(0, 42));

        let resp = service
            .call(Request::ReadHoldingRegisters(0, 1))
            .await
            .unwrap();
        assert_eq!(resp, Response::ReadHoldingRegisters(vec![42]));
    }

    #[tokio::test]
    async fn coil_write_is_visible_to_coil_reads_only() {
        let (service, _bank) = service(255);
        service
            .call(Request::WriteSingleCoil(3, true))
            .await
            .unwrap();

        let coils = service.call(Request::ReadCoils(0, 4)).await.unwrap();
        assert_eq!(coils, Response::ReadCoils(vec![false, false, false, true]));

        let inputs = service
            .call(Request::ReadDiscreteInputs(0, 4))
            .await
            .unwrap();
        assert_eq!(inputs, Response::ReadDiscreteInputs(vec![false; 4]));
    }

    #[tokio::test]
    async fn multiple_write_round_trips() {
        let (service, _bank) = service(255);
        let words: Cow<'static, [u16]> = Cow::Owned(vec![1, 2, 3]);
        service
            .call(Request::WriteMultipleRegisters(10, words))
            .await
            .unwrap();
        let resp = service
            .call(Request::ReadHoldingRegisters(10, 3))
            .await
            .unwrap();
        assert_eq!(resp, Response::ReadHoldingRegisters(vec![1, 2, 3]));

        let bits: Cow<'static, [bool]> = Cow::Owned(vec![true, false, true]);
        service
            .call(Request::WriteMultipleCoils(20, bits))
            .await
            .unwrap();
        let resp = service.call(Request::ReadCoils(20, 3)).await.unwrap();
        assert_eq!(resp, Response::ReadCoils(vec![true, false, true]));
    }

    #[tokio::test]
    async fn overrange_write_yields_illegal_data_address() {
        // mapping_size 255: address 0x0100 is one past the last register.
        let (service, bank) = service(255);
        let err = service
            .call(Request::WriteSingleRegister(0x0100, 1))
            .await
            .unwrap_err();
        assert_eq!(err, ExceptionCode::IllegalDataAddress);
        // The bank is untouched.
        assert_eq!(
            bank.lock().read_words(WordSpace::Holding, 0, 255).unwrap(),
            vec![0; 255]
        );
    }

    #[tokio::test]
    async fn boundary_write_succeeds_one_past_fails() {
        let (service, _bank) = service(255);
        service
            .call(Request::WriteSingleRegister(254, 7))
            .await
            .unwrap();
        let err = service
            .call(Request::WriteSingleRegister(255, 7))
            .await
            .unwrap_err();
        assert_eq!(err, ExceptionCode::IllegalDataAddress);
    }

    #[tokio::test]
    async fn report_slave_id_returns_the_custom_payload() {
        let (service, _bank) = service(255);
        let resp = service
            .call(Request::Custom(FC_REPORT_SLAVE_ID, Cow::Owned(vec![])))
            .await
            .unwrap();
        match resp {
            Response::Custom(fc, payload) => {
                assert_eq!(fc, FC_REPORT_SLAVE_ID);
                assert_eq!(payload[0], 2 + 9);
                assert_eq!(&payload[1..3], &[0x01, 0x01]);
                assert_eq!(&payload[3..], b"SimplePLC");
            }
            other => panic!("unexpected response: {other:?}"),
        }
    }

    #[tokio::test]
    async fn device_identification_requires_the_mei_type() {
        let (service, _bank) = service(255);
        let resp = service
            .call(Request::Custom(
                FC_ENCAPSULATED_INTERFACE,
                Cow::Owned(vec![MEI_READ_DEVICE_ID, 0x01, 0x00]),
            ))
            .await
            .unwrap();
        match resp {
            Response::Custom(fc, payload) => {
                assert_eq!(fc, FC_ENCAPSULATED_INTERFACE);
                assert_eq!(&payload[..3], &[0x0E, 0x01, 0x01]);
            }
            other => panic!("unexpected response: {other:?}"),
        }

        // A different MEI type is not implemented.
        let err = service
            .call(Request::Custom(
                FC_ENCAPSULATED_INTERFACE,
                Cow::Owned(vec![0x0D]),
            ))
            .await
            .unwrap_err();
        assert_eq!(err, ExceptionCode::IllegalFunction);
    }

    #[tokio::test]
    async fn unknown_function_code_is_rejected() {
        let (service, _bank) = service(255);
        let err = service
            .call(Request::Custom(0x42, Cow::Owned(vec![])))
            .await
            .unwrap_err();
        assert_eq!(err, ExceptionCode::IllegalFunction);
    }
}

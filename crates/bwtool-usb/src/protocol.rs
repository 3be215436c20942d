//! Bridge protocol constants and framing
//!
//! Every command starts with a binary start byte, a command code and a
//! length; the bridge answers with a short header echoing the command (with
//! the response flag set) before the payload. Header mismatches are hard
//! errors: a bridge that frames wrong cannot be trusted for the payload
//! either.

use bwtool_core::TransportError;

/// Start byte of every binary command
pub const BINSTART: u8 = 0x01;
/// Set on the command code in bridge responses
pub const RESPONSE_FLAG: u8 = 0x80;
/// I2C transaction command
pub const CMD_I2C_TXRX: u8 = 0x02;
/// SPI transaction command
pub const CMD_SPI_TXRX: u8 = 0x03;
/// Forward the wrapped command to a remote bridge (RS485)
pub const CMD_FWD: u8 = 0x04;

/// Bounded read timeout for bridge responses, in milliseconds
pub const READ_TIMEOUT_MS: u64 = 1000;

/// RS485 addressing for the SPI bridge
///
/// `remote` set means the command is wrapped in a forward frame and relayed
/// by the local bridge to the remote one.
#[derive(Debug, Clone, Copy, Default)]
pub struct Rs485Ids {
    /// Id of the bridge on our serial port
    pub local: u8,
    /// Id of the bridge the command is forwarded to
    pub remote: Option<u8>,
}

/// Build the request header for an SPI transaction of `len` payload bytes
pub fn spi_request_header(ids: Rs485Ids, len: u8) -> Vec<u8> {
    match ids.remote {
        None => vec![BINSTART, CMD_SPI_TXRX, ids.local, len],
        Some(remote) => vec![
            BINSTART,
            CMD_FWD,
            ids.local,
            len + 3,
            CMD_SPI_TXRX,
            remote,
            len,
        ],
    }
}

/// Validate the 4-byte SPI response header against the sent length
pub fn check_spi_response_header(hdr: &[u8; 4], len: u8) -> Result<(), TransportError> {
    if hdr[0] != BINSTART {
        return Err(TransportError::BadResponse {
            field: "start byte",
            got: hdr[0],
            want: BINSTART,
        });
    }
    if hdr[1] != CMD_SPI_TXRX | RESPONSE_FLAG {
        return Err(TransportError::BadResponse {
            field: "response code",
            got: hdr[1],
            want: CMD_SPI_TXRX | RESPONSE_FLAG,
        });
    }
    if hdr[3] != len {
        return Err(TransportError::BadResponse {
            field: "length",
            got: hdr[3],
            want: len,
        });
    }
    Ok(())
}

/// Build the request header for an I2C transaction
pub fn i2c_request_header(wlen: u8, rlen: u8) -> [u8; 4] {
    [BINSTART, CMD_I2C_TXRX, wlen + 1, rlen]
}

/// Validate the 3-byte I2C response header against the requested read length
pub fn check_i2c_response_header(hdr: &[u8; 3], rlen: u8) -> Result<(), TransportError> {
    if hdr[0] != CMD_I2C_TXRX | RESPONSE_FLAG {
        return Err(TransportError::BadResponse {
            field: "start byte",
            got: hdr[0],
            want: CMD_I2C_TXRX | RESPONSE_FLAG,
        });
    }
    if hdr[1] != rlen + 1 {
        return Err(TransportError::BadResponse {
            field: "length",
            got: hdr[1],
            want: rlen + 1,
        });
    }
    if hdr[2] != 0 {
        return Err(TransportError::BridgeStatus(hdr[2]));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spi_header_local() {
        let ids = Rs485Ids::default();
        assert_eq!(spi_request_header(ids, 9), [0x01, CMD_SPI_TXRX, 0, 9]);
    }

    #[test]
    fn test_spi_header_forwarded() {
        let ids = Rs485Ids {
            local: 2,
            remote: Some(7),
        };
        assert_eq!(
            spi_request_header(ids, 9),
            [0x01, CMD_FWD, 2, 12, CMD_SPI_TXRX, 7, 9]
        );
    }

    #[test]
    fn test_spi_response_header() {
        let good = [0x01, CMD_SPI_TXRX | RESPONSE_FLAG, 0, 9];
        assert!(check_spi_response_header(&good, 9).is_ok());

        let bad_start = [0x02, CMD_SPI_TXRX | RESPONSE_FLAG, 0, 9];
        assert!(check_spi_response_header(&bad_start, 9).is_err());

        let missing_flag = [0x01, CMD_SPI_TXRX, 0, 9];
        assert!(check_spi_response_header(&missing_flag, 9).is_err());

        let wrong_len = [0x01, CMD_SPI_TXRX | RESPONSE_FLAG, 0, 8];
        assert!(check_spi_response_header(&wrong_len, 9).is_err());
    }

    #[test]
    fn test_i2c_headers() {
        assert_eq!(i2c_request_header(2, 4), [0x01, 0x02, 3, 4]);

        assert!(check_i2c_response_header(&[0x82, 5, 0], 4).is_ok());
        assert!(check_i2c_response_header(&[0x81, 5, 0], 4).is_err());
        assert!(check_i2c_response_header(&[0x82, 4, 0], 4).is_err());
        assert!(matches!(
            check_i2c_response_header(&[0x82, 5, 3], 4),
            Err(TransportError::BridgeStatus(3))
        ));
    }
}

//! Raw HCI socket radio backend.
//!
//! Scans passively over a raw Linux HCI socket, without the BlueZ daemon.
//! Unlike a D-Bus scan, the raw LE Advertising Report carries the PDU event
//! type and the untouched AD payload, both of which the router's filtering
//! rules depend on. Requires CAP_NET_RAW and CAP_NET_ADMIN or root.

use super::{AdvertisementEvent, AdvertisementKind, EVENT_CHANNEL_BUFFER_SIZE, ScanError, ScanResult};
use crate::mac_address::MacAddress;
use libc::{AF_BLUETOOTH, SOCK_CLOEXEC, SOCK_RAW, c_int, c_void, sockaddr, socklen_t};
use std::io;
use std::mem;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::time::Duration;
use tokio::io::unix::AsyncFd;
use tokio::sync::mpsc;

// HCI protocol constants
const BTPROTO_HCI: c_int = 1;
const HCI_FILTER: c_int = 2;

// HCI packet types
const HCI_COMMAND_PKT: u8 = 0x01;
const HCI_EVENT_PKT: u8 = 0x04;

// HCI events
const EVT_LE_META_EVENT: u8 = 0x3E;

// LE Meta event sub-events
const EVT_LE_ADVERTISING_REPORT: u8 = 0x02;

// HCI commands
const OGF_LE_CTL: u16 = 0x08;
const OCF_LE_SET_SCAN_PARAMETERS: u16 = 0x000B;
const OCF_LE_SET_SCAN_ENABLE: u16 = 0x000C;

// LE Set Scan Parameters fields
const LE_SCAN_PASSIVE: u8 = 0x00;
const LE_PUBLIC_ADDRESS: u8 = 0x00;
const FILTER_POLICY_ACCEPT_ALL: u8 = 0x00;

// 10ms scan interval and window, in 0.625ms units
const SCAN_INTERVAL: u16 = 0x0010;
const SCAN_WINDOW: u16 = 0x0010;

/// HCI socket address structure
#[repr(C)]
struct SockaddrHci {
    hci_family: u16,
    hci_dev: u16,
    hci_channel: u16,
}

/// HCI filter structure for raw sockets
#[repr(C)]
struct HciFilter {
    type_mask: u32,
    event_mask: [u32; 2],
    opcode: u16,
}

impl HciFilter {
    fn le_meta_events() -> Self {
        let mut filter = Self {
            type_mask: 0,
            event_mask: [0, 0],
            opcode: 0,
        };
        filter.type_mask |= 1 << u32::from(HCI_EVENT_PKT);
        let bit = EVT_LE_META_EVENT as usize;
        filter.event_mask[bit / 32] |= 1 << (bit % 32);
        filter
    }
}

/// A raw HCI socket bound to a local adapter.
struct HciSocket {
    fd: OwnedFd,
}

impl AsRawFd for HciSocket {
    fn as_raw_fd(&self) -> RawFd {
        self.fd.as_raw_fd()
    }
}

impl HciSocket {
    /// Open a non-blocking raw HCI socket and bind it to `dev_id`.
    ///
    /// Uses libc directly since nix has no BTPROTO_HCI support. Non-blocking
    /// mode is required for `AsyncFd`.
    fn open(dev_id: u16) -> Result<Self, ScanError> {
        let raw = unsafe {
            libc::socket(
                AF_BLUETOOTH,
                SOCK_RAW | SOCK_CLOEXEC | libc::SOCK_NONBLOCK,
                BTPROTO_HCI,
            )
        };
        if raw < 0 {
            return Err(ScanError::Bluetooth(format!(
                "failed to create HCI socket: {}",
                io::Error::last_os_error()
            )));
        }
        let socket = Self {
            fd: unsafe { OwnedFd::from_raw_fd(raw) },
        };

        let addr = SockaddrHci {
            hci_family: AF_BLUETOOTH as u16,
            hci_dev: dev_id,
            hci_channel: 0, // HCI_CHANNEL_RAW
        };
        let ret = unsafe {
            libc::bind(
                socket.as_raw_fd(),
                &addr as *const SockaddrHci as *const sockaddr,
                mem::size_of::<SockaddrHci>() as socklen_t,
            )
        };
        if ret < 0 {
            return Err(ScanError::Bluetooth(format!(
                "failed to bind HCI socket: {}",
                io::Error::last_os_error()
            )));
        }

        Ok(socket)
    }

    /// Restrict incoming packets to LE meta events.
    fn set_event_filter(&self) -> Result<(), ScanError> {
        let filter = HciFilter::le_meta_events();
        let ret = unsafe {
            libc::setsockopt(
                self.as_raw_fd(),
                0, // SOL_HCI
                HCI_FILTER,
                &filter as *const HciFilter as *const c_void,
                mem::size_of::<HciFilter>() as socklen_t,
            )
        };
        if ret < 0 {
            return Err(ScanError::Bluetooth(format!(
                "failed to set HCI filter: {}",
                io::Error::last_os_error()
            )));
        }
        Ok(())
    }

    /// Send an HCI command packet.
    fn send_command(&self, ogf: u16, ocf: u16, params: &[u8]) -> Result<(), ScanError> {
        let packet = hci_command_packet(ogf, ocf, params);
        let ret = unsafe {
            libc::write(
                self.as_raw_fd(),
                packet.as_ptr() as *const c_void,
                packet.len(),
            )
        };
        if ret < 0 {
            return Err(ScanError::Bluetooth(format!(
                "failed to send HCI command: {}",
                io::Error::last_os_error()
            )));
        }
        Ok(())
    }

    /// Configure a passive LE scan without duplicate filtering.
    ///
    /// Duplicate filtering must stay off: the store wants every fresh
    /// advertisement, and auto-registration needs repeated scan responses.
    fn set_scan_parameters(&self) -> Result<(), ScanError> {
        let params = [
            LE_SCAN_PASSIVE,
            (SCAN_INTERVAL & 0xFF) as u8,
            (SCAN_INTERVAL >> 8) as u8,
            (SCAN_WINDOW & 0xFF) as u8,
            (SCAN_WINDOW >> 8) as u8,
            LE_PUBLIC_ADDRESS,
            FILTER_POLICY_ACCEPT_ALL,
        ];
        self.send_command(OGF_LE_CTL, OCF_LE_SET_SCAN_PARAMETERS, &params)
    }

    fn set_scan_enable(&self, enable: bool) -> Result<(), ScanError> {
        let params = [u8::from(enable), 0x00 /* filter_dup off */];
        self.send_command(OGF_LE_CTL, OCF_LE_SET_SCAN_ENABLE, &params)
    }
}

/// Create an HCI command packet
fn hci_command_packet(ogf: u16, ocf: u16, params: &[u8]) -> Vec<u8> {
    let opcode = (ogf << 10) | ocf;
    let mut packet = Vec::with_capacity(4 + params.len());
    packet.push(HCI_COMMAND_PKT);
    packet.push((opcode & 0xFF) as u8);
    packet.push((opcode >> 8) as u8);
    packet.push(params.len() as u8);
    packet.extend_from_slice(params);
    packet
}

/// Parse an LE Advertising Report into a [`ScanResult`].
///
/// Returns `None` for truncated reports and for PDU event types the router
/// has no rules for. Only the first report in a packet is taken; controllers
/// rarely batch, and the next packet brings the rest.
fn parse_advertising_report(packet: &[u8]) -> Option<ScanResult> {
    // Layout after the 4-byte header (packet type, event code, parameter
    // length, sub-event): num_reports, event_type, address_type,
    // address[6] (little-endian), data_length, data, rssi.
    let report = packet.get(4..)?;
    if *report.first()? == 0 {
        return None;
    }
    if report.len() < 11 {
        return None;
    }

    let kind = AdvertisementKind::from_raw(report[1])?;
    let address_type = report[2];

    let mut addr = [0u8; 6];
    addr.copy_from_slice(&report[3..9]);
    addr.reverse(); // HCI transmits the address little-endian

    let data_len = report[9] as usize;
    let rssi_index = 10 + data_len;
    if report.len() <= rssi_index {
        return None;
    }

    Some(ScanResult {
        address: MacAddress(addr),
        address_type,
        kind,
        rssi: i16::from(report[rssi_index] as i8),
        payload: report[10..rssi_index].to_vec(),
    })
}

/// Start a passive scan over the raw HCI socket of hci0.
///
/// Advertisement events are delivered through the returned channel. With a
/// `scan_duration`, scanning is disabled when it elapses and a final
/// [`AdvertisementEvent::ScanComplete`] is sent before the channel closes;
/// otherwise the scan runs until the process is interrupted.
pub async fn start_scan(
    scan_duration: Option<Duration>,
) -> Result<mpsc::Receiver<AdvertisementEvent>, ScanError> {
    // One socket receives events, a second one carries commands.
    let event_socket = HciSocket::open(0)?;
    event_socket.set_event_filter()?;

    let cmd_socket = HciSocket::open(0)?;
    cmd_socket.set_scan_parameters()?;
    cmd_socket.set_scan_enable(true)?;

    let (tx, rx) = mpsc::channel(EVENT_CHANNEL_BUFFER_SIZE);

    let async_fd = AsyncFd::new(event_socket)
        .map_err(|e| ScanError::Bluetooth(format!("failed to create async fd: {}", e)))?;

    tokio::spawn(async move {
        let mut buf = [0u8; 258]; // Max HCI event size

        let deadline = async {
            match scan_duration {
                Some(duration) => tokio::time::sleep(duration).await,
                None => std::future::pending().await,
            }
        };
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                _ = &mut deadline => {
                    let _ = cmd_socket.set_scan_enable(false);
                    let _ = tx.send(AdvertisementEvent::ScanComplete).await;
                    break;
                }
                guard = async_fd.readable() => {
                    let mut guard = match guard {
                        Ok(guard) => guard,
                        Err(_) => break,
                    };

                    // Drain all available packets before waiting again
                    loop {
                        let n = match guard.try_io(|inner| {
                            let ret = unsafe {
                                libc::read(
                                    inner.as_raw_fd(),
                                    buf.as_mut_ptr() as *mut c_void,
                                    buf.len(),
                                )
                            };
                            if ret < 0 {
                                Err(io::Error::last_os_error())
                            } else {
                                Ok(ret as usize)
                            }
                        }) {
                            Ok(Ok(n)) if n > 0 => n,
                            Ok(Ok(_)) => break,  // EOF or empty read
                            Ok(Err(_)) => break, // Read error
                            Err(_) => break,     // WouldBlock - no more data
                        };

                        if n >= 4
                            && buf[0] == HCI_EVENT_PKT
                            && buf[1] == EVT_LE_META_EVENT
                            && buf[3] == EVT_LE_ADVERTISING_REPORT
                            && let Some(result) = parse_advertising_report(&buf[..n])
                        {
                            let event = AdvertisementEvent::ScanResult(result);
                            if tx.send(event).await.is_err() {
                                // Router went away; stop scanning.
                                let _ = cmd_socket.set_scan_enable(false);
                                return;
                            }
                        }
                    }
                }
            }
        }
    });

    Ok(rx)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Build a full LE Advertising Report packet around the given AD payload.
    fn report_packet(event_type: u8, addr_le: [u8; 6], payload: &[u8], rssi: i8) -> Vec<u8> {
        let mut packet = vec![
            HCI_EVENT_PKT,
            EVT_LE_META_EVENT,
            (payload.len() + 8) as u8,
            EVT_LE_ADVERTISING_REPORT,
            0x01, // one report
            event_type,
            0x00, // public address
        ];
        packet.extend_from_slice(&addr_le);
        packet.push(payload.len() as u8);
        packet.extend_from_slice(payload);
        packet.push(rssi as u8);
        packet
    }

    #[test]
    fn test_parse_adv_ind_report() {
        let payload = [0x02, 0x01, 0x06, 0x0E, 0xFF, 0x69, 0x09, 0xAA];
        let packet = report_packet(0x00, [0x3C, 0x7F, 0x0D, 0x23, 0xE7, 0xC1], &payload, -67);

        let result = parse_advertising_report(&packet).unwrap();
        assert_eq!(result.kind, AdvertisementKind::AdvInd);
        assert_eq!(result.address.to_string(), "C1:E7:23:0D:7F:3C");
        assert_eq!(result.rssi, -67);
        assert_eq!(result.payload, payload);
    }

    #[test]
    fn test_parse_scan_response_report() {
        let packet = report_packet(0x04, [0x01; 6], &[0x04, 0x09, 0x57, 0x6F, 0x54], -80);
        let result = parse_advertising_report(&packet).unwrap();
        assert_eq!(result.kind, AdvertisementKind::ScanResponse);
        assert_eq!(result.payload.len(), 5);
    }

    #[test]
    fn test_parse_unknown_event_type_dropped() {
        let packet = report_packet(0x07, [0x01; 6], &[0x02, 0x01, 0x06], -50);
        assert!(parse_advertising_report(&packet).is_none());
    }

    #[test]
    fn test_parse_truncated_report_dropped() {
        let packet = report_packet(0x00, [0x01; 6], &[0x02, 0x01, 0x06], -50);
        // Chop off the trailing RSSI byte
        assert!(parse_advertising_report(&packet[..packet.len() - 1]).is_none());
        assert!(parse_advertising_report(&packet[..6]).is_none());
        assert!(parse_advertising_report(&[]).is_none());
    }

    #[test]
    fn test_parse_empty_report_count_dropped() {
        let mut packet = report_packet(0x00, [0x01; 6], &[0x02, 0x01, 0x06], -50);
        packet[4] = 0x00; // zero reports
        assert!(parse_advertising_report(&packet).is_none());
    }

    #[test]
    fn test_hci_command_packet_layout() {
        let packet = hci_command_packet(OGF_LE_CTL, OCF_LE_SET_SCAN_ENABLE, &[0x01, 0x00]);
        assert_eq!(packet[0], HCI_COMMAND_PKT);
        assert_eq!(packet[3], 2); // parameter length
        assert_eq!(packet.len(), 6);
    }

    #[test]
    fn test_le_meta_event_filter_masks() {
        let filter = HciFilter::le_meta_events();
        assert_eq!(filter.type_mask, 1 << HCI_EVENT_PKT);
        assert_eq!(filter.event_mask[1], 1 << (EVT_LE_META_EVENT % 32));
    }
}

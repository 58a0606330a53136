//! Typed views over BluFi message payloads.
//!
//! Inbound parsers fail soft: a short or malformed payload yields empty
//! fields or a truncated list, never an error, because the peer has no way
//! to be told about a bad frame.

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::error::Error;

pub const MAX_SSID_LEN: usize = 32;
pub const MAX_PASSWORD_LEN: usize = 64;
pub const MIN_WPA2_PASSWORD_LEN: usize = 8;

// ── Operating mode ───────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum OpMode {
    Null = 0,
    Station = 1,
    SoftAp = 2,
    StationSoftAp = 3,
}

impl OpMode {
    pub const fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Self::Null),
            1 => Some(Self::Station),
            2 => Some(Self::SoftAp),
            3 => Some(Self::StationSoftAp),
            _ => None,
        }
    }
}

// ── Wi-Fi status ─────────────────────────────────────────────

/// Payload of a WifiConnectionState data message:
/// `[op_mode, sta_conn_status, softap_conn_num, ssid…]`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WifiStatus {
    pub op_mode: u8,
    /// 0 means the station interface is connected.
    pub sta_conn_status: u8,
    pub softap_conn_num: u8,
    pub ssid: String,
}

impl WifiStatus {
    pub fn parse(payload: &[u8]) -> Self {
        match payload {
            [op_mode, sta, softap, ssid @ ..] => Self {
                op_mode: *op_mode,
                sta_conn_status: *sta,
                softap_conn_num: *softap,
                ssid: String::from_utf8_lossy(ssid).into_owned(),
            },
            _ => Self::default(),
        }
    }

    pub fn mode(&self) -> Option<OpMode> {
        OpMode::from_u8(self.op_mode)
    }

    pub fn is_station_connected(&self) -> bool {
        self.sta_conn_status == 0
    }
}

impl fmt::Display for WifiStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "mode={} sta={} softap_clients={} ssid={:?}",
            self.op_mode, self.sta_conn_status, self.softap_conn_num, self.ssid
        )
    }
}

// ── Wi-Fi scan list ──────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WifiNetwork {
    pub ssid: String,
    /// Raw RSSI byte as sent by the device.
    pub rssi: u8,
}

impl WifiNetwork {
    /// Signal strength in dBm.
    pub fn rssi_dbm(&self) -> i8 {
        self.rssi as i8
    }
}

/// Parse `{len, rssi, ssid[len - 1]}` records.
///
/// Parsing stops at a zero length or at a record that would run past the
/// buffer. Repeated SSIDs keep their first occurrence.
pub fn parse_wifi_list(payload: &[u8]) -> Vec<WifiNetwork> {
    let mut networks: Vec<WifiNetwork> = Vec::new();
    let mut rest = payload;

    while let Some((&len, tail)) = rest.split_first() {
        let len = usize::from(len);
        if len == 0 || len > tail.len() {
            break;
        }
        let (record, next) = tail.split_at(len);
        rest = next;

        let ssid = String::from_utf8_lossy(&record[1..]).into_owned();
        if networks.iter().any(|n| n.ssid == ssid) {
            continue;
        }
        networks.push(WifiNetwork {
            ssid,
            rssi: record[0],
        });
    }

    networks
}

/// Append `incoming` to `list`, skipping SSIDs already present.
pub fn merge_networks(list: &mut Vec<WifiNetwork>, incoming: Vec<WifiNetwork>) {
    for net in incoming {
        if !list.iter().any(|n| n.ssid == net.ssid) {
            list.push(net);
        }
    }
}

// ── Version / error ──────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FirmwareVersion {
    pub major: u8,
    pub minor: u8,
}

impl FirmwareVersion {
    pub fn parse(payload: &[u8]) -> Self {
        match payload {
            [major, minor, ..] => Self {
                major: *major,
                minor: *minor,
            },
            [major] => Self {
                major: *major,
                minor: 0,
            },
            [] => Self::default(),
        }
    }
}

impl fmt::Display for FirmwareVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

// ── Credentials ──────────────────────────────────────────────

/// Station credentials, validated on construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WifiCredentials {
    ssid: heapless::String<MAX_SSID_LEN>,
    password: heapless::String<MAX_PASSWORD_LEN>,
}

impl WifiCredentials {
    /// `password` may be empty for an open network.
    pub fn new(ssid: &str, password: &str) -> Result<Self, Error> {
        validate_ssid(ssid)?;
        validate_password(password)?;
        Ok(Self {
            ssid: to_fixed(ssid).ok_or(Error::InvalidCredentials("SSID too long"))?,
            password: to_fixed(password).ok_or(Error::InvalidCredentials("password too long"))?,
        })
    }

    pub fn ssid(&self) -> &str {
        &self.ssid
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    pub fn is_open(&self) -> bool {
        self.password.is_empty()
    }
}

fn to_fixed<const N: usize>(s: &str) -> Option<heapless::String<N>> {
    let mut out = heapless::String::new();
    out.push_str(s).ok()?;
    Some(out)
}

pub fn validate_ssid(ssid: &str) -> Result<(), Error> {
    if ssid.is_empty() || ssid.len() > MAX_SSID_LEN {
        return Err(Error::InvalidCredentials("SSID must be 1-32 bytes"));
    }
    if ssid.chars().any(char::is_control) {
        return Err(Error::InvalidCredentials("SSID contains control characters"));
    }
    Ok(())
}

pub fn validate_password(password: &str) -> Result<(), Error> {
    if password.is_empty() {
        return Ok(());
    }
    if password.len() < MIN_WPA2_PASSWORD_LEN || password.len() > MAX_PASSWORD_LEN {
        return Err(Error::InvalidCredentials("password must be empty or 8-64 bytes"));
    }
    Ok(())
}

// ── SoftAP ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum SoftApAuthMode {
    Open = 0,
    Wep = 1,
    WpaPsk = 2,
    Wpa2Psk = 3,
    WpaWpa2Psk = 4,
    Wpa2Enterprise = 5,
    Wpa3Psk = 6,
    Wpa2Wpa3Psk = 7,
}

/// SoftAP configuration pushed by `configure_softap`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SoftApConfig {
    pub credentials: WifiCredentials,
    pub auth_mode: SoftApAuthMode,
    /// 1-13 on most regulatory domains.
    pub channel: u8,
    pub max_connections: u8,
}

impl SoftApConfig {
    pub fn validate(&self) -> Result<(), Error> {
        if !(1..=14).contains(&self.channel) {
            return Err(Error::InvalidCredentials("SoftAP channel must be 1-14"));
        }
        if self.max_connections == 0 {
            return Err(Error::InvalidCredentials("SoftAP must allow at least one client"));
        }
        if self.auth_mode == SoftApAuthMode::Open && !self.credentials.is_open() {
            return Err(Error::InvalidCredentials("open SoftAP cannot carry a password"));
        }
        if self.auth_mode != SoftApAuthMode::Open && self.credentials.is_open() {
            return Err(Error::InvalidCredentials("secured SoftAP needs a password"));
        }
        Ok(())
    }
}

// ── Tests ────────────────────────────────────────────────────

/// EUI-64 (8 bytes)
pub type EUI64 = [u8; 8];
/// AES-128 key (16 bytes)
pub type AESKey = [u8; 16];
/// Device Address (4 bytes)
pub type DevAddr = [u8; 4];

/// Application EUI used when none is configured (little-endian, as sent on air)
pub const DEFAULT_APP_EUI: EUI64 = [0x00; 8];

/// Device EUI used when none is configured (little-endian, as sent on air)
pub const DEFAULT_DEV_EUI: EUI64 = [0xb4, 0xef, 0x44, 0xf7, 0x57, 0xc4, 0xf9, 0xee];

/// Application key used when none is configured (big-endian)
pub const DEFAULT_APP_KEY: AESKey = [
    0x68, 0x24, 0xc9, 0xe7, 0x31, 0x1a, 0x2a, 0xc8, 0x5d, 0xb1, 0x9b, 0x06, 0x5f, 0x06, 0x18, 0x55,
];

/// OTAA device configuration
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    /// Device EUI (unique device identifier)
    pub dev_eui: EUI64,
    /// Application EUI
    pub app_eui: EUI64,
    /// Application key, root of the session keys derived during join
    pub app_key: AESKey,
}

impl DeviceConfig {
    /// Create a new OTAA device configuration
    pub fn new_otaa(dev_eui: EUI64, app_eui: EUI64, app_key: AESKey) -> Self {
        Self {
            dev_eui,
            app_eui,
            app_key,
        }
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self::new_otaa(DEFAULT_DEV_EUI, DEFAULT_APP_EUI, DEFAULT_APP_KEY)
    }
}

/// Session keys and counters established by a successful join
#[derive(Debug, Clone)]
pub struct SessionKeys {
    /// Device address assigned by the network
    pub dev_addr: DevAddr,
    /// Network session key
    pub nwk_skey: AESKey,
    /// Application session key
    pub app_skey: AESKey,
    /// Uplink frame counter
    pub fcnt_up: u32,
    /// Downlink frame counter
    pub fcnt_down: u32,
}

impl SessionKeys {
    /// Fresh keys with zeroed counters
    pub fn new(dev_addr: DevAddr, nwk_skey: AESKey, app_skey: AESKey) -> Self {
        Self {
            dev_addr,
            nwk_skey,
            app_skey,
            fcnt_up: 0,
            fcnt_down: 0,
        }
    }

    /// Increment the uplink frame counter
    pub fn increment_fcnt_up(&mut self) {
        self.fcnt_up = self.fcnt_up.wrapping_add(1);
    }

    /// Track a downlink frame counter seen on air (16 LSBs only)
    pub fn observe_fcnt_down(&mut self, lsb: u16) {
        self.fcnt_down = (self.fcnt_down & 0xFFFF_0000) | lsb as u32;
    }
}

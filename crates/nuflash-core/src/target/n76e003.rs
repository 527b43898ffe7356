//! N76E003 definition and CONFIG0..CONFIG3 codec
//!
//! Configuration bits are fuse-like: an erased byte reads 0xFF, and every
//! feature flag below is *enabled* when its bit is cleared.
//!
//! | Byte    | Bits  | Field                       |
//! |---------|-------|-----------------------------|
//! | CONFIG0 | 7     | CBS (boot select)           |
//! | CONFIG0 | 5     | OCDPWM                      |
//! | CONFIG0 | 4     | OCDEN                       |
//! | CONFIG0 | 2     | RPD (reset pin disable)     |
//! | CONFIG0 | 1     | LOCK                        |
//! | CONFIG1 | 2:0   | LDSIZE                      |
//! | CONFIG2 | 7     | CBODEN                      |
//! | CONFIG2 | 5:4   | COV (brown-out voltage)     |
//! | CONFIG2 | 3     | BOIAP                       |
//! | CONFIG2 | 2     | CBORST                      |
//! | CONFIG3 | 7:4   | WDTEN                       |

use serde::{Deserialize, Serialize};

use super::{ChipFamily, ConfigFormat, ConfigSpace, DeviceId, TargetDefinition};
use crate::error::{Error, Result};

/// N76E003: 12 KiB flash, LDROM mapped at 0x3800 by the programmer
pub const N76E003: TargetDefinition = TargetDefinition {
    name: "N76E003",
    family: ChipFamily::N76E003,
    device_id: DeviceId::N76E003,
    program_memory_size: 12 * 1024,
    loader_offset: 0x3800,
    config: ConfigSpace {
        hex_offset: 0x0003_0000,
        min_size: N76E003Config::MIN_SIZE,
        read_size: 8,
        write_size: 32,
        format: ConfigFormat::N76E003,
    },
};

/// Where the CPU starts after reset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BootSelect {
    /// Boot from the loader region
    Ldrom,
    /// Boot from the application region
    Aprom,
}

/// LDROM size selected by CONFIG1.LDSIZE
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LdromSize {
    /// No LDROM
    #[serde(rename = "0kb")]
    Kb0,
    /// 1 KiB
    #[serde(rename = "1kb")]
    Kb1,
    /// 2 KiB
    #[serde(rename = "2kb")]
    Kb2,
    /// 3 KiB
    #[serde(rename = "3kb")]
    Kb3,
    /// 4 KiB
    #[serde(rename = "4kb")]
    Kb4,
}

/// LDSIZE codes in size order; any other code selects 4 KiB
const LDROM_SIZE_CODES: [(LdromSize, u8); 4] = [
    (LdromSize::Kb0, 7),
    (LdromSize::Kb1, 6),
    (LdromSize::Kb2, 5),
    (LdromSize::Kb3, 4),
];
const LDROM_4KB_CODE: u8 = 3;

impl LdromSize {
    /// Size in bytes
    pub fn bytes(self) -> usize {
        match self {
            LdromSize::Kb0 => 0,
            LdromSize::Kb1 => 1024,
            LdromSize::Kb2 => 2048,
            LdromSize::Kb3 => 3072,
            LdromSize::Kb4 => 4096,
        }
    }

    fn from_code(code: u8) -> Self {
        LDROM_SIZE_CODES
            .iter()
            .find(|&&(_, c)| c == code & 0x07)
            .map_or(LdromSize::Kb4, |&(size, _)| size)
    }

    fn code(self) -> u8 {
        LDROM_SIZE_CODES
            .iter()
            .find(|&&(size, _)| size == self)
            .map_or(LDROM_4KB_CODE, |&(_, c)| c)
    }
}

/// Brown-out detector threshold (CONFIG2.COV)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BodVoltage {
    /// 4.4 V
    #[serde(rename = "4v4")]
    V4_4,
    /// 3.7 V
    #[serde(rename = "3v7")]
    V3_7,
    /// 2.7 V
    #[serde(rename = "2v7")]
    V2_7,
    /// 2.2 V
    #[serde(rename = "2v2")]
    V2_2,
}

impl BodVoltage {
    fn from_code(code: u8) -> Self {
        match code & 0x03 {
            0 => BodVoltage::V4_4,
            1 => BodVoltage::V3_7,
            2 => BodVoltage::V2_7,
            _ => BodVoltage::V2_2,
        }
    }

    fn code(self) -> u8 {
        match self {
            BodVoltage::V4_4 => 0,
            BodVoltage::V3_7 => 1,
            BodVoltage::V2_7 => 2,
            BodVoltage::V2_2 => 3,
        }
    }
}

/// Watchdog mode (CONFIG3.WDTEN)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WdtMode {
    /// Watchdog off
    Disabled,
    /// Watchdog runs, stops in idle and power-down
    Enabled,
    /// Watchdog keeps running in idle and power-down
    EnabledAlways,
}

/// Decoded N76E003 configuration
///
/// Missing fields in a configuration document take the value of an erased
/// (all 0xFF) configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct N76E003Config {
    /// CONFIG0.CBS
    pub boot_select: BootSelect,
    /// CONFIG0.OCDPWM
    pub pwm_enabled_during_ocd: bool,
    /// CONFIG0.OCDEN
    pub ocd_enabled: bool,
    /// CONFIG0.RPD
    pub reset_pin_disabled: bool,
    /// CONFIG0.LOCK
    pub locked: bool,
    /// CONFIG1.LDSIZE
    pub ldrom_size: LdromSize,
    /// CONFIG2.CBODEN
    pub bod_disabled: bool,
    /// CONFIG2.COV
    pub bod_voltage: BodVoltage,
    /// CONFIG2.BOIAP
    pub iap_enabled_in_brownout: bool,
    /// CONFIG2.CBORST
    pub bod_reset_disabled: bool,
    /// CONFIG3.WDTEN
    pub wdt: WdtMode,
}

impl Default for N76E003Config {
    fn default() -> Self {
        Self {
            boot_select: BootSelect::Aprom,
            pwm_enabled_during_ocd: false,
            ocd_enabled: false,
            reset_pin_disabled: false,
            locked: false,
            ldrom_size: LdromSize::Kb0,
            bod_disabled: false,
            bod_voltage: BodVoltage::V2_2,
            iap_enabled_in_brownout: false,
            bod_reset_disabled: false,
            wdt: WdtMode::Disabled,
        }
    }
}

const CBS: u8 = 1 << 7;
const OCDPWM: u8 = 1 << 5;
const OCDEN: u8 = 1 << 4;
const RPD: u8 = 1 << 2;
const LOCK: u8 = 1 << 1;
const CBODEN: u8 = 1 << 7;
const COV_SHIFT: u8 = 4;
const BOIAP: u8 = 1 << 3;
const CBORST: u8 = 1 << 2;

/// Cleared bit means enabled
fn enabled(byte: u8, mask: u8) -> bool {
    byte & mask == 0
}

impl N76E003Config {
    /// CONFIG0..CONFIG3
    pub const MIN_SIZE: usize = 4;
    /// Length of the encoded form
    pub const ENCODED_SIZE: usize = 8;

    /// Decode CONFIG0..CONFIG3; trailing bytes are ignored
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let [c0, c1, c2, c3] = match bytes {
            [c0, c1, c2, c3, ..] => [*c0, *c1, *c2, *c3],
            _ => {
                return Err(Error::ConfigTooShort {
                    len: bytes.len(),
                    min: Self::MIN_SIZE,
                })
            }
        };

        Ok(Self {
            boot_select: if enabled(c0, CBS) {
                BootSelect::Ldrom
            } else {
                BootSelect::Aprom
            },
            pwm_enabled_during_ocd: enabled(c0, OCDPWM),
            ocd_enabled: enabled(c0, OCDEN),
            reset_pin_disabled: enabled(c0, RPD),
            locked: enabled(c0, LOCK),
            ldrom_size: LdromSize::from_code(c1),
            bod_disabled: enabled(c2, CBODEN),
            bod_voltage: BodVoltage::from_code(c2 >> COV_SHIFT),
            iap_enabled_in_brownout: enabled(c2, BOIAP),
            bod_reset_disabled: enabled(c2, CBORST),
            wdt: match c3 >> 4 {
                0xF => WdtMode::Disabled,
                0x5 => WdtMode::Enabled,
                _ => WdtMode::EnabledAlways,
            },
        })
    }

    /// Encode into the canonical 8-byte form
    ///
    /// The result is decoded again and compared with `self`; a difference is
    /// reported as [`Error::Invariant`].
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut buf = vec![0xFF; Self::ENCODED_SIZE];

        let clear = |byte: &mut u8, mask: u8, on: bool| {
            if on {
                *byte &= !mask;
            }
        };

        clear(&mut buf[0], CBS, self.boot_select == BootSelect::Ldrom);
        clear(&mut buf[0], OCDPWM, self.pwm_enabled_during_ocd);
        clear(&mut buf[0], OCDEN, self.ocd_enabled);
        clear(&mut buf[0], RPD, self.reset_pin_disabled);
        clear(&mut buf[0], LOCK, self.locked);

        buf[1] = 0xF8 | self.ldrom_size.code();

        clear(&mut buf[2], CBODEN, self.bod_disabled);
        buf[2] &= !(0x03 << COV_SHIFT) | (self.bod_voltage.code() << COV_SHIFT);
        clear(&mut buf[2], BOIAP, self.iap_enabled_in_brownout);
        clear(&mut buf[2], CBORST, self.bod_reset_disabled);

        buf[3] = match self.wdt {
            WdtMode::Disabled => 0xFF,
            WdtMode::Enabled => 0x5F,
            WdtMode::EnabledAlways => 0x0F,
        };

        let check = Self::decode(&buf)?;
        if check != *self {
            return Err(Error::Invariant(format!(
                "N76E003 configuration does not survive encoding: {:?} became {:?}",
                self, check
            )));
        }

        log::trace!("encoded N76E003 configuration: {:02X?}", buf);
        Ok(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_configs() -> Vec<N76E003Config> {
        let sizes = [
            LdromSize::Kb0,
            LdromSize::Kb1,
            LdromSize::Kb2,
            LdromSize::Kb3,
            LdromSize::Kb4,
        ];
        let voltages = [
            BodVoltage::V4_4,
            BodVoltage::V3_7,
            BodVoltage::V2_7,
            BodVoltage::V2_2,
        ];
        let wdts = [WdtMode::Disabled, WdtMode::Enabled, WdtMode::EnabledAlways];

        let mut out = Vec::new();
        for flags in 0u32..(1 << 9) {
            let bit = |n: u32| flags & (1 << n) != 0;
            for (i, &ldrom_size) in sizes.iter().enumerate() {
                // Walk the enumerations together to keep the grid small
                out.push(N76E003Config {
                    boot_select: if bit(0) {
                        BootSelect::Ldrom
                    } else {
                        BootSelect::Aprom
                    },
                    pwm_enabled_during_ocd: bit(1),
                    ocd_enabled: bit(2),
                    reset_pin_disabled: bit(3),
                    locked: bit(4),
                    ldrom_size,
                    bod_disabled: bit(5),
                    bod_voltage: voltages[(i + flags as usize) % voltages.len()],
                    iap_enabled_in_brownout: bit(6),
                    bod_reset_disabled: bit(7),
                    wdt: wdts[(i + (flags >> 8) as usize) % wdts.len()],
                });
            }
        }
        out
    }

    #[test]
    fn test_erased_config() {
        let cfg = N76E003Config::decode(&[0xFF; 4]).unwrap();
        assert_eq!(cfg, N76E003Config::default());
        assert_eq!(cfg.ldrom_size.bytes(), 0);
    }

    #[test]
    fn test_decode_fields() {
        let cfg = N76E003Config::decode(&[0x7F, 0xFD, 0x6F, 0x5F]).unwrap();
        assert_eq!(cfg.boot_select, BootSelect::Ldrom);
        assert!(!cfg.ocd_enabled);
        assert_eq!(cfg.ldrom_size, LdromSize::Kb2);
        assert!(cfg.bod_disabled);
        assert_eq!(cfg.bod_voltage, BodVoltage::V2_7);
        assert_eq!(cfg.wdt, WdtMode::Enabled);

        let cfg = N76E003Config::decode(&[0xCB, 0xFF, 0xF7, 0x3F]).unwrap();
        assert!(cfg.pwm_enabled_during_ocd);
        assert!(cfg.ocd_enabled);
        assert!(cfg.reset_pin_disabled);
        assert!(!cfg.locked);
        assert_eq!(cfg.bod_voltage, BodVoltage::V2_2);
        assert!(cfg.iap_enabled_in_brownout);
        assert!(!cfg.bod_reset_disabled);
        assert_eq!(cfg.wdt, WdtMode::EnabledAlways);
    }

    #[test]
    fn test_reserved_ldrom_codes_select_4kb() {
        for code in 0..4u8 {
            let cfg = N76E003Config::decode(&[0xFF, 0xF8 | code, 0xFF, 0xFF]).unwrap();
            assert_eq!(cfg.ldrom_size, LdromSize::Kb4);
        }
    }

    #[test]
    fn test_too_short() {
        assert!(matches!(
            N76E003Config::decode(&[0xFF; 3]),
            Err(Error::ConfigTooShort { len: 3, min: 4 })
        ));
    }

    #[test]
    fn test_encode_exact_bytes() {
        let cfg = N76E003Config {
            boot_select: BootSelect::Ldrom,
            ldrom_size: LdromSize::Kb2,
            bod_voltage: BodVoltage::V2_7,
            wdt: WdtMode::Enabled,
            ..Default::default()
        };
        assert_eq!(
            cfg.encode().unwrap(),
            [0x7F, 0xFD, 0xEF, 0x5F, 0xFF, 0xFF, 0xFF, 0xFF]
        );
        assert_eq!(N76E003Config::default().encode().unwrap(), [0xFF; 8]);
    }

    #[test]
    fn test_encode_decode_symmetry() {
        for cfg in all_configs() {
            let bytes = cfg.encode().unwrap();
            assert_eq!(bytes.len(), N76E003Config::ENCODED_SIZE);
            assert_eq!(N76E003Config::decode(&bytes).unwrap(), cfg);
        }
    }

    #[test]
    fn test_ldrom_sizes() {
        let sizes: Vec<usize> = [
            LdromSize::Kb0,
            LdromSize::Kb1,
            LdromSize::Kb2,
            LdromSize::Kb3,
            LdromSize::Kb4,
        ]
        .iter()
        .map(|s| s.bytes())
        .collect();
        assert_eq!(sizes, [0, 1024, 2048, 3072, 4096]);
    }

    #[test]
    fn test_partial_document_uses_erased_defaults() {
        let cfg: N76E003Config = toml::from_str("ldrom_size = \"4kb\"\nlocked = true\n").unwrap();
        assert_eq!(cfg.ldrom_size, LdromSize::Kb4);
        assert!(cfg.locked);
        assert_eq!(cfg.boot_select, BootSelect::Aprom);
        assert_eq!(cfg.wdt, WdtMode::Disabled);
    }

    #[test]
    fn test_document_rejects_unknown_values() {
        assert!(toml::from_str::<N76E003Config>("ldrom_size = \"5kb\"").is_err());
        assert!(toml::from_str::<N76E003Config>("turbo = true").is_err());
    }
}

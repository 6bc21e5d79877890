//! Board bring-up: clock and DRAM initialization run before an image can be
//! loaded into external memory.
//!
//! Out of reset the ROM only exposes internal RAM. A profile is an ordered
//! list of DCD batches, single register writes and settle delays. Built-in
//! profiles live here as static tables; other boards can supply the same
//! steps as a TOML script.

use std::borrow::Cow;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::error::{Result, SdpError};
use crate::events::{SdpEvent, SdpObserver};
use crate::platform::Platform;
use crate::protocol::DcdEntry;
use crate::session::SdpSession;
use crate::transport::HidTransport;

/// PLL1 lock time after enabling it.
pub const PLL_LOCK_DELAY_MS: u64 = 10;
/// MFN update completion after setting LDREQ.
pub const MFN_UPDATE_DELAY_MS: u64 = 10;
/// DDR clock divider taking effect.
pub const DDR_DIVIDER_DELAY_MS: u64 = 10;
/// DDR controller start.
pub const DDR_START_DELAY_MS: u64 = 10;

/// CCM clock switcher register.
const CCM_CCSR: u32 = 0x53FD_400C;
/// CCM DDR clock root register.
const CCM_CLK_DDR: u32 = 0x53FD_4098;
/// DRAM controller control register 0.
const DATABAHN_CTL00: u32 = 0x1400_0000;

fn default_format() -> u8 {
    32
}

/// One step of a bring-up sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum BringUpStep {
    Dcd {
        #[serde(default)]
        label: Cow<'static, str>,
        entries: Cow<'static, [DcdEntry]>,
    },
    WriteRegister {
        #[serde(default)]
        label: Cow<'static, str>,
        address: u32,
        value: u32,
        #[serde(default = "default_format")]
        format: u8,
    },
    Delay {
        #[serde(default)]
        label: Cow<'static, str>,
        millis: u64,
    },
}

impl BringUpStep {
    pub fn label(&self) -> &str {
        match self {
            BringUpStep::Dcd { label, .. }
            | BringUpStep::WriteRegister { label, .. }
            | BringUpStep::Delay { label, .. } => label,
        }
    }

    const fn dcd(label: &'static str, entries: &'static [DcdEntry]) -> Self {
        BringUpStep::Dcd {
            label: Cow::Borrowed(label),
            entries: Cow::Borrowed(entries),
        }
    }

    const fn write(label: &'static str, address: u32, value: u32) -> Self {
        BringUpStep::WriteRegister {
            label: Cow::Borrowed(label),
            address,
            value,
            format: 32,
        }
    }

    const fn delay(label: &'static str, millis: u64) -> Self {
        BringUpStep::Delay {
            label: Cow::Borrowed(label),
            millis,
        }
    }
}

/// Built-in bring-up profiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoardProfile {
    /// Kindle Touch and Kindle 4: PLL1 at 800 MHz, LPDDR1 (mDDR) at 200 MHz.
    KindleMddr,
}

impl BoardProfile {
    pub const ALL: &'static [BoardProfile] = &[BoardProfile::KindleMddr];

    pub fn name(self) -> &'static str {
        match self {
            BoardProfile::KindleMddr => "kindle-mddr",
        }
    }

    pub fn steps(self) -> Vec<BringUpStep> {
        match self {
            BoardProfile::KindleMddr => vec![
                BringUpStep::dcd("setup PLL1 stage 1", SETUP_PLL1_STAGE1),
                BringUpStep::delay("PLL1 lock", PLL_LOCK_DELAY_MS),
                BringUpStep::dcd("setup PLL1 stage 2", SETUP_PLL1_STAGE2),
                BringUpStep::delay("MFN update", MFN_UPDATE_DELAY_MS),
                BringUpStep::write("switch ARM back to PLL1", CCM_CCSR, 0x0000_0000),
                BringUpStep::dcd("enable clocks", ENABLE_CLOCKS),
                BringUpStep::write("DDR clock div 4", CCM_CLK_DDR, 0x8000_0004),
                BringUpStep::delay("DDR divider", DDR_DIVIDER_DELAY_MS),
                BringUpStep::dcd("LPDDR1 init", LPDDR1_INIT),
                BringUpStep::write("start DDR", DATABAHN_CTL00, 0x0000_0101),
                BringUpStep::delay("DDR start", DDR_START_DELAY_MS),
            ],
        }
    }
}

impl fmt::Display for BoardProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for BoardProfile {
    type Err = SdpError;

    fn from_str(s: &str) -> Result<Self> {
        BoardProfile::ALL
            .iter()
            .copied()
            .find(|p| p.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| SdpError::Parameter(format!("unknown board profile '{}'", s)))
    }
}

/// A bring-up sequence loaded from TOML.
///
/// ```toml
/// name = "my-board"
///
/// [[steps]]
/// op = "dcd"
/// label = "enable clocks"
/// entries = [{ address = 0x53FD4068, value = 0xFFFFFFFF }]
///
/// [[steps]]
/// op = "delay"
/// millis = 10
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardScript {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub steps: Vec<BringUpStep>,
}

impl BoardScript {
    pub fn from_profile(profile: BoardProfile) -> Self {
        Self {
            name: profile.name().to_string(),
            steps: profile.steps(),
        }
    }

    pub fn parse(content: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load a script from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Save the script to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

impl<T: HidTransport, O: SdpObserver, P: Platform> SdpSession<T, O, P> {
    /// Run a built-in profile.
    pub fn bring_up(&self, profile: BoardProfile) -> Result<()> {
        info!(profile = %profile, "Bringing up board");
        self.run_steps(&profile.steps())
    }

    /// Run a script loaded from TOML.
    pub fn run_script(&self, script: &BoardScript) -> Result<()> {
        info!(script = %script.name, steps = script.steps.len(), "Running bring-up script");
        self.run_steps(&script.steps)
    }

    /// Run `steps` in order, stopping at the first failure.
    #[instrument(skip_all, fields(steps = steps.len()))]
    pub fn run_steps(&self, steps: &[BringUpStep]) -> Result<()> {
        let total = steps.len() as u64;

        for (i, step) in steps.iter().enumerate() {
            debug!(step = i, label = step.label(), "Bring-up step");
            match step {
                BringUpStep::Dcd { entries, .. } => self.dcd_write(entries)?,
                BringUpStep::WriteRegister {
                    address,
                    value,
                    format,
                    ..
                } => self.write_register(*address, *value, *format)?,
                BringUpStep::Delay { millis, .. } => self.sleep(Duration::from_millis(*millis)),
            }

            self.emit(SdpEvent::Progress {
                operation: "bring-up".into(),
                current: i as u64 + 1,
                total,
            });
        }
        Ok(())
    }
}

/// Clock ARM from LP-APM and program PLL1 (MFN 180, MFD 179).
static SETUP_PLL1_STAGE1: &[DcdEntry] = &[
    // ARM domain from LP-APM
    DcdEntry::word(0x53FD400C, 0x00000004),
    // disable AREN auto-restart
    DcdEntry::word(0x63F80004, 0x00000000),
    DcdEntry::word(0x63F80008, 0x00000080),
    DcdEntry::word(0x63F8001C, 0x00000080),
    // MFN
    DcdEntry::word(0x63F80010, 0x000000B4),
    DcdEntry::word(0x63F80024, 0x000000B4),
    // MFD
    DcdEntry::word(0x63F8000C, 0x000000B3),
    DcdEntry::word(0x63F80020, 0x000000B3),
    // PLM=1, manual restart, enable
    DcdEntry::word(0x63F80000, 0x00001236),
];

/// Retune PLL1 to 800 MHz and request the MFN load.
static SETUP_PLL1_STAGE2: &[DcdEntry] = &[
    DcdEntry::word(0x63F80010, 0x0000003C),
    DcdEntry::word(0x63F80024, 0x0000003C),
    // LDREQ
    DcdEntry::word(0x63F80004, 0x00000001),
];

/// Ungate every clock the ROM left disabled.
static ENABLE_CLOCKS: &[DcdEntry] = &[
    DcdEntry::word(0x53FD4068, 0xFFFFFFFF),
    DcdEntry::word(0x53FD406C, 0xFFFFFFFF),
    DcdEntry::word(0x53FD4070, 0xFFFFFFFF),
    DcdEntry::word(0x53FD4074, 0xFFFFFFFF),
    DcdEntry::word(0x53FD4078, 0xFFFFFFFF),
    DcdEntry::word(0x53FD407C, 0xFFFFFFFF),
    DcdEntry::word(0x53FD4080, 0xFFFFFFFF),
    DcdEntry::word(0x53FD4084, 0xFFFFFFFF),
];

/// IOMUX pads, static ZQ calibration, DRAM controller and PHY for LPDDR1.
static LPDDR1_INIT: &[DcdEntry] = &[
    // IOMUX
    DcdEntry::word(0x53FA86AC, 0x00000000),
    DcdEntry::word(0x53FA866C, 0x00000000),
    DcdEntry::word(0x53FA868C, 0x00000000),
    DcdEntry::word(0x53FA8670, 0x00000000),
    DcdEntry::word(0x53FA86A4, 0x00180000),
    DcdEntry::word(0x53FA8668, 0x00180000),
    DcdEntry::word(0x53FA8698, 0x00180000),
    DcdEntry::word(0x53FA86A0, 0x00180000),
    DcdEntry::word(0x53FA86A8, 0x00180000),
    DcdEntry::word(0x53FA86B4, 0x00180000),
    DcdEntry::word(0x53FA8490, 0x00180000),
    DcdEntry::word(0x53FA8494, 0x00180000),
    DcdEntry::word(0x53FA8498, 0x00180000),
    DcdEntry::word(0x53FA849C, 0x00180000),
    DcdEntry::word(0x53FA84F0, 0x00180000),
    DcdEntry::word(0x53FA8500, 0x00180000),
    DcdEntry::word(0x53FA84C8, 0x00180000),
    DcdEntry::word(0x53FA8528, 0x00180080),
    DcdEntry::word(0x53FA84F4, 0x00180080),
    DcdEntry::word(0x53FA84FC, 0x00180080),
    DcdEntry::word(0x53FA84CC, 0x00180080),
    DcdEntry::word(0x53FA8524, 0x00180080),
    // static ZQ calibration
    DcdEntry::word(0x1400012C, 0x00000408),
    DcdEntry::word(0x14000128, 0x05090000),
    DcdEntry::word(0x14000124, 0x00310000),
    DcdEntry::word(0x14000124, 0x00200000),
    DcdEntry::word(0x14000128, 0x05090010),
    DcdEntry::word(0x14000124, 0x00310000),
    DcdEntry::word(0x14000124, 0x00200000),
    // controller
    DcdEntry::word(0x14000000, 0x00000100),
    DcdEntry::word(0x14000008, 0x00009C40),
    DcdEntry::word(0x1400000C, 0x00000000),
    DcdEntry::word(0x14000010, 0x00000000),
    DcdEntry::word(0x14000014, 0x20000000),
    DcdEntry::word(0x14000018, 0x01010006),
    DcdEntry::word(0x1400001C, 0x080B0201),
    DcdEntry::word(0x14000020, 0x02000303),
    DcdEntry::word(0x14000024, 0x0036B002),
    DcdEntry::word(0x14000028, 0x00000606),
    DcdEntry::word(0x1400002C, 0x06030400),
    DcdEntry::word(0x14000030, 0x01000000),
    DcdEntry::word(0x14000034, 0x00000A02),
    DcdEntry::word(0x14000038, 0x00000003),
    DcdEntry::word(0x1400003C, 0x00001801),
    DcdEntry::word(0x14000040, 0x00050612),
    DcdEntry::word(0x14000044, 0x00000200),
    DcdEntry::word(0x14000048, 0x001C001C),
    DcdEntry::word(0x1400004C, 0x00010000),
    DcdEntry::word(0x1400005C, 0x01000000),
    DcdEntry::word(0x14000060, 0x00000001),
    DcdEntry::word(0x14000064, 0x00000000),
    DcdEntry::word(0x14000068, 0x00320000),
    DcdEntry::word(0x1400006C, 0x00000000),
    DcdEntry::word(0x14000070, 0x00000000),
    DcdEntry::word(0x14000074, 0x00320000),
    DcdEntry::word(0x14000080, 0x02000000),
    DcdEntry::word(0x14000084, 0x00000100),
    DcdEntry::word(0x14000088, 0x02400040),
    DcdEntry::word(0x1400008C, 0x01000000),
    DcdEntry::word(0x14000090, 0x0A000100),
    DcdEntry::word(0x14000094, 0x01011F1F),
    DcdEntry::word(0x14000098, 0x01010101),
    DcdEntry::word(0x1400009C, 0x00030101),
    DcdEntry::word(0x140000A4, 0x00010000),
    DcdEntry::word(0x140000AC, 0x0000FFFF),
    DcdEntry::word(0x140000C8, 0x02020101),
    DcdEntry::word(0x140000CC, 0x00000000),
    DcdEntry::word(0x140000D0, 0x01000202),
    DcdEntry::word(0x140000D4, 0x00000200),
    DcdEntry::word(0x140000D8, 0x00000001),
    DcdEntry::word(0x140000DC, 0x0000FFFF),
    DcdEntry::word(0x140000E4, 0x02020000),
    DcdEntry::word(0x140000E8, 0x02020202),
    DcdEntry::word(0x140000EC, 0x00000202),
    DcdEntry::word(0x140000F0, 0x01010064),
    DcdEntry::word(0x140000F4, 0x01010101),
    DcdEntry::word(0x140000F8, 0x00010101),
    DcdEntry::word(0x140000FC, 0x00000064),
    DcdEntry::word(0x14000104, 0x02000602),
    DcdEntry::word(0x14000108, 0x06120000),
    DcdEntry::word(0x1400010C, 0x06120612),
    DcdEntry::word(0x14000110, 0x06120612),
    DcdEntry::word(0x14000114, 0x01030612),
    DcdEntry::word(0x14000118, 0x00010002),
    DcdEntry::word(0x1400011C, 0x00001000),
    // PHY
    DcdEntry::word(0x14000200, 0x00000000),
    DcdEntry::word(0x14000204, 0x00000000),
    DcdEntry::word(0x14000208, 0x35002725),
    DcdEntry::word(0x14000210, 0x35002725),
    DcdEntry::word(0x14000218, 0x35002725),
    DcdEntry::word(0x14000220, 0x35002725),
    DcdEntry::word(0x14000228, 0x35002725),
    DcdEntry::word(0x1400020C, 0x380002D0),
    DcdEntry::word(0x14000214, 0x380002D0),
    DcdEntry::word(0x1400021C, 0x380002D0),
    DcdEntry::word(0x14000224, 0x380002D0),
    DcdEntry::word(0x1400022C, 0x380002D0),
    DcdEntry::word(0x14000230, 0x00000000),
    DcdEntry::word(0x14000234, 0x00800006),
    DcdEntry::word(0x14000238, 0x60101414),
    DcdEntry::word(0x14000240, 0x60101414),
    DcdEntry::word(0x14000248, 0x60101414),
    DcdEntry::word(0x14000250, 0x60101414),
    DcdEntry::word(0x14000258, 0x60101414),
    DcdEntry::word(0x1400023C, 0x00101001),
    DcdEntry::word(0x14000244, 0x00101001),
    DcdEntry::word(0x1400024C, 0x00101001),
    DcdEntry::word(0x14000254, 0x00101001),
    DcdEntry::word(0x1400025C, 0x00102201),
];

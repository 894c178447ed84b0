//! Hardware capability snapshot.
//!
//! Read once when a device is attached and immutable afterwards: the
//! identification constant gates everything else, so a device that fails
//! the magic check is rejected before any further register access.

use crate::bus::RegisterBus;
use crate::control::types::CoreError;
use crate::regmap;

/// Firmware version words of the attached device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Version {
    pub design: u32,
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}.{}.{} (design {:#x})",
            self.major, self.minor, self.patch, self.design
        )
    }
}

/// Immutable self-description of the attached device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoreInfo {
    pub version: Version,
    /// Number of physical transmit links.
    pub link_count: u32,
    /// Total number of input source buffers.
    pub source_count: u32,
    /// Source buffers multiplexed into each link.
    pub sources_per_link: u32,
    /// Reference clock frequency in Hz.
    pub ref_freq: u32,
}

impl CoreInfo {
    /// Reads the identification and generics registers.
    ///
    /// The magic word is read and checked in its own bus transaction; an
    /// unidentified device is rejected before anything else is queued.
    ///
    /// # Errors
    ///
    /// [`CoreError::IdentityMismatch`] on an unknown magic value,
    /// [`CoreError::UnevenSourcePartition`] when the source count does not
    /// divide evenly across the links, or a bus error.
    pub(crate) fn read<B: RegisterBus>(bus: &mut B) -> Result<Self, CoreError> {
        let magic = bus.read(regmap::INFO_MAGIC);
        bus.flush()?;
        let found = magic.get()?;
        if found != regmap::IDENT_MAGIC {
            return Err(CoreError::IdentityMismatch {
                found,
                expected: regmap::IDENT_MAGIC,
            });
        }

        let design = bus.read(regmap::INFO_DESIGN);
        let major = bus.read(regmap::INFO_MAJOR);
        let minor = bus.read(regmap::INFO_MINOR);
        let patch = bus.read(regmap::INFO_PATCH);
        let n_mgts = bus.read(regmap::INFO_N_MGTS);
        let n_srcs = bus.read(regmap::INFO_N_SRCS);
        let ref_freq = bus.read(regmap::INFO_REF_FREQ);
        bus.flush()?;

        let link_count = n_mgts.get()?;
        let source_count = n_srcs.get()?;
        if link_count == 0 || source_count % link_count != 0 {
            return Err(CoreError::UnevenSourcePartition {
                source_count,
                link_count,
            });
        }

        Ok(Self {
            version: Version {
                design: design.get()?,
                major: major.get()?,
                minor: minor.get()?,
                patch: patch.get()?,
            },
            link_count,
            source_count,
            sources_per_link: source_count / link_count,
            ref_freq: ref_freq.get()?,
        })
    }
}

//! Supported module formats.
//!
//! The set is closed: detection walks [`TrackerFormat::ALL`] in order and the
//! first decoder accepting the data wins.

mod protracker1;
pub(crate) mod protracker2;
pub(crate) mod soundtracker;
mod soundtracker3;
mod soundtracker_compiled;
mod soundtracker_pro;
mod soundtracker_uncompiled;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::frequency::FrequencyTable;
use crate::model::Module;

/// Module format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrackerFormat {
    /// ProTracker 2.x.
    ProTracker2,
    /// Sound Tracker 1.x compiled module.
    SoundTrackerCompiled,
    /// Sound Tracker 3.x.
    SoundTracker3,
    /// ProTracker 1.x.
    ProTracker1,
    /// Sound Tracker Pro.
    SoundTrackerPro,
    /// Sound Tracker 1.x editor file.
    SoundTracker,
}

impl TrackerFormat {
    /// Detection order.
    ///
    /// Uncompiled Sound Tracker files come last: their only signature is the
    /// value ranges of a large fixed layout.
    pub const ALL: [TrackerFormat; 6] = [
        TrackerFormat::ProTracker2,
        TrackerFormat::SoundTrackerCompiled,
        TrackerFormat::SoundTracker3,
        TrackerFormat::ProTracker1,
        TrackerFormat::SoundTrackerPro,
        TrackerFormat::SoundTracker,
    ];

    /// Short identifier.
    pub fn id(self) -> &'static str {
        match self {
            TrackerFormat::ProTracker2 => "PT2",
            TrackerFormat::SoundTrackerCompiled => "STC",
            TrackerFormat::SoundTracker3 => "ST3",
            TrackerFormat::ProTracker1 => "PT1",
            TrackerFormat::SoundTrackerPro => "STP",
            TrackerFormat::SoundTracker => "ST",
        }
    }

    /// Human readable name.
    pub fn description(self) -> &'static str {
        match self {
            TrackerFormat::ProTracker2 => protracker2::PROGRAM,
            TrackerFormat::SoundTrackerCompiled => soundtracker_compiled::PROGRAM,
            TrackerFormat::SoundTracker3 => soundtracker3::PROGRAM,
            TrackerFormat::ProTracker1 => protracker1::PROGRAM,
            TrackerFormat::SoundTrackerPro => soundtracker_pro::PROGRAM,
            TrackerFormat::SoundTracker => soundtracker_uncompiled::PROGRAM,
        }
    }

    /// Tone table used by the format's player.
    pub fn frequency_table(self) -> FrequencyTable {
        match self {
            TrackerFormat::ProTracker1 | TrackerFormat::ProTracker2 => {
                FrequencyTable::protracker2()
            }
            TrackerFormat::SoundTrackerCompiled
            | TrackerFormat::SoundTracker3
            | TrackerFormat::SoundTrackerPro
            | TrackerFormat::SoundTracker => FrequencyTable::soundtracker(),
        }
    }

    /// Decode `data` as this format.
    pub fn decode(self, data: &[u8]) -> Result<Module> {
        match self {
            TrackerFormat::ProTracker2 => protracker2::decode(data),
            TrackerFormat::SoundTrackerCompiled => soundtracker_compiled::decode(data),
            TrackerFormat::SoundTracker3 => soundtracker3::decode(data),
            TrackerFormat::ProTracker1 => protracker1::decode(data),
            TrackerFormat::SoundTrackerPro => soundtracker_pro::decode(data),
            TrackerFormat::SoundTracker => soundtracker_uncompiled::decode(data),
        }
    }
}

impl fmt::Display for TrackerFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

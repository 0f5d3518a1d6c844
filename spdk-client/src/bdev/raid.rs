//! RAID bdevs.

use std::fmt;
use std::str::FromStr;

use crate::{Error, Result, SpdkClient};

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone, Default)]
#[serde(default)]
pub struct BdevRaidInfo {
    pub name: String,
    pub strip_size_kb: u32,
    pub state: String,
    pub raid_level: String,
    pub num_base_bdevs: u8,
    pub num_base_bdevs_discovered: u8,
    pub base_bdevs_list: Vec<String>,
}

/// Which RAID bdevs `bdev_raid_get_bdevs` lists.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone, Copy, Default)]
#[serde(rename_all = "lowercase")]
pub enum RaidCategory {
    #[default]
    All,
    /// Registered with the bdev layer.
    Online,
    /// Not every base bdev has been discovered yet.
    Configuring,
    /// Unregistered after an error or on request.
    Offline,
}

impl FromStr for RaidCategory {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "all" => Ok(RaidCategory::All),
            "online" => Ok(RaidCategory::Online),
            "configuring" => Ok(RaidCategory::Configuring),
            "offline" => Ok(RaidCategory::Offline),
            _ => Err(Error::Protocol(format!("unknown raid category '{}'", s))),
        }
    }
}

impl fmt::Display for RaidCategory {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            RaidCategory::All => "all",
            RaidCategory::Online => "online",
            RaidCategory::Configuring => "configuring",
            RaidCategory::Offline => "offline",
        })
    }
}

#[derive(Serialize, Debug)]
pub(crate) struct BdevRaidCreateRequest<'a> {
    pub name: &'a str,
    pub raid_level: &'a str,
    pub base_bdevs: &'a [String],
    pub strip_size_kb: u32,
}

#[derive(Serialize, Debug)]
pub(crate) struct BdevRaidDeleteRequest<'a> {
    pub name: &'a str,
}

#[derive(Serialize, Debug)]
pub(crate) struct BdevRaidGetBdevsRequest {
    pub category: RaidCategory,
}

impl SpdkClient {
    /// Create a RAID bdev over `base_bdevs`.
    ///
    /// `level` is one of `0`/`raid0`, `1`/`raid1`, `5f`/`raid5f` or `concat`.
    pub fn bdev_raid_create(
        &self,
        name: &str,
        level: &str,
        strip_size_kb: u32,
        base_bdevs: &[String],
    ) -> Result<bool> {
        self.send_command(
            "bdev_raid_create",
            BdevRaidCreateRequest {
                name,
                raid_level: level,
                base_bdevs,
                strip_size_kb,
            },
        )
    }

    pub fn bdev_raid_delete(&self, name: &str) -> Result<bool> {
        self.send_command("bdev_raid_delete", BdevRaidDeleteRequest { name })
    }

    pub fn bdev_raid_get_bdevs(&self, category: RaidCategory) -> Result<Vec<BdevRaidInfo>> {
        self.send_command("bdev_raid_get_bdevs", BdevRaidGetBdevsRequest { category })
    }
}

//! Block devices.

use serde_json::{Map, Value};

use crate::{Result, SpdkClient};

pub mod aio;
pub mod lvol;
pub mod nvme;
pub mod raid;

pub use self::aio::*;
pub use self::lvol::*;
pub use self::nvme::*;
pub use self::raid::*;

pub const DRIVER_NAME_AIO: &str = "aio";
pub const DRIVER_NAME_LVOL: &str = "lvol";
pub const PRODUCT_NAME_LVOL: &str = "Logical Volume";

/// Fields `bdev_get_bdevs` reports for every kind of bdev.
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone, Default)]
#[serde(default)]
pub struct BdevInfoBasic {
    pub name: String,
    pub aliases: Vec<String>,
    pub product_name: String,
    pub block_size: u32,
    pub num_blocks: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub md_size: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub md_interleave: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dif_type: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dif_is_head_of_md: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled_dif_check_types: Option<EnabledDifCheckTypes>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_rate_limits: Option<AssignedRateLimits>,

    pub claimed: bool,

    pub zoned: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zone_size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_open_zones: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub optimal_open_zones: Option<u64>,

    pub supported_io_types: SupportedIoTypes,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub memory_domains: Vec<MemoryDomain>,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone, Default)]
#[serde(default)]
pub struct EnabledDifCheckTypes {
    pub reftag: bool,
    pub apptag: bool,
    pub guard: bool,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone, Default)]
#[serde(default)]
pub struct AssignedRateLimits {
    pub rw_ios_per_sec: u64,
    pub rw_mbytes_per_sec: u64,
    pub r_mbytes_per_sec: u64,
    pub w_mbytes_per_sec: u64,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone, Default)]
#[serde(default)]
pub struct SupportedIoTypes {
    pub read: bool,
    pub write: bool,
    pub unmap: bool,
    pub write_zeroes: bool,
    pub flush: bool,
    pub reset: bool,
    pub compare: bool,
    pub compare_and_write: bool,
    pub abort: bool,
    pub nvme_admin: bool,
    pub nvme_io: bool,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone, Default)]
#[serde(default)]
pub struct MemoryDomain {
    pub dma_device_id: String,
    pub dma_device_type: i32,
}

/// A bdev of any driver; the driver section is kept as raw JSON.
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone, Default)]
pub struct BdevInfo {
    #[serde(flatten)]
    pub basic: BdevInfoBasic,
    #[serde(default)]
    pub driver_specific: Map<String, Value>,
}

#[derive(Serialize, Debug, Default)]
pub(crate) struct BdevGetBdevsRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
}

impl SpdkClient {
    /// List block devices, or only the one called `name`.
    ///
    /// `timeout_ms` lets the daemon wait for a named bdev to appear; without
    /// it the method returns immediately whether the bdev exists or not.
    pub fn bdev_get_bdevs(&self, name: Option<&str>, timeout_ms: Option<u64>) -> Result<Vec<BdevInfo>> {
        self.send_command(
            "bdev_get_bdevs",
            BdevGetBdevsRequest {
                name,
                timeout: timeout_ms,
            },
        )
    }

    /// `bdev_get_bdevs`, keeping the raw entries that `keep` accepts.
    pub(crate) fn bdev_get_bdevs_filtered<F>(
        &self,
        name: Option<&str>,
        timeout_ms: Option<u64>,
        keep: F,
    ) -> Result<Vec<Value>>
    where
        F: Fn(&Value) -> bool,
    {
        let bdevs: Vec<Value> = self.send_command(
            "bdev_get_bdevs",
            BdevGetBdevsRequest {
                name,
                timeout: timeout_ms,
            },
        )?;
        Ok(bdevs.into_iter().filter(|b| keep(b)).collect())
    }
}

/// Whether the bdev carries a `driver_specific` section of `driver`.
pub(crate) fn has_driver(bdev: &Value, driver: &str) -> bool {
    bdev.get("driver_specific")
        .and_then(|d| d.get(driver))
        .is_some()
}

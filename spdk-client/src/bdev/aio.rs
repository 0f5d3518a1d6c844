//! Linux AIO bdevs.

use std::collections::HashMap;

use log::debug;

use super::{has_driver, BdevInfoBasic, DRIVER_NAME_AIO};
use crate::{decode_result, Result, SpdkClient};

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone, Default)]
pub struct BdevAioInfo {
    #[serde(flatten)]
    pub basic: BdevInfoBasic,
    #[serde(default)]
    pub driver_specific: HashMap<String, BdevAioDriverSpecificInfo>,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone, Default)]
#[serde(default)]
pub struct BdevAioDriverSpecificInfo {
    pub filename: String,
    pub block_size_override: bool,
    pub readonly: bool,
}

#[derive(Serialize, Debug)]
pub(crate) struct BdevAioCreateRequest<'a> {
    pub name: &'a str,
    pub filename: &'a str,
    pub block_size: u64,
}

#[derive(Serialize, Debug)]
pub(crate) struct BdevAioDeleteRequest<'a> {
    pub name: &'a str,
}

impl SpdkClient {
    /// Create a bdev on top of a file or block device; returns its name.
    pub fn bdev_aio_create(&self, filename: &str, name: &str, block_size: u64) -> Result<String> {
        self.send_command(
            "bdev_aio_create",
            BdevAioCreateRequest {
                name,
                filename,
                block_size,
            },
        )
    }

    pub fn bdev_aio_delete(&self, name: &str) -> Result<bool> {
        self.send_command("bdev_aio_delete", BdevAioDeleteRequest { name })
    }

    /// AIO bdevs, all of them if `name` is unset.
    pub fn bdev_aio_get(&self, name: Option<&str>, timeout_ms: Option<u64>) -> Result<Vec<BdevAioInfo>> {
        let bdevs = self.bdev_get_bdevs_filtered(name, timeout_ms, |b| has_driver(b, DRIVER_NAME_AIO))?;
        debug!("{} aio bdevs", bdevs.len());

        bdevs
            .iter()
            .map(|b| decode_result("bdev_get_bdevs", b))
            .collect()
    }
}

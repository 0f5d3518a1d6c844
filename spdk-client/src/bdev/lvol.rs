//! Logical volume stores and logical volumes.
//!
//! A logical volume is addressed by its UUID or by its alias
//! `<LVSTORE NAME>/<LVOL NAME>`.

use std::collections::HashMap;

use log::debug;
use serde_json::Value;

use super::{has_driver, BdevInfoBasic, DRIVER_NAME_LVOL, PRODUCT_NAME_LVOL};
use crate::{decode_result, Result, SpdkClient};

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone, Default)]
#[serde(default)]
pub struct LvstoreInfo {
    pub uuid: String,
    pub name: String,
    pub base_bdev: String,
    pub total_data_clusters: u64,
    pub free_clusters: u64,
    pub block_size: u64,
    pub cluster_size: u64,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone, Default)]
pub struct BdevLvolInfo {
    #[serde(flatten)]
    pub basic: BdevInfoBasic,
    #[serde(default)]
    pub driver_specific: HashMap<String, BdevLvolDriverSpecificInfo>,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone, Default)]
#[serde(default)]
pub struct BdevLvolDriverSpecificInfo {
    pub lvol_store_uuid: String,
    pub base_bdev: String,
    pub thin_provision: bool,
    pub snapshot: bool,
    pub clone: bool,
}

#[derive(Serialize, Debug)]
pub(crate) struct BdevLvolCreateLvstoreRequest<'a> {
    pub bdev_name: &'a str,
    pub lvs_name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cluster_sz: Option<u32>,
}

/// Selects a store by name or by UUID.
#[derive(Serialize, Debug, Default)]
pub(crate) struct LvstoreSelector<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uuid: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lvs_name: Option<&'a str>,
}

#[derive(Serialize, Debug)]
pub(crate) struct BdevLvolCreateRequest<'a> {
    pub lvs_name: &'a str,
    pub lvol_name: &'a str,
    pub size: u64,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub thin_provision: bool,
}

#[derive(Serialize, Debug)]
pub(crate) struct LvolNameRequest<'a> {
    pub name: &'a str,
}

#[derive(Serialize, Debug)]
pub(crate) struct BdevLvolSnapshotRequest<'a> {
    pub lvol_name: &'a str,
    pub snapshot_name: &'a str,
}

#[derive(Serialize, Debug)]
pub(crate) struct BdevLvolCloneRequest<'a> {
    pub snapshot_name: &'a str,
    pub clone_name: &'a str,
}

#[derive(Serialize, Debug)]
pub(crate) struct BdevLvolResizeRequest<'a> {
    pub name: &'a str,
    pub size: u64,
}

fn is_lvol(bdev: &Value) -> bool {
    bdev.get("product_name").and_then(Value::as_str) == Some(PRODUCT_NAME_LVOL)
        && has_driver(bdev, DRIVER_NAME_LVOL)
}

impl SpdkClient {
    /// Create a logical volume store on `bdev_name`; returns its UUID.
    pub fn bdev_lvol_create_lvstore(
        &self,
        bdev_name: &str,
        lvs_name: &str,
        cluster_sz: Option<u32>,
    ) -> Result<String> {
        self.send_command(
            "bdev_lvol_create_lvstore",
            BdevLvolCreateLvstoreRequest {
                bdev_name,
                lvs_name,
                cluster_sz,
            },
        )
    }

    /// Destroy a store given by either name or UUID.
    pub fn bdev_lvol_delete_lvstore(&self, lvs_name: Option<&str>, uuid: Option<&str>) -> Result<bool> {
        self.send_command("bdev_lvol_delete_lvstore", LvstoreSelector { uuid, lvs_name })
    }

    /// Stores matching name or UUID, all of them if neither is given.
    pub fn bdev_lvol_get_lvstores(
        &self,
        lvs_name: Option<&str>,
        uuid: Option<&str>,
    ) -> Result<Vec<LvstoreInfo>> {
        self.send_command("bdev_lvol_get_lvstores", LvstoreSelector { uuid, lvs_name })
    }

    /// Create a logical volume of `size` bytes; returns its UUID.
    pub fn bdev_lvol_create(
        &self,
        lvs_name: &str,
        lvol_name: &str,
        size: u64,
        thin_provision: bool,
    ) -> Result<String> {
        self.send_command(
            "bdev_lvol_create",
            BdevLvolCreateRequest {
                lvs_name,
                lvol_name,
                size,
                thin_provision,
            },
        )
    }

    pub fn bdev_lvol_delete(&self, name: &str) -> Result<bool> {
        self.send_command("bdev_lvol_delete", LvolNameRequest { name })
    }

    /// Logical volumes, all of them if `name` is unset.
    pub fn bdev_lvol_get(&self, name: Option<&str>, timeout_ms: Option<u64>) -> Result<Vec<BdevLvolInfo>> {
        let bdevs = self.bdev_get_bdevs_filtered(name, timeout_ms, is_lvol)?;
        debug!("{} lvol bdevs", bdevs.len());

        bdevs
            .iter()
            .map(|b| decode_result("bdev_get_bdevs", b))
            .collect()
    }

    /// Capture the current state of `name` as a new read-only lvol; returns
    /// the snapshot UUID.
    pub fn bdev_lvol_snapshot(&self, name: &str, snapshot_name: &str) -> Result<String> {
        self.send_command(
            "bdev_lvol_snapshot",
            BdevLvolSnapshotRequest {
                lvol_name: name,
                snapshot_name,
            },
        )
    }

    /// Create a writable lvol backed by `snapshot`; returns the clone UUID.
    pub fn bdev_lvol_clone(&self, snapshot: &str, clone_name: &str) -> Result<String> {
        self.send_command(
            "bdev_lvol_clone",
            BdevLvolCloneRequest {
                snapshot_name: snapshot,
                clone_name,
            },
        )
    }

    /// Copy the clusters allocated in the parent and drop the dependency on
    /// it. Clusters thin provisioned in the parent stay thin provisioned.
    pub fn bdev_lvol_decouple_parent(&self, name: &str) -> Result<bool> {
        self.send_command("bdev_lvol_decouple_parent", LvolNameRequest { name })
    }

    /// Resize `name` to `size` bytes.
    pub fn bdev_lvol_resize(&self, name: &str, size: u64) -> Result<bool> {
        self.send_command("bdev_lvol_resize", BdevLvolResizeRequest { name, size })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn lvstore_selector_omits_unset() {
        let req = LvstoreSelector {
            lvs_name: Some("lvs0"),
            ..Default::default()
        };
        assert_eq!(serde_json::to_value(&req).unwrap(), json!({"lvs_name": "lvs0"}));
    }

    #[test]
    fn thin_provision_only_when_set() {
        let mut req = BdevLvolCreateRequest {
            lvs_name: "lvs0",
            lvol_name: "lv0",
            size: 1 << 20,
            thin_provision: false,
        };
        assert!(serde_json::to_value(&req).unwrap().get("thin_provision").is_none());

        req.thin_provision = true;
        assert_eq!(serde_json::to_value(&req).unwrap()["thin_provision"], true);
    }

    #[test]
    fn lvol_filter() {
        let lvol = json!({
            "name": "lv0",
            "product_name": "Logical Volume",
            "driver_specific": {"lvol": {"base_bdev": "aio0"}}
        });
        let aio = json!({
            "name": "aio0",
            "product_name": "AIO disk",
            "driver_specific": {"aio": {"filename": "/dev/foo"}}
        });
        assert!(is_lvol(&lvol));
        assert!(!is_lvol(&aio));
    }
}

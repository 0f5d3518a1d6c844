//! NVMe controllers and the bdevs of their namespaces.

use crate::{Result, SpdkClient};

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone, Default)]
#[serde(default)]
pub struct BdevNvmeControllerInfo {
    pub name: String,
    pub ctrlrs: Vec<NvmeControllerInfo>,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone, Default)]
#[serde(default)]
pub struct NvmeControllerInfo {
    pub state: String,
    pub cntlid: u16,
    pub trid: NvmeControllerTrid,
    pub host: NvmeControllerHost,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone, Default)]
#[serde(default)]
pub struct NvmeControllerTrid {
    pub trtype: String,
    pub adrfam: String,
    pub traddr: String,
    pub trsvcid: String,
    pub subnqn: String,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone, Default)]
#[serde(default)]
pub struct NvmeControllerHost {
    pub nqn: String,
    pub addr: String,
    pub svcid: String,
}

/// Parameters of `bdev_nvme_attach_controller`.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone, Default)]
pub struct BdevNvmeAttachControllerRequest {
    /// Controller name, the prefix of every bdev it creates.
    pub name: String,
    /// `tcp`, `rdma` or `pcie`.
    pub trtype: String,
    /// IP address or PCI BDF.
    pub traddr: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subnqn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trsvcid: Option<String>,
    /// `ipv4`, `ipv6`, `ib`, `fc` or `intra_host`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub adrfam: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostaddr: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostsvcid: Option<String>,
}

#[derive(Serialize, Debug)]
pub(crate) struct BdevNvmeControllerNameRequest<'a> {
    pub name: &'a str,
}

#[derive(Serialize, Debug, Default)]
pub(crate) struct BdevNvmeGetControllersRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<&'a str>,
}

impl SpdkClient {
    /// Attach a controller; returns the names of the bdevs created for its
    /// namespaces.
    pub fn bdev_nvme_attach_controller(&self, req: &BdevNvmeAttachControllerRequest) -> Result<Vec<String>> {
        self.send_command("bdev_nvme_attach_controller", req)
    }

    /// Detach a controller and delete its bdevs.
    pub fn bdev_nvme_detach_controller(&self, name: &str) -> Result<bool> {
        self.send_command("bdev_nvme_detach_controller", BdevNvmeControllerNameRequest { name })
    }

    pub fn bdev_nvme_get_controllers(&self, name: Option<&str>) -> Result<Vec<BdevNvmeControllerInfo>> {
        self.send_command("bdev_nvme_get_controllers", BdevNvmeGetControllersRequest { name })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn attach_request_omits_unset() {
        let req = BdevNvmeAttachControllerRequest {
            name: "nvme0".into(),
            trtype: "tcp".into(),
            traddr: "10.0.0.1".into(),
            trsvcid: Some("4420".into()),
            ..Default::default()
        };
        assert_eq!(
            serde_json::to_value(&req).unwrap(),
            json!({"name": "nvme0", "trtype": "tcp", "traddr": "10.0.0.1", "trsvcid": "4420"})
        );
    }
}

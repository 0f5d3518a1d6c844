//! NVMe over Fabrics target: transports, subsystems, namespaces and
//! listeners.

use log::debug;

use crate::{Result, SpdkClient};

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone, Default)]
#[serde(default)]
pub struct NvmfTransport {
    pub trtype: String,
    pub max_queue_depth: u32,
    pub max_io_qpairs_per_ctrlr: u32,
    pub in_capsule_data_size: u32,
    pub max_io_size: u32,
    pub io_unit_size: u32,
    pub max_aq_depth: u32,
    pub num_shared_buffers: u32,
    pub buf_cache_size: u32,
    pub sock_priority: u32,
    pub abort_timeout_sec: u32,
    pub dif_insert_or_strip: bool,
    pub zcopy: bool,
    pub c2h_success: bool,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone, Default)]
#[serde(default)]
pub struct NvmfSubsystem {
    pub nqn: String,
    pub subtype: String,
    pub listen_addresses: Vec<ListenAddress>,
    pub allow_any_host: bool,
    pub hosts: Vec<NvmfSubsystemHost>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub serial_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_namespaces: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_cntlid: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_cntlid: Option<u32>,
    pub namespaces: Vec<NvmfSubsystemNamespace>,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone, Default)]
#[serde(default)]
pub struct NvmfSubsystemNamespace {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nsid: Option<u32>,
    pub bdev_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nguid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eui64: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anagrpid: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ptpl_file: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone, Default)]
#[serde(default)]
pub struct NvmfSubsystemHost {
    pub nqn: String,
}

/// Transport address a subsystem listens on.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone, Default)]
#[serde(default)]
pub struct ListenAddress {
    /// `tcp` or `rdma`.
    pub trtype: String,
    /// `IPv4`, `IPv6`, `IB` or `FC`.
    pub adrfam: String,
    pub traddr: String,
    pub trsvcid: String,
}

#[derive(Serialize, Debug)]
pub(crate) struct NvmfCreateTransportRequest<'a> {
    pub trtype: &'a str,
}

#[derive(Serialize, Debug, Default)]
pub(crate) struct NvmfGetTransportRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tgt_name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trtype: Option<&'a str>,
}

#[derive(Serialize, Debug)]
pub(crate) struct NvmfCreateSubsystemRequest<'a> {
    pub nqn: &'a str,
    pub allow_any_host: bool,
}

#[derive(Serialize, Debug)]
pub(crate) struct NvmfDeleteSubsystemRequest<'a> {
    pub nqn: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tgt_name: Option<&'a str>,
}

#[derive(Serialize, Debug, Default)]
pub(crate) struct NvmfGetSubsystemsRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tgt_name: Option<&'a str>,
}

#[derive(Serialize, Debug)]
pub(crate) struct NvmfSubsystemAddNsRequest<'a> {
    pub nqn: &'a str,
    pub namespace: NvmfSubsystemNamespace,
}

#[derive(Serialize, Debug)]
pub(crate) struct NvmfSubsystemRemoveNsRequest<'a> {
    pub nqn: &'a str,
    pub nsid: u32,
}

#[derive(Serialize, Debug)]
pub(crate) struct NvmfSubsystemListenerRequest<'a> {
    pub nqn: &'a str,
    pub listen_address: &'a ListenAddress,
}

/// Namespaces of the subsystem `nqn`, narrowed to a bdev and/or a nsid.
fn select_namespaces(
    subsystems: Vec<NvmfSubsystem>,
    nqn: &str,
    bdev_name: Option<&str>,
    nsid: Option<u32>,
) -> Vec<NvmfSubsystemNamespace> {
    subsystems
        .into_iter()
        .filter(|s| s.nqn == nqn)
        .flat_map(|s| s.namespaces)
        .filter(|ns| nsid.map_or(true, |nsid| ns.nsid == Some(nsid)))
        .filter(|ns| bdev_name.map_or(true, |name| ns.bdev_name == name))
        .collect()
}

impl SpdkClient {
    /// Initialize a transport, `tcp` or `rdma`.
    pub fn nvmf_create_transport(&self, trtype: &str) -> Result<bool> {
        self.send_command("nvmf_create_transport", NvmfCreateTransportRequest { trtype })
    }

    /// Transports of the target, all of them if `trtype` is unset.
    pub fn nvmf_get_transport(&self, trtype: Option<&str>, tgt_name: Option<&str>) -> Result<Vec<NvmfTransport>> {
        self.send_command("nvmf_get_transport", NvmfGetTransportRequest { tgt_name, trtype })
    }

    pub fn nvmf_create_subsystem(&self, nqn: &str, allow_any_host: bool) -> Result<bool> {
        self.send_command(
            "nvmf_create_subsystem",
            NvmfCreateSubsystemRequest { nqn, allow_any_host },
        )
    }

    pub fn nvmf_delete_subsystem(&self, nqn: &str, tgt_name: Option<&str>) -> Result<bool> {
        self.send_command("nvmf_delete_subsystem", NvmfDeleteSubsystemRequest { nqn, tgt_name })
    }

    pub fn nvmf_get_subsystems(&self, tgt_name: Option<&str>) -> Result<Vec<NvmfSubsystem>> {
        self.send_command("nvmf_get_subsystems", NvmfGetSubsystemsRequest { tgt_name })
    }

    /// Expose `bdev_name` as a namespace of `nqn`; returns the namespace id.
    pub fn nvmf_subsystem_add_ns(&self, nqn: &str, bdev_name: &str) -> Result<u32> {
        self.send_command(
            "nvmf_subsystem_add_ns",
            NvmfSubsystemAddNsRequest {
                nqn,
                namespace: NvmfSubsystemNamespace {
                    bdev_name: bdev_name.into(),
                    ..Default::default()
                },
            },
        )
    }

    pub fn nvmf_subsystem_remove_ns(&self, nqn: &str, nsid: u32) -> Result<bool> {
        self.send_command("nvmf_subsystem_remove_ns", NvmfSubsystemRemoveNsRequest { nqn, nsid })
    }

    /// Namespaces of `nqn`, narrowed to those matching every given filter.
    pub fn nvmf_subsystem_get_nss(
        &self,
        nqn: &str,
        bdev_name: Option<&str>,
        nsid: Option<u32>,
    ) -> Result<Vec<NvmfSubsystemNamespace>> {
        let subsystems = self.nvmf_get_subsystems(None)?;
        let nss = select_namespaces(subsystems, nqn, bdev_name, nsid);
        debug!("{} namespaces of {}", nss.len(), nqn);
        Ok(nss)
    }

    pub fn nvmf_subsystem_add_listener(&self, nqn: &str, address: &ListenAddress) -> Result<bool> {
        self.send_command(
            "nvmf_subsystem_add_listener",
            NvmfSubsystemListenerRequest {
                nqn,
                listen_address: address,
            },
        )
    }

    pub fn nvmf_subsystem_remove_listener(&self, nqn: &str, address: &ListenAddress) -> Result<bool> {
        self.send_command(
            "nvmf_subsystem_remove_listener",
            NvmfSubsystemListenerRequest {
                nqn,
                listen_address: address,
            },
        )
    }
}

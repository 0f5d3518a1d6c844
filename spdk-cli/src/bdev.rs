use anyhow::{anyhow, Result};
use clap::{value_parser, Arg, ArgAction, ArgGroup, ArgMatches, Command};
use serde_json::{json, Value};
use spdk_client::bdev::{BdevNvmeAttachControllerRequest, RaidCategory};

use crate::{get_str, require_str, Context};

fn wait_timeout_arg() -> Arg {
    Arg::new("timeout")
        .short('t')
        .long("timeout")
        .value_name("MS")
        .value_parser(value_parser!(u64))
        .help("how long the daemon waits for the bdev to appear")
}

fn name_arg(required: bool) -> Arg {
    Arg::new("NAME").required(required)
}

fn alias_or_uuid() -> [Arg; 2] {
    [
        Arg::new("alias-name")
            .long("alias-name")
            .value_name("LVSTORE/LVOL")
            .help("alias of the lvol, <LVSTORE NAME>/<LVOL NAME>"),
        Arg::new("uuid")
            .long("uuid")
            .value_name("UUID")
            .conflicts_with("alias-name"),
    ]
}

fn lvol_group() -> ArgGroup {
    ArgGroup::new("lvol")
        .args(["alias-name", "uuid"])
        .required(true)
}

/// `--alias-name` if given, else `--uuid`.
fn lvol_name(m: &ArgMatches) -> Option<&str> {
    get_str(m, "alias-name").or_else(|| get_str(m, "uuid"))
}

pub fn bdev_command() -> Command {
    Command::new("bdev")
        .about("Inspect block devices of any driver")
        .subcommand_required(true)
        .subcommand(
            Command::new("get")
                .about("List all bdevs, or the one called NAME")
                .arg(name_arg(false))
                .arg(wait_timeout_arg()),
        )
}

pub fn bdev(ctx: &Context, m: &ArgMatches) -> Result<Value> {
    match m.subcommand() {
        Some(("get", sub)) => {
            let bdevs = ctx
                .client()?
                .bdev_get_bdevs(get_str(sub, "NAME"), sub.get_one::<u64>("timeout").copied())?;
            Ok(serde_json::to_value(bdevs)?)
        }
        _ => Err(anyhow!("unknown bdev command")),
    }
}

pub fn aio_command() -> Command {
    Command::new("bdev-aio")
        .visible_alias("aio")
        .about("Manage Linux AIO bdevs")
        .subcommand_required(true)
        .subcommand(
            Command::new("create")
                .about("Create a bdev on top of a file or block device")
                .arg(Arg::new("FILENAME").required(true).help("path of the block device or file"))
                .arg(name_arg(true))
                .arg(
                    Arg::new("block-size")
                        .short('b')
                        .long("block-size")
                        .value_name("BYTES")
                        .value_parser(value_parser!(u64))
                        .default_value("4096"),
                ),
        )
        .subcommand(
            Command::new("delete")
                .about("Delete an AIO bdev")
                .arg(name_arg(true)),
        )
        .subcommand(
            Command::new("get")
                .about("List all AIO bdevs, or the one called NAME")
                .arg(name_arg(false))
                .arg(wait_timeout_arg()),
        )
}

pub fn aio(ctx: &Context, m: &ArgMatches) -> Result<Value> {
    let spdk = ctx.client()?;

    match m.subcommand() {
        Some(("create", sub)) => {
            let block_size = sub.get_one::<u64>("block-size").copied().unwrap_or(4096);
            let name = spdk.bdev_aio_create(require_str(sub, "FILENAME")?, require_str(sub, "NAME")?, block_size)?;
            Ok(json!({ "bdev_name": name }))
        }
        Some(("delete", sub)) => Ok(Value::Bool(spdk.bdev_aio_delete(require_str(sub, "NAME")?)?)),
        Some(("get", sub)) => {
            let bdevs = spdk.bdev_aio_get(get_str(sub, "NAME"), sub.get_one::<u64>("timeout").copied())?;
            Ok(serde_json::to_value(bdevs)?)
        }
        _ => Err(anyhow!("unknown bdev-aio command")),
    }
}

fn lvstore_selector() -> [Arg; 2] {
    [
        Arg::new("lvs-name").long("lvs-name").value_name("NAME"),
        Arg::new("uuid")
            .long("uuid")
            .value_name("UUID")
            .conflicts_with("lvs-name"),
    ]
}

pub fn lvstore_command() -> Command {
    Command::new("bdev-lvstore")
        .visible_alias("lvs")
        .about("Manage logical volume stores")
        .subcommand_required(true)
        .subcommand(
            Command::new("create")
                .about("Create a logical volume store on a bdev")
                .arg(Arg::new("BDEV").required(true))
                .arg(Arg::new("LVS").required(true).help("name of the new store"))
                .arg(
                    Arg::new("cluster-sz")
                        .long("cluster-sz")
                        .value_name("BYTES")
                        .value_parser(value_parser!(u32)),
                ),
        )
        .subcommand(
            Command::new("delete")
                .about("Delete a store given by name or UUID")
                .args(lvstore_selector())
                .group(ArgGroup::new("lvs").args(["lvs-name", "uuid"]).required(true)),
        )
        .subcommand(
            Command::new("get")
                .about("List all stores, or the one given by name or UUID")
                .args(lvstore_selector()),
        )
}

pub fn lvstore(ctx: &Context, m: &ArgMatches) -> Result<Value> {
    let spdk = ctx.client()?;

    match m.subcommand() {
        Some(("create", sub)) => {
            let uuid = spdk.bdev_lvol_create_lvstore(
                require_str(sub, "BDEV")?,
                require_str(sub, "LVS")?,
                sub.get_one::<u32>("cluster-sz").copied(),
            )?;
            Ok(json!({ "uuid": uuid }))
        }
        Some(("delete", sub)) => Ok(Value::Bool(
            spdk.bdev_lvol_delete_lvstore(get_str(sub, "lvs-name"), get_str(sub, "uuid"))?,
        )),
        Some(("get", sub)) => {
            let stores = spdk.bdev_lvol_get_lvstores(get_str(sub, "lvs-name"), get_str(sub, "uuid"))?;
            Ok(serde_json::to_value(stores)?)
        }
        _ => Err(anyhow!("unknown bdev-lvstore command")),
    }
}

fn size_arg() -> Arg {
    Arg::new("size")
        .long("size")
        .value_name("BYTES")
        .value_parser(value_parser!(u64))
        .required(true)
}

pub fn lvol_command() -> Command {
    Command::new("bdev-lvol")
        .visible_alias("lvol")
        .about("Manage logical volumes")
        .subcommand_required(true)
        .subcommand(
            Command::new("create")
                .about("Create a logical volume in a store")
                .arg(Arg::new("lvs-name").long("lvs-name").value_name("NAME").required(true))
                .arg(Arg::new("lvol-name").long("lvol-name").value_name("NAME").required(true))
                .arg(size_arg())
                .arg(
                    Arg::new("thin-provision")
                        .long("thin-provision")
                        .action(ArgAction::SetTrue)
                        .help("allocate clusters on first write"),
                ),
        )
        .subcommand(
            Command::new("delete")
                .about("Delete a logical volume")
                .args(alias_or_uuid())
                .group(lvol_group()),
        )
        .subcommand(
            Command::new("get")
                .about("List all logical volumes, or the one given by alias or UUID")
                .args(alias_or_uuid())
                .arg(wait_timeout_arg()),
        )
        .subcommand(
            Command::new("snapshot")
                .about("Capture the current state of a logical volume")
                .args(alias_or_uuid())
                .group(lvol_group())
                .arg(
                    Arg::new("snapshot-name")
                        .long("snapshot-name")
                        .value_name("NAME")
                        .required(true),
                ),
        )
        .subcommand(
            Command::new("clone")
                .about("Create a writable logical volume from a snapshot")
                .arg(
                    Arg::new("snapshot")
                        .long("snapshot")
                        .value_name("LVSTORE/SNAPSHOT")
                        .help("alias or UUID of the snapshot")
                        .required(true),
                )
                .arg(
                    Arg::new("clone-name")
                        .long("clone-name")
                        .value_name("NAME")
                        .required(true),
                ),
        )
        .subcommand(
            Command::new("decouple-parent")
                .about("Remove the dependency of a logical volume on its parent")
                .args(alias_or_uuid())
                .group(lvol_group()),
        )
        .subcommand(
            Command::new("resize")
                .about("Resize a logical volume")
                .args(alias_or_uuid())
                .group(lvol_group())
                .arg(size_arg()),
        )
}

pub fn lvol(ctx: &Context, m: &ArgMatches) -> Result<Value> {
    let spdk = ctx.client()?;
    let target = |sub: &ArgMatches| -> Result<String> {
        lvol_name(sub)
            .map(String::from)
            .ok_or_else(|| anyhow!("either --alias-name or --uuid is required"))
    };

    match m.subcommand() {
        Some(("create", sub)) => {
            let uuid = spdk.bdev_lvol_create(
                require_str(sub, "lvs-name")?,
                require_str(sub, "lvol-name")?,
                sub.get_one::<u64>("size").copied().unwrap_or_default(),
                sub.get_flag("thin-provision"),
            )?;
            Ok(json!({ "uuid": uuid }))
        }
        Some(("delete", sub)) => Ok(Value::Bool(spdk.bdev_lvol_delete(&target(sub)?)?)),
        Some(("get", sub)) => {
            let lvols = spdk.bdev_lvol_get(lvol_name(sub), sub.get_one::<u64>("timeout").copied())?;
            Ok(serde_json::to_value(lvols)?)
        }
        Some(("snapshot", sub)) => {
            let uuid = spdk.bdev_lvol_snapshot(&target(sub)?, require_str(sub, "snapshot-name")?)?;
            Ok(json!({ "uuid": uuid }))
        }
        Some(("clone", sub)) => {
            let uuid = spdk.bdev_lvol_clone(require_str(sub, "snapshot")?, require_str(sub, "clone-name")?)?;
            Ok(json!({ "uuid": uuid }))
        }
        Some(("decouple-parent", sub)) => Ok(Value::Bool(spdk.bdev_lvol_decouple_parent(&target(sub)?)?)),
        Some(("resize", sub)) => {
            let size = sub.get_one::<u64>("size").copied().unwrap_or_default();
            Ok(Value::Bool(spdk.bdev_lvol_resize(&target(sub)?, size)?))
        }
        _ => Err(anyhow!("unknown bdev-lvol command")),
    }
}

pub fn raid_command() -> Command {
    Command::new("bdev-raid")
        .visible_alias("raid")
        .about("Manage RAID bdevs")
        .subcommand_required(true)
        .subcommand(
            Command::new("create")
                .about("Create a RAID bdev over base bdevs")
                .arg(Arg::new("name").long("name").value_name("NAME").required(true))
                .arg(
                    Arg::new("level")
                        .long("level")
                        .value_name("LEVEL")
                        .help("0/raid0, 1/raid1, 5f/raid5f or concat")
                        .required(true),
                )
                .arg(
                    Arg::new("strip-size-kb")
                        .long("strip-size-kb")
                        .value_name("KB")
                        .value_parser(value_parser!(u32))
                        .required(true),
                )
                .arg(
                    Arg::new("base-bdevs")
                        .long("base-bdevs")
                        .value_name("BDEV,...")
                        .value_delimiter(',')
                        .required(true),
                ),
        )
        .subcommand(
            Command::new("delete")
                .about("Delete a RAID bdev")
                .arg(name_arg(true)),
        )
        .subcommand(
            Command::new("get")
                .about("List RAID bdevs")
                .arg(
                    Arg::new("category")
                        .long("category")
                        .value_parser(["all", "online", "configuring", "offline"])
                        .default_value("all"),
                ),
        )
}

pub fn raid(ctx: &Context, m: &ArgMatches) -> Result<Value> {
    let spdk = ctx.client()?;

    match m.subcommand() {
        Some(("create", sub)) => {
            let base_bdevs: Vec<String> = sub
                .get_many::<String>("base-bdevs")
                .map(|v| v.cloned().collect())
                .unwrap_or_default();
            Ok(Value::Bool(spdk.bdev_raid_create(
                require_str(sub, "name")?,
                require_str(sub, "level")?,
                sub.get_one::<u32>("strip-size-kb").copied().unwrap_or_default(),
                &base_bdevs,
            )?))
        }
        Some(("delete", sub)) => Ok(Value::Bool(spdk.bdev_raid_delete(require_str(sub, "NAME")?)?)),
        Some(("get", sub)) => {
            let category: RaidCategory = get_str(sub, "category").unwrap_or("all").parse()?;
            Ok(serde_json::to_value(spdk.bdev_raid_get_bdevs(category)?)?)
        }
        _ => Err(anyhow!("unknown bdev-raid command")),
    }
}

pub fn nvme_command() -> Command {
    Command::new("bdev-nvme")
        .visible_alias("nvme")
        .about("Manage NVMe controllers")
        .subcommand_required(true)
        .subcommand(
            Command::new("attach")
                .about("Attach a controller and create bdevs for its namespaces")
                .arg(name_arg(true).help("controller name, prefix of every bdev created"))
                .arg(Arg::new("trtype").long("trtype").value_name("TYPE").default_value("tcp"))
                .arg(Arg::new("traddr").long("traddr").value_name("ADDRESS").required(true))
                .arg(Arg::new("subnqn").long("subnqn").value_name("NQN"))
                .arg(Arg::new("trsvcid").long("trsvcid").value_name("PORT"))
                .arg(Arg::new("adrfam").long("adrfam").value_name("FAMILY"))
                .arg(Arg::new("hostaddr").long("hostaddr").value_name("ADDRESS"))
                .arg(Arg::new("hostsvcid").long("hostsvcid").value_name("PORT")),
        )
        .subcommand(
            Command::new("detach")
                .about("Detach a controller and delete its bdevs")
                .arg(name_arg(true)),
        )
        .subcommand(
            Command::new("get")
                .about("List all controllers, or the one called NAME")
                .arg(name_arg(false)),
        )
}

pub fn nvme(ctx: &Context, m: &ArgMatches) -> Result<Value> {
    let spdk = ctx.client()?;

    match m.subcommand() {
        Some(("attach", sub)) => {
            let owned = |id: &str| get_str(sub, id).map(String::from);
            let req = BdevNvmeAttachControllerRequest {
                name: require_str(sub, "NAME")?.into(),
                trtype: require_str(sub, "trtype")?.into(),
                traddr: require_str(sub, "traddr")?.into(),
                subnqn: owned("subnqn"),
                trsvcid: owned("trsvcid"),
                adrfam: owned("adrfam"),
                hostaddr: owned("hostaddr"),
                hostsvcid: owned("hostsvcid"),
            };
            Ok(serde_json::to_value(spdk.bdev_nvme_attach_controller(&req)?)?)
        }
        Some(("detach", sub)) => Ok(Value::Bool(spdk.bdev_nvme_detach_controller(require_str(sub, "NAME")?)?)),
        Some(("get", sub)) => Ok(serde_json::to_value(spdk.bdev_nvme_get_controllers(get_str(sub, "NAME"))?)?),
        _ => Err(anyhow!("unknown bdev-nvme command")),
    }
}

use anyhow::{anyhow, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use serde_json::Value;
use spdk_client::nvmf::ListenAddress;

use crate::{get_str, require_str, Context};

fn nqn_arg() -> Arg {
    Arg::new("nqn")
        .long("nqn")
        .value_name("NQN")
        .help("subsystem NQN")
        .required(true)
}

fn tgt_name_arg() -> Arg {
    Arg::new("tgt-name")
        .long("tgt-name")
        .value_name("NAME")
        .help("parent NVMe-oF target")
}

fn listen_address_args() -> [Arg; 4] {
    [
        Arg::new("trtype").long("trtype").value_name("TYPE").default_value("tcp"),
        Arg::new("adrfam")
            .long("adrfam")
            .value_name("FAMILY")
            .help("IPv4, IPv6, IB or FC")
            .default_value("ipv4"),
        Arg::new("traddr").long("traddr").value_name("ADDRESS").required(true),
        Arg::new("trsvcid").long("trsvcid").value_name("PORT").required(true),
    ]
}

fn listen_address(m: &ArgMatches) -> Result<ListenAddress> {
    Ok(ListenAddress {
        trtype: require_str(m, "trtype")?.into(),
        adrfam: require_str(m, "adrfam")?.into(),
        traddr: require_str(m, "traddr")?.into(),
        trsvcid: require_str(m, "trsvcid")?.into(),
    })
}

pub fn command() -> Command {
    Command::new("nvmf")
        .about("Manage the NVMe over Fabrics target")
        .subcommand_required(true)
        .subcommand(
            Command::new("create-transport")
                .about("Initialize a transport")
                .arg(Arg::new("trtype").long("trtype").value_name("TYPE").default_value("tcp")),
        )
        .subcommand(
            Command::new("get-transport")
                .about("List transports")
                .arg(Arg::new("trtype").long("trtype").value_name("TYPE"))
                .arg(tgt_name_arg()),
        )
        .subcommand(
            Command::new("create-subsystem")
                .about("Create a subsystem")
                .arg(nqn_arg())
                .arg(
                    Arg::new("allow-any-host")
                        .long("allow-any-host")
                        .action(ArgAction::SetTrue)
                        .help("let any host connect"),
                ),
        )
        .subcommand(
            Command::new("delete-subsystem")
                .about("Delete a subsystem")
                .arg(nqn_arg())
                .arg(tgt_name_arg()),
        )
        .subcommand(
            Command::new("get-subsystems")
                .about("List subsystems")
                .arg(tgt_name_arg()),
        )
        .subcommand(
            Command::new("add-ns")
                .about("Expose a bdev as a namespace of a subsystem")
                .arg(nqn_arg())
                .arg(
                    Arg::new("bdev-name")
                        .long("bdev-name")
                        .value_name("BDEV")
                        .required(true),
                ),
        )
        .subcommand(
            Command::new("remove-ns")
                .about("Remove a namespace from a subsystem")
                .arg(nqn_arg())
                .arg(
                    Arg::new("nsid")
                        .long("nsid")
                        .value_parser(value_parser!(u32))
                        .required(true),
                ),
        )
        .subcommand(
            Command::new("get-nss")
                .about("List namespaces of a subsystem")
                .arg(nqn_arg())
                .arg(Arg::new("bdev-name").long("bdev-name").value_name("BDEV"))
                .arg(
                    Arg::new("nsid")
                        .long("nsid")
                        .value_parser(value_parser!(u32))
                        .conflicts_with("bdev-name"),
                ),
        )
        .subcommand(
            Command::new("add-listener")
                .about("Add a listen address to a subsystem")
                .arg(nqn_arg())
                .args(listen_address_args()),
        )
        .subcommand(
            Command::new("remove-listener")
                .about("Remove a listen address from a subsystem")
                .arg(nqn_arg())
                .args(listen_address_args()),
        )
}

pub fn run(ctx: &Context, m: &ArgMatches) -> Result<Value> {
    let spdk = ctx.client()?;

    let value = match m.subcommand() {
        Some(("create-transport", sub)) => Value::Bool(spdk.nvmf_create_transport(require_str(sub, "trtype")?)?),
        Some(("get-transport", sub)) => serde_json::to_value(
            spdk.nvmf_get_transport(get_str(sub, "trtype"), get_str(sub, "tgt-name"))?,
        )?,
        Some(("create-subsystem", sub)) => Value::Bool(
            spdk.nvmf_create_subsystem(require_str(sub, "nqn")?, sub.get_flag("allow-any-host"))?,
        ),
        Some(("delete-subsystem", sub)) => Value::Bool(
            spdk.nvmf_delete_subsystem(require_str(sub, "nqn")?, get_str(sub, "tgt-name"))?,
        ),
        Some(("get-subsystems", sub)) => {
            serde_json::to_value(spdk.nvmf_get_subsystems(get_str(sub, "tgt-name"))?)?
        }
        Some(("add-ns", sub)) => {
            let nsid = spdk.nvmf_subsystem_add_ns(require_str(sub, "nqn")?, require_str(sub, "bdev-name")?)?;
            Value::from(nsid)
        }
        Some(("remove-ns", sub)) => {
            let nsid = sub
                .get_one::<u32>("nsid")
                .copied()
                .ok_or_else(|| anyhow!("missing argument 'nsid'"))?;
            Value::Bool(spdk.nvmf_subsystem_remove_ns(require_str(sub, "nqn")?, nsid)?)
        }
        Some(("get-nss", sub)) => serde_json::to_value(spdk.nvmf_subsystem_get_nss(
            require_str(sub, "nqn")?,
            get_str(sub, "bdev-name"),
            sub.get_one::<u32>("nsid").copied(),
        )?)?,
        Some(("add-listener", sub)) => Value::Bool(
            spdk.nvmf_subsystem_add_listener(require_str(sub, "nqn")?, &listen_address(sub)?)?,
        ),
        Some(("remove-listener", sub)) => Value::Bool(
            spdk.nvmf_subsystem_remove_listener(require_str(sub, "nqn")?, &listen_address(sub)?)?,
        ),
        _ => return Err(anyhow!("unknown nvmf command")),
    };

    Ok(value)
}

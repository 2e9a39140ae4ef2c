//! bmv2 example: drive `simple_switch_CLI` on a remote host.
//!
//! Writes a register, installs a forwarding entry and prints what the CLI
//! answered.
//!
//! # Prerequisites
//!
//! - A host running `simple_switch` with the thrift server enabled
//! - `simple_switch_CLI` on that host's PATH
//!
//! # Usage
//!
//! ```bash
//! cargo run --example bmv2_cli -- --host 192.168.56.10 --user p4 --password p4 --thrift-port 9090
//! ```

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use p4switch::{Bmv2Config, IpPrefix, MacAddress, Switch, SwitchBuilder, TableEntry};
use regex::bytes::Regex;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging (set RUST_LOG=debug for verbose output)
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let mut builder = SwitchBuilder::new(&args.host)
        .port(args.port)
        .username(&args.user)
        .timeout(Duration::from_secs(args.timeout));

    if let Some(password) = &args.password {
        builder = builder.password(password);
    } else if let Some(key_path) = &args.key {
        builder = builder.private_key(key_path);
    } else {
        eprintln!("Error: Must provide either --password or --key");
        std::process::exit(1);
    }

    let mut switch = builder.build_bmv2(Bmv2Config::with_thrift_port(args.thrift_port))?;

    // Commands queued before connecting are delivered once the CLI starts.
    switch.reset_register("packet_counter", None).await?;

    println!("Connecting to {}:{}...", args.host, args.port);
    switch.connect().await?;

    switch.set_register("packet_counter", Some(0), 42).await?;

    let entry = TableEntry::new("MyIngress.ipv4_lpm", "MyIngress.ipv4_forward")
        .with_match("hdr.ipv4.dstAddr", "10.0.1.1/32".parse::<IpPrefix>()?)
        .with_param("dstAddr", "08:00:00:00:01:11".parse::<MacAddress>()?)
        .with_param("port", 1u16);
    switch.update_table_entry(&entry).await?;

    let added = Regex::new(r"Entry has been added with handle \d+")?;
    match switch.wait_for_output(&added, Duration::from_secs(10)).await {
        Ok(()) => println!("Entry installed"),
        Err(e) => eprintln!("No confirmation from the CLI: {}", e),
    }

    switch.close().await?;

    println!("{}", "-".repeat(50));
    println!("{}", switch.get_output());
    println!("{}", "-".repeat(50));

    Ok(())
}

/// Simple argument parser (avoiding external dependencies)
struct Args {
    host: String,
    port: u16,
    user: String,
    password: Option<String>,
    key: Option<PathBuf>,
    timeout: u64,
    thrift_port: u16,
}

impl Args {
    fn parse() -> Self {
        let args: Vec<String> = env::args().collect();
        let mut parsed = Self {
            host: "localhost".to_string(),
            port: 22,
            user: env::var("USER").unwrap_or_else(|_| "root".to_string()),
            password: None,
            key: None,
            timeout: 30,
            thrift_port: 9090,
        };

        let mut i = 1;
        while i < args.len() {
            let value = args.get(i + 1).cloned();
            match args[i].as_str() {
                "--host" | "-h" => parsed.host = value.unwrap_or(parsed.host),
                "--port" | "-p" => {
                    parsed.port = value.and_then(|v| v.parse().ok()).unwrap_or(22)
                }
                "--user" | "-u" => parsed.user = value.unwrap_or(parsed.user),
                "--password" | "-P" => parsed.password = value,
                "--key" | "-k" => parsed.key = value.map(PathBuf::from),
                "--timeout" | "-t" => {
                    parsed.timeout = value.and_then(|v| v.parse().ok()).unwrap_or(30)
                }
                "--thrift-port" => {
                    parsed.thrift_port = value.and_then(|v| v.parse().ok()).unwrap_or(9090)
                }
                "--help" => {
                    Self::print_help();
                    std::process::exit(0);
                }
                other => {
                    eprintln!("Unknown argument: {}", other);
                    i += 1;
                    continue;
                }
            }
            i += 2;
        }

        parsed
    }

    fn print_help() {
        println!(
            r#"p4switch bmv2_cli example

USAGE:
    cargo run --example bmv2_cli -- [OPTIONS]

OPTIONS:
    -h, --host <HOST>        Switch host [default: localhost]
    -p, --port <PORT>        SSH port [default: 22]
    -u, --user <USER>        Username [default: $USER]
    -P, --password <PASS>    Password for authentication
    -k, --key <PATH>         Path to SSH private key
    -t, --timeout <SECS>     Connection timeout [default: 30]
    --thrift-port <PORT>     simple_switch thrift port [default: 9090]
    --help                   Print this help message
"#
        );
    }
}

//! Tofino example: install a table entry through a bfrt script.
//!
//! Reads the script settings from a JSON file when `--config` is given,
//! otherwise uses the stock SDE 9.1.0 layout.
//!
//! # Usage
//!
//! ```bash
//! cargo run --example tofino_table -- --host 10.0.0.5 --user root --password secret
//! cargo run --example tofino_table -- --host 10.0.0.5 --user root --key ~/.ssh/id_ed25519 \
//!     --config tofino.json
//! ```
//!
//! where `tofino.json` may override any of:
//!
//! ```json
//! { "sde": "/root/bf-sde-9.1.0", "code_dir": "/root/bfrt_code_dir",
//!   "pipeline": "srv6.pipe.Ingress", "timeout_secs": 60, "delete_after_run": true }
//! ```

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use p4switch::{IpPrefix, Switch, SwitchBuilder, TableEntry, TofinoConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => serde_json::from_str::<TofinoConfig>(&std::fs::read_to_string(path)?)?,
        None => TofinoConfig::default(),
    };

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

    println!("Connecting to {}:{}...", args.host, args.port);
    let mut switch = builder.connect_tofino(config).await?;

    let entry = TableEntry::new("srv6_localsid", "end_dx4")
        .with_match("dst_addr", "fc00:1::/64".parse::<IpPrefix>()?)
        .with_param("port", 2u16);

    match switch.update_table_entry(&entry).await {
        Ok(()) => println!("Entry installed"),
        Err(e) => eprintln!("Update failed: {}", e),
    }

    // Register access needs the bmv2 backend.
    if let Err(e) = switch.set_register("r0", None, 1).await {
        println!("As expected: {}", e);
    }

    switch.close().await?;
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
    config: Option<PathBuf>,
}

impl Args {
    fn parse() -> Self {
        let args: Vec<String> = env::args().collect();
        let mut parsed = Self {
            host: "localhost".to_string(),
            port: 22,
            user: "root".to_string(),
            password: None,
            key: None,
            timeout: 30,
            config: None,
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
                "--config" | "-c" => parsed.config = value.map(PathBuf::from),
                "--help" => {
                    println!(
                        "usage: tofino_table --host <HOST> [--port <PORT>] --user <USER> \
                         (--password <PASS> | --key <PATH>) [--config <JSON>]"
                    );
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
}

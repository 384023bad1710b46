//! stacksindex CLI — inspect chain state and replay block logs.
//!
//! Usage:
//! ```bash
//! stacksindex scan --log blocks.json
//! stacksindex decode 0x0c00000004...
//! stacksindex info
//! ```

use std::env;
use std::fs;
use std::process;

use stacksindex_core::replay::scan_stacks_log;
use stacksindex_core::types::{BlockHeader, Network};

fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        print_usage();
        process::exit(1);
    }

    match args[1].as_str() {
        "scan" => cmd_scan(&args[2..]),
        "decode" => cmd_decode(&args[2..]),
        "info" => cmd_info(),
        "version" | "--version" | "-V" => {
            println!("stacksindex {}", env!("CARGO_PKG_VERSION"));
        }
        "help" | "--help" | "-h" => print_usage(),
        other => {
            eprintln!("Unknown command: {other}");
            print_usage();
            process::exit(1);
        }
    }
}

fn print_usage() {
    println!("stacksindex {}", env!("CARGO_PKG_VERSION"));
    println!("Reorg-aware Stacks chain indexing engine\n");
    println!("USAGE:");
    println!("    stacksindex <COMMAND>\n");
    println!("COMMANDS:");
    println!("    scan --log <file>   Reconstruct the canonical chain from a block-log JSON file");
    println!("    decode <hex>        Decode a PoX print-log payload (--testnet for testnet addresses)");
    println!("    info                Show StacksIndex configuration info");
    println!("    version             Print version");
    println!("    help                Print this help");
}

/// Reverse-scan a block log (a JSON array of block headers, observation
/// order) and print the canonical chain summary.
fn cmd_scan(args: &[String]) {
    let path = match args {
        [flag, path] if flag == "--log" => path,
        _ => {
            eprintln!("Usage: stacksindex scan --log <file>");
            process::exit(1);
        }
    };

    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(error) => {
            eprintln!("Cannot read {path}: {error}");
            process::exit(1);
        }
    };
    let log: Vec<BlockHeader> = match serde_json::from_str(&raw) {
        Ok(log) => log,
        Err(error) => {
            eprintln!("Invalid block log: {error}");
            process::exit(1);
        }
    };

    match scan_stacks_log(&log) {
        Ok(summary) => {
            println!("Canonical Stacks blocks: {}", summary.canonical_stacks_block_count);
            println!("Orphaned Stacks blocks:  {}", summary.orphan_stacks_block_count);
            println!("Canonical burn blocks:   {}", summary.canonical_burn_block_count);
            println!("Orphaned burn blocks:    {}", summary.orphan_burn_block_count);
            if let Some(tip) = summary.index_block_hashes.last() {
                println!("Canonical tip:           {tip}");
            }
        }
        Err(error) => {
            eprintln!("Scan failed: {error}");
            process::exit(1);
        }
    }
}

/// Decode a synthetic PoX event payload and print it as JSON.
fn cmd_decode(args: &[String]) {
    let (hex_payload, network) = match args {
        [payload] => (payload, Network::Mainnet),
        [payload, flag] if flag == "--testnet" => (payload, Network::Testnet),
        [flag, payload] if flag == "--testnet" => (payload, Network::Testnet),
        _ => {
            eprintln!("Usage: stacksindex decode <hex> [--testnet]");
            process::exit(1);
        }
    };

    match stacksindex_pox::decode(hex_payload, network) {
        Ok(Some(event)) => match serde_json::to_string_pretty(&event) {
            Ok(json) => println!("{json}"),
            Err(error) => {
                eprintln!("Serialization failed: {error}");
                process::exit(1);
            }
        },
        Ok(None) => println!("(failed on-chain call; no event)"),
        Err(error) => {
            eprintln!("Decode failed: {error}");
            process::exit(1);
        }
    }
}

fn cmd_info() {
    println!("StacksIndex v{}", env!("CARGO_PKG_VERSION"));
    println!("  Block identity: index_block_hash");
    println!("  Canonical model: flag flips, rows never deleted");
    println!("  Storage backends: memory, SQLite");
    println!("  Networks: mainnet, testnet");
}

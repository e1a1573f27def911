#![forbid(unsafe_code)]
//! Prints the header and wallets of a PhysicsCoin state file

use clap::Parser;
use physicscoin::codec::StateHeader;
use physicscoin::persistence::{self, StateStore};
use physicscoin::Snapshot;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "physicscoin-inspect", about = "Inspect a PhysicsCoin state file")]
struct Args {
    /// State file to inspect
    file: PathBuf,

    /// Also load and list every wallet record
    #[arg(long)]
    wallets: bool,
}

fn print_header(header: &StateHeader) {
    println!("format version : {}", header.format_version);
    println!("state version  : {}", header.version);
    println!("timestamp      : {}", header.timestamp);
    println!("wallets        : {}", header.wallet_count);
    println!("token supply   : {:.8}", header.token_supply_total);
    println!("state digest   : {}", hex::encode(header.state_digest));
    println!("prev digest    : {}", hex::encode(header.prev_state_digest));
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let header = persistence::read_header(&args.file)?;
    print_header(&header);

    if args.wallets {
        let mut snapshot = Snapshot::default();
        StateStore::default().load(&mut snapshot, &args.file)?;

        println!();
        for (i, wallet) in snapshot.wallets().iter().enumerate() {
            println!(
                "{:>5}  {}  {:>20.8}  nonce {}",
                i,
                wallet.address_hex(),
                wallet.energy,
                wallet.nonce
            );
        }
    }

    Ok(())
}

//! The `keygen` command: generate an Ed25519 signing key.

use anyhow::Result;
use rust_ndn_common::name::Name;
use rust_ndn_common::security::Ed25519Signer;

pub fn run(name: &str) -> Result<()> {
    let key_name: Name = name.parse().map_err(anyhow::Error::from)?;
    let seed: [u8; 32] = rand::random();
    let signer = Ed25519Signer::new(key_name.clone(), &seed);
    println!("name:   {key_name}");
    println!("seed:   {}", hex::encode(seed));
    println!("public: {}", hex::encode(signer.public_key().to_bytes()));
    Ok(())
}

//! Print a fresh random JWT signing secret.
//!
//! Usage: `cargo run --bin generate_secrets >> .env`

use rand::RngCore;

fn main() {
    let mut secret = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut secret);
    println!("JWT_SECRET={}", hex::encode(secret));
}

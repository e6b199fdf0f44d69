pub mod manager;
pub mod signal;

pub use manager::{BeaconManager, Utxo};
pub use signal::build_beacon_signal;

mod challenges;
mod config;
mod events;
mod utils;

pub use utils::test_portal;

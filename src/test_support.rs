use std::sync::Arc;

use crate::config::Config;
use crate::local::LocalBackend;
use crate::storage::Storage;

/// Cheapest cost bcrypt accepts.
pub const TEST_BCRYPT_COST: u32 = 4;

/// Defaults with the cheapest bcrypt cost so sign-ups stay fast.
pub fn test_config() -> Config {
    Config {
        bcrypt_cost: TEST_BCRYPT_COST,
        ..Config::default()
    }
}

pub fn temporary_backend() -> Arc<LocalBackend> {
    Arc::new(LocalBackend::new(Storage::temporary().unwrap(), &test_config()).unwrap())
}

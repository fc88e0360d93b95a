//! Driver registry
//!
//! Instantiates drivers by the name given in their configuration, the way
//! the transport layer loads them.

use crate::driver::{Driver, DriverError, DriverResult, ModemDriver};
use crate::driver::modem::MOCK_DRIVER;
use crate::session::MockModemFactory;
use crate::trace::TraceSink;
use crate::utils::DriverConfig;
use std::collections::HashMap;
use std::sync::Arc;

/// Builds an uninitialized driver
pub type DriverConstructor = Box<dyn Fn(Arc<dyn TraceSink>) -> Box<dyn Driver> + Send + Sync>;

/// Named driver constructors
pub struct DriverRegistry {
    constructors: HashMap<String, DriverConstructor>,
}

impl DriverRegistry {
    /// Registry with no drivers
    pub fn new() -> Self {
        Self {
            constructors: HashMap::new(),
        }
    }

    /// Registry with the built-in drivers
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(MOCK_DRIVER, |sink| {
            Box::new(ModemDriver::new(MOCK_DRIVER, MockModemFactory::new(), sink))
        });
        registry
    }

    /// Add or replace a driver constructor
    pub fn register<F>(&mut self, name: &str, constructor: F)
    where
        F: Fn(Arc<dyn TraceSink>) -> Box<dyn Driver> + Send + Sync + 'static,
    {
        self.constructors.insert(name.to_string(), Box::new(constructor));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.constructors.contains_key(name)
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.constructors.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Build the driver named by `config` and initialize it with `config`
    pub fn create(&self, config: DriverConfig, sink: Arc<dyn TraceSink>) -> DriverResult<Box<dyn Driver>> {
        let constructor = self
            .constructors
            .get(&config.name)
            .ok_or_else(|| DriverError::UnknownDriver(config.name.clone()))?;

        let mut driver = constructor(sink);
        driver.initialize(config)?;
        Ok(driver)
    }
}

impl Default for DriverRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

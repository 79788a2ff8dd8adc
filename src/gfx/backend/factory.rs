//! Backend selection
//!
//! [`BackendFactory`] keeps a list of named device constructors and a preferred
//! order. [`BackendFactory::create`] walks that order and returns the first
//! device that constructs, so a machine without a GPU adapter quietly falls
//! back to the software rasterizer.

use super::software::SoftwareDevice;
use super::wgpu_device::WgpuDevice;
use super::GraphicsDevice;

/// Constructs a device, or `None` when the backend is unavailable here
pub type BackendConstructor = Box<dyn Fn() -> Option<Box<dyn GraphicsDevice>>>;

/// Environment variable overriding the preferred order (comma separated)
pub const BACKEND_ENV_VAR: &str = "PRISM3D_BACKEND";

/// Default preferred order
pub const DEFAULT_BACKEND_ORDER: [&str; 2] = ["wgpu", "software"];

/// Splits a comma-separated backend list, dropping blanks and normalizing case
pub fn parse_backend_order(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|name| name.trim().to_ascii_lowercase())
        .filter(|name| !name.is_empty())
        .collect()
}

/// Named backend constructors tried in preference order
pub struct BackendFactory {
    constructors: Vec<(String, BackendConstructor)>,
    preferred_order: Vec<String>,
}

impl Default for BackendFactory {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl BackendFactory {
    /// Factory with no registered backends
    pub fn empty() -> Self {
        Self {
            constructors: Vec::new(),
            preferred_order: Vec::new(),
        }
    }

    /// Factory with the wgpu and software backends in the default order
    pub fn with_defaults() -> Self {
        let mut factory = Self::empty();
        factory.register("wgpu", || {
            WgpuDevice::try_new().map(|device| Box::new(device) as Box<dyn GraphicsDevice>)
        });
        factory.register("software", || {
            Some(Box::new(SoftwareDevice::new()) as Box<dyn GraphicsDevice>)
        });
        factory.preferred_order = DEFAULT_BACKEND_ORDER.iter().map(|s| s.to_string()).collect();
        factory
    }

    /// Registers or replaces a constructor. New names are appended to the preferred order.
    pub fn register<F>(&mut self, name: &str, constructor: F) -> &mut Self
    where
        F: Fn() -> Option<Box<dyn GraphicsDevice>> + 'static,
    {
        let name = name.to_ascii_lowercase();
        match self.constructors.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = Box::new(constructor),
            None => {
                self.constructors.push((name.clone(), Box::new(constructor)));
                if !self.preferred_order.contains(&name) {
                    self.preferred_order.push(name);
                }
            }
        }
        self
    }

    pub fn set_preferred_order<I, S>(&mut self, order: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.preferred_order = order
            .into_iter()
            .map(|s| s.as_ref().to_ascii_lowercase())
            .collect();
        self
    }

    pub fn preferred_order(&self) -> &[String] {
        &self.preferred_order
    }

    pub fn backend_names(&self) -> impl Iterator<Item = &str> {
        self.constructors.iter().map(|(name, _)| name.as_str())
    }

    /// Constructs one backend by name
    pub fn create_named(&self, name: &str) -> Option<Box<dyn GraphicsDevice>> {
        let name = name.to_ascii_lowercase();
        let Some((_, constructor)) = self.constructors.iter().find(|(n, _)| *n == name) else {
            log::warn!("Unknown graphics backend '{}'", name);
            return None;
        };
        let device = constructor();
        if device.is_none() {
            log::info!("Graphics backend '{}' is unavailable", name);
        }
        device
    }

    /// Walks `order` and returns the first backend that constructs
    pub fn create_with_order(&self, order: &[String]) -> Option<Box<dyn GraphicsDevice>> {
        for name in order {
            if let Some(device) = self.create_named(name) {
                log::info!("Selected graphics backend '{}'", device.backend_name());
                return Some(device);
            }
        }
        log::warn!("No graphics backend available from {:?}; 3D rendering disabled", order);
        None
    }

    /// Walks the preferred order
    ///
    /// # Returns
    /// `None` when no backend constructs, in which case 3D is unavailable
    pub fn create(&self) -> Option<Box<dyn GraphicsDevice>> {
        self.create_with_order(&self.preferred_order)
    }

    /// Like [`create`](Self::create), with the order taken from `PRISM3D_BACKEND` when set
    pub fn create_from_env(&self) -> Option<Box<dyn GraphicsDevice>> {
        match std::env::var(BACKEND_ENV_VAR) {
            Ok(value) if !parse_backend_order(&value).is_empty() => {
                log::debug!("{} overrides backend order: {}", BACKEND_ENV_VAR, value);
                self.create_with_order(&parse_backend_order(&value))
            }
            _ => self.create(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn test_parse_backend_order() {
        assert_eq!(
            parse_backend_order(" Software , wgpu,,"),
            vec!["software".to_string(), "wgpu".to_string()]
        );
        assert!(parse_backend_order(" , ").is_empty());
    }

    #[test]
    fn test_falls_back_to_next_backend() {
        let attempts = Rc::new(Cell::new(0));
        let counter = attempts.clone();
        let mut factory = BackendFactory::empty();
        factory
            .register("broken", move || {
                counter.set(counter.get() + 1);
                None
            })
            .register("software", || {
                Some(Box::new(SoftwareDevice::new()) as Box<dyn GraphicsDevice>)
            });

        let device = factory.create().unwrap();
        assert_eq!(device.backend_name(), "software");
        assert_eq!(attempts.get(), 1);
    }

    #[test]
    fn test_no_backend_yields_none() {
        let mut factory = BackendFactory::empty();
        factory.register("broken", || None);
        assert!(factory.create().is_none());
        assert!(BackendFactory::empty().create().is_none());
    }

    #[test]
    fn test_unknown_names_are_skipped() {
        let factory = BackendFactory::with_defaults();
        let device = factory
            .create_with_order(&["vulkan-ng".to_string(), "software".to_string()])
            .unwrap();
        assert_eq!(device.backend_name(), "software");
        assert_eq!(factory.preferred_order(), &["wgpu".to_string(), "software".to_string()]);
    }
}

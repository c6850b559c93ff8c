use std::collections::HashMap;

use crate::config::{Config, RegionConfig};
use crate::devices::Devices;
use crate::engine::element::{Element, ElementConfig};
use crate::errors::{ClickshotError, ClickshotResult};
use crate::perception::types::Rect;

/// Named group of elements searched for inside one boundary.
pub struct Region {
    name: String,
    boundary: Option<Rect>,
    settings: Config,
    devices: Devices,
    elements: HashMap<String, Element>,
    closed: bool,
}

impl Region {
    /// `boundary` of `None` searches the whole display. Directory settings are
    /// resolved here, once.
    pub fn new(
        name: impl Into<String>,
        settings: &Config,
        boundary: Option<Rect>,
        devices: Devices,
    ) -> Self {
        let name = name.into();
        let settings = settings.resolved();
        tracing::debug!(
            region = %name,
            image_dir = ?settings.image_dir,
            screenshot_dir = ?settings.screenshot_dir,
            "region created"
        );
        Self {
            name,
            boundary,
            settings,
            devices,
            elements: HashMap::new(),
            closed: false,
        }
    }

    pub fn from_config(config: &RegionConfig, settings: &Config, devices: Devices) -> Self {
        let mut region = Self::new(config.name.clone(), settings, config.boundary, devices)
            .configure(&config.elements);
        region.closed = config.closed;
        region
    }

    /// Register elements up front. Re-registering a name replaces its element.
    pub fn configure(mut self, elements: &[ElementConfig]) -> Self {
        for config in elements {
            let element = self.build(config);
            self.elements.insert(config.name.clone(), element);
        }
        self
    }

    /// Only configured elements can be looked up.
    pub fn closed(mut self) -> Self {
        self.closed = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn boundary(&self) -> Option<Rect> {
        self.boundary
    }

    pub fn settings(&self) -> &Config {
        &self.settings
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Configured element names, sorted.
    pub fn element_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.elements.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Look up an element. Open regions create unknown elements with default
    /// settings on first use; closed regions reject them.
    pub fn element(&mut self, name: &str) -> ClickshotResult<&mut Element> {
        if !self.elements.contains_key(name) {
            if self.closed {
                return Err(ClickshotError::UnknownElement {
                    region: self.name.clone(),
                    name: name.to_string(),
                });
            }
            tracing::debug!(region = %self.name, element = name, "creating element on first use");
            let element = self.build(&ElementConfig::new(name));
            self.elements.insert(name.to_string(), element);
        }
        self.elements
            .get_mut(name)
            .ok_or_else(|| ClickshotError::UnknownElement {
                region: self.name.clone(),
                name: name.to_string(),
            })
    }

    fn build(&self, config: &ElementConfig) -> Element {
        Element::new(
            config,
            &self.name,
            self.boundary,
            &self.settings,
            self.devices.clone(),
        )
    }
}

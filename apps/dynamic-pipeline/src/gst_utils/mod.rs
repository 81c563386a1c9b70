use gst::prelude::*;
use tracing::{debug, error, info};

use crate::{DynamicPipelineError, Result};

/// Availability of the element factories a session needs
#[derive(Debug, Clone)]
pub struct ElementReport {
    pub available: Vec<String>,
    pub missing: Vec<String>,
}

impl ElementReport {
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }

    pub fn has_element(&self, element: &str) -> bool {
        self.available.iter().any(|e| e == element)
    }
}

/// Initialize GStreamer with error handling and logging
pub fn initialize() -> Result<()> {
    debug!("Initializing GStreamer");

    gst::init().map_err(|e| {
        error!("Failed to initialize GStreamer: {}", e);
        DynamicPipelineError::Init(e)
    })?;

    let (major, minor, micro, nano) = gst::version();
    info!("GStreamer version: {}.{}.{}.{}", major, minor, micro, nano);

    if let Ok(debug_str) = std::env::var("GST_DEBUG") {
        debug!("GST_DEBUG set to: {}", debug_str);
    }

    if let Ok(plugin_path) = std::env::var("GST_PLUGIN_PATH") {
        info!("Using custom GST_PLUGIN_PATH: {}", plugin_path);
    }

    Ok(())
}

/// Look up every factory in the registry
pub fn discover_elements<S: AsRef<str>>(elements: &[S]) -> ElementReport {
    let mut available = Vec::new();
    let mut missing = Vec::new();

    for element in elements {
        let element = element.as_ref();
        if let Some(factory) = gst::ElementFactory::find(element) {
            debug!("Found element: {} (rank: {:?})", element, factory.rank());
            available.push(element.to_string());
        } else {
            error!("Missing element: {}", element);
            missing.push(element.to_string());
        }
    }

    ElementReport { available, missing }
}

/// Fail early when any factory is not installed
pub fn verify_elements<S: AsRef<str>>(elements: &[S]) -> Result<ElementReport> {
    let report = discover_elements(elements);
    if !report.is_complete() {
        return Err(DynamicPipelineError::MissingElements(report.missing));
    }

    info!("All required elements found");
    Ok(report)
}

/// Print detailed element information (for --check-plugins flag)
pub fn print_element_info(report: &ElementReport) {
    println!("\nGStreamer Element Report");
    println!("========================");

    let (major, minor, micro, nano) = gst::version();
    println!("\nGStreamer Version: {}.{}.{}.{}", major, minor, micro, nano);

    if let Ok(plugin_path) = std::env::var("GST_PLUGIN_PATH") {
        println!("Custom Plugin Path: {}", plugin_path);
    }

    println!("\nRequired Elements:");
    for element in &report.available {
        println!("  ✓ {}", element);
    }
    for element in &report.missing {
        println!("  ✗ {}", element);
    }

    let registry = gst::Registry::get();
    println!("\nRegistry Statistics:");
    println!("  Total Plugins: {}", registry.plugins().len());
}

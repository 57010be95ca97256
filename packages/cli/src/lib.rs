// ABOUTME: Library half of the tutor terminal front end
// ABOUTME: Service wiring from configuration, data file manifests and console rendering

pub mod console;
pub mod manifest;
pub mod services;

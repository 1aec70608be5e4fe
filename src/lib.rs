/// deskpack - packaging pipeline for Python desktop applications
///
/// Turns a Python entry script plus its web frontend into a frozen
/// distribution, optionally hardened and wrapped in an installer.
///
/// Main modules:
/// - build: build context, settings, project configuration and runtime layout
/// - pipeline: build modules and the orchestrator that runs them
/// - backend: freeze backend driver
/// - secure: source hardening chain around the freeze step
/// - compiler: interpreter discovery and native extension compilation
/// - plugin: plugin manifests, package hooks, install and scaffolding
/// - icon, metadata, installer: output finishing
/// - cli / commands: command-line surface
/// - result: error handling and result types
/// - utils: child-process seam and filesystem helpers
pub mod backend;
pub mod build;
pub mod cli;
pub mod commands;
pub mod compiler;
pub mod icon;
pub mod installer;
pub mod metadata;
pub mod pipeline;
pub mod plugin;
pub mod result;
pub mod secure;
pub mod utils;

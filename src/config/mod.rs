//! Configuration management for dock-peek

pub mod settings;
pub mod timing;
pub mod validator;

pub use settings::{Settings, SettingsError, SettingsProvider, SettingsStore, StaticSettings};
pub use timing::{DispatchConfig, FilterConfig, RegistryConfig};
pub use validator::{SettingsValidator, ValidationResult, ValidationRule, ValidationSeverity};

use crate::config::settings::Settings;
use crate::DockPeekError;
use regex::Regex;
use serde::Serialize;

pub const MIN_THUMBNAIL_SIZE: u32 = 64;
pub const MAX_THUMBNAIL_SIZE: u32 = 1024;
pub const MAX_HOVER_DELAY_MS: u64 = 5000;
const SHORT_HOVER_DELAY_MS: u64 = 100;

#[derive(Debug, Clone, Serialize)]
pub struct ValidationRule {
    pub name: &'static str,
    pub description: &'static str,
    pub severity: ValidationSeverity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationSeverity {
    Error,
    Warning,
    Info,
}

#[derive(Debug, Clone, Serialize)]
pub struct ValidationResult {
    pub rule: ValidationRule,
    pub message: String,
    /// Settings key the finding is about
    pub field: &'static str,
}

impl ValidationResult {
    pub fn is_error(&self) -> bool {
        self.rule.severity == ValidationSeverity::Error
    }
}

/// Checks a [`Settings`] value for out-of-range or malformed entries
pub struct SettingsValidator {
    rules: Vec<ValidationRule>,
    bundle_id_regex: Regex,
    app_name_regex: Regex,
}

impl SettingsValidator {
    pub fn new() -> crate::Result<Self> {
        let bundle_id_regex = Regex::new(r"^[A-Za-z0-9-]+(\.[A-Za-z0-9-]+)+$").map_err(|e| {
            DockPeekError::ValidationError(format!("Failed to compile bundle ID regex: {}", e))
        })?;
        let app_name_regex = Regex::new(r"^[^./][^/]*$").map_err(|e| {
            DockPeekError::ValidationError(format!("Failed to compile app name regex: {}", e))
        })?;

        Ok(Self {
            rules: Self::default_rules(),
            bundle_id_regex,
            app_name_regex,
        })
    }

    pub fn validate(&self, settings: &Settings) -> Vec<ValidationResult> {
        let mut results = Vec::new();

        if !(MIN_THUMBNAIL_SIZE..=MAX_THUMBNAIL_SIZE).contains(&settings.thumbnail_max_size) {
            results.push(self.finding(
                "thumbnail_size_range",
                "thumbnail_max_size",
                format!(
                    "thumbnail_max_size is {}; expected {}..={}",
                    settings.thumbnail_max_size, MIN_THUMBNAIL_SIZE, MAX_THUMBNAIL_SIZE
                ),
            ));
        }

        if settings.hover_delay_ms > MAX_HOVER_DELAY_MS {
            results.push(self.finding(
                "hover_delay_range",
                "hover_delay_ms",
                format!(
                    "hover_delay_ms is {}; at most {} is allowed",
                    settings.hover_delay_ms, MAX_HOVER_DELAY_MS
                ),
            ));
        } else if settings.hover_enabled && settings.hover_delay_ms < SHORT_HOVER_DELAY_MS {
            results.push(self.finding(
                "hover_delay_short",
                "hover_delay_ms",
                format!(
                    "hover_delay_ms of {} opens previews while merely crossing the Dock",
                    settings.hover_delay_ms
                ),
            ));
        }

        for entry in &settings.excluded_bundle_ids {
            if self.bundle_id_regex.is_match(entry) {
                continue;
            }
            if self.app_name_regex.is_match(entry) {
                results.push(self.finding(
                    "exclusion_by_name",
                    "excluded_bundle_ids",
                    format!("'{}' is not a bundle identifier; it will match by application name", entry),
                ));
            } else {
                results.push(self.finding(
                    "invalid_exclusion",
                    "excluded_bundle_ids",
                    format!("'{}' is neither a bundle identifier nor an application name", entry),
                ));
            }
        }

        if !settings.enabled {
            results.push(self.finding(
                "previews_disabled",
                "enabled",
                "previews are disabled; every Dock click passes through".to_string(),
            ));
        }

        results
    }

    /// `Err` carrying every error-level finding, if any
    pub fn ensure_valid(&self, settings: &Settings) -> crate::Result<()> {
        let errors: Vec<String> = self
            .validate(settings)
            .into_iter()
            .filter(ValidationResult::is_error)
            .map(|result| result.message)
            .collect();

        if errors.is_empty() {
            Ok(())
        } else {
            Err(DockPeekError::ValidationError(errors.join("; ")).into())
        }
    }

    pub fn rules(&self) -> &[ValidationRule] {
        &self.rules
    }

    fn finding(&self, rule: &str, field: &'static str, message: String) -> ValidationResult {
        let rule = self
            .rules
            .iter()
            .find(|r| r.name == rule)
            .cloned()
            .unwrap_or(ValidationRule {
                name: "unknown",
                description: "",
                severity: ValidationSeverity::Error,
            });
        ValidationResult {
            rule,
            message,
            field,
        }
    }

    fn default_rules() -> Vec<ValidationRule> {
        vec![
            ValidationRule {
                name: "thumbnail_size_range",
                description: "Thumbnail size must be between 64 and 1024 points",
                severity: ValidationSeverity::Error,
            },
            ValidationRule {
                name: "hover_delay_range",
                description: "Hover delay must not exceed five seconds",
                severity: ValidationSeverity::Error,
            },
            ValidationRule {
                name: "hover_delay_short",
                description: "Very short hover delays trigger previews accidentally",
                severity: ValidationSeverity::Warning,
            },
            ValidationRule {
                name: "invalid_exclusion",
                description: "Exclusions must be bundle identifiers or application names",
                severity: ValidationSeverity::Error,
            },
            ValidationRule {
                name: "exclusion_by_name",
                description: "Exclusions by name break when an application is renamed",
                severity: ValidationSeverity::Warning,
            },
            ValidationRule {
                name: "previews_disabled",
                description: "Previews are turned off",
                severity: ValidationSeverity::Info,
            },
        ]
    }
}

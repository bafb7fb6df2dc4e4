use crate::capability::LanguageCapability;
use crate::error::CapabilityError;

/// Identity capability used when no key matches
#[derive(Debug, Clone, Copy, Default)]
pub struct PassThrough;

impl LanguageCapability for PassThrough {
    fn name(&self) -> &str {
        "pass-through"
    }

    fn description(&self) -> &str {
        "Writes content exactly as given"
    }

    fn transform(&self, content: &str) -> Result<String, CapabilityError> {
        Ok(content.to_string())
    }
}

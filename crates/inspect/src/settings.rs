use std::sync::Arc;

use pq_common::Settings;

use crate::ty::Type;

/// A request against the caller-supplied resolver for names that are not
/// declared in source (library functions and values).
#[derive(Debug, Clone, PartialEq)]
pub enum ExternalTypeRequest {
    Value {
        literal: String,
    },
    Invocation {
        literal: String,
        args: Vec<Type>,
    },
}

pub type ExternalTypeResolver =
    Arc<dyn Fn(&ExternalTypeRequest) -> Option<Type> + Send + Sync>;

/// Settings for the inspection stages, wrapping the common per-call settings.
///
/// `refine_literals` chooses between base primitive types and
/// literal-refined types for numeric/text/logical literals; both conventions
/// are applied consistently through union and equality.
#[derive(Clone)]
pub struct InspectionSettings {
    pub settings: Settings,
    pub maybe_external_type_resolver: Option<ExternalTypeResolver>,
    pub refine_literals: bool,
}

impl Default for InspectionSettings {
    fn default() -> Self {
        Self {
            settings: Settings::default(),
            maybe_external_type_resolver: None,
            refine_literals: true,
        }
    }
}

impl std::fmt::Debug for InspectionSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InspectionSettings")
            .field("settings", &self.settings)
            .field(
                "maybe_external_type_resolver",
                &self.maybe_external_type_resolver.as_ref().map(|_| "..."),
            )
            .field("refine_literals", &self.refine_literals)
            .finish()
    }
}

impl InspectionSettings {
    #[must_use]
    pub fn with_resolver(mut self, resolver: ExternalTypeResolver) -> Self {
        self.maybe_external_type_resolver = Some(resolver);
        self
    }

    #[must_use]
    pub fn with_literal_refinement(mut self, refine: bool) -> Self {
        self.refine_literals = refine;
        self
    }
}

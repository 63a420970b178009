use std::collections::BTreeMap;

use regex::Regex;

/// A write rejected by a field constraint.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("{field}: {message}")]
    Field { field: String, message: String },
    #[error("{field} already exists")]
    DuplicateKey { field: String },
}

impl ValidationError {
    pub fn field(field: &str, message: impl Into<String>) -> Self {
        Self::Field {
            field: field.to_string(),
            message: message.into(),
        }
    }

    pub fn duplicate(field: &str) -> Self {
        Self::DuplicateKey {
            field: field.to_string(),
        }
    }

    pub fn field_name(&self) -> &str {
        match self {
            Self::Field { field, .. } | Self::DuplicateKey { field } => field,
        }
    }
}

/// Length bound with the message reported when it is violated.
#[derive(Debug, Clone, Copy)]
pub struct Bound {
    pub len: usize,
    pub message: &'static str,
}

/// Declarative constraints for a single text field.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub required: Option<&'static str>,
    pub trim: bool,
    pub lowercase: bool,
    pub min_len: Option<Bound>,
    pub max_len: Option<Bound>,
    pub pattern: Option<(&'static Regex, &'static str)>,
    pub one_of: Option<(&'static [&'static str], &'static str)>,
    pub default: Option<&'static str>,
}

impl FieldSpec {
    pub fn text(name: &'static str) -> Self {
        Self {
            name,
            required: None,
            trim: false,
            lowercase: false,
            min_len: None,
            max_len: None,
            pattern: None,
            one_of: None,
            default: None,
        }
    }

    pub fn required(mut self, message: &'static str) -> Self {
        self.required = Some(message);
        self
    }

    pub fn trim(mut self) -> Self {
        self.trim = true;
        self
    }

    pub fn lowercase(mut self) -> Self {
        self.lowercase = true;
        self
    }

    pub fn min_len(mut self, len: usize, message: &'static str) -> Self {
        self.min_len = Some(Bound { len, message });
        self
    }

    pub fn max_len(mut self, len: usize, message: &'static str) -> Self {
        self.max_len = Some(Bound { len, message });
        self
    }

    pub fn pattern(mut self, re: &'static Regex, message: &'static str) -> Self {
        self.pattern = Some((re, message));
        self
    }

    pub fn one_of(mut self, values: &'static [&'static str], message: &'static str) -> Self {
        self.one_of = Some((values, message));
        self
    }

    pub fn default_value(mut self, value: &'static str) -> Self {
        self.default = Some(value);
        self
    }

    fn normalize(&self, raw: &str) -> String {
        let v = if self.trim { raw.trim() } else { raw };
        if self.lowercase {
            v.to_lowercase()
        } else {
            v.to_string()
        }
    }

    /// Normalizes `value` in place and checks it against the constraints.
    pub fn apply(&self, value: &mut Option<String>) -> Result<(), ValidationError> {
        if let Some(normalized) = value.as_deref().map(|raw| self.normalize(raw)) {
            *value = Some(normalized);
        }
        if value.as_deref().map_or(true, str::is_empty) {
            if let Some(default) = self.default {
                *value = Some(default.to_string());
            }
        }

        let v = match value.as_deref() {
            Some(v) if !v.is_empty() => v,
            _ => {
                return match self.required {
                    Some(message) => Err(ValidationError::field(self.name, message)),
                    None => Ok(()),
                }
            }
        };

        let len = v.chars().count();
        if let Some(min) = self.min_len {
            if len < min.len {
                return Err(ValidationError::field(self.name, min.message));
            }
        }
        if let Some(max) = self.max_len {
            if len > max.len {
                return Err(ValidationError::field(self.name, max.message));
            }
        }
        if let Some((re, message)) = self.pattern {
            if !re.is_match(v) {
                return Err(ValidationError::field(self.name, message));
            }
        }
        if let Some((allowed, message)) = self.one_of {
            if !allowed.contains(&v) {
                return Err(ValidationError::field(self.name, message));
            }
        }
        Ok(())
    }
}

/// Ordered field constraints of one record type.
#[derive(Debug, Clone)]
pub struct Schema {
    pub fields: Vec<FieldSpec>,
}

/// Field name to (possibly absent) text value.
pub type FieldValues = BTreeMap<&'static str, Option<String>>;

impl Schema {
    /// Runs every field present in `values` through its spec, in schema order.
    /// Fields missing from `values` are skipped, which is how partial updates
    /// validate only what they touch.
    pub fn apply(&self, values: &mut FieldValues) -> Result<(), ValidationError> {
        for spec in &self.fields {
            if let Some(value) = values.get_mut(spec.name) {
                spec.apply(value)?;
            }
        }
        Ok(())
    }
}

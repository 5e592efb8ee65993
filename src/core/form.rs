//! # Entry Form
//!
//! The one-time form shown before a new conversation when the app declares
//! input variables. Field values become the request `inputs`; the `target`
//! variable is also kept on its own since history seeds it separately.

use std::collections::BTreeMap;
use std::fmt;

use crate::api::{AppParameters, FormControl};

/// Variable name carried into every send as the target parameter.
pub const TARGET_VARIABLE: &str = "target";

#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    /// Single-line text (`text-input`)
    Input,
    /// Multi-line text (`paragraph`)
    Paragraph,
    /// One of a fixed set of options
    Select(Vec<String>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FormField {
    pub label: String,
    pub variable: String,
    pub kind: FieldKind,
    pub required: bool,
    pub max_length: Option<usize>,
    pub value: String,
}

impl FormField {
    fn from_control(control: &FormControl, kind: FieldKind) -> Self {
        let label = if control.label.is_empty() {
            control.variable.clone()
        } else {
            control.label.clone()
        };
        Self {
            label,
            variable: control.variable.clone(),
            kind,
            required: control.required,
            max_length: control.max_length.filter(|&n| n > 0),
            value: control.default.clone().unwrap_or_default(),
        }
    }

    /// Cycles a select field to its next option; no-op for text fields.
    pub fn cycle_option(&mut self, forward: bool) {
        let FieldKind::Select(options) = &self.kind else {
            return;
        };
        if options.is_empty() {
            return;
        }
        let current = options.iter().position(|o| *o == self.value);
        let next = match (current, forward) {
            (None, true) => 0,
            (None, false) => options.len() - 1,
            (Some(i), true) => (i + 1) % options.len(),
            (Some(i), false) => (i + options.len() - 1) % options.len(),
        };
        self.value = options[next].clone();
    }

    fn validate(&self) -> Option<FieldError> {
        let value = self.value.trim();
        if value.is_empty() {
            return self.required.then(|| FieldError {
                variable: self.variable.clone(),
                message: format!("{} is required", self.label),
            });
        }
        if let Some(max) = self.max_length
            && value.chars().count() > max
        {
            return Some(FieldError {
                variable: self.variable.clone(),
                message: format!("{} must be at most {} characters", self.label, max),
            });
        }
        if let FieldKind::Select(options) = &self.kind
            && !options.iter().any(|o| o == value)
        {
            return Some(FieldError {
                variable: self.variable.clone(),
                message: format!("{} must be one of the listed options", self.label),
            });
        }
        None
    }
}

/// Validation failure for a single field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldError {
    pub variable: String,
    pub message: String,
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for FieldError {}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntryForm {
    pub fields: Vec<FormField>,
    /// Index of the field receiving keyboard input.
    pub focused: usize,
    /// Errors from the last failed submit, keyed by variable.
    pub errors: BTreeMap<String, String>,
}

impl EntryForm {
    /// Builds the form from the app's declared inputs. Unsupported control
    /// kinds are skipped.
    pub fn from_parameters(parameters: &AppParameters) -> Self {
        let fields = parameters
            .user_input_form
            .iter()
            .filter_map(|item| {
                if let Some(c) = &item.text_input {
                    Some(FormField::from_control(c, FieldKind::Input))
                } else if let Some(c) = &item.paragraph {
                    Some(FormField::from_control(c, FieldKind::Paragraph))
                } else {
                    item.select
                        .as_ref()
                        .map(|c| FormField::from_control(c, FieldKind::Select(c.options.clone())))
                }
            })
            .collect();
        Self {
            fields,
            focused: 0,
            errors: BTreeMap::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn focused_field_mut(&mut self) -> Option<&mut FormField> {
        self.fields.get_mut(self.focused)
    }

    pub fn focus_next(&mut self) {
        if !self.fields.is_empty() {
            self.focused = (self.focused + 1) % self.fields.len();
        }
    }

    pub fn focus_prev(&mut self) {
        if !self.fields.is_empty() {
            self.focused = (self.focused + self.fields.len() - 1) % self.fields.len();
        }
    }

    pub fn value(&self, variable: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|f| f.variable == variable)
            .map(|f| f.value.as_str())
    }

    /// Checks every field. On success returns the trimmed values of all
    /// non-empty fields; on failure records the errors on the form and moves
    /// focus to the first invalid field.
    pub fn validate(&mut self) -> Result<BTreeMap<String, String>, Vec<FieldError>> {
        let errors: Vec<FieldError> = self.fields.iter().filter_map(FormField::validate).collect();
        self.errors = errors
            .iter()
            .map(|e| (e.variable.clone(), e.message.clone()))
            .collect();

        if let Some(first) = errors.first() {
            if let Some(idx) = self.fields.iter().position(|f| f.variable == first.variable) {
                self.focused = idx;
            }
            return Err(errors);
        }

        Ok(self
            .fields
            .iter()
            .filter(|f| !f.value.trim().is_empty())
            .map(|f| (f.variable.clone(), f.value.trim().to_string()))
            .collect())
    }
}

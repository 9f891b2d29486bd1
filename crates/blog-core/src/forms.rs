//! Structural validation of user-submitted forms.
//!
//! Text fields are trimmed before validation. A blank required field
//! reports only "required", never the follow-up format errors.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError, ValidationErrors, ValidationErrorsKind};

use crate::domain::Comment;

const REQUIRED: &str = "required";

pub(crate) fn required(value: &str) -> Result<(), ValidationError> {
    if value.is_empty() {
        return Err(ValidationError::new(REQUIRED));
    }
    Ok(())
}

/// Field name -> human-readable messages.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FormErrors(pub BTreeMap<String, Vec<String>>);

impl FormErrors {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn field(&self, name: &str) -> Option<&[String]> {
        self.0.get(name).map(Vec::as_slice)
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }
}

impl From<ValidationErrors> for FormErrors {
    fn from(errors: ValidationErrors) -> Self {
        let mut out = FormErrors::default();

        for (field, kind) in errors.errors() {
            let ValidationErrorsKind::Field(field_errors) = kind else {
                continue;
            };

            if field_errors.iter().any(|e| e.code == REQUIRED) {
                out.add(field, "This field is required.");
                continue;
            }

            for error in field_errors {
                out.add(field, describe(error));
            }
        }

        out
    }
}

fn describe(error: &ValidationError) -> String {
    if let Some(message) = &error.message {
        return message.to_string();
    }

    match error.code.as_ref() {
        "email" => "Enter a valid email address.".to_string(),
        "length" => {
            let max = error.params.get("max").and_then(|v| v.as_u64());
            let actual = error
                .params
                .get("value")
                .and_then(|v| v.as_str())
                .map(|s| s.chars().count());
            match (max, actual) {
                (Some(max), Some(actual)) => format!(
                    "Ensure this value has at most {max} characters (it has {actual})."
                ),
                (Some(max), None) => format!("Ensure this value has at most {max} characters."),
                _ => "Ensure this value has a valid length.".to_string(),
            }
        }
        other => format!("Invalid value ({other})."),
    }
}

/// Common behaviour of submitted forms.
pub trait FormData: Validate + Sized {
    /// Normalize raw input (trim whitespace).
    fn clean(self) -> Self;

    /// Clean, then validate; returns the cleaned data or field errors.
    fn validated(self) -> Result<Self, FormErrors> {
        let cleaned = self.clean();
        match cleaned.validate() {
            Ok(()) => Ok(cleaned),
            Err(errors) => Err(errors.into()),
        }
    }
}

/// Comment submitted under a post.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct CommentForm {
    #[serde(default)]
    #[validate(custom(function = "required"), length(max = 80))]
    pub name: String,
    #[serde(default)]
    #[validate(custom(function = "required"), email, length(max = 254))]
    pub email: String,
    #[serde(default)]
    #[validate(custom(function = "required"))]
    pub body: String,
}

impl FormData for CommentForm {
    fn clean(self) -> Self {
        Self {
            name: self.name.trim().to_string(),
            email: self.email.trim().to_string(),
            body: self.body.trim().to_string(),
        }
    }
}

impl CommentForm {
    /// Build the comment this (validated) form describes, bound to `post_id`.
    pub fn into_comment(self, post_id: Uuid) -> Comment {
        Comment::new(post_id, self.name, self.email, self.body)
    }
}

/// Recommendation of a post sent by email.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct EmailPostForm {
    #[serde(default)]
    #[validate(custom(function = "required"), length(max = 25))]
    pub name: String,
    #[serde(default)]
    #[validate(custom(function = "required"), email)]
    pub to: String,
    #[serde(default)]
    pub comments: String,
}

impl FormData for EmailPostForm {
    fn clean(self) -> Self {
        Self {
            name: self.name.trim().to_string(),
            to: self.to.trim().to_string(),
            comments: self.comments.trim().to_string(),
        }
    }
}

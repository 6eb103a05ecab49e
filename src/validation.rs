use validator::ValidationErrors;

use crate::error::AppError;

/// Flattens validator output into one line: "field: problem; ...".
/// Sorted so the wording is stable regardless of hash order.
pub fn describe(errors: &ValidationErrors) -> String {
    let mut parts: Vec<String> = Vec::new();
    for (field, field_errors) in errors.field_errors() {
        for error in field_errors.iter() {
            let message = error
                .message
                .clone()
                .unwrap_or_else(|| "invalid value".into());
            parts.push(format!("{}: {}", field, message));
        }
    }
    parts.sort();
    parts.join("; ")
}

impl From<ValidationErrors> for AppError {
    fn from(errors: ValidationErrors) -> Self {
        AppError::Validation(describe(&errors))
    }
}

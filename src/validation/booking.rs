use std::collections::HashMap;

use garde::Validate;

use crate::error::{AppError, Result};

/// A booking request as submitted by the public form.
#[derive(Debug, Clone, Validate)]
pub struct BookingForm {
    #[garde(length(min = 1, max = 200))]
    pub name: String,
    #[garde(email)]
    pub email: String,
    #[garde(length(max = 100))]
    pub date: String,
    #[garde(length(max = 100))]
    pub time: String,
    #[garde(length(max = 100))]
    pub age: String,
    #[garde(length(max = 2000))]
    pub allergies: String,
    #[garde(length(max = 500))]
    pub placement: String,
    #[garde(length(max = 500))]
    pub size: String,
    #[garde(length(max = 5000))]
    pub design: String,
    #[garde(length(max = 10000))]
    pub message: String,
}

impl BookingForm {
    /// Builds the form from multipart text fields. Missing fields are empty.
    pub fn from_fields(mut fields: HashMap<String, String>) -> Self {
        let mut take = |key: &str| fields.remove(key).map(|v| v.trim().to_string()).unwrap_or_default();

        Self {
            name: take("name"),
            email: take("email"),
            date: take("date"),
            time: take("time"),
            age: take("age"),
            allergies: take("allergies"),
            placement: take("placement"),
            size: take("size-tatto"),
            design: take("design"),
            message: take("message"),
        }
    }

    /// Validates the form, mapping the report to a 400.
    pub fn validated(self) -> Result<Self> {
        self.validate()
            .map_err(|report| AppError::Validation(format!("Invalid booking: {}", report)))?;
        Ok(self)
    }

    /// Plain-text mail body, one `Field: value` line per field.
    pub fn mail_body(&self) -> String {
        [
            format!("Name: {}", self.name),
            format!("Email: {}", self.email),
            format!("Date: {}", self.date),
            format!("Time: {}", self.time),
            format!("Age: {}", self.age),
            format!("Allergies: {}", self.allergies),
            format!("Placement: {}", self.placement),
            format!("Size: {}", self.size),
            format!("Design: {}", self.design),
            format!("Message: {}", self.message),
        ]
        .join("\n\n")
    }

    pub fn subject(&self) -> String {
        format!("New booking request from {}", self.name)
    }
}

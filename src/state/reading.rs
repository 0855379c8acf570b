// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Validation of sensor reports sent by the device.

use serde_json::{Map, Value};

use crate::error::{ParseError, ValidationError};
use crate::types::{ControlMode, CurtainPosition};

/// A validated sensor report.
///
/// Built from the raw JSON the device publishes on `/curtain/data`:
///
/// ```json
/// {"temperature": 29.3, "humidity": 55.8, "light": 420, "position": "Open", "mode": "Auto"}
/// ```
///
/// All five fields are required. Numeric fields may arrive as JSON numbers
/// or as numeric strings; `light` is truncated to an integer.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorReading {
    /// Temperature in °C.
    pub temperature: f64,
    /// Relative humidity in %.
    pub humidity: f64,
    /// Light level in lux.
    pub light: i32,
    /// Position reported by the device.
    pub position: CurtainPosition,
    /// Mode reported by the device.
    pub mode: ControlMode,
}

/// Fields in the order they are checked for presence.
const REQUIRED_FIELDS: [&str; 5] = ["temperature", "humidity", "light", "position", "mode"];

impl SensorReading {
    /// Parses and validates a JSON payload.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::Json`] for malformed JSON and
    /// [`ParseError::InvalidValue`] wrapping the validation failure otherwise.
    pub fn from_json(payload: &str) -> Result<Self, ParseError> {
        let value: Value = serde_json::from_str(payload)?;
        Self::from_value(&value).map_err(|e| ParseError::InvalidValue {
            field: "reading".to_string(),
            message: e.to_string(),
        })
    }

    /// Validates an already-decoded JSON document.
    ///
    /// Presence of every required field is checked before any conversion,
    /// so a report missing a field is always rejected as
    /// [`ValidationError::MissingField`].
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::MissingField`] when a required field is
    /// absent and [`ValidationError::TypeMismatch`] or
    /// [`ValidationError::InvalidValue`] when a field cannot be converted.
    pub fn from_value(value: &Value) -> Result<Self, ValidationError> {
        let Some(object) = value.as_object() else {
            return Err(ValidationError::TypeMismatch {
                field: "reading",
                expected: "a JSON object",
            });
        };

        for field in REQUIRED_FIELDS {
            if lookup(object, field).is_none() {
                return Err(ValidationError::MissingField(field));
            }
        }

        Ok(Self {
            temperature: float_field(object, "temperature")?,
            humidity: float_field(object, "humidity")?,
            light: int_field(object, "light")?,
            position: string_field(object, "position")?.parse()?,
            mode: string_field(object, "mode")?.parse()?,
        })
    }
}

/// Looks a field up, honouring the legacy `curtain_status` name for `mode`.
fn lookup<'a>(object: &'a Map<String, Value>, field: &str) -> Option<&'a Value> {
    let value = match field {
        "mode" => object.get("mode").or_else(|| object.get("curtain_status")),
        _ => object.get(field),
    };
    value.filter(|v| !v.is_null())
}

fn float_field(object: &Map<String, Value>, field: &'static str) -> Result<f64, ValidationError> {
    let mismatch = ValidationError::TypeMismatch {
        field,
        expected: "a number",
    };
    match lookup(object, field) {
        Some(Value::Number(n)) => n.as_f64().ok_or(mismatch),
        Some(Value::String(s)) => s.trim().parse::<f64>().map_err(|_| mismatch),
        Some(_) => Err(mismatch),
        None => Err(ValidationError::MissingField(field)),
    }
}

fn int_field(object: &Map<String, Value>, field: &'static str) -> Result<i32, ValidationError> {
    let mismatch = ValidationError::TypeMismatch {
        field,
        expected: "an integer",
    };
    let wide = match lookup(object, field) {
        Some(Value::Number(n)) => {
            if let Some(i) = n.as_i64() {
                i
            } else {
                // Fractional lux values are truncated, as the firmware's
                // analog reads sometimes come through as floats.
                #[allow(clippy::cast_possible_truncation)]
                let truncated = n.as_f64().ok_or(mismatch.clone())?.trunc() as i64;
                truncated
            }
        }
        Some(Value::String(s)) => s.trim().parse::<i64>().map_err(|_| mismatch.clone())?,
        Some(_) => return Err(mismatch),
        None => return Err(ValidationError::MissingField(field)),
    };
    i32::try_from(wide).map_err(|_| ValidationError::InvalidValue {
        field,
        message: format!("{wide} is out of range"),
    })
}

fn string_field<'a>(
    object: &'a Map<String, Value>,
    field: &'static str,
) -> Result<&'a str, ValidationError> {
    match lookup(object, field) {
        Some(Value::String(s)) => Ok(s),
        Some(_) => Err(ValidationError::TypeMismatch {
            field,
            expected: "a string",
        }),
        None => Err(ValidationError::MissingField(field)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_complete_report() {
        let reading = SensorReading::from_value(&json!({
            "temperature": 29.3,
            "humidity": 55.8,
            "light": 420,
            "position": "Open",
            "mode": "Auto"
        }))
        .unwrap();
        assert!((reading.temperature - 29.3).abs() < f64::EPSILON);
        assert_eq!(reading.light, 420);
        assert_eq!(reading.position, CurtainPosition::Open);
        assert_eq!(reading.mode, ControlMode::Auto);
    }

    #[test]
    fn missing_field_is_reported_before_type_errors() {
        let err = SensorReading::from_value(&json!({
            "temperature": "hot",
            "humidity": 55.8,
            "position": "Open",
            "mode": "Auto"
        }))
        .unwrap_err();
        assert_eq!(err, ValidationError::MissingField("light"));
    }

    #[test]
    fn null_counts_as_missing() {
        let err = SensorReading::from_value(&json!({
            "temperature": null,
            "humidity": 55.8,
            "light": 1,
            "position": "Open",
            "mode": "Auto"
        }))
        .unwrap_err();
        assert_eq!(err, ValidationError::MissingField("temperature"));
    }

    #[test]
    fn numeric_strings_are_converted() {
        let reading = SensorReading::from_value(&json!({
            "temperature": "30.5",
            "humidity": "40",
            "light": "512",
            "position": "Closed",
            "mode": "Manual"
        }))
        .unwrap();
        assert!((reading.temperature - 30.5).abs() < f64::EPSILON);
        assert_eq!(reading.light, 512);
    }

    #[test]
    fn fractional_light_is_truncated() {
        let reading = SensorReading::from_value(&json!({
            "temperature": 20,
            "humidity": 40,
            "light": 250.9,
            "position": "Closed",
            "mode": "Manual"
        }))
        .unwrap();
        assert_eq!(reading.light, 250);
    }

    #[test]
    fn non_numeric_temperature_is_type_error() {
        let err = SensorReading::from_value(&json!({
            "temperature": "warm",
            "humidity": 40,
            "light": 250,
            "position": "Closed",
            "mode": "Manual"
        }))
        .unwrap_err();
        assert!(matches!(
            err,
            ValidationError::TypeMismatch {
                field: "temperature",
                ..
            }
        ));
    }

    #[test]
    fn boolean_light_is_type_error() {
        let err = SensorReading::from_value(&json!({
            "temperature": 20,
            "humidity": 40,
            "light": true,
            "position": "Closed",
            "mode": "Manual"
        }))
        .unwrap_err();
        assert!(matches!(err, ValidationError::TypeMismatch { field: "light", .. }));
    }

    #[test]
    fn legacy_mode_field_is_accepted() {
        let reading = SensorReading::from_value(&json!({
            "temperature": 20,
            "humidity": 40,
            "light": 250,
            "position": "Tertutup",
            "curtain_status": "Auto"
        }))
        .unwrap();
        assert_eq!(reading.mode, ControlMode::Auto);
        assert_eq!(reading.position, CurtainPosition::Closed);
    }

    #[test]
    fn non_object_is_rejected() {
        assert!(SensorReading::from_value(&json!([1, 2, 3])).is_err());
    }

    #[test]
    fn malformed_json_is_parse_error() {
        assert!(matches!(
            SensorReading::from_json("{not json"),
            Err(ParseError::Json(_))
        ));
    }
}

//! Raw housing records and the field names that make up the dataset schema.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

/// Numeric input fields, in feature-vector order.
pub const NUMERIC_FIELDS: [&str; 8] = [
    "longitude",
    "latitude",
    "housing_median_age",
    "total_rooms",
    "total_bedrooms",
    "population",
    "households",
    "median_income",
];

/// Right-skewed count fields that are replaced by `ln(v + 1)`.
pub const LOG_FIELDS: [&str; 4] = ["total_rooms", "total_bedrooms", "population", "households"];

/// The categorical field, one-hot encoded against the fitted vocabulary.
pub const CATEGORY_FIELD: &str = "ocean_proximity";

/// Training label.
pub const LABEL_FIELD: &str = "median_house_value";

/// One block group from the census-derived housing table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub longitude: f64,
    pub latitude: f64,
    pub housing_median_age: f64,
    pub total_rooms: f64,
    pub total_bedrooms: f64,
    pub population: f64,
    pub households: f64,
    pub median_income: f64,
    /// `None` encodes as an all-zero one-hot block.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ocean_proximity: Option<String>,
}

impl Record {
    /// Numeric fields in [`NUMERIC_FIELDS`] order.
    pub fn numeric_values(&self) -> [f64; 8] {
        [
            self.longitude,
            self.latitude,
            self.housing_median_age,
            self.total_rooms,
            self.total_bedrooms,
            self.population,
            self.households,
            self.median_income,
        ]
    }

    /// Build a record from values given in [`NUMERIC_FIELDS`] order.
    pub fn from_values(values: [f64; 8], ocean_proximity: Option<String>) -> Self {
        let [longitude, latitude, housing_median_age, total_rooms, total_bedrooms, population, households, median_income] =
            values;
        Self {
            longitude,
            latitude,
            housing_median_age,
            total_rooms,
            total_bedrooms,
            population,
            households,
            median_income,
            ocean_proximity,
        }
    }

    /// Decode a record from a JSON object.
    ///
    /// Every numeric field must be present and a JSON number; the category is
    /// optional and must be a string when given. Unknown keys are ignored.
    pub fn from_json(value: &Value) -> Result<Self> {
        let object = value
            .as_object()
            .ok_or_else(|| Error::SchemaMismatch("record must be a JSON object".to_string()))?;

        let mut values = [0.0; 8];
        for (slot, field) in values.iter_mut().zip(NUMERIC_FIELDS) {
            *slot = match object.get(field) {
                None | Some(Value::Null) => {
                    return Err(Error::SchemaMismatch(format!("missing field '{field}'")))
                }
                Some(v) => v.as_f64().ok_or_else(|| {
                    Error::SchemaMismatch(format!("field '{field}' must be numeric, got {v}"))
                })?,
            };
        }

        let ocean_proximity = match object.get(CATEGORY_FIELD) {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(v) => {
                return Err(Error::SchemaMismatch(format!(
                    "field '{CATEGORY_FIELD}' must be a string, got {v}"
                )))
            }
        };

        Ok(Self::from_values(values, ocean_proximity))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn full() -> Value {
        json!({
            "longitude": -122.23,
            "latitude": 37.88,
            "housing_median_age": 41,
            "total_rooms": 880,
            "total_bedrooms": 129,
            "population": 322,
            "households": 126,
            "median_income": 8.3252,
            "ocean_proximity": "NEAR BAY"
        })
    }

    #[test]
    fn decodes_complete_object() {
        let record = Record::from_json(&full()).unwrap();
        assert_eq!(record.total_rooms, 880.0);
        assert_eq!(record.median_income, 8.3252);
        assert_eq!(record.ocean_proximity.as_deref(), Some("NEAR BAY"));
    }

    #[test]
    fn category_is_optional() {
        let mut body = full();
        body.as_object_mut().unwrap().remove(CATEGORY_FIELD);
        let record = Record::from_json(&body).unwrap();
        assert_eq!(record.ocean_proximity, None);
    }

    #[test]
    fn missing_numeric_field_is_schema_mismatch() {
        let mut body = full();
        body.as_object_mut().unwrap().remove("median_income");
        let err = Record::from_json(&body).unwrap_err();
        assert!(matches!(err, Error::SchemaMismatch(ref m) if m.contains("median_income")));
    }

    #[test]
    fn non_numeric_field_is_schema_mismatch() {
        let mut body = full();
        body["population"] = json!("lots");
        assert!(matches!(Record::from_json(&body), Err(Error::SchemaMismatch(_))));
    }

    #[test]
    fn non_object_is_rejected() {
        assert!(Record::from_json(&json!([1, 2, 3])).is_err());
    }

    #[test]
    fn values_round_trip_in_field_order() {
        let record = Record::from_json(&full()).unwrap();
        let rebuilt = Record::from_values(record.numeric_values(), record.ocean_proximity.clone());
        assert_eq!(record, rebuilt);
    }
}

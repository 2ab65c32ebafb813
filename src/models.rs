use serde_aux::field_attributes::deserialize_default_from_null;

/// A single weather reading as published on the queue.
///
/// Missing or `null` keys decode to zero values and unknown keys are ignored.
/// `collected_at` is carried through untouched.
#[derive(serde::Deserialize, serde::Serialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct WeatherObservation {
    #[serde(deserialize_with = "deserialize_default_from_null")]
    pub location_lat: f64,
    #[serde(deserialize_with = "deserialize_default_from_null")]
    pub location_lon: f64,
    #[serde(deserialize_with = "deserialize_default_from_null")]
    pub temperature: f64,
    #[serde(deserialize_with = "deserialize_default_from_null")]
    pub humidity: f64,
    #[serde(deserialize_with = "deserialize_default_from_null")]
    pub wind_speed: f64,
    #[serde(deserialize_with = "deserialize_default_from_null")]
    pub condition_code: i64,
    #[serde(deserialize_with = "deserialize_default_from_null")]
    pub collected_at: String,
}

impl WeatherObservation {
    /// Decodes a queue payload. A bare `null` body yields the zero record.
    pub fn from_payload(body: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice::<Option<Self>>(body).map(Option::unwrap_or_default)
    }
}

#[cfg(test)]
pub(crate) const SAMPLE_OBSERVATION: &str = r#"{"location_lat":10.5,"location_lon":-20.3,"temperature":25.1,"humidity":60,"wind_speed":5.2,"condition_code":2,"collected_at":"2024-01-01T00:00:00Z"}"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_sample_observation() {
        let observation: WeatherObservation = serde_json::from_str(SAMPLE_OBSERVATION).unwrap();
        assert_eq!(observation.location_lat, 10.5);
        assert_eq!(observation.location_lon, -20.3);
        assert_eq!(observation.temperature, 25.1);
        assert_eq!(observation.humidity, 60.0);
        assert_eq!(observation.wind_speed, 5.2);
        assert_eq!(observation.condition_code, 2);
        assert_eq!(observation.collected_at, "2024-01-01T00:00:00Z");
    }

    #[test]
    fn reserialization_preserves_every_field() {
        let observation: WeatherObservation = serde_json::from_str(SAMPLE_OBSERVATION).unwrap();
        let encoded = serde_json::to_string(&observation).unwrap();
        let decoded: WeatherObservation = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, observation);
    }

    #[test]
    fn reserialization_uses_snake_case_keys() {
        let observation: WeatherObservation = serde_json::from_str(SAMPLE_OBSERVATION).unwrap();
        let value = serde_json::to_value(&observation).unwrap();
        let object = value.as_object().unwrap();
        let mut keys = object.keys().map(String::as_str).collect::<Vec<_>>();
        keys.sort_unstable();
        assert_eq!(
            keys,
            [
                "collected_at",
                "condition_code",
                "humidity",
                "location_lat",
                "location_lon",
                "temperature",
                "wind_speed",
            ]
        );
    }

    #[test]
    fn missing_fields_decode_to_zero_values() {
        let observation: WeatherObservation =
            serde_json::from_str(r#"{"temperature":18.25}"#).unwrap();
        assert_eq!(
            observation,
            WeatherObservation {
                temperature: 18.25,
                ..WeatherObservation::default()
            }
        );

        let empty: WeatherObservation = serde_json::from_str("{}").unwrap();
        assert_eq!(empty, WeatherObservation::default());
    }

    #[test]
    fn unknown_fields_are_ignored() {
        let observation: WeatherObservation =
            serde_json::from_str(r#"{"condition_code":3,"station":"north","extra":[1,2]}"#)
                .unwrap();
        assert_eq!(observation.condition_code, 3);
    }

    #[test]
    fn invalid_json_fails_to_decode() {
        assert!(serde_json::from_str::<WeatherObservation>("not-json").is_err());
        assert!(WeatherObservation::from_payload(b"not-json").is_err());
    }

    #[test]
    fn null_fields_decode_to_zero_values() {
        let body = SAMPLE_OBSERVATION
            .replace("\"temperature\":25.1", "\"temperature\":null")
            .replace("\"condition_code\":2", "\"condition_code\":null")
            .replace("\"2024-01-01T00:00:00Z\"", "null");
        let observation = WeatherObservation::from_payload(body.as_bytes()).unwrap();
        assert_eq!(observation.temperature, 0.0);
        assert_eq!(observation.condition_code, 0);
        assert_eq!(observation.collected_at, "");
        assert_eq!(observation.location_lat, 10.5);
        assert_eq!(observation.humidity, 60.0);
    }

    #[test]
    fn null_body_decodes_to_zero_record() {
        let observation = WeatherObservation::from_payload(b"null").unwrap();
        assert_eq!(observation, WeatherObservation::default());
    }

    #[test]
    fn non_object_body_fails_to_decode() {
        assert!(WeatherObservation::from_payload(b"42").is_err());
        assert!(WeatherObservation::from_payload(br#""sunny""#).is_err());
        assert!(WeatherObservation::from_payload(br#"{"temperature":"hot"}"#).is_err());
    }
}

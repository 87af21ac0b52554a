//! GET_WEATHER: mock weather lookup.
//!
//! Returns deterministic, plausible conditions derived from the location
//! name, so multi-step plans can be exercised without network access. Each
//! observation is also stored as a fact through the persistence adapter.

use std::sync::Arc;

use async_trait::async_trait;
use mindloop_core::action::{Action, ActionExample, ActionResult, HandlerContext};
use mindloop_core::error::ComponentError;
use mindloop_core::message::Content;
use mindloop_core::persistence::{Memory, PersistenceAdapter, table};
use serde::Serialize;

pub struct GetWeatherAction {
    persistence: Arc<dyn PersistenceAdapter>,
}

impl GetWeatherAction {
    pub fn new(persistence: Arc<dyn PersistenceAdapter>) -> Self {
        Self { persistence }
    }
}

#[async_trait]
impl Action for GetWeatherAction {
    fn name(&self) -> &str {
        "GET_WEATHER"
    }

    fn similes(&self) -> &[&str] {
        &["WEATHER", "FORECAST", "WEATHER_LOOKUP"]
    }

    fn description(&self) -> &str {
        "Look up current weather for a location. Options: `location` (required), `units` (metric | imperial)."
    }

    fn examples(&self) -> Vec<Vec<ActionExample>> {
        vec![vec![
            ActionExample::new("user", "What's the weather in Tokyo?", None),
            ActionExample::new("agent", "Let me check.", Some("GET_WEATHER")),
        ]]
    }

    async fn handle(&self, ctx: HandlerContext<'_>) -> Result<ActionResult, ComponentError> {
        let location = ctx
            .options
            .get("location")
            .and_then(|v| v.as_str())
            .or_else(|| ctx.state.value("location").and_then(|v| v.as_str()))
            .ok_or_else(|| ComponentError::InvalidOptions("missing 'location'".into()))?;
        let units = ctx
            .options
            .get("units")
            .and_then(|v| v.as_str())
            .unwrap_or("metric");

        let weather = mock_weather(location, units);
        let summary = format!(
            "{}: {}, {}{}, humidity {}%, wind {} km/h {}",
            weather.location,
            weather.conditions,
            weather.temperature,
            weather.units,
            weather.humidity,
            weather.wind_speed,
            weather.wind_direction
        );

        let fact = Content::text(summary.clone()).with_action(self.name());
        self.persistence
            .create_memory(
                Memory::from_response(self.name(), &ctx.message.room_id, fact),
                table::FACTS,
            )
            .await?;

        let data = serde_json::to_value(&weather)
            .map_err(|e| ComponentError::failed(format!("could not encode weather: {e}")))?;
        Ok(ActionResult::success(self.name())
            .with_text(summary)
            .with_value("location", weather.location.clone())
            .with_data("weather", data))
    }
}

#[derive(Debug, Serialize)]
struct WeatherData {
    location: String,
    temperature: f64,
    units: String,
    conditions: String,
    humidity: u32,
    wind_speed: f64,
    wind_direction: String,
}

/// Deterministic weather from a hash of the location name.
fn mock_weather(location: &str, units: &str) -> WeatherData {
    let hash: u32 = location
        .bytes()
        .fold(0u32, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u32));

    const CONDITIONS: [&str; 8] = [
        "clear skies",
        "partly cloudy",
        "overcast",
        "light rain",
        "heavy rain",
        "thunderstorms",
        "snow",
        "fog",
    ];
    const WIND: [&str; 8] = ["N", "NE", "E", "SE", "S", "SW", "W", "NW"];

    let celsius = f64::from(hash % 40) - 5.0;
    let (temperature, unit_label) = if units == "imperial" {
        (celsius * 9.0 / 5.0 + 32.0, "°F")
    } else {
        (celsius, "°C")
    };

    WeatherData {
        location: location.to_string(),
        temperature: (temperature * 10.0).round() / 10.0,
        units: unit_label.to_string(),
        conditions: CONDITIONS[(hash as usize / 7) % CONDITIONS.len()].to_string(),
        humidity: 30 + (hash % 60),
        wind_speed: f64::from(hash % 30) + 5.0,
        wind_direction: WIND[(hash as usize / 3) % WIND.len()].to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mindloop_core::action::ActionContext;
    use mindloop_core::message::Message;
    use mindloop_core::sink::NullSink;
    use mindloop_core::state::State;
    use mindloop_memory::InMemoryAdapter;
    use serde_json::{Value, json};

    async fn lookup(
        adapter: &InMemoryAdapter,
        options: Value,
        state: &State,
    ) -> Result<ActionResult, ComponentError> {
        let message = Message::new("weather?").in_room("r1");
        let plan = ActionContext::default();
        GetWeatherAction::new(Arc::new(adapter.clone()))
            .handle(HandlerContext {
                message: &message,
                state,
                options: &options,
                plan: &plan,
                reply: None,
                sink: &NullSink,
            })
            .await
    }

    #[tokio::test]
    async fn returns_weather_and_records_fact() {
        let adapter = InMemoryAdapter::new();
        let result = lookup(&adapter, json!({ "location": "Tokyo" }), &State::new())
            .await
            .unwrap();

        assert!(result.success);
        assert!(result.text.as_deref().unwrap().starts_with("Tokyo: "));
        assert_eq!(result.data["weather"]["units"], "°C");
        assert_eq!(adapter.count(table::FACTS).await, 1);
    }

    #[tokio::test]
    async fn imperial_units() {
        let adapter = InMemoryAdapter::new();
        let result = lookup(
            &adapter,
            json!({ "location": "New York", "units": "imperial" }),
            &State::new(),
        )
        .await
        .unwrap();
        assert!(result.text.as_deref().unwrap().contains("°F"));
    }

    #[test]
    fn deterministic_per_location() {
        let a = mock_weather("London", "metric");
        let b = mock_weather("London", "metric");
        assert_eq!(a.temperature, b.temperature);
        assert_eq!(a.conditions, b.conditions);
    }

    #[tokio::test]
    async fn falls_back_to_state_location() {
        let adapter = InMemoryAdapter::new();
        let mut state = State::new();
        state.values.insert("location".into(), "Lima".into());
        let result = lookup(&adapter, Value::Null, &state).await.unwrap();
        assert_eq!(result.values["location"], "Lima");
    }

    #[tokio::test]
    async fn missing_location_is_invalid() {
        let adapter = InMemoryAdapter::new();
        let err = lookup(&adapter, json!({}), &State::new()).await.unwrap_err();
        assert!(matches!(err, ComponentError::InvalidOptions(_)));
        assert_eq!(adapter.count(table::FACTS).await, 0);
    }
}

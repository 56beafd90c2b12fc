//! Current date and time in a named zone.

use crate::tools::{Arguments, ParamFormat, ParamSpec, Tool, ToolError, ToolSpec};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde_json::Value;

#[derive(Debug, Default, Clone, Copy)]
pub struct CurrentTime;

#[async_trait]
impl Tool for CurrentTime {
    fn spec(&self) -> ToolSpec {
        ToolSpec::new(
            "get_current_time",
            "Get the current date and time for a specified timezone. Useful for scheduling, \
             reminders, or time-sensitive queries.",
        )
        .param(
            ParamSpec::string(
                "timezone",
                "Timezone name (e.g. 'UTC', 'America/New_York', 'Asia/Tokyo'). Default is UTC.",
            )
            .with_default("UTC")
            .with_format(ParamFormat::IanaTimezone),
        )
    }

    async fn execute(&self, args: Arguments) -> Result<Value, ToolError> {
        let name = args.str("timezone")?;
        let zone: Tz = name
            .parse()
            .map_err(|_| ToolError::validation("timezone", format!("unknown timezone '{name}'")))?;
        Ok(Value::String(describe(name, &Utc::now().with_timezone(&zone))))
    }
}

fn describe<Z>(name: &str, now: &DateTime<Z>) -> String
where
    Z: TimeZone,
    Z::Offset: std::fmt::Display,
{
    format!(
        "Current time in {name}:\n- Date: {}\n- Time: {}\n- Day: {}\n- Full: {}",
        now.format("%Y-%m-%d"),
        now.format("%H:%M:%S"),
        now.format("%A"),
        now.format("%Y-%m-%d %H:%M:%S %Z"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::executor::validate;
    use serde_json::json;

    #[test]
    fn describes_a_fixed_instant() {
        let instant = Utc.with_ymd_and_hms(2024, 3, 15, 16, 30, 0).unwrap();
        let tokyo = instant.with_timezone(&chrono_tz::Asia::Tokyo);
        let text = describe("Asia/Tokyo", &tokyo);

        assert!(text.starts_with("Current time in Asia/Tokyo:"));
        assert!(text.contains("- Date: 2024-03-16"));
        assert!(text.contains("- Time: 01:30:00"));
        assert!(text.contains("- Day: Saturday"));
        assert!(text.contains("JST"));
    }

    #[tokio::test]
    async fn defaults_to_utc() {
        let tool = CurrentTime;
        let args = validate(&tool.spec(), &json!({})).unwrap();
        let out = tool.execute(args).await.unwrap();
        assert!(out.as_str().unwrap().starts_with("Current time in UTC:"));
    }
}

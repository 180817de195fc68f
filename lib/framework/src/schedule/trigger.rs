use std::str::FromStr;

use chrono::DateTime;
use chrono::FixedOffset;
use chrono::Utc;
use cron::Schedule;

use super::Trigger;
use crate::exception::CoreRsResult;
use crate::exception::error_code::INVALID_ARGUMENT;

pub(super) struct CronTrigger {
    schedule: Schedule,
    timezone: FixedOffset,
}

impl CronTrigger {
    pub(super) fn parse(expression: &str, timezone: FixedOffset) -> CoreRsResult<Self> {
        let schedule = Schedule::from_str(&cron_crate_expression(expression)?).map_err(|err| {
            exception!(
                code = INVALID_ARGUMENT,
                message = format!("invalid cron expression, expression={expression}"),
                source = err
            )
        })?;
        Ok(CronTrigger { schedule, timezone })
    }
}

impl Trigger for CronTrigger {
    fn next(&self, previous: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.schedule
            .after(&previous.with_timezone(&self.timezone))
            .next()
            .map(|time| time.with_timezone(&Utc))
    }
}

// cron crate expects "sec min hour day month weekday year", and numbers weekdays 1-7 from sunday
fn cron_crate_expression(expression: &str) -> CoreRsResult<String> {
    let fields: Vec<&str> = expression.split_whitespace().collect();
    let [minute, hour, day, month, weekday] = fields.as_slice() else {
        return Err(exception!(
            code = INVALID_ARGUMENT,
            message = format!("cron expression must have 5 fields, expression={expression}")
        ));
    };
    let weekday = weekday_names(weekday)?;
    Ok(format!("0 {minute} {hour} {day} {month} {weekday} *"))
}

fn weekday_names(field: &str) -> CoreRsResult<String> {
    let items: CoreRsResult<Vec<String>> = field
        .split(',')
        .map(|item| {
            let (range, step) = match item.split_once('/') {
                Some((range, step)) => (range, Some(step)),
                None => (item, None),
            };
            let range: CoreRsResult<Vec<String>> = range.split('-').map(weekday_name).collect();
            let mut item = range?.join("-");
            if let Some(step) = step {
                item.push('/');
                item.push_str(step);
            }
            Ok(item)
        })
        .collect();
    Ok(items?.join(","))
}

fn weekday_name(value: &str) -> CoreRsResult<String> {
    let name = match value {
        "0" | "7" => "SUN",
        "1" => "MON",
        "2" => "TUE",
        "3" => "WED",
        "4" => "THU",
        "5" => "FRI",
        "6" => "SAT",
        _ if value.chars().all(|c| c.is_ascii_digit()) => {
            return Err(exception!(
                code = INVALID_ARGUMENT,
                message = format!("invalid weekday, value={value}")
            ));
        }
        _ => value,
    };
    Ok(name.to_owned())
}

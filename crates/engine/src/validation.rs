//! Recurrence-rule validation. Malformed rules are rejected at submission,
//! never discovered at fire time.

use chime_domain::{Error, Result};

use crate::recurrence::RecurrenceRule;

pub fn validate_rule(rule: &RecurrenceRule) -> Result<()> {
    if rule.interval == 0 {
        return Err(Error::InvalidRecurrenceRule(
            "interval must be at least 1".into(),
        ));
    }
    if let Some(dow) = rule.anchor_day_of_week {
        if dow > 6 {
            return Err(Error::InvalidRecurrenceRule(format!(
                "anchor_day_of_week {dow} out of range 0..=6 (0 = Sunday)"
            )));
        }
    }
    if let Some(dom) = rule.anchor_day_of_month {
        if !(1..=31).contains(&dom) {
            return Err(Error::InvalidRecurrenceRule(format!(
                "anchor_day_of_month {dom} out of range 1..=31"
            )));
        }
    }
    Ok(())
}

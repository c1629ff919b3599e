//! Property extraction from a device-shadow snapshot.
//!
//! Pure mapping from the flat code -> value dictionary the cloud returns to
//! the two values this bridge publishes. A code the bridge does not
//! understand is a defined absence, not an error.

use serde_json::Value;
use std::collections::HashMap;

/// Flat code -> raw value mapping produced by one shadow fetch. Always
/// built fresh; a partial read is never padded with stale values.
pub type PropertySnapshot = HashMap<String, Value>;

/// Contact codes in priority order; the first present wins.
const CONTACT_CODES: [&str; 7] = [
    "doorcontact_state",
    "contact_state",
    "contact",
    "door",
    "open",
    "switch_1",
    "switch",
];

/// Normalized values pulled out of one snapshot. Either field may be
/// absent when the device reports no code this bridge understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Reading {
    pub contact: Option<bool>,
    pub battery: Option<i64>,
}

/// Resolve contact and battery from a snapshot. Deterministic; the two
/// fields are independent, so a missing contact code never blocks a found
/// battery value and vice versa.
pub fn extract(snapshot: &PropertySnapshot) -> Reading {
    Reading {
        contact: pick_contact(snapshot),
        battery: pick_battery(snapshot),
    }
}

fn pick_contact(snapshot: &PropertySnapshot) -> Option<bool> {
    for code in CONTACT_CODES {
        match snapshot.get(code) {
            Some(Value::Bool(b)) => return Some(*b),
            Some(Value::Number(n)) => {
                // Integer-like values coerce through nonzero-is-true;
                // anything else falls through to the next code.
                if let Some(i) = n.as_i64() {
                    return Some(i != 0);
                }
            }
            _ => {}
        }
    }
    None
}

fn pick_battery(snapshot: &PropertySnapshot) -> Option<i64> {
    for code in ["battery_percentage", "battery"] {
        if let Some(Value::Number(n)) = snapshot.get(code) {
            if let Some(f) = n.as_f64() {
                return Some(f as i64);
            }
        }
    }

    match snapshot.get("battery_state") {
        Some(Value::String(s)) => match s.trim().to_lowercase().as_str() {
            "low" => Some(20),
            "middle" | "medium" => Some(60),
            "high" => Some(100),
            _ => None,
        },
        _ => None,
    }
}

//! Topic construction for bridge state and Home Assistant discovery.

/// Fixed topic layout under the `tuya/` prefix plus the Home Assistant
/// discovery prefix.
pub struct TopicBuilder;

impl TopicBuilder {
    /// `tuya/{entity_id}/availability`
    pub fn availability(entity_id: &str) -> String {
        format!("tuya/{entity_id}/availability")
    }

    /// `tuya/{entity_id}/state`
    pub fn state(entity_id: &str) -> String {
        format!("tuya/{entity_id}/state")
    }

    /// `tuya/{entity_id}/battery`
    pub fn battery(entity_id: &str) -> String {
        format!("tuya/{entity_id}/battery")
    }

    /// `homeassistant/{component}/{object_id}/config`
    pub fn discovery(component: &str, object_id: &str) -> String {
        format!("homeassistant/{component}/{object_id}/config")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_topics() {
        assert_eq!(
            TopicBuilder::availability("front_door"),
            "tuya/front_door/availability"
        );
        assert_eq!(TopicBuilder::state("front_door"), "tuya/front_door/state");
        assert_eq!(
            TopicBuilder::battery("front_door"),
            "tuya/front_door/battery"
        );
    }

    #[test]
    fn test_discovery_topics() {
        assert_eq!(
            TopicBuilder::discovery("binary_sensor", "front_door"),
            "homeassistant/binary_sensor/front_door/config"
        );
        assert_eq!(
            TopicBuilder::discovery("sensor", "front_door_battery"),
            "homeassistant/sensor/front_door_battery/config"
        );
    }
}

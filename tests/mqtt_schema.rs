// Schema validation tests for MQTT wire format
//
// Discovery payloads come from the library's own serializers; command
// payloads are constructed directly, the way Home Assistant renders them.
// Both are validated against the JSON Schema files in schemas/mqtt/.

use serde_json::json;

use satel_integra::entities::AlarmPanelFeatures;
use satel_integra::mqtt::{discovery_config, parse_command, AlarmAttributes, Topics};
use satel_integra::settings::MqttSettings;
use satel_integra::{EntityCommand, EntityInfo, EntityKind, Platform};

fn load_schema(name: &str) -> serde_json::Value {
    let path = format!(
        "{}/schemas/mqtt/{name}",
        env!("CARGO_MANIFEST_DIR")
    );
    let text = std::fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("Failed to read schema {path}: {e}"));
    serde_json::from_str(&text)
        .unwrap_or_else(|e| panic!("Failed to parse schema {path}: {e}"))
}

fn build_validator(schema_name: &str) -> jsonschema::Validator {
    let schema = load_schema(schema_name);
    jsonschema::options()
        .with_retriever(LocalRetriever)
        .build(&schema)
        .unwrap_or_else(|e| panic!("Failed to compile schema {schema_name}: {e}"))
}

fn validate(schema_name: &str, instance: &serde_json::Value) {
    let validator = build_validator(schema_name);
    let errors: Vec<_> = validator.iter_errors(instance).collect();
    if !errors.is_empty() {
        let msgs: Vec<String> = errors.iter().map(|e| format!("  - {e}")).collect();
        panic!(
            "Schema validation failed for {schema_name}:\n{}\nInstance: {}",
            msgs.join("\n"),
            serde_json::to_string_pretty(instance).unwrap()
        );
    }
}

fn validate_fails(schema_name: &str, instance: &serde_json::Value) {
    let validator = build_validator(schema_name);
    assert!(
        !validator.is_valid(instance),
        "Expected schema validation to fail for {schema_name}, but it passed.\nInstance: {}",
        serde_json::to_string_pretty(instance).unwrap()
    );
}

// Retriever that loads $ref schemas from schemas/mqtt/
struct LocalRetriever;

impl jsonschema::Retrieve for LocalRetriever {
    fn retrieve(
        &self,
        uri: &jsonschema::Uri<String>,
    ) -> Result<serde_json::Value, Box<dyn std::error::Error + Send + Sync>> {
        let uri_str = uri.as_str();
        let filename = uri_str.strip_prefix("json-schema:///").unwrap_or(uri_str);
        let path = format!("{}/schemas/mqtt/{filename}", env!("CARGO_MANIFEST_DIR"));
        if std::path::Path::new(&path).exists() {
            let text = std::fs::read_to_string(&path)?;
            return Ok(serde_json::from_str(&text)?);
        }
        Err(format!("Cannot retrieve schema: {uri_str}").into())
    }
}

fn topics() -> Topics {
    Topics::new(&MqttSettings {
        url: "mqtt://broker:1883".to_string(),
        client_id: "satel2mqtt".to_string(),
        discovery_prefix: "homeassistant".to_string(),
        base_topic: "satel".to_string(),
    })
}

fn discovery_json(info: &EntityInfo) -> serde_json::Value {
    serde_json::to_value(discovery_config(&topics(), info)).unwrap()
}

// =========================================================================
// Discovery
// =========================================================================

#[test]
fn alarm_discovery_valid() {
    let info = EntityInfo {
        unique_id: "alarm_partition_1".to_string(),
        name: "House".to_string(),
        kind: EntityKind::AlarmPanel {
            features: AlarmPanelFeatures::ARM_HOME | AlarmPanelFeatures::ARM_AWAY,
            zones: vec![1, 2],
        },
    };
    validate("alarm_discovery.schema.json", &discovery_json(&info));
}

#[test]
fn alarm_discovery_requires_remote_code() {
    let info = EntityInfo {
        unique_id: "alarm_partition_1".to_string(),
        name: "House".to_string(),
        kind: EntityKind::AlarmPanel {
            features: AlarmPanelFeatures::ARM_AWAY,
            zones: vec![1],
        },
    };
    let mut config = discovery_json(&info);
    config["code"] = json!("1234");
    validate_fails("alarm_discovery.schema.json", &config);
}

#[test]
fn binary_sensor_discovery_valid() {
    let motion = EntityInfo {
        unique_id: "partition_1_hall_pir".to_string(),
        name: "Hall PIR".to_string(),
        kind: EntityKind::BinarySensor {
            device_class: "motion".to_string(),
            icon: None,
        },
    };
    validate("binary_sensor_discovery.schema.json", &discovery_json(&motion));

    let smoke = EntityInfo {
        unique_id: "partition_1_kitchen_smoke".to_string(),
        name: "Kitchen smoke".to_string(),
        kind: EntityKind::BinarySensor {
            device_class: "smoke".to_string(),
            icon: Some("mdi:fire"),
        },
    };
    validate("binary_sensor_discovery.schema.json", &discovery_json(&smoke));
}

#[test]
fn binary_sensor_discovery_rejects_command_topic() {
    let info = EntityInfo {
        unique_id: "partition_1_hall_pir".to_string(),
        name: "Hall PIR".to_string(),
        kind: EntityKind::BinarySensor {
            device_class: "motion".to_string(),
            icon: None,
        },
    };
    let mut config = discovery_json(&info);
    config["command_topic"] = json!("satel/binary_sensor/partition_1_hall_pir/set");
    validate_fails("binary_sensor_discovery.schema.json", &config);
}

#[test]
fn switch_discovery_valid() {
    let info = EntityInfo {
        unique_id: "partition_1_switch_gate".to_string(),
        name: "Gate".to_string(),
        kind: EntityKind::Switch,
    };
    validate("switch_discovery.schema.json", &discovery_json(&info));
}

#[test]
fn discovery_requires_both_availability_topics() {
    let info = EntityInfo {
        unique_id: "partition_1_switch_gate".to_string(),
        name: "Gate".to_string(),
        kind: EntityKind::Switch,
    };
    let mut config = discovery_json(&info);
    config["availability"] = json!([{ "topic": "satel/status" }]);
    validate_fails("switch_discovery.schema.json", &config);
}

// =========================================================================
// Alarm attributes
// =========================================================================

#[test]
fn alarm_attributes_valid() {
    let zones = [1, 2];
    let attributes = AlarmAttributes {
        zones: &zones,
        changed_at: "2026-10-18T12:00:00Z".to_string(),
    };
    validate(
        "alarm_attributes.schema.json",
        &serde_json::to_value(&attributes).unwrap(),
    );
}

#[test]
fn alarm_attributes_zone_out_of_range() {
    validate_fails(
        "alarm_attributes.schema.json",
        &json!({ "zones": [33], "changed_at": "2026-10-18T12:00:00Z" }),
    );
}

// =========================================================================
// Commands
// =========================================================================

#[test]
fn alarm_command_valid_and_parsed() {
    let payload = json!({ "action": "ARM_HOME", "code": "1234" });
    validate("alarm_command.schema.json", &payload);
    assert_eq!(
        parse_command(
            Platform::AlarmControlPanel,
            payload.to_string().as_bytes()
        ),
        Some(EntityCommand::ArmHome {
            code: Some("1234".to_string())
        })
    );
}

#[test]
fn alarm_command_empty_code() {
    // Home Assistant renders an empty code when none was entered
    let payload = json!({ "action": "DISARM", "code": "" });
    validate("alarm_command.schema.json", &payload);
    assert_eq!(
        parse_command(
            Platform::AlarmControlPanel,
            payload.to_string().as_bytes()
        ),
        Some(EntityCommand::Disarm { code: None })
    );
}

#[test]
fn alarm_command_unknown_action() {
    let payload = json!({ "action": "ARM_VACATION", "code": "1234" });
    validate_fails("alarm_command.schema.json", &payload);
    assert_eq!(
        parse_command(
            Platform::AlarmControlPanel,
            payload.to_string().as_bytes()
        ),
        None
    );
}

#[test]
fn alarm_command_non_digit_code() {
    validate_fails(
        "alarm_command.schema.json",
        &json!({ "action": "DISARM", "code": "12ab" }),
    );
}

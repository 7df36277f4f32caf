use serde_json::{Map, Value};

use crate::types::{Command, UnitType};

/// Orders naming more units than this are dropped outright.
const MAX_ORDER_UNITS: usize = 64;

#[derive(Debug, PartialEq)]
pub enum ParsedClientMessage {
    Command(Command),
    Ping { t: f64 },
}

pub fn parse_client_message(raw: &str) -> Option<ParsedClientMessage> {
    let value: Value = serde_json::from_str(raw).ok()?;
    let object = value.as_object()?;
    let message_type = object.get("type")?.as_str()?;

    match message_type {
        "produce_unit" => {
            let unit_type = UnitType::parse(object.get("unitType")?.as_str()?)?;
            Some(ParsedClientMessage::Command(Command::ProduceUnit { unit_type }))
        }
        "move_units" => {
            let unit_ids = parse_unit_ids(object)?;
            let target_x = parse_coordinate(object.get("targetX")?)?;
            let target_y = parse_coordinate(object.get("targetY")?)?;
            Some(ParsedClientMessage::Command(Command::MoveUnits {
                unit_ids,
                target_x,
                target_y,
            }))
        }
        "attack" => {
            let unit_ids = parse_unit_ids(object)?;
            let target_id = object.get("targetId")?.as_str()?.to_string();
            Some(ParsedClientMessage::Command(Command::Attack {
                unit_ids,
                target_id,
            }))
        }
        "capture_node" => {
            let unit_ids = parse_unit_ids(object)?;
            let node_id = object.get("nodeId")?.as_str()?.to_string();
            Some(ParsedClientMessage::Command(Command::CaptureNode {
                unit_ids,
                node_id,
            }))
        }
        "ping" => {
            let t = object.get("t")?.as_f64()?;
            if !t.is_finite() {
                return None;
            }
            Some(ParsedClientMessage::Ping { t })
        }
        _ => None,
    }
}

fn parse_unit_ids(object: &Map<String, Value>) -> Option<Vec<String>> {
    let values = object.get("unitIds")?.as_array()?;
    if values.len() > MAX_ORDER_UNITS {
        return None;
    }
    values
        .iter()
        .map(|value| value.as_str().map(str::to_string))
        .collect()
}

fn parse_coordinate(value: &Value) -> Option<f32> {
    let number = value.as_f64()? as f32;
    number.is_finite().then_some(number)
}

use serde_json::Value;

use crate::types::Direction;

#[derive(Debug)]
pub enum ParsedClientMessage {
    Join {
        game_id: String,
        name: String,
    },
    Move {
        direction: Direction,
    },
    Pickup,
    Drop {
        item_id: String,
    },
    Use {
        item_id: String,
    },
    Leave,
    Ping {
        t: f64,
    },
}

pub fn parse_client_message(raw: &str) -> Option<ParsedClientMessage> {
    let value: Value = serde_json::from_str(raw).ok()?;
    let object = value.as_object()?;
    let message_type = object.get("type")?.as_str()?;

    match message_type {
        "join" => {
            let game_id = object.get("gameId")?.as_str()?.to_string();
            let name = object.get("name")?.as_str()?.to_string();
            if name.trim().is_empty() {
                return None;
            }
            Some(ParsedClientMessage::Join { game_id, name })
        }
        "move" => {
            let direction = Direction::parse_move(object.get("direction")?.as_str()?)?;
            Some(ParsedClientMessage::Move { direction })
        }
        "pickup" => Some(ParsedClientMessage::Pickup),
        "drop" => {
            let item_id = object.get("itemId")?.as_str()?.to_string();
            Some(ParsedClientMessage::Drop { item_id })
        }
        "use" => {
            let item_id = object.get("itemId")?.as_str()?.to_string();
            Some(ParsedClientMessage::Use { item_id })
        }
        "leave" => Some(ParsedClientMessage::Leave),
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

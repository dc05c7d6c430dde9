use serde::Serialize;
use serde_json::{Value, json};

pub const MSG_TYPE_INTERACTIVE: &str = "interactive";
pub const MSG_TYPE_TEXT: &str = "text";

const WELCOME_TITLE: &str = "欢迎新同学";

/// Body of an `im/v1/messages` call. `content` is itself a JSON-encoded string,
/// as the platform expects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutboundMessage {
    pub receive_id: String,
    pub msg_type: String,
    pub content: String,
}

impl OutboundMessage {
    pub fn interactive(receive_id: impl Into<String>, card: &Value) -> Self {
        Self {
            receive_id: receive_id.into(),
            msg_type: MSG_TYPE_INTERACTIVE.into(),
            content: card.to_string(),
        }
    }

    pub fn text(receive_id: impl Into<String>, text: &str) -> Self {
        Self {
            receive_id: receive_id.into(),
            msg_type: MSG_TYPE_TEXT.into(),
            content: json!({ "text": text }).to_string(),
        }
    }

    /// Body for the reply endpoint, which takes no `receive_id`.
    pub fn reply_body(&self) -> Value {
        json!({
            "msg_type": self.msg_type,
            "content": self.content,
        })
    }
}

/// Concatenates one card mention tag per open id, with no separator.
pub fn mention_tags<'a, I>(open_ids: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    open_ids
        .into_iter()
        .map(|id| format!("<at id={id}></at>"))
        .collect()
}

/// Prefixes `text` with a text-message mention of `open_id`.
pub fn mention_text(open_id: Option<&str>, text: &str) -> String {
    match open_id {
        Some(id) if !id.is_empty() => format!("<at user_id=\"{id}\"></at> {text}"),
        _ => text.to_string(),
    }
}

/// Welcome card greeting the mentioned members.
pub fn welcome_card(mentions: &str) -> Value {
    json!({
        "header": {
            "title": {
                "tag": "lark_md",
                "i18n": { "zh_cn": WELCOME_TITLE }
            }
        },
        "i18n_elements": {
            "zh_cn": [
                {
                    "tag": "div",
                    "fields": [
                        {
                            "is_short": false,
                            "text": {
                                "tag": "lark_md",
                                "content": format!("亲爱的{mentions}，欢迎入群！👏🏻")
                            }
                        }
                    ]
                }
            ]
        }
    })
}

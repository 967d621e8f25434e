use bytes::Bytes;
use kamikaze_common::ProtocolError;

use crate::{Frame, Parse};

/// Comandos Redis que o cliente do Kamikaze envia.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Ping,
    ZAdd {
        key: String,
        score: f64,
        member: String,
    },
    ZRem {
        key: String,
        members: Vec<String>,
    },
    ZScan {
        key: String,
        cursor: u64,
        count: Option<usize>,
    },
    Publish {
        channel: String,
        message: Bytes,
    },
    Subscribe(Vec<String>),
}

impl Command {
    /// Encoda o comando como Frame para envio via RESP.
    pub fn to_frame(&self) -> Frame {
        match self {
            Command::Ping => Frame::command(&["PING"]),
            Command::ZAdd { key, score, member } => {
                Frame::command(&["ZADD", key.as_str(), &format_score(*score), member.as_str()])
            }
            Command::ZRem { key, members } => {
                let mut parts = vec![Frame::bulk("ZREM"), Frame::bulk(key)];
                parts.extend(members.iter().map(|m| Frame::bulk(m)));
                Frame::Array(parts)
            }
            Command::ZScan { key, cursor, count } => {
                let mut parts = vec![
                    Frame::bulk("ZSCAN"),
                    Frame::bulk(key),
                    Frame::bulk(&cursor.to_string()),
                ];
                if let Some(n) = count {
                    parts.push(Frame::bulk("COUNT"));
                    parts.push(Frame::bulk(&n.to_string()));
                }
                Frame::Array(parts)
            }
            Command::Publish { channel, message } => Frame::Array(vec![
                Frame::bulk("PUBLISH"),
                Frame::bulk(channel),
                Frame::Bulk(message.clone()),
            ]),
            Command::Subscribe(channels) => {
                let mut parts = vec![Frame::bulk("SUBSCRIBE")];
                parts.extend(channels.iter().map(|c| Frame::bulk(c)));
                Frame::Array(parts)
            }
        }
    }

    /// Faz o parse de um Frame em um Command (lado servidor).
    pub fn from_frame(frame: Frame) -> Result<Command, ProtocolError> {
        let mut parse = Parse::new(frame)?;
        let name = parse.next_string()?.to_uppercase();

        let cmd = match name.as_str() {
            "PING" => Command::Ping,
            "ZADD" => {
                let key = parse.next_string()?;
                let score = parse.next_float()?;
                let member = parse.next_string()?;
                Command::ZAdd { key, score, member }
            }
            "ZREM" => {
                let key = parse.next_string()?;
                let mut members = Vec::new();
                while parse.has_remaining() {
                    members.push(parse.next_string()?);
                }
                if members.is_empty() {
                    return Err(ProtocolError::InvalidCommand(
                        "ZREM exige ao menos um membro".into(),
                    ));
                }
                Command::ZRem { key, members }
            }
            "ZSCAN" => {
                let key = parse.next_string()?;
                let cursor = parse.next_cursor()?;
                let count = if parse.has_remaining() {
                    let opt = parse.next_string()?;
                    if !opt.eq_ignore_ascii_case("COUNT") {
                        return Err(ProtocolError::InvalidCommand(opt));
                    }
                    Some(parse.next_int()?.max(1) as usize)
                } else {
                    None
                };
                Command::ZScan { key, cursor, count }
            }
            "PUBLISH" => {
                let channel = parse.next_string()?;
                let message = parse.next_bytes()?;
                Command::Publish { channel, message }
            }
            "SUBSCRIBE" => {
                let mut channels = Vec::new();
                while parse.has_remaining() {
                    channels.push(parse.next_string()?);
                }
                Command::Subscribe(channels)
            }
            _ => return Err(ProtocolError::InvalidCommand(name)),
        };

        parse.finish()?;
        Ok(cmd)
    }
}

/// Formata um score da forma que o Redis aceita.
pub fn format_score(score: f64) -> String {
    if score.is_infinite() {
        if score > 0.0 { "+inf".into() } else { "-inf".into() }
    } else {
        score.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zadd_to_frame() {
        let cmd = Command::ZAdd {
            key: "kamikaze".into(),
            score: 3.5,
            member: "10.0:cactus".into(),
        };
        assert_eq!(
            cmd.to_frame(),
            Frame::command(&["ZADD", "kamikaze", "3.5", "10.0:cactus"])
        );
    }

    #[test]
    fn zscan_with_count_to_frame() {
        let cmd = Command::ZScan {
            key: "kamikaze".into(),
            cursor: 17,
            count: Some(100),
        };
        assert_eq!(
            cmd.to_frame(),
            Frame::command(&["ZSCAN", "kamikaze", "17", "COUNT", "100"])
        );
    }

    #[test]
    fn zrem_parses_all_members() {
        let frame = Frame::command(&["zrem", "kamikaze", "12:yellow", "10:orange"]);
        assert_eq!(
            Command::from_frame(frame).unwrap(),
            Command::ZRem {
                key: "kamikaze".into(),
                members: vec!["12:yellow".into(), "10:orange".into()],
            }
        );
    }

    #[test]
    fn zrem_without_members_fails() {
        let frame = Frame::command(&["ZREM", "kamikaze"]);
        assert!(Command::from_frame(frame).is_err());
    }

    #[test]
    fn zscan_rejects_unknown_option() {
        let frame = Frame::command(&["ZSCAN", "kamikaze", "0", "MATCH", "*"]);
        assert!(Command::from_frame(frame).is_err());
    }

    #[test]
    fn publish_parses() {
        let frame = Frame::command(&["PUBLISH", "kamikaze", "new_message"]);
        assert_eq!(
            Command::from_frame(frame).unwrap(),
            Command::Publish {
                channel: "kamikaze".into(),
                message: Bytes::from("new_message"),
            }
        );
    }

    #[test]
    fn unknown_command_fails() {
        let frame = Frame::command(&["FLUSHALL"]);
        assert!(matches!(
            Command::from_frame(frame),
            Err(ProtocolError::InvalidCommand(name)) if name == "FLUSHALL"
        ));
    }

    #[test]
    fn infinite_scores_use_redis_spelling() {
        assert_eq!(format_score(f64::INFINITY), "+inf");
        assert_eq!(format_score(f64::NEG_INFINITY), "-inf");
        assert_eq!(format_score(2.0), "2");
    }
}

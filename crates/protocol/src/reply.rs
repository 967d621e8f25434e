use kamikaze_common::ProtocolError;

use crate::{Frame, Parse};

/// Uma página de resultado do ZSCAN.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanPage {
    /// Cursor para a próxima chamada; 0 encerra a iteração.
    pub cursor: u64,
    /// Pares (membro, score) na ordem retornada pelo servidor.
    pub entries: Vec<(String, f64)>,
}

impl ScanPage {
    pub fn from_frame(frame: Frame) -> Result<ScanPage, ProtocolError> {
        let mut parse = Parse::new(frame)?;
        let cursor = parse.next_cursor()?;

        let mut items = parse.next_array()?;
        parse.finish()?;

        let mut entries = Vec::new();
        while items.has_remaining() {
            let member = items.next_string()?;
            let score = items.next_float()?;
            entries.push((member, score));
        }

        Ok(ScanPage { cursor, entries })
    }

    pub fn to_frame(&self) -> Frame {
        let mut items = Vec::with_capacity(self.entries.len() * 2);
        for (member, score) in &self.entries {
            items.push(Frame::bulk(member));
            items.push(Frame::bulk(&crate::format_score(*score)));
        }
        Frame::Array(vec![
            Frame::bulk(&self.cursor.to_string()),
            Frame::Array(items),
        ])
    }
}

/// Mensagem recebida numa conexão em modo subscribe.
#[derive(Debug, Clone, PartialEq)]
pub enum PushMessage {
    /// Confirmação de `SUBSCRIBE` com o total de canais inscritos.
    Subscribed { channel: String, count: i64 },
    /// Publicação num canal.
    Message { channel: String, payload: String },
}

impl PushMessage {
    pub fn from_frame(frame: Frame) -> Result<PushMessage, ProtocolError> {
        let mut parse = Parse::new(frame)?;
        let kind = parse.next_string()?;

        let msg = match kind.as_str() {
            "subscribe" => PushMessage::Subscribed {
                channel: parse.next_string()?,
                count: parse.next_int()?,
            },
            "message" => PushMessage::Message {
                channel: parse.next_string()?,
                payload: parse.next_string()?,
            },
            other => {
                return Err(ProtocolError::UnexpectedReply(format!(
                    "push desconhecido: {other}"
                )));
            }
        };

        parse.finish()?;
        Ok(msg)
    }

    pub fn to_frame(&self) -> Frame {
        match self {
            PushMessage::Subscribed { channel, count } => Frame::Array(vec![
                Frame::bulk("subscribe"),
                Frame::bulk(channel),
                Frame::Integer(*count),
            ]),
            PushMessage::Message { channel, payload } => {
                Frame::command(&["message", channel.as_str(), payload.as_str()])
            }
        }
    }
}

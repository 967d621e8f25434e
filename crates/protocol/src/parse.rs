use bytes::Bytes;
use kamikaze_common::ProtocolError;

use crate::Frame;

/// Cursor sobre um Frame::Array para extrair elementos sequencialmente.
///
/// Serve tanto para ler respostas do servidor quanto para decompor comandos.
pub struct Parse {
    parts: std::vec::IntoIter<Frame>,
}

impl Parse {
    /// Cria um Parse a partir de um Frame. O frame deve ser Array.
    pub fn new(frame: Frame) -> Result<Parse, ProtocolError> {
        match frame {
            Frame::Array(parts) => Ok(Parse {
                parts: parts.into_iter(),
            }),
            other => Err(ProtocolError::UnexpectedReply(format!(
                "esperado array, recebido {other:?}"
            ))),
        }
    }

    /// Retorna o próximo elemento como String (de Bulk ou Simple).
    pub fn next_string(&mut self) -> Result<String, ProtocolError> {
        self.next()?.into_string()
    }

    /// Retorna o próximo elemento como Bytes (de Bulk).
    pub fn next_bytes(&mut self) -> Result<Bytes, ProtocolError> {
        match self.next()? {
            Frame::Bulk(data) => Ok(data),
            Frame::Simple(s) => Ok(Bytes::from(s)),
            other => Err(ProtocolError::UnexpectedReply(format!(
                "esperado bulk, recebido {other:?}"
            ))),
        }
    }

    /// Retorna o próximo elemento como i64.
    pub fn next_int(&mut self) -> Result<i64, ProtocolError> {
        match self.next()? {
            Frame::Integer(n) => Ok(n),
            frame => {
                let s = frame.into_string()?;
                s.parse::<i64>()
                    .map_err(|_| ProtocolError::InvalidInteger(s))
            }
        }
    }

    /// Cursor de SCAN: inteiro sem sinal de 64 bits enviado como bulk.
    pub fn next_cursor(&mut self) -> Result<u64, ProtocolError> {
        match self.next()? {
            Frame::Integer(n) => {
                u64::try_from(n).map_err(|_| ProtocolError::InvalidInteger(n.to_string()))
            }
            frame => {
                let s = frame.into_string()?;
                s.parse::<u64>()
                    .map_err(|_| ProtocolError::InvalidInteger(s))
            }
        }
    }

    /// Retorna o próximo elemento como f64. Scores do Redis chegam como bulk.
    pub fn next_float(&mut self) -> Result<f64, ProtocolError> {
        let s = self.next_string()?;
        parse_float(&s)
    }

    /// Retorna o próximo elemento como um Parse aninhado.
    pub fn next_array(&mut self) -> Result<Parse, ProtocolError> {
        Parse::new(self.next()?)
    }

    /// Verifica se todos os elementos foram consumidos.
    pub fn finish(&mut self) -> Result<(), ProtocolError> {
        if self.parts.len() > 0 {
            Err(ProtocolError::UnexpectedReply(
                "elementos extras não esperados".into(),
            ))
        } else {
            Ok(())
        }
    }

    /// Verifica se ainda há elementos restantes.
    pub fn has_remaining(&self) -> bool {
        self.parts.len() > 0
    }

    fn next(&mut self) -> Result<Frame, ProtocolError> {
        self.parts.next().ok_or_else(|| {
            ProtocolError::UnexpectedReply("elementos insuficientes".into())
        })
    }
}

/// Interpreta um float no formato do Redis (aceita `inf`, `+inf` e `-inf`).
pub fn parse_float(s: &str) -> Result<f64, ProtocolError> {
    match s {
        "inf" | "+inf" => Ok(f64::INFINITY),
        "-inf" => Ok(f64::NEG_INFINITY),
        _ => s
            .parse::<f64>()
            .map_err(|_| ProtocolError::UnexpectedReply(format!("'{s}' não é um float"))),
    }
}

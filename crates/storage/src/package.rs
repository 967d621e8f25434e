use std::cmp::Ordering;
use std::fmt;

use kamikaze_common::PackageError;

/// Separador entre o tempo de expiração e o payload numa entrada.
pub const SEPARATOR: char = ':';

/// Visão decodificada de uma entrada da fila: payload + expiração + score.
///
/// Imutável. `raw_entry` é a string exata guardada no store e é usada como
/// chave de remoção, por isso um pacote decodificado preserva o texto lido em
/// vez de re-encodar a expiração.
#[derive(Debug, Clone, PartialEq)]
pub struct Package {
    payload: String,
    expire_time: Option<f64>,
    score: f64,
    raw_entry: String,
}

impl Package {
    pub fn new(payload: impl Into<String>, expire_time: Option<f64>, score: f64) -> Self {
        let payload = payload.into();
        let raw_entry = encode(&payload, expire_time);
        Self {
            payload,
            expire_time,
            score,
            raw_entry,
        }
    }

    /// Cria um pacote que expira `ttl` segundos depois de `now`.
    pub fn with_ttl(payload: impl Into<String>, ttl: f64, score: f64, now: f64) -> Self {
        Self::new(payload, Some(now + ttl), score)
    }

    /// Decodifica uma entrada `"<expire_time>:<payload>"` lida do store.
    ///
    /// A divisão é feita no primeiro `:`; a expiração nunca contém o
    /// separador, então o payload pode contê-lo.
    pub fn decode(entry: &str, score: f64) -> Result<Self, PackageError> {
        let (expire, payload) = entry
            .split_once(SEPARATOR)
            .ok_or_else(|| PackageError::MissingSeparator(entry.to_string()))?;

        let expire = expire.trim();
        let expire_time = if expire.is_empty() {
            None
        } else {
            let value = expire
                .parse::<f64>()
                .map_err(|e| PackageError::InvalidExpireTime {
                    entry: entry.to_string(),
                    reason: e.to_string(),
                })?;
            if !value.is_finite() {
                return Err(PackageError::InvalidExpireTime {
                    entry: entry.to_string(),
                    reason: "valor não finito".into(),
                });
            }
            Some(value)
        };

        Ok(Self {
            payload: payload.to_string(),
            expire_time,
            score,
            raw_entry: entry.to_string(),
        })
    }

    pub fn payload(&self) -> &str {
        &self.payload
    }

    pub fn expire_time(&self) -> Option<f64> {
        self.expire_time
    }

    pub fn score(&self) -> f64 {
        self.score
    }

    pub fn raw_entry(&self) -> &str {
        &self.raw_entry
    }

    /// Tempo restante até a expiração; negativo se já passou.
    pub fn ttl(&self, now: f64) -> Option<f64> {
        self.expire_time.map(|t| t - now)
    }

    pub fn is_expired(&self, now: f64) -> bool {
        self.expire_time.map(|t| t < now).unwrap_or(false)
    }

    /// Ordenação total pelo score (o único critério de prioridade).
    pub fn cmp_score(&self, other: &Package) -> Ordering {
        self.score.total_cmp(&other.score)
    }
}

impl fmt::Display for Package {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Package(payload={},score={},expire_time=", self.payload, self.score)?;
        match self.expire_time {
            Some(t) => write!(f, "{t:?})"),
            None => write!(f, "None)"),
        }
    }
}

// `{:?}` mantém a casa decimal (`3620.0`), como os produtores existentes gravam.
fn encode(payload: &str, expire_time: Option<f64>) -> String {
    match expire_time {
        Some(t) => format!("{t:?}{SEPARATOR}{payload}"),
        None => format!("{SEPARATOR}{payload}"),
    }
}
